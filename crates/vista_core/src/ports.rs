//! crates/vista_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the adviser's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{
    Application, ApplicationPlan, ApplicationTask, ApplicationUpdate, ChatMessage, Conversation,
    MessageRole, NewApplication, NewPathway, NewProgram, Pathway, PlannedTask, Profile,
    ProfileUpdate, Recommendation, User, UserCredentials,
};
use crate::tasks::TaskPatch;
use crate::turn::TurnRequest;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// The upstream event stream of one assistant turn, one JSON event per item.
pub type EventStream = Pin<Box<dyn Stream<Item = PortResult<Value>> + Send>>;

//=========================================================================================
// Persistence Port
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Users & Auth ---
    async fn create_user_with_email(&self, email: &str, hashed_password: &str)
        -> PortResult<User>;

    async fn create_guest_user(&self) -> PortResult<User>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    /// Turns a guest into a registered user. Fails with `Conflict` if the email is taken.
    async fn attach_credentials(
        &self,
        user_id: Uuid,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    /// Deletes the user and, by cascade, everything the user owns.
    async fn delete_user(&self, user_id: Uuid) -> PortResult<()>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Profiles ---
    async fn create_profile(&self, user_id: Uuid, email: Option<&str>) -> PortResult<Profile>;

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Profile>;

    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> PortResult<Profile>;

    async fn set_profile_vector_store(
        &self,
        user_id: Uuid,
        vector_store_id: Option<&str>,
    ) -> PortResult<()>;

    async fn set_profile_file(&self, user_id: Uuid, file_id: Option<&str>) -> PortResult<()>;

    // --- Pathways & Recommendations ---
    async fn insert_pathways(
        &self,
        user_id: Uuid,
        pathways: &[NewPathway],
    ) -> PortResult<Vec<Pathway>>;

    async fn list_pathways(&self, user_id: Uuid) -> PortResult<Vec<Pathway>>;

    async fn get_pathway(&self, user_id: Uuid, pathway_id: Uuid) -> PortResult<Pathway>;

    /// Batch upsert of programs plus the user's recommendations pointing at them.
    async fn upsert_recommendations(
        &self,
        user_id: Uuid,
        pathway_id: Option<Uuid>,
        programs: &[NewProgram],
    ) -> PortResult<Vec<Recommendation>>;

    async fn list_recommendations(&self, user_id: Uuid) -> PortResult<Vec<Recommendation>>;

    async fn get_recommendation(
        &self,
        user_id: Uuid,
        recommendation_id: Uuid,
    ) -> PortResult<Recommendation>;

    async fn set_favorite(
        &self,
        user_id: Uuid,
        recommendation_id: Uuid,
        is_favorite: bool,
    ) -> PortResult<Recommendation>;

    /// The most recently created favorite, if the user has any.
    async fn latest_favorite_recommendation(
        &self,
        user_id: Uuid,
    ) -> PortResult<Option<Recommendation>>;

    // --- Applications ---
    async fn insert_application(&self, application: NewApplication) -> PortResult<Application>;

    /// Inserts the tasks in order; `position` follows the slice order.
    async fn insert_application_tasks(
        &self,
        application_id: Uuid,
        tasks: &[PlannedTask],
    ) -> PortResult<Vec<ApplicationTask>>;

    async fn get_application(&self, user_id: Uuid, application_id: Uuid)
        -> PortResult<Application>;

    async fn list_applications(&self, user_id: Uuid) -> PortResult<Vec<Application>>;

    /// Tasks of an application ordered by `position`.
    async fn list_application_tasks(&self, application_id: Uuid)
        -> PortResult<Vec<ApplicationTask>>;

    async fn update_application(
        &self,
        user_id: Uuid,
        application_id: Uuid,
        update: &ApplicationUpdate,
    ) -> PortResult<Application>;

    async fn update_application_task(
        &self,
        application_id: Uuid,
        task_id: Uuid,
        patch: &TaskPatch,
    ) -> PortResult<ApplicationTask>;

    async fn delete_application(&self, user_id: Uuid, application_id: Uuid) -> PortResult<()>;

    // --- Conversations ---
    async fn create_conversation(
        &self,
        user_id: Uuid,
        title: Option<&str>,
    ) -> PortResult<Conversation>;

    async fn list_conversations(&self, user_id: Uuid) -> PortResult<Vec<Conversation>>;

    async fn get_conversation(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> PortResult<Conversation>;

    /// Sets the title unless one is already stored. Returns whether it was written.
    async fn set_conversation_title(&self, conversation_id: Uuid, title: &str)
        -> PortResult<bool>;

    async fn delete_conversation(&self, user_id: Uuid, conversation_id: Uuid) -> PortResult<()>;

    async fn insert_chat_message(
        &self,
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
        item_id: Option<&str>,
    ) -> PortResult<ChatMessage>;

    /// Messages of a conversation in creation order.
    async fn list_chat_messages(&self, conversation_id: Uuid) -> PortResult<Vec<ChatMessage>>;
}

//=========================================================================================
// LLM and Vector Store Ports
//=========================================================================================

#[async_trait]
pub trait TurnStreamService: Send + Sync {
    /// Opens one streaming turn on `model`. `context` is appended to the adviser
    /// instructions (typically a profile summary).
    ///
    /// Fails with `RateLimited` when the provider refuses the request for rate reasons,
    /// so that callers can retry on another model.
    async fn stream_turn(
        &self,
        model: &str,
        request: &TurnRequest,
        context: Option<&str>,
    ) -> PortResult<EventStream>;
}

#[async_trait]
pub trait VectorStoreService: Send + Sync {
    /// Creates a store and returns its id.
    async fn create_store(&self, name: &str) -> PortResult<String>;

    async fn delete_store(&self, vector_store_id: &str) -> PortResult<()>;

    /// Uploads a document for file search and returns the file id.
    async fn upload_file(&self, file_name: &str, contents: Vec<u8>) -> PortResult<String>;

    async fn add_file(&self, vector_store_id: &str, file_id: &str) -> PortResult<()>;

    async fn remove_file(&self, vector_store_id: &str, file_id: &str) -> PortResult<()>;

    /// Attaches several files at once and returns the batch id.
    async fn add_files_batch(&self, vector_store_id: &str, file_ids: &[String])
        -> PortResult<String>;
}

#[async_trait]
pub trait PathwayGenerationService: Send + Sync {
    /// Suggests broad education directions for the described profile.
    async fn generate_pathways(&self, profile_summary: &str) -> PortResult<Vec<NewPathway>>;
}

#[async_trait]
pub trait ProgramGenerationService: Send + Sync {
    /// Finds concrete programs matching a pathway, scored for the described profile.
    async fn generate_programs(
        &self,
        profile_summary: &str,
        pathway: &Pathway,
    ) -> PortResult<Vec<NewProgram>>;
}

#[async_trait]
pub trait PlanGenerationService: Send + Sync {
    /// Produces an application checklist and timeline for a recommendation.
    async fn generate_plan(
        &self,
        profile_summary: &str,
        recommendation: &Recommendation,
    ) -> PortResult<ApplicationPlan>;
}

#[async_trait]
pub trait TitleGenerationService: Send + Sync {
    /// Generates a short conversation title from its opening message.
    async fn generate_title_from_text(&self, text: &str) -> PortResult<String>;
}
