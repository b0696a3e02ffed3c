#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use vista_api::config::Config;
use vista_api::web::{build_router, state::AppState};
use vista_core::domain::{
    Application, ApplicationPlan, ApplicationStatus, ApplicationTask, ApplicationUpdate,
    ChatMessage, Conversation, MessageRole, NewApplication, NewPathway, NewProgram, Pathway,
    PlannedTask, Profile, ProfileUpdate, Program, Recommendation, TaskStatus, User,
    UserCredentials,
};
use vista_core::ports::{
    DatabaseService, EventStream, PathwayGenerationService, PlanGenerationService, PortError,
    PortResult, ProgramGenerationService, TitleGenerationService, TurnStreamService,
    VectorStoreService,
};
use vista_core::tasks::TaskPatch;
use vista_core::turn::TurnRequest;

//=========================================================================================
// In-memory database
//=========================================================================================

#[derive(Default)]
struct Store {
    users: HashMap<Uuid, (User, Option<String>)>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    profiles: HashMap<Uuid, Profile>,
    pathways: Vec<Pathway>,
    programs: Vec<Program>,
    recommendations: Vec<Recommendation>,
    applications: Vec<Application>,
    tasks: Vec<ApplicationTask>,
    conversations: Vec<Conversation>,
    messages: Vec<ChatMessage>,
}

#[derive(Default)]
pub struct InMemoryDb {
    store: Mutex<Store>,
    pub fail_application_insert: AtomicBool,
    pub fail_task_insert: AtomicBool,
    pub fail_profile_update: AtomicBool,
}

fn not_found(what: &str, id: impl std::fmt::Display) -> PortError {
    PortError::NotFound(format!("{} {} not found", what, id))
}

impl InMemoryDb {
    pub fn application_count(&self) -> usize {
        self.store.lock().unwrap().applications.len()
    }

    pub fn task_count(&self) -> usize {
        self.store.lock().unwrap().tasks.len()
    }

    pub fn messages(&self, conversation_id: Uuid) -> Vec<ChatMessage> {
        self.store
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    pub fn user(&self, user_id: Uuid) -> Option<User> {
        self.store
            .lock()
            .unwrap()
            .users
            .get(&user_id)
            .map(|(u, _)| u.clone())
    }

    pub fn profile(&self, user_id: Uuid) -> Option<Profile> {
        self.store.lock().unwrap().profiles.get(&user_id).cloned()
    }

    fn add_user(&self, email: Option<&str>, hashed_password: Option<&str>) -> User {
        let user = User {
            user_id: Uuid::new_v4(),
            email: email.map(str::to_string),
            is_guest: email.is_none(),
        };
        self.store.lock().unwrap().users.insert(
            user.user_id,
            (user.clone(), hashed_password.map(str::to_string)),
        );
        user
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let taken = self
            .store
            .lock()
            .unwrap()
            .users
            .values()
            .any(|(u, _)| u.email.as_deref() == Some(email));
        if taken {
            return Err(PortError::Conflict(format!("{} is already registered", email)));
        }
        Ok(self.add_user(Some(email), Some(hashed_password)))
    }

    async fn create_guest_user(&self) -> PortResult<User> {
        Ok(self.add_user(None, None))
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        self.user(user_id).ok_or_else(|| not_found("User", user_id))
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let store = self.store.lock().unwrap();
        store
            .users
            .values()
            .find_map(|(u, hash)| match (&u.email, hash) {
                (Some(e), Some(hash)) if e == email => Some(UserCredentials {
                    user_id: u.user_id,
                    email: e.clone(),
                    hashed_password: hash.clone(),
                }),
                _ => None,
            })
            .ok_or_else(|| not_found("User", email))
    }

    async fn attach_credentials(
        &self,
        user_id: Uuid,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let mut store = self.store.lock().unwrap();
        let taken = store
            .users
            .values()
            .any(|(u, _)| u.user_id != user_id && u.email.as_deref() == Some(email));
        if taken {
            return Err(PortError::Conflict(format!("{} is already registered", email)));
        }
        let (user, hash) = store
            .users
            .get_mut(&user_id)
            .ok_or_else(|| not_found("User", user_id))?;
        user.email = Some(email.to_string());
        user.is_guest = false;
        *hash = Some(hashed_password.to_string());
        Ok(user.clone())
    }

    async fn delete_user(&self, user_id: Uuid) -> PortResult<()> {
        let mut store = self.store.lock().unwrap();
        if store.users.remove(&user_id).is_none() {
            return Err(not_found("User", user_id));
        }
        store.sessions.retain(|_, (owner, _)| *owner != user_id);
        store.profiles.remove(&user_id);
        store.pathways.retain(|p| p.user_id != user_id);
        store.recommendations.retain(|r| r.user_id != user_id);
        let applications: Vec<Uuid> = store
            .applications
            .iter()
            .filter(|a| a.user_id == user_id)
            .map(|a| a.id)
            .collect();
        store.applications.retain(|a| a.user_id != user_id);
        store
            .tasks
            .retain(|t| !applications.contains(&t.application_id));
        let conversations: Vec<Uuid> = store
            .conversations
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.id)
            .collect();
        store.conversations.retain(|c| c.user_id != user_id);
        store
            .messages
            .retain(|m| !conversations.contains(&m.conversation_id));
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.store
            .lock()
            .unwrap()
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        match self.store.lock().unwrap().sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.store.lock().unwrap().sessions.remove(session_id);
        Ok(())
    }

    async fn create_profile(&self, user_id: Uuid, email: Option<&str>) -> PortResult<Profile> {
        let now = Utc::now();
        let profile = Profile {
            user_id,
            first_name: None,
            last_name: None,
            email: email.map(str::to_string),
            phone: None,
            date_of_birth: None,
            location: None,
            bio: None,
            education: Value::Null,
            preferences: Value::Null,
            documents: json!([]),
            vector_store_id: None,
            profile_file_id: None,
            created_at: now,
            updated_at: now,
        };
        self.store
            .lock()
            .unwrap()
            .profiles
            .insert(user_id, profile.clone());
        Ok(profile)
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        self.profile(user_id)
            .ok_or_else(|| not_found("Profile", user_id))
    }

    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> PortResult<Profile> {
        if self.fail_profile_update.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("profile update failed".to_string()));
        }
        let mut store = self.store.lock().unwrap();
        let profile = store
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| not_found("Profile", user_id))?;
        let u = update.clone();
        if let Some(v) = u.first_name {
            profile.first_name = Some(v);
        }
        if let Some(v) = u.last_name {
            profile.last_name = Some(v);
        }
        if let Some(v) = u.email {
            profile.email = Some(v);
        }
        if let Some(v) = u.phone {
            profile.phone = Some(v);
        }
        if let Some(v) = u.date_of_birth {
            profile.date_of_birth = Some(v);
        }
        if let Some(v) = u.location {
            profile.location = Some(v);
        }
        if let Some(v) = u.bio {
            profile.bio = Some(v);
        }
        if let Some(v) = u.education {
            profile.education = v;
        }
        if let Some(v) = u.preferences {
            profile.preferences = v;
        }
        if let Some(v) = u.documents {
            profile.documents = v;
        }
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn set_profile_vector_store(
        &self,
        user_id: Uuid,
        vector_store_id: Option<&str>,
    ) -> PortResult<()> {
        let mut store = self.store.lock().unwrap();
        let profile = store
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| not_found("Profile", user_id))?;
        profile.vector_store_id = vector_store_id.map(str::to_string);
        Ok(())
    }

    async fn set_profile_file(&self, user_id: Uuid, file_id: Option<&str>) -> PortResult<()> {
        let mut store = self.store.lock().unwrap();
        let profile = store
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| not_found("Profile", user_id))?;
        profile.profile_file_id = file_id.map(str::to_string);
        Ok(())
    }

    async fn insert_pathways(
        &self,
        user_id: Uuid,
        pathways: &[NewPathway],
    ) -> PortResult<Vec<Pathway>> {
        let stored: Vec<Pathway> = pathways
            .iter()
            .map(|p| Pathway {
                id: Uuid::new_v4(),
                user_id,
                title: p.title.clone(),
                description: p.description.clone(),
                category: p.category.clone(),
                duration: p.duration.clone(),
                cost_range: p.cost_range.clone(),
                outcomes: p.outcomes.clone(),
                created_at: Utc::now(),
            })
            .collect();
        self.store
            .lock()
            .unwrap()
            .pathways
            .extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn list_pathways(&self, user_id: Uuid) -> PortResult<Vec<Pathway>> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .pathways
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_pathway(&self, user_id: Uuid, pathway_id: Uuid) -> PortResult<Pathway> {
        self.store
            .lock()
            .unwrap()
            .pathways
            .iter()
            .find(|p| p.user_id == user_id && p.id == pathway_id)
            .cloned()
            .ok_or_else(|| not_found("Pathway", pathway_id))
    }

    async fn upsert_recommendations(
        &self,
        user_id: Uuid,
        pathway_id: Option<Uuid>,
        programs: &[NewProgram],
    ) -> PortResult<Vec<Recommendation>> {
        let mut store = self.store.lock().unwrap();
        let mut result = Vec::new();
        for new in programs {
            let program = Program {
                id: Uuid::new_v4(),
                name: new.name.clone(),
                institution: new.institution.clone(),
                degree_type: new.degree_type.clone(),
                duration: new.duration.clone(),
                cost: new.cost.clone(),
                location: new.location.clone(),
                start_date: new.start_date.clone(),
                application_deadline: new.application_deadline.clone(),
                requirements: new.requirements.clone(),
                highlights: new.highlights.clone(),
                description: new.description.clone(),
                website: new.website.clone(),
            };
            let program = match store
                .programs
                .iter_mut()
                .find(|p| p.name == new.name && p.institution == new.institution)
            {
                Some(existing) => {
                    let id = existing.id;
                    *existing = Program { id, ..program };
                    existing.clone()
                }
                None => {
                    store.programs.push(program.clone());
                    program
                }
            };

            let recommendation = match store
                .recommendations
                .iter_mut()
                .find(|r| r.user_id == user_id && r.program.id == program.id)
            {
                Some(existing) => {
                    existing.pathway_id = pathway_id;
                    existing.match_score = new.match_score;
                    existing.match_reasons = new.match_reasons.clone();
                    existing.program = program;
                    existing.clone()
                }
                None => {
                    let recommendation = Recommendation {
                        id: Uuid::new_v4(),
                        user_id,
                        pathway_id,
                        match_score: new.match_score,
                        match_reasons: new.match_reasons.clone(),
                        is_favorite: false,
                        created_at: Utc::now(),
                        program,
                    };
                    store.recommendations.push(recommendation.clone());
                    recommendation
                }
            };
            result.push(recommendation);
        }
        Ok(result)
    }

    async fn list_recommendations(&self, user_id: Uuid) -> PortResult<Vec<Recommendation>> {
        let mut recommendations: Vec<Recommendation> = self
            .store
            .lock()
            .unwrap()
            .recommendations
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        recommendations.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
        Ok(recommendations)
    }

    async fn get_recommendation(
        &self,
        user_id: Uuid,
        recommendation_id: Uuid,
    ) -> PortResult<Recommendation> {
        self.store
            .lock()
            .unwrap()
            .recommendations
            .iter()
            .find(|r| r.user_id == user_id && r.id == recommendation_id)
            .cloned()
            .ok_or_else(|| not_found("Recommendation", recommendation_id))
    }

    async fn set_favorite(
        &self,
        user_id: Uuid,
        recommendation_id: Uuid,
        is_favorite: bool,
    ) -> PortResult<Recommendation> {
        let mut store = self.store.lock().unwrap();
        let recommendation = store
            .recommendations
            .iter_mut()
            .find(|r| r.user_id == user_id && r.id == recommendation_id)
            .ok_or_else(|| not_found("Recommendation", recommendation_id))?;
        recommendation.is_favorite = is_favorite;
        Ok(recommendation.clone())
    }

    async fn latest_favorite_recommendation(
        &self,
        user_id: Uuid,
    ) -> PortResult<Option<Recommendation>> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .recommendations
            .iter()
            .rev()
            .find(|r| r.user_id == user_id && r.is_favorite)
            .cloned())
    }

    async fn insert_application(&self, application: NewApplication) -> PortResult<Application> {
        if self.fail_application_insert.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("application insert failed".to_string()));
        }
        let now = Utc::now();
        let application = Application {
            id: application.id,
            user_id: application.user_id,
            recommendation_id: application.recommendation_id,
            status: ApplicationStatus::Planning,
            deadline: application.deadline,
            notes: application.notes,
            timeline: application.timeline,
            created_at: now,
            updated_at: now,
        };
        self.store
            .lock()
            .unwrap()
            .applications
            .push(application.clone());
        Ok(application)
    }

    async fn insert_application_tasks(
        &self,
        application_id: Uuid,
        tasks: &[PlannedTask],
    ) -> PortResult<Vec<ApplicationTask>> {
        if self.fail_task_insert.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("task insert failed".to_string()));
        }
        let stored: Vec<ApplicationTask> = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| ApplicationTask {
                id: Uuid::new_v4(),
                application_id,
                title: t.title.clone(),
                description: t.description.clone(),
                due_date: t.due_date,
                status: TaskStatus::Pending,
                position: i as i32,
                created_at: Utc::now(),
            })
            .collect();
        self.store
            .lock()
            .unwrap()
            .tasks
            .extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn get_application(
        &self,
        user_id: Uuid,
        application_id: Uuid,
    ) -> PortResult<Application> {
        self.store
            .lock()
            .unwrap()
            .applications
            .iter()
            .find(|a| a.user_id == user_id && a.id == application_id)
            .cloned()
            .ok_or_else(|| not_found("Application", application_id))
    }

    async fn list_applications(&self, user_id: Uuid) -> PortResult<Vec<Application>> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .applications
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_application_tasks(
        &self,
        application_id: Uuid,
    ) -> PortResult<Vec<ApplicationTask>> {
        let mut tasks: Vec<ApplicationTask> = self
            .store
            .lock()
            .unwrap()
            .tasks
            .iter()
            .filter(|t| t.application_id == application_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.position);
        Ok(tasks)
    }

    async fn update_application(
        &self,
        user_id: Uuid,
        application_id: Uuid,
        update: &ApplicationUpdate,
    ) -> PortResult<Application> {
        let mut store = self.store.lock().unwrap();
        let application = store
            .applications
            .iter_mut()
            .find(|a| a.user_id == user_id && a.id == application_id)
            .ok_or_else(|| not_found("Application", application_id))?;
        if let Some(status) = update.status {
            application.status = status;
        }
        if let Some(deadline) = update.deadline {
            application.deadline = Some(deadline);
        }
        if let Some(notes) = &update.notes {
            application.notes = Some(notes.clone());
        }
        if let Some(timeline) = &update.timeline {
            application.timeline = timeline.clone();
        }
        application.updated_at = Utc::now();
        Ok(application.clone())
    }

    async fn update_application_task(
        &self,
        application_id: Uuid,
        task_id: Uuid,
        patch: &TaskPatch,
    ) -> PortResult<ApplicationTask> {
        let mut store = self.store.lock().unwrap();
        let task = store
            .tasks
            .iter_mut()
            .find(|t| t.application_id == application_id && t.id == task_id)
            .ok_or_else(|| not_found("Task", task_id))?;
        if let Some(title) = &patch.title {
            task.title = title.clone();
        }
        if let Some(description) = &patch.description {
            task.description = Some(description.clone());
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        Ok(task.clone())
    }

    async fn delete_application(&self, user_id: Uuid, application_id: Uuid) -> PortResult<()> {
        let mut store = self.store.lock().unwrap();
        let before = store.applications.len();
        store
            .applications
            .retain(|a| !(a.user_id == user_id && a.id == application_id));
        if store.applications.len() == before {
            return Err(not_found("Application", application_id));
        }
        store.tasks.retain(|t| t.application_id != application_id);
        Ok(())
    }

    async fn create_conversation(
        &self,
        user_id: Uuid,
        title: Option<&str>,
    ) -> PortResult<Conversation> {
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id,
            title: title.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        self.store
            .lock()
            .unwrap()
            .conversations
            .push(conversation.clone());
        Ok(conversation)
    }

    async fn list_conversations(&self, user_id: Uuid) -> PortResult<Vec<Conversation>> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .conversations
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_conversation(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> PortResult<Conversation> {
        self.store
            .lock()
            .unwrap()
            .conversations
            .iter()
            .find(|c| c.user_id == user_id && c.id == conversation_id)
            .cloned()
            .ok_or_else(|| not_found("Conversation", conversation_id))
    }

    async fn set_conversation_title(
        &self,
        conversation_id: Uuid,
        title: &str,
    ) -> PortResult<bool> {
        let mut store = self.store.lock().unwrap();
        let conversation = store
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
            .ok_or_else(|| not_found("Conversation", conversation_id))?;
        if conversation.title.is_some() {
            return Ok(false);
        }
        conversation.title = Some(title.to_string());
        Ok(true)
    }

    async fn delete_conversation(&self, user_id: Uuid, conversation_id: Uuid) -> PortResult<()> {
        let mut store = self.store.lock().unwrap();
        let before = store.conversations.len();
        store
            .conversations
            .retain(|c| !(c.user_id == user_id && c.id == conversation_id));
        if store.conversations.len() == before {
            return Err(not_found("Conversation", conversation_id));
        }
        store.messages.retain(|m| m.conversation_id != conversation_id);
        Ok(())
    }

    async fn insert_chat_message(
        &self,
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
        item_id: Option<&str>,
    ) -> PortResult<ChatMessage> {
        let message = ChatMessage {
            id: Uuid::new_v4(),
            conversation_id,
            role,
            content: content.to_string(),
            item_id: item_id.map(str::to_string),
            created_at: Utc::now(),
        };
        self.store.lock().unwrap().messages.push(message.clone());
        Ok(message)
    }

    async fn list_chat_messages(&self, conversation_id: Uuid) -> PortResult<Vec<ChatMessage>> {
        Ok(self.messages(conversation_id))
    }
}

//=========================================================================================
// Scripted LLM and vector store fakes
//=========================================================================================

/// One scripted upstream answer: an error before the stream, or a list of stream items.
pub enum TurnScript {
    Refuse(PortError),
    Events(Vec<PortResult<Value>>),
    /// Yields the events, then never finishes.
    Stall(Vec<PortResult<Value>>),
}

#[derive(Default)]
pub struct ScriptedTurnLlm {
    scripts: Mutex<VecDeque<TurnScript>>,
    calls: Mutex<Vec<(String, TurnRequest, Option<String>)>>,
}

impl ScriptedTurnLlm {
    pub fn push(&self, script: TurnScript) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn push_events(&self, events: Vec<Value>) {
        self.push(TurnScript::Events(events.into_iter().map(Ok).collect()));
    }

    /// The `(model, request, context)` of every upstream call so far.
    pub fn calls(&self) -> Vec<(String, TurnRequest, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TurnStreamService for ScriptedTurnLlm {
    async fn stream_turn(
        &self,
        model: &str,
        request: &TurnRequest,
        context: Option<&str>,
    ) -> PortResult<EventStream> {
        self.calls.lock().unwrap().push((
            model.to_string(),
            request.clone(),
            context.map(str::to_string),
        ));
        match self.scripts.lock().unwrap().pop_front() {
            Some(TurnScript::Refuse(e)) => Err(e),
            Some(TurnScript::Events(events)) => Ok(Box::pin(futures::stream::iter(events))),
            Some(TurnScript::Stall(events)) => Ok(Box::pin(
                futures::stream::iter(events).chain(futures::stream::pending()),
            )),
            None => Ok(Box::pin(futures::stream::empty())),
        }
    }
}

#[derive(Default)]
pub struct FakeVectorStores {
    pub fail: AtomicBool,
    counter: AtomicUsize,
    pub created: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub uploads: Mutex<Vec<String>>,
    pub attached: Mutex<Vec<(String, String)>>,
    pub detached: Mutex<Vec<(String, String)>>,
    pub batches: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeVectorStores {
    fn check(&self) -> PortResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(PortError::Unexpected("vector store unavailable".to_string()))
        } else {
            Ok(())
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, self.counter.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl VectorStoreService for FakeVectorStores {
    async fn create_store(&self, _name: &str) -> PortResult<String> {
        self.check()?;
        let id = self.next_id("vs");
        self.created.lock().unwrap().push(id.clone());
        Ok(id)
    }

    async fn delete_store(&self, vector_store_id: &str) -> PortResult<()> {
        self.check()?;
        self.deleted
            .lock()
            .unwrap()
            .push(vector_store_id.to_string());
        Ok(())
    }

    async fn upload_file(&self, file_name: &str, _contents: Vec<u8>) -> PortResult<String> {
        self.check()?;
        self.uploads.lock().unwrap().push(file_name.to_string());
        Ok(self.next_id("file"))
    }

    async fn add_file(&self, vector_store_id: &str, file_id: &str) -> PortResult<()> {
        self.check()?;
        self.attached
            .lock()
            .unwrap()
            .push((vector_store_id.to_string(), file_id.to_string()));
        Ok(())
    }

    async fn remove_file(&self, vector_store_id: &str, file_id: &str) -> PortResult<()> {
        self.check()?;
        self.detached
            .lock()
            .unwrap()
            .push((vector_store_id.to_string(), file_id.to_string()));
        Ok(())
    }

    async fn add_files_batch(
        &self,
        vector_store_id: &str,
        file_ids: &[String],
    ) -> PortResult<String> {
        self.check()?;
        self.batches
            .lock()
            .unwrap()
            .push((vector_store_id.to_string(), file_ids.to_vec()));
        Ok(self.next_id("batch"))
    }
}

#[derive(Default)]
pub struct FakeAdviser {
    pub pathways: Mutex<Vec<NewPathway>>,
    pub programs: Mutex<Vec<NewProgram>>,
    pub plan: Mutex<ApplicationPlan>,
    pub fail_plan: AtomicBool,
}

#[async_trait]
impl PathwayGenerationService for FakeAdviser {
    async fn generate_pathways(&self, _profile_summary: &str) -> PortResult<Vec<NewPathway>> {
        Ok(self.pathways.lock().unwrap().clone())
    }
}

#[async_trait]
impl ProgramGenerationService for FakeAdviser {
    async fn generate_programs(
        &self,
        _profile_summary: &str,
        _pathway: &Pathway,
    ) -> PortResult<Vec<NewProgram>> {
        Ok(self.programs.lock().unwrap().clone())
    }
}

#[async_trait]
impl PlanGenerationService for FakeAdviser {
    async fn generate_plan(
        &self,
        _profile_summary: &str,
        _recommendation: &Recommendation,
    ) -> PortResult<ApplicationPlan> {
        if self.fail_plan.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("plan generation failed".to_string()));
        }
        Ok(self.plan.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct FixedTitle {
    pub requests: Mutex<Vec<String>>,
}

#[async_trait]
impl TitleGenerationService for FixedTitle {
    async fn generate_title_from_text(&self, text: &str) -> PortResult<String> {
        self.requests.lock().unwrap().push(text.to_string());
        Ok("Exploring nursing programs".to_string())
    }
}

//=========================================================================================
// Test application
//=========================================================================================

pub struct TestApp {
    pub state: Arc<AppState>,
    pub db: Arc<InMemoryDb>,
    pub turn: Arc<ScriptedTurnLlm>,
    pub vectors: Arc<FakeVectorStores>,
    pub titles: Arc<FixedTitle>,
    pub adviser: Arc<FakeAdviser>,
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://localhost/vista_test".to_string()),
        "PRIMARY_MODEL" => Some("primary-model".to_string()),
        "FALLBACK_MODEL" => Some("fallback-model".to_string()),
        _ => None,
    })
    .expect("test config")
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let db = Arc::new(InMemoryDb::default());
        let turn = Arc::new(ScriptedTurnLlm::default());
        let vectors = Arc::new(FakeVectorStores::default());
        let adviser = Arc::new(FakeAdviser::default());
        let titles = Arc::new(FixedTitle::default());
        let state = Arc::new(AppState {
            db: db.clone(),
            config: Arc::new(config),
            turn_llm: turn.clone(),
            vector_stores: vectors.clone(),
            pathway_llm: adviser.clone(),
            program_llm: adviser.clone(),
            plan_llm: adviser.clone(),
            title_adapter: titles.clone(),
        });
        Self {
            state,
            db,
            turn,
            vectors,
            titles,
            adviser,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Creates a registered user with a profile and returns its id and session cookie.
    pub async fn signed_in_user(&self) -> (Uuid, String) {
        let email = format!("{}@example.com", Uuid::new_v4());
        let user = self
            .db
            .create_user_with_email(&email, "not-a-real-hash")
            .await
            .unwrap();
        self.db
            .create_profile(user.user_id, Some(&email))
            .await
            .unwrap();
        let session_id = Uuid::new_v4().to_string();
        self.db
            .create_auth_session(
                &session_id,
                user.user_id,
                Utc::now() + chrono::Duration::days(1),
            )
            .await
            .unwrap();
        (user.user_id, format!("session={}", session_id))
    }

    /// Stores one recommendation for `user_id` and returns it.
    pub async fn recommendation_for(&self, user_id: Uuid, favorite: bool) -> Recommendation {
        let program = NewProgram {
            name: format!("BSc Nursing {}", Uuid::new_v4()),
            institution: "Example University".to_string(),
            degree_type: Some("Bachelor".to_string()),
            duration: None,
            cost: None,
            location: None,
            start_date: None,
            application_deadline: None,
            requirements: vec![],
            highlights: vec![],
            description: None,
            website: None,
            match_score: 80.0,
            match_reasons: vec!["Likes helping people".to_string()],
        };
        let stored = self
            .db
            .upsert_recommendations(user_id, None, &[program])
            .await
            .unwrap();
        let recommendation = stored.into_iter().next().unwrap();
        if favorite {
            self.db
                .set_favorite(user_id, recommendation.id, true)
                .await
                .unwrap()
        } else {
            recommendation
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec(), headers)
    }

    /// Posts a single-file `multipart/form-data` body under the field `file`.
    pub async fn send_file(
        &self,
        uri: &str,
        cookie: &str,
        file_name: &str,
        contents: &[u8],
    ) -> (StatusCode, Value) {
        let boundary = "vista-test-boundary";
        let mut body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            b = boundary,
            f = file_name
        )
        .into_bytes();
        body.extend_from_slice(contents);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn send_json(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, bytes, _) = self.send(method, uri, cookie, body).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

//=========================================================================================
// Upstream event builders
//=========================================================================================

pub fn response_created(id: &str) -> Value {
    json!({"type": "response.created", "response": {"id": id}})
}

pub fn response_completed(id: &str) -> Value {
    json!({"type": "response.completed", "response": {"id": id}})
}

pub fn message_added(item_id: &str) -> Value {
    json!({
        "type": "response.output_item.added",
        "item": {"id": item_id, "type": "message", "role": "assistant", "content": []}
    })
}

pub fn text_delta(item_id: &str, delta: &str) -> Value {
    json!({"type": "response.output_text.delta", "item_id": item_id, "delta": delta})
}

pub fn message_done(item_id: &str, text: &str) -> Value {
    json!({
        "type": "response.output_item.done",
        "item": {
            "id": item_id,
            "type": "message",
            "role": "assistant",
            "content": [{"type": "output_text", "text": text}]
        }
    })
}

pub fn function_call_added(item_id: &str, call_id: &str, name: &str) -> Value {
    json!({
        "type": "response.output_item.added",
        "item": {"id": item_id, "type": "function_call", "call_id": call_id, "name": name, "arguments": ""}
    })
}

pub fn function_arguments_done(item_id: &str, arguments: &str) -> Value {
    json!({"type": "response.function_call_arguments.done", "item_id": item_id, "arguments": arguments})
}
