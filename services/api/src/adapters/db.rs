//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;
use vista_core::domain::{
    Application, ApplicationStatus, ApplicationTask, ApplicationUpdate, ChatMessage, Conversation,
    MessageRole, NewApplication, NewPathway, NewProgram, Pathway, PlannedTask, Profile,
    ProfileUpdate, Program, Recommendation, TaskStatus, TimelineEvent, User, UserCredentials,
};
use vista_core::ports::{DatabaseService, PortError, PortResult};
use vista_core::tasks::TaskPatch;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(e: sqlx::Error, what: impl FnOnce() -> String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what()),
        _ => unexpected(e),
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .as_deref()
        == Some("23505")
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: Option<String>,
    is_guest: bool,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
            is_guest: self.is_guest,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

#[derive(FromRow)]
struct ProfileRecord {
    user_id: Uuid,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    date_of_birth: Option<NaiveDate>,
    location: Option<String>,
    bio: Option<String>,
    education: Value,
    preferences: Value,
    documents: Value,
    vector_store_id: Option<String>,
    profile_file_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ProfileRecord {
    fn to_domain(self) -> Profile {
        Profile {
            user_id: self.user_id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            date_of_birth: self.date_of_birth,
            location: self.location,
            bio: self.bio,
            education: self.education,
            preferences: self.preferences,
            documents: self.documents,
            vector_store_id: self.vector_store_id,
            profile_file_id: self.profile_file_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const PROFILE_COLUMNS: &str = "user_id, first_name, last_name, email, phone, date_of_birth, \
    location, bio, education, preferences, documents, vector_store_id, profile_file_id, \
    created_at, updated_at";

#[derive(FromRow)]
struct PathwayRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    description: String,
    category: Option<String>,
    duration: Option<String>,
    cost_range: Option<String>,
    outcomes: Json<Vec<String>>,
    created_at: DateTime<Utc>,
}
impl PathwayRecord {
    fn to_domain(self) -> Pathway {
        Pathway {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            category: self.category,
            duration: self.duration,
            cost_range: self.cost_range,
            outcomes: self.outcomes.0,
            created_at: self.created_at,
        }
    }
}

const PATHWAY_COLUMNS: &str =
    "id, user_id, title, description, category, duration, cost_range, outcomes, created_at";

#[derive(FromRow)]
struct RecommendationRecord {
    id: Uuid,
    user_id: Uuid,
    pathway_id: Option<Uuid>,
    match_score: f64,
    match_reasons: Json<Vec<String>>,
    is_favorite: bool,
    created_at: DateTime<Utc>,
    program_id: Uuid,
    name: String,
    institution: String,
    degree_type: Option<String>,
    duration: Option<String>,
    cost: Option<String>,
    location: Option<String>,
    start_date: Option<String>,
    application_deadline: Option<String>,
    requirements: Json<Vec<String>>,
    highlights: Json<Vec<String>>,
    description: Option<String>,
    website: Option<String>,
}
impl RecommendationRecord {
    fn to_domain(self) -> Recommendation {
        Recommendation {
            id: self.id,
            user_id: self.user_id,
            pathway_id: self.pathway_id,
            match_score: self.match_score,
            match_reasons: self.match_reasons.0,
            is_favorite: self.is_favorite,
            created_at: self.created_at,
            program: Program {
                id: self.program_id,
                name: self.name,
                institution: self.institution,
                degree_type: self.degree_type,
                duration: self.duration,
                cost: self.cost,
                location: self.location,
                start_date: self.start_date,
                application_deadline: self.application_deadline,
                requirements: self.requirements.0,
                highlights: self.highlights.0,
                description: self.description,
                website: self.website,
            },
        }
    }
}

const RECOMMENDATION_SELECT: &str = "SELECT r.id, r.user_id, r.pathway_id, r.match_score, \
    r.match_reasons, r.is_favorite, r.created_at, p.id AS program_id, p.name, p.institution, \
    p.degree_type, p.duration, p.cost, p.location, p.start_date, p.application_deadline, \
    p.requirements, p.highlights, p.description, p.website \
    FROM recommendations r JOIN programs p ON p.id = r.program_id";

#[derive(FromRow)]
struct ApplicationRecord {
    id: Uuid,
    user_id: Uuid,
    recommendation_id: Uuid,
    status: String,
    deadline: Option<NaiveDate>,
    notes: Option<String>,
    timeline: Json<Vec<TimelineEvent>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ApplicationRecord {
    fn to_domain(self) -> Application {
        Application {
            id: self.id,
            user_id: self.user_id,
            recommendation_id: self.recommendation_id,
            status: ApplicationStatus::parse(&self.status).unwrap_or(ApplicationStatus::Planning),
            deadline: self.deadline,
            notes: self.notes,
            timeline: self.timeline.0,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const APPLICATION_COLUMNS: &str =
    "id, user_id, recommendation_id, status, deadline, notes, timeline, created_at, updated_at";

#[derive(FromRow)]
struct TaskRecord {
    id: Uuid,
    application_id: Uuid,
    title: String,
    description: Option<String>,
    due_date: Option<NaiveDate>,
    status: String,
    position: i32,
    created_at: DateTime<Utc>,
}
impl TaskRecord {
    fn to_domain(self) -> ApplicationTask {
        ApplicationTask {
            id: self.id,
            application_id: self.application_id,
            title: self.title,
            description: self.description,
            due_date: self.due_date,
            status: TaskStatus::parse(&self.status).unwrap_or(TaskStatus::Pending),
            position: self.position,
            created_at: self.created_at,
        }
    }
}

const TASK_COLUMNS: &str =
    "id, application_id, title, description, due_date, status, position, created_at";

#[derive(FromRow)]
struct ConversationRecord {
    id: Uuid,
    user_id: Uuid,
    title: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ConversationRecord {
    fn to_domain(self) -> Conversation {
        Conversation {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ChatMessageRecord {
    id: Uuid,
    conversation_id: Uuid,
    role: String,
    content: String,
    item_id: Option<String>,
    created_at: DateTime<Utc>,
}
impl ChatMessageRecord {
    fn to_domain(self) -> ChatMessage {
        ChatMessage {
            id: self.id,
            conversation_id: self.conversation_id,
            role: MessageRole::parse(&self.role).unwrap_or(MessageRole::User),
            content: self.content,
            item_id: self.item_id,
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- Users & Auth ---

    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (email, hashed_password) VALUES ($1, $2) \
             RETURNING user_id, email, is_guest",
        )
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict(format!("Email {} is already registered", email))
            } else {
                unexpected(e)
            }
        })?;
        Ok(record.to_domain())
    }

    async fn create_guest_user(&self) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (is_guest) VALUES (TRUE) RETURNING user_id, email, is_guest",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email, is_guest FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users \
             WHERE email = $1 AND hashed_password IS NOT NULL",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("User {} not found", email)))?;
        Ok(UserCredentials {
            user_id: record.user_id,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn attach_credentials(
        &self,
        user_id: Uuid,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "UPDATE users SET email = $2, hashed_password = $3, is_guest = FALSE \
             WHERE user_id = $1 RETURNING user_id, email, is_guest",
        )
        .bind(user_id)
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict(format!("Email {} is already registered", email))
            } else {
                not_found_or_unexpected(e, || format!("User {} not found", user_id))
            }
        })?;
        Ok(record.to_domain())
    }

    async fn delete_user(&self, user_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Uuid = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            _ => unexpected(e),
        })?;
        Ok(user_id)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- Profiles ---

    async fn create_profile(&self, user_id: Uuid, email: Option<&str>) -> PortResult<Profile> {
        let sql = format!(
            "INSERT INTO profiles (user_id, email) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE SET email = COALESCE(EXCLUDED.email, profiles.email) \
             RETURNING {}",
            PROFILE_COLUMNS
        );
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(user_id)
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        let sql = format!("SELECT {} FROM profiles WHERE user_id = $1", PROFILE_COLUMNS);
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or_unexpected(e, || format!("Profile {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> PortResult<Profile> {
        let sql = format!(
            "UPDATE profiles SET \
                first_name = COALESCE($2, first_name), \
                last_name = COALESCE($3, last_name), \
                email = COALESCE($4, email), \
                phone = COALESCE($5, phone), \
                date_of_birth = COALESCE($6, date_of_birth), \
                location = COALESCE($7, location), \
                bio = COALESCE($8, bio), \
                education = COALESCE($9, education), \
                preferences = COALESCE($10, preferences), \
                documents = COALESCE($11, documents), \
                updated_at = now() \
             WHERE user_id = $1 RETURNING {}",
            PROFILE_COLUMNS
        );
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(user_id)
            .bind(&update.first_name)
            .bind(&update.last_name)
            .bind(&update.email)
            .bind(&update.phone)
            .bind(update.date_of_birth)
            .bind(&update.location)
            .bind(&update.bio)
            .bind(&update.education)
            .bind(&update.preferences)
            .bind(&update.documents)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or_unexpected(e, || format!("Profile {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn set_profile_vector_store(
        &self,
        user_id: Uuid,
        vector_store_id: Option<&str>,
    ) -> PortResult<()> {
        sqlx::query("UPDATE profiles SET vector_store_id = $2, updated_at = now() WHERE user_id = $1")
            .bind(user_id)
            .bind(vector_store_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn set_profile_file(&self, user_id: Uuid, file_id: Option<&str>) -> PortResult<()> {
        sqlx::query("UPDATE profiles SET profile_file_id = $2, updated_at = now() WHERE user_id = $1")
            .bind(user_id)
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- Pathways & Recommendations ---

    async fn insert_pathways(
        &self,
        user_id: Uuid,
        pathways: &[NewPathway],
    ) -> PortResult<Vec<Pathway>> {
        let sql = format!(
            "INSERT INTO pathways (user_id, title, description, category, duration, cost_range, outcomes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            PATHWAY_COLUMNS
        );
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let mut inserted = Vec::with_capacity(pathways.len());
        for pathway in pathways {
            let record = sqlx::query_as::<_, PathwayRecord>(&sql)
                .bind(user_id)
                .bind(&pathway.title)
                .bind(&pathway.description)
                .bind(&pathway.category)
                .bind(&pathway.duration)
                .bind(&pathway.cost_range)
                .bind(Json(&pathway.outcomes))
                .fetch_one(&mut *tx)
                .await
                .map_err(unexpected)?;
            inserted.push(record.to_domain());
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(inserted)
    }

    async fn list_pathways(&self, user_id: Uuid) -> PortResult<Vec<Pathway>> {
        let sql = format!(
            "SELECT {} FROM pathways WHERE user_id = $1 ORDER BY created_at DESC",
            PATHWAY_COLUMNS
        );
        let records = sqlx::query_as::<_, PathwayRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_pathway(&self, user_id: Uuid, pathway_id: Uuid) -> PortResult<Pathway> {
        let sql = format!(
            "SELECT {} FROM pathways WHERE id = $1 AND user_id = $2",
            PATHWAY_COLUMNS
        );
        let record = sqlx::query_as::<_, PathwayRecord>(&sql)
            .bind(pathway_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or_unexpected(e, || format!("Pathway {} not found", pathway_id)))?;
        Ok(record.to_domain())
    }

    async fn upsert_recommendations(
        &self,
        user_id: Uuid,
        pathway_id: Option<Uuid>,
        programs: &[NewProgram],
    ) -> PortResult<Vec<Recommendation>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT recommendation_id FROM upsert_recommendations($1, $2, $3)",
        )
        .bind(user_id)
        .bind(pathway_id)
        .bind(Json(programs))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let sql = format!(
            "{} WHERE r.id = ANY($1) ORDER BY r.match_score DESC",
            RECOMMENDATION_SELECT
        );
        let records = sqlx::query_as::<_, RecommendationRecord>(&sql)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_recommendations(&self, user_id: Uuid) -> PortResult<Vec<Recommendation>> {
        let sql = format!(
            "{} WHERE r.user_id = $1 ORDER BY r.match_score DESC, r.created_at DESC",
            RECOMMENDATION_SELECT
        );
        let records = sqlx::query_as::<_, RecommendationRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_recommendation(
        &self,
        user_id: Uuid,
        recommendation_id: Uuid,
    ) -> PortResult<Recommendation> {
        let sql = format!("{} WHERE r.id = $1 AND r.user_id = $2", RECOMMENDATION_SELECT);
        let record = sqlx::query_as::<_, RecommendationRecord>(&sql)
            .bind(recommendation_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                not_found_or_unexpected(e, || {
                    format!("Recommendation {} not found", recommendation_id)
                })
            })?;
        Ok(record.to_domain())
    }

    async fn set_favorite(
        &self,
        user_id: Uuid,
        recommendation_id: Uuid,
        is_favorite: bool,
    ) -> PortResult<Recommendation> {
        let result = sqlx::query(
            "UPDATE recommendations SET is_favorite = $3 WHERE id = $1 AND user_id = $2",
        )
        .bind(recommendation_id)
        .bind(user_id)
        .bind(is_favorite)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Recommendation {} not found",
                recommendation_id
            )));
        }
        self.get_recommendation(user_id, recommendation_id).await
    }

    async fn latest_favorite_recommendation(
        &self,
        user_id: Uuid,
    ) -> PortResult<Option<Recommendation>> {
        let sql = format!(
            "{} WHERE r.user_id = $1 AND r.is_favorite ORDER BY r.created_at DESC LIMIT 1",
            RECOMMENDATION_SELECT
        );
        let record = sqlx::query_as::<_, RecommendationRecord>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()))
    }

    // --- Applications ---

    async fn insert_application(&self, application: NewApplication) -> PortResult<Application> {
        let sql = format!(
            "INSERT INTO applications (id, user_id, recommendation_id, deadline, notes, timeline) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            APPLICATION_COLUMNS
        );
        let record = sqlx::query_as::<_, ApplicationRecord>(&sql)
            .bind(application.id)
            .bind(application.user_id)
            .bind(application.recommendation_id)
            .bind(application.deadline)
            .bind(&application.notes)
            .bind(Json(&application.timeline))
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn insert_application_tasks(
        &self,
        application_id: Uuid,
        tasks: &[PlannedTask],
    ) -> PortResult<Vec<ApplicationTask>> {
        let sql = format!(
            "INSERT INTO application_tasks (application_id, title, description, due_date, position) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            TASK_COLUMNS
        );
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let mut inserted = Vec::with_capacity(tasks.len());
        for (position, task) in tasks.iter().enumerate() {
            let record = sqlx::query_as::<_, TaskRecord>(&sql)
                .bind(application_id)
                .bind(&task.title)
                .bind(&task.description)
                .bind(task.due_date)
                .bind(position as i32)
                .fetch_one(&mut *tx)
                .await
                .map_err(unexpected)?;
            inserted.push(record.to_domain());
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(inserted)
    }

    async fn get_application(
        &self,
        user_id: Uuid,
        application_id: Uuid,
    ) -> PortResult<Application> {
        let sql = format!(
            "SELECT {} FROM applications WHERE id = $1 AND user_id = $2",
            APPLICATION_COLUMNS
        );
        let record = sqlx::query_as::<_, ApplicationRecord>(&sql)
            .bind(application_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                not_found_or_unexpected(e, || format!("Application {} not found", application_id))
            })?;
        Ok(record.to_domain())
    }

    async fn list_applications(&self, user_id: Uuid) -> PortResult<Vec<Application>> {
        let sql = format!(
            "SELECT {} FROM applications WHERE user_id = $1 ORDER BY created_at DESC",
            APPLICATION_COLUMNS
        );
        let records = sqlx::query_as::<_, ApplicationRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_application_tasks(
        &self,
        application_id: Uuid,
    ) -> PortResult<Vec<ApplicationTask>> {
        let sql = format!(
            "SELECT {} FROM application_tasks WHERE application_id = $1 ORDER BY position ASC",
            TASK_COLUMNS
        );
        let records = sqlx::query_as::<_, TaskRecord>(&sql)
            .bind(application_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn update_application(
        &self,
        user_id: Uuid,
        application_id: Uuid,
        update: &ApplicationUpdate,
    ) -> PortResult<Application> {
        let sql = format!(
            "UPDATE applications SET \
                status = COALESCE($3, status), \
                deadline = COALESCE($4, deadline), \
                notes = COALESCE($5, notes), \
                timeline = COALESCE($6, timeline), \
                updated_at = now() \
             WHERE id = $1 AND user_id = $2 RETURNING {}",
            APPLICATION_COLUMNS
        );
        let record = sqlx::query_as::<_, ApplicationRecord>(&sql)
            .bind(application_id)
            .bind(user_id)
            .bind(update.status.map(|s| s.as_str()))
            .bind(update.deadline)
            .bind(&update.notes)
            .bind(update.timeline.as_ref().map(Json))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                not_found_or_unexpected(e, || format!("Application {} not found", application_id))
            })?;
        Ok(record.to_domain())
    }

    async fn update_application_task(
        &self,
        application_id: Uuid,
        task_id: Uuid,
        patch: &TaskPatch,
    ) -> PortResult<ApplicationTask> {
        let sql = format!(
            "UPDATE application_tasks SET \
                title = COALESCE($3, title), \
                description = COALESCE($4, description), \
                due_date = COALESCE($5, due_date), \
                status = COALESCE($6, status) \
             WHERE id = $1 AND application_id = $2 RETURNING {}",
            TASK_COLUMNS
        );
        let record = sqlx::query_as::<_, TaskRecord>(&sql)
            .bind(task_id)
            .bind(application_id)
            .bind(&patch.title)
            .bind(&patch.description)
            .bind(patch.due_date)
            .bind(patch.status.map(|s| s.as_str()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or_unexpected(e, || format!("Task {} not found", task_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_application(&self, user_id: Uuid, application_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM applications WHERE id = $1 AND user_id = $2")
            .bind(application_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Application {} not found",
                application_id
            )));
        }
        Ok(())
    }

    // --- Conversations ---

    async fn create_conversation(
        &self,
        user_id: Uuid,
        title: Option<&str>,
    ) -> PortResult<Conversation> {
        let record = sqlx::query_as::<_, ConversationRecord>(
            "INSERT INTO conversations (user_id, title) VALUES ($1, $2) \
             RETURNING id, user_id, title, created_at, updated_at",
        )
        .bind(user_id)
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_conversations(&self, user_id: Uuid) -> PortResult<Vec<Conversation>> {
        let records = sqlx::query_as::<_, ConversationRecord>(
            "SELECT id, user_id, title, created_at, updated_at FROM conversations \
             WHERE user_id = $1 ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_conversation(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> PortResult<Conversation> {
        let record = sqlx::query_as::<_, ConversationRecord>(
            "SELECT id, user_id, title, created_at, updated_at FROM conversations \
             WHERE id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            not_found_or_unexpected(e, || format!("Conversation {} not found", conversation_id))
        })?;
        Ok(record.to_domain())
    }

    async fn set_conversation_title(
        &self,
        conversation_id: Uuid,
        title: &str,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE conversations SET title = $2, updated_at = now() WHERE id = $1 AND title IS NULL",
        )
        .bind(conversation_id)
        .bind(title)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_conversation(&self, user_id: Uuid, conversation_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = $1 AND user_id = $2")
            .bind(conversation_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Conversation {} not found",
                conversation_id
            )));
        }
        Ok(())
    }

    async fn insert_chat_message(
        &self,
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
        item_id: Option<&str>,
    ) -> PortResult<ChatMessage> {
        let record = sqlx::query_as::<_, ChatMessageRecord>(
            "INSERT INTO chat_messages (conversation_id, role, content, item_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, conversation_id, role, content, item_id, created_at",
        )
        .bind(conversation_id)
        .bind(role.as_str())
        .bind(content)
        .bind(item_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        sqlx::query("UPDATE conversations SET updated_at = now() WHERE id = $1")
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_chat_messages(&self, conversation_id: Uuid) -> PortResult<Vec<ChatMessage>> {
        let records = sqlx::query_as::<_, ChatMessageRecord>(
            "SELECT id, conversation_id, role, content, item_id, created_at FROM chat_messages \
             WHERE conversation_id = $1 ORDER BY created_at ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}
