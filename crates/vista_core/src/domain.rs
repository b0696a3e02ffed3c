//! crates/vista_core/src/domain.rs
//!
//! Defines the core data structures for the adviser.
//! These structs are independent of any database; they derive serde because
//! several of them travel verbatim between the LLM, the database and the browser.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

//=========================================================================================
// Users and Authentication
//=========================================================================================

// Represents a user - used throughout app
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>, // None for guests
    pub is_guest: bool,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Profiles
//=========================================================================================

/// One per user. Education, preferences and uploaded documents are free-form JSON
/// blobs shaped by the onboarding wizard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub user_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub education: Value,
    pub preferences: Value,
    pub documents: Value,
    pub vector_store_id: Option<String>,
    pub profile_file_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// A short plain-text description of the profile, used to ground LLM prompts.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if !name.is_empty() {
            lines.push(format!("Name: {}", name));
        }
        if let Some(location) = &self.location {
            lines.push(format!("Location: {}", location));
        }
        if let Some(bio) = &self.bio {
            lines.push(format!("About: {}", bio));
        }
        if !self.education.is_null() {
            lines.push(format!("Education: {}", self.education));
        }
        if !self.preferences.is_null() {
            lines.push(format!("Preferences: {}", self.preferences));
        }
        lines.join("\n")
    }
}

/// A partial profile update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub education: Option<Value>,
    pub preferences: Option<Value>,
    pub documents: Option<Value>,
}

impl ProfileUpdate {
    /// Trims the text fields and drops the ones left blank, so an empty form
    /// field never overwrites a stored value.
    pub fn normalized(self) -> Self {
        fn filled(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        ProfileUpdate {
            first_name: filled(self.first_name),
            last_name: filled(self.last_name),
            email: filled(self.email),
            phone: filled(self.phone),
            date_of_birth: self.date_of_birth,
            location: filled(self.location),
            bio: filled(self.bio),
            education: self.education,
            preferences: self.preferences,
            documents: self.documents,
        }
    }

    /// True when no field carries a usable value. Blank strings count as absent.
    pub fn is_empty(&self) -> bool {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        blank(&self.first_name)
            && blank(&self.last_name)
            && blank(&self.email)
            && blank(&self.phone)
            && self.date_of_birth.is_none()
            && blank(&self.location)
            && blank(&self.bio)
            && self.education.is_none()
            && self.preferences.is_none()
            && self.documents.is_none()
    }
}

//=========================================================================================
// Pathways, Programs and Recommendations
//=========================================================================================

/// A broad, LLM-suggested education direction owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pathway {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub duration: Option<String>,
    pub cost_range: Option<String>,
    pub outcomes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A pathway as produced by the LLM, before it is stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPathway {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub cost_range: Option<String>,
    #[serde(default)]
    pub outcomes: Vec<String>,
}

/// A concrete offering at an institution. Programs are shared, not owned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub id: Uuid,
    pub name: String,
    pub institution: String,
    pub degree_type: Option<String>,
    pub duration: Option<String>,
    pub cost: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<String>,
    pub application_deadline: Option<String>,
    pub requirements: Vec<String>,
    pub highlights: Vec<String>,
    pub description: Option<String>,
    pub website: Option<String>,
}

impl Program {
    /// The text that gets embedded in the user's vector store for this program.
    pub fn search_document(&self) -> String {
        let mut doc = format!("# {}\nInstitution: {}\n", self.name, self.institution);
        for (label, value) in [
            ("Degree", &self.degree_type),
            ("Duration", &self.duration),
            ("Cost", &self.cost),
            ("Location", &self.location),
            ("Start date", &self.start_date),
            ("Application deadline", &self.application_deadline),
            ("Website", &self.website),
        ] {
            if let Some(value) = value {
                doc.push_str(&format!("{}: {}\n", label, value));
            }
        }
        if !self.requirements.is_empty() {
            doc.push_str(&format!("Requirements: {}\n", self.requirements.join("; ")));
        }
        if !self.highlights.is_empty() {
            doc.push_str(&format!("Highlights: {}\n", self.highlights.join("; ")));
        }
        if let Some(description) = &self.description {
            doc.push_str(&format!("\n{}\n", description));
        }
        doc
    }
}

/// A program as produced by the LLM, with the match data for the requesting user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewProgram {
    pub name: String,
    pub institution: String,
    #[serde(default)]
    pub degree_type: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub cost: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub application_deadline: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub match_score: f64,
    #[serde(default)]
    pub match_reasons: Vec<String>,
}

/// The per-user join record pointing at a program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub pathway_id: Option<Uuid>,
    pub match_score: f64,
    pub match_reasons: Vec<String>,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub program: Program,
}

//=========================================================================================
// Applications
//=========================================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Planning,
    InProgress,
    Submitted,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Planning => "planning",
            ApplicationStatus::InProgress => "in_progress",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "planning" => Some(ApplicationStatus::Planning),
            "in_progress" => Some(ApplicationStatus::InProgress),
            "submitted" => Some(ApplicationStatus::Submitted),
            "accepted" => Some(ApplicationStatus::Accepted),
            "rejected" => Some(ApplicationStatus::Rejected),
            "withdrawn" => Some(ApplicationStatus::Withdrawn),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

/// A milestone in an application's timeline. Stored as an element of a JSON array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineEvent {
    pub title: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub user_id: Uuid,
    pub recommendation_id: Uuid,
    pub status: ApplicationStatus,
    pub deadline: Option<NaiveDate>,
    pub notes: Option<String>,
    pub timeline: Vec<TimelineEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The fields required to insert a new application row.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub id: Uuid,
    pub user_id: Uuid,
    pub recommendation_id: Uuid,
    pub deadline: Option<NaiveDate>,
    pub notes: Option<String>,
    pub timeline: Vec<TimelineEvent>,
}

/// A partial update to an application's own fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationUpdate {
    pub status: Option<ApplicationStatus>,
    pub deadline: Option<NaiveDate>,
    pub notes: Option<String>,
    pub timeline: Option<Vec<TimelineEvent>>,
}

impl ApplicationUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.deadline.is_none()
            && self.notes.is_none()
            && self.timeline.is_none()
    }
}

/// A checklist item belonging to an application, ordered by `position`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationTask {
    pub id: Uuid,
    pub application_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: TaskStatus,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// A task in an LLM-generated plan, before it is stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// The plan the LLM produces for a recommendation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ApplicationPlan {
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub tasks: Vec<PlannedTask>,
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
}

/// An application together with its ordered tasks.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationState {
    pub application: Application,
    pub tasks: Vec<ApplicationTask>,
}

//=========================================================================================
// Conversations
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            "system" => Some(MessageRole::System),
            _ => None,
        }
    }
}

/// A single entry in a conversation's ordered message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    /// The upstream item id when the message came out of a streamed response.
    pub item_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_profile_fields_do_not_count() {
        let update = ProfileUpdate {
            first_name: Some("".to_string()),
            location: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(update.is_empty());
        assert!(update.normalized().first_name.is_none());
    }

    #[test]
    fn normalizing_keeps_filled_fields_trimmed() {
        let update = ProfileUpdate {
            first_name: Some(" Ada ".to_string()),
            bio: Some("".to_string()),
            ..Default::default()
        }
        .normalized();
        assert!(!update.is_empty());
        assert_eq!(update.first_name.as_deref(), Some("Ada"));
        assert!(update.bio.is_none());
    }
}
