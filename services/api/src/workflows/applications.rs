//! services/api/src/workflows/applications.rs
//!
//! Turning a recommendation into an application: plan generation, the dependent
//! inserts (application row, then its ordered tasks), and task maintenance.

use crate::web::state::AppState;
use serde::Serialize;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use vista_core::domain::{ApplicationPlan, ApplicationState, ApplicationTask, NewApplication, Recommendation};
use vista_core::ports::{DatabaseService, PortError, PortResult};
use vista_core::tasks::TaskUpdate;

/// The `{success, application_id | error}` body sent to the browser by the
/// application routes.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PlanOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlanOutcome {
    pub fn created(application_id: Uuid) -> Self {
        Self {
            success: true,
            application_id: Some(application_id),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            application_id: None,
            error: Some(error.into()),
        }
    }
}

/// Inserts the application and then its tasks.
///
/// If the tasks cannot be stored the application row is deleted again, so a
/// failed outcome never leaves a half-built application behind.
pub async fn create_application_with_plan(
    db: &dyn DatabaseService,
    user_id: Uuid,
    recommendation_id: Uuid,
    plan: &ApplicationPlan,
) -> PlanOutcome {
    let new_application = NewApplication {
        id: Uuid::new_v4(),
        user_id,
        recommendation_id,
        deadline: plan.deadline,
        notes: plan.summary.clone(),
        timeline: plan.timeline.clone(),
    };

    let application = match db.insert_application(new_application).await {
        Ok(application) => application,
        Err(e) => {
            error!("Failed to insert application for user {}: {}", user_id, e);
            return PlanOutcome::failed(e.to_string());
        }
    };

    if !plan.tasks.is_empty() {
        if let Err(e) = db.insert_application_tasks(application.id, &plan.tasks).await {
            error!(
                "Failed to insert tasks for application {}: {}. Rolling back.",
                application.id, e
            );
            if let Err(undo) = db.delete_application(user_id, application.id).await {
                error!(
                    "Failed to roll back application {} after task failure: {}",
                    application.id, undo
                );
            }
            return PlanOutcome::failed(e.to_string());
        }
    }

    info!(
        "Created application {} with {} tasks for user {}",
        application.id,
        plan.tasks.len(),
        user_id
    );
    PlanOutcome::created(application.id)
}

/// Loads an application owned by `user_id` together with its tasks in order.
pub async fn get_application_state(
    db: &dyn DatabaseService,
    user_id: Uuid,
    application_id: Uuid,
) -> PortResult<ApplicationState> {
    let application = db.get_application(user_id, application_id).await?;
    let mut tasks = db.list_application_tasks(application.id).await?;
    tasks.sort_by_key(|t| t.position);
    Ok(ApplicationState { application, tasks })
}

/// Applies the non-empty fields of `update` to a task of one of the user's applications.
pub async fn update_application_task(
    db: &dyn DatabaseService,
    user_id: Uuid,
    application_id: Uuid,
    task_id: Uuid,
    update: TaskUpdate,
) -> PortResult<ApplicationTask> {
    let patch = update.into_patch()?;
    db.get_application(user_id, application_id).await?;
    db.update_application_task(application_id, task_id, &patch)
        .await
}

/// Picks the recommendation to plan for: the requested one, else the user's latest favorite.
pub async fn resolve_recommendation(
    db: &dyn DatabaseService,
    user_id: Uuid,
    requested: Option<Uuid>,
) -> PortResult<Recommendation> {
    match requested {
        Some(id) => db.get_recommendation(user_id, id).await,
        None => db
            .latest_favorite_recommendation(user_id)
            .await?
            .ok_or_else(|| {
                PortError::InvalidInput(
                    "recommendation_id is required when no favorite recommendation exists"
                        .to_string(),
                )
            }),
    }
}

/// The whole "plan an application" flow behind `POST /applications/plan`.
pub async fn plan_application(
    state: &AppState,
    user_id: Uuid,
    requested: Option<Uuid>,
) -> PortResult<PlanOutcome> {
    let db = state.db.as_ref();
    let recommendation = resolve_recommendation(db, user_id, requested).await?;

    let profile_summary = match db.get_profile(user_id).await {
        Ok(profile) => profile.summary(),
        Err(e) => {
            warn!("Planning without profile for user {}: {}", user_id, e);
            String::new()
        }
    };

    let plan = state
        .plan_llm
        .generate_plan(&profile_summary, &recommendation)
        .await?;

    Ok(create_application_with_plan(db, user_id, recommendation.id, &plan).await)
}
