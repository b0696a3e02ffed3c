//! services/api/src/web/applications.rs
//!
//! Application planning and tracking endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;
use vista_core::domain::{
    Application, ApplicationStatus, ApplicationTask, ApplicationUpdate, TimelineEvent,
};
use vista_core::ports::PortError;
use vista_core::tasks::TaskUpdate;

use crate::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::state::AppState;
use crate::workflows::applications::{self, PlanOutcome};

#[derive(Deserialize, ToSchema, Default)]
pub struct PlanApplicationRequest {
    /// Defaults to the caller's most recent favorite recommendation.
    #[serde(default)]
    pub recommendation_id: Option<Uuid>,
}

/// Body of `PATCH /applications/{id}`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateApplicationRequest {
    #[schema(value_type = Option<String>, example = "submitted")]
    pub status: Option<ApplicationStatus>,
    pub deadline: Option<NaiveDate>,
    pub notes: Option<String>,
    #[schema(value_type = Option<Vec<Object>>)]
    pub timeline: Option<Vec<TimelineEvent>>,
}

impl From<UpdateApplicationRequest> for ApplicationUpdate {
    fn from(req: UpdateApplicationRequest) -> Self {
        ApplicationUpdate {
            status: req.status,
            deadline: req.deadline,
            notes: req.notes.filter(|n| !n.trim().is_empty()),
            timeline: req.timeline,
        }
    }
}

/// Body of `PATCH /applications/{id}/tasks/{task_id}`. Blank fields are ignored.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    /// `YYYY-MM-DD`
    pub due_date: Option<String>,
    #[schema(example = "completed")]
    pub status: Option<String>,
}

impl From<UpdateTaskRequest> for TaskUpdate {
    fn from(req: UpdateTaskRequest) -> Self {
        TaskUpdate {
            title: req.title,
            description: req.description,
            due_date: req.due_date,
            status: req.status,
        }
    }
}

/// Generates a plan for a recommendation and stores it as a new application.
#[utoipa::path(
    post,
    path = "/applications/plan",
    request_body = PlanApplicationRequest,
    responses(
        (status = 200, description = "Application created", body = PlanOutcome),
        (status = 400, description = "No recommendation given or inferable", body = PlanOutcome),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Unknown recommendation", body = PlanOutcome),
        (status = 500, description = "Planning or storage failed", body = PlanOutcome)
    )
)]
pub async fn plan_application_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<PlanApplicationRequest>,
) -> impl IntoResponse {
    match applications::plan_application(&state, user_id, req.recommendation_id).await {
        Ok(outcome) if outcome.success => (StatusCode::OK, Json(outcome)),
        Ok(outcome) => (StatusCode::INTERNAL_SERVER_ERROR, Json(outcome)),
        Err(e) => {
            let status = match &e {
                PortError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                PortError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => {
                    error!("Failed to plan application for user {}: {}", user_id, e);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            (status, Json(PlanOutcome::failed(e.to_string())))
        }
    }
}

#[utoipa::path(
    get,
    path = "/applications",
    responses(
        (status = 200, description = "The caller's applications"),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn list_applications_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<Vec<Application>>> {
    Ok(Json(state.db.list_applications(user_id).await?))
}

#[utoipa::path(
    get,
    path = "/applications/{id}",
    params(("id" = Uuid, Path, description = "Application id")),
    responses(
        (status = 200, description = "The application and its ordered tasks"),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Unknown application", body = PlanOutcome)
    )
)]
pub async fn get_application_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(application_id): Path<Uuid>,
) -> Response {
    match applications::get_application_state(state.db.as_ref(), user_id, application_id).await {
        Ok(application_state) => Json(application_state).into_response(),
        Err(e @ PortError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, Json(PlanOutcome::failed(e.to_string()))).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[utoipa::path(
    patch,
    path = "/applications/{id}",
    params(("id" = Uuid, Path, description = "Application id")),
    request_body = UpdateApplicationRequest,
    responses(
        (status = 200, description = "Updated application"),
        (status = 400, description = "Nothing to update", body = ErrorResponse),
        (status = 404, description = "Unknown application", body = ErrorResponse)
    )
)]
pub async fn update_application_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(application_id): Path<Uuid>,
    Json(req): Json<UpdateApplicationRequest>,
) -> ApiResult<Json<Application>> {
    let update = ApplicationUpdate::from(req);
    if update.is_empty() {
        return Err(ApiError::BadRequest(
            "No application fields to update".to_string(),
        ));
    }
    Ok(Json(
        state
            .db
            .update_application(user_id, application_id, &update)
            .await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/applications/{id}",
    params(("id" = Uuid, Path, description = "Application id")),
    responses(
        (status = 204, description = "Application deleted"),
        (status = 404, description = "Unknown application", body = ErrorResponse)
    )
)]
pub async fn delete_application_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(application_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.db.delete_application(user_id, application_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    patch,
    path = "/applications/{id}/tasks/{task_id}",
    params(
        ("id" = Uuid, Path, description = "Application id"),
        ("task_id" = Uuid, Path, description = "Task id")
    ),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Updated task"),
        (status = 400, description = "No usable fields", body = ErrorResponse),
        (status = 404, description = "Unknown application or task", body = ErrorResponse)
    )
)]
pub async fn update_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path((application_id, task_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<ApplicationTask>> {
    let task = applications::update_application_task(
        state.db.as_ref(),
        user_id,
        application_id,
        task_id,
        req.into(),
    )
    .await?;
    Ok(Json(task))
}
