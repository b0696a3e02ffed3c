//! services/api/src/web/profile.rs

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use vista_core::domain::{Profile, ProfileUpdate};

use crate::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::state::AppState;
use crate::workflows::accounts;

/// Body of `PUT /profile`. Absent or blank fields keep their stored value.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub location: Option<String>,
    pub bio: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub education: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub preferences: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub documents: Option<Value>,
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(req: UpdateProfileRequest) -> Self {
        ProfileUpdate {
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            phone: req.phone,
            date_of_birth: req.date_of_birth,
            location: req.location,
            bio: req.bio,
            education: req.education,
            preferences: req.preferences,
            documents: req.documents,
        }
        .normalized()
    }
}

#[derive(Serialize, ToSchema)]
pub struct DeleteProfileResponse {
    pub deleted: bool,
    pub warnings: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "The caller's profile"),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "No profile", body = ErrorResponse)
    )
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(state.db.get_profile(user_id).await?))
}

#[utoipa::path(
    put,
    path = "/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile"),
        (status = 400, description = "Nothing to update", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<Profile>> {
    let update = ProfileUpdate::from(req);
    if update.is_empty() {
        return Err(ApiError::BadRequest("No profile fields to update".to_string()));
    }
    Ok(Json(state.db.update_profile(user_id, &update).await?))
}

/// Deletes the account and everything it owns.
///
/// Answers 207 when the rows are gone but the hosted search index could not be removed.
#[utoipa::path(
    delete,
    path = "/profile",
    responses(
        (status = 200, description = "Account deleted", body = DeleteProfileResponse),
        (status = 207, description = "Account deleted, search index cleanup failed", body = DeleteProfileResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn delete_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let warnings = accounts::delete_account(&state, user_id).await?;
    let status = if warnings.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((
        status,
        Json(DeleteProfileResponse {
            deleted: true,
            warnings,
        }),
    ))
}

/// Uploads a profile document (CV, transcript) and indexes it for file search.
#[utoipa::path(
    post,
    path = "/profile/document",
    request_body(content_type = "multipart/form-data", description = "The document to upload."),
    responses(
        (status = 200, description = "Document stored"),
        (status = 400, description = "Missing file", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn upload_profile_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<Json<Profile>> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart data: {}", e)))?
        .ok_or_else(|| ApiError::BadRequest("Multipart form must include a file".to_string()))?;

    let file_name = field.file_name().unwrap_or("profile.txt").to_string();
    let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read file bytes: {}", e)))?;
    if data.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }

    let profile =
        accounts::replace_profile_document(&state, user_id, &file_name, data.to_vec()).await?;
    Ok(Json(profile))
}
