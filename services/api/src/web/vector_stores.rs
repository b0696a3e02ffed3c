//! services/api/src/web/vector_stores.rs
//!
//! Proxy routes over the hosted vector store API. Every store is shared under
//! one server-side key, so a caller may only touch the store recorded on their
//! own profile.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use vista_core::ports::PortError;

use crate::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct CreateVectorStoreRequest {
    pub name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct AddFileRequest {
    pub file_id: String,
}

#[derive(Deserialize, ToSchema)]
pub struct FileBatchRequest {
    pub file_ids: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct IdResponse {
    pub id: String,
}

/// Fails with 404 unless `vector_store_id` is the caller's own store.
async fn ensure_owned(state: &AppState, user_id: Uuid, vector_store_id: &str) -> ApiResult<()> {
    let profile = state.db.get_profile(user_id).await?;
    if profile.vector_store_id.as_deref() == Some(vector_store_id) {
        Ok(())
    } else {
        Err(ApiError::NotFound(format!(
            "Vector store {} not found",
            vector_store_id
        )))
    }
}

/// Creates the caller's search index. A caller holds at most one.
#[utoipa::path(
    post,
    path = "/vector_stores",
    request_body = CreateVectorStoreRequest,
    responses(
        (status = 201, description = "Store created", body = IdResponse),
        (status = 400, description = "Missing name", body = ErrorResponse),
        (status = 409, description = "The caller already has a store", body = ErrorResponse)
    )
)]
pub async fn create_vector_store_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateVectorStoreRequest>,
) -> ApiResult<(StatusCode, Json<IdResponse>)> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    if let Some(existing) = state.db.get_profile(user_id).await?.vector_store_id {
        return Err(PortError::Conflict(format!(
            "Vector store {} already exists for this profile",
            existing
        ))
        .into());
    }

    let id = state.vector_stores.create_store(req.name.trim()).await?;
    state.db.set_profile_vector_store(user_id, Some(&id)).await?;
    info!("Created vector store {} for user {}", id, user_id);
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

#[utoipa::path(
    delete,
    path = "/vector_stores/{id}",
    params(("id" = String, Path, description = "Vector store id")),
    responses(
        (status = 204, description = "Store deleted"),
        (status = 404, description = "Unknown store", body = ErrorResponse)
    )
)]
pub async fn delete_vector_store_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(vector_store_id): Path<String>,
) -> ApiResult<StatusCode> {
    ensure_owned(&state, user_id, &vector_store_id).await?;
    state.vector_stores.delete_store(&vector_store_id).await?;
    state.db.set_profile_vector_store(user_id, None).await?;
    info!("Deleted vector store {} of user {}", vector_store_id, user_id);
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/vector_stores/{id}/files",
    params(("id" = String, Path, description = "Vector store id")),
    request_body = AddFileRequest,
    responses(
        (status = 204, description = "File attached"),
        (status = 404, description = "Unknown store or file", body = ErrorResponse)
    )
)]
pub async fn add_file_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(vector_store_id): Path<String>,
    Json(req): Json<AddFileRequest>,
) -> ApiResult<StatusCode> {
    ensure_owned(&state, user_id, &vector_store_id).await?;
    state
        .vector_stores
        .add_file(&vector_store_id, &req.file_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/vector_stores/{id}/files/{file_id}",
    params(
        ("id" = String, Path, description = "Vector store id"),
        ("file_id" = String, Path, description = "File id")
    ),
    responses(
        (status = 204, description = "File detached"),
        (status = 404, description = "Unknown store or file", body = ErrorResponse)
    )
)]
pub async fn remove_file_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path((vector_store_id, file_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    ensure_owned(&state, user_id, &vector_store_id).await?;
    state
        .vector_stores
        .remove_file(&vector_store_id, &file_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/vector_stores/{id}/file_batches",
    params(("id" = String, Path, description = "Vector store id")),
    request_body = FileBatchRequest,
    responses(
        (status = 201, description = "Batch created", body = IdResponse),
        (status = 400, description = "Empty file list", body = ErrorResponse),
        (status = 404, description = "Not the caller's store", body = ErrorResponse)
    )
)]
pub async fn add_file_batch_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(vector_store_id): Path<String>,
    Json(req): Json<FileBatchRequest>,
) -> ApiResult<(StatusCode, Json<IdResponse>)> {
    ensure_owned(&state, user_id, &vector_store_id).await?;
    if req.file_ids.is_empty() {
        return Err(ApiError::BadRequest("file_ids must not be empty".to_string()));
    }
    let id = state
        .vector_stores
        .add_files_batch(&vector_store_id, &req.file_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}
