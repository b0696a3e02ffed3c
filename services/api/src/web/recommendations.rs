//! services/api/src/web/recommendations.rs
//!
//! Pathway and recommendation endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use vista_core::domain::{Pathway, Recommendation};

use crate::error::{ApiResult, ErrorResponse};
use crate::web::state::AppState;
use crate::workflows::recommendations;

#[derive(Deserialize, ToSchema)]
pub struct GenerateRecommendationsRequest {
    pub pathway_id: Uuid,
}

#[derive(Serialize)]
pub struct RecommendationsResponse {
    pub recommendations: Vec<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct FavoriteRequest {
    pub is_favorite: bool,
}

#[utoipa::path(
    post,
    path = "/pathways/generate",
    responses(
        (status = 200, description = "Generated pathways"),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "No profile", body = ErrorResponse),
        (status = 500, description = "Generation failed", body = ErrorResponse)
    )
)]
pub async fn generate_pathways_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<Vec<Pathway>>> {
    Ok(Json(recommendations::generate_pathways(&state, user_id).await?))
}

#[utoipa::path(
    get,
    path = "/pathways",
    responses(
        (status = 200, description = "The caller's pathways, newest first"),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn list_pathways_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<Vec<Pathway>>> {
    Ok(Json(state.db.list_pathways(user_id).await?))
}

/// Generates and stores program recommendations for one pathway.
///
/// Answers 207 with a `warning` when the recommendations were stored but could
/// not be indexed for file search.
#[utoipa::path(
    post,
    path = "/recommendations/generate",
    request_body = GenerateRecommendationsRequest,
    responses(
        (status = 200, description = "Recommendations stored and indexed"),
        (status = 207, description = "Recommendations stored, indexing failed"),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Unknown pathway", body = ErrorResponse)
    )
)]
pub async fn generate_recommendations_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<GenerateRecommendationsRequest>,
) -> ApiResult<impl IntoResponse> {
    let batch = recommendations::generate_recommendations(&state, user_id, req.pathway_id).await?;
    let status = if batch.sync_warning.is_some() {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(RecommendationsResponse {
            recommendations: batch.recommendations,
            warning: batch.sync_warning,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/recommendations",
    responses(
        (status = 200, description = "The caller's recommendations, best match first"),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn list_recommendations_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<Vec<Recommendation>>> {
    Ok(Json(state.db.list_recommendations(user_id).await?))
}

#[utoipa::path(
    patch,
    path = "/recommendations/{id}/favorite",
    params(("id" = Uuid, Path, description = "Recommendation id")),
    request_body = FavoriteRequest,
    responses(
        (status = 200, description = "Updated recommendation"),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Unknown recommendation", body = ErrorResponse)
    )
)]
pub async fn set_favorite_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(recommendation_id): Path<Uuid>,
    Json(req): Json<FavoriteRequest>,
) -> ApiResult<Json<Recommendation>> {
    Ok(Json(
        state
            .db
            .set_favorite(user_id, recommendation_id, req.is_favorite)
            .await?,
    ))
}
