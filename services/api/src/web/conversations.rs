//! services/api/src/web/conversations.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use vista_core::domain::{ChatMessage, Conversation};

use crate::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::state::AppState;
use crate::workflows::{assistant, conversations};

#[derive(Deserialize, ToSchema, Default)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct PostMessageRequest {
    pub content: String,
}

#[utoipa::path(
    get,
    path = "/conversations",
    responses(
        (status = 200, description = "The caller's conversations, most recent first"),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn list_conversations_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<Vec<Conversation>>> {
    Ok(Json(state.db.list_conversations(user_id).await?))
}

#[utoipa::path(
    post,
    path = "/conversations",
    request_body = CreateConversationRequest,
    responses(
        (status = 201, description = "Conversation created"),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn create_conversation_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateConversationRequest>,
) -> ApiResult<(StatusCode, Json<Conversation>)> {
    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let conversation = state.db.create_conversation(user_id, title).await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

#[utoipa::path(
    delete,
    path = "/conversations/{id}",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 204, description = "Conversation deleted"),
        (status = 404, description = "Unknown conversation", body = ErrorResponse)
    )
)]
pub async fn delete_conversation_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(conversation_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .db
        .delete_conversation(user_id, conversation_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/conversations/{id}/messages",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Messages in order"),
        (status = 404, description = "Unknown conversation", body = ErrorResponse)
    )
)]
pub async fn list_messages_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(conversation_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let conversation = state.db.get_conversation(user_id, conversation_id).await?;
    Ok(Json(state.db.list_chat_messages(conversation.id).await?))
}

/// Stores a user message without running the assistant.
#[utoipa::path(
    post,
    path = "/conversations/{id}/messages",
    params(("id" = Uuid, Path, description = "Conversation id")),
    request_body = PostMessageRequest,
    responses(
        (status = 201, description = "Message stored"),
        (status = 400, description = "Empty message", body = ErrorResponse),
        (status = 404, description = "Unknown conversation", body = ErrorResponse)
    )
)]
pub async fn post_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<PostMessageRequest>,
) -> ApiResult<(StatusCode, Json<ChatMessage>)> {
    if req.content.trim().is_empty() {
        return Err(ApiError::BadRequest("Message must not be empty".to_string()));
    }
    let conversation = state.db.get_conversation(user_id, conversation_id).await?;
    let message = conversations::record_user_message(&state, &conversation, &req.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Sends a user message and runs the assistant to completion on the server,
/// executing function calls locally and storing the replies.
#[utoipa::path(
    post,
    path = "/conversations/{id}/assistant_turn",
    params(("id" = Uuid, Path, description = "Conversation id")),
    request_body = PostMessageRequest,
    responses(
        (status = 200, description = "Stored replies and the accumulated stream items"),
        (status = 400, description = "Empty message", body = ErrorResponse),
        (status = 404, description = "Unknown conversation", body = ErrorResponse),
        (status = 500, description = "Upstream failure", body = ErrorResponse)
    )
)]
pub async fn assistant_turn_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<PostMessageRequest>,
) -> ApiResult<Json<assistant::AssistantTurn>> {
    let turn = assistant::run_assistant_turn(&state, user_id, conversation_id, &req.content).await?;
    Ok(Json(turn))
}
