//! services/api/src/web/turn_relay.rs
//!
//! `POST /turn_response`: relays one upstream streaming turn to the browser as
//! server-sent events, one `data: <event JSON>` frame per upstream event.

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;
use vista_core::ports::PortError;
use vista_core::turn::{FunctionOutput, ToolDescriptor, TurnMessage, TurnRequest};

use crate::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::state::AppState;
use crate::workflows::turn;

/// Body of `POST /turn_response`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TurnResponseRequest {
    /// `{role, content}` messages, oldest first.
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub messages: Vec<TurnMessage>,
    /// `{call_id, output}` results of the previous round's function calls.
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub function_outputs: Vec<FunctionOutput>,
    /// Tool descriptors in the provider's shape (`web_search`, `file_search`, `function`).
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub tools: Vec<ToolDescriptor>,
    #[serde(default)]
    pub previous_response_id: Option<String>,
}

impl From<TurnResponseRequest> for TurnRequest {
    fn from(req: TurnResponseRequest) -> Self {
        TurnRequest {
            messages: req.messages,
            function_outputs: req.function_outputs,
            tools: req.tools,
            previous_response_id: req.previous_response_id,
        }
    }
}

/// Formats one upstream event as an SSE frame.
pub fn sse_frame(event: &serde_json::Value) -> Bytes {
    Bytes::from(format!("data: {}\n\n", event))
}

/// Streams one assistant turn.
///
/// Failures before the first event answer 500 with a JSON error. A failure
/// after that aborts the response body.
#[utoipa::path(
    post,
    path = "/turn_response",
    request_body = TurnResponseRequest,
    responses(
        (status = 200, description = "text/event-stream of upstream events"),
        (status = 400, description = "No messages", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 500, description = "Upstream request failed", body = ErrorResponse)
    )
)]
pub async fn turn_response_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<TurnResponseRequest>,
) -> ApiResult<Response> {
    let req = TurnRequest::from(req);
    if req.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one message is required".to_string(),
        ));
    }

    let context = turn::load_turn_context(&state, user_id).await;
    let request = TurnRequest {
        tools: turn::apply_tool_flags(&state.config, req.tools),
        ..req
    };

    let upstream = turn::open_turn(&state, &request, context.summary.as_deref())
        .await
        .map_err(|e| {
            error!("Failed to open turn for user {}: {}", user_id, e);
            ApiError::Internal(e.to_string())
        })?;
    let mut events = turn::with_deadline(upstream, state.config.turn_timeout);
    info!("Relaying turn for user {}", user_id);

    let body = Body::from_stream(async_stream::stream! {
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => yield Ok::<Bytes, PortError>(sse_frame(&event)),
                Err(e) => {
                    error!("Turn stream for user {} failed: {}", user_id, e);
                    yield Err(e);
                    break;
                }
            }
        }
    });

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}
