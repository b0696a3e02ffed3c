//! services/api/src/workflows/conversations.rs

use crate::web::state::AppState;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;
use vista_core::domain::{ChatMessage, Conversation, MessageRole};
use vista_core::ports::PortResult;

/// Stores a user message. The first user message of an untitled conversation
/// also kicks off title generation in the background.
pub async fn record_user_message(
    state: &Arc<AppState>,
    conversation: &Conversation,
    content: &str,
) -> PortResult<ChatMessage> {
    let first = conversation.title.is_none()
        && !state
            .db
            .list_chat_messages(conversation.id)
            .await?
            .iter()
            .any(|m| m.role == MessageRole::User);

    let message = state
        .db
        .insert_chat_message(conversation.id, MessageRole::User, content, None)
        .await?;

    if first {
        spawn_title_generation(state.clone(), conversation.id, content.to_string());
    }
    Ok(message)
}

fn spawn_title_generation(state: Arc<AppState>, conversation_id: Uuid, text: String) {
    tokio::spawn(async move {
        match state.title_adapter.generate_title_from_text(&text).await {
            Ok(title) => match state.db.set_conversation_title(conversation_id, &title).await {
                Ok(true) => info!("Titled conversation {}: {}", conversation_id, title),
                Ok(false) => debug!("Conversation {} was already titled", conversation_id),
                Err(e) => error!("Failed to save title for {}: {}", conversation_id, e),
            },
            Err(e) => error!("Failed to generate title for {}: {}", conversation_id, e),
        }
    });
}
