//! services/api/src/workflows/turn.rs
//!
//! Shared plumbing for opening an upstream turn: model fallback, the turn
//! deadline, and the per-user context injected into the adviser prompt.

use crate::config::Config;
use crate::web::state::AppState;
use futures::StreamExt;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;
use vista_core::ports::{EventStream, PortError, PortResult};
use vista_core::turn::{ToolDescriptor, TurnRequest};

/// Opens a turn on the primary model, retrying once on the fallback model
/// when the primary is rate limited.
pub async fn open_turn(
    state: &AppState,
    request: &TurnRequest,
    context: Option<&str>,
) -> PortResult<EventStream> {
    let config = &state.config;
    match state
        .turn_llm
        .stream_turn(&config.primary_model, request, context)
        .await
    {
        Err(PortError::RateLimited(reason)) => {
            warn!(
                "Model {} rate limited ({}), retrying on {}",
                config.primary_model, reason, config.fallback_model
            );
            state
                .turn_llm
                .stream_turn(&config.fallback_model, request, context)
                .await
        }
        other => other,
    }
}

/// Ends `stream` with an error once `limit` has elapsed since this call.
pub fn with_deadline(mut stream: EventStream, limit: Duration) -> EventStream {
    let deadline = tokio::time::Instant::now() + limit;
    Box::pin(async_stream::stream! {
        loop {
            match tokio::time::timeout_at(deadline, stream.next()).await {
                Ok(Some(item)) => {
                    let failed = item.is_err();
                    yield item;
                    if failed {
                        break;
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    yield Err(PortError::Unexpected(format!(
                        "Turn exceeded the {}s deadline",
                        limit.as_secs()
                    )));
                    break;
                }
            }
        }
    })
}

/// What we know about the user that is worth telling the model.
#[derive(Debug, Default)]
pub struct TurnContext {
    pub summary: Option<String>,
    pub vector_store_id: Option<String>,
}

/// Fetches the profile and the favorite recommendations concurrently.
/// A failing branch is logged and left out.
pub async fn load_turn_context(state: &AppState, user_id: Uuid) -> TurnContext {
    let (profile, recommendations) = tokio::join!(
        state.db.get_profile(user_id),
        state.db.list_recommendations(user_id)
    );

    let mut sections = Vec::new();
    let mut vector_store_id = None;

    match profile {
        Ok(profile) => {
            let summary = profile.summary();
            if !summary.is_empty() {
                sections.push(summary);
            }
            vector_store_id = profile.vector_store_id;
        }
        Err(e) => warn!("No profile context for user {}: {}", user_id, e),
    }

    match recommendations {
        Ok(recommendations) => {
            let favorites = recommendations
                .iter()
                .filter(|r| r.is_favorite)
                .map(|r| format!("- {} at {}", r.program.name, r.program.institution))
                .collect::<Vec<_>>();
            if !favorites.is_empty() {
                sections.push(format!("Favorite programs:\n{}", favorites.join("\n")));
            }
        }
        Err(e) => warn!("No recommendation context for user {}: {}", user_id, e),
    }

    TurnContext {
        summary: (!sections.is_empty()).then(|| sections.join("\n\n")),
        vector_store_id,
    }
}

/// Removes the hosted tools that are switched off in the configuration.
pub fn apply_tool_flags(config: &Config, tools: Vec<ToolDescriptor>) -> Vec<ToolDescriptor> {
    tools
        .into_iter()
        .filter(|tool| match tool {
            ToolDescriptor::WebSearch { .. } => config.enable_web_search,
            ToolDescriptor::FileSearch { .. } => config.enable_file_search,
            ToolDescriptor::Function { .. } => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn deadline_ends_a_stalled_stream_with_an_error() {
        let first: Vec<PortResult<serde_json::Value>> = vec![Ok(json!({"type": "response.created"}))];
        let stalled: EventStream =
            Box::pin(futures::stream::iter(first).chain(futures::stream::pending()));
        let mut events = with_deadline(stalled, Duration::from_millis(20));

        assert!(matches!(events.next().await, Some(Ok(_))));
        assert!(matches!(events.next().await, Some(Err(PortError::Unexpected(_)))));
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn deadline_passes_finished_streams_through() {
        let events: Vec<PortResult<serde_json::Value>> = vec![Ok(json!({"n": 1})), Ok(json!({"n": 2}))];
        let finished: EventStream = Box::pin(futures::stream::iter(events));
        let collected: Vec<_> = with_deadline(finished, Duration::from_secs(5))
            .collect()
            .await;
        assert_eq!(collected.len(), 2);
        assert!(collected.iter().all(Result::is_ok));
    }

    #[test]
    fn disabled_hosted_tools_are_removed() {
        let mut config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/test".to_string()),
            _ => None,
        })
        .unwrap();
        config.enable_web_search = false;

        let tools = vec![
            ToolDescriptor::WebSearch {
                user_location: None,
            },
            ToolDescriptor::FileSearch {
                vector_store_ids: vec!["vs_1".to_string()],
            },
            ToolDescriptor::function("get_profile", "Profile", json!({})),
        ];
        let kept = apply_tool_flags(&config, tools);
        assert_eq!(kept.len(), 2);
        assert!(!kept
            .iter()
            .any(|t| matches!(t, ToolDescriptor::WebSearch { .. })));
    }
}
