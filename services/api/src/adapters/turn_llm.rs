//! services/api/src/adapters/turn_llm.rs
//!
//! This module contains the adapter for the conversational assistant's streaming turns.
//! It implements the `TurnStreamService` port from the `core` crate on top of the
//! Responses API streaming endpoint.

const ADVISER_INSTRUCTIONS: &str = r#"You are Vista, a friendly education and career adviser.

Your role:
- Help the user explore education pathways, concrete programs, and the steps needed to apply.
- Ground your advice in the user's profile when one is provided below.
- Use the file search tool to look up the user's saved programs and uploaded documents before guessing about them.
- Use web search for current information: tuition, deadlines, admission statistics, scholarships.
- Use the provided functions to read or change the user's data (favorites, applications) instead of describing how the user could do it.

Style:
- Be warm, concrete and concise. Prefer short paragraphs and short lists.
- When you recommend a program, say why it fits this user.
- If you are unsure about a fact such as a deadline, say so and suggest where to verify it."#;

use async_openai::{config::OpenAIConfig, error::OpenAIError, Client};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;
use vista_core::ports::{EventStream, PortResult, TurnStreamService};
use vista_core::turn::TurnRequest;

use super::port_error;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TurnStreamService` using the OpenAI Responses API.
#[derive(Clone)]
pub struct OpenAiTurnAdapter {
    client: Client<OpenAIConfig>,
}

impl OpenAiTurnAdapter {
    /// Creates a new `OpenAiTurnAdapter`.
    pub fn new(client: Client<OpenAIConfig>) -> Self {
        Self { client }
    }

    fn build_request(model: &str, request: &TurnRequest, context: Option<&str>) -> Value {
        let mut instructions = ADVISER_INSTRUCTIONS.to_string();
        if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
            instructions.push_str("\n\nUSER PROFILE:\n");
            instructions.push_str(context);
        }

        let mut body = json!({
            "model": model,
            "instructions": instructions,
            "input": request.input_items(),
            "tools": request.sanitized_tools(),
            "parallel_tool_calls": false,
            "stream": true,
        });
        if let Some(previous) = &request.previous_response_id {
            body["previous_response_id"] = json!(previous);
        }
        body
    }
}

//=========================================================================================
// `TurnStreamService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TurnStreamService for OpenAiTurnAdapter {
    async fn stream_turn(
        &self,
        model: &str,
        request: &TurnRequest,
        context: Option<&str>,
    ) -> PortResult<EventStream> {
        let body = Self::build_request(model, request, context);
        debug!("Opening streaming turn on {}", model);

        let mut upstream = self
            .client
            .responses()
            .create_stream_byot(body)
            .await
            .map_err(port_error)?;

        // HTTP-level failures (including 429) surface as the first stream item, so
        // read it here to fail the call before anything is relayed.
        let first: Option<Result<Value, OpenAIError>> = upstream.next().await;
        let first = match first {
            None => return Ok(Box::pin(futures::stream::empty())),
            Some(Err(e)) => return Err(port_error(e)),
            Some(Ok(event)) => event,
        };

        let rest = upstream.map(|item: Result<Value, OpenAIError>| item.map_err(port_error));
        Ok(Box::pin(
            futures::stream::once(async move { Ok(first) }).chain(rest),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vista_core::turn::{ToolDescriptor, TurnMessage};

    #[test]
    fn request_carries_sanitized_tools_and_continuation() {
        let request = TurnRequest {
            messages: vec![TurnMessage::user("Which programs fit me?")],
            tools: vec![
                ToolDescriptor::FileSearch {
                    vector_store_ids: vec![],
                },
                ToolDescriptor::WebSearch {
                    user_location: None,
                },
            ],
            previous_response_id: Some("resp_1".to_string()),
            ..Default::default()
        };
        let body = OpenAiTurnAdapter::build_request("gpt-4.1", &request, Some("Name: Ada"));

        assert_eq!(body["model"], "gpt-4.1");
        assert_eq!(body["stream"], true);
        assert_eq!(body["previous_response_id"], "resp_1");
        assert_eq!(body["tools"], json!([{"type": "web_search"}]));
        assert!(body["instructions"].as_str().unwrap().ends_with("Name: Ada"));
        assert_eq!(body["input"][0]["content"], "Which programs fit me?");
    }
}
