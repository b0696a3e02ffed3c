//! services/api/src/workflows/assistant.rs
//!
//! Server-driven assistant turns. The upstream event stream is folded through a
//! `StreamAccumulator`; finished assistant messages are persisted, local
//! functions are executed when their arguments complete, and their outputs are
//! fed back in follow-up rounds until the model stops calling functions.

use crate::web::state::AppState;
use crate::workflows::{conversations, turn};
use futures::StreamExt;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use vista_core::accumulator::{AccumulatedItem, AccumulatorEffect, StreamAccumulator};
use vista_core::domain::{ChatMessage, MessageRole};
use vista_core::ports::{PortError, PortResult};
use vista_core::turn::{ToolDescriptor, TurnMessage, TurnRequest};

/// Upper bound on upstream requests for a single user message.
pub const MAX_TOOL_ROUNDS: usize = 5;

/// Everything a completed assistant turn produced.
#[derive(Debug, Serialize)]
pub struct AssistantTurn {
    pub response_id: Option<String>,
    pub rounds: usize,
    /// Assistant messages stored during this turn, in order.
    pub messages: Vec<ChatMessage>,
    pub items: Vec<AccumulatedItem>,
}

//=========================================================================================
// Local Functions
//=========================================================================================

/// The functions the model may call during a server-driven turn, bound to one user.
pub struct FunctionRegistry<'a> {
    state: &'a AppState,
    user_id: Uuid,
}

impl<'a> FunctionRegistry<'a> {
    pub fn new(state: &'a AppState, user_id: Uuid) -> Self {
        Self { state, user_id }
    }

    pub fn descriptors() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::function(
                "get_profile",
                "Returns the user's profile: name, location, education and preferences.",
                json!({"type": "object", "properties": {}}),
            ),
            ToolDescriptor::function(
                "list_recommendations",
                "Lists the programs recommended to the user.",
                json!({
                    "type": "object",
                    "properties": {
                        "favorites_only": {"type": "boolean", "description": "Only return favorites."}
                    }
                }),
            ),
            ToolDescriptor::function(
                "toggle_favorite",
                "Marks or unmarks a recommendation as a favorite.",
                json!({
                    "type": "object",
                    "properties": {
                        "recommendation_id": {"type": "string"},
                        "is_favorite": {"type": "boolean"}
                    },
                    "required": ["recommendation_id", "is_favorite"]
                }),
            ),
            ToolDescriptor::function(
                "list_applications",
                "Lists the user's applications with their status and deadline.",
                json!({"type": "object", "properties": {}}),
            ),
        ]
    }

    pub async fn call(&self, name: &str, arguments: &Value) -> PortResult<Value> {
        let db = &self.state.db;
        match name {
            "get_profile" => {
                let profile = db.get_profile(self.user_id).await?;
                Ok(json!({
                    "first_name": profile.first_name,
                    "last_name": profile.last_name,
                    "location": profile.location,
                    "bio": profile.bio,
                    "education": profile.education,
                    "preferences": profile.preferences,
                }))
            }
            "list_recommendations" => {
                let favorites_only = arguments["favorites_only"].as_bool().unwrap_or(false);
                let recommendations = db.list_recommendations(self.user_id).await?;
                let listed = recommendations
                    .iter()
                    .filter(|r| !favorites_only || r.is_favorite)
                    .map(|r| {
                        json!({
                            "recommendation_id": r.id,
                            "program": r.program.name,
                            "institution": r.program.institution,
                            "match_score": r.match_score,
                            "is_favorite": r.is_favorite,
                        })
                    })
                    .collect::<Vec<_>>();
                Ok(Value::Array(listed))
            }
            "toggle_favorite" => {
                let recommendation_id = arguments["recommendation_id"]
                    .as_str()
                    .and_then(|s| Uuid::parse_str(s).ok())
                    .ok_or_else(|| {
                        PortError::InvalidInput("recommendation_id must be a UUID".to_string())
                    })?;
                let is_favorite = arguments["is_favorite"].as_bool().ok_or_else(|| {
                    PortError::InvalidInput("is_favorite must be a boolean".to_string())
                })?;
                let updated = db
                    .set_favorite(self.user_id, recommendation_id, is_favorite)
                    .await?;
                Ok(json!({
                    "recommendation_id": updated.id,
                    "is_favorite": updated.is_favorite,
                }))
            }
            "list_applications" => {
                let applications = db.list_applications(self.user_id).await?;
                let listed = applications
                    .iter()
                    .map(|a| {
                        json!({
                            "application_id": a.id,
                            "recommendation_id": a.recommendation_id,
                            "status": a.status.as_str(),
                            "deadline": a.deadline,
                        })
                    })
                    .collect::<Vec<_>>();
                Ok(Value::Array(listed))
            }
            other => Err(PortError::InvalidInput(format!("Unknown function: {}", other))),
        }
    }
}

//=========================================================================================
// The Driver
//=========================================================================================

/// Runs one user message through the model, persisting the assistant's replies.
pub async fn run_assistant_turn(
    state: &Arc<AppState>,
    user_id: Uuid,
    conversation_id: Uuid,
    user_message: &str,
) -> PortResult<AssistantTurn> {
    if user_message.trim().is_empty() {
        return Err(PortError::InvalidInput("Message must not be empty".to_string()));
    }

    let conversation = state.db.get_conversation(user_id, conversation_id).await?;
    let history = state.db.list_chat_messages(conversation.id).await?;
    conversations::record_user_message(state, &conversation, user_message).await?;

    let context = turn::load_turn_context(state, user_id).await;
    let mut tools = vec![
        ToolDescriptor::WebSearch {
            user_location: None,
        },
        ToolDescriptor::FileSearch {
            vector_store_ids: context.vector_store_id.iter().cloned().collect(),
        },
    ];
    tools.extend(FunctionRegistry::descriptors());
    let tools = turn::apply_tool_flags(&state.config, tools);

    let mut messages = history
        .iter()
        .filter_map(|m| match m.role {
            MessageRole::User => Some(TurnMessage::user(m.content.clone())),
            MessageRole::Assistant => Some(TurnMessage::assistant(m.content.clone())),
            MessageRole::System => None,
        })
        .collect::<Vec<_>>();
    messages.push(TurnMessage::user(user_message));

    let mut request = TurnRequest {
        messages,
        function_outputs: Vec::new(),
        tools,
        previous_response_id: None,
    };

    let registry = FunctionRegistry::new(state, user_id);
    let mut accumulator = StreamAccumulator::new();
    let mut persisted = Vec::new();
    let mut rounds = 0;

    while rounds < MAX_TOOL_ROUNDS {
        rounds += 1;
        let upstream = turn::open_turn(state, &request, context.summary.as_deref()).await?;
        let mut events = turn::with_deadline(upstream, state.config.turn_timeout);

        while let Some(event) = events.next().await {
            let event = event?;
            for effect in accumulator.apply(&event) {
                match effect {
                    AccumulatorEffect::PersistMessage { item_id, content } => {
                        match state
                            .db
                            .insert_chat_message(
                                conversation.id,
                                MessageRole::Assistant,
                                &content,
                                Some(&item_id),
                            )
                            .await
                        {
                            Ok(message) => persisted.push(message),
                            Err(e) => error!("Failed to persist message {}: {}", item_id, e),
                        }
                    }
                    AccumulatorEffect::ExecuteFunction {
                        item_id,
                        name,
                        arguments,
                        ..
                    } => {
                        debug!("Executing {} for item {}", name, item_id);
                        let output = match registry.call(&name, &arguments).await {
                            Ok(value) => value.to_string(),
                            Err(e) => {
                                warn!("Function {} failed: {}", name, e);
                                json!({ "error": e.to_string() }).to_string()
                            }
                        };
                        accumulator.record_function_output(&item_id, output);
                    }
                }
            }
        }

        let outputs = accumulator.take_function_outputs();
        if outputs.is_empty() {
            break;
        }
        request = TurnRequest {
            messages: Vec::new(),
            function_outputs: outputs,
            tools: request.tools,
            previous_response_id: accumulator.response_id().map(str::to_string),
        };
    }

    info!(
        "Assistant turn on conversation {} finished after {} round(s), {} message(s) stored",
        conversation.id,
        rounds,
        persisted.len()
    );

    Ok(AssistantTurn {
        response_id: accumulator.response_id().map(str::to_string),
        rounds,
        messages: persisted,
        items: accumulator.items().to_vec(),
    })
}
