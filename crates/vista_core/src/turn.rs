//! crates/vista_core/src/turn.rs
//!
//! The request model for one assistant turn against the hosted Responses API:
//! role-tagged messages, tool descriptors, function outputs from the previous
//! round, and an optional continuation token.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A role-tagged conversation message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnMessage {
    pub role: String,
    pub content: String,
}

impl TurnMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// The result of a locally executed function call, fed back on the next round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionOutput {
    pub call_id: String,
    pub output: String,
}

/// A tool the model may use during the turn. Serializes to the provider's tool shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolDescriptor {
    WebSearch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_location: Option<Value>,
    },
    FileSearch {
        #[serde(default)]
        vector_store_ids: Vec<String>,
    },
    Function {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default)]
        parameters: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        strict: Option<bool>,
    },
}

impl ToolDescriptor {
    pub fn function(name: &str, description: &str, parameters: Value) -> Self {
        ToolDescriptor::Function {
            name: name.to_string(),
            description: Some(description.to_string()),
            parameters,
            strict: None,
        }
    }
}

/// Everything needed to open one upstream streaming request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TurnRequest {
    #[serde(default)]
    pub messages: Vec<TurnMessage>,
    #[serde(default)]
    pub function_outputs: Vec<FunctionOutput>,
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
    #[serde(default)]
    pub previous_response_id: Option<String>,
}

impl TurnRequest {
    /// True when there is nothing to send upstream.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.function_outputs.is_empty()
    }

    /// Returns the tools with every file search that has no usable index removed.
    ///
    /// Blank index ids are dropped from a file search; if none remain, the whole
    /// descriptor goes, since the provider rejects an empty `vector_store_ids`.
    pub fn sanitized_tools(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .filter_map(|tool| match tool {
                ToolDescriptor::FileSearch { vector_store_ids } => {
                    let ids: Vec<String> = vector_store_ids
                        .iter()
                        .map(|id| id.trim())
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .collect();
                    if ids.is_empty() {
                        None
                    } else {
                        Some(ToolDescriptor::FileSearch {
                            vector_store_ids: ids,
                        })
                    }
                }
                other => Some(other.clone()),
            })
            .collect()
    }

    /// The provider `input` array: messages first, then function outputs.
    pub fn input_items(&self) -> Vec<Value> {
        let messages = self.messages.iter().map(|m| {
            serde_json::json!({
                "role": m.role,
                "content": m.content,
            })
        });
        let outputs = self.function_outputs.iter().map(|o| {
            serde_json::json!({
                "type": "function_call_output",
                "call_id": o.call_id,
                "output": o.output,
            })
        });
        messages.chain(outputs).collect()
    }
}
