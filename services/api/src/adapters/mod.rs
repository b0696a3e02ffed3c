pub mod adviser_llm;
pub mod db;
pub mod title_llm;
pub mod turn_llm;
pub mod vector_store;

pub use adviser_llm::OpenAiAdviserAdapter;
pub use db::DbAdapter;
pub use title_llm::OpenAiTitleAdapter;
pub use turn_llm::OpenAiTurnAdapter;
pub use vector_store::OpenAiVectorStoreAdapter;

use async_openai::error::OpenAIError;
use serde_json::Value;
use vista_core::ports::PortError;

/// Maps an OpenAI client error onto the port error, keeping rate limits distinguishable.
pub(crate) fn port_error(e: OpenAIError) -> PortError {
    let message = e.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("rate limit")
        || lowered.contains("rate_limit")
        || lowered.contains("too many requests")
    {
        PortError::RateLimited(message)
    } else {
        PortError::Unexpected(message)
    }
}

/// Concatenates the `output_text` parts of every message in a Responses API result.
pub(crate) fn output_text(response: &Value) -> String {
    response["output"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter(|item| item["type"] == "message")
                .filter_map(|item| item["content"].as_array())
                .flatten()
                .filter(|part| part["type"] == "output_text")
                .filter_map(|part| part["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}
