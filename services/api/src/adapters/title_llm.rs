//! services/api/src/adapters/title_llm.rs
//!
//! Conversation titles via Chat Completions. Implements `TitleGenerationService`.

use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use serde_json::{json, Value};
use vista_core::ports::{PortError, PortResult, TitleGenerationService};

use super::port_error;

pub struct OpenAiTitleAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiTitleAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl TitleGenerationService for OpenAiTitleAdapter {
    async fn generate_title_from_text(&self, text: &str) -> PortResult<String> {
        let preview = text.chars().take(1000).collect::<String>();

        let request = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a title generation assistant. Generate a short, descriptive title (maximum 6 words) for a conversation with an education adviser that starts with the given message. Respond with ONLY the title, no quotes, no explanation."
                },
                {
                    "role": "user",
                    "content": format!("Generate a title for this conversation:\n\n{}", preview)
                }
            ],
            "max_tokens": 20,
            "temperature": 0.7,
        });

        let response: Value = self
            .client
            .chat()
            .create_byot(request)
            .await
            .map_err(port_error)?;

        let title = response["choices"][0]["message"]["content"]
            .as_str()
            .map(|t| t.trim().trim_matches('"').to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PortError::Unexpected("No title generated".to_string()))?;

        Ok(title)
    }
}
