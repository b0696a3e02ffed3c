//! services/api/src/adapters/vector_store.rs
//!
//! This module contains the adapter for the hosted vector store and file APIs.
//! It implements the `VectorStoreService` port from the `core` crate with plain
//! REST calls.

use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde_json::{json, Value};
use tracing::debug;
use vista_core::ports::{PortError, PortResult, VectorStoreService};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `VectorStoreService` against the OpenAI REST API.
#[derive(Clone)]
pub struct OpenAiVectorStoreAdapter {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiVectorStoreAdapter {
    /// Creates a new `OpenAiVectorStoreAdapter`.
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json(&self, path: &str, body: Value) -> PortResult<Value> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        read_json(response).await
    }

    async fn delete(&self, path: &str) -> PortResult<Value> {
        let response = self
            .http
            .delete(self.url(path))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        read_json(response).await
    }
}

/// Maps the HTTP status onto a `PortError` and decodes the body on success.
async fn read_json(response: Response) -> PortResult<Value> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<Value>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()));
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(match status.as_u16() {
        404 => PortError::NotFound(error_text),
        400 => PortError::InvalidInput(error_text),
        429 => PortError::RateLimited(error_text),
        _ => PortError::Unexpected(format!("OpenAI API error ({}): {}", status, error_text)),
    })
}

fn id_of(value: &Value) -> PortResult<String> {
    value["id"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| PortError::Unexpected("Response did not contain an id".to_string()))
}

//=========================================================================================
// `VectorStoreService` Trait Implementation
//=========================================================================================

#[async_trait]
impl VectorStoreService for OpenAiVectorStoreAdapter {
    async fn create_store(&self, name: &str) -> PortResult<String> {
        let store = self
            .post_json("/vector_stores", json!({ "name": name }))
            .await?;
        let id = id_of(&store)?;
        debug!("Created vector store {}", id);
        Ok(id)
    }

    async fn delete_store(&self, vector_store_id: &str) -> PortResult<()> {
        self.delete(&format!("/vector_stores/{}", vector_store_id))
            .await?;
        Ok(())
    }

    async fn upload_file(&self, file_name: &str, contents: Vec<u8>) -> PortResult<String> {
        let part = multipart::Part::bytes(contents).file_name(file_name.to_string());
        let form = multipart::Form::new()
            .text("purpose", "assistants")
            .part("file", part);

        let response = self
            .http
            .post(self.url("/files"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let file = read_json(response).await?;
        id_of(&file)
    }

    async fn add_file(&self, vector_store_id: &str, file_id: &str) -> PortResult<()> {
        self.post_json(
            &format!("/vector_stores/{}/files", vector_store_id),
            json!({ "file_id": file_id }),
        )
        .await?;
        Ok(())
    }

    async fn remove_file(&self, vector_store_id: &str, file_id: &str) -> PortResult<()> {
        self.delete(&format!("/vector_stores/{}/files/{}", vector_store_id, file_id))
            .await?;
        Ok(())
    }

    async fn add_files_batch(
        &self,
        vector_store_id: &str,
        file_ids: &[String],
    ) -> PortResult<String> {
        let batch = self
            .post_json(
                &format!("/vector_stores/{}/file_batches", vector_store_id),
                json!({ "file_ids": file_ids }),
            )
            .await?;
        id_of(&batch)
    }
}
