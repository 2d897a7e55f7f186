//! Ollama `/api/embed` implementation.

use super::client::OllamaClient;
use crate::embedding::{self, Embedding};
use crate::error::LlmError;
use crate::providers::http::post_json;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

/// Nomic's general-purpose text embedding model.
pub const NOMIC_EMBED_TEXT: &str = "nomic-embed-text";

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Ollama embedding model.
#[derive(Clone)]
pub struct EmbeddingModel {
    client: OllamaClient,
    model_id: String,
    batch_size: usize,
}

impl std::fmt::Debug for EmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingModel")
            .field("model_id", &self.model_id)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl EmbeddingModel {
    pub(crate) fn new(client: OllamaClient, model_id: impl Into<String>) -> Self {
        Self {
            client,
            model_id: model_id.into(),
            batch_size: 32,
        }
    }

    /// Set how many texts are sent per request.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn parse_response(json: Value, expected: usize) -> Result<Vec<Embedding>, LlmError> {
        let response: EmbedResponse = serde_json::from_value(json)
            .map_err(|e| LlmError::response_format("embeddings array", e.to_string()))?;
        embedding::check_batch_len(expected, response.embeddings.len())?;
        Ok(response.embeddings)
    }
}

#[async_trait]
impl embedding::EmbeddingModel for EmbeddingModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    #[instrument(skip(self, texts), fields(model = %self.model_id, count = texts.len()))]
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>, LlmError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let body = json!({ "model": self.model_id, "input": batch });
            let json = post_json(&self.client, "/api/embed", &body).await?;
            vectors.extend(Self::parse_response(json, batch.len())?);
        }
        Ok(vectors)
    }
}
