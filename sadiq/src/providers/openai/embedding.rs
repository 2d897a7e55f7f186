//! OpenAI-compatible Embeddings implementation.

use super::client::OpenAIClient;
use crate::embedding::{self, Embedding};
use crate::error::LlmError;
use crate::providers::ApiClient;
use crate::providers::http::post_json;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

/// `OpenAI` text-embedding-3-small.
pub const TEXT_EMBEDDING_3_SMALL: &str = "text-embedding-3-small";

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Embedding model behind an OpenAI-compatible `/embeddings` endpoint.
#[derive(Clone)]
pub struct EmbeddingModel {
    client: OpenAIClient,
    model_id: String,
    batch_size: usize,
}

impl std::fmt::Debug for EmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingModel")
            .field("provider", &self.client.provider())
            .field("model_id", &self.model_id)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl EmbeddingModel {
    pub(crate) fn new(client: OpenAIClient, model_id: impl Into<String>) -> Self {
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
        let mut response: EmbeddingResponse = serde_json::from_value(json)
            .map_err(|e| LlmError::response_format("embedding list", e.to_string()))?;
        embedding::check_batch_len(expected, response.data.len())?;
        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl embedding::EmbeddingModel for EmbeddingModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    #[instrument(skip(self, texts), fields(provider = self.client.provider(), model = %self.model_id, count = texts.len()))]
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>, LlmError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let body = json!({ "model": self.model_id, "input": batch });
            let json = post_json(&self.client, "/embeddings", &body).await?;
            vectors.extend(Self::parse_response(json, batch.len())?);
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_orders_by_index() {
        let json = json!({
            "object": "list",
            "data": [
                { "object": "embedding", "index": 1, "embedding": [0.0, 1.0] },
                { "object": "embedding", "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        let vectors = EmbeddingModel::parse_response(json, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_response_count_mismatch() {
        let json = json!({ "data": [{ "index": 0, "embedding": [1.0] }] });
        assert!(EmbeddingModel::parse_response(json, 3).is_err());
    }
}
