//! Text embeddings.
//!
//! Embeddings are the numeric representation used to compare a question with
//! the stored chunks. Concrete models live next to their provider client
//! (see [`crate::providers`]); this module only defines the interface.

mod distance;

pub use distance::cosine_similarity;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LlmError;

/// A dense embedding vector.
pub type Embedding = Vec<f32>;

/// A model that turns text into vectors.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Model identifier, stored alongside persisted indexes.
    fn model_id(&self) -> &str;

    /// Embed a batch of texts, returning one vector per input in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails or returns a malformed
    /// response.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>, LlmError>;

    /// Embed a search query.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails or returns no vector.
    async fn embed_query(&self, text: &str) -> Result<Embedding, LlmError> {
        self.embed_documents(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::response_format("one embedding", "none"))
    }
}

#[async_trait]
impl<T: EmbeddingModel + ?Sized> EmbeddingModel for Arc<T> {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>, LlmError> {
        (**self).embed_documents(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding, LlmError> {
        (**self).embed_query(text).await
    }
}

#[async_trait]
impl<T: EmbeddingModel + ?Sized> EmbeddingModel for Box<T> {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>, LlmError> {
        (**self).embed_documents(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding, LlmError> {
        (**self).embed_query(text).await
    }
}

/// Check that a provider returned exactly one vector per input.
pub(crate) fn check_batch_len(expected: usize, got: usize) -> Result<(), LlmError> {
    if expected == got {
        Ok(())
    } else {
        Err(LlmError::response_format(
            format!("{expected} embeddings"),
            format!("{got}"),
        ))
    }
}
