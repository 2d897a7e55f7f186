//! Offline stand-ins for chat and embedding models.
//!
//! [`MockModel`] replays scripted replies and records every prompt it sees;
//! [`MockEmbedding`] hashes words into a fixed-size vector so that texts
//! sharing vocabulary land close together. Both are used by the test suite
//! and are handy for exercising the pipeline without network access.

use std::collections::VecDeque;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{GenerateOptions, Model, ModelResponse, TokenUsage, saturating_u32};
use crate::embedding::{Embedding, EmbeddingModel};
use crate::error::LlmError;
use crate::message::ChatMessage;

/// A chat model that returns scripted replies in order.
#[derive(Debug, Default)]
pub struct MockModel {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockModel {
    /// Create a model that answers with `replies`, one per call.
    #[must_use]
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every message list passed to [`Model::generate`], oldest first.
    #[must_use]
    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }

    /// Number of generate calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Model for MockModel {
    fn model_id(&self) -> &str {
        "mock"
    }

    fn provider(&self) -> &'static str {
        "mock"
    }

    async fn generate(
        &self,
        messages: Vec<ChatMessage>,
        _options: GenerateOptions,
    ) -> Result<ModelResponse, LlmError> {
        let input_chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(messages);
        }

        let reply = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .ok_or_else(|| LlmError::provider("mock", "no scripted reply left"))?;

        let usage = TokenUsage::new(
            saturating_u32(input_chars as u64),
            saturating_u32(reply.chars().count() as u64),
        );
        Ok(ModelResponse::new(reply).with_token_usage(usage))
    }
}

/// Default dimensionality of [`MockEmbedding`] vectors.
pub const MOCK_EMBEDDING_DIMENSIONS: usize = 64;

/// A deterministic bag-of-words embedding.
///
/// Each lowercase word is hashed into one of `dimensions` buckets and the
/// resulting counts are L2-normalised.
#[derive(Debug, Clone)]
pub struct MockEmbedding {
    model_id: String,
    dimensions: usize,
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new(MOCK_EMBEDDING_DIMENSIONS)
    }
}

impl MockEmbedding {
    /// Create an embedding with the given number of dimensions (at least 1).
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            model_id: "mock-embedding".to_string(),
            dimensions: dimensions.max(1),
        }
    }

    /// Override the reported model id.
    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Number of dimensions per vector.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[allow(clippy::cast_possible_truncation)]
    fn embed(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0_f32; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingModel for MockEmbedding {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>, LlmError> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}
