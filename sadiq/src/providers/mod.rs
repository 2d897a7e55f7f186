//! LLM and embedding providers.
//!
//! Every chat backend implements [`Model`]; embedding backends implement
//! [`EmbeddingModel`](crate::embedding::EmbeddingModel). Two HTTP families are
//! supported:
//!
//! - **OpenAI-compatible**: OpenAI itself and Groq, which serves the
//!   assistant's default Llama model.
//! - **Ollama**: local inference and local embeddings.
//!
//! # Example
//!
//! ```rust,ignore
//! use sadiq::providers::{GenerateOptions, Model, OpenAIClient};
//! use sadiq::message::ChatMessage;
//!
//! let groq = OpenAIClient::groq_from_env()?;
//! let llm = groq.completion_model("llama-3.3-70b-versatile");
//! let reply = llm
//!     .generate(vec![ChatMessage::user("مرحبا")], GenerateOptions::new())
//!     .await?;
//! ```

mod http;
mod types;

pub mod mock;
pub mod ollama;
pub mod openai;

pub use types::{GenerateOptions, ModelResponse, TokenUsage};

pub use mock::{MockEmbedding, MockModel};
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;

use crate::config::RetryConfig;
use crate::error::LlmError;
use crate::message::ChatMessage;

/// The core trait for chat model implementations.
#[async_trait]
pub trait Model: Send + Sync {
    /// Get the model identifier (e.g., "llama-3.3-70b-versatile").
    fn model_id(&self) -> &str;

    /// Get the provider name (e.g., "groq", "openai", "ollama").
    fn provider(&self) -> &'static str {
        "unknown"
    }

    /// Generate a response for the given messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails or the response cannot be parsed.
    async fn generate(
        &self,
        messages: Vec<ChatMessage>,
        options: GenerateOptions,
    ) -> Result<ModelResponse, LlmError>;
}

#[async_trait]
impl<T: Model + ?Sized> Model for Box<T> {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn provider(&self) -> &'static str {
        (**self).provider()
    }

    async fn generate(
        &self,
        messages: Vec<ChatMessage>,
        options: GenerateOptions,
    ) -> Result<ModelResponse, LlmError> {
        (**self).generate(messages, options).await
    }
}

#[async_trait]
impl<T: Model + ?Sized> Model for Arc<T> {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn provider(&self) -> &'static str {
        (**self).provider()
    }

    async fn generate(
        &self,
        messages: Vec<ChatMessage>,
        options: GenerateOptions,
    ) -> Result<ModelResponse, LlmError> {
        (**self).generate(messages, options).await
    }
}

/// Base configuration for HTTP API clients.
pub trait ApiClient: Clone + Send + Sync {
    /// Provider name used in logs and errors.
    fn provider(&self) -> &'static str;

    /// Get the base URL for API requests.
    fn base_url(&self) -> &str;

    /// Get the HTTP client instance.
    fn http_client(&self) -> &reqwest::Client;

    /// Build authentication headers for API requests.
    fn auth_headers(&self) -> HeaderMap;

    /// Retry policy for transient failures.
    fn retry_config(&self) -> RetryConfig {
        RetryConfig::default()
    }
}

/// Safely convert u64 to u32, saturating at `u32::MAX` if overflow.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn saturating_u32(value: u64) -> u32 {
    if value > u32::MAX as u64 {
        u32::MAX
    } else {
        value as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturating_u32() {
        assert_eq!(saturating_u32(0), 0);
        assert_eq!(saturating_u32(100), 100);
        assert_eq!(saturating_u32(u64::from(u32::MAX)), u32::MAX);
        assert_eq!(saturating_u32(u64::MAX), u32::MAX);
    }

    #[tokio::test]
    async fn test_boxed_model_delegates() {
        let model: Box<dyn Model> = Box::new(MockModel::new(["boxed"]));
        assert_eq!(model.model_id(), "mock");
        let reply = model
            .generate(vec![ChatMessage::user("hi")], GenerateOptions::new())
            .await
            .unwrap();
        assert_eq!(reply.content, "boxed");
    }
}
