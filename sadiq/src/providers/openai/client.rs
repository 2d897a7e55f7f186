//! OpenAI-compatible API client.
//!
//! Works against OpenAI itself and against any server exposing the same
//! Chat Completions and Embeddings endpoints, notably Groq.

use super::completion::CompletionModel;
use super::embedding::EmbeddingModel;
use crate::config::RetryConfig;
use crate::error::LlmError;
use crate::providers::ApiClient;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use std::sync::Arc;

/// Default `OpenAI` API base URL.
pub const OPENAI_API_BASE_URL: &str = "https://api.openai.com/v1";

/// Groq's OpenAI-compatible API base URL.
pub const GROQ_API_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// OpenAI-compatible API client for creating completion and embedding models.
///
/// # Example
///
/// ```rust,ignore
/// use sadiq::providers::openai::OpenAIClient;
///
/// // Groq, key from GROQ_API_KEY
/// let groq = OpenAIClient::groq_from_env()?;
///
/// // Custom endpoint
/// let client = OpenAIClient::builder()
///     .api_key("sk-...")
///     .base_url("https://my-openai-proxy.com/v1")
///     .build()?;
/// ```
#[derive(Clone)]
pub struct OpenAIClient {
    http_client: reqwest::Client,
    api_key: Arc<str>,
    base_url: Arc<str>,
    provider: &'static str,
    retry: RetryConfig,
}

impl std::fmt::Debug for OpenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIClient")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl OpenAIClient {
    /// Create a new `OpenAI` client with the given API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        Self::builder().api_key(api_key).build()
    }

    /// Create a client for Groq with the given API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn groq(api_key: impl Into<String>) -> Result<Self, LlmError> {
        Self::builder()
            .api_key(api_key)
            .base_url(GROQ_API_BASE_URL)
            .provider("groq")
            .build()
    }

    /// Create an `OpenAI` client from `OPENAI_API_KEY` (and optionally
    /// `OPENAI_BASE_URL`).
    ///
    /// # Errors
    ///
    /// Returns an authentication error if `OPENAI_API_KEY` is not set.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| LlmError::auth("openai", "OPENAI_API_KEY environment variable not set"))?;

        let mut builder = Self::builder().api_key(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            builder = builder.base_url(base_url);
        }
        builder.build()
    }

    /// Create a Groq client from `GROQ_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if `GROQ_API_KEY` is not set.
    pub fn groq_from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var("GROQ_API_KEY")
            .map_err(|_| LlmError::auth("groq", "GROQ_API_KEY environment variable not set"))?;
        Self::groq(api_key)
    }

    /// Create a new client builder.
    #[must_use]
    pub fn builder() -> OpenAIClientBuilder {
        OpenAIClientBuilder::default()
    }

    /// Create a completion model with the specified model ID.
    #[must_use]
    pub fn completion_model(&self, model_id: impl Into<String>) -> CompletionModel {
        CompletionModel::new(self.clone(), model_id)
    }

    /// Create an embedding model with the specified model ID.
    #[must_use]
    pub fn embedding_model(&self, model_id: impl Into<String>) -> EmbeddingModel {
        EmbeddingModel::new(self.clone(), model_id)
    }
}

impl ApiClient for OpenAIClient {
    fn provider(&self) -> &'static str {
        self.provider
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(2);

        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            headers.insert(AUTHORIZATION, value);
        }

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    fn retry_config(&self) -> RetryConfig {
        self.retry
    }
}

/// Builder for [`OpenAIClient`].
#[derive(Debug, Default)]
pub struct OpenAIClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    provider: Option<&'static str>,
    timeout_secs: Option<u64>,
    retry: Option<RetryConfig>,
}

impl OpenAIClientBuilder {
    /// Set the API key.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set a custom base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Name the provider for logs and errors (default `"openai"`).
    #[must_use]
    pub const fn provider(mut self, provider: &'static str) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the request timeout in seconds.
    #[must_use]
    pub const fn timeout_secs(mut self, timeout: u64) -> Self {
        self.timeout_secs = Some(timeout);
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub const fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if no API key was given, or a network
    /// error if the HTTP client cannot be built.
    pub fn build(self) -> Result<OpenAIClient, LlmError> {
        let provider = self.provider.unwrap_or("openai");
        let api_key = self
            .api_key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| LlmError::auth(provider, "API key is required"))?;
        let base_url = self
            .base_url
            .unwrap_or_else(|| OPENAI_API_BASE_URL.to_string());
        let http_client = crate::config::HttpClientConfig {
            timeout_secs: self.timeout_secs,
            user_agent: None,
        }
        .build_client()?;

        Ok(OpenAIClient {
            http_client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            provider,
            retry: self.retry.unwrap_or_default(),
        })
    }
}
