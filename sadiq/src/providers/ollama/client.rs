//! Ollama API client implementation.
//!
//! Talks to a local (or remote) Ollama server for both chat and embeddings.

use super::completion::CompletionModel;
use super::embedding::EmbeddingModel;
use crate::config::{HttpClientConfig, RetryConfig};
use crate::error::LlmError;
use crate::providers::ApiClient;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use std::sync::Arc;

/// Default Ollama API base URL (local server).
pub const OLLAMA_API_BASE_URL: &str = "http://localhost:11434";

/// Ollama API client for creating completion and embedding models.
///
/// Ollama runs locally and doesn't require an API key.
///
/// # Example
///
/// ```rust,ignore
/// use sadiq::providers::ollama::OllamaClient;
///
/// let client = OllamaClient::builder()
///     .base_url("http://192.168.1.100:11434")
///     .build()?;
///
/// let embedder = client.embedding_model("nomic-embed-text");
/// ```
#[derive(Clone)]
pub struct OllamaClient {
    http_client: reqwest::Client,
    base_url: Arc<str>,
    retry: RetryConfig,
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OllamaClient {
    /// Create a client for `http://localhost:11434`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self, LlmError> {
        Self::builder().build()
    }

    /// Create a new client builder.
    #[must_use]
    pub fn builder() -> OllamaClientBuilder {
        OllamaClientBuilder::default()
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

    /// Check if the Ollama server is running and accessible.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not reachable.
    pub async fn health_check(&self) -> Result<bool, LlmError> {
        let response = self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;

        Ok(response.status().is_success())
    }

    /// List available models on the Ollama server.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let response = self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?
            .json::<serde_json::Value>()
            .await?;

        let models = response["models"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| m["name"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }
}

impl ApiClient for OllamaClient {
    fn provider(&self) -> &'static str {
        "ollama"
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    fn retry_config(&self) -> RetryConfig {
        self.retry
    }
}

/// Builder for [`OllamaClient`].
#[derive(Debug, Default)]
pub struct OllamaClientBuilder {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    retry: Option<RetryConfig>,
}

impl OllamaClientBuilder {
    /// Set a custom base URL.
    ///
    /// A bare `host:port` (as found in `OLLAMA_HOST`) gets an `http://`
    /// scheme.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the request timeout in seconds.
    ///
    /// Default is no timeout; local inference can be slow.
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
    /// Returns an error if the HTTP client cannot be built.
    pub fn build(self) -> Result<OllamaClient, LlmError> {
        let base_url = self
            .base_url
            .map_or_else(|| OLLAMA_API_BASE_URL.to_string(), normalize_base_url);
        let http_client = HttpClientConfig {
            timeout_secs: self.timeout_secs,
            user_agent: None,
        }
        .build_client()?;

        Ok(OllamaClient {
            http_client,
            base_url: base_url.into(),
            retry: self.retry.unwrap_or_default(),
        })
    }
}

fn normalize_base_url(url: String) -> String {
    let url = url.trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}
