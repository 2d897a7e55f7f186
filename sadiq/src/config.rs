//! Configuration types for the retrieval pipeline and its HTTP clients.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::LlmError;

/// Default chat model served by Groq.
pub const DEFAULT_CHAT_MODEL: &str = "llama-3.3-70b-versatile";

/// Default embedding model served by Ollama.
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Default root directory under which one index per PDF folder is persisted.
pub const DEFAULT_DB_ROOT: &str = "vector_db";

/// Settings for the whole retrieval pipeline.
///
/// Defaults reproduce the assistant's tuned behaviour: 1000-character chunks
/// with a 200-character overlap, three retrieved chunks per question and a
/// fairly creative generation temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Sampling temperature for answers.
    pub temperature: f32,
    /// Maximum tokens generated per answer.
    pub max_tokens: u32,
    /// Chat model identifier.
    pub chat_model: String,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Number of texts sent per embedding request.
    pub embedding_batch_size: usize,
    /// Root directory for persisted indexes.
    pub db_root: PathBuf,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 3,
            temperature: 0.7,
            max_tokens: 2048,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_batch_size: 32,
            db_root: PathBuf::from(DEFAULT_DB_ROOT),
        }
    }
}

impl RagConfig {
    /// Directory holding the index built from `pdf_path`.
    ///
    /// Each PDF folder gets its own index named after the folder, so that
    /// several collections can live side by side under [`Self::db_root`].
    #[must_use]
    pub fn persist_directory_for(&self, pdf_path: &Path) -> PathBuf {
        let is_pdf = pdf_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        let name = if is_pdf {
            pdf_path.file_stem()
        } else {
            pdf_path.file_name()
        };
        let name = name.map_or_else(|| "default".into(), |n| n.to_string_lossy().into_owned());
        self.db_root.join(name)
    }
}

/// Shared HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// User agent string.
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Some(120),
            user_agent: None,
        }
    }
}

impl HttpClientConfig {
    /// Build a reqwest client with this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn build_client(&self) -> Result<reqwest::Client, LlmError> {
        let mut builder = reqwest::Client::builder();

        if let Some(timeout) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        if let Some(ref user_agent) = self.user_agent {
            builder = builder.user_agent(user_agent);
        }

        builder
            .build()
            .map_err(|e| LlmError::network(format!("Failed to build HTTP client: {e}")))
    }
}

/// Configuration for retrying failed requests.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Exponential backoff multiplier.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to retry delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A configuration that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Calculate delay for a given attempt number (0-indexed).
    #[must_use]
    #[allow(
        clippy::cast_possible_wrap,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay =
            self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay_ms = if self.jitter {
            // up to 25% jitter
            base_delay + base_delay * 0.25 * rand_factor()
        } else {
            base_delay
        };
        Duration::from_millis(delay_ms as u64)
    }
}

/// Pseudo-random factor between 0.0 and 1.0.
fn rand_factor() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    f64::from(nanos % 1000) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rag_config_default() {
        let config = RagConfig::default();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.max_tokens, 2048);
        assert_eq!(config.chat_model, DEFAULT_CHAT_MODEL);
    }

    #[test]
    fn test_persist_directory_uses_folder_name() {
        let config = RagConfig::default();
        let dir = config.persist_directory_for(Path::new("/home/user/downloaded_pdfs"));
        assert_eq!(dir, PathBuf::from("vector_db/downloaded_pdfs"));

        let dir = config.persist_directory_for(Path::new("/tmp/sheep.pdf"));
        assert_eq!(dir, PathBuf::from("vector_db/sheep"));
    }

    #[test]
    fn test_retry_config_delay_without_jitter() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            jitter: false,
        };

        assert_eq!(config.delay_for_attempt(0).as_millis(), 1000);
        assert_eq!(config.delay_for_attempt(1).as_millis(), 2000);
        assert_eq!(config.delay_for_attempt(2).as_millis(), 4000);
    }

    #[test]
    fn test_retry_jitter_is_bounded() {
        let config = RetryConfig::default();
        let delay = config.delay_for_attempt(0).as_millis();
        assert!((1000..=1250).contains(&delay));
    }
}
