//! Unified error types for sadiq.
//!
//! Each subsystem owns a focused error type; [`Error`] ties them together so
//! that callers driving the whole pipeline can use a single `?`.

use std::fmt;

use reqwest::StatusCode;

/// Result type alias for sadiq operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the sadiq pipeline.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// LLM or embedding provider error.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// PDF loading error.
    #[error("Loader error: {0}")]
    Loader(#[from] crate::loader::LoaderError),

    /// Text splitter configuration error.
    #[error("Splitter error: {0}")]
    Splitter(#[from] crate::splitter::SplitterError),

    /// Vector store error.
    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    /// Conversation memory error.
    #[error("Memory error: {0}")]
    Memory(#[from] crate::memory::MemoryError),

    /// PDF harvesting error.
    #[error("Harvest error: {0}")]
    Harvest(#[from] crate::harvest::HarvestError),
}

/// Error type for LLM provider operations.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LlmError {
    /// The error kind.
    pub kind: LlmErrorKind,
    /// The provider name (e.g., "openai", "groq", "ollama").
    pub provider: Option<String>,
    /// Additional error message.
    pub message: String,
    /// Optional error code from the provider.
    pub code: Option<String>,
}

/// Categories of LLM errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum LlmErrorKind {
    /// Authentication or authorization failure.
    Auth,
    /// Rate limit exceeded.
    RateLimited,
    /// Response format error.
    ResponseFormat,
    /// Network or connection error.
    Network,
    /// HTTP status error.
    HttpStatus,
    /// Provider-specific error.
    Provider,
}

impl LlmError {
    /// Create an authentication error.
    #[must_use]
    pub fn auth(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::Auth,
            provider: Some(provider.into()),
            message: message.into(),
            code: None,
        }
    }

    /// Create a rate limit error.
    #[must_use]
    pub fn rate_limited(provider: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::RateLimited,
            provider: Some(provider.into()),
            message: "Rate limit exceeded. Please retry after some time.".into(),
            code: Some("429".into()),
        }
    }

    /// Create a response format error.
    #[must_use]
    pub fn response_format(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::ResponseFormat,
            provider: None,
            message: format!("Expected {}, got {}", expected.into(), got.into()),
            code: None,
        }
    }

    /// Create a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::Network,
            provider: None,
            message: message.into(),
            code: None,
        }
    }

    /// Create an HTTP status error.
    #[must_use]
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::HttpStatus,
            provider: None,
            message: format!("HTTP {status}: {}", body.into()),
            code: Some(status.to_string()),
        }
    }

    /// Create a provider-specific error.
    #[must_use]
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::Provider,
            provider: Some(provider.into()),
            message: message.into(),
            code: None,
        }
    }

    /// Classify a non-success HTTP response from `provider`.
    #[must_use]
    pub fn from_status(provider: &str, status: StatusCode, body: impl Into<String>) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::auth(provider, body),
            StatusCode::TOO_MANY_REQUESTS => Self::rate_limited(provider),
            _ => Self::http_status(status.as_u16(), body).with_provider(provider),
        }
    }

    /// Attach the provider name.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Check if this is a retryable error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind, LlmErrorKind::RateLimited | LlmErrorKind::Network)
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{provider}] ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(code) = &self.code {
            write!(f, " (code: {code})")?;
        }
        Ok(())
    }
}

impl std::error::Error for LlmError {}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network("Request timed out")
        } else if err.is_connect() {
            Self::network(format!("Connection failed: {err}"))
        } else if err.is_decode() {
            Self::response_format("valid JSON body", err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let err = LlmError::from_status("groq", StatusCode::UNAUTHORIZED, "bad key");
        assert_eq!(err.kind, LlmErrorKind::Auth);
        assert!(!err.is_retryable());

        let err = LlmError::from_status("groq", StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert_eq!(err.kind, LlmErrorKind::RateLimited);
        assert!(err.is_retryable());

        let err = LlmError::from_status("ollama", StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert_eq!(err.kind, LlmErrorKind::HttpStatus);
        assert_eq!(err.code.as_deref(), Some("500"));
        assert_eq!(err.provider.as_deref(), Some("ollama"));
    }

    #[test]
    fn test_display_includes_provider_and_code() {
        let err = LlmError::http_status(404, "model not found").with_provider("openai");
        assert_eq!(
            err.to_string(),
            "[openai] HTTP 404: model not found (code: 404)"
        );
    }

    #[test]
    fn test_network_errors_are_retryable() {
        assert!(LlmError::network("reset").is_retryable());
        assert!(!LlmError::response_format("a vector", "nothing").is_retryable());
    }
}
