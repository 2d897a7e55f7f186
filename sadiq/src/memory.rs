//! Conversation buffer memory.
//!
//! Keeps every question and answer of a chat session in order so the chain
//! can turn follow-ups into standalone questions.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::message::{ChatMessage, MessageRole};

/// Errors raised while persisting or restoring memory.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// The history file could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The history file could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ordered chat history of one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMemory {
    messages: Vec<ChatMessage>,
}

impl ConversationMemory {
    /// Create an empty memory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one exchange.
    pub fn save_context(&mut self, input: impl Into<String>, output: impl Into<String>) {
        self.messages.push(ChatMessage::user(input));
        self.messages.push(ChatMessage::assistant(output));
    }

    /// All messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// History rendered as `Human: ...` / `Assistant: ...` lines.
    #[must_use]
    pub fn buffer_string(&self) -> String {
        self.messages
            .iter()
            .map(|m| {
                let speaker = match m.role {
                    MessageRole::User => "Human",
                    MessageRole::Assistant => "Assistant",
                    MessageRole::System => "System",
                };
                format!("{speaker}: {}", m.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Number of stored messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing has been said yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Write the history to `path` as JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), MemoryError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await?;
        debug!(path = %path.display(), messages = self.len(), "memory saved");
        Ok(())
    }

    /// Read a history previously written with [`Self::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Ok(serde_json::from_str(&content)?)
    }
}
