//! Documents flowing through the pipeline: PDF pages, then chunks of them.

use serde::{Deserialize, Serialize};

/// Where a piece of text came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Path or URL of the source file.
    pub source: String,
    /// 0-based page index within the source PDF.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    /// 0-based chunk index within the page, set by the splitter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<usize>,
}

/// A unit of text with its provenance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// The text content.
    pub content: String,
    /// Provenance of the content.
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Create a document from text and a source identifier.
    #[must_use]
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: DocumentMetadata {
                source: source.into(),
                ..DocumentMetadata::default()
            },
        }
    }

    /// Set the page index.
    #[must_use]
    pub const fn with_page(mut self, page: usize) -> Self {
        self.metadata.page = Some(page);
        self
    }

    /// The first `max_chars` characters, with `...` appended when cut.
    #[must_use]
    pub fn preview(&self, max_chars: usize) -> String {
        match self.content.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}...", &self.content[..cut]),
            None => self.content.clone(),
        }
    }
}
