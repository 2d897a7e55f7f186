//! Recursive character text splitting.
//!
//! Text is cut on the coarsest separator that occurs in it (paragraphs, then
//! lines, then words, then characters). Pieces are merged back greedily up to
//! `chunk_size` characters and consecutive chunks share up to
//! `chunk_overlap` characters, so a sentence cut at a chunk border still
//! appears whole in one of the two neighbours.

use std::collections::VecDeque;

use thiserror::Error;
use tracing::{debug, warn};

use crate::document::Document;

/// Separators tried in order.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Invalid splitter configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SplitterError {
    /// `chunk_size` was zero.
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    /// `chunk_overlap` exceeds `chunk_size`.
    #[error("chunk overlap ({overlap}) is larger than chunk size ({size})")]
    OverlapTooLarge {
        /// Configured chunk size.
        size: usize,
        /// Configured overlap.
        overlap: usize,
    },
}

/// Splits text recursively on a list of separators.
///
/// Lengths are measured in characters, not bytes, so Arabic text is sized
/// the same way as Latin text.
#[derive(Debug, Clone)]
pub struct RecursiveCharacterTextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveCharacterTextSplitter {
    /// Create a splitter with the default separators.
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_size` is zero or smaller than `chunk_overlap`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, SplitterError> {
        if chunk_size == 0 {
            return Err(SplitterError::ZeroChunkSize);
        }
        if chunk_overlap > chunk_size {
            return Err(SplitterError::OverlapTooLarge {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(ToString::to_string).collect(),
        })
    }

    /// Replace the separator list.
    #[must_use]
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Maximum chunk length in characters.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap between consecutive chunks in characters.
    #[must_use]
    pub const fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split raw text into chunks.
    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Split documents, carrying each document's metadata onto its chunks.
    #[must_use]
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Document> {
        let chunks = documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.content)
                    .into_iter()
                    .enumerate()
                    .map(|(i, content)| {
                        let mut metadata = doc.metadata.clone();
                        metadata.chunk = Some(i);
                        Document { content, metadata }
                    })
            })
            .collect::<Vec<_>>();
        debug!(
            documents = documents.len(),
            chunks = chunks.len(),
            "split documents"
        );
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map_or("", String::as_str);
        let mut remaining: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate.as_str();
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge_splits(&fitting));
                fitting.clear();
            }
            if remaining.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge_splits(&fitting));
        }
        chunks
    }

    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for split in splits {
            let len = char_len(split);
            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        length = total,
                        chunk_size = self.chunk_size,
                        "created a chunk longer than the configured size"
                    );
                }
                if !current.is_empty() {
                    if let Some(doc) = join_trimmed(&current) {
                        docs.push(doc);
                    }
                    // drop from the front until what is left fits as overlap
                    while total > self.chunk_overlap
                        || (total + len > self.chunk_size && total > 0)
                    {
                        let Some(first) = current.pop_front() else {
                            break;
                        };
                        total -= char_len(first);
                    }
                }
            }
            current.push_back(split);
            total += len;
        }

        if let Some(doc) = join_trimmed(&current) {
            docs.push(doc);
        }
        docs
    }
}

/// Split `text` on `separator`, attaching each separator to the start of the
/// piece that follows it. An empty separator splits into characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (index, _) in text.match_indices(separator) {
        if index > start {
            pieces.push(&text[start..index]);
        }
        start = index;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join_trimmed(parts: &VecDeque<&str>) -> Option<String> {
    let joined = parts.iter().copied().collect::<String>();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_configuration() {
        assert_eq!(
            RecursiveCharacterTextSplitter::new(0, 0).unwrap_err(),
            SplitterError::ZeroChunkSize
        );
        assert_eq!(
            RecursiveCharacterTextSplitter::new(100, 200).unwrap_err(),
            SplitterError::OverlapTooLarge {
                size: 100,
                overlap: 200
            }
        );
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let splitter = RecursiveCharacterTextSplitter::new(1000, 200).unwrap();
        assert_eq!(splitter.split_text("  hello world \n"), vec!["hello world"]);
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        let splitter = RecursiveCharacterTextSplitter::new(10, 2).unwrap();
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text("\n\n   \n").is_empty());
    }

    #[test]
    fn test_recursive_split_matches_reference_output() {
        let text = "Hi.\n\nI'm Harrison.\n\nHow? Are? You?\nOkay then f f f f.\nThis is a weird text to write, but gotta test the splittingggg some how.\n\nBye!\n\n-H.";
        let splitter = RecursiveCharacterTextSplitter::new(10, 1).unwrap();
        let expected = vec![
            "Hi.",
            "I'm",
            "Harrison.",
            "How? Are?",
            "You?",
            "Okay then",
            "f f f f.",
            "This is a",
            "weird",
            "text to",
            "write,",
            "but gotta",
            "test the",
            "splitting",
            "gggg",
            "some how.",
            "Bye!",
            "-H.",
        ];
        assert_eq!(splitter.split_text(text), expected);
    }

    #[test]
    fn test_overlap_between_word_chunks() {
        let splitter = RecursiveCharacterTextSplitter::new(10, 4).unwrap();
        let chunks = splitter.split_text("foo bar baz 123");
        assert_eq!(chunks, vec!["foo bar", "bar baz", "baz 123"]);
    }

    #[test]
    fn test_lengths_counted_in_characters() {
        // each word is 5 characters but 10 bytes
        let text = "سلالة سلالة سلالة سلالة";
        let splitter = RecursiveCharacterTextSplitter::new(12, 0).unwrap();
        let chunks = splitter.split_text(text);
        assert_eq!(chunks, vec!["سلالة سلالة", "سلالة سلالة"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 12));
    }

    #[test]
    fn test_split_documents_keeps_metadata() {
        let splitter = RecursiveCharacterTextSplitter::new(7, 0).unwrap();
        let docs = vec![Document::new("foo bar baz", "guide.pdf").with_page(4)];
        let chunks = splitter.split_documents(&docs);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "foo bar");
        assert_eq!(chunks[1].content, "baz");
        assert!(chunks.iter().all(|c| c.metadata.source == "guide.pdf"));
        assert!(chunks.iter().all(|c| c.metadata.page == Some(4)));
        assert_eq!(chunks[1].metadata.chunk, Some(1));
    }

    #[test]
    fn test_separator_kept_with_following_piece() {
        assert_eq!(
            split_keeping_separator("a\nb\nc", "\n"),
            vec!["a", "\nb", "\nc"]
        );
        assert_eq!(split_keeping_separator("\n\nx", "\n"), vec!["\n", "\nx"]);
        assert_eq!(split_keeping_separator("ab", ""), vec!["a", "b"]);
    }
}
