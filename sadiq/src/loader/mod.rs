//! PDF loading.
//!
//! [`PdfLoader`] turns a PDF file, or a directory tree of them, into one
//! [`Document`] per page. Broken files inside a directory are logged and
//! skipped so that a single corrupt download cannot stop an indexing run.

mod error;

pub use error::LoaderError;

use std::path::{Path, PathBuf};

use glob::MatchOptions;
use tracing::{debug, error, info, warn};

use crate::document::Document;

/// Default pattern used when loading a directory.
pub const DEFAULT_PDF_GLOB: &str = "**/*.pdf";

/// Loads PDF files page by page.
#[derive(Debug, Clone)]
pub struct PdfLoader {
    glob: String,
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self {
            glob: DEFAULT_PDF_GLOB.to_string(),
        }
    }
}

impl PdfLoader {
    /// Create a loader matching `**/*.pdf` inside directories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different pattern, relative to the loaded directory.
    #[must_use]
    pub fn with_glob(mut self, glob: impl Into<String>) -> Self {
        self.glob = glob.into();
        self
    }

    /// Load a single file or every matching file under a directory.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::NotFound`] if `path` does not exist, or any
    /// error from [`Self::load_file`] when `path` is a file.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Vec<Document>, LoaderError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoaderError::NotFound(path.to_path_buf()));
        }

        let documents = if path.is_dir() {
            info!(path = %path.display(), "loading PDFs from directory");
            self.load_directory(path)?
        } else {
            info!(path = %path.display(), "loading single PDF");
            Self::load_file(path)?
        };

        if documents.is_empty() {
            warn!(path = %path.display(), "no documents were loaded");
        } else {
            info!(pages = documents.len(), "loaded document pages");
        }
        Ok(documents)
    }

    /// Load every PDF under `dir` matching the configured glob.
    ///
    /// Files that fail to parse are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the glob pattern is invalid or the directory
    /// cannot be walked.
    pub fn load_directory(&self, dir: impl AsRef<Path>) -> Result<Vec<Document>, LoaderError> {
        let mut documents = Vec::new();
        for path in self.matching_files(dir.as_ref())? {
            match Self::load_file(&path) {
                Ok(pages) => {
                    debug!(path = %path.display(), pages = pages.len(), "loaded file");
                    documents.extend(pages);
                }
                Err(e) => error!(path = %path.display(), error = %e, "error loading file"),
            }
        }
        Ok(documents)
    }

    /// Load one PDF file, producing a document per non-blank page.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Pdf`] if the file is not a readable PDF.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Vec<Document>, LoaderError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading file");

        let pdf = lopdf::Document::load(path).map_err(|source| LoaderError::Pdf {
            path: path.to_path_buf(),
            source,
        })?;
        let source = path.display().to_string();

        let mut documents = Vec::new();
        for (index, page_number) in pdf.get_pages().into_keys().enumerate() {
            let text = match pdf.extract_text(&[page_number]) {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %source, page = page_number, error = %e, "skipping unreadable page");
                    continue;
                }
            };
            if text.trim().is_empty() {
                continue;
            }
            documents.push(Document::new(text, source.clone()).with_page(index));
        }
        Ok(documents)
    }

    fn matching_files(&self, dir: &Path) -> Result<Vec<PathBuf>, LoaderError> {
        let base = dir
            .to_str()
            .ok_or_else(|| LoaderError::InvalidGlobPattern(dir.display().to_string()))?;
        let pattern = format!("{}/{}", glob::Pattern::escape(base), self.glob);
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::default()
        };

        let mut files = glob::glob_with(&pattern, options)?
            .filter_map(|entry| match entry {
                Ok(path) if path.is_file() => Some(path),
                Ok(_) => None,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable path");
                    None
                }
            })
            .collect::<Vec<_>>();
        files.sort();
        Ok(files)
    }
}
