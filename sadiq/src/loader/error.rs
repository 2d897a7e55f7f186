//! Errors raised while reading PDF files from disk.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn a PDF path into page documents.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// The file or folder does not exist.
    #[error("no such file or folder: {0}")]
    NotFound(PathBuf),

    /// Nothing readable was found under the path.
    #[error("no documents were loaded from {0}")]
    NoDocuments(PathBuf),

    /// The folder path could not be turned into a glob pattern.
    #[error("cannot search folder {0} for PDFs")]
    InvalidGlobPattern(String),

    /// Reading from disk failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The generated glob pattern was rejected.
    #[error("bad PDF search pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// A directory entry could not be read while walking the folder.
    #[error("could not read folder entry: {0}")]
    Glob(#[from] glob::GlobError),

    /// The file is not a PDF lopdf can parse.
    #[error("cannot parse PDF {}: {source}", path.display())]
    Pdf {
        /// File that failed to parse.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: lopdf::Error,
    },
}
