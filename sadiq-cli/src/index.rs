//! Building and opening the vector index for a PDF path.

use std::path::Path;

use sadiq::config::RagConfig;
use sadiq::embedding::EmbeddingModel;
use sadiq::loader::{LoaderError, PdfLoader};
use sadiq::splitter::RecursiveCharacterTextSplitter;
use sadiq::store::VectorStore;
use tracing::{info, warn};

/// Load, split and embed the PDFs under `pdf_path` into a persisted index.
///
/// An existing, non-empty index is reused unless `force` is set. Nothing is
/// persisted when the path yields no text.
///
/// # Errors
///
/// Returns [`LoaderError::NoDocuments`] when no page or chunk could be
/// extracted, or an error if the PDFs cannot be read, the splitter settings
/// are invalid, or embedding or persisting fails.
pub async fn build_index<E: EmbeddingModel>(
    pdf_path: &Path,
    embedder: E,
    config: &RagConfig,
    force: bool,
) -> sadiq::Result<VectorStore<E>> {
    let persist_dir = config.persist_directory_for(pdf_path);

    let target = if !force && VectorStore::<E>::exists(&persist_dir) {
        info!(dir = %persist_dir.display(), "loading existing index");
        let store = VectorStore::load(&persist_dir, embedder).await?;
        if !store.is_empty().await {
            return Ok(store);
        }
        warn!(dir = %persist_dir.display(), "existing index is empty, rebuilding");
        Target::Stale(store)
    } else {
        Target::Fresh(embedder)
    };

    info!(path = %pdf_path.display(), "creating index");
    let pages = PdfLoader::new().load(pdf_path)?;
    let splitter = RecursiveCharacterTextSplitter::new(config.chunk_size, config.chunk_overlap)?;
    let chunks = splitter.split_documents(&pages);
    info!(pages = pages.len(), chunks = chunks.len(), "documents split");

    if chunks.is_empty() {
        return Err(LoaderError::NoDocuments(pdf_path.to_path_buf()).into());
    }

    match target {
        Target::Stale(store) => {
            store.add_documents(chunks).await?;
            store.persist().await?;
            Ok(store)
        }
        Target::Fresh(embedder) => {
            Ok(VectorStore::from_documents(chunks, embedder, Some(persist_dir)).await?)
        }
    }
}

enum Target<E> {
    Stale(VectorStore<E>),
    Fresh(E),
}

/// Open the index previously built for `pdf_path`, if there is one holding
/// at least one chunk.
///
/// # Errors
///
/// Returns an error if the index exists but cannot be read.
pub async fn open_index<E: EmbeddingModel>(
    pdf_path: &Path,
    embedder: E,
    config: &RagConfig,
) -> sadiq::Result<Option<VectorStore<E>>> {
    let persist_dir = config.persist_directory_for(pdf_path);
    if !VectorStore::<E>::exists(&persist_dir) {
        return Ok(None);
    }
    let store = VectorStore::load(&persist_dir, embedder).await?;
    if store.is_empty().await {
        warn!(dir = %persist_dir.display(), "ignoring empty index");
        return Ok(None);
    }
    Ok(Some(store))
}
