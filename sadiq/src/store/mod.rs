//! Persistent vector index over document chunks.
//!
//! The store keeps every chunk next to its embedding and answers queries by
//! brute-force cosine similarity, which is plenty for the few thousand chunks
//! a PDF folder produces. An index lives in its own directory as a single
//! `index.json` file that records the embedding model it was built with.
//!
//! # Example
//!
//! ```rust,ignore
//! use sadiq::store::VectorStore;
//!
//! let store = VectorStore::from_documents(chunks, embedder, Some(dir)).await?;
//! let hits = store.similarity_search("ما هي أمراض الأغنام؟", 3).await?;
//! ```

mod error;

pub use error::StoreError;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::document::Document;
use crate::embedding::{Embedding, EmbeddingModel, cosine_similarity};

/// File name of the persisted index inside its directory.
pub const INDEX_FILE: &str = "index.json";

/// Default number of documents returned by a retriever.
pub const DEFAULT_K: usize = 3;

const INDEX_VERSION: u32 = 1;
const EMBED_BATCH: usize = 256;

/// Something that returns the documents relevant to a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Fetch the documents most relevant to `query`, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be embedded or searched.
    async fn retrieve(&self, query: &str) -> crate::Result<Vec<Document>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    id: String,
    document: Document,
    vector: Embedding,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedIndex {
    version: u32,
    embedding_model: String,
    dimensions: Option<usize>,
    records: Vec<Record>,
}

/// A vector index backed by an embedding model.
///
/// Cloning is cheap and clones share the same records.
pub struct VectorStore<E> {
    embedder: Arc<E>,
    records: Arc<RwLock<Vec<Record>>>,
    persist_directory: Option<PathBuf>,
}

impl<E> Clone for VectorStore<E> {
    fn clone(&self) -> Self {
        Self {
            embedder: Arc::clone(&self.embedder),
            records: Arc::clone(&self.records),
            persist_directory: self.persist_directory.clone(),
        }
    }
}

impl<E> std::fmt::Debug for VectorStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("persist_directory", &self.persist_directory)
            .finish_non_exhaustive()
    }
}

impl<E: EmbeddingModel> VectorStore<E> {
    /// Create an empty store.
    #[must_use]
    pub fn new(embedder: E, persist_directory: Option<PathBuf>) -> Self {
        Self {
            embedder: Arc::new(embedder),
            records: Arc::new(RwLock::new(Vec::new())),
            persist_directory,
        }
    }

    /// Embed `documents` into a new store, persisting it when a directory is
    /// given.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding fails or the index cannot be written.
    #[instrument(skip_all, fields(count = documents.len()))]
    pub async fn from_documents(
        documents: Vec<Document>,
        embedder: E,
        persist_directory: Option<PathBuf>,
    ) -> Result<Self, StoreError> {
        let store = Self::new(embedder, persist_directory);
        store.add_documents(documents).await?;
        store.persist().await?;
        Ok(store)
    }

    /// Open the index persisted in `persist_directory`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the directory holds no index,
    /// [`StoreError::ModelMismatch`] when it was built with another model and
    /// [`StoreError::DimensionMismatch`] when a stored vector disagrees with
    /// the recorded dimensionality.
    #[instrument(skip_all, fields(dir = %persist_directory.as_ref().display()))]
    pub async fn load(
        persist_directory: impl AsRef<Path>,
        embedder: E,
    ) -> Result<Self, StoreError> {
        let dir = persist_directory.as_ref();
        let path = dir.join(INDEX_FILE);
        if !path.is_file() {
            return Err(StoreError::NotFound(dir.to_path_buf()));
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let index: PersistedIndex = serde_json::from_str(&content)?;

        if index.version != INDEX_VERSION {
            return Err(StoreError::UnsupportedVersion(index.version));
        }
        if index.embedding_model != embedder.model_id() {
            return Err(StoreError::ModelMismatch {
                expected: embedder.model_id().to_string(),
                found: index.embedding_model,
            });
        }

        let expected = index
            .dimensions
            .or_else(|| index.records.first().map(|r| r.vector.len()));
        if let Some(expected) = expected
            && let Some(bad) = index.records.iter().find(|r| r.vector.len() != expected)
        {
            return Err(StoreError::DimensionMismatch {
                expected,
                got: bad.vector.len(),
            });
        }

        info!(records = index.records.len(), "loaded vector index");
        Ok(Self {
            embedder: Arc::new(embedder),
            records: Arc::new(RwLock::new(index.records)),
            persist_directory: Some(dir.to_path_buf()),
        })
    }

    /// Whether `persist_directory` holds an index.
    #[must_use]
    pub fn exists(persist_directory: impl AsRef<Path>) -> bool {
        persist_directory.as_ref().join(INDEX_FILE).is_file()
    }

    /// Directory the store persists to, if any.
    #[must_use]
    pub fn persist_directory(&self) -> Option<&Path> {
        self.persist_directory.as_deref()
    }

    /// The embedding model.
    #[must_use]
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Number of stored chunks.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no chunks.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Dimensionality of the stored vectors, once known.
    pub async fn dimensions(&self) -> Option<usize> {
        self.records.read().await.first().map(|r| r.vector.len())
    }

    /// Embed and append `documents`, returning their new ids.
    ///
    /// Nothing is inserted if any vector fails the dimension check.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding fails or a vector has the wrong length.
    pub async fn add_documents(&self, documents: Vec<Document>) -> Result<Vec<String>, StoreError> {
        let mut new_records = Vec::with_capacity(documents.len());

        for (n, batch) in documents.chunks(EMBED_BATCH).enumerate() {
            let texts: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();
            let vectors = self.embedder.embed_documents(&texts).await?;
            debug!(batch = n, size = batch.len(), "embedded batch");

            for (document, vector) in batch.iter().zip(vectors) {
                new_records.push(Record {
                    id: uuid::Uuid::new_v4().to_string(),
                    document: document.clone(),
                    vector,
                });
            }
        }

        let mut records = self.records.write().await;
        let expected = records
            .first()
            .or_else(|| new_records.first())
            .map(|r| r.vector.len());
        if let Some(expected) = expected
            && let Some(bad) = new_records.iter().find(|r| r.vector.len() != expected)
        {
            return Err(StoreError::DimensionMismatch {
                expected,
                got: bad.vector.len(),
            });
        }

        let ids = new_records.iter().map(|r| r.id.clone()).collect();
        records.extend(new_records);
        debug!(total = records.len(), "documents added");
        Ok(ids)
    }

    /// The `k` chunks most similar to `query`, highest score first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be embedded or its vector has
    /// the wrong length.
    #[instrument(skip(self, query))]
    pub async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(Document, f32)>, StoreError> {
        if k == 0 || self.is_empty().await {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_query(query).await?;
        let records = self.records.read().await;

        if let Some(first) = records.first()
            && first.vector.len() != query_vector.len()
        {
            return Err(StoreError::DimensionMismatch {
                expected: first.vector.len(),
                got: query_vector.len(),
            });
        }

        let mut scored: Vec<(OrderedFloat<f32>, usize)> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (OrderedFloat(cosine_similarity(&query_vector, &r.vector)), i))
            .collect();
        // stable: ties keep insertion order
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, i)| (records[i].document.clone(), score.into_inner()))
            .collect())
    }

    /// The `k` chunks most similar to `query`.
    ///
    /// # Errors
    ///
    /// See [`Self::similarity_search_with_score`].
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .similarity_search_with_score(query, k)
            .await?
            .into_iter()
            .map(|(doc, _)| doc)
            .collect())
    }

    /// Write the index to its directory; a no-op for in-memory stores.
    ///
    /// The file is written beside the target and renamed into place, so a
    /// crash never leaves a half-written index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be serialized or written.
    pub async fn persist(&self) -> Result<(), StoreError> {
        let Some(dir) = &self.persist_directory else {
            debug!("no persist directory, skipping");
            return Ok(());
        };

        let content = {
            let records = self.records.read().await;
            let index = PersistedIndex {
                version: INDEX_VERSION,
                embedding_model: self.embedder.model_id().to_string(),
                dimensions: records.first().map(|r| r.vector.len()),
                records: records.clone(),
            };
            serde_json::to_string(&index)?
        };

        tokio::fs::create_dir_all(dir).await?;
        let target = dir.join(INDEX_FILE);
        let tmp = dir.join(format!("{INDEX_FILE}.tmp"));
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &target).await?;

        info!(path = %target.display(), "vector index persisted");
        Ok(())
    }

    /// A retriever returning the top `k` chunks per query.
    #[must_use]
    pub fn as_retriever(&self, k: usize) -> VectorStoreRetriever<E> {
        VectorStoreRetriever {
            store: self.clone(),
            k,
        }
    }
}

/// [`Retriever`] over a [`VectorStore`].
#[derive(Debug)]
pub struct VectorStoreRetriever<E> {
    store: VectorStore<E>,
    k: usize,
}

impl<E> Clone for VectorStoreRetriever<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            k: self.k,
        }
    }
}

impl<E> VectorStoreRetriever<E> {
    /// Number of documents returned per query.
    #[must_use]
    pub const fn k(&self) -> usize {
        self.k
    }
}

#[async_trait]
impl<E: EmbeddingModel> Retriever for VectorStoreRetriever<E> {
    async fn retrieve(&self, query: &str) -> crate::Result<Vec<Document>> {
        Ok(self.store.similarity_search(query, self.k).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::providers::MockEmbedding;
    use assert_fs::TempDir;

    fn docs() -> Vec<Document> {
        vec![
            Document::new("sheep need fresh water every day", "care.pdf").with_page(0),
            Document::new("wool is sheared once a year in spring", "wool.pdf").with_page(2),
            Document::new("vaccination schedule for lambs", "health.pdf").with_page(1),
        ]
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let store = VectorStore::from_documents(docs(), MockEmbedding::default(), None)
            .await
            .unwrap();
        assert_eq!(store.len().await, 3);

        let hits = store
            .similarity_search_with_score("when is wool sheared", 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.metadata.source, "wool.pdf");
        assert!(hits[0].1 >= hits[1].1);
    }

    #[tokio::test]
    async fn test_k_zero_and_empty_store() {
        let store = VectorStore::new(MockEmbedding::default(), None);
        assert!(store.similarity_search("anything", 3).await.unwrap().is_empty());

        store.add_documents(docs()).await.unwrap();
        assert!(store.similarity_search("sheep", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_k_larger_than_store() {
        let store = VectorStore::from_documents(docs(), MockEmbedding::default(), None)
            .await
            .unwrap();
        assert_eq!(store.similarity_search("sheep", 10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_add_documents_assigns_unique_ids() {
        let store = VectorStore::new(MockEmbedding::default(), None);
        let ids = store.add_documents(docs()).await.unwrap();
        assert_eq!(ids.len(), 3);
        assert_ne!(ids[0], ids[1]);
        assert!(uuid::Uuid::parse_str(&ids[2]).is_ok());
    }

    #[tokio::test]
    async fn test_persist_and_load() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("sheep");

        assert!(!VectorStore::<MockEmbedding>::exists(&dir));
        VectorStore::from_documents(docs(), MockEmbedding::default(), Some(dir.clone()))
            .await
            .unwrap();
        assert!(VectorStore::<MockEmbedding>::exists(&dir));
        assert!(!dir.join("index.json.tmp").exists());

        let loaded = VectorStore::load(&dir, MockEmbedding::default())
            .await
            .unwrap();
        assert_eq!(loaded.len().await, 3);
        assert_eq!(loaded.persist_directory(), Some(dir.as_path()));

        let hits = loaded.similarity_search("lambs vaccination", 1).await.unwrap();
        assert_eq!(hits[0].metadata.source, "health.pdf");
        assert_eq!(hits[0].metadata.page, Some(1));
    }

    #[tokio::test]
    async fn test_load_missing_index() {
        let temp = TempDir::new().unwrap();
        let err = VectorStore::load(temp.path(), MockEmbedding::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_load_with_other_model() {
        let temp = TempDir::new().unwrap();
        VectorStore::from_documents(
            docs(),
            MockEmbedding::default(),
            Some(temp.path().to_path_buf()),
        )
        .await
        .unwrap();

        let err = VectorStore::load(temp.path(), MockEmbedding::default().with_model_id("other"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ModelMismatch { .. }));
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let store = VectorStore::new(MockEmbedding::new(8), None);
        store.add_documents(docs()).await.unwrap();

        // Same records, queried through a differently sized embedder.
        let other = VectorStore {
            embedder: Arc::new(MockEmbedding::new(16)),
            records: Arc::clone(&store.records),
            persist_directory: None,
        };
        let err = other.similarity_search("sheep", 1).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 8,
                got: 16
            }
        ));

        let err = other.add_documents(docs()).await.unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { .. }));
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_load_rejects_inconsistent_vectors() {
        let temp = TempDir::new().unwrap();
        VectorStore::from_documents(
            docs(),
            MockEmbedding::new(8),
            Some(temp.path().to_path_buf()),
        )
        .await
        .unwrap();

        // Truncate one stored vector by hand.
        let path = temp.path().join(INDEX_FILE);
        let mut index: PersistedIndex =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(index.dimensions, Some(8));
        index.records[1].vector.truncate(5);
        std::fs::write(&path, serde_json::to_string(&index).unwrap()).unwrap();

        let err = VectorStore::load(temp.path(), MockEmbedding::new(8))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 8,
                got: 5
            }
        ));
    }

    struct FailingEmbedding;

    #[async_trait]
    impl EmbeddingModel for FailingEmbedding {
        fn model_id(&self) -> &str {
            "failing"
        }

        async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Embedding>, LlmError> {
            Err(LlmError::network("connection refused"))
        }
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let err = VectorStore::from_documents(docs(), FailingEmbedding, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_retriever_uses_k() {
        let store = VectorStore::from_documents(docs(), MockEmbedding::default(), None)
            .await
            .unwrap();
        let retriever = store.as_retriever(2);
        assert_eq!(retriever.k(), 2);
        assert_eq!(retriever.retrieve("sheep water").await.unwrap().len(), 2);
    }
}
