//! Commonly used types, re-exported for glob import.

pub use crate::chain::{ChainResponse, ConversationalRetrievalChain};
pub use crate::config::{RagConfig, RetryConfig};
pub use crate::document::{Document, DocumentMetadata};
pub use crate::embedding::{Embedding, EmbeddingModel};
pub use crate::error::{Error, LlmError, Result};
pub use crate::harvest::{HarvestReport, PdfHarvester};
pub use crate::loader::PdfLoader;
pub use crate::memory::ConversationMemory;
pub use crate::message::{ChatMessage, MessageRole};
pub use crate::providers::{
    GenerateOptions, MockEmbedding, MockModel, Model, OllamaClient, OpenAIClient,
};
pub use crate::query::{AnswerLanguage, QueryResponse, query_documents};
pub use crate::splitter::RecursiveCharacterTextSplitter;
pub use crate::store::{Retriever, VectorStore};
