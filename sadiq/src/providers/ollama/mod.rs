//! Ollama provider for local chat and embeddings.

mod client;
pub mod completion;
pub mod embedding;

pub use client::{OLLAMA_API_BASE_URL, OllamaClient, OllamaClientBuilder};
pub use completion::CompletionModel;
pub use embedding::{EmbeddingModel, NOMIC_EMBED_TEXT};
