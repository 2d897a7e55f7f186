//! OpenAI-compatible provider (OpenAI, Groq).

mod client;
pub mod completion;
pub mod embedding;

pub use client::{GROQ_API_BASE_URL, OPENAI_API_BASE_URL, OpenAIClient, OpenAIClientBuilder};
pub use completion::{CompletionModel, GPT_4O_MINI, LLAMA_3_3_70B_VERSATILE};
pub use embedding::{EmbeddingModel, TEXT_EMBEDDING_3_SMALL};
