//! Sadiq answers questions about a folder of PDF documents, in Arabic by
//! default.
//!
//! The pipeline is the classic retrieval-augmented one:
//!
//! 1. [`loader`] extracts page text from PDFs
//! 2. [`splitter`] cuts pages into overlapping chunks
//! 3. [`store`] embeds the chunks and persists a vector index per folder
//! 4. [`chain`] condenses follow-ups, retrieves context and asks the model
//! 5. [`query`] wraps questions so the answer comes back in Arabic
//!
//! [`harvest`] is a companion that downloads the PDFs linked from a web page.
//!
//! # Example
//!
//! ```rust,ignore
//! use sadiq::prelude::*;
//!
//! let config = RagConfig::default();
//! let pages = PdfLoader::new().load("downloaded_pdfs")?;
//! let splitter = RecursiveCharacterTextSplitter::new(config.chunk_size, config.chunk_overlap)?;
//! let chunks = splitter.split_documents(&pages);
//!
//! let embedder = OllamaClient::new()?.embedding_model(&config.embedding_model);
//! let store = VectorStore::from_documents(chunks, embedder, None).await?;
//!
//! let llm = OpenAIClient::groq_from_env()?.completion_model(&config.chat_model);
//! let mut chain = ConversationalRetrievalChain::builder(llm, store.as_retriever(config.top_k))
//!     .config(&config)
//!     .build();
//!
//! let response = query_documents(&mut chain, "ما هو موضوع المستند؟", AnswerLanguage::Arabic).await?;
//! println!("{}", response.answer);
//! ```

pub mod chain;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod harvest;
pub mod loader;
pub mod memory;
pub mod message;
pub mod prelude;
pub mod providers;
pub mod query;
pub mod splitter;
pub mod store;

pub use error::{Error, LlmError, LlmErrorKind, Result};
