//! Conversational retrieval chain.
//!
//! Each call to [`ConversationalRetrievalChain::invoke`]:
//!
//! 1. Condenses the chat history and the follow-up into a standalone question
//!    (skipped while the memory is empty)
//! 2. Retrieves the relevant chunks for that question
//! 3. Stuffs the chunks into a system prompt and asks the model
//! 4. Appends the original question and the answer to memory

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::config::RagConfig;
use crate::document::Document;
use crate::error::Result;
use crate::memory::ConversationMemory;
use crate::message::ChatMessage;
use crate::providers::{GenerateOptions, Model, TokenUsage};
use crate::store::Retriever;

/// System prompt used to answer from retrieved context. `{context}` is
/// replaced by the retrieved chunks.
pub const DEFAULT_QA_PROMPT: &str = "Use the following pieces of context to answer the user's question. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.
----------------
{context}";

/// Prompt that rewrites a follow-up into a standalone question.
/// `{chat_history}` and `{question}` are substituted.
pub const DEFAULT_CONDENSE_PROMPT: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.

Chat History:
{chat_history}
Follow Up Input: {question}
Standalone question:";

/// Result of one chain invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainResponse {
    /// The model's answer.
    pub answer: String,
    /// Chunks the answer was grounded on; empty when source documents are
    /// not requested.
    pub source_documents: Vec<Document>,
    /// Question actually used for retrieval.
    pub generated_question: String,
    /// Tokens spent across all model calls.
    pub token_usage: TokenUsage,
}

/// Retrieval-augmented question answering with chat memory.
pub struct ConversationalRetrievalChain {
    llm: Arc<dyn Model>,
    retriever: Arc<dyn Retriever>,
    memory: ConversationMemory,
    options: GenerateOptions,
    return_source_documents: bool,
    qa_prompt: String,
    condense_prompt: String,
}

impl std::fmt::Debug for ConversationalRetrievalChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationalRetrievalChain")
            .field("llm", &self.llm.model_id())
            .field("memory_len", &self.memory.len())
            .field("return_source_documents", &self.return_source_documents)
            .finish_non_exhaustive()
    }
}

impl ConversationalRetrievalChain {
    /// Start building a chain around `llm` and `retriever`.
    pub fn builder(
        llm: impl Model + 'static,
        retriever: impl Retriever + 'static,
    ) -> ConversationalRetrievalChainBuilder {
        ConversationalRetrievalChainBuilder::new(Arc::new(llm), Arc::new(retriever))
    }

    /// Answer `question`, using and updating the conversation memory.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or any model call fails. Memory is left
    /// untouched in that case.
    #[instrument(skip(self, question), fields(model = self.llm.model_id(), history = self.memory.len()))]
    pub async fn invoke(&mut self, question: &str) -> Result<ChainResponse> {
        let mut usage = TokenUsage::default();

        let generated_question = if self.memory.is_empty() {
            question.to_string()
        } else {
            let prompt = self
                .condense_prompt
                .replace("{chat_history}", &self.memory.buffer_string())
                .replace("{question}", question);
            let response = self
                .llm
                .generate(vec![ChatMessage::user(prompt)], self.options.clone())
                .await?;
            usage += response.token_usage.unwrap_or_default();
            let condensed = response.content.trim();
            if condensed.is_empty() {
                question.to_string()
            } else {
                condensed.to_string()
            }
        };
        debug!(question = %generated_question, "standalone question");

        let documents = self.retriever.retrieve(&generated_question).await?;
        debug!(count = documents.len(), "documents retrieved");

        let context = documents
            .iter()
            .map(|d| d.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let messages = vec![
            ChatMessage::system(self.qa_prompt.replace("{context}", &context)),
            ChatMessage::user(generated_question.clone()),
        ];
        let response = self.llm.generate(messages, self.options.clone()).await?;
        usage += response.token_usage.unwrap_or_default();

        let answer = response.content;
        self.memory.save_context(question, answer.clone());
        info!(tokens = usage.total(), sources = documents.len(), "question answered");

        Ok(ChainResponse {
            answer,
            source_documents: if self.return_source_documents {
                documents
            } else {
                Vec::new()
            },
            generated_question,
            token_usage: usage,
        })
    }

    /// The conversation so far.
    #[must_use]
    pub const fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Replace the conversation memory, e.g. with one restored from disk.
    pub fn set_memory(&mut self, memory: ConversationMemory) {
        self.memory = memory;
    }

    /// Forget the conversation.
    pub fn clear_memory(&mut self) {
        self.memory.clear();
    }
}

/// Builder for [`ConversationalRetrievalChain`].
pub struct ConversationalRetrievalChainBuilder {
    llm: Arc<dyn Model>,
    retriever: Arc<dyn Retriever>,
    memory: ConversationMemory,
    options: GenerateOptions,
    return_source_documents: bool,
    qa_prompt: String,
    condense_prompt: String,
}

impl std::fmt::Debug for ConversationalRetrievalChainBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationalRetrievalChainBuilder")
            .field("llm", &self.llm.model_id())
            .finish_non_exhaustive()
    }
}

impl ConversationalRetrievalChainBuilder {
    fn new(llm: Arc<dyn Model>, retriever: Arc<dyn Retriever>) -> Self {
        Self {
            llm,
            retriever,
            memory: ConversationMemory::new(),
            options: GenerateOptions::new(),
            return_source_documents: true,
            qa_prompt: DEFAULT_QA_PROMPT.to_string(),
            condense_prompt: DEFAULT_CONDENSE_PROMPT.to_string(),
        }
    }

    /// Start from an existing conversation.
    #[must_use]
    pub fn memory(mut self, memory: ConversationMemory) -> Self {
        self.memory = memory;
        self
    }

    /// Generation options for every model call.
    #[must_use]
    pub fn options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    /// Take temperature and token limit from `config`.
    #[must_use]
    pub fn config(mut self, config: &RagConfig) -> Self {
        self.options = self
            .options
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens);
        self
    }

    /// Whether responses carry their source chunks (default `true`).
    #[must_use]
    pub const fn return_source_documents(mut self, enabled: bool) -> Self {
        self.return_source_documents = enabled;
        self
    }

    /// Replace the answering prompt; must contain `{context}`.
    #[must_use]
    pub fn qa_prompt(mut self, template: impl Into<String>) -> Self {
        self.qa_prompt = template.into();
        self
    }

    /// Replace the condensing prompt; should contain `{chat_history}` and
    /// `{question}`.
    #[must_use]
    pub fn condense_prompt(mut self, template: impl Into<String>) -> Self {
        self.condense_prompt = template.into();
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> ConversationalRetrievalChain {
        ConversationalRetrievalChain {
            llm: self.llm,
            retriever: self.retriever,
            memory: self.memory,
            options: self.options,
            return_source_documents: self.return_source_documents,
            qa_prompt: self.qa_prompt,
            condense_prompt: self.condense_prompt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageRole;
    use crate::providers::{MockEmbedding, MockModel};
    use crate::store::VectorStore;
    use async_trait::async_trait;

    async fn retriever() -> impl Retriever {
        let docs = vec![
            Document::new("Sheep should be sheared in spring.", "wool.pdf"),
            Document::new("Lambs are vaccinated at eight weeks.", "health.pdf"),
        ];
        VectorStore::from_documents(docs, MockEmbedding::default(), None)
            .await
            .unwrap()
            .as_retriever(1)
    }

    #[tokio::test]
    async fn test_first_question_skips_condensing() {
        let llm = Arc::new(MockModel::new(["In spring."]));
        let mut chain =
            ConversationalRetrievalChain::builder(Arc::clone(&llm), retriever().await).build();

        let response = chain.invoke("When are sheep sheared?").await.unwrap();
        assert_eq!(response.answer, "In spring.");
        assert_eq!(response.generated_question, "When are sheep sheared?");
        assert_eq!(response.source_documents.len(), 1);
        assert_eq!(response.source_documents[0].metadata.source, "wool.pdf");
        assert!(!response.token_usage.is_empty());

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0][0].role, MessageRole::System);
        assert!(prompts[0][0].content.contains("Sheep should be sheared in spring."));
        assert!(prompts[0][0].content.starts_with("Use the following pieces of context"));
        assert_eq!(prompts[0][1].content, "When are sheep sheared?");

        assert_eq!(chain.memory().len(), 2);
    }

    #[tokio::test]
    async fn test_follow_up_is_condensed() {
        let llm = Arc::new(MockModel::new([
            "In spring.",
            "When are lambs vaccinated?",
            "At eight weeks.",
        ]));
        let mut chain =
            ConversationalRetrievalChain::builder(Arc::clone(&llm), retriever().await).build();

        chain.invoke("When are sheep sheared?").await.unwrap();
        let response = chain.invoke("And the lambs?").await.unwrap();

        assert_eq!(response.generated_question, "When are lambs vaccinated?");
        assert_eq!(response.answer, "At eight weeks.");
        assert_eq!(response.source_documents[0].metadata.source, "health.pdf");

        let prompts = llm.prompts();
        let condense = &prompts[1][0].content;
        assert!(condense.contains("Human: When are sheep sheared?\nAssistant: In spring."));
        assert!(condense.contains("Follow Up Input: And the lambs?"));

        // Memory keeps the question as asked, not the rewritten one.
        assert_eq!(chain.memory().messages()[2].content, "And the lambs?");
    }

    #[tokio::test]
    async fn test_sources_can_be_disabled() {
        let mut chain =
            ConversationalRetrievalChain::builder(MockModel::new(["ok"]), retriever().await)
                .return_source_documents(false)
                .build();
        let response = chain.invoke("sheep").await.unwrap();
        assert!(response.source_documents.is_empty());
    }

    #[tokio::test]
    async fn test_failure_leaves_memory_untouched() {
        let llm = MockModel::new(Vec::<String>::new());
        let mut chain = ConversationalRetrievalChain::builder(llm, retriever().await).build();
        assert!(chain.invoke("sheep").await.is_err());
        assert!(chain.memory().is_empty());
    }

    #[tokio::test]
    async fn test_clear_memory_restarts_conversation() {
        let llm = Arc::new(MockModel::new(["a", "b"]));
        let mut chain =
            ConversationalRetrievalChain::builder(Arc::clone(&llm), retriever().await).build();

        chain.invoke("first").await.unwrap();
        chain.clear_memory();
        let response = chain.invoke("second").await.unwrap();

        assert_eq!(response.generated_question, "second");
        assert_eq!(llm.call_count(), 2);
    }

    struct EmptyRetriever;

    #[async_trait]
    impl Retriever for EmptyRetriever {
        async fn retrieve(&self, _query: &str) -> Result<Vec<Document>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_config_sets_generation_options() {
        let config = RagConfig::default();
        let llm = MockModel::new(["I don't know."]);
        let mut chain = ConversationalRetrievalChain::builder(llm, EmptyRetriever)
            .config(&config)
            .build();
        assert_eq!(chain.options.max_tokens, Some(2048));

        let response = chain.invoke("anything").await.unwrap();
        assert_eq!(response.answer, "I don't know.");
        assert!(response.source_documents.is_empty());
    }
}
