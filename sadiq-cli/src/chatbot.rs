//! Interactive question answering in the terminal.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use sadiq::chain::{ChainResponse, ConversationalRetrievalChain};
use sadiq::document::Document;
use sadiq::memory::ConversationMemory;
use sadiq::query::AnswerLanguage;
use tracing::{error, warn};

const SOURCE_PREVIEW_CHARS: usize = 200;

/// Configuration for the chatbot.
#[derive(Debug, Clone)]
pub struct ChatBotConfig {
    /// Language answers are requested in.
    pub language: AnswerLanguage,
    /// Whether to list source chunks after each answer.
    pub show_sources: bool,
    /// Whether to display token usage after each answer.
    pub show_usage: bool,
    /// File the conversation is saved to after every turn.
    pub history_path: Option<PathBuf>,
}

impl Default for ChatBotConfig {
    fn default() -> Self {
        Self {
            language: AnswerLanguage::Arabic,
            show_sources: true,
            show_usage: false,
            history_path: None,
        }
    }
}

/// A REPL around a [`ConversationalRetrievalChain`].
#[derive(Debug)]
pub struct ChatBot {
    chain: ConversationalRetrievalChain,
    config: ChatBotConfig,
}

impl ChatBot {
    /// Create a new chatbot.
    #[inline]
    pub const fn new(chain: ConversationalRetrievalChain, config: ChatBotConfig) -> Self {
        Self { chain, config }
    }

    /// Restore the conversation from [`ChatBotConfig::history_path`] when the
    /// file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn restore_history(&mut self) -> Result<(), sadiq::memory::MemoryError> {
        if let Some(path) = &self.config.history_path
            && path.is_file()
        {
            let memory = ConversationMemory::load(path).await?;
            self.chain.set_memory(memory);
        }
        Ok(())
    }

    /// Ask one question in the configured language.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or generation fails.
    pub async fn ask(&mut self, question: &str) -> sadiq::Result<ChainResponse> {
        let response = self.chain.invoke(&self.config.language.wrap(question)).await?;
        self.save_history().await;
        Ok(response)
    }

    /// Run the interactive loop on stdin/stdout.
    ///
    /// # Errors
    ///
    /// Returns an error only if writing to stdout fails.
    pub async fn run(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        self.run_with(stdin.lock(), io::stdout()).await
    }

    /// Run the interactive loop on arbitrary input and output.
    ///
    /// `exit` or `quit` (or end of input) leaves, `clear` resets the
    /// conversation, blank lines are ignored. A failed question is logged
    /// and the loop continues.
    ///
    /// # Errors
    ///
    /// Returns an error only if writing to `output` fails.
    pub async fn run_with<R: BufRead, W: Write>(
        &mut self,
        mut input: R,
        mut output: W,
    ) -> io::Result<()> {
        writeln!(
            output,
            "Sadiq (type 'exit' or 'quit' to leave, 'clear' to reset the conversation)"
        )?;
        writeln!(output)?;

        loop {
            write!(output, "> ")?;
            output.flush()?;

            let mut line = String::new();
            match input.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "could not read input");
                    continue;
                }
            }

            let question = line.trim();
            if question.is_empty() {
                continue;
            }

            match question {
                "exit" | "quit" => break,
                "clear" => {
                    self.chain.clear_memory();
                    self.save_history().await;
                    writeln!(output, "Conversation cleared.")?;
                    continue;
                }
                _ => {}
            }

            match self.ask(question).await {
                Ok(response) => self.print_response(&mut output, &response)?,
                Err(e) => error!(error = %e, "failed to answer question"),
            }
            writeln!(output)?;
        }

        Ok(())
    }

    /// Print an answer, its sources and token usage as configured.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn print_response<W: Write>(
        &self,
        output: &mut W,
        response: &ChainResponse,
    ) -> io::Result<()> {
        writeln!(output)?;
        writeln!(output, "{}", response.answer)?;

        if self.config.show_sources && !response.source_documents.is_empty() {
            writeln!(output)?;
            writeln!(output, "Sources:")?;
            for doc in &response.source_documents {
                writeln!(output, "- {}", describe_source(doc))?;
            }
        }

        if self.config.show_usage && !response.token_usage.is_empty() {
            writeln!(
                output,
                "[Tokens: {} in / {} out]",
                response.token_usage.input_tokens, response.token_usage.output_tokens
            )?;
        }
        Ok(())
    }

    /// The conversation so far.
    #[inline]
    pub const fn memory(&self) -> &ConversationMemory {
        self.chain.memory()
    }

    async fn save_history(&self) {
        if let Some(path) = &self.config.history_path
            && let Err(e) = self.chain.memory().save(path).await
        {
            warn!(path = %path.display(), error = %e, "could not save conversation");
        }
    }
}

fn describe_source(doc: &Document) -> String {
    let location = doc.metadata.page.map_or_else(
        || doc.metadata.source.clone(),
        |page| format!("{} (page {})", doc.metadata.source, page + 1),
    );
    format!("{location}: {}", doc.preview(SOURCE_PREVIEW_CHARS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use sadiq::providers::{MockEmbedding, MockModel};
    use sadiq::store::VectorStore;
    use std::sync::Arc;

    async fn chatbot(llm: Arc<MockModel>, config: ChatBotConfig) -> ChatBot {
        let docs = vec![
            Document::new("The Timahdite breed comes from the Middle Atlas.", "breed.pdf")
                .with_page(4),
        ];
        let store = VectorStore::from_documents(docs, MockEmbedding::default(), None)
            .await
            .unwrap();
        let chain = ConversationalRetrievalChain::builder(llm, store.as_retriever(3)).build();
        ChatBot::new(chain, config)
    }

    #[tokio::test]
    async fn test_repl_commands() {
        let llm = Arc::new(MockModel::new(["first answer", "second answer"]));
        let mut bot = chatbot(Arc::clone(&llm), ChatBotConfig::default()).await;

        let input = "\n  \nWhere is the breed from?\nclear\nAnd again?\nexit\nnever asked\n";
        let mut output = Vec::new();
        bot.run_with(input.as_bytes(), &mut output).await.unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.contains("first answer"));
        assert!(output.contains("Conversation cleared."));
        assert!(output.contains("- breed.pdf (page 5): The Timahdite breed"));
        assert!(output.contains("second answer"));

        // Two questions, and no condensing call since memory was cleared in between.
        assert_eq!(llm.call_count(), 2);
        assert_eq!(bot.memory().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_question_keeps_loop_alive() {
        let llm = Arc::new(MockModel::new(Vec::<String>::new()));
        let mut bot = chatbot(Arc::clone(&llm), ChatBotConfig::default()).await;

        let mut output = Vec::new();
        bot.run_with("one\ntwo\n".as_bytes(), &mut output)
            .await
            .unwrap();

        assert_eq!(llm.call_count(), 2);
        assert!(bot.memory().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_saved_and_restored() {
        let temp = TempDir::new().unwrap();
        let history = temp.path().join("chat.json");
        let config = ChatBotConfig {
            language: AnswerLanguage::AsAsked,
            show_sources: false,
            show_usage: true,
            history_path: Some(history.clone()),
        };

        let mut bot = chatbot(Arc::new(MockModel::new(["answer"])), config.clone()).await;
        let response = bot.ask("question").await.unwrap();
        let mut output = Vec::new();
        bot.print_response(&mut output, &response).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(!output.contains("Sources:"));
        assert!(output.contains("[Tokens:"));
        assert!(history.is_file());

        let mut restored = chatbot(Arc::new(MockModel::new(Vec::<String>::new())), config).await;
        restored.restore_history().await.unwrap();
        assert_eq!(restored.memory().messages()[0].content, "question");
    }
}
