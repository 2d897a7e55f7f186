//! Sadiq CLI - ask questions about your PDFs, answered in Arabic.

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use sadiq::chain::ConversationalRetrievalChain;
use sadiq::config::{DEFAULT_CHAT_MODEL, DEFAULT_DB_ROOT, DEFAULT_EMBEDDING_MODEL, RagConfig};
use sadiq::embedding::EmbeddingModel;
use sadiq::harvest::{DEFAULT_OUTPUT_DIR, PdfHarvester};
use sadiq::providers::openai::{GPT_4O_MINI, TEXT_EMBEDDING_3_SMALL};
use sadiq::providers::{Model, OllamaClient, OpenAIClient};
use sadiq::query::AnswerLanguage;
use sadiq_cli::{ChatBot, ChatBotConfig, build_index, open_index};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Supported chat providers.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum Provider {
    /// Groq (hosted Llama)
    #[default]
    Groq,
    /// OpenAI
    Openai,
    /// Ollama (local models)
    Ollama,
}

/// Supported embedding providers.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum EmbeddingProvider {
    /// Ollama (local models)
    #[default]
    Ollama,
    /// OpenAI
    Openai,
}

/// Sadiq CLI - question answering over PDF collections
#[derive(Parser, Debug)]
#[command(name = "sadiq")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    models: ModelArgs,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Model and index settings shared by all subcommands.
#[derive(Args, Debug)]
pub struct ModelArgs {
    /// Chat provider
    #[arg(short, long, value_enum, global = true, default_value_t = Provider::Groq)]
    provider: Provider,

    /// Chat model name (provider-specific, uses default if not specified)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Embedding provider
    #[arg(long, value_enum, global = true, default_value_t = EmbeddingProvider::Ollama)]
    embedding_provider: EmbeddingProvider,

    /// Embedding model name (uses provider default if not specified)
    #[arg(long, global = true)]
    embedding_model: Option<String>,

    /// Ollama server URL
    #[arg(long, global = true, env = "OLLAMA_HOST", default_value = "http://localhost:11434")]
    ollama_url: String,

    /// Groq API key
    #[arg(long, global = true, env = "GROQ_API_KEY", hide_env_values = true)]
    groq_api_key: Option<String>,

    /// OpenAI API key
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Directory holding one index per PDF path
    #[arg(long, global = true, default_value = DEFAULT_DB_ROOT)]
    db_root: PathBuf,

    /// Number of chunks retrieved per question
    #[arg(long, global = true, default_value_t = 3)]
    top_k: usize,

    /// Sampling temperature
    #[arg(long, global = true, default_value_t = 0.7)]
    temperature: f32,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the vector index for a PDF file or folder
    Index {
        /// PDF file or folder
        pdf_path: PathBuf,
        /// Rebuild even if an index already exists
        #[arg(long)]
        force: bool,
    },
    /// Answer a single question
    Ask {
        /// PDF file or folder
        pdf_path: PathBuf,
        /// The question
        question: String,
        /// Ask for the answer in Arabic
        #[arg(long, action = ArgAction::Set, default_value_t = true)]
        arabic: bool,
    },
    /// Chat interactively about an indexed PDF path
    Chat {
        /// PDF file or folder
        pdf_path: PathBuf,
        /// Ask for answers in Arabic
        #[arg(long, action = ArgAction::Set, default_value_t = true)]
        arabic: bool,
        /// Save and restore the conversation in this file
        #[arg(long)]
        history: Option<PathBuf>,
        /// Show token usage after each answer
        #[arg(long)]
        usage: bool,
    },
    /// Download every PDF linked from a web page
    Harvest {
        /// Page to scan for PDF links
        url: String,
        /// Download folder
        #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
        out: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("sadiq=debug,sadiq_cli=debug")
    } else {
        EnvFilter::new("sadiq=warn,sadiq_cli=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

const fn language(arabic: bool) -> AnswerLanguage {
    if arabic {
        AnswerLanguage::Arabic
    } else {
        AnswerLanguage::AsAsked
    }
}

impl ModelArgs {
    fn rag_config(&self) -> RagConfig {
        let chat_model = self.model.clone().unwrap_or_else(|| {
            match self.provider {
                Provider::Groq => DEFAULT_CHAT_MODEL,
                Provider::Openai => GPT_4O_MINI,
                Provider::Ollama => "llama3.2",
            }
            .to_string()
        });
        let embedding_model = self.embedding_model.clone().unwrap_or_else(|| {
            match self.embedding_provider {
                EmbeddingProvider::Ollama => DEFAULT_EMBEDDING_MODEL,
                EmbeddingProvider::Openai => TEXT_EMBEDDING_3_SMALL,
            }
            .to_string()
        });

        RagConfig {
            top_k: self.top_k,
            temperature: self.temperature,
            chat_model,
            embedding_model,
            db_root: self.db_root.clone(),
            ..RagConfig::default()
        }
    }

    fn openai_client(&self) -> anyhow::Result<OpenAIClient> {
        let key = self
            .openai_api_key
            .clone()
            .context("OPENAI_API_KEY is not set (or pass --openai-api-key)")?;
        Ok(OpenAIClient::new(key)?)
    }

    fn ollama_client(&self) -> anyhow::Result<OllamaClient> {
        Ok(OllamaClient::builder().base_url(&self.ollama_url).build()?)
    }

    /// Fail early when a configured Ollama server is down, and warn about
    /// models that have not been pulled.
    async fn check_ollama(&self, config: &RagConfig, needs_chat: bool) -> anyhow::Result<()> {
        let mut models = Vec::new();
        if matches!(self.embedding_provider, EmbeddingProvider::Ollama) {
            models.push(config.embedding_model.as_str());
        }
        if needs_chat && matches!(self.provider, Provider::Ollama) {
            models.push(config.chat_model.as_str());
        }
        if models.is_empty() {
            return Ok(());
        }

        let client = self.ollama_client()?;
        let healthy = client.health_check().await.with_context(|| {
            format!(
                "Ollama is not reachable at {} (start `ollama serve` or set OLLAMA_HOST)",
                self.ollama_url
            )
        })?;
        if !healthy {
            bail!("Ollama at {} is not ready", self.ollama_url);
        }

        let available = client.list_models().await?;
        for model in models {
            let pulled = available
                .iter()
                .any(|name| name == model || name.split(':').next() == Some(model));
            if !pulled {
                warn!(model, "model not found on the Ollama server, run `ollama pull {model}`");
            }
        }
        Ok(())
    }

    fn chat_model(&self, config: &RagConfig) -> anyhow::Result<Box<dyn Model>> {
        let model: Box<dyn Model> = match self.provider {
            Provider::Groq => {
                let key = self
                    .groq_api_key
                    .clone()
                    .context("GROQ_API_KEY is not set (or pass --groq-api-key)")?;
                Box::new(OpenAIClient::groq(key)?.completion_model(&config.chat_model))
            }
            Provider::Openai => {
                Box::new(self.openai_client()?.completion_model(&config.chat_model))
            }
            Provider::Ollama => {
                Box::new(self.ollama_client()?.completion_model(&config.chat_model))
            }
        };
        Ok(model)
    }

    fn embedder(&self, config: &RagConfig) -> anyhow::Result<Box<dyn EmbeddingModel>> {
        let embedder: Box<dyn EmbeddingModel> = match self.embedding_provider {
            EmbeddingProvider::Ollama => Box::new(
                self.ollama_client()?
                    .embedding_model(&config.embedding_model)
                    .with_batch_size(config.embedding_batch_size),
            ),
            EmbeddingProvider::Openai => Box::new(
                self.openai_client()?
                    .embedding_model(&config.embedding_model)
                    .with_batch_size(config.embedding_batch_size),
            ),
        };
        Ok(embedder)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.models.rag_config();

    match cli.command {
        Command::Index { pdf_path, force } => {
            cli.models.check_ollama(&config, false).await?;
            let embedder = cli.models.embedder(&config)?;
            let store = build_index(&pdf_path, embedder, &config, force).await?;
            info!(
                chunks = store.len().await,
                dir = %config.persist_directory_for(&pdf_path).display(),
                "index ready"
            );
        }
        Command::Ask {
            pdf_path,
            question,
            arabic,
        } => {
            cli.models.check_ollama(&config, true).await?;
            let embedder = cli.models.embedder(&config)?;
            let store = build_index(&pdf_path, embedder, &config, false).await?;
            let llm = cli.models.chat_model(&config)?;
            let chain = ConversationalRetrievalChain::builder(llm, store.as_retriever(config.top_k))
                .config(&config)
                .build();

            let mut chatbot = ChatBot::new(
                chain,
                ChatBotConfig {
                    language: language(arabic),
                    ..ChatBotConfig::default()
                },
            );
            let response = chatbot.ask(&question).await?;
            chatbot.print_response(&mut std::io::stdout(), &response)?;
        }
        Command::Chat {
            pdf_path,
            arabic,
            history,
            usage,
        } => {
            cli.models.check_ollama(&config, true).await?;
            let embedder = cli.models.embedder(&config)?;
            let Some(store) = open_index(&pdf_path, embedder, &config).await? else {
                warn!(
                    path = %pdf_path.display(),
                    "no index found for this path, run `sadiq index` first"
                );
                return Ok(());
            };
            let llm = cli.models.chat_model(&config)?;
            let chain = ConversationalRetrievalChain::builder(llm, store.as_retriever(config.top_k))
                .config(&config)
                .build();

            let mut chatbot = ChatBot::new(
                chain,
                ChatBotConfig {
                    language: language(arabic),
                    show_sources: true,
                    show_usage: usage,
                    history_path: history,
                },
            );
            chatbot.restore_history().await?;
            chatbot.run().await?;
        }
        Command::Harvest { url, out } => {
            let harvester = PdfHarvester::new(out)?;
            let report = harvester.harvest(&url).await?;
            info!(
                found = report.found,
                downloaded = report.downloaded.len(),
                skipped = report.skipped.len(),
                failed = report.failed.len(),
                dir = %harvester.output_dir().display(),
                "harvest finished"
            );
        }
    }

    Ok(())
}
