use crate::llm::{LlmSettings, Provider};
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::env;
use std::path::Path;
use uuid::Uuid;

/// Config file read when `--config` is not given. Optional.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Memory table to operate on
    #[arg(long, env = "MEMORY_TABLE")]
    pub table: Option<String>,

    /// Storage backend (`memory` or `postgres`)
    #[arg(long, env = "PERSISTENCE_PROVIDER")]
    pub persistence: Option<String>,

    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Embedding provider (`hash`, `fastembed` or `openai`)
    #[arg(long, env = "EMBEDDING_PROVIDER")]
    pub embedding: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    #[command(flatten)]
    Memory(MemoryCommand),
    /// List evaluators, or ask the model which apply to a message
    Evaluators {
        /// YAML file with evaluator definitions; built-ins when omitted
        #[arg(long)]
        file: Option<String>,
        /// Message to run selection against
        #[arg(long)]
        message: Option<String>,
        #[arg(long, default_value = "Agent")]
        agent: String,
        #[arg(long, default_value = "User")]
        sender: String,
    },
}

/// Subcommands that operate on the memory store.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum MemoryCommand {
    /// Embed and store a memory for a user
    Remember {
        /// Owner of the memory
        user: Uuid,
        /// Memory text
        text: String,
        /// Action tag attached to the content
        #[arg(long)]
        action: Option<String>,
        /// Store without the near-duplicate check
        #[arg(long)]
        allow_duplicates: bool,
    },
    /// Search memories similar to a query
    Recall {
        query: String,
        /// Restrict to these users (repeatable); all users when omitted
        #[arg(long = "user")]
        users: Vec<Uuid>,
        #[arg(long, default_value_t = 0.1)]
        threshold: f32,
        #[arg(long, default_value_t = 10)]
        count: usize,
        /// Only return memories flagged unique
        #[arg(long)]
        unique: bool,
        /// Match on edit distance instead of embeddings
        #[arg(long)]
        fuzzy: bool,
    },
    /// Count memories for users
    Count {
        #[arg(required = true)]
        users: Vec<Uuid>,
        /// Include near-duplicates
        #[arg(long)]
        all: bool,
    },
    /// Remove a memory by id, or every memory of the given users
    Forget {
        #[arg(long, conflicts_with = "users", required_unless_present = "users")]
        id: Option<Uuid>,
        #[arg(long = "user")]
        users: Vec<Uuid>,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub memory: MemorySettings,
    pub persistence: PersistenceConfig,
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemorySettings {
    pub table: String,
    /// Cosine similarity at or above which a new memory is a near-duplicate.
    pub dedup_threshold: f32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PersistenceConfig {
    pub provider: String,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub provider: String,
    /// Vector length of the `hash` and `openai` providers. Unset uses the
    /// provider default (384 for `hash`, inferred from the model for `openai`).
    pub dimensions: Option<usize>,
    /// Model name for the `openai` provider.
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Cached embeddings kept in memory; 0 disables the cache.
    pub cache_entries: usize,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    /// Layer defaults, the config file, `RECALL_*` env vars and CLI flags.
    ///
    /// Precedence, lowest first: defaults, YAML file (`--config`, else
    /// `./config.yaml` when present), `RECALL_SECTION__KEY` env vars, CLI
    /// flags and their env aliases.
    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder()
            .set_default("memory.table", "messages")?
            .set_default("memory.dedup_threshold", 0.95)?
            .set_default("persistence.provider", "memory")?
            .set_default("persistence.max_connections", 5)?
            .set_default("embedding.provider", "hash")?
            .set_default("embedding.model", "text-embedding-3-small")?
            .set_default("embedding.cache_entries", 1024)?;

        match &cli.config {
            Some(path) => {
                builder = builder.add_source(File::new(path, FileFormat::Yaml).required(true));
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder
                    .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));
            }
            None => {}
        }

        // E.g. RECALL_MEMORY__TABLE=facts
        builder = builder.add_source(
            Environment::with_prefix("RECALL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(table) = &cli.table {
            builder = builder.set_override("memory.table", table.as_str())?;
        }
        if let Some(provider) = &cli.persistence {
            builder = builder.set_override("persistence.provider", provider.as_str())?;
        }
        if let Some(url) = &cli.database_url {
            builder = builder.set_override("persistence.database_url", url.as_str())?;
        }
        if let Some(provider) = &cli.embedding {
            builder = builder.set_override("embedding.provider", provider.as_str())?;
        }

        builder.build()?.try_deserialize()
    }
}

/// Load LLM settings from `LLM_*` environment variables.
///
/// `LLM_BASE_URL` and `LLM_MODEL` are required. Azure endpoints additionally
/// read `AZURE_DEPLOYMENT_NAME` and `AZURE_API_VERSION`.
pub fn load_llm_settings() -> anyhow::Result<LlmSettings> {
    let base_url = env::var("LLM_BASE_URL").context("Missing required env var: LLM_BASE_URL")?;
    if base_url.trim().is_empty() {
        bail!("LLM_BASE_URL cannot be empty");
    }

    let model = env::var("LLM_MODEL").context("Missing required env var: LLM_MODEL")?;
    if model.trim().is_empty() {
        bail!("LLM_MODEL cannot be empty");
    }

    let api_key = env::var("LLM_API_KEY")
        .ok()
        .filter(|s| !s.trim().is_empty());

    let temperature = match env::var("LLM_TEMPERATURE") {
        Ok(raw) => Some(
            raw.parse::<f32>()
                .with_context(|| format!("LLM_TEMPERATURE is not a number: {raw}"))?,
        ),
        Err(_) => None,
    };

    let mut provider = Provider::detect_from_url(&base_url);
    if let Ok(deployment) = env::var("AZURE_DEPLOYMENT_NAME") {
        provider = provider.with_deployment(deployment, env::var("AZURE_API_VERSION").ok());
    }

    Ok(LlmSettings {
        base_url,
        api_key,
        model,
        provider,
        temperature,
    })
}
