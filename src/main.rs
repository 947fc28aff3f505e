//! `agent-recall` command line.
//!
//! Stores and queries agent memories through the configured backend, and runs
//! evaluator selection against a language model.

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::unused_async)]

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use agent_recall::build_store;
use agent_recall::config::{AppConfig, Cli, Command, MemoryCommand, load_llm_settings};
use agent_recall::evaluators::{
    ConversationContext, ConversationMessage, EvaluatorRegistry, EvaluatorSelector,
    ExampleRenderer, default_registry,
};
use agent_recall::llm::ChatCompletionsModel;
use agent_recall::memory::{Content, Memory, MemoryStore, SearchOptions};
use anyhow::Context;
use clap::{CommandFactory, Parser};
use dotenvy::dotenv;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Load .env (if present)
    let _ = dotenv();

    agent_recall::telemetry::init();

    let cli = Cli::parse();
    let Some(command) = cli.command.clone() else {
        let _ = Cli::command().print_help();
        return;
    };

    if let Err(e) = run(&cli, command).await {
        error!(name: "command.failed", error = %format!("{e:#}"), "Command failed");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: &Cli, command: Command) -> anyhow::Result<()> {
    let config = AppConfig::from_cli(cli).context("Failed to load configuration")?;

    info!(
        name: "config.loaded",
        table = %config.memory.table,
        persistence = %config.persistence.provider,
        embedding = %config.embedding.provider,
        "Configuration loaded"
    );

    match command {
        Command::Evaluators {
            file,
            message,
            agent,
            sender,
        } => evaluators(file, message, agent, sender).await,
        Command::Memory(command) => {
            let store = build_store(&config).await?;
            memory_command(&store, command).await
        }
    }
}

async fn memory_command(store: &MemoryStore, command: MemoryCommand) -> anyhow::Result<()> {
    match command {
        MemoryCommand::Remember {
            user,
            text,
            action,
            allow_duplicates,
        } => {
            let mut content = Content::text(text);
            content.action = action;
            let memory = store.add_embedding_to_memory(Memory::new(user, content)).await?;
            store.create_memory(&memory, !allow_duplicates).await?;
            println!("{}", memory.id);
        }
        MemoryCommand::Recall {
            query,
            users,
            threshold,
            count,
            unique,
            fuzzy,
        } => {
            if fuzzy {
                for found in store.get_memory_by_content(&query).await? {
                    print_memory(&found.memory);
                }
            } else {
                let embedding = store.embed(&query).await?;
                let options = SearchOptions {
                    match_threshold: threshold,
                    count,
                    user_ids: users,
                    unique,
                };
                for memory in store.search_memories_by_embedding(&embedding, options).await? {
                    print_memory(&memory);
                }
            }
        }
        MemoryCommand::Count { users, all } => {
            println!("{}", store.count_memories_by_user_ids(&users, !all).await?);
        }
        MemoryCommand::Forget { id, users } => match id {
            Some(id) => store.remove_memory(id).await?,
            None => store.remove_all_memories_by_user_ids(&users).await?,
        },
    }
    Ok(())
}

fn print_memory(memory: &Memory) {
    let flag = if memory.unique { "" } else { " (duplicate)" };
    println!(
        "{}\t{}\t{}{flag}",
        memory.id, memory.user_id, memory.content.text
    );
}

async fn evaluators(
    file: Option<String>,
    message: Option<String>,
    agent: String,
    sender: String,
) -> anyhow::Result<()> {
    let registry = match file {
        Some(path) => {
            let yaml = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read evaluators from {path}"))?;
            EvaluatorRegistry::from_yaml(&yaml)?
        }
        None => default_registry(),
    };

    let Some(message) = message else {
        for evaluator in &registry {
            println!("{}: {}", evaluator.name, evaluator.description);
        }
        return Ok(());
    };

    let settings = load_llm_settings()?;
    info!(
        name: "llm.config.loaded",
        base_url = %settings.base_url,
        model = %settings.model,
        "LLM configuration loaded"
    );

    let selector = EvaluatorSelector::new(
        Arc::new(registry),
        Arc::new(ChatCompletionsModel::new(settings)),
        ExampleRenderer::default(),
    );

    let mut context = ConversationContext::new(agent, sender.clone());
    context.push(ConversationMessage::new(sender, message));

    for name in selector.select(&context).await? {
        println!("{name}");
    }
    Ok(())
}
