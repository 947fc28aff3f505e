//! Agent Recall
//!
//! The memory-retrieval layer of a conversational agent, plus the per-turn
//! evaluator selection that runs on top of it.
//!
//! # Architecture
//!
//! - **Memory**: embedding-tagged text records per user, with near-duplicate
//!   flagging, fuzzy content lookup and vector search over a pluggable backend
//! - **Evaluators**: an immutable registry of post-processing routines and an
//!   LLM-driven selector that decides which of them fire on a turn
//! - **LLM**: a minimal completion seam with an OpenAI-compatible client
//!
//! # Modules
//!
//! - [`memory`]: [`MemoryStore`](memory::MemoryStore), storage backends and embedders
//! - [`evaluators`]: registry, example rendering and selection
//! - [`llm`]: [`LanguageModel`](llm::LanguageModel) and the Chat Completions client
//! - [`config`]: layered configuration and the command line
//! - [`telemetry`]: logging setup

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::unused_async)]

pub mod config;
pub mod evaluators;
pub mod llm;
pub mod memory;
pub mod telemetry;

use crate::config::AppConfig;
use crate::memory::MemoryStore;
use crate::memory::providers::{build_embedder, connect_backend};

/// Assemble the [`MemoryStore`] described by `config`.
pub async fn build_store(config: &AppConfig) -> anyhow::Result<MemoryStore> {
    let backend = connect_backend(&config.persistence, &config.memory).await?;
    let embedder = build_embedder(&config.embedding)?;
    Ok(MemoryStore::new(backend, embedder, config.memory.table.clone()))
}
