//! Language model access for evaluator selection.
//!
//! The [`LanguageModel`] trait is the one seam the selector depends on: a
//! prompt goes in, the raw completion text comes out. [`ChatCompletionsModel`]
//! implements it against any OpenAI-compatible `/v1/chat/completions`
//! endpoint, with Azure deployments routed through [`Provider`].
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_recall::llm::{ChatCompletionsModel, LlmSettings, Provider};
//!
//! let settings = LlmSettings {
//!     base_url: "https://api.openai.com".to_string(),
//!     api_key: Some("sk-...".to_string()),
//!     model: "gpt-4o-mini".to_string(),
//!     provider: Provider::OpenAI,
//!     temperature: None,
//! };
//! let model = ChatCompletionsModel::new(settings);
//! ```

pub mod chat_completions;
pub mod provider;

pub use chat_completions::ChatCompletionsModel;
pub use provider::Provider;

/// LLM connection and model settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL for the LLM API (e.g., `https://api.openai.com`).
    pub base_url: String,
    /// Optional API key for authentication.
    pub api_key: Option<String>,
    /// Model identifier (e.g., `gpt-4o-mini`).
    pub model: String,
    /// Provider type, detected from `base_url` unless overridden.
    pub provider: Provider,
    /// Sampling temperature; provider default when unset.
    pub temperature: Option<f32>,
}

/// Single-shot text completion.
///
/// Implementations must be safe to call concurrently. Errors are passed
/// through to callers untouched.
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync + std::fmt::Debug {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}
