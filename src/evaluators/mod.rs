//! Evaluator registry and per-turn evaluator selection.
//!
//! An [`Evaluator`] is a named post-processing routine described by a
//! natural-language condition and a few worked [`Example`]s. Once per
//! conversational turn the [`EvaluatorSelector`] asks a language model which
//! evaluators apply, showing it every example rendered with fresh participant
//! names by the [`ExampleRenderer`].
//!
//! The [`EvaluatorRegistry`] is assembled once at startup and shared by
//! reference; it has no interior mutability.

pub mod defaults;
pub mod render;
pub mod selector;

pub use defaults::default_registry;
pub use render::{ExampleRenderer, NameGenerator, RandomNameGenerator, RenderedExample};
pub use selector::{ConversationContext, ConversationMessage, EvaluatorSelector, parse_evaluator_names};

use crate::memory::Content;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One line of an example conversation. `user` is usually a `{{userN}}`
/// placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleMessage {
    pub user: String,
    pub content: Content,
}

impl ExampleMessage {
    pub fn new(user: impl Into<String>, content: impl Into<Content>) -> Self {
        Self {
            user: user.into(),
            content: content.into(),
        }
    }
}

/// A worked example of when an evaluator applies and what it produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub context: String,
    pub messages: Vec<ExampleMessage>,
    pub outcome: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluator {
    pub name: String,
    pub description: String,
    /// Alternative names the evaluator is known by.
    #[serde(default)]
    pub similes: Vec<String>,
    /// When the evaluator should run, in plain language.
    pub condition: String,
    #[serde(default)]
    pub examples: Vec<Example>,
}

/// Errors raised while assembling a registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Duplicate evaluator name: {0}")]
    DuplicateName(String),

    #[error("Invalid evaluator definition: {0}")]
    Invalid(#[from] serde_yaml::Error),
}

/// Errors raised by [`EvaluatorSelector::select`].
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    /// The model response had no parseable fenced list of names.
    #[error("Could not parse evaluator selection: {0}")]
    Parse(String),

    /// Passthrough of a language model failure.
    #[error("Language model error: {0}")]
    Model(#[source] anyhow::Error),
}

/// Immutable, name-unique set of evaluators in registration order.
#[derive(Debug, Clone, Default)]
pub struct EvaluatorRegistry {
    evaluators: Vec<Evaluator>,
}

impl EvaluatorRegistry {
    pub fn new(evaluators: Vec<Evaluator>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for evaluator in &evaluators {
            if !seen.insert(evaluator.name.as_str()) {
                return Err(RegistryError::DuplicateName(evaluator.name.clone()));
            }
        }
        Ok(Self { evaluators })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a registry from a YAML list of evaluator definitions.
    pub fn from_yaml(yaml: &str) -> Result<Self, RegistryError> {
        let evaluators: Vec<Evaluator> = serde_yaml::from_str(yaml)?;
        Self::new(evaluators)
    }

    pub fn get(&self, name: &str) -> Option<&Evaluator> {
        self.evaluators.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.evaluators.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Evaluator> {
        self.evaluators.iter()
    }

    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }
}

impl<'a> IntoIterator for &'a EvaluatorRegistry {
    type Item = &'a Evaluator;
    type IntoIter = std::slice::Iter<'a, Evaluator>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
