//! LLM-driven evaluator selection.

use super::render::{ExampleRenderer, fill_placeholders};
use super::{EvaluatorRegistry, SelectionError};
use crate::llm::LanguageModel;
use crate::memory::Memory;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info};

/// One line of the recent conversation shown to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationMessage {
    pub speaker: String,
    pub text: String,
    pub action: Option<String>,
}

impl ConversationMessage {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            action: None,
        }
    }

    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

impl std::fmt::Display for ConversationMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.speaker, self.text)?;
        if let Some(action) = self.action.as_deref().filter(|a| !a.is_empty()) {
            write!(f, " ({action})")?;
        }
        Ok(())
    }
}

/// The turn being evaluated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationContext {
    pub agent_name: String,
    pub sender_name: String,
    /// Oldest first.
    pub recent_messages: Vec<ConversationMessage>,
}

impl ConversationContext {
    pub fn new(agent_name: impl Into<String>, sender_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            sender_name: sender_name.into(),
            recent_messages: Vec::new(),
        }
    }

    pub fn push(&mut self, message: ConversationMessage) {
        self.recent_messages.push(message);
    }

    /// Append a stored memory as a message spoken by `speaker`.
    pub fn push_memory(&mut self, speaker: impl Into<String>, memory: &Memory) {
        let mut message = ConversationMessage::new(speaker, memory.content.text.clone());
        message.action = memory.content.action.clone();
        self.push(message);
    }
}

const SELECTION_TEMPLATE: &str = "TASK: Based on the conversation and conditions, determine which evaluation functions are appropriate to call.

Examples:
{{evaluatorExamples}}

INSTRUCTIONS: You are helping me to decide which appropriate functions to call based on the conversation between {{senderName}} and {{agentName}}.

{{recentMessages}}

Evaluator Functions:
{{evaluators}}

Evaluator Conditions:
{{evaluatorConditions}}

TASK: Based on the most recent conversation, determine which evaluators functions are appropriate to call to assess the conversation based on the conditions.

Response format should be a JSON array inside a markdown code block with the names of the evaluators to call, for example:
```json
[{{evaluatorNames}}]
```
";

/// Decides, per conversational turn, which registered evaluators should run.
#[derive(Debug, Clone)]
pub struct EvaluatorSelector {
    registry: Arc<EvaluatorRegistry>,
    model: Arc<dyn LanguageModel>,
    renderer: ExampleRenderer,
}

impl EvaluatorSelector {
    pub fn new(
        registry: Arc<EvaluatorRegistry>,
        model: Arc<dyn LanguageModel>,
        renderer: ExampleRenderer,
    ) -> Self {
        Self {
            registry,
            model,
            renderer,
        }
    }

    pub fn registry(&self) -> &EvaluatorRegistry {
        &self.registry
    }

    /// Fill the decision prompt for `context`. Examples are re-rendered on
    /// every call.
    pub fn build_prompt(&self, context: &ConversationContext) -> String {
        let names = self
            .registry
            .names()
            .iter()
            .map(|name| format!("\"{name}\""))
            .collect::<Vec<_>>()
            .join(", ");

        let mut descriptions = String::new();
        let mut conditions = String::new();
        for evaluator in self.registry.iter() {
            let _ = writeln!(descriptions, "{}: {}", evaluator.name, evaluator.description);
            let _ = writeln!(conditions, "{}: {}", evaluator.name, evaluator.condition);
        }

        let examples = self
            .renderer
            .render_all(self.registry.iter())
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n\n");

        let recent = context
            .recent_messages
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");

        fill_placeholders(SELECTION_TEMPLATE, |key| match key {
            "evaluatorExamples" => Some(examples.as_str()),
            "senderName" => Some(context.sender_name.as_str()),
            "agentName" => Some(context.agent_name.as_str()),
            "recentMessages" => Some(recent.as_str()),
            "evaluators" => Some(descriptions.trim_end()),
            "evaluatorConditions" => Some(conditions.trim_end()),
            "evaluatorNames" => Some(names.as_str()),
            _ => None,
        })
    }

    /// Names of the evaluators to run, in the order the model gave them.
    ///
    /// Unknown names are dropped and repeats collapse to their first
    /// occurrence. No ordering is guaranteed across calls. An empty registry
    /// yields an empty list without consulting the model.
    pub async fn select(&self, context: &ConversationContext) -> Result<Vec<String>, SelectionError> {
        if self.registry.is_empty() {
            debug!(name: "evaluators.select.skipped", "No evaluators registered");
            return Ok(Vec::new());
        }

        let prompt = self.build_prompt(context);
        let response = self
            .model
            .complete(&prompt)
            .await
            .map_err(SelectionError::Model)?;

        let proposed = parse_evaluator_names(&response)?;

        let mut seen = HashSet::new();
        let mut selected = Vec::with_capacity(proposed.len());
        for name in proposed {
            if !self.registry.contains(&name) {
                debug!(name: "evaluators.select.unknown", evaluator = %name, "Dropping unknown evaluator");
                continue;
            }
            if seen.insert(name.clone()) {
                selected.push(name);
            }
        }

        info!(
            name: "evaluators.selected",
            count = selected.len(),
            evaluators = ?selected,
            "Evaluators selected"
        );
        Ok(selected)
    }
}

/// Body of the first fenced code block in `text`, without its language tag.
pub fn extract_fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let end = rest.find("```")?;
    let block = &rest[..end];

    // Drop a language tag such as `json` on the opening line.
    let body = match block.split_once('\n') {
        Some((tag, body)) if tag.trim().chars().all(|c| c.is_ascii_alphanumeric()) => body,
        _ => block,
    };
    Some(body.trim())
}

/// Parse the fenced JSON array of evaluator names out of a model response.
///
/// Single-quoted arrays (`['fact']`) are accepted as well.
pub fn parse_evaluator_names(response: &str) -> Result<Vec<String>, SelectionError> {
    let block = extract_fenced_block(response)
        .ok_or_else(|| SelectionError::Parse("response has no fenced block".to_string()))?;

    serde_json::from_str::<Vec<String>>(block)
        .or_else(|_| serde_json::from_str::<Vec<String>>(&block.replace('\'', "\"")))
        .map_err(|e| SelectionError::Parse(format!("fenced block is not a list of names: {e}")))
}
