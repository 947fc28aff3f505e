//! OpenAI Chat Completions API client.
//!
//! Sends a single user message to `/v1/chat/completions` (non-streaming) and
//! returns the assistant text of the first choice.

use super::{LanguageModel, LlmSettings};
use anyhow::Context;
use tracing::debug;

/// [`LanguageModel`] backed by the OpenAI Chat Completions API.
#[derive(Clone)]
pub struct ChatCompletionsModel {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for ChatCompletionsModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsModel")
            .field("base_url", &self.settings.base_url)
            .field("model", &self.settings.model)
            .field("provider", &self.settings.provider)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionsModel {
    #[must_use]
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.settings.model,
            "stream": false,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(temperature) = self.settings.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        body
    }
}

/// Assistant text of the first choice.
fn extract_content(response: &serde_json::Value) -> anyhow::Result<String> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(ToString::to_string)
        .context("Chat completion response has no choices[0].message.content")
}

#[async_trait::async_trait]
impl LanguageModel for ChatCompletionsModel {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let url = self
            .settings
            .provider
            .build_chat_url(&self.settings.base_url);

        let mut rb = self.http.post(&url).json(&self.request_body(prompt));
        if let Some(k) = &self.settings.api_key {
            rb = if self.settings.provider.uses_api_key_header() {
                rb.header("api-key", k)
            } else {
                rb.bearer_auth(k)
            };
        }

        let resp = rb.send().await?.error_for_status()?;
        let value: serde_json::Value = resp.json().await?;
        let content = extract_content(&value)?;

        debug!(
            name: "llm.completion.received",
            model = %self.settings.model,
            chars = content.len(),
            "Received chat completion"
        );
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Provider;

    fn settings(temperature: Option<f32>) -> LlmSettings {
        LlmSettings {
            base_url: "http://localhost:11434".to_string(),
            api_key: Some("secret".to_string()),
            model: "llama3".to_string(),
            provider: Provider::Generic,
            temperature,
        }
    }

    #[test]
    fn test_request_body_shape() {
        let model = ChatCompletionsModel::new(settings(None));
        let body = model.request_body("pick evaluators");
        assert_eq!(body["model"], "llama3");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "pick evaluators");
        assert!(body.get("temperature").is_none());

        let with_temp = ChatCompletionsModel::new(settings(Some(0.0))).request_body("x");
        assert_eq!(with_temp["temperature"], 0.0);
    }

    #[test]
    fn test_extract_content() {
        let response = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "```json\n[]\n```" } }]
        });
        assert_eq!(extract_content(&response).unwrap(), "```json\n[]\n```");
        assert!(extract_content(&serde_json::json!({ "choices": [] })).is_err());
    }

    #[test]
    fn test_debug_hides_api_key() {
        let model = ChatCompletionsModel::new(settings(None));
        assert!(!format!("{model:?}").contains("secret"));
    }
}
