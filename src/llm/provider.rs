//! Provider-specific URL and authentication handling.

/// Default Azure `OpenAI` API version.
pub const AZURE_API_VERSION: &str = "2024-08-01-preview";

/// Supported LLM providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// `OpenAI` (api.openai.com)
    OpenAI,
    /// Azure `OpenAI` Service
    AzureOpenAI {
        deployment_name: String,
        api_version: String,
    },
    /// Any other OpenAI-compatible endpoint (`OpenRouter`, Groq, Ollama, ...)
    Generic,
}

impl Provider {
    /// Detect provider from base URL.
    ///
    /// Azure is detected without a deployment; callers fill it in with
    /// [`Provider::with_deployment`].
    #[must_use]
    pub fn detect_from_url(base_url: &str) -> Self {
        let lower = base_url.to_lowercase();

        if lower.contains("openai.azure.com") {
            Self::AzureOpenAI {
                deployment_name: String::new(),
                api_version: AZURE_API_VERSION.to_string(),
            }
        } else if lower.contains("api.openai.com") {
            Self::OpenAI
        } else {
            Self::Generic
        }
    }

    /// Set the Azure deployment; no-op for other providers.
    #[must_use]
    pub fn with_deployment(self, deployment_name: String, api_version: Option<String>) -> Self {
        match self {
            Self::AzureOpenAI {
                api_version: detected,
                ..
            } => Self::AzureOpenAI {
                deployment_name,
                api_version: api_version.unwrap_or(detected),
            },
            other => other,
        }
    }

    /// Build the chat completions URL for this provider.
    #[must_use]
    pub fn build_chat_url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');

        match self {
            Self::AzureOpenAI {
                deployment_name,
                api_version,
            } => format!(
                "{base}/openai/deployments/{deployment_name}/chat/completions?api-version={api_version}"
            ),
            Self::OpenAI | Self::Generic => format!("{base}/v1/chat/completions"),
        }
    }

    /// Azure authenticates with an `api-key` header instead of a bearer token.
    #[must_use]
    pub fn uses_api_key_header(&self) -> bool {
        matches!(self, Self::AzureOpenAI { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_openai() {
        assert_eq!(Provider::detect_from_url("https://api.openai.com"), Provider::OpenAI);
    }

    #[test]
    fn test_detect_azure() {
        let provider = Provider::detect_from_url("https://my-resource.openai.azure.com");
        assert!(matches!(provider, Provider::AzureOpenAI { .. }));
        assert!(provider.uses_api_key_header());
    }

    #[test]
    fn test_detect_generic() {
        assert_eq!(Provider::detect_from_url("http://localhost:11434"), Provider::Generic);
        assert_eq!(Provider::detect_from_url("https://openrouter.ai/api"), Provider::Generic);
    }

    #[test]
    fn test_with_deployment_only_applies_to_azure() {
        let azure = Provider::detect_from_url("https://x.openai.azure.com")
            .with_deployment("gpt-4o".to_string(), None);
        assert_eq!(
            azure,
            Provider::AzureOpenAI {
                deployment_name: "gpt-4o".to_string(),
                api_version: AZURE_API_VERSION.to_string(),
            }
        );

        let openai = Provider::OpenAI.with_deployment("gpt-4o".to_string(), Some("v".to_string()));
        assert_eq!(openai, Provider::OpenAI);
    }

    #[test]
    fn test_build_url_openai() {
        let url = Provider::OpenAI.build_chat_url("https://api.openai.com/");
        assert_eq!(url, "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_build_url_azure() {
        let provider = Provider::AzureOpenAI {
            deployment_name: "gpt-4".to_string(),
            api_version: "2024-08-01-preview".to_string(),
        };
        let url = provider.build_chat_url("https://my-resource.openai.azure.com");
        assert_eq!(
            url,
            "https://my-resource.openai.azure.com/openai/deployments/gpt-4/chat/completions?api-version=2024-08-01-preview"
        );
    }
}
