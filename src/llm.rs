//! LLM gateway for chat-completion providers.
//!
//! The provider is chosen from the model id (`gpt*` → OpenAI, `deepseek*` →
//! DeepSeek). Each provider issues exactly one request per call with a fixed
//! timeout and no retries, and knows how to pull the generated text out of its
//! own response shape.

use crate::config::{Settings, DEEPSEEK_KEY_VAR, OPENAI_KEY_VAR};
use crate::error::{OptionExt, Result, SlrError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 180;

/// Chat message for LLM conversations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "system", "user" or "assistant"
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Sampling parameters for a single completion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    /// Free-form generation (questions, search strings, summaries)
    pub const GENERATION: Self = Self {
        temperature: 0.7,
        max_tokens: None,
    };

    /// Short verdicts where determinism matters more than variety
    pub const CLASSIFICATION: Self = Self {
        temperature: 0.2,
        max_tokens: None,
    };

    /// Per-question answers
    pub const ANSWER: Self = Self {
        temperature: 0.7,
        max_tokens: Some(512),
    };
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self::GENERATION
    }
}

/// Provider family, selected by model id prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    OpenAi,
    DeepSeek,
}

impl ModelFamily {
    /// Resolve the family that serves `model_id`.
    pub fn from_model_id(model_id: &str) -> Result<Self> {
        let id = model_id.trim().to_ascii_lowercase();
        if id.starts_with("gpt") {
            Ok(ModelFamily::OpenAi)
        } else if id.starts_with("deepseek") {
            Ok(ModelFamily::DeepSeek)
        } else {
            Err(SlrError::UnsupportedModel(model_id.to_string()))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::OpenAi => "OpenAI",
            ModelFamily::DeepSeek => "DeepSeek",
        }
    }

    /// Environment variable holding this family's API key
    pub fn credential_var(&self) -> &'static str {
        match self {
            ModelFamily::OpenAi => OPENAI_KEY_VAR,
            ModelFamily::DeepSeek => DEEPSEEK_KEY_VAR,
        }
    }
}

/// Capability every chat provider offers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn family(&self) -> ModelFamily;

    /// Whether the credential this provider needs is configured
    fn has_credential(&self) -> bool;

    /// Send one chat request and return the decoded response body.
    async fn call(
        &self,
        messages: &[ChatMessage],
        model: &str,
        options: CompletionOptions,
    ) -> Result<Value>;

    /// Pull the generated text out of a body returned by [`LlmProvider::call`].
    fn extract_content(&self, raw: &Value) -> Result<String>;
}

/// OpenAI-compatible chat completion response structures
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Provider speaking the `/chat/completions` protocol
pub struct ChatCompletionsProvider {
    family: ModelFamily,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ChatCompletionsProvider {
    pub fn new(family: ModelFamily, base_url: &str, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| SlrError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            family,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl LlmProvider for ChatCompletionsProvider {
    fn family(&self) -> ModelFamily {
        self.family
    }

    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn call(
        &self,
        messages: &[ChatMessage],
        model: &str,
        options: CompletionOptions,
    ) -> Result<Value> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(SlrError::MissingCredential(self.family.credential_var()))?;

        let mut request_body = serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": options.temperature,
        });
        if let Some(max_tokens) = options.max_tokens {
            request_body["max_tokens"] = Value::from(max_tokens);
        }

        let api_url = format!("{}/chat/completions", self.base_url);
        debug!(provider = self.family.name(), model = model, url = %api_url, "Sending LLM request");

        let response = self
            .client
            .post(&api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(provider = self.family.name(), status = status.as_u16(), "LLM API error");
            return Err(SlrError::Api {
                code: status.as_u16(),
                message: error_text,
            });
        }

        response.json::<Value>().await.map_err(|e| {
            SlrError::Parse(format!(
                "Failed to decode {} response: {}",
                self.family.name(),
                e
            ))
        })
    }

    fn extract_content(&self, raw: &Value) -> Result<String> {
        let parsed: ChatCompletionResponse =
            serde_json::from_value(raw.clone()).map_err(|e| {
                SlrError::Parse(format!(
                    "Failed to parse content from {} response: {}",
                    self.family.name(),
                    e
                ))
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_parse(&format!(
                "Failed to parse content from {} response: no message content",
                self.family.name()
            ))
    }
}

/// Single entry point for every LLM call the service makes.
pub struct LlmGateway {
    providers: Vec<Box<dyn LlmProvider>>,
}

impl LlmGateway {
    pub fn new(providers: Vec<Box<dyn LlmProvider>>) -> Self {
        Self { providers }
    }

    /// Gateway with the OpenAI and DeepSeek providers configured from settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(vec![
            Box::new(ChatCompletionsProvider::new(
                ModelFamily::OpenAi,
                &settings.openai_base_url,
                settings.openai_api_key.clone(),
            )?),
            Box::new(ChatCompletionsProvider::new(
                ModelFamily::DeepSeek,
                &settings.deepseek_base_url,
                settings.deepseek_api_key.clone(),
            )?),
        ]))
    }

    /// Provider serving `model`.
    pub fn provider(&self, model: &str) -> Result<&dyn LlmProvider> {
        let family = ModelFamily::from_model_id(model)?;
        self.providers
            .iter()
            .find(|p| p.family() == family)
            .map(|p| p.as_ref())
            .ok_or_else(|| SlrError::UnsupportedModel(model.to_string()))
    }

    /// Check that `model` is served and its credential is present, without
    /// making a request.
    pub fn ensure_ready(&self, model: &str) -> Result<()> {
        let provider = self.provider(model)?;
        if provider.has_credential() {
            Ok(())
        } else {
            Err(SlrError::MissingCredential(provider.family().credential_var()))
        }
    }

    /// Raw provider call.
    pub async fn call(
        &self,
        messages: &[ChatMessage],
        model: &str,
        options: CompletionOptions,
    ) -> Result<Value> {
        self.provider(model)?.call(messages, model, options).await
    }

    /// Generated text from a raw body produced for `model`.
    pub fn extract_content(&self, raw: &Value, model: &str) -> Result<String> {
        self.provider(model)?.extract_content(raw)
    }

    /// Call the model and return its text output.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        model: &str,
        options: CompletionOptions,
    ) -> Result<String> {
        let provider = self.provider(model)?;
        let raw = provider.call(messages, model, options).await?;

        if let Some(usage) = raw.get("usage") {
            let token_count = |key: &str| usage.get(key).and_then(|v| v.as_u64()).unwrap_or(0);
            let prompt_tokens = token_count("prompt_tokens");
            let completion_tokens = token_count("completion_tokens");
            info!(
                model = model,
                prompt_tokens = prompt_tokens,
                completion_tokens = completion_tokens,
                "LLM call complete"
            );
        }

        provider.extract_content(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_provider(family: ModelFamily) -> ChatCompletionsProvider {
        ChatCompletionsProvider::new(family, "http://127.0.0.1:9", None).expect("client")
    }

    #[test]
    fn test_model_family_by_prefix() {
        assert_eq!(ModelFamily::from_model_id("gpt-4o-mini").unwrap(), ModelFamily::OpenAi);
        assert_eq!(ModelFamily::from_model_id("deepseek-chat").unwrap(), ModelFamily::DeepSeek);
        assert!(matches!(
            ModelFamily::from_model_id("claude-3"),
            Err(SlrError::UnsupportedModel(m)) if m == "claude-3"
        ));
    }

    #[test]
    fn test_extract_content() {
        let provider = offline_provider(ModelFamily::OpenAi);
        let raw = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Relevant"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 1, "total_tokens": 11}
        });
        assert_eq!(provider.extract_content(&raw).unwrap(), "Relevant");
    }

    #[test]
    fn test_extract_content_unexpected_shape() {
        let provider = offline_provider(ModelFamily::DeepSeek);
        let empty = serde_json::json!({"choices": []});
        assert!(matches!(provider.extract_content(&empty), Err(SlrError::Parse(_))));

        let wrong = serde_json::json!({"data": {"text": "hello"}});
        let err = provider.extract_content(&wrong).unwrap_err();
        assert!(err.to_string().contains("DeepSeek"));
    }

    #[tokio::test]
    async fn test_missing_key_is_reported_before_network() {
        let gateway = LlmGateway::new(vec![Box::new(offline_provider(ModelFamily::OpenAi))]);
        let err = gateway
            .complete(&[ChatMessage::user("hi")], "gpt-4o", CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SlrError::MissingCredential(OPENAI_KEY_VAR)));
    }

    #[test]
    fn test_ensure_ready() {
        let gateway = LlmGateway::new(vec![
            Box::new(offline_provider(ModelFamily::OpenAi)),
            Box::new(
                ChatCompletionsProvider::new(
                    ModelFamily::DeepSeek,
                    "http://127.0.0.1:9",
                    Some("key".to_string()),
                )
                .expect("client"),
            ),
        ]);
        assert!(gateway.ensure_ready("deepseek-chat").is_ok());
        assert!(matches!(
            gateway.ensure_ready("gpt-4o"),
            Err(SlrError::MissingCredential(OPENAI_KEY_VAR))
        ));
        assert!(matches!(
            gateway.ensure_ready("llama-3"),
            Err(SlrError::UnsupportedModel(_))
        ));
    }

    /// Replies with a fixed body that reports token usage
    struct CannedProvider;

    #[async_trait]
    impl LlmProvider for CannedProvider {
        fn family(&self) -> ModelFamily {
            ModelFamily::DeepSeek
        }

        fn has_credential(&self) -> bool {
            true
        }

        async fn call(
            &self,
            _messages: &[ChatMessage],
            _model: &str,
            _options: CompletionOptions,
        ) -> Result<Value> {
            Ok(serde_json::json!({
                "choices": [{"message": {"content": "Not Relevant"}}],
                "usage": {"prompt_tokens": 42, "completion_tokens": "n/a"}
            }))
        }

        fn extract_content(&self, raw: &Value) -> Result<String> {
            raw["choices"][0]["message"]["content"]
                .as_str()
                .map(str::to_string)
                .ok_or_parse("no content")
        }
    }

    #[tokio::test]
    async fn test_complete_with_usage_report() {
        let gateway = LlmGateway::new(vec![Box::new(CannedProvider)]);
        let text = gateway
            .complete(&[ChatMessage::user("hi")], "deepseek-chat", CompletionOptions::CLASSIFICATION)
            .await
            .unwrap();
        assert_eq!(text, "Not Relevant");
    }

    #[tokio::test]
    async fn test_unregistered_family_is_unsupported() {
        let gateway = LlmGateway::new(vec![Box::new(offline_provider(ModelFamily::OpenAi))]);
        let err = gateway
            .call(&[ChatMessage::user("hi")], "deepseek-chat", CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SlrError::UnsupportedModel(_)));
    }
}
