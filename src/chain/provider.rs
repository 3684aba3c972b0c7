use std::env;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::{ollama, openai};

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Openai,
    Fireworks,
    Ollama,
}

impl Provider {
    pub const SUPPORTED: &'static str = "openai, fireworks, ollama";

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Fireworks => "fireworks",
            Self::Ollama => "ollama",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::Openai),
            "fireworks" => Ok(Self::Fireworks),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!(
                "Unknown provider '{other}'. Supported values: {}.",
                Self::SUPPORTED
            )),
        }
    }
}

/// Base URL the OpenAI-compatible providers post chat completions to.
pub fn endpoint(provider: Provider) -> &'static str {
    match provider {
        Provider::Openai => "https://api.openai.com/v1",
        Provider::Fireworks => "https://api.fireworks.ai/inference/v1",
        Provider::Ollama => DEFAULT_OLLAMA_HOST,
    }
}

pub fn api_key_env(provider: Provider) -> Option<&'static str> {
    match provider {
        Provider::Openai => Some("OPENAI_API_KEY"),
        Provider::Fireworks => Some("FIREWORKS_API_KEY"),
        Provider::Ollama => None,
    }
}

pub fn is_api_key_present(provider: Provider) -> bool {
    match api_key_env(provider) {
        Some(key_env) => env::var(key_env)
            .ok()
            .is_some_and(|value| !value.trim().is_empty()),
        None => true,
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// One message in OpenAI format, with optional base64 images for multimodal models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Attaches base64-encoded images to this message.
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

/// Shape the backend is asked to reply in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplyFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy)]
pub struct AskOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub retries: u32,
    /// Initial backoff; [`DEFAULT_RETRY_DELAY_MS`] when unset.
    pub retry_delay_ms: Option<u64>,
    pub format: ReplyFormat,
}

pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

impl AskOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_format(mut self, format: ReplyFormat) -> Self {
        self.format = format;
        self
    }

    /// Fills unset fields from `defaults`. Retries take the larger of the two.
    pub fn or_defaults(self, defaults: &AskOptions) -> Self {
        Self {
            temperature: self.temperature.or(defaults.temperature),
            max_tokens: self.max_tokens.or(defaults.max_tokens),
            timeout_secs: self.timeout_secs.or(defaults.timeout_secs),
            retries: self.retries.max(defaults.retries),
            retry_delay_ms: self.retry_delay_ms.or(defaults.retry_delay_ms),
            format: self.format,
        }
    }
}

impl Default for AskOptions {
    fn default() -> Self {
        Self {
            temperature: None,
            max_tokens: None,
            timeout_secs: None,
            retries: 0,
            retry_delay_ms: None,
            format: ReplyFormat::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct AskResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

impl AskResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{key_env} is not set in the environment")]
    MissingApiKey {
        provider: Provider,
        key_env: &'static str,
    },
    #[error("{provider} request failed: {source}")]
    Request {
        provider: Provider,
        source: reqwest::Error,
    },
    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: Provider,
        status: StatusCode,
        body: String,
    },
    #[error("{provider} response did not contain message content")]
    EmptyResponse { provider: Provider },
    /// Raised by models that are not backed by one of the bundled providers.
    #[error("{0}")]
    Other(String),
}

/// Anything that can answer a list of chat messages with free-form text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str {
        "custom"
    }

    async fn ask(
        &self,
        messages: &[ChatMessage],
        options: &AskOptions,
    ) -> Result<AskResponse, ProviderError>;
}

/// A [`ChatModel`] backed by one of the bundled HTTP providers.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    provider: Provider,
    model: String,
    base_url: String,
    defaults: AskOptions,
    client: reqwest::Client,
}

impl ProviderClient {
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: endpoint(provider).to_string(),
            defaults: AskOptions::default(),
            client: reqwest::Client::new(),
        }
    }

    /// Points the client at another server, e.g. a remote Ollama host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Request settings used where a call leaves them unset.
    pub fn with_defaults(mut self, defaults: AskOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatModel for ProviderClient {
    fn name(&self) -> &str {
        self.provider.as_str()
    }

    async fn ask(
        &self,
        messages: &[ChatMessage],
        options: &AskOptions,
    ) -> Result<AskResponse, ProviderError> {
        let options = options.or_defaults(&self.defaults);
        match self.provider {
            Provider::Openai | Provider::Fireworks => {
                openai::ask_messages(
                    &self.client,
                    self.provider,
                    &self.base_url,
                    messages,
                    &self.model,
                    options,
                )
                .await
            }
            Provider::Ollama => {
                ollama::ask_messages(&self.client, &self.base_url, messages, &self.model, options)
                    .await
            }
        }
    }
}

pub async fn ask(
    provider: Provider,
    model: &str,
    messages: &[ChatMessage],
    options: AskOptions,
) -> Result<AskResponse, ProviderError> {
    ProviderClient::new(provider, model)
        .ask(messages, &options)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!("OpenAI".parse::<Provider>(), Ok(Provider::Openai));
        assert_eq!(" ollama ".parse::<Provider>(), Ok(Provider::Ollama));
        assert_eq!(
            "bad".parse::<Provider>(),
            Err("Unknown provider 'bad'. Supported values: openai, fireworks, ollama.".to_string())
        );
    }

    #[test]
    fn message_without_images_omits_the_field() {
        let value = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(value, serde_json::json!({"role": "user", "content": "hi"}));

        let value =
            serde_json::to_value(ChatMessage::user("look").with_images(vec!["aGk=".into()]))
                .unwrap();
        assert_eq!(value["images"][0], "aGk=");
    }

    #[test]
    fn call_options_win_over_client_defaults() {
        let defaults = AskOptions {
            temperature: Some(0.2),
            max_tokens: Some(256),
            timeout_secs: Some(30),
            retries: 3,
            retry_delay_ms: Some(1_000),
            format: ReplyFormat::Text,
        };
        let call = AskOptions {
            temperature: Some(0.9),
            retries: 1,
            retry_delay_ms: Some(50),
            format: ReplyFormat::Json,
            ..AskOptions::default()
        };

        let merged = call.or_defaults(&defaults);
        assert_eq!(merged.temperature, Some(0.9));
        assert_eq!(merged.max_tokens, Some(256));
        assert_eq!(merged.timeout_secs, Some(30));
        assert_eq!(merged.retries, 3);
        assert_eq!(merged.retry_delay_ms, Some(50));
        assert_eq!(merged.format, ReplyFormat::Json);

        let unset = AskOptions::default().or_defaults(&defaults);
        assert_eq!(unset.retry_delay_ms, Some(1_000));
    }

    #[test]
    fn ollama_needs_no_api_key() {
        assert_eq!(api_key_env(Provider::Ollama), None);
        assert!(is_api_key_present(Provider::Ollama));
    }

    #[test]
    fn base_url_override_drops_trailing_slash() {
        let client =
            ProviderClient::new(Provider::Ollama, "llama3").with_base_url("http://gpu-box:11434/");
        assert_eq!(client.base_url(), "http://gpu-box:11434");
        assert_eq!(client.model(), "llama3");
    }
}
