use std::env;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::chain::chat_runtime::{RequestFailure, send_json_with_retry};
use crate::chain::images::data_url;
use crate::chain::provider::{
    AskOptions, AskResponse, ChatMessage, Provider, ProviderError, ReplyFormat, Usage, api_key_env,
    endpoint,
};

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireMessage {
    role: &'static str,
    content: Value,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        let content = if message.images.is_empty() {
            Value::String(message.content.clone())
        } else {
            let mut parts = vec![json!({"type": "text", "text": message.content})];
            parts.extend(message.images.iter().map(|image| {
                json!({"type": "image_url", "image_url": {"url": data_url(image)}})
            }));
            Value::Array(parts)
        };
        Self {
            role: message.role.as_str(),
            content,
        }
    }
}

impl ChatCompletionRequest {
    pub(crate) fn build(model: &str, messages: &[ChatMessage], options: &AskOptions) -> Self {
        Self {
            model: model.to_string(),
            messages: messages.iter().map(WireMessage::from).collect(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: match options.format {
                ReplyFormat::Json => Some(json!({"type": "json_object"})),
                ReplyFormat::Text => None,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

/// Single-turn convenience call against the public OpenAI endpoint.
pub async fn ask(prompt: &str, model: &str) -> Result<String, ProviderError> {
    let client = reqwest::Client::new();
    let response = ask_messages(
        &client,
        Provider::Openai,
        endpoint(Provider::Openai),
        &[ChatMessage::user(prompt)],
        model,
        AskOptions::default(),
    )
    .await?;
    Ok(response.content)
}

pub async fn ask_messages(
    client: &reqwest::Client,
    provider: Provider,
    base_url: &str,
    messages: &[ChatMessage],
    model: &str,
    options: AskOptions,
) -> Result<AskResponse, ProviderError> {
    let key_env = api_key_env(provider).unwrap_or("OPENAI_API_KEY");
    let api_key =
        env::var(key_env).map_err(|_| ProviderError::MissingApiKey { key_env, provider })?;

    let payload = ChatCompletionRequest::build(model, messages, &options);
    let url = format!("{base_url}/chat/completions");

    let response = send_json_with_retry(client, &url, Some(&api_key), &payload, options.into())
        .await
        .map_err(|failure| match failure {
            RequestFailure::Request(source) => ProviderError::Request { provider, source },
            RequestFailure::Api { status, body } => ProviderError::Api {
                provider,
                status,
                body,
            },
        })?;

    let body: ChatCompletionResponse = response
        .json()
        .await
        .map_err(|source| ProviderError::Request { provider, source })?;
    let content = body
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
        .filter(|content| !content.is_empty())
        .ok_or(ProviderError::EmptyResponse { provider })?;
    let usage = body.usage.map(|usage| Usage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    });

    Ok(AskResponse { content, usage })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_format_requests_json_object_responses() {
        let options = AskOptions::default()
            .with_temperature(0.2)
            .with_format(ReplyFormat::Json);
        let request =
            ChatCompletionRequest::build("gpt-4o-mini", &[ChatMessage::user("2+2?")], &options);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["response_format"], json!({"type": "json_object"}));
        assert_eq!(value["messages"][0], json!({"role": "user", "content": "2+2?"}));
        assert!(value.get("max_tokens").is_none());
    }

    #[test]
    fn images_become_multipart_content() {
        let message = ChatMessage::user("what is this?").with_images(vec!["QUJD".to_string()]);
        let value = serde_json::to_value(WireMessage::from(&message)).unwrap();

        assert_eq!(value["content"][0]["text"], "what is this?");
        assert_eq!(
            value["content"][1]["image_url"]["url"],
            "data:image/png;base64,QUJD"
        );
    }
}
