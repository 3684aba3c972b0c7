use serde::{Deserialize, Serialize};

use crate::chain::chat_runtime::{RequestFailure, send_json_with_retry};
use crate::chain::provider::{
    AskOptions, AskResponse, ChatMessage, Provider, ProviderError, ReplyFormat, Usage,
};

#[derive(Debug, Serialize)]
pub(crate) struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Debug, Default, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

impl<'a> OllamaChatRequest<'a> {
    pub(crate) fn build(model: &'a str, messages: &'a [ChatMessage], options: &AskOptions) -> Self {
        Self {
            model,
            messages,
            stream: false,
            format: match options.format {
                ReplyFormat::Json => Some("json"),
                ReplyFormat::Text => None,
            },
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

pub async fn ask_messages(
    client: &reqwest::Client,
    host: &str,
    messages: &[ChatMessage],
    model: &str,
    options: AskOptions,
) -> Result<AskResponse, ProviderError> {
    let provider = Provider::Ollama;
    let payload = OllamaChatRequest::build(model, messages, &options);
    let url = format!("{host}/api/chat");

    let response = send_json_with_retry(client, &url, None, &payload, options.into())
        .await
        .map_err(|failure| match failure {
            RequestFailure::Request(source) => ProviderError::Request { provider, source },
            RequestFailure::Api { status, body } => ProviderError::Api {
                provider,
                status,
                body,
            },
        })?;

    let body: OllamaChatResponse = response
        .json()
        .await
        .map_err(|source| ProviderError::Request { provider, source })?;
    let content = body
        .message
        .map(|message| message.content)
        .filter(|content| !content.is_empty())
        .ok_or(ProviderError::EmptyResponse { provider })?;
    let usage = match (body.prompt_eval_count, body.eval_count) {
        (None, None) => None,
        (prompt, completion) => Some(Usage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt.zip(completion).map(|(p, c)| p + c),
        }),
    };

    Ok(AskResponse { content, usage })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_disables_streaming_and_maps_options() {
        let messages = [ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let options = AskOptions {
            temperature: Some(0.3),
            max_tokens: Some(64),
            format: ReplyFormat::Json,
            ..AskOptions::default()
        };
        let value =
            serde_json::to_value(OllamaChatRequest::build("llama3:instruct", &messages, &options))
                .unwrap();

        assert_eq!(
            value,
            json!({
                "model": "llama3:instruct",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ],
                "stream": false,
                "format": "json",
                "options": {"temperature": 0.3f32, "num_predict": 64}
            })
        );
    }

    #[test]
    fn text_format_is_omitted() {
        let messages = [ChatMessage::user("hi")];
        let value = serde_json::to_value(OllamaChatRequest::build(
            "llava:7b",
            &messages,
            &AskOptions::default(),
        ))
        .unwrap();
        assert!(value.get("format").is_none());
        assert_eq!(value["options"], json!({}));
    }
}
