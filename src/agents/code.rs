use serde_json::Value;
use tracing::warn;

use crate::agents::{DEFAULT_TEMPERATURE, SharedModel, ask_model, conversation, record};
use crate::chain::provider::{ChatMessage, ReplyFormat};
use crate::error::Result;
use crate::json::extract_json;
use crate::prompts::{render, render_system_prompt, system_prompt};

/// Code written by [`CodeAgent`].
///
/// Never run `code` outside an isolated environment.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeSolution {
    pub code: String,
    /// Libraries the code depends on, as reported by the model. `None` when
    /// that reply was not JSON.
    pub libraries: Option<Value>,
}

/// Solves problems by writing code.
pub struct CodeAgent {
    model: SharedModel,
    language: String,
    additional_instructions: String,
    temperature: f32,
    chat_history: Vec<ChatMessage>,
}

impl CodeAgent {
    pub fn new(model: SharedModel) -> Self {
        Self {
            model,
            language: "Python".to_string(),
            additional_instructions: String::new(),
            temperature: DEFAULT_TEMPERATURE,
            chat_history: Vec::new(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.additional_instructions = instructions.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn chat_history(&self) -> &[ChatMessage] {
        &self.chat_history
    }

    pub fn system_prompt(&self) -> Result<ChatMessage> {
        let system = render(
            system_prompt("CodeAgent")?,
            &[
                ("language", &self.language),
                ("additional_instructions", &self.additional_instructions),
            ],
        );
        Ok(ChatMessage::system(system.trim()))
    }

    /// Returns `Ok(None)` when the reply holds no fenced code block.
    pub async fn ask(&mut self, prompt: &str, history: &[ChatMessage]) -> Result<Option<CodeSolution>> {
        let user = ChatMessage::user(prompt);
        let messages = conversation(self.system_prompt()?, history, user.clone());
        let reply = ask_model(
            self.model.as_ref(),
            &messages,
            self.temperature,
            ReplyFormat::Text,
        )
        .await?;
        record(&mut self.chat_history, user, &reply);

        let Some(code) = first_code_block(&reply) else {
            warn!("llm reply contains no code block");
            return Ok(None);
        };

        let extract = vec![
            ChatMessage::system(render_system_prompt("ImportExtractor", &[])?),
            ChatMessage::user(reply),
        ];
        let imports = ask_model(
            self.model.as_ref(),
            &extract,
            self.temperature,
            ReplyFormat::Json,
        )
        .await?;
        self.chat_history.push(ChatMessage::assistant(imports.as_str()));

        let libraries = extract_json(&imports).map(|value| match value {
            Value::Object(mut map) if map.contains_key("libraries") => {
                map.remove("libraries").unwrap_or(Value::Null)
            }
            other => other,
        });
        Ok(Some(CodeSolution { code, libraries }))
    }
}

/// Contents of the first ```` ``` ```` fence, without its language tag line.
pub fn first_code_block(reply: &str) -> Option<String> {
    let (_, rest) = reply.split_once("```")?;
    let body = rest.split_once("```").map_or(rest, |(body, _)| body);
    let body = match body.split_once('\n') {
        Some((tag, code)) if is_language_tag(tag) => code,
        _ => body,
    };
    let code = body.trim_matches('\n');
    (!code.trim().is_empty()).then(|| code.to_string())
}

fn is_language_tag(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '+' | '#' | '-' | '.' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChatModel;
    use serde_json::json;
    use std::sync::Arc;

    const REPLY: &str = "Here you go:\n```python\nimport requests\nprint(requests.get('https://example.com').status_code)\n```\nEnjoy.";

    #[test]
    fn code_block_drops_the_language_tag() {
        assert_eq!(
            first_code_block(REPLY).unwrap(),
            "import requests\nprint(requests.get('https://example.com').status_code)"
        );
        assert_eq!(first_code_block("```\nx = 1\n```").unwrap(), "x = 1");
        assert_eq!(first_code_block("no code here"), None);
    }

    #[tokio::test]
    async fn ask_returns_code_and_libraries() {
        let model = Arc::new(
            MockChatModel::new()
                .with_reply(REPLY)
                .with_reply(r#"{"libraries": ["requests"]}"#),
        );
        let mut agent = CodeAgent::new(model.clone());

        let solution = agent.ask("Fetch example.com", &[]).await.unwrap().unwrap();

        assert!(solution.code.starts_with("import requests"));
        assert_eq!(solution.libraries, Some(json!(["requests"])));
        let calls = model.calls();
        assert!(calls[0].messages[0].content.contains("Python"));
        assert_eq!(calls[1].options.format, ReplyFormat::Json);
        assert_eq!(agent.chat_history().len(), 3);
    }

    #[tokio::test]
    async fn reply_without_code_skips_import_extraction() {
        let model = Arc::new(MockChatModel::always("I would rather not."));
        let mut agent = CodeAgent::new(model.clone()).with_language("Rust");

        assert_eq!(agent.ask("Write a parser", &[]).await.unwrap(), None);
        assert_eq!(model.call_count(), 1);
        assert_eq!(agent.chat_history().len(), 2);
    }
}
