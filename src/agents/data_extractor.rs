use crate::agents::{DEFAULT_TEMPERATURE, SharedModel, ask_model, record};
use crate::chain::provider::{ChatMessage, ReplyFormat};
use crate::error::Result;
use crate::prompts::{render, system_prompt};

/// Extracts named data points from given content.
pub struct DataExtractor {
    model: SharedModel,
    template: String,
    additional_instructions: String,
    format: ReplyFormat,
    temperature: f32,
    chat_history: Vec<ChatMessage>,
}

impl DataExtractor {
    /// With `reply_as_json` the model is asked for a JSON object keyed by data point.
    pub fn new(model: SharedModel, reply_as_json: bool) -> Result<Self> {
        let (template, format) = if reply_as_json {
            (
                format!("{}\n Respond in JSON format", system_prompt("DataExtractorJson")?),
                ReplyFormat::Json,
            )
        } else {
            (system_prompt("DataExtractor")?.to_string(), ReplyFormat::Text)
        };
        Ok(Self {
            model,
            template,
            additional_instructions: String::new(),
            format,
            temperature: DEFAULT_TEMPERATURE,
            chat_history: Vec::new(),
        })
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

    pub fn system_prompt(&self) -> ChatMessage {
        ChatMessage::system(
            render(
                &self.template,
                &[("additional_instructions", &self.additional_instructions)],
            )
            .trim(),
        )
    }

    pub fn prompt_for<S: AsRef<str>>(&self, content: &str, data_points: &[S]) -> Vec<ChatMessage> {
        let data = data_points
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(", ");
        let user = format!(
            "Extract information from the following content:\n{content}\n\nExtract the following data:\n{data}"
        );
        vec![self.system_prompt(), ChatMessage::user(user)]
    }

    /// Example data points: `["name", "email", "phone", "address"]`.
    pub async fn ask<S: AsRef<str>>(&mut self, content: &str, data_points: &[S]) -> Result<String> {
        let prompts = self.prompt_for(content, data_points);
        let reply = ask_model(self.model.as_ref(), &prompts, self.temperature, self.format).await?;
        if let Some(user) = prompts.into_iter().nth(1) {
            record(&mut self.chat_history, user, &reply);
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChatModel;
    use crate::chain::provider::Role;
    use crate::json::extract_json;
    use std::sync::Arc;

    #[tokio::test]
    async fn ask_records_history() {
        let model = Arc::new(MockChatModel::always("Name: Frodo Baggins"));
        let mut extractor = DataExtractor::new(model, false).unwrap();

        let reply = extractor.ask("Frodo Baggins lives in Bag-End.", &["Name"]).await.unwrap();

        assert_eq!(reply, "Name: Frodo Baggins");
        assert_eq!(extractor.chat_history()[0].role, Role::User);
        assert_eq!(extractor.chat_history()[1].content, reply);
    }

    #[test]
    fn prompt_lists_requested_data_points() {
        let extractor = DataExtractor::new(Arc::new(MockChatModel::new()), false).unwrap();
        let prompts = extractor.prompt_for("some content", &["name", "email"]);
        assert_eq!(prompts[0], extractor.system_prompt());
        assert_eq!(prompts[1].role, Role::User);
        assert!(prompts[1].content.contains("some content"));
        assert!(prompts[1].content.ends_with("name, email"));
    }

    #[tokio::test]
    async fn json_mode_asks_for_json() {
        let model = Arc::new(MockChatModel::always(
            r#"{"Name": "Frodo Baggins", "Email": "frodo@gmail.com"}"#,
        ));
        let mut extractor = DataExtractor::new(model.clone(), true).unwrap();
        assert!(extractor.system_prompt().content.ends_with("Respond in JSON format"));

        let reply = extractor
            .ask("Frodo, frodo@gmail.com", &["name".to_string(), "email".to_string()])
            .await
            .unwrap();
        assert_eq!(model.calls()[0].options.format, ReplyFormat::Json);
        assert_eq!(extract_json(&reply).unwrap()["Email"], "frodo@gmail.com");
    }
}
