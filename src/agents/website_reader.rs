use tracing::warn;

use crate::agents::{DEFAULT_TEMPERATURE, SharedModel, ask_model, conversation, record};
use crate::chain::provider::{ChatMessage, ReplyFormat};
use crate::error::Result;
use crate::prompts::{render, system_prompt};
use crate::web::{HttpSiteReader, SiteReader};

const UNREADABLE: &str = "Website could not be read";

/// Answers questions about one specific website.
pub struct WebsiteReader {
    model: SharedModel,
    reader: Box<dyn SiteReader>,
    template: String,
    additional_instructions: String,
    temperature: f32,
    chat_history: Vec<ChatMessage>,
}

impl WebsiteReader {
    pub fn new(model: SharedModel) -> Result<Self> {
        Ok(Self {
            model,
            reader: Box::new(HttpSiteReader::new()),
            template: system_prompt("WebsiteReader")?.to_string(),
            additional_instructions: String::new(),
            temperature: DEFAULT_TEMPERATURE,
            chat_history: Vec::new(),
        })
    }

    /// Reads sites with `reader` instead of plain HTTP.
    pub fn with_site_reader(mut self, reader: impl SiteReader + 'static) -> Self {
        self.reader = Box::new(reader);
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

    pub async fn ask(&mut self, question: &str, url: &str, history: &[ChatMessage]) -> Result<String> {
        let content = match self.reader.read(url).await {
            Some(content) => content,
            None => {
                warn!(url, "website could not be read");
                UNREADABLE.to_string()
            }
        };
        let system = render(
            &self.template,
            &[
                ("url", url),
                ("content", &content),
                ("additional_instructions", &self.additional_instructions),
            ],
        );

        let user = ChatMessage::user(question);
        let messages = conversation(ChatMessage::system(system.trim()), history, user.clone());
        let reply = ask_model(
            self.model.as_ref(),
            &messages,
            self.temperature,
            ReplyFormat::Text,
        )
        .await?;
        record(&mut self.chat_history, user, &reply);
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChatModel;
    use std::sync::Arc;

    #[tokio::test]
    async fn site_content_is_placed_in_the_system_prompt() {
        let model = Arc::new(MockChatModel::always("It is a scraping sandbox."));
        let mut reader = WebsiteReader::new(model.clone())
            .unwrap()
            .with_site_reader(|_: &str| Some("Books to Scrape: a sandbox".to_string()));

        let reply = reader
            .ask("What is this site?", "https://toscrape.com/", &[])
            .await
            .unwrap();

        assert_eq!(reply, "It is a scraping sandbox.");
        let system = &model.calls()[0].messages[0].content;
        assert!(system.contains("https://toscrape.com/"));
        assert!(system.contains("Books to Scrape: a sandbox"));
        assert_eq!(reader.chat_history().len(), 2);
    }

    #[tokio::test]
    async fn unreadable_site_is_reported_to_the_model() {
        let model = Arc::new(MockChatModel::always("I could not read it."));
        let mut reader = WebsiteReader::new(model.clone())
            .unwrap()
            .with_site_reader(|_: &str| None);

        reader.ask("Summary?", "https://down.example", &[]).await.unwrap();

        assert!(model.calls()[0].messages[0].content.contains(UNREADABLE));
    }
}
