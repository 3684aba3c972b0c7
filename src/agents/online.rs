use tracing::{debug, warn};

use crate::agents::{Agent, AgentKind, DEFAULT_TEMPERATURE, SharedModel, ask_model, record};
use crate::chain::provider::{ChatMessage, ReplyFormat};
use crate::error::Result;
use crate::json::extract_json;
use crate::prompts::{render, system_prompt};
use crate::web::{DuckDuckGoSearcher, HttpSiteReader, Searcher, SiteReader};

/// Agent with internet access.
///
/// Answering takes three model round trips: one to phrase a search query, one
/// to pick the most promising result, and one to answer from that page.
pub struct OnlineAgent {
    model: SharedModel,
    searcher: Box<dyn Searcher>,
    reader: Box<dyn SiteReader>,
    additional_instructions: String,
    temperature: f32,
    chat_history: Vec<ChatMessage>,
}

impl OnlineAgent {
    pub fn new(model: SharedModel) -> Self {
        Self {
            model,
            searcher: Box::new(DuckDuckGoSearcher::default()),
            reader: Box::new(HttpSiteReader::new()),
            additional_instructions: String::new(),
            temperature: DEFAULT_TEMPERATURE,
            chat_history: Vec::new(),
        }
    }

    pub fn with_searcher(mut self, searcher: impl Searcher + 'static) -> Self {
        self.searcher = Box::new(searcher);
        self
    }

    pub fn with_site_reader(mut self, reader: impl SiteReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    /// Appended to the query-writing prompt.
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

    fn searcher_prompt(&self) -> Result<ChatMessage> {
        let system = render(
            system_prompt("OnlineSearcher")?,
            &[("additional_instructions", &self.additional_instructions)],
        );
        Ok(ChatMessage::system(system.trim()))
    }

    /// Asks the model for a search query answering `question`.
    pub async fn search_query(&mut self, question: &str) -> Result<Option<String>> {
        let user = ChatMessage::user(question);
        let messages = vec![self.searcher_prompt()?, user.clone()];
        let reply = ask_model(
            self.model.as_ref(),
            &messages,
            self.temperature,
            ReplyFormat::Json,
        )
        .await?;
        record(&mut self.chat_history, user, &reply);

        Ok(string_field(&reply, "search_query"))
    }

    /// Searches the internet and answers `prompt` from the best result.
    ///
    /// Returns `Ok(None)` when the model yields no search query or no URL.
    pub async fn search(&mut self, prompt: &str, history: &[ChatMessage]) -> Result<Option<String>> {
        let Some(query) = self.search_query(prompt).await? else {
            warn!("llm did not respond with a search query");
            return Ok(None);
        };
        debug!(query, "searching the internet");
        let results = serde_json::to_string(&self.searcher.search(&query).await?)?;

        // The picker prompt rides as a user message so caller history can precede it.
        let picker = render(
            system_prompt("UrlPicker")?,
            &[("question", prompt), ("urls", &results)],
        );
        let picker = ChatMessage::user(picker.trim());
        let mut messages = history.to_vec();
        messages.push(picker.clone());
        let reply = ask_model(
            self.model.as_ref(),
            &messages,
            self.temperature,
            ReplyFormat::Json,
        )
        .await?;
        record(&mut self.chat_history, picker, &reply);

        let Some(url) = string_field(&reply, "url") else {
            warn!("llm did not respond with a valid url");
            return Ok(None);
        };
        let site_text = self
            .reader
            .read(&url)
            .await
            .unwrap_or_else(|| "Website could not be read".to_string());

        let question = format!(
            "Please read the following information:\n\n\
             Information about Website {url}:\n{site_text}\n\n\
             Answer the following question based on the above information:\n{prompt}\n\n\
             Start your answer with \"Based on information from the internet, \""
        );
        let mut responder = Agent::new(self.model.clone(), AgentKind::GenericResponder)?
            .with_temperature(self.temperature);
        let answer = responder.ask_with_history(&question, history).await?;
        record(&mut self.chat_history, ChatMessage::user(question), &answer);
        Ok(Some(answer))
    }
}

fn string_field(reply: &str, key: &str) -> Option<String> {
    extract_json(reply)?
        .get(key)?
        .as_str()
        .map(str::to_string)
}
