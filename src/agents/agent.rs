use crate::agents::{DEFAULT_TEMPERATURE, SharedModel, ask_model, conversation, record};
use crate::chain::provider::{ChatMessage, ReplyFormat};
use crate::error::Result;
use crate::prompts::{render, system_prompt};

/// Premade roles for [`Agent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    /// Produces a step-by-step plan instead of an answer.
    Planner,
    Summarizer,
    GenericResponder,
    /// Checks content for correctness.
    Validator,
}

impl AgentKind {
    pub fn prompt_name(self) -> &'static str {
        match self {
            Self::Planner => "Planner",
            Self::Summarizer => "Summarizer",
            Self::GenericResponder => "GenericResponder",
            Self::Validator => "Validator",
        }
    }
}

/// Basic agent over a premade or custom system prompt.
pub struct Agent {
    model: SharedModel,
    template: String,
    additional_instructions: String,
    temperature: f32,
    format: ReplyFormat,
    chat_history: Vec<ChatMessage>,
}

impl Agent {
    pub fn new(model: SharedModel, kind: AgentKind) -> Result<Self> {
        Ok(Self::with_system_prompt(model, system_prompt(kind.prompt_name())?))
    }

    /// Uses `prompt` instead of a premade one. `{additional_instructions}` is still filled in.
    pub fn with_system_prompt(model: SharedModel, prompt: impl Into<String>) -> Self {
        Self {
            model,
            template: prompt.into(),
            additional_instructions: String::new(),
            temperature: DEFAULT_TEMPERATURE,
            format: ReplyFormat::Text,
            chat_history: Vec::new(),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.additional_instructions = instructions.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Asks the backend for JSON replies when `format` is [`ReplyFormat::Json`].
    pub fn with_format(mut self, format: ReplyFormat) -> Self {
        self.format = format;
        self
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

    pub fn chat_history(&self) -> &[ChatMessage] {
        &self.chat_history
    }

    /// The `[system, user]` pair this agent would send for `question`.
    pub fn prompt_for(&self, question: &str) -> Vec<ChatMessage> {
        vec![self.system_prompt(), ChatMessage::user(question)]
    }

    pub async fn ask(&mut self, prompt: &str) -> Result<String> {
        self.ask_with_images(prompt, Vec::new(), &[]).await
    }

    pub async fn ask_with_history(
        &mut self,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<String> {
        self.ask_with_images(prompt, Vec::new(), history).await
    }

    /// Asks with base64 images attached to the user message. Needs a multimodal model.
    pub async fn ask_with_images(
        &mut self,
        prompt: &str,
        images: Vec<String>,
        history: &[ChatMessage],
    ) -> Result<String> {
        let user = ChatMessage::user(prompt).with_images(images);
        let messages = conversation(self.system_prompt(), history, user.clone());
        let reply = ask_model(self.model.as_ref(), &messages, self.temperature, self.format).await?;
        record(&mut self.chat_history, user, &reply);
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChatModel;
    use crate::chain::provider::Role;
    use std::sync::Arc;

    #[tokio::test]
    async fn ask_records_user_and_assistant_turns() {
        let model = Arc::new(MockChatModel::always("This is a response from the llm"));
        let mut agent = Agent::new(model.clone(), AgentKind::GenericResponder).unwrap();

        let reply = agent.ask("What is the meaning of life?").await.unwrap();

        assert_eq!(reply, "This is a response from the llm");
        let history = agent.chat_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, reply);

        let sent = &model.calls()[0];
        assert_eq!(sent.messages[0].role, Role::System);
        assert_eq!(sent.options.temperature, Some(0.8));
    }

    #[tokio::test]
    async fn caller_history_sits_between_system_and_prompt() {
        let model = Arc::new(MockChatModel::always("ok"));
        let mut agent = Agent::new(model.clone(), AgentKind::Planner)
            .unwrap()
            .with_format(ReplyFormat::Json);

        agent
            .ask_with_history("Now what?", &[ChatMessage::user("Hello")])
            .await
            .unwrap();

        let sent = &model.calls()[0].messages;
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1].content, "Hello");
        assert_eq!(sent[2].content, "Now what?");
        assert_eq!(model.calls()[0].options.format, ReplyFormat::Json);
        // Caller history is not copied into the agent's own history.
        assert_eq!(agent.chat_history().len(), 2);
    }

    #[test]
    fn prompt_for_is_system_then_user() {
        let agent = Agent::new(Arc::new(MockChatModel::new()), AgentKind::Summarizer).unwrap();
        let prompts = agent.prompt_for("What is the meaning of life?");
        assert_eq!(
            prompts,
            vec![
                agent.system_prompt(),
                ChatMessage::user("What is the meaning of life?")
            ]
        );
    }

    #[test]
    fn custom_prompt_gets_instructions() {
        let agent = Agent::with_system_prompt(
            Arc::new(MockChatModel::new()),
            "Answer \"internet required\" or not. {additional_instructions}",
        )
        .with_instructions("Be terse.");
        assert_eq!(
            agent.system_prompt().content,
            "Answer \"internet required\" or not. Be terse."
        );
    }

    #[tokio::test]
    async fn images_ride_on_the_user_message() {
        let model = Arc::new(MockChatModel::always("a cat"));
        let mut agent = Agent::new(model.clone(), AgentKind::GenericResponder).unwrap();
        agent
            .ask_with_images("What is this?", vec!["aGk=".to_string()], &[])
            .await
            .unwrap();
        assert_eq!(model.calls()[0].messages[1].images, vec!["aGk=".to_string()]);
    }
}
