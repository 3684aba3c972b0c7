use tracing::warn;

use crate::agents::{DEFAULT_TEMPERATURE, SharedModel, ask_model, conversation, record};
use crate::chain::provider::{ChatMessage, ReplyFormat};
use crate::chain::tools::{FunctionDescriptor, render_schema};
use crate::error::Result;
use crate::matcher::{FunctionMatch, FunctionMatcher};
use crate::prompts::{render, system_prompt};

/// A function chosen by the model, with everything exchanged to choose it.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub function: FunctionMatch,
    /// Messages sent to the model, system prompt included.
    pub prompts: Vec<ChatMessage>,
    pub raw_response: String,
}

/// Asks the model to pick one of a fixed set of functions and fill in its arguments.
///
/// Give functions and parameters meaningful names and descriptions; the model
/// only sees the rendered schema.
pub struct FunctionCaller {
    model: SharedModel,
    functions: Vec<FunctionDescriptor>,
    schema: String,
    template: String,
    additional_instructions: String,
    temperature: f32,
    chat_history: Vec<ChatMessage>,
}

impl FunctionCaller {
    pub fn new(model: SharedModel, functions: Vec<FunctionDescriptor>) -> Result<Self> {
        let schema = render_schema(&functions);
        Ok(Self {
            model,
            functions,
            schema,
            template: system_prompt("FunctionCaller")?.to_string(),
            additional_instructions: String::new(),
            temperature: DEFAULT_TEMPERATURE,
            chat_history: Vec::new(),
        })
    }

    /// Replaces the function-picking prompt. `{schema}` and
    /// `{additional_instructions}` are filled in.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.template = prompt.into();
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

    pub fn functions(&self) -> &[FunctionDescriptor] {
        &self.functions
    }

    /// JSON text describing the candidates, as inserted into the prompt.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn chat_history(&self) -> &[ChatMessage] {
        &self.chat_history
    }

    pub fn system_prompt(&self) -> ChatMessage {
        ChatMessage::system(
            render(
                &self.template,
                &[
                    ("schema", &self.schema),
                    ("additional_instructions", &self.additional_instructions),
                ],
            )
            .trim(),
        )
    }

    /// The `[system, user]` pair for `question`, for use with an external LLM.
    pub fn prompt_for(&self, question: &str) -> Vec<ChatMessage> {
        vec![self.system_prompt(), ChatMessage::user(question)]
    }

    /// Resolves a reply obtained elsewhere, e.g. from [`Self::prompt_for`] sent by hand.
    pub fn resolve(&self, reply: &str) -> Option<FunctionMatch> {
        FunctionMatcher::new(&self.functions).match_reply(reply)
    }

    /// Asks the model for the most appropriate function.
    ///
    /// Returns `Ok(None)` when the reply names no known function.
    pub async fn get_function(
        &mut self,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<Option<FunctionCall>> {
        let user = ChatMessage::user(question);
        let prompts = conversation(self.system_prompt(), history, user.clone());
        let reply = ask_model(
            self.model.as_ref(),
            &prompts,
            self.temperature,
            ReplyFormat::Json,
        )
        .await?;
        record(&mut self.chat_history, user, &reply);

        let Some(function) = self.resolve(&reply) else {
            warn!("llm did not respond with a known function");
            return Ok(None);
        };
        Ok(Some(FunctionCall {
            function,
            prompts,
            raw_response: reply,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChatModel;
    use crate::chain::provider::Role;
    use crate::chain::tools::ParamType;
    use serde_json::json;
    use std::sync::Arc;

    fn arithmetic() -> Vec<FunctionDescriptor> {
        vec![
            FunctionDescriptor::new("get_time").with_description("Current local time."),
            FunctionDescriptor::new("add")
                .with_description("Adds two numbers.")
                .param("num1", ParamType::Integer)
                .param("num2", ParamType::Integer),
            FunctionDescriptor::new("multiply")
                .param("num1", ParamType::Integer)
                .param("num2", ParamType::Integer),
        ]
    }

    #[tokio::test]
    async fn picks_the_function_named_in_the_reply() {
        let reply = r#"{"function": "add", "parameters": {"num1": 500, "num2": 200}}"#;
        let model = Arc::new(MockChatModel::always(reply));
        let mut caller = FunctionCaller::new(model.clone(), arithmetic()).unwrap();

        let call = caller
            .get_function("I have 500 coins, I just got 200 more. How many do I have?", &[])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(call.function.name, "add");
        assert_eq!(call.function.argument("num2"), Some(&json!(200)));
        assert_eq!(call.raw_response, reply);
        assert_eq!(call.prompts.len(), 2);
        assert_eq!(model.calls()[0].options.format, ReplyFormat::Json);

        let history = caller.chat_history();
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, reply);
    }

    #[tokio::test]
    async fn unknown_function_is_none_but_still_recorded() {
        let model = Arc::new(MockChatModel::always(
            r#"{"function": "divide", "parameters": {"a": 1}}"#,
        ));
        let mut caller = FunctionCaller::new(model, arithmetic()).unwrap();

        assert_eq!(caller.get_function("10 / 2?", &[]).await.unwrap(), None);
        assert_eq!(caller.chat_history().len(), 2);
    }

    #[tokio::test]
    async fn history_is_spliced_into_prompts() {
        let model = Arc::new(MockChatModel::always(r#"{"function": "get_time", "parameters": {}}"#));
        let mut caller = FunctionCaller::new(model, arithmetic()).unwrap();

        let call = caller
            .get_function("What time is it?", &[ChatMessage::user("Hello")])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(call.prompts.len(), 3);
        assert_eq!(call.prompts[1].content, "Hello");
        assert_eq!(caller.chat_history()[0].content, "What time is it?");
    }

    #[test]
    fn system_prompt_embeds_the_schema() {
        let caller = FunctionCaller::new(Arc::new(MockChatModel::new()), arithmetic())
            .unwrap()
            .with_instructions("Prefer multiply when unsure.");
        let system = caller.system_prompt();
        assert_eq!(system.role, Role::System);
        assert!(system.content.contains(caller.schema()));
        assert!(system.content.contains("\"Adds two numbers.\""));
        assert!(system.content.ends_with("Prefer multiply when unsure."));
    }

    #[test]
    fn resolve_works_without_a_model_round_trip() {
        let caller = FunctionCaller::new(Arc::new(MockChatModel::new()), arithmetic()).unwrap();
        let matched = caller.resolve("multiply [6, 7]").unwrap();
        assert_eq!(matched.name, "multiply");
        assert_eq!(matched.argument("num1"), Some(&json!(6)));
    }
}
