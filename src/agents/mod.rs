//! Agents built from premade prompts.
//!
//! Each agent owns a shared [`ChatModel`], renders its system prompt on demand
//! and keeps a `chat_history` of the user/assistant turns it exchanged. The
//! system prompt is never part of that history. [`ObjectDetector`] is stateless
//! and keeps none.

use std::sync::Arc;

use crate::chain::provider::{AskOptions, ChatMessage, ChatModel, ReplyFormat};
use crate::error::Result;

mod agent;
mod code;
mod data_extractor;
mod function_caller;
mod object_detector;
mod online;
mod pdf_reader;
mod website_reader;

pub use agent::{Agent, AgentKind};
pub use code::{CodeAgent, CodeSolution};
pub use data_extractor::DataExtractor;
pub use function_caller::{FunctionCall, FunctionCaller};
pub use object_detector::{DetectionTarget, ObjectDetector};
pub use online::OnlineAgent;
pub use pdf_reader::PdfReader;
pub use website_reader::WebsiteReader;

/// Chat model handle shared between agents.
pub type SharedModel = Arc<dyn ChatModel>;

pub(crate) const DEFAULT_TEMPERATURE: f32 = 0.8;

/// System message, then caller history, then the new user message.
pub(crate) fn conversation(
    system: ChatMessage,
    history: &[ChatMessage],
    user: ChatMessage,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(system);
    messages.extend_from_slice(history);
    messages.push(user);
    messages
}

/// Sends `messages` and returns the reply text.
pub(crate) async fn ask_model(
    model: &dyn ChatModel,
    messages: &[ChatMessage],
    temperature: f32,
    format: ReplyFormat,
) -> Result<String> {
    let options = AskOptions::default()
        .with_temperature(temperature)
        .with_format(format);
    tracing::debug!(model = model.name(), messages = messages.len(), ?format, "asking model");
    Ok(model.ask(messages, &options).await?.content)
}

/// Appends one user/assistant exchange to `history`.
pub(crate) fn record(history: &mut Vec<ChatMessage>, user: ChatMessage, reply: &str) {
    history.push(user);
    history.push(ChatMessage::assistant(reply));
}
