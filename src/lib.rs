//! Prompt templates, function calling and small agents over chat-completion endpoints.
//!
//! The library side is built around [`chain::provider::ChatModel`]: every agent in
//! [`agents`] talks to an LLM through that trait, so the bundled HTTP backends,
//! the scripted [`chain::mock::MockChatModel`] or a caller-provided model can be
//! swapped freely.

/// Agents composed from premade prompts.
pub mod agents;
/// Chat model clients and message types.
pub mod chain;
/// CLI subcommands.
pub mod commands;
/// Profile configuration file.
pub mod config;
/// Document text extraction.
pub mod documents;
pub mod error;
/// Lenient JSON extraction from model replies.
pub mod json;
/// Function-selection matcher.
pub mod matcher;
/// Premade system prompts.
pub mod prompts;
/// Text chunking.
pub mod text;
/// Website reading and internet search.
pub mod web;

pub use agents::{
    Agent, AgentKind, CodeAgent, CodeSolution, DataExtractor, DetectionTarget, FunctionCall,
    FunctionCaller, ObjectDetector, OnlineAgent, PdfReader, SharedModel, WebsiteReader,
};
pub use chain::provider::{AskOptions, ChatMessage, ChatModel, ReplyFormat, Role};
pub use chain::tools::{FunctionDescriptor, FunctionParam, ParamType};
pub use error::{Error, Result};
pub use matcher::FunctionMatch;
