//! Lightweight LLM integration helpers.
//!
//! The module contains the chat model seam, the bundled HTTP backends,
//! embeddings, function descriptors and multimodal helpers used by agents
//! and CLI commands.

pub(crate) mod chat_runtime;
/// Embedding client and similarity lookup.
pub mod embeddings;
/// Image encoding for multimodal prompts.
pub mod images;
/// Scripted chat model.
pub mod mock;
/// Ollama chat backend.
pub mod ollama;
/// OpenAI-compatible chat-completions backend.
pub mod openai;
/// Provider-agnostic chat interfaces and dispatch.
pub mod provider;
/// Function descriptors rendered into prompts.
pub mod tools;
