//! Crate-wide error type.

use std::io::Error as IoError;

use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use tokio::task::JoinError;
use toml::de::Error as TomlError;

use crate::chain::provider::ProviderError;

/// Result type for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by agents and utilities.
///
/// A reply that names no function or carries no usable JSON is not an error;
/// those cases come back as `None`.
#[derive(Debug, Error)]
pub enum Error {
    /// The chat backend failed. Passed through unmodified.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// A PDF could not be read.
    #[error("Failed to read PDF '{path}': {message}")]
    Pdf { path: String, message: String },

    /// Blocking work handed to a background thread panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(#[from] JoinError),

    /// An image could not be decoded or re-encoded.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Fetching or parsing a web page failed.
    #[error("Website error: {0}")]
    Scrape(String),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller passed a combination of arguments that cannot be served.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No premade prompt exists under the given name.
    #[error("Unknown prompt '{0}'")]
    UnknownPrompt(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_display() {
        let err = Error::InvalidArgument("overlap must be smaller than chunk size".to_owned());
        assert_eq!(
            err.to_string(),
            "Invalid argument: overlap must be smaller than chunk size"
        );
    }

    #[test]
    fn provider_error_is_transparent() {
        let err = Error::from(ProviderError::MissingApiKey {
            provider: crate::chain::provider::Provider::Openai,
            key_env: "OPENAI_API_KEY",
        });
        assert_eq!(err.to_string(), "OPENAI_API_KEY is not set in the environment");
    }
}
