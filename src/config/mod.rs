// src/config/mod.rs
pub mod pipeline;

pub use pipeline::{sanitize_api_key, PipelineConfig, ENV_CONFIG_PATH};

use std::path::PathBuf;

/// Pre-flight configuration problems. Always fatal; raised before any network call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY is required and cannot be blank or whitespace; export it or add it to .env")]
    MissingApiKey,

    #[error(
        "OPENAI_API_KEY contains whitespace or control characters inside the key; re-copy the key without line breaks"
    )]
    MalformedApiKey,

    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("reading config file {}: {message}", path.display())]
    File { path: PathBuf, message: String },
}
