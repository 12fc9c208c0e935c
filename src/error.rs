//! Two-tier error taxonomy.
//!
//! [`FatalError`] aborts the whole run and is allowed to propagate to `main`.
//! [`EntryError`] only skips the current feed entry; the orchestrator catches
//! it, logs it and moves on without marking the entry seen.

use crate::config::ConfigError;
use crate::upstream::UpstreamError;

/// Conditions no later entry in the run can recover from.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(
        "authentication rejected by the API (HTTP {status}): check that OPENAI_API_KEY is a valid, active key for {base_url}"
    )]
    Auth { status: u16, base_url: String },

    #[error(
        "API quota exhausted: {message}. Retrying will not help; top up billing or raise the account's usage limit, then re-run"
    )]
    QuotaExceeded { message: String },

    #[error(
        "still rate limited after {attempts} attempts: lower MAX_POSTS_PER_RUN or run less often"
    )]
    RetriesExhausted { attempts: u32 },

    #[error("cannot persist state file {path}: {source}")]
    State {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Problems confined to one feed entry.
#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("image generation failed: {0}")]
    ImageGeneration(String),

    #[error("writing content package failed: {0}")]
    Write(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fatal(#[from] FatalError),

    #[error(transparent)]
    Recoverable(#[from] EntryError),
}

impl PipelineError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Fatal(_))
    }
}

impl From<UpstreamError> for PipelineError {
    fn from(e: UpstreamError) -> Self {
        match e {
            UpstreamError::Auth { status, base_url } => {
                FatalError::Auth { status, base_url }.into()
            }
            UpstreamError::QuotaExceeded { message } => {
                FatalError::QuotaExceeded { message }.into()
            }
            UpstreamError::RetriesExhausted { attempts } => {
                FatalError::RetriesExhausted { attempts }.into()
            }
            // Only escapes the client if a caller bypasses the retry loop.
            UpstreamError::RateLimited { .. } => {
                EntryError::Generation("rate limited".to_string()).into()
            }
            other => EntryError::Generation(other.to_string()).into(),
        }
    }
}
