//! Generative API boundary: transport seam, retrying client, OpenAI-compatible generator.

pub mod client;
pub mod openai;
pub mod transport;

pub use client::{RetryPolicy, UpstreamClient};
pub use openai::OpenAiGenerator;
pub use transport::{
    RawResponse, ReqwestTransport, Sleeper, TokioSleeper, Transport, UpstreamRequest,
};

use std::time::Duration;

use async_trait::async_trait;

use crate::ingest::types::FeedEntry;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    /// 401 from the API. Fatal.
    #[error("HTTP {status}: API key rejected by {base_url}")]
    Auth { status: u16, base_url: String },

    /// 429 whose body says the quota/billing limit is exhausted. Fatal, never retried.
    #[error("quota exhausted: {message}")]
    QuotaExceeded { message: String },

    /// Plain 429. Consumed by the retry loop.
    #[error("rate limited (retry-after: {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("rate limited on all {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// Errors after which no further call in this run can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            UpstreamError::Auth { .. }
                | UpstreamError::QuotaExceeded { .. }
                | UpstreamError::RetriesExhausted { .. }
        )
    }
}

/// What the orchestrator needs from the generative API.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Raw model text expected to contain the article payload.
    async fn generate_article(&self, entry: &FeedEntry) -> Result<String, UpstreamError>;

    /// Encoded image bytes for a cover.
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, UpstreamError>;
}
