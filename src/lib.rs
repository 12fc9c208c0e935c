// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod contract;
pub mod error;
pub mod fingerprint;
pub mod ingest;
pub mod metrics;
pub mod package;
pub mod pipeline;
pub mod selector;
pub mod upstream;

// ---- Re-exports for stable public API ----
pub use crate::config::PipelineConfig;
pub use crate::error::{EntryError, FatalError, PipelineError};
pub use crate::ingest::types::{FeedEntry, FeedSource};
pub use crate::pipeline::{Pipeline, RunReport};

use std::sync::Arc;
use std::time::Duration;

use crate::ingest::providers::rss::RssFeed;
use crate::package::FsPackageSink;
use crate::upstream::{OpenAiGenerator, ReqwestTransport, RetryPolicy, UpstreamClient};

/// Wire the production components from `cfg` and run once against the configured feed.
pub async fn run_from_config(cfg: &PipelineConfig) -> anyhow::Result<RunReport> {
    let transport = ReqwestTransport::new(&cfg.api_key, cfg.http_timeout)?;
    let client = UpstreamClient::new(Arc::new(transport), cfg.api_base.clone())
        .with_policy(RetryPolicy::default().with_max_attempts(cfg.retry_max_attempts));
    let generator = OpenAiGenerator::new(client, cfg);

    let feed_http = reqwest::Client::builder()
        .user_agent(concat!("rss-hugo-ai/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()?;
    let feed = RssFeed::from_url(cfg.feed_url.clone(), feed_http);
    let entries = ingest::load_entries(&feed).await?;
    if entries.is_empty() {
        tracing::info!(feed = %cfg.feed_url, "no entries found in feed");
    }

    let pipeline = Pipeline::new(
        cfg,
        Arc::new(generator),
        Arc::new(FsPackageSink::new(cfg.posts_dir.clone())),
    );
    Ok(pipeline.run(&entries).await?)
}
