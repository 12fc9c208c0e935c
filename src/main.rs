//! rss-hugo-ai: Binary Entrypoint
//! Loads config, runs one pass over the feed, prints the summary.
//!
//! Exits non-zero on fatal errors (bad key, exhausted quota, persistent rate
//! limiting, unwritable state) with a message saying what to change.

use std::process::ExitCode;

use rss_hugo_ai::metrics::Metrics;
use rss_hugo_ai::{run_from_config, FatalError, PipelineConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = match PipelineConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[rss-hugo-ai] fatal: {}", FatalError::from(e));
            return ExitCode::from(2);
        }
    };
    tracing::info!(
        feed = %cfg.feed_url,
        posts_dir = %cfg.posts_dir.display(),
        model = %cfg.llm_model,
        key_len = cfg.api_key.len(),
        "config loaded"
    );

    let metrics = match &cfg.metrics_textfile {
        Some(_) => match Metrics::init() {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!(error = %e, "metrics recorder not installed");
                None
            }
        },
        None => None,
    };

    let result = run_from_config(&cfg).await;

    if let (Some(m), Some(path)) = (&metrics, &cfg.metrics_textfile) {
        if let Err(e) = m.write_textfile(path) {
            tracing::warn!(path = %path.display(), error = %e, "metrics textfile not written");
        }
    }

    match result {
        Ok(report) => {
            println!("[rss-hugo-ai] {}", report.summary_line());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("[rss-hugo-ai] fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}
