use std::path::Path;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metric descriptions (so series carry help text in the dump).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_entries_total", "Feed entries with a usable id.");
        describe_counter!("ingest_feed_errors_total", "Feed fetch/parse failures.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_counter!(
            "pipeline_entries_checked_total",
            "Entries looked at by the orchestrator."
        );
        describe_counter!(
            "pipeline_packages_created_total",
            "Content packages fully written."
        );
        describe_counter!(
            "pipeline_entry_failures_total",
            "Entries that failed and stay unseen."
        );
        describe_counter!("upstream_requests_total", "HTTP attempts against the API.");
        describe_counter!("upstream_retries_total", "Backoff sleeps before a retry.");
        describe_gauge!("pipeline_last_run_ts", "Unix ts when the pipeline last ran.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Call once, before the run.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Textfile-collector style dump of the current exposition.
    pub fn write_textfile(&self, path: &Path) -> std::io::Result<()> {
        crate::fingerprint::write_atomic(path, self.handle.render().as_bytes())
    }
}
