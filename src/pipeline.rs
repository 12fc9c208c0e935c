//! Orchestrator: drives feed entries through generate → parse → select →
//! image → write, then commits to the fingerprint stores.
//!
//! Per run: `LOAD_STATE → for each entry {SKIP_IF_SEEN → GENERATE → PARSE →
//! SELECT_COMMENTARY → GENERATE_IMAGE? → WRITE_PACKAGE → MARK_SEEN} → SAVE_STATE`.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, gauge};

use crate::config::PipelineConfig;
use crate::contract;
use crate::error::{EntryError, FatalError, PipelineError};
use crate::fingerprint::{FingerprintStore, RecentSet, SeenIdStore};
use crate::ingest::types::FeedEntry;
use crate::package::{description_from, slugify, ContentPackage, PackageSink};
use crate::selector::{self, LineRules};
use crate::upstream::{ContentGenerator, Sleeper, TokioSleeper};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoId,
    AlreadySeen,
    /// Bundle directory already on disk; recorded as seen without any API call.
    BundleExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created { path: PathBuf, with_image: bool },
    Failed { reason: String },
    Skipped(SkipReason),
    /// Past the per-run cap; left unseen for a later run.
    Deferred,
}

#[derive(Debug, Clone)]
pub struct EntryOutcome {
    pub id: String,
    pub title: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub checked: usize,
    pub attempted: usize,
    pub created: usize,
    pub failed: usize,
    pub skipped: usize,
    pub deferred: usize,
    pub outcomes: Vec<EntryOutcome>,
}

impl RunReport {
    fn record(&mut self, entry: &FeedEntry, outcome: Outcome) {
        match &outcome {
            Outcome::Created { .. } => self.created += 1,
            Outcome::Failed { .. } => self.failed += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Deferred => self.deferred += 1,
        }
        self.outcomes.push(EntryOutcome {
            id: entry.id.clone(),
            title: entry.title.clone(),
            outcome,
        });
    }

    pub fn summary_line(&self) -> String {
        format!(
            "checked={} created={} failed={} skipped={} deferred={}",
            self.checked, self.created, self.failed, self.skipped, self.deferred
        )
    }
}

/// Mutable run state; loaded once, saved once.
struct RunState {
    seen: BTreeSet<String>,
    mike: RecentSet,
}

struct Created {
    path: PathBuf,
    with_image: bool,
    fingerprint: Option<String>,
}

pub struct Pipeline<'a> {
    cfg: &'a PipelineConfig,
    generator: Arc<dyn ContentGenerator>,
    sink: Arc<dyn PackageSink>,
    sleeper: Arc<dyn Sleeper>,
    seen_store: SeenIdStore,
    mike_store: FingerprintStore,
    rules: LineRules,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        cfg: &'a PipelineConfig,
        generator: Arc<dyn ContentGenerator>,
        sink: Arc<dyn PackageSink>,
    ) -> Self {
        Self {
            cfg,
            generator,
            sink,
            sleeper: Arc::new(TokioSleeper),
            seen_store: SeenIdStore::new(cfg.seen_ids_path()),
            mike_store: FingerprintStore::new(cfg.seen_mike_path(), cfg.mike_keep_last),
            rules: LineRules {
                max_chars: cfg.mike_max_chars,
                terminal_marker: cfg.mike_terminal_marker.clone(),
            },
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Process `entries` in order. State is saved even when a fatal error
    /// aborts the loop, so packages already written stay recorded.
    pub async fn run(&self, entries: &[FeedEntry]) -> Result<RunReport, FatalError> {
        crate::metrics::ensure_metrics_described();

        let mut state = RunState {
            seen: self.seen_store.load(),
            mike: self.mike_store.load(),
        };
        tracing::info!(
            seen = state.seen.len(),
            fingerprints = state.mike.len(),
            entries = entries.len(),
            cap = self.cfg.max_posts_per_run,
            "state loaded"
        );

        let mut report = RunReport::default();
        let looped = self.process_all(entries, &mut state, &mut report).await;
        let saved = self.save_state(&state);

        gauge!("pipeline_last_run_ts").set(Utc::now().timestamp() as f64);

        match (looped, saved) {
            (Err(fatal), Err(save_err)) => {
                tracing::error!(error = %save_err, "state not saved after fatal error");
                Err(fatal)
            }
            (Err(fatal), Ok(())) => Err(fatal),
            (Ok(()), Err(save_err)) => Err(save_err),
            (Ok(()), Ok(())) => {
                tracing::info!(
                    checked = report.checked,
                    created = report.created,
                    failed = report.failed,
                    skipped = report.skipped,
                    deferred = report.deferred,
                    "run finished"
                );
                Ok(report)
            }
        }
    }

    fn save_state(&self, state: &RunState) -> Result<(), FatalError> {
        self.seen_store
            .save(&state.seen)
            .map_err(|source| FatalError::State {
                path: self.seen_store.path().display().to_string(),
                source,
            })?;
        self.mike_store
            .save(&state.mike)
            .map_err(|source| FatalError::State {
                path: self.mike_store.path().display().to_string(),
                source,
            })
    }

    async fn process_all(
        &self,
        entries: &[FeedEntry],
        state: &mut RunState,
        report: &mut RunReport,
    ) -> Result<(), FatalError> {
        for entry in entries {
            report.checked += 1;
            counter!("pipeline_entries_checked_total").increment(1);

            if !entry.has_id() {
                tracing::debug!(title = %entry.title, "skipped: no id");
                report.record(entry, Outcome::Skipped(SkipReason::NoId));
                continue;
            }
            if state.seen.contains(&entry.id) {
                tracing::debug!(entry_id = %entry.id, "skipped: already seen");
                report.record(entry, Outcome::Skipped(SkipReason::AlreadySeen));
                continue;
            }

            let slug = slugify(&entry.title, &entry.id, &entry.published);
            if self.sink.exists(&slug).await {
                tracing::info!(
                    entry_id = %entry.id,
                    slug = %slug,
                    "skipped: bundle already exists"
                );
                state.seen.insert(entry.id.clone());
                report.record(entry, Outcome::Skipped(SkipReason::BundleExists));
                continue;
            }

            if report.attempted >= self.cfg.max_posts_per_run {
                report.record(entry, Outcome::Deferred);
                continue;
            }
            report.attempted += 1;

            let result = self.process_entry(entry, slug, &state.mike).await;
            match result {
                Ok(created) => {
                    // Commit only after every write for this entry succeeded.
                    state.seen.insert(entry.id.clone());
                    if let Some(fp) = created.fingerprint {
                        state.mike.insert(fp);
                    }
                    counter!("pipeline_packages_created_total").increment(1);
                    tracing::info!(
                        entry_id = %entry.id,
                        title = %entry.title,
                        path = %created.path.display(),
                        with_image = created.with_image,
                        "created"
                    );
                    report.record(
                        entry,
                        Outcome::Created {
                            path: created.path,
                            with_image: created.with_image,
                        },
                    );
                    if !self.cfg.pace.is_zero() {
                        self.sleeper.sleep(self.cfg.pace).await;
                    }
                }
                Err(PipelineError::Recoverable(e)) => {
                    counter!("pipeline_entry_failures_total").increment(1);
                    tracing::warn!(
                        entry_id = %entry.id,
                        title = %entry.title,
                        error = %e,
                        "failed"
                    );
                    report.record(
                        entry,
                        Outcome::Failed {
                            reason: e.to_string(),
                        },
                    );
                }
                Err(PipelineError::Fatal(f)) => {
                    tracing::error!(
                        entry_id = %entry.id,
                        title = %entry.title,
                        error = %f,
                        "aborting run"
                    );
                    report.record(
                        entry,
                        Outcome::Failed {
                            reason: f.to_string(),
                        },
                    );
                    return Err(f);
                }
            }
        }
        Ok(())
    }

    async fn process_entry(
        &self,
        entry: &FeedEntry,
        slug: String,
        seen_mike: &RecentSet,
    ) -> Result<Created, PipelineError> {
        let raw = self.generator.generate_article(entry).await?;

        let parsed =
            contract::parse(&raw).map_err(|e| EntryError::MalformedResponse(e.reason))?;
        tracing::debug!(entry_id = %entry.id, stage = ?parsed.stage, "payload parsed");

        let selection = selector::select(
            &parsed.commentary_candidates,
            seen_mike.as_set(),
            &self.rules,
        );
        if selection.repeated {
            tracing::info!(
                entry_id = %entry.id,
                "every commentary candidate already used; repeating the first"
            );
        }

        let image = if self.cfg.skip_image {
            None
        } else {
            let prompt = parsed.image_prompt.as_deref().unwrap_or(&entry.title);
            match self.generator.generate_image(prompt).await {
                Ok(bytes) => Some(bytes),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    let e = EntryError::ImageGeneration(e.to_string());
                    tracing::warn!(
                        entry_id = %entry.id,
                        error = %e,
                        "continuing without cover image"
                    );
                    None
                }
            }
        };

        let title = match (&parsed.title, self.cfg.rewrite_headline) {
            (Some(t), true) => t.clone(),
            _ => entry.title.clone(),
        };

        let pkg = ContentPackage {
            slug,
            title,
            description: description_from(&entry.summary, &parsed.body),
            body: parsed.body,
            commentary: selection.line,
            tags: parsed.tags,
            category: self.cfg.category.clone(),
            source_link: entry.link.clone(),
            image,
            event_time: entry.published,
            publish_time: Utc::now(),
        };

        let path = self
            .sink
            .write(&pkg)
            .await
            .map_err(|e| EntryError::Write(e.to_string()))?;

        Ok(Created {
            path,
            with_image: pkg.image.is_some(),
            fingerprint: selection.fingerprint,
        })
    }
}
