// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

/// One item read from the feed. Immutable once read.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FeedEntry {
    pub id: String, // guid/atom id, else link; dedup key
    pub title: String,
    pub link: String,
    pub summary: String, // normalized plain text, may be empty
    pub published: DateTime<Utc>,
}

impl FeedEntry {
    pub fn has_id(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_entries(&self) -> Result<Vec<FeedEntry>>;
    fn name(&self) -> &str;
}
