// src/ingest/mod.rs
pub mod providers;
pub mod types;

use crate::ingest::types::{FeedEntry, FeedSource};
use metrics::counter;

/// Normalize feed text: decode entities, strip tags, collapse whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (incl. nbsp and full-width space)
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 5) Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Fetch entries from a source and drop the ones without a usable id.
/// Source order is preserved.
pub async fn load_entries(source: &dyn FeedSource) -> anyhow::Result<Vec<FeedEntry>> {
    let raw = match source.fetch_entries().await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = ?e, feed = source.name(), "feed fetch failed");
            counter!("ingest_feed_errors_total").increment(1);
            return Err(e);
        }
    };

    let total = raw.len();
    let kept: Vec<FeedEntry> = raw.into_iter().filter(FeedEntry::has_id).collect();
    let dropped = total - kept.len();

    counter!("ingest_entries_total").increment(kept.len() as u64);
    tracing::info!(
        target: "ingest",
        feed = source.name(),
        kept = kept.len(),
        dropped,
        "feed loaded"
    );
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_collapses_ws_and_decodes() {
        let s = "  Hello,&nbsp;&nbsp; <b>world</b>!  ";
        let out = normalize_text(s);
        assert_eq!(out, "Hello, world!");
    }

    #[test]
    fn normalize_text_keeps_japanese_punctuation() {
        let s = "<p>人気俳優が結婚を発表。</p>\n\n<p>ファン「おめでとう」</p>";
        assert_eq!(normalize_text(s), "人気俳優が結婚を発表。 ファン「おめでとう」");
    }
}
