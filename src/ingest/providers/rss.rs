// src/ingest/providers/rss.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::ingest::normalize_text;
use crate::ingest::types::{FeedEntry, FeedSource};

// ---- RSS 2.0 ----

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    guid: Option<Text>,
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// Element text that may carry attributes (`<guid isPermaLink="false">`).
#[derive(Debug, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: Option<String>,
}

// ---- Atom ----

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: Option<String>,
    title: Option<Text>,
    #[serde(default)]
    link: Vec<AtomLink>,
    summary: Option<Text>,
    content: Option<Text>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

fn parse_feed_date(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    let dt = OffsetDateTime::parse(ts, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .ok()?;
    Utc.timestamp_opt(dt.unix_timestamp(), 0).single()
}

fn clean(s: Option<String>) -> String {
    s.map(|v| v.trim().to_string()).unwrap_or_default()
}

/// Build an entry, or `None` when it lacks a title or any identifier.
fn make_entry(
    id: Option<String>,
    title: Option<String>,
    link: Option<String>,
    summary: Option<String>,
    date: Option<String>,
) -> Option<FeedEntry> {
    let title = normalize_text(&clean(title));
    let link = clean(link);
    let id = Some(clean(id)).filter(|s| !s.is_empty()).unwrap_or_else(|| link.clone());
    if title.is_empty() || id.is_empty() {
        return None;
    }
    Some(FeedEntry {
        id,
        title,
        link,
        summary: normalize_text(&clean(summary)),
        published: date
            .as_deref()
            .and_then(parse_feed_date)
            .unwrap_or_else(Utc::now),
    })
}

/// Parse RSS 2.0 or Atom text into entries, in document order.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);

    let out: Vec<FeedEntry> = if let Ok(rss) = from_str::<Rss>(&xml_clean) {
        rss.channel
            .item
            .into_iter()
            .filter_map(|it| {
                make_entry(
                    it.guid.and_then(|g| g.value),
                    it.title,
                    it.link,
                    it.description,
                    it.pub_date,
                )
            })
            .collect()
    } else {
        let atom: AtomFeed =
            from_str(&xml_clean).context("parsing feed xml (neither rss nor atom)")?;
        atom.entry
            .into_iter()
            .filter_map(|e| {
                let link = e
                    .link
                    .iter()
                    .find(|l| l.rel.as_deref().map_or(true, |r| r == "alternate"))
                    .or(e.link.first())
                    .and_then(|l| l.href.clone());
                make_entry(
                    e.id,
                    e.title.and_then(|t| t.value),
                    link,
                    e.summary.or(e.content).and_then(|t| t.value),
                    e.published.or(e.updated),
                )
            })
            .collect()
    };

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);
    Ok(out)
}

pub struct RssFeed {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssFeed {
    pub fn from_fixture(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_url(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        }
    }
}

#[async_trait]
impl FeedSource for RssFeed {
    async fn fetch_entries(&self) -> Result<Vec<FeedEntry>> {
        match &self.mode {
            Mode::Fixture(s) => parse_feed(s),
            Mode::Http { url, client } => {
                let resp = client
                    .get(url.as_str())
                    .send()
                    .await
                    .with_context(|| format!("feed http get {url}"))?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(anyhow!("feed {url} returned HTTP {status}"));
                }
                let body = resp.text().await.context("feed http .text()")?;
                parse_feed(&body)
            }
        }
    }

    fn name(&self) -> &str {
        match &self.mode {
            Mode::Fixture(_) => "fixture",
            Mode::Http { url, .. } => url,
        }
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
