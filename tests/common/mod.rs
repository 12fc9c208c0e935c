// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use rss_hugo_ai::upstream::{
    ContentGenerator, RawResponse, Sleeper, Transport, UpstreamError, UpstreamRequest,
};
use rss_hugo_ai::{FeedEntry, PipelineConfig};
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Config rooted in a temp dir; no process env involved.
pub fn test_config(root: &Path, extra: &[(&str, &str)]) -> PipelineConfig {
    let mut map: HashMap<String, String> = HashMap::new();
    map.insert("OPENAI_API_KEY".into(), "sk-test".into());
    map.insert(
        "HUGO_POSTS_DIR".into(),
        root.join("posts").display().to_string(),
    );
    map.insert("STATE_DIR".into(), root.join("state").display().to_string());
    map.insert("PACE_SECS".into(), "0".into());
    for (k, v) in extra {
        map.insert(k.to_string(), v.to_string());
    }
    PipelineConfig::from_lookup(|k| map.get(k).cloned()).expect("test config")
}

pub fn entry(id: &str, title: &str) -> FeedEntry {
    FeedEntry {
        id: id.to_string(),
        title: title.to_string(),
        link: format!("https://news.example/{id}"),
        summary: String::new(),
        published: Utc.with_ymd_and_hms(2025, 6, 9, 19, 0, 0).unwrap(),
    }
}

pub fn payload(body: &str, mikes: &[&str], tags: &[&str]) -> String {
    serde_json::json!({
        "article_md": body,
        "mike_candidates": mikes,
        "tags": tags,
        "image_prompt": "a stage with spotlights",
    })
    .to_string()
}

// ------------------------------------------------------------
// Fake generator
// ------------------------------------------------------------

pub struct FakeGenerator {
    pub articles: Mutex<HashMap<String, Result<String, UpstreamError>>>,
    pub default_article: String,
    pub image: Mutex<Option<Result<Vec<u8>, UpstreamError>>>,
    pub article_calls: Mutex<Vec<String>>,
    pub image_calls: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self {
            articles: Mutex::new(HashMap::new()),
            default_article: payload("本文です。", &["いいね"], &["芸能"]),
            image: Mutex::new(None),
            article_calls: Mutex::new(vec![]),
            image_calls: Mutex::new(vec![]),
        }
    }

    pub fn with_article(self, id: &str, result: Result<String, UpstreamError>) -> Self {
        self.articles.lock().unwrap().insert(id.to_string(), result);
        self
    }

    pub fn with_image(self, result: Result<Vec<u8>, UpstreamError>) -> Self {
        *self.image.lock().unwrap() = Some(result);
        self
    }

    pub fn article_calls(&self) -> Vec<String> {
        self.article_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentGenerator for FakeGenerator {
    async fn generate_article(&self, entry: &FeedEntry) -> Result<String, UpstreamError> {
        self.article_calls.lock().unwrap().push(entry.id.clone());
        self.articles
            .lock()
            .unwrap()
            .get(&entry.id)
            .cloned()
            .unwrap_or_else(|| Ok(self.default_article.clone()))
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, UpstreamError> {
        self.image_calls.lock().unwrap().push(prompt.to_string());
        self.image
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(vec![0x89, b'P', b'N', b'G']))
    }
}

// ------------------------------------------------------------
// Scripted transport + recording sleeper
// ------------------------------------------------------------

pub struct ScriptedTransport {
    pub responses: Mutex<VecDeque<Result<RawResponse, UpstreamError>>>,
    pub sent: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<RawResponse, UpstreamError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            sent: Mutex::new(vec![]),
        }
    }

    pub fn sent(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, req: &UpstreamRequest) -> Result<RawResponse, UpstreamError> {
        self.sent.lock().unwrap().push(req.url.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("script ran out of responses")
    }
}

pub fn response(status: u16, headers: &[(&str, &str)], body: &str) -> RawResponse {
    RawResponse {
        status,
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        body: body.as_bytes().to_vec(),
    }
}

pub const RATE_LIMIT_BODY: &str = r#"{"error":{"message":"Rate limit reached for gpt-4o-mini on requests per min (RPM)","type":"requests","code":"rate_limit_exceeded"}}"#;
pub const QUOTA_BODY: &str = r#"{"error":{"message":"You exceeded your current quota, please check your plan and billing details.","type":"insufficient_quota","param":null,"code":"insufficient_quota"}}"#;

#[derive(Default)]
pub struct RecordingSleeper {
    pub slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, d: Duration) {
        self.slept.lock().unwrap().push(d);
    }
}
