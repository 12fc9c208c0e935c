// src/upstream/transport.rs
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use super::UpstreamError;

/// One HTTP exchange, decoupled from reqwest so the retry policy can be tested offline.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub url: String,
    /// `Some` → POST with JSON body; `None` → GET.
    pub body: Option<serde_json::Value>,
    /// Send the bearer credential. Off for pre-signed download URLs.
    pub with_auth: bool,
}

impl UpstreamRequest {
    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            url: url.into(),
            body: Some(body),
            with_auth: true,
        }
    }

    pub fn download(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: None,
            with_auth: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    /// Lowercased names; non-UTF-8 values dropped.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Only connection-level failures are errors; any HTTP status is a response.
    async fn send(&self, req: &UpstreamRequest) -> Result<RawResponse, UpstreamError>;
}

pub struct ReqwestTransport {
    http: reqwest::Client,
    api_key: String,
}

impl ReqwestTransport {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("rss-hugo-ai/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, req: &UpstreamRequest) -> Result<RawResponse, UpstreamError> {
        let mut rb = match &req.body {
            Some(body) => self.http.post(&req.url).json(body),
            None => self.http.get(&req.url),
        };
        if req.with_auth {
            rb = rb.bearer_auth(&self.api_key);
        }

        let resp = rb
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                let v = v.to_str().ok()?;
                Some((k.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = resp
            .bytes()
            .await
            .map_err(|e| UpstreamError::Transport(format!("reading body: {e}")))?
            .to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Suspension point for backoff and pacing.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, d: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, d: Duration) {
        tokio::time::sleep(d).await;
    }
}
