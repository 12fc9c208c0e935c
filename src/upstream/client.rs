// src/upstream/client.rs
//
// Dual-track retry: a 429 whose body reports exhausted quota fails at once
// (waiting cannot help); any other 429 backs off for the server-suggested time
// and tries again, up to `max_attempts`.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;

use super::transport::{RawResponse, Sleeper, TokioSleeper, Transport, UpstreamRequest};
use super::UpstreamError;

const QUOTA_CODES: &[&str] = &["insufficient_quota", "billing_hard_limit_reached"];

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_wait: Duration,
    pub max_wait: Duration,
    /// Used when the 429 carries no usable wait hint.
    pub default_wait: Duration,
    /// Wait after a connection-level failure.
    pub transport_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            min_wait: Duration::from_secs(10),
            max_wait: Duration::from_secs(60),
            default_wait: Duration::from_secs(30),
            transport_wait: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn rate_limit_wait(&self, hint: Option<Duration>) -> Duration {
        hint.unwrap_or(self.default_wait)
            .clamp(self.min_wait, self.max_wait)
    }
}

/// Server-suggested wait: `retry-after-ms`, then `retry-after` in (fractional) seconds.
pub fn parse_retry_after(resp: &RawResponse) -> Option<Duration> {
    if let Some(ms) = resp
        .header("retry-after-ms")
        .and_then(|v| v.trim().parse::<f64>().ok())
    {
        if let Ok(d) = Duration::try_from_secs_f64(ms / 1_000.0) {
            return Some(d);
        }
    }
    resp.header("retry-after")
        .and_then(|v| v.trim().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

/// `Some(message)` when a 429 body says the account is out of quota.
pub fn quota_exhaustion_message(body: &str) -> Option<String> {
    #[derive(serde::Deserialize)]
    struct Envelope {
        error: ErrBody,
    }
    #[derive(serde::Deserialize)]
    struct ErrBody {
        code: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
        message: Option<String>,
    }

    if let Ok(env) = serde_json::from_str::<Envelope>(body) {
        let e = env.error;
        let coded = [e.code.as_deref(), e.kind.as_deref()]
            .into_iter()
            .flatten()
            .any(|c| QUOTA_CODES.contains(&c));
        let msg = e.message.unwrap_or_default();
        let lower = msg.to_lowercase();
        if coded || lower.contains("quota") || lower.contains("billing") {
            return Some(if msg.is_empty() {
                "insufficient_quota".to_string()
            } else {
                msg
            });
        }
        return None;
    }

    let lower = body.to_lowercase();
    QUOTA_CODES
        .iter()
        .any(|c| lower.contains(c))
        .then(|| truncate(body, 200))
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Map one response to success or a typed failure.
pub fn classify(resp: &RawResponse, base_url: &str) -> Result<(), UpstreamError> {
    if resp.is_success() {
        return Ok(());
    }
    let body = resp.text();
    match resp.status {
        429 => match quota_exhaustion_message(&body) {
            Some(message) => Err(UpstreamError::QuotaExceeded { message }),
            None => Err(UpstreamError::RateLimited {
                retry_after: parse_retry_after(resp),
            }),
        },
        401 => Err(UpstreamError::Auth {
            status: resp.status,
            base_url: base_url.to_string(),
        }),
        status => Err(UpstreamError::Status {
            status,
            body: truncate(&body, 300),
        }),
    }
}

#[derive(Clone)]
pub struct UpstreamClient {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    base_url: String,
    policy: RetryPolicy,
}

impl UpstreamClient {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            sleeper: Arc::new(TokioSleeper),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `payload` to `{base_url}/{endpoint}`.
    pub async fn call(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
    ) -> Result<RawResponse, UpstreamError> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        self.execute(&UpstreamRequest::post(url, payload.clone())).await
    }

    /// GET an absolute URL without credentials (e.g. a generated image link).
    ///
    /// Single attempt. The link host is not the API, so none of its statuses
    /// are classified as auth, quota or rate limiting: any non-2xx is `Status`.
    pub async fn download(&self, url: &str) -> Result<RawResponse, UpstreamError> {
        counter!("upstream_requests_total").increment(1);
        let resp = self.transport.send(&UpstreamRequest::download(url)).await?;
        if resp.is_success() {
            return Ok(resp);
        }
        tracing::warn!(status = resp.status, url = %url, "download failed");
        Err(UpstreamError::Status {
            status: resp.status,
            body: truncate(&resp.text(), 300),
        })
    }

    async fn execute(&self, req: &UpstreamRequest) -> Result<RawResponse, UpstreamError> {
        let max = self.policy.max_attempts.max(1);
        let mut last_transport: Option<UpstreamError> = None;

        for attempt in 1..=max {
            counter!("upstream_requests_total").increment(1);

            let outcome = match self.transport.send(req).await {
                Ok(resp) => classify(&resp, &self.base_url).map(|()| resp),
                Err(e) => Err(e),
            };

            let wait = match outcome {
                Ok(resp) => return Ok(resp),
                Err(UpstreamError::RateLimited { retry_after }) => {
                    last_transport = None;
                    self.policy.rate_limit_wait(retry_after)
                }
                Err(e @ UpstreamError::Transport(_)) => {
                    tracing::warn!(attempt, max, error = %e, url = %req.url, "request failed");
                    last_transport = Some(e);
                    self.policy.transport_wait
                }
                Err(e) => return Err(e),
            };

            if attempt == max {
                break;
            }
            counter!("upstream_retries_total").increment(1);
            tracing::warn!(
                attempt,
                max,
                wait_secs = wait.as_secs_f64(),
                "upstream not ready; backing off"
            );
            self.sleeper.sleep(wait).await;
        }

        // A connection that never came up is an entry-level failure, not a rate problem.
        match last_transport {
            Some(e) => Err(e),
            None => Err(UpstreamError::RetriesExhausted { attempts: max }),
        }
    }
}
