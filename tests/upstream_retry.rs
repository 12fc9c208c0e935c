// tests/upstream_retry.rs
mod common;

use common::{response, RecordingSleeper, ScriptedTransport, QUOTA_BODY, RATE_LIMIT_BODY};
use rss_hugo_ai::upstream::{RetryPolicy, UpstreamClient, UpstreamError};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn client(
    script: Vec<Result<rss_hugo_ai::upstream::RawResponse, UpstreamError>>,
) -> (UpstreamClient, Arc<ScriptedTransport>, Arc<RecordingSleeper>) {
    let transport = Arc::new(ScriptedTransport::new(script));
    let sleeper = Arc::new(RecordingSleeper::default());
    let client = UpstreamClient::new(transport.clone(), "https://api.test/v1/")
        .with_sleeper(sleeper.clone());
    (client, transport, sleeper)
}

#[tokio::test]
async fn rate_limited_twice_then_ok() {
    let (c, t, s) = client(vec![
        Ok(response(429, &[("retry-after", "12")], RATE_LIMIT_BODY)),
        Ok(response(429, &[], RATE_LIMIT_BODY)),
        Ok(response(200, &[], r#"{"ok":true}"#)),
    ]);
    let resp = c.call("chat/completions", &json!({})).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(t.sent(), 3);
    assert_eq!(
        s.slept(),
        vec![Duration::from_secs(12), Duration::from_secs(30)]
    );
    assert_eq!(
        t.sent.lock().unwrap()[0],
        "https://api.test/v1/chat/completions"
    );
}

#[tokio::test]
async fn quota_exhausted_fails_without_waiting() {
    let (c, t, s) = client(vec![Ok(response(429, &[("retry-after", "20")], QUOTA_BODY))]);
    let err = c.call("chat/completions", &json!({})).await.unwrap_err();
    assert!(matches!(err, UpstreamError::QuotaExceeded { .. }), "{err:?}");
    assert!(err.is_fatal());
    assert_eq!(t.sent(), 1);
    assert!(s.slept().is_empty());
}

#[tokio::test]
async fn persistent_rate_limit_exhausts_attempts() {
    let script = (0..5)
        .map(|_| Ok(response(429, &[("retry-after", "1")], RATE_LIMIT_BODY)))
        .collect();
    let (c, t, s) = client(script);
    let err = c.call("chat/completions", &json!({})).await.unwrap_err();
    assert!(matches!(err, UpstreamError::RetriesExhausted { attempts: 5 }));
    assert!(err.is_fatal());
    assert_eq!(t.sent(), 5);
    // Sleeps only between attempts, each clamped up to the floor.
    assert_eq!(s.slept(), vec![Duration::from_secs(10); 4]);
}

#[tokio::test]
async fn max_attempts_is_configurable() {
    let script = (0..2)
        .map(|_| Ok(response(429, &[], RATE_LIMIT_BODY)))
        .collect();
    let (c, t, _s) = client(script);
    let c = c.with_policy(RetryPolicy::default().with_max_attempts(2));
    let err = c.call("x", &json!({})).await.unwrap_err();
    assert!(matches!(err, UpstreamError::RetriesExhausted { attempts: 2 }));
    assert_eq!(t.sent(), 2);
}

#[tokio::test]
async fn unauthorized_is_fatal_and_not_retried() {
    let (c, t, s) = client(vec![Ok(response(401, &[], r#"{"error":{"message":"bad key"}}"#))]);
    let err = c.call("chat/completions", &json!({})).await.unwrap_err();
    match err {
        UpstreamError::Auth { status, base_url } => {
            assert_eq!(status, 401);
            assert_eq!(base_url, "https://api.test/v1");
        }
        other => panic!("expected auth error, got {other:?}"),
    }
    assert_eq!(t.sent(), 1);
    assert!(s.slept().is_empty());
}

#[tokio::test]
async fn server_error_is_returned_without_retry() {
    let (c, t, _s) = client(vec![Ok(response(500, &[], "boom"))]);
    let err = c.call("chat/completions", &json!({})).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Status { status: 500, .. }));
    assert!(!err.is_fatal());
    assert_eq!(t.sent(), 1);
}

#[tokio::test]
async fn transport_failure_is_retried_then_surfaced() {
    let script = (0..5)
        .map(|_| Err(UpstreamError::Transport("connection refused".into())))
        .collect();
    let (c, t, s) = client(script);
    let err = c.call("chat/completions", &json!({})).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Transport(_)));
    assert!(!err.is_fatal());
    assert_eq!(t.sent(), 5);
    assert_eq!(s.slept(), vec![Duration::from_secs(2); 4]);
}

#[tokio::test]
async fn transport_blip_recovers() {
    let (c, _t, s) = client(vec![
        Err(UpstreamError::Transport("reset".into())),
        Ok(response(200, &[], "{}")),
    ]);
    assert!(c.call("x", &json!({})).await.is_ok());
    assert_eq!(s.slept().len(), 1);
}

#[tokio::test]
async fn download_statuses_are_never_fatal() {
    for status in [401u16, 403, 429] {
        let (c, t, s) = client(vec![Ok(response(status, &[], QUOTA_BODY))]);
        let err = c
            .download("https://cdn.test/img/expired.png")
            .await
            .unwrap_err();
        assert!(
            matches!(err, UpstreamError::Status { status: got, .. } if got == status),
            "{status}: {err:?}"
        );
        assert!(!err.is_fatal());
        assert_eq!(t.sent(), 1);
        assert!(s.slept().is_empty());
    }
}

#[tokio::test]
async fn download_returns_body_on_success() {
    let (c, _t, _s) = client(vec![Ok(response(200, &[], "PNG"))]);
    let resp = c.download("https://cdn.test/img/ok.png").await.unwrap();
    assert_eq!(resp.body, b"PNG".to_vec());
}
