use adsbridge::AdsError;
use adsbridge::service::{BackoffPolicy, with_backoff};
use axum::http::StatusCode;
use std::sync::atomic::{AtomicU32, Ordering};

fn upstream(status: u16) -> AdsError {
    AdsError::UpstreamStatus {
        status: StatusCode::from_u16(status).unwrap(),
        body: "scripted".to_string(),
    }
}

#[tokio::test]
async fn succeeds_on_fourth_call_after_three_rate_limits() {
    let calls = &AtomicU32::new(0);

    let outcome = with_backoff(BackoffPolicy::immediate(3), "test", || async move {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= 3 { Err(upstream(429)) } else { Ok(n) }
    })
    .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.result.unwrap(), 4);
    assert_eq!(outcome.retries, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn always_failing_operation_stops_after_max_retries() {
    let calls = &AtomicU32::new(0);

    let outcome = with_backoff(BackoffPolicy::immediate(3), "test", || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>(upstream(503))
    })
    .await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.retries, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 4, "never a fifth call");
}

#[tokio::test]
async fn permanent_error_is_not_retried() {
    let calls = &AtomicU32::new(0);

    let outcome = with_backoff(BackoffPolicy::immediate(3), "test", || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>(upstream(400))
    })
    .await;

    assert!(matches!(
        outcome.result,
        Err(AdsError::UpstreamStatus { status, .. }) if status == StatusCode::BAD_REQUEST
    ));
    assert_eq!(outcome.retries, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn first_try_success_reports_zero_retries() {
    let outcome = with_backoff(BackoffPolicy::immediate(3), "test", || async move {
        Ok::<_, AdsError>("done")
    })
    .await;

    assert_eq!(outcome.retries, 0);
    assert_eq!(outcome.result.unwrap(), "done");
}
