mod common;

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use serde_json::json;
use spotetl::{
    error::Error,
    spotify::{
        gate::{GateLimits, RequestGate},
        transport::HttpReply,
    },
};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

use common::{FakeTransport, HangingTransport, TOKEN, gate, limits};

const URL: &str = "http://api.test/v1/me";

fn ok() -> HttpReply {
    HttpReply::ok(json!({ "id": "me" }).to_string())
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_header_is_honored() {
    let transport = Arc::new(FakeTransport::new().script(
        URL,
        vec![HttpReply::too_many_requests(Some(2)), ok()],
    ));
    let gate = gate(transport.clone(), 5);

    let started = Instant::now();
    let body = gate.request(URL, TOKEN).await.unwrap();

    assert_eq!(body["id"], "me");
    assert_eq!(transport.count(URL), 2);
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_missing_retry_after_defaults_to_one_second_and_doubles() {
    let transport = Arc::new(FakeTransport::new().script(
        URL,
        vec![
            HttpReply::too_many_requests(None),
            HttpReply::too_many_requests(None),
            ok(),
        ],
    ));
    let gate = gate(transport.clone(), 5);

    let started = Instant::now();
    gate.request(URL, TOKEN).await.unwrap();

    // 1s for the first retry, 2s for the second
    assert_eq!(transport.count(URL), 3);
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_retry_ceiling_fails_with_rate_limited() {
    let transport = Arc::new(
        FakeTransport::new().script(URL, vec![HttpReply::too_many_requests(Some(1))]),
    );
    let gate = gate(transport.clone(), 5);

    let err = gate.request(URL, TOKEN).await.unwrap_err();

    match err {
        Error::RateLimited { url, attempts } => {
            assert_eq!(url, URL);
            assert_eq!(attempts, 6);
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }
    // One initial request plus five retries
    assert_eq!(transport.count(URL), 6);
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_fails_on_first_429() {
    let transport = Arc::new(
        FakeTransport::new().script(URL, vec![HttpReply::too_many_requests(Some(1))]),
    );
    let limits = GateLimits {
        max_retries: 0,
        ..limits()
    };
    let gate = RequestGate::new(transport.clone(), 5, limits, CancellationToken::new());

    let err = gate.request(URL, TOKEN).await.unwrap_err();
    assert!(matches!(err, Error::RateLimited { attempts: 1, .. }));
    assert_eq!(transport.count(URL), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abnormal_retry_after_gives_up_without_waiting() {
    let transport = Arc::new(FakeTransport::new().script(
        URL,
        vec![HttpReply::too_many_requests(Some(3600)), ok()],
    ));
    let gate = gate(transport.clone(), 5);

    let started = Instant::now();
    let err = gate.request(URL, TOKEN).await.unwrap_err();

    assert!(matches!(err, Error::RateLimited { .. }));
    assert_eq!(transport.count(URL), 1);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_other_status_is_not_retried() {
    let transport = Arc::new(FakeTransport::new().fail(URL, 500));
    let gate = gate(transport.clone(), 5);

    let err = gate.request(URL, TOKEN).await.unwrap_err();

    assert!(matches!(err, Error::Status { status: 500, .. }));
    assert_eq!(err.url(), Some(URL));
    assert_eq!(transport.count(URL), 1);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_body() {
    let transport = Arc::new(FakeTransport::new().script(URL, vec![HttpReply::ok("<html>")]));
    let gate = gate(transport, 5);

    let err = gate.request(URL, TOKEN).await.unwrap_err();
    assert!(matches!(err, Error::Malformed { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_never_exceeds_bound() {
    let transport = Arc::new(
        FakeTransport::new()
            .with_latency(Duration::from_millis(50))
            .with_handler(|_| HttpReply::ok("{}")),
    );
    let gate = gate(transport.clone(), 5);

    let urls: Vec<String> = (0..20).map(|i| format!("http://api.test/v1/r/{}", i)).collect();
    let results = join_all(urls.iter().map(|url| gate.request(url, TOKEN))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(transport.requests().len(), 20);
    assert_eq!(transport.max_in_flight(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_bound_of_one_serializes_requests() {
    let transport = Arc::new(
        FakeTransport::new()
            .with_latency(Duration::from_millis(50))
            .with_handler(|_| HttpReply::ok("{}")),
    );
    let gate = gate(transport.clone(), 1);

    let started = Instant::now();
    let urls: Vec<String> = (0..3).map(|i| format!("http://api.test/v1/r/{}", i)).collect();
    join_all(urls.iter().map(|url| gate.request(url, TOKEN))).await;

    assert_eq!(transport.max_in_flight(), 1);
    // latency plus the 100ms pacing delay, held inside the slot
    assert!(started.elapsed() >= Duration::from_millis(450));
}

#[tokio::test(start_paused = true)]
async fn test_backoff_releases_the_slot() {
    let limited = "http://api.test/v1/limited";
    let transport = Arc::new(
        FakeTransport::new()
            .script(limited, vec![HttpReply::too_many_requests(Some(10)), ok()])
            .with_handler(|_| ok()),
    );
    let gate = gate(transport.clone(), 1);

    let started = Instant::now();
    let (first, second) = tokio::join!(gate.request(limited, TOKEN), async {
        sleep(Duration::from_millis(500)).await;
        let result = gate.request(URL, TOKEN).await;
        (result, started.elapsed())
    });

    assert!(first.is_ok());
    let (second, finished_at) = second;
    assert!(second.is_ok());
    // The other request ran while the first was backing off
    assert!(finished_at < Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_in_flight_request() {
    let cancel = CancellationToken::new();
    let gate = RequestGate::new(Arc::new(HangingTransport), 5, limits(), cancel.clone());

    let (result, _) = tokio::join!(gate.request(URL, TOKEN), async {
        sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });

    assert!(result.unwrap_err().is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_backoff() {
    let transport = Arc::new(
        FakeTransport::new().script(URL, vec![HttpReply::too_many_requests(Some(60)), ok()]),
    );
    let cancel = CancellationToken::new();
    let gate = RequestGate::new(transport.clone(), 5, limits(), cancel.clone());

    let started = Instant::now();
    let (result, _) = tokio::join!(gate.request(URL, TOKEN), async {
        sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(transport.count(URL), 1);
    assert!(started.elapsed() < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_request_timeout() {
    let limits = GateLimits {
        request_timeout: Duration::from_secs(5),
        ..limits()
    };
    let gate = RequestGate::new(Arc::new(HangingTransport), 5, limits, CancellationToken::new());

    let started = Instant::now();
    let err = gate.request(URL, TOKEN).await.unwrap_err();

    assert!(matches!(err, Error::Timeout { .. }));
    assert!(started.elapsed() >= Duration::from_secs(5));
}
