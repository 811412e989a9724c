// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Abuse tests for the contact relay.
//!
//! These simulate floods of submissions and check that the per-client
//! spacing holds under concurrency and that limiter state stays bounded.

mod harness;

use axum::http::StatusCode;
use contact_relay::{
    config::RelayConfig,
    handlers::router,
    limiter::{ClientId, RateLimitResult, RateLimiter},
    Config,
};
use harness::{
    generators::{self, alice_request},
    relay::{Behavior, FakeRelay},
    send, test_app, test_state,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_burst_admits_exactly_one() {
    let limiter = Arc::new(RateLimiter::with_window(Duration::from_secs(600)));
    let client = ClientId::new("203.0.113.50");
    let now = Instant::now();

    let handles: Vec<_> = (0..64)
        .map(|_| {
            let limiter = limiter.clone();
            let client = client.clone();
            tokio::spawn(async move { limiter.check_and_record(&client, now).await })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap().is_admitted() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_http_flood_relays_once() {
    let relay = Arc::new(FakeRelay::new(Behavior::Deliver));
    let (app, _) = test_app(600, relay.clone());

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { send(&app, alice_request("203.0.113.51", &[])).await.status })
        })
        .collect();

    let mut ok = 0;
    let mut limited = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::TOO_MANY_REQUESTS => limited += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(limited, 19);
    assert_eq!(relay.calls(), 1);
}

#[tokio::test]
async fn test_admitted_submissions_are_a_window_apart() {
    let window = Duration::from_secs(60);
    let limiter = RateLimiter::with_window(window);
    let client = ClientId::new("203.0.113.52");
    let start = Instant::now();

    // Attempts every 7 seconds for ten minutes
    let mut last_admitted: Option<Instant> = None;
    for step in 0..86u64 {
        let now = start + Duration::from_secs(step * 7);
        match limiter.check_and_record(&client, now).await {
            RateLimitResult::Admitted => {
                if let Some(previous) = last_admitted {
                    assert!(now - previous >= window);
                }
                last_admitted = Some(now);
            }
            RateLimitResult::Rejected { retry_after } => {
                assert!(retry_after > Duration::ZERO);
                assert!(retry_after <= window);
                let previous = last_admitted.expect("rejection before any admission");
                assert_eq!(previous + window, now + retry_after);
            }
        }
    }
}

#[tokio::test]
async fn test_distributed_clients_each_admitted_once() {
    let limiter = RateLimiter::with_window(Duration::from_secs(600));
    let ips = generators::generate_ips(500);
    let now = Instant::now();

    let mut admitted = 0;
    let mut rejected = 0;
    for round in 0..2 {
        for ip in &ips {
            let result = limiter
                .check_and_record(&ClientId::new(ip.to_string()), now + Duration::from_secs(round))
                .await;
            if result.is_admitted() {
                admitted += 1;
            } else {
                rejected += 1;
            }
        }
    }

    assert_eq!(admitted, 500);
    assert_eq!(rejected, 500);
}

#[tokio::test]
async fn test_tracked_clients_bounded_by_sweep() {
    let window = Duration::from_secs(600);
    let limiter = RateLimiter::with_window(window);
    let start = Instant::now();

    for ip in generators::generate_ips(1000) {
        limiter.check_and_record(&ClientId::new(ip.to_string()), start).await;
    }
    assert_eq!(limiter.len().await, 1000);

    // Nothing expires before the window ends
    assert_eq!(limiter.sweep(start + window - Duration::from_secs(1)).await, 0);
    assert_eq!(limiter.sweep(start + window).await, 1000);
    assert!(limiter.is_empty().await);
}

#[tokio::test]
async fn test_spoofed_forwarded_for_ignored_when_untrusted() {
    let relay = Arc::new(FakeRelay::new(Behavior::Deliver));
    let mut config: Config = harness::test_config(600);
    config.trust_forwarded_for = false;
    let app = router(test_state(config, relay.clone()));

    // Same peer (no socket info here), rotating X-Forwarded-For values
    let first = send(&app, alice_request("198.18.0.1", &[])).await;
    let second = send(&app, alice_request("198.18.0.2", &[])).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(relay.calls(), 1);
}

#[tokio::test]
async fn test_rejected_validation_still_consumes_window() {
    let relay = Arc::new(FakeRelay::new(Behavior::Deliver));
    let (app, _) = test_app(600, relay.clone());

    let invalid = harness::generators::contact_request(
        "203.0.113.53",
        harness::generators::multipart_body(&[("name", "Alice")], &[]),
    );
    assert_eq!(send(&app, invalid).await.status, StatusCode::BAD_REQUEST);

    let retry = send(&app, alice_request("203.0.113.53", &[])).await;
    assert_eq!(retry.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(relay.calls(), 0);
}

#[test]
fn test_relay_config_defaults_bound_delivery() {
    let relay = RelayConfig::new("t", "1");
    assert!(relay.timeout() > Duration::ZERO);
    assert!(relay.timeout() <= Duration::from_secs(30));
}
