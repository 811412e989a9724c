// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for the contact relay.
//!
//! Builds isolated application instances with a scripted relay and sends
//! multipart requests through the router without binding a socket.

#![allow(dead_code)]

pub mod generators;
pub mod relay;

use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use contact_relay::{
    config::{Config, RelayConfig},
    handlers::{router, AppState},
    Relay,
};
use std::sync::Arc;
use tower::ServiceExt;

/// Configuration for tests: given window, short relay timeout.
pub fn test_config(window_secs: u64) -> Config {
    let mut relay = RelayConfig::new("test-token", "42");
    relay.timeout_ms = 200;
    let mut config = Config::new(relay);
    config.rate_limit.window_secs = window_secs;
    config
}

/// Fresh application state around the given relay.
pub fn test_state(config: Config, relay: Arc<dyn Relay>) -> Arc<AppState> {
    Arc::new(AppState::new(config, relay).unwrap())
}

pub fn test_app(window_secs: u64, relay: Arc<dyn Relay>) -> (Router, Arc<AppState>) {
    let state = test_state(test_config(window_secs), relay);
    (router(state.clone()), state)
}

/// Response pieces a test cares about.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: serde_json::Value,
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    TestResponse {
        status,
        headers,
        json,
    }
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}
