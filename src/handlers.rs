// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the contact relay service.
//!
//! `POST /api/contact` runs each submission through rate limiting,
//! validation, formatting and delivery, in that order, and answers with a
//! JSON body carrying `success` and either `message` or `error`.

use crate::config::{Config, ValidationConfig};
use crate::error::ContactError;
use crate::formatter::MessageFormatter;
use crate::limiter::{ClientId, RateLimitResult, RateLimiter};
use crate::metrics::{Metrics, Outcome};
use crate::relay::{Relay, RelayError, RelayOutcome};
use crate::validator::{RawAttachment, RawSubmission, SubmissionValidator, ValidationResult};
use axum::{
    body::Bytes,
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        ConnectInfo, DefaultBodyLimit, Multipart, State,
    },
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared application state.
pub struct AppState {
    pub limiter: RateLimiter,
    pub validator: SubmissionValidator,
    pub formatter: MessageFormatter,
    pub relay: Arc<dyn Relay>,
    pub metrics: Metrics,
    pub config: Config,
}

impl AppState {
    /// Wire up every component from one configuration.
    pub fn new(config: Config, relay: Arc<dyn Relay>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            limiter: RateLimiter::new(config.rate_limit.clone()),
            validator: SubmissionValidator::new(config.validation.clone()),
            formatter: MessageFormatter::new(config.notification.clone()),
            relay,
            metrics: Metrics::new()?,
            config,
        })
    }
}

/// Success response body.
#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub success: bool,
    pub message: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(rename = "botReady")]
    pub bot_ready: bool,
    pub service: &'static str,
    pub version: &'static str,
}

/// Largest accepted text part.
const MAX_TEXT_BYTES: usize = 1024 * 1024;

/// Build the service router.
///
/// The contact form enforces its own size limits while reading, so the
/// default body limit is off.
pub fn router(state: Arc<AppState>) -> Router {
    let counted = state.clone();
    let contact_route = post(contact).layer(CatchPanicLayer::custom(
        move |panic: Box<dyn Any + Send + 'static>| {
            counted.metrics.record(Outcome::RelayFailed);
            panic_response(panic)
        },
    ));

    let mut app = Router::new()
        .route("/api/contact", contact_route)
        .route("/api/health", get(health))
        .route("/healthz", get(health));

    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(render_metrics));
    }

    app.layer(DefaultBodyLimit::disable())
        .layer(cors_layer(&state.config.allowed_origins))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(AnyOrigin);
    }

    let list: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    layer.allow_origin(AllowOrigin::list(list))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    ContactError::Internal(detail).into_response()
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        bot_ready: state.relay.is_ready(),
        service: "contact-relay",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Prometheus scrape endpoint.
pub async fn render_metrics(State(state): State<Arc<AppState>>) -> Response {
    state.metrics.set_tracked_clients(state.limiter.len().await);
    match state.metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Accept a contact form submission and relay it to the recipient.
pub async fn contact(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    form: Result<Multipart, MultipartRejection>,
) -> Result<Json<ContactResponse>, ContactError> {
    let client = client_id(
        &headers,
        connect_info.map(|ConnectInfo(addr)| addr),
        state.config.trust_forwarded_for,
    );
    debug!(client = %client, "Contact submission received");

    let result = process(&state, &client, form).await;
    let outcome = match &result {
        Ok(_) => Outcome::Delivered,
        Err(ContactError::RateLimited { .. }) => Outcome::RateLimited,
        Err(ContactError::Validation(_) | ContactError::MalformedForm(_)) => Outcome::Invalid,
        Err(ContactError::Relay(_) | ContactError::Internal(_)) => Outcome::RelayFailed,
    };
    state.metrics.record(outcome);
    result
}

async fn process(
    state: &AppState,
    client: &ClientId,
    form: Result<Multipart, MultipartRejection>,
) -> Result<Json<ContactResponse>, ContactError> {
    if let RateLimitResult::Rejected { retry_after } = state.limiter.check(client).await {
        info!(client = %client, retry_after_secs = retry_after.as_secs(), "Submission rate limited");
        return Err(ContactError::RateLimited { retry_after });
    }

    let form = form.map_err(|e| ContactError::MalformedForm(e.body_text()))?;
    let raw = read_form(form, &state.config.validation).await?;

    let submission = match state.validator.validate(raw) {
        ValidationResult::Valid(s) => s,
        ValidationResult::Invalid(err) => {
            info!(client = %client, error = %err, "Submission rejected");
            return Err(err.into());
        }
    };

    let payload = state.formatter.format(&submission);
    debug!(
        client = %client,
        attachments = submission.attachments().len(),
        "Relaying notification"
    );

    let timeout = state.config.relay.timeout();
    let started = Instant::now();
    let outcome = tokio::time::timeout(
        timeout,
        state.relay.deliver(&payload, submission.attachments()),
    )
    .await
    .unwrap_or_else(|_| {
        RelayOutcome::Failed(RelayError::Rejected(format!(
            "no response within {}ms",
            timeout.as_millis()
        )))
    });
    state.metrics.observe_relay(started.elapsed().as_secs_f64());

    match outcome {
        RelayOutcome::Delivered => {
            info!(client = %client, "Notification delivered");
            Ok(Json(ContactResponse {
                success: true,
                message: "Message sent successfully".to_string(),
            }))
        }
        RelayOutcome::Failed(err) => Err(err.into()),
    }
}

/// Collect the form parts. Unknown parts are skipped.
///
/// File content is kept only while a part stays within the attachment
/// limits. The first part that breaks a limit ends the read and the
/// validator judges what was collected up to that point.
async fn read_form(mut form: Multipart, limits: &ValidationConfig) -> Result<RawSubmission, ContactError> {
    let mut raw = RawSubmission::default();
    let mut budget = limits.body_limit();

    while let Some(mut field) = form.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("name") => raw.name = Some(read_text(&mut field, &mut budget).await?),
            Some("email") => raw.email = Some(read_text(&mut field, &mut budget).await?),
            Some("message") => raw.message = Some(read_text(&mut field, &mut budget).await?),
            Some("attachments") => {
                let mut attachment = RawAttachment::new(
                    field.file_name().unwrap_or("attachment"),
                    field.content_type().map(str::to_owned),
                    Bytes::new(),
                );
                let within_limits = raw.attachments.len() < limits.max_attachments
                    && read_file(&mut field, &mut attachment, limits.max_attachment_bytes, &mut budget).await?;
                raw.attachments.push(attachment);

                if !within_limits {
                    debug!(attachments = raw.attachments.len(), "Attachment limit exceeded, form read stopped");
                    break;
                }
            }
            other => {
                debug!(field = ?other, "Ignoring unknown form field");
                while let Some(chunk) = field.chunk().await.map_err(malformed)? {
                    spend(&mut budget, chunk.len())?;
                }
            }
        }
    }

    Ok(raw)
}

async fn read_text(field: &mut Field<'_>, budget: &mut usize) -> Result<String, ContactError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(malformed)? {
        spend(budget, chunk.len())?;
        if buf.len() + chunk.len() > MAX_TEXT_BYTES {
            return Err(ContactError::MalformedForm("text field too large".to_string()));
        }
        buf.extend_from_slice(&chunk);
    }
    String::from_utf8(buf).map_err(|_| ContactError::MalformedForm("text field is not UTF-8".to_string()))
}

/// Read a file part into `attachment`. Returns `false` as soon as the part
/// grows past `max_bytes`; only the size received so far is kept then.
async fn read_file(
    field: &mut Field<'_>,
    attachment: &mut RawAttachment,
    max_bytes: usize,
    budget: &mut usize,
) -> Result<bool, ContactError> {
    let mut content = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(malformed)? {
        attachment.size = attachment.size.saturating_add(chunk.len());
        if attachment.size > max_bytes {
            return Ok(false);
        }
        spend(budget, chunk.len())?;
        content.extend_from_slice(&chunk);
    }
    attachment.content = Bytes::from(content);
    Ok(true)
}

fn spend(budget: &mut usize, bytes: usize) -> Result<(), ContactError> {
    *budget = budget
        .checked_sub(bytes)
        .ok_or_else(|| ContactError::MalformedForm("form data too large".to_string()))?;
    Ok(())
}

fn malformed(e: MultipartError) -> ContactError {
    ContactError::MalformedForm(e.body_text())
}

/// Derive the rate limit key: first `X-Forwarded-For` hop when trusted,
/// otherwise the peer address.
pub fn client_id(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> ClientId {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ClientId::new(ip);
        }
    }

    match peer {
        Some(addr) => ClientId::new(addr.ip().to_string()),
        None => ClientId::new("unknown"),
    }
}
