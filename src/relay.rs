// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Delivery of notifications to the fixed recipient.
//!
//! [`DiscordRelay`] talks to the Discord REST API with a bot token:
//!
//! 1. `connect` checks the token against `GET /users/@me` and marks the
//!    relay ready. Until then every delivery fails fast.
//! 2. The first delivery opens a DM channel with the recipient
//!    (`POST /users/@me/channels`); the channel id is cached.
//! 3. Each delivery posts one message with the embed and any files
//!    (`POST /channels/{id}/messages`).
//!
//! A delivery is attempted exactly once; failures are reported, not retried.

use crate::config::RelayConfig;
use crate::formatter::NotificationPayload;
use crate::validator::Attachment;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};
use url::Url;

/// Why a delivery did not happen.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The provider connection is not established yet
    #[error("Relay connection is not ready")]
    Unavailable,

    /// The provider call failed or was refused
    #[error("Relay provider rejected the message: {0}")]
    Rejected(String),
}

/// Result of a delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered,
    Failed(RelayError),
}

impl RelayOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, RelayOutcome::Delivered)
    }

    pub fn error(&self) -> Option<&RelayError> {
        match self {
            RelayOutcome::Delivered => None,
            RelayOutcome::Failed(e) => Some(e),
        }
    }
}

impl From<Result<(), RelayError>> for RelayOutcome {
    fn from(result: Result<(), RelayError>) -> Self {
        match result {
            Ok(()) => RelayOutcome::Delivered,
            Err(e) => RelayOutcome::Failed(e),
        }
    }
}

/// A destination for contact notifications.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Whether the provider connection is established.
    fn is_ready(&self) -> bool;

    /// Send one notification with its attachments.
    async fn deliver(&self, payload: &NotificationPayload, attachments: &[Attachment]) -> RelayOutcome;
}

/// Errors while establishing the provider connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Bot token rejected by provider ({0})")]
    Unauthorized(StatusCode),

    #[error("Provider returned {0}")]
    Provider(StatusCode),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid API base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ConnectError {
    /// Errors that another attempt cannot fix.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ConnectError::Unauthorized(_) | ConnectError::InvalidUrl(_))
    }
}

/// The bot account behind the token.
#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
struct DmChannel {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    message: String,
    #[serde(default)]
    code: u64,
}

/// Discord direct-message relay.
pub struct DiscordRelay {
    client: reqwest::Client,
    api_base: Url,
    token: String,
    recipient_id: String,
    ready: AtomicBool,
    dm_channel: OnceCell<String>,
}

impl DiscordRelay {
    /// Build the HTTP client. No network traffic happens until [`connect`](Self::connect).
    pub fn new(config: &RelayConfig) -> Result<Self, ConnectError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("contact-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_base: parse_api_base(&config.api_base)?,
            token: config.bot_token.clone(),
            recipient_id: config.recipient_id.clone(),
            ready: AtomicBool::new(false),
            dm_channel: OnceCell::new(),
        })
    }

    /// Verify the token and mark the relay ready.
    pub async fn connect(&self) -> Result<BotUser, ConnectError> {
        let url = self.api_base.join("users/@me")?;
        let response = self.authorized(self.client.get(url)).send().await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ConnectError::Unauthorized(status));
        }
        if !status.is_success() {
            return Err(ConnectError::Provider(status));
        }

        let user: BotUser = response.json().await?;
        self.ready.store(true, Ordering::Release);
        info!(bot_id = %user.id, bot = %user.username, "Discord bot connected");
        Ok(user)
    }

    /// Keep trying to connect until it succeeds or a permanent error occurs.
    /// A zero interval makes a single attempt.
    pub async fn connect_with_retry(&self, interval: Duration) -> Result<BotUser, ConnectError> {
        loop {
            match self.connect().await {
                Ok(user) => return Ok(user),
                Err(e) if e.is_permanent() || interval.is_zero() => {
                    error!(error = %e, "Discord connection failed, relay stays unavailable");
                    return Err(e);
                }
                Err(e) => {
                    warn!(error = %e, retry_in = ?interval, "Discord connection failed, retrying");
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
    }

    fn endpoint(&self, path: &str) -> Result<Url, RelayError> {
        self.api_base
            .join(path)
            .map_err(|e| RelayError::Rejected(format!("invalid endpoint {path}: {e}")))
    }

    /// DM channel with the recipient, opened on first use.
    async fn dm_channel(&self) -> Result<&str, RelayError> {
        let id = self
            .dm_channel
            .get_or_try_init(|| async {
                let url = self.endpoint("users/@me/channels")?;
                let response = self
                    .authorized(self.client.post(url))
                    .json(&serde_json::json!({ "recipient_id": self.recipient_id }))
                    .send()
                    .await
                    .map_err(transport_error)?;

                if !response.status().is_success() {
                    return Err(rejection(response).await);
                }

                let channel: DmChannel = response.json().await.map_err(transport_error)?;
                debug!(channel_id = %channel.id, "Opened DM channel with recipient");
                Ok::<_, RelayError>(channel.id)
            })
            .await?;
        Ok(id.as_str())
    }

    async fn send(&self, payload: &NotificationPayload, attachments: &[Attachment]) -> Result<(), RelayError> {
        let channel_id = self.dm_channel().await?;
        let url = self.endpoint(&format!("channels/{channel_id}/messages"))?;
        let request = self.authorized(self.client.post(url));

        let request = if attachments.is_empty() {
            request.json(&serde_json::json!({ "embeds": [payload] }))
        } else {
            request.multipart(message_form(payload, attachments)?)
        };

        let response = request.send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(())
    }
}

#[async_trait]
impl Relay for DiscordRelay {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn deliver(&self, payload: &NotificationPayload, attachments: &[Attachment]) -> RelayOutcome {
        if !self.is_ready() {
            return RelayOutcome::Failed(RelayError::Unavailable);
        }
        self.send(payload, attachments).await.into()
    }
}

/// Multipart body: the JSON message in `payload_json`, files as `files[n]`.
fn message_form(payload: &NotificationPayload, attachments: &[Attachment]) -> Result<Form, RelayError> {
    let descriptors: Vec<_> = attachments
        .iter()
        .enumerate()
        .map(|(i, a)| serde_json::json!({ "id": i, "filename": a.filename() }))
        .collect();
    let payload_json = serde_json::json!({ "embeds": [payload], "attachments": descriptors });

    let mut form = Form::new().part(
        "payload_json",
        Part::text(payload_json.to_string())
            .mime_str("application/json")
            .map_err(transport_error)?,
    );

    for (i, attachment) in attachments.iter().enumerate() {
        // Bytes clones share the buffer
        let part = Part::stream_with_length(attachment.content().clone(), attachment.size_bytes() as u64)
            .file_name(attachment.filename().to_string())
            .mime_str(attachment.mime_type())
            .map_err(transport_error)?;
        form = form.part(format!("files[{i}]"), part);
    }

    Ok(form)
}

/// `Url::join` drops the last path segment unless the base ends with `/`.
fn parse_api_base(raw: &str) -> Result<Url, url::ParseError> {
    let mut base = Url::parse(raw)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

fn transport_error(e: reqwest::Error) -> RelayError {
    if e.is_timeout() {
        RelayError::Rejected("request timed out".to_string())
    } else {
        RelayError::Rejected(format!("transport error: {e}"))
    }
}

async fn rejection(response: reqwest::Response) -> RelayError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<ProviderError>(&body) {
        Ok(err) => format!("{} (code {})", err.message, err.code),
        Err(_) => body,
    };
    RelayError::Rejected(format!("{status}: {detail}"))
}
