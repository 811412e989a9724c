// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact Relay
//!
//! Receives contact form submissions over HTTP and relays them as Discord
//! direct messages to a single recipient:
//!
//! - Per-client spacing between accepted submissions (10 minutes default)
//! - Required name/email/message fields
//! - Up to 5 attachments, 8 MiB each, from an allow list of document and
//!   image types
//! - Embed-formatted notification with an attachment summary
//! - Single bounded delivery attempt; failures surface as HTTP 500

pub mod config;
pub mod error;
pub mod formatter;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod relay;
pub mod validator;

pub use config::Config;
pub use error::ContactError;
pub use formatter::{MessageFormatter, NotificationPayload};
pub use handlers::{router, AppState};
pub use limiter::{ClientId, RateLimitResult, RateLimiter};
pub use relay::{DiscordRelay, Relay, RelayError, RelayOutcome};
pub use validator::{Submission, SubmissionValidator, ValidationError, ValidationResult};
