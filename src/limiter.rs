// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Per-client submission spacing.
//!
//! Each client may have one submission accepted per window. The limiter keeps
//! the time of the last accepted submission per client; a rejected attempt
//! leaves that time untouched, so retrying early never extends the wait.

use crate::config::RateLimitConfig;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Opaque key identifying the origin of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Submission admitted; the client's window restarts now
    Admitted,
    /// Submission rejected
    Rejected {
        /// Time until the client's window elapses
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_admitted(&self) -> bool {
        matches!(self, RateLimitResult::Admitted)
    }

    /// Remaining wait rounded up to whole seconds; zero when admitted.
    pub fn retry_after_secs(&self) -> u64 {
        match self {
            RateLimitResult::Admitted => 0,
            RateLimitResult::Rejected { retry_after } => ceil_secs(*retry_after),
        }
    }
}

/// Round a duration up to whole seconds.
pub fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

/// Round a duration up to whole minutes.
pub fn ceil_minutes(d: Duration) -> u64 {
    ceil_secs(d).div_ceil(60)
}

/// Thread-safe last-accepted-time limiter.
pub struct RateLimiter {
    window: Duration,
    /// Last accepted submission per client. A single lock covers the
    /// whole map so check-and-record is atomic.
    last_accepted: Mutex<HashMap<ClientId, Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_window(config.window_duration())
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            last_accepted: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check a client at the current instant.
    pub async fn check(&self, client: &ClientId) -> RateLimitResult {
        self.check_and_record(client, Instant::now()).await
    }

    /// Admit the client if its window has elapsed at `now`, recording `now`
    /// as its last accepted time; otherwise report the remaining wait.
    pub async fn check_and_record(&self, client: &ClientId, now: Instant) -> RateLimitResult {
        if self.window.is_zero() {
            return RateLimitResult::Admitted;
        }

        let mut last_accepted = self.last_accepted.lock().await;

        if let Some(last) = last_accepted.get(client) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < self.window {
                let retry_after = self.window - elapsed;
                debug!(client = %client, ?retry_after, "Client inside rate window");
                return RateLimitResult::Rejected { retry_after };
            }
        }

        last_accepted.insert(client.clone(), now);
        RateLimitResult::Admitted
    }

    /// Drop clients whose window has fully elapsed at `now`. Such entries
    /// would admit anyway, so removing them changes no decision.
    /// Returns the number of entries removed.
    pub async fn sweep(&self, now: Instant) -> usize {
        let mut last_accepted = self.last_accepted.lock().await;
        let before = last_accepted.len();
        last_accepted.retain(|_, last| now.saturating_duration_since(*last) < self.window);
        let removed = before - last_accepted.len();
        if removed > 0 {
            debug!(removed, remaining = last_accepted.len(), "Swept expired rate limit entries");
        }
        removed
    }

    /// Number of clients currently tracked.
    pub async fn len(&self) -> usize {
        self.last_accepted.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
