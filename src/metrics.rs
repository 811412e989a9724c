// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for the contact relay.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Terminal outcome of a contact request, used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    RateLimited,
    Invalid,
    RelayFailed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Delivered => "delivered",
            Outcome::RateLimited => "rate_limited",
            Outcome::Invalid => "invalid",
            Outcome::RelayFailed => "relay_failed",
        }
    }
}

pub struct Metrics {
    registry: Registry,
    submissions: IntCounterVec,
    relay_seconds: Histogram,
    tracked_clients: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let submissions = IntCounterVec::new(
            Opts::new("contact_submissions_total", "Contact submissions by outcome"),
            &["outcome"],
        )?;
        let relay_seconds = Histogram::with_opts(HistogramOpts::new(
            "contact_relay_duration_seconds",
            "Time spent delivering a notification to the provider",
        ))?;
        let tracked_clients = IntGauge::new(
            "contact_rate_limit_clients",
            "Clients currently held by the rate limiter",
        )?;

        registry.register(Box::new(submissions.clone()))?;
        registry.register(Box::new(relay_seconds.clone()))?;
        registry.register(Box::new(tracked_clients.clone()))?;

        Ok(Self {
            registry,
            submissions,
            relay_seconds,
            tracked_clients,
        })
    }

    pub fn record(&self, outcome: Outcome) {
        self.submissions.with_label_values(&[outcome.as_str()]).inc();
    }

    pub fn observe_relay(&self, seconds: f64) {
        self.relay_seconds.observe(seconds);
    }

    pub fn set_tracked_clients(&self, count: usize) {
        self.tracked_clients.set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    pub fn count(&self, outcome: Outcome) -> u64 {
        self.submissions.with_label_values(&[outcome.as_str()]).get()
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
