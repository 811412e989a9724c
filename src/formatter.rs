// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Turns a validated submission into the notification sent to the recipient.
//!
//! The payload serializes directly as a Discord embed object.

use crate::config::NotificationConfig;
use crate::validator::{Attachment, Submission};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Discord rejects embed field values longer than this.
pub const MAX_FIELD_CHARS: usize = 1024;

/// One labelled field of the notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadFooter {
    pub text: String,
}

/// Structured, human-readable notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    pub title: String,
    pub color: u32,
    pub fields: Vec<PayloadField>,
    pub footer: PayloadFooter,
    pub timestamp: DateTime<Utc>,
}

impl NotificationPayload {
    /// Look up a field value by its label.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

pub struct MessageFormatter {
    config: NotificationConfig,
}

impl MessageFormatter {
    pub fn new(config: NotificationConfig) -> Self {
        Self { config }
    }

    /// Format a submission stamped with the current time.
    pub fn format(&self, submission: &Submission) -> NotificationPayload {
        self.format_at(submission, Utc::now())
    }

    /// Format a submission with an explicit timestamp.
    pub fn format_at(&self, submission: &Submission, timestamp: DateTime<Utc>) -> NotificationPayload {
        let mut fields = vec![
            field("Name", submission.name(), true),
            field("Email", submission.email(), true),
            field("Message", submission.message(), false),
        ];

        if !submission.attachments().is_empty() {
            fields.push(field(
                "Attachments",
                &attachment_summary(submission.attachments()),
                false,
            ));
        }

        NotificationPayload {
            title: self.config.title.clone(),
            color: self.config.color,
            fields,
            footer: PayloadFooter {
                text: self.config.footer.clone(),
            },
            timestamp,
        }
    }
}

fn field(name: &str, value: &str, inline: bool) -> PayloadField {
    PayloadField {
        name: name.to_string(),
        value: truncate(value, MAX_FIELD_CHARS),
        inline,
    }
}

/// One line per attachment: `name (12.3 KB)`.
pub fn attachment_summary(attachments: &[Attachment]) -> String {
    attachments
        .iter()
        .map(|a| format!("{} ({:.1} KB)", a.filename(), a.size_bytes() as f64 / 1024.0))
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut out: String = value.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}
