// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Contact form submission validator.
//!
//! Checks, in order:
//! - name, email and message are present and non-blank
//! - attachment count
//! - attachment size
//! - attachment MIME type against the allow list

use crate::config::ValidationConfig;
use axum::body::Bytes;
use thiserror::Error;
use tracing::debug;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Too many attachments: {count} (maximum {max})")]
    TooManyAttachments { count: usize, max: usize },

    #[error("Attachment {filename} is too large: {size} bytes (maximum {max})")]
    AttachmentTooLarge {
        filename: String,
        size: usize,
        max: usize,
    },

    #[error("Attachment {filename} has an unsupported type: {mime_type}")]
    UnsupportedAttachmentType { filename: String, mime_type: String },
}

/// A file part as received, before any checks.
///
/// `size` counts every byte received for the part. It can exceed
/// `content.len()` when the form reader stopped keeping the content.
#[derive(Debug, Clone)]
pub struct RawAttachment {
    pub filename: String,
    pub content_type: Option<String>,
    pub content: Bytes,
    pub size: usize,
}

impl RawAttachment {
    pub fn new(filename: impl Into<String>, content_type: Option<String>, content: Bytes) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            size: content.len(),
            content,
        }
    }
}

/// Form fields as received, before any checks.
#[derive(Debug, Clone, Default)]
pub struct RawSubmission {
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
    pub attachments: Vec<RawAttachment>,
}

/// A checked attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    filename: String,
    mime_type: String,
    content: Bytes,
}

impl Attachment {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> usize {
        self.content.len()
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }
}

/// A checked contact form submission. Only [`SubmissionValidator`] builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    name: String,
    email: String,
    message: String,
    attachments: Vec<Attachment>,
}

impl Submission {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Attachments in the order they were received.
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }
}

/// Result of validation.
#[derive(Debug, Clone)]
pub enum ValidationResult {
    /// Submission is valid
    Valid(Submission),
    /// Submission is invalid
    Invalid(ValidationError),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid(_))
    }

    pub fn error(&self) -> Option<&ValidationError> {
        match self {
            ValidationResult::Valid(_) => None,
            ValidationResult::Invalid(e) => Some(e),
        }
    }

    pub fn into_result(self) -> Result<Submission, ValidationError> {
        match self {
            ValidationResult::Valid(s) => Ok(s),
            ValidationResult::Invalid(e) => Err(e),
        }
    }
}

/// Contact form validator.
pub struct SubmissionValidator {
    config: ValidationConfig,
}

impl SubmissionValidator {
    /// Create a new validator with the given configuration.
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a complete submission.
    pub fn validate(&self, raw: RawSubmission) -> ValidationResult {
        let RawSubmission {
            name,
            email,
            message,
            attachments,
        } = raw;

        let name = match required(name, "name") {
            Ok(v) => v,
            Err(e) => return ValidationResult::Invalid(e),
        };
        let email = match required(email, "email") {
            Ok(v) => v,
            Err(e) => return ValidationResult::Invalid(e),
        };
        let message = match required(message, "message") {
            Ok(v) => v,
            Err(e) => return ValidationResult::Invalid(e),
        };

        if attachments.len() > self.config.max_attachments {
            debug!(count = attachments.len(), "Too many attachments");
            return ValidationResult::Invalid(ValidationError::TooManyAttachments {
                count: attachments.len(),
                max: self.config.max_attachments,
            });
        }

        let mut checked = Vec::with_capacity(attachments.len());
        for raw in attachments {
            match self.validate_attachment(raw) {
                Ok(a) => checked.push(a),
                Err(e) => return ValidationResult::Invalid(e),
            }
        }

        debug!(attachments = checked.len(), "Submission valid");
        ValidationResult::Valid(Submission {
            name,
            email,
            message,
            attachments: checked,
        })
    }

    /// Validate a single attachment's size and MIME type.
    pub fn validate_attachment(&self, raw: RawAttachment) -> Result<Attachment, ValidationError> {
        let size = raw.size;
        if size > self.config.max_attachment_bytes {
            debug!(filename = %raw.filename, size, "Attachment too large");
            return Err(ValidationError::AttachmentTooLarge {
                filename: raw.filename,
                size,
                max: self.config.max_attachment_bytes,
            });
        }

        let mime_type = normalize_mime(raw.content_type.as_deref());
        if !self.is_allowed_mime(&mime_type) {
            debug!(filename = %raw.filename, mime_type = %mime_type, "Attachment type rejected");
            return Err(ValidationError::UnsupportedAttachmentType {
                filename: raw.filename,
                mime_type,
            });
        }

        Ok(Attachment {
            filename: raw.filename,
            mime_type,
            content: raw.content,
        })
    }

    fn is_allowed_mime(&self, mime_type: &str) -> bool {
        self.config
            .allowed_mime_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(mime_type))
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => {
            debug!(field, "Missing field");
            Err(ValidationError::MissingField(field))
        }
    }
}

/// Extract the bare media type, ignoring parameters such as charset.
fn normalize_mime(content_type: Option<&str>) -> String {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}
