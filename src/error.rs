// SPDX-License-Identifier: Apache-2.0
//! Error types for the contact endpoint

use crate::limiter::ceil_minutes;
use crate::relay::RelayError;
use crate::validator::ValidationError;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

/// Message shown for every server-side failure; details stay in the logs.
pub const GENERIC_FAILURE: &str = "Failed to send the message";

/// Everything that can end a contact request without success.
#[derive(Debug, Error)]
pub enum ContactError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Malformed form data: {0}")]
    MalformedForm(String),

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl ContactError {
    pub fn status(&self) -> StatusCode {
        match self {
            ContactError::Validation(_) | ContactError::MalformedForm(_) => StatusCode::BAD_REQUEST,
            ContactError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ContactError::Relay(_) | ContactError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Server-side faults that an operator should look at.
    pub fn is_fault(&self) -> bool {
        self.status().is_server_error()
    }

    /// Text shown to the caller.
    pub fn public_message(&self) -> String {
        match self {
            ContactError::Validation(ValidationError::MissingField(_)) => {
                "All fields are required".to_string()
            }
            ContactError::Validation(ValidationError::TooManyAttachments { max, .. }) => {
                format!("Too many attachments (maximum {max})")
            }
            ContactError::Validation(ValidationError::AttachmentTooLarge { filename, max, .. }) => {
                format!("File {filename} exceeds the {} MB limit", max / (1024 * 1024))
            }
            ContactError::Validation(ValidationError::UnsupportedAttachmentType { filename, .. }) => {
                format!("File type not allowed: {filename}")
            }
            ContactError::MalformedForm(_) => "Invalid form data".to_string(),
            ContactError::RateLimited { retry_after } => {
                format!("Please wait {} before sending a new message", describe_wait(*retry_after))
            }
            ContactError::Relay(_) | ContactError::Internal(_) => GENERIC_FAILURE.to_string(),
        }
    }
}

/// Whole minutes when at least a minute remains, whole seconds otherwise.
pub fn describe_wait(d: Duration) -> String {
    if d >= Duration::from_secs(60) {
        format!("{} minute(s)", ceil_minutes(d))
    } else {
        format!("{} second(s)", crate::limiter::ceil_secs(d).max(1))
    }
}

impl IntoResponse for ContactError {
    fn into_response(self) -> Response {
        if self.is_fault() {
            error!(error = %self, "Contact request failed");
        }

        let status = self.status();
        let retry_after_secs = match &self {
            ContactError::RateLimited { retry_after } => Some(crate::limiter::ceil_secs(*retry_after)),
            _ => None,
        };
        let body = Json(ErrorBody {
            success: false,
            error: self.public_message(),
            retry_after_secs,
        });

        match retry_after_secs {
            Some(secs) => (status, [(header::RETRY_AFTER, secs.to_string())], body).into_response(),
            None => (status, body).into_response(),
        }
    }
}
