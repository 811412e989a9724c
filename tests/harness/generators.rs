// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Request and data generators.

use axum::{
    body::{Body, Bytes},
    http::Request,
};
use contact_relay::{
    config::ValidationConfig,
    validator::{RawAttachment, RawSubmission, Submission, SubmissionValidator},
};
use std::net::{IpAddr, Ipv4Addr};

pub const BOUNDARY: &str = "contact-relay-test-boundary";

/// Generate a pool of distinct client addresses.
pub fn generate_ips(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c))
        })
        .collect()
}

/// A file part of a multipart form.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl FilePart {
    pub fn new(filename: &str, content_type: &str, size: usize) -> Self {
        Self {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            content: vec![b'a'; size],
        }
    }
}

/// Encode text fields and files as a `multipart/form-data` body.
pub fn multipart_body(fields: &[(&str, &str)], files: &[FilePart]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for file in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"attachments\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                file.filename, file.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(&file.content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// `POST /api/contact` from the given client address.
pub fn contact_request(client_ip: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/contact")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("x-forwarded-for", client_ip)
        .body(Body::from(body))
        .unwrap()
}

/// Alice's standard submission.
pub fn alice_request(client_ip: &str, files: &[FilePart]) -> Request<Body> {
    contact_request(
        client_ip,
        multipart_body(
            &[("name", "Alice"), ("email", "a@x.com"), ("message", "Hello")],
            files,
        ),
    )
}

/// A validated submission for driving the formatter and relay directly.
pub fn submission(files: &[FilePart]) -> Submission {
    let raw = RawSubmission {
        name: Some("Alice".to_string()),
        email: Some("a@x.com".to_string()),
        message: Some("Hello".to_string()),
        attachments: files
            .iter()
            .map(|f| {
                RawAttachment::new(
                    f.filename.clone(),
                    Some(f.content_type.clone()),
                    Bytes::from(f.content.clone()),
                )
            })
            .collect(),
    };
    SubmissionValidator::new(ValidationConfig::default())
        .validate(raw)
        .into_result()
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ips() {
        let ips = generate_ips(256);
        assert_eq!(ips.len(), 256);
        // All should be unique
        let unique: std::collections::HashSet<_> = ips.iter().collect();
        assert_eq!(unique.len(), 256);
    }

    #[test]
    fn test_multipart_body_terminated() {
        let body = multipart_body(&[("name", "Alice")], &[FilePart::new("a.txt", "text/plain", 3)]);
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("name=\"attachments\"; filename=\"a.txt\""));
        assert!(text.ends_with(&format!("--{BOUNDARY}--\r\n")));
    }
}
