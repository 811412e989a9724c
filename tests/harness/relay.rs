// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Scripted relay that records what it was asked to deliver.

use async_trait::async_trait;
use contact_relay::{
    formatter::NotificationPayload,
    relay::{Relay, RelayError, RelayOutcome},
    validator::Attachment,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// How the fake relay behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Deliver,
    Reject,
    Hang,
    Panic,
    NotReady,
}

pub struct FakeRelay {
    behavior: Behavior,
    calls: AtomicUsize,
    delivered: Mutex<Vec<(NotificationPayload, Vec<String>)>>,
}

impl FakeRelay {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Payloads and attachment filenames that were delivered.
    pub fn delivered(&self) -> Vec<(NotificationPayload, Vec<String>)> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Relay for FakeRelay {
    fn is_ready(&self) -> bool {
        self.behavior != Behavior::NotReady
    }

    async fn deliver(&self, payload: &NotificationPayload, attachments: &[Attachment]) -> RelayOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Deliver => {
                let names = attachments.iter().map(|a| a.filename().to_string()).collect();
                self.delivered.lock().unwrap().push((payload.clone(), names));
                RelayOutcome::Delivered
            }
            Behavior::Reject => {
                RelayOutcome::Failed(RelayError::Rejected("50007: Cannot send messages to this user".to_string()))
            }
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                RelayOutcome::Delivered
            }
            Behavior::Panic => panic!("provider client crashed"),
            Behavior::NotReady => RelayOutcome::Failed(RelayError::Unavailable),
        }
    }
}
