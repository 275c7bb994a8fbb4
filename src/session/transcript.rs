//! Transcript pairing and debounced persistence
//!
//! The speech vendor reports the conversation as a growing list of messages.
//! Each user line is forwarded once, together with the first assistant reply
//! that follows it. Assistant lines with no preceding user line are dropped.

use super::event::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// One line of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub role: Role,
    pub text: String,
}

impl TranscriptMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// Tracks which (user, assistant) pairs were already forwarded
#[derive(Debug, Default)]
pub struct TranscriptPairer {
    processed: HashSet<(usize, usize)>,
    forwarded_users: HashSet<usize>,
}

impl TranscriptPairer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the lines from `messages` not yet forwarded, in order.
    ///
    /// `messages` is always the full conversation so far; indices are stable
    /// across calls.
    pub fn collect(&mut self, messages: &[TranscriptMessage]) -> Vec<TranscriptMessage> {
        let mut out = Vec::new();
        let mut last_user: Option<usize> = None;

        for (idx, message) in messages.iter().enumerate() {
            match message.role {
                Role::User => last_user = Some(idx),
                Role::Assistant => {
                    let Some(user_idx) = last_user else {
                        continue;
                    };
                    if !self.processed.insert((user_idx, idx)) {
                        continue;
                    }
                    if self.forwarded_users.insert(user_idx) {
                        out.push(messages[user_idx].clone());
                    }
                    out.push(message.clone());
                }
            }
        }
        out
    }

    pub fn processed_pairs(&self) -> usize {
        self.processed.len()
    }
}

/// Runs only the last of a burst of triggers, after `delay` of quiet
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Schedule `action`, replacing any action still waiting
    pub fn trigger<F>(&mut self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
