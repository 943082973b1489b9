//! Chat messages and their ids.

use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
}

/// One entry of the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender: Sender,
}

/// Millisecond-timestamp ids, bumped so each one is larger than the last.
#[derive(Debug, Default)]
pub(crate) struct MessageIds {
    last: AtomicI64,
}

impl MessageIds {
    pub(crate) fn next(&self) -> String {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1).to_string()
    }
}
