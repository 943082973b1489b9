//! Chat session: one transcript, one in-flight request at a time.

use pocketchat_local_ai::{
    CompletionRequest, FailureKind, ModelDescriptor, ModelLifecycleManager,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::message::{ChatMessage, MessageIds, Sender};
use crate::view::SessionView;

/// Reply shown in place of a failed completion.
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error while processing your request.";

/// Why a submission was dropped without touching the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Prompt was empty after trimming.
    Empty,
    /// The model is not ready.
    NotReady,
    /// Another request is in flight.
    Busy,
}

/// What `submit` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    Ignored(IgnoreReason),
    /// The model replied.
    Replied,
    /// The model failed and the fallback reply was appended.
    Recovered(FailureKind),
}

/// Clears the busy flag when dropped, whichever way `submit` ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Serializes prompts against the model and keeps the transcript.
pub struct ChatSession {
    lifecycle: Arc<ModelLifecycleManager>,
    transcript: Mutex<Vec<ChatMessage>>,
    input: Mutex<String>,
    busy: AtomicBool,
    ids: MessageIds,
}

impl ChatSession {
    pub fn new(lifecycle: Arc<ModelLifecycleManager>) -> Self {
        Self {
            lifecycle,
            transcript: Mutex::new(Vec::new()),
            input: Mutex::new(String::new()),
            busy: AtomicBool::new(false),
            ids: MessageIds::default(),
        }
    }

    /// Send a prompt and append the exchange to the transcript.
    ///
    /// Never fails: a rejected prompt leaves everything untouched, and a
    /// failed completion is replaced with [`FALLBACK_REPLY`].
    pub async fn submit(&self, prompt: &str) -> SubmitOutcome {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return SubmitOutcome::Ignored(IgnoreReason::Empty);
        }
        if !self.lifecycle.is_ready() {
            debug!("Ignoring prompt, model is {}", self.lifecycle.state());
            return SubmitOutcome::Ignored(IgnoreReason::NotReady);
        }
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            debug!("Ignoring prompt, a request is already in flight");
            return SubmitOutcome::Ignored(IgnoreReason::Busy);
        };

        self.append(Sender::User, prompt.to_string());
        lock(&self.input).clear();

        info!("Sending prompt ({} chars)", prompt.len());
        let request = CompletionRequest::new(prompt);

        match self.lifecycle.complete(&request).await {
            Ok(reply) => {
                let reply = reply.trim();
                debug!("Received reply ({} chars)", reply.len());
                self.append(Sender::Agent, reply.to_string());
                SubmitOutcome::Replied
            }
            Err(e) => {
                warn!("Error generating response ({:?}): {}", e.kind(), e);
                self.append(Sender::Agent, FALLBACK_REPLY.to_string());
                SubmitOutcome::Recovered(e.kind())
            }
        }
    }

    /// Submit whatever is in the input buffer.
    pub async fn submit_input(&self) -> SubmitOutcome {
        let text = self.input();
        self.submit(&text).await
    }

    fn append(&self, sender: Sender, text: String) {
        let message = ChatMessage {
            id: self.ids.next(),
            text,
            sender,
        };
        lock(&self.transcript).push(message);
    }

    pub fn set_input(&self, text: impl Into<String>) {
        *lock(&self.input) = text.into();
    }

    pub fn input(&self) -> String {
        lock(&self.input).clone()
    }

    /// Snapshot of the transcript in display order.
    pub fn transcript(&self) -> Vec<ChatMessage> {
        lock(&self.transcript).clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn is_ready(&self) -> bool {
        self.lifecycle.is_ready()
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        self.lifecycle.describe()
    }

    pub fn lifecycle(&self) -> &Arc<ModelLifecycleManager> {
        &self.lifecycle
    }

    /// Everything the presentation layer renders, in one snapshot.
    pub fn view(&self) -> SessionView {
        SessionView {
            ready: self.is_ready(),
            busy: self.is_busy(),
            status: self.lifecycle.state(),
            failure: self.lifecycle.failure(),
            model: self.descriptor().clone(),
            transcript: self.transcript(),
        }
    }
}
