//! Snapshot handed to the presentation layer.

use pocketchat_local_ai::{FailureReason, ModelDescriptor, ReadinessState};
use serde::Serialize;

use crate::message::ChatMessage;

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    /// Input should be enabled.
    pub ready: bool,
    /// Show a progress indicator and disable sending.
    pub busy: bool,
    pub status: ReadinessState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    pub model: ModelDescriptor,
    pub transcript: Vec<ChatMessage>,
}
