//! # PocketChat session
//!
//! A [`ChatSession`] sits between the presentation layer and the
//! [`ModelLifecycleManager`]: it takes one prompt at a time, appends the
//! user's message right away, and appends the model's reply (or a fixed
//! apology) when the completion finishes.
//!
//! ## Usage
//!
//! ```ignore
//! use pocketchat_session::ChatSession;
//!
//! let session = ChatSession::new(lifecycle);
//! session.submit("Hello").await;
//! for message in session.transcript() {
//!     println!("{:?}: {}", message.sender, message.text);
//! }
//! ```

mod message;
mod session;
mod view;

pub use message::{ChatMessage, Sender};
pub use session::{ChatSession, IgnoreReason, SubmitOutcome, FALLBACK_REPLY};
pub use view::SessionView;

// Re-export lifecycle types for convenience
pub use pocketchat_local_ai::{
    FailureKind, FailureReason, ModelDescriptor, ModelLifecycleManager, ReadinessState,
};
