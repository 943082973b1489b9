//! Local model lifecycle for PocketChat.
//!
//! This crate downloads the model artifact on first use, starts a
//! llama.cpp-backed inference engine on it, and exposes a single completion
//! call through [`ModelLifecycleManager`].
//!
//! ```text
//! ┌────────────┐     ┌───────────────┐     ┌──────────────────┐
//! │  Acquirer  │ --> │ EngineFactory │ --> │ InferenceEngine  │
//! │ (download) │     │ (llama-server)│     │  (completion)    │
//! └────────────┘     └───────────────┘     └──────────────────┘
//! ```

mod acquire;
mod client;
mod engine;
mod error;
mod lifecycle;
mod model;
pub mod paths;
mod server;

pub use acquire::{default_acquirer, Acquirer, ArtifactLocation, DownloadAcquirer, RemoteAcquirer};
pub use client::LlamaCppClient;
pub use engine::{
    CompletionRequest, EngineConfig, EngineFactory, InferenceEngine, FALLBACK_THREADS,
};
pub use error::{FailureKind, FailureReason, LocalAIError};
pub use lifecycle::{ModelLifecycleManager, ReadinessState};
pub use model::ModelDescriptor;
pub use server::{LlamaCppServer, LlamaServerEngine, LlamaServerFactory, DEFAULT_STARTUP_TIMEOUT};

/// Default port for the local llama-server instance.
pub const DEFAULT_PORT: u16 = 11436;

/// Default model display name.
pub const DEFAULT_MODEL_NAME: &str = "RWKV-4-Raven-1B5";

/// Default model size label.
pub const DEFAULT_MODEL_SIZE: &str = "1.5GB";

/// Default model download URL.
pub const DEFAULT_MODEL_URL: &str = "https://huggingface.co/TheBloke/RWKV-4-Raven-1B5-v12-Eng-20230521-ctx4096-GGML/resolve/main/RWKV-4-Raven-1B5-v12-Eng-20230521-ctx4096-GGML-Q4_0.bin";
