//! Inference engine boundary.
//!
//! The lifecycle only talks to the model through these two traits, so any
//! text-completion backend can stand in for llama.cpp.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::acquire::ArtifactLocation;
use crate::error::LocalAIError;

/// Thread count used when the platform cannot report its parallelism.
pub const FALLBACK_THREADS: usize = 4;

/// Settings the engine is constructed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// RNG seed; fixed so generations are reproducible.
    pub seed: u32,
    /// Context window in tokens.
    pub context_size: u32,
    pub threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            context_size: 1024,
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(FALLBACK_THREADS),
        }
    }
}

/// A single prompt-in/text-out request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub repeat_penalty: f32,
}

impl CompletionRequest {
    /// Request with the chat sampling defaults.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: 200,
            temperature: 0.7,
            top_p: 0.9,
            repeat_penalty: 1.1,
        }
    }
}

/// An initialized model that can serve completions.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LocalAIError>;
}

/// Builds an engine bound to an acquired artifact.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create(
        &self,
        location: &ArtifactLocation,
        config: &EngineConfig,
    ) -> Result<Arc<dyn InferenceEngine>, LocalAIError>;
}
