//! Model lifecycle: acquire once, initialize once, then serve completions.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, OnceCell};
use tracing::{debug, error, info};

use crate::acquire::Acquirer;
use crate::engine::{CompletionRequest, EngineConfig, EngineFactory, InferenceEngine};
use crate::error::{FailureReason, LocalAIError};
use crate::model::ModelDescriptor;

/// Whether the engine can serve completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessState {
    Loading,
    Ready,
    Failed,
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReadinessState::Loading => "Loading",
            ReadinessState::Ready => "Ready",
            ReadinessState::Failed => "Failed",
        };
        f.write_str(label)
    }
}

/// Owns the single inference handle of a process.
///
/// State only ever moves `Loading -> Ready` or `Loading -> Failed`; there is
/// no retry once failed.
pub struct ModelLifecycleManager {
    descriptor: ModelDescriptor,
    acquirer: Arc<dyn Acquirer>,
    factory: Arc<dyn EngineFactory>,
    engine_config: EngineConfig,
    engine: OnceCell<Arc<dyn InferenceEngine>>,
    state: watch::Sender<ReadinessState>,
    failure: Mutex<Option<FailureReason>>,
    started: AtomicBool,
}

impl ModelLifecycleManager {
    /// Create a manager in the `Loading` state without starting it.
    pub fn new(
        descriptor: ModelDescriptor,
        acquirer: Arc<dyn Acquirer>,
        factory: Arc<dyn EngineFactory>,
        engine_config: EngineConfig,
    ) -> Self {
        let (state, _) = watch::channel(ReadinessState::Loading);
        Self {
            descriptor,
            acquirer,
            factory,
            engine_config,
            engine: OnceCell::new(),
            state,
            failure: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Create a manager and start initializing it in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn launch(
        descriptor: ModelDescriptor,
        acquirer: Arc<dyn Acquirer>,
        factory: Arc<dyn EngineFactory>,
        engine_config: EngineConfig,
    ) -> Arc<Self> {
        let manager = Arc::new(Self::new(descriptor, acquirer, factory, engine_config));
        let background = Arc::clone(&manager);
        tokio::spawn(async move {
            background.initialize().await;
        });
        manager
    }

    /// Acquire the artifact and construct the engine.
    ///
    /// Only the first call does any work; later calls return the current
    /// state without touching the network, disk or engine.
    pub async fn initialize(&self) -> ReadinessState {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Model initialization already started");
            return self.state();
        }

        info!("Initializing model '{}'", self.descriptor.name);

        match self.acquire_and_create().await {
            Ok(engine) => {
                // `started` guarantees this is the only writer.
                let _ = self.engine.set(engine);
                self.state.send_replace(ReadinessState::Ready);
                info!("Model '{}' is ready", self.descriptor.name);
            }
            Err(e) => {
                let reason = FailureReason::from(&e);
                error!(
                    "Failed to initialize model '{}' ({:?}): {}",
                    self.descriptor.name, reason.kind, e
                );
                *self.failure.lock().unwrap_or_else(|p| p.into_inner()) = Some(reason);
                self.state.send_replace(ReadinessState::Failed);
            }
        }

        self.state()
    }

    async fn acquire_and_create(&self) -> Result<Arc<dyn InferenceEngine>, LocalAIError> {
        let location = self.acquirer.ensure_local_artifact(&self.descriptor).await?;
        debug!("Model artifact available at {:?}", location);
        self.factory.create(&location, &self.engine_config).await
    }

    /// Static model metadata, available in every state.
    pub fn describe(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> ReadinessState {
        *self.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ReadinessState::Ready
    }

    /// Watch readiness changes.
    pub fn subscribe(&self) -> watch::Receiver<ReadinessState> {
        self.state.subscribe()
    }

    /// Wait until the state leaves `Loading`.
    pub async fn wait_settled(&self) -> ReadinessState {
        let mut rx = self.subscribe();
        let settled = match rx
            .wait_for(|state| *state != ReadinessState::Loading)
            .await
        {
            Ok(state) => *state,
            // The sender lives in `self`, so this cannot be reached while we
            // hold a reference.
            Err(_) => self.state(),
        };
        settled
    }

    /// Why initialization failed, if it did.
    pub fn failure(&self) -> Option<FailureReason> {
        self.failure
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Run one completion on the initialized engine.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<String, LocalAIError> {
        let engine = self.engine.get().ok_or(LocalAIError::NotReady)?;
        engine.complete(request).await
    }
}
