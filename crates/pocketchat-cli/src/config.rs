//! Front-end configuration.

use pocketchat_local_ai::paths::DataPaths;
use pocketchat_local_ai::{
    default_acquirer, Acquirer, LlamaServerFactory, ModelDescriptor, RemoteAcquirer,
    DEFAULT_PORT, DEFAULT_STARTUP_TIMEOUT,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the PocketChat front end.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Data directory holding models and binaries
    pub data_dir: PathBuf,
    /// Model download URL override
    pub model_url: Option<String>,
    /// llama-server binary override
    pub llama_server: Option<PathBuf>,
    /// Port the llama-server listens on
    pub port: u16,
    /// How long the engine may take to load the model
    pub startup_timeout: Duration,
    /// Let llama-server fetch the model itself instead of downloading it first
    pub stream_model: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: DataPaths::platform_default().data_dir().to_path_buf(),
            model_url: None,
            llama_server: None,
            port: DEFAULT_PORT,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            stream_model: false,
        }
    }
}

impl AppConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup (environment-shaped).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let data_dir = lookup("POCKETCHAT_DATA_DIR")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let model_url = lookup("POCKETCHAT_MODEL_URL").filter(|v| !v.is_empty());

        let llama_server = lookup("POCKETCHAT_LLAMA_SERVER")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let port = lookup("POCKETCHAT_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let startup_timeout = lookup("POCKETCHAT_STARTUP_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.startup_timeout);

        let stream_model = lookup("POCKETCHAT_STREAM_MODEL")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(defaults.stream_model);

        Self {
            data_dir,
            model_url,
            llama_server,
            port,
            startup_timeout,
            stream_model,
        }
    }

    pub fn paths(&self) -> DataPaths {
        DataPaths::new(&self.data_dir)
    }

    /// The model this configuration points at.
    pub fn descriptor(&self) -> ModelDescriptor {
        let descriptor = ModelDescriptor::default_for(&self.paths());
        match &self.model_url {
            Some(url) => descriptor.with_source_url(url.clone()),
            None => descriptor,
        }
    }

    pub fn llama_server_path(&self) -> PathBuf {
        self.llama_server
            .clone()
            .unwrap_or_else(|| self.paths().llama_server_path())
    }

    /// Whether starting a chat has to download the model first.
    pub fn needs_download(&self) -> bool {
        !self.stream_model && !self.descriptor().is_installed()
    }

    /// How the model reaches the engine.
    pub fn acquirer(&self, show_progress: bool) -> Arc<dyn Acquirer> {
        if self.stream_model {
            Arc::new(RemoteAcquirer)
        } else {
            default_acquirer(show_progress)
        }
    }

    pub fn engine_factory(&self) -> LlamaServerFactory {
        LlamaServerFactory::new(self.llama_server_path())
            .with_port(self.port)
            .with_startup_timeout(self.startup_timeout)
    }
}

/// Builder for front-end configuration.
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    pub fn from_config(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    pub fn model_url(mut self, url: impl Into<String>) -> Self {
        self.config.model_url = Some(url.into());
        self
    }

    pub fn llama_server(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.llama_server = Some(path.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn stream_model(mut self, stream: bool) -> Self {
        self.config.stream_model = stream;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}
