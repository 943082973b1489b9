//! Process manager for llama-server, exposed as an [`EngineFactory`].

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::acquire::ArtifactLocation;
use crate::client::LlamaCppClient;
use crate::engine::{CompletionRequest, EngineConfig, EngineFactory, InferenceEngine};
use crate::error::LocalAIError;
use crate::DEFAULT_PORT;

/// Default bound on how long llama-server may take to load the model.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(120);

/// Manager for the llama-server process.
pub struct LlamaCppServer {
    binary: PathBuf,
    port: u16,
    process: Option<Child>,
}

impl LlamaCppServer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            port: DEFAULT_PORT,
            process: None,
        }
    }

    /// Set a custom port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Get the port this server is configured to use.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Check if the server binary exists.
    pub fn binary_exists(&self) -> bool {
        self.binary.exists()
    }

    /// Command-line arguments for loading `location` with `config`.
    fn args(&self, location: &ArtifactLocation, config: &EngineConfig) -> Vec<String> {
        let mut args = match location {
            ArtifactLocation::Local(path) => {
                vec!["--model".to_string(), path.display().to_string()]
            }
            ArtifactLocation::Remote(url) => vec!["--model-url".to_string(), url.clone()],
        };
        args.extend([
            "--host".to_string(),
            "127.0.0.1".to_string(),
            "--port".to_string(),
            self.port.to_string(),
            "--seed".to_string(),
            config.seed.to_string(),
            "--ctx-size".to_string(),
            config.context_size.to_string(),
            "--threads".to_string(),
            config.threads.to_string(),
        ]);
        args
    }

    /// Fail if some other server already answers health checks on our port.
    ///
    /// Our child could not bind the port, and the foreign server would pass
    /// for it in `wait_ready`.
    pub async fn ensure_port_free(&self) -> Result<(), LocalAIError> {
        if self.client().check_health().await.unwrap_or(false) {
            return Err(LocalAIError::EngineInit(format!(
                "port {} is already served by another process",
                self.port
            )));
        }
        Ok(())
    }

    /// Start the llama-server process.
    pub fn start(
        &mut self,
        location: &ArtifactLocation,
        config: &EngineConfig,
    ) -> Result<(), LocalAIError> {
        if !self.binary_exists() {
            return Err(LocalAIError::ServerBinaryNotFound(
                self.binary.display().to_string(),
            ));
        }

        if let ArtifactLocation::Local(path) = location {
            if !path.is_file() {
                return Err(LocalAIError::EngineInit(format!(
                    "model file missing: {}",
                    path.display()
                )));
            }
        }

        info!(
            "Starting llama-server on port {} ({} threads, ctx {})",
            self.port, config.threads, config.context_size
        );

        let child = Command::new(&self.binary)
            .args(self.args(location, config))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| LocalAIError::EngineInit(format!("failed to spawn llama-server: {}", e)))?;

        debug!("llama-server process started with PID: {}", child.id());
        self.process = Some(child);

        Ok(())
    }

    /// Wait for the server to become ready.
    pub async fn wait_ready(&mut self, timeout: Duration) -> Result<(), LocalAIError> {
        let client = self.client();
        let start = std::time::Instant::now();
        let check_interval = Duration::from_millis(500);

        info!("Waiting for llama-server to become ready...");

        while start.elapsed() < timeout {
            if !self.is_running() {
                return Err(LocalAIError::EngineInit(
                    "llama-server exited while loading the model".to_string(),
                ));
            }

            match client.check_health().await {
                Ok(true) => {
                    // A healthy answer only counts if our child still owns the port.
                    if !self.is_running() {
                        return Err(LocalAIError::EngineInit(
                            "llama-server exited while another process answered on its port"
                                .to_string(),
                        ));
                    }
                    info!("llama-server is ready");
                    return Ok(());
                }
                Ok(false) => debug!("llama-server still loading the model"),
                Err(e) => debug!("llama-server not reachable yet: {}", e),
            }
            sleep(check_interval).await;
        }

        Err(LocalAIError::ServerStartTimeout)
    }

    /// Stop the server process.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.process.take() {
            info!("Stopping llama-server (PID: {})", child.id());

            // Try graceful shutdown first
            #[cfg(unix)]
            {
                unsafe {
                    libc::kill(child.id() as i32, libc::SIGTERM);
                }
                std::thread::sleep(Duration::from_millis(500));
            }

            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!("Server exited with status: {:?}", status);
                }
                Ok(None) => {
                    warn!("Server didn't exit gracefully, killing...");
                    let _ = child.kill();
                    let _ = child.wait();
                }
                Err(e) => {
                    warn!("Error checking server status: {}", e);
                    let _ = child.kill();
                }
            }
        }
    }

    /// Check if the server process is running.
    pub fn is_running(&mut self) -> bool {
        if let Some(ref mut child) = self.process {
            match child.try_wait() {
                Ok(Some(_)) => {
                    self.process = None;
                    false
                }
                Ok(None) => true,
                Err(_) => false,
            }
        } else {
            false
        }
    }

    /// Get a client connected to this server.
    pub fn client(&self) -> LlamaCppClient {
        LlamaCppClient::with_port(self.port)
    }
}

impl Drop for LlamaCppServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A running llama-server together with its client.
///
/// Dropping the engine stops the process.
pub struct LlamaServerEngine {
    client: LlamaCppClient,
    _server: LlamaCppServer,
}

#[async_trait]
impl InferenceEngine for LlamaServerEngine {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LocalAIError> {
        self.client.complete(request).await
    }
}

/// Starts one llama-server per engine.
#[derive(Debug, Clone)]
pub struct LlamaServerFactory {
    binary: PathBuf,
    port: u16,
    startup_timeout: Duration,
}

impl LlamaServerFactory {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            port: DEFAULT_PORT,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }
}

#[async_trait]
impl EngineFactory for LlamaServerFactory {
    async fn create(
        &self,
        location: &ArtifactLocation,
        config: &EngineConfig,
    ) -> Result<Arc<dyn InferenceEngine>, LocalAIError> {
        let mut server = LlamaCppServer::new(&self.binary).with_port(self.port);
        server.ensure_port_free().await?;
        server.start(location, config)?;
        // On timeout the server is dropped here, which kills the child.
        server.wait_ready(self.startup_timeout).await?;

        Ok(Arc::new(LlamaServerEngine {
            client: server.client(),
            _server: server,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_server_config() {
        let server = LlamaCppServer::new("/opt/llama-server").with_port(9999);
        assert_eq!(server.port(), 9999);
        assert_eq!(server.client().base_url(), "http://127.0.0.1:9999");
    }

    #[test]
    fn test_args_for_local_model() {
        let server = LlamaCppServer::new("/opt/llama-server").with_port(9000);
        let config = EngineConfig {
            seed: 0,
            context_size: 1024,
            threads: 4,
        };
        let args = server.args(&ArtifactLocation::Local("/m/model.bin".into()), &config);
        assert_eq!(args[..2], ["--model", "/m/model.bin"]);
        let joined = args.join(" ");
        assert!(joined.contains("--seed 0"));
        assert!(joined.contains("--ctx-size 1024"));
        assert!(joined.contains("--threads 4"));
        assert!(joined.contains("--port 9000"));
    }

    #[test]
    fn test_args_for_remote_model() {
        let server = LlamaCppServer::new("/opt/llama-server");
        let args = server.args(
            &ArtifactLocation::Remote("https://example.com/m.bin".into()),
            &EngineConfig::default(),
        );
        assert_eq!(args[..2], ["--model-url", "https://example.com/m.bin"]);
    }

    /// Answer one `/health` request on a random port with 200.
    async fn serve_healthy() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let body = r#"{"status":"ok"}"#;
            let reply = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        port
    }

    #[tokio::test]
    async fn test_occupied_port_is_init_failure() {
        let port = serve_healthy().await;
        let server = LlamaCppServer::new("/opt/llama-server").with_port(port);

        let err = server.ensure_port_free().await.unwrap_err();
        assert!(matches!(err, LocalAIError::EngineInit(_)));
        assert!(err.to_string().contains(&port.to_string()));
    }

    #[tokio::test]
    async fn test_free_port_passes() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let server = LlamaCppServer::new("/opt/llama-server").with_port(port);

        server.ensure_port_free().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_binary_is_init_failure() {
        let factory = LlamaServerFactory::new("/definitely/not/here/llama-server");
        let err = factory
            .create(
                &ArtifactLocation::Local("/m/model.bin".into()),
                &EngineConfig::default(),
            )
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LocalAIError::ServerBinaryNotFound(_)));
        assert_eq!(err.kind(), crate::FailureKind::EngineInit);
    }
}
