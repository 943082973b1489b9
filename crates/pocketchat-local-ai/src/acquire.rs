//! Making the model artifact available to the engine.

use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::LocalAIError;
use crate::model::ModelDescriptor;

/// Where the engine should load the model from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    /// A file on the local filesystem.
    Local(PathBuf),
    /// A URL the engine streams from itself.
    Remote(String),
}

/// Strategy for making the artifact available before engine construction.
#[async_trait]
pub trait Acquirer: Send + Sync {
    async fn ensure_local_artifact(
        &self,
        descriptor: &ModelDescriptor,
    ) -> Result<ArtifactLocation, LocalAIError>;
}

/// Pick the acquisition strategy for the current target.
pub fn default_acquirer(show_progress: bool) -> Arc<dyn Acquirer> {
    if cfg!(target_family = "wasm") {
        Arc::new(RemoteAcquirer)
    } else {
        Arc::new(DownloadAcquirer::new().with_progress(show_progress))
    }
}

/// Downloads the artifact to `local_path` unless it is already there.
pub struct DownloadAcquirer {
    client: reqwest::Client,
    show_progress: bool,
}

impl DownloadAcquirer {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            show_progress: false,
        }
    }

    /// Draw a progress bar on stderr while downloading.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn progress_bar(&self, total_size: Option<u64>) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        match total_size {
            Some(size) => {
                let pb = ProgressBar::new(size);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} [{elapsed_precise}] {bytes} downloaded")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb
            }
        }
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, LocalAIError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(LocalAIError::DownloadFailed(format!(
                "HTTP {}: {}",
                response.status(),
                url
            )));
        }

        let pb = self.progress_bar(response.content_length());

        let mut file = File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }
        file.flush().await?;
        file.sync_all().await?;

        pb.finish_with_message("Download complete");
        Ok(downloaded)
    }
}

impl Default for DownloadAcquirer {
    fn default() -> Self {
        Self::new()
    }
}

/// `model.bin` -> `model.bin.part`
fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

#[async_trait]
impl Acquirer for DownloadAcquirer {
    async fn ensure_local_artifact(
        &self,
        descriptor: &ModelDescriptor,
    ) -> Result<ArtifactLocation, LocalAIError> {
        let dest = &descriptor.local_path;

        if fs::metadata(dest).await.map(|m| m.is_file()).unwrap_or(false) {
            debug!("Model '{}' already present at {:?}", descriptor.name, dest);
            return Ok(ArtifactLocation::Local(dest.clone()));
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        info!(
            "Downloading model '{}' from {} to {:?}",
            descriptor.name, descriptor.source_url, dest
        );

        let part = partial_path(dest);
        match self.download(&descriptor.source_url, &part).await {
            Ok(bytes) => {
                fs::rename(&part, dest).await?;
                info!("Model '{}' downloaded ({} bytes)", descriptor.name, bytes);
                Ok(ArtifactLocation::Local(dest.clone()))
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&part).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!("Could not remove partial download {:?}: {}", part, cleanup);
                    }
                }
                Err(e)
            }
        }
    }
}

/// Hands the source URL straight to the engine; nothing touches the disk.
pub struct RemoteAcquirer;

#[async_trait]
impl Acquirer for RemoteAcquirer {
    async fn ensure_local_artifact(
        &self,
        descriptor: &ModelDescriptor,
    ) -> Result<ArtifactLocation, LocalAIError> {
        debug!("Engine will stream '{}' from {}", descriptor.name, descriptor.source_url);
        Ok(ArtifactLocation::Remote(descriptor.source_url.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Serve exactly one HTTP response on a random local port.
    async fn serve_once(status: &'static str, body: &'static [u8]) -> String {
        serve_with_length(status, body.len(), body).await
    }

    /// Like `serve_once`, but announce `length` bytes whatever the body holds.
    async fn serve_with_length(
        status: &'static str,
        length: usize,
        body: &'static [u8],
    ) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

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
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status, length
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}/model.bin", addr)
    }

    fn descriptor(dir: &Path, url: &str) -> ModelDescriptor {
        ModelDescriptor::new("test", "5B", url, dir.join("models").join("model.bin"))
    }

    #[tokio::test]
    async fn test_present_artifact_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        // Nothing listens on the discard port, so any request would fail.
        let model = descriptor(dir.path(), "http://127.0.0.1:9/model.bin");
        std::fs::create_dir_all(model.local_path.parent().unwrap()).unwrap();
        std::fs::write(&model.local_path, b"weights").unwrap();

        let location = DownloadAcquirer::new()
            .ensure_local_artifact(&model)
            .await
            .unwrap();

        assert_eq!(location, ArtifactLocation::Local(model.local_path.clone()));
    }

    #[tokio::test]
    async fn test_missing_artifact_is_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let url = serve_once("200 OK", b"hello").await;
        let model = descriptor(dir.path(), &url);

        let location = DownloadAcquirer::new()
            .ensure_local_artifact(&model)
            .await
            .unwrap();

        assert_eq!(location, ArtifactLocation::Local(model.local_path.clone()));
        assert_eq!(std::fs::read(&model.local_path).unwrap(), b"hello");
        assert!(!partial_path(&model.local_path).exists());
    }

    #[tokio::test]
    async fn test_http_error_leaves_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let url = serve_once("404 Not Found", b"").await;
        let model = descriptor(dir.path(), &url);

        let err = DownloadAcquirer::new()
            .ensure_local_artifact(&model)
            .await
            .unwrap_err();

        assert!(matches!(err, LocalAIError::DownloadFailed(_)));
        assert!(!model.local_path.exists());
        assert!(!partial_path(&model.local_path).exists());
    }

    #[tokio::test]
    async fn test_truncated_download_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let url = serve_with_length("200 OK", 1000, b"hello").await;
        let model = descriptor(dir.path(), &url);

        let result = DownloadAcquirer::new().ensure_local_artifact(&model).await;

        assert!(result.is_err());
        assert!(!model.local_path.exists());
        assert!(!partial_path(&model.local_path).exists());
    }

    #[tokio::test]
    async fn test_remote_acquirer_passes_url() {
        let model = ModelDescriptor::new("m", "1B", "https://example.com/m.bin", "/nowhere/m.bin");
        let location = RemoteAcquirer.ensure_local_artifact(&model).await.unwrap();
        assert_eq!(
            location,
            ArtifactLocation::Remote("https://example.com/m.bin".to_string())
        );
    }

    #[tokio::test]
    async fn test_default_acquirer_uses_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let model = descriptor(dir.path(), "http://127.0.0.1:9/model.bin");
        std::fs::create_dir_all(model.local_path.parent().unwrap()).unwrap();
        std::fs::write(&model.local_path, b"weights").unwrap();

        let location = default_acquirer(false)
            .ensure_local_artifact(&model)
            .await
            .unwrap();

        assert_eq!(location, ArtifactLocation::Local(model.local_path.clone()));
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/a/model.bin")),
            PathBuf::from("/a/model.bin.part")
        );
    }
}
