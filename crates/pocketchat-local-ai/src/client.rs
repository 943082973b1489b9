//! HTTP client for llama-server's native completion API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::engine::{CompletionRequest, InferenceEngine};
use crate::error::LocalAIError;
use crate::DEFAULT_PORT;

/// Client for communicating with llama-server.
pub struct LlamaCppClient {
    client: reqwest::Client,
    base_url: String,
}

/// Body of `POST /completion`.
#[derive(Debug, Serialize)]
struct LlamaCompletionRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f32,
    top_p: f32,
    repeat_penalty: f32,
    stream: bool,
}

impl<'a> From<&'a CompletionRequest> for LlamaCompletionRequest<'a> {
    fn from(request: &'a CompletionRequest) -> Self {
        Self {
            prompt: &request.prompt,
            n_predict: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            repeat_penalty: request.repeat_penalty,
            stream: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LlamaCompletionResponse {
    content: String,
    #[allow(dead_code)]
    #[serde(default)]
    stop: bool,
}

impl LlamaCppClient {
    /// Create a new client with default URL.
    pub fn new() -> Self {
        Self::with_port(DEFAULT_PORT)
    }

    /// Create a new client with a custom URL.
    pub fn with_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Create a new client with a custom port on localhost.
    pub fn with_port(port: u16) -> Self {
        Self::with_url(format!("http://127.0.0.1:{}", port))
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check whether the server has finished loading the model.
    ///
    /// llama-server answers 503 on `/health` while still loading.
    pub async fn check_health(&self) -> Result<bool, LocalAIError> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await?;

        Ok(response.status().is_success())
    }

    /// Send a completion request to the server.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<String, LocalAIError> {
        let url = format!("{}/completion", self.base_url);
        let body = LlamaCompletionRequest::from(request);

        tracing::debug!(
            "POST {} (n_predict={}, temperature={})",
            url,
            body.n_predict,
            body.temperature
        );

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LocalAIError::Completion(format!("{}: {}", status, text)));
        }

        let completion: LlamaCompletionResponse = response
            .json()
            .await
            .map_err(|e| LocalAIError::Completion(format!("malformed response: {}", e)))?;

        Ok(completion.content)
    }
}

impl Default for LlamaCppClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceEngine for LlamaCppClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LocalAIError> {
        LlamaCppClient::complete(self, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Drain one request (headers plus `Content-Length` body).
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            if let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&data[..end]).to_lowercase();
                let length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if data.len() >= end + 4 + length {
                    return;
                }
            }
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            data.extend_from_slice(&buf[..n]);
        }
    }

    async fn serve_json(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let reply = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[test]
    fn test_default_url() {
        let client = LlamaCppClient::new();
        assert_eq!(client.base_url(), "http://127.0.0.1:11436");
    }

    #[test]
    fn test_custom_url() {
        let client = LlamaCppClient::with_url("http://192.168.1.100:8080");
        assert_eq!(client.base_url(), "http://192.168.1.100:8080");
    }

    #[test]
    fn test_request_body() {
        let request = CompletionRequest::new("Hello");
        let body = serde_json::to_value(LlamaCompletionRequest::from(&request)).unwrap();
        assert_eq!(body["prompt"], "Hello");
        assert_eq!(body["n_predict"], 200);
        assert_eq!(body["stream"], false);
        assert!((body["top_p"].as_f64().unwrap() - 0.9).abs() < 1e-6);
        assert!((body["repeat_penalty"].as_f64().unwrap() - 1.1).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_complete_reads_content() {
        let url = serve_json("200 OK", r#"{"content":" Hi there\n","stop":true}"#).await;
        let client = LlamaCppClient::with_url(url);

        let text = client
            .complete(&CompletionRequest::new("Hello"))
            .await
            .unwrap();
        assert_eq!(text, " Hi there\n");
    }

    #[tokio::test]
    async fn test_complete_error_status() {
        let url = serve_json("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let client = LlamaCppClient::with_url(url);

        let err = client
            .complete(&CompletionRequest::new("Hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, LocalAIError::Completion(_)));
    }
}
