//! Reqwest-backed ApiClient.
//!
//! # Configuration
//!
//! ```ignore
//! let config = ReqwestApiConfig::new("https://heedy.example.com/")
//!     .with_token(token)
//!     .with_timeout(Duration::from_secs(10));
//!
//! let client = ReqwestApiClient::new(config)?;
//! ```

use async_trait::async_trait;
use reqwest::{Client, Method};
use secrecy::{ExposeSecret, Secret};
use serde_json::{json, Value as JsonValue};
use std::time::Duration;

use crate::domain::foundation::DomainError;
use crate::ports::{ApiClient, ApiResponse, HttpMethod};

/// Configuration for the backend API client.
#[derive(Debug, Clone)]
pub struct ReqwestApiConfig {
    /// Base URL that request paths are joined onto.
    pub base_url: String,
    /// Bearer token, if the backend requires one.
    token: Option<Secret<String>>,
    pub timeout: Duration,
}

impl ReqwestApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_token(mut self, token: Secret<String>) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Joins `path` onto the base URL with exactly one `/` between them.
    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Backend API client over `reqwest`.
pub struct ReqwestApiClient {
    config: ReqwestApiConfig,
    client: Client,
}

impl ReqwestApiClient {
    pub fn new(config: ReqwestApiConfig) -> Result<Self, DomainError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DomainError::fetch(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

#[async_trait]
impl ApiClient for ReqwestApiClient {
    async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<ApiResponse, DomainError> {
        let url = self.config.url_for(path);
        tracing::debug!(%method, %url, "API request");

        let mut request = self.client.request(Self::method(method), &url);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!(
                    "Request timed out after {}s",
                    self.config.timeout.as_secs()
                )
            } else if e.is_connect() {
                format!("Connection failed: {}", e)
            } else {
                e.to_string()
            };
            DomainError::fetch(message).with_detail("url", url.clone())
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DomainError::fetch(format!("Failed to read response body: {}", e)))?;

        let data = if text.trim().is_empty() {
            JsonValue::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(_) if !status.is_success() => json!({ "error_description": text }),
                Err(e) => {
                    return Err(DomainError::fetch(format!("Response is not JSON: {}", e))
                        .with_detail("url", url))
                }
            }
        };

        Ok(ApiResponse {
            ok: status.is_success(),
            status: status.as_u16(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response and returns the raw request it saw.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });
        (base, handle)
    }

    #[test]
    fn url_join_normalizes_slashes() {
        let config = ReqwestApiConfig::new("http://localhost:1324/");
        assert_eq!(
            config.url_for("/api/timeseries/dataset"),
            "http://localhost:1324/api/timeseries/dataset"
        );
        let config = ReqwestApiConfig::new("http://localhost:1324");
        assert_eq!(config.url_for("api/events"), "http://localhost:1324/api/events");
    }

    #[tokio::test]
    async fn posts_json_with_bearer_token() {
        let (base, server) = serve_once("HTTP/1.1 200 OK", r#"{"a":[{"t":1,"d":2}]}"#).await;
        let client = ReqwestApiClient::new(
            ReqwestApiConfig::new(base).with_token(Secret::new("s3cret".to_string())),
        )
        .unwrap();

        let response = client
            .request(HttpMethod::Post, "api/timeseries/dataset", Some(json!({"x": 1})))
            .await
            .unwrap();
        assert!(response.ok);
        assert_eq!(response.data["a"][0]["d"], json!(2));

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/timeseries/dataset"));
        assert!(raw.to_ascii_lowercase().contains("authorization: bearer s3cret"));
        assert!(raw.ends_with(r#"{"x":1}"#));
    }

    #[tokio::test]
    async fn non_success_status_is_a_response_not_an_error() {
        let (base, _server) = serve_once(
            "HTTP/1.1 400 Bad Request",
            r#"{"error":"bad_query","error_description":"timeseries not found"}"#,
        )
        .await;
        let client = ReqwestApiClient::new(ReqwestApiConfig::new(base)).unwrap();

        let response = client.request(HttpMethod::Get, "api/x", None).await.unwrap();
        assert!(!response.ok);
        assert_eq!(response.status, 400);
        assert_eq!(response.failure_reason(), "timeseries not found");
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_fetch_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let client = ReqwestApiClient::new(ReqwestApiConfig::new(base)).unwrap();
        let err = client.request(HttpMethod::Get, "api/x", None).await.unwrap_err();
        assert_eq!(err.code, crate::domain::foundation::ErrorCode::FetchFailed);
    }
}
