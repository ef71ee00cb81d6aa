//! ApiClient Port - Interface for backend REST calls.
//!
//! Queries use this port to fetch datasets without knowing about the HTTP
//! client, base URL, or credentials.
//!
//! # Example
//!
//! ```ignore
//! let response = client
//!     .request(HttpMethod::Post, "api/timeseries/dataset", Some(spec.to_value()))
//!     .await?;
//! if !response.ok {
//!     return Err(DomainError::fetch(response.failure_reason()));
//! }
//! ```

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::fmt;

use crate::domain::foundation::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        };
        write!(f, "{}", s)
    }
}

/// A completed backend call, successful or not.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// Whether the status was 2xx.
    pub ok: bool,
    pub status: u16,
    /// Decoded JSON body; `Null` when the body was empty or not JSON.
    pub data: JsonValue,
}

impl ApiResponse {
    pub fn success(data: JsonValue) -> Self {
        Self {
            ok: true,
            status: 200,
            data,
        }
    }

    pub fn failure(status: u16, description: impl Into<String>) -> Self {
        Self {
            ok: false,
            status,
            data: serde_json::json!({ "error_description": description.into() }),
        }
    }

    /// `data.error_description` of a failed response, or a generic message.
    pub fn failure_reason(&self) -> String {
        self.data
            .get("error_description")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("request failed with status {}", self.status))
    }
}

/// Port for calls to the backend API.
///
/// Implementations must:
/// - Return `Ok` for any response the server produced, including non-2xx
/// - Return `Err` only when no response was obtained (network, timeout)
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<ApiResponse, DomainError>;
}
