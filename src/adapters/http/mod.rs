//! HTTP adapters - backend REST client.

pub mod api_client;

pub use api_client::{ReqwestApiClient, ReqwestApiConfig};
