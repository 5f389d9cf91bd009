//! Network side of deepsearch: one HTTP request per call against the search/research API.

pub mod exa;

pub use exa::{ExaClient, REQUEST_TIMEOUT};

/// Shared connection pool for every remote call made by one server instance.
pub fn http_client() -> deepsearch_core::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("deepsearch-mcp/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| deepsearch_core::Error::InvalidConfig(e.to_string()))
}
