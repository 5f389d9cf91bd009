//! MCP surface for the deepsearch capabilities.
//!
//! The `deepsearch` binary is the usual entrypoint. The modules here are exposed so the
//! server can be embedded and driven against any [`deepsearch_core::RemoteEndpoint`].

pub mod dispatch;
pub(crate) mod envelope;
pub mod handlers;
pub mod logging;
#[cfg(feature = "stdio")]
pub mod server;
pub mod settings;
