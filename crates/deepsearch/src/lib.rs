//! Facade crate for `deepsearch`.
//!
//! No IO or remote-service code lives here. It re-exports the capability catalog,
//! selection logic and research lifecycle types from `deepsearch-core`, so embedders can
//! depend on one stable name.

pub use deepsearch_core::*;
