//! Name -> handler binding for the active capability set.

use std::collections::BTreeMap;

use deepsearch_core::{ActiveSet, CapabilityId, InvocationResult};

use crate::handlers::Handler;

/// Handlers for exactly the active capabilities, in registration order.
///
/// Built once at startup. Names outside the active set resolve to nothing, so an inactive
/// capability cannot be invoked through this table.
pub struct Dispatcher {
    order: Vec<CapabilityId>,
    handlers: BTreeMap<&'static str, Handler>,
}

impl Dispatcher {
    pub fn bind(
        active: &ActiveSet,
        debug: bool,
        mut make: impl FnMut(CapabilityId) -> Handler,
    ) -> Self {
        let mut order = Vec::with_capacity(active.len());
        let mut handlers = BTreeMap::new();
        for &id in active.ids() {
            if handlers.insert(id.as_str(), make(id)).is_none() {
                order.push(id);
            }
            if debug {
                tracing::info!(capability = id.as_str(), "bound capability");
            }
        }
        if debug {
            for name in active.ignored() {
                tracing::info!(requested = %name, "ignored unknown capability id");
            }
        }
        Self { order, handlers }
    }

    pub fn ids(&self) -> &[CapabilityId] {
        &self.order
    }

    pub fn get(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }

    /// `None` when `name` is not bound.
    pub async fn invoke(&self, name: &str, args: serde_json::Value) -> Option<InvocationResult> {
        let handler = self.get(name)?;
        Some(handler.invoke(args).await)
    }
}
