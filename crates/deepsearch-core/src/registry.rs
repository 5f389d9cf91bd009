use std::collections::BTreeSet;

use crate::capability::{CapabilityDescriptor, CapabilityId};
use crate::config::RuntimeConfig;

/// Capabilities a server instance exposes.
///
/// Membership is what matters; the order is kept only so registration logging and
/// tool listings are deterministic (request order, or catalog order for defaults).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSet {
    ids: Vec<CapabilityId>,
    ignored: Vec<String>,
}

impl ActiveSet {
    pub fn contains(&self, id: CapabilityId) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> &[CapabilityId] {
        &self.ids
    }

    pub fn to_set(&self) -> BTreeSet<CapabilityId> {
        self.ids.iter().copied().collect()
    }

    /// Requested ids that matched nothing known.
    pub fn ignored(&self) -> &[String] {
        &self.ignored
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

pub fn compute_active_set(config: &RuntimeConfig, known: &[CapabilityDescriptor]) -> ActiveSet {
    let requested = config
        .enabled_capabilities
        .as_deref()
        .filter(|v| !v.is_empty());

    let Some(requested) = requested else {
        return ActiveSet {
            ids: known
                .iter()
                .filter(|d| d.default_enabled)
                .map(|d| d.id)
                .collect(),
            ignored: Vec::new(),
        };
    };

    let mut ids: Vec<CapabilityId> = Vec::new();
    let mut ignored: Vec<String> = Vec::new();
    for name in requested {
        let name = name.trim();
        match known.iter().find(|d| d.id.as_str() == name) {
            Some(d) if !ids.contains(&d.id) => ids.push(d.id),
            Some(_) => {}
            None => ignored.push(name.to_string()),
        }
    }
    ActiveSet { ids, ignored }
}
