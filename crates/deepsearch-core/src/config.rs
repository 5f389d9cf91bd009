use serde::Deserialize;

use crate::{Error, Result};

/// Raw capability selection as callers supply it: `"a, b"` or `["a", "b"]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ToolSelection {
    Delimited(String),
    List(Vec<String>),
}

impl ToolSelection {
    /// Trimmed, non-empty, first-occurrence-ordered ids.
    pub fn normalize(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            Self::Delimited(s) => s
                .split(|c: char| c == ',' || c.is_whitespace())
                .collect(),
            Self::List(v) => v.iter().map(String::as_str).collect(),
        };
        let mut out: Vec<String> = Vec::new();
        for id in raw {
            let id = id.trim();
            if id.is_empty() {
                continue;
            }
            if !out.iter().any(|x| x == id) {
                out.push(id.to_string());
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// `None` means "use defaults". Always already normalized.
    pub enabled_capabilities: Option<Vec<String>>,
    pub api_key: Option<String>,
    pub debug: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(default, alias = "exaApiKey", alias = "api_key")]
    api_key: Option<String>,
    #[serde(default, alias = "enabledTools", alias = "enabledCapabilities")]
    tools: Option<ToolSelection>,
    #[serde(default)]
    debug: Option<bool>,
}

impl RuntimeConfig {
    pub fn with_tools(mut self, tools: ToolSelection) -> Self {
        self.enabled_capabilities = Some(tools.normalize());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        // Empty keys are treated as missing.
        let key = key.into();
        self.api_key = Some(key.trim().to_string()).filter(|k| !k.is_empty());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Parse the JSON config object (`apiKey`, `tools`, `debug`).
    pub fn from_json_str(s: &str) -> Result<Self> {
        let raw: RawConfig =
            serde_json::from_str(s).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let mut cfg = Self::default().with_debug(raw.debug.unwrap_or(false));
        if let Some(k) = raw.api_key {
            cfg = cfg.with_api_key(k);
        }
        if let Some(t) = raw.tools {
            cfg = cfg.with_tools(t);
        }
        Ok(cfg)
    }

    /// Field-wise overlay: values set in `over` win. A selection that normalized to
    /// nothing counts as unset, so it never masks the base selection.
    pub fn overlay(self, over: Self) -> Self {
        Self {
            enabled_capabilities: over
                .enabled_capabilities
                .filter(|v| !v.is_empty())
                .or(self.enabled_capabilities),
            api_key: over.api_key.or(self.api_key),
            debug: self.debug || over.debug,
        }
    }

    /// True when the caller named at least one capability.
    pub fn has_explicit_selection(&self) -> bool {
        self.enabled_capabilities
            .as_ref()
            .is_some_and(|v| !v.is_empty())
    }
}
