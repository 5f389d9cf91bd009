//! Resolves the runtime configuration from the optional JSON file and the CLI/env flags.

use anyhow::Context;
use std::path::Path;

use deepsearch_core::{RuntimeConfig, ToolSelection};

/// Values taken from flags or their environment variables.
#[derive(Debug, Clone, Default)]
pub struct FlagValues {
    pub api_key: Option<String>,
    pub tools: Vec<String>,
    pub debug: bool,
}

impl FlagValues {
    fn into_config(self) -> RuntimeConfig {
        let mut cfg = RuntimeConfig::default().with_debug(self.debug);
        if let Some(k) = self.api_key {
            cfg = cfg.with_api_key(k);
        }
        if !self.tools.is_empty() {
            cfg = cfg.with_tools(ToolSelection::Delimited(self.tools.join(",")));
        }
        cfg
    }
}

/// File values first, then flags on top.
pub fn load(config_path: Option<&Path>, flags: FlagValues) -> anyhow::Result<RuntimeConfig> {
    let base = match config_path {
        Some(p) => {
            let txt = std::fs::read_to_string(p)
                .with_context(|| format!("reading config file {}", p.display()))?;
            RuntimeConfig::from_json_str(&txt)
                .with_context(|| format!("parsing config file {}", p.display()))?
        }
        None => RuntimeConfig::default(),
    };
    Ok(base.overlay(flags.into_config()))
}
