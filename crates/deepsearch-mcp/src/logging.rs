use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";
const DEBUG_FILTER: &str = "warn,deepsearch_mcp=debug,deepsearch_remote=debug,deepsearch_core=debug";

pub(crate) fn default_filter(debug: bool) -> &'static str {
    if debug {
        DEBUG_FILTER
    } else {
        DEFAULT_FILTER
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over the built-in filter.
///
/// Stdout carries the MCP protocol, so nothing here may write to it.
pub fn init(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));
    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_raises_only_our_crates() {
        assert_eq!(default_filter(false), "warn");
        let d = default_filter(true);
        assert!(d.starts_with("warn,"));
        for c in ["deepsearch_mcp", "deepsearch_remote", "deepsearch_core"] {
            assert!(d.contains(&format!("{c}=debug")));
        }
        assert!(EnvFilter::try_new(d).is_ok());
    }
}
