//! Logging subscriber installation.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Used when neither the config nor `RUST_LOG` gives a filter.
pub const DEFAULT_FILTER: &str = "info";

static INIT: Once = Once::new();

/// Picks the filter: config directives, then `RUST_LOG`, then
/// [`DEFAULT_FILTER`]. Unparseable config directives fall through.
#[must_use]
pub fn resolve_filter(configured: Option<&str>) -> EnvFilter {
    configured
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global `fmt` subscriber. Later calls do nothing.
pub fn init_logging(configured: Option<&str>) {
    INIT.call_once(|| {
        let installed = tracing_subscriber::fmt()
            .with_env_filter(resolve_filter(configured))
            .with_target(true)
            .with_thread_names(true)
            .try_init();
        if installed.is_err() {
            tracing::debug!("a global subscriber was already installed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_filter_wins() {
        assert_eq!(resolve_filter(Some("twinframe=debug")).to_string(), "twinframe=debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_logging(Some("warn"));
        init_logging(Some("trace"));
        tracing::info!("still alive");
    }
}
