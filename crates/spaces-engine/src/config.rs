//! Engine configuration.

use std::time::Duration;

/// Configuration for the space reconciliation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// This extension's own identifier. URLs mentioning it are filtered out
    /// of fingerprints, history, and window matching.
    pub extension_id: String,

    /// Current extension version, compared against the stored last-seen
    /// version to drive one-shot migrations.
    pub version: String,

    /// Coalescing window for per-window reconcile writes.
    pub session_debounce: Duration,

    /// Coalescing window for per-window bounds writes.
    pub bounds_debounce: Duration,

    /// Maximum number of recently-closed tabs kept per session.
    pub history_limit: usize,
}

impl EngineConfig {
    /// Create a new EngineConfig with the given identity.
    ///
    /// Uses default values for the tuning knobs, which can be overridden
    /// via environment variables.
    pub fn new(extension_id: impl Into<String>, version: impl Into<String>) -> Self {
        let session_debounce_ms: u64 = std::env::var("SPACES_DEBOUNCE_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1_000);

        let bounds_debounce_ms: u64 = std::env::var("SPACES_BOUNDS_DEBOUNCE_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1_000);

        Self {
            extension_id: extension_id.into(),
            version: version.into(),
            session_debounce: Duration::from_millis(session_debounce_ms),
            bounds_debounce: Duration::from_millis(bounds_debounce_ms),
            history_limit: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::new("ext-id", "1.4.2");
        assert_eq!(config.extension_id, "ext-id");
        assert_eq!(config.version, "1.4.2");
        assert_eq!(config.session_debounce, Duration::from_secs(1));
        assert_eq!(config.bounds_debounce, Duration::from_secs(1));
        assert_eq!(config.history_limit, 200);
    }
}
