//! Logging initialization for the engine service.
//!
//! This module re-exports the observability crate's initialization
//! functions. The engine writes structured JSONL to the central log file
//! alongside every other service in the workspace.

// Re-exports for direct access if needed
#[allow(unused_imports)]
pub use observability::{init, init_with_config, LogConfig};

/// Initialize the logging system for the engine.
///
/// This sets up tracing with:
/// - Structured JSONL output to the central log file
/// - Log level from RUST_LOG env var or the provided default
/// - An initialization line announcing the service name and pid
///
/// # Example
///
/// ```ignore
/// init_logging("info");
/// tracing::info!("engine started");
/// ```
pub fn init_logging(level: &str) {
    observability::init_with_config(observability::LogConfig {
        service_name: "spaces-engine".into(),
        default_level: level.into(),
        also_stderr: true,
        ..Default::default()
    });
}
