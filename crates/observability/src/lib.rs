//! # Observability
//!
//! Centralized observability layer for the spaces workspace.
//!
//! ## Design Philosophy
//!
//! Services are **log producers**, not log consumers or streamers. They call
//! `observability::init()` once at startup and use standard `tracing` macros
//! throughout their code. They have zero knowledge of:
//!
//! - Where logs go (file, stdout, network)
//! - Who consumes logs (CLI tools, dashboards, aggregators)
//! - How logs are streamed (pull via tail, push via network)
//!
//! All services write structured JSONL to a single central file:
//! `~/.spaces/logs/spaces.jsonl`
//!
//! This enables:
//! - `tail -f ~/.spaces/logs/spaces.jsonl` for raw streaming
//! - `tail -f ~/.spaces/logs/spaces.jsonl | jq` for pretty JSON
//!
//! Multi-process safety is achieved through append-only writes with
//! per-line flush semantics. Each service announces itself with an
//! initialization line carrying its name and pid, so interleaved lines can
//! be attributed when several processes share the file.
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init("spaces-engine");
//!
//!     tracing::info!("service started");
//!     // ... rest of your code
//! }
//! ```

mod writer;

use std::io;
use std::path::PathBuf;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::writer::{CentralLogWriter, WriterFactory};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "spaces-engine", "spaces-cli").
    /// Announced in the initialization line for attribution.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional custom log file path.
    /// Defaults to `~/.spaces/logs/spaces.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit logs to stderr for immediate feedback.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize the observability layer with default settings.
///
/// This is the zero-config entry point. Services call this once at startup:
///
/// ```rust,ignore
/// fn main() {
///     observability::init("my-service");
///     tracing::info!("ready");
/// }
/// ```
///
/// # Panics
///
/// Panics if the log file cannot be created or opened.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize the observability layer with custom configuration.
///
/// Use this when you need to customize logging behavior:
///
/// ```rust,ignore
/// observability::init_with_config(observability::LogConfig {
///     service_name: "spaces-engine".into(),
///     default_level: "debug".into(),
///     also_stderr: true,
///     ..Default::default()
/// });
/// ```
pub fn init_with_config(config: LogConfig) {
    let log_path = config.log_path.clone().unwrap_or_else(default_log_path);

    let writer = CentralLogWriter::new(&log_path)
        .unwrap_or_else(|e| panic!("failed to open log file {:?}: {}", log_path, e));

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_target(true)
        .with_writer(WriterFactory::new(writer));

    let stderr_layer = if config.also_stderr {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
                .compact()
                .with_writer(io::stderr),
        )
    } else {
        None
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_level.clone()));

    tracing_subscriber::registry()
        .with(json_layer.with_filter(filter))
        .with(stderr_layer)
        .init();

    tracing::info!(
        service = %config.service_name,
        pid = std::process::id(),
        "logging initialized"
    );
}

/// Central log file location for all services.
fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".spaces")
        .join("logs")
        .join("spaces.jsonl")
}

/// Re-export tracing macros for convenience.
/// Services can use `observability::info!()` or `tracing::info!()`.
pub use tracing::{debug, error, info, instrument, span, trace, warn};
