//! Logging system configuration and initialization
//!
//! Console output by default, optional non-blocking file output. The file
//! writer guard has to outlive the subscriber, so it is parked in a
//! process-wide slot.

use std::sync::Mutex;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::infrastructure::config::LoggingConfig;

// Keeps the non-blocking log file writer alive for the process lifetime.
static LOG_GUARDS: Lazy<Mutex<Vec<WorkerGuard>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Build the filter from the configured level plus per-module overrides.
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut directives = config.level.clone();
    for (module, level) in &config.module_filters {
        directives.push_str(&format!(",{module}={level}"));
    }
    EnvFilter::try_new(&directives)
        .with_context(|| format!("Invalid log filter directives: {directives}"))
}

/// Initialize the global tracing subscriber from configuration.
///
/// Call once at startup; a second call returns an error from the registry.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_env_filter(config)?;

    let console_layer = config
        .console_output
        .then(|| fmt::layer().with_target(false));

    let file_layer = if config.file_output {
        std::fs::create_dir_all(&config.directory).with_context(|| {
            format!("Failed to create log directory: {}", config.directory.display())
        })?;
        let appender = tracing_appender::rolling::daily(&config.directory, "aufgebotsdaten.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        LOG_GUARDS.lock().expect("log guard lock poisoned").push(guard);
        Some(fmt::layer().with_writer(writer).with_ansi(false))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
