//! Shared logging utilities for consistent tracing across the workspace

use chrono::{DateTime, Utc};
use tracing::{error, info};

/// Component name attached to lifecycle messages
pub const COMPONENT: &str = "glassbox";

/// Initialize the tracing subscriber.
///
/// Output goes to stderr so stdout stays reserved for JSON results.
pub fn init_tracing(log_level: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let base_level = log_level.unwrap_or("info");
    let env_filter = format!("glassbox={base_level},shared={base_level}");

    let _ = fmt()
        .with_env_filter(EnvFilter::new(&env_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .try_init();
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for run-scoped info logging
#[macro_export]
macro_rules! run_info {
    ($run_id:expr, $($arg:tt)*) => {
        tracing::info!(
            run_id = %$run_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for run-scoped warning logging
#[macro_export]
macro_rules! run_warn {
    ($run_id:expr, $($arg:tt)*) => {
        tracing::warn!(
            run_id = %$run_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for run-scoped error logging
#[macro_export]
macro_rules! run_error {
    ($run_id:expr, $($arg:tt)*) => {
        tracing::error!(
            run_id = %$run_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for run-scoped debug logging
#[macro_export]
macro_rules! run_debug {
    ($run_id:expr, $($arg:tt)*) => {
        tracing::debug!(
            run_id = %$run_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Contextual logging helper for startup messages
pub fn log_startup(details: &str) {
    info!(
        component = COMPONENT,
        timestamp = format_timestamp(),
        "🚀 Starting {}",
        details
    );
}

/// Contextual logging helper for error conditions
pub fn log_error(context: &str, error: &dyn std::fmt::Display) {
    error!(
        component = COMPONENT,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}

/// Contextual logging helper for success conditions
pub fn log_success(message: &str) {
    info!(
        component = COMPONENT,
        timestamp = format_timestamp(),
        "✅ {}",
        message
    );
}
