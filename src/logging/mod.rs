// Logging module for structured logging using the tracing crate

use std::error::Error;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber for structured logging
///
/// This function sets up the tracing subscriber that will receive and process
/// log events throughout the application.
///
/// The subscriber is configured with:
/// - JSON formatting for easy parsing by log aggregation systems
/// - Filtering via `RUST_LOG`, defaulting to INFO
/// - Output to stdout for container/cloud-native deployments
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
///
/// # Examples
///
/// ```no_run
/// use imagemark::logging::init_subscriber;
///
/// // Initialize logging at application startup
/// init_subscriber().expect("Failed to initialize logging");
///
/// // Now you can use tracing macros throughout the application
/// tracing::info!("Watermark pipeline started");
/// ```
pub fn init_subscriber() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| -> Box<dyn Error> { e })?;

    Ok(())
}
