//! # Structured Logging Module
//!
//! Environment-aware structured logging for tracing query executions through
//! their stages, middleware groups and adapter calls.

use crate::settings::LoggingSettings;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    init_with_settings(&LoggingSettings {
        level: None,
        json: std::env::var("ORMQUERY_LOG_FORMAT").is_ok_and(|format| format == "json"),
    });
}

/// Initialize logging from explicit settings; later calls are no-ops
pub fn init_with_settings(settings: &LoggingSettings) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = settings
            .level
            .clone()
            .unwrap_or_else(|| get_log_level(&environment).to_string());

        let console_layer = if settings.json {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .json()
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        };

        // A host application may already own the global subscriber
        if tracing_subscriber::registry()
            .with(console_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %environment,
            level = %log_level,
            json = settings.json,
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("ORMQUERY_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log a stage transition of one execution
pub fn log_stage_event(execution_id: &str, stage: &str, phase: &str, groups: usize) {
    tracing::debug!(
        execution_id = %execution_id,
        stage = %stage,
        phase = %phase,
        groups = groups,
        "STAGE_EVENT"
    );
}

/// Log a call that crossed into the adapter
pub fn log_adapter_call(execution_id: &str, adapter: &str, operation: &str, details: Option<&str>) {
    tracing::debug!(
        execution_id = %execution_id,
        adapter = %adapter,
        operation = %operation,
        details = details,
        "ADAPTER_CALL"
    );
}
