//! Error types for the nurture engine.

use std::time::Duration;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid cron expression for {key}: {message}")]
    InvalidCron { key: String, message: String },
}

/// Persistence errors from the lead/message/task store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Outbound SMS transport errors.
///
/// A transport failure never mutates lead state — the lead stays due and
/// is retried on the next sweep.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Provider rejected send to {to}: status {status}: {body}")]
    SendFailed {
        to: String,
        status: u16,
        body: String,
    },

    #[error("Send to {to} timed out after {timeout:?}")]
    Timeout { to: String, timeout: Duration },

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Input validation errors. Never retried; logged and skipped.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Unparseable timestamp {value:?}")]
    BadTimestamp { value: String },

    #[error("Phone number {value:?} cannot be normalized to E.164")]
    BadPhone { value: String },
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
