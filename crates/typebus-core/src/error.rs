//! Error handling for typebus
//!
//! Provides the error types returned synchronously by the bus:
//! - Registration errors (handler signature and category compatibility)
//! - Publish errors (unknown category, closed bus)
//! - Configuration errors (validation and loading)
//!
//! All error types use `thiserror` for ergonomic error handling.

use std::io;
use thiserror::Error;

/// Errors returned by [`Bus`](crate::Bus) and [`Registry`](crate::Registry) operations.
#[derive(Error, Debug)]
pub enum BusError {
    /// The handler does not take exactly one argument.
    #[error("handler {handler} must have a single argument, found {arity}")]
    InvalidSignature {
        /// Name of the offending handler.
        handler: String,
        /// Number of parameters the handler declares.
        arity: usize,
    },

    /// A category supplied at registration cannot be assigned to the handler parameter.
    #[error("handler argument {parameter} is not compatible with type {category}")]
    IncompatibleType {
        /// The handler's declared parameter type.
        parameter: String,
        /// The category that was rejected.
        category: String,
    },

    /// No handler is registered for the published event's category.
    #[error("no handler found for event type '{category}'")]
    NoHandler {
        /// The category of the rejected event.
        category: String,
    },

    /// The bus has been shut down and no longer accepts events.
    #[error("event bus is closed")]
    Closed,

    /// The bus configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A worker thread could not be started.
    #[error("failed to spawn worker: {0}")]
    Spawn(#[source] io::Error),
}

/// Errors related to bus configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The queue capacity must be positive.
    #[error("queue capacity must be greater than zero")]
    ZeroCapacity,

    /// The worker count must be positive.
    #[error("worker count must be greater than zero")]
    ZeroWorkers,

    /// The configuration file format is not supported.
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// I/O error while reading a configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
