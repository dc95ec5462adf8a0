//! # Typebus
//!
//! An in-process, type-routed publish/subscribe event bus:
//! - Handlers are registered against event categories derived from types
//! - Published events go through a bounded queue (publishers block when full)
//! - A fixed pool of worker threads invokes every matching handler
//! - Handler panics are contained and counted by default
//!
//! ## Architecture
//!
//! Typebus is organized as a workspace:
//!
//! 1. **typebus-core** - Registry, queue, worker pool and the `Bus` facade
//! 2. **typebus** - This crate; re-exports the core API and sets up logging
//!
//! ## Usage
//!
//! ```rust
//! use typebus::{Bus, Handler};
//!
//! #[derive(Debug, Clone)]
//! struct Greeting(String);
//!
//! let bus = Bus::new(10, 2)?;
//! bus.register(&Handler::new(|g: Greeting| println!("{}", g.0)), &[])?;
//! bus.publish(Greeting("hallo".to_string()))?;
//! # Ok::<(), typebus::BusError>(())
//! ```

pub use typebus_core::{
    Bus, BusConfig, BusError, BusStats, ConfigError, ConfigResult, Event, EventCategory, Handler,
    HandlerId, IntoHandler, PanicPolicy, Registry, Result,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable, multi-line output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support
/// - Thread names, so worker threads show up as `typebus-worker-N`
pub fn init_logging() -> anyhow::Result<()> {
    init_logging_with(LogFormat::Pretty)
}

/// Initialize logging with the given output format
///
/// Fails if a global subscriber is already installed.
pub fn init_logging_with(format: LogFormat) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let base = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true);

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Pretty => registry.with(base.pretty()).try_init(),
        LogFormat::Json => registry.with(base.json()).try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;

    tracing::debug!(version = VERSION, ?format, "Logging initialized");
    Ok(())
}
