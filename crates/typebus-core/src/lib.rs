//! # Typebus Core
//!
//! Dispatch engine of the typebus event bus: callers register handlers
//! against event categories and publish events, which a fixed pool of
//! worker threads delivers to every matching handler.
//!
//! ## Overview
//!
//! - [`Registry`] maps each [`EventCategory`] to its handler set behind one
//!   reader/writer lock
//! - The queue is a bounded channel; publishers block while it is full
//! - Workers drain the queue and invoke handlers under the registry's shared lock
//! - [`Bus`] ties them together and owns the worker threads
//!
//! ## Usage
//!
//! ```rust
//! use typebus_core::{Bus, Handler};
//!
//! #[derive(Debug, Clone)]
//! struct Greeting(String);
//!
//! let bus = Bus::new(10, 2)?;
//! let handler = Handler::new(|g: Greeting| println!("hello {}", g.0));
//! bus.register(&handler, &[])?;
//!
//! bus.publish(Greeting("world".to_string()))?;
//! bus.shutdown();
//! # Ok::<(), typebus_core::BusError>(())
//! ```

pub mod bus;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod registry;
pub mod stats;
mod worker;

pub use bus::Bus;
pub use config::{BusConfig, PanicPolicy};
pub use error::{BusError, ConfigError, ConfigResult, Result};
pub use event::{Event, EventCategory};
pub use handler::{Handler, HandlerId, IntoHandler};
pub use registry::Registry;
pub use stats::BusStats;
