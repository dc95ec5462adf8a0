//! Event Bus implementation.
//!
//! Provides the [`Bus`] facade: it owns the handler registry and the bounded
//! queue, starts the worker pool at construction and stops it on shutdown.

use crossbeam_channel::Sender;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::BusConfig;
use crate::error::{BusError, Result};
use crate::event::{Envelope, Event, EventCategory};
use crate::handler::{Handler, HandlerId, IntoHandler};
use crate::registry::Registry;
use crate::stats::BusStats;
use crate::worker::{spawn_workers, Dispatcher};

/// In-process publish/subscribe bus routing events to handlers by type.
///
/// Publishing only queues the event; one of the workers later invokes every
/// handler registered for the event's category. Share the bus between
/// threads with an `Arc`.
pub struct Bus {
    dispatcher: Arc<Dispatcher>,
    /// Producer side of the queue, `None` once the bus is shut down.
    sender: RwLock<Option<Sender<Envelope>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    config: BusConfig,
}

impl Bus {
    /// Create a bus with a queue of `queue_capacity` events and `workers`
    /// worker threads. Both must be positive.
    pub fn new(queue_capacity: usize, workers: usize) -> Result<Self> {
        Self::with_config(BusConfig::new(queue_capacity, workers))
    }

    /// Create a bus from a full configuration
    pub fn with_config(config: BusConfig) -> Result<Self> {
        config.validate()?;

        let dispatcher = Arc::new(Dispatcher::new(config.panic_policy));
        let (sender, receiver) = crossbeam_channel::bounded(config.queue_capacity);
        let workers = spawn_workers(&dispatcher, &receiver, &config)?;

        tracing::info!(
            queue_capacity = config.queue_capacity,
            workers = config.workers,
            panic_policy = %config.panic_policy,
            "Event bus started"
        );

        Ok(Self {
            dispatcher,
            sender: RwLock::new(Some(sender)),
            workers: Mutex::new(workers),
            config,
        })
    }

    /// Subscribe `handler` to `categories`, or to its parameter type when
    /// `categories` is empty.
    ///
    /// Fails with [`BusError::InvalidSignature`] unless the handler takes
    /// exactly one argument, and with [`BusError::IncompatibleType`] if a
    /// category cannot be delivered to it. Registering the same handler
    /// again is a no-op. The returned id identifies the handler.
    pub fn register(&self, handler: &Handler, categories: &[EventCategory]) -> Result<HandlerId> {
        self.dispatcher.registry.register(handler, categories)?;
        Ok(handler.id())
    }

    /// Wrap `f` in a new [`Handler`] and subscribe it to its parameter type.
    pub fn subscribe<M, F>(&self, f: F) -> Result<HandlerId>
    where
        F: IntoHandler<M>,
    {
        self.register(&Handler::new(f), &[])
    }

    /// Queue an event for dispatch.
    ///
    /// Fails with [`BusError::NoHandler`] if nothing is registered for the
    /// event's type, leaving the queue untouched, and with
    /// [`BusError::Closed`] after shutdown. Blocks while the queue is
    /// full. Returning `Ok` only means the event is queued; handlers run
    /// later on a worker thread.
    pub fn publish<E: Event>(&self, event: E) -> Result<()> {
        let category = EventCategory::of::<E>();

        // Clone the sender so the lock is not held while blocked on a full queue.
        let sender = self.sender.read().clone().ok_or(BusError::Closed)?;

        if !self.dispatcher.registry.contains(category) {
            self.dispatcher.counters.record_rejected();
            return Err(BusError::NoHandler {
                category: category.name().to_string(),
            });
        }

        sender
            .send(Envelope::new(event))
            .map_err(|_| BusError::Closed)?;
        self.dispatcher.counters.record_published();
        tracing::trace!(category = %category, "Event queued");
        Ok(())
    }

    /// Close the queue, let the workers drain it and wait for them to exit.
    ///
    /// Further publishes fail with [`BusError::Closed`]. Calling this more
    /// than once is harmless. When called from a handler, the calling worker
    /// is not waited for.
    pub fn shutdown(&self) {
        if let Some(sender) = self.sender.write().take() {
            tracing::info!(pending = sender.len(), "Event bus shutting down");
        }

        let handles = std::mem::take(&mut *self.workers.lock());
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                tracing::warn!(worker = %name, "Worker had terminated by panic");
            }
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    /// Whether at least one handler is registered for `category`.
    pub fn has_handlers(&self, category: EventCategory) -> bool {
        self.dispatcher.registry.contains(category)
    }

    /// The handler registry
    pub fn registry(&self) -> &Registry {
        &self.dispatcher.registry
    }

    /// Number of events waiting in the queue; zero once closed.
    pub fn queue_len(&self) -> usize {
        self.sender.read().as_ref().map_or(0, Sender::len)
    }

    /// Fixed capacity of the queue.
    pub fn queue_capacity(&self) -> usize {
        self.config.queue_capacity
    }

    /// Number of workers started at construction.
    pub fn worker_count(&self) -> usize {
        self.config.workers
    }

    /// Snapshot of the runtime counters.
    pub fn stats(&self) -> BusStats {
        self.dispatcher.counters.snapshot()
    }

    /// The configuration the bus was built with.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }
}

impl Drop for Bus {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("categories", &self.dispatcher.registry.len())
            .field("queue_len", &self.queue_len())
            .field("closed", &self.is_closed())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PanicPolicy;
    use crate::error::ConfigError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone)]
    struct Greeting(String);

    #[test]
    fn test_bus_creation() {
        let bus = Bus::new(10, 2).expect("bus");
        assert_eq!(bus.queue_capacity(), 10);
        assert_eq!(bus.worker_count(), 2);
        assert_eq!(bus.queue_len(), 0);
        assert!(bus.registry().is_empty());
        assert!(!bus.is_closed());
    }

    #[test]
    fn test_bus_rejects_invalid_config() {
        assert!(matches!(
            Bus::new(0, 2),
            Err(BusError::Config(ConfigError::ZeroCapacity))
        ));
        assert!(matches!(
            Bus::new(10, 0),
            Err(BusError::Config(ConfigError::ZeroWorkers))
        ));
    }

    #[test]
    fn test_subscribe_and_publish() {
        let bus = Bus::new(10, 2).expect("bus");
        let (tx, rx) = crossbeam_channel::unbounded();
        bus.subscribe(move |g: Greeting| {
            tx.send(g.0).ok();
        })
        .expect("subscribe");

        bus.publish(Greeting("Hallo".to_string())).expect("publish");
        let message = rx.recv_timeout(Duration::from_secs(5)).expect("delivered");
        assert_eq!(message, "Hallo");
    }

    #[test]
    fn test_publish_without_handler() {
        let bus = Bus::new(10, 2).expect("bus");
        bus.subscribe(|_: Greeting| {}).expect("subscribe");

        let err = bus.publish(String::new()).unwrap_err();
        assert!(matches!(err, BusError::NoHandler { .. }));
        assert_eq!(bus.queue_len(), 0);
        assert_eq!(bus.stats().rejected, 1);
        assert_eq!(bus.stats().published, 0);
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let bus = Bus::new(64, 2).expect("bus");
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        bus.subscribe(move |_: Greeting| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .expect("subscribe");

        for i in 0..50 {
            bus.publish(Greeting(i.to_string())).expect("publish");
        }
        bus.shutdown();

        assert_eq!(counter.load(Ordering::SeqCst), 50);
        let stats = bus.stats();
        assert_eq!(stats.published, 50);
        assert_eq!(stats.dispatched, 50);
        assert_eq!(stats.in_flight(), 0);
    }

    #[test]
    fn test_publish_after_shutdown() {
        let bus = Bus::new(10, 1).expect("bus");
        bus.subscribe(|_: Greeting| {}).expect("subscribe");
        bus.shutdown();
        bus.shutdown();

        assert!(bus.is_closed());
        assert!(matches!(
            bus.publish(Greeting("late".to_string())),
            Err(BusError::Closed)
        ));
    }

    #[test]
    fn test_contained_panic_keeps_worker_alive() {
        let bus = Bus::new(10, 1).expect("bus");
        let (tx, rx) = crossbeam_channel::unbounded();
        bus.subscribe(|g: Greeting| {
            if g.0 == "bad" {
                panic!("rejecting {}", g.0);
            }
        })
        .expect("subscribe panicking");
        bus.subscribe(move |g: Greeting| {
            tx.send(g.0).ok();
        })
        .expect("subscribe recorder");

        bus.publish(Greeting("bad".to_string())).expect("publish");
        bus.publish(Greeting("good".to_string())).expect("publish");

        let mut received = vec![
            rx.recv_timeout(Duration::from_secs(5)).expect("first"),
            rx.recv_timeout(Duration::from_secs(5)).expect("second"),
        ];
        received.sort();
        assert_eq!(received, vec!["bad".to_string(), "good".to_string()]);

        bus.shutdown();
        assert_eq!(bus.stats().handler_panics, 1);
        assert_eq!(bus.stats().handler_invocations, 3);
    }

    #[test]
    fn test_shutdown_from_handler() {
        let bus = Arc::new(Bus::with_config(BusConfig::new(4, 2)).expect("bus"));
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = Arc::clone(&bus);
        bus.subscribe(move |_: Greeting| {
            handle.shutdown();
            tx.send(()).ok();
        })
        .expect("subscribe");

        bus.publish(Greeting("stop".to_string())).expect("publish");
        rx.recv_timeout(Duration::from_secs(5))
            .expect("handler returned from shutdown");
        assert!(bus.is_closed());
    }

    #[test]
    fn test_propagate_policy_config() {
        let config = BusConfig::new(4, 1).with_panic_policy(PanicPolicy::Propagate);
        let bus = Bus::with_config(config).expect("bus");
        assert_eq!(bus.config().panic_policy, PanicPolicy::Propagate);
    }

    #[test]
    fn test_debug_output() {
        let bus = Bus::new(4, 1).expect("bus");
        let debug = format!("{:?}", bus);
        assert!(debug.contains("Bus"));
        assert!(debug.contains("queue_len"));
    }
}
