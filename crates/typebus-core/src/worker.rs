//! Worker pool.
//!
//! A fixed number of named OS threads share the receiving end of the bounded
//! queue. Each worker blocks while the queue is empty, dispatches every event
//! it takes, and exits once the queue is closed and drained.

use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::{BusConfig, PanicPolicy};
use crate::error::{BusError, Result};
use crate::event::Envelope;
use crate::registry::Registry;
use crate::stats::Counters;

/// State shared between the bus facade and its workers.
#[derive(Debug)]
pub(crate) struct Dispatcher {
    pub(crate) registry: Registry,
    pub(crate) counters: Counters,
    pub(crate) panic_policy: PanicPolicy,
}

impl Dispatcher {
    pub(crate) fn new(panic_policy: PanicPolicy) -> Self {
        Self {
            registry: Registry::new(),
            counters: Counters::default(),
            panic_policy,
        }
    }

    fn dispatch(&self, worker: usize, envelope: &Envelope) {
        tracing::trace!(worker, category = %envelope.category, "Dispatching event");
        let outcome = self.registry.dispatch(envelope, self.panic_policy);
        self.counters.record_dispatch(outcome);
    }
}

/// Start `config.workers` threads draining `queue`.
///
/// Workers are numbered from 1. If a thread cannot be spawned the workers
/// already started exit as soon as the caller drops the queue's sender.
pub(crate) fn spawn_workers(
    dispatcher: &Arc<Dispatcher>,
    queue: &Receiver<Envelope>,
    config: &BusConfig,
) -> Result<Vec<JoinHandle<()>>> {
    (1..=config.workers)
        .map(|worker| {
            let dispatcher = Arc::clone(dispatcher);
            let queue = queue.clone();
            thread::Builder::new()
                .name(format!("{}-{}", config.thread_name_prefix, worker))
                .spawn(move || run(worker, &dispatcher, &queue))
                .map_err(BusError::Spawn)
        })
        .collect()
}

fn run(worker: usize, dispatcher: &Dispatcher, queue: &Receiver<Envelope>) {
    let _guard = ExitGuard { worker };
    tracing::info!(worker, "Worker started");

    for envelope in queue.iter() {
        dispatcher.dispatch(worker, &envelope);
    }
}

/// Logs how a worker left its loop, including unwinding out of a handler.
struct ExitGuard {
    worker: usize,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            tracing::error!(worker = self.worker, "Worker terminated by handler panic");
        } else {
            tracing::info!(worker = self.worker, "Worker stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone)]
    struct Tick(u32);

    #[test]
    fn test_workers_drain_and_stop() {
        let dispatcher = Arc::new(Dispatcher::new(PanicPolicy::Contain));
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        dispatcher
            .registry
            .register(
                &Handler::new(move |_: Tick| {
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
                &[],
            )
            .expect("register");

        let (tx, rx) = crossbeam_channel::bounded(4);
        let handles =
            spawn_workers(&dispatcher, &rx, &BusConfig::new(4, 3)).expect("spawn workers");
        drop(rx);
        assert_eq!(handles.len(), 3);

        for i in 0..20 {
            tx.send(Envelope::new(Tick(i))).expect("send");
        }
        drop(tx);

        for handle in handles {
            handle.join().expect("worker exits cleanly");
        }
        assert_eq!(counter.load(Ordering::SeqCst), 20);
        assert_eq!(dispatcher.counters.snapshot().dispatched, 20);
    }

    #[test]
    fn test_worker_thread_names() {
        let dispatcher = Arc::new(Dispatcher::new(PanicPolicy::Contain));
        let (names_tx, names_rx) = crossbeam_channel::unbounded();
        dispatcher
            .registry
            .register(
                &Handler::new(move |_: Tick| {
                    let name = thread::current().name().map(str::to_string);
                    names_tx.send(name).ok();
                }),
                &[],
            )
            .expect("register");

        let (tx, rx) = crossbeam_channel::bounded(1);
        let config = BusConfig::new(1, 1).with_thread_name_prefix("dispatch");
        let handles = spawn_workers(&dispatcher, &rx, &config).expect("spawn workers");
        tx.send(Envelope::new(Tick(1))).expect("send");

        let name = names_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("handler ran");
        assert_eq!(name.as_deref(), Some("dispatch-1"));

        drop(tx);
        for handle in handles {
            handle.join().expect("worker exits cleanly");
        }
    }

    #[test]
    fn test_propagate_terminates_worker() {
        let dispatcher = Arc::new(Dispatcher::new(PanicPolicy::Propagate));
        dispatcher
            .registry
            .register(
                &Handler::new(|_: Tick| {
                    panic!("handler failure");
                }),
                &[],
            )
            .expect("register");

        let (tx, rx) = crossbeam_channel::bounded(1);
        let handles =
            spawn_workers(&dispatcher, &rx, &BusConfig::new(1, 1)).expect("spawn workers");
        drop(rx);
        tx.send(Envelope::new(Tick(1))).expect("send");

        for handle in handles {
            assert!(handle.join().is_err());
        }
        // No receiver is left once the only worker died.
        assert!(tx.send(Envelope::new(Tick(2))).is_err());
    }
}
