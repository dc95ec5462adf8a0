//! Handler registry.
//!
//! Maps every [`EventCategory`] to the set of handlers subscribed to it.
//! One reader/writer lock guards the whole map: registration takes it
//! exclusively, lookups and dispatch share it. Dispatch keeps the shared
//! lock for the lookup and for every handler invocation, so a slow handler
//! delays concurrent registrations.
//!
//! Shared access is always recursive: a reader never queues behind a waiting
//! writer. Handlers run under the shared lock and may publish or inspect the
//! registry, so a fair read would deadlock against a pending registration.

use parking_lot::{RwLock, RwLockReadGuard};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::config::PanicPolicy;
use crate::error::{BusError, Result};
use crate::event::{Envelope, EventCategory};
use crate::handler::{Handler, HandlerId, Invoke};

/// A handler as stored in a category's set.
struct Subscriber {
    name: String,
    invoke: Invoke,
}

/// Handlers of one category, keyed by identity. Iteration order is unspecified.
type HandlerSet = HashMap<HandlerId, Subscriber>;

/// Result of dispatching one event to its handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Handlers that returned normally.
    pub invoked: usize,
    /// Handlers that panicked and were contained.
    pub panicked: usize,
}

/// Type-keyed handler storage shared by publishers and workers.
#[derive(Default)]
pub struct Registry {
    handlers: RwLock<HashMap<EventCategory, HandlerSet>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to `categories`, or to its parameter type when
    /// `categories` is empty.
    ///
    /// Every category is validated before the registry is touched, so a
    /// failing call leaves no partial registration behind. Registering the
    /// same handler twice for a category keeps a single entry.
    ///
    /// Returns the categories the handler is now subscribed to.
    pub fn register(
        &self,
        handler: &Handler,
        categories: &[EventCategory],
    ) -> Result<Vec<EventCategory>> {
        let parameter = handler
            .parameter()
            .ok_or_else(|| BusError::InvalidSignature {
                handler: handler.name().to_string(),
                arity: handler.arity(),
            })?;

        let resolved = if categories.is_empty() {
            vec![parameter]
        } else {
            categories
                .iter()
                .map(|category| {
                    if handler.accepts(*category) {
                        Ok(*category)
                    } else {
                        Err(BusError::IncompatibleType {
                            parameter: parameter.name().to_string(),
                            category: category.name().to_string(),
                        })
                    }
                })
                .collect::<Result<Vec<_>>>()?
        };

        let mut handlers = self.handlers.write();
        for category in &resolved {
            let Some(invoke) = handler.invoker(*category) else {
                continue;
            };
            let set = handlers.entry(*category).or_default();
            if set.contains_key(&handler.id()) {
                tracing::debug!(
                    handler = %handler.id(),
                    category = %category,
                    "Handler already registered"
                );
                continue;
            }
            set.insert(
                handler.id(),
                Subscriber {
                    name: handler.name().to_string(),
                    invoke,
                },
            );
            tracing::debug!(
                handler = %handler.id(),
                name = handler.name(),
                category = %category,
                "Handler registered"
            );
        }

        Ok(resolved)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<EventCategory, HandlerSet>> {
        self.handlers.read_recursive()
    }

    /// Whether at least one handler is registered for `category`.
    pub fn contains(&self, category: EventCategory) -> bool {
        self.read().contains_key(&category)
    }

    /// Snapshot of the handler identities registered for `category`.
    ///
    /// Empty when the category is unknown.
    pub fn handlers(&self, category: EventCategory) -> Vec<HandlerId> {
        self.read()
            .get(&category)
            .map(|set| set.keys().copied().collect())
            .unwrap_or_default()
    }

    /// All categories with at least one handler.
    pub fn categories(&self) -> Vec<EventCategory> {
        self.read().keys().copied().collect()
    }

    /// Number of registered categories.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no category has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Invoke every handler registered for the envelope's category.
    ///
    /// The shared lock is held until the last handler returns.
    pub(crate) fn dispatch(&self, envelope: &Envelope, policy: PanicPolicy) -> DispatchOutcome {
        let handlers = self.read();
        let mut outcome = DispatchOutcome::default();

        let Some(set) = handlers.get(&envelope.category) else {
            tracing::warn!(category = %envelope.category, "No handlers for queued event");
            return outcome;
        };

        let payload: &(dyn Any + Send + Sync) = envelope.payload.as_ref();
        for (id, subscriber) in set {
            match policy {
                PanicPolicy::Propagate => (subscriber.invoke)(payload),
                PanicPolicy::Contain => {
                    let result =
                        panic::catch_unwind(AssertUnwindSafe(|| (subscriber.invoke)(payload)));
                    if let Err(panic) = result {
                        tracing::error!(
                            handler = %id,
                            name = %subscriber.name,
                            category = %envelope.category,
                            "Handler panicked: {}",
                            panic_message(panic.as_ref())
                        );
                        outcome.panicked += 1;
                        continue;
                    }
                }
            }
            outcome.invoked += 1;
        }

        outcome
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("categories", &self.categories())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
