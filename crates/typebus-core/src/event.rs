//! Event categories.
//!
//! Every publishable value maps to an [`EventCategory`] derived from its
//! concrete type. The registry keys on the category, so routing never needs
//! to inspect the value itself.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Marker trait for values that can be published on the bus.
///
/// Implemented for every `Send + Sync + 'static` type.
pub trait Event: Any + Send + Sync + 'static {}

impl<T: Any + Send + Sync + 'static> Event for T {}

/// Dispatch key identifying the concrete type of an event.
///
/// Two categories are equal iff they were built from the same type; the
/// name is carried for diagnostics only.
#[derive(Clone, Copy)]
pub struct EventCategory {
    id: TypeId,
    name: &'static str,
}

impl EventCategory {
    /// Category of the event type `E`.
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: type_name::<E>(),
        }
    }

    /// Category of the given value.
    pub fn of_val<E: Event>(_event: &E) -> Self {
        Self::of::<E>()
    }

    /// Fully qualified type name of the category.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Underlying type identifier.
    pub fn type_id(&self) -> TypeId {
        self.id
    }
}

impl PartialEq for EventCategory {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventCategory {}

impl Hash for EventCategory {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventCategory({})", self.name)
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Type-erased event payload shared between the queue and the handlers.
pub(crate) type Payload = Arc<dyn Any + Send + Sync>;

/// An event waiting in the queue, tagged with its category.
#[derive(Clone)]
pub(crate) struct Envelope {
    pub(crate) category: EventCategory,
    pub(crate) payload: Payload,
}

impl Envelope {
    pub(crate) fn new<E: Event>(event: E) -> Self {
        Self {
            category: EventCategory::of::<E>(),
            payload: Arc::new(event),
        }
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}
