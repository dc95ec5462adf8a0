//! Handler functions.
//!
//! A [`Handler`] wraps a user callable behind a type-erased invoker and gives
//! it a stable identity. The identity, not the logic, decides whether two
//! handlers are the same: clones of one `Handler` collapse to a single
//! registry entry, while two handlers built from the same function are
//! distinct.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::event::{Event, EventCategory};

/// Type-erased invocation of a handler with one event payload.
pub(crate) type Invoke = Arc<dyn Fn(&(dyn Any + Send + Sync)) + Send + Sync>;

/// Stable identity of a handler, shared by all of its clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(Uuid);

impl HandlerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({})", &self.0.to_string()[..8])
    }
}

/// Conversion of a callable into a [`Handler`].
///
/// The `Marker` parameter only disambiguates the arity; it is inferred from
/// the callable's signature.
pub trait IntoHandler<Marker>: Send + Sync + 'static {
    /// Categories of the declared parameters, in order.
    fn parameters() -> Vec<EventCategory>;

    /// Invoker for unary callables, `None` for every other arity.
    fn into_invoke(self) -> Option<Invoke>;
}

impl<F> IntoHandler<fn()> for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn parameters() -> Vec<EventCategory> {
        Vec::new()
    }

    fn into_invoke(self) -> Option<Invoke> {
        None
    }
}

impl<F, A> IntoHandler<fn(A)> for F
where
    F: Fn(A) + Send + Sync + 'static,
    A: Event + Clone,
{
    fn parameters() -> Vec<EventCategory> {
        vec![EventCategory::of::<A>()]
    }

    fn into_invoke(self) -> Option<Invoke> {
        let f = self;
        Some(Arc::new(move |payload: &(dyn Any + Send + Sync)| {
            match payload.downcast_ref::<A>() {
                Some(event) => f(event.clone()),
                None => tracing::warn!(
                    expected = type_name::<A>(),
                    "Handler received a payload of the wrong type"
                ),
            }
        }))
    }
}

impl<F, A, B> IntoHandler<fn(A, B)> for F
where
    F: Fn(A, B) + Send + Sync + 'static,
    A: Event,
    B: Event,
{
    fn parameters() -> Vec<EventCategory> {
        vec![EventCategory::of::<A>(), EventCategory::of::<B>()]
    }

    fn into_invoke(self) -> Option<Invoke> {
        None
    }
}

/// A subscribable callable with a stable identity.
#[derive(Clone)]
pub struct Handler {
    id: HandlerId,
    name: String,
    parameters: Vec<EventCategory>,
    /// Invokers keyed by every category this handler can be assigned from.
    accepted: HashMap<EventCategory, Invoke>,
}

impl Handler {
    /// Wrap a callable. Its declared parameter becomes the default category.
    pub fn new<M, F>(f: F) -> Self
    where
        F: IntoHandler<M>,
    {
        let parameters = F::parameters();
        let mut accepted = HashMap::new();
        if let (Some(invoke), [parameter]) = (f.into_invoke(), parameters.as_slice()) {
            accepted.insert(*parameter, invoke);
        }

        Self {
            id: HandlerId::new(),
            name: type_name::<F>().to_string(),
            parameters,
            accepted,
        }
    }

    /// Override the diagnostic name used in logs and errors.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Declare that events of category `C` can be delivered to this handler
    /// by converting them into its parameter type `P`.
    ///
    /// Has no effect when `P` is not the handler's parameter; registering
    /// such a handler for `C` then fails with an incompatible type error.
    pub fn accepting<C, P>(mut self) -> Self
    where
        C: Event + Clone,
        P: Event + From<C>,
    {
        let target = EventCategory::of::<P>();
        let Some(invoke) = self.accepted.get(&target).cloned() else {
            tracing::warn!(
                handler = %self.name,
                parameter = %target,
                "Conversion target is not the handler parameter, ignoring"
            );
            return self;
        };

        let convert: Invoke = Arc::new(move |payload: &(dyn Any + Send + Sync)| {
            if let Some(source) = payload.downcast_ref::<C>() {
                let converted = P::from(source.clone());
                let converted: &(dyn Any + Send + Sync) = &converted;
                invoke(converted);
            }
        });
        self.accepted.insert(EventCategory::of::<C>(), convert);
        self
    }

    /// Identity of this handler.
    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of declared parameters.
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// The single declared parameter, if the handler is unary.
    pub fn parameter(&self) -> Option<EventCategory> {
        match self.parameters.as_slice() {
            [parameter] => Some(*parameter),
            _ => None,
        }
    }

    /// Whether events of `category` can be assigned to this handler.
    pub fn accepts(&self, category: EventCategory) -> bool {
        self.accepted.contains_key(&category)
    }

    pub(crate) fn invoker(&self, category: EventCategory) -> Option<Invoke> {
        self.accepted.get(&category).cloned()
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("accepted", &self.accepted.keys().collect::<Vec<_>>())
            .finish()
    }
}
