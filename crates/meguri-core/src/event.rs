//! The event a workflow run drives through its states.
//!
//! Concrete event types compose a [`BaseEvent`] by value and implement
//! [`Event`], supplying the two required decisions: when the run stops and
//! which enrichment id to report. Every other operation is forwarded to the
//! base by the trait's provided methods.

use crate::context::{Context, ContextKey};
use crate::error::Failure;
use crate::step::StateName;
use std::any::Any;
use tracing::warn;

/// Reusable state holder for event types.
///
/// Carries the run name, the transaction id used to correlate log lines,
/// the current state label, the typed error slot and the open
/// [`Context`] map.
#[derive(Debug)]
pub struct BaseEvent {
    name: String,
    transaction_id: String,
    state: StateName,
    context: Context,
    error: Option<Failure>,
}

impl BaseEvent {
    /// Creates a base event positioned at [`StateName::START`].
    pub fn new(name: impl Into<String>, transaction_id: impl Into<String>) -> Self {
        Self::with_state(name, StateName::START, transaction_id)
    }

    /// Creates a base event positioned at the given state.
    ///
    /// An empty label falls back to [`StateName::START`].
    pub fn with_state(
        name: impl Into<String>,
        state: impl Into<StateName>,
        transaction_id: impl Into<String>,
    ) -> Self {
        let state = state.into();
        Self {
            name: name.into(),
            transaction_id: transaction_id.into(),
            state: if state.is_empty() {
                StateName::START
            } else {
                state
            },
            context: Context::new(),
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub fn state(&self) -> &StateName {
        &self.state
    }

    /// Moves to `state`. An empty label is ignored and the current state kept.
    pub fn set_state(&mut self, state: StateName) {
        if state.is_empty() {
            warn!(
                transaction_id = %self.transaction_id,
                state = %self.state,
                "Ignoring transition to an empty state label"
            );
            return;
        }
        self.state = state;
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn error(&self) -> Option<&Failure> {
        self.error.as_ref()
    }

    pub fn set_error(&mut self, failure: Failure) {
        self.error = Some(failure);
    }

    pub fn take_error(&mut self) -> Option<Failure> {
        self.error.take()
    }
}

/// Capability set the run loop needs from an event.
///
/// # Examples
///
/// ```
/// use meguri_core::{BaseEvent, Event, Failure, StateName};
///
/// struct OrderEvent {
///     base: BaseEvent,
///     order_id: String,
/// }
///
/// impl Event for OrderEvent {
///     fn base(&self) -> &BaseEvent {
///         &self.base
///     }
///
///     fn base_mut(&mut self) -> &mut BaseEvent {
///         &mut self.base
///     }
///
///     fn should_stop(&self) -> bool {
///         *self.state() == StateName::STOP
///     }
///
///     fn default_enrichment_id(&self) -> Result<String, Failure> {
///         Ok(self.order_id.clone())
///     }
/// }
///
/// let ev = OrderEvent {
///     base: BaseEvent::new("orders", "txn-42"),
///     order_id: "A-1".to_string(),
/// };
/// assert_eq!(ev.state(), &StateName::START);
/// assert_eq!(ev.transaction_id(), "txn-42");
/// assert!(!ev.should_stop());
/// ```
pub trait Event: AsAny + Send {
    /// Returns the composed base state.
    fn base(&self) -> &BaseEvent;

    /// Returns the composed base state mutably.
    fn base_mut(&mut self) -> &mut BaseEvent;

    /// Decides whether the run loop ends before dispatching the current state.
    fn should_stop(&self) -> bool;

    /// Identifier callers use to correlate enrichment data for this event.
    ///
    /// Not consulted by the run loop.
    fn default_enrichment_id(&self) -> Result<String, Failure>;

    fn name(&self) -> &str {
        self.base().name()
    }

    fn transaction_id(&self) -> &str {
        self.base().transaction_id()
    }

    fn state(&self) -> &StateName {
        self.base().state()
    }

    /// Requests a transition; the next loop iteration dispatches on it.
    fn set_state(&mut self, state: StateName) {
        self.base_mut().set_state(state);
    }

    /// The live context map.
    fn context(&self) -> &Context {
        self.base().context()
    }

    fn context_mut(&mut self) -> &mut Context {
        self.base_mut().context_mut()
    }

    /// The failure recorded for this run, read by the loop once the event stops.
    fn error(&self) -> Option<&Failure> {
        self.base().error()
    }

    fn set_error(&mut self, failure: Failure) {
        self.base_mut().set_error(failure);
    }

    fn take_error(&mut self) -> Option<Failure> {
        self.base_mut().take_error()
    }
}

/// Upcast to [`Any`], implemented for every `'static` type.
///
/// A supertrait of [`Event`] so steps holding `&mut dyn Event` can reach
/// the concrete event type through [`EventExt::downcast_ref`].
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Typed helpers available on every [`Event`], including `dyn Event`.
pub trait EventExt: Event {
    /// Stores a context value, replacing any previous value under the key.
    fn set_context<T: Any + Send + Sync>(&mut self, key: impl Into<ContextKey>, value: T) {
        self.context_mut().insert(key, value);
    }

    /// Reads a context value; `None` if absent or of another type.
    fn context_value<T: Any>(&self, key: &str) -> Option<&T> {
        self.context().get(key)
    }

    /// Returns the concrete event if it is a `T`.
    fn downcast_ref<T: Event>(&self) -> Option<&T> {
        AsAny::as_any(self).downcast_ref::<T>()
    }

    /// Returns the concrete event mutably if it is a `T`.
    fn downcast_mut<T: Event>(&mut self) -> Option<&mut T> {
        AsAny::as_any_mut(self).downcast_mut::<T>()
    }
}

impl<E: Event + ?Sized> EventExt for E {}
