//! Step trait, state labels and step outcomes.

use crate::error::Failure;
use crate::event::Event;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Type-safe state label wrapper.
///
/// A workflow maps each state label to the step that handles it. The
/// reserved labels are available as associated constants.
///
/// # Examples
///
/// ```
/// use meguri_core::StateName;
///
/// let name = StateName::new("validate");
/// assert_eq!(name.as_str(), "validate");
/// assert_eq!(StateName::START.as_str(), "STATE_START");
///
/// let name: StateName = "charge".into();
/// assert_eq!(name, "charge");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateName(Cow<'static, str>);

impl StateName {
    /// The state every run begins in. A workflow must handle it.
    pub const START: StateName = StateName(Cow::Borrowed("STATE_START"));
    /// Conventional stop state.
    pub const STOP: StateName = StateName(Cow::Borrowed("STATE_STOP"));
    /// State the run loop moves to when a step returns a failure.
    pub const ERROR: StateName = StateName(Cow::Borrowed("STATE_ERROR"));

    /// Creates a new StateName.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Returns the label as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the reserved start label.
    pub fn is_start(&self) -> bool {
        *self == Self::START
    }

    /// Returns `true` for the empty label, which an event never holds.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for StateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StateName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StateName {
    fn from(s: String) -> Self {
        Self(Cow::Owned(s))
    }
}

impl AsRef<str> for StateName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for StateName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for StateName {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for StateName {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Outcome of a successful step execution.
///
/// A failing step returns `Err(Failure)` instead; the run loop records it
/// on the event and moves to [`StateName::ERROR`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutput {
    /// Move the event to the given state.
    Continue(StateName),
    /// The step already updated the event's state itself.
    Handled,
}

impl StepOutput {
    /// Creates a Continue output to the next state.
    pub fn next(state: impl Into<StateName>) -> Self {
        Self::Continue(state.into())
    }

    /// Creates a Continue output to [`StateName::STOP`].
    pub fn stop() -> Self {
        Self::Continue(StateName::STOP)
    }
}

/// A workflow step bound to one state label.
///
/// # Examples
///
/// ```
/// use meguri_core::{Event, EventExt, Failure, Step, StepOutput};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct ReserveStock;
///
/// #[async_trait]
/// impl Step for ReserveStock {
///     async fn execute(&self, event: &mut dyn Event) -> Result<StepOutput, Failure> {
///         event.set_context("reserved", true);
///         Ok(StepOutput::next("charge"))
///     }
/// }
/// ```
#[async_trait]
pub trait Step: Send + Sync {
    /// Executes the step against the event.
    ///
    /// # Returns
    ///
    /// - `Ok(StepOutput::Continue(state))` - Move to the given state
    /// - `Ok(StepOutput::Handled)` - Keep whatever state the step set
    /// - `Err(failure)` - Record the failure and move to `STATE_ERROR`
    async fn execute(&self, event: &mut dyn Event) -> Result<StepOutput, Failure>;
}

/// Adapts a plain closure into a [`Step`].
///
/// The closure signals its outcome by mutating the event, so the step
/// always reports [`StepOutput::Handled`].
pub struct FnStep<F>(F);

impl<F> FnStep<F>
where
    F: Fn(&mut dyn Event) + Send + Sync,
{
    /// Wraps the closure.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> fmt::Debug for FnStep<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Step for FnStep<F>
where
    F: Fn(&mut dyn Event) + Send + Sync,
{
    async fn execute(&self, event: &mut dyn Event) -> Result<StepOutput, Failure> {
        (self.0)(event);
        Ok(StepOutput::Handled)
    }
}
