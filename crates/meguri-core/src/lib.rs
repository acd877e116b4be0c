//! Core traits and types for the meguri workflow engine.
//!
//! This crate provides the abstractions without runtime dependencies.
//! Applications depend on it to define event types and steps.
//!
//! # Core Types
//!
//! - [`Event`] - Capability set a run drives through its states
//! - [`BaseEvent`] - Reusable state holder that event types compose
//! - [`Step`] - Work bound to one state label
//! - [`StepOutput`] - Result of a successful step
//! - [`StateName`] - State label, with the reserved `START`, `STOP` and `ERROR`
//! - [`Context`] - Heterogeneous per-run data
//! - [`ClassifiedError`] / [`Failure`] - What a step reports when it fails
//! - [`WorkflowError`] - Errors returned by construction and runs

mod context;
mod error;
mod event;
mod step;

pub use context::{Context, ContextKey};
pub use error::{ClassifiedError, Failure, WorkflowError, BAD_REQUEST_PAYLOAD};
pub use event::{AsAny, BaseEvent, Event, EventExt};
pub use step::{FnStep, StateName, Step, StepOutput};
