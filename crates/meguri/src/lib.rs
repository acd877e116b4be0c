//! # Meguri (巡り)
//!
//! A lightweight, in-process state-machine workflow engine.
//!
//! A [`Workflow`] binds a [`Step`] to each state label. Running it drives an
//! [`Event`] from `STATE_START` through whatever states the steps choose,
//! until the event's own [`Event::should_stop`] says the run is over. An
//! [`Engine`] keeps workflows by name so applications can run them on
//! demand from many tasks at once.
//!
//! # Example
//!
//! ```rust
//! use meguri::prelude::*;
//!
//! struct Command {
//!     base: BaseEvent,
//! }
//!
//! impl Event for Command {
//!     fn base(&self) -> &BaseEvent {
//!         &self.base
//!     }
//!
//!     fn base_mut(&mut self) -> &mut BaseEvent {
//!         &mut self.base
//!     }
//!
//!     fn should_stop(&self) -> bool {
//!         *self.state() == "state2" || *self.state() == StateName::STOP
//!     }
//!
//!     fn default_enrichment_id(&self) -> Result<String, Failure> {
//!         Ok("SomeID".to_string())
//!     }
//! }
//!
//! fn trace(ev: &mut dyn Event) {
//!     let mut out = ev.context_value::<String>("output").cloned().unwrap_or_default();
//!     out.push_str(ev.state().as_str());
//!     out.push('+');
//!     ev.set_context("output", out);
//! }
//!
//! # tokio_test::block_on(async {
//! let workflow = Workflow::builder()
//!     .add_fn(StateName::START, |ev| {
//!         trace(ev);
//!         ev.set_state(StateName::new("state1"));
//!     })
//!     .add_fn("state1", |ev| {
//!         trace(ev);
//!         ev.set_state(StateName::new("state2"));
//!     })
//!     .build()
//!     .expect("valid workflow");
//!
//! let engine = Engine::new();
//! engine.add("command", workflow);
//!
//! let mut ev = Command { base: BaseEvent::new("command", "txn-1") };
//! engine.run("command", &mut ev).await.expect("workflow failed");
//!
//! assert_eq!(
//!     ev.context_value::<String>("output").map(String::as_str),
//!     Some("STATE_START+state1+")
//! );
//! # });
//! ```
//!
//! ## Failures
//!
//! A step reports failure by returning `Err(Failure)` (or by recording one
//! with [`Event::set_error`]). When the event stops, a non-retriable
//! [`ClassifiedError`] ends the run with `Ok(())`; retriable and
//! unclassified failures come back as [`WorkflowError::Failed`].
//!
//! ```rust
//! use meguri::prelude::*;
//!
//! fn report(result: Result<(), WorkflowError>) {
//!     match result {
//!         Ok(()) => {}
//!         Err(WorkflowError::Failed { state, source }) => {
//!             eprintln!("run stopped in {} with {}", state, source);
//!         }
//!         Err(WorkflowError::NoHandler(state)) => {
//!             eprintln!("no step bound to {}", state);
//!         }
//!         Err(other) => eprintln!("Error: {}", other),
//!     }
//! }
//! ```

mod engine;
mod workflow;

// Re-export core types
pub use meguri_core::*;

pub use engine::Engine;
pub use workflow::{Workflow, WorkflowBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        AsAny, BaseEvent, ClassifiedError, Context, ContextKey, Engine, Event, EventExt, Failure,
        FnStep, StateName, Step, StepOutput, Workflow, WorkflowBuilder, WorkflowError,
        BAD_REQUEST_PAYLOAD,
    };
}
