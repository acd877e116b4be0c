//! Registry of named workflows.

use crate::workflow::Workflow;
use meguri_core::{Event, WorkflowError};
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// A concurrency-safe registry mapping workflow names to [`Workflow`]s.
///
/// Build one with [`Engine::new`] at the application's composition root and
/// share it (for example behind an `Arc`). [`Engine::global`] provides a
/// lazily created process-wide instance for code that cannot thread one
/// through.
///
/// # Examples
///
/// ```
/// use meguri::prelude::*;
///
/// struct Ping {
///     base: BaseEvent,
/// }
///
/// impl Event for Ping {
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
///         Ok(self.transaction_id().to_string())
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let engine = Engine::new();
/// let workflow = Workflow::builder()
///     .add_fn(StateName::START, |ev| {
///         ev.set_context("pong", true);
///         ev.set_state(StateName::STOP);
///     })
///     .build()
///     .expect("valid workflow");
/// engine.add("ping", workflow);
///
/// let mut ev = Ping { base: BaseEvent::new("ping", "txn-1") };
/// engine.run("ping", &mut ev).await.expect("run succeeds");
/// assert_eq!(ev.context_value::<bool>("pong"), Some(&true));
/// # });
/// ```
#[derive(Debug, Default)]
pub struct Engine {
    workflows: Mutex<HashMap<String, Arc<Workflow>>>,
}

impl Engine {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry, creating it on first access.
    pub fn global() -> &'static Engine {
        static ENGINE: OnceLock<Engine> = OnceLock::new();
        ENGINE.get_or_init(Engine::new)
    }

    fn workflows(&self) -> MutexGuard<'_, HashMap<String, Arc<Workflow>>> {
        self.workflows.lock()
    }

    /// Registers a workflow under `name`, returning the one it replaces.
    pub fn add(
        &self,
        name: impl Into<String>,
        workflow: impl Into<Arc<Workflow>>,
    ) -> Option<Arc<Workflow>> {
        let name = name.into();
        debug!(workflow = %name, "Registering workflow");
        self.workflows().insert(name, workflow.into())
    }

    /// Returns the workflow registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<Workflow>> {
        self.workflows().get(name).cloned()
    }

    /// Returns `true` if a workflow is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.workflows().contains_key(name)
    }

    /// Returns the registered workflow names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.workflows().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of registered workflows.
    pub fn len(&self) -> usize {
        self.workflows().len()
    }

    /// Returns `true` if no workflow is registered.
    pub fn is_empty(&self) -> bool {
        self.workflows().is_empty()
    }

    /// Runs the workflow registered under `name` against the event.
    ///
    /// The lock is held only for the lookup. The workflow's result is
    /// returned unchanged.
    pub async fn run(&self, name: &str, event: &mut dyn Event) -> Result<(), WorkflowError> {
        let workflow = match self.get(name) {
            Some(workflow) => workflow,
            None => {
                warn!(
                    transaction_id = %event.transaction_id(),
                    workflow = %name,
                    "Workflow not found"
                );
                return Err(WorkflowError::NotFound(name.to_string()));
            }
        };
        workflow.run(event).await
    }
}
