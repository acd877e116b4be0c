//! Workflow definition and run loop.

use meguri_core::{Event, FnStep, StateName, Step, StepOutput, WorkflowError};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};

/// An immutable mapping from state label to step, plus the loop that
/// drives an [`Event`] through it.
///
/// A workflow is never mutated after construction, so one instance can
/// serve many concurrent runs.
pub struct Workflow {
    steps: HashMap<StateName, Box<dyn Step>>,
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("states", &self.steps.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Workflow {
    /// Creates a workflow from a complete state-to-step mapping.
    ///
    /// Fails with [`WorkflowError::Configuration`] when no step is bound to
    /// [`StateName::START`].
    pub fn new(steps: HashMap<StateName, Box<dyn Step>>) -> Result<Self, WorkflowError> {
        if !steps.contains_key(&StateName::START) {
            return Err(WorkflowError::Configuration(format!(
                "Missing mandatory step for {}",
                StateName::START
            )));
        }
        Ok(Self { steps })
    }

    /// Creates a new workflow builder.
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::new()
    }

    /// Returns an iterator over all handled state labels.
    pub fn states(&self) -> impl Iterator<Item = &StateName> {
        self.steps.keys()
    }

    /// Returns `true` if a step is bound to the given state.
    pub fn has_state(&self, state: &str) -> bool {
        self.steps.contains_key(state)
    }

    /// Returns the number of bound steps.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Drives the event until it reports that it should stop.
    ///
    /// The stop check runs before every dispatch. Once stopped, the event's
    /// error slot decides the result: nothing recorded or a non-retriable
    /// [`ClassifiedError`](meguri_core::ClassifiedError) ends the run with
    /// `Ok(())`; any other failure is returned as
    /// [`WorkflowError::Failed`]. A live state with no bound step aborts
    /// the run with [`WorkflowError::NoHandler`].
    ///
    /// There is no loop protection: an event that never stops, visiting
    /// only handled states, never returns.
    pub async fn run(&self, event: &mut dyn Event) -> Result<(), WorkflowError> {
        let transaction_id = event.transaction_id().to_owned();
        let workflow = event.name().to_owned();

        loop {
            if event.should_stop() {
                return match event.error() {
                    None => {
                        info!(%transaction_id, %workflow, state = %event.state(), "Workflow completed");
                        Ok(())
                    }
                    Some(failure) if failure.is_terminal() => {
                        warn!(
                            %transaction_id,
                            %workflow,
                            state = %event.state(),
                            "Workflow ended on non-retriable error: {}",
                            failure
                        );
                        Ok(())
                    }
                    Some(failure) => {
                        warn!(
                            %transaction_id,
                            %workflow,
                            state = %event.state(),
                            "Workflow failed: {}",
                            failure
                        );
                        Err(WorkflowError::Failed {
                            state: event.state().clone(),
                            source: failure.clone(),
                        })
                    }
                };
            }

            let state = event.state().clone();
            let step = match self.steps.get(&state) {
                Some(step) => step,
                None => {
                    warn!(%transaction_id, %workflow, %state, "No handler found for state");
                    return Err(WorkflowError::NoHandler(state));
                }
            };

            debug!(
                %transaction_id,
                keys = ?event.context().keys().collect::<Vec<_>>(),
                "Current workflow context"
            );
            info!(%transaction_id, %workflow, %state, "Starting step");

            match step.execute(event).await {
                Ok(StepOutput::Continue(next)) => event.set_state(next),
                Ok(StepOutput::Handled) => {}
                Err(failure) => {
                    warn!(%transaction_id, %workflow, %state, "Step failed: {}", failure);
                    event.set_error(failure);
                    event.set_state(StateName::ERROR);
                }
            }

            info!(%transaction_id, %workflow, %state, next = %event.state(), "Ending step");
        }
    }
}

/// Builder for constructing [`Workflow`] instances.
#[derive(Default)]
pub struct WorkflowBuilder {
    steps: HashMap<StateName, Box<dyn Step>>,
}

impl WorkflowBuilder {
    /// Creates a new empty workflow builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a step to a state, replacing any step already bound to it.
    pub fn add_step<S: Step + 'static>(mut self, state: impl Into<StateName>, step: S) -> Self {
        self.steps.insert(state.into(), Box::new(step));
        self
    }

    /// Binds a closure to a state. The closure signals its outcome by
    /// mutating the event.
    pub fn add_fn<F>(self, state: impl Into<StateName>, f: F) -> Self
    where
        F: Fn(&mut dyn Event) + Send + Sync + 'static,
    {
        self.add_step(state, FnStep::new(f))
    }

    /// Builds the workflow.
    pub fn build(self) -> Result<Workflow, WorkflowError> {
        Workflow::new(self.steps)
    }
}
