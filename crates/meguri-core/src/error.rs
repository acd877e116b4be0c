//! Error types: classified step failures and workflow errors.

use crate::step::StateName;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Code for a failure caused by a malformed request payload.
pub const BAD_REQUEST_PAYLOAD: &str = "BAD_REQUEST";

/// A failure classified by the step that detected it.
///
/// `retriable` decides how the run loop reports it once the event stops:
/// a non-retriable error ends the run without an error, a retriable one is
/// returned to the caller.
///
/// # Examples
///
/// ```
/// use meguri_core::{ClassifiedError, BAD_REQUEST_PAYLOAD};
///
/// let error = ClassifiedError::new(BAD_REQUEST_PAYLOAD, "missing order id", false);
/// assert_eq!(error.to_string(), "BAD_REQUEST: missing order id");
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ClassifiedError {
    /// Symbolic code such as `BAD_REQUEST`.
    pub code: String,
    /// Human-readable description.
    pub message: String,
    /// Whether the caller may retry the run.
    pub retriable: bool,
}

impl ClassifiedError {
    /// Creates a new classified error.
    pub fn new(code: impl Into<String>, message: impl Into<String>, retriable: bool) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retriable,
        }
    }

    /// Creates a non-retriable [`BAD_REQUEST_PAYLOAD`] error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(BAD_REQUEST_PAYLOAD, message, false)
    }
}

/// The value held in an event's reserved error slot.
#[derive(Error, Debug, Clone)]
pub enum Failure {
    /// A failure carrying a code and a retriable flag.
    #[error("{0}")]
    Classified(ClassifiedError),
    /// Any other error. Always reported to the caller.
    #[error("{0}")]
    Other(Arc<dyn std::error::Error + Send + Sync>),
}

impl Failure {
    /// Wraps an arbitrary error.
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Arc::new(error))
    }

    /// Creates an unclassified failure from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        let boxed: Box<dyn std::error::Error + Send + Sync> = message.into();
        Self::Other(Arc::from(boxed))
    }

    /// Returns the classified error, if this is one.
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            Failure::Classified(e) => Some(e),
            Failure::Other(_) => None,
        }
    }

    /// Returns `true` when the run should end quietly: a classified,
    /// non-retriable failure.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Failure::Classified(e) if !e.retriable)
    }
}

impl From<ClassifiedError> for Failure {
    fn from(error: ClassifiedError) -> Self {
        Failure::Classified(error)
    }
}

/// Errors returned by workflow construction and execution.
///
/// # Non-Exhaustive
///
/// New variants may be added; include a wildcard arm when matching.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WorkflowError {
    /// The workflow definition is invalid.
    #[error("Invalid workflow configuration: {0}")]
    Configuration(String),

    /// The event reached a live state that has no bound step.
    #[error("No handler found for state: {0}")]
    NoHandler(StateName),

    /// No workflow is registered under the given name.
    #[error("Workflow not found: {0}")]
    NotFound(String),

    /// The event stopped carrying a retriable or unclassified failure.
    #[error("Error in workflow at state {state}: {source}")]
    Failed {
        /// State the event stopped in.
        state: StateName,
        /// The failure read from the event.
        source: Failure,
    },
}
