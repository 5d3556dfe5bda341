//! Graph-level error types.

use thiserror::Error;

use crate::model::StepId;

/// Consistency problems found by [`crate::validate_graph`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    /// Two steps share the same non-null label.
    #[error("duplicate step label: '{0}'")]
    DuplicateLabel(String),

    /// A connection references a step that doesn't exist.
    #[error("connection references unknown step {step_id} ({side} side)")]
    UnknownStepReference { step_id: StepId, side: &'static str },

    /// A step's `input_connections` disagree with the connection store.
    #[error("step {step_id} input '{input_name}' is out of sync with the connection store")]
    ConnectionMismatch { step_id: StepId, input_name: String },

    /// The selection refers to an element that doesn't exist.
    #[error("selection references unknown {kind} {id}")]
    UnknownSelection { kind: &'static str, id: u32 },

    /// Topological sort detected a cycle.
    #[error("workflow graph contains a cycle")]
    CycleDetected,
}
