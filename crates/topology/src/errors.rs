//! Error types for the stack domain.
//!
//! None of these are retryable: each describes a stack definition (or an
//! execution-model call) that is wrong as written. Platform failures at apply
//! time or at pipeline run time are reported by the platform and never
//! surface here.

use thiserror::Error;

use crate::{ArtifactName, LogicalId, ResourceName, StageName};

// ---------------------------------------------------------------------------
// Stack definition errors
// ---------------------------------------------------------------------------

/// A stack violates one of its structural invariants.
///
/// Produced by [`crate::Stack::validate`]. A stack that fails validation is
/// never handed to a synthesizer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    /// The pipeline's stages are not exactly `Source` followed by `Build`.
    #[error("Pipeline stages must be {expected:?}, found {found:?}")]
    StageOrder {
        /// Required stage names, in order.
        expected: Vec<String>,
        /// Stage names actually declared.
        found: Vec<String>,
    },

    /// A stage does not contain exactly one action.
    #[error("Stage '{stage}' must contain exactly one action, found {count}")]
    StageActionCount {
        /// Offending stage.
        stage: StageName,
        /// Number of actions declared.
        count: usize,
    },

    /// The build action does not consume the source action's output.
    #[error("Build input {found:?} does not match source output '{expected}'")]
    ArtifactWiring {
        /// Artifact produced by the source action.
        expected: ArtifactName,
        /// Artifacts consumed by the build action.
        found: Vec<ArtifactName>,
    },

    /// Two actions produce an artifact with the same name.
    #[error("Artifact '{0}' is produced more than once")]
    DuplicateArtifact(ArtifactName),

    /// An action targets a resource of the wrong kind.
    #[error("Action in stage '{stage}' must target {expected}, targets '{target}'")]
    ActionTarget {
        /// Stage holding the action.
        stage: StageName,
        /// Kind of resource the action requires.
        expected: &'static str,
        /// Resource the action actually targets.
        target: LogicalId,
    },

    /// The build identity does not carry exactly the declared grants.
    #[error("Build identity must carry {expected} policy grants, found {found}")]
    GrantCount {
        /// Required number of grants.
        expected: usize,
        /// Number of grants attached.
        found: usize,
    },

    /// A registry lifecycle rule set is malformed.
    #[error("Invalid lifecycle rule: {message}")]
    LifecycleRule {
        /// Description of the problem.
        message: String,
    },

    /// Two resources share a physical name.
    #[error("Resource name '{0}' is declared more than once")]
    DuplicateResourceName(ResourceName),

    /// The resource dependency graph is invalid.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

// ---------------------------------------------------------------------------
// Dependency graph errors
// ---------------------------------------------------------------------------

/// The resource dependency graph cannot be built or ordered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Two resources share a logical id.
    #[error("Logical id '{0}' is declared more than once")]
    DuplicateLogicalId(LogicalId),

    /// A resource refers to a logical id that does not exist in the stack.
    #[error("Resource '{from}' refers to unknown resource '{to}'")]
    UnknownReference {
        /// Referring resource.
        from: LogicalId,
        /// Missing target.
        to: LogicalId,
    },

    /// The references form a cycle, so no creation order exists.
    #[error("Dependency cycle detected at resource '{0}'")]
    Cycle(LogicalId),
}

// ---------------------------------------------------------------------------
// Execution model errors
// ---------------------------------------------------------------------------

/// An event was applied to a pipeline execution in a state that does not
/// accept it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The execution already reached a terminal state.
    #[error("Execution already finished in state {state}")]
    AlreadyFinished {
        /// Terminal state the execution is in.
        state: String,
    },

    /// The event is not valid from the current state.
    #[error("Event '{event}' is not valid in state {state}")]
    InvalidTransition {
        /// Current state.
        state: String,
        /// Rejected event.
        event: String,
    },
}

// ---------------------------------------------------------------------------
// Synthesis errors
// ---------------------------------------------------------------------------

/// A stack could not be rendered into a deployment template.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// The stack failed validation.
    #[error("Stack is invalid: {0}")]
    InvalidStack(#[from] StackError),

    /// The template (or an embedded document) could not be serialised.
    #[error("Template serialisation failed: {message}")]
    Serialization {
        /// Underlying serialiser message.
        message: String,
    },
}
