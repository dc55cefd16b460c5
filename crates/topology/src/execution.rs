//! Observable states of one pipeline execution.
//!
//! The platform runs the pipeline; this module only models what a run can
//! look like so that callers (and tests) can reason about it:
//!
//! ```text
//! Pending
//!   --start-->   SourceRunning
//!   --succeed--> SourceSucceeded   (SourceRunning --fail--> SourceFailed)
//!   --start-->   BuildRunning
//!   --succeed--> BuildSucceeded    (BuildRunning --fail--> BuildFailed)
//! ```
//!
//! `SourceFailed`, `BuildFailed` and `BuildSucceeded` are terminal. There is
//! no retry edge.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{ExecutionError, ExecutionId, ResourceName, Timestamp};

/// State of a pipeline execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Pending,
    SourceRunning,
    SourceSucceeded,
    SourceFailed,
    BuildRunning,
    BuildSucceeded,
    BuildFailed,
}

impl ExecutionState {
    /// Returns `true` if no further event is accepted.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::SourceFailed | Self::BuildFailed | Self::BuildSucceeded)
    }

    /// The stage this state belongs to, if any.
    pub fn stage(self) -> Option<&'static str> {
        match self {
            Self::Pending => None,
            Self::SourceRunning | Self::SourceSucceeded | Self::SourceFailed => Some("Source"),
            Self::BuildRunning | Self::BuildSucceeded | Self::BuildFailed => Some("Build"),
        }
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Something the platform reports about the current stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum ExecutionEvent {
    /// The next stage started.
    Start,
    /// The running stage succeeded.
    Succeed,
    /// The running stage failed.
    Fail { reason: String },
}

impl ExecutionEvent {
    fn label(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Succeed => "succeed",
            Self::Fail { .. } => "fail",
        }
    }
}

/// One recorded state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: ExecutionState,
    pub to: ExecutionState,
    pub at: Timestamp,
}

/// One run of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineExecution {
    id: ExecutionId,
    pipeline: ResourceName,
    state: ExecutionState,
    history: Vec<Transition>,
    failure: Option<String>,
}

impl PipelineExecution {
    /// A new execution of `pipeline` in [`ExecutionState::Pending`].
    pub fn new(pipeline: ResourceName) -> Self {
        Self {
            id: ExecutionId::new_random(),
            pipeline,
            state: ExecutionState::Pending,
            history: Vec::new(),
            failure: None,
        }
    }

    pub fn id(&self) -> ExecutionId {
        self.id
    }

    pub fn pipeline(&self) -> &ResourceName {
        &self.pipeline
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    /// Reason reported by the failed stage, if the execution failed.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Applies `event` at the current time.
    pub fn apply(&mut self, event: ExecutionEvent) -> Result<ExecutionState, ExecutionError> {
        self.apply_at(event, Timestamp::now())
    }

    /// Applies `event`, recording the transition at `at`.
    pub fn apply_at(
        &mut self,
        event: ExecutionEvent,
        at: Timestamp,
    ) -> Result<ExecutionState, ExecutionError> {
        use ExecutionState as S;

        if self.state.is_terminal() {
            return Err(ExecutionError::AlreadyFinished {
                state: self.state.to_string(),
            });
        }

        let next = match (self.state, &event) {
            (S::Pending, ExecutionEvent::Start) => S::SourceRunning,
            (S::SourceRunning, ExecutionEvent::Succeed) => S::SourceSucceeded,
            (S::SourceRunning, ExecutionEvent::Fail { .. }) => S::SourceFailed,
            (S::SourceSucceeded, ExecutionEvent::Start) => S::BuildRunning,
            (S::BuildRunning, ExecutionEvent::Succeed) => S::BuildSucceeded,
            (S::BuildRunning, ExecutionEvent::Fail { .. }) => S::BuildFailed,
            (state, event) => {
                return Err(ExecutionError::InvalidTransition {
                    state: state.to_string(),
                    event: event.label().to_string(),
                });
            }
        };

        self.history.push(Transition {
            from: self.state,
            to: next,
            at,
        });
        self.state = next;

        if let ExecutionEvent::Fail { reason } = event {
            warn!(
                execution = %self.id,
                pipeline = %self.pipeline,
                state = %next,
                %reason,
                "Pipeline stage failed"
            );
            self.failure = Some(reason);
        } else {
            info!(
                execution = %self.id,
                pipeline = %self.pipeline,
                state = %next,
                "Pipeline execution advanced"
            );
        }

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn execution() -> PipelineExecution {
        PipelineExecution::new(ResourceName::new("cicd-lambda-code-pipeline").unwrap())
    }

    #[test]
    fn happy_path_reaches_build_succeeded() {
        let mut run = execution();
        for event in [
            ExecutionEvent::Start,
            ExecutionEvent::Succeed,
            ExecutionEvent::Start,
            ExecutionEvent::Succeed,
        ] {
            run.apply(event).unwrap();
        }
        assert_eq!(run.state(), ExecutionState::BuildSucceeded);
        assert!(run.is_terminal());
        let states: Vec<ExecutionState> = run.history().iter().map(|t| t.to).collect();
        assert_eq!(
            states,
            vec![
                ExecutionState::SourceRunning,
                ExecutionState::SourceSucceeded,
                ExecutionState::BuildRunning,
                ExecutionState::BuildSucceeded,
            ]
        );
    }

    #[test]
    fn source_failure_is_terminal() {
        let mut run = execution();
        run.apply(ExecutionEvent::Start).unwrap();
        run.apply(ExecutionEvent::Fail { reason: "branch not found".into() }).unwrap();
        assert_eq!(run.state(), ExecutionState::SourceFailed);
        assert_eq!(run.failure(), Some("branch not found"));
        assert!(matches!(
            run.apply(ExecutionEvent::Start),
            Err(ExecutionError::AlreadyFinished { .. })
        ));
    }

    #[test]
    fn build_failure_is_terminal() {
        let mut run = execution();
        run.apply(ExecutionEvent::Start).unwrap();
        run.apply(ExecutionEvent::Succeed).unwrap();
        run.apply(ExecutionEvent::Start).unwrap();
        run.apply(ExecutionEvent::Fail { reason: "buildspec error".into() }).unwrap();
        assert_eq!(run.state(), ExecutionState::BuildFailed);
        assert_eq!(run.state().stage(), Some("Build"));
    }

    #[test]
    fn stages_never_overlap() {
        let mut run = execution();
        assert!(matches!(
            run.apply(ExecutionEvent::Succeed),
            Err(ExecutionError::InvalidTransition { .. })
        ));
        run.apply(ExecutionEvent::Start).unwrap();
        // Build cannot start while Source is still running.
        assert!(run.apply(ExecutionEvent::Start).is_err());
        assert_eq!(run.state(), ExecutionState::SourceRunning);
        assert_eq!(run.history().len(), 1);
    }
}
