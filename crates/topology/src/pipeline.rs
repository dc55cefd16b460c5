//! Pipeline definition: stages, actions, and the artifacts flowing between
//! them.
//!
//! The pipeline only describes wiring. Running it is the platform's job;
//! [`crate::execution`] models the observable states of one run.

use serde::{Deserialize, Serialize};

use crate::{ActionName, ArtifactName, BranchName, LogicalId, ResourceName, StageName};

/// What an action does and which resource it drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ActionKind {
    /// Checks out `branch` of a source repository into the action's output
    /// artifact.
    SourceCheckout {
        repository: LogicalId,
        branch: BranchName,
        /// Whether the platform polls for changes instead of being notified
        /// by an event rule.
        poll_for_changes: bool,
    },
    /// Runs a build project over the action's input artifact.
    Build { project: LogicalId },
}

impl ActionKind {
    /// Platform action category.
    pub fn category(&self) -> &'static str {
        match self {
            Self::SourceCheckout { .. } => "Source",
            Self::Build { .. } => "Build",
        }
    }

    /// Platform action provider.
    pub fn provider(&self) -> &'static str {
        match self {
            Self::SourceCheckout { .. } => "CodeCommit",
            Self::Build { .. } => "CodeBuild",
        }
    }

    /// The resource this action drives.
    pub fn target(&self) -> &LogicalId {
        match self {
            Self::SourceCheckout { repository, .. } => repository,
            Self::Build { project } => project,
        }
    }
}

// ---------------------------------------------------------------------------

/// One unit of work inside a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineAction {
    pub name: ActionName,
    pub kind: ActionKind,
    pub inputs: Vec<ArtifactName>,
    pub outputs: Vec<ArtifactName>,
    /// Position within the stage; actions sharing a run order run together.
    pub run_order: u32,
}

/// A named, ordered group of actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: StageName,
    pub actions: Vec<PipelineAction>,
}

/// The pipeline resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub logical_id: LogicalId,
    pub name: ResourceName,
    /// Service role the pipeline runs under.
    pub role: LogicalId,
    /// Bucket holding artifacts between stages.
    pub artifact_store: LogicalId,
    /// Stages in execution order.
    pub stages: Vec<Stage>,
    /// Resources that must exist before the pipeline even though no property
    /// refers to them (the role's policy).
    pub depends_on: Vec<LogicalId>,
}

impl Pipeline {
    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Every action across all stages, in execution order.
    pub fn actions(&self) -> impl Iterator<Item = (&Stage, &PipelineAction)> {
        self.stages
            .iter()
            .flat_map(|stage| stage.actions.iter().map(move |action| (stage, action)))
    }
}
