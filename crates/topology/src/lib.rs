//! Stack domain for cicd-lambda.
//!
//! This crate describes a CI/CD topology for a container-image function: a
//! source repository, an image registry, a build project, a two-stage
//! pipeline, and the permission grants between them. It owns every domain
//! concept and invariant; adapter crates implement [`TemplateSynthesizer`] to
//! render a [`Stack`] for a concrete deployment engine.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies
//! apart from reading settings out of the process environment in
//! [`StackSettings::from_env`].
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`LogicalId`, `ResourceName`, etc.) |
//! | [`types`] | Property values, removal policy, timestamps |
//! | [`errors`] | Stack, graph, execution and synthesis errors |
//! | [`settings`] | Deployment-time settings and their defaults |
//! | [`resources`] | Managed resource records |
//! | [`policy`] | Execution identities and permission grants |
//! | [`pipeline`] | Stages, actions and artifacts |
//! | [`retention`] | Registry lifecycle rules |
//! | [`graph`] | Explicit dependency graph and creation order |
//! | [`execution`] | States of one pipeline run |
//! | [`stack`] | Stack construction and validation |
//! | [`synth`] | Template synthesizer port |

pub mod errors;
pub mod execution;
pub mod graph;
pub mod identifiers;
pub mod pipeline;
pub mod policy;
pub mod resources;
pub mod retention;
pub mod settings;
pub mod stack;
pub mod synth;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{ExecutionError, GraphError, StackError, SynthesisError};
pub use execution::{ExecutionEvent, ExecutionState, PipelineExecution, Transition};
pub use graph::{DependencyGraph, DependencyKind, GraphNode};
pub use identifiers::{
    AccountId, ActionName, ArtifactName, BranchName, ExecutionId, FunctionName, LogicalId,
    Permission, Region, ResourceName, ResourcePrefix, ServicePrincipal, StageName,
};
pub use pipeline::{ActionKind, Pipeline, PipelineAction, Stage};
pub use policy::{Effect, PolicyGrant, RolePolicy, ServiceRole};
pub use resources::{
    ArtifactStore, BuildEnvironment, BuildImage, BuildProject, BuildSpec, ComputeType,
    EnvironmentVariable, ImageRepository, Resource, ResourceKind, SourceRepository, SourceTrigger,
    VariableType,
};
pub use retention::{ImageRecord, LifecycleRule, RegistrySimulation, RetentionLimit, TagStatus};
pub use settings::{ExternalSetting, StackSettings};
pub use stack::{FunctionScopeMismatch, Stack};
pub use synth::TemplateSynthesizer;
pub use types::{PseudoParameter, RemovalPolicy, Timestamp, Value};
