//! Managed resource records.
//!
//! Each record is plain configuration. [`Resource`] is a borrowed view over
//! any record in a stack, giving uniform access to its logical id, kind and
//! the other resources it refers to.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::pipeline::Pipeline;
use crate::policy::{RolePolicy, ServiceRole};
use crate::retention::LifecycleRule;
use crate::{BranchName, LogicalId, RemovalPolicy, ResourceName, Value};

// ---------------------------------------------------------------------------
// Source repository
// ---------------------------------------------------------------------------

/// Version-controlled source store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRepository {
    pub logical_id: LogicalId,
    pub name: ResourceName,
}

// ---------------------------------------------------------------------------
// Image repository
// ---------------------------------------------------------------------------

/// Container image registry receiving the build's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRepository {
    pub logical_id: LogicalId,
    pub name: ResourceName,
    /// Whether pushed images are scanned for vulnerabilities.
    pub scan_on_push: bool,
    pub lifecycle_rules: Vec<LifecycleRule>,
    pub removal_policy: RemovalPolicy,
}

// ---------------------------------------------------------------------------
// Build project
// ---------------------------------------------------------------------------

/// Where the build steps come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildSpec {
    /// A file at this path relative to the source artifact root.
    SourceFilename(String),
}

/// Compute tier of the build container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeType {
    Small,
}

impl ComputeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Small => "BUILD_GENERAL1_SMALL",
        }
    }
}

/// Image the build container runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildImage {
    /// Amazon Linux 2, x86_64, standard image 5.0.
    AmazonLinux2Standard5,
}

impl BuildImage {
    pub fn image_id(self) -> &'static str {
        match self {
            Self::AmazonLinux2Standard5 => "aws/codebuild/amazonlinux2-x86_64-standard:5.0",
        }
    }

    /// Platform environment type for the image.
    pub fn environment_type(self) -> &'static str {
        match self {
            Self::AmazonLinux2Standard5 => "LINUX_CONTAINER",
        }
    }
}

/// Container settings for a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEnvironment {
    pub compute_type: ComputeType,
    pub image: BuildImage,
    /// Whether the container may run a Docker daemon.
    pub privileged: bool,
}

/// How a build environment variable's value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    Plaintext,
}

impl VariableType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plaintext => "PLAINTEXT",
        }
    }
}

/// A variable exposed to the build script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: Value,
    pub kind: VariableType,
}

impl EnvironmentVariable {
    pub fn plaintext(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            kind: VariableType::Plaintext,
        }
    }
}

/// Build task fed by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildProject {
    pub logical_id: LogicalId,
    pub name: ResourceName,
    pub build_spec: BuildSpec,
    pub environment: BuildEnvironment,
    /// Variables in declaration order.
    pub variables: Vec<EnvironmentVariable>,
    /// Execution identity of the build.
    pub service_role: LogicalId,
    /// Resources that must exist before the project although no property
    /// refers to them (the role's support policy).
    pub depends_on: Vec<LogicalId>,
}

impl BuildProject {
    /// Returns the variable called `name`.
    pub fn variable(&self, name: &str) -> Option<&EnvironmentVariable> {
        self.variables.iter().find(|v| v.name == name)
    }
}

// ---------------------------------------------------------------------------
// Pipeline support
// ---------------------------------------------------------------------------

/// Bucket holding the artifacts passed between pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactStore {
    pub logical_id: LogicalId,
    pub removal_policy: RemovalPolicy,
    pub block_public_access: bool,
}

/// Event rule starting the pipeline when the source branch changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTrigger {
    pub logical_id: LogicalId,
    /// Repository whose reference changes are watched.
    pub repository: LogicalId,
    pub branch: BranchName,
    /// ARN of the pipeline started by the rule.
    pub pipeline_arn: Value,
    /// Role the event service assumes to start the pipeline.
    pub role: LogicalId,
}

// ---------------------------------------------------------------------------
// Uniform view
// ---------------------------------------------------------------------------

/// The kind of a stack resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    SourceRepository,
    ImageRepository,
    BuildProject,
    ServiceRole,
    RolePolicy,
    ArtifactStore,
    Pipeline,
    SourceTrigger,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SourceRepository => "source repository",
            Self::ImageRepository => "image repository",
            Self::BuildProject => "build project",
            Self::ServiceRole => "service role",
            Self::RolePolicy => "role policy",
            Self::ArtifactStore => "artifact store",
            Self::Pipeline => "pipeline",
            Self::SourceTrigger => "source trigger",
        };
        f.write_str(name)
    }
}

/// Borrowed view of one resource in a stack.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    SourceRepository(&'a SourceRepository),
    ImageRepository(&'a ImageRepository),
    BuildProject(&'a BuildProject),
    ServiceRole(&'a ServiceRole),
    RolePolicy(&'a RolePolicy),
    ArtifactStore(&'a ArtifactStore),
    Pipeline(&'a Pipeline),
    SourceTrigger(&'a SourceTrigger),
}

impl<'a> Resource<'a> {
    pub fn logical_id(&self) -> &'a LogicalId {
        match *self {
            Self::SourceRepository(r) => &r.logical_id,
            Self::ImageRepository(r) => &r.logical_id,
            Self::BuildProject(r) => &r.logical_id,
            Self::ServiceRole(r) => &r.logical_id,
            Self::RolePolicy(r) => &r.logical_id,
            Self::ArtifactStore(r) => &r.logical_id,
            Self::Pipeline(r) => &r.logical_id,
            Self::SourceTrigger(r) => &r.logical_id,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match *self {
            Self::SourceRepository(_) => ResourceKind::SourceRepository,
            Self::ImageRepository(_) => ResourceKind::ImageRepository,
            Self::BuildProject(_) => ResourceKind::BuildProject,
            Self::ServiceRole(_) => ResourceKind::ServiceRole,
            Self::RolePolicy(_) => ResourceKind::RolePolicy,
            Self::ArtifactStore(_) => ResourceKind::ArtifactStore,
            Self::Pipeline(_) => ResourceKind::Pipeline,
            Self::SourceTrigger(_) => ResourceKind::SourceTrigger,
        }
    }

    /// Physical name, for resources that carry one.
    pub fn name(&self) -> Option<&'a ResourceName> {
        match *self {
            Self::SourceRepository(r) => Some(&r.name),
            Self::ImageRepository(r) => Some(&r.name),
            Self::BuildProject(r) => Some(&r.name),
            Self::Pipeline(r) => Some(&r.name),
            _ => None,
        }
    }

    /// Resources this one refers to through its properties.
    pub fn references(&self) -> BTreeSet<LogicalId> {
        let mut out = BTreeSet::new();
        match *self {
            Self::SourceRepository(_)
            | Self::ImageRepository(_)
            | Self::ServiceRole(_)
            | Self::ArtifactStore(_) => {}
            Self::BuildProject(p) => {
                out.insert(p.service_role.clone());
                for variable in &p.variables {
                    out.extend(variable.value.references());
                }
            }
            Self::RolePolicy(p) => {
                out.insert(p.role.clone());
                for grant in &p.grants {
                    for resource in &grant.resources {
                        out.extend(resource.references());
                    }
                }
            }
            Self::Pipeline(p) => {
                out.insert(p.role.clone());
                out.insert(p.artifact_store.clone());
                for (_, action) in p.actions() {
                    out.insert(action.kind.target().clone());
                }
            }
            Self::SourceTrigger(t) => {
                out.insert(t.repository.clone());
                out.insert(t.role.clone());
                out.extend(t.pipeline_arn.references());
            }
        }
        out
    }

    /// Resources that must exist first although no property refers to them.
    pub fn explicit_dependencies(&self) -> &'a [LogicalId] {
        match *self {
            Self::BuildProject(p) => &p.depends_on,
            Self::Pipeline(p) => &p.depends_on,
            _ => &[],
        }
    }
}
