//! The cicd-lambda stack: construction and validation.
//!
//! [`Stack::build`] turns [`StackSettings`] into every resource record the
//! deployment needs. Construction never fails; structural invariants are
//! checked separately by [`Stack::validate`] so that hand-modified stacks are
//! held to the same rules.
//!
//! ## Function-scope mismatch
//!
//! The build identity's function-update grant targets the fixed function
//! [`FUNCTION_UPDATE_TARGET`]. The build script, however, is told which
//! function to update through `LAMBDA_FUNC_NAME`, which comes from the
//! environment. The two are configured independently and can diverge;
//! [`Stack::function_scope_mismatch`] reports when they do. The grant is
//! deliberately left as declared.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::graph::DependencyGraph;
use crate::pipeline::{ActionKind, Pipeline, PipelineAction, Stage};
use crate::policy::{PolicyGrant, RolePolicy, ServiceRole};
use crate::resources::{
    ArtifactStore, BuildEnvironment, BuildImage, BuildProject, BuildSpec, ComputeType,
    EnvironmentVariable, ImageRepository, Resource, ResourceKind, SourceRepository, SourceTrigger,
};
use crate::retention::{self, LifecycleRule};
use crate::settings::{ExternalSetting, StackSettings, FUNCTION_NAME_KEY};
use crate::{
    ActionName, ArtifactName, FunctionName, LogicalId, PseudoParameter, RemovalPolicy,
    ServicePrincipal, StackError, StageName, Value,
};

// ---------------------------------------------------------------------------
// Fixed values
// ---------------------------------------------------------------------------

/// Build script resolved relative to the source artifact root.
pub const BUILD_SPEC_FILENAME: &str = "buildspec.yml";

/// Tag the build script pushes.
pub const IMAGE_TAG: &str = "latest";

/// Function the build identity may update. Independent of `LAMBDA_FUNC_NAME`.
pub const FUNCTION_UPDATE_TARGET: &str = "lambda-container-sample";

/// Number of images the registry keeps.
pub const RETAINED_IMAGE_COUNT: u32 = 2;

/// Number of grants on the build identity.
pub const BUILD_GRANT_COUNT: usize = 3;

/// Read/write access to the pipeline artifact bucket.
const ARTIFACT_BUCKET_ACTIONS: [&str; 6] = [
    "s3:GetObject*",
    "s3:GetBucket*",
    "s3:List*",
    "s3:DeleteObject*",
    "s3:PutObject",
    "s3:Abort*",
];

pub const SOURCE_STAGE: &str = "Source";
pub const BUILD_STAGE: &str = "Build";
pub const SOURCE_ARTIFACT: &str = "source_artifact";
pub const BUILD_ARTIFACT: &str = "build_output";

/// Names of the variables exposed to the build script, in declaration order.
pub mod variables {
    pub const REGION: &str = "AWS_DEFAULT_REGION";
    pub const ACCOUNT_ID: &str = "AWS_ACCOUNT_ID";
    pub const IMAGE_REPO_NAME: &str = "IMAGE_REPO_NAME";
    pub const IMAGE_TAG: &str = "IMAGE_TAG";
    pub const FUNCTION_NAME: &str = super::FUNCTION_NAME_KEY;
}

/// Logical ids of the stack's resources.
pub mod logical_ids {
    pub const CODE_REPOSITORY: &str = "CodeRepository";
    pub const ECR_REPOSITORY: &str = "EcrRepository";
    pub const BUILD_ROLE: &str = "BuildProjectRole";
    pub const BUILD_POLICY: &str = "BuildProjectRoleDefaultPolicy";
    pub const BUILD_SUPPORT_POLICY: &str = "BuildProjectRoleSupportPolicy";
    pub const BUILD_PROJECT: &str = "BuildProject";
    pub const ARTIFACTS_BUCKET: &str = "CodePipelineArtifactsBucket";
    pub const PIPELINE_ROLE: &str = "CodePipelineRole";
    pub const PIPELINE_POLICY: &str = "CodePipelineRoleDefaultPolicy";
    pub const PIPELINE: &str = "CodePipeline";
    pub const TRIGGER_ROLE: &str = "CodePipelineEventsRole";
    pub const TRIGGER_POLICY: &str = "CodePipelineEventsRoleDefaultPolicy";
    pub const TRIGGER: &str = "CodeRepositoryPipelineTrigger";
}

// ---------------------------------------------------------------------------
// Stack
// ---------------------------------------------------------------------------

/// Every resource of one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    pub settings: StackSettings,
    pub source_repository: SourceRepository,
    pub image_repository: ImageRepository,
    /// Execution identity of the build.
    pub build_role: ServiceRole,
    /// The grants the build needs to push images and update the function.
    pub build_policy: RolePolicy,
    /// Artifact bucket and log access the build needs to run as a pipeline
    /// stage. Not part of [`Stack::build_grants`].
    pub build_support_policy: RolePolicy,
    pub build_project: BuildProject,
    pub artifact_store: ArtifactStore,
    pub pipeline_role: ServiceRole,
    pub pipeline_policy: RolePolicy,
    pub pipeline: Pipeline,
    pub trigger_role: ServiceRole,
    pub trigger_policy: RolePolicy,
    pub trigger: SourceTrigger,
}

/// The function-update grant and the build's function name disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionScopeMismatch {
    /// What `LAMBDA_FUNC_NAME` resolved from.
    pub configured: ExternalSetting,
    /// Function the grant actually covers.
    pub granted: FunctionName,
}

impl std::fmt::Display for FunctionScopeMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.configured {
            ExternalSetting::Unset => write!(
                f,
                "{FUNCTION_NAME_KEY} is unset (build sees \"\") but the update grant covers '{}'",
                self.granted
            ),
            ExternalSetting::Set(name) => write!(
                f,
                "{FUNCTION_NAME_KEY} is '{name}' but the update grant covers '{}'",
                self.granted
            ),
        }
    }
}

fn id(value: &str) -> LogicalId {
    LogicalId::known(value)
}

fn principal(value: &str) -> ServicePrincipal {
    ServicePrincipal::known(value)
}

/// `arn:<partition>:<service>:<region>:<account>:<resource>`.
fn arn(service: &str, region: &Value, account: &Value, resource: Value) -> Value {
    Value::join([
        Value::literal("arn:"),
        Value::Pseudo(PseudoParameter::Partition),
        Value::literal(format!(":{service}:")),
        region.clone(),
        Value::literal(":"),
        account.clone(),
        Value::literal(":"),
        resource,
    ])
}

impl Stack {
    /// Builds every resource from `settings`.
    #[instrument(
        skip_all,
        fields(prefix = %settings.resource_prefix, branch = %settings.source_branch)
    )]
    pub fn build(settings: &StackSettings) -> Self {
        let prefix = &settings.resource_prefix;

        let region = settings
            .region
            .as_ref()
            .map(|r| Value::literal(r.as_str()))
            .unwrap_or(Value::Pseudo(PseudoParameter::Region));
        let account = settings
            .account
            .as_ref()
            .map(|a| Value::literal(a.as_str()))
            .unwrap_or(Value::Pseudo(PseudoParameter::AccountId));

        let source_repository = SourceRepository {
            logical_id: id(logical_ids::CODE_REPOSITORY),
            name: prefix.derive("code-repository"),
        };

        let image_repository = ImageRepository {
            logical_id: id(logical_ids::ECR_REPOSITORY),
            name: prefix.derive("ecr-repository"),
            scan_on_push: false,
            lifecycle_rules: vec![LifecycleRule::keep_newest(
                1,
                RETAINED_IMAGE_COUNT,
                "Delete old image",
            )],
            removal_policy: RemovalPolicy::Destroy,
        };

        let artifact_store = ArtifactStore {
            logical_id: id(logical_ids::ARTIFACTS_BUCKET),
            removal_policy: RemovalPolicy::Retain,
            block_public_access: true,
        };
        let bucket_arn = Value::arn_of(&artifact_store.logical_id);
        let bucket_objects = Value::join([bucket_arn.clone(), Value::literal("/*")]);

        // Build identity and its three grants.
        let build_role = ServiceRole {
            logical_id: id(logical_ids::BUILD_ROLE),
            principal: principal("codebuild.amazonaws.com"),
        };

        // Fixed target; LAMBDA_FUNC_NAME does not flow into the grant.
        let function_arn = Value::join([
            Value::literal("arn:aws:lambda:"),
            region.clone(),
            Value::literal(":"),
            account.clone(),
            Value::literal(format!(":function:{FUNCTION_UPDATE_TARGET}")),
        ]);

        let build_policy = RolePolicy {
            logical_id: id(logical_ids::BUILD_POLICY),
            policy_name: logical_ids::BUILD_POLICY.to_string(),
            role: build_role.logical_id.clone(),
            grants: vec![
                PolicyGrant::allow(
                    [
                        "ecr:CompleteLayerUpload",
                        "ecr:UploadLayerPart",
                        "ecr:InitiateLayerUpload",
                        "ecr:BatchCheckLayerAvailability",
                        "ecr:PutImage",
                        "ecr:SetRepositoryPolicy",
                        "ecr:GetRepositoryPolicy",
                    ],
                    vec![Value::arn_of(&image_repository.logical_id)],
                ),
                // Token issuance cannot be scoped to a repository.
                PolicyGrant::allow(["ecr:GetAuthorizationToken"], vec![Value::literal("*")]),
                PolicyGrant::allow(["lambda:UpdateFunctionCode"], vec![function_arn]),
            ],
        };

        let build_project_name = prefix.derive("code-build");
        let log_group = arn(
            "logs",
            &region,
            &account,
            Value::literal(format!("log-group:/aws/codebuild/{build_project_name}")),
        );
        let build_support_policy = RolePolicy {
            logical_id: id(logical_ids::BUILD_SUPPORT_POLICY),
            policy_name: logical_ids::BUILD_SUPPORT_POLICY.to_string(),
            role: build_role.logical_id.clone(),
            grants: vec![
                PolicyGrant::allow(
                    ARTIFACT_BUCKET_ACTIONS,
                    vec![bucket_arn.clone(), bucket_objects.clone()],
                ),
                PolicyGrant::allow(
                    ["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"],
                    vec![log_group.clone(), Value::join([log_group, Value::literal(":*")])],
                ),
            ],
        };

        let build_project = BuildProject {
            logical_id: id(logical_ids::BUILD_PROJECT),
            name: build_project_name,
            build_spec: BuildSpec::SourceFilename(BUILD_SPEC_FILENAME.to_string()),
            environment: BuildEnvironment {
                compute_type: ComputeType::Small,
                image: BuildImage::AmazonLinux2Standard5,
                privileged: false,
            },
            variables: vec![
                EnvironmentVariable::plaintext(variables::REGION, region.clone()),
                EnvironmentVariable::plaintext(variables::ACCOUNT_ID, account.clone()),
                EnvironmentVariable::plaintext(
                    variables::IMAGE_REPO_NAME,
                    Value::Ref(image_repository.logical_id.clone()),
                ),
                EnvironmentVariable::plaintext(variables::IMAGE_TAG, Value::literal(IMAGE_TAG)),
                EnvironmentVariable::plaintext(
                    variables::FUNCTION_NAME,
                    Value::literal(settings.function_name.resolve()),
                ),
            ],
            service_role: build_role.logical_id.clone(),
            depends_on: vec![build_support_policy.logical_id.clone()],
        };

        // Pipeline and its support resources.
        let pipeline_role = ServiceRole {
            logical_id: id(logical_ids::PIPELINE_ROLE),
            principal: principal("codepipeline.amazonaws.com"),
        };

        let pipeline_policy = RolePolicy {
            logical_id: id(logical_ids::PIPELINE_POLICY),
            policy_name: logical_ids::PIPELINE_POLICY.to_string(),
            role: pipeline_role.logical_id.clone(),
            grants: vec![
                PolicyGrant::allow(ARTIFACT_BUCKET_ACTIONS, vec![bucket_arn, bucket_objects]),
                PolicyGrant::allow(
                    [
                        "codecommit:GetBranch",
                        "codecommit:GetCommit",
                        "codecommit:UploadArchive",
                        "codecommit:GetUploadArchiveStatus",
                        "codecommit:CancelUploadArchive",
                    ],
                    vec![Value::arn_of(&source_repository.logical_id)],
                ),
                PolicyGrant::allow(
                    ["codebuild:BatchGetBuilds", "codebuild:StartBuild", "codebuild:StopBuild"],
                    vec![Value::arn_of(&build_project.logical_id)],
                ),
            ],
        };

        let source_output = ArtifactName::known(SOURCE_ARTIFACT);
        let build_output = ArtifactName::known(BUILD_ARTIFACT);

        let pipeline = Pipeline {
            logical_id: id(logical_ids::PIPELINE),
            name: prefix.derive("code-pipeline"),
            role: pipeline_role.logical_id.clone(),
            artifact_store: artifact_store.logical_id.clone(),
            stages: vec![
                Stage {
                    name: StageName::known(SOURCE_STAGE),
                    actions: vec![PipelineAction {
                        name: ActionName::known("CodeCommit"),
                        kind: ActionKind::SourceCheckout {
                            repository: source_repository.logical_id.clone(),
                            branch: settings.source_branch.clone(),
                            poll_for_changes: false,
                        },
                        inputs: Vec::new(),
                        outputs: vec![source_output.clone()],
                        run_order: 1,
                    }],
                },
                Stage {
                    name: StageName::known(BUILD_STAGE),
                    actions: vec![PipelineAction {
                        name: ActionName::known("CodeBuild"),
                        kind: ActionKind::Build {
                            project: build_project.logical_id.clone(),
                        },
                        inputs: vec![source_output],
                        outputs: vec![build_output],
                        run_order: 1,
                    }],
                },
            ],
            depends_on: vec![pipeline_policy.logical_id.clone()],
        };

        // Commits to the branch start the pipeline through an event rule.
        let trigger_role = ServiceRole {
            logical_id: id(logical_ids::TRIGGER_ROLE),
            principal: principal("events.amazonaws.com"),
        };

        let pipeline_arn = arn(
            "codepipeline",
            &region,
            &account,
            Value::Ref(pipeline.logical_id.clone()),
        );
        let trigger_policy = RolePolicy {
            logical_id: id(logical_ids::TRIGGER_POLICY),
            policy_name: logical_ids::TRIGGER_POLICY.to_string(),
            role: trigger_role.logical_id.clone(),
            grants: vec![PolicyGrant::allow(
                ["codepipeline:StartPipelineExecution"],
                vec![pipeline_arn.clone()],
            )],
        };

        let trigger = SourceTrigger {
            logical_id: id(logical_ids::TRIGGER),
            repository: source_repository.logical_id.clone(),
            branch: settings.source_branch.clone(),
            pipeline_arn,
            role: trigger_role.logical_id.clone(),
        };

        debug!(
            function_name_set = settings.function_name.is_set(),
            region_pinned = settings.region.is_some(),
            account_pinned = settings.account.is_some(),
            "Built stack resources"
        );

        Self {
            settings: settings.clone(),
            source_repository,
            image_repository,
            build_role,
            build_policy,
            build_support_policy,
            build_project,
            artifact_store,
            pipeline_role,
            pipeline_policy,
            pipeline,
            trigger_role,
            trigger_policy,
            trigger,
        }
    }

    /// Every resource, in declaration order.
    pub fn resources(&self) -> Vec<Resource<'_>> {
        vec![
            Resource::SourceRepository(&self.source_repository),
            Resource::ImageRepository(&self.image_repository),
            Resource::ServiceRole(&self.build_role),
            Resource::RolePolicy(&self.build_policy),
            Resource::RolePolicy(&self.build_support_policy),
            Resource::BuildProject(&self.build_project),
            Resource::ArtifactStore(&self.artifact_store),
            Resource::ServiceRole(&self.pipeline_role),
            Resource::RolePolicy(&self.pipeline_policy),
            Resource::Pipeline(&self.pipeline),
            Resource::ServiceRole(&self.trigger_role),
            Resource::RolePolicy(&self.trigger_policy),
            Resource::SourceTrigger(&self.trigger),
        ]
    }

    /// Number of resources of `kind`.
    pub fn count_of(&self, kind: ResourceKind) -> usize {
        self.resources().iter().filter(|r| r.kind() == kind).count()
    }

    /// Grants attached to the build's execution identity.
    pub fn build_grants(&self) -> &[PolicyGrant] {
        &self.build_policy.grants
    }

    /// Explicit dependency graph over every resource.
    pub fn dependency_graph(&self) -> Result<DependencyGraph, crate::GraphError> {
        DependencyGraph::from_resources(self.resources())
    }

    /// Reports when the function-update grant does not cover the function the
    /// build script is told to update.
    pub fn function_scope_mismatch(&self) -> Option<FunctionScopeMismatch> {
        let configured = &self.settings.function_name;
        if configured.resolve() == FUNCTION_UPDATE_TARGET {
            return None;
        }
        Some(FunctionScopeMismatch {
            configured: configured.clone(),
            granted: FunctionName::known(FUNCTION_UPDATE_TARGET),
        })
    }

    /// Checks every structural invariant of the stack.
    #[instrument(skip_all)]
    pub fn validate(&self) -> Result<(), StackError> {
        self.validate_names()?;
        retention::validate_rules(&self.image_repository.lifecycle_rules)?;
        self.validate_grants()?;
        self.validate_pipeline()?;
        self.dependency_graph()?.creation_order()?;
        debug!("Stack is valid");
        Ok(())
    }

    fn validate_names(&self) -> Result<(), StackError> {
        let mut seen = BTreeSet::new();
        for name in self.resources().iter().filter_map(|r| r.name()) {
            if !seen.insert(name) {
                return Err(StackError::DuplicateResourceName(name.clone()));
            }
        }
        Ok(())
    }

    fn validate_grants(&self) -> Result<(), StackError> {
        let found = self.build_grants().len();
        if found != BUILD_GRANT_COUNT {
            return Err(StackError::GrantCount {
                expected: BUILD_GRANT_COUNT,
                found,
            });
        }
        Ok(())
    }

    fn validate_pipeline(&self) -> Result<(), StackError> {
        let stages = &self.pipeline.stages;
        let names = self.pipeline.stage_names();
        if names != [SOURCE_STAGE, BUILD_STAGE] {
            return Err(StackError::StageOrder {
                expected: vec![SOURCE_STAGE.to_string(), BUILD_STAGE.to_string()],
                found: names.into_iter().map(str::to_string).collect(),
            });
        }

        for stage in stages {
            if stage.actions.len() != 1 {
                return Err(StackError::StageActionCount {
                    stage: stage.name.clone(),
                    count: stage.actions.len(),
                });
            }
        }

        let source = &stages[0].actions[0];
        let build = &stages[1].actions[0];

        let expect_target =
            |stage: &Stage, action: &PipelineAction, expected: &'static str, ok: bool| {
                if ok {
                    Ok(())
                } else {
                    Err(StackError::ActionTarget {
                        stage: stage.name.clone(),
                        expected,
                        target: action.kind.target().clone(),
                    })
                }
            };
        let checks_out_repository = matches!(
            &source.kind,
            ActionKind::SourceCheckout { repository, .. }
                if *repository == self.source_repository.logical_id
        );
        expect_target(&stages[0], source, "the source repository", checks_out_repository)?;
        let runs_project = matches!(
            &build.kind,
            ActionKind::Build { project } if *project == self.build_project.logical_id
        );
        expect_target(&stages[1], build, "the build project", runs_project)?;

        let mut produced = BTreeSet::new();
        for (_, action) in self.pipeline.actions() {
            for output in &action.outputs {
                if !produced.insert(output) {
                    return Err(StackError::DuplicateArtifact(output.clone()));
                }
            }
        }

        let expected = source
            .outputs
            .first()
            .cloned()
            .unwrap_or_else(|| ArtifactName::known(SOURCE_ARTIFACT));
        if source.outputs.len() != 1 || build.inputs != [expected.clone()] {
            return Err(StackError::ArtifactWiring {
                expected,
                found: build.inputs.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stack_is_valid() {
        let stack = Stack::build(&StackSettings::default());
        stack.validate().unwrap();
    }

    #[test]
    fn resource_names_share_the_prefix() {
        let stack = Stack::build(&StackSettings::default());
        assert_eq!(stack.source_repository.name.as_str(), "cicd-lambda-code-repository");
        assert_eq!(stack.image_repository.name.as_str(), "cicd-lambda-ecr-repository");
        assert_eq!(stack.build_project.name.as_str(), "cicd-lambda-code-build");
        assert_eq!(stack.pipeline.name.as_str(), "cicd-lambda-code-pipeline");
    }

    #[test]
    fn reordered_stages_are_rejected() {
        let mut stack = Stack::build(&StackSettings::default());
        stack.pipeline.stages.reverse();
        assert!(matches!(stack.validate(), Err(StackError::StageOrder { .. })));
    }

    #[test]
    fn extra_action_is_rejected() {
        let mut stack = Stack::build(&StackSettings::default());
        let extra = stack.pipeline.stages[1].actions[0].clone();
        stack.pipeline.stages[1].actions.push(extra);
        assert!(matches!(stack.validate(), Err(StackError::StageActionCount { count: 2, .. })));
    }

    #[test]
    fn miswired_build_input_is_rejected() {
        let mut stack = Stack::build(&StackSettings::default());
        stack.pipeline.stages[1].actions[0].inputs = vec![ArtifactName::new("other").unwrap()];
        assert!(matches!(stack.validate(), Err(StackError::ArtifactWiring { .. })));
    }

    #[test]
    fn fourth_grant_is_rejected() {
        let mut stack = Stack::build(&StackSettings::default());
        stack
            .build_policy
            .grants
            .push(PolicyGrant::allow(["s3:GetObject"], vec![Value::literal("*")]));
        assert_eq!(
            stack.validate(),
            Err(StackError::GrantCount { expected: 3, found: 4 })
        );
    }

    #[test]
    fn build_action_must_target_the_build_project() {
        let mut stack = Stack::build(&StackSettings::default());
        stack.pipeline.stages[1].actions[0].kind = ActionKind::Build {
            project: stack.source_repository.logical_id.clone(),
        };
        assert!(matches!(stack.validate(), Err(StackError::ActionTarget { .. })));
    }

    #[test]
    fn build_role_can_reach_artifacts_and_logs_outside_its_declared_grants() {
        let stack = Stack::build(&StackSettings::default());
        let support = &stack.build_support_policy;

        assert_eq!(support.role, stack.build_role.logical_id);
        assert_eq!(stack.build_grants().len(), BUILD_GRANT_COUNT);

        let s3 = support.grant_for("s3:GetObject*").unwrap();
        assert!(s3.grants("s3:PutObject"));
        assert!(s3.resources.contains(&Value::arn_of(&stack.artifact_store.logical_id)));
        let logs = support.grant_for("logs:PutLogEvents").unwrap();
        assert_eq!(
            logs.resources[0].to_string(),
            "arn:${AWS::Partition}:logs:${AWS::Region}:${AWS::AccountId}:\
             log-group:/aws/codebuild/cicd-lambda-code-build"
        );

        let graph = stack.dependency_graph().unwrap();
        assert!(graph.depends_on(&stack.build_project.logical_id, &support.logical_id));
    }

    #[test]
    fn matching_function_name_has_no_mismatch() {
        let settings = StackSettings::default()
            .with_function_name(ExternalSetting::Set(FUNCTION_UPDATE_TARGET.to_string()));
        assert!(Stack::build(&settings).function_scope_mismatch().is_none());
    }

    #[test]
    fn mismatch_message_names_both_sides() {
        let settings =
            StackSettings::default().with_function_name(ExternalSetting::Set("orders".into()));
        let mismatch = Stack::build(&settings).function_scope_mismatch().unwrap();
        assert_eq!(
            mismatch.to_string(),
            "LAMBDA_FUNC_NAME is 'orders' but the update grant covers 'lambda-container-sample'"
        );
    }
}
