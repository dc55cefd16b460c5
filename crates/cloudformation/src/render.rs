//! Per-resource rendering into template entries.

use serde_json::{json, Value as Json};
use topology::{
    ActionKind, ArtifactStore, BuildProject, BuildSpec, ImageRepository, Pipeline, PolicyGrant,
    Resource, RolePolicy, ServiceRole, SourceRepository, SourceTrigger, SynthesisError,
};

use crate::intrinsic::{attribute, reference, render, render_one_or_many};
use crate::lifecycle;
use crate::template::TemplateResource;

/// IAM policy language version.
const POLICY_VERSION: &str = "2012-10-17";

/// Renders one stack resource.
pub fn resource(resource: Resource<'_>) -> Result<TemplateResource, SynthesisError> {
    let mut entry = match resource {
        Resource::SourceRepository(r) => source_repository(r),
        Resource::ImageRepository(r) => image_repository(r)?,
        Resource::BuildProject(r) => build_project(r),
        Resource::ServiceRole(r) => service_role(r),
        Resource::RolePolicy(r) => role_policy(r),
        Resource::ArtifactStore(r) => artifact_store(r),
        Resource::Pipeline(r) => pipeline(r),
        Resource::SourceTrigger(r) => source_trigger(r),
    };
    entry.depends_on = resource
        .explicit_dependencies()
        .iter()
        .map(|id| id.to_string())
        .collect();
    Ok(entry)
}

fn source_repository(repo: &SourceRepository) -> TemplateResource {
    TemplateResource::new(
        "AWS::CodeCommit::Repository",
        json!({ "RepositoryName": repo.name.as_str() }),
    )
}

fn image_repository(repo: &ImageRepository) -> Result<TemplateResource, SynthesisError> {
    let mut properties = json!({
        "RepositoryName": repo.name.as_str(),
        "ImageScanningConfiguration": { "ScanOnPush": repo.scan_on_push },
    });
    if !repo.lifecycle_rules.is_empty() {
        properties["LifecyclePolicy"] = json!({
            "LifecyclePolicyText": lifecycle::policy_text(&repo.lifecycle_rules)?,
        });
    }
    Ok(TemplateResource::new("AWS::ECR::Repository", properties)
        .with_removal_policy(repo.removal_policy))
}

fn build_project(project: &BuildProject) -> TemplateResource {
    let BuildSpec::SourceFilename(build_spec) = &project.build_spec;
    let variables: Vec<Json> = project
        .variables
        .iter()
        .map(|v| {
            json!({
                "Name": v.name,
                "Type": v.kind.as_str(),
                "Value": render(&v.value),
            })
        })
        .collect();

    TemplateResource::new(
        "AWS::CodeBuild::Project",
        json!({
            "Name": project.name.as_str(),
            "Artifacts": { "Type": "CODEPIPELINE" },
            "Source": { "Type": "CODEPIPELINE", "BuildSpec": build_spec },
            "Environment": {
                "ComputeType": project.environment.compute_type.as_str(),
                "Image": project.environment.image.image_id(),
                "ImagePullCredentialsType": "CODEBUILD",
                "PrivilegedMode": project.environment.privileged,
                "Type": project.environment.image.environment_type(),
                "EnvironmentVariables": variables,
            },
            "ServiceRole": attribute(&project.service_role, "Arn"),
        }),
    )
}

fn service_role(role: &ServiceRole) -> TemplateResource {
    TemplateResource::new(
        "AWS::IAM::Role",
        json!({
            "AssumeRolePolicyDocument": {
                "Statement": [{
                    "Action": "sts:AssumeRole",
                    "Effect": "Allow",
                    "Principal": { "Service": role.principal.as_str() },
                }],
                "Version": POLICY_VERSION,
            },
        }),
    )
}

fn statement(grant: &PolicyGrant) -> Json {
    let actions: Vec<&str> = grant.actions.iter().map(|a| a.as_str()).collect();
    let action = match actions.as_slice() {
        [single] => json!(single),
        many => json!(many),
    };
    json!({
        "Action": action,
        "Effect": grant.effect.as_str(),
        "Resource": render_one_or_many(&grant.resources),
    })
}

fn role_policy(policy: &RolePolicy) -> TemplateResource {
    TemplateResource::new(
        "AWS::IAM::Policy",
        json!({
            "PolicyDocument": {
                "Statement": policy.grants.iter().map(statement).collect::<Vec<_>>(),
                "Version": POLICY_VERSION,
            },
            "PolicyName": policy.policy_name,
            "Roles": [reference(&policy.role)],
        }),
    )
}

fn artifact_store(store: &ArtifactStore) -> TemplateResource {
    let properties = if store.block_public_access {
        json!({
            "PublicAccessBlockConfiguration": {
                "BlockPublicAcls": true,
                "BlockPublicPolicy": true,
                "IgnorePublicAcls": true,
                "RestrictPublicBuckets": true,
            },
        })
    } else {
        json!({})
    };
    TemplateResource::new("AWS::S3::Bucket", properties).with_removal_policy(store.removal_policy)
}

fn pipeline(pipeline: &Pipeline) -> TemplateResource {
    let artifacts = |names: &[topology::ArtifactName]| -> Vec<Json> {
        names.iter().map(|n| json!({ "Name": n.as_str() })).collect()
    };

    let stages: Vec<Json> = pipeline
        .stages
        .iter()
        .map(|stage| {
            let actions: Vec<Json> = stage
                .actions
                .iter()
                .map(|action| {
                    let configuration = match &action.kind {
                        ActionKind::SourceCheckout {
                            repository,
                            branch,
                            poll_for_changes,
                        } => json!({
                            "RepositoryName": attribute(repository, "Name"),
                            "BranchName": branch.as_str(),
                            "PollForSourceChanges": poll_for_changes,
                        }),
                        ActionKind::Build { project } => {
                            json!({ "ProjectName": reference(project) })
                        }
                    };

                    let mut rendered = json!({
                        "Name": action.name.as_str(),
                        "ActionTypeId": {
                            "Category": action.kind.category(),
                            "Owner": "AWS",
                            "Provider": action.kind.provider(),
                            "Version": "1",
                        },
                        "Configuration": configuration,
                        "RunOrder": action.run_order,
                    });
                    if !action.inputs.is_empty() {
                        rendered["InputArtifacts"] = json!(artifacts(&action.inputs));
                    }
                    if !action.outputs.is_empty() {
                        rendered["OutputArtifacts"] = json!(artifacts(&action.outputs));
                    }
                    rendered
                })
                .collect();
            json!({ "Name": stage.name.as_str(), "Actions": actions })
        })
        .collect();

    TemplateResource::new(
        "AWS::CodePipeline::Pipeline",
        json!({
            "Name": pipeline.name.as_str(),
            "RoleArn": attribute(&pipeline.role, "Arn"),
            "ArtifactStore": { "Type": "S3", "Location": reference(&pipeline.artifact_store) },
            "Stages": stages,
        }),
    )
}

fn source_trigger(trigger: &SourceTrigger) -> TemplateResource {
    TemplateResource::new(
        "AWS::Events::Rule",
        json!({
            "EventPattern": {
                "source": ["aws.codecommit"],
                "resources": [attribute(&trigger.repository, "Arn")],
                "detail-type": ["CodeCommit Repository State Change"],
                "detail": {
                    "event": ["referenceCreated", "referenceUpdated"],
                    "referenceName": [trigger.branch.as_str()],
                },
            },
            "State": "ENABLED",
            "Targets": [{
                "Arn": render(&trigger.pipeline_arn),
                "Id": "Target0",
                "RoleArn": attribute(&trigger.role, "Arn"),
            }],
        }),
    )
}
