//! Properties every cicd-lambda stack must satisfy.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use topology::stack::{logical_ids, variables, FUNCTION_UPDATE_TARGET, IMAGE_TAG};
use topology::{
    ExternalSetting, RegistrySimulation, ResourceKind, Stack, StackSettings, Timestamp, Value,
};

fn function_update_scope(stack: &Stack) -> &Value {
    let grant = stack
        .build_policy
        .grant_for("lambda:UpdateFunctionCode")
        .expect("function update grant");
    assert_eq!(grant.resources.len(), 1);
    &grant.resources[0]
}

fn variable<'a>(stack: &'a Stack, name: &str) -> &'a Value {
    &stack.build_project.variable(name).expect("variable declared").value
}

#[test]
fn declares_exactly_one_of_each_managed_resource() {
    let stack = Stack::build(&StackSettings::default());
    assert_eq!(stack.count_of(ResourceKind::SourceRepository), 1);
    assert_eq!(stack.count_of(ResourceKind::ImageRepository), 1);
    assert_eq!(stack.count_of(ResourceKind::BuildProject), 1);
    assert_eq!(stack.count_of(ResourceKind::Pipeline), 1);
    assert_eq!(stack.build_grants().len(), 3);
}

#[test]
fn grants_are_scoped_as_declared() {
    let stack = Stack::build(&StackSettings::default());
    let grants = stack.build_grants();

    assert!(grants[0].grants("ecr:PutImage"));
    assert!(grants[0].grants("ecr:GetRepositoryPolicy"));
    assert_eq!(grants[0].actions.len(), 7);
    assert_eq!(
        grants[0].resources,
        vec![Value::arn_of(&stack.image_repository.logical_id)]
    );

    assert!(grants[1].grants("ecr:GetAuthorizationToken"));
    assert!(grants[1].is_unscoped());

    assert!(grants[2].grants("lambda:UpdateFunctionCode"));
    assert!(!grants[2].is_unscoped());
}

#[test]
fn pipeline_is_source_then_build_with_chained_artifacts() {
    let stack = Stack::build(&StackSettings::default());
    assert_eq!(stack.pipeline.stage_names(), vec!["Source", "Build"]);

    let source = &stack.pipeline.stages[0].actions[0];
    let build = &stack.pipeline.stages[1].actions[0];
    assert_eq!(build.inputs, source.outputs);
    assert_eq!(build.outputs.len(), 1);
    assert_ne!(build.outputs, source.outputs);
}

#[test]
fn build_variables_are_declared_in_order() {
    let stack = Stack::build(&StackSettings::default());
    let names: Vec<&str> = stack
        .build_project
        .variables
        .iter()
        .map(|v| v.name.as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "AWS_DEFAULT_REGION",
            "AWS_ACCOUNT_ID",
            "IMAGE_REPO_NAME",
            "IMAGE_TAG",
            "LAMBDA_FUNC_NAME"
        ]
    );
}

#[test]
fn creation_order_respects_references() {
    let stack = Stack::build(&StackSettings::default());
    let graph = stack.dependency_graph().unwrap();
    let order: Vec<&str> = graph
        .creation_order()
        .unwrap()
        .iter()
        .map(|n| n.logical_id.as_str())
        .collect();
    let position = |id: &str| order.iter().position(|o| *o == id).unwrap();

    assert_eq!(graph.node_count(), stack.resources().len());
    assert_eq!(order.len(), graph.node_count());
    assert!(position(logical_ids::ECR_REPOSITORY) < position(logical_ids::BUILD_POLICY));
    assert!(position(logical_ids::BUILD_SUPPORT_POLICY) < position(logical_ids::BUILD_PROJECT));
    assert!(position(logical_ids::ECR_REPOSITORY) < position(logical_ids::BUILD_PROJECT));
    assert!(position(logical_ids::BUILD_ROLE) < position(logical_ids::BUILD_PROJECT));
    assert!(position(logical_ids::BUILD_PROJECT) < position(logical_ids::PIPELINE));
    assert!(position(logical_ids::CODE_REPOSITORY) < position(logical_ids::PIPELINE));
    assert!(position(logical_ids::PIPELINE_POLICY) < position(logical_ids::PIPELINE));
    assert!(position(logical_ids::PIPELINE) < position(logical_ids::TRIGGER));

    let teardown: Vec<&str> = graph
        .teardown_order()
        .unwrap()
        .iter()
        .map(|n| n.logical_id.as_str())
        .collect();
    let mut reversed = order.clone();
    reversed.reverse();
    assert_eq!(teardown, reversed);
}

#[test]
fn unset_settings_expose_the_function_scope_mismatch() {
    let stack = Stack::build(&StackSettings::from_lookup(|_| None));

    assert_eq!(variable(&stack, variables::FUNCTION_NAME), &Value::literal(""));
    let scope = function_update_scope(&stack).to_string();
    assert_eq!(
        scope,
        "arn:aws:lambda:${AWS::Region}:${AWS::AccountId}:function:lambda-container-sample"
    );

    let mismatch = stack.function_scope_mismatch().expect("mismatch reported");
    assert_eq!(mismatch.configured, ExternalSetting::Unset);
    assert_eq!(mismatch.granted.as_str(), FUNCTION_UPDATE_TARGET);
}

#[test]
fn pinned_region_and_account_become_literals() {
    let stack = Stack::build(&StackSettings::from_lookup(|key| match key {
        "CDK_DEFAULT_REGION" => Some("eu-west-1".to_string()),
        "CDK_DEFAULT_ACCOUNT" => Some("123456789012".to_string()),
        _ => None,
    }));
    assert_eq!(variable(&stack, variables::REGION), &Value::literal("eu-west-1"));
    assert_eq!(variable(&stack, variables::ACCOUNT_ID), &Value::literal("123456789012"));
    assert_eq!(
        function_update_scope(&stack),
        &Value::literal("arn:aws:lambda:eu-west-1:123456789012:function:lambda-container-sample")
    );
}

fn hour(n: i64) -> Timestamp {
    Timestamp::from_utc(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(n))
}

proptest! {
    #[test]
    fn function_name_resolves_exactly(name in ".*") {
        let settings = StackSettings::from_lookup(|key| {
            (key == "LAMBDA_FUNC_NAME").then(|| name.clone())
        });
        let stack = Stack::build(&settings);
        prop_assert_eq!(variable(&stack, variables::FUNCTION_NAME), &Value::literal(name.clone()));
    }

    #[test]
    fn image_tag_and_grant_scope_ignore_the_function_name(
        name in proptest::option::of("[a-z0-9-]{0,24}"),
    ) {
        let settings = StackSettings::default()
            .with_function_name(ExternalSetting::from_option(name));
        let stack = Stack::build(&settings);

        prop_assert_eq!(variable(&stack, variables::IMAGE_TAG), &Value::literal(IMAGE_TAG));
        let scope = function_update_scope(&stack).to_string();
        prop_assert!(scope.ends_with(":function:lambda-container-sample"));
    }

    #[test]
    fn registry_never_retains_more_than_two_images(
        pushes in proptest::collection::vec(
            proptest::option::of(prop_oneof![Just("latest".to_string()), "[a-z]{1,8}"]),
            3..40,
        )
    ) {
        let stack = Stack::build(&StackSettings::default());
        let mut registry = RegistrySimulation::new(stack.image_repository.lifecycle_rules.clone());

        for (i, tag) in pushes.iter().enumerate() {
            let tags = tag.iter().cloned().collect();
            registry.push(format!("sha256:{i:04}"), tags, hour(i as i64));
            prop_assert!(registry.images().len() <= 2);
        }

        let retained: Vec<String> = registry.images().iter().map(|i| i.digest.clone()).collect();
        let n = pushes.len();
        prop_assert_eq!(
            retained,
            vec![format!("sha256:{:04}", n - 2), format!("sha256:{:04}", n - 1)]
        );
    }
}
