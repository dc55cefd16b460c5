//! Registry lifecycle policy document.
//!
//! The registry takes its lifecycle rules as a JSON document embedded as a
//! string property (`LifecyclePolicyText`).

use serde::Serialize;
use topology::{LifecycleRule, RetentionLimit, SynthesisError, TagStatus};

#[derive(Debug, Serialize)]
struct PolicyDocument<'a> {
    rules: Vec<RuleDocument<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RuleDocument<'a> {
    rule_priority: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    selection: Selection<'a>,
    action: Action,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Selection<'a> {
    tag_status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag_prefix_list: Option<&'a [String]>,
    count_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    count_unit: Option<&'static str>,
    count_number: u32,
}

#[derive(Debug, Serialize)]
struct Action {
    #[serde(rename = "type")]
    kind: &'static str,
}

fn rule_document(rule: &LifecycleRule) -> RuleDocument<'_> {
    let (tag_status, tag_prefix_list) = match &rule.tag_status {
        TagStatus::Any => ("any", None),
        TagStatus::Untagged => ("untagged", None),
        TagStatus::Tagged { prefixes } => ("tagged", Some(prefixes.as_slice())),
    };
    let (count_type, count_unit, count_number) = match rule.limit {
        RetentionLimit::MaxImageCount(n) => ("imageCountMoreThan", None, n),
        RetentionLimit::MaxImageAgeDays(d) => ("sinceImagePushed", Some("days"), d),
    };

    RuleDocument {
        rule_priority: rule.priority,
        description: rule.description.as_deref(),
        selection: Selection {
            tag_status,
            tag_prefix_list,
            count_type,
            count_unit,
            count_number,
        },
        action: Action { kind: "expire" },
    }
}

/// Serialises `rules` into the registry's lifecycle policy text.
///
/// Rules are emitted in ascending priority.
pub fn policy_text(rules: &[LifecycleRule]) -> Result<String, SynthesisError> {
    let mut ordered: Vec<&LifecycleRule> = rules.iter().collect();
    ordered.sort_by_key(|r| r.priority);

    let document = PolicyDocument {
        rules: ordered.into_iter().map(rule_document).collect(),
    };
    serde_json::to_string(&document).map_err(|e| SynthesisError::Serialization {
        message: e.to_string(),
    })
}
