//! CloudFormation template document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use topology::SynthesisError;

/// Template format version understood by the deployment engine.
pub const FORMAT_VERSION: &str = "2010-09-09";

/// What the engine does with a resource on stack deletion or replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPolicy {
    Delete,
    Retain,
}

impl From<topology::RemovalPolicy> for DeletionPolicy {
    fn from(policy: topology::RemovalPolicy) -> Self {
        match policy {
            topology::RemovalPolicy::Destroy => Self::Delete,
            topology::RemovalPolicy::Retain => Self::Retain,
        }
    }
}

/// One entry of the template's `Resources` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateResource {
    /// Resource type, e.g. `AWS::ECR::Repository`.
    #[serde(rename = "Type")]
    pub resource_type: String,

    pub properties: serde_json::Value,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<DeletionPolicy>,
}

impl TemplateResource {
    pub(crate) fn new(resource_type: &str, properties: serde_json::Value) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            properties,
            depends_on: Vec::new(),
            deletion_policy: None,
            update_replace_policy: None,
        }
    }

    /// Applies `policy` to both deletion and replacement.
    pub(crate) fn with_removal_policy(mut self, policy: topology::RemovalPolicy) -> Self {
        let policy = DeletionPolicy::from(policy);
        self.deletion_policy = Some(policy);
        self.update_replace_policy = Some(policy);
        self
    }
}

/// A complete template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,

    pub description: String,

    /// Resources keyed by logical id.
    pub resources: BTreeMap<String, TemplateResource>,
}

impl Template {
    /// Returns the resource with logical id `logical_id`.
    pub fn resource(&self, logical_id: &str) -> Option<&TemplateResource> {
        self.resources.get(logical_id)
    }

    /// Returns every resource of `resource_type`, keyed by logical id.
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a TemplateResource)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
            .map(|(id, r)| (id.as_str(), r))
    }

    /// Serialises the template as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, SynthesisError> {
        serde_json::to_string_pretty(self).map_err(|e| SynthesisError::Serialization {
            message: e.to_string(),
        })
    }

    /// Serialises the template as compact JSON.
    pub fn to_json(&self) -> Result<String, SynthesisError> {
        serde_json::to_string(self).map_err(|e| SynthesisError::Serialization {
            message: e.to_string(),
        })
    }
}
