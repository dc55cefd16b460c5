//! cicd-lambda CloudFormation adapter.
//!
//! Implements [`topology::TemplateSynthesizer`] by rendering a validated
//! [`topology::Stack`] into an AWS CloudFormation template. The template is
//! environment-agnostic unless the stack pins a region and account: unresolved
//! values are emitted as `AWS::Region` / `AWS::AccountId` pseudo-parameter
//! references and resolved by the engine at deploy time.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Template layout, intrinsic-function encoding, and the
//! registry's lifecycle policy format all live here. The [`topology`] crate
//! sees only [`topology::TemplateSynthesizer`].
//!
//! Applying, diffing and destroying the template is the deployment engine's
//! job; this crate only produces the document.

pub mod intrinsic;
pub mod lifecycle;
mod render;
pub mod template;

use std::collections::BTreeMap;

use tracing::{debug, info, instrument};

use topology::{Stack, SynthesisError, TemplateSynthesizer};

pub use template::{DeletionPolicy, Template, TemplateResource, FORMAT_VERSION};

/// Renders stacks as CloudFormation templates.
#[derive(Debug, Clone, Default)]
pub struct CloudFormationSynthesizer {
    description: Option<String>,
}

impl CloudFormationSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the template description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn description_for(&self, stack: &Stack) -> String {
        self.description.clone().unwrap_or_else(|| {
            format!(
                "{}: {} -> {} pipeline building images into {}",
                stack.settings.resource_prefix,
                stack.source_repository.name,
                stack.build_project.name,
                stack.image_repository.name,
            )
        })
    }
}

impl TemplateSynthesizer for CloudFormationSynthesizer {
    type Template = Template;

    #[instrument(skip_all, fields(prefix = %stack.settings.resource_prefix))]
    fn synthesize(&self, stack: &Stack) -> Result<Template, SynthesisError> {
        stack.validate()?;

        let mut resources = BTreeMap::new();
        for resource in stack.resources() {
            let logical_id = resource.logical_id().to_string();
            debug!(%logical_id, kind = %resource.kind(), "Rendering resource");
            resources.insert(logical_id, render::resource(resource)?);
        }

        info!(resources = resources.len(), "Synthesized CloudFormation template");

        Ok(Template {
            format_version: FORMAT_VERSION.to_string(),
            description: self.description_for(stack),
            resources,
        })
    }
}
