//! Newtype domain identifiers.
//!
//! Every name that identifies something in the stack is represented as a
//! distinct newtype wrapping a `String`. This prevents accidentally
//! interchanging, for example, a [`LogicalId`] (template-local key) with a
//! [`ResourceName`] (the physical name the platform sees) even though both are
//! strings under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Wraps a value the caller already knows to be non-empty
            /// (crate constants and names derived from validated prefixes).
            #[allow(dead_code)]
            pub(crate) fn known(value: impl Into<String>) -> Self {
                let v = value.into();
                debug_assert!(!v.is_empty(), concat!(stringify!($name), " must not be empty"));
                Self(v)
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Template identifiers
// ---------------------------------------------------------------------------

string_id! {
    /// Template-local key of a resource (e.g. `"EcrRepository"`).
    ///
    /// Unique within one stack. Other resources refer to a resource through
    /// its logical id; the deployment engine derives creation order from
    /// those references.
    LogicalId
}

string_id! {
    /// Physical name of a managed resource as the platform sees it
    /// (e.g. `"cicd-lambda-ecr-repository"`).
    ResourceName
}

string_id! {
    /// Shared prefix from which every [`ResourceName`] in the stack is derived.
    ResourcePrefix
}

impl ResourcePrefix {
    /// Derives `<prefix>-<suffix>`.
    pub fn derive(&self, suffix: &str) -> ResourceName {
        ResourceName::known(format!("{}-{}", self.0, suffix))
    }
}

// ---------------------------------------------------------------------------
// Source control and pipeline identifiers
// ---------------------------------------------------------------------------

string_id! {
    /// A Git branch name (e.g. `"main"`).
    BranchName
}

string_id! {
    /// Name of an artifact passed between pipeline stages
    /// (e.g. `"source_artifact"`).
    ArtifactName
}

string_id! {
    /// Name of a pipeline stage (e.g. `"Source"`).
    StageName
}

string_id! {
    /// Name of an action inside a pipeline stage (e.g. `"CodeCommit"`).
    ActionName
}

// ---------------------------------------------------------------------------
// Account / permission identifiers
// ---------------------------------------------------------------------------

string_id! {
    /// A deployment region (e.g. `"eu-west-1"`).
    Region
}

string_id! {
    /// A cloud account identifier (12-digit string on AWS).
    AccountId
}

string_id! {
    /// The service principal allowed to assume an execution identity
    /// (e.g. `"codebuild.amazonaws.com"`).
    ServicePrincipal
}

string_id! {
    /// A single permission in `service:Operation` form
    /// (e.g. `"ecr:PutImage"`).
    Permission
}

string_id! {
    /// Name of a deployed function.
    FunctionName
}

// ---------------------------------------------------------------------------
// UUID-backed identifiers (internally generated)
// ---------------------------------------------------------------------------

/// Identifies one pipeline execution (one commit flowing through Source and
/// Build).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    /// Generates a new random execution identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_identifiers_are_rejected() {
        assert!(LogicalId::new("").is_none());
        assert!(BranchName::new(String::new()).is_none());
        assert_eq!(
            ResourceName::new("cicd-lambda-code-build").map(|n| n.to_string()),
            Some("cicd-lambda-code-build".to_string())
        );
    }

    #[test]
    fn prefix_derives_suffixed_names() {
        let prefix = ResourcePrefix::new("cicd-lambda").unwrap();
        assert_eq!(prefix.derive("ecr-repository").as_str(), "cicd-lambda-ecr-repository");
    }

    #[test]
    fn execution_ids_are_unique() {
        assert_ne!(ExecutionId::new_random(), ExecutionId::new_random());
    }
}
