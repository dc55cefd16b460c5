//! Execution identities and the permission grants attached to them.

use serde::{Deserialize, Serialize};

use crate::{LogicalId, Permission, ServicePrincipal, Value};

/// Effect of a grant. Stacks only ever allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Allow,
}

impl Effect {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "Allow",
        }
    }
}

// ---------------------------------------------------------------------------

/// A set of permissions over a set of resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyGrant {
    pub effect: Effect,
    /// Permissions in `service:Operation` form, in declaration order.
    pub actions: Vec<Permission>,
    /// Resource identifiers (ARN values or `"*"`).
    pub resources: Vec<Value>,
}

impl PolicyGrant {
    /// An `Allow` grant of `actions` on `resources`.
    ///
    /// Empty action strings are skipped.
    pub fn allow<I, S>(actions: I, resources: Vec<Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            effect: Effect::Allow,
            actions: actions.into_iter().filter_map(Permission::new).collect(),
            resources,
        }
    }

    /// Returns `true` if this grant lists `action`.
    pub fn grants(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a.as_str() == action)
    }

    /// Returns `true` if the grant is scoped to every resource.
    pub fn is_unscoped(&self) -> bool {
        self.resources.iter().any(Value::is_wildcard)
    }
}

// ---------------------------------------------------------------------------

/// A role assumable by one platform service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRole {
    pub logical_id: LogicalId,
    /// Service allowed to assume the role.
    pub principal: ServicePrincipal,
}

/// A named policy document attached to one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePolicy {
    pub logical_id: LogicalId,
    /// Policy name as stored on the role.
    pub policy_name: String,
    /// Role the policy is attached to.
    pub role: LogicalId,
    pub grants: Vec<PolicyGrant>,
}

impl RolePolicy {
    /// Returns the first grant listing `action`.
    pub fn grant_for(&self, action: &str) -> Option<&PolicyGrant> {
        self.grants.iter().find(|g| g.grants(action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_builds_permissions_in_order() {
        let grant = PolicyGrant::allow(
            ["ecr:PutImage", "", "ecr:UploadLayerPart"],
            vec![Value::literal("*")],
        );
        let names: Vec<&str> = grant.actions.iter().map(Permission::as_str).collect();
        assert_eq!(names, vec!["ecr:PutImage", "ecr:UploadLayerPart"]);
        assert!(grant.is_unscoped());
        assert!(grant.grants("ecr:PutImage"));
        assert!(!grant.grants("ecr:GetAuthorizationToken"));
    }
}
