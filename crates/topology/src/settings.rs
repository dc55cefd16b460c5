//! Deployment-time settings.
//!
//! Settings are resolved once, before the stack is built. External values are
//! read through a lookup function so that callers (and tests) decide where
//! they come from; [`StackSettings::from_env`] is the process-environment
//! binding used by the CLI.
//!
//! An unset external value is kept distinct from an explicitly empty one
//! ([`ExternalSetting`]). Both resolve to the same string in the build
//! environment, but only the former is reported as "unset".

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AccountId, BranchName, Region, ResourcePrefix};

/// Environment key naming the function the build stage updates.
pub const FUNCTION_NAME_KEY: &str = "LAMBDA_FUNC_NAME";

/// Environment key for the deployment region.
pub const REGION_KEY: &str = "CDK_DEFAULT_REGION";

/// Environment key for the deployment account.
pub const ACCOUNT_KEY: &str = "CDK_DEFAULT_ACCOUNT";

/// Prefix used for every physical resource name unless overridden.
pub const DEFAULT_RESOURCE_PREFIX: &str = "cicd-lambda";

/// Branch whose commits trigger the pipeline unless overridden.
pub const DEFAULT_SOURCE_BRANCH: &str = "main";

// ---------------------------------------------------------------------------
// External setting
// ---------------------------------------------------------------------------

/// A string value supplied from outside the stack definition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "value")]
pub enum ExternalSetting {
    /// No value was supplied.
    #[default]
    Unset,
    /// A value was supplied; it may be empty.
    Set(String),
}

impl ExternalSetting {
    /// The value an unset setting resolves to.
    pub const DEFAULT: &'static str = "";

    /// Maps `None` to [`ExternalSetting::Unset`] and `Some(s)` to
    /// [`ExternalSetting::Set`], keeping empty strings as set.
    pub fn from_option(value: Option<String>) -> Self {
        match value {
            Some(v) => Self::Set(v),
            None => Self::Unset,
        }
    }

    /// Returns the supplied value, or [`Self::DEFAULT`] when unset.
    pub fn resolve(&self) -> &str {
        match self {
            Self::Set(v) => v,
            Self::Unset => Self::DEFAULT,
        }
    }

    /// Returns `true` if a value (possibly empty) was supplied.
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }
}

// ---------------------------------------------------------------------------
// Stack settings
// ---------------------------------------------------------------------------

/// Everything the stack builder needs that is not fixed by the stack itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSettings {
    /// Prefix for every physical resource name.
    pub resource_prefix: ResourcePrefix,

    /// Branch whose commits start the pipeline.
    pub source_branch: BranchName,

    /// Name of the function the build stage updates, exposed to the build
    /// script as `LAMBDA_FUNC_NAME`.
    pub function_name: ExternalSetting,

    /// Deployment region. `None` leaves it to the platform at deploy time.
    pub region: Option<Region>,

    /// Deployment account. `None` leaves it to the platform at deploy time.
    pub account: Option<AccountId>,
}

impl StackSettings {
    /// Resolves settings through `lookup`, starting from the defaults.
    ///
    /// - `LAMBDA_FUNC_NAME`: unset and empty are kept distinct.
    /// - `CDK_DEFAULT_REGION` / `CDK_DEFAULT_ACCOUNT`: an empty value is
    ///   treated as unset, since an empty region or account is never usable.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let function_name = ExternalSetting::from_option(lookup(FUNCTION_NAME_KEY));
        let region = lookup(REGION_KEY).and_then(Region::new);
        let account = lookup(ACCOUNT_KEY).and_then(AccountId::new);

        debug!(
            function_name_set = function_name.is_set(),
            region = region.as_ref().map(Region::as_str),
            account = account.as_ref().map(AccountId::as_str),
            "Resolved external stack settings"
        );

        Self {
            function_name,
            region,
            account,
            ..Self::default()
        }
    }

    /// Resolves settings from the process environment.
    ///
    /// Variables that are not valid Unicode are treated as unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Replaces the resource-name prefix.
    pub fn with_prefix(mut self, prefix: ResourcePrefix) -> Self {
        self.resource_prefix = prefix;
        self
    }

    /// Replaces the source branch.
    pub fn with_branch(mut self, branch: BranchName) -> Self {
        self.source_branch = branch;
        self
    }

    /// Replaces the function-name setting.
    pub fn with_function_name(mut self, function_name: ExternalSetting) -> Self {
        self.function_name = function_name;
        self
    }

    /// Pins the deployment region.
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Pins the deployment account.
    pub fn with_account(mut self, account: AccountId) -> Self {
        self.account = Some(account);
        self
    }
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            resource_prefix: ResourcePrefix::known(DEFAULT_RESOURCE_PREFIX),
            source_branch: BranchName::known(DEFAULT_SOURCE_BRANCH),
            function_name: ExternalSetting::Unset,
            region: None,
            account: None,
        }
    }
}
