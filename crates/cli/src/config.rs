//! Global flags, the `.env` file, and their mapping onto stack settings.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, ValueEnum};
use topology::settings::{
    ACCOUNT_KEY, DEFAULT_RESOURCE_PREFIX, DEFAULT_SOURCE_BRANCH, REGION_KEY,
};
use topology::{AccountId, BranchName, Region, ResourcePrefix, StackSettings};

/// Loads `.env` from the working directory (or the nearest parent holding
/// one) into the process environment.
///
/// Variables already set in the environment win. A missing file is not an
/// error; a malformed one is. Returns the path that was loaded.
pub fn load_dotenv() -> Result<Option<PathBuf>> {
    loaded(dotenvy::dotenv())
}

fn loaded(result: dotenvy::Result<PathBuf>) -> Result<Option<PathBuf>> {
    match result {
        Ok(path) => Ok(Some(path)),
        Err(err) if err.not_found() => Ok(None),
        Err(err) => Err(err).context("Failed to load .env file"),
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Flags shared by every command.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Prefix for every physical resource name
    #[arg(long, global = true, default_value = DEFAULT_RESOURCE_PREFIX)]
    pub prefix: String,

    /// Branch whose commits start the pipeline
    #[arg(long, global = true, default_value = DEFAULT_SOURCE_BRANCH)]
    pub branch: String,

    /// Pin the deployment region instead of resolving it at deploy time
    #[arg(long, global = true, env = REGION_KEY)]
    pub region: Option<String>,

    /// Pin the deployment account instead of resolving it at deploy time
    #[arg(long, global = true, env = ACCOUNT_KEY)]
    pub account: Option<String>,

    /// Log output format
    #[arg(
        long,
        global = true,
        env = "CICD_LAMBDA_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,
}

impl GlobalArgs {
    /// Applies the flags on top of `base`.
    ///
    /// `base` carries the function-name setting, which has no flag. Empty
    /// region or account values leave `base` unchanged.
    pub fn resolve(&self, base: StackSettings) -> Result<StackSettings> {
        let prefix = ResourcePrefix::new(self.prefix.as_str())
            .ok_or_else(|| anyhow!("--prefix must not be empty"))?;
        let branch = BranchName::new(self.branch.as_str())
            .ok_or_else(|| anyhow!("--branch must not be empty"))?;

        let mut settings = base.with_prefix(prefix).with_branch(branch);
        if let Some(region) = self.region.clone().and_then(Region::new) {
            settings = settings.with_region(region);
        }
        if let Some(account) = self.account.clone().and_then(AccountId::new) {
            settings = settings.with_account(account);
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::{self, Write};

    use topology::ExternalSetting;

    use super::*;

    fn args(prefix: &str, region: Option<&str>) -> GlobalArgs {
        GlobalArgs {
            prefix: prefix.to_string(),
            branch: "main".to_string(),
            region: region.map(str::to_string),
            account: None,
            log_format: LogFormat::Pretty,
        }
    }

    #[test]
    fn flags_override_prefix_and_keep_function_name() {
        let base =
            StackSettings::default().with_function_name(ExternalSetting::Set(String::new()));
        let settings = args("orders", Some("eu-west-1")).resolve(base).unwrap();

        assert_eq!(settings.resource_prefix.as_str(), "orders");
        assert_eq!(settings.region.as_ref().map(Region::as_str), Some("eu-west-1"));
        assert_eq!(settings.account, None);
        assert_eq!(settings.function_name, ExternalSetting::Set(String::new()));
    }

    #[test]
    fn empty_region_flag_is_ignored() {
        let base = StackSettings::default().with_region(Region::new("us-east-1").unwrap());
        let settings = args("cicd-lambda", Some("")).resolve(base).unwrap();
        assert_eq!(settings.region.as_ref().map(Region::as_str), Some("us-east-1"));
    }

    fn settings_from_env_file(contents: &str) -> StackSettings {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();

        let vars: HashMap<String, String> = dotenvy::from_path_iter(file.path())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        StackSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn env_file_keeps_empty_function_name_distinct_from_missing() {
        let settings = settings_from_env_file("LAMBDA_FUNC_NAME=\nCDK_DEFAULT_REGION=eu-west-1\n");
        assert_eq!(settings.function_name, ExternalSetting::Set(String::new()));
        assert_eq!(settings.region.as_ref().map(Region::as_str), Some("eu-west-1"));

        let settings = settings_from_env_file("CDK_DEFAULT_ACCOUNT=123456789012\n");
        assert_eq!(settings.function_name, ExternalSetting::Unset);
        assert_eq!(settings.account.as_ref().map(AccountId::as_str), Some("123456789012"));
    }

    #[test]
    fn missing_env_file_is_not_an_error() {
        let missing = dotenvy::Error::Io(io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(loaded(Err(missing)).unwrap(), None);
    }

    #[test]
    fn malformed_env_file_is_an_error() {
        let malformed = dotenvy::Error::LineParse("LAMBDA_FUNC_NAME='orders".to_string(), 17);
        let err = loaded(Err(malformed)).unwrap_err();
        assert!(err.to_string().contains(".env"));
    }

    #[test]
    fn empty_prefix_is_an_error() {
        let err = args("", None).resolve(StackSettings::default()).unwrap_err();
        assert!(err.to_string().contains("--prefix"));
    }
}
