//! cicd-lambda CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Resolve settings**: load `.env` if present, read `LAMBDA_FUNC_NAME`,
//!    `CDK_DEFAULT_REGION` and `CDK_DEFAULT_ACCOUNT` from the environment and
//!    apply flag overrides.
//! 2. **Wire observability**: configure `tracing-subscriber` with an
//!    `EnvFilter` and a pretty or JSON layer. Logs go to stderr so that
//!    `synth` output on stdout stays a clean template.
//! 3. **Run a command**: build the [`topology::Stack`] and hand it to the
//!    selected command.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::{handle_command, Commands};
use config::{load_dotenv, GlobalArgs, LogFormat};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "cicd_lambda=info,topology=info,cloudformation=info";

#[derive(Parser)]
#[command(name = "cicd-lambda")]
#[command(about = "CI/CD stack for container-image functions", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

fn main() -> Result<()> {
    // Before parsing, so `.env` also backs the flags' environment fallbacks.
    let env_file = load_dotenv()?;
    let cli = Cli::parse();
    init_tracing(cli.global.log_format);
    if let Some(path) = env_file {
        debug!(path = %path.display(), "Loaded environment file");
    }

    let settings = cli.global.resolve(topology::StackSettings::from_env())?;
    handle_command(cli.command, &settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "cicd-lambda",
            "synth",
            "--prefix",
            "orders",
            "--branch",
            "release",
            "--compact",
            "--description",
            "orders pipeline",
        ])
        .unwrap();
        assert_eq!(cli.global.prefix, "orders");
        assert_eq!(cli.global.branch, "release");
        match cli.command {
            Commands::Synth {
                compact,
                description,
                ..
            } => {
                assert!(compact);
                assert_eq!(description.as_deref(), Some("orders pipeline"));
            }
            other => panic!("expected synth, got {other:?}"),
        }
    }

    #[test]
    fn defaults_match_the_stack_defaults() {
        let cli = Cli::try_parse_from(["cicd-lambda", "check"]).unwrap();
        assert_eq!(cli.global.prefix, topology::settings::DEFAULT_RESOURCE_PREFIX);
        assert_eq!(cli.global.branch, topology::settings::DEFAULT_SOURCE_BRANCH);
        assert_eq!(cli.global.log_format, LogFormat::Pretty);
    }

    #[test]
    fn order_accepts_teardown() {
        let cli = Cli::try_parse_from(["cicd-lambda", "order", "--teardown"]).unwrap();
        assert!(matches!(cli.command, Commands::Order { teardown: true }));
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        assert!(Cli::try_parse_from(["cicd-lambda", "--log-format", "xml", "check"]).is_err());
    }
}
