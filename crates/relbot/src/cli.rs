//! Command line interface.

use crate::tracing::{LogLevel, TracingFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "relbot")]
#[command(about = "Automated releases from GitHub to PyPI and Fedora")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short = 'l', long = "log-level", global = true, default_value = "info", value_enum)]
    pub level: LogLevel,

    #[arg(long = "log-format", global = true, default_value = "compact", value_enum)]
    pub format: TracingFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Watch the configured repository and release what is requested")]
    Run {
        #[arg(
            short = 'c',
            long = "config",
            env = "RELBOT_CONFIG",
            default_value = "conf.yaml",
            help = "Path to conf.yaml"
        )]
        config: PathBuf,

        #[arg(long = "dry-run", help = "Log every action without performing it")]
        dry_run: bool,

        #[arg(
            long = "github-token",
            env = "GITHUB_TOKEN",
            hide_env_values = true,
            help = "Token used when conf.yaml has none"
        )]
        github_token: Option<String>,
    },
    #[command(about = "Create conf.yaml and release-conf.yaml in the current repository")]
    Init {
        #[arg(long, help = "Write default values without asking")]
        silent: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["relbot", "run"]).unwrap();
        assert_eq!(cli.level, LogLevel::Info);
        assert_eq!(cli.format, TracingFormat::Compact);
        match cli.command {
            Commands::Run { dry_run, .. } => assert!(!dry_run),
            Commands::Init { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_with_options() {
        let cli = Cli::try_parse_from([
            "relbot",
            "run",
            "-c",
            "/etc/relbot/conf.yaml",
            "--dry-run",
            "--log-level",
            "debug",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.level, LogLevel::Debug);
        assert_eq!(cli.format, TracingFormat::Json);
        match cli.command {
            Commands::Run {
                config, dry_run, ..
            } => {
                assert_eq!(config, PathBuf::from("/etc/relbot/conf.yaml"));
                assert!(dry_run);
            }
            Commands::Init { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_init_silent() {
        let cli = Cli::try_parse_from(["relbot", "init", "--silent"]).unwrap();
        assert!(matches!(cli.command, Commands::Init { silent: true }));
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(Cli::try_parse_from(["relbot", "--log-format", "dev", "run"]).is_err());
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["relbot"]).is_err());
    }
}
