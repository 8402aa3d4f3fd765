//! relbot: releases a GitHub project on GitHub, PyPI and Fedora when asked to
//! by an issue or a merged pull request.

mod cli;
mod init;
mod shutdown;
mod tracing;

use crate::cli::{Cli, Commands};
use crate::init::{Init, TerminalPrompt};
use crate::tracing::{TracingConfig, init_tracing};
use ::tracing::{info, instrument, warn};
use clap::Parser;
use miette::IntoDiagnostic;
use relbot_fedora::{DistGit, FedoraBackend, Fedpkg, PackagerIdentity};
use relbot_github::{GitHubProject, parse_github_remote};
use relbot_pypi::{PackageIndex, PypiBackend};
use relbot_release::{
    BotConfig, CommandRunner, CoordinatorSettings, ForgeKind, LocalRepository, ProjectHost,
    ReleaseCoordinator, SystemGit,
};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("relbot panicked: {panic_info}");
        eprintln!("Run with RUST_LOG=debug for more information.");
    }));

    if let Err(error) = run_main().await {
        eprintln!("{error:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> miette::Result<()> {
    let cli = Cli::parse();

    init_tracing(TracingConfig {
        format: cli.format,
        level: cli.level.into(),
        ..TracingConfig::default()
    })?;

    match cli.command {
        Commands::Run {
            config,
            dry_run,
            github_token,
        } => run_bot(&config, dry_run, github_token).await,
        Commands::Init { silent } => {
            let dir = std::env::current_dir().into_diagnostic()?;
            let mut prompt = TerminalPrompt;
            Init::new(&dir, CommandRunner::default(), &mut prompt)
                .run(silent)
                .await?;
            Ok(())
        }
    }
}

/// Reads `conf.yaml`, applying command line overrides.
fn load_config(
    path: &Path,
    dry_run: bool,
    github_token: Option<String>,
) -> relbot_release::Result<BotConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        relbot_release::Error::config(
            format!("Cannot read configuration {}: {e}", path.display()),
            "Pass an existing conf.yaml with -c, or create one with `relbot init`",
        )
    })?;
    let mut config = BotConfig::parse(&content)?;
    if config.github_token.trim().is_empty()
        && let Some(token) = github_token
    {
        config.github_token = token;
    }
    config.dry_run |= dry_run;
    config.validate()?;
    Ok(config)
}

#[instrument(skip(github_token), fields(config = %config_path.display()))]
async fn run_bot(
    config_path: &Path,
    dry_run: bool,
    github_token: Option<String>,
) -> miette::Result<()> {
    let config = load_config(config_path, dry_run, github_token)?;

    let host = forge(&config)?;
    let clone_url = config.clone_url();
    if let Some((owner, name)) = parse_github_remote(&clone_url)
        && (owner != config.repository_owner || name != config.repository_name)
    {
        warn!(
            clone_url,
            repository = %host.name(),
            "The clone URL points at a different repository"
        );
    }

    let runner = CommandRunner::new(config.command_timeout());
    let repo: Arc<dyn LocalRepository> = Arc::new(
        SystemGit::clone_from(&clone_url, Some(&config.github_token), runner.clone()).await?,
    );

    let identity = config.fas_username.as_ref().map(|fas_username| {
        PackagerIdentity::new(fas_username.as_str()).with_keytab(config.keytab.clone())
    });
    let fedora = FedoraBackend::new(
        Box::new(Fedpkg::new(runner.clone(), identity.as_ref())),
        DistGit::new()?,
        identity,
        config.repository_name.as_str(),
    )
    .with_primary_branch(config.fedora_primary_branch.as_str());
    let pypi = PypiBackend::new(PackageIndex::new()?, Arc::clone(&repo), runner);

    let coordinator = ReleaseCoordinator::new(host, repo, CoordinatorSettings::from_config(&config))
        .with_backend(Box::new(pypi))
        .with_backend(Box::new(fedora));

    info!(
        repository = %format!("{}/{}", config.repository_owner, config.repository_name),
        "Configuration loaded"
    );
    coordinator.run_until(shutdown::shutdown_signal()).await;
    Ok(())
}

/// The forge hosting the repository.
fn forge(config: &BotConfig) -> relbot_release::Result<Arc<dyn ProjectHost>> {
    match config.forge {
        ForgeKind::Github => Ok(Arc::new(GitHubProject::new(
            config.repository_owner.as_str(),
            config.repository_name.as_str(),
            config.github_token.as_str(),
        )?)),
    }
}
