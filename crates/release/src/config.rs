//! Configuration types.
//!
//! Two YAML files drive the bot:
//! - `conf.yaml`, the local bot configuration ([`BotConfig`])
//! - `release-conf.yaml`, fetched from the tracked repository every cycle ([`ReleaseConf`])

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the per-repository release configuration.
pub const RELEASE_CONF_FILE: &str = "release-conf.yaml";

/// Default timeout for external commands (packaging builds can be slow).
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30 * 60;

/// Keys that must be present in `conf.yaml`.
const REQUIRED_BOT_ITEMS: [&str; 3] = ["repository_name", "repository_owner", "github_token"];

/// Source-forge service hosting the tracked repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForgeKind {
    /// GitHub (default).
    #[default]
    Github,
}

impl fmt::Display for ForgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Github => write!(f, "GitHub"),
        }
    }
}

/// The `pypi` key: either a switch or a project-name override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PypiSetting {
    /// Publish (or not) under the detected project name.
    Enabled(bool),
    /// Publish under this project name.
    Project(String),
}

impl Default for PypiSetting {
    fn default() -> Self {
        Self::Enabled(true)
    }
}

impl PypiSetting {
    /// Whether publishing to the package index is enabled.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        match self {
            Self::Enabled(enabled) => *enabled,
            Self::Project(_) => true,
        }
    }

    /// The explicit project name, if configured.
    #[must_use]
    pub fn project(&self) -> Option<&str> {
        match self {
            Self::Enabled(_) => None,
            Self::Project(name) => Some(name),
        }
    }
}

/// Contents of `release-conf.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConf {
    /// Changelog entries for the next release.
    pub changelog: Vec<String>,
    /// Release author name.
    pub author_name: Option<String>,
    /// Release author email.
    pub author_email: Option<String>,
    /// Package index publishing switch or project name.
    pub pypi: PypiSetting,
    /// Whether open issues may trigger release pull requests.
    pub trigger_on_issue: bool,
    /// Labels applied to release issues and pull requests.
    pub labels: Vec<String>,
    /// Whether to mirror releases into Fedora packaging.
    pub fedora: bool,
    /// Fedora branches updated after the primary branch.
    pub fedora_branches: Vec<String>,
}

impl ReleaseConf {
    /// Parses release configuration from YAML text.
    ///
    /// An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the document is not valid YAML
    /// or has values of the wrong type.
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str::<Option<Self>>(content)
            .map(Option::unwrap_or_default)
            .map_err(|e| {
                Error::config(
                    format!("Invalid {RELEASE_CONF_FILE}: {e}"),
                    "Fix the release configuration in the repository; release actions are skipped until then",
                )
            })
    }
}

/// Resolve the package index project name.
///
/// An explicit `pypi: <name>` wins, then `[metadata] name` from `setup.cfg`,
/// then `fallback` (the repository name).
#[must_use]
pub fn package_index_project(conf: &ReleaseConf, setup_cfg: Option<&str>, fallback: &str) -> String {
    if let Some(project) = conf.pypi.project() {
        return project.to_string();
    }
    setup_cfg
        .and_then(setup_cfg_name)
        .unwrap_or_else(|| fallback.to_string())
}

fn setup_cfg_name(setup_cfg: &str) -> Option<String> {
    let mut in_metadata = false;
    for line in setup_cfg.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_metadata = line == "[metadata]";
            continue;
        }
        if !in_metadata {
            continue;
        }
        if let Some((key, value)) = line.split_once('=')
            && key.trim() == "name"
        {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Contents of `conf.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Name of the tracked repository.
    pub repository_name: String,
    /// Owner of the tracked repository.
    pub repository_owner: String,
    /// Forge API token.
    pub github_token: String,
    /// Account the bot acts as; defaults to the repository owner.
    pub github_username: Option<String>,
    /// Seconds between polling cycles; unset runs a single cycle.
    pub refresh_interval: Option<u64>,
    /// Clone URL override.
    pub clone_url: Option<String>,
    /// Generate changelogs with `gitchangelog` instead of `git log`.
    pub gitchangelog: bool,
    /// Compute and log actions without mutating anything.
    pub dry_run: bool,
    /// Forge hosting the repository.
    pub forge: ForgeKind,
    /// Fedora account used for packaging.
    pub fas_username: Option<String>,
    /// Kerberos keytab for the Fedora account.
    pub keytab: Option<PathBuf>,
    /// Primary Fedora packaging branch.
    pub fedora_primary_branch: String,
    /// Timeout for external commands, in seconds.
    pub command_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            repository_name: String::new(),
            repository_owner: String::new(),
            github_token: String::new(),
            github_username: None,
            refresh_interval: None,
            clone_url: None,
            gitchangelog: false,
            dry_run: false,
            forge: ForgeKind::Github,
            fas_username: None,
            keytab: None,
            fedora_primary_branch: "master".to_string(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
        }
    }
}

impl BotConfig {
    /// Loads and validates the bot configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the file is missing, malformed, or
    /// lacks a required item.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(
                format!("Cannot read configuration {}: {e}", path.display()),
                "Pass an existing conf.yaml with -c, or create one with `relbot init`",
            )
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses the bot configuration without validating required items.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the YAML is malformed.
    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str::<Option<Self>>(content)
            .map(Option::unwrap_or_default)
            .map_err(|e| Error::config(format!("Invalid conf.yaml: {e}"), "Check the YAML syntax"))
    }

    /// Checks that every required item is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the missing items.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = REQUIRED_BOT_ITEMS
            .iter()
            .copied()
            .filter(|item| match *item {
                "repository_name" => self.repository_name.trim().is_empty(),
                "repository_owner" => self.repository_owner.trim().is_empty(),
                "github_token" => self.github_token.trim().is_empty(),
                _ => false,
            })
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::config(
                format!("Missing required configuration items: {}", missing.join(", ")),
                "Set them in conf.yaml (github_token may also come from GITHUB_TOKEN)",
            ))
        }
    }

    /// The account the bot acts as.
    #[must_use]
    pub fn username(&self) -> &str {
        self.github_username
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.repository_owner)
    }

    /// URL the local mirror is cloned from.
    #[must_use]
    pub fn clone_url(&self) -> String {
        self.clone_url.clone().unwrap_or_else(|| {
            format!(
                "https://github.com/{}/{}.git",
                self.repository_owner, self.repository_name
            )
        })
    }

    /// Interval between polling cycles, or `None` for a single cycle.
    #[must_use]
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval.map(Duration::from_secs)
    }

    /// Timeout applied to every external command.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}
