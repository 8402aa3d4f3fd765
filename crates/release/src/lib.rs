//! Release coordination engine for relbot.
//!
//! This crate decides, on every polling cycle, which release action is
//! outstanding for a project and drives it through every downstream system:
//! the source forge, the package index and distribution packaging. It resumes
//! safely after partial failure because every backend compares versions
//! before publishing.
//!
//! # Architecture
//!
//! The crate is organized around several core modules:
//!
//! - [`matcher`] - Extracting requested versions from issue and PR titles
//! - [`records`] - Per-cycle release and pull request state
//! - [`backends`] - The [`ReleaseBackend`] trait and the forge backend
//! - [`coordinator`] - The polling loop
//! - [`host`] - The [`ProjectHost`] contract for forge integrations
//! - [`repository`] - The local clone
//! - [`config`] - `conf.yaml` and `release-conf.yaml`
//!
//! # Example
//!
//! ```rust,ignore
//! use relbot_release::{BotConfig, CoordinatorSettings, ReleaseCoordinator};
//!
//! let config = BotConfig::load(Path::new("conf.yaml"))?;
//! let coordinator = ReleaseCoordinator::new(host, repo, CoordinatorSettings::from_config(&config))
//!     .with_backend(Box::new(pypi));
//! coordinator.run().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod backends;
pub mod changelog;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod host;
pub mod matcher;
pub mod notify;
pub mod process;
pub mod pull_request;
pub mod records;
pub mod repository;
pub mod version;
pub mod version_files;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export main types
pub use backends::{BackendContext, DryRun, ReleaseBackend, ReleaseOutcome};
pub use config::{BotConfig, ForgeKind, PypiSetting, ReleaseConf};
pub use coordinator::{CoordinatorSettings, CycleReport, ReleaseCoordinator};
pub use error::{Error, Result};
pub use host::{CommentTarget, DryRunHost, ProjectHost};
pub use matcher::match_title;
pub use notify::Notifications;
pub use process::{CommandOutput, CommandRunner};
pub use records::{PullRequestRecord, ReleaseRecord};
pub use repository::{LocalRepository, SystemGit};
pub use version::{BumpType, Version};
