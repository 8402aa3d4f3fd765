//! GitHub project host for relbot.
//!
//! [`GitHubProject`] implements [`relbot_release::ProjectHost`] on top of the
//! GitHub REST API, authenticated with a personal access token.

#![warn(missing_docs)]

pub mod project;
pub mod remote;

pub use project::GitHubProject;
pub use remote::parse_github_remote;
