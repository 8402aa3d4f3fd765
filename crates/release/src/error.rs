//! Error types for the release coordination engine.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for release operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while coordinating a release.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A query to a downstream system could not complete.
    ///
    /// Never equivalent to "nothing released"; the caller retries next cycle.
    #[error("{system} is unavailable: {message}")]
    #[diagnostic(
        code(relbot::remote_unavailable),
        help("The query will be retried on the next polling cycle")
    )]
    RemoteUnavailable {
        /// The downstream system that failed to answer
        system: String,
        /// The error message
        message: String,
    },

    /// A release attempt failed after a known point.
    #[error("Release failed: {message}")]
    #[diagnostic(code(relbot::release))]
    Release {
        /// The error message
        message: String,
    },

    /// Malformed or missing configuration.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(relbot::config), help("{help}"))]
    Configuration {
        /// The error message
        message: String,
        /// Help text for the user
        help: String,
    },

    /// The acting identity lacks rights on an issue or pull request.
    #[error("User {user} has no permission to modify {target}")]
    #[diagnostic(
        code(relbot::permission_denied),
        help("Grant the bot account write access to the repository")
    )]
    PermissionDenied {
        /// The acting user
        user: String,
        /// Description of the issue or pull request
        target: String,
    },

    /// More than one qualifying release issue is open.
    #[error("Multiple release issues are open ({}), please reduce them to one", versions.join(", "))]
    #[diagnostic(
        code(relbot::multiple_release_issues),
        help("Close all but one release issue")
    )]
    MultipleReleaseIssues {
        /// Versions named by the open issues
        versions: Vec<String>,
    },

    /// Failed to parse a version string.
    #[error("Invalid version: {version}")]
    #[diagnostic(
        code(relbot::invalid_version),
        help("Version must follow semantic versioning (e.g., 1.0.0, 2.1.0-beta.1)")
    )]
    InvalidVersion {
        /// The invalid version string
        version: String,
    },

    /// An external command exited unsuccessfully or could not be started.
    #[error("Command `{command}` failed: {message}")]
    #[diagnostic(code(relbot::command))]
    Command {
        /// The command line that was run
        command: String,
        /// Failure description (exit status, stderr or timeout)
        message: String,
        /// Working directory of the command
        directory: Option<PathBuf>,
    },

    /// Git operation error.
    #[error("Git error: {message}")]
    #[diagnostic(
        code(relbot::git),
        help("Ensure the clone URL is reachable and the bot can push to it")
    )]
    Git {
        /// The error message
        message: String,
    },

    /// Wrapped I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(relbot::io))]
    Io(#[from] std::io::Error),

    /// Wrapped YAML error.
    #[error("YAML error: {0}")]
    #[diagnostic(code(relbot::yaml))]
    Yaml(#[from] serde_yaml::Error),

    /// Wrapped JSON error.
    #[error("JSON error: {0}")]
    #[diagnostic(code(relbot::json))]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a new remote-unavailable error.
    #[must_use]
    pub fn remote_unavailable(system: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            system: system.into(),
            message: message.into(),
        }
    }

    /// Create a new release error.
    #[must_use]
    pub fn release(message: impl Into<String>) -> Self {
        Self::Release {
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a new permission error.
    #[must_use]
    pub fn permission_denied(user: impl Into<String>, target: impl Into<String>) -> Self {
        Self::PermissionDenied {
            user: user.into(),
            target: target.into(),
        }
    }

    /// Create a new invalid version error.
    #[must_use]
    pub fn invalid_version(version: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
        }
    }

    /// Create a new command error.
    #[must_use]
    pub fn command(
        command: impl Into<String>,
        message: impl Into<String>,
        directory: Option<PathBuf>,
    ) -> Self {
        Self::Command {
            command: command.into(),
            message: message.into(),
            directory,
        }
    }

    /// Create a new git error.
    #[must_use]
    pub fn git(message: impl Into<String>) -> Self {
        Self::Git {
            message: message.into(),
        }
    }

    /// Whether the error means a remote could not be queried.
    #[must_use]
    pub const fn is_remote_unavailable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable { .. })
    }
}
