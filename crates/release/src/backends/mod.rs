//! Release distribution backends.
//!
//! This module defines the [`ReleaseBackend`] trait that downstream
//! integrations implement to publish a release.
//!
//! # Architecture
//!
//! The release crate provides:
//! - [`ReleaseBackend`] trait - interface for publishing a release
//! - [`BackendContext`] - common context passed to backends
//! - [`ReleaseOutcome`] - result of a release attempt
//! - [`forge::ForgeBackend`] - releases on the source forge
//!
//! Provider crates implement `ReleaseBackend`:
//! - `relbot-pypi` - Python Package Index
//! - `relbot-fedora` - Fedora dist-git packaging
//!
//! # Idempotency
//!
//! The provided [`ReleaseBackend::release`] compares the record's version
//! with the backend's latest released version before publishing, so calling
//! it again for a version that went out returns
//! [`ReleaseOutcome::AlreadyReleased`] without side effects.
//!
//! # Example
//!
//! ```rust,ignore
//! use relbot_release::backends::{BackendContext, ReleaseBackend, ReleaseOutcome};
//! use relbot_release::{ReleaseRecord, Result, Version};
//!
//! struct MyBackend;
//!
//! #[async_trait::async_trait]
//! impl ReleaseBackend for MyBackend {
//!     fn name(&self) -> &str { "my-backend" }
//!
//!     async fn latest_released_version(&self, _record: &ReleaseRecord) -> Result<Version> {
//!         Ok(Version::default())
//!     }
//!
//!     async fn publish(&self, _ctx: &BackendContext, _record: &ReleaseRecord) -> Result<ReleaseOutcome> {
//!         Ok(ReleaseOutcome::released("https://example.com/1.0.0"))
//!     }
//! }
//! ```

pub mod forge;

use crate::error::Result;
use crate::records::ReleaseRecord;
use crate::version::Version;
use async_trait::async_trait;
use std::fmt;
use tracing::debug;

/// Whether side effects are suppressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DryRun {
    /// Perform every action.
    #[default]
    No,
    /// Compute and log actions without mutating anything.
    Yes,
}

impl DryRun {
    /// Whether this is a dry run.
    #[must_use]
    pub const fn is_dry_run(self) -> bool {
        matches!(self, Self::Yes)
    }
}

impl From<bool> for DryRun {
    fn from(dry_run: bool) -> Self {
        if dry_run { Self::Yes } else { Self::No }
    }
}

/// Configuration common to all backends.
#[derive(Debug, Clone)]
pub struct BackendContext {
    /// Whether this is a dry-run (no actual publishing)
    pub dry_run: DryRun,
    /// Default branch of the tracked repository
    pub default_branch: String,
}

impl Default for BackendContext {
    fn default() -> Self {
        Self::new("master")
    }
}

impl BackendContext {
    /// Creates a new backend context.
    #[must_use]
    pub fn new(default_branch: impl Into<String>) -> Self {
        Self {
            dry_run: DryRun::No,
            default_branch: default_branch.into(),
        }
    }

    /// Sets the dry-run flag.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: DryRun) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Result of a release attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The release was published.
    Released {
        /// URL or identifier of the published release, if known
        url: Option<String>,
    },
    /// The backend already has this version or a higher one.
    AlreadyReleased {
        /// Latest version the backend reports
        latest: Version,
    },
    /// The backend does not apply to this release.
    Skipped {
        /// Why nothing was done
        reason: String,
    },
    /// Dry-run mode: what would have been published.
    DryRun {
        /// Human-readable description of the suppressed action
        message: String,
    },
}

impl ReleaseOutcome {
    /// Creates a released outcome with a URL.
    #[must_use]
    pub fn released(url: impl Into<String>) -> Self {
        Self::Released {
            url: Some(url.into()),
        }
    }

    /// Creates a skipped outcome.
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    /// Whether this attempt published something.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        matches!(self, Self::Released { .. })
    }
}

impl fmt::Display for ReleaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Released { url: Some(url) } => write!(f, "released ({url})"),
            Self::Released { url: None } => write!(f, "released"),
            Self::AlreadyReleased { latest } => write!(f, "already released (latest {latest})"),
            Self::Skipped { reason } => write!(f, "skipped: {reason}"),
            Self::DryRun { message } => write!(f, "[dry-run] {message}"),
        }
    }
}

/// Trait for release distribution backends.
///
/// Each backend handles publishing a release to a specific downstream
/// system (source forge, package index, distribution packaging).
#[async_trait]
pub trait ReleaseBackend: Send + Sync {
    /// Returns the display name of this backend (e.g., "GitHub", "PyPI").
    fn name(&self) -> &str;

    /// Why this backend does not apply to `record`, or `None` if it does.
    fn skip_reason(&self, _record: &ReleaseRecord) -> Option<String> {
        None
    }

    /// Latest version this backend has published.
    ///
    /// `0.0.0` means nothing was ever released.
    ///
    /// # Errors
    ///
    /// A failed query is [`crate::Error::RemoteUnavailable`], never
    /// "nothing released".
    async fn latest_released_version(&self, record: &ReleaseRecord) -> Result<Version>;

    /// Performs the mutating release step unconditionally.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Release`] (or a more specific error) when
    /// the release could not be completed.
    async fn publish(&self, ctx: &BackendContext, record: &ReleaseRecord) -> Result<ReleaseOutcome>;

    /// Releases `record` unless this backend already has it.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Self::latest_released_version`] and
    /// [`Self::publish`].
    async fn release(&self, ctx: &BackendContext, record: &ReleaseRecord) -> Result<ReleaseOutcome> {
        if let Some(reason) = self.skip_reason(record) {
            return Ok(ReleaseOutcome::Skipped { reason });
        }
        let Some(target) = record.version.as_ref() else {
            return Ok(ReleaseOutcome::skipped("no release version set"));
        };

        let latest = self.latest_released_version(record).await?;
        debug!(backend = self.name(), %latest, %target, "Comparing versions");
        if latest >= *target {
            return Ok(ReleaseOutcome::AlreadyReleased { latest });
        }

        if ctx.dry_run.is_dry_run() {
            return Ok(ReleaseOutcome::DryRun {
                message: format!("Would release version {target} on {}", self.name()),
            });
        }

        self.publish(ctx, record).await
    }
}
