//! Releases on the source forge hosting the project.

use super::{BackendContext, ReleaseBackend, ReleaseOutcome};
use crate::changelog::parse_changelog;
use crate::error::{Error, Result};
use crate::host::{NewRelease, ProjectHost, latest_version};
use crate::records::ReleaseRecord;
use crate::version::Version;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

const CHANGELOG_FILE: &str = "CHANGELOG.md";

/// Publishes tagged releases through a [`ProjectHost`].
///
/// The latest released version is the highest version named by a release
/// title. Release notes come from the version's `CHANGELOG.md` section.
pub struct ForgeBackend {
    host: Arc<dyn ProjectHost>,
}

impl ForgeBackend {
    /// Creates a backend publishing to `host`.
    #[must_use]
    pub fn new(host: Arc<dyn ProjectHost>) -> Self {
        Self { host }
    }

    /// Release notes for `version`.
    ///
    /// Read from the release branch, falling back to the default branch.
    /// Empty when there is no changelog or when the notes equal the latest
    /// release's body.
    async fn release_notes(&self, version: &str) -> Result<String> {
        let branch = format!("{version}-release");
        let content = match self.host.file_content(CHANGELOG_FILE, Some(&branch)).await {
            Ok(Some(content)) => Some(content),
            Ok(None) | Err(_) => self.host.file_content(CHANGELOG_FILE, None).await?,
        };
        let Some(content) = content else {
            info!("{CHANGELOG_FILE} not found");
            return Ok(String::new());
        };

        let notes = parse_changelog(version, &content);
        if let Some(latest) = self.host.latest_release().await?
            && latest.body == notes
        {
            debug!(version, "Changelog unchanged since the latest release");
            return Ok(String::new());
        }
        Ok(notes)
    }
}

#[async_trait]
impl ReleaseBackend for ForgeBackend {
    fn name(&self) -> &str {
        self.host.name()
    }

    async fn latest_released_version(&self, _record: &ReleaseRecord) -> Result<Version> {
        let releases = self.host.releases().await?;
        if releases.is_empty() {
            debug!(forge = self.name(), "No releases yet");
        }
        Ok(latest_version(&releases))
    }

    async fn publish(&self, ctx: &BackendContext, record: &ReleaseRecord) -> Result<ReleaseOutcome> {
        let version = record.version_string();
        let body = self.release_notes(&version).await?;
        let commitish = record
            .commitish
            .clone()
            .unwrap_or_else(|| ctx.default_branch.clone());

        let release = self
            .host
            .create_release(NewRelease {
                tag: version.clone(),
                name: version.clone(),
                body,
                commitish,
            })
            .await
            .map_err(|e| {
                Error::release(format!("Failed to create new release on {}: {e}", self.name()))
            })?;

        info!(forge = self.name(), version = %version, url = %release.url, "Created release");
        Ok(ReleaseOutcome::released(release.url))
    }
}
