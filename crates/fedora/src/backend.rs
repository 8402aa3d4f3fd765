//! [`ReleaseBackend`] mirroring releases into Fedora dist-git.

use crate::distgit::DistGit;
use crate::identity::PackagerIdentity;
use crate::spec::SpecUpdate;
use crate::state::{BranchState, BranchUpdate, StepPolicy};
use crate::tool::PackagingTool;
use async_trait::async_trait;
use relbot_release::backends::{BackendContext, ReleaseBackend, ReleaseOutcome};
use relbot_release::host::UserContact;
use relbot_release::{Error, ReleaseRecord, Result, Version};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Default primary dist-git branch.
pub const DEFAULT_PRIMARY_BRANCH: &str = "master";

/// Packages releases in Fedora.
pub struct FedoraBackend {
    tool: Box<dyn PackagingTool>,
    dist_git: DistGit,
    identity: Option<PackagerIdentity>,
    package: String,
    primary_branch: String,
}

impl FedoraBackend {
    /// Creates a backend for the dist-git package `package`.
    ///
    /// Without an identity the backend skips every release.
    #[must_use]
    pub fn new(
        tool: Box<dyn PackagingTool>,
        dist_git: DistGit,
        identity: Option<PackagerIdentity>,
        package: impl Into<String>,
    ) -> Self {
        Self {
            tool,
            dist_git,
            identity,
            package: package.into(),
            primary_branch: DEFAULT_PRIMARY_BRANCH.to_string(),
        }
    }

    /// Sets the primary branch (e.g. `rawhide`).
    #[must_use]
    pub fn with_primary_branch(mut self, branch: impl Into<String>) -> Self {
        self.primary_branch = branch.into();
        self
    }

    fn spec_update(record: &ReleaseRecord) -> SpecUpdate {
        let fallback = UserContact::default();
        SpecUpdate {
            version: record.version_string(),
            author_name: record.author_name.clone().unwrap_or(fallback.name),
            author_email: record.author_email.clone().unwrap_or(fallback.email),
            changelog: record.changelog.clone(),
            date: chrono::Local::now().date_naive(),
        }
    }

    /// Runs the full update on the checked-out branch under `policy`.
    async fn update_branch(
        &self,
        root: &Path,
        branch: &str,
        policy: StepPolicy,
        record: &ReleaseRecord,
    ) -> Result<BranchUpdate> {
        let mut update = BranchUpdate::new(branch, policy);
        if let Err(e) = self.run_update_steps(root, &mut update, record).await {
            update.fail(&e)?;
        }
        Ok(update)
    }

    async fn run_update_steps(
        &self,
        root: &Path,
        update: &mut BranchUpdate,
        record: &ReleaseRecord,
    ) -> Result<()> {
        self.tool.sources(root).await?;
        update.advance(BranchState::SourcesFetched);

        Self::spec_update(record).update_file(&root.join(format!("{}.spec", self.package)))?;
        update.advance(BranchState::SpecUpdated);

        self.tool.lint(root).await?;
        update.advance(BranchState::Linted);

        let before = listing(root)?;
        self.tool.fetch_new_sources(root).await?;
        let new_sources: Vec<String> = listing(root)?.difference(&before).cloned().collect();
        if new_sources.is_empty() {
            warn!(
                branch = update.branch(),
                "There are no new sources, won't continue releasing to Fedora"
            );
            return Ok(());
        }
        update.advance(BranchState::NewSourcesFound);

        self.tool.new_sources(root, &new_sources).await?;
        self.tool
            .commit(root, &format!("Update to {}", record.version_string()))
            .await?;
        update.advance(BranchState::Committed);

        self.tool.push(root).await?;
        update.advance(BranchState::Pushed);

        self.tool.build(root).await?;
        update.advance(BranchState::Built);
        Ok(())
    }

    /// Carries the primary branch update to a secondary branch.
    async fn update_secondary_branch(&self, root: &Path, branch: &str, record: &ReleaseRecord) {
        if let Err(e) = self.tool.switch_branch(root, branch).await {
            debug!(branch, error = %e, "Skipping unavailable branch");
            return;
        }

        if let Err(e) = self.tool.merge_ff_only(root, &self.primary_branch).await {
            debug!(branch, error = %e, "Trying to make the changes on the branch from scratch");
            match self
                .update_branch(root, branch, StepPolicy::BestEffort, record)
                .await
            {
                Ok(update) => info!(branch, state = %update.state(), "Branch update finished"),
                Err(e) => warn!(branch, error = %e, "Branch update failed"),
            }
            return;
        }

        if let Err(e) = self.tool.push(root).await {
            warn!(branch, error = %e, "Pushing merged branch failed");
            return;
        }
        if let Err(e) = self.tool.build(root).await {
            warn!(branch, error = %e, "Building merged branch failed");
            return;
        }
        info!(branch, "Merged, pushed and built");
    }
}

/// File names in a directory.
fn listing(dir: &Path) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for entry in std::fs::read_dir(dir)? {
        names.insert(entry?.file_name().to_string_lossy().to_string());
    }
    Ok(names)
}

#[async_trait]
impl ReleaseBackend for FedoraBackend {
    fn name(&self) -> &str {
        "Fedora"
    }

    fn skip_reason(&self, record: &ReleaseRecord) -> Option<String> {
        if !record.distro_packaging {
            return Some("Fedora release disabled in release-conf.yaml".to_string());
        }
        if self.identity.is_none() {
            return Some("fas_username is not configured".to_string());
        }
        None
    }

    async fn latest_released_version(&self, _record: &ReleaseRecord) -> Result<Version> {
        self.dist_git
            .packaged_version(&self.package, &self.primary_branch)
            .await
    }

    #[instrument(skip_all, fields(package = %self.package, version = %record.version_string()))]
    async fn publish(&self, _ctx: &BackendContext, record: &ReleaseRecord) -> Result<ReleaseOutcome> {
        let Some(identity) = &self.identity else {
            return Ok(ReleaseOutcome::skipped("fas_username is not configured"));
        };
        if let Err(e) = self.tool.init_ticket(identity).await {
            warn!(error = %e, "Can't obtain a valid kerberos ticket, skipping Fedora release");
            return Ok(ReleaseOutcome::skipped("no valid Kerberos ticket"));
        }

        let workdir = tempfile::tempdir()?;
        let root = self
            .tool
            .clone_package(workdir.path(), &self.package)
            .await
            .map_err(|e| Error::release(format!("Cloning Fedora repository failed: {e}")))?;
        self.tool
            .switch_branch(&root, &self.primary_branch)
            .await
            .map_err(|e| {
                Error::release(format!("Switching to {} failed: {e}", self.primary_branch))
            })?;

        let primary = self
            .update_branch(&root, &self.primary_branch, StepPolicy::Fatal, record)
            .await?;
        if !primary.is_built() {
            return Ok(ReleaseOutcome::skipped(format!(
                "no new sources on {}",
                self.primary_branch
            )));
        }

        for branch in &record.distro_branches {
            self.update_secondary_branch(&root, branch, record).await;
        }

        let url = format!("https://src.fedoraproject.org/rpms/{}", self.package);
        info!(%url, "Released in Fedora");
        Ok(ReleaseOutcome::released(url))
    }
}
