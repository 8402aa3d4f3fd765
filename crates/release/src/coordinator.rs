//! Release coordinator.
//!
//! Drives the polling loop. Each cycle decides which release transition is
//! outstanding, executes it against every downstream system, and posts one
//! consolidated comment per issue or pull request. Nothing is carried over
//! between cycles: remote state is re-read every time, and the version
//! comparison in each backend makes repeated attempts harmless.

use crate::backends::forge::ForgeBackend;
use crate::backends::{BackendContext, DryRun, ReleaseBackend, ReleaseOutcome};
use crate::config::{BotConfig, RELEASE_CONF_FILE, ReleaseConf, package_index_project};
use crate::error::{Error, Result};
use crate::host::{CommentTarget, DryRunHost, Issue, IssueState, ProjectHost, PullRequestState};
use crate::matcher::match_title;
use crate::notify::Notifications;
use crate::pull_request::{Preparation, PullRequestPreparer};
use crate::records::{PullRequestRecord, ReleaseRecord};
use crate::repository::LocalRepository;
use crate::version::Version;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const SETUP_CFG_FILE: &str = "setup.cfg";

/// Settings for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Name of the tracked repository (fallback package name).
    pub repository_name: String,
    /// Account the bot acts as.
    pub username: String,
    /// Generate changelogs with `gitchangelog`.
    pub gitchangelog: bool,
    /// Dry-run mode.
    pub dry_run: DryRun,
    /// Time between cycles; `None` runs a single cycle.
    pub refresh_interval: Option<Duration>,
}

impl CoordinatorSettings {
    /// Creates settings for `repository_name`, acting as `username`.
    #[must_use]
    pub fn new(repository_name: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            repository_name: repository_name.into(),
            username: username.into(),
            gitchangelog: false,
            dry_run: DryRun::No,
            refresh_interval: None,
        }
    }

    /// Settings derived from the bot configuration.
    #[must_use]
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            repository_name: config.repository_name.clone(),
            username: config.username().to_string(),
            gitchangelog: config.gitchangelog,
            dry_run: DryRun::from(config.dry_run),
            refresh_interval: config.refresh_interval(),
        }
    }

    /// Sets the dry-run flag.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: DryRun) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the polling interval.
    #[must_use]
    pub const fn with_refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.refresh_interval = interval;
        self
    }
}

/// Summary of one polling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Version of the merged release pull request handled this cycle.
    pub release_version: Option<Version>,
    /// Outcome per backend, by backend name.
    pub outcomes: Vec<(String, ReleaseOutcome)>,
    /// Failures per backend, by backend name.
    pub failures: Vec<(String, String)>,
    /// Result of the release-issue transition.
    pub pull_request: Option<Preparation>,
    /// Errors that ended a scope early.
    pub errors: Vec<String>,
    /// Comments posted on the forge.
    pub comments_posted: usize,
}

/// Release coordinator.
///
/// Owns the collaborators for the lifetime of the bot and the per-cycle
/// records for the duration of a cycle.
pub struct ReleaseCoordinator {
    host: Arc<dyn ProjectHost>,
    repo: Arc<dyn LocalRepository>,
    forge: ForgeBackend,
    backends: Vec<Box<dyn ReleaseBackend>>,
    settings: CoordinatorSettings,
}

impl ReleaseCoordinator {
    /// Creates a coordinator releasing on `host` from the clone `repo`.
    ///
    /// In dry-run mode `host` is wrapped in a [`DryRunHost`], so no forge
    /// mutation reaches it.
    #[must_use]
    pub fn new(
        host: Arc<dyn ProjectHost>,
        repo: Arc<dyn LocalRepository>,
        settings: CoordinatorSettings,
    ) -> Self {
        let host: Arc<dyn ProjectHost> = if settings.dry_run.is_dry_run() {
            Arc::new(DryRunHost::new(host))
        } else {
            host
        };
        Self {
            forge: ForgeBackend::new(Arc::clone(&host)),
            host,
            repo,
            backends: Vec::new(),
            settings,
        }
    }

    /// Adds a downstream backend, released after the forge in insertion order.
    #[must_use]
    pub fn with_backend(mut self, backend: Box<dyn ReleaseBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Returns a reference to the settings.
    #[must_use]
    pub const fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Runs until the loop ends or Ctrl-C is received.
    pub async fn run(&self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("Interrupted, shutting down");
        })
        .await;
    }

    /// Runs cycles until `shutdown` resolves, or once when no refresh
    /// interval is configured. The local clone is removed on exit.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(version = env!("CARGO_PKG_VERSION"), "relbot reporting for duty!");
        if self.settings.dry_run.is_dry_run() {
            info!("Running in dry-run mode");
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                report = self.run_cycle() => {
                    debug!(?report, "Cycle finished");
                }
                () = &mut shutdown => break,
            }

            let Some(interval) = self.settings.refresh_interval else {
                break;
            };
            debug!(seconds = interval.as_secs(), "Done. Going to sleep");
            tokio::select! {
                () = tokio::time::sleep(interval) => {}
                () = &mut shutdown => break,
            }
        }

        self.teardown().await;
    }

    async fn teardown(&self) {
        if let Err(e) = self.repo.cleanup().await {
            warn!(error = %e, "Failed to remove the local clone");
        }
    }

    /// Runs one polling cycle. Never fails; problems are logged and reported.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        if let Err(e) = self.repo.pull().await {
            warn!(error = %e, "Failed to refresh the local clone");
        }

        let mut record = match self.load_release_record().await {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, "Skipping release actions this cycle");
                report.errors.push(e.to_string());
                return report;
            }
        };

        let ctx = match self.host.default_branch().await {
            Ok(branch) => BackendContext::new(branch),
            Err(e) => {
                error!(error = %e, "Skipping release actions this cycle");
                report.errors.push(e.to_string());
                return report;
            }
        }
        .with_dry_run(self.settings.dry_run);

        let mut notifications = Notifications::new();

        if let Err(e) = self
            .release_merged_pull_request(&ctx, &mut record, &mut notifications, &mut report)
            .await
        {
            error!(error = %e, "Releasing merged pull request failed");
            report.errors.push(e.to_string());
        }

        if record.trigger_on_issue {
            match self.promote_release_issue(&record, &mut notifications).await {
                Ok(preparation) => report.pull_request = preparation,
                Err(e) => {
                    error!(error = %e, "Handling release issue failed");
                    report.errors.push(e.to_string());
                }
            }
        }

        report.comments_posted = notifications.flush(self.host.as_ref()).await;
        report
    }

    /// Load `release-conf.yaml` into a fresh record.
    async fn load_release_record(&self) -> Result<ReleaseRecord> {
        let content = self
            .host
            .file_content(RELEASE_CONF_FILE, None)
            .await?
            .ok_or_else(|| {
                Error::config(
                    format!("{RELEASE_CONF_FILE} not found in the repository"),
                    "Add release-conf.yaml to the root of the repository (see `relbot init`)",
                )
            })?;
        let conf = ReleaseConf::parse(&content)?;
        let mut record = ReleaseRecord::from_conf(&conf);

        if record.publish_to_package_index {
            let setup_cfg = self.host.file_content(SETUP_CFG_FILE, None).await?;
            record.package_index_project = Some(package_index_project(
                &conf,
                setup_cfg.as_deref(),
                &self.settings.repository_name,
            ));
        }
        Ok(record)
    }

    /// Find the newest merged release pull request and release it everywhere.
    async fn release_merged_pull_request(
        &self,
        ctx: &BackendContext,
        record: &mut ReleaseRecord,
        notifications: &mut Notifications,
        report: &mut CycleReport,
    ) -> Result<()> {
        let latest = self.forge.latest_released_version(record).await?;
        let merged = self.host.pull_requests(PullRequestState::Merged).await?;

        let Some((pull_request, version)) = merged
            .into_iter()
            .find_map(|pr| match_title(&pr.title, &latest).map(|v| (pr, v)))
        else {
            debug!(%latest, "No merged release PR found");
            return Ok(());
        };

        info!(version = %version, number = pull_request.number, "Found merged release PR");
        record.update_from_pull_request(
            version.clone(),
            pull_request.number,
            Some(&pull_request.author),
            ctx.default_branch.clone(),
        );
        report.release_version = Some(version.clone());
        let target = CommentTarget::PullRequest(pull_request.number);

        // Later backends run even when an earlier one fails, so a partial
        // release is completed on a later attempt.
        let mut backends: Vec<&dyn ReleaseBackend> = Vec::with_capacity(self.backends.len() + 1);
        backends.push(&self.forge);
        for backend in &self.backends {
            backends.push(backend.as_ref());
        }
        for backend in backends {
            let name = backend.name().to_string();
            match backend.release(ctx, record).await {
                Ok(outcome) => {
                    match &outcome {
                        ReleaseOutcome::Released { .. } => {
                            let msg = format!("I just released version {version} on {name}");
                            info!("{msg}");
                            notifications.push(target, msg);
                        }
                        ReleaseOutcome::AlreadyReleased { latest } => {
                            info!(backend = %name, %latest, "{version} or higher has already been released");
                        }
                        ReleaseOutcome::Skipped { reason } => {
                            debug!(backend = %name, reason = %reason, "Skipping release");
                        }
                        ReleaseOutcome::DryRun { message } => {
                            info!(backend = %name, "[dry-run] {message}");
                            notifications.push(
                                target,
                                format!("I would have released version {version} on {name} now."),
                            );
                        }
                    }
                    report.outcomes.push((name, outcome));
                }
                Err(e) => {
                    error!(backend = %name, error = %e, "Release failed");
                    notifications.push(
                        target,
                        format!("I just failed to release version {version} on {name}"),
                    );
                    report.failures.push((name, e.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Turn a single open release issue into a release pull request.
    async fn promote_release_issue(
        &self,
        release: &ReleaseRecord,
        notifications: &mut Notifications,
    ) -> Result<Option<Preparation>> {
        let latest = self.forge.latest_released_version(release).await?;
        let Some((version, issue)) = self.find_release_issue(&latest).await? else {
            return Ok(None);
        };

        let mut record =
            PullRequestRecord::for_issue(version.clone(), issue.number, issue.id, release.labels.clone());
        record.previous_version = Some(latest);
        let issue_target = CommentTarget::Issue(issue.number);

        if !record.labels.is_empty() {
            self.host.add_labels(issue_target, &record.labels).await?;
        }

        info!(version = %version, issue = issue.number, "Making a new PR for release based on the issue");
        let preparer = PullRequestPreparer::new(self.host.as_ref(), self.repo.as_ref())
            .with_gitchangelog(self.settings.gitchangelog)
            .with_dry_run(self.settings.dry_run);

        match preparer.prepare(&mut record).await {
            Ok(Preparation::Created { url }) => {
                notifications.push(
                    issue_target,
                    format!(
                        "I just made a PR request for a release version {version}\n \
                         Here's a [link to the PR]({url})"
                    ),
                );
                self.host.close_issue(issue.number).await?;
                debug!(issue = issue.number, "Closed release issue");
                Ok(Some(Preparation::Created { url }))
            }
            Ok(other) => Ok(Some(other)),
            Err(e) => {
                notifications.push(
                    issue_target,
                    format!("I just failed to make a PR request for a release version {version}"),
                );
                Err(e)
            }
        }
    }

    /// The single open issue requesting a release above `latest`.
    ///
    /// Issues the bot may not modify are ignored with a warning.
    async fn find_release_issue(&self, latest: &Version) -> Result<Option<(Version, Issue)>> {
        let mut found: Vec<(Version, Issue)> = Vec::new();
        for issue in self.host.issues(IssueState::Open).await? {
            let Some(version) = match_title(&issue.title, latest) else {
                continue;
            };
            if self.host.can_modify_issue(&self.settings.username, &issue).await? {
                info!(version = %version, issue = issue.number, "Found new release issue");
                found.push((version, issue));
            } else {
                let denied = Error::permission_denied(
                    &self.settings.username,
                    format!("issue #{}", issue.number),
                );
                warn!("{denied}");
            }
        }

        if found.len() > 1 {
            return Err(Error::MultipleReleaseIssues {
                versions: found.iter().map(|(v, _)| v.to_string()).collect(),
            });
        }
        Ok(found.pop())
    }
}
