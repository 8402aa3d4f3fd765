//! Preparation of release pull requests.
//!
//! A release pull request lives on a `{version}-release` branch cut from the
//! default branch. It carries a new `CHANGELOG.md` section built from the
//! commits since the previous release and updated version strings.

use crate::backends::DryRun;
use crate::changelog::insert_in_changelog;
use crate::error::{Error, Result};
use crate::host::{CommentTarget, NewPullRequest, ProjectHost, PullRequestState};
use crate::records::PullRequestRecord;
use crate::repository::LocalRepository;
use crate::version_files::look_for_version_files;
use std::fmt::Write as _;
use tracing::{info, warn};

/// What happened when preparing a release pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preparation {
    /// The pull request was opened.
    Created {
        /// Web URL of the pull request
        url: String,
    },
    /// The release branch already exists; nothing was done.
    BranchExists,
    /// A pull request with the release title is already open.
    AlreadyOpen {
        /// Number of the open pull request
        number: u64,
    },
    /// Dry-run mode: nothing was done.
    DryRun,
}

/// Prepares release pull requests on a forge from a local clone.
pub struct PullRequestPreparer<'a> {
    host: &'a dyn ProjectHost,
    repo: &'a dyn LocalRepository,
    gitchangelog: bool,
    dry_run: DryRun,
}

impl<'a> PullRequestPreparer<'a> {
    /// Creates a preparer working on `repo` and publishing to `host`.
    #[must_use]
    pub fn new(host: &'a dyn ProjectHost, repo: &'a dyn LocalRepository) -> Self {
        Self {
            host,
            repo,
            gitchangelog: false,
            dry_run: DryRun::No,
        }
    }

    /// Generate the changelog with `gitchangelog`.
    #[must_use]
    pub const fn with_gitchangelog(mut self, gitchangelog: bool) -> Self {
        self.gitchangelog = gitchangelog;
        self
    }

    /// Sets the dry-run flag.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: DryRun) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Prepare the release branch and open the pull request for `record`.
    ///
    /// On success `record.pr_number` and `record.pr_url` are set. The local
    /// clone is left on the default branch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Release`] if the branch cannot be prepared or the
    /// pull request cannot be opened.
    pub async fn prepare(&self, record: &mut PullRequestRecord) -> Result<Preparation> {
        let (Some(version), Some(branch)) = (record.version.clone(), record.branch_name()) else {
            return Err(Error::release("release pull request has no version"));
        };
        let version = version.to_string();

        if self.host.branches().await?.iter().any(|b| *b == branch) {
            warn!(branch = %branch, "Branch already exists, aborting creating PR");
            return Ok(Preparation::BranchExists);
        }
        if self.dry_run.is_dry_run() {
            info!(version = %version, "[dry-run] Would make a new PR for release");
            return Ok(Preparation::DryRun);
        }

        let default_branch = self.host.default_branch().await?;
        let prepared = self.prepare_branch(record, &version, &branch, &default_branch).await;
        if let Err(e) = self.repo.checkout(&default_branch).await {
            warn!(branch = %default_branch, error = %e, "Failed to return to the default branch");
        }
        let (log, changed) =
            prepared.map_err(|e| Error::release(format!("Preparing branch {branch} failed: {e}")))?;

        let title = format!("{version} release");
        if let Some(open) = self.open_release_pull_request(&title).await? {
            info!(number = open, "Release PR is already open");
            return Ok(Preparation::AlreadyOpen { number: open });
        }

        let created = self
            .host
            .create_pull_request(NewPullRequest {
                title,
                body: pull_request_body(&branch, &log, &changed),
                head: branch.clone(),
                base: default_branch,
            })
            .await
            .map_err(|e| {
                Error::release(format!(
                    "Something went wrong with creating PR on {}: {e}",
                    self.host.name()
                ))
            })?;
        info!(number = created.number, url = %created.url, "Created release PR");

        if !record.labels.is_empty()
            && let Err(e) = self
                .host
                .add_labels(CommentTarget::PullRequest(created.number), &record.labels)
                .await
        {
            warn!(number = created.number, error = %e, "Failed to label release PR");
        }

        record.pr_number = Some(created.number);
        record.pr_url = Some(created.url.clone());
        Ok(Preparation::Created { url: created.url })
    }

    async fn prepare_branch(
        &self,
        record: &PullRequestRecord,
        version: &str,
        branch: &str,
        default_branch: &str,
    ) -> Result<(String, Vec<String>)> {
        let contact = self.host.user_contact().await?;
        self.repo.set_credentials(&contact).await?;
        self.repo.checkout(default_branch).await?;

        let previous = record
            .previous_version
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "0.0.0".to_string());
        let log = self.repo.log_since(&previous, self.gitchangelog).await?;

        self.repo.checkout_new_branch(branch).await?;
        let changed = look_for_version_files(self.repo.path(), version)?;
        if insert_in_changelog(&self.repo.path().join("CHANGELOG.md"), version, &log)? {
            self.repo.add(&["CHANGELOG.md".to_string()]).await?;
        }
        self.repo.add(&changed).await?;
        self.repo.commit(&format!("{version} release"), true).await?;
        self.repo.push(branch).await?;
        Ok((log, changed))
    }

    async fn open_release_pull_request(&self, title: &str) -> Result<Option<u64>> {
        let title = title.to_lowercase();
        Ok(self
            .host
            .pull_requests(PullRequestState::Open)
            .await?
            .into_iter()
            .find(|pr| pr.title.to_lowercase().starts_with(&title))
            .map(|pr| pr.number))
    }
}

/// Description of a release pull request.
#[must_use]
pub fn pull_request_body(branch: &str, log: &str, changed_version_files: &[String]) -> String {
    let mut body = format!(
        "Hi,\n you have requested a release PR from me. Here it is!\n\
         This is the changelog I created:\n\
         ### Changes\n{log}\n\n\
         You can change it by editing `CHANGELOG.md` in the root of this repository \
         and pushing to `{branch}` branch before merging this PR.\n"
    );
    match changed_version_files.len() {
        0 => body.push_str("I didn't find any files where `__version__` is set."),
        1 => body.push_str("I have also updated the `__version__` in file:\n"),
        _ => body.push_str("I have updated the `__version__` in these files, please check them:\n"),
    }
    for file in changed_version_files {
        let _ = writeln!(body, "* {file}");
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::PullRequest;
    use crate::testing::{FakeHost, FakeRepository};
    use crate::version::Version;

    fn record() -> PullRequestRecord {
        let mut record =
            PullRequestRecord::for_issue(Version::new(0, 2, 0), 3, 300, vec!["bot".to_string()]);
        record.previous_version = Some(Version::new(0, 1, 0));
        record
    }

    #[test]
    fn test_body_mentions_updated_files() {
        let body = pull_request_body("0.2.0-release", "* Fix", &["mypkg/__init__.py".to_string()]);
        assert!(body.contains("### Changes\n* Fix\n"));
        assert!(body.contains("pushing to `0.2.0-release` branch"));
        assert!(body.contains("in file:\n* mypkg/__init__.py\n"));

        let none = pull_request_body("0.2.0-release", "* Fix", &[]);
        assert!(none.ends_with("I didn't find any files where `__version__` is set."));
    }

    #[tokio::test]
    async fn test_prepare_creates_labelled_pull_request() {
        let host = FakeHost::new();
        let repo = FakeRepository::new();
        repo.set_log("* Add feature");
        let mut record = record();

        let preparation = PullRequestPreparer::new(&host, &repo)
            .prepare(&mut record)
            .await
            .unwrap();

        assert!(matches!(preparation, Preparation::Created { .. }));
        assert_eq!(record.pr_number, Some(1));
        let created = host.created_pull_requests();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].title, "0.2.0 release");
        assert_eq!(created[0].head, "0.2.0-release");
        assert_eq!(created[0].base, "master");
        assert!(created[0].body.contains("* Add feature"));
        assert_eq!(
            host.labels(CommentTarget::PullRequest(1)),
            vec!["bot".to_string()]
        );
        assert_eq!(repo.pushed(), vec!["0.2.0-release".to_string()]);
        assert_eq!(repo.current_branch(), "master");
    }

    #[tokio::test]
    async fn test_prepare_aborts_when_branch_exists() {
        let host = FakeHost::new().with_branch("0.2.0-release");
        let repo = FakeRepository::new();
        let mut record = record();

        let preparation = PullRequestPreparer::new(&host, &repo)
            .prepare(&mut record)
            .await
            .unwrap();
        assert_eq!(preparation, Preparation::BranchExists);
        assert!(host.created_pull_requests().is_empty());
        assert!(repo.pushed().is_empty());
    }

    #[tokio::test]
    async fn test_prepare_skips_when_pull_request_open() {
        let host = FakeHost::new().with_pull_request(PullRequest {
            number: 7,
            title: "0.2.0 Release".to_string(),
            ..PullRequest::default()
        });
        let repo = FakeRepository::new();
        let mut record = record();

        let preparation = PullRequestPreparer::new(&host, &repo)
            .prepare(&mut record)
            .await
            .unwrap();
        assert_eq!(preparation, Preparation::AlreadyOpen { number: 7 });
        assert!(host.created_pull_requests().is_empty());
    }

    #[tokio::test]
    async fn test_prepare_dry_run() {
        let host = FakeHost::new();
        let repo = FakeRepository::new();
        let mut record = record();

        let preparation = PullRequestPreparer::new(&host, &repo)
            .with_dry_run(DryRun::Yes)
            .prepare(&mut record)
            .await
            .unwrap();
        assert_eq!(preparation, Preparation::DryRun);
        assert!(repo.pushed().is_empty());
    }

    #[tokio::test]
    async fn test_prepare_push_failure_is_release_error() {
        let host = FakeHost::new();
        let repo = FakeRepository::new();
        repo.fail_push();
        let mut record = record();

        let err = PullRequestPreparer::new(&host, &repo)
            .prepare(&mut record)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Release { .. }));
        assert!(host.created_pull_requests().is_empty());
        assert_eq!(repo.current_branch(), "master");
    }
}
