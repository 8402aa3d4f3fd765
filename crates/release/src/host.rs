//! Source-forge surface the engine talks to.
//!
//! [`ProjectHost`] is the contract a forge integration implements. The
//! engine never talks to a forge API directly; `relbot-github` provides the
//! GitHub implementation.

use crate::error::Result;
use crate::version::Version;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// A release published on the forge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Release title.
    pub title: String,
    /// Git tag the release points at.
    pub tag_name: String,
    /// Release notes.
    pub body: String,
    /// Web URL of the release.
    pub url: String,
}

impl Release {
    /// The version this release names, read from the title and then the tag.
    #[must_use]
    pub fn version(&self) -> Option<Version> {
        Version::coerce(&self.title)
            .or_else(|_| Version::coerce(&self.tag_name))
            .ok()
    }
}

/// Highest version among `releases`, or `0.0.0` when none names a version.
#[must_use]
pub fn latest_version(releases: &[Release]) -> Version {
    releases
        .iter()
        .filter_map(Release::version)
        .max()
        .unwrap_or_default()
}

/// Issue state filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueState {
    /// Open issues.
    Open,
    /// Closed issues.
    Closed,
    /// All issues.
    All,
}

/// Pull request state filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PullRequestState {
    /// Open pull requests.
    Open,
    /// Closed pull requests, merged or not.
    Closed,
    /// Merged pull requests only.
    Merged,
    /// All pull requests.
    All,
}

/// An issue on the forge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Issue number within the repository.
    pub number: u64,
    /// Forge-internal identifier.
    pub id: u64,
    /// Issue title.
    pub title: String,
    /// Login of the author.
    pub author: String,
    /// Labels currently on the issue.
    pub labels: Vec<String>,
}

/// A pull request on the forge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Pull request number within the repository.
    pub number: u64,
    /// Pull request title.
    pub title: String,
    /// Login of the author.
    pub author: String,
    /// Web URL of the pull request.
    pub url: String,
    /// Source branch.
    pub head_branch: String,
    /// Whether the pull request has been merged.
    pub merged: bool,
}

/// Parameters for opening a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    /// Pull request title.
    pub title: String,
    /// Pull request description.
    pub body: String,
    /// Source branch.
    pub head: String,
    /// Target branch.
    pub base: String,
}

/// Name and email the bot commits as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContact {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

impl Default for UserContact {
    fn default() -> Self {
        Self {
            name: "Release bot".to_string(),
            email: "bot@releasebot.bot".to_string(),
        }
    }
}

/// Parameters for creating a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRelease {
    /// Tag to create.
    pub tag: String,
    /// Release title.
    pub name: String,
    /// Release notes.
    pub body: String,
    /// Commit-ish the tag points at.
    pub commitish: String,
}

/// Target of a forge comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommentTarget {
    /// An issue, by number.
    Issue(u64),
    /// A pull request, by number.
    PullRequest(u64),
}

impl fmt::Display for CommentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Issue(number) => write!(f, "issue #{number}"),
            Self::PullRequest(number) => write!(f, "PR #{number}"),
        }
    }
}

/// Operations the engine needs from a source-forge project.
///
/// Query failures must surface as [`crate::Error::RemoteUnavailable`].
/// Lists are returned newest first.
#[async_trait]
pub trait ProjectHost: Send + Sync {
    /// Human-readable forge name used in messages (e.g. "GitHub").
    fn name(&self) -> &str;

    /// All releases of the project.
    async fn releases(&self) -> Result<Vec<Release>>;

    /// The most recently published release, if any.
    async fn latest_release(&self) -> Result<Option<Release>>;

    /// Issues in the given state (pull requests excluded).
    async fn issues(&self, state: IssueState) -> Result<Vec<Issue>>;

    /// Pull requests in the given state.
    async fn pull_requests(&self, state: PullRequestState) -> Result<Vec<PullRequest>>;

    /// Content of a file in the repository, `None` when it does not exist.
    async fn file_content(&self, path: &str, reference: Option<&str>) -> Result<Option<String>>;

    /// Create a release.
    async fn create_release(&self, release: NewRelease) -> Result<Release>;

    /// Post a comment on an issue or pull request.
    async fn comment(&self, target: CommentTarget, body: &str) -> Result<()>;

    /// Close an issue.
    async fn close_issue(&self, number: u64) -> Result<()>;

    /// Add labels to an issue or pull request.
    async fn add_labels(&self, target: CommentTarget, labels: &[String]) -> Result<()>;

    /// Whether `user` may modify (label, comment on, close) `issue`.
    async fn can_modify_issue(&self, user: &str, issue: &Issue) -> Result<bool>;

    /// Names of all branches.
    async fn branches(&self) -> Result<Vec<String>>;

    /// Open a pull request.
    async fn create_pull_request(&self, pull_request: NewPullRequest) -> Result<PullRequest>;

    /// Name of the default branch.
    async fn default_branch(&self) -> Result<String>;

    /// Name and email of the authenticated account.
    async fn user_contact(&self) -> Result<UserContact>;
}

/// A [`ProjectHost`] that reads through to `inner` and only logs mutations.
///
/// Created releases and pull requests are synthesized from the request and
/// carry no URL.
pub struct DryRunHost {
    inner: Arc<dyn ProjectHost>,
}

impl DryRunHost {
    /// Wraps `inner`.
    #[must_use]
    pub const fn new(inner: Arc<dyn ProjectHost>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ProjectHost for DryRunHost {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn releases(&self) -> Result<Vec<Release>> {
        self.inner.releases().await
    }

    async fn latest_release(&self) -> Result<Option<Release>> {
        self.inner.latest_release().await
    }

    async fn issues(&self, state: IssueState) -> Result<Vec<Issue>> {
        self.inner.issues(state).await
    }

    async fn pull_requests(&self, state: PullRequestState) -> Result<Vec<PullRequest>> {
        self.inner.pull_requests(state).await
    }

    async fn file_content(&self, path: &str, reference: Option<&str>) -> Result<Option<String>> {
        self.inner.file_content(path, reference).await
    }

    async fn create_release(&self, release: NewRelease) -> Result<Release> {
        info!(tag = %release.tag, forge = self.name(), "[dry-run] Would create release");
        Ok(Release {
            title: release.name,
            tag_name: release.tag,
            body: release.body,
            url: String::new(),
        })
    }

    async fn comment(&self, target: CommentTarget, body: &str) -> Result<()> {
        info!(%target, body, "[dry-run] Would comment");
        Ok(())
    }

    async fn close_issue(&self, number: u64) -> Result<()> {
        info!(issue = number, "[dry-run] Would close issue");
        Ok(())
    }

    async fn add_labels(&self, target: CommentTarget, labels: &[String]) -> Result<()> {
        info!(%target, ?labels, "[dry-run] Would add labels");
        Ok(())
    }

    async fn can_modify_issue(&self, user: &str, issue: &Issue) -> Result<bool> {
        self.inner.can_modify_issue(user, issue).await
    }

    async fn branches(&self) -> Result<Vec<String>> {
        self.inner.branches().await
    }

    async fn create_pull_request(&self, pull_request: NewPullRequest) -> Result<PullRequest> {
        info!(head = %pull_request.head, base = %pull_request.base, "[dry-run] Would open pull request");
        Ok(PullRequest {
            title: pull_request.title,
            head_branch: pull_request.head,
            ..PullRequest::default()
        })
    }

    async fn default_branch(&self) -> Result<String> {
        self.inner.default_branch().await
    }

    async fn user_contact(&self) -> Result<UserContact> {
        self.inner.user_contact().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;

    fn release(title: &str) -> Release {
        Release {
            title: title.to_string(),
            tag_name: title.to_string(),
            ..Release::default()
        }
    }

    #[test]
    fn test_latest_version_picks_highest_title() {
        let releases = vec![release("0.9.0"), release("1.2.0"), release("1.10.0-rc1")];
        assert_eq!(
            latest_version(&releases),
            Version::new(1, 10, 0).with_prerelease("rc1")
        );
    }

    #[test]
    fn test_latest_version_without_releases() {
        assert_eq!(latest_version(&[]), Version::new(0, 0, 0));
        assert_eq!(latest_version(&[release("nightly")]), Version::new(0, 0, 0));
    }

    #[test]
    fn test_release_version_falls_back_to_tag() {
        let r = Release {
            title: "Spring release".to_string(),
            tag_name: "v2.1".to_string(),
            ..Release::default()
        };
        assert_eq!(r.version(), Some(Version::new(2, 1, 0)));
    }

    #[tokio::test]
    async fn test_dry_run_host_reads_through_and_skips_mutations() {
        let fake = Arc::new(
            FakeHost::new()
                .with_issue(20, "2.0.0 release")
                .with_file("release-conf.yaml", "labels: []\n"),
        );
        let host = DryRunHost::new(fake.clone());

        assert_eq!(host.issues(IssueState::Open).await.unwrap().len(), 1);
        assert!(host.file_content("release-conf.yaml", None).await.unwrap().is_some());

        host.comment(CommentTarget::Issue(20), "hello").await.unwrap();
        host.add_labels(CommentTarget::Issue(20), &["bot".to_string()])
            .await
            .unwrap();
        host.close_issue(20).await.unwrap();
        let release = host
            .create_release(NewRelease {
                tag: "2.0.0".to_string(),
                name: "2.0.0".to_string(),
                body: String::new(),
                commitish: "master".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(release.tag_name, "2.0.0");

        assert!(fake.comments().is_empty());
        assert!(!fake.has_labels());
        assert!(fake.closed_issues().is_empty());
        assert!(fake.created_releases().is_empty());
    }

    #[test]
    fn test_comment_target_display() {
        assert_eq!(CommentTarget::Issue(4).to_string(), "issue #4");
        assert_eq!(CommentTarget::PullRequest(12).to_string(), "PR #12");
    }
}
