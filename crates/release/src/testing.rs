//! In-memory fakes of the engine's collaborators.
//!
//! Available to this crate's tests and, with the `testing` feature, to the
//! tests of downstream crates.

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use crate::backends::{BackendContext, ReleaseBackend, ReleaseOutcome};
use crate::error::{Error, Result};
use crate::host::{
    CommentTarget, Issue, IssueState, NewPullRequest, NewRelease, ProjectHost, PullRequest,
    PullRequestState, Release, UserContact,
};
use crate::records::ReleaseRecord;
use crate::repository::LocalRepository;
use crate::version::Version;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

#[derive(Debug)]
struct HostState {
    releases: Vec<Release>,
    issues: Vec<(Issue, bool)>,
    pull_requests: Vec<(PullRequest, bool)>,
    files: HashMap<(String, Option<String>), String>,
    branches: Vec<String>,
    default_branch: String,
    comments: Vec<(CommentTarget, String)>,
    labels: BTreeMap<CommentTarget, Vec<String>>,
    closed_issues: Vec<u64>,
    created_releases: Vec<NewRelease>,
    created_pull_requests: Vec<NewPullRequest>,
    denied_users: Vec<String>,
    unavailable: bool,
    fail_release_creation: bool,
}

/// In-memory [`ProjectHost`].
///
/// Lists are kept newest first. Created pull requests get the next free
/// number after every known issue and pull request.
#[derive(Debug)]
pub struct FakeHost {
    name: String,
    state: Mutex<HostState>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeHost {
    /// Creates an empty project with a `master` default branch.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "Forge".to_string(),
            state: Mutex::new(HostState {
                releases: Vec::new(),
                issues: Vec::new(),
                pull_requests: Vec::new(),
                files: HashMap::new(),
                branches: vec!["master".to_string()],
                default_branch: "master".to_string(),
                comments: Vec::new(),
                labels: BTreeMap::new(),
                closed_issues: Vec::new(),
                created_releases: Vec::new(),
                created_pull_requests: Vec::new(),
                denied_users: Vec::new(),
                unavailable: false,
                fail_release_creation: false,
            }),
        }
    }

    /// Adds a published release.
    #[must_use]
    pub fn with_release(self, title: &str, body: &str) -> Self {
        self.state.lock().unwrap().releases.insert(
            0,
            Release {
                title: title.to_string(),
                tag_name: title.to_string(),
                body: body.to_string(),
                url: format!("https://forge.example/releases/{title}"),
            },
        );
        self
    }

    /// Adds an open issue.
    #[must_use]
    pub fn with_issue(self, number: u64, title: &str) -> Self {
        let issue = Issue {
            number,
            id: number * 100,
            title: title.to_string(),
            author: "reporter".to_string(),
            labels: Vec::new(),
        };
        self.state.lock().unwrap().issues.insert(0, (issue, true));
        self
    }

    /// Adds a pull request; it is open unless `merged` is set.
    #[must_use]
    pub fn with_pull_request(self, pull_request: PullRequest) -> Self {
        let open = !pull_request.merged;
        self.state
            .lock()
            .unwrap()
            .pull_requests
            .insert(0, (pull_request, open));
        self
    }

    /// Adds a merged pull request.
    #[must_use]
    pub fn with_merged_pull_request(self, number: u64, title: &str, author: &str) -> Self {
        self.with_pull_request(PullRequest {
            number,
            title: title.to_string(),
            author: author.to_string(),
            url: format!("https://forge.example/pull/{number}"),
            head_branch: String::new(),
            merged: true,
        })
    }

    /// Adds a branch.
    #[must_use]
    pub fn with_branch(self, branch: &str) -> Self {
        self.state.lock().unwrap().branches.push(branch.to_string());
        self
    }

    /// Adds a repository file.
    #[must_use]
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.set_file(path, None, content);
        self
    }

    /// Sets a file on `reference`, or on the default branch when `None`.
    pub fn set_file(&self, path: &str, reference: Option<&str>, content: &str) {
        self.state.lock().unwrap().files.insert(
            (path.to_string(), reference.map(str::to_string)),
            content.to_string(),
        );
    }

    /// Refuse modifications by `user`.
    #[must_use]
    pub fn deny_user(self, user: &str) -> Self {
        self.state.lock().unwrap().denied_users.push(user.to_string());
        self
    }

    /// Make every query fail with [`Error::RemoteUnavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    /// Make release creation fail.
    pub fn fail_release_creation(&self) {
        self.state.lock().unwrap().fail_release_creation = true;
    }

    /// Comments posted so far.
    #[must_use]
    pub fn comments(&self) -> Vec<(CommentTarget, String)> {
        self.state.lock().unwrap().comments.clone()
    }

    /// Labels added to `target`.
    #[must_use]
    pub fn labels(&self, target: CommentTarget) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .labels
            .get(&target)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether any labels were added anywhere.
    #[must_use]
    pub fn has_labels(&self) -> bool {
        !self.state.lock().unwrap().labels.is_empty()
    }

    /// Numbers of closed issues.
    #[must_use]
    pub fn closed_issues(&self) -> Vec<u64> {
        self.state.lock().unwrap().closed_issues.clone()
    }

    /// Releases created through this host.
    #[must_use]
    pub fn created_releases(&self) -> Vec<NewRelease> {
        self.state.lock().unwrap().created_releases.clone()
    }

    /// Pull requests created through this host.
    #[must_use]
    pub fn created_pull_requests(&self) -> Vec<NewPullRequest> {
        self.state.lock().unwrap().created_pull_requests.clone()
    }

    fn check_available(&self) -> Result<()> {
        if self.state.lock().unwrap().unavailable {
            Err(Error::remote_unavailable(&self.name, "connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProjectHost for FakeHost {
    fn name(&self) -> &str {
        &self.name
    }

    async fn releases(&self) -> Result<Vec<Release>> {
        self.check_available()?;
        Ok(self.state.lock().unwrap().releases.clone())
    }

    async fn latest_release(&self) -> Result<Option<Release>> {
        self.check_available()?;
        Ok(self.state.lock().unwrap().releases.first().cloned())
    }

    async fn issues(&self, state: IssueState) -> Result<Vec<Issue>> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .issues
            .iter()
            .filter(|(_, open)| match state {
                IssueState::Open => *open,
                IssueState::Closed => !*open,
                IssueState::All => true,
            })
            .map(|(issue, _)| issue.clone())
            .collect())
    }

    async fn pull_requests(&self, state: PullRequestState) -> Result<Vec<PullRequest>> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .pull_requests
            .iter()
            .filter(|(pr, open)| match state {
                PullRequestState::Open => *open,
                PullRequestState::Closed => !*open,
                PullRequestState::Merged => pr.merged,
                PullRequestState::All => true,
            })
            .map(|(pr, _)| pr.clone())
            .collect())
    }

    async fn file_content(&self, path: &str, reference: Option<&str>) -> Result<Option<String>> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .files
            .get(&(path.to_string(), reference.map(str::to_string)))
            .cloned())
    }

    async fn create_release(&self, release: NewRelease) -> Result<Release> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        if state.fail_release_creation {
            return Err(Error::remote_unavailable(&self.name, "422 Unprocessable Entity"));
        }
        let created = Release {
            title: release.name.clone(),
            tag_name: release.tag.clone(),
            body: release.body.clone(),
            url: format!("https://forge.example/releases/{}", release.tag),
        };
        state.releases.insert(0, created.clone());
        state.created_releases.push(release);
        Ok(created)
    }

    async fn comment(&self, target: CommentTarget, body: &str) -> Result<()> {
        self.check_available()?;
        self.state
            .lock()
            .unwrap()
            .comments
            .push((target, body.to_string()));
        Ok(())
    }

    async fn close_issue(&self, number: u64) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        for (issue, open) in &mut state.issues {
            if issue.number == number {
                *open = false;
            }
        }
        state.closed_issues.push(number);
        Ok(())
    }

    async fn add_labels(&self, target: CommentTarget, labels: &[String]) -> Result<()> {
        self.check_available()?;
        self.state
            .lock()
            .unwrap()
            .labels
            .entry(target)
            .or_default()
            .extend(labels.iter().cloned());
        Ok(())
    }

    async fn can_modify_issue(&self, user: &str, _issue: &Issue) -> Result<bool> {
        self.check_available()?;
        Ok(!self
            .state
            .lock()
            .unwrap()
            .denied_users
            .iter()
            .any(|u| u == user))
    }

    async fn branches(&self) -> Result<Vec<String>> {
        self.check_available()?;
        Ok(self.state.lock().unwrap().branches.clone())
    }

    async fn create_pull_request(&self, pull_request: NewPullRequest) -> Result<PullRequest> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        let number = state
            .issues
            .iter()
            .map(|(issue, _)| issue.number)
            .chain(state.pull_requests.iter().map(|(pr, _)| pr.number))
            .max()
            .unwrap_or(0)
            + 1;
        let created = PullRequest {
            number,
            title: pull_request.title.clone(),
            author: "relbot".to_string(),
            url: format!("https://forge.example/pull/{number}"),
            head_branch: pull_request.head.clone(),
            merged: false,
        };
        state.pull_requests.insert(0, (created.clone(), true));
        state.created_pull_requests.push(pull_request);
        Ok(created)
    }

    async fn default_branch(&self) -> Result<String> {
        self.check_available()?;
        Ok(self.state.lock().unwrap().default_branch.clone())
    }

    async fn user_contact(&self) -> Result<UserContact> {
        self.check_available()?;
        Ok(UserContact::default())
    }
}

#[derive(Debug, Default)]
struct RepositoryState {
    log: String,
    branch: String,
    checkouts: Vec<String>,
    added: Vec<String>,
    commits: Vec<String>,
    pushed: Vec<String>,
    pulls: usize,
    tag_fetches: usize,
    cleaned: bool,
    fail_push: bool,
}

/// In-memory [`LocalRepository`] over a real temporary working tree.
///
/// File operations touch the temporary directory; git operations are
/// recorded.
#[derive(Debug)]
pub struct FakeRepository {
    dir: TempDir,
    state: Mutex<RepositoryState>,
}

impl Default for FakeRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRepository {
    /// Creates a repository on `master` with an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            state: Mutex::new(RepositoryState {
                branch: "master".to_string(),
                ..RepositoryState::default()
            }),
        }
    }

    /// Sets the text returned by `log_since`.
    pub fn set_log(&self, log: &str) {
        self.state.lock().unwrap().log = log.to_string();
    }

    /// Make `push` fail.
    pub fn fail_push(&self) {
        self.state.lock().unwrap().fail_push = true;
    }

    /// The checked-out branch or tag.
    #[must_use]
    pub fn current_branch(&self) -> String {
        self.state.lock().unwrap().branch.clone()
    }

    /// Every reference checked out, in order.
    #[must_use]
    pub fn checkouts(&self) -> Vec<String> {
        self.state.lock().unwrap().checkouts.clone()
    }

    /// Branches pushed.
    #[must_use]
    pub fn pushed(&self) -> Vec<String> {
        self.state.lock().unwrap().pushed.clone()
    }

    /// Commit messages.
    #[must_use]
    pub fn commits(&self) -> Vec<String> {
        self.state.lock().unwrap().commits.clone()
    }

    /// Paths staged.
    #[must_use]
    pub fn added(&self) -> Vec<String> {
        self.state.lock().unwrap().added.clone()
    }

    /// Number of pulls.
    #[must_use]
    pub fn pulls(&self) -> usize {
        self.state.lock().unwrap().pulls
    }

    /// Number of tag fetches.
    #[must_use]
    pub fn tag_fetches(&self) -> usize {
        self.state.lock().unwrap().tag_fetches
    }

    /// Whether `cleanup` ran.
    #[must_use]
    pub fn cleaned(&self) -> bool {
        self.state.lock().unwrap().cleaned
    }
}

#[async_trait]
impl LocalRepository for FakeRepository {
    fn path(&self) -> &Path {
        self.dir.path()
    }

    async fn pull(&self) -> Result<()> {
        self.state.lock().unwrap().pulls += 1;
        Ok(())
    }

    async fn fetch_tags(&self) -> Result<()> {
        self.state.lock().unwrap().tag_fetches += 1;
        Ok(())
    }

    async fn checkout(&self, reference: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.branch = reference.to_string();
        state.checkouts.push(reference.to_string());
        Ok(())
    }

    async fn checkout_new_branch(&self, branch: &str) -> Result<()> {
        self.checkout(branch).await
    }

    async fn add(&self, paths: &[String]) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .added
            .extend(paths.iter().cloned());
        Ok(())
    }

    async fn commit(&self, message: &str, _allow_empty: bool) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .commits
            .push(message.to_string());
        Ok(())
    }

    async fn push(&self, branch: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_push {
            return Err(Error::git(format!("failed to push {branch}")));
        }
        state.pushed.push(branch.to_string());
        Ok(())
    }

    async fn log_since(&self, _previous: &str, _gitchangelog: bool) -> Result<String> {
        Ok(self.state.lock().unwrap().log.clone())
    }

    async fn set_credentials(&self, _contact: &UserContact) -> Result<()> {
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        self.state.lock().unwrap().cleaned = true;
        Ok(())
    }
}

/// Scripted [`ReleaseBackend`] that records what it publishes.
#[derive(Debug)]
pub struct FakeBackend {
    name: String,
    latest: Mutex<Version>,
    published: Mutex<Vec<Version>>,
    fail: bool,
    unavailable: bool,
}

impl FakeBackend {
    /// Creates a backend whose latest version is `latest`.
    #[must_use]
    pub fn new(name: &str, latest: Version) -> Self {
        Self {
            name: name.to_string(),
            latest: Mutex::new(latest),
            published: Mutex::new(Vec::new()),
            fail: false,
            unavailable: false,
        }
    }

    /// Make `publish` fail.
    #[must_use]
    pub const fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Make version queries fail.
    #[must_use]
    pub const fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Versions published so far.
    #[must_use]
    pub fn published(&self) -> Vec<Version> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReleaseBackend for FakeBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn latest_released_version(&self, _record: &ReleaseRecord) -> Result<Version> {
        if self.unavailable {
            return Err(Error::remote_unavailable(&self.name, "timed out"));
        }
        Ok(self.latest.lock().unwrap().clone())
    }

    async fn publish(&self, _ctx: &BackendContext, record: &ReleaseRecord) -> Result<ReleaseOutcome> {
        if self.fail {
            return Err(Error::release(format!("upload to {} failed", self.name)));
        }
        let version = record
            .version
            .clone()
            .ok_or_else(|| Error::release("no version"))?;
        *self.latest.lock().unwrap() = version.clone();
        self.published.lock().unwrap().push(version);
        Ok(ReleaseOutcome::Released { url: None })
    }
}
