//! [`ProjectHost`] implementation backed by the GitHub REST API.

use async_trait::async_trait;
use octocrab::models::pulls::PullRequest as GhPullRequest;
use octocrab::models::repos::Release as GhRelease;
use octocrab::{Octocrab, Page, params};
use relbot_release::host::{
    Issue, IssueState, NewPullRequest, NewRelease, PullRequest, PullRequestState, Release,
    UserContact,
};
use relbot_release::{CommentTarget, Error, ProjectHost, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

const SYSTEM: &str = "GitHub";
const PER_PAGE: u8 = 100;

/// Collaborator permission levels allowed to close and label issues.
const ISSUE_PERMISSIONS: &[&str] = &["admin", "maintain", "write", "triage"];

/// A GitHub repository acting as the bot's forge.
#[derive(Clone)]
pub struct GitHubProject {
    octocrab: Octocrab,
    owner: String,
    repo: String,
}

#[derive(Debug, Deserialize)]
struct CollaboratorPermission {
    permission: String,
}

#[derive(Debug, Deserialize)]
struct AuthenticatedUser {
    login: String,
    name: Option<String>,
    email: Option<String>,
}

impl GitHubProject {
    /// Creates a client for `owner/repo` authenticated with `token`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self> {
        let octocrab = Octocrab::builder()
            .personal_token(token.into())
            .build()
            .map_err(|e| {
                Error::config(
                    format!("Failed to build GitHub client: {e}"),
                    "Check github_token in conf.yaml",
                )
            })?;
        Ok(Self::with_client(octocrab, owner, repo))
    }

    /// Wraps an already configured client.
    #[must_use]
    pub fn with_client(
        octocrab: Octocrab,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            octocrab,
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// `owner/repo`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    async fn collect<T: DeserializeOwned>(&self, page: Page<T>) -> Result<Vec<T>> {
        self.octocrab.all_pages(page).await.map_err(unavailable)
    }
}

fn unavailable(error: octocrab::Error) -> Error {
    Error::remote_unavailable(SYSTEM, error.to_string())
}

fn is_not_found(error: &octocrab::Error) -> bool {
    matches!(error, octocrab::Error::GitHub { source, .. } if source.message.contains("Not Found"))
}

/// Whether a collaborator permission level allows closing and labelling issues.
#[must_use]
pub fn permission_allows_issue_changes(permission: &str) -> bool {
    ISSUE_PERMISSIONS.contains(&permission)
}

fn convert_release(release: GhRelease) -> Release {
    Release {
        title: release.name.unwrap_or_default(),
        tag_name: release.tag_name,
        body: release.body.unwrap_or_default(),
        url: release.html_url.to_string(),
    }
}

fn convert_pull_request(pr: GhPullRequest) -> PullRequest {
    PullRequest {
        number: pr.number,
        title: pr.title.unwrap_or_default(),
        author: pr.user.map(|user| user.login).unwrap_or_default(),
        url: pr.html_url.map(|url| url.to_string()).unwrap_or_default(),
        head_branch: pr.head.ref_field,
        merged: pr.merged_at.is_some(),
    }
}

const fn issue_state(state: IssueState) -> params::State {
    match state {
        IssueState::Open => params::State::Open,
        IssueState::Closed => params::State::Closed,
        IssueState::All => params::State::All,
    }
}

const fn pull_request_state(state: PullRequestState) -> params::State {
    match state {
        PullRequestState::Open => params::State::Open,
        PullRequestState::Closed | PullRequestState::Merged => params::State::Closed,
        PullRequestState::All => params::State::All,
    }
}

const fn target_number(target: CommentTarget) -> u64 {
    match target {
        CommentTarget::Issue(number) | CommentTarget::PullRequest(number) => number,
    }
}

#[async_trait]
impl ProjectHost for GitHubProject {
    fn name(&self) -> &str {
        SYSTEM
    }

    #[instrument(skip(self), fields(repo = %self.full_name()))]
    async fn releases(&self) -> Result<Vec<Release>> {
        let page = self
            .octocrab
            .repos(&self.owner, &self.repo)
            .releases()
            .list()
            .per_page(PER_PAGE)
            .send()
            .await
            .map_err(unavailable)?;
        let releases = self.collect(page).await?;
        debug!(count = releases.len(), "Fetched releases");
        Ok(releases.into_iter().map(convert_release).collect())
    }

    async fn latest_release(&self) -> Result<Option<Release>> {
        match self
            .octocrab
            .repos(&self.owner, &self.repo)
            .releases()
            .get_latest()
            .await
        {
            Ok(release) => Ok(Some(convert_release(release))),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(unavailable(e)),
        }
    }

    #[instrument(skip(self), fields(repo = %self.full_name()))]
    async fn issues(&self, state: IssueState) -> Result<Vec<Issue>> {
        let page = self
            .octocrab
            .issues(&self.owner, &self.repo)
            .list()
            .state(issue_state(state))
            .per_page(PER_PAGE)
            .send()
            .await
            .map_err(unavailable)?;
        let issues = self.collect(page).await?;
        Ok(issues
            .into_iter()
            .filter(|issue| issue.pull_request.is_none())
            .map(|issue| Issue {
                number: issue.number,
                id: issue.id.0,
                title: issue.title,
                author: issue.user.login,
                labels: issue.labels.into_iter().map(|label| label.name).collect(),
            })
            .collect())
    }

    #[instrument(skip(self), fields(repo = %self.full_name()))]
    async fn pull_requests(&self, state: PullRequestState) -> Result<Vec<PullRequest>> {
        let page = self
            .octocrab
            .pulls(&self.owner, &self.repo)
            .list()
            .state(pull_request_state(state))
            .per_page(PER_PAGE)
            .send()
            .await
            .map_err(unavailable)?;
        let pulls = self
            .collect(page)
            .await?
            .into_iter()
            .map(convert_pull_request);
        Ok(match state {
            PullRequestState::Merged => pulls.filter(|pr| pr.merged).collect(),
            _ => pulls.collect(),
        })
    }

    async fn file_content(&self, path: &str, reference: Option<&str>) -> Result<Option<String>> {
        let repos = self.octocrab.repos(&self.owner, &self.repo);
        let mut request = repos.get_content().path(path);
        if let Some(reference) = reference {
            request = request.r#ref(reference);
        }
        match request.send().await {
            Ok(content) => Ok(content
                .items
                .into_iter()
                .next()
                .and_then(|item| item.decoded_content())),
            Err(e) if is_not_found(&e) => {
                debug!(path, reference, "File not found");
                Ok(None)
            }
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn create_release(&self, release: NewRelease) -> Result<Release> {
        let created = self
            .octocrab
            .repos(&self.owner, &self.repo)
            .releases()
            .create(&release.tag)
            .name(&release.name)
            .body(&release.body)
            .target_commitish(&release.commitish)
            .send()
            .await
            .map_err(unavailable)?;
        Ok(convert_release(created))
    }

    async fn comment(&self, target: CommentTarget, body: &str) -> Result<()> {
        self.octocrab
            .issues(&self.owner, &self.repo)
            .create_comment(target_number(target), body)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn close_issue(&self, number: u64) -> Result<()> {
        self.octocrab
            .issues(&self.owner, &self.repo)
            .update(number)
            .state(octocrab::models::IssueState::Closed)
            .send()
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn add_labels(&self, target: CommentTarget, labels: &[String]) -> Result<()> {
        self.octocrab
            .issues(&self.owner, &self.repo)
            .add_labels(target_number(target), labels)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn can_modify_issue(&self, user: &str, issue: &Issue) -> Result<bool> {
        if issue.author == user {
            return Ok(true);
        }
        let route = format!(
            "/repos/{}/{}/collaborators/{user}/permission",
            self.owner, self.repo
        );
        match self
            .octocrab
            .get::<CollaboratorPermission, _, ()>(route, None)
            .await
        {
            Ok(level) => Ok(permission_allows_issue_changes(&level.permission)),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn branches(&self) -> Result<Vec<String>> {
        let page = self
            .octocrab
            .repos(&self.owner, &self.repo)
            .list_branches()
            .per_page(PER_PAGE)
            .send()
            .await
            .map_err(unavailable)?;
        Ok(self
            .collect(page)
            .await?
            .into_iter()
            .map(|branch| branch.name)
            .collect())
    }

    async fn create_pull_request(&self, pull_request: NewPullRequest) -> Result<PullRequest> {
        let created = self
            .octocrab
            .pulls(&self.owner, &self.repo)
            .create(&pull_request.title, &pull_request.head, &pull_request.base)
            .body(&pull_request.body)
            .send()
            .await
            .map_err(unavailable)?;
        Ok(convert_pull_request(created))
    }

    async fn default_branch(&self) -> Result<String> {
        let repository = self
            .octocrab
            .repos(&self.owner, &self.repo)
            .get()
            .await
            .map_err(unavailable)?;
        Ok(repository
            .default_branch
            .unwrap_or_else(|| "master".to_string()))
    }

    async fn user_contact(&self) -> Result<UserContact> {
        let user: AuthenticatedUser = self
            .octocrab
            .get("/user", None::<&()>)
            .await
            .map_err(unavailable)?;
        let fallback = UserContact::default();
        Ok(UserContact {
            name: user.name.unwrap_or(user.login),
            email: user.email.unwrap_or(fallback.email),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_levels() {
        assert!(permission_allows_issue_changes("admin"));
        assert!(permission_allows_issue_changes("write"));
        assert!(permission_allows_issue_changes("triage"));
        assert!(!permission_allows_issue_changes("read"));
        assert!(!permission_allows_issue_changes("none"));
    }

    #[test]
    fn test_merged_state_lists_closed_pull_requests() {
        assert!(matches!(
            pull_request_state(PullRequestState::Merged),
            params::State::Closed
        ));
        assert!(matches!(issue_state(IssueState::Open), params::State::Open));
    }

    #[test]
    fn test_comment_target_number() {
        assert_eq!(target_number(CommentTarget::Issue(3)), 3);
        assert_eq!(target_number(CommentTarget::PullRequest(9)), 9);
    }

    #[tokio::test]
    async fn test_project_full_name() {
        let project = GitHubProject::new("user-cont", "release-bot", "token").unwrap();
        assert_eq!(project.full_name(), "user-cont/release-bot");
        assert_eq!(project.name(), "GitHub");
    }
}
