//! Integration tests for the GitHub project host.
//!
//! Pure helpers are tested directly; API calls run against a local mock
//! server standing in for `api.github.com`.

use relbot_github::project::permission_allows_issue_changes;
use relbot_github::{GitHubProject, parse_github_remote};
use relbot_release::ProjectHost;

/// Remote URLs as they appear in `conf.yaml` `clone_url` values.
mod remote_urls {
    use super::*;

    /// Both clone URL forms name the same repository.
    #[test]
    fn ssh_and_https_agree() {
        let ssh = parse_github_remote("git@github.com:user-cont/release-bot.git");
        let https = parse_github_remote("https://github.com/user-cont/release-bot.git");
        assert_eq!(ssh, https);
        assert!(ssh.is_some());
    }

    /// Non-GitHub hosts are not GitHub projects.
    #[test]
    fn other_forges_are_rejected() {
        for url in [
            "https://gitlab.com/owner/repo.git",
            "https://pagure.io/owner/repo.git",
            "git@gitlab.com:owner/repo.git",
        ] {
            assert!(parse_github_remote(url).is_none(), "{url} parsed");
        }
    }
}

/// Collaborator permission levels.
mod permissions {
    use super::*;

    #[test]
    fn maintainers_can_modify_issues() {
        for level in ["admin", "maintain", "write", "triage"] {
            assert!(permission_allows_issue_changes(level), "{level}");
        }
    }

    #[test]
    fn readers_cannot_modify_issues() {
        for level in ["read", "none", ""] {
            assert!(!permission_allows_issue_changes(level), "{level}");
        }
    }
}

#[tokio::test]
async fn project_is_named_github() {
    let project = GitHubProject::new("owner", "repo", "token").unwrap();
    assert_eq!(project.name(), "GitHub");
    assert_eq!(project.full_name(), "owner/repo");
}

/// API behaviour against a mock GitHub server.
mod api {
    use super::*;
    use octocrab::Octocrab;
    use relbot_release::host::{Issue, IssueState, PullRequestState};
    use serde_json::{Value, json};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const API: &str = "https://api.github.com";

    fn project(server: &MockServer) -> GitHubProject {
        let octocrab = Octocrab::builder()
            .base_uri(server.uri())
            .unwrap()
            .personal_token("token".to_string())
            .build()
            .unwrap();
        GitHubProject::with_client(octocrab, "owner", "repo")
    }

    fn user(login: &str) -> Value {
        let url = format!("{API}/users/{login}");
        json!({
            "login": login,
            "id": 1,
            "node_id": "MDQ6VXNlcjE=",
            "avatar_url": "https://avatars.githubusercontent.com/u/1",
            "gravatar_id": "",
            "url": url,
            "html_url": format!("https://github.com/{login}"),
            "followers_url": format!("{url}/followers"),
            "following_url": format!("{url}/following"),
            "gists_url": format!("{url}/gists"),
            "starred_url": format!("{url}/starred"),
            "subscriptions_url": format!("{url}/subscriptions"),
            "organizations_url": format!("{url}/orgs"),
            "repos_url": format!("{url}/repos"),
            "events_url": format!("{url}/events"),
            "received_events_url": format!("{url}/received_events"),
            "type": "User",
            "site_admin": false
        })
    }

    fn label(name: &str) -> Value {
        json!({
            "id": 208_045_946,
            "node_id": "MDU6TGFiZWwyMDgwNDU5NDY=",
            "url": format!("{API}/repos/owner/repo/labels/{name}"),
            "name": name,
            "description": null,
            "color": "f29513",
            "default": false
        })
    }

    fn issue(number: u64, title: &str, pull_request: bool) -> Value {
        let url = format!("{API}/repos/owner/repo/issues/{number}");
        let mut issue = json!({
            "id": 1000 + number,
            "node_id": "MDU6SXNzdWUx",
            "url": url,
            "repository_url": format!("{API}/repos/owner/repo"),
            "labels_url": format!("{url}/labels"),
            "comments_url": format!("{url}/comments"),
            "events_url": format!("{url}/events"),
            "html_url": format!("https://github.com/owner/repo/issues/{number}"),
            "number": number,
            "state": "open",
            "state_reason": null,
            "title": title,
            "body": null,
            "user": user("reporter"),
            "labels": [label("bot")],
            "assignee": null,
            "assignees": [],
            "milestone": null,
            "locked": false,
            "active_lock_reason": null,
            "comments": 0,
            "closed_at": null,
            "closed_by": null,
            "author_association": "CONTRIBUTOR",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        });
        if pull_request {
            let html = format!("https://github.com/owner/repo/pull/{number}");
            issue["pull_request"] = json!({
                "url": format!("{API}/repos/owner/repo/pulls/{number}"),
                "html_url": html,
                "diff_url": format!("{html}.diff"),
                "patch_url": format!("{html}.patch")
            });
        }
        issue
    }

    fn branch(name: &str) -> Value {
        json!({
            "label": format!("owner:{name}"),
            "ref": name,
            "sha": "6dcb09b5b57875f334f61aebed695e2e4193db5e",
            "user": user("owner"),
            "repo": null
        })
    }

    fn pull_request(number: u64, branch_name: &str, merged_at: Option<&str>) -> Value {
        let html = format!("https://github.com/owner/repo/pull/{number}");
        json!({
            "url": format!("{API}/repos/owner/repo/pulls/{number}"),
            "id": 2000 + number,
            "node_id": "MDExOlB1bGxSZXF1ZXN0MQ==",
            "html_url": html,
            "diff_url": format!("{html}.diff"),
            "patch_url": format!("{html}.patch"),
            "issue_url": format!("{API}/repos/owner/repo/issues/{number}"),
            "number": number,
            "state": "closed",
            "locked": false,
            "title": format!("{branch_name} release"),
            "user": user("contributor"),
            "body": null,
            "labels": [],
            "milestone": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z",
            "closed_at": "2024-01-02T00:00:00Z",
            "merged_at": merged_at,
            "merge_commit_sha": null,
            "assignee": null,
            "assignees": [],
            "requested_reviewers": [],
            "requested_teams": [],
            "draft": false,
            "author_association": "CONTRIBUTOR",
            "head": branch(branch_name),
            "base": branch("main")
        })
    }

    fn github_error(status: u16, message: &str) -> ResponseTemplate {
        ResponseTemplate::new(status).set_body_json(json!({
            "message": message,
            "documentation_url": "https://docs.github.com/rest"
        }))
    }

    async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn issue_listing_skips_pull_requests() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/repos/owner/repo/issues",
            ResponseTemplate::new(200).set_body_json(json!([
                issue(1, "0.1.0 release", false),
                issue(2, "Add feature", true),
            ])),
        )
        .await;

        let issues = project(&server).issues(IssueState::Open).await.unwrap();

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].number, 1);
        assert_eq!(issues[0].title, "0.1.0 release");
        assert_eq!(issues[0].author, "reporter");
        assert_eq!(issues[0].labels, vec!["bot".to_string()]);
    }

    #[tokio::test]
    async fn merged_listing_drops_closed_unmerged_pull_requests() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/repos/owner/repo/pulls",
            ResponseTemplate::new(200).set_body_json(json!([
                pull_request(3, "0.2.0-release", Some("2024-01-02T00:00:00Z")),
                pull_request(4, "abandoned", None),
            ])),
        )
        .await;
        let project = project(&server);

        let merged = project
            .pull_requests(PullRequestState::Merged)
            .await
            .unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].number, 3);
        assert_eq!(merged[0].head_branch, "0.2.0-release");
        assert!(merged[0].merged);

        let closed = project
            .pull_requests(PullRequestState::Closed)
            .await
            .unwrap();
        assert_eq!(closed.len(), 2);
    }

    #[tokio::test]
    async fn missing_file_is_none() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/repos/owner/repo/contents/release-conf.yaml",
            github_error(404, "Not Found"),
        )
        .await;

        let content = project(&server)
            .file_content("release-conf.yaml", None)
            .await
            .unwrap();
        assert!(content.is_none());
    }

    #[tokio::test]
    async fn file_content_is_decoded() {
        let server = MockServer::start().await;
        let url = format!("{API}/repos/owner/repo/contents/release-conf.yaml");
        mount(
            &server,
            "/repos/owner/repo/contents/release-conf.yaml",
            ResponseTemplate::new(200).set_body_json(json!({
                "type": "file",
                "encoding": "base64",
                "size": 18,
                "name": "release-conf.yaml",
                "path": "release-conf.yaml",
                "content": "YXV0aG9y\nX25hbWU6IEpvaG4K\n",
                "sha": "3d21ec53a331a6f037a91c368710b99387d012c1",
                "url": url,
                "git_url": format!("{API}/repos/owner/repo/git/blobs/3d21ec53"),
                "html_url": "https://github.com/owner/repo/blob/main/release-conf.yaml",
                "download_url": "https://raw.githubusercontent.com/owner/repo/main/release-conf.yaml",
                "_links": {
                    "git": format!("{API}/repos/owner/repo/git/blobs/3d21ec53"),
                    "self": url,
                    "html": "https://github.com/owner/repo/blob/main/release-conf.yaml"
                }
            })),
        )
        .await;

        let content = project(&server)
            .file_content("release-conf.yaml", None)
            .await
            .unwrap();
        assert_eq!(content.as_deref(), Some("author_name: John\n"));
    }

    #[tokio::test]
    async fn repository_without_releases_has_no_latest() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/repos/owner/repo/releases/latest",
            github_error(404, "Not Found"),
        )
        .await;

        let latest = project(&server).latest_release().await.unwrap();
        assert!(latest.is_none());
    }

    fn issue_by(author: &str) -> Issue {
        Issue {
            number: 1,
            id: 1001,
            title: "0.1.0 release".to_string(),
            author: author.to_string(),
            labels: Vec::new(),
        }
    }

    #[tokio::test]
    async fn issue_author_can_always_modify() {
        let server = MockServer::start().await;
        let allowed = project(&server)
            .can_modify_issue("reporter", &issue_by("reporter"))
            .await
            .unwrap();
        assert!(allowed);
    }

    #[tokio::test]
    async fn collaborator_permission_decides() {
        let server = MockServer::start().await;
        let permission = |level: &str| {
            ResponseTemplate::new(200).set_body_json(json!({
                "permission": level,
                "user": user("someone")
            }))
        };
        mount(
            &server,
            "/repos/owner/repo/collaborators/reader/permission",
            permission("read"),
        )
        .await;
        mount(
            &server,
            "/repos/owner/repo/collaborators/writer/permission",
            permission("write"),
        )
        .await;
        mount(
            &server,
            "/repos/owner/repo/collaborators/stranger/permission",
            github_error(404, "Not Found"),
        )
        .await;
        let project = project(&server);
        let issue = issue_by("reporter");

        assert!(!project.can_modify_issue("reader", &issue).await.unwrap());
        assert!(project.can_modify_issue("writer", &issue).await.unwrap());
        assert!(!project.can_modify_issue("stranger", &issue).await.unwrap());
    }

    #[tokio::test]
    async fn api_failures_are_remote_unavailable() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/repos/owner/repo/issues",
            github_error(403, "API rate limit exceeded"),
        )
        .await;
        mount(
            &server,
            "/repos/owner/repo/releases/latest",
            github_error(403, "API rate limit exceeded"),
        )
        .await;
        let project = project(&server);

        let err = project.issues(IssueState::Open).await.unwrap_err();
        assert!(err.is_remote_unavailable(), "{err}");
        let err = project.latest_release().await.unwrap_err();
        assert!(err.is_remote_unavailable(), "{err}");
    }
}
