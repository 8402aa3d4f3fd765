//! End-to-end release cycles with the PyPI backend against a mock index.

use relbot_pypi::{PackageIndex, PypiBackend};
use relbot_release::testing::{FakeHost, FakeRepository};
use relbot_release::{
    CommandRunner, CommentTarget, CoordinatorSettings, LocalRepository, ReleaseCoordinator,
    ReleaseOutcome,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SETUP_SCRIPT: &str = "mkdir -p dist\ntouch dist/mypkg-0.2.0.tar.gz\n";

async fn index_reporting(version: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pypi/mypkg/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"info": {"version": version}})))
        .mount(&server)
        .await;
    server
}

fn coordinator(
    host: &Arc<FakeHost>,
    repo: &Arc<FakeRepository>,
    server: &MockServer,
) -> ReleaseCoordinator {
    let index = PackageIndex::with_base_url(format!("{}/pypi", server.uri())).unwrap();
    let pypi = PypiBackend::new(index, repo.clone(), CommandRunner::default())
        .with_commands("sh", "echo");
    ReleaseCoordinator::new(
        host.clone(),
        repo.clone(),
        CoordinatorSettings::new("mypkg", "relbot"),
    )
    .with_backend(Box::new(pypi))
}

#[tokio::test]
async fn merged_pull_request_is_released_on_forge_and_index() {
    let server = index_reporting("0.1.0").await;
    let host = Arc::new(
        FakeHost::new()
            .with_release("0.1.0", "# 0.1.0")
            .with_merged_pull_request(8, "0.2.0 release", "octocat")
            .with_file("release-conf.yaml", "pypi: mypkg\n"),
    );
    let repo = Arc::new(FakeRepository::new());
    std::fs::write(repo.path().join("setup.py"), SETUP_SCRIPT).unwrap();

    let report = coordinator(&host, &repo, &server).run_cycle().await;

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(host.created_releases().len(), 1);
    assert!(
        report
            .outcomes
            .iter()
            .any(|(name, outcome)| name == "PyPI" && outcome.is_released())
    );
    assert_eq!(
        host.comments(),
        vec![(
            CommentTarget::PullRequest(8),
            "I just released version 0.2.0 on Forge\nI just released version 0.2.0 on PyPI"
                .to_string()
        )]
    );
    assert_eq!(repo.current_branch(), "master");
}

#[tokio::test]
async fn nothing_happens_once_forge_has_the_version() {
    let server = index_reporting("0.1.0").await;
    let host = Arc::new(
        FakeHost::new()
            .with_release("0.2.0", "# 0.2.0")
            .with_merged_pull_request(8, "0.2.0 release", "octocat")
            .with_file("release-conf.yaml", "pypi: mypkg\n"),
    );
    let repo = Arc::new(FakeRepository::new());
    std::fs::write(repo.path().join("setup.py"), SETUP_SCRIPT).unwrap();

    let report = coordinator(&host, &repo, &server).run_cycle().await;

    // The forge already has 0.2.0, so no merged PR is above its latest release.
    assert_eq!(report.release_version, None);
    assert!(host.created_releases().is_empty());
    assert!(repo.checkouts().is_empty());
}

#[tokio::test]
async fn disabled_index_is_skipped() {
    let server = index_reporting("0.1.0").await;
    let host = Arc::new(
        FakeHost::new()
            .with_release("0.1.0", "# 0.1.0")
            .with_merged_pull_request(8, "0.2.0 release", "octocat")
            .with_file("release-conf.yaml", "pypi: false\n"),
    );
    let repo = Arc::new(FakeRepository::new());

    let report = coordinator(&host, &repo, &server).run_cycle().await;

    assert!(report.outcomes.iter().any(|(name, outcome)| {
        name == "PyPI" && matches!(outcome, ReleaseOutcome::Skipped { .. })
    }));
    assert_eq!(repo.tag_fetches(), 0);
}
