//! [`ReleaseBackend`] publishing Python distributions to PyPI.

use crate::index::PackageIndex;
use async_trait::async_trait;
use relbot_release::backends::{BackendContext, ReleaseBackend, ReleaseOutcome};
use relbot_release::{CommandRunner, Error, LocalRepository, ReleaseRecord, Result, Version};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

const SETUP_PY: &str = "setup.py";
const DIST_DIR: &str = "dist";

/// Publishes the tagged release of a Python project to PyPI.
///
/// Publishing checks out the release tag in the local clone, builds source
/// and wheel distributions and uploads them with `twine`. The clone is
/// returned to the default branch afterwards, whatever the outcome.
pub struct PypiBackend {
    index: PackageIndex,
    repo: Arc<dyn LocalRepository>,
    runner: CommandRunner,
    python: String,
    twine: String,
}

impl PypiBackend {
    /// Creates a backend building in `repo`.
    #[must_use]
    pub fn new(index: PackageIndex, repo: Arc<dyn LocalRepository>, runner: CommandRunner) -> Self {
        Self {
            index,
            repo,
            runner,
            python: "python3".to_string(),
            twine: "twine".to_string(),
        }
    }

    /// Overrides the interpreter and upload programs.
    #[must_use]
    pub fn with_commands(mut self, python: impl Into<String>, twine: impl Into<String>) -> Self {
        self.python = python.into();
        self.twine = twine.into();
        self
    }

    fn project<'a>(&self, record: &'a ReleaseRecord) -> Result<&'a str> {
        record.package_index_project.as_deref().ok_or_else(|| {
            Error::config(
                "No package index project name for this release",
                "Set `pypi` to the project name in release-conf.yaml or add [metadata] name to setup.cfg",
            )
        })
    }

    /// Builds distributions in the clone and uploads them.
    async fn build_and_upload(&self) -> Result<Vec<String>> {
        let dir = self.repo.path();
        if !dir.join(SETUP_PY).is_file() {
            return Err(Error::release(format!("{SETUP_PY} not found in the repository")));
        }

        let dist = dir.join(DIST_DIR);
        if dist.exists() {
            tokio::fs::remove_dir_all(&dist).await?;
        }
        self.runner
            .run(&self.python, &[SETUP_PY, "sdist", "bdist_wheel"], Some(dir))
            .await?;

        let files = distributions(&dist)?;
        if files.is_empty() {
            return Err(Error::release("No distributions were built"));
        }
        let mut args = vec!["upload"];
        args.extend(files.iter().map(String::as_str));
        self.runner.run(&self.twine, &args, Some(dir)).await?;
        Ok(files)
    }
}

/// Built distribution files, relative to the repository root.
fn distributions(dist: &Path) -> Result<Vec<String>> {
    if !dist.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dist)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(format!("{DIST_DIR}/{}", entry.file_name().to_string_lossy()));
        }
    }
    files.sort();
    Ok(files)
}

#[async_trait]
impl ReleaseBackend for PypiBackend {
    fn name(&self) -> &str {
        "PyPI"
    }

    fn skip_reason(&self, record: &ReleaseRecord) -> Option<String> {
        (!record.publish_to_package_index)
            .then(|| "PyPI release disabled in release-conf.yaml".to_string())
    }

    async fn latest_released_version(&self, record: &ReleaseRecord) -> Result<Version> {
        self.index.latest_version(self.project(record)?).await
    }

    #[instrument(skip_all, fields(version = %record.version_string()))]
    async fn publish(&self, ctx: &BackendContext, record: &ReleaseRecord) -> Result<ReleaseOutcome> {
        let project = self.project(record)?;
        let version = record.version_string();

        self.repo.fetch_tags().await?;
        self.repo.checkout(&version).await.map_err(|e| {
            Error::release(format!("Tag {version} is not available for the PyPI release: {e}"))
        })?;
        let uploaded = self.build_and_upload().await;
        if let Err(e) = self.repo.checkout(&ctx.default_branch).await {
            warn!(branch = %ctx.default_branch, error = %e, "Failed to return to the default branch");
        }

        let files = uploaded.map_err(|e| {
            Error::release(format!("Failed to release {project} {version} on PyPI: {e}"))
        })?;
        info!(project, files = ?files, "Uploaded distributions");
        Ok(ReleaseOutcome::released(PackageIndex::project_url(project, &version)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relbot_release::testing::FakeRepository;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// A `setup.py` that `sh` can run to produce distributions.
    const FAKE_SETUP: &str = "mkdir -p dist\ntouch dist/mypkg-0.2.0.tar.gz dist/mypkg-0.2.0-py3-none-any.whl\n";

    fn record() -> ReleaseRecord {
        ReleaseRecord {
            version: Some(Version::new(0, 2, 0)),
            publish_to_package_index: true,
            package_index_project: Some("mypkg".to_string()),
            ..ReleaseRecord::default()
        }
    }

    async fn server_with_version(version: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pypi/mypkg/json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"info": {"version": version}})),
            )
            .mount(&server)
            .await;
        server
    }

    fn backend(server: &MockServer, repo: Arc<FakeRepository>) -> PypiBackend {
        let index = PackageIndex::with_base_url(format!("{}/pypi", server.uri())).unwrap();
        PypiBackend::new(index, repo, CommandRunner::default()).with_commands("sh", "echo")
    }

    #[test]
    fn test_disabled_release_is_skipped() {
        let disabled = ReleaseRecord {
            publish_to_package_index: false,
            ..record()
        };
        let index = PackageIndex::new().unwrap();
        let backend =
            PypiBackend::new(index, Arc::new(FakeRepository::new()), CommandRunner::default());
        assert!(backend.skip_reason(&disabled).is_some());
        assert!(backend.skip_reason(&record()).is_none());
    }

    #[tokio::test]
    async fn test_publish_builds_from_tag_and_returns_to_default_branch() {
        let server = server_with_version("0.1.0").await;
        let repo = Arc::new(FakeRepository::new());
        std::fs::write(repo.path().join(SETUP_PY), FAKE_SETUP).unwrap();
        let backend = backend(&server, repo.clone());

        let outcome = backend
            .release(&BackendContext::new("main"), &record())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReleaseOutcome::released("https://pypi.org/project/mypkg/0.2.0/")
        );
        assert_eq!(repo.tag_fetches(), 1);
        assert_eq!(repo.checkouts(), vec!["0.2.0".to_string(), "main".to_string()]);
        assert!(repo.path().join("dist/mypkg-0.2.0.tar.gz").exists());
    }

    #[tokio::test]
    async fn test_already_released_does_not_build() {
        let server = server_with_version("0.2.0").await;
        let repo = Arc::new(FakeRepository::new());
        let backend = backend(&server, repo.clone());

        let outcome = backend
            .release(&BackendContext::default(), &record())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReleaseOutcome::AlreadyReleased {
                latest: Version::new(0, 2, 0)
            }
        );
        assert!(repo.checkouts().is_empty());
    }

    #[tokio::test]
    async fn test_missing_setup_py_fails_and_restores_branch() {
        let server = server_with_version("0.1.0").await;
        let repo = Arc::new(FakeRepository::new());
        let backend = backend(&server, repo.clone());

        let err = backend
            .release(&BackendContext::default(), &record())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Release { .. }));
        assert!(err.to_string().contains("setup.py not found"));
        assert_eq!(repo.current_branch(), "master");
    }

    #[tokio::test]
    async fn test_failed_build_is_release_error() {
        let server = server_with_version("0.1.0").await;
        let repo = Arc::new(FakeRepository::new());
        std::fs::write(repo.path().join(SETUP_PY), "exit 3\n").unwrap();
        let backend = backend(&server, repo.clone());

        let err = backend
            .release(&BackendContext::default(), &record())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to release mypkg 0.2.0 on PyPI"));
        assert_eq!(repo.current_branch(), "master");
    }

    #[test]
    fn test_distributions_are_sorted_and_relative() {
        let dir = tempfile::tempdir().unwrap();
        let dist = dir.path().join(DIST_DIR);
        std::fs::create_dir(&dist).unwrap();
        std::fs::write(dist.join("b.whl"), "").unwrap();
        std::fs::write(dist.join("a.tar.gz"), "").unwrap();
        assert_eq!(
            distributions(&dist).unwrap(),
            vec!["dist/a.tar.gz".to_string(), "dist/b.whl".to_string()]
        );
        assert!(distributions(&dir.path().join("missing")).unwrap().is_empty());
    }
}
