//! PyPI JSON API client.

use relbot_release::{Error, Result, Version};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Base URL of the PyPI JSON API.
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/pypi";

const SYSTEM: &str = "PyPI";
const PROJECT_PAGE_URL: &str = "https://pypi.org/project";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    info: ProjectInfo,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    version: String,
}

/// Read access to a package index speaking the PyPI JSON API.
#[derive(Debug, Clone)]
pub struct PackageIndex {
    client: Client,
    base_url: String,
}

impl PackageIndex {
    /// Client for pypi.org.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_INDEX_URL)
    }

    /// Client for an index at `base_url` (e.g. a test server).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("relbot/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                Error::config(
                    format!("Failed to create HTTP client: {e}"),
                    "The TLS backend could not be initialized",
                )
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Latest version of `project`, `0.0.0` when the project does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteUnavailable`] when the index cannot be queried
    /// or answers with something other than project metadata.
    pub async fn latest_version(&self, project: &str) -> Result<Version> {
        let url = format!("{}/{project}/json", self.base_url);
        debug!(%url, "Fetching package index metadata");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::remote_unavailable(SYSTEM, format!("Failed to query {project}: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(project, "Project not on the package index yet");
            return Ok(Version::default());
        }
        if !response.status().is_success() {
            return Err(Error::remote_unavailable(
                SYSTEM,
                format!("Query for {project} failed (HTTP {})", response.status()),
            ));
        }

        let metadata: ProjectResponse = response.json().await.map_err(|e| {
            Error::remote_unavailable(SYSTEM, format!("Unreadable metadata for {project}: {e}"))
        })?;
        Version::coerce(&metadata.info.version).map_err(|_| {
            Error::remote_unavailable(
                SYSTEM,
                format!("{project} reports unparseable version {}", metadata.info.version),
            )
        })
    }

    /// Web page of `project` at `version`.
    #[must_use]
    pub fn project_url(project: &str, version: &str) -> String {
        format!("{PROJECT_PAGE_URL}/{project}/{version}/")
    }
}
