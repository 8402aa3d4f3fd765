//! Read access to Fedora dist-git over HTTPS.

use crate::spec::spec_version;
use relbot_release::{Error, Result, Version};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Base URL of Fedora dist-git.
pub const DEFAULT_DIST_GIT_URL: &str = "https://src.fedoraproject.org";

const SYSTEM: &str = "Fedora dist-git";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client reading packaged versions from dist-git.
#[derive(Debug, Clone)]
pub struct DistGit {
    client: Client,
    base_url: String,
}

impl DistGit {
    /// Client for src.fedoraproject.org.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_DIST_GIT_URL)
    }

    /// Client for a dist-git instance at `base_url`.
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

    /// Version in the spec file of `package` on `branch`.
    ///
    /// `0.0.0` when the package or branch does not exist, or when the
    /// version cannot be read literally (e.g. it is a macro).
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteUnavailable`] when dist-git cannot be queried.
    pub async fn packaged_version(&self, package: &str, branch: &str) -> Result<Version> {
        let url = format!(
            "{}/rpms/{package}/raw/{branch}/f/{package}.spec",
            self.base_url
        );
        debug!(%url, "Fetching packaged spec file");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::remote_unavailable(SYSTEM, format!("Failed to fetch {package}.spec: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(package, branch, "Package not in dist-git");
            return Ok(Version::default());
        }
        if !response.status().is_success() {
            return Err(Error::remote_unavailable(
                SYSTEM,
                format!("Fetching {package}.spec failed (HTTP {})", response.status()),
            ));
        }

        let content = response.text().await.map_err(|e| {
            Error::remote_unavailable(SYSTEM, format!("Failed to read {package}.spec: {e}"))
        })?;
        match spec_version(&content).map(Version::coerce) {
            Some(Ok(version)) => Ok(version),
            _ => {
                warn!(package, branch, "Cannot read the packaged version from the spec file");
                Ok(Version::default())
            }
        }
    }
}
