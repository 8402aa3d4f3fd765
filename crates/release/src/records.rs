//! Per-cycle release state.
//!
//! Both records are created fresh at the start of every polling cycle and
//! owned by the coordinator until the cycle ends. Nothing is persisted
//! between cycles; remote state is the source of truth.

use crate::config::ReleaseConf;
use crate::version::Version;

/// An in-flight release, populated from `release-conf.yaml` and a merged release PR.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseRecord {
    /// Version being released; unset until a merged release PR is matched.
    pub version: Option<Version>,
    /// Changelog entries from the release configuration.
    pub changelog: Vec<String>,
    /// Release author name.
    pub author_name: Option<String>,
    /// Release author email.
    pub author_email: Option<String>,
    /// Whether to publish to the package index.
    pub publish_to_package_index: bool,
    /// Package index project name override.
    pub package_index_project: Option<String>,
    /// Whether open issues may trigger release pull requests.
    pub trigger_on_issue: bool,
    /// Labels applied to release issues and pull requests.
    pub labels: Vec<String>,
    /// Commit-ish the release tag points at.
    pub commitish: Option<String>,
    /// Number of the merged release pull request.
    pub pr_number: Option<u64>,
    /// Whether to mirror the release into distro packaging.
    pub distro_packaging: bool,
    /// Secondary distro packaging branches to update after the primary one.
    pub distro_branches: Vec<String>,
}

impl ReleaseRecord {
    /// Creates a record from a parsed release configuration.
    #[must_use]
    pub fn from_conf(conf: &ReleaseConf) -> Self {
        Self {
            version: None,
            changelog: conf.changelog.clone(),
            author_name: conf.author_name.clone(),
            author_email: conf.author_email.clone(),
            publish_to_package_index: conf.pypi.enabled(),
            package_index_project: conf.pypi.project().map(str::to_string),
            trigger_on_issue: conf.trigger_on_issue,
            labels: conf.labels.clone(),
            commitish: None,
            pr_number: None,
            distro_packaging: conf.fedora,
            distro_branches: conf.fedora_branches.clone(),
        }
    }

    /// Fills in details of the merged release pull request.
    ///
    /// The PR author replaces the configured author only when the
    /// configuration did not name one.
    pub fn update_from_pull_request(
        &mut self,
        version: Version,
        pr_number: u64,
        author: Option<&str>,
        commitish: impl Into<String>,
    ) {
        self.version = Some(version);
        self.pr_number = Some(pr_number);
        self.commitish = Some(commitish.into());
        if self.author_name.is_none() {
            self.author_name = author.map(str::to_string);
        }
    }

    /// The version as a string, or an empty string when unset.
    #[must_use]
    pub fn version_string(&self) -> String {
        self.version
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}

/// An in-flight release pull request, created from an open release issue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestRecord {
    /// Version requested by the issue.
    pub version: Option<Version>,
    /// Latest version released on the forge when the PR was prepared.
    pub previous_version: Option<Version>,
    /// Number of the release issue.
    pub issue_number: Option<u64>,
    /// Forge-internal identifier of the release issue.
    pub issue_id: Option<u64>,
    /// Number of the created pull request.
    pub pr_number: Option<u64>,
    /// URL of the created pull request.
    pub pr_url: Option<String>,
    /// Labels to put on the pull request.
    pub labels: Vec<String>,
}

impl PullRequestRecord {
    /// Creates a record for a release issue.
    #[must_use]
    pub fn for_issue(version: Version, issue_number: u64, issue_id: u64, labels: Vec<String>) -> Self {
        Self {
            version: Some(version),
            issue_number: Some(issue_number),
            issue_id: Some(issue_id),
            labels,
            ..Self::default()
        }
    }

    /// Name of the branch the release PR is made from.
    #[must_use]
    pub fn branch_name(&self) -> Option<String> {
        self.version.as_ref().map(|v| format!("{v}-release"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PypiSetting;

    #[test]
    fn test_record_from_conf() {
        let conf = ReleaseConf {
            changelog: vec!["Example changelog entry".to_string()],
            author_name: Some("John Smith".to_string()),
            author_email: Some("jsmith@example.com".to_string()),
            pypi: PypiSetting::Project("release-botos".to_string()),
            trigger_on_issue: true,
            labels: vec!["bot".to_string()],
            fedora: true,
            fedora_branches: vec!["f40".to_string()],
        };
        let record = ReleaseRecord::from_conf(&conf);
        assert!(record.version.is_none());
        assert!(record.publish_to_package_index);
        assert_eq!(record.package_index_project.as_deref(), Some("release-botos"));
        assert!(record.trigger_on_issue);
        assert_eq!(record.distro_branches, vec!["f40".to_string()]);
    }

    #[test]
    fn test_pull_request_author_does_not_override_configured_author() {
        let mut record = ReleaseRecord {
            author_name: Some("John Smith".to_string()),
            ..ReleaseRecord::default()
        };
        record.update_from_pull_request(Version::new(1, 3, 0), 12, Some("octocat"), "master");
        assert_eq!(record.author_name.as_deref(), Some("John Smith"));
        assert_eq!(record.pr_number, Some(12));
        assert_eq!(record.version_string(), "1.3.0");

        let mut anonymous = ReleaseRecord::default();
        anonymous.update_from_pull_request(Version::new(1, 3, 0), 12, Some("octocat"), "master");
        assert_eq!(anonymous.author_name.as_deref(), Some("octocat"));
    }

    #[test]
    fn test_branch_name() {
        let record = PullRequestRecord::for_issue(Version::new(0, 4, 0), 3, 300, Vec::new());
        assert_eq!(record.branch_name().as_deref(), Some("0.4.0-release"));
        assert_eq!(PullRequestRecord::default().branch_name(), None);
    }
}
