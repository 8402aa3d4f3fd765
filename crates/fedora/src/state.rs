//! Progress of a single dist-git branch update.

use relbot_release::{Error, Result};
use std::fmt;
use tracing::{debug, warn};

/// Steps of a branch update, in order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum BranchState {
    /// Nothing done yet.
    #[default]
    NotStarted,
    /// `fedpkg sources` fetched the current sources.
    SourcesFetched,
    /// The spec file names the new version.
    SpecUpdated,
    /// The spec file passed lint.
    Linted,
    /// New upstream source files were downloaded.
    NewSourcesFound,
    /// The update was committed.
    Committed,
    /// The commit was pushed.
    Pushed,
    /// A build was submitted.
    Built,
    /// A step failed.
    Failed,
}

impl fmt::Display for BranchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not started",
            Self::SourcesFetched => "sources fetched",
            Self::SpecUpdated => "spec updated",
            Self::Linted => "linted",
            Self::NewSourcesFound => "new sources found",
            Self::Committed => "committed",
            Self::Pushed => "pushed",
            Self::Built => "built",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a failed step means for the release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    /// The failure fails the whole release.
    Fatal,
    /// The failure is logged and the branch abandoned.
    BestEffort,
}

/// A branch update moving through [`BranchState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchUpdate {
    branch: String,
    policy: StepPolicy,
    state: BranchState,
}

impl BranchUpdate {
    /// Starts an update of `branch`.
    #[must_use]
    pub fn new(branch: impl Into<String>, policy: StepPolicy) -> Self {
        Self {
            branch: branch.into(),
            policy,
            state: BranchState::NotStarted,
        }
    }

    /// The branch being updated.
    #[must_use]
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// The failure policy.
    #[must_use]
    pub const fn policy(&self) -> StepPolicy {
        self.policy
    }

    /// The last state reached.
    #[must_use]
    pub const fn state(&self) -> BranchState {
        self.state
    }

    /// Whether a build was submitted.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.state == BranchState::Built
    }

    /// Records that `state` was reached.
    pub fn advance(&mut self, state: BranchState) {
        debug!(branch = %self.branch, from = %self.state, to = %state, "Branch update advanced");
        self.state = state;
    }

    /// Records a failed step and applies the policy.
    ///
    /// # Errors
    ///
    /// Returns a release error naming the branch under [`StepPolicy::Fatal`].
    pub fn fail(&mut self, error: &Error) -> Result<()> {
        let reached = self.state;
        self.state = BranchState::Failed;
        match self.policy {
            StepPolicy::Fatal => Err(Error::release(format!(
                "Updating Fedora branch {} failed after {reached}: {error}",
                self.branch
            ))),
            StepPolicy::BestEffort => {
                warn!(branch = %self.branch, after = %reached, error = %error, "Abandoning branch update");
                Ok(())
            }
        }
    }
}
