//! The dist-git packaging command surface.

use crate::identity::PackagerIdentity;
use async_trait::async_trait;
use relbot_release::{CommandRunner, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Packaging operations on a dist-git checkout.
///
/// Every method fails with [`relbot_release::Error::Command`] (or another
/// error) when the underlying command does not succeed.
#[async_trait]
pub trait PackagingTool: Send + Sync {
    /// Obtains or renews a Kerberos ticket.
    async fn init_ticket(&self, identity: &PackagerIdentity) -> Result<()>;

    /// Clones the dist-git repository of `package` into `dir`, returning its root.
    async fn clone_package(&self, dir: &Path, package: &str) -> Result<PathBuf>;

    /// Checks out `branch`.
    async fn switch_branch(&self, root: &Path, branch: &str) -> Result<()>;

    /// Downloads the sources listed in the `sources` file.
    async fn sources(&self, root: &Path) -> Result<()>;

    /// Lints the spec file.
    async fn lint(&self, root: &Path) -> Result<()>;

    /// Downloads the upstream sources named by the spec file.
    async fn fetch_new_sources(&self, root: &Path) -> Result<()>;

    /// Uploads `files` to the lookaside cache and records them.
    async fn new_sources(&self, root: &Path, files: &[String]) -> Result<()>;

    /// Commits all changes.
    async fn commit(&self, root: &Path, message: &str) -> Result<()>;

    /// Pushes the current branch.
    async fn push(&self, root: &Path) -> Result<()>;

    /// Fast-forwards the current branch to `from`.
    async fn merge_ff_only(&self, root: &Path, from: &str) -> Result<()>;

    /// Submits a build of the current branch.
    async fn build(&self, root: &Path) -> Result<()>;
}

/// [`PackagingTool`] driving `fedpkg`, `spectool`, `git` and `kinit`.
#[derive(Debug, Clone)]
pub struct Fedpkg {
    runner: CommandRunner,
}

impl Fedpkg {
    /// Creates a tool running commands as `identity`, if any.
    #[must_use]
    pub fn new(runner: CommandRunner, identity: Option<&PackagerIdentity>) -> Self {
        let runner = identity
            .map(PackagerIdentity::environment)
            .unwrap_or_default()
            .into_iter()
            .fold(runner, |runner, (key, value)| runner.with_env(key, value));
        Self { runner }
    }

    async fn fedpkg(&self, root: &Path, args: &[&str]) -> Result<()> {
        self.runner.run("fedpkg", args, Some(root)).await?;
        Ok(())
    }
}

/// Spec files in the root of a dist-git checkout.
fn spec_files(root: &Path) -> Result<Vec<String>> {
    let mut specs = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let name = entry?.file_name().to_string_lossy().to_string();
        if name.ends_with(".spec") {
            specs.push(name);
        }
    }
    specs.sort();
    Ok(specs)
}

#[async_trait]
impl PackagingTool for Fedpkg {
    async fn init_ticket(&self, identity: &PackagerIdentity) -> Result<()> {
        let args = identity.kinit_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner.run("kinit", &args, None).await?;
        info!(principal = %identity.principal(), "Kerberos ticket ready");
        Ok(())
    }

    async fn clone_package(&self, dir: &Path, package: &str) -> Result<PathBuf> {
        self.fedpkg(dir, &["clone", package]).await?;
        Ok(dir.join(package))
    }

    async fn switch_branch(&self, root: &Path, branch: &str) -> Result<()> {
        self.fedpkg(root, &["switch-branch", branch]).await
    }

    async fn sources(&self, root: &Path) -> Result<()> {
        self.fedpkg(root, &["sources"]).await
    }

    async fn lint(&self, root: &Path) -> Result<()> {
        self.fedpkg(root, &["lint"]).await
    }

    async fn fetch_new_sources(&self, root: &Path) -> Result<()> {
        let specs = spec_files(root)?;
        let mut args = vec!["-g"];
        args.extend(specs.iter().map(String::as_str));
        self.runner.run("spectool", &args, Some(root)).await?;
        Ok(())
    }

    async fn new_sources(&self, root: &Path, files: &[String]) -> Result<()> {
        let mut args = vec!["new-sources"];
        args.extend(files.iter().map(String::as_str));
        self.fedpkg(root, &args).await
    }

    async fn commit(&self, root: &Path, message: &str) -> Result<()> {
        self.fedpkg(root, &["commit", "-m", message]).await
    }

    async fn push(&self, root: &Path) -> Result<()> {
        self.fedpkg(root, &["push"]).await
    }

    async fn merge_ff_only(&self, root: &Path, from: &str) -> Result<()> {
        self.runner
            .run("git", &["merge", from, "--ff-only"], Some(root))
            .await?;
        Ok(())
    }

    async fn build(&self, root: &Path) -> Result<()> {
        self.fedpkg(root, &["build"]).await
    }
}
