//! Fedora dist-git packaging backend for relbot.
//!
//! [`FedoraBackend`] mirrors a release into the package's dist-git
//! repository: it updates the spec file on the primary branch, registers the
//! new upstream sources, commits, pushes and builds, then carries the change
//! to every configured secondary branch.
//!
//! # Branch updates
//!
//! Every branch walks the [`BranchState`] sequence. The primary branch uses
//! [`StepPolicy::Fatal`], so any failed step fails the release. Secondary
//! branches are fast-forwarded from the primary branch; when that is not
//! possible the update is replayed from scratch with
//! [`StepPolicy::BestEffort`], where failures are logged and the branch is
//! abandoned.

#![warn(missing_docs)]

pub mod backend;
pub mod distgit;
pub mod identity;
pub mod spec;
pub mod state;
pub mod tool;

pub use backend::FedoraBackend;
pub use distgit::DistGit;
pub use identity::PackagerIdentity;
pub use spec::SpecUpdate;
pub use state::{BranchState, BranchUpdate, StepPolicy};
pub use tool::{Fedpkg, PackagingTool};
