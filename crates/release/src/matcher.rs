//! Extraction of requested release versions from issue and pull request titles.
//!
//! A title requests a release either by naming the version (`3.7.8 release`,
//! `Release v1.3.0`) or by naming the kind of bump (`new minor release`).
//! A request only counts when it names a version strictly above the
//! reference, so already-released versions and stale issues never match.

use crate::version::{BumpType, Version};
use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static EXPLICIT_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|[^\w.])v?(\d+\.\d+\.\d+(?:-[0-9A-Za-z]+(?:[.-][0-9A-Za-z]+)*)?)(?:[^\w.]|\.(?:\s|$)|$)",
    )
    .expect("version pattern is valid")
});

#[allow(clippy::expect_used)]
static BUMP_REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bnew\s+(major|minor|patch)\s+release\b").expect("bump pattern is valid")
});

/// Extract the version requested by `title`, if it supersedes `reference`.
///
/// Returns `None` when the title names no version, names a malformed one, or
/// names one equal to or lower than `reference`.
#[must_use]
pub fn match_title(title: &str, reference: &Version) -> Option<Version> {
    let requested = requested_version(title, reference)?;
    (requested > *reference).then_some(requested)
}

fn requested_version(title: &str, reference: &Version) -> Option<Version> {
    if let Some(captures) = EXPLICIT_VERSION.captures(title) {
        return captures.get(1)?.as_str().parse().ok();
    }

    let bump: BumpType = BUMP_REQUEST.captures(title)?.get(1)?.as_str().parse().ok()?;
    reference.bump(bump)
}
