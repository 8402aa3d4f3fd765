//! `CHANGELOG.md` reading and writing.
//!
//! Sections are introduced by a `# <version>` heading and run until the next
//! heading or the end of the file.

use crate::error::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Body used when the changelog has no section for a version.
pub const NO_CHANGELOG: &str = "No changelog provided";

/// Extract the section for `version` from changelog `content`.
///
/// The section includes its heading. Returns [`NO_CHANGELOG`] when there is
/// no heading for the version.
#[must_use]
pub fn parse_changelog(version: &str, content: &str) -> String {
    let pattern = format!(r"(?m)^#+[ \t]*v?{}[ \t]*$", regex::escape(version));
    let Ok(heading) = Regex::new(&pattern) else {
        return NO_CHANGELOG.to_string();
    };
    let Some(found) = heading.find(content) else {
        return NO_CHANGELOG.to_string();
    };

    let section = &content[found.start()..];
    let body_start = found.end() - found.start();
    match section[body_start..].find("\n#") {
        Some(offset) => section[..body_start + offset].to_string(),
        None => section.to_string(),
    }
}

/// Prepend a section for `version` with body `log` to the changelog at `path`.
///
/// Returns `false` without touching anything when the file does not exist.
///
/// # Errors
///
/// Returns an I/O error if the existing file cannot be read or rewritten.
pub fn insert_in_changelog(path: &Path, version: &str, log: &str) -> Result<bool> {
    if !path.is_file() {
        debug!(path = %path.display(), "No changelog file to update");
        return Ok(false);
    }

    let existing = fs::read_to_string(path)?;
    let mut content = format!("# {version}\n\n{}\n", log.trim_end());
    if !existing.trim().is_empty() {
        content.push('\n');
        content.push_str(&existing);
    }
    fs::write(path, content)?;
    debug!(path = %path.display(), version, "Inserted changelog section");
    Ok(true)
}
