//! Updating version strings in Python project files.
//!
//! `__version__ = "..."` is rewritten in `__init__.py`, `__about__.py` and
//! `version.py`; `version="..."` is rewritten in `setup.py`.

use crate::error::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};
use walkdir::WalkDir;

const DUNDER_VERSION_FILES: [&str; 3] = ["__init__.py", "__about__.py", "version.py"];
const SETUP_FILE: &str = "setup.py";

#[allow(clippy::expect_used)]
static DUNDER_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(__version__\s*=\s*)(?:"[^"]*"|'[^']*')"#).expect("version pattern is valid")
});

#[allow(clippy::expect_used)]
static SETUP_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\bversion\s*=\s*)(?:"[^"]*"|'[^']*')"#).expect("setup pattern is valid")
});

/// Rewrite version strings below `repo_dir` to `version`.
///
/// Returns the paths, relative to `repo_dir`, of the files whose content
/// changed, in sorted order. Files already at `version` are not reported.
///
/// # Errors
///
/// Returns an I/O error if a candidate file cannot be read or written.
pub fn look_for_version_files(repo_dir: &Path, version: &str) -> Result<Vec<String>> {
    let mut changed = Vec::new();

    let walker = WalkDir::new(repo_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");

    for entry in walker.filter_map(std::result::Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        let pattern: &Regex = if file_name == SETUP_FILE {
            &SETUP_VERSION
        } else if DUNDER_VERSION_FILES.contains(&file_name.as_ref()) {
            &DUNDER_VERSION
        } else {
            continue;
        };

        if update_version(entry.path(), pattern, version)? {
            let relative = entry
                .path()
                .strip_prefix(repo_dir)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            info!(file = %relative, version, "Updated version");
            changed.push(relative);
        }
    }

    Ok(changed)
}

fn update_version(path: &Path, pattern: &Regex, version: &str) -> Result<bool> {
    let content = fs::read_to_string(path)?;
    if !pattern.is_match(&content) {
        return Ok(false);
    }

    let updated = pattern.replace_all(&content, |caps: &regex::Captures<'_>| {
        format!("{}\"{version}\"", &caps[1])
    });
    if updated == content {
        debug!(path = %path.display(), "Version already up to date");
        return Ok(false);
    }
    fs::write(path, updated.as_bytes())?;
    Ok(true)
}
