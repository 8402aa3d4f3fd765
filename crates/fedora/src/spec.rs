//! RPM spec file updates.

use chrono::NaiveDate;
use relbot_release::{Error, Result};
use std::fmt::Write as _;
use std::path::Path;

/// Values written into a spec file for a new upstream version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecUpdate {
    /// New upstream version.
    pub version: String,
    /// Changelog entry author.
    pub author_name: String,
    /// Changelog entry author email.
    pub author_email: String,
    /// Changelog lines; a default line is used when empty.
    pub changelog: Vec<String>,
    /// Date of the changelog entry.
    pub date: NaiveDate,
}

impl SpecUpdate {
    /// `%changelog` entry for this update, without a trailing blank line.
    #[must_use]
    pub fn changelog_entry(&self) -> String {
        let mut entry = format!(
            "* {} {} <{}> {}-1\n",
            self.date.format("%a %b %d %Y"),
            self.author_name,
            self.author_email,
            self.version
        );
        if self.changelog.is_empty() {
            let _ = writeln!(entry, "- {} release", self.version);
        } else {
            for line in &self.changelog {
                let _ = writeln!(entry, "- {line}");
            }
        }
        entry
    }

    /// Applies the update to spec file content.
    ///
    /// `Version:` is set, `Release:` is reset to `1%{?dist}` and the
    /// changelog entry is inserted right after `%changelog`.
    #[must_use]
    pub fn apply(&self, content: &str) -> String {
        let mut lines: Vec<String> = Vec::new();
        let mut changelog_written = false;
        for line in content.lines() {
            if line.starts_with("Version:") {
                lines.push(format!("Version:\t{}", self.version));
            } else if line.starts_with("Release:") {
                lines.push("Release:\t1%{?dist}".to_string());
            } else if line.starts_with("%changelog") && !changelog_written {
                lines.push(line.to_string());
                lines.extend(self.changelog_entry().lines().map(str::to_string));
                lines.push(String::new());
                changelog_written = true;
            } else {
                lines.push(line.to_string());
            }
        }
        let mut updated = lines.join("\n");
        if content.ends_with('\n') {
            updated.push('\n');
        }
        updated
    }

    /// Rewrites the spec file at `path`.
    ///
    /// # Errors
    ///
    /// Returns a release error if the spec file is missing, or an I/O error.
    pub fn update_file(&self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(Error::release(format!(
                "Spec file {} not found",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        std::fs::write(path, self.apply(&content))?;
        Ok(())
    }
}

/// The `Version:` value of spec file content.
#[must_use]
pub fn spec_version(content: &str) -> Option<&str> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("Version:"))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
