//! Semantic version type used for every "already released?" decision.
//!
//! Strict parsing is used for versions named in titles; remote systems go
//! through [`Version::coerce`]. Ordering follows SemVer precedence and
//! ignores build metadata.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Type of version bump requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpType {
    /// Patch version bump (0.0.x).
    Patch,
    /// Minor version bump (0.x.0).
    Minor,
    /// Major version bump (x.0.0).
    Major,
}

impl FromStr for BumpType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            other => Err(Error::invalid_version(format!("unknown bump type: {other}"))),
        }
    }
}

/// A semantic version following the `SemVer` 2.0.0 specification.
///
/// Equality, hashing and ordering ignore build metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    /// Major version number.
    pub major: u64,
    /// Minor version number.
    pub minor: u64,
    /// Patch version number.
    pub patch: u64,
    /// Pre-release identifier (e.g., "alpha", "beta.1").
    pub prerelease: Option<String>,
    /// Build metadata (e.g., "20230101", "commit.abc123").
    pub build: Option<String>,
}

impl Version {
    /// A release version without labels.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
            build: None,
        }
    }

    /// Attaches a pre-release label, e.g. `rc.1`.
    #[must_use]
    pub fn with_prerelease(mut self, prerelease: impl Into<String>) -> Self {
        self.prerelease = Some(prerelease.into());
        self
    }

    /// The version a "new `bump_type` release" request asks for.
    ///
    /// Labels are dropped: bumping `1.2.3-rc.1` by patch gives `1.2.4`.
    /// `None` when the bumped component would overflow.
    #[must_use]
    pub const fn bump(&self, bump_type: BumpType) -> Option<Self> {
        match bump_type {
            BumpType::Major => match self.major.checked_add(1) {
                Some(major) => Some(Self::new(major, 0, 0)),
                None => None,
            },
            BumpType::Minor => match self.minor.checked_add(1) {
                Some(minor) => Some(Self::new(self.major, minor, 0)),
                None => None,
            },
            BumpType::Patch => match self.patch.checked_add(1) {
                Some(patch) => Some(Self::new(self.major, self.minor, patch)),
                None => None,
            },
        }
    }

    /// Parses a version reported by a remote system.
    ///
    /// Reads up to three leading numeric components (`v2`, `1.4`, `1.2.3`),
    /// padding missing ones with zero. Whatever follows becomes a label: a
    /// tail starting with `.` or `+` is build metadata (`2.1.post1` gives
    /// `2.1.0+post1`), any other tail is a pre-release (`1.0.0rc1` gives
    /// `1.0.0-rc1`). Characters not allowed in labels are replaced by `-`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersion`] when the string does not start with
    /// a number.
    pub fn coerce(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
        let ([major, minor, patch], tail) =
            numeric_core(trimmed).ok_or_else(|| Error::invalid_version(s))?;

        let tail: String = tail
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-') {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        let (prerelease, build) = match tail.chars().next() {
            None => ("", ""),
            Some('+' | '.') => ("", &tail[1..]),
            Some('-') => tail[1..].split_once('+').unwrap_or((&tail[1..], "")),
            Some(_) => tail.split_once('+').unwrap_or((&tail, "")),
        };
        let label = |text: &str| (!text.is_empty()).then(|| text.replace('+', "."));

        Ok(Self {
            major,
            minor,
            patch,
            prerelease: label(prerelease),
            build: label(build),
        })
    }
}

/// Up to three leading dot-separated numbers, zero-padded, and the rest.
fn numeric_core(s: &str) -> Option<([u64; 3], &str)> {
    let mut numbers = [0_u64; 3];
    let mut rest = s;
    for (index, slot) in numbers.iter_mut().enumerate() {
        let digits = rest
            .strip_prefix('.')
            .filter(|_| index > 0)
            .unwrap_or(rest);
        if index > 0 && digits.len() == rest.len() {
            break;
        }
        let end = digits
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(digits.len());
        if end == 0 {
            if index == 0 {
                return None;
            }
            break;
        }
        *slot = digits[..end].parse().ok()?;
        rest = &digits[end..];
    }
    Some((numbers, rest))
}

/// A version string split into its numeric core and labels.
struct Labels<'a> {
    core: &'a str,
    prerelease: Option<&'a str>,
    build: Option<&'a str>,
}

impl<'a> Labels<'a> {
    /// `None` when a label separator is followed by nothing.
    fn split(s: &'a str) -> Option<Self> {
        let s = s.trim();
        let s = s.strip_prefix(['v', 'V']).unwrap_or(s);
        let (rest, build) = match s.split_once('+') {
            Some((rest, build)) => (rest, Some(build)),
            None => (s, None),
        };
        let (core, prerelease) = match rest.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (rest, None),
        };
        let empty_label = [prerelease, build].iter().flatten().any(|label| label.is_empty());
        (!empty_label).then_some(Self {
            core,
            prerelease,
            build,
        })
    }

    fn into_version(self, major: u64, minor: u64, patch: u64) -> Version {
        Version {
            major,
            minor,
            patch,
            prerelease: self.prerelease.map(str::to_string),
            build: self.build.map(str::to_string),
        }
    }
}

impl Default for Version {
    /// `0.0.0`, meaning "nothing released yet".
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

impl FromStr for Version {
    type Err = Error;

    /// Strict `MAJOR.MINOR.PATCH[-PRE][+BUILD]`, with an optional `v`.
    fn from_str(s: &str) -> Result<Self> {
        let labels = Labels::split(s).ok_or_else(|| Error::invalid_version(s))?;
        let numbers: Vec<u64> = labels
            .core
            .split('.')
            .map(str::parse)
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| Error::invalid_version(s))?;
        match numbers.as_slice() {
            &[major, minor, patch] => Ok(labels.into_version(major, minor, patch)),
            _ => Err(Error::invalid_version(s)),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{pre}")?;
        }
        match &self.build {
            Some(build) => write!(f, "+{build}"),
            None => Ok(()),
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.major, self.minor, self.patch, &self.prerelease).hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                // a release outranks its pre-releases
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => compare_prerelease(a, b),
            })
    }
}

/// Dot-separated identifier precedence: numeric identifiers compare
/// numerically and sort before alphanumeric ones; a longer list wins a tie.
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let identifier = |id: &str| match id.parse::<u64>() {
        Ok(n) => (0, n, String::new()),
        Err(_) => (1, 0, id.to_string()),
    };
    a.split('.').map(identifier).cmp(b.split('.').map(identifier))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        let v: Version = "1.2.3".parse().unwrap();
        assert_eq!(v, Version::new(1, 2, 3));

        let v: Version = "v1.2.3".parse().unwrap();
        assert_eq!(v, Version::new(1, 2, 3));

        let v: Version = "1.2.3-rc.1+build.456".parse().unwrap();
        assert_eq!(v.prerelease, Some("rc.1".to_string()));
        assert_eq!(v.build, Some("build.456".to_string()));
    }

    #[test]
    fn test_version_parse_invalid() {
        assert!("1.2".parse::<Version>().is_err());
        assert!("1.2.3.4".parse::<Version>().is_err());
        assert!("a.b.c".parse::<Version>().is_err());
        assert!("1.2.3-".parse::<Version>().is_err());
    }

    #[test]
    fn test_version_display() {
        assert_eq!(Version::new(1, 2, 3).to_string(), "1.2.3");
        let v: Version = "1.2.3-beta+456".parse().unwrap();
        assert_eq!(v.to_string(), "1.2.3-beta+456");
    }

    #[test]
    fn test_coerce_short_and_long_forms() {
        assert_eq!(Version::coerce("2").unwrap(), Version::new(2, 0, 0));
        assert_eq!(Version::coerce("v1.4").unwrap(), Version::new(1, 4, 0));
        assert_eq!(Version::coerce("1.2.3.4").unwrap(), Version::new(1, 2, 3));
        assert_eq!(
            Version::coerce("0.9-rc1").unwrap(),
            Version::new(0, 9, 0).with_prerelease("rc1")
        );
        assert!(Version::coerce("").is_err());
        assert!(Version::coerce("latest").is_err());
        assert_eq!(Version::coerce("1.2-").unwrap(), Version::new(1, 2, 0));
    }

    #[test]
    fn test_coerce_keeps_trailing_text_as_labels() {
        assert_eq!(
            Version::coerce("1.0.0rc1").unwrap(),
            Version::new(1, 0, 0).with_prerelease("rc1")
        );
        let post = Version::coerce("2.1.post1").unwrap();
        assert_eq!(post, Version::new(2, 1, 0));
        assert_eq!(post.build.as_deref(), Some("post1"));
        assert_eq!(post.to_string(), "2.1.0+post1");
        assert_eq!(Version::coerce("1.0.dev0").unwrap().to_string(), "1.0.0+dev0");
        assert_eq!(Version::coerce("1.2.3.4").unwrap().build.as_deref(), Some("4"));
        assert_eq!(
            Version::coerce("1.2.3-beta+exp+sha").unwrap().to_string(),
            "1.2.3-beta+exp.sha"
        );
        assert_eq!(
            Version::coerce("1.2.3 beta").unwrap(),
            Version::new(1, 2, 3).with_prerelease("beta")
        );
        assert!(Version::coerce("%{upstream}").is_err());
    }

    #[test]
    fn test_version_bump() {
        let v = Version::new(1, 2, 3);
        assert_eq!(v.bump(BumpType::Patch), Some(Version::new(1, 2, 4)));
        assert_eq!(v.bump(BumpType::Minor), Some(Version::new(1, 3, 0)));
        assert_eq!(v.bump(BumpType::Major), Some(Version::new(2, 0, 0)));
    }

    #[test]
    fn test_bump_overflow_is_none() {
        assert_eq!(Version::new(u64::MAX, 0, 0).bump(BumpType::Major), None);
        assert_eq!(Version::new(1, u64::MAX, 0).bump(BumpType::Minor), None);
        assert_eq!(Version::new(1, 2, u64::MAX).bump(BumpType::Patch), None);
        assert_eq!(
            Version::new(1, 2, u64::MAX).bump(BumpType::Minor),
            Some(Version::new(1, 3, 0))
        );
    }

    #[test]
    fn test_version_ordering() {
        assert!(Version::new(2, 0, 0) > Version::new(1, 0, 0));
        assert!(Version::new(1, 1, 0) > Version::new(1, 0, 0));
        assert!(Version::new(1, 0, 1) > Version::new(1, 0, 0));
        assert!(Version::new(1, 0, 0) > Version::new(1, 0, 0).with_prerelease("alpha"));
        assert!(Version::new(1, 10, 0) > Version::new(1, 9, 0));
    }

    #[test]
    fn test_prerelease_identifier_precedence() {
        let v = |pre: &str| Version::new(1, 0, 0).with_prerelease(pre);
        assert!(v("alpha") < v("alpha.1"));
        assert!(v("alpha.1") < v("alpha.beta"));
        assert!(v("beta.2") < v("beta.11"));
        assert!(v("beta.11") < v("rc.1"));
    }

    #[test]
    fn test_build_metadata_ignored() {
        let a: Version = "1.0.0+a".parse().unwrap();
        let b: Version = "1.0.0+b".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn test_bump_type_from_str() {
        assert_eq!("Major".parse::<BumpType>().unwrap(), BumpType::Major);
        assert_eq!("patch".parse::<BumpType>().unwrap(), BumpType::Patch);
        assert!("huge".parse::<BumpType>().is_err());
    }
}
