//! GitHub remote URLs.

/// Parse a GitHub remote URL into (owner, repo).
///
/// Accepts SSH (`git@github.com:owner/repo.git`) and HTTPS
/// (`https://github.com/owner/repo.git`) forms.
#[must_use]
pub fn parse_github_remote(url: &str) -> Option<(String, String)> {
    let rest = url
        .strip_prefix("git@github.com:")
        .or_else(|| url.strip_prefix("https://github.com/"))?;
    let path = rest.strip_suffix(".git").unwrap_or(rest);
    let (owner, repo) = path.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_github_remote_ssh() {
        let result = parse_github_remote("git@github.com:user-cont/release-bot.git");
        assert_eq!(
            result,
            Some(("user-cont".to_string(), "release-bot".to_string()))
        );
    }

    #[test]
    fn test_parse_github_remote_https_no_git_suffix() {
        let result = parse_github_remote("https://github.com/owner/repo");
        assert_eq!(result, Some(("owner".to_string(), "repo".to_string())));
    }

    #[test]
    fn test_parse_github_remote_rejects_other_hosts() {
        assert!(parse_github_remote("https://gitlab.com/owner/repo").is_none());
        assert!(parse_github_remote("git@bitbucket.org:owner/repo.git").is_none());
        assert!(parse_github_remote("").is_none());
    }

    #[test]
    fn test_parse_github_remote_partial_or_nested() {
        assert!(parse_github_remote("https://github.com/owner").is_none());
        assert!(parse_github_remote("https://github.com/owner/").is_none());
        assert!(parse_github_remote("https://github.com/owner/repo/extra").is_none());
    }
}
