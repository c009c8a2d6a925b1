//! Repository URL validation
//!
//! Synchronous checks that run before quota consumption and scan creation.
//! A rejected URL never reaches the ledger, so validation failures cost the
//! caller nothing.

use regex::Regex;
use std::sync::LazyLock;

/// Maximum accepted URL length
pub const MAX_URL_LENGTH: usize = 500;

/// Hosts that must never be fetched (SSRF protection)
static BLOCKED_HOSTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)localhost",
        r"127\.0\.0\.",
        r"192\.168\.",
        r"10\.\d+\.\d+\.\d+",
        r"172\.(1[6-9]|2[0-9]|3[0-1])\.",
        r"0\.0\.0\.0",
        r"::1",
        r"(?i)file://",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Accepted hosting providers
static ALLOWED_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://(github\.com|gitlab\.com|bitbucket\.org)/").unwrap()
});

const SUSPICIOUS_PATTERNS: &[&str] = &[
    "javascript:",
    "data:",
    "vbscript:",
    "<script",
    "onerror=",
    "onclick=",
];

/// Validate a repository URL, returning the trimmed URL on success
pub fn validate_repo_url(raw: &str) -> Result<String, String> {
    let url = raw.trim();

    if url.is_empty() {
        return Err("Repository URL is required".to_string());
    }

    if url.len() > MAX_URL_LENGTH {
        return Err("URL is too long".to_string());
    }

    if !ALLOWED_PREFIX.is_match(url) {
        return Err("URL must be an https link to GitHub, GitLab, or Bitbucket".to_string());
    }

    let lowered = url.to_lowercase();
    if SUSPICIOUS_PATTERNS.iter().any(|p| lowered.contains(p)) {
        return Err("URL contains invalid characters".to_string());
    }

    if BLOCKED_HOSTS.iter().any(|p| p.is_match(url)) {
        return Err("URL is blocked for security reasons".to_string());
    }

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_provider_urls() {
        assert!(validate_repo_url("https://github.com/rust-lang/rust").is_ok());
        assert!(validate_repo_url("https://gitlab.com/user/project.git").is_ok());
        assert!(validate_repo_url("https://bitbucket.org/team/repo").is_ok());
        assert!(validate_repo_url("  https://github.com/a/b  ").is_ok());
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        assert!(validate_repo_url("").is_err());
        assert!(validate_repo_url("   ").is_err());

        let long = format!("https://github.com/a/{}", "b".repeat(MAX_URL_LENGTH));
        assert!(validate_repo_url(&long).is_err());
    }

    #[test]
    fn test_rejects_non_https_and_unknown_hosts() {
        assert!(validate_repo_url("http://github.com/a/b").is_err());
        assert!(validate_repo_url("ssh://git@github.com/a/b").is_err());
        assert!(validate_repo_url("https://example.com/a/b").is_err());
    }

    #[test]
    fn test_rejects_suspicious_patterns() {
        assert!(validate_repo_url("https://github.com/a/b?x=javascript:alert(1)").is_err());
        assert!(validate_repo_url("https://github.com/a/<script>").is_err());
    }

    #[test]
    fn test_rejects_blocked_hosts() {
        assert!(validate_repo_url("https://github.com.localhost/a/b").is_err());
        assert!(validate_repo_url("https://github.com/a/b@127.0.0.1").is_err());
    }

    #[test]
    fn test_trims_whitespace() {
        let url = validate_repo_url(" https://github.com/a/b ").unwrap();
        assert_eq!(url, "https://github.com/a/b");
    }
}
