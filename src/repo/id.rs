//! Deterministic repository identity
//!
//! The cache is keyed by a digest of the normalized repository URL so every
//! scan of the same repository resolves to the same entry, independent of
//! which scan requested it.

use sha2::{Digest, Sha256};

/// Length of the hex-encoded repository id (truncated SHA256)
const REPO_ID_LENGTH: usize = 16;

/// Normalize a repository URL for identity purposes
///
/// Lowercased, trailing slash stripped, then a `.git` suffix stripped, so
/// the common spelling variants of one repository collapse to one form.
pub fn normalize_repo_url(url: &str) -> String {
    let mut normalized = url.trim().to_lowercase();
    if let Some(stripped) = normalized.strip_suffix('/') {
        normalized = stripped.to_string();
    }
    if let Some(stripped) = normalized.strip_suffix(".git") {
        normalized = stripped.to_string();
    }
    normalized
}

/// Collision-resistant digest of the normalized repository URL
pub fn repo_id(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_repo_url(url).as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..REPO_ID_LENGTH].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_variants_collapse() {
        let base = repo_id("https://github.com/a/b");

        assert_eq!(repo_id("https://github.com/a/b/"), base);
        assert_eq!(repo_id("https://github.com/a/b.git"), base);
        assert_eq!(repo_id("https://github.com/a/b.git/"), base);
        assert_eq!(repo_id("HTTPS://GitHub.com/A/B"), base);
        assert_eq!(repo_id("  https://github.com/a/b  "), base);
    }

    #[test]
    fn test_distinct_repositories_differ() {
        assert_ne!(
            repo_id("https://github.com/a/b"),
            repo_id("https://github.com/a/c")
        );
        assert_ne!(
            repo_id("https://github.com/a/b"),
            repo_id("https://gitlab.com/a/b")
        );
    }

    #[test]
    fn test_repo_id_shape() {
        let id = repo_id("https://github.com/rust-lang/rust");

        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_normalize_preserves_inner_git() {
        // Only a suffix is stripped; a repo genuinely named "git" keeps it.
        assert_eq!(
            normalize_repo_url("https://github.com/a/git-tools"),
            "https://github.com/a/git-tools"
        );
    }
}
