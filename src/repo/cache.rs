//! Repository result cache
//!
//! Stores the last successful analysis per repository plus the commit it
//! was computed from. `total_scans` counts every scan resolved against the
//! repository, cache hit or fresh, and is bumped atomically.

use crate::core::time::TimeProvider;
use crate::repo::analysis::RepositoryAnalysis;
use crate::store::Collection;
use std::sync::Arc;

#[derive(Clone)]
pub struct RepositoryCache {
    entries: Collection<RepositoryAnalysis>,
    time: Arc<dyn TimeProvider>,
}

impl RepositoryCache {
    pub fn new(entries: Collection<RepositoryAnalysis>, time: Arc<dyn TimeProvider>) -> Self {
        Self { entries, time }
    }

    /// Read the cached analysis for a repository, if any
    pub fn lookup(&self, repo_id: &str) -> Option<RepositoryAnalysis> {
        self.entries.get(repo_id)
    }

    /// Resolve a scan from cache: bump the counters and return the payload
    ///
    /// Returns `None` if the entry vanished since lookup; callers treat
    /// that as a cache miss.
    pub fn record_hit(&self, repo_id: &str) -> Option<RepositoryAnalysis> {
        let now = self.time.now();
        self.entries.update(repo_id, |entry| {
            let analysis = entry.value.as_mut()?;
            analysis.total_scans += 1;
            analysis.last_scanned_at = now;
            Some(analysis.clone())
        })
    }

    /// Overwrite the entry with a freshly computed analysis
    ///
    /// The fresh scan also counts toward `total_scans`, continuing the
    /// existing series when an older entry is being replaced.
    pub fn store_fresh(&self, mut analysis: RepositoryAnalysis) -> RepositoryAnalysis {
        let now = self.time.now();
        let repo_id = analysis.repo_id.clone();
        self.entries.update(&repo_id, |entry| {
            if let Some(previous) = entry.value.as_ref() {
                analysis.total_scans = previous.total_scans + 1;
                analysis.created_at = previous.created_at;
            }
            analysis.last_scanned_at = now;
            entry.value = Some(analysis.clone());
            analysis
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::SystemTimeProvider;
    use crate::repo::analysis::{ModelAnalysis, RepoMetadata, SkillLevel};
    use chrono::Utc;

    fn sample_analysis(repo_id: &str, commit: &str) -> RepositoryAnalysis {
        let metadata = RepoMetadata {
            url: "https://github.com/a/b".to_string(),
            owner: "a".to_string(),
            name: "b".to_string(),
            full_name: "a/b".to_string(),
            provider: "github".to_string(),
            branch: "main".to_string(),
            commit_sha: Some(commit.to_string()),
            stars: None,
            forks: None,
            last_updated: None,
        };
        let model = ModelAnalysis {
            description: "sample".to_string(),
            tech_stack: Vec::new(),
            primary_language: None,
            skill_level: SkillLevel::Beginner,
            skill_level_rationale: None,
            file_stats: None,
            structure: None,
            code_quality: None,
            complexity: None,
        };
        RepositoryAnalysis::from_model(repo_id.to_string(), metadata, model, "gemini", Utc::now())
    }

    fn cache() -> RepositoryCache {
        let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
        RepositoryCache::new(Collection::new("repository-cache", Arc::clone(&time)), time)
    }

    #[test]
    fn test_lookup_miss() {
        assert!(cache().lookup("nope").is_none());
    }

    #[test]
    fn test_store_fresh_then_hit_counts_both() {
        let cache = cache();

        let stored = cache.store_fresh(sample_analysis("r1", "sha-1"));
        assert_eq!(stored.total_scans, 1);

        let hit = cache.record_hit("r1").unwrap();
        assert_eq!(hit.total_scans, 2);
        assert_eq!(hit.analyzed_commit.as_deref(), Some("sha-1"));

        assert_eq!(cache.lookup("r1").unwrap().total_scans, 2);
    }

    #[test]
    fn test_store_fresh_overwrites_but_continues_counter() {
        let cache = cache();

        cache.store_fresh(sample_analysis("r1", "sha-1"));
        cache.record_hit("r1");

        let replaced = cache.store_fresh(sample_analysis("r1", "sha-2"));

        assert_eq!(replaced.total_scans, 3);
        assert_eq!(replaced.analyzed_commit.as_deref(), Some("sha-2"));
    }

    #[test]
    fn test_record_hit_on_missing_entry() {
        assert!(cache().record_hit("nope").is_none());
    }
}
