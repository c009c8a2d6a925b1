//! Pipeline orchestration
//!
//! One `run` per scan. The cache short-circuit trades a full clone plus
//! model call for a single remote ref lookup whenever the upstream commit
//! is unchanged; an inconclusive lookup is always a miss. A fresh analysis
//! is returned to the caller unpersisted; the driver decides whether to
//! save it. Progress is reported monotonically through the caller's
//! callback, and the temporary clone workspace is removed on every exit
//! path.

use crate::core::time::TimeProvider;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::git::{GitSource, ProviderMetadata};
use crate::pipeline::llm::LanguageModel;
use crate::pipeline::prompt::build_analysis_prompt;
use crate::pipeline::snapshot::build_snapshot;
use crate::repo::analysis::{RepoMetadata, RepositoryAnalysis};
use crate::repo::cache::RepositoryCache;
use crate::repo::id::repo_id;
use std::sync::Arc;

/// Result of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub analysis: RepositoryAnalysis,
    pub cache_hit: bool,
}

#[derive(Clone)]
pub struct AnalysisPipeline {
    git: Arc<dyn GitSource>,
    model: Arc<dyn LanguageModel>,
    cache: RepositoryCache,
    time: Arc<dyn TimeProvider>,
}

impl AnalysisPipeline {
    pub fn new(
        git: Arc<dyn GitSource>,
        model: Arc<dyn LanguageModel>,
        cache: RepositoryCache,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            git,
            model,
            cache,
            time,
        }
    }

    /// Run the full analysis for one repository URL
    ///
    /// Invoked exactly once per scan. The callback receives monotonically
    /// increasing progress percentages; the caller owns cancellation, this
    /// method always runs to completion or failure. A fresh (non-hit)
    /// outcome is not written to the cache here; the caller persists it
    /// once the scan is known to have resolved.
    pub async fn run(
        &self,
        repo_url: &str,
        on_progress: &(dyn Fn(u8) + Send + Sync),
    ) -> PipelineResult<PipelineOutcome> {
        let repo_id = repo_id(repo_url);

        if let Some(hit) = self.try_cache(repo_url, &repo_id).await {
            return Ok(PipelineOutcome {
                analysis: hit,
                cache_hit: true,
            });
        }

        // TempDir removal on drop covers every failure path below.
        let workspace = tempfile::Builder::new()
            .prefix("repolens-")
            .tempdir()
            .map_err(|e| PipelineError::Io {
                message: format!("Failed to create temp workspace: {}", e),
            })?;

        on_progress(10);
        log::info!("Cloning {} into {}", repo_url, workspace.path().display());
        let info = self.git.clone_repo(repo_url, workspace.path()).await?;
        on_progress(25);

        on_progress(30);
        let provider_meta = match self.git.metadata(repo_url).await {
            Ok(meta) => meta,
            Err(e) => {
                // Non-fatal: the analysis proceeds with nulled fields.
                log::warn!("Metadata fetch failed for {}: {}", repo_url, e);
                ProviderMetadata::default()
            }
        };
        on_progress(35);

        on_progress(40);
        let root = workspace.path().to_path_buf();
        let snapshot = tokio::task::spawn_blocking(move || build_snapshot(&root))
            .await
            .map_err(|e| PipelineError::Io {
                message: format!("Snapshot task failed: {}", e),
            })??;
        log::debug!(
            "Snapshot of {}: {} files collected ({} total)",
            info.full_name(),
            snapshot.files.len(),
            snapshot.total_files
        );
        on_progress(50);

        on_progress(55);
        let prompt = build_analysis_prompt(&info, &snapshot);
        let model_output = self.model.analyze(&prompt).await?;
        on_progress(95);

        let metadata = RepoMetadata {
            url: repo_url.to_string(),
            owner: info.owner.clone(),
            name: info.name.clone(),
            full_name: info.full_name(),
            provider: provider_from_url(repo_url).to_string(),
            branch: info.branch.clone(),
            commit_sha: info.commit_sha.clone(),
            stars: provider_meta.stars,
            forks: provider_meta.forks,
            last_updated: provider_meta.last_updated,
        };
        let analysis = RepositoryAnalysis::from_model(
            repo_id,
            metadata,
            model_output,
            self.model.model_name(),
            self.time.now(),
        );
        on_progress(98);

        if let Err(e) = workspace.close() {
            log::warn!("Failed to remove temp workspace: {}", e);
        }

        Ok(PipelineOutcome {
            analysis,
            cache_hit: false,
        })
    }

    /// Probe the cache: a hit requires an unchanged upstream tip commit
    async fn try_cache(&self, repo_url: &str, repo_id: &str) -> Option<RepositoryAnalysis> {
        let cached = self.cache.lookup(repo_id)?;
        let analyzed_commit = cached.analyzed_commit.as_deref()?;

        match self
            .git
            .latest_commit_sha(repo_url, &cached.metadata.branch)
            .await
        {
            Ok(Some(tip)) if tip == analyzed_commit => {
                log::info!(
                    "Cache hit for {} at commit {}",
                    cached.metadata.full_name,
                    tip
                );
                self.cache.record_hit(repo_id)
            }
            Ok(Some(tip)) => {
                log::debug!(
                    "Cache stale for {}: analyzed {}, upstream {}",
                    cached.metadata.full_name,
                    analyzed_commit,
                    tip
                );
                None
            }
            Ok(None) => {
                log::debug!("Ref lookup inconclusive for {}; treating as miss", repo_url);
                None
            }
            Err(e) => {
                // Unable to verify means miss, never hit.
                log::warn!("Ref lookup failed for {}: {}", repo_url, e);
                None
            }
        }
    }
}

fn provider_from_url(url: &str) -> &'static str {
    if url.contains("github.com") {
        "github"
    } else if url.contains("gitlab.com") {
        "gitlab"
    } else if url.contains("bitbucket.org") {
        "bitbucket"
    } else {
        "other"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_url() {
        assert_eq!(provider_from_url("https://github.com/a/b"), "github");
        assert_eq!(provider_from_url("https://gitlab.com/a/b"), "gitlab");
        assert_eq!(provider_from_url("https://bitbucket.org/a/b"), "bitbucket");
        assert_eq!(provider_from_url("https://example.com/a/b"), "other");
    }
}
