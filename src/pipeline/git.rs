//! Git source provider
//!
//! The external collaborator that materializes repositories. The production
//! implementation drives the `git` CLI for clone and ref lookups and the
//! provider's REST API for star/fork metadata; tests substitute fakes
//! through the `GitSource` trait.

use crate::pipeline::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

/// Result of cloning a repository
#[derive(Debug, Clone)]
pub struct CloneInfo {
    pub owner: String,
    pub name: String,
    pub branch: String,
    pub commit_sha: Option<String>,
}

impl CloneInfo {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Optional provider-side metadata; absent fields degrade gracefully
#[derive(Debug, Clone, Default)]
pub struct ProviderMetadata {
    pub stars: Option<i64>,
    pub forks: Option<i64>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait GitSource: Send + Sync {
    /// Shallow-clone the repository into `dest`
    async fn clone_repo(&self, url: &str, dest: &Path) -> PipelineResult<CloneInfo>;

    /// Fetch star/fork metadata; failures here are non-fatal to a scan
    async fn metadata(&self, url: &str) -> PipelineResult<ProviderMetadata>;

    /// Tip commit of `branch` via a lightweight remote ref lookup
    ///
    /// `Ok(None)` means the lookup was inconclusive; callers must treat
    /// that as a cache miss, never as a hit.
    async fn latest_commit_sha(&self, url: &str, branch: &str) -> PipelineResult<Option<String>>;
}

/// Split a hosted repository URL into owner and name
pub fn parse_remote_url(url: &str) -> Option<(String, String)> {
    let rest = url.split("://").nth(1)?;
    let mut segments = rest.split('/').filter(|s| !s.is_empty());
    let _host = segments.next()?;
    let owner = segments.next()?;
    let name = segments.next()?;
    let name = name.strip_suffix(".git").unwrap_or(name);
    if owner.is_empty() || name.is_empty() {
        return None;
    }
    Some((owner.to_string(), name.to_string()))
}

const METADATA_ATTEMPTS: u32 = 3;
const METADATA_RETRY_DELAY: Duration = Duration::from_millis(500);

/// A failed metadata fetch, tagged with whether a retry could help
#[derive(Debug)]
struct MetadataFailure {
    message: String,
    transient: bool,
}

/// Retry a metadata fetch while its failures stay transient
///
/// Network errors and server-side errors are worth another attempt after a
/// fixed delay; client errors and unparsable payloads short-circuit.
async fn with_transient_retry<T, F, Fut>(
    what: &str,
    attempts: u32,
    delay: Duration,
    mut operation: F,
) -> Result<T, MetadataFailure>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, MetadataFailure>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(failure) if failure.transient && attempt < attempts => {
                log::debug!(
                    "{} failed on attempt {}/{}, retrying in {:?}: {}",
                    what,
                    attempt,
                    attempts,
                    delay,
                    failure.message
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(failure) => return Err(failure),
        }
    }
}

/// Production provider backed by the `git` CLI and the GitHub REST API
pub struct GitCli {
    http: reqwest::Client,
    clone_timeout: Duration,
}

impl GitCli {
    pub fn new(clone_timeout: Duration) -> PipelineResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("repolens")
            .build()
            .map_err(|e| PipelineError::Io {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            http,
            clone_timeout,
        })
    }

    async fn git_output(dir: Option<&Path>, args: &[&str]) -> PipelineResult<String> {
        let mut command = Command::new("git");
        command.args(args);
        if let Some(dir) = dir {
            command.current_dir(dir);
        }
        let output = command.output().await.map_err(|e| PipelineError::Io {
            message: format!("Failed to run git {:?}: {}", args, e),
        })?;
        if !output.status.success() {
            return Err(PipelineError::Io {
                message: format!(
                    "git {:?} exited with {}: {}",
                    args,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn fetch_github_metadata(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<ProviderMetadata, MetadataFailure> {
        #[derive(serde::Deserialize)]
        struct GithubRepo {
            stargazers_count: Option<i64>,
            forks_count: Option<i64>,
            updated_at: Option<DateTime<Utc>>,
            pushed_at: Option<DateTime<Utc>>,
        }

        let api_url = format!("https://api.github.com/repos/{}/{}", owner, name);
        let response = self
            .http
            .get(&api_url)
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await
            .map_err(|e| MetadataFailure {
                message: format!("Network request failed: {}", e),
                transient: true,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MetadataFailure {
                message: format!("HTTP {} from {}", status.as_u16(), api_url),
                transient: status.is_server_error(),
            });
        }

        let repo: GithubRepo = response.json().await.map_err(|e| MetadataFailure {
            message: format!("Failed to parse provider response: {}", e),
            transient: false,
        })?;

        Ok(ProviderMetadata {
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            last_updated: repo.updated_at.or(repo.pushed_at),
        })
    }
}

#[async_trait]
impl GitSource for GitCli {
    async fn clone_repo(&self, url: &str, dest: &Path) -> PipelineResult<CloneInfo> {
        let (owner, name) = parse_remote_url(url).ok_or_else(|| PipelineError::Clone {
            message: format!("Cannot derive owner/name from URL: {}", url),
        })?;

        let dest_str = dest.to_string_lossy().to_string();
        let clone = tokio::time::timeout(
            self.clone_timeout,
            Self::git_output(None, &["clone", "--depth", "1", url, &dest_str]),
        )
        .await;

        match clone {
            Err(_) => {
                return Err(PipelineError::Clone {
                    message: format!("clone timed out after {:?}", self.clone_timeout),
                })
            }
            Ok(Err(e)) => {
                return Err(PipelineError::Clone {
                    message: e.to_string(),
                })
            }
            Ok(Ok(_)) => {}
        }

        // HEAD details are best-effort; a detached or unborn HEAD still
        // yields a usable snapshot.
        let commit_sha = Self::git_output(Some(dest), &["rev-parse", "HEAD"]).await.ok();
        let branch = Self::git_output(Some(dest), &["rev-parse", "--abbrev-ref", "HEAD"])
            .await
            .unwrap_or_else(|e| {
                log::warn!("Failed to resolve branch for {}: {}", url, e);
                "main".to_string()
            });

        Ok(CloneInfo {
            owner,
            name,
            branch,
            commit_sha,
        })
    }

    async fn metadata(&self, url: &str) -> PipelineResult<ProviderMetadata> {
        let (owner, name) = match parse_remote_url(url) {
            Some(parts) => parts,
            None => return Ok(ProviderMetadata::default()),
        };
        if !url.contains("github.com") {
            // Only the GitHub API is wired up; other providers degrade to
            // absent optional fields.
            return Ok(ProviderMetadata::default());
        }

        with_transient_retry(
            "provider metadata fetch",
            METADATA_ATTEMPTS,
            METADATA_RETRY_DELAY,
            || self.fetch_github_metadata(&owner, &name),
        )
        .await
        .map_err(|failure| PipelineError::Metadata {
            message: failure.message,
        })
    }

    async fn latest_commit_sha(&self, url: &str, branch: &str) -> PipelineResult<Option<String>> {
        let refspec = format!("refs/heads/{}", branch);
        let output = Self::git_output(None, &["ls-remote", url, &refspec]).await?;

        let sha = output
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().next())
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty());
        Ok(sha)
    }
}
