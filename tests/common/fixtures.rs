//! Fake collaborators and a wired service harness
//!
//! `FakeGit` materializes a tiny repository tree instead of running git;
//! `FakeModel` returns a canned structured analysis. Both count calls so
//! tests can assert which pipeline stages actually ran.

use async_trait::async_trait;
use repolens::core::time::{MockTimeProvider, TimeProvider};
use repolens::identity::IdentityResolver;
use repolens::pipeline::{
    parse_remote_url, AnalysisPipeline, CloneInfo, GitSource, LanguageModel, PipelineError,
    PipelineResult, ProviderMetadata,
};
use repolens::quota::{QuotaConfig, QuotaLedger};
use repolens::repo::analysis::{ModelAnalysis, SkillLevel, TechCategory, TechStackItem};
use repolens::repo::RepositoryCache;
use repolens::scan::ScanLifecycle;
use repolens::service::ScanService;
use repolens::store::Collection;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const REPO_URL: &str = "https://github.com/acme/widget";
pub const COMMIT_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const COMMIT_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

pub const TEST_SALT: &str = "fixture-salt";

/// Fake git provider writing a minimal tree into the clone destination
pub struct FakeGit {
    commit: Mutex<String>,
    /// When false, `latest_commit_sha` reports an inconclusive lookup
    pub report_tip: AtomicBool,
    pub fail_clone: AtomicBool,
    pub fail_ref: AtomicBool,
    pub fail_metadata: AtomicBool,
    pub clone_calls: AtomicUsize,
    pub ref_calls: AtomicUsize,
    /// When set, `clone_repo` blocks until the gate is notified
    clone_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self {
            commit: Mutex::new(COMMIT_A.to_string()),
            report_tip: AtomicBool::new(true),
            fail_clone: AtomicBool::new(false),
            fail_ref: AtomicBool::new(false),
            fail_metadata: AtomicBool::new(false),
            clone_calls: AtomicUsize::new(0),
            ref_calls: AtomicUsize::new(0),
            clone_gate: Mutex::new(None),
        }
    }

    /// Move the upstream tip, invalidating any cached analysis
    pub fn set_commit(&self, sha: &str) {
        *self.commit.lock().unwrap() = sha.to_string();
    }

    pub fn commit(&self) -> String {
        self.commit.lock().unwrap().clone()
    }

    /// Make the next clone block until the returned gate is notified
    pub fn gate_clone(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.clone_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }
}

#[async_trait]
impl GitSource for FakeGit {
    async fn clone_repo(&self, url: &str, dest: &Path) -> PipelineResult<CloneInfo> {
        self.clone_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.clone_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_clone.load(Ordering::SeqCst) {
            return Err(PipelineError::Clone {
                message: format!("fixture refused to clone {}", url),
            });
        }

        std::fs::create_dir_all(dest.join("src")).map_err(|e| PipelineError::Io {
            message: e.to_string(),
        })?;
        std::fs::write(dest.join("README.md"), "# Widget\n\nA test repository.\n").map_err(
            |e| PipelineError::Io {
                message: e.to_string(),
            },
        )?;
        std::fs::write(dest.join("src/main.rs"), "fn main() {}\n").map_err(|e| {
            PipelineError::Io {
                message: e.to_string(),
            }
        })?;

        let (owner, name) = parse_remote_url(url).ok_or_else(|| PipelineError::Clone {
            message: format!("unparseable url {}", url),
        })?;
        Ok(CloneInfo {
            owner,
            name,
            branch: "main".to_string(),
            commit_sha: Some(self.commit()),
        })
    }

    async fn metadata(&self, url: &str) -> PipelineResult<ProviderMetadata> {
        if self.fail_metadata.load(Ordering::SeqCst) {
            return Err(PipelineError::Metadata {
                message: format!("fixture metadata unavailable for {}", url),
            });
        }
        Ok(ProviderMetadata {
            stars: Some(42),
            forks: Some(7),
            last_updated: None,
        })
    }

    async fn latest_commit_sha(&self, url: &str, _branch: &str) -> PipelineResult<Option<String>> {
        self.ref_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_ref.load(Ordering::SeqCst) {
            return Err(PipelineError::Io {
                message: format!("fixture ref lookup failed for {}", url),
            });
        }
        if !self.report_tip.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(self.commit()))
    }
}

/// Fake language model returning a canned analysis
pub struct FakeModel {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl FakeModel {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn analyze(&self, _prompt: &str) -> PipelineResult<ModelAnalysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(PipelineError::Analysis {
                message: "fixture model unavailable".to_string(),
            });
        }
        Ok(sample_model_analysis())
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}

pub fn sample_model_analysis() -> ModelAnalysis {
    ModelAnalysis {
        description: "A small widget library".to_string(),
        tech_stack: vec![TechStackItem {
            name: "Rust".to_string(),
            category: TechCategory::Language,
            version: None,
            confidence: Some(95),
        }],
        primary_language: Some("Rust".to_string()),
        skill_level: SkillLevel::Junior,
        skill_level_rationale: None,
        file_stats: None,
        structure: None,
        code_quality: None,
        complexity: None,
    }
}

/// A fully wired service on a mock clock with fake collaborators
pub struct Harness {
    pub service: ScanService,
    pub lifecycle: ScanLifecycle,
    pub ledger: QuotaLedger,
    pub cache: RepositoryCache,
    pub pipeline: AnalysisPipeline,
    pub time: MockTimeProvider,
    pub git: Arc<FakeGit>,
    pub model: Arc<FakeModel>,
}

pub fn harness() -> Harness {
    harness_with_config(QuotaConfig::default())
}

pub fn harness_with_config(quota_config: QuotaConfig) -> Harness {
    let mock = MockTimeProvider::new();
    let time: Arc<dyn TimeProvider> = Arc::new(mock.clone());

    let users = Collection::new("users", Arc::clone(&time));
    let anonymous_users = Collection::new("anonymous_users", Arc::clone(&time));
    let scans = Collection::new("scans", Arc::clone(&time));
    let repositories = Collection::new("repository-cache", Arc::clone(&time));

    let resolver = IdentityResolver::new(TEST_SALT);
    let ledger = QuotaLedger::new(users, anonymous_users, Arc::clone(&time), quota_config);
    let lifecycle = ScanLifecycle::new(scans, Arc::clone(&time));
    let cache = RepositoryCache::new(repositories, Arc::clone(&time));

    let git = Arc::new(FakeGit::new());
    let model = Arc::new(FakeModel::new());
    let pipeline = AnalysisPipeline::new(
        Arc::clone(&git) as Arc<dyn GitSource>,
        Arc::clone(&model) as Arc<dyn LanguageModel>,
        cache.clone(),
        Arc::clone(&time),
    );

    let service = ScanService::new(
        resolver,
        ledger.clone(),
        lifecycle.clone(),
        pipeline.clone(),
        cache.clone(),
    );

    Harness {
        service,
        lifecycle,
        ledger,
        cache,
        pipeline,
        time: mock,
        git,
        model,
    }
}
