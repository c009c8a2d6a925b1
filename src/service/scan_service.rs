//! Submission orchestration

use crate::core::validation::validate_repo_url;
use crate::identity::{IdentityResolver, RequestContext};
use crate::pipeline::AnalysisPipeline;
use crate::quota::QuotaLedger;
use crate::repo::{RepositoryAnalysis, RepositoryCache};
use crate::scan::{classify_failure_message, ScanLifecycle, ScanRecord};
use crate::service::error::{ServiceError, ServiceResult};
use crate::store::DocSnapshot;
use tokio::sync::watch;

/// Returned to the submitter; everything else arrives via the watch stream
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub scan_id: String,
    pub repo_id: String,
}

#[derive(Clone)]
pub struct ScanService {
    resolver: IdentityResolver,
    ledger: QuotaLedger,
    lifecycle: ScanLifecycle,
    pipeline: AnalysisPipeline,
    cache: RepositoryCache,
}

impl ScanService {
    pub fn new(
        resolver: IdentityResolver,
        ledger: QuotaLedger,
        lifecycle: ScanLifecycle,
        pipeline: AnalysisPipeline,
        cache: RepositoryCache,
    ) -> Self {
        Self {
            resolver,
            ledger,
            lifecycle,
            pipeline,
            cache,
        }
    }

    /// Submit a repository for analysis
    ///
    /// Validation precedes the quota check, and quota consumption strictly
    /// precedes scan creation: a rejected request costs nothing, and a
    /// created scan has always been paid for. There is no refund if the
    /// pipeline later fails.
    pub fn submit(&self, ctx: &RequestContext, repo_url: &str) -> ServiceResult<SubmitReceipt> {
        let repo_url =
            validate_repo_url(repo_url).map_err(|message| ServiceError::Validation { message })?;

        let principal = self.resolver.resolve(ctx);
        self.ledger.check_and_consume(&principal)?;

        let scan = self.lifecycle.create(&principal, &repo_url);
        let receipt = SubmitReceipt {
            scan_id: scan.scan_id.clone(),
            repo_id: scan.repo_id.clone(),
        };

        self.spawn_background_run(scan.scan_id, repo_url);
        Ok(receipt)
    }

    /// Drive one pipeline run for the scan; invoked exactly once per
    /// successful submission, which is what keeps a single logical owner
    /// per scan document.
    fn spawn_background_run(&self, scan_id: String, repo_url: String) {
        let lifecycle = self.lifecycle.clone();
        let pipeline = self.pipeline.clone();
        let cache = self.cache.clone();

        tokio::spawn(async move {
            if lifecycle.is_cancelled(&scan_id) {
                log::info!("Scan {} cancelled before analysis started", scan_id);
                return;
            }

            match lifecycle.start(&scan_id) {
                Ok(true) => {}
                Ok(false) => return,
                Err(e) => {
                    log::error!("Failed to start scan {}: {}", scan_id, e);
                    return;
                }
            }

            let progress_lifecycle = lifecycle.clone();
            let progress_scan_id = scan_id.clone();
            let on_progress = move |pct: u8| {
                progress_lifecycle.report_progress(&progress_scan_id, pct);
            };

            // The pipeline runs in its own task so that a panic there still
            // lands on the scan document instead of wedging it in `running`.
            let outcome =
                tokio::spawn(async move { pipeline.run(&repo_url, &on_progress).await }).await;

            let result = match outcome {
                Ok(Ok(outcome)) => {
                    // Persist only when the scan actually resolved; a scan
                    // cancelled mid-run discards the fresh analysis.
                    match lifecycle.finish_success(&scan_id, &outcome.analysis.metadata.full_name) {
                        Ok(true) => {
                            if !outcome.cache_hit {
                                cache.store_fresh(outcome.analysis);
                            }
                            Ok(true)
                        }
                        other => other,
                    }
                }
                Ok(Err(e)) => {
                    log::warn!("Scan {} pipeline failed: {}", scan_id, e);
                    lifecycle.finish_failure(&scan_id, e.error_code())
                }
                Err(join_err) => {
                    log::error!("Scan {} pipeline task aborted: {}", scan_id, join_err);
                    lifecycle
                        .finish_failure(&scan_id, classify_failure_message(&join_err.to_string()))
                }
            };

            if let Err(e) = result {
                log::error!("Failed to record outcome for scan {}: {}", scan_id, e);
            }
        });
    }

    /// Idempotent user-initiated cancellation
    pub fn cancel(&self, scan_id: &str) -> ServiceResult<bool> {
        self.lifecycle
            .cancel(scan_id)
            .map_err(|_| ServiceError::NotFound {
                scan_id: scan_id.to_string(),
            })
    }

    /// Live subscription to a scan document
    pub fn watch(&self, scan_id: &str) -> watch::Receiver<Option<DocSnapshot<ScanRecord>>> {
        self.lifecycle.watch(scan_id)
    }

    /// Point read of a scan document
    pub fn get_scan(&self, scan_id: &str) -> ServiceResult<ScanRecord> {
        self.lifecycle
            .get_required(scan_id)
            .map_err(|_| ServiceError::NotFound {
                scan_id: scan_id.to_string(),
            })
    }

    /// The shared analysis document a results page renders
    pub fn get_analysis(&self, repo_id: &str) -> Option<RepositoryAnalysis> {
        self.cache.lookup(repo_id)
    }

    /// Stable anonymous identifier for the caller, for client-side quota
    /// display; same hash and salt as the server-side resolver.
    pub fn anonymous_id(&self, ctx: &RequestContext) -> String {
        self.resolver.anonymous_id(ctx)
    }
}
