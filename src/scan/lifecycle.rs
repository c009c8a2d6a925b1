//! Scan lifecycle operations
//!
//! Every transition runs as one atomic store update, which is what resolves
//! the two-writer race between the pipeline driver and an external
//! cancellation: once `failed/CANCELLED` is recorded, no later write from
//! the original run can revert it.

use crate::core::time::TimeProvider;
use crate::identity::Principal;
use crate::repo::id::repo_id;
use crate::scan::types::{ScanErrorCode, ScanRecord, ScanStatus};
use crate::store::{Collection, DocSnapshot, StoreResult};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, thiserror::Error)]
pub enum LifecycleError {
    #[error("Scan not found: {scan_id}")]
    NotFound { scan_id: String },
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Owns scan records and their transitions
#[derive(Clone)]
pub struct ScanLifecycle {
    scans: Collection<ScanRecord>,
    time: Arc<dyn TimeProvider>,
    sequence: Arc<AtomicU64>,
}

impl ScanLifecycle {
    pub fn new(scans: Collection<ScanRecord>, time: Arc<dyn TimeProvider>) -> Self {
        Self {
            scans,
            time,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Allocate a scan in `queued` state
    ///
    /// Callers must have consumed quota first; this ordering is the
    /// submission path's responsibility, not checked here.
    pub fn create(&self, principal: &Principal, repo_url: &str) -> ScanRecord {
        let now = self.time.now();
        let repo_id = repo_id(repo_url);
        let scan_id = self.generate_scan_id(&principal.id, &repo_id, now);

        let record = ScanRecord {
            scan_id: scan_id.clone(),
            principal_id: principal.id.clone(),
            repo_id,
            repo_full_name: guess_full_name(repo_url),
            is_public: true,
            status: ScanStatus::Queued,
            progress: 0,
            error_code: None,
            queued_at: now,
            started_at: None,
            finished_at: None,
        };

        self.scans.set(&scan_id, record.clone());
        log::info!("Scan {} queued for {}", scan_id, record.repo_full_name);
        record
    }

    /// queued → running; no-op if an external cancellation got there first
    ///
    /// Returns whether the scan actually started.
    pub fn start(&self, scan_id: &str) -> LifecycleResult<bool> {
        let now = self.time.now();
        self.transition(scan_id, |scan| {
            if scan.status != ScanStatus::Queued {
                log::debug!(
                    "Not starting scan {}: status is {}",
                    scan.scan_id,
                    scan.status
                );
                return false;
            }
            scan.status = ScanStatus::Running;
            scan.started_at = Some(now);
            scan.progress = 0;
            log::info!("Scan {} running", scan.scan_id);
            true
        })
    }

    /// Report pipeline progress; silently dropped after cancellation
    ///
    /// The driving pipeline keeps running to completion either way and the
    /// caller discards its result, so this never raises.
    pub fn report_progress(&self, scan_id: &str, pct: u8) {
        let pct = pct.min(100);
        let _ = self.transition(scan_id, |scan| {
            if scan.status != ScanStatus::Running || scan.is_cancelled() {
                return false;
            }
            if pct < scan.progress {
                // Progress is monotone while running.
                return false;
            }
            scan.progress = pct;
            true
        });
    }

    /// running → succeeded, unless cancellation already won
    pub fn finish_success(&self, scan_id: &str, repo_full_name: &str) -> LifecycleResult<bool> {
        let now = self.time.now();
        self.transition(scan_id, |scan| {
            if scan.is_cancelled() {
                log::info!("Scan {} finished after cancellation; result discarded", scan.scan_id);
                return false;
            }
            if scan.status != ScanStatus::Running {
                log::warn!(
                    "Ignoring finish_success for scan {} in state {}",
                    scan.scan_id,
                    scan.status
                );
                return false;
            }
            scan.status = ScanStatus::Succeeded;
            scan.progress = 100;
            scan.error_code = None;
            scan.finished_at = Some(now);
            scan.repo_full_name = repo_full_name.to_string();
            log::info!("Scan {} succeeded", scan.scan_id);
            true
        })
    }

    /// Record a failure; sticky cancellation is never overwritten
    pub fn finish_failure(
        &self,
        scan_id: &str,
        error_code: ScanErrorCode,
    ) -> LifecycleResult<bool> {
        let now = self.time.now();
        self.transition(scan_id, |scan| {
            if scan.is_cancelled() {
                log::info!(
                    "Scan {} already cancelled; keeping CANCELLED over {}",
                    scan.scan_id,
                    error_code
                );
                return false;
            }
            if scan.is_terminal() {
                return false;
            }
            scan.status = ScanStatus::Failed;
            scan.error_code = Some(error_code);
            scan.finished_at = Some(now);
            log::warn!("Scan {} failed: {}", scan.scan_id, error_code);
            true
        })
    }

    /// External cancellation, allowed from any non-terminal state
    ///
    /// Idempotent: cancelling an already-cancelled scan succeeds quietly.
    pub fn cancel(&self, scan_id: &str) -> LifecycleResult<bool> {
        let now = self.time.now();
        self.transition(scan_id, |scan| {
            if scan.is_cancelled() {
                return true;
            }
            if scan.is_terminal() {
                log::debug!(
                    "Cannot cancel scan {}: already terminal ({})",
                    scan.scan_id,
                    scan.status
                );
                return false;
            }
            scan.status = ScanStatus::Failed;
            scan.error_code = Some(ScanErrorCode::Cancelled);
            scan.finished_at = Some(now);
            log::info!("Scan {} cancelled", scan.scan_id);
            true
        })
    }

    pub fn get(&self, scan_id: &str) -> Option<ScanRecord> {
        self.scans.get(scan_id)
    }

    /// Point read that treats a missing scan as an error
    pub fn get_required(&self, scan_id: &str) -> StoreResult<ScanRecord> {
        self.scans.get_required(scan_id)
    }

    pub fn is_cancelled(&self, scan_id: &str) -> bool {
        self.scans
            .get(scan_id)
            .is_some_and(|scan| scan.is_cancelled())
    }

    /// Live subscription to the scan document
    pub fn watch(&self, scan_id: &str) -> watch::Receiver<Option<DocSnapshot<ScanRecord>>> {
        self.scans.watch(scan_id)
    }

    fn transition(
        &self,
        scan_id: &str,
        f: impl FnOnce(&mut ScanRecord) -> bool,
    ) -> LifecycleResult<bool> {
        self.scans.update(scan_id, |entry| match entry.value.as_mut() {
            Some(scan) => Ok(f(scan)),
            None => Err(LifecycleError::NotFound {
                scan_id: scan_id.to_string(),
            }),
        })
    }

    fn generate_scan_id(&self, principal_id: &str, repo_id: &str, now: DateTime<Utc>) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha256::new();
        hasher.update(principal_id.as_bytes());
        hasher.update(repo_id.as_bytes());
        hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
        hasher.update(seq.to_be_bytes());
        let digest = format!("{:x}", hasher.finalize());
        format!("scan-{}", &digest[..16])
    }
}

/// Provisional owner/name from the URL, shown until the clone confirms it
fn guess_full_name(repo_url: &str) -> String {
    let trimmed = repo_url
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .trim_end_matches(".git");
    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() >= 3 {
        segments[segments.len() - 2..].join("/")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::SystemTimeProvider;
    use crate::identity::{Principal, PrincipalKind};

    fn lifecycle() -> ScanLifecycle {
        let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
        ScanLifecycle::new(Collection::new("scans", Arc::clone(&time)), time)
    }

    fn principal() -> Principal {
        Principal {
            kind: PrincipalKind::Anonymous,
            id: "anon-1".to_string(),
        }
    }

    const URL: &str = "https://github.com/a/b";

    #[test]
    fn test_create_allocates_unique_queued_scans() {
        let lifecycle = lifecycle();

        let first = lifecycle.create(&principal(), URL);
        let second = lifecycle.create(&principal(), URL);

        assert_ne!(first.scan_id, second.scan_id);
        assert!(first.scan_id.starts_with("scan-"));
        assert_eq!(first.status, ScanStatus::Queued);
        assert_eq!(first.progress, 0);
        assert_eq!(first.repo_full_name, "a/b");
        assert_eq!(first.repo_id, second.repo_id);
        assert!(first.started_at.is_none());
    }

    #[test]
    fn test_happy_path_transitions() {
        let lifecycle = lifecycle();
        let scan = lifecycle.create(&principal(), URL);

        assert!(lifecycle.start(&scan.scan_id).unwrap());
        let running = lifecycle.get(&scan.scan_id).unwrap();
        assert_eq!(running.status, ScanStatus::Running);
        assert!(running.started_at.is_some());

        lifecycle.report_progress(&scan.scan_id, 40);
        assert_eq!(lifecycle.get(&scan.scan_id).unwrap().progress, 40);

        assert!(lifecycle.finish_success(&scan.scan_id, "real/name").unwrap());
        let done = lifecycle.get(&scan.scan_id).unwrap();
        assert_eq!(done.status, ScanStatus::Succeeded);
        assert_eq!(done.progress, 100);
        assert_eq!(done.repo_full_name, "real/name");
        assert!(done.error_code.is_none());
        assert!(done.finished_at.is_some());
    }

    #[test]
    fn test_progress_is_monotone_and_gated_on_running() {
        let lifecycle = lifecycle();
        let scan = lifecycle.create(&principal(), URL);

        // Not running yet: dropped.
        lifecycle.report_progress(&scan.scan_id, 30);
        assert_eq!(lifecycle.get(&scan.scan_id).unwrap().progress, 0);

        lifecycle.start(&scan.scan_id).unwrap();
        lifecycle.report_progress(&scan.scan_id, 50);
        lifecycle.report_progress(&scan.scan_id, 30);
        assert_eq!(lifecycle.get(&scan.scan_id).unwrap().progress, 50);

        // Overshoot clamps.
        lifecycle.report_progress(&scan.scan_id, 250);
        assert_eq!(lifecycle.get(&scan.scan_id).unwrap().progress, 100);
    }

    #[test]
    fn test_failure_sets_code_exactly_when_failed() {
        let lifecycle = lifecycle();
        let scan = lifecycle.create(&principal(), URL);
        lifecycle.start(&scan.scan_id).unwrap();

        assert!(lifecycle
            .finish_failure(&scan.scan_id, ScanErrorCode::CloneFailed)
            .unwrap());

        let failed = lifecycle.get(&scan.scan_id).unwrap();
        assert_eq!(failed.status, ScanStatus::Failed);
        assert_eq!(failed.error_code, Some(ScanErrorCode::CloneFailed));
        assert!(failed.finished_at.is_some());
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let lifecycle = lifecycle();
        let scan = lifecycle.create(&principal(), URL);
        lifecycle.start(&scan.scan_id).unwrap();
        lifecycle.finish_success(&scan.scan_id, "a/b").unwrap();

        assert!(!lifecycle
            .finish_failure(&scan.scan_id, ScanErrorCode::Unknown)
            .unwrap());
        assert!(!lifecycle.start(&scan.scan_id).unwrap());

        let done = lifecycle.get(&scan.scan_id).unwrap();
        assert_eq!(done.status, ScanStatus::Succeeded);
        assert!(done.error_code.is_none());
    }

    #[test]
    fn test_cancel_from_queued_prevents_start() {
        let lifecycle = lifecycle();
        let scan = lifecycle.create(&principal(), URL);

        assert!(lifecycle.cancel(&scan.scan_id).unwrap());
        assert!(!lifecycle.start(&scan.scan_id).unwrap());

        let cancelled = lifecycle.get(&scan.scan_id).unwrap();
        assert!(cancelled.is_cancelled());
    }

    #[test]
    fn test_cancellation_is_sticky_against_late_writes() {
        let lifecycle = lifecycle();
        let scan = lifecycle.create(&principal(), URL);
        lifecycle.start(&scan.scan_id).unwrap();
        lifecycle.report_progress(&scan.scan_id, 40);

        assert!(lifecycle.cancel(&scan.scan_id).unwrap());

        // Late writes from the in-flight pipeline run.
        lifecycle.report_progress(&scan.scan_id, 60);
        assert!(!lifecycle.finish_success(&scan.scan_id, "a/b").unwrap());
        assert!(!lifecycle
            .finish_failure(&scan.scan_id, ScanErrorCode::AnalysisFailed)
            .unwrap());

        let cancelled = lifecycle.get(&scan.scan_id).unwrap();
        assert_eq!(cancelled.status, ScanStatus::Failed);
        assert_eq!(cancelled.error_code, Some(ScanErrorCode::Cancelled));
        assert_eq!(cancelled.progress, 40);
    }

    #[test]
    fn test_cancel_is_idempotent_but_respects_terminal_states() {
        let lifecycle = lifecycle();
        let scan = lifecycle.create(&principal(), URL);

        assert!(lifecycle.cancel(&scan.scan_id).unwrap());
        assert!(lifecycle.cancel(&scan.scan_id).unwrap());

        let finished = lifecycle.create(&principal(), URL);
        lifecycle.start(&finished.scan_id).unwrap();
        lifecycle.finish_success(&finished.scan_id, "a/b").unwrap();
        assert!(!lifecycle.cancel(&finished.scan_id).unwrap());
    }

    #[test]
    fn test_operations_on_unknown_scan() {
        let lifecycle = lifecycle();

        assert!(matches!(
            lifecycle.start("scan-missing"),
            Err(LifecycleError::NotFound { .. })
        ));
        // Progress reports never raise.
        lifecycle.report_progress("scan-missing", 10);
    }

    #[tokio::test]
    async fn test_watch_delivers_terminal_state() {
        let lifecycle = lifecycle();
        let scan = lifecycle.create(&principal(), URL);
        let mut rx = lifecycle.watch(&scan.scan_id);

        assert_eq!(
            rx.borrow_and_update().as_ref().unwrap().data.status,
            ScanStatus::Queued
        );

        lifecycle.start(&scan.scan_id).unwrap();
        lifecycle.finish_success(&scan.scan_id, "a/b").unwrap();

        rx.changed().await.unwrap();
        let latest = rx.borrow_and_update().as_ref().unwrap().data.clone();
        assert_eq!(latest.status, ScanStatus::Succeeded);
    }

    #[test]
    fn test_guess_full_name() {
        assert_eq!(guess_full_name("https://github.com/a/b"), "a/b");
        assert_eq!(guess_full_name("https://github.com/a/b.git"), "a/b");
        assert_eq!(guess_full_name("https://github.com/a/b/"), "a/b");
    }
}
