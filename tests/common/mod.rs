//! Common test utilities and helpers
//!
//! Shared fixtures for the integration suites: fake git and language-model
//! collaborators, a fully wired service harness on a mock clock, and
//! helpers for waiting on scan documents.
#![allow(dead_code)]

pub mod fixtures;

use repolens::scan::ScanRecord;
use repolens::service::ScanService;
use std::time::Duration;

/// Wait until the scan document reaches a terminal state
pub async fn wait_for_terminal(service: &ScanService, scan_id: &str) -> ScanRecord {
    tokio::time::timeout(Duration::from_secs(5), async {
        let mut rx = service.watch(scan_id);
        loop {
            let terminal = rx
                .borrow_and_update()
                .as_ref()
                .map(|snap| snap.data.clone())
                .filter(|scan| scan.is_terminal());
            if let Some(scan) = terminal {
                return scan;
            }
            rx.changed().await.expect("scan watch channel closed");
        }
    })
    .await
    .expect("scan never reached a terminal state")
}

/// Wait until the scan document satisfies `pred`
pub async fn wait_for_scan(
    service: &ScanService,
    scan_id: &str,
    pred: impl Fn(&ScanRecord) -> bool,
) -> ScanRecord {
    tokio::time::timeout(Duration::from_secs(5), async {
        let mut rx = service.watch(scan_id);
        loop {
            let hit = rx
                .borrow_and_update()
                .as_ref()
                .map(|snap| snap.data.clone())
                .filter(|scan| pred(scan));
            if let Some(scan) = hit {
                return scan;
            }
            rx.changed().await.expect("scan watch channel closed");
        }
    })
    .await
    .expect("scan never matched the expected condition")
}
