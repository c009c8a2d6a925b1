//! Scan record types and failure taxonomy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scan processing state
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScanStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

/// Why a scan failed
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanErrorCode {
    CloneFailed,
    AnalysisFailed,
    Cancelled,
    Unknown,
}

/// Best-effort classification of an untagged failure description
///
/// The pipeline reports stage-tagged errors which classify precisely; this
/// substring heuristic only handles failures that arrive as bare text (task
/// join errors, panics) and must never do worse than `Unknown`.
pub fn classify_failure_message(message: &str) -> ScanErrorCode {
    let lowered = message.to_lowercase();
    if lowered.contains("clone") {
        ScanErrorCode::CloneFailed
    } else if lowered.contains("analys") {
        ScanErrorCode::AnalysisFailed
    } else {
        ScanErrorCode::Unknown
    }
}

/// The unit of work for one analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub scan_id: String,
    pub principal_id: String,
    pub repo_id: String,
    /// Guessed from the URL at creation, corrected after cloning
    pub repo_full_name: String,
    pub is_public: bool,

    pub status: ScanStatus,
    /// 0..=100, monotone while running, fixed at 100 on success
    pub progress: u8,
    /// Non-null iff status == failed
    pub error_code: Option<ScanErrorCode>,

    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScanRecord {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, ScanStatus::Succeeded | ScanStatus::Failed)
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == ScanStatus::Failed && self.error_code == Some(ScanErrorCode::Cancelled)
    }
}
