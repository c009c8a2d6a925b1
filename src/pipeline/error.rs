//! Pipeline Error Types
//!
//! Failures are tagged by the pipeline stage that produced them, which is
//! what the scan lifecycle classifies on. Metadata failures are non-fatal
//! inside the pipeline and should not normally surface.

use crate::scan::types::ScanErrorCode;

#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("Failed to clone repository: {message}")]
    Clone { message: String },

    #[error("Provider metadata unavailable: {message}")]
    Metadata { message: String },

    #[error("AI analysis failed: {message}")]
    Analysis { message: String },

    #[error("IO error: {message}")]
    Io { message: String },
}

impl PipelineError {
    /// Map the failed stage onto the scan error taxonomy
    pub fn error_code(&self) -> ScanErrorCode {
        match self {
            PipelineError::Clone { .. } => ScanErrorCode::CloneFailed,
            PipelineError::Analysis { .. } => ScanErrorCode::AnalysisFailed,
            PipelineError::Metadata { .. } | PipelineError::Io { .. } => ScanErrorCode::Unknown,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
