//! Service Error Types
//!
//! Synchronous submission failures only; asynchronous pipeline failures are
//! recorded on the scan document instead.

use crate::quota::QuotaError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    #[error("{message}")]
    Validation { message: String },

    #[error(transparent)]
    Quota(#[from] QuotaError),

    #[error("Failed to create scan: {message}")]
    Submission { message: String },

    #[error("Scan not found: {scan_id}")]
    NotFound { scan_id: String },
}

impl ServiceError {
    /// HTTP-equivalent status for transport layers
    pub fn status_hint(&self) -> u16 {
        match self {
            ServiceError::Validation { .. } => 400,
            ServiceError::Quota(QuotaError::Exceeded { .. }) => 429,
            ServiceError::Quota(QuotaError::InvalidLedger { .. }) => 500,
            ServiceError::Submission { .. } => 500,
            ServiceError::NotFound { .. } => 404,
        }
    }
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
