//! Store Error Types

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
