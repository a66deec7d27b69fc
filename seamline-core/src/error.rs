use thiserror::Error;

/// Errors produced by the scan event store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A scan with this caller-supplied id already exists. The first
    /// writer wins; the record is never overwritten.
    #[error("duplicate scan id {id}")]
    Duplicate { id: String },

    /// The backing store cannot provide a change-notification feed.
    /// Callers degrade to ingestion-only operation.
    #[error("change feed unavailable: {reason}")]
    ChangeFeedUnavailable { reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. })
    }
}
