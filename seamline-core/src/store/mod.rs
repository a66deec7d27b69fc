//! The append-only scan event store and its change-notification feed.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use seamline_model::{ScanEvent, ScanRecord};
use tokio::sync::broadcast;

use crate::error::StoreError;

pub use memory::MemoryScanStore;
pub use postgres::PostgresScanStore;

/// Kind of store mutation behind a change notification. Every kind
/// triggers the same full-snapshot refresh downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    Insert,
    Update,
    Delete,
}

/// Append-only event store for scans.
///
/// Uniqueness of the caller-supplied scan id is the store's concern; the
/// first writer with a given id wins and later writers get
/// [`StoreError::Duplicate`]. No application-level locking sits on top.
#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Append one scan. Never overwrites.
    async fn insert_scan(&self, event: &ScanEvent) -> Result<ScanRecord, StoreError>;

    /// Full current record set, in insertion order by store key.
    async fn list_scans(&self) -> Result<Vec<ScanRecord>, StoreError>;

    /// Subscribe to the store's change-notification feed. Emits one
    /// notification per committed mutation, regardless of its origin.
    async fn subscribe_changes(
        &self,
    ) -> Result<broadcast::Receiver<StoreChange>, StoreError>;

    /// Cheap liveness probe for health reporting.
    async fn ping(&self) -> Result<(), StoreError>;
}
