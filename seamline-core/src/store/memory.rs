//! In-memory scan store.
//!
//! Backs the test suites and doubles as the fake store the change-feed
//! contract is exercised against. Mirrors the Postgres implementation's
//! observable behavior: first-writer-wins uniqueness and one change
//! notification per committed insert.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use seamline_model::{ScanEvent, ScanRecord};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{ScanStore, StoreChange};

#[derive(Debug, Default)]
struct Inner {
    records: Vec<ScanRecord>,
    ids: HashSet<String>,
}

#[derive(Debug)]
pub struct MemoryScanStore {
    inner: Mutex<Inner>,
    changes: broadcast::Sender<StoreChange>,
    change_feed_enabled: bool,
    fail_inserts: bool,
    fail_lists: bool,
}

impl MemoryScanStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            inner: Mutex::new(Inner::default()),
            changes,
            change_feed_enabled: true,
            fail_inserts: false,
            fail_lists: false,
        }
    }

    /// A store whose change feed cannot be established, for exercising
    /// the degrade-not-crash path.
    pub fn without_change_feed() -> Self {
        Self {
            change_feed_enabled: false,
            ..Self::new()
        }
    }

    /// A store whose writes fail with a backend error, for exercising
    /// the generic database-error reply.
    pub fn failing() -> Self {
        Self {
            fail_inserts: true,
            ..Self::new()
        }
    }

    /// A store whose snapshot queries fail, for exercising the
    /// keep-watching behavior of the change-feed consumer.
    pub fn failing_snapshots() -> Self {
        Self {
            fail_lists: true,
            ..Self::new()
        }
    }

    /// Emit a change notification without a write, standing in for
    /// mutations that originate elsewhere (bulk imports, admin edits).
    pub fn notify(&self, change: StoreChange) {
        let _ = self.changes.send(change);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("scan store mutex poisoned").records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryScanStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScanStore for MemoryScanStore {
    async fn insert_scan(&self, event: &ScanEvent) -> Result<ScanRecord, StoreError> {
        if self.fail_inserts {
            return Err(StoreError::Backend(
                "synthetic store failure".to_string(),
            ));
        }

        let record = {
            let mut inner = self.inner.lock().expect("scan store mutex poisoned");
            if inner.ids.contains(&event.id) {
                return Err(StoreError::Duplicate {
                    id: event.id.clone(),
                });
            }
            let record = ScanRecord::new(Uuid::now_v7(), event.clone());
            inner.ids.insert(event.id.clone());
            inner.records.push(record.clone());
            record
        };

        let _ = self.changes.send(StoreChange::Insert);
        Ok(record)
    }

    async fn list_scans(&self) -> Result<Vec<ScanRecord>, StoreError> {
        if self.fail_lists {
            return Err(StoreError::Backend(
                "synthetic snapshot failure".to_string(),
            ));
        }
        Ok(self
            .inner
            .lock()
            .expect("scan store mutex poisoned")
            .records
            .clone())
    }

    async fn subscribe_changes(
        &self,
    ) -> Result<broadcast::Receiver<StoreChange>, StoreError> {
        if !self.change_feed_enabled {
            return Err(StoreError::ChangeFeedUnavailable {
                reason: "change feed disabled for this store".to_string(),
            });
        }
        Ok(self.changes.subscribe())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
