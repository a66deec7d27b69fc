use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One physical RFID scan as submitted by a reader.
///
/// `id` is caller-supplied and globally unique in the event store; the
/// first writer wins and later submissions of the same `id` are rejected.
/// `timestamp` is epoch milliseconds as reported by the reader and is
/// stored as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanEvent {
    pub id: String,
    pub tag_id: String,
    pub station_id: String,
    pub timestamp: i64,
}

/// A persisted scan: the event plus the store-assigned record key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    /// Store-assigned key (Uuid v7, sortable by insertion time).
    pub record_key: Uuid,
    #[serde(flatten)]
    pub event: ScanEvent,
}

impl ScanRecord {
    pub fn new(record_key: Uuid, event: ScanEvent) -> Self {
        Self { record_key, event }
    }
}
