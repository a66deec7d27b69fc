//! Wire protocol for the device and dashboard transports.
//!
//! Devices send `{ "action": ..., "data": ... }` envelopes and receive
//! `{ "type", "status", "data"?, "error"?, "timestamp" }` frames back on
//! the same connection. Dashboards receive topic frames carrying the full
//! current record collection.

use seamline_model::{ScanEvent, ScanRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ACTION_RFID_SCAN: &str = "rfid_scan";
pub const ACTION_PING: &str = "ping";
pub const ACTION_REQUEST_SNAPSHOT: &str = "request_snapshot";

pub const FRAME_CONNECTION: &str = "connection";
pub const FRAME_RFID_SCAN_SUCCESS: &str = "rfid_scan_success";
pub const FRAME_RFID_SCAN_BROADCAST: &str = "rfid_scan_broadcast";
pub const FRAME_PONG: &str = "pong";
pub const FRAME_ERROR: &str = "error";

pub const ERROR_INVALID_JSON: &str = "Invalid JSON format";
pub const ERROR_VALIDATION: &str = "Validation Error";
pub const ERROR_DUPLICATE: &str = "Duplicate Error";
pub const ERROR_DATABASE: &str = "Database Error";
pub const ERROR_UNKNOWN_ACTION: &str = "Unknown action";

/// Topic under which dashboards receive whole-collection snapshots.
pub const TOPIC_SCAN_UPDATES: &str = "scan_updates";

/// Required scan payload fields, in the order validation reports them.
pub const REQUIRED_SCAN_FIELDS: [&str; 4] = ["id", "tagId", "stationId", "timestamp"];

/// Transient per-frame envelope sent by devices.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub action: String,
    #[serde(default)]
    pub data: Value,
}

impl InboundMessage {
    /// Parse a raw device frame. Any shape that is not a JSON object with
    /// a string `action` is a parse failure.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameStatus {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

/// Server-to-device response frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub status: FrameStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    pub timestamp: i64,
}

impl DeviceFrame {
    fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Acknowledgement sent unprompted when a device connects.
    pub fn connection_ack() -> Self {
        Self {
            frame_type: FRAME_CONNECTION.to_string(),
            status: FrameStatus::Success,
            data: Some(serde_json::json!({
                "message": "WebSocket connected successfully",
            })),
            error: None,
            timestamp: Self::now_millis(),
        }
    }

    pub fn pong() -> Self {
        Self {
            frame_type: FRAME_PONG.to_string(),
            status: FrameStatus::Success,
            data: None,
            error: None,
            timestamp: Self::now_millis(),
        }
    }

    /// Success reply for a persisted scan, carrying the store-assigned key
    /// and the caller-supplied id.
    pub fn scan_success(record: &ScanRecord) -> Self {
        Self {
            frame_type: FRAME_RFID_SCAN_SUCCESS.to_string(),
            status: FrameStatus::Success,
            data: Some(serde_json::json!({
                "scanId": record.record_key,
                "id": record.event.id,
                "message": "RFID scan data saved successfully",
            })),
            error: None,
            timestamp: Self::now_millis(),
        }
    }

    /// Peer-broadcast frame carrying the persisted record's public fields.
    pub fn scan_broadcast(record: &ScanRecord) -> Self {
        Self {
            frame_type: FRAME_RFID_SCAN_BROADCAST.to_string(),
            status: FrameStatus::Info,
            data: serde_json::to_value(record).ok(),
            error: None,
            timestamp: Self::now_millis(),
        }
    }

    pub fn error(kind: &str, message: impl Into<String>) -> Self {
        Self {
            frame_type: FRAME_ERROR.to_string(),
            status: FrameStatus::Error,
            data: None,
            error: Some(ErrorDetail {
                kind: kind.to_string(),
                message: message.into(),
            }),
            timestamp: Self::now_millis(),
        }
    }

    pub fn error_kind(&self) -> Option<&str> {
        self.error.as_ref().map(|detail| detail.kind.as_str())
    }
}

/// Server-to-dashboard frame: a named topic plus its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicFrame {
    pub topic: String,
    pub data: Value,
    pub timestamp: i64,
}

impl TopicFrame {
    /// Full-collection snapshot under the scan-updates topic.
    pub fn scan_snapshot(records: &[ScanRecord]) -> Self {
        Self {
            topic: TOPIC_SCAN_UPDATES.to_string(),
            data: serde_json::to_value(records).unwrap_or(Value::Array(Vec::new())),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Outcome of validating an `rfid_scan` payload.
pub type ScanPayloadResult = Result<ScanEvent, Vec<&'static str>>;

/// Required-field check over exactly `id`, `tagId`, `stationId`,
/// `timestamp`. Absent or falsy values (null, empty string, zero, false)
/// count as missing; a `timestamp` that cannot be coerced to an integer
/// does too. The timestamp itself is taken as-is - past or future values
/// are accepted.
pub fn parse_scan_payload(data: &Value) -> ScanPayloadResult {
    let mut missing = Vec::new();
    for field in REQUIRED_SCAN_FIELDS {
        if !is_truthy(data.get(field)) {
            missing.push(field);
        }
    }
    if !missing.is_empty() {
        return Err(missing);
    }

    let timestamp = match coerce_timestamp(&data["timestamp"]) {
        Some(ts) => ts,
        None => return Err(vec!["timestamp"]),
    };

    Ok(ScanEvent {
        id: scalar_to_string(&data["id"]),
        tag_id: scalar_to_string(&data["tagId"]),
        station_id: scalar_to_string(&data["stationId"]),
        timestamp,
    })
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_well_formed_envelope() {
        let msg =
            InboundMessage::parse(r#"{"action":"rfid_scan","data":{"id":"S1"}}"#).unwrap();
        assert_eq!(msg.action, ACTION_RFID_SCAN);
        assert_eq!(msg.data["id"], "S1");
    }

    #[test]
    fn rejects_frames_without_action() {
        assert!(InboundMessage::parse(r#"{"data":{}}"#).is_err());
        assert!(InboundMessage::parse("not json at all").is_err());
    }

    #[test]
    fn valid_payload_produces_event() {
        let data = json!({
            "id": "S1",
            "tagId": "T1",
            "stationId": "ST1",
            "timestamp": 1000,
        });

        let event = parse_scan_payload(&data).unwrap();
        assert_eq!(event.id, "S1");
        assert_eq!(event.tag_id, "T1");
        assert_eq!(event.station_id, "ST1");
        assert_eq!(event.timestamp, 1000);
    }

    #[test]
    fn missing_fields_reported_in_canonical_order() {
        let data = json!({ "tagId": "T1" });
        let missing = parse_scan_payload(&data).unwrap_err();
        assert_eq!(missing, vec!["id", "stationId", "timestamp"]);
    }

    #[test]
    fn falsy_values_count_as_missing() {
        let data = json!({
            "id": "",
            "tagId": "T1",
            "stationId": null,
            "timestamp": 0,
        });

        let missing = parse_scan_payload(&data).unwrap_err();
        assert_eq!(missing, vec!["id", "stationId", "timestamp"]);
    }

    #[test]
    fn timestamp_accepts_integer_like_strings_and_any_range() {
        let data = json!({
            "id": "S1",
            "tagId": "T1",
            "stationId": "ST1",
            "timestamp": "123456",
        });
        assert_eq!(parse_scan_payload(&data).unwrap().timestamp, 123456);

        // No plausibility window: far past and far future both pass.
        let past = json!({
            "id": "S2", "tagId": "T1", "stationId": "ST1", "timestamp": -5,
        });
        assert_eq!(parse_scan_payload(&past).unwrap().timestamp, -5);
    }

    #[test]
    fn non_coercible_timestamp_is_reported_missing() {
        let data = json!({
            "id": "S1",
            "tagId": "T1",
            "stationId": "ST1",
            "timestamp": "soon",
        });
        assert_eq!(parse_scan_payload(&data).unwrap_err(), vec!["timestamp"]);
    }

    #[test]
    fn error_frames_carry_kind_and_message() {
        let frame = DeviceFrame::error(ERROR_DUPLICATE, "duplicate scan id S1");
        assert_eq!(frame.frame_type, FRAME_ERROR);
        assert_eq!(frame.status, FrameStatus::Error);
        assert_eq!(frame.error_kind(), Some(ERROR_DUPLICATE));

        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["error"]["type"], ERROR_DUPLICATE);
        assert_eq!(json["status"], "error");
        // `data` is omitted entirely rather than serialized as null.
        assert!(json.get("data").is_none());
    }
}
