//! Buffering and parsing of intercepted API responses.
//!
//! The page-world tap hands raw response bodies to `parse_records`; records
//! carrying the ad-library marker are buffered with a monotonic correlation
//! id and redelivered until the content script acknowledges them. Parse
//! failures are logged and dropped, never retried.

use std::collections::BTreeMap;

use log::warn;
use serde_json::Value;

/// Parse a response body as a single JSON document, falling back to
/// newline-delimited JSON records. Lines that fail to parse are skipped
/// with a log line.
pub fn parse_records(body: &str) -> Vec<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return vec![value];
    }
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<Value>(line) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("skipping invalid JSON line ({err}): {line}");
                None
            }
        })
        .collect()
}

/// True when a record carries the nested ad-library payload marker.
pub fn has_capture_marker(record: &Value) -> bool {
    record
        .get("data")
        .and_then(|data| data.get("ad_library_main"))
        .is_some_and(|marker| !marker.is_null())
}

/// Captured payloads awaiting acknowledgment, keyed by correlation id.
/// At-least-once: a payload stays here, and keeps being redelivered, until
/// `ack` removes it or the page unloads.
#[derive(Debug, Default)]
pub struct CaptureBuffer {
    next_id: u64,
    pending: BTreeMap<u64, Value>,
}

impl CaptureBuffer {
    pub fn new() -> CaptureBuffer {
        CaptureBuffer::default()
    }

    pub fn store(&mut self, payload: Value) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(id, payload);
        id
    }

    pub fn ack(&mut self, correlation_id: u64) -> bool {
        self.pending.remove(&correlation_id).is_some()
    }

    pub fn pending(&self) -> impl Iterator<Item = (u64, &Value)> {
        self.pending.iter().map(|(id, payload)| (*id, payload))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Background-side index of intercepted ads, keyed by `ad_archive_id`.
/// Payloads are searched recursively; an object counts as an ad when it
/// has an `ad_archive_id` and a non-empty `snapshot` object.
#[derive(Debug, Default)]
pub struct CaptureIndex {
    ads: BTreeMap<String, Value>,
}

impl CaptureIndex {
    pub fn new() -> CaptureIndex {
        CaptureIndex::default()
    }

    /// Index every ad object found in `payload`. Returns how many entries
    /// were added or replaced.
    pub fn index_payload(&mut self, payload: &Value) -> usize {
        let mut added = 0;
        self.walk(payload, &mut added);
        added
    }

    fn walk(&mut self, value: &Value, added: &mut usize) {
        match value {
            Value::Object(map) => {
                if let Some(id) = map.get("ad_archive_id").and_then(ad_id_string) {
                    let snapshot_ok = map
                        .get("snapshot")
                        .and_then(Value::as_object)
                        .is_some_and(|snapshot| !snapshot.is_empty());
                    if snapshot_ok {
                        self.ads.insert(id, value.clone());
                        *added += 1;
                    }
                }
                for nested in map.values() {
                    self.walk(nested, added);
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.walk(item, added);
                }
            }
            _ => {}
        }
    }

    pub fn get(&self, ad_id: &str) -> Option<&Value> {
        self.ads.get(ad_id)
    }

    pub fn len(&self) -> usize {
        self.ads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ads.is_empty()
    }
}

// The id shows up both as a string and as a number in captured payloads.
fn ad_id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_single_json_document() {
        let records = parse_records(r#"{"data":{"ad_library_main":{}}}"#);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn falls_back_to_jsonl_and_skips_bad_lines() {
        let body = "{\"a\":1}\nnot json\r\n{\"b\":2}\n\n";
        let records = parse_records(body);
        assert_eq!(records, vec![json!({"a": 1}), json!({"b": 2})]);
    }

    #[test]
    fn garbage_body_yields_nothing() {
        assert!(parse_records("<html>error</html>").is_empty());
    }

    #[test]
    fn marker_requires_nested_field() {
        assert!(has_capture_marker(&json!({"data": {"ad_library_main": {}}})));
        assert!(!has_capture_marker(&json!({"data": {"other": {}}})));
        assert!(!has_capture_marker(&json!({"data": {"ad_library_main": null}})));
        assert!(!has_capture_marker(&json!({"ad_library_main": {}})));
    }

    #[test]
    fn correlation_ids_are_monotonic() {
        let mut buffer = CaptureBuffer::new();
        let first = buffer.store(json!({"n": 1}));
        let second = buffer.store(json!({"n": 2}));
        assert!(second > first);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn ack_removes_exactly_the_acked_capture() {
        let mut buffer = CaptureBuffer::new();
        let first = buffer.store(json!({"n": 1}));
        let second = buffer.store(json!({"n": 2}));
        assert!(buffer.ack(first));
        assert!(!buffer.ack(first));
        let pending: Vec<u64> = buffer.pending().map(|(id, _)| id).collect();
        assert_eq!(pending, vec![second]);
    }

    #[test]
    fn unacked_captures_stay_pending() {
        let mut buffer = CaptureBuffer::new();
        buffer.store(json!({"n": 1}));
        // Two redelivery sweeps see the same payload.
        assert_eq!(buffer.pending().count(), 1);
        assert_eq!(buffer.pending().count(), 1);
    }

    #[test]
    fn index_finds_nested_ads() {
        let mut index = CaptureIndex::new();
        let payload = json!({
            "data": {
                "ad_library_main": {
                    "search_results": [
                        {"ad_archive_id": "111", "snapshot": {"body": "a"}},
                        {"nested": {"ad_archive_id": 222, "snapshot": {"body": "b"}}},
                        {"ad_archive_id": "333", "snapshot": {}},
                        {"ad_archive_id": "444"}
                    ]
                }
            }
        });
        assert_eq!(index.index_payload(&payload), 2);
        assert!(index.get("111").is_some());
        assert!(index.get("222").is_some());
        assert!(index.get("333").is_none());
        assert!(index.get("444").is_none());
    }
}
