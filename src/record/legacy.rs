//! Translation of first-generation sensor records into the canonical shape.
//! The v1 firmware printed flat objects; this adapter rewrites them before
//! validation so the validator only ever deals with one schema.

use chrono::DateTime;
use serde_json::{Value, json};

/// Heuristic for the v1 shape: the old flat identity fields are present and
/// the canonical envelope is not.
pub fn is_legacy_record(value: &Value) -> bool {
    match value.as_object() {
        Some(obj) => {
            obj.contains_key("mac") && obj.contains_key("timestamp")
                && !obj.contains_key("capture_id")
        }
        None => false,
    }
}

/// Rewrite a legacy record into the canonical shape. Canonical records and
/// unrecognized values pass through untouched; whatever the rewrite cannot
/// supply is left for the validator to reject.
pub fn translate_legacy(value: Value) -> Value {
    if !is_legacy_record(&value) {
        return value;
    }
    let Some(obj) = value.as_object() else {
        return value;
    };

    let raw_ts = obj.get("timestamp").and_then(Value::as_i64).unwrap_or(0);
    // v1 units depended on whether the RTC was set at boot; large values are
    // milliseconds since the epoch, small ones are seconds
    let secs = if raw_ts >= 1_000_000_000_000 {
        raw_ts / 1000
    } else {
        raw_ts
    };
    let capture_ts = DateTime::from_timestamp(secs, 0)
        .map(|ts| ts.to_rfc3339())
        .unwrap_or_default();

    let node = obj
        .get("node_id")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let sequence = obj.get("sequence").and_then(Value::as_i64).unwrap_or(0);
    let ssid = obj
        .get("ssid_list")
        .and_then(Value::as_array)
        .and_then(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .find(|ssid| !ssid.is_empty())
        });

    let mut packet = json!({
        "pkt_id": sequence.to_string(),
        "ieee80211": { "sa": obj.get("mac").cloned().unwrap_or(Value::Null) },
        "rssi_dbm": obj.get("rssi").cloned().unwrap_or(Value::Null),
        "frame_raw_hex": "",
    });
    if let Some(channel) = obj.get("channel")
        && !channel.is_null()
    {
        packet["radio"] = json!({ "channel": channel });
    }
    if let Some(ssid) = ssid {
        packet["probe"] = json!({ "ssid": ssid });
    }

    json!({
        "capture_id": format!("legacy-{node}-{sequence}"),
        "capture_ts": capture_ts,
        "scanner_id": node,
        "packet": packet,
    })
}
