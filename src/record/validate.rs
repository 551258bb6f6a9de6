//! Three-stage validation funnel for candidate record lines. Stage order is
//! structure, then semantic completeness, then value integrity; the first
//! failure wins and becomes the line's rejection reason. A value that clears
//! all three stages is lowered into a typed [`ProbeRecord`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use std::ops::RangeInclusive;

use super::{
    Fingerprint, Ieee80211, Location, Packet, ProbeInfo, ProbeRecord, Radio, RawIe, VendorIe,
    is_canonical_mac,
};
use crate::error::{IntegrityConstraint, RejectReason, SchemaViolation};

pub const RSSI_DBM_RANGE: RangeInclusive<i64> = -120..=0;
pub const WIFI_CHANNEL_RANGE: RangeInclusive<i64> = 1..=14;

type JsonObject = Map<String, Value>;

/// Parse and validate one candidate line.
pub fn validate_line(line: &str) -> Result<ProbeRecord, RejectReason> {
    let value: Value = serde_json::from_str(line).map_err(|_| RejectReason::Parse)?;
    validate_value(&value)
}

/// Validate an already parsed JSON value.
pub fn validate_value(value: &Value) -> Result<ProbeRecord, RejectReason> {
    let record = value
        .as_object()
        .ok_or(RejectReason::Schema(SchemaViolation::NotAnObject))?;

    let capture_timestamp = check_structure(record)?;
    let packet = record
        .get("packet")
        .and_then(Value::as_object)
        .ok_or(RejectReason::Schema(SchemaViolation::MissingField("packet")))?;
    let source_address = check_source_address(packet)?;
    check_integrity(packet, &source_address)?;

    Ok(build_record(record, packet, capture_timestamp, source_address))
}

fn missing(field: &'static str) -> RejectReason {
    RejectReason::Schema(SchemaViolation::MissingField(field))
}

fn wrong_type(field: &'static str, expected: &'static str) -> RejectReason {
    RejectReason::Schema(SchemaViolation::WrongType { field, expected })
}

fn require_str<'a>(obj: &'a JsonObject, field: &'static str) -> Result<&'a str, RejectReason> {
    match obj.get(field) {
        None => Err(missing(field)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(wrong_type(field, "a string")),
    }
}

/// Stage 1: required fields exist with the right primitive types and the
/// timestamp parses. Optional fields are type-checked only when present.
fn check_structure(record: &JsonObject) -> Result<DateTime<Utc>, RejectReason> {
    require_str(record, "capture_id")?;
    let raw_ts = require_str(record, "capture_ts")?;
    require_str(record, "scanner_id")?;

    let packet = match record.get("packet") {
        None => return Err(missing("packet")),
        Some(Value::Object(packet)) => packet,
        Some(_) => return Err(wrong_type("packet", "an object")),
    };

    require_str(packet, "pkt_id")?;
    match packet.get("ieee80211") {
        None => return Err(missing("ieee80211")),
        Some(Value::Object(_)) => {}
        Some(_) => return Err(wrong_type("ieee80211", "an object")),
    }
    match packet.get("rssi_dbm") {
        None => return Err(missing("rssi_dbm")),
        Some(value) if value.as_i64().is_some() => {}
        Some(_) => return Err(wrong_type("rssi_dbm", "an integer")),
    }
    require_str(packet, "frame_raw_hex")?;

    let capture_timestamp =
        parse_capture_ts(raw_ts).ok_or(RejectReason::Schema(SchemaViolation::BadTimestamp))?;

    check_optional_types(packet)?;
    Ok(capture_timestamp)
}

fn check_optional_types(packet: &JsonObject) -> Result<(), RejectReason> {
    if let Some(radio) = packet.get("radio")
        && !radio.is_null()
    {
        let radio = radio
            .as_object()
            .ok_or_else(|| wrong_type("radio", "an object"))?;
        if let Some(channel) = radio.get("channel")
            && !channel.is_null()
            && channel.as_i64().is_none()
        {
            return Err(wrong_type("radio.channel", "an integer"));
        }
        if let Some(freq) = radio.get("freq_mhz")
            && !freq.is_null()
            && freq.as_i64().is_none()
        {
            return Err(wrong_type("radio.freq_mhz", "an integer"));
        }
    }
    if let Some(vendor_ies) = packet.get("vendor_ies")
        && !vendor_ies.is_array()
    {
        return Err(wrong_type("vendor_ies", "an array"));
    }
    Ok(())
}

/// Stage 2: the frame must name a source address, or there is no device to
/// attribute it to.
fn check_source_address(packet: &JsonObject) -> Result<String, RejectReason> {
    let ieee80211 = packet
        .get("ieee80211")
        .and_then(Value::as_object)
        .ok_or(RejectReason::Semantic)?;
    match ieee80211.get("sa").and_then(Value::as_str) {
        Some(sa) if !sa.is_empty() => Ok(sa.to_string()),
        _ => Err(RejectReason::Semantic),
    }
}

/// Stage 3: range and format constraints on values that are already known to
/// have the right types.
fn check_integrity(packet: &JsonObject, source_address: &str) -> Result<(), RejectReason> {
    if let Some(rssi) = packet.get("rssi_dbm").and_then(Value::as_i64)
        && !RSSI_DBM_RANGE.contains(&rssi)
    {
        return Err(RejectReason::Integrity {
            constraint: IntegrityConstraint::RssiRange,
            value: rssi.to_string(),
        });
    }

    if let Some(channel) = packet
        .get("radio")
        .and_then(Value::as_object)
        .and_then(|radio| radio.get("channel"))
        .and_then(Value::as_i64)
        && !WIFI_CHANNEL_RANGE.contains(&channel)
    {
        return Err(RejectReason::Integrity {
            constraint: IntegrityConstraint::ChannelRange,
            value: channel.to_string(),
        });
    }

    if !is_canonical_mac(&source_address.to_ascii_lowercase()) {
        return Err(RejectReason::Integrity {
            constraint: IntegrityConstraint::MacFormat,
            value: source_address.to_string(),
        });
    }

    Ok(())
}

/// Accept an RFC 3339 instant (trailing `Z` included) or a naive ISO-8601
/// timestamp read as UTC, which older sensor builds emitted.
pub fn parse_capture_ts(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn opt_string(obj: &JsonObject, field: &str) -> Option<String> {
    obj.get(field).and_then(Value::as_str).map(str::to_string)
}

/// Lower a validated value into the typed record. Required fields are
/// guaranteed by stage 1; malformed entries inside optional collections are
/// skipped rather than failing the record.
fn build_record(
    record: &JsonObject,
    packet: &JsonObject,
    capture_timestamp: DateTime<Utc>,
    source_address: String,
) -> ProbeRecord {
    let radio = packet
        .get("radio")
        .and_then(Value::as_object)
        .map(|radio| Radio {
            channel: radio
                .get("channel")
                .and_then(Value::as_i64)
                .and_then(|v| u16::try_from(v).ok()),
            freq_mhz: radio
                .get("freq_mhz")
                .and_then(Value::as_i64)
                .and_then(|v| u32::try_from(v).ok()),
            band: opt_string(radio, "band"),
            bandwidth_mhz: radio
                .get("bandwidth_mhz")
                .and_then(Value::as_i64)
                .and_then(|v| u32::try_from(v).ok()),
        });

    let (destination_address, bssid) = match packet.get("ieee80211").and_then(Value::as_object) {
        Some(ieee80211) => (opt_string(ieee80211, "da"), opt_string(ieee80211, "bssid")),
        None => (None, None),
    };

    let probe = packet
        .get("probe")
        .and_then(Value::as_object)
        .map(|probe| ProbeInfo {
            ssid: opt_string(probe, "ssid"),
        });

    let fingerprint = packet
        .get("fingerprint")
        .and_then(Value::as_object)
        .map(|fingerprint| Fingerprint {
            ie_signature: opt_string(fingerprint, "ie_signature"),
        });

    let vendor_ies = packet
        .get("vendor_ies")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|entry| entry.get("oui").and_then(Value::as_str))
                .map(|oui| VendorIe {
                    oui: oui.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    let ies_raw = packet
        .get("ies_raw")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|entry| entry.get("id").and_then(Value::as_i64))
                .filter_map(|id| u8::try_from(id).ok())
                .map(|id| RawIe { id })
                .collect()
        })
        .unwrap_or_default();

    let location = record
        .get("location")
        .and_then(Value::as_object)
        .map(|location| Location {
            lat: location.get("lat").and_then(Value::as_f64),
            lon: location.get("lon").and_then(Value::as_f64),
            label: opt_string(location, "label"),
        });

    ProbeRecord {
        capture_id: opt_string(record, "capture_id").unwrap_or_default(),
        capture_timestamp,
        scanner_id: opt_string(record, "scanner_id").unwrap_or_default(),
        firmware: opt_string(record, "firmware"),
        location,
        packet: Packet {
            pkt_id: opt_string(packet, "pkt_id").unwrap_or_default(),
            radio,
            ieee80211: Ieee80211 {
                source_address,
                destination_address,
                bssid,
            },
            rssi_dbm: packet
                .get("rssi_dbm")
                .and_then(Value::as_i64)
                .and_then(|v| i32::try_from(v).ok())
                .unwrap_or_default(),
            frame_raw_hex: opt_string(packet, "frame_raw_hex").unwrap_or_default(),
            probe,
            vendor_ies,
            fingerprint,
            ies_raw,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{IntegrityConstraint, RejectReason, SchemaViolation};
    use chrono::TimeZone;
    use serde_json::json;

    fn valid_record() -> Value {
        json!({
            "capture_id": "cap-0001",
            "capture_ts": "2024-05-01T12:00:00Z",
            "scanner_id": "scanner-01",
            "firmware": "2.1.0",
            "location": {"lat": -23.55, "lon": -46.63, "label": "lab"},
            "packet": {
                "pkt_id": "pkt-42",
                "radio": {"channel": 6, "freq_mhz": 2437, "band": "2.4GHz", "bandwidth_mhz": 20},
                "ieee80211": {"sa": "aa:bb:cc:dd:ee:ff", "da": "ff:ff:ff:ff:ff:ff"},
                "rssi_dbm": -48,
                "frame_raw_hex": "40000000ffff",
                "probe": {"ssid": "CoffeeShop"},
                "vendor_ies": [{"oui": "0017F2"}, {"no_oui": true}, 7],
                "fingerprint": {"ie_signature": "0,1,3,45,221"},
                "ies_raw": [{"id": 0}, {"id": 221}, {"id": "bad"}]
            }
        })
    }

    #[test]
    fn test_valid_record_becomes_typed() {
        let record = validate_value(&valid_record()).unwrap();
        assert_eq!(record.capture_id, "cap-0001");
        assert_eq!(record.scanner_id, "scanner-01");
        assert_eq!(
            record.capture_timestamp,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(record.source_mac(), "aa:bb:cc:dd:ee:ff");
        assert_eq!(record.packet.rssi_dbm, -48);
        let radio = record.packet.radio.as_ref().unwrap();
        assert_eq!(radio.channel, Some(6));
        assert_eq!(radio.freq_mhz, Some(2437));
        // malformed collection entries are skipped, not fatal
        assert_eq!(record.packet.vendor_ies.len(), 1);
        assert_eq!(record.packet.vendor_ies[0].oui, "0017F2");
        assert_eq!(record.packet.ies_raw.len(), 2);
        assert_eq!(
            record.packet.probe.as_ref().unwrap().ssid.as_deref(),
            Some("CoffeeShop")
        );
        assert_eq!(
            record
                .packet
                .fingerprint
                .as_ref()
                .unwrap()
                .ie_signature
                .as_deref(),
            Some("0,1,3,45,221")
        );
        assert_eq!(record.location.as_ref().unwrap().label.as_deref(), Some("lab"));
    }

    #[test]
    fn test_radio_is_fully_optional() {
        let mut value = valid_record();
        value["packet"]
            .as_object_mut()
            .unwrap()
            .remove("radio");
        let record = validate_value(&value).unwrap();
        assert!(record.packet.radio.is_none());
    }

    #[test]
    fn test_missing_required_fields_name_the_field() {
        for field in ["capture_id", "capture_ts", "scanner_id", "packet"] {
            let mut value = valid_record();
            value.as_object_mut().unwrap().remove(field);
            match validate_value(&value) {
                Err(RejectReason::Schema(SchemaViolation::MissingField(named))) => {
                    assert_eq!(named, field)
                }
                other => panic!("expected missing `{field}`, got {other:?}"),
            }
        }
        for field in ["pkt_id", "ieee80211", "rssi_dbm", "frame_raw_hex"] {
            let mut value = valid_record();
            value["packet"].as_object_mut().unwrap().remove(field);
            match validate_value(&value) {
                Err(RejectReason::Schema(SchemaViolation::MissingField(named))) => {
                    assert_eq!(named, field)
                }
                other => panic!("expected missing `{field}`, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_wrong_types_are_schema_errors() {
        let mut value = valid_record();
        value["capture_id"] = json!(17);
        assert!(matches!(
            validate_value(&value),
            Err(RejectReason::Schema(SchemaViolation::WrongType {
                field: "capture_id",
                ..
            }))
        ));

        let mut value = valid_record();
        value["packet"]["rssi_dbm"] = json!("-48");
        assert!(matches!(
            validate_value(&value),
            Err(RejectReason::Schema(SchemaViolation::WrongType {
                field: "rssi_dbm",
                ..
            }))
        ));

        let mut value = valid_record();
        value["packet"]["radio"]["channel"] = json!("six");
        assert!(matches!(
            validate_value(&value),
            Err(RejectReason::Schema(SchemaViolation::WrongType {
                field: "radio.channel",
                ..
            }))
        ));

        let mut value = valid_record();
        value["packet"]["vendor_ies"] = json!({"oui": "0017F2"});
        assert!(matches!(
            validate_value(&value),
            Err(RejectReason::Schema(SchemaViolation::WrongType {
                field: "vendor_ies",
                ..
            }))
        ));
    }

    #[test]
    fn test_timestamp_forms() {
        assert!(parse_capture_ts("2024-05-01T12:00:00Z").is_some());
        assert!(parse_capture_ts("2024-05-01T12:00:00+02:00").is_some());
        assert!(parse_capture_ts("2024-05-01T12:00:00.250").is_some());
        assert!(parse_capture_ts("2024-05-01 12:00:00").is_none());
        assert!(parse_capture_ts("yesterday").is_none());

        // naive timestamps are read as UTC
        assert_eq!(
            parse_capture_ts("2024-05-01T12:00:00"),
            parse_capture_ts("2024-05-01T12:00:00Z")
        );

        let mut value = valid_record();
        value["capture_ts"] = json!("01/05/2024 12:00");
        assert!(matches!(
            validate_value(&value),
            Err(RejectReason::Schema(SchemaViolation::BadTimestamp))
        ));
    }

    #[test]
    fn test_missing_source_address_is_semantic_not_schema() {
        let mut value = valid_record();
        value["packet"]["ieee80211"] = json!({"da": "ff:ff:ff:ff:ff:ff"});
        assert_eq!(validate_value(&value), Err(RejectReason::Semantic));

        let mut value = valid_record();
        value["packet"]["ieee80211"]["sa"] = json!("");
        assert_eq!(validate_value(&value), Err(RejectReason::Semantic));
    }

    #[test]
    fn test_rssi_out_of_range_is_rejected() {
        let mut value = valid_record();
        value["packet"]["rssi_dbm"] = json!(5);
        assert_eq!(
            validate_value(&value),
            Err(RejectReason::Integrity {
                constraint: IntegrityConstraint::RssiRange,
                value: "5".to_string(),
            })
        );

        let mut value = valid_record();
        value["packet"]["rssi_dbm"] = json!(-121);
        assert!(matches!(
            validate_value(&value),
            Err(RejectReason::Integrity {
                constraint: IntegrityConstraint::RssiRange,
                ..
            })
        ));

        // boundary values survive
        for rssi in [-120, 0] {
            let mut value = valid_record();
            value["packet"]["rssi_dbm"] = json!(rssi);
            assert!(validate_value(&value).is_ok());
        }
    }

    #[test]
    fn test_channel_out_of_range_is_rejected() {
        let mut value = valid_record();
        value["packet"]["radio"]["channel"] = json!(20);
        assert_eq!(
            validate_value(&value),
            Err(RejectReason::Integrity {
                constraint: IntegrityConstraint::ChannelRange,
                value: "20".to_string(),
            })
        );
    }

    #[test]
    fn test_mac_format_is_enforced_case_insensitively() {
        let mut value = valid_record();
        value["packet"]["ieee80211"]["sa"] = json!("AA:BB:CC:DD:EE:FF");
        assert!(validate_value(&value).is_ok());

        let mut value = valid_record();
        value["packet"]["ieee80211"]["sa"] = json!("aabbccddeeff");
        assert!(matches!(
            validate_value(&value),
            Err(RejectReason::Integrity {
                constraint: IntegrityConstraint::MacFormat,
                ..
            })
        ));
    }

    #[test]
    fn test_unparseable_lines_are_parse_errors() {
        assert_eq!(validate_line("not json"), Err(RejectReason::Parse));
        assert_eq!(validate_line("{\"truncated\": "), Err(RejectReason::Parse));
    }

    #[test]
    fn test_non_object_json_is_a_schema_error() {
        assert_eq!(
            validate_line("[1, 2, 3]"),
            Err(RejectReason::Schema(SchemaViolation::NotAnObject))
        );
    }
}
