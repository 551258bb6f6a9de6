//! Typed probe-request records. A record only exists in this form after it
//! has survived validation, so consumers can read required fields without
//! re-checking presence. Optional sub-structures stay `Option`s; the schema
//! marks them optional and absence is not an error.

pub mod classify;
pub mod legacy;
pub mod validate;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One accepted capture record. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeRecord {
    pub capture_id: String,
    pub capture_timestamp: DateTime<Utc>,
    pub scanner_id: String,
    pub firmware: Option<String>,
    pub location: Option<Location>,
    pub packet: Packet,
}

impl ProbeRecord {
    /// The source MAC as it appeared on the wire. Every record maps to
    /// exactly one of these; it is the aggregation key.
    pub fn source_mac(&self) -> &str {
        &self.packet.ieee80211.source_address
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Packet {
    pub pkt_id: String,
    pub radio: Option<Radio>,
    pub ieee80211: Ieee80211,
    pub rssi_dbm: i32,
    pub frame_raw_hex: String,
    pub probe: Option<ProbeInfo>,
    pub vendor_ies: Vec<VendorIe>,
    pub fingerprint: Option<Fingerprint>,
    pub ies_raw: Vec<RawIe>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Radio {
    pub channel: Option<u16>,
    pub freq_mhz: Option<u32>,
    pub band: Option<String>,
    pub bandwidth_mhz: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ieee80211 {
    pub source_address: String,
    pub destination_address: Option<String>,
    pub bssid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeInfo {
    pub ssid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorIe {
    pub oui: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fingerprint {
    pub ie_signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawIe {
    pub id: u8,
}

/// Lowercase form used as the device key. Validation already guarantees the
/// colon-separated shape.
pub fn canonical_mac(mac: &str) -> String {
    mac.to_ascii_lowercase()
}

/// Whether `s` is a canonical colon-separated lowercase hex MAC.
pub fn is_canonical_mac(s: &str) -> bool {
    let groups: Vec<&str> = s.split(':').collect();
    groups.len() == 6
        && groups.iter().all(|group| {
            group.len() == 2
                && group
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        })
}
