//! Read-only snapshots computed from pipeline output. Nothing here feeds
//! back into validation or aggregation; these exist for reporting consumers.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::device::DeviceState;
use crate::record::ProbeRecord;

/// Standard names for the information element ids that show up in probe
/// requests.
pub fn ie_name(id: u8) -> &'static str {
    match id {
        0 => "SSID",
        1 => "Supported Rates",
        3 => "DS Parameter Set",
        45 => "HT Capabilities",
        50 => "Extended Supported Rates",
        127 => "Extended Capabilities",
        191 => "VHT Capabilities",
        221 => "Vendor Specific",
        255 => "Reserved/Extension",
        _ => "Unknown",
    }
}

/// Frame-level feature tallies across the retained records.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct FeatureCounts {
    pub ie_counts: BTreeMap<u8, u64>,
    pub vendor_ie_counts: BTreeMap<String, u64>,
    pub fingerprint_counts: BTreeMap<String, u64>,
    pub ssid_counts: BTreeMap<String, u64>,
}

impl FeatureCounts {
    pub fn collect<'a>(records: impl IntoIterator<Item = &'a ProbeRecord>) -> Self {
        let mut counts = Self::default();
        for record in records {
            let packet = &record.packet;
            for ie in &packet.ies_raw {
                *counts.ie_counts.entry(ie.id).or_default() += 1;
            }
            for vendor_ie in &packet.vendor_ies {
                *counts
                    .vendor_ie_counts
                    .entry(vendor_ie.oui.clone())
                    .or_default() += 1;
            }
            if let Some(fingerprint) = &packet.fingerprint
                && let Some(signature) = &fingerprint.ie_signature
                && !signature.is_empty()
            {
                *counts
                    .fingerprint_counts
                    .entry(signature.clone())
                    .or_default() += 1;
            }
            if let Some(probe) = &packet.probe
                && let Some(ssid) = &probe.ssid
                && !ssid.is_empty()
            {
                *counts.ssid_counts.entry(ssid.clone()).or_default() += 1;
            }
        }
        counts
    }

    /// Most requested networks first, ties broken by name.
    pub fn top_ssids(&self, n: usize) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self
            .ssid_counts
            .iter()
            .map(|(ssid, count)| (ssid.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(n);
        ranked
    }

    /// Most seen information elements first.
    pub fn top_ies(&self, n: usize) -> Vec<(u8, u64)> {
        let mut ranked: Vec<(u8, u64)> = self
            .ie_counts
            .iter()
            .map(|(id, count)| (*id, *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }
}

/// RSSI spread with rough proximity buckets. Anything above -50 dBm is
/// effectively next to the sensor; below -70 dBm is across the room or
/// farther.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalOverview {
    pub samples: u64,
    pub min_dbm: i32,
    pub max_dbm: i32,
    pub average_dbm: f64,
    pub very_close: u64,
    pub close: u64,
    pub far: u64,
}

impl SignalOverview {
    /// None when no device carried any samples.
    pub fn from_devices<'a>(devices: impl IntoIterator<Item = &'a DeviceState>) -> Option<Self> {
        let mut samples = 0u64;
        let mut sum = 0i64;
        let mut min_dbm = i32::MAX;
        let mut max_dbm = i32::MIN;
        let mut very_close = 0u64;
        let mut close = 0u64;
        let mut far = 0u64;

        for device in devices {
            for &rssi in &device.rssi_samples {
                samples += 1;
                sum += i64::from(rssi);
                min_dbm = min_dbm.min(rssi);
                max_dbm = max_dbm.max(rssi);
                if rssi > -50 {
                    very_close += 1;
                } else if rssi >= -70 {
                    close += 1;
                } else {
                    far += 1;
                }
            }
        }

        if samples == 0 {
            return None;
        }
        Some(Self {
            samples,
            min_dbm,
            max_dbm,
            average_dbm: sum as f64 / samples as f64,
            very_close,
            close,
            far,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::validate::validate_line;
    use serde_json::json;

    fn record(ssid: Option<&str>, rssi: i32) -> ProbeRecord {
        let mut packet = json!({
            "pkt_id": "p1",
            "ieee80211": {"sa": "aa:bb:cc:00:00:01"},
            "rssi_dbm": rssi,
            "frame_raw_hex": "40",
            "vendor_ies": [{"oui": "0017F2"}],
            "fingerprint": {"ie_signature": "0,1,45,221"},
            "ies_raw": [{"id": 0}, {"id": 221}],
        });
        if let Some(ssid) = ssid {
            packet["probe"] = json!({"ssid": ssid});
        }
        let line = json!({
            "capture_id": "c1",
            "capture_ts": "2024-05-01T12:00:00Z",
            "scanner_id": "s1",
            "packet": packet,
        })
        .to_string();
        validate_line(&line).unwrap()
    }

    #[test]
    fn test_ie_name_table() {
        assert_eq!(ie_name(0), "SSID");
        assert_eq!(ie_name(221), "Vendor Specific");
        assert_eq!(ie_name(77), "Unknown");
    }

    #[test]
    fn test_feature_counts_tally_across_records() {
        let records = [
            record(Some("HomeNet"), -40),
            record(Some("HomeNet"), -45),
            record(Some("CoffeeShop"), -60),
            record(None, -70),
        ];
        let counts = FeatureCounts::collect(&records);

        assert_eq!(counts.ie_counts.get(&0), Some(&4));
        assert_eq!(counts.ie_counts.get(&221), Some(&4));
        assert_eq!(counts.vendor_ie_counts.get("0017F2"), Some(&4));
        assert_eq!(counts.fingerprint_counts.get("0,1,45,221"), Some(&4));
        assert_eq!(counts.ssid_counts.get("HomeNet"), Some(&2));
        assert_eq!(counts.top_ssids(1), vec![("HomeNet", 2)]);
        assert_eq!(counts.top_ies(1).len(), 1);
    }

    #[test]
    fn test_signal_overview_buckets() {
        use crate::device::DeviceAggregator;
        use crate::vendor::VendorDirectory;

        let mut aggregator = DeviceAggregator::new(VendorDirectory::unloaded());
        for rssi in [-40, -50, -70, -90] {
            aggregator.ingest(&record(None, rssi));
        }

        let overview = SignalOverview::from_devices(aggregator.devices().values()).unwrap();
        assert_eq!(overview.samples, 4);
        assert_eq!(overview.min_dbm, -90);
        assert_eq!(overview.max_dbm, -40);
        assert_eq!(overview.average_dbm, -62.5);
        assert_eq!(overview.very_close, 1);
        assert_eq!(overview.close, 2);
        assert_eq!(overview.far, 1);
    }

    #[test]
    fn test_signal_overview_empty_is_none() {
        assert!(SignalOverview::from_devices(std::iter::empty()).is_none());
    }
}
