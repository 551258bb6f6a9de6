//! Per-device running state folded from accepted records. Identity is the
//! canonical source MAC. The vendor name and the randomization flag are
//! resolved once, at first sight: they are properties of the address itself,
//! not of any single frame.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::record::{ProbeRecord, canonical_mac};
use crate::vendor::{UNKNOWN_VENDOR, VendorDirectory, is_randomized_mac};

/// Everything known about one device so far. Set-valued fields only ever
/// grow; `first_seen <= last_seen` holds at all times.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceState {
    pub mac: String,
    pub vendor_name: String,
    pub is_randomized: bool,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub probe_count: u64,
    pub channels: BTreeSet<u16>,
    pub rssi_samples: Vec<i32>,
    pub frequencies_mhz: BTreeSet<u32>,
    pub vendor_ie_ouis: BTreeSet<String>,
    pub fingerprint_signatures: BTreeSet<String>,
    pub ssids_requested: BTreeSet<String>,
}

impl DeviceState {
    fn new(mac: String, vendor_name: String, is_randomized: bool, seen: DateTime<Utc>) -> Self {
        Self {
            mac,
            vendor_name,
            is_randomized,
            first_seen: seen,
            last_seen: seen,
            probe_count: 1,
            channels: BTreeSet::new(),
            rssi_samples: Vec::new(),
            frequencies_mhz: BTreeSet::new(),
            vendor_ie_ouis: BTreeSet::new(),
            fingerprint_signatures: BTreeSet::new(),
            ssids_requested: BTreeSet::new(),
        }
    }

    pub fn average_rssi(&self) -> Option<f64> {
        if self.rssi_samples.is_empty() {
            return None;
        }
        let sum: i64 = self.rssi_samples.iter().map(|&rssi| i64::from(rssi)).sum();
        Some(sum as f64 / self.rssi_samples.len() as f64)
    }

    /// Seconds between the first and last observation.
    pub fn dwell_seconds(&self) -> i64 {
        (self.last_seen - self.first_seen).num_seconds()
    }

    /// Fold one record's observations in. Everything here is commutative
    /// (max, min, append, set insert), so replay order does not matter for
    /// the set-valued fields.
    fn absorb(&mut self, record: &ProbeRecord) {
        let packet = &record.packet;
        if let Some(radio) = &packet.radio {
            if let Some(channel) = radio.channel {
                self.channels.insert(channel);
            }
            if let Some(freq) = radio.freq_mhz {
                self.frequencies_mhz.insert(freq);
            }
        }
        self.rssi_samples.push(packet.rssi_dbm);
        for vendor_ie in &packet.vendor_ies {
            self.vendor_ie_ouis.insert(vendor_ie.oui.clone());
        }
        if let Some(fingerprint) = &packet.fingerprint
            && let Some(signature) = &fingerprint.ie_signature
            && !signature.is_empty()
        {
            self.fingerprint_signatures.insert(signature.clone());
        }
        if let Some(probe) = &packet.probe
            && let Some(ssid) = &probe.ssid
            && !ssid.is_empty()
        {
            self.ssids_requested.insert(ssid.clone());
        }
    }
}

/// How many devices the aggregator may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    /// Keep every device for the whole run.
    #[default]
    Unbounded,
    /// Track at most this many devices, evicting the least recently seen
    /// when a new one arrives at the cap.
    MostRecent(usize),
}

/// Folds accepted records into the device map. Never fails: every input has
/// already been validated.
#[derive(Debug)]
pub struct DeviceAggregator {
    vendors: VendorDirectory,
    devices: HashMap<String, DeviceState>,
    retention: RetentionPolicy,
    evicted: u64,
}

impl DeviceAggregator {
    pub fn new(vendors: VendorDirectory) -> Self {
        Self::with_retention(vendors, RetentionPolicy::Unbounded)
    }

    pub fn with_retention(vendors: VendorDirectory, retention: RetentionPolicy) -> Self {
        Self {
            vendors,
            devices: HashMap::new(),
            retention,
            evicted: 0,
        }
    }

    pub fn ingest(&mut self, record: &ProbeRecord) {
        let mac = canonical_mac(record.source_mac());
        let seen = record.capture_timestamp;

        if !self.devices.contains_key(&mac) {
            if let RetentionPolicy::MostRecent(cap) = self.retention
                && self.devices.len() >= cap
            {
                self.evict_least_recent();
            }
            let vendor_name = self.vendors.vendor_for(&mac).to_string();
            let is_randomized = is_randomized_mac(&mac);
            self.devices.insert(
                mac.clone(),
                DeviceState::new(mac.clone(), vendor_name, is_randomized, seen),
            );
        } else if let Some(device) = self.devices.get_mut(&mac) {
            device.probe_count += 1;
            device.last_seen = device.last_seen.max(seen);
            device.first_seen = device.first_seen.min(seen);
        }

        if let Some(device) = self.devices.get_mut(&mac) {
            device.absorb(record);
        }
    }

    fn evict_least_recent(&mut self) {
        let target = self
            .devices
            .iter()
            .min_by(|a, b| a.1.last_seen.cmp(&b.1.last_seen).then_with(|| a.0.cmp(b.0)))
            .map(|(mac, _)| mac.clone());
        if let Some(mac) = target {
            self.devices.remove(&mac);
            self.evicted += 1;
        }
    }

    pub fn devices(&self) -> &HashMap<String, DeviceState> {
        &self.devices
    }

    pub fn get(&self, mac: &str) -> Option<&DeviceState> {
        self.devices.get(&canonical_mac(mac))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn vendors(&self) -> &VendorDirectory {
        &self.vendors
    }

    pub fn census(&self) -> DeviceCensus {
        DeviceCensus {
            total_devices: self.devices.len(),
            randomized_devices: self
                .devices
                .values()
                .filter(|device| device.is_randomized)
                .count(),
            known_vendor_devices: self
                .devices
                .values()
                .filter(|device| device.vendor_name != UNKNOWN_VENDOR)
                .count(),
        }
    }

    /// Devices ranked by probe volume, ties broken by MAC for stable output.
    pub fn most_active(&self, n: usize) -> Vec<&DeviceState> {
        let mut ranked: Vec<&DeviceState> = self.devices.values().collect();
        ranked.sort_by(|a, b| {
            b.probe_count
                .cmp(&a.probe_count)
                .then_with(|| a.mac.cmp(&b.mac))
        });
        ranked.truncate(n);
        ranked
    }

    pub fn into_devices(self) -> HashMap<String, DeviceState> {
        self.devices
    }
}

/// Headline device counts for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceCensus {
    pub total_devices: usize,
    pub randomized_devices: usize,
    pub known_vendor_devices: usize,
}
