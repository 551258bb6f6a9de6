//! Ingestion driver: classify, validate, aggregate, count. One pass over a
//! finite line source. Per-line failures are tallied and the scan continues;
//! only an unreadable source ends the run.

pub mod worker;

use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::device::{DeviceAggregator, DeviceCensus, DeviceState, RetentionPolicy};
use crate::error::{ErrorTaxonomy, RejectReason, SourceError};
use crate::record::ProbeRecord;
use crate::record::classify::{LineClass, classify};
use crate::record::legacy::translate_legacy;
use crate::record::validate::validate_value;
use crate::vendor::VendorDirectory;

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Keep the accepted records for downstream reporting. Turning this off
    /// bounds memory on very large logs; aggregation is unaffected.
    pub retain_records: bool,
    /// Run the v1 record adapter before validation.
    pub translate_legacy: bool,
    pub retention: RetentionPolicy,
    /// Queue bound for the channeled aggregation worker.
    pub channel_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retain_records: true,
            translate_legacy: false,
            retention: RetentionPolicy::Unbounded,
            channel_buffer: 100,
        }
    }
}

impl PipelineConfig {
    /// Defaults with environment overrides: `PROBE_CHANNEL_BUFFER`,
    /// `PROBE_MAX_DEVICES`, `PROBE_RETAIN_RECORDS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.channel_buffer = env_usize("PROBE_CHANNEL_BUFFER", config.channel_buffer);
        if let Ok(raw) = env::var("PROBE_MAX_DEVICES")
            && let Ok(cap) = raw.parse::<usize>()
        {
            config.retention = RetentionPolicy::MostRecent(cap);
        }
        if let Ok(raw) = env::var("PROBE_RETAIN_RECORDS") {
            config.retain_records = raw != "0" && !raw.eq_ignore_ascii_case("false");
        }
        config
    }
}

/// Headline validation counts for one run. `total` counts record candidates
/// only; blanks, comments, and stats lines never appear here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValidationSummary {
    pub total: u64,
    pub valid: u64,
    pub invalid: u64,
    /// Percentage of candidates that validated; 0 when nothing was seen.
    pub valid_rate: f64,
}

impl ValidationSummary {
    fn new(valid: u64, invalid: u64) -> Self {
        let total = valid + invalid;
        let valid_rate = if total > 0 {
            valid as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            total,
            valid,
            invalid,
            valid_rate,
        }
    }
}

pub struct IngestionPipeline {
    config: PipelineConfig,
    aggregator: DeviceAggregator,
    taxonomy: ErrorTaxonomy,
    records: Vec<ProbeRecord>,
    stats_events: Vec<Value>,
    lines_seen: u64,
    lines_skipped: u64,
    valid: u64,
    invalid: u64,
    stats_discarded: u64,
}

impl IngestionPipeline {
    pub fn new(vendors: VendorDirectory, config: PipelineConfig) -> Self {
        let aggregator = DeviceAggregator::with_retention(vendors, config.retention);
        Self {
            config,
            aggregator,
            taxonomy: ErrorTaxonomy::default(),
            records: Vec::new(),
            stats_events: Vec::new(),
            lines_seen: 0,
            lines_skipped: 0,
            valid: 0,
            invalid: 0,
            stats_discarded: 0,
        }
    }

    pub fn with_defaults(vendors: VendorDirectory) -> Self {
        Self::new(vendors, PipelineConfig::default())
    }

    /// Scan a log file to exhaustion.
    pub fn ingest_file(&mut self, path: impl AsRef<Path>) -> Result<(), SourceError> {
        let file = File::open(&path).map_err(|source| SourceError::Open {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        self.ingest_reader(BufReader::new(file))
    }

    /// Scan any line source to exhaustion.
    pub fn ingest_reader<R: BufRead>(&mut self, reader: R) -> Result<(), SourceError> {
        for line in reader.lines() {
            let line = line.map_err(SourceError::Read)?;
            self.process_line(&line);
        }
        Ok(())
    }

    pub fn process_line(&mut self, line: &str) {
        self.lines_seen += 1;
        match classify(line) {
            LineClass::Blank | LineClass::Comment => self.lines_skipped += 1,
            LineClass::Stats(payload) => match serde_json::from_str::<Value>(payload) {
                Ok(event) => self.stats_events.push(event),
                Err(err) => {
                    // a broken status line is sensor noise, not a record failure
                    self.stats_discarded += 1;
                    debug!("dropping stats line with bad payload: {err}");
                }
            },
            LineClass::Record(candidate) => self.process_candidate(candidate),
        }
    }

    fn process_candidate(&mut self, candidate: &str) {
        let result = serde_json::from_str::<Value>(candidate)
            .map_err(|_| RejectReason::Parse)
            .and_then(|value| {
                let value = if self.config.translate_legacy {
                    translate_legacy(value)
                } else {
                    value
                };
                validate_value(&value)
            });

        match result {
            Ok(record) => {
                self.valid += 1;
                self.aggregator.ingest(&record);
                if self.config.retain_records {
                    self.records.push(record);
                }
            }
            Err(reason) => {
                self.invalid += 1;
                debug!("line {} rejected: {reason}", self.lines_seen);
                self.taxonomy.record(&reason);
            }
        }
    }

    pub fn summary(&self) -> ValidationSummary {
        ValidationSummary::new(self.valid, self.invalid)
    }

    pub fn taxonomy(&self) -> &ErrorTaxonomy {
        &self.taxonomy
    }

    pub fn records(&self) -> &[ProbeRecord] {
        &self.records
    }

    pub fn stats_events(&self) -> &[Value] {
        &self.stats_events
    }

    pub fn aggregator(&self) -> &DeviceAggregator {
        &self.aggregator
    }

    pub fn lines_seen(&self) -> u64 {
        self.lines_seen
    }

    pub fn lines_skipped(&self) -> u64 {
        self.lines_skipped
    }

    pub fn stats_discarded(&self) -> u64 {
        self.stats_discarded
    }

    /// Consume the pipeline into a read-only snapshot for downstream
    /// consumers.
    pub fn finish(self) -> RunReport {
        let summary = self.summary();
        let census = self.aggregator.census();
        let devices_evicted = self.aggregator.evicted();
        RunReport {
            summary,
            taxonomy: self.taxonomy,
            records: self.records,
            stats_events: self.stats_events,
            census,
            devices: self.aggregator.into_devices(),
            devices_evicted,
            lines_seen: self.lines_seen,
            lines_skipped: self.lines_skipped,
            stats_discarded: self.stats_discarded,
        }
    }
}

/// Everything a run produced, frozen. The engine holds no references into
/// this; consumers may do whatever they like with it.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub summary: ValidationSummary,
    pub taxonomy: ErrorTaxonomy,
    pub records: Vec<ProbeRecord>,
    pub stats_events: Vec<Value>,
    pub devices: HashMap<String, DeviceState>,
    pub census: DeviceCensus,
    pub devices_evicted: u64,
    pub lines_seen: u64,
    pub lines_skipped: u64,
    pub stats_discarded: u64,
}
