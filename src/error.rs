//! Rejection taxonomy for record validation, plus the only errors that can
//! end a run. Per-line failures are values that get counted and skipped;
//! an unreadable log source is the single fatal condition.

use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a candidate line was rejected.
///
/// The `Display` form is the stable key used by [`ErrorTaxonomy`], so a
/// message change is a taxonomy change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// The line is not parseable JSON at all.
    #[error("json_decode_error")]
    Parse,
    /// A required field is missing or carries the wrong type.
    #[error("schema_error: {0}")]
    Schema(SchemaViolation),
    /// The ieee80211 structure has no usable source address.
    #[error("ieee80211_invalid")]
    Semantic,
    /// A present value violates a range or format constraint.
    #[error("{constraint}: {value}")]
    Integrity {
        constraint: IntegrityConstraint,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("capture_ts is not an ISO-8601 timestamp")]
    BadTimestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IntegrityConstraint {
    #[error("rssi_out_of_range")]
    RssiRange,
    #[error("invalid_wifi_channel")]
    ChannelRange,
    #[error("invalid_mac_format")]
    MacFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectCategory {
    Parse,
    Schema,
    Semantic,
    Integrity,
}

impl RejectReason {
    pub fn category(&self) -> RejectCategory {
        match self {
            RejectReason::Parse => RejectCategory::Parse,
            RejectReason::Schema(_) => RejectCategory::Schema,
            RejectReason::Semantic => RejectCategory::Semantic,
            RejectReason::Integrity { .. } => RejectCategory::Integrity,
        }
    }
}

/// Running counts of rejection reasons for one pipeline run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ErrorTaxonomy {
    by_reason: HashMap<String, u64>,
    parse: u64,
    schema: u64,
    semantic: u64,
    integrity: u64,
}

impl ErrorTaxonomy {
    pub fn record(&mut self, reason: &RejectReason) {
        *self.by_reason.entry(reason.to_string()).or_default() += 1;
        match reason.category() {
            RejectCategory::Parse => self.parse += 1,
            RejectCategory::Schema => self.schema += 1,
            RejectCategory::Semantic => self.semantic += 1,
            RejectCategory::Integrity => self.integrity += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.parse + self.schema + self.semantic + self.integrity
    }

    pub fn is_empty(&self) -> bool {
        self.by_reason.is_empty()
    }

    pub fn count_of(&self, reason: &str) -> u64 {
        self.by_reason.get(reason).copied().unwrap_or(0)
    }

    pub fn category_total(&self, category: RejectCategory) -> u64 {
        match category {
            RejectCategory::Parse => self.parse,
            RejectCategory::Schema => self.schema,
            RejectCategory::Semantic => self.semantic,
            RejectCategory::Integrity => self.integrity,
        }
    }

    pub fn by_reason(&self) -> &HashMap<String, u64> {
        &self.by_reason
    }

    /// Most frequent reasons first; ties break on the reason text so the
    /// ordering is stable across runs.
    pub fn top(&self, n: usize) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> = self
            .by_reason
            .iter()
            .map(|(reason, count)| (reason.clone(), *count))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(n);
        entries
    }
}

/// The log source itself could not be read.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open log source {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("read failed while scanning log source: {0}")]
    Read(#[source] io::Error),
}
