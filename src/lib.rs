//! Validation and aggregation engine for WiFi probe-request capture logs.
//!
//! A field sensor writes one JSON record per observed probe request,
//! interleaved with status lines and boot chatter. This crate classifies
//! each line, pushes candidate records through a staged validation funnel,
//! resolves device identity from the source MAC (vendor OUI, randomization
//! bit), and folds everything into per-device running state plus a rejection
//! taxonomy for the run. Malformed input is counted, never fatal.

pub mod device;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod vendor;

pub use device::{DeviceAggregator, DeviceCensus, DeviceState, RetentionPolicy};
pub use error::{ErrorTaxonomy, RejectReason, SourceError};
pub use pipeline::{IngestionPipeline, PipelineConfig, RunReport, ValidationSummary};
pub use record::ProbeRecord;
pub use vendor::{VendorDirectory, VendorSourceError};
