use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use wifi_probe_analyzer::device::RetentionPolicy;
use wifi_probe_analyzer::pipeline::{IngestionPipeline, PipelineConfig};
use wifi_probe_analyzer::report::{FeatureCounts, SignalOverview, ie_name};
use wifi_probe_analyzer::vendor::VendorDirectory;

/// Validate a probe-request capture log and summarize the devices behind it.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Capture log with one record per line
    log_file: PathBuf,

    /// Vendor dataset (JSON export with macPrefix entries)
    #[arg(long)]
    vendors: Option<PathBuf>,

    /// Translate first-generation flat records before validation
    #[arg(long)]
    legacy: bool,

    /// Track at most this many devices, evicting the least recently seen
    #[arg(long)]
    max_devices: Option<usize>,

    /// Drop accepted records after aggregation to bound memory
    #[arg(long)]
    no_retain: bool,

    /// How many entries to show in the top lists
    #[arg(long, default_value_t = 5)]
    top: usize,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let vendors = match &args.vendors {
        Some(path) => VendorDirectory::load(path),
        None => VendorDirectory::unloaded(),
    };
    if vendors.is_loaded() {
        println!("Vendor dataset loaded: {} prefixes", vendors.len());
    } else {
        println!("Vendor dataset not loaded; vendor names resolve to Unknown");
    }

    let mut config = PipelineConfig::from_env();
    config.translate_legacy = args.legacy;
    if args.no_retain {
        config.retain_records = false;
    }
    if let Some(cap) = args.max_devices {
        config.retention = RetentionPolicy::MostRecent(cap);
    }

    let mut pipeline = IngestionPipeline::new(vendors, config);
    if let Err(err) = pipeline.ingest_file(&args.log_file) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    print_report(&pipeline, args.top);
    ExitCode::SUCCESS
}

fn print_report(pipeline: &IngestionPipeline, top: usize) {
    let summary = pipeline.summary();
    println!();
    println!("=== VALIDATION ===");
    println!(
        "Scanned {} lines ({} skipped as noise, {} stats events, {} stats dropped)",
        pipeline.lines_seen(),
        pipeline.lines_skipped(),
        pipeline.stats_events().len(),
        pipeline.stats_discarded(),
    );
    println!(
        "Records: {} valid, {} invalid of {} total ({:.1}% valid)",
        summary.valid, summary.invalid, summary.total, summary.valid_rate
    );
    let taxonomy = pipeline.taxonomy();
    if !taxonomy.is_empty() {
        println!("Top rejection reasons:");
        for (reason, count) in taxonomy.top(top) {
            println!("  {count:>6}  {reason}");
        }
    }

    let aggregator = pipeline.aggregator();
    println!();
    println!("=== DEVICES ===");
    let census = aggregator.census();
    println!(
        "{} unique devices, {} with a known vendor, {} randomized",
        census.total_devices, census.known_vendor_devices, census.randomized_devices
    );
    if aggregator.evicted() > 0 {
        println!("{} devices evicted by the retention cap", aggregator.evicted());
    }
    for device in aggregator.most_active(top) {
        let avg = device
            .average_rssi()
            .map(|rssi| format!("{rssi:.1} dBm"))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "  {}  probes={:<5} vendor={}  avg_rssi={}  dwell={}s",
            device.mac,
            device.probe_count,
            device.vendor_name,
            avg,
            device.dwell_seconds(),
        );
    }

    if let Some(signal) = SignalOverview::from_devices(aggregator.devices().values()) {
        println!();
        println!("=== SIGNAL ===");
        println!(
            "RSSI average {:.1} dBm ({} to {} dBm over {} samples)",
            signal.average_dbm, signal.min_dbm, signal.max_dbm, signal.samples
        );
        println!(
            "Proximity: {} very close, {} close, {} far",
            signal.very_close, signal.close, signal.far
        );
    }

    if !pipeline.records().is_empty() {
        let features = FeatureCounts::collect(pipeline.records());
        if !features.ie_counts.is_empty() || !features.ssid_counts.is_empty() {
            println!();
            println!("=== FRAME FEATURES ===");
            for (id, count) in features.top_ies(top) {
                println!("  IE {id:>3} {}  x{count}", ie_name(id));
            }
            for (ssid, count) in features.top_ssids(top) {
                println!("  SSID '{ssid}'  x{count}");
            }
        }
    }

    if aggregator.vendors().is_loaded() {
        let stats = aggregator.vendors().stats();
        println!();
        println!(
            "Vendor directory: {} prefixes ({} private, {} public)",
            stats.total, stats.private_count, stats.public_count
        );
    }
}
