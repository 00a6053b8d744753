//! # spikewatch
//!
//! Command-line interface for streaming upward-anomaly detection.

use anomaly::{
    alert_for, AnomalyError, Alert, Cadence, DetectorConfig, DetectorState, Monitor, Sample,
    SampleSource, Settings, Timestamp, Verdict,
};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type CliResult<T> = std::result::Result<T, String>;

/// Column names treated as sample timestamps (Unix milliseconds).
const TIMESTAMP_COLUMNS: &[&str] = &["timestamp", "ts", "time"];

#[derive(Parser)]
#[command(name = "spikewatch")]
#[command(about = "Streaming upward-anomaly detection CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded series through one detector per source
    Replay {
        /// Input file (CSV or JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Column name or index to replay; repeat for several sources (default: every numeric column)
        #[arg(short, long)]
        column: Vec<String>,

        /// Settings file with detector parameters
        #[arg(short, long, default_value = "settings.json")]
        settings: PathBuf,

        /// Output file (optional)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print results as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Poll a shell command for a scalar and watch it for spikes
    Watch {
        /// Shell command printing one number per run
        #[arg(long)]
        command: String,

        /// Source name used in alerts
        #[arg(short, long, default_value = "command")]
        name: String,

        /// Polling period in seconds (default: from settings)
        #[arg(long)]
        interval: Option<u64>,

        /// Stop after this many polls
        #[arg(long)]
        ticks: Option<u64>,

        /// Settings file with detector parameters
        #[arg(short, long, default_value = "settings.json")]
        settings: PathBuf,

        /// Print every tick as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config {
        /// Settings file to inspect
        #[arg(short, long, default_value = "settings.json")]
        settings: PathBuf,
    },
}

// ============================================================================
// Data Loading
// ============================================================================

/// One recorded source.
#[derive(Debug, Clone, PartialEq)]
struct Series {
    name: String,
    samples: Vec<Sample>,
}

fn synthetic_timestamp(index: usize, period_ms: u64) -> Timestamp {
    (index as Timestamp).saturating_mul(period_ms)
}

/// Polling period in milliseconds, at least one second.
fn period_millis(polling_frequency: u64) -> u64 {
    polling_frequency.max(1).saturating_mul(1_000)
}

fn resolve_column(headers: &csv::StringRecord, col: &str) -> CliResult<usize> {
    if let Ok(idx) = col.parse::<usize>() {
        if idx < headers.len() {
            return Ok(idx);
        }
        return Err(format!("Column index {} out of range", idx));
    }
    headers
        .iter()
        .position(|h| h == col)
        .ok_or_else(|| format!("Column '{}' not found", col))
}

/// Load one series per selected column from a CSV file
fn load_csv_series(path: &Path, columns: &[String], period_ms: u64) -> CliResult<Vec<Series>> {
    let file = File::open(path).map_err(|e| format!("Failed to open file: {}", e))?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    let headers = reader
        .headers()
        .map_err(|e| format!("Failed to read headers: {}", e))?
        .clone();

    let ts_idx = headers
        .iter()
        .position(|h| TIMESTAMP_COLUMNS.contains(&h.trim().to_lowercase().as_str()));

    let col_indices: Vec<usize> = if columns.is_empty() {
        (0..headers.len()).filter(|&i| Some(i) != ts_idx).collect()
    } else {
        columns
            .iter()
            .map(|c| resolve_column(&headers, c))
            .collect::<CliResult<_>>()?
    };

    let mut samples: Vec<Vec<Sample>> = vec![Vec::new(); col_indices.len()];
    for (row, result) in reader.records().enumerate() {
        let record = result.map_err(|e| format!("Failed to read record: {}", e))?;
        let timestamp = ts_idx
            .and_then(|i| record.get(i))
            .and_then(|v| v.trim().parse::<Timestamp>().ok())
            .unwrap_or_else(|| synthetic_timestamp(row, period_ms));

        for (slot, &col) in col_indices.iter().enumerate() {
            if let Some(value) = record.get(col) {
                // Non-finite cells ("NaN", "inf") are kept so the detector rejects them.
                if let Ok(num) = value.trim().parse::<f64>() {
                    samples[slot].push(Sample::new(timestamp, num));
                }
            }
        }
    }

    let series: Vec<Series> = col_indices
        .iter()
        .zip(samples)
        .filter(|(_, samples)| !samples.is_empty())
        .map(|(&col, samples)| Series {
            name: headers.get(col).unwrap_or_default().to_string(),
            samples,
        })
        .collect();

    if series.is_empty() {
        return Err("No numeric data found in the specified columns".to_string());
    }
    if !columns.is_empty() && series.len() != col_indices.len() {
        return Err("Some requested columns hold no numeric data".to_string());
    }

    Ok(series)
}

fn numeric_series(name: &str, values: &[serde_json::Value], period_ms: u64) -> Option<Series> {
    let samples: Vec<Sample> = values
        .iter()
        .filter_map(|v| v.as_f64())
        .enumerate()
        .map(|(i, v)| Sample::new(synthetic_timestamp(i, period_ms), v))
        .collect();
    if samples.is_empty() {
        None
    } else {
        Some(Series {
            name: name.to_string(),
            samples,
        })
    }
}

fn object_series(
    name: &str,
    rows: &[serde_json::Value],
    key: &str,
    period_ms: u64,
) -> Option<Series> {
    let samples: Vec<Sample> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, obj)| {
            let value = obj.get(key).and_then(|v| v.as_f64())?;
            let timestamp = TIMESTAMP_COLUMNS
                .iter()
                .find_map(|k| obj.get(*k).and_then(|v| v.as_u64()))
                .unwrap_or_else(|| synthetic_timestamp(i, period_ms));
            Some(Sample::new(timestamp, value))
        })
        .collect();
    if samples.is_empty() {
        None
    } else {
        Some(Series {
            name: name.to_string(),
            samples,
        })
    }
}

/// Load series from a JSON file
///
/// Accepts an array of numbers, an array of objects, or an object mapping
/// source names to arrays of numbers.
fn load_json_series(path: &Path, columns: &[String], period_ms: u64) -> CliResult<Vec<Series>> {
    let file = File::open(path).map_err(|e| format!("Failed to open file: {}", e))?;
    let reader = BufReader::new(file);
    let json: serde_json::Value =
        serde_json::from_reader(reader).map_err(|e| format!("Failed to parse JSON: {}", e))?;

    if let Some(arr) = json.as_array() {
        // Handle array of numbers
        if arr.iter().all(|v| v.is_number()) {
            return numeric_series("value", arr, period_ms)
                .map(|s| vec![s])
                .ok_or_else(|| "Empty JSON array".to_string());
        }

        // Handle array of objects
        if !columns.is_empty() {
            return columns
                .iter()
                .map(|col| {
                    object_series(col, arr, col, period_ms)
                        .ok_or_else(|| format!("Column '{}' holds no numeric data", col))
                })
                .collect();
        }
        for key in &["value", "values", "data", "y"] {
            if let Some(series) = object_series(key, arr, key, period_ms) {
                return Ok(vec![series]);
            }
        }
    }

    // Handle object of named arrays
    if let Some(obj) = json.as_object() {
        let series: Vec<Series> = if columns.is_empty() {
            obj.iter()
                .filter_map(|(name, v)| {
                    v.as_array()
                        .and_then(|arr| numeric_series(name, arr, period_ms))
                })
                .collect()
        } else {
            columns
                .iter()
                .map(|col| {
                    obj.get(col)
                        .and_then(|v| v.as_array())
                        .and_then(|arr| numeric_series(col, arr, period_ms))
                        .ok_or_else(|| format!("Column '{}' holds no numeric data", col))
                })
                .collect::<CliResult<_>>()?
        };
        if !series.is_empty() {
            return Ok(series);
        }
    }

    Err("Could not extract numeric data from JSON".to_string())
}

/// Load series from file (auto-detect format)
fn load_series(path: &Path, columns: &[String], period_ms: u64) -> CliResult<Vec<Series>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "csv" => load_csv_series(path, columns, period_ms),
        "json" => load_json_series(path, columns, period_ms),
        _ => {
            // Try CSV first, then JSON
            load_csv_series(path, columns, period_ms)
                .or_else(|_| load_json_series(path, columns, period_ms))
        }
    }
}

fn load_settings(path: &Path) -> CliResult<(Settings, DetectorConfig)> {
    let settings = Settings::load(path).map_err(|e| e.to_string())?;
    let config = settings.detector_config().map_err(|e| e.to_string())?;
    Ok((settings, config))
}

// ============================================================================
// Replay
// ============================================================================

/// Outcome of replaying one series.
#[derive(Debug, Clone, Serialize)]
struct SourceReport {
    source: String,
    ticks: usize,
    insufficient: usize,
    normal: usize,
    suppressed: usize,
    rejected: usize,
    anomalies: Vec<Alert>,
}

fn replay_series(series: &Series, config: &DetectorConfig) -> CliResult<SourceReport> {
    let mut state = DetectorState::create(config.clone()).map_err(|e| e.to_string())?;
    let mut report = SourceReport {
        source: series.name.clone(),
        ticks: series.samples.len(),
        insufficient: 0,
        normal: 0,
        suppressed: 0,
        rejected: 0,
        anomalies: Vec::new(),
    };

    for &sample in &series.samples {
        let verdict = match state.ingest(sample.value, sample.timestamp) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(source = %series.name, timestamp = sample.timestamp, error = %e, "sample rejected");
                report.rejected += 1;
                continue;
            }
        };
        match &verdict {
            Verdict::InsufficientData => report.insufficient += 1,
            Verdict::Normal(_) => report.normal += 1,
            Verdict::Suppressed(_) => report.suppressed += 1,
            Verdict::Anomaly(_) => {}
        }
        if let Some(alert) = alert_for(&series.name, sample, &verdict) {
            report.anomalies.push(alert);
        }
    }

    info!(
        source = %report.source,
        ticks = report.ticks,
        anomalies = report.anomalies.len(),
        rejected = report.rejected,
        "replay finished"
    );
    Ok(report)
}

fn print_summary(reports: &[SourceReport]) {
    for report in reports {
        println!("Source: {}", report.source);
        println!(
            "  Ticks: {} (warm-up {}, normal {}, suppressed {}, rejected {})",
            report.ticks, report.insufficient, report.normal, report.suppressed, report.rejected
        );
        println!("  Anomalies found: {}", report.anomalies.len());
        for alert in &report.anomalies {
            println!(
                "    t={}: value={:.4}, forecast={:.4}, bound={:.4}, score={:.2} ({:?})",
                alert.timestamp, alert.value, alert.forecast, alert.bound, alert.score, alert.severity
            );
        }
    }
}

/// Run replay command
fn run_replay(
    input: PathBuf,
    columns: Vec<String>,
    settings_path: PathBuf,
    output: Option<PathBuf>,
    json: bool,
) -> CliResult<()> {
    let (settings, config) = load_settings(&settings_path)?;
    let period_ms = period_millis(settings.polling_frequency);
    let series = load_series(&input, &columns, period_ms)?;
    info!(
        sources = series.len(),
        file = ?input.file_name().unwrap_or_default(),
        "loaded input"
    );

    let reports: Vec<SourceReport> = series
        .par_iter()
        .map(|s| replay_series(s, &config))
        .collect::<CliResult<_>>()?;

    let result = serde_json::json!({
        "input": input,
        "config": config,
        "sources": reports,
    });

    if json {
        let text = serde_json::to_string_pretty(&result)
            .map_err(|e| format!("Failed to encode JSON: {}", e))?;
        println!("{}", text);
    } else {
        print_summary(&reports);
    }

    if let Some(path) = output {
        let mut file = File::create(&path).map_err(|e| format!("Failed to create output: {}", e))?;
        serde_json::to_writer_pretty(&mut file, &result)
            .map_err(|e| format!("Failed to write JSON: {}", e))?;
        println!("\nResults written to {:?}", path);
    }

    Ok(())
}

// ============================================================================
// Watch
// ============================================================================

/// Runs a shell command and reads one number from its stdout.
struct CommandSource {
    name: String,
    command: String,
}

impl SampleSource for CommandSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&mut self) -> anomaly::Result<f64> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .output()
            .map_err(|e| AnomalyError::source(&self.name, e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnomalyError::source(
                &self.name,
                format!("command exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout.trim().parse::<f64>().map_err(|e| {
            AnomalyError::source(&self.name, format!("not a number '{}': {}", stdout.trim(), e))
        })
    }
}

/// Run watch command
fn run_watch(
    command: String,
    name: String,
    interval: Option<u64>,
    ticks: Option<u64>,
    settings_path: PathBuf,
    json: bool,
) -> CliResult<()> {
    let (settings, config) = load_settings(&settings_path)?;
    let period = interval.unwrap_or(settings.polling_frequency);
    let source = CommandSource { name, command };
    let mut monitor = Monitor::new(source, config).map_err(|e| e.to_string())?;
    let mut cadence = Cadence::new(Duration::from_secs(period));
    info!(source = monitor.name(), period_secs = cadence.period().as_secs(), "watching");

    let mut polled = 0;
    while ticks.map_or(true, |max| polled < max) {
        cadence.sleep_until_next();
        cadence.advance(Instant::now());
        polled += 1;

        let event = match monitor.poll() {
            Ok(event) => event,
            Err(e) => {
                eprintln!("Error: {}", e);
                continue;
            }
        };
        if json {
            let line = serde_json::to_string(&event)
                .map_err(|e| format!("Failed to encode JSON: {}", e))?;
            println!("{}", line);
        } else if let Some(alert) = &event.alert {
            println!("{:?}: {}", alert.severity, alert.message);
        } else {
            println!("[{}] {} {}", event.source, event.sample.value, event.verdict.label());
        }
    }

    monitor.stop();
    Ok(())
}

// ============================================================================
// Config
// ============================================================================

/// Run config command
fn run_config(settings_path: PathBuf) -> CliResult<()> {
    let (settings, _) = load_settings(&settings_path)?;
    let text = serde_json::to_string_pretty(&settings)
        .map_err(|e| format!("Failed to encode JSON: {}", e))?;
    println!("{}", text);
    for source in &settings.sources {
        println!(
            "# {}: every {}s",
            source.name,
            settings.polling_frequency_for(source)
        );
    }
    Ok(())
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spikewatch=info,anomaly_core=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Replay {
            input,
            column,
            settings,
            output,
            json,
        } => run_replay(input, column, settings, output, json),

        Commands::Watch {
            command,
            name,
            interval,
            ticks,
            settings,
            json,
        } => run_watch(command, name, interval, ticks, settings, json),

        Commands::Config { settings } => run_config(settings),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
