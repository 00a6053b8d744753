//! Basic example demonstrating streaming upward-anomaly detection
//!
//! Run with: cargo run --example basic -p anomaly-facade

use anomaly::{DetectorConfig, DetectorState, FnSource, Monitor, Verdict};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== spikewatch Basic Examples ===\n");

    // Row counts of a job table, with a burst at tick 12
    let readings = vec![
        120.0, 122.0, 121.0, 125.0, 124.0, 126.0, 127.0, 126.0, 129.0, 130.0, 131.0, 130.0,
        210.0, 215.0, 133.0, 134.0, 90.0, 135.0,
    ];

    // 1. Detector driven directly
    println!("1. DetectorState (window=16, ar_order=2)");
    let config = DetectorConfig::new().with_window_size(16).with_debounce(1);
    let mut state = DetectorState::create(config.clone())?;
    for (tick, &value) in readings.iter().enumerate() {
        let verdict = state.ingest(value, tick as u64 * 5_000)?;
        match verdict {
            Verdict::Anomaly(a) => println!(
                "   tick {:>2}: {:>6.1} ANOMALY  forecast={:.1} bound={:.1}",
                tick, value, a.forecast, a.bound
            ),
            other => println!("   tick {:>2}: {:>6.1} {}", tick, value, other.label()),
        }
    }
    println!();

    // 2. Monitor polling a source
    println!("2. Monitor with a closure source");
    let mut queue = readings.clone().into_iter();
    let source = FnSource::new("jobs", move || {
        queue
            .next()
            .ok_or_else(|| anomaly::AnomalyError::source("jobs", "no more readings"))
    });
    let mut monitor = Monitor::new(source, config)?;
    loop {
        match monitor.poll() {
            Ok(event) => {
                if let Some(alert) = event.alert {
                    println!("   {:?}: {}", alert.severity, alert.message);
                }
            }
            Err(e) => {
                println!("   stopped: {}", e);
                break;
            }
        }
    }
    monitor.stop();

    println!("\n=== Examples Complete ===");
    Ok(())
}
