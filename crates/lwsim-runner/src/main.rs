//! # lwsim-runner
//!
//! CLI runner for LWSim telemetry scenarios.
//!
//! Runs the deterministic scenario driver against the telemetry engine and
//! writes the results report. Argument validation happens here; the engine
//! itself receives only validated configuration values.

use clap::Parser;
use lwsim_common::TxParams;
use lwsim_phy::{channel_utilization_percent, ldro_for_sf, offered_load_erlangs, pdr_percent};
use lwsim_runner::driver::{build_roster, ScenarioConfig, ScenarioDriver};
use lwsim_runner::{write_json_snapshot, write_report, RunnerError};
use lwsim_telemetry::{DeviceRegistry, EventIngest, ScenarioMeta};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ============================================================================
// Duration Parsing
// ============================================================================

/// Parse a duration string with units into seconds.
///
/// Supported formats: a plain number (seconds), a unit suffix (`60s`, `10m`,
/// `2h`, `1d`), or combined units (`1h30m`).
fn parse_duration(s: &str) -> Result<f64, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<f64>() {
        return Ok(secs);
    }

    let mut total = 0.0;
    let mut number = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
            continue;
        }
        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid number '{}' in duration '{}'", number, s))?;
        let multiplier = match c {
            's' => 1.0,
            'm' => 60.0,
            'h' => 3600.0,
            'd' => 86400.0,
            _ => return Err(format!("unknown duration unit '{}' in '{}'", c, s)),
        };
        total += value * multiplier;
        number.clear();
    }
    if !number.is_empty() {
        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid number '{}' in duration '{}'", number, s))?;
        total += value;
    }
    if total <= 0.0 {
        return Err(format!("invalid duration: '{}'", s));
    }
    Ok(total)
}

// ============================================================================
// CLI Configuration
// ============================================================================

/// LWSim - LoRaWAN network telemetry scenario runner
#[derive(Parser, Debug)]
#[command(name = "lwsim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of end devices
    #[arg(long, default_value_t = 100)]
    devices: u32,

    /// Number of gateways
    #[arg(long, default_value_t = 1)]
    gateways: u32,

    /// Scenario duration (e.g. 600, 10m, 1h30m)
    #[arg(long, default_value = "10m", value_parser = parse_duration)]
    duration: f64,

    /// Uplink interval per device (e.g. 600, 10m)
    #[arg(long, default_value = "600s", value_parser = parse_duration)]
    interval: f64,

    /// Spreading factor (7-12)
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u8).range(7..=12))]
    spreading_factor: u8,

    /// Bandwidth in Hz
    #[arg(long, default_value_t = 125_000)]
    bandwidth_hz: u32,

    /// Coding rate offset (1-4, for 4/5 to 4/8)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=4))]
    coding_rate: u8,

    /// Application payload size in bytes
    #[arg(long, default_value_t = 51)]
    payload_bytes: usize,

    /// Use confirmed uplinks with retransmission
    #[arg(long)]
    confirmed: bool,

    /// Maximum retransmissions per confirmed message
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Probability that a single over-the-air frame is lost (0.0-1.0)
    #[arg(long, default_value_t = 0.1)]
    loss_probability: f64,

    /// Number of radio channels for offered-load accounting
    #[arg(long, default_value_t = 1)]
    channels: u32,

    /// Regulatory duty-cycle ceiling as a fraction (EU868: 0.01)
    #[arg(long, default_value_t = 0.01)]
    duty_cycle_ceiling: f64,

    /// RNG seed for deterministic runs
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Scenario name for the report header
    #[arg(long, default_value = "LWSim Scenario")]
    scenario_name: String,

    /// Output file prefix
    #[arg(long, default_value = "lwsim")]
    output_prefix: String,

    /// Also write a JSON snapshot of the aggregate state
    #[arg(long)]
    json: bool,
}

// ============================================================================
// Entry Point
// ============================================================================

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), RunnerError> {
    if cli.loss_probability < 0.0 || cli.loss_probability > 1.0 {
        return Err(RunnerError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "loss probability must be within [0, 1]",
        )));
    }

    let params = TxParams {
        spreading_factor: cli.spreading_factor,
        bandwidth_hz: cli.bandwidth_hz,
        coding_rate: cli.coding_rate,
        explicit_header: true,
        low_data_rate_optimize: ldro_for_sf(cli.spreading_factor, cli.bandwidth_hz),
    };

    let config = ScenarioConfig {
        devices: cli.devices,
        gateways: cli.gateways,
        duration_secs: cli.duration,
        interval_secs: cli.interval,
        params,
        payload_bytes: cli.payload_bytes,
        confirmed: cli.confirmed,
        max_retries: cli.max_retries,
        loss_probability: cli.loss_probability,
        seed: cli.seed,
    };

    let mode = if cli.confirmed { "confirmed" } else { "unconfirmed" };
    println!("\n=== {} ===", cli.scenario_name);
    println!("Devices: {} | Gateways: {}", cli.devices, cli.gateways);
    println!("Message type: {} | SF{} | {} kHz", mode, cli.spreading_factor, cli.bandwidth_hz / 1000);
    println!("Uplink interval: {}s | Duration: {}s", cli.interval, cli.duration);
    println!("Starting simulation...");

    let registry = DeviceRegistry::build(&build_roster(&config));
    let mut ingest = EventIngest::new(registry);
    ScenarioDriver::new(config).run(&mut ingest);
    let (registry, aggregator, drops) = ingest.into_parts();

    let totals = aggregator.totals();
    println!("\n=== Simulation Complete ===");
    println!("Total packets sent: {}", totals.total_sent);
    println!("Total packets received: {}", totals.total_received);
    if totals.total_retransmissions > 0 {
        println!("Total retransmissions: {}", totals.total_retransmissions);
    }
    println!(
        "Overall PDR: {:.2}%",
        pdr_percent(totals.total_received, totals.total_sent)
    );
    let offered = offered_load_erlangs(totals.total_channel_airtime_ms, cli.duration, cli.channels);
    println!(
        "Total channel airtime: {:.2} ms ({:.4}% utilization)",
        totals.total_channel_airtime_ms,
        channel_utilization_percent(offered)
    );
    if drops.total() > 0 {
        info!(
            malformed = drops.malformed,
            ignored = drops.ignored,
            unknown_address = drops.unknown_address,
            unknown_device = drops.unknown_device,
            "dropped events during ingest"
        );
    }

    let meta = ScenarioMeta {
        name: cli.scenario_name.clone(),
        gateway_count: cli.gateways,
        duration_secs: cli.duration,
        payload_bytes: cli.payload_bytes,
        spreading_factor: cli.spreading_factor,
        bandwidth_hz: cli.bandwidth_hz,
        coding_rate: cli.coding_rate,
        channels: cli.channels,
        duty_cycle_ceiling: cli.duty_cycle_ceiling,
        description: format!("{} messages, {} interval, seed {}", mode, cli.interval, cli.seed),
        generated_at: Some(chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()),
    };

    let report_path = PathBuf::from(format!("{}_results.csv", cli.output_prefix));
    write_report(&report_path, &aggregator, &registry, &meta)?;
    println!("Results exported to {}", report_path.display());

    if cli.json {
        let json_path = PathBuf::from(format!("{}_stats.json", cli.output_prefix));
        write_json_snapshot(&json_path, &aggregator, &drops)?;
        println!("JSON snapshot exported to {}", json_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_plain_seconds() {
        assert_eq!(parse_duration("600").unwrap(), 600.0);
        assert_eq!(parse_duration("0.5").unwrap(), 0.5);
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("10m").unwrap(), 600.0);
        assert_eq!(parse_duration("2h").unwrap(), 7200.0);
        assert_eq!(parse_duration("1h30m").unwrap(), 5400.0);
        assert_eq!(parse_duration("1d2h30m45s").unwrap(), 95445.0);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("").is_err());
    }
}
