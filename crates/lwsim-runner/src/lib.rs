//! # lwsim-runner library
//!
//! Library interface for the LWSim scenario runner.
//!
//! The runner wires a deterministic scenario driver (standing in for the
//! external network simulation engine) to the telemetry engine, then
//! persists the rendered report. Everything here is also usable from
//! integration tests.

pub mod driver;

use lwsim_telemetry::{render_report, DeviceRegistry, DropStats, MetricsAggregator, ScenarioMeta};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while running a scenario.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Final report could not be written. Fatal for the run.
    #[error("failed to persist {path}: {source}")]
    Persist {
        /// Target path.
        path: PathBuf,
        /// Underlying IO failure.
        source: io::Error,
    },
}

// ============================================================================
// Persistence
// ============================================================================

/// Final aggregate state serialized by the `--json` flag.
#[derive(Debug, Serialize)]
pub struct StatsSnapshot<'a> {
    /// The full aggregator state (totals and per-device counters).
    pub aggregate: &'a MetricsAggregator,
    /// Events dropped before aggregation.
    pub drops: &'a DropStats,
}

/// Write the rendered report to `path`.
///
/// Unlike per-event errors, a failure here is fatal for the run and is
/// surfaced as [`RunnerError::Persist`].
pub fn write_report(
    path: &Path,
    aggregator: &MetricsAggregator,
    registry: &DeviceRegistry,
    meta: &ScenarioMeta,
) -> Result<(), RunnerError> {
    let persist = |source: io::Error| RunnerError::Persist {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(persist)?;
    let mut writer = BufWriter::new(file);
    render_report(&mut writer, aggregator, registry, meta).map_err(persist)?;
    writer.flush().map_err(persist)?;
    Ok(())
}

/// Write the JSON aggregate snapshot to `path`.
pub fn write_json_snapshot(
    path: &Path,
    aggregator: &MetricsAggregator,
    drops: &DropStats,
) -> Result<(), RunnerError> {
    let snapshot = StatsSnapshot {
        aggregate: aggregator,
        drops,
    };
    let file = File::create(path).map_err(|source| RunnerError::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &snapshot)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
