//! Report export: renders final aggregator state as deterministic text.
//!
//! Given identical inputs the output is byte-identical, so reports can be
//! diffed across runs. All floating values use fixed precision.

use crate::aggregator::MetricsAggregator;
use crate::registry::DeviceRegistry;
use lwsim_phy::{
    channel_utilization_percent, duty_cycle_headroom, duty_cycle_usage, offered_load_erlangs,
    pdr_percent, rate_percent,
};
use serde::Serialize;
use std::io::{self, Write};
use tracing::warn;

/// Scenario metadata rendered into the report header.
///
/// The generated-at stamp is supplied by the caller so that rendering stays
/// a pure function of its inputs.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioMeta {
    /// Scenario name.
    pub name: String,
    /// Number of gateways in the scenario.
    pub gateway_count: u32,
    /// Observation window in seconds.
    pub duration_secs: f64,
    /// Application payload size in bytes.
    pub payload_bytes: usize,
    /// Spreading factor used by the devices.
    pub spreading_factor: u8,
    /// Bandwidth in Hz.
    pub bandwidth_hz: u32,
    /// Coding rate numerator offset (1 = 4/5).
    pub coding_rate: u8,
    /// Number of radio channels shared by the network.
    pub channels: u32,
    /// Regulatory duty-cycle ceiling as a fraction (EU868: 0.01).
    pub duty_cycle_ceiling: f64,
    /// Free-text configuration description.
    pub description: String,
    /// Wall-clock stamp for the header, if the caller wants one.
    pub generated_at: Option<String>,
}

/// Render the report to a writer.
///
/// Produces the metadata header, an `OVERALL_STATS` key/value section and a
/// `PER_NODE_STATS` table with one row per device in ascending id order. A
/// run with zero devices yields an empty per-node section.
pub fn render_report<W: Write>(
    writer: &mut W,
    aggregator: &MetricsAggregator,
    registry: &DeviceRegistry,
    meta: &ScenarioMeta,
) -> io::Result<()> {
    if !aggregator.totals_consistent() {
        warn!("global totals do not match per-device sums; report may be inconsistent");
    }

    let totals = aggregator.totals();
    let window_secs = meta.duration_secs;
    let device_count = registry.len();

    writeln!(writer, "# {} Results", meta.name)?;
    if let Some(stamp) = &meta.generated_at {
        writeln!(writer, "# Generated: {}", stamp)?;
    }
    writeln!(writer, "# Simulation Parameters:")?;
    writeln!(
        writer,
        "# - Devices: {} | Gateways: {}",
        device_count, meta.gateway_count
    )?;
    writeln!(
        writer,
        "# - SimTime: {:.0}s | PayloadBytes: {}",
        window_secs, meta.payload_bytes
    )?;
    writeln!(
        writer,
        "# - SF: {} | BW: {}kHz | CR: 4/{}",
        meta.spreading_factor,
        meta.bandwidth_hz / 1000,
        4 + u32::from(meta.coding_rate)
    )?;
    writeln!(writer, "# - Channels: {}", meta.channels)?;
    if !meta.description.is_empty() {
        writeln!(writer, "# - Config: {}", meta.description)?;
    }
    writeln!(writer)?;

    let drops = totals.total_sent.saturating_sub(totals.total_received);
    let avg_usage = if device_count == 0 {
        0.0
    } else {
        duty_cycle_usage(totals.total_channel_airtime_ms, window_secs) / device_count as f64
    };
    let offered = offered_load_erlangs(totals.total_channel_airtime_ms, window_secs, meta.channels);

    writeln!(writer, "OVERALL_STATS")?;
    writeln!(writer, "TotalSent,{}", totals.total_sent)?;
    writeln!(writer, "TotalReceived,{}", totals.total_received)?;
    writeln!(
        writer,
        "PDR_Percent,{:.2}",
        pdr_percent(totals.total_received, totals.total_sent)
    )?;
    writeln!(writer, "Drops_SentMinusReceived,{}", drops)?;
    writeln!(
        writer,
        "DropRate_Percent,{:.2}",
        rate_percent(drops, totals.total_sent)
    )?;
    writeln!(writer, "TotalRetransmissions,{}", totals.total_retransmissions)?;
    writeln!(
        writer,
        "RetransmissionRate_Percent,{:.2}",
        rate_percent(totals.total_retransmissions, totals.total_received)
    )?;
    writeln!(
        writer,
        "TotalChannelAirTime_ms,{:.2}",
        totals.total_channel_airtime_ms
    )?;
    writeln!(writer, "AvgDutyCycleUsage_Percent,{:.4}", avg_usage * 100.0)?;
    writeln!(
        writer,
        "AvgDutyCycleHeadroom_Percent,{:.4}",
        duty_cycle_headroom(avg_usage, meta.duty_cycle_ceiling) * 100.0
    )?;
    writeln!(writer, "OfferedLoad_Erlangs,{:.4}", offered)?;
    writeln!(
        writer,
        "ChannelUtilization_Percent,{:.4}",
        channel_utilization_percent(offered)
    )?;
    writeln!(writer)?;

    writeln!(writer, "PER_NODE_STATS")?;
    writeln!(
        writer,
        "NodeID,Sent,Received,PDR_Percent,Retransmissions,UniqueFrameCounts,LastFrameCount,AirTime_ms,DutyCycleUsage_Percent"
    )?;

    for id in registry.ids() {
        let Some(device) = aggregator.device(id) else {
            continue;
        };
        if device.received > device.sent {
            // Legitimate under multi-gateway hearings, but worth surfacing.
            warn!(device = %id, received = device.received, sent = device.sent,
                "device received more than it sent");
        }
        writeln!(
            writer,
            "{},{},{},{:.2},{},{},{},{:.2},{:.4}",
            id,
            device.sent,
            device.received,
            pdr_percent(device.received, device.sent),
            device.retransmissions,
            device.frame_log.unique_count(),
            device.frame_log.last().unwrap_or(0),
            device.airtime_ms,
            duty_cycle_usage(device.airtime_ms, window_secs) * 100.0
        )?;
    }

    Ok(())
}

/// Render the report into a string.
pub fn export(
    aggregator: &MetricsAggregator,
    registry: &DeviceRegistry,
    meta: &ScenarioMeta,
) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = render_report(&mut buf, aggregator, registry, meta);
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lwsim_common::{DevAddr, DeviceId, DeviceSpec, TxParams};

    fn meta() -> ScenarioMeta {
        ScenarioMeta {
            name: "Baseline Reference Case".to_string(),
            gateway_count: 1,
            duration_secs: 600.0,
            payload_bytes: 51,
            spreading_factor: 10,
            bandwidth_hz: 125_000,
            coding_rate: 1,
            channels: 1,
            duty_cycle_ceiling: 0.01,
            description: "SF10 fixed, unconfirmed uplink only".to_string(),
            generated_at: Some("2026-01-01 00:00:00".to_string()),
        }
    }

    fn registry(n: u32) -> DeviceRegistry {
        let roster: Vec<DeviceSpec> = (0..n)
            .map(|i| DeviceSpec {
                address: Some(DevAddr::new(0x100 + i)),
                params: TxParams {
                    spreading_factor: 10,
                    bandwidth_hz: 125_000,
                    coding_rate: 1,
                    explicit_header: true,
                    low_data_rate_optimize: false,
                },
                payload_bytes: 51,
            })
            .collect();
        DeviceRegistry::build(&roster)
    }

    fn populated_aggregator(n: u32) -> MetricsAggregator {
        let mut agg = MetricsAggregator::new(n as usize);
        // Update devices in reverse order; rows must still come out
        // ascending by id.
        for i in (0..n).rev() {
            let id = DeviceId::new(i);
            agg.record_sent(id);
            agg.record_sent(id);
            agg.record_airtime(id, 2.0 * 616.448);
            let c = agg.classify(id, 0);
            agg.record_received(id, c);
        }
        agg
    }

    #[test]
    fn test_export_is_deterministic() {
        let registry = registry(5);
        let agg = populated_aggregator(5);
        let first = export(&agg, &registry, &meta());
        let second = export(&agg, &registry, &meta());
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_rows_ascend_by_id() {
        let registry = registry(5);
        let agg = populated_aggregator(5);
        let text = export(&agg, &registry, &meta());

        let rows: Vec<u32> = text
            .lines()
            .skip_while(|l| *l != "PER_NODE_STATS")
            .skip(2)
            .filter_map(|l| l.split(',').next())
            .filter_map(|id| id.parse().ok())
            .collect();
        assert_eq!(rows, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_overall_stats_values() {
        let registry = registry(2);
        let mut agg = MetricsAggregator::new(2);
        let id = DeviceId::new(0);
        for _ in 0..100 {
            agg.record_sent(id);
        }
        for fcnt in 0..50 {
            let c = agg.classify(id, fcnt);
            agg.record_received(id, c);
        }
        let text = export(&agg, &registry, &meta());

        assert!(text.contains("TotalSent,100\n"));
        assert!(text.contains("TotalReceived,50\n"));
        assert!(text.contains("PDR_Percent,50.00\n"));
        assert!(text.contains("Drops_SentMinusReceived,50\n"));
        assert!(text.contains("TotalRetransmissions,0\n"));
        assert!(text.contains("RetransmissionRate_Percent,0.00\n"));
    }

    #[test]
    fn test_zero_sent_yields_zero_pdr() {
        let registry = registry(1);
        let agg = MetricsAggregator::new(1);
        let text = export(&agg, &registry, &meta());
        assert!(text.contains("PDR_Percent,0.00\n"));
        assert!(text.contains("0,0,0,0.00,0,0,0,0.00,0.0000\n"));
    }

    #[test]
    fn test_empty_registry_renders_empty_table() {
        let registry = DeviceRegistry::build(&[]);
        let agg = MetricsAggregator::new(0);
        let text = export(&agg, &registry, &meta());
        assert!(text.ends_with(
            "PER_NODE_STATS\nNodeID,Sent,Received,PDR_Percent,Retransmissions,UniqueFrameCounts,LastFrameCount,AirTime_ms,DutyCycleUsage_Percent\n"
        ));
    }

    #[test]
    fn test_duty_cycle_fields() {
        let registry = registry(1);
        let mut agg = MetricsAggregator::new(1);
        // 6 s of airtime over a 600 s window = 1.0% usage, exhausting the
        // EU868 ceiling.
        agg.record_sent(DeviceId::new(0));
        agg.record_airtime(DeviceId::new(0), 6000.0);
        let text = export(&agg, &registry, &meta());
        assert!(text.contains("AvgDutyCycleUsage_Percent,1.0000\n"));
        assert!(text.contains("AvgDutyCycleHeadroom_Percent,0.0000\n"));
        assert!(text.contains("OfferedLoad_Erlangs,0.0100\n"));
        assert!(text.contains("ChannelUtilization_Percent,1.0000\n"));
    }
}
