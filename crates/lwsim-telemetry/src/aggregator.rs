//! Metrics aggregation: the only mutable state in the engine.
//!
//! The aggregator is an explicitly owned value passed by reference into the
//! event ingest, so independent scenario runs cannot contaminate each other
//! and tests can observe counters in isolation.

use crate::dedup::{Classification, FrameCounterLog};
use lwsim_common::DeviceId;
use serde::Serialize;

/// Per-device counters. All counters are monotonic over a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceStats {
    /// Uplinks transmitted by this device.
    pub sent: u64,
    /// Uplinks received at a gateway, retransmissions included.
    pub received: u64,
    /// Receptions classified as retransmissions.
    pub retransmissions: u64,
    /// Accumulated on-air duration in milliseconds.
    pub airtime_ms: f64,
    /// Frame counters observed for this device.
    pub frame_log: FrameCounterLog,
}

/// Network-wide totals. Each field is the sum of the corresponding
/// per-device quantity; the equality is checked at report time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GlobalAggregate {
    /// Total uplinks transmitted.
    pub total_sent: u64,
    /// Total uplinks received, retransmissions included.
    pub total_received: u64,
    /// Total receptions classified as retransmissions.
    pub total_retransmissions: u64,
    /// Total channel airtime in milliseconds.
    pub total_channel_airtime_ms: f64,
}

/// Owner of all per-device and global counters.
///
/// Mutated only by the event ingest, strictly in simulated-time order, then
/// handed to the report exporter after the run stops. Callers validate
/// device ids before calling in; an out-of-range id is a contract breach,
/// fatal in debug builds and a no-op in release.
#[derive(Debug, Default, Serialize)]
pub struct MetricsAggregator {
    devices: Vec<DeviceStats>,
    totals: GlobalAggregate,
}

impl MetricsAggregator {
    /// Create an aggregator with zeroed counters for `device_count` devices.
    pub fn new(device_count: usize) -> Self {
        MetricsAggregator {
            devices: vec![DeviceStats::default(); device_count],
            totals: GlobalAggregate::default(),
        }
    }

    fn slot(&mut self, id: DeviceId) -> Option<&mut DeviceStats> {
        debug_assert!(
            id.index() < self.devices.len(),
            "device id {} outside aggregator range {}",
            id,
            self.devices.len()
        );
        self.devices.get_mut(id.index())
    }

    /// Record one transmitted uplink.
    pub fn record_sent(&mut self, id: DeviceId) {
        let Some(device) = self.slot(id) else {
            return;
        };
        device.sent += 1;
        self.totals.total_sent += 1;
    }

    /// Classify a received frame counter against the device's log.
    ///
    /// This is the retransmission detector's operation, routed through the
    /// aggregator because it owns the per-device frame-counter state.
    pub fn classify(&mut self, id: DeviceId, fcnt: u32) -> Classification {
        match self.slot(id) {
            Some(device) => device.frame_log.observe(fcnt),
            None => Classification::FirstSeen,
        }
    }

    /// Record one gateway reception with its classification.
    ///
    /// A retransmission still counts toward `received`.
    pub fn record_received(&mut self, id: DeviceId, classification: Classification) {
        let retransmission = classification == Classification::Retransmission;
        let Some(device) = self.slot(id) else {
            return;
        };
        device.received += 1;
        if retransmission {
            device.retransmissions += 1;
        }
        self.totals.total_received += 1;
        if retransmission {
            self.totals.total_retransmissions += 1;
        }
    }

    /// Accumulate on-air duration for a device and the whole channel.
    pub fn record_airtime(&mut self, id: DeviceId, duration_ms: f64) {
        let Some(device) = self.slot(id) else {
            return;
        };
        device.airtime_ms += duration_ms;
        self.totals.total_channel_airtime_ms += duration_ms;
    }

    /// Zero every counter. Used only at scenario start, never mid-run.
    pub fn reset(&mut self) {
        for device in &mut self.devices {
            *device = DeviceStats::default();
        }
        self.totals = GlobalAggregate::default();
    }

    /// Per-device stats, indexed by device id.
    pub fn devices(&self) -> &[DeviceStats] {
        &self.devices
    }

    /// Stats for one device.
    pub fn device(&self, id: DeviceId) -> Option<&DeviceStats> {
        self.devices.get(id.index())
    }

    /// Network-wide totals.
    pub fn totals(&self) -> &GlobalAggregate {
        &self.totals
    }

    /// Check that the global totals equal the per-device sums.
    pub fn totals_consistent(&self) -> bool {
        let sent: u64 = self.devices.iter().map(|d| d.sent).sum();
        let received: u64 = self.devices.iter().map(|d| d.received).sum();
        let retransmissions: u64 = self.devices.iter().map(|d| d.retransmissions).sum();
        let airtime: f64 = self.devices.iter().map(|d| d.airtime_ms).sum();
        sent == self.totals.total_sent
            && received == self.totals.total_received
            && retransmissions == self.totals.total_retransmissions
            && (airtime - self.totals.total_channel_airtime_ms).abs() < 1e-6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_track_totals() {
        let mut agg = MetricsAggregator::new(2);
        agg.record_sent(DeviceId::new(0));
        agg.record_sent(DeviceId::new(0));
        agg.record_sent(DeviceId::new(1));
        agg.record_airtime(DeviceId::new(0), 616.448);
        agg.record_airtime(DeviceId::new(1), 616.448);

        assert_eq!(agg.device(DeviceId::new(0)).unwrap().sent, 2);
        assert_eq!(agg.totals().total_sent, 3);
        assert!((agg.totals().total_channel_airtime_ms - 2.0 * 616.448).abs() < 1e-9);
        assert!(agg.totals_consistent());
    }

    #[test]
    fn test_frame_counter_sequence() {
        // The [0, 1, 1, 2] sequence: three unique counters, one
        // retransmission, four receptions.
        let mut agg = MetricsAggregator::new(1);
        let id = DeviceId::new(0);
        for fcnt in [0, 1, 1, 2] {
            let classification = agg.classify(id, fcnt);
            agg.record_received(id, classification);
        }

        let device = agg.device(id).unwrap();
        assert_eq!(device.received, 4);
        assert_eq!(device.retransmissions, 1);
        assert_eq!(device.frame_log.unique_count(), 3);
        assert_eq!(device.frame_log.last(), Some(2));
        assert!(device.received >= device.retransmissions);
    }

    #[test]
    fn test_retransmission_counts_in_received() {
        let mut agg = MetricsAggregator::new(1);
        let id = DeviceId::new(0);
        agg.record_received(id, Classification::FirstSeen);
        agg.record_received(id, Classification::Retransmission);
        let device = agg.device(id).unwrap();
        assert_eq!(device.received, 2);
        assert_eq!(device.retransmissions, 1);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut agg = MetricsAggregator::new(1);
        let id = DeviceId::new(0);
        agg.record_sent(id);
        let classification = agg.classify(id, 5);
        agg.record_received(id, classification);
        agg.record_airtime(id, 100.0);

        agg.reset();
        let device = agg.device(id).unwrap();
        assert_eq!(device.sent, 0);
        assert_eq!(device.received, 0);
        assert_eq!(device.frame_log.unique_count(), 0);
        assert_eq!(agg.totals().total_sent, 0);
        assert_eq!(agg.totals().total_channel_airtime_ms, 0.0);
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn test_out_of_range_id_is_noop_in_release() {
        let mut agg = MetricsAggregator::new(1);
        agg.record_sent(DeviceId::new(9));
        assert_eq!(agg.totals().total_sent, 0);
    }
}
