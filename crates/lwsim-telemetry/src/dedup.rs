//! Retransmission detection via frame-counter membership.
//!
//! MAC-level reliability resends the identical application frame with the
//! identical counter, so a repeated counter is the one generally correct
//! retransmission signal available without deeper protocol state.

use serde::Serialize;
use std::collections::BTreeSet;

/// Outcome of observing a frame counter for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// First reception of this counter value.
    FirstSeen,
    /// The counter was observed before: a retransmission.
    Retransmission,
}

/// Per-device log of observed frame counters.
///
/// Counters are never expired from the set, so classification stays correct
/// even when a retransmission arrives long after the original.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FrameCounterLog {
    seen: BTreeSet<u32>,
    last: Option<u32>,
}

impl FrameCounterLog {
    /// Observe a counter value and classify it.
    ///
    /// The last-observed value is updated either way; it is reported but
    /// plays no part in detection.
    pub fn observe(&mut self, fcnt: u32) -> Classification {
        let classification = if self.seen.insert(fcnt) {
            Classification::FirstSeen
        } else {
            Classification::Retransmission
        };
        self.last = Some(fcnt);
        classification
    }

    /// Number of distinct counters seen as first-time receptions.
    pub fn unique_count(&self) -> usize {
        self.seen.len()
    }

    /// Most recently observed counter value, if any.
    pub fn last(&self) -> Option<u32> {
        self.last
    }

    /// Clear all observed state.
    pub fn clear(&mut self) {
        self.seen.clear();
        self.last = None;
    }
}
