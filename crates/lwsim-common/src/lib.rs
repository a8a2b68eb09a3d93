//! # lwsim-common
//!
//! Common types and traits for the LWSim telemetry framework.
//!
//! This crate provides the shared vocabulary between the external network
//! simulation engine and the telemetry engine:
//! - Time representation ([`SimTime`])
//! - Device identification ([`DeviceId`]) and roster entries ([`DeviceSpec`])
//! - Event notifications ([`TransmittedEvent`], [`GatewayRxEvent`])
//! - The subscription seam ([`NetworkObserver`])

use serde::{Deserialize, Serialize};

// Re-export frame-level types used across the workspace
pub use lorawan_frame::DevAddr;

// ============================================================================
// Time Types
// ============================================================================

/// Simulation time in microseconds since scenario start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SimTime(u64);

impl SimTime {
    /// Zero time.
    pub const ZERO: SimTime = SimTime(0);

    /// Create from microseconds.
    pub fn from_micros(us: u64) -> Self {
        SimTime(us)
    }

    /// Create from milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        SimTime(ms * 1000)
    }

    /// Create from seconds (float).
    pub fn from_secs(s: f64) -> Self {
        SimTime((s * 1_000_000.0) as u64)
    }

    /// Get as microseconds.
    pub fn as_micros(&self) -> u64 {
        self.0
    }

    /// Get as seconds (float).
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }
}

impl std::ops::Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Self) -> Self::Output {
        SimTime(self.0 + rhs.0)
    }
}

impl std::ops::Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: Self) -> Self::Output {
        SimTime(self.0.saturating_sub(rhs.0))
    }
}

// ============================================================================
// Device Identity
// ============================================================================

/// Stable device identifier assigned at registry build time.
///
/// Ids are dense, start at zero, and are never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub u32);

impl DeviceId {
    /// Create a new device id.
    pub fn new(id: u32) -> Self {
        DeviceId(id)
    }

    /// Index into dense per-device storage.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Radio Parameters
// ============================================================================

/// Per-device radio parameters relevant to time-on-air.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TxParams {
    /// Spreading factor (7-12).
    pub spreading_factor: u8,
    /// Bandwidth in Hz.
    pub bandwidth_hz: u32,
    /// Coding rate numerator offset (1-4, representing 4/5 to 4/8).
    pub coding_rate: u8,
    /// Explicit PHY header present.
    pub explicit_header: bool,
    /// Low data rate optimization enabled.
    pub low_data_rate_optimize: bool,
}

// ============================================================================
// Device Roster
// ============================================================================

/// One entry of the externally supplied device roster.
///
/// The address is assigned by the simulation engine; an entry without one is
/// skipped at registry build time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSpec {
    /// Network address, if the engine assigned one.
    pub address: Option<DevAddr>,
    /// Radio parameters used for this device's uplinks.
    pub params: TxParams,
    /// Application payload size in bytes per uplink.
    pub payload_bytes: usize,
}

// ============================================================================
// Event Notifications
// ============================================================================

/// A device started a transmission.
///
/// The originating device is directly known to the simulation engine, so the
/// notification carries its id rather than a frame.
#[derive(Debug, Clone)]
pub struct TransmittedEvent {
    /// Time of the transmission.
    pub time: SimTime,
    /// The transmitting device.
    pub device: DeviceId,
}

/// A gateway finished receiving a frame.
#[derive(Debug, Clone)]
pub struct GatewayRxEvent {
    /// Time of the reception.
    pub time: SimTime,
    /// Receiving gateway index, for log context only.
    pub gateway: u32,
    /// The raw frame bytes as heard on air.
    pub raw: Vec<u8>,
}

// ============================================================================
// Subscription Seam
// ============================================================================

/// Receiver of simulation events.
///
/// The simulation engine must deliver events to the observer synchronously
/// and in simulated-time order; ties are broken by the engine's own stable
/// dispatch order. No other delivery mechanism is assumed.
pub trait NetworkObserver {
    /// A device started transmitting.
    fn on_transmitted(&mut self, event: &TransmittedEvent);

    /// A gateway received a raw frame.
    fn on_gateway_receive(&mut self, event: &GatewayRxEvent);
}
