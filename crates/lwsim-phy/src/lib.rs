//! # lwsim-phy
//!
//! LoRa PHY calculations for LWSim.
//!
//! This crate provides:
//! - Time-on-air computation ([`time_on_air_ms`])
//! - Configurable PHY parameters ([`PhyConfig`])
//! - Duty-cycle and channel-load helpers ([`duty_cycle_usage`],
//!   [`offered_load_erlangs`])
//! - Generic rate helpers ([`pdr_percent`])
//!
//! Everything here is a pure function of its inputs, so results can be unit
//! tested independent of any simulation state.

use lwsim_common::TxParams;
use serde::{Deserialize, Serialize};

// ============================================================================
// PHY Configuration
// ============================================================================

/// Configuration for time-on-air calculations.
///
/// Holds the parameters that are fixed per deployment rather than per
/// device. Defaults follow the common LoRaWAN uplink configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PhyConfig {
    /// Number of programmed preamble symbols.
    pub preamble_symbols: u32,
    /// Payload CRC present (always on for uplinks).
    pub crc_on: bool,
}

impl PhyConfig {
    /// Default preamble symbol count.
    pub const DEFAULT_PREAMBLE_SYMBOLS: u32 = 8;

    /// Create a new PhyConfig with explicit values.
    pub fn new(preamble_symbols: u32, crc_on: bool) -> Self {
        Self {
            preamble_symbols,
            crc_on,
        }
    }
}

impl Default for PhyConfig {
    fn default() -> Self {
        Self {
            preamble_symbols: Self::DEFAULT_PREAMBLE_SYMBOLS,
            crc_on: true,
        }
    }
}

// ============================================================================
// Time-on-Air
// ============================================================================

/// Symbol duration in milliseconds for a spreading factor and bandwidth.
///
/// `T_sym = 2^SF / BW`.
pub fn symbol_time_ms(spreading_factor: u8, bandwidth_hz: u32) -> f64 {
    let sf = spreading_factor.clamp(7, 12);
    (f64::from(1u32 << sf) / f64::from(bandwidth_hz)) * 1000.0
}

/// Whether low data rate optimization applies (SF11+ at 125 kHz).
pub fn ldro_for_sf(spreading_factor: u8, bandwidth_hz: u32) -> bool {
    spreading_factor >= 11 && bandwidth_hz <= 125_000
}

/// Time on air in milliseconds for a payload, using the default [`PhyConfig`].
pub fn time_on_air_ms(params: &TxParams, payload_bytes: usize) -> f64 {
    time_on_air_ms_with_config(params, payload_bytes, &PhyConfig::default())
}

/// Time on air in milliseconds with explicit PHY configuration.
///
/// Implements the standard chirp-modulation formula: preamble duration is
/// `(preamble_symbols + 4.25) * T_sym`; the payload symbol count is
/// `8 + max(0, ceil((8*PL - 4*SF + 28 + 16*CRC - 20*IH) / (4*(SF - 2*DE))) * (CR + 4))`.
pub fn time_on_air_ms_with_config(
    params: &TxParams,
    payload_bytes: usize,
    config: &PhyConfig,
) -> f64 {
    let sf = f64::from(params.spreading_factor.clamp(7, 12));
    let t_sym = symbol_time_ms(params.spreading_factor, params.bandwidth_hz);
    let t_preamble = (f64::from(config.preamble_symbols) + 4.25) * t_sym;

    let de = if params.low_data_rate_optimize { 1.0 } else { 0.0 };
    let ih = if params.explicit_header { 0.0 } else { 1.0 };
    let crc = if config.crc_on { 1.0 } else { 0.0 };
    let cr = f64::from(params.coding_rate);
    let pl = payload_bytes as f64;

    let num = (((8.0 * pl - 4.0 * sf + 28.0 + 16.0 * crc - 20.0 * ih) / (4.0 * (sf - 2.0 * de)))
        .ceil()
        * (cr + 4.0))
        .max(0.0);

    let payload_symbols = 8.0 + num;
    t_preamble + payload_symbols * t_sym
}

// ============================================================================
// Duty Cycle / Channel Load
// ============================================================================

/// Fraction of the observation window spent on air.
pub fn duty_cycle_usage(airtime_ms: f64, window_secs: f64) -> f64 {
    if window_secs <= 0.0 {
        return 0.0;
    }
    (airtime_ms / 1000.0) / window_secs
}

/// Remaining duty-cycle allowance below a regulatory ceiling, floored at zero.
///
/// Both arguments are fractions (e.g. EU868's 1% ceiling is 0.01).
pub fn duty_cycle_headroom(usage: f64, ceiling: f64) -> f64 {
    (ceiling - usage).max(0.0)
}

/// Offered load in Erlangs: total airtime over the available channel time.
pub fn offered_load_erlangs(total_airtime_ms: f64, window_secs: f64, channels: u32) -> f64 {
    if window_secs <= 0.0 || channels == 0 {
        return 0.0;
    }
    (total_airtime_ms / 1000.0) / (window_secs * f64::from(channels))
}

/// Channel utilization as a percentage of one Erlang.
///
/// Left unclamped so overload remains visible.
pub fn channel_utilization_percent(offered_load: f64) -> f64 {
    offered_load * 100.0
}

// ============================================================================
// Generic Metric Helpers
// ============================================================================

/// `num / den * 100`, defined as 0 when the denominator is zero.
pub fn rate_percent(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        100.0 * num as f64 / den as f64
    }
}

/// Packet delivery ratio in percent.
pub fn pdr_percent(received: u64, sent: u64) -> f64 {
    rate_percent(received, sent)
}
