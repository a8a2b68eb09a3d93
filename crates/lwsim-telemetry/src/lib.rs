//! # lwsim-telemetry
//!
//! Telemetry aggregation and airtime analysis engine for LWSim.
//!
//! The engine observes a simulated LoRaWAN-style network's transmission and
//! reception events and turns them into per-device and network-wide
//! performance metrics: packet delivery ratio, retransmission rate, channel
//! airtime, duty-cycle usage and offered load.
//!
//! This crate provides:
//! - Address-to-identifier mapping ([`registry::DeviceRegistry`])
//! - Retransmission detection ([`dedup::FrameCounterLog`])
//! - All mutable counters ([`aggregator::MetricsAggregator`])
//! - The event subscriber driving the above ([`ingest::EventIngest`])
//! - Deterministic report rendering ([`report`])
//!
//! The engine is single-threaded and entirely driven by the external
//! simulator's synchronous event dispatch; it never blocks or spawns work.
//!
//! ## Example
//!
//! ```rust
//! use lwsim_common::{DevAddr, DeviceId, DeviceSpec, NetworkObserver, SimTime, TransmittedEvent, TxParams};
//! use lwsim_telemetry::{DeviceRegistry, EventIngest};
//!
//! let roster = vec![DeviceSpec {
//!     address: Some(DevAddr::new(0x2601_0748)),
//!     params: TxParams {
//!         spreading_factor: 10,
//!         bandwidth_hz: 125_000,
//!         coding_rate: 1,
//!         explicit_header: true,
//!         low_data_rate_optimize: false,
//!     },
//!     payload_bytes: 51,
//! }];
//! let mut ingest = EventIngest::new(DeviceRegistry::build(&roster));
//! ingest.on_transmitted(&TransmittedEvent {
//!     time: SimTime::ZERO,
//!     device: DeviceId::new(0),
//! });
//! assert_eq!(ingest.aggregator().totals().total_sent, 1);
//! ```

pub mod aggregator;
pub mod dedup;
pub mod ingest;
pub mod registry;
pub mod report;

pub use aggregator::{DeviceStats, GlobalAggregate, MetricsAggregator};
pub use dedup::{Classification, FrameCounterLog};
pub use ingest::{DropStats, EventIngest};
pub use registry::{DeviceRegistry, RegisteredDevice};
pub use report::{export, render_report, ScenarioMeta};
