//! Device registry: address to identifier mapping for a run.

use lwsim_common::{DevAddr, DeviceId, DeviceSpec, TxParams};
use std::collections::BTreeMap;
use tracing::warn;

/// A device accepted into the registry.
#[derive(Debug, Clone)]
pub struct RegisteredDevice {
    /// The address the simulation engine assigned.
    pub address: DevAddr,
    /// Radio parameters for this device's uplinks.
    pub params: TxParams,
    /// Application payload size per uplink, in bytes.
    pub payload_bytes: usize,
}

/// Address-to-identifier mapping built once at scenario setup.
///
/// Entries are never removed during a run. The address map is a `BTreeMap`
/// so iteration order is deterministic across runs.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    by_addr: BTreeMap<DevAddr, DeviceId>,
    devices: Vec<RegisteredDevice>,
}

impl DeviceRegistry {
    /// Build the registry from the externally supplied roster.
    ///
    /// Ids are assigned in roster order, densely from zero. An entry without
    /// an address, or whose address is already bound, is skipped with a
    /// warning; setup always continues.
    pub fn build(roster: &[DeviceSpec]) -> Self {
        let mut registry = DeviceRegistry::default();
        for (pos, spec) in roster.iter().enumerate() {
            let Some(address) = spec.address else {
                warn!(roster_pos = pos, "skipping device without assigned address");
                continue;
            };
            if registry.by_addr.contains_key(&address) {
                warn!(roster_pos = pos, %address, "skipping device with duplicate address");
                continue;
            }
            let id = DeviceId::new(registry.devices.len() as u32);
            registry.by_addr.insert(address, id);
            registry.devices.push(RegisteredDevice {
                address,
                params: spec.params,
                payload_bytes: spec.payload_bytes,
            });
        }
        registry
    }

    /// Resolve an address to a device id.
    ///
    /// A miss signals an unknown sender and is handled by the caller; it is
    /// not an error here.
    pub fn lookup(&self, address: DevAddr) -> Option<DeviceId> {
        self.by_addr.get(&address).copied()
    }

    /// Get a registered device by id.
    pub fn get(&self, id: DeviceId) -> Option<&RegisteredDevice> {
        self.devices.get(id.index())
    }

    /// All device ids, ascending.
    pub fn ids(&self) -> impl Iterator<Item = DeviceId> + '_ {
        (0..self.devices.len() as u32).map(DeviceId::new)
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
