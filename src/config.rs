//! Ambient configuration: tunables the host can change vs. identity fixed at startup.

use crate::hw_addr::HwAddr;

/// Tunable parameters for the discovery table and the pairing state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PairingConfig {
    pub discovery_capacity: usize,
    pub discovery_ttl_ms: u64,
    pub default_permit_join_ms: u64,
    pub max_permit_join_ms: u64,
    pub binding_timeout_ms: u64,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            discovery_capacity: 32,
            discovery_ttl_ms: 30_000,
            default_permit_join_ms: 60_000,
            max_permit_join_ms: 300_000,
            binding_timeout_ms: 10_000,
        }
    }
}

impl PairingConfig {
    /// Clamps a requested permit-join duration to the configured maximum.
    pub fn clamp_permit_join_ms(&self, requested_ms: u64) -> u64 {
        requested_ms.min(self.max_permit_join_ms)
    }
}

/// Fixed coordinator identity, supplied once at construction and never mutated except
/// for `next_tower_id`, which the state machine advances on every successful bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CoordinatorIdentity {
    pub coord_mac: HwAddr,
    pub coordinator_id: u16,
    pub farm_id: u16,
    pub next_tower_id: u16,
}

impl CoordinatorIdentity {
    pub fn new(coord_mac: HwAddr, coordinator_id: u16, farm_id: u16) -> Self {
        Self { coord_mac, coordinator_id, farm_id, next_tower_id: 1 }
    }
}
