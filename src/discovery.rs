//! Fixed-capacity table of nodes observed via `Advertisement`, keyed by hardware address.

use crate::hw_addr::HwAddr;
use crate::wire::{Capabilities, DeviceType, ReasonCode};

/// Lifecycle state of a [`DiscoveredNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum NodeState {
    Discovered,
    OfferSent,
    Binding,
    Bound,
    Rejected,
    Failed,
}

/// A node observed advertising on the pairing channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DiscoveredNode {
    pub mac: HwAddr,
    pub device_type: DeviceType,
    pub firmware_version: u32,
    pub capabilities: Capabilities,
    pub last_nonce: u32,
    pub last_sequence: u16,
    pub last_seen_ms: u64,
    pub rssi: i8,
    pub state: NodeState,
    pub offer_token: u32,
}

/// Result of [`DiscoveryTable::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserveOutcome {
    Inserted,
    Refreshed,
    DuplicateDropped,
    Rejected(ReasonCode),
}

/// Bounded, array-backed map from [`HwAddr`] to [`DiscoveredNode`].
///
/// Capacity is fixed at construction. Lookup is a linear scan — acceptable at the sizes
/// this table is designed for, and avoids pulling in a hasher for a handful of entries.
#[derive(Debug, Clone)]
pub struct DiscoveryTable {
    entries: Vec<DiscoveredNode>,
    capacity: usize,
    ttl_ms: u64,
}

impl DiscoveryTable {
    pub fn new(capacity: usize, ttl_ms: u64) -> Self {
        Self { entries: Vec::with_capacity(capacity), capacity, ttl_ms }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiscoveredNode> {
        self.entries.iter()
    }

    fn position(&self, mac: HwAddr) -> Option<usize> {
        self.entries.iter().position(|e| e.mac == mac)
    }

    /// Applies the insertion policy described in the discovery table's spec section.
    #[allow(clippy::too_many_arguments)]
    pub fn observe(
        &mut self,
        mac: HwAddr,
        device_type: DeviceType,
        firmware_version: u32,
        capabilities: Capabilities,
        nonce: u32,
        sequence: u16,
        rssi: i8,
        now_ms: u64,
    ) -> ObserveOutcome {
        if let Some(idx) = self.position(mac) {
            let entry = &mut self.entries[idx];
            if entry.last_sequence == sequence && entry.last_nonce == nonce {
                return ObserveOutcome::DuplicateDropped;
            }
            entry.last_nonce = nonce;
            entry.last_sequence = sequence;
            entry.last_seen_ms = now_ms;
            entry.rssi = rssi;
            entry.device_type = device_type;
            entry.firmware_version = firmware_version;
            entry.capabilities = capabilities;
            return ObserveOutcome::Refreshed;
        }

        let fresh = DiscoveredNode {
            mac,
            device_type,
            firmware_version,
            capabilities,
            last_nonce: nonce,
            last_sequence: sequence,
            last_seen_ms: now_ms,
            rssi,
            state: NodeState::Discovered,
            offer_token: 0,
        };

        if self.entries.len() < self.capacity {
            self.entries.push(fresh);
            return ObserveOutcome::Inserted;
        }

        if let Some(evict_idx) = self.oldest_stale(now_ms, None) {
            self.entries[evict_idx] = fresh;
            return ObserveOutcome::Inserted;
        }

        ObserveOutcome::Rejected(ReasonCode::CapacityFull)
    }

    fn oldest_stale(&self, now_ms: u64, protect: Option<HwAddr>) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| Some(e.mac) != protect)
            .filter(|(_, e)| now_ms.saturating_sub(e.last_seen_ms) > self.ttl_ms)
            .min_by_key(|(_, e)| e.last_seen_ms)
            .map(|(idx, _)| idx)
    }

    pub fn find(&self, mac: HwAddr) -> Option<&DiscoveredNode> {
        self.entries.iter().find(|e| e.mac == mac)
    }

    pub fn find_mut(&mut self, mac: HwAddr) -> Option<&mut DiscoveredNode> {
        self.entries.iter_mut().find(|e| e.mac == mac)
    }

    pub fn update_state(&mut self, mac: HwAddr, new_state: NodeState) -> bool {
        match self.find_mut(mac) {
            Some(entry) => {
                entry.state = new_state;
                true
            }
            None => false,
        }
    }

    pub fn set_offer_token(&mut self, mac: HwAddr, token: u32) -> bool {
        match self.find_mut(mac) {
            Some(entry) => {
                entry.offer_token = token;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, mac: HwAddr) -> Option<DiscoveredNode> {
        let idx = self.position(mac)?;
        Some(self.entries.remove(idx))
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    /// Removes entries whose `state != Bound` in one pass, used on permit-join close.
    pub fn purge_non_bound(&mut self) {
        self.entries.retain(|e| e.state == NodeState::Bound);
    }

    /// Evicts entries older than the discovery TTL, never the `protect`ed MAC (the node
    /// currently in a binding attempt, if any).
    pub fn sweep(&mut self, now_ms: u64, protect: Option<HwAddr>) {
        self.entries.retain(|e| {
            Some(e.mac) == protect || now_ms.saturating_sub(e.last_seen_ms) <= self.ttl_ms
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(last: u8) -> HwAddr {
        HwAddr::new([0, 0, 0, 0, 0, last])
    }

    fn observe_fresh(table: &mut DiscoveryTable, m: HwAddr, now_ms: u64) -> ObserveOutcome {
        table.observe(m, DeviceType::Tower, 0, Capabilities::empty(), 1, 1, -50, now_ms)
    }

    #[test]
    fn first_advertisement_inserts() {
        let mut table = DiscoveryTable::new(4, 30_000);
        assert_eq!(observe_fresh(&mut table, mac(1), 0), ObserveOutcome::Inserted);
        assert_eq!(table.len(), 1);
        assert_eq!(table.find(mac(1)).unwrap().state, NodeState::Discovered);
        assert_eq!(table.find(mac(1)).unwrap().offer_token, 0);
    }

    #[test]
    fn identical_nonce_and_sequence_is_dropped_without_touching_last_seen() {
        let mut table = DiscoveryTable::new(4, 30_000);
        observe_fresh(&mut table, mac(1), 0);
        let outcome = table.observe(mac(1), DeviceType::Tower, 0, Capabilities::empty(), 1, 1, -40, 500);
        assert_eq!(outcome, ObserveOutcome::DuplicateDropped);
        assert_eq!(table.find(mac(1)).unwrap().last_seen_ms, 0);
        assert_eq!(table.find(mac(1)).unwrap().rssi, -50);
    }

    #[test]
    fn differing_sequence_refreshes_last_seen_and_keeps_state() {
        let mut table = DiscoveryTable::new(4, 30_000);
        observe_fresh(&mut table, mac(1), 0);
        table.update_state(mac(1), NodeState::OfferSent);
        table.set_offer_token(mac(1), 7);
        let outcome = table.observe(mac(1), DeviceType::Tower, 0, Capabilities::empty(), 2, 2, -40, 500);
        assert_eq!(outcome, ObserveOutcome::Refreshed);
        let entry = table.find(mac(1)).unwrap();
        assert_eq!(entry.last_seen_ms, 500);
        assert_eq!(entry.rssi, -40);
        assert_eq!(entry.state, NodeState::OfferSent);
        assert_eq!(entry.offer_token, 7);
    }

    #[test]
    fn capacity_rejects_when_all_entries_fresh() {
        let mut table = DiscoveryTable::new(2, 30_000);
        observe_fresh(&mut table, mac(1), 0);
        observe_fresh(&mut table, mac(2), 0);
        let outcome = observe_fresh(&mut table, mac(3), 100);
        assert_eq!(outcome, ObserveOutcome::Rejected(ReasonCode::CapacityFull));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn capacity_evicts_stale_entry_to_make_room() {
        let mut table = DiscoveryTable::new(2, 1_000);
        observe_fresh(&mut table, mac(1), 0);
        observe_fresh(&mut table, mac(2), 0);
        let outcome = observe_fresh(&mut table, mac(3), 1_001);
        assert_eq!(outcome, ObserveOutcome::Inserted);
        assert_eq!(table.len(), 2);
        assert!(table.find(mac(3)).is_some());
    }

    #[test]
    fn sweep_evicts_stale_but_protects_named_mac() {
        let mut table = DiscoveryTable::new(4, 1_000);
        observe_fresh(&mut table, mac(1), 0);
        observe_fresh(&mut table, mac(2), 0);
        table.sweep(2_000, Some(mac(1)));
        assert!(table.find(mac(1)).is_some());
        assert!(table.find(mac(2)).is_none());
    }

    #[test]
    fn purge_non_bound_keeps_only_bound_entries() {
        let mut table = DiscoveryTable::new(4, 30_000);
        observe_fresh(&mut table, mac(1), 0);
        observe_fresh(&mut table, mac(2), 0);
        table.update_state(mac(1), NodeState::Bound);
        table.purge_non_bound();
        assert_eq!(table.len(), 1);
        assert!(table.find(mac(1)).is_some());
    }

    #[test]
    fn remove_and_clear_all() {
        let mut table = DiscoveryTable::new(4, 30_000);
        observe_fresh(&mut table, mac(1), 0);
        observe_fresh(&mut table, mac(2), 0);
        assert!(table.remove(mac(1)).is_some());
        assert_eq!(table.len(), 1);
        table.clear_all();
        assert!(table.is_empty());
    }
}
