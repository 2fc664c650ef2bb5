//! Three-state pairing controller: discovery, approval, and the four-message bind
//! handshake, plus the tick driver that advances both timeout sources.

use tracing::{debug, info, warn};

use crate::config::{CoordinatorIdentity, PairingConfig};
use crate::discovery::{DiscoveredNode, DiscoveryTable, NodeState, ObserveOutcome};
use crate::hooks::{BindingResult, PairingClock, PairingObserver, PairingRadio, PairingRng};
use crate::hw_addr::HwAddr;
use crate::timer::DeadlineTimer;
use crate::wire::{
    AbortMessage, AcceptMessage, AdvertisementMessage, Capabilities, ConfirmMessage, DeviceType,
    OfferMessage, ReasonCode, PROTOCOL_VERSION,
};

/// Top-level state of the pairing controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    Operational,
    DiscoveryActive,
    Binding,
}

/// The single in-flight bind handshake, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct BindingAttempt {
    node_mac: HwAddr,
    offer_token: u32,
    assigned_tower_id: u16,
    started_ms: u64,
    accept_received: bool,
    active: bool,
}

/// Coordinator-side pairing subsystem. Generic over the four host-supplied capabilities
/// so the hot path (tick, on_accept) never goes through a vtable.
pub struct PairingCoordinator<R, O, C, G>
where
    R: PairingRadio,
    O: PairingObserver,
    C: PairingClock,
    G: PairingRng,
{
    config: PairingConfig,
    identity: CoordinatorIdentity,
    state: PairingState,
    discovery: DiscoveryTable,
    permit_deadline: DeadlineTimer,
    binding: BindingAttempt,
    radio: R,
    observer: O,
    clock: C,
    rng: G,
}

impl<R, O, C, G> PairingCoordinator<R, O, C, G>
where
    R: PairingRadio,
    O: PairingObserver,
    C: PairingClock,
    G: PairingRng,
{
    pub fn new(
        config: PairingConfig,
        identity: CoordinatorIdentity,
        radio: R,
        observer: O,
        clock: C,
        rng: G,
    ) -> Self {
        let discovery = DiscoveryTable::new(config.discovery_capacity, config.discovery_ttl_ms);
        Self {
            config,
            identity,
            state: PairingState::Operational,
            discovery,
            permit_deadline: DeadlineTimer::new(),
            binding: BindingAttempt::default(),
            radio,
            observer,
            clock,
            rng,
        }
    }

    pub fn state(&self) -> PairingState {
        self.state
    }

    pub fn next_tower_id(&self) -> u16 {
        self.identity.next_tower_id
    }

    pub fn find_node(&self, mac: HwAddr) -> Option<&DiscoveredNode> {
        self.discovery.find(mac)
    }

    pub fn discovered_nodes(&self) -> impl Iterator<Item = &DiscoveredNode> {
        self.discovery.iter()
    }

    /// Milliseconds remaining in the permit-join window, zero if closed.
    pub fn permit_join_remaining_ms(&self) -> u64 {
        self.permit_deadline.remaining_ms(self.clock.now_ms())
    }

    /// Opens the permit-join window, or extends it if already open. Fails while a
    /// binding is in progress.
    pub fn enable_permit_join(&mut self, duration_ms: u64) -> bool {
        if matches!(self.state, PairingState::Binding) {
            warn!("enable_permit_join rejected: binding in progress");
            return false;
        }
        let clamped = self.config.clamp_permit_join_ms(duration_ms);
        let now = self.clock.now_ms();
        self.permit_deadline.set(now, clamped);
        if matches!(self.state, PairingState::Operational) {
            self.state = PairingState::DiscoveryActive;
            info!(duration_ms = clamped, "permit-join opened");
            self.observer.permit_join_changed(true, clamped);
        } else {
            info!(duration_ms = clamped, "permit-join window extended");
        }
        true
    }

    /// Closes the permit-join window: aborts an in-flight binding with `InternalError`
    /// (without sending a Reject to the peer — the peer observes closure via its own
    /// timeout), purges non-Bound entries, and returns to Operational.
    pub fn disable_permit_join(&mut self) {
        if matches!(self.state, PairingState::Operational) {
            return;
        }
        if self.binding.active {
            self.complete_binding(BindingResult::InternalError);
        }
        self.permit_deadline.clear();
        self.discovery.purge_non_bound();
        self.state = PairingState::Operational;
        info!("permit-join closed");
        self.observer.permit_join_changed(false, 0);
    }

    /// Feeds an observed advertisement into the discovery table. Dropped outright while
    /// permit-join is closed.
    pub fn on_advertisement(&mut self, msg: AdvertisementMessage) -> Option<ObserveOutcome> {
        if !matches!(self.state, PairingState::DiscoveryActive | PairingState::Binding) {
            debug!(mac = %msg.mac, "advertisement dropped: permit-join closed");
            return None;
        }
        let now = self.clock.now_ms();
        let outcome = self.discovery.observe(
            msg.mac,
            msg.device_type,
            msg.firmware_version,
            msg.capabilities,
            msg.nonce,
            msg.sequence,
            msg.rssi_request,
            now,
        );
        match outcome {
            ObserveOutcome::Inserted => debug!(mac = %msg.mac, "advertisement: new node discovered"),
            ObserveOutcome::Refreshed => debug!(mac = %msg.mac, "advertisement: refreshed"),
            ObserveOutcome::DuplicateDropped => debug!(mac = %msg.mac, "advertisement: duplicate dropped"),
            ObserveOutcome::Rejected(reason) => warn!(mac = %msg.mac, ?reason, "advertisement: table full"),
        }
        Some(outcome)
    }

    /// Approves a discovered node, sending an Offer and entering `Binding`.
    pub fn approve(&mut self, mac: HwAddr) -> bool {
        if !matches!(self.state, PairingState::DiscoveryActive) {
            return false;
        }
        if self.binding.active {
            return false;
        }
        let Some(entry) = self.discovery.find(mac) else {
            return false;
        };
        if entry.state == NodeState::Bound {
            return false;
        }

        let now = self.clock.now_ms();
        let token = self.rng.random_u32();
        let assigned_tower_id = self.identity.next_tower_id;
        let offer = OfferMessage {
            version: PROTOCOL_VERSION,
            coord_mac: self.identity.coord_mac,
            coord_id: self.identity.coordinator_id,
            farm_id: self.identity.farm_id,
            offered_tower_id: assigned_tower_id,
            nonce_echo: entry.last_nonce,
            offer_token: token,
            channel: 0,
        };

        if !self.radio.send_offer(mac, offer) {
            warn!(%mac, "approve: send_offer failed, leaving node Discovered");
            return false;
        }

        self.binding = BindingAttempt {
            node_mac: mac,
            offer_token: token,
            assigned_tower_id,
            started_ms: now,
            accept_received: false,
            active: true,
        };
        self.discovery.update_state(mac, NodeState::OfferSent);
        self.discovery.set_offer_token(mac, token);
        self.state = PairingState::Binding;
        info!(%mac, offer_token = token, tower_id = assigned_tower_id, "binding started");
        if let Some(snapshot) = self.discovery.find(mac).copied() {
            self.observer.binding_started(snapshot);
        }
        true
    }

    /// Rejects a node: sends Reject(UserRejected), completes any binding to it, and
    /// removes it from the table.
    pub fn reject(&mut self, mac: HwAddr) -> bool {
        let Some(entry) = self.discovery.find(mac) else {
            return false;
        };
        let msg = crate::wire::RejectMessage {
            sender_mac: self.identity.coord_mac,
            reason_code: ReasonCode::UserRejected,
            offer_token: entry.offer_token,
        };
        if !self.radio.send_reject(mac, msg) {
            warn!(%mac, "reject: send_reject failed");
        }
        if self.binding.active && self.binding.node_mac == mac {
            self.complete_binding(BindingResult::NodeRejected);
        }
        self.discovery.remove(mac);
        true
    }

    /// Validates and applies an Accept per the five-field guard chain. Returns `false`
    /// without mutating state on any mismatch.
    pub fn on_accept(&mut self, msg: AcceptMessage) -> bool {
        if !self.binding.active {
            debug!("on_accept: no binding in progress");
            return false;
        }
        if msg.node_mac != self.binding.node_mac {
            debug!(mac = %msg.node_mac, "on_accept: mac mismatch");
            return false;
        }
        if msg.offer_token != self.binding.offer_token {
            debug!("on_accept: token mismatch");
            return false;
        }
        if msg.accepted_tower_id != self.binding.assigned_tower_id {
            debug!("on_accept: tower id mismatch");
            return false;
        }

        self.binding.accept_received = true;
        self.discovery.update_state(self.binding.node_mac, NodeState::Binding);

        let confirm = ConfirmMessage {
            coord_mac: self.identity.coord_mac,
            tower_id: self.binding.assigned_tower_id,
            encryption_key: [0u8; 16],
            config_flags: 0,
        };

        if !self.radio.send_confirm(self.binding.node_mac, confirm) {
            warn!("on_accept: send_confirm failed");
            self.complete_binding(BindingResult::InternalError);
            return false;
        }

        self.complete_binding(BindingResult::Success);
        true
    }

    /// Applies an Abort from the binding peer (or any peer carrying a zero token),
    /// completing the binding as `NodeAborted` and removing the entry.
    pub fn on_abort(&mut self, msg: AbortMessage) -> bool {
        if !self.binding.active {
            return false;
        }
        if msg.sender_mac != self.binding.node_mac {
            return false;
        }
        if msg.offer_token != self.binding.offer_token && self.binding.offer_token != 0 {
            return false;
        }
        let mac = self.binding.node_mac;
        self.complete_binding(BindingResult::NodeAborted);
        self.discovery.remove(mac);
        true
    }

    /// Advances the permit-join and binding-timeout deadlines; optionally sweeps stale
    /// discovery entries (see the design notes on why this implementation does so every
    /// call rather than on a separate cadence).
    pub fn tick(&mut self) {
        let now = self.clock.now_ms();

        if matches!(self.state, PairingState::DiscoveryActive) && self.permit_deadline.expired(now) {
            self.disable_permit_join();
        }

        if matches!(self.state, PairingState::Binding)
            && now.saturating_sub(self.binding.started_ms) >= self.config.binding_timeout_ms
        {
            self.binding_timeout();
        }

        let protect = self.binding.active.then_some(self.binding.node_mac);
        self.discovery.sweep(now, protect);
    }

    fn binding_timeout(&mut self) {
        let mac = self.binding.node_mac;
        let token = self.binding.offer_token;
        let msg = crate::wire::RejectMessage {
            sender_mac: self.identity.coord_mac,
            reason_code: ReasonCode::Timeout,
            offer_token: token,
        };
        if !self.radio.send_reject(mac, msg) {
            warn!(%mac, "binding_timeout: send_reject failed");
        }
        info!(%mac, "binding timed out");
        self.complete_binding(BindingResult::Timeout);
    }

    fn complete_binding(&mut self, result: BindingResult) {
        let mac = self.binding.node_mac;
        match result {
            BindingResult::Success => {
                self.discovery.update_state(mac, NodeState::Bound);
                self.identity.next_tower_id = self.identity.next_tower_id.wrapping_add(1);
            }
            _ => {
                self.discovery.update_state(mac, NodeState::Failed);
            }
        }
        self.discovery.set_offer_token(mac, 0);
        let snapshot = self.discovery.find(mac).copied();
        self.binding = BindingAttempt::default();

        self.state = if self.permit_deadline.running() {
            PairingState::DiscoveryActive
        } else {
            PairingState::Operational
        };

        if let Some(entry) = snapshot {
            info!(%mac, ?result, "binding completed");
            self.observer.binding_completed(entry, result);
        }
    }
}
