//! End-to-end pairing scenarios driven entirely through the public API with fakes
//! standing in for the radio, clock, RNG, and event sink.

use std::cell::RefCell;
use std::rc::Rc;

use pairing_coordinator::{
    AbortMessage, AcceptMessage, AdvertisementMessage, BindingResult, Capabilities,
    ConfirmMessage, CoordinatorIdentity, DeviceType, DiscoveredNode, HwAddr, NodeState,
    OfferMessage, PairingClock, PairingConfig, PairingCoordinator, PairingObserver, PairingRadio,
    PairingRng, PairingState, ReasonCode, RejectMessage, PROTOCOL_VERSION,
};

#[derive(Default)]
struct FakeRadio {
    offers: Vec<(HwAddr, OfferMessage)>,
    confirms: Vec<(HwAddr, ConfirmMessage)>,
    rejects: Vec<(HwAddr, RejectMessage)>,
}

impl PairingRadio for FakeRadio {
    fn send_offer(&mut self, dest_mac: HwAddr, msg: OfferMessage) -> bool {
        self.offers.push((dest_mac, msg));
        true
    }
    fn send_confirm(&mut self, dest_mac: HwAddr, msg: ConfirmMessage) -> bool {
        self.confirms.push((dest_mac, msg));
        true
    }
    fn send_reject(&mut self, dest_mac: HwAddr, msg: RejectMessage) -> bool {
        self.rejects.push((dest_mac, msg));
        true
    }
}

#[derive(Default)]
struct FakeObserver {
    permit_events: Vec<(bool, u64)>,
    started: Vec<DiscoveredNode>,
    completed: Vec<(DiscoveredNode, BindingResult)>,
}

impl PairingObserver for FakeObserver {
    fn permit_join_changed(&mut self, open: bool, remaining_ms: u64) {
        self.permit_events.push((open, remaining_ms));
    }
    fn binding_started(&mut self, entry: DiscoveredNode) {
        self.started.push(entry);
    }
    fn binding_completed(&mut self, entry: DiscoveredNode, result: BindingResult) {
        self.completed.push((entry, result));
    }
}

struct FakeClock(Rc<RefCell<u64>>);
impl PairingClock for FakeClock {
    fn now_ms(&self) -> u64 {
        *self.0.borrow()
    }
}

struct FixedRng(u32);
impl PairingRng for FixedRng {
    fn random_u32(&mut self) -> u32 {
        self.0
    }
}

fn node_mac() -> HwAddr {
    HwAddr::new([0x10, 0x20, 0x30, 0x40, 0x50, 0x60])
}

fn coord_mac() -> HwAddr {
    HwAddr::new([0xAA; 6])
}

fn advertisement(mac: HwAddr, nonce: u32, sequence: u16) -> AdvertisementMessage {
    AdvertisementMessage {
        version: PROTOCOL_VERSION,
        mac,
        device_type: DeviceType::Tower,
        firmware_version: 0,
        capabilities: Capabilities::DHT,
        nonce,
        sequence,
        rssi_request: -55,
    }
}

fn new_coordinator(
    now: Rc<RefCell<u64>>,
    token: u32,
) -> PairingCoordinator<FakeRadio, FakeObserver, FakeClock, FixedRng> {
    let identity = CoordinatorIdentity::new(coord_mac(), 0x1000, 0x0001);
    PairingCoordinator::new(
        PairingConfig::default(),
        identity,
        FakeRadio::default(),
        FakeObserver::default(),
        FakeClock(now),
        FixedRng(token),
    )
}

#[test]
fn scenario_1_happy_path_binds_and_advances_tower_id() {
    let now = Rc::new(RefCell::new(0));
    let mut coordinator = new_coordinator(now.clone(), 0x4242_4242);

    assert!(coordinator.enable_permit_join(60_000));
    coordinator.on_advertisement(advertisement(node_mac(), 0xDEAD_BEEF, 1));
    assert!(coordinator.approve(node_mac()));
    assert_eq!(coordinator.state(), PairingState::Binding);

    let accepted = coordinator.on_accept(AcceptMessage {
        node_mac: node_mac(),
        offer_token: 0x4242_4242,
        accepted_tower_id: 1,
    });

    assert!(accepted);
    assert_eq!(coordinator.state(), PairingState::DiscoveryActive);
    assert_eq!(coordinator.next_tower_id(), 2);
    assert_eq!(coordinator.find_node(node_mac()).unwrap().state, NodeState::Bound);
}

#[test]
fn scenario_2_token_mismatch_falls_through_to_timeout() {
    let now = Rc::new(RefCell::new(0));
    let mut coordinator = new_coordinator(now.clone(), 0x1111_1111);
    coordinator.enable_permit_join(60_000);
    coordinator.on_advertisement(advertisement(node_mac(), 0xDEAD_BEEF, 1));
    coordinator.approve(node_mac());

    let accepted = coordinator.on_accept(AcceptMessage {
        node_mac: node_mac(),
        offer_token: 0x1111_1112,
        accepted_tower_id: 1,
    });
    assert!(!accepted);
    assert_eq!(coordinator.state(), PairingState::Binding);

    *now.borrow_mut() = 10_000;
    coordinator.tick();

    assert_eq!(coordinator.state(), PairingState::DiscoveryActive);
    assert_eq!(coordinator.next_tower_id(), 1);
}

#[test]
fn scenario_3_capacity_full_evicts_stale_entry() {
    let now = Rc::new(RefCell::new(0));
    let mut coordinator = new_coordinator(now.clone(), 1);
    coordinator.enable_permit_join(300_000);

    for i in 0..32u8 {
        coordinator.on_advertisement(advertisement(HwAddr::new([0, 0, 0, 0, 0, i]), i as u32, 1));
    }

    *now.borrow_mut() = 30_001;
    let new_mac = HwAddr::new([1, 2, 3, 4, 5, 6]);
    let outcome = coordinator.on_advertisement(advertisement(new_mac, 999, 1));

    assert!(outcome.is_some());
    assert!(coordinator.find_node(new_mac).is_some());
}

#[test]
fn scenario_4_disable_during_binding_completes_with_internal_error_and_no_reject() {
    let now = Rc::new(RefCell::new(0));
    let mut coordinator = new_coordinator(now.clone(), 0xAAAA_AAAA);
    coordinator.enable_permit_join(60_000);
    coordinator.on_advertisement(advertisement(node_mac(), 0xDEAD_BEEF, 1));
    coordinator.approve(node_mac());

    coordinator.disable_permit_join();

    assert_eq!(coordinator.state(), PairingState::Operational);
    assert!(coordinator.find_node(node_mac()).is_none());
}

#[test]
fn scenario_5_duplicate_advertisement_is_dropped_without_touching_last_seen() {
    let now = Rc::new(RefCell::new(0));
    let mut coordinator = new_coordinator(now.clone(), 1);
    coordinator.enable_permit_join(60_000);
    coordinator.on_advertisement(advertisement(node_mac(), 0xDEAD_BEEF, 1));

    *now.borrow_mut() = 500;
    coordinator.on_advertisement(advertisement(node_mac(), 0xDEAD_BEEF, 1));

    assert_eq!(coordinator.find_node(node_mac()).unwrap().last_seen_ms, 0);
}

#[test]
fn scenario_6_reject_in_flight_removes_entry_and_reopens_discovery() {
    let now = Rc::new(RefCell::new(0));
    let mut coordinator = new_coordinator(now.clone(), 0xBEEF_BEEF);
    coordinator.enable_permit_join(60_000);
    coordinator.on_advertisement(advertisement(node_mac(), 0xDEAD_BEEF, 1));
    coordinator.approve(node_mac());

    assert!(coordinator.reject(node_mac()));

    assert!(coordinator.find_node(node_mac()).is_none());
    assert_eq!(coordinator.state(), PairingState::DiscoveryActive);
}

#[test]
fn abort_from_binding_peer_completes_and_removes_entry() {
    let now = Rc::new(RefCell::new(0));
    let mut coordinator = new_coordinator(now.clone(), 77);
    coordinator.enable_permit_join(60_000);
    coordinator.on_advertisement(advertisement(node_mac(), 42, 1));
    coordinator.approve(node_mac());

    let accepted = coordinator.on_abort(AbortMessage {
        sender_mac: node_mac(),
        reason_code: ReasonCode::NodeCancelled,
        offer_token: 77,
    });

    assert!(accepted);
    assert!(coordinator.find_node(node_mac()).is_none());
    assert_eq!(coordinator.state(), PairingState::DiscoveryActive);
}

#[test]
fn permit_join_duration_beyond_maximum_clamps_exactly() {
    let now = Rc::new(RefCell::new(0));
    let mut coordinator = new_coordinator(now, 1);
    coordinator.enable_permit_join(10_000_000);
    assert_eq!(coordinator.permit_join_remaining_ms(), 300_000);
}

#[test]
fn reenabling_while_active_extends_deadline_without_transition() {
    let now = Rc::new(RefCell::new(0));
    let mut coordinator = new_coordinator(now.clone(), 1);
    coordinator.enable_permit_join(10_000);
    assert_eq!(coordinator.state(), PairingState::DiscoveryActive);

    *now.borrow_mut() = 5_000;
    coordinator.enable_permit_join(10_000);

    assert_eq!(coordinator.state(), PairingState::DiscoveryActive);
    assert_eq!(coordinator.permit_join_remaining_ms(), 10_000);
}

#[test]
fn exclusive_binding_invariant_holds_across_two_candidates() {
    let now = Rc::new(RefCell::new(0));
    let mut coordinator = new_coordinator(now, 1);
    coordinator.enable_permit_join(60_000);
    coordinator.on_advertisement(advertisement(node_mac(), 1, 1));
    assert!(coordinator.approve(node_mac()));

    let other = HwAddr::new([9, 9, 9, 9, 9, 9]);
    coordinator.on_advertisement(advertisement(other, 1, 1));
    assert!(!coordinator.approve(other));
}
