//! Collaborator capabilities the host supplies to [`crate::pairing::PairingCoordinator`].
//!
//! Modelled as traits and generic parameters rather than trait objects, so the hot path
//! (tick, on_accept) never pays for dynamic dispatch. A host that has no real transport
//! yet can still build a coordinator against fakes implementing these traits.

use crate::hw_addr::HwAddr;
use crate::wire::{ConfirmMessage, OfferMessage, RejectMessage};
use thiserror::Error;

/// Sends outbound pairing frames to the radio. All methods are synchronous and return
/// whether the frame was accepted for transmission — a host that wants asynchronous
/// delivery must queue internally and only report `true` once the frame is committed.
pub trait PairingRadio {
    fn send_offer(&mut self, dest_mac: HwAddr, msg: OfferMessage) -> bool;
    fn send_confirm(&mut self, dest_mac: HwAddr, msg: ConfirmMessage) -> bool;
    fn send_reject(&mut self, dest_mac: HwAddr, msg: RejectMessage) -> bool;
}

/// Binding outcome reported through [`PairingObserver::binding_completed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingResult {
    Success,
    Timeout,
    NodeRejected,
    NodeAborted,
    InternalError,
}

/// Event sink for operator-visible state changes. Never returns a value the core acts
/// on — a host that wants to veto a transition must do so before issuing the call that
/// triggers it.
pub trait PairingObserver {
    fn permit_join_changed(&mut self, open: bool, remaining_ms: u64);
    fn binding_started(&mut self, entry: crate::discovery::DiscoveredNode);
    fn binding_completed(&mut self, entry: crate::discovery::DiscoveredNode, result: BindingResult);
}

/// Monotonic millisecond clock, independent of wall-clock time.
pub trait PairingClock {
    fn now_ms(&self) -> u64;
}

/// Error constructing a host RNG. Never produced by the core itself — the core requires
/// a working generator at construction time and has no weaker fallback.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RngError {
    #[error("failed to initialize a source of randomness")]
    Unavailable,
}

/// Source of 32-bit offer tokens. Implementations SHOULD be backed by an OS/hardware
/// generator; the core treats this trait as the only source of randomness it uses.
pub trait PairingRng {
    fn random_u32(&mut self) -> u32;
}

/// Default [`PairingRng`] backed by `rand`'s thread-local generator.
#[derive(Debug, Default)]
pub struct OsPairingRng;

impl OsPairingRng {
    pub fn new() -> Result<Self, RngError> {
        Ok(Self)
    }
}

impl PairingRng for OsPairingRng {
    fn random_u32(&mut self) -> u32 {
        rand::random()
    }
}

/// Default [`PairingClock`] backed by [`std::time::Instant`], anchored at construction.
#[derive(Debug)]
pub struct MonotonicClock {
    start: std::time::Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { start: std::time::Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PairingClock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
