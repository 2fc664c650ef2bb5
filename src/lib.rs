pub mod config;
pub mod discovery;
pub mod error;
pub mod hooks;
pub mod hw_addr;
pub mod pairing;
pub mod timer;
pub mod wire;

pub use config::{CoordinatorIdentity, PairingConfig};
pub use discovery::{DiscoveredNode, DiscoveryTable, NodeState, ObserveOutcome};
pub use error::DecodeError;
pub use hooks::{BindingResult, MonotonicClock, OsPairingRng, PairingClock, PairingObserver, PairingRadio, PairingRng, RngError};
pub use hw_addr::HwAddr;
pub use pairing::{PairingCoordinator, PairingState};
pub use timer::DeadlineTimer;
pub use wire::{
    AbortMessage, AcceptMessage, AdvertisementMessage, Capabilities, ConfirmMessage, DeviceType,
    FirmwareVersion, OfferMessage, PairingMessage, ReasonCode, RejectMessage, PROTOCOL_VERSION,
};
