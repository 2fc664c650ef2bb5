//! Fixed-layout little-endian wire codec for the six pairing message variants.
//!
//! Every message is framed as `[type_tag:u8][fixed_body]`. Multi-byte integers are
//! little-endian and unaligned on the wire — decoders must not assume alignment.

use crate::error::DecodeError;
use crate::hw_addr::HwAddr;

/// Protocol version carried in `Advertisement`/`Offer`.
pub const PROTOCOL_VERSION: u8 = 0x02;

const TAG_ADVERTISEMENT: u8 = 0x20;
const TAG_OFFER: u8 = 0x21;
const TAG_ACCEPT: u8 = 0x22;
const TAG_CONFIRM: u8 = 0x23;
const TAG_REJECT: u8 = 0x24;
const TAG_ABORT: u8 = 0x25;

const BODY_ADVERTISEMENT: usize = 21;
const BODY_OFFER: usize = 22;
const BODY_ACCEPT: usize = 12;
const BODY_CONFIRM: usize = 25;
const BODY_REJECT: usize = 11;
const BODY_ABORT: usize = 11;

/// Device category reported in an advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum DeviceType {
    Unknown = 0,
    Tower = 1,
    Sensor = 2,
    LightNode = 3,
    Coordinator = 4,
}

impl DeviceType {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => DeviceType::Tower,
            2 => DeviceType::Sensor,
            3 => DeviceType::LightNode,
            4 => DeviceType::Coordinator,
            _ => DeviceType::Unknown,
        }
    }

    fn as_u8(self) -> u8 {
        self as u8
    }
}

bitflags::bitflags! {
    /// Capability bitmask advertised by a node. Unrecognized bits are reserved and
    /// round-trip transparently rather than being rejected.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u16 {
        const DHT             = 1 << 0;
        const LIGHT_SENSOR     = 1 << 1;
        const PUMP_RELAY       = 1 << 2;
        const GROW_LIGHT       = 1 << 3;
        const RGBW             = 1 << 4;
        const DEEP_SLEEP       = 1 << 5;
        const BUTTON           = 1 << 6;
        const I2C_TEMP         = 1 << 7;
        const PRESENCE_SENSOR  = 1 << 8;
        const BATTERY          = 1 << 9;
    }
}

/// Packed `major:8 | minor:8 | patch:16` firmware version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u16,
}

impl FirmwareVersion {
    pub fn new(major: u8, minor: u8, patch: u16) -> Self {
        Self { major, minor, patch }
    }

    pub fn pack(self) -> u32 {
        ((self.major as u32) << 24) | ((self.minor as u32) << 16) | (self.patch as u32)
    }

    pub fn unpack(packed: u32) -> Self {
        Self {
            major: (packed >> 24) as u8,
            minor: (packed >> 16) as u8,
            patch: (packed & 0xFFFF) as u16,
        }
    }
}

/// Reason carried by `Reject`/`Abort`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum ReasonCode {
    None = 0,
    PermitJoinDisabled = 1,
    CapacityFull = 2,
    DuplicateMac = 3,
    Timeout = 4,
    UserRejected = 5,
    ProtocolMismatch = 6,
    InternalError = 7,
    NodeCancelled = 8,
    InvalidToken = 9,
    AlreadyPaired = 10,
}

impl ReasonCode {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ReasonCode::PermitJoinDisabled,
            2 => ReasonCode::CapacityFull,
            3 => ReasonCode::DuplicateMac,
            4 => ReasonCode::Timeout,
            5 => ReasonCode::UserRejected,
            6 => ReasonCode::ProtocolMismatch,
            7 => ReasonCode::InternalError,
            8 => ReasonCode::NodeCancelled,
            9 => ReasonCode::InvalidToken,
            10 => ReasonCode::AlreadyPaired,
            _ => ReasonCode::None,
        }
    }

    fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisementMessage {
    pub version: u8,
    pub mac: HwAddr,
    pub device_type: DeviceType,
    pub firmware_version: u32,
    pub capabilities: Capabilities,
    pub nonce: u32,
    pub sequence: u16,
    pub rssi_request: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferMessage {
    pub version: u8,
    pub coord_mac: HwAddr,
    pub coord_id: u16,
    pub farm_id: u16,
    pub offered_tower_id: u16,
    pub nonce_echo: u32,
    pub offer_token: u32,
    pub channel: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptMessage {
    pub node_mac: HwAddr,
    pub offer_token: u32,
    pub accepted_tower_id: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmMessage {
    pub coord_mac: HwAddr,
    pub tower_id: u16,
    pub encryption_key: [u8; 16],
    pub config_flags: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectMessage {
    pub sender_mac: HwAddr,
    pub reason_code: ReasonCode,
    pub offer_token: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortMessage {
    pub sender_mac: HwAddr,
    pub reason_code: ReasonCode,
    pub offer_token: u32,
}

/// A decoded pairing message, tagged by wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingMessage {
    Advertisement(AdvertisementMessage),
    Offer(OfferMessage),
    Accept(AcceptMessage),
    Confirm(ConfirmMessage),
    Reject(RejectMessage),
    Abort(AbortMessage),
}

impl PairingMessage {
    pub fn command(&self) -> &'static str {
        match self {
            PairingMessage::Advertisement(_) => "advertisement",
            PairingMessage::Offer(_) => "offer",
            PairingMessage::Accept(_) => "accept",
            PairingMessage::Confirm(_) => "confirm",
            PairingMessage::Reject(_) => "reject",
            PairingMessage::Abort(_) => "abort",
        }
    }

    /// Encode into a freshly allocated buffer, tag byte first.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            PairingMessage::Advertisement(m) => encode_advertisement(m),
            PairingMessage::Offer(m) => encode_offer(m),
            PairingMessage::Accept(m) => encode_accept(m),
            PairingMessage::Confirm(m) => encode_confirm(m),
            PairingMessage::Reject(m) => encode_reject(m),
            PairingMessage::Abort(m) => encode_abort(m),
        }
    }

    /// Decode a tagged frame. Returns [`DecodeError::UnknownTag`] for any tag
    /// outside `0x20..=0x25` — callers must route those to a non-pairing handler.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let Some((&tag, body)) = buf.split_first() else {
            return Err(DecodeError::UnknownTag(0));
        };
        match tag {
            TAG_ADVERTISEMENT => decode_advertisement(body).map(PairingMessage::Advertisement),
            TAG_OFFER => decode_offer(body).map(PairingMessage::Offer),
            TAG_ACCEPT => decode_accept(body).map(PairingMessage::Accept),
            TAG_CONFIRM => decode_confirm(body).map(PairingMessage::Confirm),
            TAG_REJECT => decode_reject(body).map(PairingMessage::Reject),
            TAG_ABORT => decode_abort(body).map(PairingMessage::Abort),
            other => Err(DecodeError::UnknownTag(other)),
        }
    }
}

fn need(tag: u8, body: &[u8], need: usize) -> Result<(), DecodeError> {
    if body.len() < need {
        Err(DecodeError::TooShort { tag, have: body.len(), need })
    } else {
        Ok(())
    }
}

fn encode_advertisement(m: &AdvertisementMessage) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + BODY_ADVERTISEMENT);
    out.push(TAG_ADVERTISEMENT);
    out.push(m.version);
    out.extend_from_slice(m.mac.as_bytes());
    out.push(m.device_type.as_u8());
    out.extend_from_slice(&m.firmware_version.to_le_bytes());
    out.extend_from_slice(&m.capabilities.bits().to_le_bytes());
    out.extend_from_slice(&m.nonce.to_le_bytes());
    out.extend_from_slice(&m.sequence.to_le_bytes());
    out.push(m.rssi_request as u8);
    out
}

fn decode_advertisement(body: &[u8]) -> Result<AdvertisementMessage, DecodeError> {
    need(TAG_ADVERTISEMENT, body, BODY_ADVERTISEMENT)?;
    Ok(AdvertisementMessage {
        version: body[0],
        mac: HwAddr::new(body[1..7].try_into().unwrap()),
        device_type: DeviceType::from_u8(body[7]),
        firmware_version: u32::from_le_bytes(body[8..12].try_into().unwrap()),
        capabilities: Capabilities::from_bits_retain(u16::from_le_bytes(
            body[12..14].try_into().unwrap(),
        )),
        nonce: u32::from_le_bytes(body[14..18].try_into().unwrap()),
        sequence: u16::from_le_bytes(body[18..20].try_into().unwrap()),
        rssi_request: body[20] as i8,
    })
}

fn encode_offer(m: &OfferMessage) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + BODY_OFFER);
    out.push(TAG_OFFER);
    out.push(m.version);
    out.extend_from_slice(m.coord_mac.as_bytes());
    out.extend_from_slice(&m.coord_id.to_le_bytes());
    out.extend_from_slice(&m.farm_id.to_le_bytes());
    out.extend_from_slice(&m.offered_tower_id.to_le_bytes());
    out.extend_from_slice(&m.nonce_echo.to_le_bytes());
    out.extend_from_slice(&m.offer_token.to_le_bytes());
    out.push(m.channel);
    out
}

fn decode_offer(body: &[u8]) -> Result<OfferMessage, DecodeError> {
    need(TAG_OFFER, body, BODY_OFFER)?;
    Ok(OfferMessage {
        version: body[0],
        coord_mac: HwAddr::new(body[1..7].try_into().unwrap()),
        coord_id: u16::from_le_bytes(body[7..9].try_into().unwrap()),
        farm_id: u16::from_le_bytes(body[9..11].try_into().unwrap()),
        offered_tower_id: u16::from_le_bytes(body[11..13].try_into().unwrap()),
        nonce_echo: u32::from_le_bytes(body[13..17].try_into().unwrap()),
        offer_token: u32::from_le_bytes(body[17..21].try_into().unwrap()),
        channel: body[21],
    })
}

fn encode_accept(m: &AcceptMessage) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + BODY_ACCEPT);
    out.push(TAG_ACCEPT);
    out.extend_from_slice(m.node_mac.as_bytes());
    out.extend_from_slice(&m.offer_token.to_le_bytes());
    out.extend_from_slice(&m.accepted_tower_id.to_le_bytes());
    out
}

fn decode_accept(body: &[u8]) -> Result<AcceptMessage, DecodeError> {
    need(TAG_ACCEPT, body, BODY_ACCEPT)?;
    Ok(AcceptMessage {
        node_mac: HwAddr::new(body[0..6].try_into().unwrap()),
        offer_token: u32::from_le_bytes(body[6..10].try_into().unwrap()),
        accepted_tower_id: u16::from_le_bytes(body[10..12].try_into().unwrap()),
    })
}

fn encode_confirm(m: &ConfirmMessage) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + BODY_CONFIRM);
    out.push(TAG_CONFIRM);
    out.extend_from_slice(m.coord_mac.as_bytes());
    out.extend_from_slice(&m.tower_id.to_le_bytes());
    out.extend_from_slice(&m.encryption_key);
    out.push(m.config_flags);
    out
}

fn decode_confirm(body: &[u8]) -> Result<ConfirmMessage, DecodeError> {
    need(TAG_CONFIRM, body, BODY_CONFIRM)?;
    Ok(ConfirmMessage {
        coord_mac: HwAddr::new(body[0..6].try_into().unwrap()),
        tower_id: u16::from_le_bytes(body[6..8].try_into().unwrap()),
        encryption_key: body[8..24].try_into().unwrap(),
        config_flags: body[24],
    })
}

fn encode_reject(m: &RejectMessage) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + BODY_REJECT);
    out.push(TAG_REJECT);
    out.extend_from_slice(m.sender_mac.as_bytes());
    out.push(m.reason_code.as_u8());
    out.extend_from_slice(&m.offer_token.to_le_bytes());
    out
}

fn decode_reject(body: &[u8]) -> Result<RejectMessage, DecodeError> {
    need(TAG_REJECT, body, BODY_REJECT)?;
    Ok(RejectMessage {
        sender_mac: HwAddr::new(body[0..6].try_into().unwrap()),
        reason_code: ReasonCode::from_u8(body[6]),
        offer_token: u32::from_le_bytes(body[7..11].try_into().unwrap()),
    })
}

fn encode_abort(m: &AbortMessage) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + BODY_ABORT);
    out.push(TAG_ABORT);
    out.extend_from_slice(m.sender_mac.as_bytes());
    out.push(m.reason_code.as_u8());
    out.extend_from_slice(&m.offer_token.to_le_bytes());
    out
}

fn decode_abort(body: &[u8]) -> Result<AbortMessage, DecodeError> {
    need(TAG_ABORT, body, BODY_ABORT)?;
    Ok(AbortMessage {
        sender_mac: HwAddr::new(body[0..6].try_into().unwrap()),
        reason_code: ReasonCode::from_u8(body[6]),
        offer_token: u32::from_le_bytes(body[7..11].try_into().unwrap()),
    })
}
