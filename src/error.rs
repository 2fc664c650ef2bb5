//! Decode-time error taxonomy for the wire codec.

use thiserror::Error;

/// Failure to parse a [`crate::wire::PairingMessage`] from a byte buffer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("buffer too short for tag {tag:#04x}: have {have}, need {need}")]
    TooShort { tag: u8, have: usize, need: usize },

    #[error("unknown pairing message tag {0:#04x}")]
    UnknownTag(u8),
}
