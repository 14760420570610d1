use base64::DecodeError;
use thiserror::Error;

/// Errors that can occur when reading from or writing to a [`crate::ByteBuffer`].
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// A read requested more bytes than the unread region holds
    #[error("too few bytes: available {available}, requested {requested}")]
    TooFewBytes { available: usize, requested: usize },

    /// Integer width outside the supported set (8, 16, 24, 32)
    #[error("invalid bit width: {0} (must be 8, 16, 24 or 32)")]
    InvalidBitWidth(u32),

    /// Random access past the end of the unread region
    #[error("index out of range: {index} (unread length {length})")]
    IndexOutOfRange { index: usize, length: usize },

    /// Failed to decode a hex string
    #[error("hex decode: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// Failed to decode base64 data
    #[error("base64 decode: {0}")]
    Base64Decode(#[from] DecodeError),
}
