//! Error types for TLV parsing and encoding.

use thiserror::Error;

/// Errors that can occur during TLV parsing and encoding operations.
///
/// Parse and encode failures are fatal to the current call; no partial
/// node is ever returned.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// A declared length exceeds the available bytes (strict mode only;
    /// lenient mode clamps the length instead)
    #[error(
        "too few bytes to parse TLV value: available {available}, remaining {remaining}, requested {requested}"
    )]
    TooFewBytes {
        available: usize,
        remaining: usize,
        requested: usize,
    },

    /// Bytes remain after a complete top-level parse when exhaustive
    /// parsing was requested
    #[error("unparsed TLV bytes remain: total {total}, remaining {remaining}")]
    TrailingBytes { total: usize, remaining: usize },

    /// High-tag-number form (tag number >= 31) is unsupported
    #[error("unsupported tag form: high-tag-number form (tag number >= 31)")]
    UnsupportedTagForm,

    /// Value outside the 32-bit signed range for the minimal-integer helper
    #[error("integer {value} out of range for 32-bit encoding")]
    IntegerOverflow { value: i64 },

    /// An INTEGER wider than 32 bits cannot be decoded into an i32
    #[error("integer too wide: {bits} bits (max 32)")]
    IntegerTooWide { bits: u32 },

    /// Indefinite length on a non-constructed value (strict mode)
    #[error("indefinite length on a non-constructed value")]
    InvalidIndefiniteLength,

    /// Nesting exceeded the configured maximum depth
    #[error("maximum nesting depth {0} exceeded")]
    MaxDepthExceeded(usize),

    // BMPString errors
    #[error("BMPString: odd byte length {0}")]
    BmpStringOddLength(usize),
    #[error("BMPString: invalid UTF-16 data")]
    BmpStringInvalidUtf16,
    #[error("BMPString: value is not valid UTF-8 text")]
    BmpStringInvalidUtf8,

    /// Underlying buffer operation failed
    #[error("buffer: {0}")]
    Buffer(#[from] bytebuf::error::Error),
}
