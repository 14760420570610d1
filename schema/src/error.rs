use thiserror::Error;

/// Hard failures during validation.
///
/// Ordinary mismatches are not errors; they are reported through the
/// diagnostics list on [`crate::Report`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A BIT STRING value capture was requested but the unused-bits
    /// counter is nonzero
    #[error("BIT STRING value capture requires zero unused bits, got {unused_bits}")]
    UnsupportedBitAlignment { unused_bits: u8 },
}
