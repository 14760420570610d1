//! Encoder trait for type-safe conversions in the encode direction.
//!
//! Mirror of the [`crate::decoder`] pattern: `Encoder<T, E>` performs the
//! conversion and `EncodableTo<T>` marks which destination types are valid.

/// Encoder trait for converting `self` into type `E`.
pub trait Encoder<T, E: EncodableTo<T>> {
    /// The error type returned when encoding fails.
    type Error;

    /// Encodes `self` into type `E`.
    fn encode(&self) -> Result<E, Self::Error>;
}

/// Marker trait indicating that type `E` can be encoded from type `T`.
pub trait EncodableTo<T> {}
