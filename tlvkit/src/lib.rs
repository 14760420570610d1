//! # tlvkit
//!
//! Core traits for encoding and decoding in the tlvkit codec workspace.
//!
//! This crate defines the fundamental `Decoder` and `Encoder` traits that
//! establish a type-safe conversion pattern used throughout the workspace.
//!
//! ## Overview
//!
//! The conversion pattern flows like this:
//! ```text
//! Vec<u8> → ByteBuffer → Node → captured fields
//! ```
//!
//! Each step uses the `Decoder` trait to convert from one type to the next,
//! and the `Encoder` trait to convert in the reverse direction.
//!
//! ## Type Safety
//!
//! The traits use marker traits (`DecodableFrom` and `EncodableTo`) to ensure
//! type safety at compile time. This prevents invalid conversions and catches
//! errors early in the development process.
//!
//! ## Example
//!
//! The following example demonstrates the decoding pattern. The concrete
//! implementations live in the `tlv` crate:
//!
//! ```ignore
//! use tlvkit::decoder::Decoder;
//! use tlv::Node;
//!
//! // Decode raw bytes to a TLV tree
//! let bytes = vec![0x30, 0x00];
//! let node: Node = bytes.decode().unwrap();
//! ```
//!
//! Encoding works in the reverse direction:
//!
//! ```ignore
//! use tlvkit::encoder::Encoder;
//! use tlv::Node;
//!
//! // Encode a TLV tree back to bytes
//! let bytes: Vec<u8> = node.encode().unwrap();
//! ```

#![forbid(unsafe_code)]

pub mod decoder;
pub mod encoder;
