//! BER/DER tag-length-value codec.
//!
//! [`from_der`] parses an untrusted byte stream into a [`Node`] tree and
//! [`to_der`] re-encodes a tree into canonical bytes. Parsing follows the
//! X.690 TLV rules for low tag numbers (0-30): short- and long-form
//! definite lengths, indefinite length terminated by two zero bytes, and
//! an optional speculative re-decode of BIT STRING contents as nested TLV.
//!
//! ```
//! use tlv::{from_der, to_der, ParseOptions};
//!
//! let bytes = vec![0x30, 0x03, 0x02, 0x01, 0x05]; // SEQUENCE { INTEGER 5 }
//! let node = from_der(&bytes, ParseOptions::default()).unwrap();
//! assert_eq!(bytes, to_der(&node).unwrap().bytes(None));
//! ```

pub mod error;

use std::fmt::{self, Display};

use bytebuf::ByteBuffer;
use error::Error;
use serde::{Serialize, Serializer, ser::SerializeStruct};
use tlvkit::decoder::{DecodableFrom, Decoder};
use tlvkit::encoder::{EncodableTo, Encoder};

/// Bit 6 of the tag byte: constructed (vs. primitive) encoding.
pub const TAG_CONSTRUCTED: u8 = 0x20;

/// UNIVERSAL class tag numbers.
pub mod universal {
    pub const BOOLEAN: u8 = 0x01;
    pub const INTEGER: u8 = 0x02;
    pub const BIT_STRING: u8 = 0x03;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const UTF8_STRING: u8 = 0x0c;
    pub const SEQUENCE: u8 = 0x10;
    pub const SET: u8 = 0x11;
    pub const PRINTABLE_STRING: u8 = 0x13;
    pub const IA5_STRING: u8 = 0x16;
    pub const UTC_TIME: u8 = 0x17;
    pub const GENERALIZED_TIME: u8 = 0x18;
    pub const BMP_STRING: u8 = 0x1e;
}

/// Tag class: bits 7-8 of the tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TagClass {
    Universal = 0x00,
    Application = 0x40,
    ContextSpecific = 0x80,
    Private = 0xC0,
}

impl TagClass {
    /// Extracts the tag class from a tag byte.
    pub fn from_bits(b: u8) -> Self {
        match b & 0xc0 {
            0x00 => TagClass::Universal,
            0x40 => TagClass::Application,
            0x80 => TagClass::ContextSpecific,
            _ => TagClass::Private,
        }
    }
}

impl Display for TagClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagClass::Universal => write!(f, "UNIVERSAL"),
            TagClass::Application => write!(f, "APPLICATION"),
            TagClass::ContextSpecific => write!(f, "CONTEXT_SPECIFIC"),
            TagClass::Private => write!(f, "PRIVATE"),
        }
    }
}

impl Serialize for TagClass {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// The value of a node: raw bytes for primitives, ordered children for
/// composed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Primitive(Vec<u8>),
    Constructed(Vec<Node>),
}

impl Value {
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Value::Primitive(data) => Some(data),
            Value::Constructed(_) => None,
        }
    }

    pub fn children(&self) -> Option<&[Node]> {
        match self {
            Value::Primitive(_) => None,
            Value::Constructed(children) => Some(children),
        }
    }
}

/// A parsed or constructed TLV tree element.
///
/// `composed` is derived: a node is composed when it is constructed or its
/// value is a child list. The latter happens without the constructed flag
/// when a primitive BIT STRING was reinterpreted as holding nested TLV
/// (see [`from_der`]).
#[derive(Debug, Clone)]
pub struct Node {
    tag_class: TagClass,
    tag_number: u8,
    constructed: bool,
    value: Value,
    /// Raw BIT STRING contents including the leading unused-bits counter,
    /// preserved for verbatim re-encoding.
    bit_string_contents: Option<Vec<u8>>,
    /// Snapshot taken when `bit_string_contents` was supplied; used only to
    /// detect post-parse mutation.
    original: Option<Box<Node>>,
}

impl Node {
    /// Creates a node. The constructed flag and the value shape are
    /// independent: a decoded BIT STRING carries children while staying
    /// non-constructed.
    pub fn new(tag_class: TagClass, tag_number: u8, constructed: bool, value: Value) -> Self {
        Node {
            tag_class,
            tag_number,
            constructed,
            value,
            bit_string_contents: None,
            original: None,
        }
    }

    /// Creates a primitive node holding raw bytes.
    pub fn primitive(tag_class: TagClass, tag_number: u8, data: Vec<u8>) -> Self {
        Node::new(tag_class, tag_number, false, Value::Primitive(data))
    }

    /// Creates a constructed node holding children.
    pub fn constructed(tag_class: TagClass, tag_number: u8, children: Vec<Node>) -> Self {
        Node::new(tag_class, tag_number, true, Value::Constructed(children))
    }

    /// Attaches raw BIT STRING contents (including the unused-bits counter)
    /// and takes the mutation-detection snapshot.
    pub fn with_bit_string_contents(mut self, contents: Vec<u8>) -> Self {
        self.bit_string_contents = Some(contents);
        let snapshot = self.clone();
        self.original = Some(Box::new(snapshot));
        self
    }

    pub fn tag_class(&self) -> TagClass {
        self.tag_class
    }

    pub fn tag_number(&self) -> u8 {
        self.tag_number
    }

    pub fn is_constructed(&self) -> bool {
        self.constructed
    }

    /// True iff the node is constructed or its value is a child list.
    pub fn is_composed(&self) -> bool {
        self.constructed || matches!(self.value, Value::Constructed(_))
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    /// Raw bytes of a primitive value.
    pub fn data(&self) -> Option<&[u8]> {
        self.value.data()
    }

    /// Children of a composed value.
    pub fn children(&self) -> Option<&[Node]> {
        self.value.children()
    }

    pub fn bit_string_contents(&self) -> Option<&[u8]> {
        self.bit_string_contents.as_deref()
    }

    /// Structural equality ignoring the snapshot and the raw BIT STRING
    /// contents. Change-detection utility, not a security primitive.
    pub fn structural_eq(&self, other: &Node) -> bool {
        self.eq_impl(other, false)
    }

    /// Structural equality that also compares the raw BIT STRING contents.
    pub fn structural_eq_with_contents(&self, other: &Node) -> bool {
        self.eq_impl(other, true)
    }

    fn eq_impl(&self, other: &Node, include_contents: bool) -> bool {
        if self.tag_class != other.tag_class
            || self.tag_number != other.tag_number
            || self.constructed != other.constructed
        {
            return false;
        }
        if include_contents && self.bit_string_contents != other.bit_string_contents {
            return false;
        }
        match (&self.value, &other.value) {
            (Value::Primitive(a), Value::Primitive(b)) => a == b,
            (Value::Constructed(a), Value::Constructed(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(x, y)| x.eq_impl(y, include_contents))
            }
            _ => false,
        }
    }

    fn fmt_at(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        write!(
            f,
            "{}{} [{}]{}",
            indent,
            self.tag_class,
            self.tag_number,
            if self.constructed { " constructed" } else { "" }
        )?;
        match &self.value {
            Value::Primitive(data) => {
                let hex = data
                    .iter()
                    .map(|b| format!("{:02x}", b))
                    .collect::<String>();
                writeln!(f, " {}", hex)
            }
            Value::Constructed(children) => {
                writeln!(f)?;
                for child in children {
                    child.fmt_at(f, depth + 1)?;
                }
                Ok(())
            }
        }
    }
}

// Equality ignores the snapshot field; it exists only for change detection.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.eq_impl(other, true)
    }
}

impl Eq for Node {}

impl Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, 0)
    }
}

impl Serialize for Node {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Node", 4)?;
        state.serialize_field("tag_class", &self.tag_class)?;
        state.serialize_field("tag_number", &self.tag_number)?;
        state.serialize_field("constructed", &self.constructed)?;
        match &self.value {
            Value::Primitive(data) => {
                let hex = data
                    .iter()
                    .map(|b| format!("{:02x}", b))
                    .collect::<String>();
                state.serialize_field("value", &hex)?;
            }
            Value::Constructed(children) => {
                state.serialize_field("value", children)?;
            }
        }
        state.end()
    }
}

/// Options controlling [`from_der`].
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Fail when a declared length exceeds the available bytes; lenient
    /// mode clamps the length to what remains instead.
    pub strict: bool,
    /// Fail with [`Error::TrailingBytes`] when bytes remain after the
    /// top-level value.
    pub parse_all_bytes: bool,
    /// Attempt to re-decode primitive BIT STRING contents as nested TLV.
    pub decode_bit_strings: bool,
    /// Maximum nesting depth before the parse is rejected.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            strict: true,
            parse_all_bytes: true,
            decode_bit_strings: true,
            max_depth: 64,
        }
    }
}

/// A decoded length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    Definite(usize),
    /// Length deferred to an end-of-contents marker (two zero bytes); only
    /// legal for constructed values.
    Indefinite,
}

fn check_buffer(bytes: &ByteBuffer, remaining: usize, requested: usize) -> Result<(), Error> {
    if remaining < requested || bytes.len() < requested {
        return Err(Error::TooFewBytes {
            available: bytes.len(),
            remaining,
            requested,
        });
    }
    Ok(())
}

/// Reads a BER length prefix from `bytes`.
///
/// A first byte with the high bit clear is the length itself; exactly
/// `0x80` signals indefinite length; otherwise the low 7 bits count the
/// big-endian base-256 length bytes that follow.
pub fn read_length_prefix(bytes: &mut ByteBuffer, remaining: usize) -> Result<Length, Error> {
    check_buffer(bytes, remaining, 1)?;
    let b = bytes.get_byte()?;
    let remaining = remaining - 1;
    if b == 0x80 {
        return Ok(Length::Indefinite);
    }
    if b & 0x80 == 0 {
        return Ok(Length::Definite(b as usize));
    }
    let count = (b & 0x7f) as usize;
    check_buffer(bytes, remaining, count)?;
    let length = bytes.get_int((count * 8) as u32)? as usize;
    Ok(Length::Definite(length))
}

/// Parses a single TLV value from `bytes`.
///
/// With the default options the input must be fully consumed; see
/// [`ParseOptions`] for the lenient variants.
pub fn from_der(bytes: &[u8], options: ParseOptions) -> Result<Node, Error> {
    let mut buffer = ByteBuffer::from(bytes);
    from_der_buffer(&mut buffer, options)
}

/// Parses a single TLV value, consuming from `buffer`.
pub fn from_der_buffer(buffer: &mut ByteBuffer, options: ParseOptions) -> Result<Node, Error> {
    let total = buffer.len();
    let node = parse_node(buffer, total, 0, &options)?;
    if options.parse_all_bytes && !buffer.is_empty() {
        return Err(Error::TrailingBytes {
            total,
            remaining: buffer.len(),
        });
    }
    Ok(node)
}

fn parse_node(
    bytes: &mut ByteBuffer,
    mut remaining: usize,
    depth: usize,
    options: &ParseOptions,
) -> Result<Node, Error> {
    if depth > options.max_depth {
        return Err(Error::MaxDepthExceeded(options.max_depth));
    }

    // minimum: tag byte + length byte
    check_buffer(bytes, remaining, 2)?;
    let b1 = bytes.get_byte()?;
    remaining -= 1;

    let tag_class = TagClass::from_bits(b1);
    let constructed = b1 & TAG_CONSTRUCTED == TAG_CONSTRUCTED;
    let tag_number = b1 & 0x1f;
    if tag_number == 0x1f {
        return Err(Error::UnsupportedTagForm);
    }

    let start = bytes.len();
    let prefix = read_length_prefix(bytes, remaining)?;
    remaining -= start - bytes.len();

    let length = match prefix {
        Length::Definite(len) if len > remaining => {
            if options.strict {
                return Err(Error::TooFewBytes {
                    available: bytes.len(),
                    remaining,
                    requested: len,
                });
            }
            // lenient: clamp the declared length to the remaining budget
            Some(remaining)
        }
        Length::Definite(len) => Some(len),
        Length::Indefinite => None,
    };

    let mut value: Option<Value> = None;
    let mut bit_string_contents: Option<Vec<u8>> = None;

    if constructed {
        let mut children = Vec::new();
        match length {
            None => loop {
                check_buffer(bytes, remaining, 2)?;
                if bytes.bytes(Some(2)) == [0x00, 0x00] {
                    // end-of-contents marker
                    bytes.skip(2);
                    remaining -= 2;
                    break;
                }
                let start = bytes.len();
                children.push(parse_node(bytes, remaining, depth + 1, options)?);
                remaining -= start - bytes.len();
            },
            Some(mut len) => {
                while len > 0 {
                    let start = bytes.len();
                    children.push(parse_node(bytes, len, depth + 1, options)?);
                    let used = start - bytes.len();
                    remaining -= used;
                    len -= used;
                }
            }
        }
        value = Some(Value::Constructed(children));
    }

    let is_bit_string = tag_class == TagClass::Universal && tag_number == universal::BIT_STRING;

    // save the raw contents, including the unused-bits counter, so an
    // untouched node re-encodes byte-identically
    if value.is_none() && is_bit_string {
        if let Some(len) = length {
            bit_string_contents = Some(bytes.bytes(Some(len)).to_vec());
        }
    }

    // speculative re-decode of BIT STRING contents as nested TLV; any
    // failure is swallowed and the raw primitive value kept
    if value.is_none() && options.decode_bit_strings && is_bit_string {
        if let Some(declared) = length.filter(|&len| len > 1) {
            let mut trial = bytes.clone();
            if trial.get_byte() == Ok(0) {
                // zero unused bits; try a strict nested parse on the trial cursor
                let trial_remaining = remaining - 1;
                let sub_options = ParseOptions {
                    strict: true,
                    parse_all_bytes: false,
                    decode_bit_strings: true,
                    max_depth: options.max_depth,
                };
                let start = trial.len();
                if let Ok(child) = parse_node(&mut trial, trial_remaining, depth + 1, &sub_options)
                {
                    let used = start - trial.len() + 1;
                    if used == declared
                        && matches!(
                            child.tag_class,
                            TagClass::Universal | TagClass::ContextSpecific
                        )
                    {
                        // commit: adopt the trial cursor
                        *bytes = trial;
                        remaining -= used;
                        value = Some(Value::Constructed(vec![child]));
                    }
                }
            }
            // on any other outcome the trial clone is simply discarded
        }
    }

    let value = match value {
        Some(v) => v,
        None => {
            let len = match length {
                Some(len) => len,
                None => {
                    if options.strict {
                        return Err(Error::InvalidIndefiniteLength);
                    }
                    remaining
                }
            };
            if tag_class == TagClass::Universal && tag_number == universal::BMP_STRING {
                // big-endian UTF-16, two bytes per code unit
                if len % 2 != 0 {
                    return Err(Error::BmpStringOddLength(len));
                }
                let mut units = Vec::with_capacity(len / 2);
                let mut n = len;
                while n > 0 {
                    check_buffer(bytes, remaining, 2)?;
                    units.push(bytes.get_u16()?);
                    remaining -= 2;
                    n -= 2;
                }
                let text = String::from_utf16(&units).map_err(|_| Error::BmpStringInvalidUtf16)?;
                Value::Primitive(text.into_bytes())
            } else {
                Value::Primitive(bytes.get_bytes(Some(len)))
            }
        }
    };

    let mut node = Node {
        tag_class,
        tag_number,
        constructed,
        value,
        bit_string_contents,
        original: None,
    };
    if node.bit_string_contents.is_some() {
        let snapshot = node.clone();
        node.original = Some(Box::new(snapshot));
    }
    Ok(node)
}

/// Encodes `node` into canonical DER bytes.
///
/// A parsed BIT STRING that was not mutated since parse re-encodes its
/// saved contents verbatim, so `to_der(from_der(bytes))` is byte-identical
/// even when the speculative re-decode reshaped the tree.
pub fn to_der(node: &Node) -> Result<ByteBuffer, Error> {
    let mut bytes = ByteBuffer::new();
    let mut b1 = node.tag_class as u8 | node.tag_number;
    if node.constructed {
        b1 |= TAG_CONSTRUCTED;
    }

    let mut value = ByteBuffer::new();

    let use_contents = match (&node.bit_string_contents, &node.original) {
        (Some(_), Some(original)) => node.structural_eq(original),
        (Some(_), None) => true,
        (None, _) => false,
    };

    if use_contents {
        if let Some(contents) = &node.bit_string_contents {
            value.put_bytes(contents);
        }
    } else {
        match &node.value {
            Value::Constructed(children) => {
                if !node.constructed {
                    // decoded BIT STRING: restore the zero unused-bits counter
                    value.put_byte(0x00);
                }
                for child in children {
                    let mut encoded = to_der(child)?;
                    value.put_buffer(&mut encoded);
                }
            }
            Value::Primitive(data) => {
                if node.tag_class == TagClass::Universal
                    && node.tag_number == universal::BMP_STRING
                {
                    let text =
                        std::str::from_utf8(data).map_err(|_| Error::BmpStringInvalidUtf8)?;
                    for unit in text.encode_utf16() {
                        value.put_u16(unit);
                    }
                } else if node.tag_class == TagClass::Universal
                    && node.tag_number == universal::INTEGER
                    && data.len() > 1
                    && ((data[0] == 0x00 && data[1] & 0x80 == 0)
                        || (data[0] == 0xff && data[1] & 0x80 == 0x80))
                {
                    // minimal encoding: the leading byte is redundant
                    // relative to sign extension
                    value.put_bytes(&data[1..]);
                } else {
                    value.put_bytes(data);
                }
            }
        }
    }

    bytes.put_byte(b1);
    let len = value.len();
    if len <= 127 {
        bytes.put_byte((len & 0x7f) as u8);
    } else {
        // long form: 0x80 | byte count, then the length big-endian
        let mut len_bytes = Vec::new();
        let mut l = len;
        while l > 0 {
            len_bytes.push((l & 0xff) as u8);
            l >>= 8;
        }
        bytes.put_byte(0x80 | len_bytes.len() as u8);
        for b in len_bytes.iter().rev() {
            bytes.put_byte(*b);
        }
    }
    bytes.put_buffer(&mut value);
    Ok(bytes)
}

/// Encodes `value` as a minimal-width (8/16/24/32-bit) two's-complement
/// INTEGER payload.
pub fn integer_to_der(value: i64) -> Result<ByteBuffer, Error> {
    if i32::try_from(value).is_err() {
        return Err(Error::IntegerOverflow { value });
    }
    let v = value as i32;
    let bits = if (-0x80..0x80).contains(&v) {
        8
    } else if (-0x8000..0x8000).contains(&v) {
        16
    } else if (-0x80_0000..0x80_0000).contains(&v) {
        24
    } else {
        32
    };
    let mut bytes = ByteBuffer::new();
    bytes.put_signed_int(v, bits)?;
    Ok(bytes)
}

/// Decodes a two's-complement INTEGER payload of at most 32 bits.
pub fn der_to_integer(bytes: &mut ByteBuffer) -> Result<i32, Error> {
    let bits = (bytes.len() * 8) as u32;
    if bits > 32 {
        return Err(Error::IntegerTooWide { bits });
    }
    Ok(bytes.get_signed_int(bits)?)
}

impl DecodableFrom<Vec<u8>> for Node {}

impl Decoder<Vec<u8>, Node> for Vec<u8> {
    type Error = Error;

    fn decode(&self) -> Result<Node, Error> {
        from_der(self, ParseOptions::default())
    }
}

impl DecodableFrom<ByteBuffer> for Node {}

impl Decoder<ByteBuffer, Node> for ByteBuffer {
    type Error = Error;

    fn decode(&self) -> Result<Node, Error> {
        from_der(self.bytes(None), ParseOptions::default())
    }
}

impl EncodableTo<Node> for Vec<u8> {}

impl Encoder<Node, Vec<u8>> for Node {
    type Error = Error;

    fn encode(&self) -> Result<Vec<u8>, Error> {
        let mut encoded = to_der(self)?;
        Ok(encoded.get_bytes(None))
    }
}
