//! Growable byte buffer with a read cursor.
//!
//! [`ByteBuffer`] owns a byte sequence and a read cursor. Writes append to
//! the tail; reads consume from the cursor. `length()` in the wire-format
//! sense is the unread region, `stored - read`.
//!
//! ```
//! use bytebuf::ByteBuffer;
//!
//! let mut b = ByteBuffer::new();
//! b.put_u32(0xDEADBEEF);
//! assert_eq!(b.get_u32().unwrap(), 0xDEADBEEF);
//! assert!(b.is_empty());
//! ```

pub mod error;

use base64::{Engine, engine::general_purpose::STANDARD};
use error::Error;

const VALID_WIDTHS: [u32; 4] = [8, 16, 24, 32];

/// A growable byte sequence with a read cursor.
///
/// Cloning yields an independent buffer with the same content and cursor;
/// no storage is shared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteBuffer {
    data: Vec<u8>,
    read: usize,
}

impl ByteBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        ByteBuffer::default()
    }

    /// Creates a buffer from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, Error> {
        Ok(ByteBuffer::from(hex::decode(s)?))
    }

    /// Creates a buffer from base64 text. Non-alphabet characters
    /// (whitespace, line breaks) are stripped before decoding.
    pub fn from_base64(s: &str) -> Result<Self, Error> {
        let cleaned: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
            .collect();
        Ok(ByteBuffer::from(STANDARD.decode(cleaned)?))
    }

    /// Number of unread bytes.
    pub fn len(&self) -> usize {
        self.data.len() - self.read
    }

    /// Returns true if no unread bytes remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a single byte.
    pub fn put_byte(&mut self, b: u8) {
        self.data.push(b);
    }

    /// Appends `n` copies of `b`.
    pub fn fill_with_byte(&mut self, b: u8, n: usize) {
        self.data.resize(self.data.len() + n, b);
    }

    /// Appends raw bytes.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Appends the UTF-8 encoding of `s`.
    pub fn put_str(&mut self, s: &str) {
        self.data.extend_from_slice(s.as_bytes());
    }

    /// Drains `other` into this buffer.
    pub fn put_buffer(&mut self, other: &mut ByteBuffer) {
        let bytes = other.get_bytes(None);
        self.data.extend_from_slice(&bytes);
    }

    /// Appends a 16-bit big-endian integer.
    pub fn put_u16(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    /// Appends a 16-bit little-endian integer.
    pub fn put_u16_le(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    /// Appends a 24-bit big-endian integer (the high byte of `v` is dropped).
    pub fn put_u24(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_be_bytes()[1..]);
    }

    /// Appends a 24-bit little-endian integer (the high byte of `v` is dropped).
    pub fn put_u24_le(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_le_bytes()[..3]);
    }

    /// Appends a 32-bit big-endian integer.
    pub fn put_u32(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    /// Appends a 32-bit little-endian integer.
    pub fn put_u32_le(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    /// Appends an n-bit big-endian unsigned integer, `bits` ∈ {8, 16, 24, 32}.
    pub fn put_int(&mut self, v: u32, bits: u32) -> Result<(), Error> {
        check_width(bits)?;
        let mut shift = bits;
        while shift > 0 {
            shift -= 8;
            self.data.push((v >> shift) as u8);
        }
        Ok(())
    }

    /// Appends an n-bit big-endian two's-complement integer.
    pub fn put_signed_int(&mut self, v: i32, bits: u32) -> Result<(), Error> {
        check_width(bits)?;
        let mask = if bits == 32 {
            u32::MAX
        } else {
            (1u32 << bits) - 1
        };
        self.put_int(v as u32 & mask, bits)
    }

    /// Consumes and returns one byte.
    pub fn get_byte(&mut self) -> Result<u8, Error> {
        let b = self.take(1)?[0];
        self.read += 1;
        Ok(b)
    }

    /// Consumes a 16-bit big-endian integer.
    pub fn get_u16(&mut self) -> Result<u16, Error> {
        Ok(self.get_int(16)? as u16)
    }

    /// Consumes a 16-bit little-endian integer.
    pub fn get_u16_le(&mut self) -> Result<u16, Error> {
        let bytes = self.take(2)?;
        let v = u16::from_le_bytes([bytes[0], bytes[1]]);
        self.read += 2;
        Ok(v)
    }

    /// Consumes a 24-bit big-endian integer.
    pub fn get_u24(&mut self) -> Result<u32, Error> {
        self.get_int(24)
    }

    /// Consumes a 24-bit little-endian integer.
    pub fn get_u24_le(&mut self) -> Result<u32, Error> {
        let bytes = self.take(3)?;
        let v = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]);
        self.read += 3;
        Ok(v)
    }

    /// Consumes a 32-bit big-endian integer. The result is unsigned; use
    /// [`ByteBuffer::get_signed_int`] for the two's-complement view.
    pub fn get_u32(&mut self) -> Result<u32, Error> {
        self.get_int(32)
    }

    /// Consumes a 32-bit little-endian integer.
    pub fn get_u32_le(&mut self) -> Result<u32, Error> {
        let bytes = self.take(4)?;
        let v = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        self.read += 4;
        Ok(v)
    }

    /// Consumes an n-bit big-endian unsigned integer, `bits` ∈ {8, 16, 24, 32}.
    pub fn get_int(&mut self, bits: u32) -> Result<u32, Error> {
        check_width(bits)?;
        let count = (bits / 8) as usize;
        let bytes = self.take(count)?;
        let v = bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
        self.read += count;
        Ok(v)
    }

    /// Consumes an n-bit big-endian two's-complement integer.
    pub fn get_signed_int(&mut self, bits: u32) -> Result<i32, Error> {
        let mut v = self.get_int(bits)? as i64;
        let half = 1i64 << (bits - 1);
        if v >= half {
            v -= half << 1;
        }
        Ok(v as i32)
    }

    /// Consumes up to `count` bytes (all remaining if `None`).
    ///
    /// Lenient by design: if fewer than `count` bytes remain, only what
    /// exists is returned. Callers needing exactness must check
    /// [`ByteBuffer::len`] first.
    pub fn get_bytes(&mut self, count: Option<usize>) -> Vec<u8> {
        let n = match count {
            Some(c) => c.min(self.len()),
            None => self.len(),
        };
        let out = self.data[self.read..self.read + n].to_vec();
        self.read += n;
        out
    }

    /// Peeks at up to `count` unread bytes (all remaining if `None`)
    /// without advancing the cursor.
    pub fn bytes(&self, count: Option<usize>) -> &[u8] {
        let n = match count {
            Some(c) => c.min(self.len()),
            None => self.len(),
        };
        &self.data[self.read..self.read + n]
    }

    /// Byte at offset `i` from the cursor, cursor unmoved.
    pub fn at(&self, i: usize) -> Option<u8> {
        self.data.get(self.read + i).copied()
    }

    /// Overwrites the byte at offset `i` from the cursor.
    pub fn set_at(&mut self, i: usize, b: u8) -> Result<(), Error> {
        let length = self.len();
        match self.data.get_mut(self.read + i) {
            Some(slot) => {
                *slot = b;
                Ok(())
            }
            None => Err(Error::IndexOutOfRange { index: i, length }),
        }
    }

    /// Final stored byte, regardless of the cursor.
    pub fn last(&self) -> Option<u8> {
        self.data.last().copied()
    }

    /// Advances the cursor by up to `n` bytes; returns how many were skipped.
    pub fn skip(&mut self, n: usize) -> usize {
        let n = n.min(self.len());
        self.read += n;
        n
    }

    /// Drops the consumed prefix and resets the cursor to 0.
    pub fn compact(&mut self) {
        self.data.drain(..self.read);
        self.read = 0;
    }

    /// Empties the buffer and resets the cursor.
    pub fn clear(&mut self) {
        self.data.clear();
        self.read = 0;
    }

    /// Drops `n` bytes from the tail of the unread region and resets the
    /// cursor to 0.
    pub fn truncate(&mut self, n: usize) {
        let keep = self.len().saturating_sub(n);
        self.data = self.data[self.read..self.read + keep].to_vec();
        self.read = 0;
    }

    /// Hex rendering of the unread region.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes(None))
    }

    /// Base64 rendering of the unread region. When `max_line` is set, the
    /// output is wrapped with CRLF at that column.
    pub fn to_base64(&self, max_line: Option<usize>) -> String {
        let encoded = STANDARD.encode(self.bytes(None));
        match max_line {
            Some(width) if width > 0 => encoded
                .as_bytes()
                .chunks(width)
                // chunks are split on base64 output, always valid ASCII
                .map(|c| std::str::from_utf8(c).unwrap_or_default())
                .collect::<Vec<_>>()
                .join("\r\n"),
            _ => encoded,
        }
    }

    fn take(&self, count: usize) -> Result<&[u8], Error> {
        if self.len() < count {
            return Err(Error::TooFewBytes {
                available: self.len(),
                requested: count,
            });
        }
        Ok(&self.data[self.read..self.read + count])
    }
}

fn check_width(bits: u32) -> Result<(), Error> {
    if !VALID_WIDTHS.contains(&bits) {
        return Err(Error::InvalidBitWidth(bits));
    }
    Ok(())
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(data: Vec<u8>) -> Self {
        ByteBuffer { data, read: 0 }
    }
}

impl From<&[u8]> for ByteBuffer {
    fn from(data: &[u8]) -> Self {
        ByteBuffer {
            data: data.to_vec(),
            read: 0,
        }
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        self.bytes(None)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::{ByteBuffer, error::Error};

    #[test]
    fn test_put_get_byte() {
        let mut b = ByteBuffer::new();
        b.put_byte(0xab);
        assert_eq!(1, b.len());
        assert_eq!(0xab, b.get_byte().unwrap());
        assert!(b.is_empty());
        assert_eq!(
            Err(Error::TooFewBytes {
                available: 0,
                requested: 1
            }),
            b.get_byte()
        );
    }

    #[rstest(value, expected,
        case(0x0102, vec![0x01, 0x02]),
        case(0xfffe, vec![0xff, 0xfe]),
    )]
    fn test_put_u16_be(value: u16, expected: Vec<u8>) {
        let mut b = ByteBuffer::new();
        b.put_u16(value);
        assert_eq!(expected, b.bytes(None));
        assert_eq!(value, b.get_u16().unwrap());
    }

    #[rstest(value, expected,
        case(0x0102, vec![0x02, 0x01]),
        case(0xfffe, vec![0xfe, 0xff]),
    )]
    fn test_put_u16_le(value: u16, expected: Vec<u8>) {
        let mut b = ByteBuffer::new();
        b.put_u16_le(value);
        assert_eq!(expected, b.bytes(None));
        assert_eq!(value, b.get_u16_le().unwrap());
    }

    #[test]
    fn test_put_u24_both_endiannesses() {
        let mut b = ByteBuffer::new();
        b.put_u24(0x010203);
        assert_eq!(vec![0x01, 0x02, 0x03], b.bytes(None));
        assert_eq!(0x010203, b.get_u24().unwrap());

        let mut b = ByteBuffer::new();
        b.put_u24_le(0x010203);
        assert_eq!(vec![0x03, 0x02, 0x01], b.bytes(None));
        assert_eq!(0x010203, b.get_u24_le().unwrap());
    }

    #[test]
    fn test_put_u32_roundtrip() {
        let mut b = ByteBuffer::new();
        b.put_u32(0xDEADBEEF);
        assert_eq!(vec![0xde, 0xad, 0xbe, 0xef], b.bytes(None));
        // get_u32 returns the unsigned 32-bit value
        assert_eq!(0xDEADBEEF, b.get_u32().unwrap());

        let mut b = ByteBuffer::new();
        b.put_u32_le(0xDEADBEEF);
        assert_eq!(vec![0xef, 0xbe, 0xad, 0xde], b.bytes(None));
        assert_eq!(0xDEADBEEF, b.get_u32_le().unwrap());
    }

    #[rstest(value, bits, expected,
        case(0x01, 8, vec![0x01]),
        case(0x0102, 16, vec![0x01, 0x02]),
        case(0x010203, 24, vec![0x01, 0x02, 0x03]),
        case(0x01020304, 32, vec![0x01, 0x02, 0x03, 0x04]),
    )]
    fn test_put_int(value: u32, bits: u32, expected: Vec<u8>) {
        let mut b = ByteBuffer::new();
        b.put_int(value, bits).unwrap();
        assert_eq!(expected, b.bytes(None));
        assert_eq!(value, b.get_int(bits).unwrap());
    }

    #[rstest(bits, case(0), case(7), case(12), case(40), case(64))]
    fn test_invalid_bit_width(bits: u32) {
        let mut b = ByteBuffer::new();
        assert_eq!(Err(Error::InvalidBitWidth(bits)), b.put_int(1, bits));
        assert_eq!(Err(Error::InvalidBitWidth(bits)), b.get_int(bits));
    }

    #[rstest(value, bits, encoded,
        case(0, 8, vec![0x00]),
        case(-1, 8, vec![0xff]),
        case(127, 8, vec![0x7f]),
        case(-128, 8, vec![0x80]),
        case(-129, 16, vec![0xff, 0x7f]),
        case(128, 16, vec![0x00, 0x80]),
        case(-1, 32, vec![0xff, 0xff, 0xff, 0xff]),
        case(i32::MIN, 32, vec![0x80, 0x00, 0x00, 0x00]),
    )]
    fn test_signed_int_roundtrip(value: i32, bits: u32, encoded: Vec<u8>) {
        let mut b = ByteBuffer::new();
        b.put_signed_int(value, bits).unwrap();
        assert_eq!(encoded, b.bytes(None));
        assert_eq!(value, b.get_signed_int(bits).unwrap());
    }

    #[test]
    fn test_fill_with_byte() {
        let mut b = ByteBuffer::new();
        b.fill_with_byte(0x5a, 1000);
        assert_eq!(1000, b.len());
        assert!(b.bytes(None).iter().all(|&x| x == 0x5a));
    }

    #[test]
    fn test_put_str() {
        let mut b = ByteBuffer::new();
        b.put_str("héllo");
        assert_eq!("héllo".as_bytes(), b.bytes(None));
    }

    #[test]
    fn test_put_buffer_drains_source() {
        let mut a = ByteBuffer::from(vec![0x01, 0x02]);
        let mut b = ByteBuffer::from(vec![0x03, 0x04]);
        a.put_buffer(&mut b);
        assert_eq!(vec![0x01, 0x02, 0x03, 0x04], a.bytes(None));
        assert!(b.is_empty());
    }

    #[test]
    fn test_get_bytes_lenient() {
        let mut b = ByteBuffer::from(vec![0x01, 0x02, 0x03]);
        // more requested than available: returns what exists
        assert_eq!(vec![0x01, 0x02, 0x03], b.get_bytes(Some(10)));
        assert!(b.is_empty());

        let mut b = ByteBuffer::from(vec![0x01, 0x02, 0x03]);
        assert_eq!(vec![0x01, 0x02], b.get_bytes(Some(2)));
        assert_eq!(vec![0x03], b.get_bytes(None));
    }

    #[test]
    fn test_peek_does_not_advance() {
        let b = ByteBuffer::from(vec![0x01, 0x02, 0x03]);
        assert_eq!(&[0x01, 0x02][..], b.bytes(Some(2)));
        assert_eq!(3, b.len());
    }

    #[test]
    fn test_at_set_at_last() {
        let mut b = ByteBuffer::from(vec![0x01, 0x02, 0x03]);
        b.get_byte().unwrap();
        // offsets are relative to the cursor
        assert_eq!(Some(0x02), b.at(0));
        assert_eq!(Some(0x03), b.at(1));
        assert_eq!(None, b.at(2));
        b.set_at(0, 0x7f).unwrap();
        assert_eq!(Some(0x7f), b.at(0));
        assert_eq!(
            Err(Error::IndexOutOfRange {
                index: 5,
                length: 2
            }),
            b.set_at(5, 0x00)
        );
        assert_eq!(Some(0x03), b.last());
    }

    #[test]
    fn test_compact_clear_truncate() {
        let mut b = ByteBuffer::from(vec![0x01, 0x02, 0x03, 0x04]);
        b.get_byte().unwrap();
        b.compact();
        assert_eq!(vec![0x02, 0x03, 0x04], b.bytes(None));
        assert_eq!(3, b.len());

        b.truncate(1);
        assert_eq!(vec![0x02, 0x03], b.bytes(None));

        b.truncate(10);
        assert!(b.is_empty());

        let mut b = ByteBuffer::from(vec![0x01]);
        b.clear();
        assert!(b.is_empty());
    }

    #[test]
    fn test_clone_is_independent() {
        let mut a = ByteBuffer::from(vec![0x01, 0x02]);
        a.get_byte().unwrap();
        let mut b = a.clone();
        assert_eq!(a.len(), b.len());
        b.get_byte().unwrap();
        b.put_byte(0xff);
        // mutating the copy leaves the original untouched
        assert_eq!(1, a.len());
        assert_eq!(Some(0x02), a.at(0));
    }

    #[rstest(input, expected,
        case(vec![], ""),
        case(vec![0x00, 0x7f, 0x80, 0xff], "007f80ff"),
        case(vec![0xde, 0xad, 0xbe, 0xef], "deadbeef"),
    )]
    fn test_to_hex(input: Vec<u8>, expected: &str) {
        let b = ByteBuffer::from(input);
        assert_eq!(expected, b.to_hex());
    }

    #[rstest(input, expected,
        case("deadbeef", vec![0xde, 0xad, 0xbe, 0xef]),
        case("DEADBEEF", vec![0xde, 0xad, 0xbe, 0xef]),
        case("", vec![]),
    )]
    fn test_from_hex(input: &str, expected: Vec<u8>) {
        let b = ByteBuffer::from_hex(input).unwrap();
        assert_eq!(expected, b.bytes(None));
    }

    #[test]
    fn test_from_hex_invalid() {
        assert!(ByteBuffer::from_hex("zz").is_err());
        assert!(ByteBuffer::from_hex("abc").is_err());
    }

    #[rstest(input, expected,
        case(vec![], ""),
        case(b"f".to_vec(), "Zg=="),
        case(b"foobar".to_vec(), "Zm9vYmFy"),
    )]
    fn test_to_base64(input: Vec<u8>, expected: &str) {
        let b = ByteBuffer::from(input);
        assert_eq!(expected, b.to_base64(None));
    }

    #[test]
    fn test_to_base64_wrapped() {
        let b = ByteBuffer::from(vec![0xab; 48]);
        let encoded = b.to_base64(Some(16));
        for line in encoded.split("\r\n") {
            assert!(line.len() <= 16);
        }
        let decoded = ByteBuffer::from_base64(&encoded).unwrap();
        assert_eq!(b.bytes(None), decoded.bytes(None));
    }

    #[rstest(input, expected,
        case("Zm9vYmFy", b"foobar".to_vec()),
        // non-alphabet characters are stripped before decoding
        case("Zm9v\r\nYmFy", b"foobar".to_vec()),
        case(" Zm9v YmFy ", b"foobar".to_vec()),
    )]
    fn test_from_base64(input: &str, expected: Vec<u8>) {
        let b = ByteBuffer::from_base64(input).unwrap();
        assert_eq!(expected, b.bytes(None));
    }

    #[test]
    fn test_skip() {
        let mut b = ByteBuffer::from(vec![0x01, 0x02, 0x03]);
        assert_eq!(2, b.skip(2));
        assert_eq!(vec![0x03], b.bytes(None));
        assert_eq!(1, b.skip(5));
        assert!(b.is_empty());
    }
}
