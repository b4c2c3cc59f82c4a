//! Avro binary encoding.
//!
//! Encoding rules:
//! - null: 0 bytes
//! - boolean: 1 byte (0 or 1)
//! - int/long: zigzag + varint
//! - float: 4 bytes IEEE 754 little-endian
//! - double: 8 bytes IEEE 754 little-endian
//! - bytes/string: varint(length) + raw bytes
//! - array/map: blocks of varint(count) + items, closed by varint(0). A
//!   negative count is followed by the block size in bytes.

mod decoder;
mod encoder;

use std::cmp::Ordering;

use avro_joy_buffers::Writer;

pub use decoder::BinaryDecoder;
pub use encoder::{BinaryEncoder, BinaryEncoderConfig};

/// Longest varint encoding of a 32-bit value.
pub const MAX_INT_BYTES: usize = 5;
/// Longest varint encoding of a 64-bit value.
pub const MAX_LONG_BYTES: usize = 10;

// ---------------------------------------------------------------- zigzag

#[inline]
pub fn zigzag_int(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

#[inline]
pub fn zigzag_long(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

#[inline]
pub fn unzigzag_int(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

#[inline]
pub fn unzigzag_long(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

// ---------------------------------------------------------------- varint

/// Writes a variable-length unsigned integer (no zigzag).
pub fn write_varint(writer: &mut Writer, mut n: u64) {
    loop {
        let low7 = (n & 0x7f) as u8;
        n >>= 7;
        if n == 0 {
            writer.u8(low7);
            return;
        }
        writer.u8(low7 | 0x80);
    }
}

/// Zigzag + varint encoding of an int into `buf`, returning the length.
pub fn encode_int(n: i32, buf: &mut [u8; MAX_INT_BYTES]) -> usize {
    let mut n = zigzag_int(n);
    let mut len = 0;
    loop {
        let low7 = (n & 0x7f) as u8;
        n >>= 7;
        if n == 0 {
            buf[len] = low7;
            return len + 1;
        }
        buf[len] = low7 | 0x80;
        len += 1;
    }
}

/// Zigzag + varint encoding of a long into `buf`, returning the length.
pub fn encode_long(n: i64, buf: &mut [u8; MAX_LONG_BYTES]) -> usize {
    let mut n = zigzag_long(n);
    let mut len = 0;
    loop {
        let low7 = (n & 0x7f) as u8;
        n >>= 7;
        if n == 0 {
            buf[len] = low7;
            return len + 1;
        }
        buf[len] = low7 | 0x80;
        len += 1;
    }
}

/// Lexicographic unsigned comparison of two byte ranges, shorter first on
/// a common prefix.
pub fn compare_bytes(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}
