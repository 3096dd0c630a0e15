//! The compact self-describing binary encoding used on the wire.
//!
//! This is a deliberately small subset of CBOR: unsigned integers, byte
//! strings, text strings, arrays, and the two simple values `null` and
//! `undefined`. Encoders always emit the smallest length code that fits;
//! decoders reject the reserved length codes 28..=31.

use crate::{DrivelineError, DrivelineResult};
use byteorder::{BigEndian, ByteOrder};

pub(crate) const MT_UNSIGNED: u8 = 0 << 5;
pub(crate) const MT_BYTES: u8 = 2 << 5;
pub(crate) const MT_TEXT: u8 = 3 << 5;
pub(crate) const MT_ARRAY: u8 = 4 << 5;
const MT_SIMPLE: u8 = 7 << 5;

pub(crate) const NULL: u8 = MT_SIMPLE | 22;
pub(crate) const UNDEFINED: u8 = MT_SIMPLE | 23;

const TYPE_MASK: u8 = 0x07 << 5;
const LENGTH_MASK: u8 = 0x1f;

pub(crate) const TAG_MESSAGE_ID: u8 = 1;
pub(crate) const TAG_READ_ID: u8 = 2;
pub(crate) const TAG_STORE_CAS_ID: u8 = 3;
pub(crate) const TAG_STORE_TTL: u8 = 4;

pub(crate) const ENCODED_MESSAGE_ID_TAG: u8 = MT_UNSIGNED | TAG_MESSAGE_ID;
pub(crate) const ENCODED_READ_ID_TAG: u8 = MT_UNSIGNED | TAG_READ_ID;
pub(crate) const ENCODED_STORE_CAS_ID_TAG: u8 = MT_UNSIGNED | TAG_STORE_CAS_ID;
pub(crate) const ENCODED_STORE_TTL_TAG: u8 = MT_UNSIGNED | TAG_STORE_TTL;

pub(crate) fn len_code(b: u8) -> u8 {
    b & LENGTH_MASK
}

pub(crate) fn is_array(b: u8) -> bool {
    b & TYPE_MASK == MT_ARRAY
}

pub(crate) fn is_byte_string(b: u8) -> bool {
    b & TYPE_MASK == MT_BYTES
}

pub(crate) fn is_text_string(b: u8) -> bool {
    b & TYPE_MASK == MT_TEXT
}

pub(crate) fn is_unsigned_integer(b: u8) -> bool {
    b & TYPE_MASK == MT_UNSIGNED
}

pub(crate) fn is_undefined(b: u8) -> bool {
    b == UNDEFINED
}

// `undefined` and `null` are interchangeable "no value" markers on decode.
pub(crate) fn is_blank(b: u8) -> bool {
    b == UNDEFINED || b == NULL
}

/// Encoded size of an unsigned integer, header byte included.
pub(crate) fn size_of_number(n: u64) -> usize {
    match n {
        0..=23 => 1,
        24..=0xFF => 2,
        0x100..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

/// Encoded size of a byte or text string of length `len`, header included.
pub(crate) fn size_of_bytes(len: usize) -> usize {
    len + size_of_number(len as u64)
}

/// Appends `n` with the given major type, using the minimal length code.
pub(crate) fn encode_number(buf: &mut Vec<u8>, major: u8, n: u64) {
    match n {
        0..=23 => buf.push(major | n as u8),
        24..=0xFF => {
            buf.push(major | 24);
            buf.push(n as u8);
        }
        0x100..=0xFFFF => {
            buf.push(major | 25);
            buf.extend_from_slice(&(n as u16).to_be_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            buf.push(major | 26);
            buf.extend_from_slice(&(n as u32).to_be_bytes());
        }
        _ => {
            buf.push(major | 27);
            buf.extend_from_slice(&n.to_be_bytes());
        }
    }
}

/// Appends a length-prefixed byte or text string with the given major type.
pub(crate) fn encode_bytes(buf: &mut Vec<u8>, major: u8, data: &[u8]) {
    encode_number(buf, major, data.len() as u64);
    buf.extend_from_slice(data);
}

fn split_at_checked(buf: &[u8], n: usize) -> DrivelineResult<(&[u8], &[u8])> {
    if buf.len() < n {
        return Err(DrivelineError::InvalidServerMessage);
    }
    Ok(buf.split_at(n))
}

/// Decodes the length/value part of a header, returning `(n, rest)`.
///
/// Works for unsigned integers as well as for the length of strings,
/// arrays, and maps; type checking is the caller's business.
pub(crate) fn decode_number(buf: &[u8]) -> DrivelineResult<(u64, &[u8])> {
    let head = *buf.first().ok_or(DrivelineError::InvalidServerMessage)?;
    let buf = &buf[1..];
    match len_code(head) {
        code @ 0..=23 => Ok((u64::from(code), buf)),
        24 => {
            let (v, rest) = split_at_checked(buf, 1)?;
            Ok((u64::from(v[0]), rest))
        }
        25 => {
            let (v, rest) = split_at_checked(buf, 2)?;
            Ok((u64::from(BigEndian::read_u16(v)), rest))
        }
        26 => {
            let (v, rest) = split_at_checked(buf, 4)?;
            Ok((u64::from(BigEndian::read_u32(v)), rest))
        }
        27 => {
            let (v, rest) = split_at_checked(buf, 8)?;
            Ok((BigEndian::read_u64(v), rest))
        }
        _ => Err(DrivelineError::InvalidServerMessage),
    }
}

/// Decodes a byte string, returning `(payload, rest)`.
///
/// A blank value decodes to an empty payload.
pub(crate) fn decode_bytes(buf: &[u8]) -> DrivelineResult<(&[u8], &[u8])> {
    let head = *buf.first().ok_or(DrivelineError::InvalidServerMessage)?;
    if is_blank(head) {
        return Ok((&[], &buf[1..]));
    }
    if !is_byte_string(head) {
        return Err(DrivelineError::InvalidServerMessage);
    }
    let (size, rest) = decode_number(buf)?;
    let size = usize::try_from(size).map_err(|_| DrivelineError::InvalidServerMessage)?;
    split_at_checked(rest, size)
}

/// Decodes a text string, returning `(text, rest)`.
///
/// A blank value decodes to the empty string.
pub(crate) fn decode_text(buf: &[u8]) -> DrivelineResult<(&str, &[u8])> {
    let head = *buf.first().ok_or(DrivelineError::InvalidServerMessage)?;
    if is_blank(head) {
        return Ok(("", &buf[1..]));
    }
    if !is_text_string(head) {
        return Err(DrivelineError::InvalidServerMessage);
    }
    let (size, rest) = decode_number(buf)?;
    let size = usize::try_from(size).map_err(|_| DrivelineError::InvalidServerMessage)?;
    let (text, rest) = split_at_checked(rest, size)?;
    let text = std::str::from_utf8(text).map_err(|_| DrivelineError::InvalidServerMessage)?;
    Ok((text, rest))
}
