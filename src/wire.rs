//! # Wire Primitives - Variable-Length Integer Layer
//!
//! ## Purpose
//!
//! Bounds-checked reads and writes for every low-level encoding the wire
//! format is built from: fixed-width big-endian integers, the three
//! variable-length integer schemes (u15-rb, u16-ob, u30-rb), and
//! minimal-width ("length-specified") integers whose byte count is implied
//! by the surrounding entry boundary rather than carried inline.
//!
//! ## Format Reference
//!
//! - **u15-rb** (reserved bit): values below 0x80 take one byte; otherwise
//!   two bytes with the high bit of the first set and 15 value bits.
//! - **u16-ob** (optional byte): a first byte below 0xFE is the value; the
//!   0xFE escape means the next two bytes hold the value.
//! - **u30-rb**: the top two bits of the first byte select the width -
//!   `00` one byte, `10` two, `01` three, `11` four - carrying 6, 14, 22
//!   or 30 value bits respectively.
//! - **ls integers**: the fewest big-endian bytes representing the value,
//!   sign-extended on read for the signed flavor; an enclosing length
//!   prefix delimits them.
//!
//! Writers return the advanced position and fail with `BufferTooSmall`
//! before touching the buffer; readers return `(value, advanced position)`
//! and fail with `Incomplete` carrying the offset of the short read.

use crate::error::{CodecError, Result};
use byteorder::{BigEndian, ByteOrder};

pub(crate) const MAX_U15: u16 = 0x7FFF;
pub(crate) const MAX_U30: u32 = 0x3FFF_FFFF;

#[inline]
fn need(buf: &[u8], pos: usize, n: usize) -> Result<()> {
    if pos + n > buf.len() {
        return Err(CodecError::BufferTooSmall {
            needed: pos + n - buf.len(),
            remaining: buf.len().saturating_sub(pos),
        });
    }
    Ok(())
}

#[inline]
fn have(buf: &[u8], pos: usize, n: usize) -> Result<()> {
    if pos + n > buf.len() {
        return Err(CodecError::Incomplete { offset: pos });
    }
    Ok(())
}

// ---------------------------------------------------------------- writers

pub(crate) fn put_u8(buf: &mut [u8], pos: usize, v: u8) -> Result<usize> {
    need(buf, pos, 1)?;
    buf[pos] = v;
    Ok(pos + 1)
}

pub(crate) fn put_u16(buf: &mut [u8], pos: usize, v: u16) -> Result<usize> {
    need(buf, pos, 2)?;
    BigEndian::write_u16(&mut buf[pos..pos + 2], v);
    Ok(pos + 2)
}

pub(crate) fn put_i16(buf: &mut [u8], pos: usize, v: i16) -> Result<usize> {
    put_u16(buf, pos, v as u16)
}

pub(crate) fn put_u32(buf: &mut [u8], pos: usize, v: u32) -> Result<usize> {
    need(buf, pos, 4)?;
    BigEndian::write_u32(&mut buf[pos..pos + 4], v);
    Ok(pos + 4)
}

pub(crate) fn put_i32(buf: &mut [u8], pos: usize, v: i32) -> Result<usize> {
    put_u32(buf, pos, v as u32)
}

pub(crate) fn put_bytes(buf: &mut [u8], pos: usize, data: &[u8]) -> Result<usize> {
    need(buf, pos, data.len())?;
    buf[pos..pos + data.len()].copy_from_slice(data);
    Ok(pos + data.len())
}

/// Reserved-bit u15: one byte below 0x80, else two with the high bit set.
pub(crate) fn put_u15rb(buf: &mut [u8], pos: usize, v: usize) -> Result<usize> {
    if v > MAX_U15 as usize {
        return Err(CodecError::InvalidArgument("value exceeds u15 range"));
    }
    if v < 0x80 {
        put_u8(buf, pos, v as u8)
    } else {
        put_u16(buf, pos, v as u16 | 0x8000)
    }
}

/// Optional-byte u16: one byte below 0xFE, else a 0xFE escape plus two bytes.
pub(crate) fn put_u16ob(buf: &mut [u8], pos: usize, v: usize) -> Result<usize> {
    if v > u16::MAX as usize {
        return Err(CodecError::InvalidArgument("value exceeds u16 range"));
    }
    if v < 0xFE {
        put_u8(buf, pos, v as u8)
    } else {
        let pos = put_u8(buf, pos, 0xFE)?;
        put_u16(buf, pos, v as u16)
    }
}

/// Reserved-bits u30: width selected by the top two bits of the first byte.
pub(crate) fn put_u30rb(buf: &mut [u8], pos: usize, v: u32) -> Result<usize> {
    if v < 0x40 {
        put_u8(buf, pos, v as u8)
    } else if v < 0x4000 {
        put_u16(buf, pos, (v as u16) | 0x8000)
    } else if v < 0x40_0000 {
        let pos = put_u8(buf, pos, 0x40 | (v >> 16) as u8)?;
        put_u16(buf, pos, v as u16)
    } else if v <= MAX_U30 {
        put_u32(buf, pos, v | 0xC000_0000)
    } else {
        Err(CodecError::InvalidData("value exceeds u30 range"))
    }
}

/// Byte count of the minimal big-endian representation of an unsigned value.
pub(crate) fn uint_ls_len(v: u64) -> usize {
    if v == 0 {
        1
    } else {
        (8 - v.leading_zeros() as usize / 8).max(1)
    }
}

/// Byte count of the minimal sign-extending representation of a signed value.
pub(crate) fn int_ls_len(v: i64) -> usize {
    let mut len = 1;
    while len < 8 {
        let bits = len * 8;
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << (bits - 1)) - 1;
        if v >= min && v <= max {
            return len;
        }
        len += 1;
    }
    8
}

pub(crate) fn put_uint_ls(buf: &mut [u8], pos: usize, v: u64) -> Result<usize> {
    let len = uint_ls_len(v);
    need(buf, pos, len)?;
    let be = v.to_be_bytes();
    buf[pos..pos + len].copy_from_slice(&be[8 - len..]);
    Ok(pos + len)
}

pub(crate) fn put_int_ls(buf: &mut [u8], pos: usize, v: i64) -> Result<usize> {
    let len = int_ls_len(v);
    need(buf, pos, len)?;
    let be = v.to_be_bytes();
    buf[pos..pos + len].copy_from_slice(&be[8 - len..]);
    Ok(pos + len)
}

/// Fixed-width big-endian write, for fixed-length array slots.
pub(crate) fn put_uint_fixed(buf: &mut [u8], pos: usize, v: u64, len: usize) -> Result<usize> {
    if len == 0 || len > 8 || uint_ls_len(v) > len {
        return Err(CodecError::InvalidArgument("value does not fit declared width"));
    }
    need(buf, pos, len)?;
    let be = v.to_be_bytes();
    buf[pos..pos + len].copy_from_slice(&be[8 - len..]);
    Ok(pos + len)
}

pub(crate) fn put_int_fixed(buf: &mut [u8], pos: usize, v: i64, len: usize) -> Result<usize> {
    if len == 0 || len > 8 || int_ls_len(v) > len {
        return Err(CodecError::InvalidArgument("value does not fit declared width"));
    }
    need(buf, pos, len)?;
    let be = v.to_be_bytes();
    buf[pos..pos + len].copy_from_slice(&be[8 - len..]);
    Ok(pos + len)
}

// ---------------------------------------------------------------- readers

pub(crate) fn get_u8(buf: &[u8], pos: usize) -> Result<(u8, usize)> {
    have(buf, pos, 1)?;
    Ok((buf[pos], pos + 1))
}

pub(crate) fn get_u16(buf: &[u8], pos: usize) -> Result<(u16, usize)> {
    have(buf, pos, 2)?;
    Ok((BigEndian::read_u16(&buf[pos..pos + 2]), pos + 2))
}

pub(crate) fn get_i16(buf: &[u8], pos: usize) -> Result<(i16, usize)> {
    let (v, pos) = get_u16(buf, pos)?;
    Ok((v as i16, pos))
}

pub(crate) fn get_u32(buf: &[u8], pos: usize) -> Result<(u32, usize)> {
    have(buf, pos, 4)?;
    Ok((BigEndian::read_u32(&buf[pos..pos + 4]), pos + 4))
}

pub(crate) fn get_i32(buf: &[u8], pos: usize) -> Result<(i32, usize)> {
    let (v, pos) = get_u32(buf, pos)?;
    Ok((v as i32, pos))
}

pub(crate) fn get_u15rb(buf: &[u8], pos: usize) -> Result<(u16, usize)> {
    let (first, next) = get_u8(buf, pos)?;
    if first & 0x80 == 0 {
        Ok((first as u16, next))
    } else {
        let (second, next) = get_u8(buf, next)?;
        Ok((((first as u16 & 0x7F) << 8) | second as u16, next))
    }
}

pub(crate) fn get_u16ob(buf: &[u8], pos: usize) -> Result<(u16, usize)> {
    let (first, next) = get_u8(buf, pos)?;
    if first < 0xFE {
        Ok((first as u16, next))
    } else {
        get_u16(buf, next)
    }
}

pub(crate) fn get_u30rb(buf: &[u8], pos: usize) -> Result<(u32, usize)> {
    let (first, next) = get_u8(buf, pos)?;
    match first & 0xC0 {
        0x00 => Ok((first as u32, next)),
        0x80 => {
            let (second, next) = get_u8(buf, next)?;
            Ok((((first as u32 & 0x3F) << 8) | second as u32, next))
        }
        0x40 => {
            let (rest, next) = get_u16(buf, next)?;
            Ok((((first as u32 & 0x3F) << 16) | rest as u32, next))
        }
        _ => {
            have(buf, next, 3)?;
            let v = ((first as u32 & 0x3F) << 24)
                | ((buf[next] as u32) << 16)
                | ((buf[next + 1] as u32) << 8)
                | buf[next + 2] as u32;
            Ok((v, next + 3))
        }
    }
}

/// Minimal-width unsigned read over a known span. An empty span is the
/// caller's blank case and never reaches here.
pub(crate) fn get_uint_ls(data: &[u8]) -> Result<u64> {
    if data.is_empty() || data.len() > 8 {
        return Err(CodecError::InvalidData("unsigned value has bad width"));
    }
    let mut v = 0u64;
    for &b in data {
        v = (v << 8) | b as u64;
    }
    Ok(v)
}

/// Minimal-width signed read over a known span, sign-extending.
pub(crate) fn get_int_ls(data: &[u8]) -> Result<i64> {
    if data.is_empty() || data.len() > 8 {
        return Err(CodecError::InvalidData("signed value has bad width"));
    }
    let mut v = if data[0] & 0x80 != 0 { -1i64 } else { 0 };
    for &b in data {
        v = (v << 8) | b as i64 & 0xFF;
    }
    Ok(v)
}
