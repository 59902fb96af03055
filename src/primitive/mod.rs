//! # Primitive Codecs - Typed Leaf Values
//!
//! ## Purpose
//!
//! Every leaf value the wire format can carry: variable-width integers,
//! IEEE floats, exact-decimal Reals, calendar types, quality-of-service and
//! stream-state descriptors, enumeration indices, and raw byte strings.
//! Each primitive has one canonical payload layout; the payload is
//! delimited by the enclosing entry's length prefix, so a zero-length
//! payload is the uniform blank representation.
//!
//! ## Integration Points
//!
//! - **Container entries**: field and element entries wrap these payloads
//!   in a b16 length prefix; arrays pack them in fixed or self-prefixed
//!   slots.
//! - **Blank handling**: decode returns [`Decoded`], which distinguishes a
//!   real value from a blank slot; typed access on a blank fails with a
//!   descriptive error instead of fabricating a default.
//! - **Dictionary**: enum display-string resolution lives on
//!   [`crate::dictionary::DataDictionary`]; the raw integer decodes here.

pub mod datetime;
pub mod qos;
pub mod real;
pub mod state;

pub use datetime::{Date, DateTime, Time};
pub use qos::{Qos, QosRate, QosTimeliness};
pub use real::{Real, RealHint};
pub use state::{DataState, State, StreamState};

use crate::error::{CodecError, Result};
use crate::wire;
use num_enum::TryFromPrimitive;

/// Wire type tags. Primitives occupy the low range; container types share
/// the same numbering space from 128 up, which is what lets an element
/// entry or dictionary row name either kind with one byte.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    Unknown = 0,
    Int = 3,
    UInt = 4,
    Float = 5,
    Double = 6,
    Real = 8,
    Date = 9,
    Time = 10,
    DateTime = 11,
    Qos = 12,
    State = 13,
    Enum = 14,
    Array = 15,
    Buffer = 16,
    AsciiString = 17,
    Utf8String = 18,
    RmtesString = 19,
    NoData = 128,
    Opaque = 130,
    Xml = 131,
    FieldList = 132,
    ElementList = 133,
    AnsiPage = 134,
    FilterList = 135,
    Vector = 136,
    Map = 137,
    Series = 138,
    Msg = 141,
}

impl DataType {
    /// True for types decoded by this module (containers dispatch through
    /// `crate::container` instead).
    pub fn is_primitive(self) -> bool {
        (self as u8) < 128 && self != DataType::Unknown && self != DataType::Array
    }

    pub fn is_container(self) -> bool {
        (self as u8) >= 128
    }
}

/// Outcome of decoding one primitive slot: a value, or the distinguished
/// blank data-code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decoded<T> {
    Value(T),
    Blank,
}

impl<T> Decoded<T> {
    pub fn is_blank(&self) -> bool {
        matches!(self, Decoded::Blank)
    }

    /// Unwrap the value, failing descriptively on a blank slot. Never
    /// substitutes a default.
    pub fn value(self) -> Result<T> {
        match self {
            Decoded::Value(v) => Ok(v),
            Decoded::Blank => Err(CodecError::BlankData("value")),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decoded<U> {
        match self {
            Decoded::Value(v) => Decoded::Value(f(v)),
            Decoded::Blank => Decoded::Blank,
        }
    }
}

/// One primitive value with its type tag, ready to encode or freshly
/// decoded. String and buffer flavors borrow the caller's bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimitiveValue<'a> {
    UInt(u64),
    Int(i64),
    Float(f32),
    Double(f64),
    Real(Real),
    Date(Date),
    Time(Time),
    DateTime(DateTime),
    Qos(Qos),
    State(State<'a>),
    Enum(u16),
    Buffer(&'a [u8]),
    AsciiString(&'a [u8]),
    Utf8String(&'a [u8]),
    RmtesString(&'a [u8]),
}

impl<'a> PrimitiveValue<'a> {
    pub fn data_type(&self) -> DataType {
        match self {
            PrimitiveValue::UInt(_) => DataType::UInt,
            PrimitiveValue::Int(_) => DataType::Int,
            PrimitiveValue::Float(_) => DataType::Float,
            PrimitiveValue::Double(_) => DataType::Double,
            PrimitiveValue::Real(_) => DataType::Real,
            PrimitiveValue::Date(_) => DataType::Date,
            PrimitiveValue::Time(_) => DataType::Time,
            PrimitiveValue::DateTime(_) => DataType::DateTime,
            PrimitiveValue::Qos(_) => DataType::Qos,
            PrimitiveValue::State(_) => DataType::State,
            PrimitiveValue::Enum(_) => DataType::Enum,
            PrimitiveValue::Buffer(_) => DataType::Buffer,
            PrimitiveValue::AsciiString(_) => DataType::AsciiString,
            PrimitiveValue::Utf8String(_) => DataType::Utf8String,
            PrimitiveValue::RmtesString(_) => DataType::RmtesString,
        }
    }

    /// Write the length-specified payload (no wrapper) at `pos`.
    pub(crate) fn encode_ls(&self, buf: &mut [u8], pos: usize) -> Result<usize> {
        match self {
            PrimitiveValue::UInt(v) => wire::put_uint_ls(buf, pos, *v),
            PrimitiveValue::Int(v) => wire::put_int_ls(buf, pos, *v),
            PrimitiveValue::Float(v) => wire::put_u32(buf, pos, v.to_bits()),
            PrimitiveValue::Double(v) => {
                let bits = v.to_bits();
                let pos = wire::put_u32(buf, pos, (bits >> 32) as u32)?;
                wire::put_u32(buf, pos, bits as u32)
            }
            PrimitiveValue::Real(v) => v.encode_ls(buf, pos),
            PrimitiveValue::Date(v) => v.encode_ls(buf, pos),
            PrimitiveValue::Time(v) => v.encode_ls(buf, pos),
            PrimitiveValue::DateTime(v) => v.encode_ls(buf, pos),
            PrimitiveValue::Qos(v) => v.encode_ls(buf, pos),
            PrimitiveValue::State(v) => v.encode_ls(buf, pos),
            PrimitiveValue::Enum(v) => wire::put_uint_ls(buf, pos, *v as u64),
            PrimitiveValue::Buffer(d)
            | PrimitiveValue::AsciiString(d)
            | PrimitiveValue::Utf8String(d)
            | PrimitiveValue::RmtesString(d) => wire::put_bytes(buf, pos, d),
        }
    }

    /// Write the payload padded to a declared fixed width, for fixed-length
    /// array slots. Only the types with a natural fixed rendering support
    /// this.
    pub(crate) fn encode_fixed(&self, buf: &mut [u8], pos: usize, len: usize) -> Result<usize> {
        match self {
            PrimitiveValue::UInt(v) => wire::put_uint_fixed(buf, pos, *v, len),
            PrimitiveValue::Int(v) => wire::put_int_fixed(buf, pos, *v, len),
            PrimitiveValue::Enum(v) => wire::put_uint_fixed(buf, pos, *v as u64, len),
            PrimitiveValue::Float(_) if len == 4 => self.encode_ls(buf, pos),
            PrimitiveValue::Double(_) if len == 8 => self.encode_ls(buf, pos),
            PrimitiveValue::Date(_) if len == 4 => self.encode_ls(buf, pos),
            PrimitiveValue::Buffer(d)
            | PrimitiveValue::AsciiString(d)
            | PrimitiveValue::Utf8String(d)
            | PrimitiveValue::RmtesString(d)
                if d.len() == len =>
            {
                wire::put_bytes(buf, pos, d)
            }
            _ => Err(CodecError::InvalidData(
                "type has no rendering at the declared fixed width",
            )),
        }
    }

    /// Decode a length-specified payload span as `data_type`. An empty span
    /// is blank for every primitive type.
    pub fn decode(data_type: DataType, data: &'a [u8]) -> Result<Decoded<PrimitiveValue<'a>>> {
        if data.is_empty() {
            return Ok(Decoded::Blank);
        }
        let value = match data_type {
            DataType::UInt => PrimitiveValue::UInt(wire::get_uint_ls(data)?),
            DataType::Int => PrimitiveValue::Int(wire::get_int_ls(data)?),
            DataType::Float => {
                if data.len() != 4 {
                    return Err(CodecError::InvalidData("float payload is not 4 bytes"));
                }
                let (bits, _) = wire::get_u32(data, 0)?;
                PrimitiveValue::Float(f32::from_bits(bits))
            }
            DataType::Double => {
                if data.len() != 8 {
                    return Err(CodecError::InvalidData("double payload is not 8 bytes"));
                }
                let (hi, next) = wire::get_u32(data, 0)?;
                let (lo, _) = wire::get_u32(data, next)?;
                PrimitiveValue::Double(f64::from_bits(((hi as u64) << 32) | lo as u64))
            }
            DataType::Real => return Ok(Real::decode_ls(data)?.map(PrimitiveValue::Real)),
            DataType::Date => return Ok(Date::decode_ls(data)?.map(PrimitiveValue::Date)),
            DataType::Time => PrimitiveValue::Time(Time::decode_ls(data)?),
            DataType::DateTime => PrimitiveValue::DateTime(DateTime::decode_ls(data)?),
            DataType::Qos => PrimitiveValue::Qos(Qos::decode_ls(data)?),
            DataType::State => PrimitiveValue::State(State::decode_ls(data)?),
            DataType::Enum => {
                if data.len() > 2 {
                    return Err(CodecError::InvalidData("enum payload wider than u16"));
                }
                PrimitiveValue::Enum(wire::get_uint_ls(data)? as u16)
            }
            DataType::Buffer => PrimitiveValue::Buffer(data),
            DataType::AsciiString => PrimitiveValue::AsciiString(data),
            DataType::Utf8String => PrimitiveValue::Utf8String(data),
            DataType::RmtesString => PrimitiveValue::RmtesString(data),
            _ => return Err(CodecError::UnknownType(data_type as u8)),
        };
        Ok(Decoded::Value(value))
    }
}
