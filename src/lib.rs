//! # OMM Codec - RWF Binary Encoding
//!
//! ## Purpose
//!
//! Encoder and decoder for the Open Message Model's binary wire format:
//! self-describing messages, nested containers, and compact primitive
//! payloads, built around stateful iterators instead of materialized
//! object trees. Encoding writes into a caller-owned buffer through an
//! [`EncodeIterator`]; decoding walks a borrowed byte slice through a
//! [`DecodeIterator`] without copying payload bytes.
//!
//! ## Layering
//!
//! - [`primitive`]: leaf values (ints, reals, dates, state, qos, strings)
//! - [`container`]: field lists, element lists, maps, series, vectors,
//!   filter lists, and arrays, nestable to a fixed depth
//! - [`message`]: the eight stream-level message classes
//! - [`dictionary`]: field and enum metadata for interpreting field lists
//!
//! ## Example
//!
//! ```
//! use omm_codec::container::{FieldEntry, FieldList};
//! use omm_codec::{DecodeIterator, EncodeIterator, PrimitiveValue, Real, RealHint};
//!
//! let mut buf = [0u8; 64];
//! let mut enc = EncodeIterator::new(&mut buf)?;
//! FieldList::new().encode_init(&mut enc)?;
//! let trdprc = Real::new(227, RealHint::ExponentNeg2);
//! FieldEntry::new(6).encode(&mut enc, &PrimitiveValue::Real(trdprc))?;
//! FieldList::encode_complete(&mut enc, true)?;
//!
//! let encoded = enc.encoded().to_vec();
//! let mut dec = DecodeIterator::new(&encoded)?;
//! let list = FieldList::decode(&mut dec)?;
//! assert!(list.info.is_none());
//! let entry = FieldEntry::decode(&mut dec)?.unwrap();
//! assert_eq!(entry.field_id, 6);
//! # Ok::<(), omm_codec::CodecError>(())
//! ```

pub mod container;
pub mod decode;
pub mod dictionary;
pub mod encode;
pub mod error;
pub mod message;
pub mod primitive;

mod wire;

pub use decode::DecodeIterator;
pub use dictionary::{DataDictionary, FieldDefinition};
pub use encode::EncodeIterator;
pub use error::{CodecError, Result};
pub use primitive::state::state_code;
pub use primitive::{
    DataState, DataType, Date, DateTime, Decoded, PrimitiveValue, Qos, QosRate, QosTimeliness,
    Real, RealHint, State, StreamState, Time,
};

/// Wire format major version this crate speaks. Iterators refuse other
/// majors; minor revisions are additive and pass through.
pub const RWF_MAJOR_VERSION: u8 = 14;
pub const RWF_MINOR_VERSION: u8 = 1;
