//! # Container Codecs - Structured Collections
//!
//! ## Purpose
//!
//! The seven wire containers and their entry types. All share one
//! protocol: `encode_init` writes the fixed header and opens a frame on
//! the [`EncodeIterator`], entries are encoded one at a time, and
//! `encode_complete(success)` back-patches counts and size marks or rolls
//! the whole container back. Decoding mirrors it: `decode` validates the
//! header and opens a frame on the [`DecodeIterator`], entry decodes walk
//! forward lazily and return `Ok(None)` at exhaustion.
//!
//! ## Differentiators
//!
//! | Container | Entry identity | Notes |
//! |---|---|---|
//! | [`FieldList`] | numeric field id | value type comes from the dictionary |
//! | [`ElementList`] | name + explicit type | self-describing |
//! | [`Map`] | typed key + action | delete entries carry no payload |
//! | [`Series`] | position | homogeneous, no per-entry metadata |
//! | [`Vector`] | numeric index + action | supports-sorting hint |
//! | [`FilterList`] | filter id + action | per-entry container-type override |
//! | [`Array`] | position | primitive items, fixed or variable width |
//!
//! [`EncodeIterator`]: crate::EncodeIterator
//! [`DecodeIterator`]: crate::DecodeIterator

pub mod array;
pub mod element_list;
pub mod field_list;
pub mod filter_list;
pub mod map;
pub mod series;
pub mod vector;

pub use array::{Array, ArrayEntry};
pub use element_list::{ElementEntry, ElementList};
pub use field_list::{FieldEntry, FieldList, FieldLoad};
pub use filter_list::{FilterEntry, FilterEntryAction, FilterList};
pub use map::{Map, MapEntry, MapEntryAction};
pub use series::{Series, SeriesEntry};
pub use vector::{Vector, VectorEntry, VectorEntryAction};

use crate::error::{CodecError, Result};
use crate::primitive::DataType;
use num_enum::TryFromPrimitive;

/// Types allowed as container payloads. Shares the numbering space of
/// [`DataType`] from 128 up; on the wire the byte is stored offset by the
/// container-type floor.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum ContainerType {
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

/// Offset subtracted from container-type values when stored in a single
/// header byte.
const CONTAINER_TYPE_MIN: u8 = 128;

impl ContainerType {
    /// Header-byte form.
    pub(crate) fn to_wire(self) -> u8 {
        self as u8 - CONTAINER_TYPE_MIN
    }

    pub(crate) fn from_wire(byte: u8) -> Result<ContainerType> {
        let raw = (byte as u16) + CONTAINER_TYPE_MIN as u16;
        if raw > u8::MAX as u16 {
            return Err(CodecError::UnknownType(byte));
        }
        ContainerType::try_from(raw as u8).map_err(|_| CodecError::UnknownType(byte))
    }

    pub fn as_data_type(self) -> DataType {
        match self {
            ContainerType::NoData => DataType::NoData,
            ContainerType::Opaque => DataType::Opaque,
            ContainerType::Xml => DataType::Xml,
            ContainerType::FieldList => DataType::FieldList,
            ContainerType::ElementList => DataType::ElementList,
            ContainerType::AnsiPage => DataType::AnsiPage,
            ContainerType::FilterList => DataType::FilterList,
            ContainerType::Vector => DataType::Vector,
            ContainerType::Map => DataType::Map,
            ContainerType::Series => DataType::Series,
            ContainerType::Msg => DataType::Msg,
        }
    }
}

/// How the bytes of a nested scope (summary data, message key attrib,
/// extended header) are supplied at encode time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OpaqueData<'a> {
    /// Scope absent; its flag bit stays clear.
    #[default]
    None,
    /// Caller supplies already-encoded bytes, spliced verbatim.
    PreEncoded(&'a [u8]),
    /// Caller encodes the scope in place between init and the matching
    /// complete call.
    Pending,
}

impl<'a> OpaqueData<'a> {
    pub fn is_present(&self) -> bool {
        !matches!(self, OpaqueData::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_type_wire_offset() {
        assert_eq!(ContainerType::FieldList.to_wire(), 4);
        assert_eq!(ContainerType::from_wire(4).unwrap(), ContainerType::FieldList);
        assert_eq!(ContainerType::from_wire(13).unwrap(), ContainerType::Msg);
        assert_eq!(ContainerType::NoData.to_wire(), 0);
    }

    #[test]
    fn unknown_container_byte_rejected() {
        assert!(matches!(
            ContainerType::from_wire(0x7F),
            Err(CodecError::UnknownType(0x7F))
        ));
    }
}
