//! Codec-level errors for wire-format encode and decode
//!
//! Provides the single error taxonomy for the codec. Each variant carries
//! the context needed to act on it: capacity errors report how many bytes
//! were needed versus available, decode errors report the offset of the
//! failure, and the tolerance-path errors (missing field, undefined enum
//! display) identify the offending field id and value.

use thiserror::Error;

/// Errors produced by encode and decode operations.
///
/// Encode-side errors are always recoverable by the caller: roll back the
/// current frame with `encode_complete(false)` and retry with a larger
/// buffer or corrected input. Decode-side errors fail the smallest
/// enclosing frame; where the format permits, bad entries are instead
/// surfaced as per-entry sentinel loads and never reach this type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The encode buffer cannot fit the next write.
    #[error("buffer too small: need {needed} more bytes, {remaining} remaining")]
    BufferTooSmall { needed: usize, remaining: usize },

    /// Caller supplied an inconsistent parameter. Checked before any bytes
    /// are written, so no partial state is left behind.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Wire data ended before the declared structure did.
    #[error("incomplete or corrupt data at offset {offset}")]
    Incomplete { offset: usize },

    /// Container nesting exceeded the iterator's frame stack capacity.
    #[error("container nesting deeper than {max} levels")]
    IteratorOverrun { max: usize },

    /// The iterator was bound with a protocol version this codec does not
    /// speak.
    #[error("unsupported wire version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    /// A type tag on the wire does not name a known data or container type.
    #[error("unknown type tag: {0}")]
    UnknownType(u8),

    /// A field id was not present in the data dictionary.
    #[error("field id {field_id} not found in dictionary")]
    FieldIdNotFound { field_id: i16 },

    /// A typed accessor was used on a blank value.
    #[error("value is blank; no {0} to read")]
    BlankData(&'static str),

    /// An enum value has no display string in the dictionary's enumeration
    /// table. The raw integer remains independently readable.
    #[error("no display string for value {value} of field id {field_id}")]
    UndefinedEnumDisplay { field_id: i16, value: u16 },

    /// Structurally valid bytes carrying a value the format forbids.
    #[error("invalid data: {0}")]
    InvalidData(&'static str),
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
