//! # Data Dictionary - Field Metadata Lookup
//!
//! ## Purpose
//!
//! Field lists carry numeric ids and raw payloads; the dictionary is the
//! out-of-band metadata that says what type each id decodes as and what an
//! enumeration index displays as. The codec only ever reads it, so a
//! populated dictionary shared behind `&` or `Arc` serves any number of
//! concurrently decoding threads.
//!
//! Dictionary *file* parsing (the RDMFieldDictionary / enumtype.def text
//! formats) is out of scope; entries are populated programmatically.

use std::collections::HashMap;

use crate::error::{CodecError, Result};
use crate::primitive::DataType;

/// Metadata for one field id.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldDefinition {
    pub field_id: i16,
    pub name: String,
    pub data_type: DataType,
    /// Suggested display width; advisory, never enforced on the wire.
    pub length: u16,
}

/// Field-id keyed metadata plus enum display tables.
#[derive(Debug, Clone, Default)]
pub struct DataDictionary {
    fields: HashMap<i16, FieldDefinition>,
    enums: HashMap<(i16, u16), String>,
}

impl DataDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field definition. A re-declared id replaces the earlier
    /// definition.
    pub fn add_field(
        &mut self,
        field_id: i16,
        name: impl Into<String>,
        data_type: DataType,
        length: u16,
    ) {
        self.fields.insert(
            field_id,
            FieldDefinition {
                field_id,
                name: name.into(),
                data_type,
                length,
            },
        );
    }

    /// Register one display string of an enumerated field.
    pub fn add_enum_value(&mut self, field_id: i16, value: u16, display: impl Into<String>) {
        self.enums.insert((field_id, value), display.into());
    }

    pub fn field(&self, field_id: i16) -> Option<&FieldDefinition> {
        self.fields.get(&field_id)
    }

    /// Declared wire type of `field_id`, if the id is known.
    pub fn field_type(&self, field_id: i16) -> Option<DataType> {
        self.fields.get(&field_id).map(|f| f.data_type)
    }

    pub fn field_name(&self, field_id: i16) -> Option<&str> {
        self.fields.get(&field_id).map(|f| f.name.as_str())
    }

    pub fn field_length(&self, field_id: i16) -> Option<u16> {
        self.fields.get(&field_id).map(|f| f.length)
    }

    /// Display string for an enumerated field's raw index. Fails
    /// descriptively when the index has no defined display; the raw value
    /// stays readable from the decoded entry.
    pub fn enum_display(&self, field_id: i16, value: u16) -> Result<&str> {
        match self.enums.get(&(field_id, value)) {
            Some(display) => Ok(display.as_str()),
            None => Err(CodecError::UndefinedEnumDisplay { field_id, value }),
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}
