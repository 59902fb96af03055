//! # Array - Packed Primitive Container
//!
//! A homogeneous list of primitives with no per-entry metadata. A declared
//! item length of zero means each slot carries its own length prefix;
//! otherwise every slot is exactly that many bytes and values must fit the
//! declared width.

use crate::decode::DecodeIterator;
use crate::encode::{EncodeIterator, EncodeState, FrameKind, MarkKind};
use crate::error::{CodecError, Result};
use crate::primitive::{DataType, Decoded, PrimitiveValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Array {
    pub primitive_type: DataType,
    /// Fixed slot width in bytes; 0 selects variable-width slots.
    pub item_length: u16,
}

impl Array {
    pub fn new(primitive_type: DataType) -> Self {
        Array { primitive_type, item_length: 0 }
    }

    pub fn fixed(primitive_type: DataType, item_length: u16) -> Self {
        Array { primitive_type, item_length }
    }

    pub fn is_variable(&self) -> bool {
        self.item_length == 0
    }

    pub fn encode_init(&self, iter: &mut EncodeIterator<'_>) -> Result<()> {
        if !self.primitive_type.is_primitive() {
            return Err(CodecError::InvalidArgument("array items must be primitives"));
        }
        let start = iter.position();
        iter.push_frame(FrameKind::Array, start)?;
        match self.write_header(iter) {
            Ok(count_pos) => {
                let frame = iter.frame_mut(FrameKind::Array);
                frame.count_pos = Some(count_pos);
                frame.state = EncodeState::Entries;
                Ok(())
            }
            Err(e) => {
                iter.rollback_frame(FrameKind::Array);
                Err(e)
            }
        }
    }

    fn write_header(&self, iter: &mut EncodeIterator<'_>) -> Result<usize> {
        iter.put_u8(self.primitive_type as u8)?;
        iter.put_u16ob(self.item_length as usize)?;
        let count_pos = iter.position();
        iter.put_u16(0)?;
        Ok(count_pos)
    }

    /// Encode one slot. The value's type must match the array's declared
    /// type, and fixed-width arrays require a value with a rendering at
    /// that width.
    pub fn encode_entry(&self, iter: &mut EncodeIterator<'_>, value: &PrimitiveValue<'_>) -> Result<()> {
        Self::checked_entry(iter)?;
        if value.data_type() != self.primitive_type {
            return Err(CodecError::InvalidArgument("value type differs from array type"));
        }
        let this = *self;
        iter.with_rollback(|it| {
            if this.is_variable() {
                let mark = it.reserve(MarkKind::B16)?;
                it.put_primitive_ls(value)?;
                it.finish_mark(mark)
            } else {
                it.put_primitive_fixed(value, this.item_length as usize)
            }
        })?;
        iter.frame_mut(FrameKind::Array).count += 1;
        Ok(())
    }

    /// Splice one already-encoded slot.
    pub fn encode_entry_pre_encoded(&self, iter: &mut EncodeIterator<'_>, data: &[u8]) -> Result<()> {
        Self::checked_entry(iter)?;
        if !self.is_variable() && data.len() != self.item_length as usize {
            return Err(CodecError::InvalidArgument("slot bytes differ from declared width"));
        }
        let this = *self;
        iter.with_rollback(|it| {
            if this.is_variable() {
                it.put_b16(data)
            } else {
                it.put_bytes(data)
            }
        })?;
        iter.frame_mut(FrameKind::Array).count += 1;
        Ok(())
    }

    /// Blank slot: only representable in variable-width arrays.
    pub fn encode_entry_blank(&self, iter: &mut EncodeIterator<'_>) -> Result<()> {
        if !self.is_variable() {
            return Err(CodecError::InvalidArgument(
                "fixed-width arrays cannot hold blank slots",
            ));
        }
        self.encode_entry_pre_encoded(iter, &[])
    }

    pub fn encode_complete(iter: &mut EncodeIterator<'_>, success: bool) -> Result<()> {
        if !success {
            iter.rollback_frame(FrameKind::Array);
            return Ok(());
        }
        let frame = iter.pop_frame(FrameKind::Array);
        if let Some(count_pos) = frame.count_pos {
            iter.patch_u16(count_pos, frame.count);
        }
        Ok(())
    }

    fn checked_entry(iter: &mut EncodeIterator<'_>) -> Result<()> {
        let frame = iter.frame_mut(FrameKind::Array);
        if frame.count == u16::MAX {
            return Err(CodecError::InvalidArgument("array entry count overflow"));
        }
        Ok(())
    }

    pub fn decode(iter: &mut DecodeIterator<'_>) -> Result<Array> {
        let end = iter.limit();
        let type_byte = iter.get_u8()?;
        let primitive_type =
            DataType::try_from(type_byte).map_err(|_| CodecError::UnknownType(type_byte))?;
        if !primitive_type.is_primitive() {
            return Err(CodecError::UnknownType(type_byte));
        }
        let item_length = iter.get_u16ob()?;
        let count = iter.get_u16()?;
        iter.push_frame(FrameKind::Array, end, count)?;
        Ok(Array { primitive_type, item_length })
    }
}

/// One decoded array slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayEntry<'a> {
    pub data: &'a [u8],
}

impl<'a> ArrayEntry<'a> {
    pub fn decode(iter: &mut DecodeIterator<'a>, array: &Array) -> Result<Option<ArrayEntry<'a>>> {
        if !iter.next_entry(FrameKind::Array)? {
            return Ok(None);
        }
        let data = if array.is_variable() {
            iter.get_b16()?
        } else {
            iter.get_bytes(array.item_length as usize)?
        };
        let end = iter.position();
        iter.set_entry_end(FrameKind::Array, end);
        Ok(Some(ArrayEntry { data }))
    }

    /// Decode the slot as the array's declared type.
    pub fn value(&self, array: &Array) -> Result<Decoded<PrimitiveValue<'a>>> {
        PrimitiveValue::decode(array.primitive_type, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_width_roundtrip() {
        let mut buf = [0u8; 128];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        let array = Array::new(DataType::AsciiString);
        array.encode_init(&mut enc).unwrap();
        for name in [b"TRI.N".as_slice(), b"IBM.N", b""] {
            array
                .encode_entry(&mut enc, &PrimitiveValue::AsciiString(name))
                .unwrap();
        }
        Array::encode_complete(&mut enc, true).unwrap();

        let encoded = enc.encoded().to_vec();
        let mut dec = DecodeIterator::new(&encoded).unwrap();
        let decoded = Array::decode(&mut dec).unwrap();
        assert!(decoded.is_variable());

        let mut items = Vec::new();
        while let Some(entry) = ArrayEntry::decode(&mut dec, &decoded).unwrap() {
            items.push(entry.value(&decoded).unwrap());
        }
        assert_eq!(
            items,
            vec![
                Decoded::Value(PrimitiveValue::AsciiString(b"TRI.N")),
                Decoded::Value(PrimitiveValue::AsciiString(b"IBM.N")),
                Decoded::Blank,
            ]
        );
    }

    #[test]
    fn fixed_width_roundtrip() {
        let mut buf = [0u8; 64];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        let array = Array::fixed(DataType::UInt, 4);
        array.encode_init(&mut enc).unwrap();
        for v in [0u64, 1, 0xFFFF_FFFF] {
            array.encode_entry(&mut enc, &PrimitiveValue::UInt(v)).unwrap();
        }
        Array::encode_complete(&mut enc, true).unwrap();

        let encoded = enc.encoded().to_vec();
        // Header: type, item length, count; then 3 slots of 4 bytes.
        assert_eq!(encoded.len(), 1 + 1 + 2 + 12);

        let mut dec = DecodeIterator::new(&encoded).unwrap();
        let decoded = Array::decode(&mut dec).unwrap();
        let mut values = Vec::new();
        while let Some(entry) = ArrayEntry::decode(&mut dec, &decoded).unwrap() {
            assert_eq!(entry.data.len(), 4);
            values.push(entry.value(&decoded).unwrap().value().unwrap());
        }
        assert_eq!(
            values,
            vec![
                PrimitiveValue::UInt(0),
                PrimitiveValue::UInt(1),
                PrimitiveValue::UInt(0xFFFF_FFFF)
            ]
        );
    }

    #[test]
    fn oversized_fixed_value_rejected() {
        let mut buf = [0u8; 64];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        let array = Array::fixed(DataType::UInt, 2);
        array.encode_init(&mut enc).unwrap();
        let err = array
            .encode_entry(&mut enc, &PrimitiveValue::UInt(0x1_0000))
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidArgument(_)));
        // The failed slot left no bytes; the array still completes.
        array.encode_entry(&mut enc, &PrimitiveValue::UInt(7)).unwrap();
        Array::encode_complete(&mut enc, true).unwrap();
    }

    #[test]
    fn blank_only_in_variable_arrays() {
        let mut buf = [0u8; 64];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        let array = Array::fixed(DataType::UInt, 2);
        array.encode_init(&mut enc).unwrap();
        assert!(array.encode_entry_blank(&mut enc).is_err());
    }
}
