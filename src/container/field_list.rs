//! # FieldList - Dictionary-Keyed Container
//!
//! Entries are identified by a signed field id and carry a bare payload
//! with no type tag; the [`DataDictionary`] supplies the type at load
//! time. This is the densest container and the workhorse of market-data
//! payloads, so its entry overhead is exactly the id plus a length prefix.
//!
//! A field id missing from the dictionary degrades only that entry: the
//! load reports the failure and iteration continues with the next entry.
//!
//! [`DataDictionary`]: crate::dictionary::DataDictionary

use crate::decode::DecodeIterator;
use crate::dictionary::DataDictionary;
use crate::encode::{EncodeIterator, EncodeState, FrameKind, MarkKind};
use crate::error::{CodecError, Result};
use crate::primitive::{DataType, Decoded, PrimitiveValue};
use crate::wire;

const HAS_INFO: u8 = 0x01;
const HAS_SET_DATA: u8 = 0x02;
const HAS_SET_ID: u8 = 0x04;
const HAS_STANDARD_DATA: u8 = 0x08;

/// Optional provenance header naming the dictionary and field-list
/// template the encoder worked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldListInfo {
    pub dictionary_id: u16,
    pub field_list_num: u16,
}

/// Container of dictionary-keyed field entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldList {
    pub info: Option<FieldListInfo>,
}

impl FieldList {
    pub fn new() -> Self {
        FieldList::default()
    }

    pub fn with_info(dictionary_id: u16, field_list_num: u16) -> Self {
        FieldList {
            info: Some(FieldListInfo { dictionary_id, field_list_num }),
        }
    }

    /// Write the header and open the entry frame. Pair with
    /// [`encode_complete`](FieldList::encode_complete).
    pub fn encode_init(&self, iter: &mut EncodeIterator<'_>) -> Result<()> {
        let start = iter.position();
        iter.push_frame(FrameKind::FieldList, start)?;
        match self.write_header(iter) {
            Ok(count_pos) => {
                let frame = iter.frame_mut(FrameKind::FieldList);
                frame.count_pos = Some(count_pos);
                frame.state = EncodeState::Entries;
                Ok(())
            }
            Err(e) => {
                iter.rollback_frame(FrameKind::FieldList);
                Err(e)
            }
        }
    }

    fn write_header(&self, iter: &mut EncodeIterator<'_>) -> Result<usize> {
        let mut flags = HAS_STANDARD_DATA;
        if self.info.is_some() {
            flags |= HAS_INFO;
        }
        iter.put_u8(flags)?;
        if let Some(info) = &self.info {
            let id_width = if info.dictionary_id < 0x80 { 1 } else { 2 };
            iter.put_u8(id_width + 2)?;
            iter.put_u15rb(info.dictionary_id as usize)?;
            iter.put_u16(info.field_list_num)?;
        }
        let count_pos = iter.position();
        iter.put_u16(0)?;
        Ok(count_pos)
    }

    /// Back-patch the entry count, or roll the whole container back when
    /// `success` is false.
    pub fn encode_complete(iter: &mut EncodeIterator<'_>, success: bool) -> Result<()> {
        if !success {
            iter.rollback_frame(FrameKind::FieldList);
            return Ok(());
        }
        let frame = iter.pop_frame(FrameKind::FieldList);
        if frame.entry_mark.is_some() {
            panic!("field list completed with an entry still open");
        }
        if let Some(count_pos) = frame.count_pos {
            iter.patch_u16(count_pos, frame.count);
        }
        Ok(())
    }

    /// Validate the header and open the entry frame on `iter`.
    pub fn decode(iter: &mut DecodeIterator<'_>) -> Result<FieldList> {
        let end = iter.limit();
        let flags = iter.get_u8()?;
        let info = if flags & HAS_INFO != 0 {
            let raw = iter.get_b8()?;
            let (dictionary_id, next) = wire::get_u15rb(raw, 0)?;
            let (field_list_num, _) = wire::get_u16(raw, next)?;
            Some(FieldListInfo { dictionary_id, field_list_num })
        } else {
            None
        };
        // Set-definition data is carried but not interpreted; skip it so
        // the standard entries line up.
        if flags & HAS_SET_ID != 0 {
            iter.get_u15rb()?;
        }
        if flags & HAS_SET_DATA != 0 {
            if flags & HAS_STANDARD_DATA != 0 {
                iter.get_b15()?;
            } else {
                iter.get_rest()?;
            }
        }
        let count = if flags & HAS_STANDARD_DATA != 0 {
            iter.get_u16()?
        } else {
            0
        };
        iter.push_frame(FrameKind::FieldList, end, count)?;
        Ok(FieldList { info })
    }
}

/// Result of resolving one field entry against the dictionary.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldLoad<'a> {
    /// Dictionary declared a primitive type; payload decoded (or blank).
    Value(Decoded<PrimitiveValue<'a>>),
    /// Dictionary declared a container type; payload bytes for nested
    /// decoding.
    Container(DataType, &'a [u8]),
    /// This entry could not be resolved; iteration continues regardless.
    Error(CodecError),
}

/// One field entry. `data` is empty on the encode side and borrows the
/// wire payload after decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldEntry<'a> {
    pub field_id: i16,
    pub data: &'a [u8],
}

impl FieldEntry<'static> {
    pub fn new(field_id: i16) -> Self {
        FieldEntry { field_id, data: &[] }
    }
}

impl<'a> FieldEntry<'a> {
    /// Encode the entry with a primitive payload.
    pub fn encode(&self, iter: &mut EncodeIterator<'_>, value: &PrimitiveValue<'_>) -> Result<()> {
        let field_id = self.field_id;
        Self::checked_entry(iter)?;
        iter.with_rollback(|it| {
            it.put_i16(field_id)?;
            let mark = it.reserve(MarkKind::B16)?;
            it.put_primitive_ls(value)?;
            it.finish_mark(mark)
        })?;
        iter.frame_mut(FrameKind::FieldList).count += 1;
        Ok(())
    }

    /// Encode the entry blank: a zero-length payload.
    pub fn encode_blank(&self, iter: &mut EncodeIterator<'_>) -> Result<()> {
        let field_id = self.field_id;
        Self::checked_entry(iter)?;
        iter.with_rollback(|it| {
            it.put_i16(field_id)?;
            it.put_u16ob(0)
        })?;
        iter.frame_mut(FrameKind::FieldList).count += 1;
        Ok(())
    }

    /// Splice an already-encoded payload verbatim. Produces bytes
    /// identical to encoding the same logical value structurally.
    pub fn encode_pre_encoded(&self, iter: &mut EncodeIterator<'_>, data: &[u8]) -> Result<()> {
        let field_id = self.field_id;
        Self::checked_entry(iter)?;
        iter.with_rollback(|it| {
            it.put_i16(field_id)?;
            it.put_b16(data)
        })?;
        iter.frame_mut(FrameKind::FieldList).count += 1;
        Ok(())
    }

    /// Open the entry for a nested container encode. Pair with
    /// [`encode_complete`](FieldEntry::encode_complete).
    pub fn encode_init(&self, iter: &mut EncodeIterator<'_>) -> Result<()> {
        let field_id = self.field_id;
        Self::checked_entry(iter)?;
        let entry_start = iter.position();
        let mark = iter.with_rollback(|it| {
            it.put_i16(field_id)?;
            it.reserve(MarkKind::B16)
        })?;
        let frame = iter.frame_mut(FrameKind::FieldList);
        frame.entry_mark = Some(mark);
        frame.entry_start = entry_start;
        frame.state = EncodeState::EntryOpen;
        Ok(())
    }

    /// Close a nested-encode entry, patching its length or erasing it.
    pub fn encode_complete(iter: &mut EncodeIterator<'_>, success: bool) -> Result<()> {
        let frame = iter.frame_mut(FrameKind::FieldList);
        let mark = match frame.entry_mark.take() {
            Some(mark) => mark,
            None => panic!("field entry complete without a matching entry init"),
        };
        let entry_start = frame.entry_start;
        frame.state = EncodeState::Entries;
        if success {
            iter.finish_mark(mark)?;
            iter.frame_mut(FrameKind::FieldList).count += 1;
        } else {
            iter.set_position(entry_start);
        }
        Ok(())
    }

    fn checked_entry(iter: &mut EncodeIterator<'_>) -> Result<()> {
        let frame = iter.frame_mut(FrameKind::FieldList);
        if frame.state == EncodeState::EntryOpen {
            panic!("field entry encode while another entry is open");
        }
        if frame.count == u16::MAX {
            return Err(CodecError::InvalidArgument("field list entry count overflow"));
        }
        Ok(())
    }

    /// Next entry of the field list open on `iter`, or `None` at
    /// exhaustion. Leaves the cursor at the payload start so a nested
    /// container can be decoded in place.
    pub fn decode(iter: &mut DecodeIterator<'a>) -> Result<Option<FieldEntry<'a>>> {
        if !iter.next_entry(FrameKind::FieldList)? {
            return Ok(None);
        }
        let field_id = iter.get_i16()?;
        let data = iter.get_b16()?;
        let end = iter.position();
        iter.set_entry_end(FrameKind::FieldList, end);
        iter.set_position(end - data.len());
        Ok(Some(FieldEntry { field_id, data }))
    }

    /// Resolve the payload against the dictionary. Unknown ids and
    /// malformed payloads degrade to [`FieldLoad::Error`] so the caller
    /// can keep iterating.
    pub fn load(&self, dictionary: &DataDictionary) -> FieldLoad<'a> {
        let data_type = match dictionary.field_type(self.field_id) {
            Some(ty) => ty,
            None => {
                #[cfg(feature = "observability")]
                tracing::debug!(field_id = self.field_id, "field id not in dictionary");
                return FieldLoad::Error(CodecError::FieldIdNotFound { field_id: self.field_id });
            }
        };
        if data_type.is_container() {
            return FieldLoad::Container(data_type, self.data);
        }
        match PrimitiveValue::decode(data_type, self.data) {
            Ok(decoded) => FieldLoad::Value(decoded),
            Err(e) => FieldLoad::Error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{Real, RealHint};

    fn dict() -> DataDictionary {
        let mut dict = DataDictionary::new();
        dict.add_field(1, "PROD_PERM", DataType::UInt, 5);
        dict.add_field(22, "BID", DataType::Real, 17);
        dict.add_field(3, "DSPLY_NAME", DataType::RmtesString, 16);
        dict
    }

    #[test]
    fn roundtrip_with_info() {
        let dict = dict();
        let mut buf = [0u8; 128];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        FieldList::with_info(1, 99).encode_init(&mut enc).unwrap();
        FieldEntry::new(1)
            .encode(&mut enc, &PrimitiveValue::UInt(4975))
            .unwrap();
        FieldEntry::new(22)
            .encode(&mut enc, &PrimitiveValue::Real(Real::new(227, RealHint::ExponentNeg2)))
            .unwrap();
        FieldEntry::new(3)
            .encode(&mut enc, &PrimitiveValue::RmtesString(b"TRI.N"))
            .unwrap();
        FieldList::encode_complete(&mut enc, true).unwrap();

        let encoded = enc.encoded().to_vec();
        let mut dec = DecodeIterator::new(&encoded).unwrap();
        let list = FieldList::decode(&mut dec).unwrap();
        assert_eq!(list.info, Some(FieldListInfo { dictionary_id: 1, field_list_num: 99 }));

        let mut seen = Vec::new();
        while let Some(entry) = FieldEntry::decode(&mut dec).unwrap() {
            seen.push((entry.field_id, entry.load(&dict)));
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(
            seen[0].1,
            FieldLoad::Value(Decoded::Value(PrimitiveValue::UInt(4975)))
        );
        assert_eq!(
            seen[1].1,
            FieldLoad::Value(Decoded::Value(PrimitiveValue::Real(Real::new(
                227,
                RealHint::ExponentNeg2
            ))))
        );
        assert_eq!(
            seen[2].1,
            FieldLoad::Value(Decoded::Value(PrimitiveValue::RmtesString(b"TRI.N")))
        );
    }

    #[test]
    fn unknown_field_id_degrades_only_that_entry() {
        let dict = dict();
        let mut buf = [0u8; 64];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        FieldList::new().encode_init(&mut enc).unwrap();
        FieldEntry::new(-100)
            .encode(&mut enc, &PrimitiveValue::UInt(7))
            .unwrap();
        FieldEntry::new(1)
            .encode(&mut enc, &PrimitiveValue::UInt(8))
            .unwrap();
        FieldList::encode_complete(&mut enc, true).unwrap();

        let encoded = enc.encoded().to_vec();
        let mut dec = DecodeIterator::new(&encoded).unwrap();
        FieldList::decode(&mut dec).unwrap();

        let first = FieldEntry::decode(&mut dec).unwrap().unwrap();
        assert!(matches!(
            first.load(&dict),
            FieldLoad::Error(CodecError::FieldIdNotFound { field_id: -100 })
        ));
        let second = FieldEntry::decode(&mut dec).unwrap().unwrap();
        assert_eq!(
            second.load(&dict),
            FieldLoad::Value(Decoded::Value(PrimitiveValue::UInt(8)))
        );
        assert!(FieldEntry::decode(&mut dec).unwrap().is_none());
    }

    #[test]
    fn blank_field_loads_blank() {
        let dict = dict();
        let mut buf = [0u8; 32];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        FieldList::new().encode_init(&mut enc).unwrap();
        FieldEntry::new(22).encode_blank(&mut enc).unwrap();
        FieldList::encode_complete(&mut enc, true).unwrap();

        let encoded = enc.encoded().to_vec();
        let mut dec = DecodeIterator::new(&encoded).unwrap();
        FieldList::decode(&mut dec).unwrap();
        let entry = FieldEntry::decode(&mut dec).unwrap().unwrap();
        assert_eq!(entry.load(&dict), FieldLoad::Value(Decoded::Blank));
    }

    #[test]
    fn aborted_container_leaves_no_bytes() {
        let mut buf = [0u8; 64];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        enc.put_u8(0x55).unwrap();
        let before = enc.encoded_len();
        FieldList::new().encode_init(&mut enc).unwrap();
        FieldEntry::new(1)
            .encode(&mut enc, &PrimitiveValue::UInt(1))
            .unwrap();
        FieldList::encode_complete(&mut enc, false).unwrap();
        assert_eq!(enc.encoded_len(), before);
        assert_eq!(enc.depth(), 0);
    }

    #[test]
    fn pre_encoded_matches_structural() {
        let value = PrimitiveValue::UInt(4975);
        let mut payload = [0u8; 16];
        let end = match value {
            PrimitiveValue::UInt(v) => crate::wire::put_uint_ls(&mut payload, 0, v).unwrap(),
            _ => unreachable!(),
        };

        let mut a = [0u8; 64];
        let mut enc = EncodeIterator::new(&mut a).unwrap();
        FieldList::new().encode_init(&mut enc).unwrap();
        FieldEntry::new(1).encode(&mut enc, &value).unwrap();
        FieldList::encode_complete(&mut enc, true).unwrap();
        let structural = enc.encoded().to_vec();

        let mut b = [0u8; 64];
        let mut enc = EncodeIterator::new(&mut b).unwrap();
        FieldList::new().encode_init(&mut enc).unwrap();
        FieldEntry::new(1)
            .encode_pre_encoded(&mut enc, &payload[..end])
            .unwrap();
        FieldList::encode_complete(&mut enc, true).unwrap();
        assert_eq!(enc.encoded(), structural.as_slice());
    }

    #[test]
    fn nested_field_list_in_field_list() {
        let mut buf = [0u8; 128];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        FieldList::new().encode_init(&mut enc).unwrap();
        FieldEntry::new(1)
            .encode(&mut enc, &PrimitiveValue::UInt(1))
            .unwrap();
        FieldEntry::new(200).encode_init(&mut enc).unwrap();
        FieldList::new().encode_init(&mut enc).unwrap();
        FieldEntry::new(22)
            .encode(&mut enc, &PrimitiveValue::UInt(9))
            .unwrap();
        FieldList::encode_complete(&mut enc, true).unwrap();
        FieldEntry::encode_complete(&mut enc, true).unwrap();
        FieldList::encode_complete(&mut enc, true).unwrap();

        let encoded = enc.encoded().to_vec();
        let mut dec = DecodeIterator::new(&encoded).unwrap();
        FieldList::decode(&mut dec).unwrap();
        let outer_first = FieldEntry::decode(&mut dec).unwrap().unwrap();
        assert_eq!(outer_first.field_id, 1);
        let nested = FieldEntry::decode(&mut dec).unwrap().unwrap();
        assert_eq!(nested.field_id, 200);
        // Decode the nested list in place on the same iterator.
        FieldList::decode(&mut dec).unwrap();
        let inner = FieldEntry::decode(&mut dec).unwrap().unwrap();
        assert_eq!(inner.field_id, 22);
        assert!(FieldEntry::decode(&mut dec).unwrap().is_none());
        assert!(FieldEntry::decode(&mut dec).unwrap().is_none());
    }
}
