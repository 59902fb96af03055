//! # Map - Keyed Container with Entry Actions
//!
//! Entries pair a primitive key of one declared type with a payload of one
//! declared container type, under an action telling the consumer how to
//! apply them. Delete entries identify their victim by key alone and carry
//! no payload bytes at all.
//!
//! Summary data, when present, sits between the header and the entries and
//! holds one instance of the payload container type describing the map as
//! a whole.

use crate::container::{ContainerType, OpaqueData};
use crate::decode::DecodeIterator;
use crate::encode::{EncodeIterator, EncodeState, FrameKind, MarkKind};
use crate::error::{CodecError, Result};
use crate::primitive::{DataType, Decoded, PrimitiveValue};
use num_enum::TryFromPrimitive;

const HAS_SET_DEFS: u8 = 0x01;
const HAS_SUMMARY_DATA: u8 = 0x02;
const HAS_PER_ENTRY_PERM_DATA: u8 = 0x04;
const HAS_TOTAL_COUNT_HINT: u8 = 0x08;
const HAS_KEY_FIELD_ID: u8 = 0x10;

/// Entry action, low nibble of the entry's lead byte.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum MapEntryAction {
    Update = 1,
    Add = 2,
    /// Key only; no payload bytes on the wire.
    Delete = 3,
}

/// Entry-level flag bits, high nibble of the lead byte.
const ENTRY_HAS_PERM_DATA: u8 = 0x10;

/// Keyed container. `key_type` must be a primitive type; every entry's
/// payload (when present) is of `container_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Map<'a> {
    pub key_type: DataType,
    pub container_type: ContainerType,
    /// Field id the keys correspond to, for dictionary-assisted display.
    pub key_field_id: Option<i16>,
    /// Opaque set-definition blob, carried but not interpreted.
    pub set_defs: Option<&'a [u8]>,
    pub summary: OpaqueData<'a>,
    pub total_count_hint: Option<u32>,
    /// Declares that entries may carry permission data.
    pub per_entry_perm_data: bool,
}

impl<'a> Map<'a> {
    pub fn new(key_type: DataType, container_type: ContainerType) -> Self {
        Map {
            key_type,
            container_type,
            key_field_id: None,
            set_defs: None,
            summary: OpaqueData::None,
            total_count_hint: None,
            per_entry_perm_data: false,
        }
    }

    /// Summary bytes from a decoded map, if any.
    pub fn summary_bytes(&self) -> Option<&'a [u8]> {
        match self.summary {
            OpaqueData::PreEncoded(bytes) => Some(bytes),
            _ => None,
        }
    }

    fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.set_defs.is_some() {
            flags |= HAS_SET_DEFS;
        }
        if self.summary.is_present() {
            flags |= HAS_SUMMARY_DATA;
        }
        if self.per_entry_perm_data {
            flags |= HAS_PER_ENTRY_PERM_DATA;
        }
        if self.total_count_hint.is_some() {
            flags |= HAS_TOTAL_COUNT_HINT;
        }
        if self.key_field_id.is_some() {
            flags |= HAS_KEY_FIELD_ID;
        }
        flags
    }

    /// Write the header and open the entry frame. With
    /// [`OpaqueData::Pending`] summary data the frame stops at the summary
    /// slot; encode the summary container, then call
    /// [`encode_summary_complete`](Map::encode_summary_complete) before any
    /// entries.
    pub fn encode_init(&self, iter: &mut EncodeIterator<'_>) -> Result<()> {
        if !self.key_type.is_primitive() {
            return Err(CodecError::InvalidArgument("map key type must be a primitive"));
        }
        let start = iter.position();
        iter.push_frame(FrameKind::Map, start)?;
        match self.write_header(iter) {
            Ok(()) => Ok(()),
            Err(e) => {
                iter.rollback_frame(FrameKind::Map);
                Err(e)
            }
        }
    }

    fn write_header(&self, iter: &mut EncodeIterator<'_>) -> Result<()> {
        iter.put_u8(self.flags())?;
        iter.put_u8(self.key_type as u8)?;
        iter.put_u8(self.container_type.to_wire())?;
        if let Some(id) = self.key_field_id {
            iter.put_i16(id)?;
        }
        if let Some(defs) = self.set_defs {
            iter.put_b15(defs)?;
        }
        match self.summary {
            OpaqueData::None => {}
            OpaqueData::PreEncoded(bytes) => iter.put_b15(bytes)?,
            OpaqueData::Pending => {
                let mark = iter.reserve(MarkKind::B15)?;
                let frame = iter.frame_mut(FrameKind::Map);
                frame.entry_mark = Some(mark);
                frame.state = EncodeState::SummaryData;
                return Ok(());
            }
        }
        self.write_suffix(iter)
    }

    fn write_suffix(&self, iter: &mut EncodeIterator<'_>) -> Result<()> {
        if let Some(hint) = self.total_count_hint {
            iter.put_u30rb(hint)?;
        }
        let count_pos = iter.position();
        iter.put_u16(0)?;
        let frame = iter.frame_mut(FrameKind::Map);
        frame.count_pos = Some(count_pos);
        frame.state = EncodeState::Entries;
        Ok(())
    }

    /// Close a pending summary scope. On failure the summary bytes are
    /// erased and the header's summary flag cleared; the map itself stays
    /// open for entries either way.
    pub fn encode_summary_complete(
        &self,
        iter: &mut EncodeIterator<'_>,
        success: bool,
    ) -> Result<()> {
        let frame = iter.frame_mut(FrameKind::Map);
        if frame.state != EncodeState::SummaryData {
            panic!("summary complete without a pending summary");
        }
        let mark = match frame.entry_mark.take() {
            Some(mark) => mark,
            None => unreachable!(),
        };
        let flags_pos = frame.start_pos;
        if success {
            iter.finish_mark(mark)?;
        } else {
            iter.set_position(mark.pos);
            let flags = iter.byte_at(flags_pos);
            iter.patch_u8(flags_pos, flags & !HAS_SUMMARY_DATA);
        }
        self.write_suffix(iter)
    }

    /// Back-patch the entry count, or roll the whole map back.
    pub fn encode_complete(iter: &mut EncodeIterator<'_>, success: bool) -> Result<()> {
        if !success {
            iter.rollback_frame(FrameKind::Map);
            return Ok(());
        }
        let frame = iter.pop_frame(FrameKind::Map);
        if frame.entry_mark.is_some() {
            panic!("map completed with an entry or summary still open");
        }
        if let Some(count_pos) = frame.count_pos {
            iter.patch_u16(count_pos, frame.count);
        }
        Ok(())
    }

    pub fn decode(iter: &mut DecodeIterator<'a>) -> Result<Map<'a>> {
        let end = iter.limit();
        let flags = iter.get_u8()?;
        let key_byte = iter.get_u8()?;
        let key_type =
            DataType::try_from(key_byte).map_err(|_| CodecError::UnknownType(key_byte))?;
        if !key_type.is_primitive() {
            return Err(CodecError::UnknownType(key_byte));
        }
        let container_type = ContainerType::from_wire(iter.get_u8()?)?;
        let key_field_id = if flags & HAS_KEY_FIELD_ID != 0 {
            Some(iter.get_i16()?)
        } else {
            None
        };
        let set_defs = if flags & HAS_SET_DEFS != 0 {
            Some(iter.get_b15()?)
        } else {
            None
        };
        let summary = if flags & HAS_SUMMARY_DATA != 0 {
            OpaqueData::PreEncoded(iter.get_b15()?)
        } else {
            OpaqueData::None
        };
        let total_count_hint = if flags & HAS_TOTAL_COUNT_HINT != 0 {
            Some(iter.get_u30rb()?)
        } else {
            None
        };
        let count = iter.get_u16()?;
        iter.push_frame(FrameKind::Map, end, count)?;
        Ok(Map {
            key_type,
            container_type,
            key_field_id,
            set_defs,
            summary,
            total_count_hint,
            per_entry_perm_data: flags & HAS_PER_ENTRY_PERM_DATA != 0,
        })
    }
}

/// One map entry. On decode `key` holds the encoded key payload and
/// `data` the entry payload (empty for delete actions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapEntry<'a> {
    pub action: MapEntryAction,
    pub perm_data: Option<&'a [u8]>,
    pub key: &'a [u8],
    pub data: &'a [u8],
}

impl<'a> MapEntry<'a> {
    pub fn new(action: MapEntryAction) -> Self {
        MapEntry {
            action,
            perm_data: None,
            key: &[],
            data: &[],
        }
    }

    fn lead_byte(&self) -> u8 {
        let mut byte = self.action as u8;
        if self.perm_data.is_some() {
            byte |= ENTRY_HAS_PERM_DATA;
        }
        byte
    }

    fn write_prefix(&self, iter: &mut EncodeIterator<'_>, key: &PrimitiveValue<'_>) -> Result<()> {
        iter.put_u8(self.lead_byte())?;
        if let Some(perm) = self.perm_data {
            iter.put_b15(perm)?;
        }
        let mark = iter.reserve(MarkKind::B15)?;
        iter.put_primitive_ls(key)?;
        iter.finish_mark(mark)
    }

    /// Encode the entry with a structured key and `self.data` as the
    /// pre-encoded payload. Delete entries must carry no payload.
    pub fn encode(&self, iter: &mut EncodeIterator<'_>, key: &PrimitiveValue<'_>) -> Result<()> {
        Self::checked_entry(iter)?;
        if self.action == MapEntryAction::Delete && !self.data.is_empty() {
            return Err(CodecError::InvalidArgument("delete entries carry no payload"));
        }
        let entry = *self;
        iter.with_rollback(|it| {
            entry.write_prefix(it, key)?;
            if entry.action != MapEntryAction::Delete {
                it.put_b16(entry.data)?;
            }
            Ok(())
        })?;
        iter.frame_mut(FrameKind::Map).count += 1;
        Ok(())
    }

    /// Encode with an already-encoded key payload (spliced verbatim).
    pub fn encode_with_encoded_key(&self, iter: &mut EncodeIterator<'_>) -> Result<()> {
        Self::checked_entry(iter)?;
        if self.action == MapEntryAction::Delete && !self.data.is_empty() {
            return Err(CodecError::InvalidArgument("delete entries carry no payload"));
        }
        let entry = *self;
        iter.with_rollback(|it| {
            it.put_u8(entry.lead_byte())?;
            if let Some(perm) = entry.perm_data {
                it.put_b15(perm)?;
            }
            it.put_b15(entry.key)?;
            if entry.action != MapEntryAction::Delete {
                it.put_b16(entry.data)?;
            }
            Ok(())
        })?;
        iter.frame_mut(FrameKind::Map).count += 1;
        Ok(())
    }

    /// Open the entry for a nested container encode of the payload.
    pub fn encode_init(&self, iter: &mut EncodeIterator<'_>, key: &PrimitiveValue<'_>) -> Result<()> {
        Self::checked_entry(iter)?;
        if self.action == MapEntryAction::Delete {
            return Err(CodecError::InvalidArgument("delete entries carry no payload"));
        }
        let entry = *self;
        let entry_start = iter.position();
        let mark = iter.with_rollback(|it| {
            entry.write_prefix(it, key)?;
            it.reserve(MarkKind::B16)
        })?;
        let frame = iter.frame_mut(FrameKind::Map);
        frame.entry_mark = Some(mark);
        frame.entry_start = entry_start;
        frame.state = EncodeState::EntryOpen;
        Ok(())
    }

    pub fn encode_complete(iter: &mut EncodeIterator<'_>, success: bool) -> Result<()> {
        let frame = iter.frame_mut(FrameKind::Map);
        if frame.state != EncodeState::EntryOpen {
            panic!("map entry complete without a matching entry init");
        }
        let mark = match frame.entry_mark.take() {
            Some(mark) => mark,
            None => unreachable!(),
        };
        let entry_start = frame.entry_start;
        frame.state = EncodeState::Entries;
        if success {
            iter.finish_mark(mark)?;
            iter.frame_mut(FrameKind::Map).count += 1;
        } else {
            iter.set_position(entry_start);
        }
        Ok(())
    }

    fn checked_entry(iter: &mut EncodeIterator<'_>) -> Result<()> {
        let frame = iter.frame_mut(FrameKind::Map);
        match frame.state {
            EncodeState::EntryOpen => panic!("map entry encode while another entry is open"),
            EncodeState::SummaryData => {
                panic!("map entry encode while summary data is pending")
            }
            _ => {}
        }
        if frame.count == u16::MAX {
            return Err(CodecError::InvalidArgument("map entry count overflow"));
        }
        Ok(())
    }

    /// Next entry of the map open on `iter`. The map header is needed to
    /// know whether payloads are present at all.
    pub fn decode(iter: &mut DecodeIterator<'a>, map: &Map<'_>) -> Result<Option<MapEntry<'a>>> {
        if !iter.next_entry(FrameKind::Map)? {
            return Ok(None);
        }
        let lead = iter.get_u8()?;
        let action = MapEntryAction::try_from(lead & 0x0F)
            .map_err(|_| CodecError::InvalidData("unrecognized map entry action"))?;
        let perm_data = if lead & ENTRY_HAS_PERM_DATA != 0 {
            Some(iter.get_b15()?)
        } else {
            None
        };
        let key = iter.get_b15()?;
        let data = if action == MapEntryAction::Delete
            || map.container_type == ContainerType::NoData
        {
            &[] as &[u8]
        } else {
            iter.get_b16()?
        };
        let end = iter.position();
        iter.set_entry_end(FrameKind::Map, end);
        iter.set_position(end - data.len());
        Ok(Some(MapEntry { action, perm_data, key, data }))
    }

    /// Decode the key payload as the map's declared key type.
    pub fn key_value(&self, key_type: DataType) -> Result<Decoded<PrimitiveValue<'a>>> {
        PrimitiveValue::decode(key_type, self.key)
    }

    /// Effective payload type: delete entries load as no-data regardless
    /// of the map's declared container type.
    pub fn load(&self, map: &Map<'_>) -> (ContainerType, &'a [u8]) {
        if self.action == MapEntryAction::Delete {
            (ContainerType::NoData, &[])
        } else {
            (map.container_type, self.data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{FieldEntry, FieldList};

    fn encode_inner_field_list(enc: &mut EncodeIterator<'_>) {
        FieldList::new().encode_init(enc).unwrap();
        FieldEntry::new(22)
            .encode(enc, &PrimitiveValue::UInt(42))
            .unwrap();
        FieldList::encode_complete(enc, true).unwrap();
    }

    #[test]
    fn keyed_entries_roundtrip() {
        let mut buf = [0u8; 256];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        let map = Map {
            key_field_id: Some(3),
            total_count_hint: Some(2),
            ..Map::new(DataType::UInt, ContainerType::FieldList)
        };
        map.encode_init(&mut enc).unwrap();
        MapEntry::new(MapEntryAction::Add)
            .encode_init(&mut enc, &PrimitiveValue::UInt(1))
            .unwrap();
        encode_inner_field_list(&mut enc);
        MapEntry::encode_complete(&mut enc, true).unwrap();
        MapEntry::new(MapEntryAction::Delete)
            .encode(&mut enc, &PrimitiveValue::UInt(3))
            .unwrap();
        Map::encode_complete(&mut enc, true).unwrap();

        let encoded = enc.encoded().to_vec();
        let mut dec = DecodeIterator::new(&encoded).unwrap();
        let decoded = Map::decode(&mut dec).unwrap();
        assert_eq!(decoded.key_type, DataType::UInt);
        assert_eq!(decoded.container_type, ContainerType::FieldList);
        assert_eq!(decoded.key_field_id, Some(3));
        assert_eq!(decoded.total_count_hint, Some(2));

        let entry = MapEntry::decode(&mut dec, &decoded).unwrap().unwrap();
        assert_eq!(entry.action, MapEntryAction::Add);
        assert_eq!(
            entry.key_value(decoded.key_type).unwrap(),
            Decoded::Value(PrimitiveValue::UInt(1))
        );
        // Decode the nested field list in place.
        FieldList::decode(&mut dec).unwrap();
        let field = FieldEntry::decode(&mut dec).unwrap().unwrap();
        assert_eq!(field.field_id, 22);
        assert!(FieldEntry::decode(&mut dec).unwrap().is_none());

        let entry = MapEntry::decode(&mut dec, &decoded).unwrap().unwrap();
        assert_eq!(entry.action, MapEntryAction::Delete);
        assert_eq!(entry.load(&decoded), (ContainerType::NoData, &[] as &[u8]));
        assert_eq!(
            entry.key_value(decoded.key_type).unwrap(),
            Decoded::Value(PrimitiveValue::UInt(3))
        );
        assert!(MapEntry::decode(&mut dec, &decoded).unwrap().is_none());
    }

    #[test]
    fn pending_summary_then_entries() {
        let mut buf = [0u8; 256];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        let map = Map {
            summary: OpaqueData::Pending,
            ..Map::new(DataType::AsciiString, ContainerType::FieldList)
        };
        map.encode_init(&mut enc).unwrap();
        encode_inner_field_list(&mut enc);
        map.encode_summary_complete(&mut enc, true).unwrap();
        MapEntry {
            data: &[],
            ..MapEntry::new(MapEntryAction::Add)
        }
        .encode(&mut enc, &PrimitiveValue::AsciiString(b"key"))
        .unwrap();
        Map::encode_complete(&mut enc, true).unwrap();

        let encoded = enc.encoded().to_vec();
        let mut dec = DecodeIterator::new(&encoded).unwrap();
        let decoded = Map::decode(&mut dec).unwrap();
        let summary = decoded.summary_bytes().unwrap();
        // Summary decodes through the normal container routine.
        let mut sum_dec = DecodeIterator::new(summary).unwrap();
        FieldList::decode(&mut sum_dec).unwrap();
        let field = FieldEntry::decode(&mut sum_dec).unwrap().unwrap();
        assert_eq!(field.field_id, 22);

        let entry = MapEntry::decode(&mut dec, &decoded).unwrap().unwrap();
        assert_eq!(entry.key, b"key");
        assert!(MapEntry::decode(&mut dec, &decoded).unwrap().is_none());
    }

    #[test]
    fn abandoned_summary_clears_flag() {
        let mut buf = [0u8; 128];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        let map = Map {
            summary: OpaqueData::Pending,
            ..Map::new(DataType::UInt, ContainerType::NoData)
        };
        map.encode_init(&mut enc).unwrap();
        enc.put_bytes(&[1, 2, 3]).unwrap(); // half-written summary
        map.encode_summary_complete(&mut enc, false).unwrap();
        MapEntry::new(MapEntryAction::Add)
            .encode(&mut enc, &PrimitiveValue::UInt(9))
            .unwrap();
        Map::encode_complete(&mut enc, true).unwrap();

        let encoded = enc.encoded().to_vec();
        let mut dec = DecodeIterator::new(&encoded).unwrap();
        let decoded = Map::decode(&mut dec).unwrap();
        assert!(decoded.summary_bytes().is_none());
        let entry = MapEntry::decode(&mut dec, &decoded).unwrap().unwrap();
        assert_eq!(
            entry.key_value(DataType::UInt).unwrap(),
            Decoded::Value(PrimitiveValue::UInt(9))
        );
    }

    #[test]
    fn delete_with_payload_rejected() {
        let mut buf = [0u8; 64];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        Map::new(DataType::UInt, ContainerType::FieldList)
            .encode_init(&mut enc)
            .unwrap();
        let err = MapEntry {
            data: b"oops",
            ..MapEntry::new(MapEntryAction::Delete)
        }
        .encode(&mut enc, &PrimitiveValue::UInt(1))
        .unwrap_err();
        assert!(matches!(err, CodecError::InvalidArgument(_)));
    }

    #[test]
    fn container_key_type_rejected() {
        let mut buf = [0u8; 64];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        let err = Map::new(DataType::Map, ContainerType::FieldList)
            .encode_init(&mut enc)
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidArgument(_)));
        assert_eq!(enc.depth(), 0);
    }
}
