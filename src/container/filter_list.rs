//! # FilterList - Sparse Id-Keyed Container
//!
//! Entries are keyed by a small filter id matching the bit positions of a
//! consumer's filter mask, and each entry may override the list's declared
//! container type. Used for composite payloads where consumers subscribe
//! to subsets (e.g. service info vs. service state).

use crate::container::ContainerType;
use crate::decode::DecodeIterator;
use crate::encode::{EncodeIterator, EncodeState, FrameKind, MarkKind};
use crate::error::{CodecError, Result};
use num_enum::TryFromPrimitive;

const HAS_PER_ENTRY_PERM_DATA: u8 = 0x01;
const HAS_TOTAL_COUNT_HINT: u8 = 0x02;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum FilterEntryAction {
    Update = 1,
    Set = 2,
    /// Empties the entry; no payload bytes.
    Clear = 3,
}

const ENTRY_HAS_PERM_DATA: u8 = 0x10;
const ENTRY_HAS_CONTAINER_TYPE: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterList {
    pub container_type: ContainerType,
    pub total_count_hint: Option<u8>,
    pub per_entry_perm_data: bool,
}

impl FilterList {
    pub fn new(container_type: ContainerType) -> Self {
        FilterList {
            container_type,
            total_count_hint: None,
            per_entry_perm_data: false,
        }
    }

    pub fn encode_init(&self, iter: &mut EncodeIterator<'_>) -> Result<()> {
        let start = iter.position();
        iter.push_frame(FrameKind::FilterList, start)?;
        match self.write_header(iter) {
            Ok(count_pos) => {
                let frame = iter.frame_mut(FrameKind::FilterList);
                frame.count_pos = Some(count_pos);
                frame.state = EncodeState::Entries;
                Ok(())
            }
            Err(e) => {
                iter.rollback_frame(FrameKind::FilterList);
                Err(e)
            }
        }
    }

    fn write_header(&self, iter: &mut EncodeIterator<'_>) -> Result<usize> {
        let mut flags = 0;
        if self.per_entry_perm_data {
            flags |= HAS_PER_ENTRY_PERM_DATA;
        }
        if self.total_count_hint.is_some() {
            flags |= HAS_TOTAL_COUNT_HINT;
        }
        iter.put_u8(flags)?;
        iter.put_u8(self.container_type.to_wire())?;
        if let Some(hint) = self.total_count_hint {
            iter.put_u8(hint)?;
        }
        let count_pos = iter.position();
        iter.put_u8(0)?;
        Ok(count_pos)
    }

    pub fn encode_complete(iter: &mut EncodeIterator<'_>, success: bool) -> Result<()> {
        if !success {
            iter.rollback_frame(FrameKind::FilterList);
            return Ok(());
        }
        let frame = iter.pop_frame(FrameKind::FilterList);
        if frame.entry_mark.is_some() {
            panic!("filter list completed with an entry still open");
        }
        if let Some(count_pos) = frame.count_pos {
            iter.patch_u8(count_pos, frame.count as u8);
        }
        Ok(())
    }

    pub fn decode(iter: &mut DecodeIterator<'_>) -> Result<FilterList> {
        let end = iter.limit();
        let flags = iter.get_u8()?;
        let container_type = ContainerType::from_wire(iter.get_u8()?)?;
        let total_count_hint = if flags & HAS_TOTAL_COUNT_HINT != 0 {
            Some(iter.get_u8()?)
        } else {
            None
        };
        let count = iter.get_u8()?;
        iter.push_frame(FrameKind::FilterList, end, count as u16)?;
        Ok(FilterList {
            container_type,
            total_count_hint,
            per_entry_perm_data: flags & HAS_PER_ENTRY_PERM_DATA != 0,
        })
    }
}

/// One filter entry. `container_type` overrides the list's declared type
/// when set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterEntry<'a> {
    pub action: FilterEntryAction,
    pub id: u8,
    pub container_type: Option<ContainerType>,
    pub perm_data: Option<&'a [u8]>,
    pub data: &'a [u8],
}

impl<'a> FilterEntry<'a> {
    pub fn new(action: FilterEntryAction, id: u8) -> Self {
        FilterEntry {
            action,
            id,
            container_type: None,
            perm_data: None,
            data: &[],
        }
    }

    /// Payload type this entry carries, given the list's declared type.
    pub fn effective_type(&self, list: &FilterList) -> ContainerType {
        self.container_type.unwrap_or(list.container_type)
    }

    fn lead_byte(&self) -> u8 {
        let mut byte = self.action as u8;
        if self.perm_data.is_some() {
            byte |= ENTRY_HAS_PERM_DATA;
        }
        if self.container_type.is_some() {
            byte |= ENTRY_HAS_CONTAINER_TYPE;
        }
        byte
    }

    fn write_prefix(&self, iter: &mut EncodeIterator<'_>) -> Result<()> {
        iter.put_u8(self.lead_byte())?;
        iter.put_u8(self.id)?;
        if let Some(ty) = self.container_type {
            iter.put_u8(ty.to_wire())?;
        }
        if let Some(perm) = self.perm_data {
            iter.put_b15(perm)?;
        }
        Ok(())
    }

    fn carries_payload(&self, declared: ContainerType) -> bool {
        self.action != FilterEntryAction::Clear
            && self.container_type.unwrap_or(declared) != ContainerType::NoData
    }

    /// Encode with `self.data` as the pre-encoded payload. `declared` is
    /// the list's container type, needed to decide payload presence.
    pub fn encode(&self, iter: &mut EncodeIterator<'_>, declared: ContainerType) -> Result<()> {
        Self::checked_entry(iter)?;
        let carries = self.carries_payload(declared);
        if !carries && !self.data.is_empty() {
            return Err(CodecError::InvalidArgument(
                "clear or no-data entries carry no payload",
            ));
        }
        let entry = *self;
        iter.with_rollback(|it| {
            entry.write_prefix(it)?;
            if carries {
                it.put_b16(entry.data)?;
            }
            Ok(())
        })?;
        iter.frame_mut(FrameKind::FilterList).count += 1;
        Ok(())
    }

    /// Open the entry for a nested container encode.
    pub fn encode_init(&self, iter: &mut EncodeIterator<'_>, declared: ContainerType) -> Result<()> {
        Self::checked_entry(iter)?;
        if !self.carries_payload(declared) {
            return Err(CodecError::InvalidArgument(
                "clear or no-data entries carry no payload",
            ));
        }
        let entry = *self;
        let entry_start = iter.position();
        let mark = iter.with_rollback(|it| {
            entry.write_prefix(it)?;
            it.reserve(MarkKind::B16)
        })?;
        let frame = iter.frame_mut(FrameKind::FilterList);
        frame.entry_mark = Some(mark);
        frame.entry_start = entry_start;
        frame.state = EncodeState::EntryOpen;
        Ok(())
    }

    pub fn encode_complete(iter: &mut EncodeIterator<'_>, success: bool) -> Result<()> {
        let frame = iter.frame_mut(FrameKind::FilterList);
        if frame.state != EncodeState::EntryOpen {
            panic!("filter entry complete without a matching entry init");
        }
        let mark = match frame.entry_mark.take() {
            Some(mark) => mark,
            None => unreachable!(),
        };
        let entry_start = frame.entry_start;
        frame.state = EncodeState::Entries;
        if success {
            iter.finish_mark(mark)?;
            iter.frame_mut(FrameKind::FilterList).count += 1;
        } else {
            iter.set_position(entry_start);
        }
        Ok(())
    }

    fn checked_entry(iter: &mut EncodeIterator<'_>) -> Result<()> {
        let frame = iter.frame_mut(FrameKind::FilterList);
        if frame.state == EncodeState::EntryOpen {
            panic!("filter entry encode while another entry is open");
        }
        if frame.count == u8::MAX as u16 {
            return Err(CodecError::InvalidArgument("filter list entry count overflow"));
        }
        Ok(())
    }

    pub fn decode(
        iter: &mut DecodeIterator<'a>,
        list: &FilterList,
    ) -> Result<Option<FilterEntry<'a>>> {
        if !iter.next_entry(FrameKind::FilterList)? {
            return Ok(None);
        }
        let lead = iter.get_u8()?;
        let action = FilterEntryAction::try_from(lead & 0x0F)
            .map_err(|_| CodecError::InvalidData("unrecognized filter entry action"))?;
        let id = iter.get_u8()?;
        let container_type = if lead & ENTRY_HAS_CONTAINER_TYPE != 0 {
            Some(ContainerType::from_wire(iter.get_u8()?)?)
        } else {
            None
        };
        let perm_data = if lead & ENTRY_HAS_PERM_DATA != 0 {
            Some(iter.get_b15()?)
        } else {
            None
        };
        let effective = container_type.unwrap_or(list.container_type);
        let data = if action == FilterEntryAction::Clear || effective == ContainerType::NoData {
            &[] as &[u8]
        } else {
            iter.get_b16()?
        };
        let end = iter.position();
        iter.set_entry_end(FrameKind::FilterList, end);
        iter.set_position(end - data.len());
        Ok(Some(FilterEntry {
            action,
            id,
            container_type,
            perm_data,
            data,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{ElementEntry, ElementList, FieldEntry, FieldList};
    use crate::primitive::PrimitiveValue;

    #[test]
    fn per_entry_type_override_roundtrip() {
        let mut buf = [0u8; 256];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        let list = FilterList {
            total_count_hint: Some(2),
            ..FilterList::new(ContainerType::FieldList)
        };
        list.encode_init(&mut enc).unwrap();

        // Entry 1: the list's declared type.
        FilterEntry::new(FilterEntryAction::Set, 1)
            .encode_init(&mut enc, list.container_type)
            .unwrap();
        FieldList::new().encode_init(&mut enc).unwrap();
        FieldEntry::new(1)
            .encode(&mut enc, &PrimitiveValue::UInt(1))
            .unwrap();
        FieldList::encode_complete(&mut enc, true).unwrap();
        FilterEntry::encode_complete(&mut enc, true).unwrap();

        // Entry 2: overrides to an element list.
        FilterEntry {
            container_type: Some(ContainerType::ElementList),
            ..FilterEntry::new(FilterEntryAction::Set, 2)
        }
        .encode_init(&mut enc, list.container_type)
        .unwrap();
        ElementList::new().encode_init(&mut enc).unwrap();
        ElementEntry::new(b"Name")
            .encode(&mut enc, &PrimitiveValue::AsciiString(b"DIRECT_FEED"))
            .unwrap();
        ElementList::encode_complete(&mut enc, true).unwrap();
        FilterEntry::encode_complete(&mut enc, true).unwrap();

        FilterList::encode_complete(&mut enc, true).unwrap();

        let encoded = enc.encoded().to_vec();
        let mut dec = DecodeIterator::new(&encoded).unwrap();
        let decoded = FilterList::decode(&mut dec).unwrap();
        assert_eq!(decoded.container_type, ContainerType::FieldList);
        assert_eq!(decoded.total_count_hint, Some(2));

        let entry = FilterEntry::decode(&mut dec, &decoded).unwrap().unwrap();
        assert_eq!(entry.id, 1);
        assert_eq!(entry.effective_type(&decoded), ContainerType::FieldList);

        let entry = FilterEntry::decode(&mut dec, &decoded).unwrap().unwrap();
        assert_eq!(entry.id, 2);
        assert_eq!(entry.effective_type(&decoded), ContainerType::ElementList);
        ElementList::decode(&mut dec).unwrap();
        let element = ElementEntry::decode(&mut dec).unwrap().unwrap();
        assert_eq!(element.name, b"Name");
        assert!(ElementEntry::decode(&mut dec).unwrap().is_none());

        assert!(FilterEntry::decode(&mut dec, &decoded).unwrap().is_none());
    }

    #[test]
    fn clear_entry_has_no_payload() {
        let mut buf = [0u8; 64];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        let list = FilterList::new(ContainerType::ElementList);
        list.encode_init(&mut enc).unwrap();
        FilterEntry::new(FilterEntryAction::Clear, 3)
            .encode(&mut enc, list.container_type)
            .unwrap();
        FilterList::encode_complete(&mut enc, true).unwrap();

        let encoded = enc.encoded().to_vec();
        let mut dec = DecodeIterator::new(&encoded).unwrap();
        let decoded = FilterList::decode(&mut dec).unwrap();
        let entry = FilterEntry::decode(&mut dec, &decoded).unwrap().unwrap();
        assert_eq!(entry.action, FilterEntryAction::Clear);
        assert!(entry.data.is_empty());
    }
}
