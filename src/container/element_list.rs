//! # ElementList - Self-Describing Named Container
//!
//! Entries carry a name and an explicit type tag, so no dictionary is
//! needed to interpret them. The cost is per-entry overhead; element
//! lists appear mostly in administrative payloads (login attributes,
//! source directories) rather than tick data.

use crate::container::ContainerType;
use crate::decode::DecodeIterator;
use crate::encode::{EncodeIterator, EncodeState, FrameKind, MarkKind};
use crate::error::{CodecError, Result};
use crate::primitive::{DataType, Decoded, PrimitiveValue};
use crate::wire;

const HAS_INFO: u8 = 0x01;
const HAS_SET_DATA: u8 = 0x02;
const HAS_SET_ID: u8 = 0x04;
const HAS_STANDARD_DATA: u8 = 0x08;

/// Container of named, explicitly typed entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElementList {
    /// Template number from the info header, when present.
    pub element_list_num: Option<i16>,
}

impl ElementList {
    pub fn new() -> Self {
        ElementList::default()
    }

    pub fn encode_init(&self, iter: &mut EncodeIterator<'_>) -> Result<()> {
        let start = iter.position();
        iter.push_frame(FrameKind::ElementList, start)?;
        match self.write_header(iter) {
            Ok(count_pos) => {
                let frame = iter.frame_mut(FrameKind::ElementList);
                frame.count_pos = Some(count_pos);
                frame.state = EncodeState::Entries;
                Ok(())
            }
            Err(e) => {
                iter.rollback_frame(FrameKind::ElementList);
                Err(e)
            }
        }
    }

    fn write_header(&self, iter: &mut EncodeIterator<'_>) -> Result<usize> {
        let mut flags = HAS_STANDARD_DATA;
        if self.element_list_num.is_some() {
            flags |= HAS_INFO;
        }
        iter.put_u8(flags)?;
        if let Some(num) = self.element_list_num {
            iter.put_u8(2)?;
            iter.put_i16(num)?;
        }
        let count_pos = iter.position();
        iter.put_u16(0)?;
        Ok(count_pos)
    }

    pub fn encode_complete(iter: &mut EncodeIterator<'_>, success: bool) -> Result<()> {
        if !success {
            iter.rollback_frame(FrameKind::ElementList);
            return Ok(());
        }
        let frame = iter.pop_frame(FrameKind::ElementList);
        if frame.entry_mark.is_some() {
            panic!("element list completed with an entry still open");
        }
        if let Some(count_pos) = frame.count_pos {
            iter.patch_u16(count_pos, frame.count);
        }
        Ok(())
    }

    pub fn decode(iter: &mut DecodeIterator<'_>) -> Result<ElementList> {
        let end = iter.limit();
        let flags = iter.get_u8()?;
        let element_list_num = if flags & HAS_INFO != 0 {
            let raw = iter.get_b8()?;
            let (num, _) = wire::get_i16(raw, 0)?;
            Some(num)
        } else {
            None
        };
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
        iter.push_frame(FrameKind::ElementList, end, count)?;
        Ok(ElementList { element_list_num })
    }
}

/// One named entry. On the encode side only `name` matters; decode fills
/// the type tag and payload from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementEntry<'a> {
    pub name: &'a [u8],
    pub data_type: DataType,
    pub data: &'a [u8],
}

impl<'a> ElementEntry<'a> {
    pub fn new(name: &'a [u8]) -> Self {
        ElementEntry {
            name,
            data_type: DataType::Unknown,
            data: &[],
        }
    }

    pub fn encode(&self, iter: &mut EncodeIterator<'_>, value: &PrimitiveValue<'_>) -> Result<()> {
        let name = self.name;
        let data_type = value.data_type();
        Self::checked_entry(iter)?;
        iter.with_rollback(|it| {
            it.put_b15(name)?;
            it.put_u8(data_type as u8)?;
            let mark = it.reserve(MarkKind::B16)?;
            it.put_primitive_ls(value)?;
            it.finish_mark(mark)
        })?;
        iter.frame_mut(FrameKind::ElementList).count += 1;
        Ok(())
    }

    /// Blank entry of a declared type: zero-length payload.
    pub fn encode_blank(&self, iter: &mut EncodeIterator<'_>, data_type: DataType) -> Result<()> {
        let name = self.name;
        Self::checked_entry(iter)?;
        iter.with_rollback(|it| {
            it.put_b15(name)?;
            it.put_u8(data_type as u8)?;
            it.put_u16ob(0)
        })?;
        iter.frame_mut(FrameKind::ElementList).count += 1;
        Ok(())
    }

    /// Splice an already-encoded payload of the declared type.
    pub fn encode_pre_encoded(
        &self,
        iter: &mut EncodeIterator<'_>,
        data_type: DataType,
        data: &[u8],
    ) -> Result<()> {
        let name = self.name;
        Self::checked_entry(iter)?;
        iter.with_rollback(|it| {
            it.put_b15(name)?;
            it.put_u8(data_type as u8)?;
            it.put_b16(data)
        })?;
        iter.frame_mut(FrameKind::ElementList).count += 1;
        Ok(())
    }

    /// Open the entry for a nested container encode.
    pub fn encode_init(
        &self,
        iter: &mut EncodeIterator<'_>,
        container_type: ContainerType,
    ) -> Result<()> {
        let name = self.name;
        Self::checked_entry(iter)?;
        let entry_start = iter.position();
        let mark = iter.with_rollback(|it| {
            it.put_b15(name)?;
            it.put_u8(container_type.as_data_type() as u8)?;
            it.reserve(MarkKind::B16)
        })?;
        let frame = iter.frame_mut(FrameKind::ElementList);
        frame.entry_mark = Some(mark);
        frame.entry_start = entry_start;
        frame.state = EncodeState::EntryOpen;
        Ok(())
    }

    pub fn encode_complete(iter: &mut EncodeIterator<'_>, success: bool) -> Result<()> {
        let frame = iter.frame_mut(FrameKind::ElementList);
        let mark = match frame.entry_mark.take() {
            Some(mark) => mark,
            None => panic!("element entry complete without a matching entry init"),
        };
        let entry_start = frame.entry_start;
        frame.state = EncodeState::Entries;
        if success {
            iter.finish_mark(mark)?;
            iter.frame_mut(FrameKind::ElementList).count += 1;
        } else {
            iter.set_position(entry_start);
        }
        Ok(())
    }

    fn checked_entry(iter: &mut EncodeIterator<'_>) -> Result<()> {
        let frame = iter.frame_mut(FrameKind::ElementList);
        if frame.state == EncodeState::EntryOpen {
            panic!("element entry encode while another entry is open");
        }
        if frame.count == u16::MAX {
            return Err(CodecError::InvalidArgument("element list entry count overflow"));
        }
        Ok(())
    }

    pub fn decode(iter: &mut DecodeIterator<'a>) -> Result<Option<ElementEntry<'a>>> {
        if !iter.next_entry(FrameKind::ElementList)? {
            return Ok(None);
        }
        let name = iter.get_b15()?;
        let type_byte = iter.get_u8()?;
        let data_type =
            DataType::try_from(type_byte).map_err(|_| CodecError::UnknownType(type_byte))?;
        let data = if data_type == DataType::NoData {
            &[] as &[u8]
        } else {
            iter.get_b16()?
        };
        let end = iter.position();
        iter.set_entry_end(FrameKind::ElementList, end);
        iter.set_position(end - data.len());
        Ok(Some(ElementEntry { name, data_type, data }))
    }

    /// Decode the payload as the tagged primitive type.
    pub fn value(&self) -> Result<Decoded<PrimitiveValue<'a>>> {
        if self.data_type.is_container() {
            return Err(CodecError::InvalidData("entry holds a container, not a primitive"));
        }
        PrimitiveValue::decode(self.data_type, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::Qos;

    #[test]
    fn roundtrip_mixed_types() {
        let mut buf = [0u8; 128];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        ElementList { element_list_num: Some(7) }.encode_init(&mut enc).unwrap();
        ElementEntry::new(b"ApplicationId")
            .encode(&mut enc, &PrimitiveValue::AsciiString(b"256"))
            .unwrap();
        ElementEntry::new(b"SingleOpen")
            .encode(&mut enc, &PrimitiveValue::UInt(1))
            .unwrap();
        ElementEntry::new(b"BestQoS")
            .encode(&mut enc, &PrimitiveValue::Qos(Qos::realtime_tick_by_tick()))
            .unwrap();
        ElementList::encode_complete(&mut enc, true).unwrap();

        let encoded = enc.encoded().to_vec();
        let mut dec = DecodeIterator::new(&encoded).unwrap();
        let list = ElementList::decode(&mut dec).unwrap();
        assert_eq!(list.element_list_num, Some(7));

        let entry = ElementEntry::decode(&mut dec).unwrap().unwrap();
        assert_eq!(entry.name, b"ApplicationId");
        assert_eq!(
            entry.value().unwrap(),
            Decoded::Value(PrimitiveValue::AsciiString(b"256"))
        );
        let entry = ElementEntry::decode(&mut dec).unwrap().unwrap();
        assert_eq!(entry.value().unwrap(), Decoded::Value(PrimitiveValue::UInt(1)));
        let entry = ElementEntry::decode(&mut dec).unwrap().unwrap();
        assert_eq!(entry.data_type, DataType::Qos);
        assert!(ElementEntry::decode(&mut dec).unwrap().is_none());
    }

    #[test]
    fn blank_entry_keeps_type_tag() {
        let mut buf = [0u8; 64];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        ElementList::new().encode_init(&mut enc).unwrap();
        ElementEntry::new(b"Filter")
            .encode_blank(&mut enc, DataType::UInt)
            .unwrap();
        ElementList::encode_complete(&mut enc, true).unwrap();

        let encoded = enc.encoded().to_vec();
        let mut dec = DecodeIterator::new(&encoded).unwrap();
        ElementList::decode(&mut dec).unwrap();
        let entry = ElementEntry::decode(&mut dec).unwrap().unwrap();
        assert_eq!(entry.data_type, DataType::UInt);
        assert_eq!(entry.value().unwrap(), Decoded::Blank);
    }

    #[test]
    fn aborted_entry_erased_but_list_survives() {
        let mut buf = [0u8; 64];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        ElementList::new().encode_init(&mut enc).unwrap();
        ElementEntry::new(b"keep")
            .encode(&mut enc, &PrimitiveValue::UInt(1))
            .unwrap();
        ElementEntry::new(b"drop")
            .encode_init(&mut enc, ContainerType::ElementList)
            .unwrap();
        ElementEntry::encode_complete(&mut enc, false).unwrap();
        ElementList::encode_complete(&mut enc, true).unwrap();

        let encoded = enc.encoded().to_vec();
        let mut dec = DecodeIterator::new(&encoded).unwrap();
        ElementList::decode(&mut dec).unwrap();
        let entry = ElementEntry::decode(&mut dec).unwrap().unwrap();
        assert_eq!(entry.name, b"keep");
        assert!(ElementEntry::decode(&mut dec).unwrap().is_none());
    }
}
