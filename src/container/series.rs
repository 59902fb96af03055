//! # Series - Homogeneous Positional Container
//!
//! Entries are bare payloads of one declared container type, identified
//! only by position. Used for table-shaped data where every row has the
//! same schema (the schema itself often rides in the summary data).

use crate::container::{ContainerType, OpaqueData};
use crate::decode::DecodeIterator;
use crate::encode::{EncodeIterator, EncodeState, FrameKind, MarkKind};
use crate::error::{CodecError, Result};

const HAS_SET_DEFS: u8 = 0x01;
const HAS_SUMMARY_DATA: u8 = 0x02;
const HAS_TOTAL_COUNT_HINT: u8 = 0x04;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Series<'a> {
    pub container_type: ContainerType,
    pub set_defs: Option<&'a [u8]>,
    pub summary: OpaqueData<'a>,
    pub total_count_hint: Option<u32>,
}

impl<'a> Series<'a> {
    pub fn new(container_type: ContainerType) -> Self {
        Series {
            container_type,
            set_defs: None,
            summary: OpaqueData::None,
            total_count_hint: None,
        }
    }

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
        if self.total_count_hint.is_some() {
            flags |= HAS_TOTAL_COUNT_HINT;
        }
        flags
    }

    pub fn encode_init(&self, iter: &mut EncodeIterator<'_>) -> Result<()> {
        let start = iter.position();
        iter.push_frame(FrameKind::Series, start)?;
        match self.write_header(iter) {
            Ok(()) => Ok(()),
            Err(e) => {
                iter.rollback_frame(FrameKind::Series);
                Err(e)
            }
        }
    }

    fn write_header(&self, iter: &mut EncodeIterator<'_>) -> Result<()> {
        iter.put_u8(self.flags())?;
        iter.put_u8(self.container_type.to_wire())?;
        if let Some(defs) = self.set_defs {
            iter.put_b15(defs)?;
        }
        match self.summary {
            OpaqueData::None => {}
            OpaqueData::PreEncoded(bytes) => iter.put_b15(bytes)?,
            OpaqueData::Pending => {
                let mark = iter.reserve(MarkKind::B15)?;
                let frame = iter.frame_mut(FrameKind::Series);
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
        let frame = iter.frame_mut(FrameKind::Series);
        frame.count_pos = Some(count_pos);
        frame.state = EncodeState::Entries;
        Ok(())
    }

    pub fn encode_summary_complete(
        &self,
        iter: &mut EncodeIterator<'_>,
        success: bool,
    ) -> Result<()> {
        let frame = iter.frame_mut(FrameKind::Series);
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

    pub fn encode_complete(iter: &mut EncodeIterator<'_>, success: bool) -> Result<()> {
        if !success {
            iter.rollback_frame(FrameKind::Series);
            return Ok(());
        }
        let frame = iter.pop_frame(FrameKind::Series);
        if frame.entry_mark.is_some() {
            panic!("series completed with an entry or summary still open");
        }
        if let Some(count_pos) = frame.count_pos {
            iter.patch_u16(count_pos, frame.count);
        }
        Ok(())
    }

    pub fn decode(iter: &mut DecodeIterator<'a>) -> Result<Series<'a>> {
        let end = iter.limit();
        let flags = iter.get_u8()?;
        let container_type = ContainerType::from_wire(iter.get_u8()?)?;
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
        iter.push_frame(FrameKind::Series, end, count)?;
        Ok(Series {
            container_type,
            set_defs,
            summary,
            total_count_hint,
        })
    }
}

/// Positional entry: a bare payload of the series' container type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeriesEntry<'a> {
    pub data: &'a [u8],
}

impl<'a> SeriesEntry<'a> {
    /// Splice a pre-encoded row.
    pub fn encode(&self, iter: &mut EncodeIterator<'_>) -> Result<()> {
        Self::checked_entry(iter)?;
        let data = self.data;
        iter.with_rollback(|it| it.put_b16(data))?;
        iter.frame_mut(FrameKind::Series).count += 1;
        Ok(())
    }

    /// Open the entry for a nested container encode.
    pub fn encode_init(iter: &mut EncodeIterator<'_>) -> Result<()> {
        Self::checked_entry(iter)?;
        let entry_start = iter.position();
        let mark = iter.reserve(MarkKind::B16)?;
        let frame = iter.frame_mut(FrameKind::Series);
        frame.entry_mark = Some(mark);
        frame.entry_start = entry_start;
        frame.state = EncodeState::EntryOpen;
        Ok(())
    }

    pub fn encode_complete(iter: &mut EncodeIterator<'_>, success: bool) -> Result<()> {
        let frame = iter.frame_mut(FrameKind::Series);
        if frame.state != EncodeState::EntryOpen {
            panic!("series entry complete without a matching entry init");
        }
        let mark = match frame.entry_mark.take() {
            Some(mark) => mark,
            None => unreachable!(),
        };
        let entry_start = frame.entry_start;
        frame.state = EncodeState::Entries;
        if success {
            iter.finish_mark(mark)?;
            iter.frame_mut(FrameKind::Series).count += 1;
        } else {
            iter.set_position(entry_start);
        }
        Ok(())
    }

    fn checked_entry(iter: &mut EncodeIterator<'_>) -> Result<()> {
        let frame = iter.frame_mut(FrameKind::Series);
        match frame.state {
            EncodeState::EntryOpen => panic!("series entry encode while another entry is open"),
            EncodeState::SummaryData => {
                panic!("series entry encode while summary data is pending")
            }
            _ => {}
        }
        if frame.count == u16::MAX {
            return Err(CodecError::InvalidArgument("series entry count overflow"));
        }
        Ok(())
    }

    pub fn decode(iter: &mut DecodeIterator<'a>) -> Result<Option<SeriesEntry<'a>>> {
        if !iter.next_entry(FrameKind::Series)? {
            return Ok(None);
        }
        let data = iter.get_b16()?;
        let end = iter.position();
        iter.set_entry_end(FrameKind::Series, end);
        iter.set_position(end - data.len());
        Ok(Some(SeriesEntry { data }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{ElementEntry, ElementList};
    use crate::primitive::PrimitiveValue;

    #[test]
    fn positional_rows_roundtrip() {
        let mut buf = [0u8; 256];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        Series::new(ContainerType::ElementList)
            .encode_init(&mut enc)
            .unwrap();
        for row in 0..3u64 {
            SeriesEntry::encode_init(&mut enc).unwrap();
            ElementList::new().encode_init(&mut enc).unwrap();
            ElementEntry::new(b"row")
                .encode(&mut enc, &PrimitiveValue::UInt(row))
                .unwrap();
            ElementList::encode_complete(&mut enc, true).unwrap();
            SeriesEntry::encode_complete(&mut enc, true).unwrap();
        }
        Series::encode_complete(&mut enc, true).unwrap();

        let encoded = enc.encoded().to_vec();
        let mut dec = DecodeIterator::new(&encoded).unwrap();
        let series = Series::decode(&mut dec).unwrap();
        assert_eq!(series.container_type, ContainerType::ElementList);

        let mut rows = 0u64;
        while let Some(_entry) = SeriesEntry::decode(&mut dec).unwrap() {
            ElementList::decode(&mut dec).unwrap();
            let element = ElementEntry::decode(&mut dec).unwrap().unwrap();
            assert_eq!(
                element.value().unwrap(),
                crate::primitive::Decoded::Value(PrimitiveValue::UInt(rows))
            );
            assert!(ElementEntry::decode(&mut dec).unwrap().is_none());
            rows += 1;
        }
        assert_eq!(rows, 3);
    }

    #[test]
    fn empty_series_roundtrip() {
        let mut buf = [0u8; 32];
        let mut enc = EncodeIterator::new(&mut buf).unwrap();
        Series::new(ContainerType::NoData)
            .encode_init(&mut enc)
            .unwrap();
        Series::encode_complete(&mut enc, true).unwrap();

        let encoded = enc.encoded().to_vec();
        let mut dec = DecodeIterator::new(&encoded).unwrap();
        Series::decode(&mut dec).unwrap();
        assert!(SeriesEntry::decode(&mut dec).unwrap().is_none());
    }
}
