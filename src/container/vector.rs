//! # Vector - Index-Keyed Container with Entry Actions
//!
//! Like a map keyed by an unsigned position index. Clear and delete
//! actions identify their slot by index alone and carry no payload; the
//! sorting flag tells consumers that insert/delete shift later indices.

use crate::container::{ContainerType, OpaqueData};
use crate::decode::DecodeIterator;
use crate::encode::{EncodeIterator, EncodeState, FrameKind, MarkKind};
use crate::error::{CodecError, Result};
use crate::wire::MAX_U30;
use num_enum::TryFromPrimitive;

const HAS_SET_DEFS: u8 = 0x01;
const HAS_SUMMARY_DATA: u8 = 0x02;
const HAS_PER_ENTRY_PERM_DATA: u8 = 0x04;
const HAS_TOTAL_COUNT_HINT: u8 = 0x08;
const SUPPORTS_SORTING: u8 = 0x10;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum VectorEntryAction {
    Update = 1,
    Set = 2,
    /// Empties the slot; no payload bytes.
    Clear = 3,
    Insert = 4,
    /// Removes the slot; no payload bytes.
    Delete = 5,
}

impl VectorEntryAction {
    fn carries_payload(self) -> bool {
        !matches!(self, VectorEntryAction::Clear | VectorEntryAction::Delete)
    }
}

const ENTRY_HAS_PERM_DATA: u8 = 0x10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vector<'a> {
    pub container_type: ContainerType,
    pub set_defs: Option<&'a [u8]>,
    pub summary: OpaqueData<'a>,
    pub total_count_hint: Option<u32>,
    pub supports_sorting: bool,
    pub per_entry_perm_data: bool,
}

impl<'a> Vector<'a> {
    pub fn new(container_type: ContainerType) -> Self {
        Vector {
            container_type,
            set_defs: None,
            summary: OpaqueData::None,
            total_count_hint: None,
            supports_sorting: false,
            per_entry_perm_data: false,
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
        if self.per_entry_perm_data {
            flags |= HAS_PER_ENTRY_PERM_DATA;
        }
        if self.total_count_hint.is_some() {
            flags |= HAS_TOTAL_COUNT_HINT;
        }
        if self.supports_sorting {
            flags |= SUPPORTS_SORTING;
        }
        flags
    }

    pub fn encode_init(&self, iter: &mut EncodeIterator<'_>) -> Result<()> {
        let start = iter.position();
        iter.push_frame(FrameKind::Vector, start)?;
        match self.write_header(iter) {
            Ok(()) => Ok(()),
            Err(e) => {
                iter.rollback_frame(FrameKind::Vector);
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
                let frame = iter.frame_mut(FrameKind::Vector);
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
        let frame = iter.frame_mut(FrameKind::Vector);
        frame.count_pos = Some(count_pos);
        frame.state = EncodeState::Entries;
        Ok(())
    }

    pub fn encode_summary_complete(
        &self,
        iter: &mut EncodeIterator<'_>,
        success: bool,
    ) -> Result<()> {
        let frame = iter.frame_mut(FrameKind::Vector);
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
            iter.rollback_frame(FrameKind::Vector);
            return Ok(());
        }
        let frame = iter.pop_frame(FrameKind::Vector);
        if frame.entry_mark.is_some() {
            panic!("vector completed with an entry or summary still open");
        }
        if let Some(count_pos) = frame.count_pos {
            iter.patch_u16(count_pos, frame.count);
        }
        Ok(())
    }

    pub fn decode(iter: &mut DecodeIterator<'a>) -> Result<Vector<'a>> {
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
        iter.push_frame(FrameKind::Vector, end, count)?;
        Ok(Vector {
            container_type,
            set_defs,
            summary,
            total_count_hint,
            supports_sorting: flags & SUPPORTS_SORTING != 0,
            per_entry_perm_data: flags & HAS_PER_ENTRY_PERM_DATA != 0,
        })
    }
}

/// One vector entry at an explicit index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorEntry<'a> {
    pub action: VectorEntryAction,
    pub index: u32,
    pub perm_data: Option<&'a [u8]>,
    pub data: &'a [u8],
}

impl<'a> VectorEntry<'a> {
    pub fn new(action: VectorEntryAction, index: u32) -> Self {
        VectorEntry {
            action,
            index,
            perm_data: None,
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

    fn write_prefix(&self, iter: &mut EncodeIterator<'_>) -> Result<()> {
        iter.put_u8(self.lead_byte())?;
        iter.put_u30rb(self.index)?;
        if let Some(perm) = self.perm_data {
            iter.put_b15(perm)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.index > MAX_U30 {
            return Err(CodecError::InvalidArgument("vector index exceeds 30 bits"));
        }
        if !self.action.carries_payload() && !self.data.is_empty() {
            return Err(CodecError::InvalidArgument(
                "clear and delete entries carry no payload",
            ));
        }
        Ok(())
    }

    /// Encode with `self.data` as the pre-encoded payload.
    pub fn encode(&self, iter: &mut EncodeIterator<'_>) -> Result<()> {
        Self::checked_entry(iter)?;
        self.validate()?;
        let entry = *self;
        iter.with_rollback(|it| {
            entry.write_prefix(it)?;
            if entry.action.carries_payload() {
                it.put_b16(entry.data)?;
            }
            Ok(())
        })?;
        iter.frame_mut(FrameKind::Vector).count += 1;
        Ok(())
    }

    /// Open the entry for a nested container encode.
    pub fn encode_init(&self, iter: &mut EncodeIterator<'_>) -> Result<()> {
        Self::checked_entry(iter)?;
        self.validate()?;
        if !self.action.carries_payload() {
            return Err(CodecError::InvalidArgument(
                "clear and delete entries carry no payload",
            ));
        }
        let entry = *self;
        let entry_start = iter.position();
        let mark = iter.with_rollback(|it| {
            entry.write_prefix(it)?;
            it.reserve(MarkKind::B16)
        })?;
        let frame = iter.frame_mut(FrameKind::Vector);
        frame.entry_mark = Some(mark);
        frame.entry_start = entry_start;
        frame.state = EncodeState::EntryOpen;
        Ok(())
    }

    pub fn encode_complete(iter: &mut EncodeIterator<'_>, success: bool) -> Result<()> {
        let frame = iter.frame_mut(FrameKind::Vector);
        if frame.state != EncodeState::EntryOpen {
            panic!("vector entry complete without a matching entry init");
        }
        let mark = match frame.entry_mark.take() {
            Some(mark) => mark,
            None => unreachable!(),
        };
        let entry_start = frame.entry_start;
        frame.state = EncodeState::Entries;
        if success {
            iter.finish_mark(mark)?;
            iter.frame_mut(FrameKind::Vector).count += 1;
        } else {
            iter.set_position(entry_start);
        }
        Ok(())
    }

    fn checked_entry(iter: &mut EncodeIterator<'_>) -> Result<()> {
        let frame = iter.frame_mut(FrameKind::Vector);
        match frame.state {
            EncodeState::EntryOpen => panic!("vector entry encode while another entry is open"),
            EncodeState::SummaryData => {
                panic!("vector entry encode while summary data is pending")
            }
            _ => {}
        }
        if frame.count == u16::MAX {
            return Err(CodecError::InvalidArgument("vector entry count overflow"));
        }
        Ok(())
    }

    pub fn decode(
        iter: &mut DecodeIterator<'a>,
        vector: &Vector<'_>,
    ) -> Result<Option<VectorEntry<'a>>> {
        if !iter.next_entry(FrameKind::Vector)? {
            return Ok(None);
        }
        let lead = iter.get_u8()?;
        let action = VectorEntryAction::try_from(lead & 0x0F)
            .map_err(|_| CodecError::InvalidData("unrecognized vector entry action"))?;
        let index = iter.get_u30rb()?;
        let perm_data = if lead & ENTRY_HAS_PERM_DATA != 0 {
            Some(iter.get_b15()?)
        } else {
            None
        };
        let data = if !action.carries_payload()
            || vector.container_type == ContainerType::NoData
        {
            &[] as &[u8]
        } else {
            iter.get_b16()?
        };
        let end = iter.position();
        iter.set_entry_end(FrameKind::Vector, end);
        iter.set_position(end - data.len());
        Ok(Some(VectorEntry { action, index, perm_data, data }))
    }
}
