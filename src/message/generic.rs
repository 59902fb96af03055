//! Generic message: bidirectional traffic on an established stream that
//! fits no other class. Domain semantics own the payload entirely.

use crate::container::{ContainerType, OpaqueData};
use crate::decode::DecodeIterator;
use crate::encode::{EncodeIterator, FrameKind};
use crate::error::{CodecError, Result};
use crate::message::{self, MsgClass, MsgKey, MsgStep};

const HAS_EXTENDED_HEADER: u16 = 0x001;
const HAS_PERM_DATA: u16 = 0x002;
const HAS_MSG_KEY: u16 = 0x004;
const HAS_SEQ_NUM: u16 = 0x008;
const MESSAGE_COMPLETE: u16 = 0x010;
const HAS_SECONDARY_SEQ_NUM: u16 = 0x020;
const HAS_PART_NUM: u16 = 0x040;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericMsg<'a> {
    pub domain_type: u8,
    pub stream_id: i32,
    pub container_type: ContainerType,
    pub seq_num: Option<u32>,
    /// Echo of the peer's sequence number, for request/response pairing
    /// over one stream.
    pub secondary_seq_num: Option<u32>,
    pub perm_data: Option<&'a [u8]>,
    pub key: Option<MsgKey<'a>>,
    pub extended_header: OpaqueData<'a>,
    pub part_num: Option<u16>,
    pub message_complete: bool,
    pub payload: &'a [u8],
}

impl<'a> GenericMsg<'a> {
    pub fn new(domain_type: u8, stream_id: i32) -> Self {
        GenericMsg {
            domain_type,
            stream_id,
            container_type: ContainerType::NoData,
            seq_num: None,
            secondary_seq_num: None,
            perm_data: None,
            key: None,
            extended_header: OpaqueData::None,
            part_num: None,
            message_complete: true,
            payload: b"",
        }
    }

    fn flags(&self) -> u16 {
        let mut flags = 0;
        if self.extended_header.is_present() {
            flags |= HAS_EXTENDED_HEADER;
        }
        if self.perm_data.is_some() {
            flags |= HAS_PERM_DATA;
        }
        if self.key.is_some() {
            flags |= HAS_MSG_KEY;
        }
        if self.seq_num.is_some() {
            flags |= HAS_SEQ_NUM;
        }
        if self.message_complete {
            flags |= MESSAGE_COMPLETE;
        }
        if self.secondary_seq_num.is_some() {
            flags |= HAS_SECONDARY_SEQ_NUM;
        }
        if self.part_num.is_some() {
            flags |= HAS_PART_NUM;
        }
        flags
    }

    /// One-call encode for messages whose payload is already encoded and
    /// whose nested scopes are not [`OpaqueData::Pending`].
    pub fn encode(&self, iter: &mut EncodeIterator<'_>) -> Result<()> {
        let step = self.encode_init(iter)?;
        if step != MsgStep::Payload {
            iter.rollback_frame(FrameKind::Msg);
            return Err(CodecError::InvalidArgument(
                "pending scopes require staged encode calls",
            ));
        }
        if let Err(e) = iter.put_bytes(self.payload) {
            iter.rollback_frame(FrameKind::Msg);
            return Err(e);
        }
        Self::encode_complete(iter, true)
    }

    pub fn encode_init(&self, iter: &mut EncodeIterator<'_>) -> Result<MsgStep> {
        iter.push_frame(FrameKind::Msg, iter.position())?;
        match self.write_header(iter) {
            Ok(step) => Ok(step),
            Err(e) => {
                iter.rollback_frame(FrameKind::Msg);
                Err(e)
            }
        }
    }

    fn write_header(&self, iter: &mut EncodeIterator<'_>) -> Result<MsgStep> {
        message::write_prolog(iter, MsgClass::Generic, self.domain_type, self.stream_id)?;
        iter.put_u15rb(self.flags() as usize)?;
        iter.put_u8(self.container_type.to_wire())?;
        if let Some(seq) = self.seq_num {
            iter.put_u32(seq)?;
        }
        if let Some(seq) = self.secondary_seq_num {
            iter.put_u32(seq)?;
        }
        if let Some(perm) = self.perm_data {
            iter.put_b15(perm)?;
        }
        if message::encode_key(iter, &self.key)? {
            return Ok(MsgStep::KeyAttrib);
        }
        self.finish_after_key(iter)
    }

    fn finish_after_key(&self, iter: &mut EncodeIterator<'_>) -> Result<MsgStep> {
        if message::encode_ext_header(iter, &self.extended_header)? {
            return Ok(MsgStep::ExtendedHeader);
        }
        self.finish_after_ext(iter)
    }

    fn finish_after_ext(&self, iter: &mut EncodeIterator<'_>) -> Result<MsgStep> {
        if let Some(part) = self.part_num {
            iter.put_u15rb(part as usize)?;
        }
        message::enter_payload(iter)?;
        Ok(MsgStep::Payload)
    }

    /// Resume after the caller encoded the key attrib in place. `false`
    /// erases the whole message and returns `Ok(None)`.
    pub fn encode_key_attrib_complete(
        &self,
        iter: &mut EncodeIterator<'_>,
        success: bool,
    ) -> Result<Option<MsgStep>> {
        let (attrib, key) = message::take_attrib_marks(iter);
        if !success {
            iter.rollback_frame(FrameKind::Msg);
            return Ok(None);
        }
        let step = iter
            .finish_mark(attrib)
            .and_then(|_| iter.finish_mark(key))
            .and_then(|_| self.finish_after_key(iter));
        match step {
            Ok(step) => Ok(Some(step)),
            Err(e) => {
                iter.rollback_frame(FrameKind::Msg);
                Err(e)
            }
        }
    }

    /// Resume after the caller encoded the extended header in place.
    pub fn encode_extended_header_complete(
        &self,
        iter: &mut EncodeIterator<'_>,
        success: bool,
    ) -> Result<Option<MsgStep>> {
        let mark = message::take_ext_mark(iter);
        if !success {
            iter.rollback_frame(FrameKind::Msg);
            return Ok(None);
        }
        let step = iter
            .finish_mark(mark)
            .and_then(|_| self.finish_after_ext(iter));
        match step {
            Ok(step) => Ok(Some(step)),
            Err(e) => {
                iter.rollback_frame(FrameKind::Msg);
                Err(e)
            }
        }
    }

    pub fn encode_complete(iter: &mut EncodeIterator<'_>, success: bool) -> Result<()> {
        message::complete(iter, success)
    }

    pub(crate) fn decode_header(
        iter: &mut DecodeIterator<'a>,
        domain_type: u8,
        stream_id: i32,
        header_end: usize,
    ) -> Result<Self> {
        let flags = iter.get_u15rb()?;
        let container_type = ContainerType::from_wire(iter.get_u8()?)?;
        let mut msg = GenericMsg::new(domain_type, stream_id);
        msg.container_type = container_type;
        if flags & HAS_SEQ_NUM != 0 {
            msg.seq_num = Some(iter.get_u32()?);
        }
        if flags & HAS_SECONDARY_SEQ_NUM != 0 {
            msg.secondary_seq_num = Some(iter.get_u32()?);
        }
        if flags & HAS_PERM_DATA != 0 {
            msg.perm_data = Some(iter.get_b15()?);
        }
        if flags & HAS_MSG_KEY != 0 {
            msg.key = Some(MsgKey::decode(iter)?);
        }
        if flags & HAS_EXTENDED_HEADER != 0 {
            msg.extended_header = OpaqueData::PreEncoded(iter.get_b8()?);
        }
        if flags & HAS_PART_NUM != 0 && iter.position() < header_end {
            msg.part_num = Some(iter.get_u15rb()?);
        }
        msg.message_complete = flags & MESSAGE_COMPLETE != 0;
        Ok(msg)
    }
}
