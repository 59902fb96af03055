//! Post message: consumer-sourced content pushed upstream onto an item or
//! the whole service. Carries the posting user's identity unconditionally
//! so providers can attribute and entitle the contribution.

use crate::container::{ContainerType, OpaqueData};
use crate::decode::DecodeIterator;
use crate::encode::{EncodeIterator, FrameKind};
use crate::error::{CodecError, Result};
use crate::message::{self, MsgClass, MsgKey, MsgStep, PostUserInfo};

const HAS_EXTENDED_HEADER: u16 = 0x001;
const HAS_POST_ID: u16 = 0x002;
const HAS_MSG_KEY: u16 = 0x004;
const HAS_SEQ_NUM: u16 = 0x008;
const POST_COMPLETE: u16 = 0x010;
const ACK: u16 = 0x020;
const HAS_PERM_DATA: u16 = 0x040;
const HAS_PART_NUM: u16 = 0x080;
const HAS_POST_USER_RIGHTS: u16 = 0x100;

/// What the posting user is allowed to do, as a bit set.
pub mod post_user_rights {
    pub const NONE: u16 = 0;
    pub const CREATE: u16 = 0x01;
    pub const DELETE: u16 = 0x02;
    pub const MODIFY_PERM: u16 = 0x04;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostMsg<'a> {
    pub domain_type: u8,
    pub stream_id: i32,
    pub container_type: ContainerType,
    pub post_user_info: PostUserInfo,
    pub seq_num: Option<u32>,
    /// Correlates the provider's ack back to this post.
    pub post_id: Option<u32>,
    pub perm_data: Option<&'a [u8]>,
    pub key: Option<MsgKey<'a>>,
    pub extended_header: OpaqueData<'a>,
    pub part_num: Option<u16>,
    pub post_user_rights: Option<u16>,
    pub post_complete: bool,
    pub ack: bool,
    pub payload: &'a [u8],
}

impl<'a> PostMsg<'a> {
    pub fn new(domain_type: u8, stream_id: i32, post_user_info: PostUserInfo) -> Self {
        PostMsg {
            domain_type,
            stream_id,
            container_type: ContainerType::NoData,
            post_user_info,
            seq_num: None,
            post_id: None,
            perm_data: None,
            key: None,
            extended_header: OpaqueData::None,
            part_num: None,
            post_user_rights: None,
            post_complete: true,
            ack: false,
            payload: b"",
        }
    }

    fn flags(&self) -> u16 {
        let mut flags = 0;
        if self.extended_header.is_present() {
            flags |= HAS_EXTENDED_HEADER;
        }
        if self.post_id.is_some() {
            flags |= HAS_POST_ID;
        }
        if self.key.is_some() {
            flags |= HAS_MSG_KEY;
        }
        if self.seq_num.is_some() {
            flags |= HAS_SEQ_NUM;
        }
        if self.post_complete {
            flags |= POST_COMPLETE;
        }
        if self.ack {
            flags |= ACK;
        }
        if self.perm_data.is_some() {
            flags |= HAS_PERM_DATA;
        }
        if self.part_num.is_some() {
            flags |= HAS_PART_NUM;
        }
        if self.post_user_rights.is_some() {
            flags |= HAS_POST_USER_RIGHTS;
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
        message::write_prolog(iter, MsgClass::Post, self.domain_type, self.stream_id)?;
        iter.put_u15rb(self.flags() as usize)?;
        iter.put_u8(self.container_type.to_wire())?;
        iter.put_u32(self.post_user_info.user_addr)?;
        iter.put_u32(self.post_user_info.user_id)?;
        if let Some(seq) = self.seq_num {
            iter.put_u32(seq)?;
        }
        if let Some(id) = self.post_id {
            iter.put_u32(id)?;
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
        if let Some(rights) = self.post_user_rights {
            iter.put_u15rb(rights as usize)?;
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
        let info = PostUserInfo {
            user_addr: iter.get_u32()?,
            user_id: iter.get_u32()?,
        };
        let mut msg = PostMsg::new(domain_type, stream_id, info);
        msg.container_type = container_type;
        if flags & HAS_SEQ_NUM != 0 {
            msg.seq_num = Some(iter.get_u32()?);
        }
        if flags & HAS_POST_ID != 0 {
            msg.post_id = Some(iter.get_u32()?);
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
        if flags & HAS_POST_USER_RIGHTS != 0 && iter.position() < header_end {
            msg.post_user_rights = Some(iter.get_u15rb()?);
        }
        msg.post_complete = flags & POST_COMPLETE != 0;
        msg.ack = flags & ACK != 0;
        Ok(msg)
    }
}
