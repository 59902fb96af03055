//! Status message: a change in stream or item-group health without a new
//! image. Unlike a refresh, both state and group id are optional here.

use crate::container::{ContainerType, OpaqueData};
use crate::decode::DecodeIterator;
use crate::encode::{EncodeIterator, FrameKind};
use crate::error::{CodecError, Result};
use crate::message::{self, MsgClass, MsgKey, MsgStep, PostUserInfo};
use crate::State;

const HAS_EXTENDED_HEADER: u16 = 0x001;
const HAS_PERM_DATA: u16 = 0x002;
const HAS_MSG_KEY: u16 = 0x008;
const HAS_GROUP_ID: u16 = 0x010;
const HAS_STATE: u16 = 0x020;
const CLEAR_CACHE: u16 = 0x040;
const PRIVATE_STREAM: u16 = 0x080;
const HAS_POST_USER_INFO: u16 = 0x100;
const QUALIFIED_STREAM: u16 = 0x200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMsg<'a> {
    pub domain_type: u8,
    pub stream_id: i32,
    pub container_type: ContainerType,
    pub state: Option<State<'a>>,
    pub group_id: Option<&'a [u8]>,
    pub perm_data: Option<&'a [u8]>,
    pub key: Option<MsgKey<'a>>,
    pub extended_header: OpaqueData<'a>,
    pub post_user_info: Option<PostUserInfo>,
    pub clear_cache: bool,
    pub private_stream: bool,
    pub qualified_stream: bool,
    pub payload: &'a [u8],
}

impl<'a> StatusMsg<'a> {
    pub fn new(domain_type: u8, stream_id: i32) -> Self {
        StatusMsg {
            domain_type,
            stream_id,
            container_type: ContainerType::NoData,
            state: None,
            group_id: None,
            perm_data: None,
            key: None,
            extended_header: OpaqueData::None,
            post_user_info: None,
            clear_cache: false,
            private_stream: false,
            qualified_stream: false,
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
        if self.group_id.is_some() {
            flags |= HAS_GROUP_ID;
        }
        if self.state.is_some() {
            flags |= HAS_STATE;
        }
        if self.clear_cache {
            flags |= CLEAR_CACHE;
        }
        if self.private_stream {
            flags |= PRIVATE_STREAM;
        }
        if self.post_user_info.is_some() {
            flags |= HAS_POST_USER_INFO;
        }
        if self.qualified_stream {
            flags |= QUALIFIED_STREAM;
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
        message::write_prolog(iter, MsgClass::Status, self.domain_type, self.stream_id)?;
        iter.put_u15rb(self.flags() as usize)?;
        iter.put_u8(self.container_type.to_wire())?;
        if let Some(state) = &self.state {
            message::put_state(iter, state)?;
        }
        if let Some(group) = self.group_id {
            iter.put_b8(group)?;
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
        if let Some(info) = self.post_user_info {
            iter.put_u32(info.user_addr)?;
            iter.put_u32(info.user_id)?;
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
        let mut msg = StatusMsg::new(domain_type, stream_id);
        msg.container_type = container_type;
        if flags & HAS_STATE != 0 {
            msg.state = Some(message::get_state(iter)?);
        }
        if flags & HAS_GROUP_ID != 0 {
            msg.group_id = Some(iter.get_b8()?);
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
        if flags & HAS_POST_USER_INFO != 0 && iter.position() < header_end {
            msg.post_user_info = Some(PostUserInfo {
                user_addr: iter.get_u32()?,
                user_id: iter.get_u32()?,
            });
        }
        msg.clear_cache = flags & CLEAR_CACHE != 0;
        msg.private_stream = flags & PRIVATE_STREAM != 0;
        msg.qualified_stream = flags & QUALIFIED_STREAM != 0;
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{domain, Msg};
    use crate::{state_code, DataState, StreamState};

    #[test]
    fn closed_recover_status_roundtrip() {
        let mut status = StatusMsg::new(domain::MARKET_PRICE, 5);
        status.state = Some(State {
            stream_state: StreamState::ClosedRecover,
            data_state: DataState::Suspect,
            code: state_code::TIMEOUT,
            text: b"source down",
        });
        status.group_id = Some(&[0, 3]);

        let mut buf = [0u8; 96];
        let mut iter = EncodeIterator::new(&mut buf).unwrap();
        status.encode(&mut iter).unwrap();
        let encoded = iter.encoded().to_vec();

        let mut dec = DecodeIterator::new(&encoded).unwrap();
        match Msg::decode(&mut dec).unwrap() {
            Msg::Status(decoded) => assert_eq!(decoded, status),
            other => panic!("wrong class: {:?}", other.msg_class()),
        }
    }

    #[test]
    fn bare_status_has_empty_header_extras() {
        let status = StatusMsg::new(domain::SOURCE, 2);
        let mut buf = [0u8; 32];
        let mut iter = EncodeIterator::new(&mut buf).unwrap();
        status.encode(&mut iter).unwrap();
        let encoded = iter.encoded().to_vec();

        let mut dec = DecodeIterator::new(&encoded).unwrap();
        match Msg::decode(&mut dec).unwrap() {
            Msg::Status(decoded) => {
                assert!(decoded.state.is_none());
                assert!(decoded.group_id.is_none());
                assert_eq!(decoded, status);
            }
            other => panic!("wrong class: {:?}", other.msg_class()),
        }
    }
}
