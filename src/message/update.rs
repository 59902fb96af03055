//! Update message: an incremental change to a previously refreshed
//! stream. The hot path of a market-data feed, so its header carries the
//! fewest mandatory fields of any class.

use crate::container::{ContainerType, OpaqueData};
use crate::decode::DecodeIterator;
use crate::encode::{EncodeIterator, FrameKind};
use crate::error::{CodecError, Result};
use crate::message::{self, MsgClass, MsgKey, MsgStep, PostUserInfo};

const HAS_EXTENDED_HEADER: u16 = 0x001;
const HAS_PERM_DATA: u16 = 0x002;
const HAS_MSG_KEY: u16 = 0x008;
const HAS_SEQ_NUM: u16 = 0x010;
const HAS_CONF_INFO: u16 = 0x020;
const DO_NOT_CACHE: u16 = 0x040;
const DO_NOT_CONFLATE: u16 = 0x080;
const DO_NOT_RIPPLE: u16 = 0x100;
const HAS_POST_USER_INFO: u16 = 0x200;
const DISCARDABLE: u16 = 0x400;

/// How many updates were folded into this one, and over how many
/// milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct ConflationInfo {
    pub count: u16,
    pub time: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateMsg<'a> {
    pub domain_type: u8,
    pub stream_id: i32,
    pub container_type: ContainerType,
    /// Domain-defined kind of change (trade, quote, ...).
    pub update_type: u8,
    pub seq_num: Option<u32>,
    pub conflation_info: Option<ConflationInfo>,
    pub perm_data: Option<&'a [u8]>,
    pub key: Option<MsgKey<'a>>,
    pub extended_header: OpaqueData<'a>,
    pub post_user_info: Option<PostUserInfo>,
    pub do_not_cache: bool,
    pub do_not_conflate: bool,
    pub do_not_ripple: bool,
    pub discardable: bool,
    pub payload: &'a [u8],
}

impl<'a> UpdateMsg<'a> {
    pub fn new(domain_type: u8, stream_id: i32) -> Self {
        UpdateMsg {
            domain_type,
            stream_id,
            container_type: ContainerType::NoData,
            update_type: 0,
            seq_num: None,
            conflation_info: None,
            perm_data: None,
            key: None,
            extended_header: OpaqueData::None,
            post_user_info: None,
            do_not_cache: false,
            do_not_conflate: false,
            do_not_ripple: false,
            discardable: false,
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
        if self.conflation_info.is_some() {
            flags |= HAS_CONF_INFO;
        }
        if self.do_not_cache {
            flags |= DO_NOT_CACHE;
        }
        if self.do_not_conflate {
            flags |= DO_NOT_CONFLATE;
        }
        if self.do_not_ripple {
            flags |= DO_NOT_RIPPLE;
        }
        if self.post_user_info.is_some() {
            flags |= HAS_POST_USER_INFO;
        }
        if self.discardable {
            flags |= DISCARDABLE;
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
        message::write_prolog(iter, MsgClass::Update, self.domain_type, self.stream_id)?;
        iter.put_u15rb(self.flags() as usize)?;
        iter.put_u8(self.container_type.to_wire())?;
        iter.put_u8(self.update_type)?;
        if let Some(seq) = self.seq_num {
            iter.put_u32(seq)?;
        }
        if let Some(conf) = self.conflation_info {
            iter.put_u15rb(conf.count as usize)?;
            iter.put_u16(conf.time)?;
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
        let mut msg = UpdateMsg::new(domain_type, stream_id);
        msg.container_type = container_type;
        msg.update_type = iter.get_u8()?;
        if flags & HAS_SEQ_NUM != 0 {
            msg.seq_num = Some(iter.get_u32()?);
        }
        if flags & HAS_CONF_INFO != 0 {
            msg.conflation_info = Some(ConflationInfo {
                count: iter.get_u15rb()?,
                time: iter.get_u16()?,
            });
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
        msg.do_not_cache = flags & DO_NOT_CACHE != 0;
        msg.do_not_conflate = flags & DO_NOT_CONFLATE != 0;
        msg.do_not_ripple = flags & DO_NOT_RIPPLE != 0;
        msg.discardable = flags & DISCARDABLE != 0;
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{domain, Msg};

    #[test]
    fn minimal_update_roundtrip() {
        let mut update = UpdateMsg::new(domain::MARKET_PRICE, 5);
        update.update_type = 1;
        let mut buf = [0u8; 64];
        let mut iter = EncodeIterator::new(&mut buf).unwrap();
        update.encode(&mut iter).unwrap();
        let encoded = iter.encoded().to_vec();

        let mut dec = DecodeIterator::new(&encoded).unwrap();
        match Msg::decode(&mut dec).unwrap() {
            Msg::Update(decoded) => assert_eq!(decoded, update),
            other => panic!("wrong class: {:?}", other.msg_class()),
        }
    }

    #[test]
    fn full_header_roundtrip() {
        let mut update = UpdateMsg::new(domain::MARKET_BY_ORDER, -12);
        update.container_type = ContainerType::FieldList;
        update.update_type = 3;
        update.seq_num = Some(900);
        update.conflation_info = Some(ConflationInfo { count: 4, time: 250 });
        update.perm_data = Some(&[0x03, 0x10]);
        update.key = Some(MsgKey::with_name(260, b"IBM.N"));
        update.extended_header = OpaqueData::PreEncoded(b"xh");
        update.post_user_info = Some(PostUserInfo {
            user_addr: 0x0A00_0001,
            user_id: 77,
        });
        update.do_not_conflate = true;
        update.payload = &[0xDE, 0xAD];

        let mut buf = [0u8; 128];
        let mut iter = EncodeIterator::new(&mut buf).unwrap();
        update.encode(&mut iter).unwrap();
        let encoded = iter.encoded().to_vec();

        let mut dec = DecodeIterator::new(&encoded).unwrap();
        match Msg::decode(&mut dec).unwrap() {
            Msg::Update(decoded) => assert_eq!(decoded, update),
            other => panic!("wrong class: {:?}", other.msg_class()),
        }
    }

    #[test]
    fn failed_encode_leaves_no_bytes() {
        let mut update = UpdateMsg::new(domain::MARKET_PRICE, 1);
        update.payload = &[0u8; 64];
        let mut buf = [0u8; 16];
        let mut iter = EncodeIterator::new(&mut buf).unwrap();
        assert!(update.encode(&mut iter).is_err());
        assert_eq!(iter.encoded_len(), 0);
    }

    #[test]
    fn explicit_abort_erases_message() {
        let update = UpdateMsg::new(domain::MARKET_PRICE, 1);
        let mut buf = [0u8; 64];
        let mut iter = EncodeIterator::new(&mut buf).unwrap();
        assert_eq!(update.encode_init(&mut iter).unwrap(), MsgStep::Payload);
        UpdateMsg::encode_complete(&mut iter, false).unwrap();
        assert_eq!(iter.encoded_len(), 0);
    }
}
