//! Ack message: a provider's positive or negative receipt for a post (or
//! an acknowledged close). `ack_id` echoes the post id being answered; a
//! nak code plus text explains a rejection.

use crate::container::{ContainerType, OpaqueData};
use crate::decode::DecodeIterator;
use crate::encode::{EncodeIterator, FrameKind};
use crate::error::{CodecError, Result};
use crate::message::{self, MsgClass, MsgKey, MsgStep};

const HAS_EXTENDED_HEADER: u16 = 0x001;
const HAS_TEXT: u16 = 0x002;
const PRIVATE_STREAM: u16 = 0x004;
const HAS_SEQ_NUM: u16 = 0x008;
const HAS_MSG_KEY: u16 = 0x010;
const HAS_NAK_CODE: u16 = 0x020;
const QUALIFIED_STREAM: u16 = 0x040;

/// Reasons a post was not applied.
pub mod nak_code {
    pub const NONE: u8 = 0;
    pub const ACCESS_DENIED: u8 = 1;
    pub const DENIED_BY_SOURCE: u8 = 2;
    pub const SOURCE_DOWN: u8 = 3;
    pub const SOURCE_UNKNOWN: u8 = 4;
    pub const NO_RESOURCES: u8 = 5;
    pub const NO_RESPONSE: u8 = 6;
    pub const GATEWAY_DOWN: u8 = 7;
    pub const SYMBOL_UNKNOWN: u8 = 10;
    pub const NOT_OPEN: u8 = 11;
    pub const INVALID_CONTENT: u8 = 12;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckMsg<'a> {
    pub domain_type: u8,
    pub stream_id: i32,
    pub container_type: ContainerType,
    /// Post id (or close) being acknowledged.
    pub ack_id: u32,
    pub nak_code: Option<u8>,
    pub text: Option<&'a [u8]>,
    pub seq_num: Option<u32>,
    pub key: Option<MsgKey<'a>>,
    pub extended_header: OpaqueData<'a>,
    pub private_stream: bool,
    pub qualified_stream: bool,
    pub payload: &'a [u8],
}

impl<'a> AckMsg<'a> {
    pub fn new(domain_type: u8, stream_id: i32, ack_id: u32) -> Self {
        AckMsg {
            domain_type,
            stream_id,
            container_type: ContainerType::NoData,
            ack_id,
            nak_code: None,
            text: None,
            seq_num: None,
            key: None,
            extended_header: OpaqueData::None,
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
        if self.text.is_some() {
            flags |= HAS_TEXT;
        }
        if self.private_stream {
            flags |= PRIVATE_STREAM;
        }
        if self.seq_num.is_some() {
            flags |= HAS_SEQ_NUM;
        }
        if self.key.is_some() {
            flags |= HAS_MSG_KEY;
        }
        if self.nak_code.is_some() {
            flags |= HAS_NAK_CODE;
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
        message::write_prolog(iter, MsgClass::Ack, self.domain_type, self.stream_id)?;
        iter.put_u15rb(self.flags() as usize)?;
        iter.put_u8(self.container_type.to_wire())?;
        iter.put_u32(self.ack_id)?;
        if let Some(code) = self.nak_code {
            iter.put_u8(code)?;
        }
        if let Some(text) = self.text {
            iter.put_b16(text)?;
        }
        if let Some(seq) = self.seq_num {
            iter.put_u32(seq)?;
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
        let step = iter.finish_mark(mark).and_then(|_| {
            message::enter_payload(iter)?;
            Ok(MsgStep::Payload)
        });
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
        _header_end: usize,
    ) -> Result<Self> {
        let flags = iter.get_u15rb()?;
        let container_type = ContainerType::from_wire(iter.get_u8()?)?;
        let ack_id = iter.get_u32()?;
        let mut msg = AckMsg::new(domain_type, stream_id, ack_id);
        msg.container_type = container_type;
        if flags & HAS_NAK_CODE != 0 {
            msg.nak_code = Some(iter.get_u8()?);
        }
        if flags & HAS_TEXT != 0 {
            msg.text = Some(iter.get_b16()?);
        }
        if flags & HAS_SEQ_NUM != 0 {
            msg.seq_num = Some(iter.get_u32()?);
        }
        if flags & HAS_MSG_KEY != 0 {
            msg.key = Some(MsgKey::decode(iter)?);
        }
        if flags & HAS_EXTENDED_HEADER != 0 {
            msg.extended_header = OpaqueData::PreEncoded(iter.get_b8()?);
        }
        msg.private_stream = flags & PRIVATE_STREAM != 0;
        msg.qualified_stream = flags & QUALIFIED_STREAM != 0;
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{domain, Msg};

    #[test]
    fn positive_ack_roundtrip() {
        let mut ack = AckMsg::new(domain::MARKET_PRICE, 5, 42);
        ack.seq_num = Some(7);

        let mut buf = [0u8; 64];
        let mut iter = EncodeIterator::new(&mut buf).unwrap();
        ack.encode(&mut iter).unwrap();
        let encoded = iter.encoded().to_vec();

        let mut dec = DecodeIterator::new(&encoded).unwrap();
        match Msg::decode(&mut dec).unwrap() {
            Msg::Ack(decoded) => {
                assert_eq!(decoded.ack_id, 42);
                assert_eq!(decoded, ack);
            }
            other => panic!("wrong class: {:?}", other.msg_class()),
        }
    }

    #[test]
    fn nak_with_text_roundtrip() {
        let mut ack = AckMsg::new(domain::MARKET_PRICE, 5, 43);
        ack.nak_code = Some(nak_code::DENIED_BY_SOURCE);
        ack.text = Some(b"not entitled to contribute");
        ack.key = Some(MsgKey::with_name(260, b"IBM.N"));

        let mut buf = [0u8; 96];
        let mut iter = EncodeIterator::new(&mut buf).unwrap();
        ack.encode(&mut iter).unwrap();
        let encoded = iter.encoded().to_vec();

        let mut dec = DecodeIterator::new(&encoded).unwrap();
        match Msg::decode(&mut dec).unwrap() {
            Msg::Ack(decoded) => assert_eq!(decoded, ack),
            other => panic!("wrong class: {:?}", other.msg_class()),
        }
    }
}
