//! Close message: withdraws interest in a stream. The smallest class; it
//! carries no key because the stream id already names what is closing.

use crate::container::{ContainerType, OpaqueData};
use crate::decode::DecodeIterator;
use crate::encode::{EncodeIterator, FrameKind};
use crate::error::{CodecError, Result};
use crate::message::{self, MsgClass, MsgStep};

const HAS_EXTENDED_HEADER: u16 = 0x001;
const ACK: u16 = 0x002;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseMsg<'a> {
    pub domain_type: u8,
    pub stream_id: i32,
    pub container_type: ContainerType,
    pub extended_header: OpaqueData<'a>,
    /// Ask the provider to acknowledge the close.
    pub ack: bool,
    pub payload: &'a [u8],
}

impl<'a> CloseMsg<'a> {
    pub fn new(domain_type: u8, stream_id: i32) -> Self {
        CloseMsg {
            domain_type,
            stream_id,
            container_type: ContainerType::NoData,
            extended_header: OpaqueData::None,
            ack: false,
            payload: b"",
        }
    }

    fn flags(&self) -> u16 {
        let mut flags = 0;
        if self.extended_header.is_present() {
            flags |= HAS_EXTENDED_HEADER;
        }
        if self.ack {
            flags |= ACK;
        }
        flags
    }

    /// One-call encode for messages whose payload is already encoded and
    /// whose extended header is not [`OpaqueData::Pending`].
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
        message::write_prolog(iter, MsgClass::Close, self.domain_type, self.stream_id)?;
        iter.put_u15rb(self.flags() as usize)?;
        iter.put_u8(self.container_type.to_wire())?;
        if message::encode_ext_header(iter, &self.extended_header)? {
            return Ok(MsgStep::ExtendedHeader);
        }
        message::enter_payload(iter)?;
        Ok(MsgStep::Payload)
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
        let mut msg = CloseMsg::new(domain_type, stream_id);
        msg.container_type = container_type;
        if flags & HAS_EXTENDED_HEADER != 0 {
            msg.extended_header = OpaqueData::PreEncoded(iter.get_b8()?);
        }
        msg.ack = flags & ACK != 0;
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{domain, Msg};

    #[test]
    fn minimal_close_roundtrip() {
        let close = CloseMsg::new(domain::MARKET_PRICE, 5);
        let mut buf = [0u8; 32];
        let mut iter = EncodeIterator::new(&mut buf).unwrap();
        close.encode(&mut iter).unwrap();
        let encoded = iter.encoded().to_vec();
        // Prolog plus two header bytes: headerSize covers class, domain,
        // stream id, flags, container type.
        assert_eq!(encoded.len(), 10);
        assert_eq!(&encoded[..2], &[0, 8]);

        let mut dec = DecodeIterator::new(&encoded).unwrap();
        match Msg::decode(&mut dec).unwrap() {
            Msg::Close(decoded) => assert_eq!(decoded, close),
            other => panic!("wrong class: {:?}", other.msg_class()),
        }
    }

    #[test]
    fn close_with_ack_flag_roundtrip() {
        let mut close = CloseMsg::new(domain::MARKET_PRICE, -3);
        close.ack = true;
        close.extended_header = OpaqueData::PreEncoded(b"tag");

        let mut buf = [0u8; 32];
        let mut iter = EncodeIterator::new(&mut buf).unwrap();
        close.encode(&mut iter).unwrap();
        let encoded = iter.encoded().to_vec();

        let mut dec = DecodeIterator::new(&encoded).unwrap();
        match Msg::decode(&mut dec).unwrap() {
            Msg::Close(decoded) => {
                assert!(decoded.ack);
                assert_eq!(decoded, close);
            }
            other => panic!("wrong class: {:?}", other.msg_class()),
        }
    }
}
