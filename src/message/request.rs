//! Request message: opens, reissues, or pauses a consumer's interest in a
//! stream. The only class whose key is mandatory, since the key is what
//! names the item being asked for.

use crate::container::{ContainerType, OpaqueData};
use crate::decode::DecodeIterator;
use crate::encode::{EncodeIterator, FrameKind};
use crate::error::{CodecError, Result};
use crate::message::{self, MsgClass, MsgKey, MsgStep};
use crate::Qos;

const HAS_EXTENDED_HEADER: u16 = 0x001;
const HAS_PRIORITY: u16 = 0x002;
const STREAMING: u16 = 0x004;
const MSG_KEY_IN_UPDATES: u16 = 0x008;
const CONF_INFO_IN_UPDATES: u16 = 0x010;
const NO_REFRESH: u16 = 0x020;
const HAS_QOS: u16 = 0x040;
const HAS_WORST_QOS: u16 = 0x080;
const PRIVATE_STREAM: u16 = 0x100;
const PAUSE: u16 = 0x200;
const HAS_VIEW: u16 = 0x400;
const HAS_BATCH: u16 = 0x800;
const QUALIFIED_STREAM: u16 = 0x1000;

/// Scheduling weight of a request relative to its peers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct Priority {
    pub class: u8,
    pub count: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMsg<'a> {
    pub domain_type: u8,
    pub stream_id: i32,
    pub container_type: ContainerType,
    pub priority: Option<Priority>,
    /// Acceptable quality of service, paired with `worst_qos` to form a
    /// range the provider may choose from.
    pub qos: Option<Qos>,
    pub worst_qos: Option<Qos>,
    pub key: MsgKey<'a>,
    pub extended_header: OpaqueData<'a>,
    pub streaming: bool,
    pub msg_key_in_updates: bool,
    pub conf_info_in_updates: bool,
    pub no_refresh: bool,
    pub private_stream: bool,
    pub pause: bool,
    pub has_view: bool,
    pub has_batch: bool,
    pub qualified_stream: bool,
    pub payload: &'a [u8],
}

impl<'a> RequestMsg<'a> {
    pub fn new(domain_type: u8, stream_id: i32, key: MsgKey<'a>) -> Self {
        RequestMsg {
            domain_type,
            stream_id,
            container_type: ContainerType::NoData,
            priority: None,
            qos: None,
            worst_qos: None,
            key,
            extended_header: OpaqueData::None,
            streaming: false,
            msg_key_in_updates: false,
            conf_info_in_updates: false,
            no_refresh: false,
            private_stream: false,
            pause: false,
            has_view: false,
            has_batch: false,
            qualified_stream: false,
            payload: b"",
        }
    }

    fn flags(&self) -> u16 {
        let mut flags = 0;
        if self.extended_header.is_present() {
            flags |= HAS_EXTENDED_HEADER;
        }
        if self.priority.is_some() {
            flags |= HAS_PRIORITY;
        }
        if self.streaming {
            flags |= STREAMING;
        }
        if self.msg_key_in_updates {
            flags |= MSG_KEY_IN_UPDATES;
        }
        if self.conf_info_in_updates {
            flags |= CONF_INFO_IN_UPDATES;
        }
        if self.no_refresh {
            flags |= NO_REFRESH;
        }
        if self.qos.is_some() {
            flags |= HAS_QOS;
        }
        if self.worst_qos.is_some() {
            flags |= HAS_WORST_QOS;
        }
        if self.private_stream {
            flags |= PRIVATE_STREAM;
        }
        if self.pause {
            flags |= PAUSE;
        }
        if self.has_view {
            flags |= HAS_VIEW;
        }
        if self.has_batch {
            flags |= HAS_BATCH;
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
        message::write_prolog(iter, MsgClass::Request, self.domain_type, self.stream_id)?;
        iter.put_u15rb(self.flags() as usize)?;
        iter.put_u8(self.container_type.to_wire())?;
        if let Some(priority) = self.priority {
            iter.put_u8(priority.class)?;
            iter.put_u16ob(priority.count as usize)?;
        }
        if let Some(qos) = &self.qos {
            message::put_qos(iter, qos)?;
        }
        if let Some(qos) = &self.worst_qos {
            message::put_qos(iter, qos)?;
        }
        // The key is not optional here, unlike every other class.
        if message::encode_key(iter, &Some(self.key))? {
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
        let mut msg = RequestMsg::new(domain_type, stream_id, MsgKey::default());
        msg.container_type = container_type;
        if flags & HAS_PRIORITY != 0 {
            msg.priority = Some(Priority {
                class: iter.get_u8()?,
                count: iter.get_u16ob()?,
            });
        }
        if flags & HAS_QOS != 0 {
            msg.qos = Some(message::get_qos(iter)?);
        }
        if flags & HAS_WORST_QOS != 0 {
            msg.worst_qos = Some(message::get_qos(iter)?);
        }
        msg.key = MsgKey::decode(iter)?;
        if flags & HAS_EXTENDED_HEADER != 0 {
            msg.extended_header = OpaqueData::PreEncoded(iter.get_b8()?);
        }
        msg.streaming = flags & STREAMING != 0;
        msg.msg_key_in_updates = flags & MSG_KEY_IN_UPDATES != 0;
        msg.conf_info_in_updates = flags & CONF_INFO_IN_UPDATES != 0;
        msg.no_refresh = flags & NO_REFRESH != 0;
        msg.private_stream = flags & PRIVATE_STREAM != 0;
        msg.pause = flags & PAUSE != 0;
        msg.has_view = flags & HAS_VIEW != 0;
        msg.has_batch = flags & HAS_BATCH != 0;
        msg.qualified_stream = flags & QUALIFIED_STREAM != 0;
        Ok(msg)
    }
}
