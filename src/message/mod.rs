//! # Message Codecs - Stream-Level Envelopes
//!
//! ## Purpose
//!
//! The eight message classes that frame every payload on an OMM stream:
//! requests, refreshes, updates, statuses, closes, acks, generics, and
//! posts. A message is a fixed prolog (header size, class, domain, stream
//! id), a class-specific header, and an opaque payload running to the end
//! of the enclosing scope. The header-size word lets a decoder skip
//! straight to the payload of any class it does not fully understand.
//!
//! ## Encode Protocol
//!
//! `encode_init` writes the whole header in one pass when the key attrib
//! and extended header are absent or pre-encoded, returning
//! [`MsgStep::Payload`]. A [`OpaqueData::Pending`] attrib or extended
//! header suspends the header instead ([`MsgStep::KeyAttrib`] /
//! [`MsgStep::ExtendedHeader`]); the caller encodes the nested scope in
//! place and resumes with the matching `*_complete` call. Completing with
//! `success = false` at any stage erases the entire message.
//!
//! [`OpaqueData::Pending`]: crate::container::OpaqueData::Pending

pub mod ack;
pub mod close;
pub mod generic;
pub mod key;
pub mod post;
pub mod refresh;
pub mod request;
pub mod status;
pub mod update;

pub use ack::{nak_code, AckMsg};
pub use close::CloseMsg;
pub use generic::GenericMsg;
pub use key::MsgKey;
pub use post::{post_user_rights, PostMsg};
pub use refresh::RefreshMsg;
pub use request::{Priority, RequestMsg};
pub use status::StatusMsg;
pub use update::{ConflationInfo, UpdateMsg};

use crate::container::OpaqueData;
use crate::decode::DecodeIterator;
use crate::encode::{EncodeIterator, EncodeState, FrameKind, Mark, MarkKind};
use crate::error::{CodecError, Result};
use num_enum::TryFromPrimitive;

/// Message class discriminant carried in the header prolog. The upper
/// three bits of the wire byte are reserved and masked off on decode.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum MsgClass {
    Request = 1,
    Refresh = 2,
    Status = 3,
    Update = 4,
    Close = 5,
    Ack = 6,
    Generic = 7,
    Post = 8,
}

const MSG_CLASS_MASK: u8 = 0x1F;

/// Well-known domain types. The field is open-ended; unrecognized values
/// pass through both directions untouched.
pub mod domain {
    pub const LOGIN: u8 = 1;
    pub const SOURCE: u8 = 4;
    pub const DICTIONARY: u8 = 5;
    pub const MARKET_PRICE: u8 = 6;
    pub const MARKET_BY_ORDER: u8 = 7;
    pub const MARKET_BY_PRICE: u8 = 8;
    pub const SYMBOL_LIST: u8 = 10;
}

/// Identity of the user a post or update originated from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct PostUserInfo {
    /// Originating host address, network byte order.
    pub user_addr: u32,
    pub user_id: u32,
}

/// Where a suspended message encode stands after `encode_init` or a
/// `*_complete` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgStep {
    /// Encode the key attrib container now, then call
    /// `encode_key_attrib_complete`.
    KeyAttrib,
    /// Encode the extended header now, then call
    /// `encode_extended_header_complete`.
    ExtendedHeader,
    /// Header finished; payload bytes or a nested container may follow.
    Payload,
}

/// A decoded message of any class. Produced by [`Msg::decode`]; the
/// payload slice borrows from the decode buffer and is interpreted
/// according to the class's container type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg<'a> {
    Request(RequestMsg<'a>),
    Refresh(RefreshMsg<'a>),
    Status(StatusMsg<'a>),
    Update(UpdateMsg<'a>),
    Close(CloseMsg<'a>),
    Ack(AckMsg<'a>),
    Generic(GenericMsg<'a>),
    Post(PostMsg<'a>),
}

impl<'a> Msg<'a> {
    /// Decode the message at the read position. The header is consumed up
    /// to the declared header size, so trailing header fields added by
    /// newer minor versions are skipped rather than rejected; the iterator
    /// is left at the payload start, which lets the caller decode a
    /// container payload in place.
    pub fn decode(iter: &mut DecodeIterator<'a>) -> Result<Msg<'a>> {
        let start = iter.position();
        let header_size = iter.get_u16()? as usize;
        let header_end = start + 2 + header_size;
        if header_end > iter.limit() {
            return Err(CodecError::Incomplete { offset: iter.limit() });
        }
        let class_byte = iter.get_u8()?;
        let class = MsgClass::try_from(class_byte & MSG_CLASS_MASK).map_err(|_| {
            #[cfg(feature = "observability")]
            tracing::debug!(class_byte, "unrecognized message class byte");
            CodecError::UnknownType(class_byte)
        })?;
        let domain_type = iter.get_u8()?;
        let stream_id = iter.get_i32()?;
        let mut msg = match class {
            MsgClass::Request => Msg::Request(RequestMsg::decode_header(
                iter,
                domain_type,
                stream_id,
                header_end,
            )?),
            MsgClass::Refresh => Msg::Refresh(RefreshMsg::decode_header(
                iter,
                domain_type,
                stream_id,
                header_end,
            )?),
            MsgClass::Status => Msg::Status(StatusMsg::decode_header(
                iter,
                domain_type,
                stream_id,
                header_end,
            )?),
            MsgClass::Update => Msg::Update(UpdateMsg::decode_header(
                iter,
                domain_type,
                stream_id,
                header_end,
            )?),
            MsgClass::Close => Msg::Close(CloseMsg::decode_header(
                iter,
                domain_type,
                stream_id,
                header_end,
            )?),
            MsgClass::Ack => {
                Msg::Ack(AckMsg::decode_header(iter, domain_type, stream_id, header_end)?)
            }
            MsgClass::Generic => Msg::Generic(GenericMsg::decode_header(
                iter,
                domain_type,
                stream_id,
                header_end,
            )?),
            MsgClass::Post => {
                Msg::Post(PostMsg::decode_header(iter, domain_type, stream_id, header_end)?)
            }
        };
        iter.set_position(header_end);
        msg.set_payload(iter.peek_rest());
        Ok(msg)
    }

    fn set_payload(&mut self, payload: &'a [u8]) {
        match self {
            Msg::Request(m) => m.payload = payload,
            Msg::Refresh(m) => m.payload = payload,
            Msg::Status(m) => m.payload = payload,
            Msg::Update(m) => m.payload = payload,
            Msg::Close(m) => m.payload = payload,
            Msg::Ack(m) => m.payload = payload,
            Msg::Generic(m) => m.payload = payload,
            Msg::Post(m) => m.payload = payload,
        }
    }

    pub fn msg_class(&self) -> MsgClass {
        match self {
            Msg::Request(_) => MsgClass::Request,
            Msg::Refresh(_) => MsgClass::Refresh,
            Msg::Status(_) => MsgClass::Status,
            Msg::Update(_) => MsgClass::Update,
            Msg::Close(_) => MsgClass::Close,
            Msg::Ack(_) => MsgClass::Ack,
            Msg::Generic(_) => MsgClass::Generic,
            Msg::Post(_) => MsgClass::Post,
        }
    }

    pub fn domain_type(&self) -> u8 {
        match self {
            Msg::Request(m) => m.domain_type,
            Msg::Refresh(m) => m.domain_type,
            Msg::Status(m) => m.domain_type,
            Msg::Update(m) => m.domain_type,
            Msg::Close(m) => m.domain_type,
            Msg::Ack(m) => m.domain_type,
            Msg::Generic(m) => m.domain_type,
            Msg::Post(m) => m.domain_type,
        }
    }

    pub fn stream_id(&self) -> i32 {
        match self {
            Msg::Request(m) => m.stream_id,
            Msg::Refresh(m) => m.stream_id,
            Msg::Status(m) => m.stream_id,
            Msg::Update(m) => m.stream_id,
            Msg::Close(m) => m.stream_id,
            Msg::Ack(m) => m.stream_id,
            Msg::Generic(m) => m.stream_id,
            Msg::Post(m) => m.stream_id,
        }
    }

    pub fn payload(&self) -> &'a [u8] {
        match self {
            Msg::Request(m) => m.payload,
            Msg::Refresh(m) => m.payload,
            Msg::Status(m) => m.payload,
            Msg::Update(m) => m.payload,
            Msg::Close(m) => m.payload,
            Msg::Ack(m) => m.payload,
            Msg::Generic(m) => m.payload,
            Msg::Post(m) => m.payload,
        }
    }
}

// ---- shared encode plumbing -----------------------------------------------

/// Reserve the header-size word and write the fixed prolog. The mark
/// position rides in the frame until [`enter_payload`] patches it.
pub(crate) fn write_prolog(
    iter: &mut EncodeIterator<'_>,
    class: MsgClass,
    domain_type: u8,
    stream_id: i32,
) -> Result<()> {
    let mark = iter.reserve(MarkKind::U16)?;
    iter.put_u8(class as u8)?;
    iter.put_u8(domain_type)?;
    iter.put_i32(stream_id)?;
    iter.frame_mut(FrameKind::Msg).count_pos = Some(mark.pos);
    Ok(())
}

/// Patch the header-size word and move the frame to the payload stage.
pub(crate) fn enter_payload(iter: &mut EncodeIterator<'_>) -> Result<()> {
    let pos = match iter.frame_mut(FrameKind::Msg).count_pos.take() {
        Some(pos) => pos,
        None => panic!("message header finished twice"),
    };
    iter.finish_mark(Mark {
        pos,
        kind: MarkKind::U16,
    })?;
    iter.frame_mut(FrameKind::Msg).state = EncodeState::Payload;
    Ok(())
}

/// Encode the optional key, parking a pending attrib's marks in the frame.
/// Returns `true` when the header is suspended on the attrib.
pub(crate) fn encode_key(iter: &mut EncodeIterator<'_>, msg_key: &Option<MsgKey<'_>>) -> Result<bool> {
    let msg_key = match msg_key {
        Some(k) => k,
        None => return Ok(false),
    };
    match msg_key.encode(iter)? {
        key::KeyEncode::Done => Ok(false),
        key::KeyEncode::Pending {
            key_mark,
            attrib_mark,
        } => {
            let frame = iter.frame_mut(FrameKind::Msg);
            frame.key_mark = Some(key_mark);
            frame.entry_mark = Some(attrib_mark);
            frame.state = EncodeState::KeyAttrib;
            Ok(true)
        }
    }
}

/// Encode the extended header or open its pending scope. Returns `true`
/// when the header is suspended.
pub(crate) fn encode_ext_header(
    iter: &mut EncodeIterator<'_>,
    ext: &OpaqueData<'_>,
) -> Result<bool> {
    match ext {
        OpaqueData::None => Ok(false),
        OpaqueData::PreEncoded(bytes) => {
            iter.put_b8(bytes)?;
            Ok(false)
        }
        OpaqueData::Pending => {
            let mark = iter.reserve(MarkKind::B8)?;
            let frame = iter.frame_mut(FrameKind::Msg);
            frame.entry_mark = Some(mark);
            frame.state = EncodeState::ExtendedHeader;
            Ok(true)
        }
    }
}

/// Reclaim the attrib and key-wrapper marks parked by [`encode_key`].
pub(crate) fn take_attrib_marks(iter: &mut EncodeIterator<'_>) -> (Mark, Mark) {
    let frame = iter.frame_mut(FrameKind::Msg);
    if frame.state != EncodeState::KeyAttrib {
        panic!("encode_key_attrib_complete without a pending key attrib");
    }
    let attrib = match frame.entry_mark.take() {
        Some(mark) => mark,
        None => unreachable!(),
    };
    let key = match frame.key_mark.take() {
        Some(mark) => mark,
        None => unreachable!(),
    };
    (attrib, key)
}

/// Reclaim the extended-header mark parked by [`encode_ext_header`].
pub(crate) fn take_ext_mark(iter: &mut EncodeIterator<'_>) -> Mark {
    let frame = iter.frame_mut(FrameKind::Msg);
    if frame.state != EncodeState::ExtendedHeader {
        panic!("encode_extended_header_complete without a pending extended header");
    }
    match frame.entry_mark.take() {
        Some(mark) => mark,
        None => unreachable!(),
    }
}

/// Shared tail of every class's `encode_complete`.
pub(crate) fn complete(iter: &mut EncodeIterator<'_>, success: bool) -> Result<()> {
    if !success {
        iter.rollback_frame(FrameKind::Msg);
        return Ok(());
    }
    if iter.frame_mut(FrameKind::Msg).state != EncodeState::Payload {
        panic!("message encode_complete with an unfinished header");
    }
    iter.pop_frame(FrameKind::Msg);
    Ok(())
}

// ---- in-header composite fields -------------------------------------------

/// State as carried inline in refresh and status headers: packed byte,
/// code, u15-rb-prefixed text.
pub(crate) fn put_state(iter: &mut EncodeIterator<'_>, state: &crate::State<'_>) -> Result<()> {
    let packed = ((state.stream_state as u8) << 3) | state.data_state as u8;
    iter.put_u8(packed)?;
    iter.put_u8(state.code)?;
    iter.put_b15(state.text)
}

pub(crate) fn get_state<'a>(iter: &mut DecodeIterator<'a>) -> Result<crate::State<'a>> {
    let packed = iter.get_u8()?;
    let stream_state = crate::StreamState::try_from(packed >> 3)
        .map_err(|_| CodecError::InvalidData("stream state out of range"))?;
    let data_state = crate::DataState::try_from(packed & 0x07)
        .map_err(|_| CodecError::InvalidData("data state out of range"))?;
    let code = iter.get_u8()?;
    let text = iter.get_b15()?;
    Ok(crate::State {
        stream_state,
        data_state,
        code,
        text,
    })
}

/// Qos as carried inline in request and refresh headers.
pub(crate) fn put_qos(iter: &mut EncodeIterator<'_>, qos: &crate::Qos) -> Result<()> {
    let packed = ((qos.timeliness as u8) << 5) | ((qos.rate as u8) << 1) | qos.dynamic as u8;
    iter.put_u8(packed)?;
    if qos.timeliness == crate::QosTimeliness::Delayed {
        iter.put_u16(qos.time_info)?;
    }
    if qos.rate == crate::QosRate::TimeConflated {
        iter.put_u16(qos.rate_info)?;
    }
    Ok(())
}

pub(crate) fn get_qos(iter: &mut DecodeIterator<'_>) -> Result<crate::Qos> {
    let packed = iter.get_u8()?;
    let timeliness = crate::QosTimeliness::try_from(packed >> 5)
        .map_err(|_| CodecError::InvalidData("qos timeliness out of range"))?;
    let rate = crate::QosRate::try_from((packed >> 1) & 0x0F)
        .map_err(|_| CodecError::InvalidData("qos rate out of range"))?;
    let mut qos = crate::Qos {
        timeliness,
        rate,
        dynamic: packed & 0x01 != 0,
        time_info: 0,
        rate_info: 0,
    };
    if timeliness == crate::QosTimeliness::Delayed {
        qos.time_info = iter.get_u16()?;
    }
    if rate == crate::QosRate::TimeConflated {
        qos.rate_info = iter.get_u16()?;
    }
    Ok(qos)
}
