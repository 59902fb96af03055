//! Stream and data state descriptor: whether the stream stays open, how
//! trustworthy its data is, a machine-readable reason code, and free-form
//! text. The text borrows from the decode buffer.

use crate::error::{CodecError, Result};
use crate::wire;
use num_enum::TryFromPrimitive;

/// Lifetime of the stream carrying this state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, TryFromPrimitive)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum StreamState {
    #[default]
    Unspecified = 0,
    Open = 1,
    NonStreaming = 2,
    ClosedRecover = 3,
    Closed = 4,
    Redirected = 5,
}

/// Trustworthiness of the data on the stream.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, TryFromPrimitive)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum DataState {
    #[default]
    NoChange = 0,
    Ok = 1,
    Suspect = 2,
}

/// Well-known reason codes. The field is open-ended; values outside this
/// list pass through decode untouched.
pub mod state_code {
    pub const NONE: u8 = 0;
    pub const NOT_FOUND: u8 = 1;
    pub const TIMEOUT: u8 = 2;
    pub const NOT_ENTITLED: u8 = 3;
    pub const INVALID_ARGUMENT: u8 = 4;
    pub const USAGE_ERROR: u8 = 5;
    pub const PREEMPTED: u8 = 6;
    pub const JIT_CONFLATION_STARTED: u8 = 7;
    pub const REALTIME_RESUMED: u8 = 8;
    pub const TOO_MANY_ITEMS: u8 = 13;
    pub const ALREADY_OPEN: u8 = 14;
    pub const SOURCE_UNKNOWN: u8 = 15;
    pub const NOT_OPEN: u8 = 16;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct State<'a> {
    pub stream_state: StreamState,
    pub data_state: DataState,
    pub code: u8,
    pub text: &'a [u8],
}

impl<'a> State<'a> {
    pub fn open_ok(text: &'a [u8]) -> Self {
        State {
            stream_state: StreamState::Open,
            data_state: DataState::Ok,
            code: state_code::NONE,
            text,
        }
    }

    pub(crate) fn encode_ls(&self, buf: &mut [u8], pos: usize) -> Result<usize> {
        let packed = ((self.stream_state as u8) << 3) | self.data_state as u8;
        let pos = wire::put_u8(buf, pos, packed)?;
        let pos = wire::put_u8(buf, pos, self.code)?;
        let pos = wire::put_u15rb(buf, pos, self.text.len())?;
        wire::put_bytes(buf, pos, self.text)
    }

    pub(crate) fn decode_ls(data: &'a [u8]) -> Result<State<'a>> {
        let (packed, pos) = wire::get_u8(data, 0)?;
        let stream_state = StreamState::try_from(packed >> 3)
            .map_err(|_| CodecError::InvalidData("stream state out of range"))?;
        let data_state = DataState::try_from(packed & 0x07)
            .map_err(|_| CodecError::InvalidData("data state out of range"))?;
        let (code, pos) = wire::get_u8(data, pos)?;
        let (text_len, pos) = wire::get_u15rb(data, pos)?;
        let end = pos + text_len as usize;
        if end > data.len() {
            return Err(CodecError::Incomplete { offset: data.len() });
        }
        Ok(State {
            stream_state,
            data_state,
            code,
            text: &data[pos..end],
        })
    }
}
