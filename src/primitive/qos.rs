//! Quality-of-service descriptor: how timely and how conflated a stream's
//! data is. One packed byte, plus a u16 of extra detail for each dimension
//! that declares a parameterized code.

use crate::error::{CodecError, Result};
use crate::wire;
use num_enum::TryFromPrimitive;

#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, TryFromPrimitive)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum QosTimeliness {
    #[default]
    Unspecified = 0,
    Realtime = 1,
    DelayedUnknown = 2,
    /// Delay in seconds carried separately as `time_info`.
    Delayed = 3,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, TryFromPrimitive)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum QosRate {
    #[default]
    Unspecified = 0,
    TickByTick = 1,
    JitConflated = 2,
    /// Conflation interval in milliseconds carried separately as `rate_info`.
    TimeConflated = 3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct Qos {
    pub timeliness: QosTimeliness,
    pub rate: QosRate,
    pub dynamic: bool,
    pub time_info: u16,
    pub rate_info: u16,
}

impl Qos {
    pub fn realtime_tick_by_tick() -> Self {
        Qos {
            timeliness: QosTimeliness::Realtime,
            rate: QosRate::TickByTick,
            ..Default::default()
        }
    }

    pub(crate) fn encode_ls(&self, buf: &mut [u8], pos: usize) -> Result<usize> {
        let packed =
            ((self.timeliness as u8) << 5) | ((self.rate as u8) << 1) | self.dynamic as u8;
        let mut pos = wire::put_u8(buf, pos, packed)?;
        if self.timeliness == QosTimeliness::Delayed {
            pos = wire::put_u16(buf, pos, self.time_info)?;
        }
        if self.rate == QosRate::TimeConflated {
            pos = wire::put_u16(buf, pos, self.rate_info)?;
        }
        Ok(pos)
    }

    pub(crate) fn decode_ls(data: &[u8]) -> Result<Qos> {
        let (packed, mut pos) = wire::get_u8(data, 0)?;
        let timeliness = QosTimeliness::try_from(packed >> 5)
            .map_err(|_| CodecError::InvalidData("qos timeliness out of range"))?;
        let rate = QosRate::try_from((packed >> 1) & 0x0F)
            .map_err(|_| CodecError::InvalidData("qos rate out of range"))?;
        let mut qos = Qos {
            timeliness,
            rate,
            dynamic: packed & 0x01 != 0,
            time_info: 0,
            rate_info: 0,
        };
        if timeliness == QosTimeliness::Delayed {
            let (info, next) = wire::get_u16(data, pos)?;
            qos.time_info = info;
            pos = next;
        }
        if rate == QosRate::TimeConflated {
            let (info, _) = wire::get_u16(data, pos)?;
            qos.rate_info = info;
        }
        Ok(qos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realtime_tick_is_one_byte() {
        let qos = Qos::realtime_tick_by_tick();
        let mut buf = [0u8; 8];
        let end = qos.encode_ls(&mut buf, 0).unwrap();
        assert_eq!(&buf[..end], &[0b001_0001_0]);
        assert_eq!(Qos::decode_ls(&buf[..end]).unwrap(), qos);
    }

    #[test]
    fn parameterized_codes_append_detail_words() {
        let qos = Qos {
            timeliness: QosTimeliness::Delayed,
            rate: QosRate::TimeConflated,
            dynamic: true,
            time_info: 15,
            rate_info: 1000,
        };
        let mut buf = [0u8; 8];
        let end = qos.encode_ls(&mut buf, 0).unwrap();
        assert_eq!(end, 5);
        assert_eq!(Qos::decode_ls(&buf[..end]).unwrap(), qos);
    }

    #[test]
    fn detail_words_absent_for_plain_codes() {
        let qos = Qos {
            timeliness: QosTimeliness::DelayedUnknown,
            rate: QosRate::JitConflated,
            ..Default::default()
        };
        let mut buf = [0u8; 8];
        let end = qos.encode_ls(&mut buf, 0).unwrap();
        assert_eq!(end, 1);
        assert_eq!(Qos::decode_ls(&buf[..end]).unwrap(), qos);
    }
}
