//! Calendar primitives. Date is a fixed 4-byte record; Time trims trailing
//! zero precision down to one of five canonical lengths, and DateTime is
//! the concatenation of the two. Zeroed fields mean "not specified", so a
//! Date of all zeroes decodes as blank even with a non-empty payload.

use crate::error::{CodecError, Result};
use crate::wire;

use super::Decoded;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct Date {
    pub day: u8,
    pub month: u8,
    pub year: u16,
}

impl Date {
    pub fn new(year: u16, month: u8, day: u8) -> Self {
        Date { day, month, year }
    }

    pub(crate) fn encode_ls(&self, buf: &mut [u8], pos: usize) -> Result<usize> {
        let pos = wire::put_u8(buf, pos, self.day)?;
        let pos = wire::put_u8(buf, pos, self.month)?;
        wire::put_u16(buf, pos, self.year)
    }

    pub(crate) fn decode_ls(data: &[u8]) -> Result<Decoded<Date>> {
        if data.len() != 4 {
            return Err(CodecError::InvalidData("date payload is not 4 bytes"));
        }
        let (day, pos) = wire::get_u8(data, 0)?;
        let (month, pos) = wire::get_u8(data, pos)?;
        let (year, _) = wire::get_u16(data, pos)?;
        if day == 0 && month == 0 && year == 0 {
            return Ok(Decoded::Blank);
        }
        Ok(Decoded::Value(Date { day, month, year }))
    }
}

/// Time of day down to nanoseconds. Sub-millisecond precision shares bytes
/// on the wire: the 7- and 8-byte forms pack the high bits of the
/// nanosecond field into the microsecond u16.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct Time {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millisecond: u16,
    pub microsecond: u16,
    pub nanosecond: u16,
}

impl Time {
    /// Canonical encoded length for the populated precision.
    fn encoded_len(&self) -> usize {
        if self.nanosecond != 0 {
            8
        } else if self.microsecond != 0 {
            7
        } else if self.millisecond != 0 {
            5
        } else if self.second != 0 {
            3
        } else {
            2
        }
    }

    pub(crate) fn encode_ls(&self, buf: &mut [u8], pos: usize) -> Result<usize> {
        let len = self.encoded_len();
        let mut pos = wire::put_u8(buf, pos, self.hour)?;
        pos = wire::put_u8(buf, pos, self.minute)?;
        if len == 2 {
            return Ok(pos);
        }
        pos = wire::put_u8(buf, pos, self.second)?;
        if len == 3 {
            return Ok(pos);
        }
        pos = wire::put_u16(buf, pos, self.millisecond)?;
        if len == 5 {
            return Ok(pos);
        }
        // High nanosecond bits ride in bits 11..13 of the microsecond word.
        let packed = ((self.nanosecond & 0xFF00) << 3) | self.microsecond;
        pos = wire::put_u16(buf, pos, packed)?;
        if len == 7 {
            return Ok(pos);
        }
        wire::put_u8(buf, pos, self.nanosecond as u8)
    }

    pub(crate) fn decode_ls(data: &[u8]) -> Result<Time> {
        let mut time = Time::default();
        let (hour, mut pos) = wire::get_u8(data, 0)?;
        time.hour = hour;
        let (minute, next) = wire::get_u8(data, pos)?;
        time.minute = minute;
        pos = next;
        match data.len() {
            2 => return Ok(time),
            3 | 5 | 7 | 8 => {}
            _ => return Err(CodecError::InvalidData("time payload has no defined length")),
        }
        let (second, next) = wire::get_u8(data, pos)?;
        time.second = second;
        pos = next;
        if data.len() == 3 {
            return Ok(time);
        }
        let (milli, next) = wire::get_u16(data, pos)?;
        time.millisecond = milli;
        pos = next;
        if data.len() == 5 {
            return Ok(time);
        }
        let (packed, next) = wire::get_u16(data, pos)?;
        time.microsecond = packed & 0x07FF;
        pos = next;
        if data.len() == 7 {
            return Ok(time);
        }
        let (nano_low, _) = wire::get_u8(data, pos)?;
        time.nanosecond = ((packed >> 3) & 0xFF00) | nano_low as u16;
        Ok(time)
    }
}

/// Date and Time concatenated, sharing their individual layouts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct DateTime {
    pub date: Date,
    pub time: Time,
}

impl DateTime {
    pub(crate) fn encode_ls(&self, buf: &mut [u8], pos: usize) -> Result<usize> {
        let pos = self.date.encode_ls(buf, pos)?;
        self.time.encode_ls(buf, pos)
    }

    pub(crate) fn decode_ls(data: &[u8]) -> Result<DateTime> {
        if data.len() < 6 {
            return Err(CodecError::InvalidData("datetime payload shorter than 6 bytes"));
        }
        let date = match Date::decode_ls(&data[..4])? {
            Decoded::Value(d) => d,
            Decoded::Blank => Date::default(),
        };
        let time = Time::decode_ls(&data[4..])?;
        Ok(DateTime { date, time })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_roundtrip() {
        let date = Date::new(2024, 11, 25);
        let mut buf = [0u8; 8];
        let end = date.encode_ls(&mut buf, 0).unwrap();
        assert_eq!(&buf[..end], &[25, 11, 0x07, 0xE8]);
        assert_eq!(Date::decode_ls(&buf[..end]).unwrap(), Decoded::Value(date));
    }

    #[test]
    fn zeroed_date_decodes_blank() {
        assert_eq!(Date::decode_ls(&[0, 0, 0, 0]).unwrap(), Decoded::Blank);
    }

    #[test]
    fn time_trims_trailing_precision() {
        let cases: &[(Time, usize)] = &[
            (Time { hour: 9, minute: 30, ..Default::default() }, 2),
            (Time { hour: 9, minute: 30, second: 15, ..Default::default() }, 3),
            (Time { hour: 9, minute: 30, second: 15, millisecond: 250, ..Default::default() }, 5),
            (
                Time {
                    hour: 9,
                    minute: 30,
                    second: 15,
                    millisecond: 250,
                    microsecond: 999,
                    ..Default::default()
                },
                7,
            ),
            (
                Time {
                    hour: 23,
                    minute: 59,
                    second: 59,
                    millisecond: 999,
                    microsecond: 999,
                    nanosecond: 999,
                },
                8,
            ),
        ];
        for (time, want_len) in cases {
            let mut buf = [0u8; 16];
            let end = time.encode_ls(&mut buf, 0).unwrap();
            assert_eq!(end, *want_len);
            assert_eq!(Time::decode_ls(&buf[..end]).unwrap(), *time);
        }
    }

    #[test]
    fn nanosecond_high_bits_survive_packing() {
        // 999 = 0x3E7: exercises both the packed high byte and the low byte.
        let time = Time {
            hour: 1,
            minute: 2,
            second: 3,
            millisecond: 4,
            microsecond: 5,
            nanosecond: 999,
        };
        let mut buf = [0u8; 16];
        let end = time.encode_ls(&mut buf, 0).unwrap();
        assert_eq!(Time::decode_ls(&buf[..end]).unwrap(), time);
    }

    #[test]
    fn undefined_time_length_rejected() {
        assert!(Time::decode_ls(&[1, 2, 3, 4]).is_err());
        assert!(Time::decode_ls(&[1, 2, 3, 4, 5, 6]).is_err());
    }

    #[test]
    fn datetime_roundtrip() {
        let dt = DateTime {
            date: Date::new(2025, 1, 31),
            time: Time { hour: 16, minute: 0, second: 1, millisecond: 5, ..Default::default() },
        };
        let mut buf = [0u8; 16];
        let end = dt.encode_ls(&mut buf, 0).unwrap();
        assert_eq!(end, 9);
        assert_eq!(DateTime::decode_ls(&buf[..end]).unwrap(), dt);
    }
}
