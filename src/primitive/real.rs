//! Exact-decimal Real: an i64 mantissa scaled by a hint code covering
//! decimal exponents -14..7 and binary fractions /2../256, plus the three
//! non-finite markers. The wire form is one hint byte followed by the
//! mantissa in minimal-width two's complement; non-finite hints and the
//! in-band blank marker carry no mantissa at all.

use crate::error::{CodecError, Result};
use crate::wire;
use num_enum::TryFromPrimitive;

use super::Decoded;

/// In-band blank marker in the hint byte. Zero-length payload remains the
/// canonical blank; this form is accepted on decode for interoperability.
const BLANK_HINT: u8 = 0x20;

/// Mantissa scaling factor.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum RealHint {
    ExponentNeg14 = 0,
    ExponentNeg13 = 1,
    ExponentNeg12 = 2,
    ExponentNeg11 = 3,
    ExponentNeg10 = 4,
    ExponentNeg9 = 5,
    ExponentNeg8 = 6,
    ExponentNeg7 = 7,
    ExponentNeg6 = 8,
    ExponentNeg5 = 9,
    ExponentNeg4 = 10,
    ExponentNeg3 = 11,
    ExponentNeg2 = 12,
    ExponentNeg1 = 13,
    Exponent0 = 14,
    Exponent1 = 15,
    Exponent2 = 16,
    Exponent3 = 17,
    Exponent4 = 18,
    Exponent5 = 19,
    Exponent6 = 20,
    Exponent7 = 21,
    Fraction1 = 22,
    Fraction2 = 23,
    Fraction4 = 24,
    Fraction8 = 25,
    Fraction16 = 26,
    Fraction32 = 27,
    Fraction64 = 28,
    Fraction128 = 29,
    Fraction256 = 30,
    Infinity = 33,
    NegInfinity = 34,
    NotANumber = 35,
}

impl RealHint {
    /// Non-finite hints describe the whole value; the mantissa is absent on
    /// the wire and ignored in memory.
    pub fn is_non_finite(self) -> bool {
        matches!(
            self,
            RealHint::Infinity | RealHint::NegInfinity | RealHint::NotANumber
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct Real {
    pub mantissa: i64,
    pub hint: RealHint,
}

impl Real {
    pub fn new(mantissa: i64, hint: RealHint) -> Self {
        Real { mantissa, hint }
    }

    pub(crate) fn encode_ls(&self, buf: &mut [u8], pos: usize) -> Result<usize> {
        let pos = wire::put_u8(buf, pos, self.hint as u8)?;
        if self.hint.is_non_finite() {
            return Ok(pos);
        }
        wire::put_int_ls(buf, pos, self.mantissa)
    }

    pub(crate) fn decode_ls(data: &[u8]) -> Result<Decoded<Real>> {
        let raw_hint = data[0] & 0x3F;
        if raw_hint == BLANK_HINT {
            return Ok(Decoded::Blank);
        }
        let hint = RealHint::try_from(raw_hint)
            .map_err(|_| CodecError::InvalidData("unrecognized real hint code"))?;
        if hint.is_non_finite() {
            return Ok(Decoded::Value(Real { mantissa: 0, hint }));
        }
        let mantissa = wire::get_int_ls(&data[1..])?;
        Ok(Decoded::Value(Real { mantissa, hint }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_roundtrip() {
        // 2.27 carried as mantissa 227, decimal exponent -2.
        let real = Real::new(227, RealHint::ExponentNeg2);
        let mut buf = [0u8; 16];
        let end = real.encode_ls(&mut buf, 0).unwrap();
        assert_eq!(&buf[..end], &[12, 227]);
        assert_eq!(Real::decode_ls(&buf[..end]).unwrap(), Decoded::Value(real));
    }

    #[test]
    fn negative_mantissa_width() {
        let real = Real::new(-300, RealHint::Exponent0);
        let mut buf = [0u8; 16];
        let end = real.encode_ls(&mut buf, 0).unwrap();
        assert_eq!(end, 3); // hint + two mantissa bytes
        assert_eq!(Real::decode_ls(&buf[..end]).unwrap(), Decoded::Value(real));
    }

    #[test]
    fn non_finite_hints_carry_no_mantissa() {
        for hint in [RealHint::Infinity, RealHint::NegInfinity, RealHint::NotANumber] {
            let mut buf = [0u8; 4];
            let end = Real::new(999, hint).encode_ls(&mut buf, 0).unwrap();
            assert_eq!(end, 1);
            let back = Real::decode_ls(&buf[..end]).unwrap().value().unwrap();
            assert_eq!(back.hint, hint);
            assert_eq!(back.mantissa, 0);
        }
    }

    #[test]
    fn in_band_blank_hint_accepted() {
        assert_eq!(Real::decode_ls(&[0x20]).unwrap(), Decoded::Blank);
    }

    #[test]
    fn garbage_hint_rejected() {
        assert!(Real::decode_ls(&[0x3F, 1]).is_err());
    }
}
