use std::fmt::Display;

use bytes::{Buf, BufMut, BytesMut};

use crate::{
    codec::{read_i32, read_u8, Decode, Encode},
    error::Error,
};

/// Fixed-point decimal, `value * 10^-scale`
///
/// encoding code = 'D', width = 5 (one octet scale followed by a signed 32-bit value)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Decimal {
    /// Number of decimal digits after the point
    pub scale: u8,

    /// Unscaled value
    pub value: i32,
}

impl Decimal {
    /// Creates a new [`Decimal`]
    pub fn new(scale: u8, value: i32) -> Self {
        Self { scale, value }
    }

    /// Lossy conversion to a float
    pub fn to_f64(&self) -> f64 {
        self.value as f64 / 10f64.powi(self.scale as i32)
    }
}

impl Display for Decimal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.value);
        }
        let digits = self.value.unsigned_abs().to_string();
        let scale = self.scale as usize;
        let sign = if self.value < 0 { "-" } else { "" };
        if digits.len() > scale {
            let (int, frac) = digits.split_at(digits.len() - scale);
            write!(f, "{}{}.{}", sign, int, frac)
        } else {
            write!(f, "{}0.{:0>width$}", sign, digits, width = scale)
        }
    }
}

impl Encode for Decimal {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u8(self.scale);
        dst.put_i32(self.value);
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        5
    }
}

impl Decode for Decimal {
    fn decode<B: Buf>(src: &mut B) -> Result<Self, Error> {
        let scale = read_u8(src)?;
        let value = read_i32(src)?;
        Ok(Self { scale, value })
    }
}

#[cfg(test)]
mod tests {
    use super::Decimal;

    #[test]
    fn display_decimal() {
        assert_eq!(Decimal::new(2, 314).to_string(), "3.14");
        assert_eq!(Decimal::new(3, -5).to_string(), "-0.005");
        assert_eq!(Decimal::new(0, 42).to_string(), "42");
    }

    #[test]
    fn decimal_to_f64() {
        assert!((Decimal::new(2, 314).to_f64() - 3.14).abs() < f64::EPSILON);
    }
}
