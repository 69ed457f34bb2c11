//! Type tags of field values

use std::{convert::TryFrom, fmt::Display};

use crate::error::Error;

/// One-byte type tag that precedes every field value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
#[repr(u8)]
pub enum FieldType {
    Boolean = b't',

    /// i8
    ShortShortInt = b'b',

    /// u8
    ShortShortUInt = b'B',

    /// i16
    ShortInt = b's',

    /// u16
    ShortUInt = b'u',

    /// i32
    LongInt = b'I',

    /// u32
    LongUInt = b'i',

    /// i64
    LongLongInt = b'l',

    /// f32
    Float = b'f',

    /// f64
    Double = b'd',

    Decimal = b'D',

    LongString = b'S',

    ByteArray = b'x',

    FieldArray = b'A',

    FieldTable = b'F',

    Timestamp = b'T',

    Void = b'V',
}

impl Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}:'{}'", self, *self as u8 as char)
    }
}

impl From<FieldType> for u8 {
    fn from(value: FieldType) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for FieldType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let code = match value {
            b't' => FieldType::Boolean,
            b'b' => FieldType::ShortShortInt,
            b'B' => FieldType::ShortShortUInt,
            b's' => FieldType::ShortInt,
            b'u' => FieldType::ShortUInt,
            b'I' => FieldType::LongInt,
            b'i' => FieldType::LongUInt,
            b'l' => FieldType::LongLongInt,
            b'f' => FieldType::Float,
            b'd' => FieldType::Double,
            b'D' => FieldType::Decimal,
            b'S' => FieldType::LongString,
            b'x' => FieldType::ByteArray,
            b'A' => FieldType::FieldArray,
            b'F' => FieldType::FieldTable,
            b'T' => FieldType::Timestamp,
            b'V' => FieldType::Void,
            _ => return Err(Error::InvalidFieldType(value)),
        };

        Ok(code)
    }
}
