//! Field value model
//!
//! A field value is a closed, tagged union over the type tags in [`FieldType`]. Values are
//! preceded on the wire by their one-byte tag.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use ordered_float::OrderedFloat;

use crate::{
    codec::{
        read_bytes, read_f32, read_f64, read_i16, read_i32, read_i64, read_i8, read_long_bytes,
        read_u16, read_u32, read_u8, validate_long_len, write_long_str, Decode,
        Encode,
    },
    error::Error,
    format_code::FieldType,
    primitives::{Decimal, Timestamp},
    table::FieldTable,
};

/// An ordered sequence of field values, encoding code = 'A'
pub type FieldArray = Vec<FieldValue>;

/// A typed value found in a [`FieldTable`] or a [`FieldArray`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldValue {
    /// No value
    ///
    /// encoding code = 'V', width = 0
    #[default]
    Void,

    /// encoding code = 't', width = 1
    Bool(bool),

    /// encoding code = 'b', width = 1
    ShortShortInt(i8),

    /// encoding code = 'B', width = 1
    ShortShortUInt(u8),

    /// encoding code = 's', width = 2
    ShortInt(i16),

    /// encoding code = 'u', width = 2
    ShortUInt(u16),

    /// encoding code = 'I', width = 4
    LongInt(i32),

    /// encoding code = 'i', width = 4
    LongUInt(u32),

    /// encoding code = 'l', width = 8
    LongLongInt(i64),

    /// IEEE-754 single precision
    ///
    /// encoding code = 'f', width = 4
    Float(OrderedFloat<f32>),

    /// IEEE-754 double precision
    ///
    /// encoding code = 'd', width = 8
    Double(OrderedFloat<f64>),

    /// encoding code = 'D', width = 5
    Decimal(Decimal),

    /// UTF-8 string with a 32-bit length prefix
    ///
    /// encoding code = 'S'
    LongString(String),

    /// A long string received with bytes that are not valid UTF-8
    ///
    /// encoding code = 'S'
    LongStringBytes(Bytes),

    /// Opaque bytes with a 32-bit length prefix
    ///
    /// encoding code = 'x'
    ByteArray(Bytes),

    /// Seconds since the unix epoch
    ///
    /// encoding code = 'T', width = 8
    Timestamp(Timestamp),

    /// encoding code = 'F'
    FieldTable(FieldTable),

    /// encoding code = 'A'
    FieldArray(FieldArray),
}

impl FieldValue {
    /// Type tag of the value
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Void => FieldType::Void,
            FieldValue::Bool(_) => FieldType::Boolean,
            FieldValue::ShortShortInt(_) => FieldType::ShortShortInt,
            FieldValue::ShortShortUInt(_) => FieldType::ShortShortUInt,
            FieldValue::ShortInt(_) => FieldType::ShortInt,
            FieldValue::ShortUInt(_) => FieldType::ShortUInt,
            FieldValue::LongInt(_) => FieldType::LongInt,
            FieldValue::LongUInt(_) => FieldType::LongUInt,
            FieldValue::LongLongInt(_) => FieldType::LongLongInt,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::Double(_) => FieldType::Double,
            FieldValue::Decimal(_) => FieldType::Decimal,
            FieldValue::LongString(_) | FieldValue::LongStringBytes(_) => FieldType::LongString,
            FieldValue::ByteArray(_) => FieldType::ByteArray,
            FieldValue::Timestamp(_) => FieldType::Timestamp,
            FieldValue::FieldTable(_) => FieldType::FieldTable,
            FieldValue::FieldArray(_) => FieldType::FieldArray,
        }
    }

    /// Checks the length limits of strings, keys and nested containers
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            FieldValue::LongString(s) => validate_long_len(s.len()),
            FieldValue::ByteArray(b) | FieldValue::LongStringBytes(b) => {
                validate_long_len(b.len())
            }
            FieldValue::FieldTable(table) => table.validate(),
            FieldValue::FieldArray(array) => {
                for value in array {
                    value.validate()?;
                }
                validate_long_len(array_payload_len(array))
            }
            _ => Ok(()),
        }
    }

    /// Returns the string if the value is a [`FieldValue::LongString`]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::LongString(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean if the value is a [`FieldValue::Bool`]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Widens any integer variant into an i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::ShortShortInt(v) => Some(*v as i64),
            FieldValue::ShortShortUInt(v) => Some(*v as i64),
            FieldValue::ShortInt(v) => Some(*v as i64),
            FieldValue::ShortUInt(v) => Some(*v as i64),
            FieldValue::LongInt(v) => Some(*v as i64),
            FieldValue::LongUInt(v) => Some(*v as i64),
            FieldValue::LongLongInt(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the table if the value is a [`FieldValue::FieldTable`]
    pub fn as_table(&self) -> Option<&FieldTable> {
        match self {
            FieldValue::FieldTable(t) => Some(t),
            _ => None,
        }
    }

    /// Returns the array if the value is a [`FieldValue::FieldArray`]
    pub fn as_array(&self) -> Option<&FieldArray> {
        match self {
            FieldValue::FieldArray(a) => Some(a),
            _ => None,
        }
    }

    fn encode_payload(&self, dst: &mut BytesMut) -> Result<(), Error> {
        match self {
            FieldValue::Void => {}
            FieldValue::Bool(v) => dst.put_u8(*v as u8),
            FieldValue::ShortShortInt(v) => dst.put_i8(*v),
            FieldValue::ShortShortUInt(v) => dst.put_u8(*v),
            FieldValue::ShortInt(v) => dst.put_i16(*v),
            FieldValue::ShortUInt(v) => dst.put_u16(*v),
            FieldValue::LongInt(v) => dst.put_i32(*v),
            FieldValue::LongUInt(v) => dst.put_u32(*v),
            FieldValue::LongLongInt(v) => dst.put_i64(*v),
            FieldValue::Float(v) => dst.put_f32(v.into_inner()),
            FieldValue::Double(v) => dst.put_f64(v.into_inner()),
            FieldValue::Decimal(v) => v.encode(dst)?,
            FieldValue::LongString(v) => write_long_str(dst, v.as_bytes())?,
            FieldValue::ByteArray(v) | FieldValue::LongStringBytes(v) => write_long_str(dst, v)?,
            FieldValue::Timestamp(v) => v.encode(dst)?,
            FieldValue::FieldTable(v) => v.encode(dst)?,
            FieldValue::FieldArray(v) => {
                let len = array_payload_len(v);
                validate_long_len(len)?;
                dst.put_u32(len as u32);
                for value in v {
                    value.encode(dst)?;
                }
            }
        }
        Ok(())
    }

    fn payload_len(&self) -> usize {
        match self {
            FieldValue::Void => 0,
            FieldValue::Bool(_) | FieldValue::ShortShortInt(_) | FieldValue::ShortShortUInt(_) => 1,
            FieldValue::ShortInt(_) | FieldValue::ShortUInt(_) => 2,
            FieldValue::LongInt(_) | FieldValue::LongUInt(_) | FieldValue::Float(_) => 4,
            FieldValue::LongLongInt(_) | FieldValue::Double(_) => 8,
            FieldValue::Decimal(v) => v.encoded_len(),
            FieldValue::LongString(v) => 4 + v.len(),
            FieldValue::ByteArray(v) | FieldValue::LongStringBytes(v) => 4 + v.len(),
            FieldValue::Timestamp(v) => v.encoded_len(),
            FieldValue::FieldTable(v) => v.encoded_len(),
            FieldValue::FieldArray(v) => 4 + array_payload_len(v),
        }
    }
}

fn array_payload_len(array: &[FieldValue]) -> usize {
    array.iter().map(Encode::encoded_len).sum()
}

impl Encode for FieldValue {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        let start = dst.len();
        dst.put_u8(self.field_type().into());
        if let Err(err) = self.encode_payload(dst) {
            dst.truncate(start);
            return Err(err);
        }
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        1 + self.payload_len()
    }
}

impl Decode for FieldValue {
    fn decode<B: Buf>(src: &mut B) -> Result<Self, Error> {
        let code = FieldType::try_from(read_u8(src)?)?;
        let value = match code {
            FieldType::Void => FieldValue::Void,
            FieldType::Boolean => FieldValue::Bool(read_u8(src)? != 0),
            FieldType::ShortShortInt => FieldValue::ShortShortInt(read_i8(src)?),
            FieldType::ShortShortUInt => FieldValue::ShortShortUInt(read_u8(src)?),
            FieldType::ShortInt => FieldValue::ShortInt(read_i16(src)?),
            FieldType::ShortUInt => FieldValue::ShortUInt(read_u16(src)?),
            FieldType::LongInt => FieldValue::LongInt(read_i32(src)?),
            FieldType::LongUInt => FieldValue::LongUInt(read_u32(src)?),
            FieldType::LongLongInt => FieldValue::LongLongInt(read_i64(src)?),
            FieldType::Float => FieldValue::Float(OrderedFloat(read_f32(src)?)),
            FieldType::Double => FieldValue::Double(OrderedFloat(read_f64(src)?)),
            FieldType::Decimal => FieldValue::Decimal(Decimal::decode(src)?),
            FieldType::LongString => {
                // other publishers may put arbitrary bytes in headers
                let bytes = read_long_bytes(src)?;
                match std::str::from_utf8(&bytes) {
                    Ok(s) => FieldValue::LongString(s.to_owned()),
                    Err(_) => FieldValue::LongStringBytes(bytes),
                }
            }
            FieldType::ByteArray => FieldValue::ByteArray(read_long_bytes(src)?),
            FieldType::Timestamp => FieldValue::Timestamp(Timestamp::decode(src)?),
            FieldType::FieldTable => FieldValue::FieldTable(FieldTable::decode(src)?),
            FieldType::FieldArray => {
                let len = read_u32(src)? as usize;
                let mut payload = read_bytes(src, len)?;
                let mut array = FieldArray::new();
                while payload.has_remaining() {
                    array.push(FieldValue::decode(&mut payload)?);
                }
                FieldValue::FieldArray(array)
            }
        };
        Ok(value)
    }
}

macro_rules! impl_from_for_field_value {
    ($($ty:ty => $variant:ident),*) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::$variant(value.into())
                }
            }
        )*
    };
}

impl_from_for_field_value! {
    bool => Bool,
    i8 => ShortShortInt,
    u8 => ShortShortUInt,
    i16 => ShortInt,
    u16 => ShortUInt,
    i32 => LongInt,
    u32 => LongUInt,
    i64 => LongLongInt,
    f32 => Float,
    f64 => Double,
    Decimal => Decimal,
    String => LongString,
    &str => LongString,
    Bytes => ByteArray,
    Timestamp => Timestamp,
    FieldTable => FieldTable,
    FieldArray => FieldArray
}

impl From<()> for FieldValue {
    fn from(_: ()) -> Self {
        FieldValue::Void
    }
}
