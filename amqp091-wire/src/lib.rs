#![deny(missing_docs, missing_debug_implementations)]

//! Field table and primitive encoding of the AMQP 0-9-1 wire protocol
//!
//! Field values are a closed set of type-tagged values ([`FieldValue`]). Every value on the
//! wire is preceded by a one byte tag ([`FieldType`]); tables and arrays carry a 32-bit byte
//! count and are decoded until exactly that many bytes are consumed.
//!
//! ```rust
//! use amqp091_wire::{decode_field, encode_field, FieldValue, primitives::Decimal};
//!
//! let buf = encode_field(&FieldValue::Decimal(Decimal::new(2, 314))).unwrap();
//! assert_eq!(buf, b"D\x02\x00\x00\x01\x3A");
//!
//! let (value, consumed) = decode_field(&buf).unwrap();
//! assert_eq!(value, FieldValue::Decimal(Decimal::new(2, 314)));
//! assert_eq!(consumed, buf.len());
//! ```

pub mod codec;
pub mod error;
pub mod format_code;
pub mod primitives;
pub mod table;
pub mod value;

pub use codec::{Decode, Encode};
pub use error::Error;
pub use format_code::FieldType;
pub use table::FieldTable;
pub use value::{FieldArray, FieldValue};

use bytes::BytesMut;

/// Encode one type-tagged value
///
/// The value is validated before anything is written.
pub fn encode_field(value: &FieldValue) -> Result<Vec<u8>, Error> {
    value.validate()?;
    let mut dst = BytesMut::with_capacity(value.encoded_len());
    value.encode(&mut dst)?;
    Ok(dst.to_vec())
}

/// Decode one type-tagged value from the front of `buf`, returning the value and the number of
/// bytes consumed
pub fn decode_field(buf: &[u8]) -> Result<(FieldValue, usize), Error> {
    let mut src = buf;
    let value = FieldValue::decode(&mut src)?;
    Ok((value, buf.len() - src.len()))
}
