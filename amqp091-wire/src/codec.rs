//! Encoding traits and the primitive readers/writers shared by field values, method arguments
//! and content properties
//!
//! All multi-byte integers are big-endian. Reads check the remaining length first so that a
//! truncated value is reported as [`Error::UnexpectedEof`] instead of panicking inside
//! [`bytes::Buf`].

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::Error;

/// Maximum length of a short string
pub const SHORT_STRING_MAX_LEN: usize = u8::MAX as usize;

/// Types that can write themselves to the wire
pub trait Encode {
    /// Write the wire form of `self` into `dst`
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error>;

    /// Number of bytes [`Encode::encode`] will write
    fn encoded_len(&self) -> usize;
}

/// Types that can read themselves from the wire
pub trait Decode: Sized {
    /// Read a value of `Self` from the front of `src`
    fn decode<B: Buf>(src: &mut B) -> Result<Self, Error>;
}

#[inline]
fn ensure<B: Buf>(src: &B, needed: usize) -> Result<(), Error> {
    let remaining = src.remaining();
    match remaining < needed {
        true => Err(Error::eof(needed, remaining)),
        false => Ok(()),
    }
}

macro_rules! read_fixed {
    ($($(#[$meta:meta])* $name:ident => $ty:ty, $get:ident;)*) => {
        $(
            $(#[$meta])*
            #[inline]
            pub fn $name<B: Buf>(src: &mut B) -> Result<$ty, Error> {
                ensure(src, std::mem::size_of::<$ty>())?;
                Ok(src.$get())
            }
        )*
    };
}

read_fixed! {
    /// Read an octet
    read_u8 => u8, get_u8;
    /// Read a signed octet
    read_i8 => i8, get_i8;
    /// Read a big-endian u16
    read_u16 => u16, get_u16;
    /// Read a big-endian i16
    read_i16 => i16, get_i16;
    /// Read a big-endian u32
    read_u32 => u32, get_u32;
    /// Read a big-endian i32
    read_i32 => i32, get_i32;
    /// Read a big-endian u64
    read_u64 => u64, get_u64;
    /// Read a big-endian i64
    read_i64 => i64, get_i64;
    /// Read a big-endian IEEE-754 single
    read_f32 => f32, get_f32;
    /// Read a big-endian IEEE-754 double
    read_f64 => f64, get_f64;
}

/// Read `len` raw bytes
pub fn read_bytes<B: Buf>(src: &mut B, len: usize) -> Result<Bytes, Error> {
    ensure(src, len)?;
    Ok(src.copy_to_bytes(len))
}

/// Read a short string (one length octet followed by UTF-8 bytes)
pub fn read_short_str<B: Buf>(src: &mut B) -> Result<String, Error> {
    let len = read_u8(src)? as usize;
    let bytes = read_bytes(src, len)?;
    Ok(std::str::from_utf8(&bytes)?.to_owned())
}

/// Read the raw bytes of a long string (32-bit length followed by the bytes)
pub fn read_long_bytes<B: Buf>(src: &mut B) -> Result<Bytes, Error> {
    let len = read_u32(src)? as usize;
    read_bytes(src, len)
}

/// Read a long string that must be valid UTF-8
pub fn read_long_str<B: Buf>(src: &mut B) -> Result<String, Error> {
    let bytes = read_long_bytes(src)?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

/// Read one octet of packed bits, lowest bit first
pub fn read_bits<B: Buf, const N: usize>(src: &mut B) -> Result<[bool; N], Error> {
    if N > 8 {
        return Err(Error::TooManyBits(N));
    }
    let octet = read_u8(src)?;
    let mut bits = [false; N];
    for (i, bit) in bits.iter_mut().enumerate() {
        *bit = octet & (1 << i) != 0;
    }
    Ok(bits)
}

/// Checks that `s` fits in a short string
pub fn validate_short_str(s: &str) -> Result<(), Error> {
    match s.len() > SHORT_STRING_MAX_LEN {
        true => Err(Error::ShortStringTooLong(s.len())),
        false => Ok(()),
    }
}

/// Checks that a payload of `len` bytes fits behind a 32-bit length prefix
pub fn validate_long_len(len: usize) -> Result<(), Error> {
    match u32::try_from(len) {
        Ok(_) => Ok(()),
        Err(_) => Err(Error::LongStringTooLong(len)),
    }
}

/// Write a short string
pub fn write_short_str(dst: &mut BytesMut, s: &str) -> Result<(), Error> {
    validate_short_str(s)?;
    dst.put_u8(s.len() as u8);
    dst.put_slice(s.as_bytes());
    Ok(())
}

/// Write a long string
pub fn write_long_str(dst: &mut BytesMut, s: &[u8]) -> Result<(), Error> {
    validate_long_len(s.len())?;
    dst.put_u32(s.len() as u32);
    dst.put_slice(s);
    Ok(())
}

/// Pack up to eight bits into one octet, lowest bit first
pub fn write_bits(dst: &mut BytesMut, bits: &[bool]) -> Result<(), Error> {
    if bits.len() > 8 {
        return Err(Error::TooManyBits(bits.len()));
    }
    let octet = bits
        .iter()
        .enumerate()
        .fold(0u8, |acc, (i, bit)| acc | ((*bit as u8) << i));
    dst.put_u8(octet);
    Ok(())
}

/// Encoded length of a short string
#[inline]
pub fn short_str_len(s: &str) -> usize {
    1 + s.len()
}

/// Encoded length of a long string
#[inline]
pub fn long_str_len(s: &[u8]) -> usize {
    4 + s.len()
}
