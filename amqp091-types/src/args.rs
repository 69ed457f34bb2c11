//! Sequential readers/writers for method argument lists
//!
//! Consecutive `bit` arguments share one octet, lowest bit first. Any other argument closes
//! the current octet.

use amqp091_wire::{
    codec::{
        long_str_len, read_long_bytes, read_long_str, read_short_str, read_u16, read_u32,
        read_u64, read_u8, short_str_len, write_long_str, write_short_str,
    },
    Decode, Encode, Error, FieldTable,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};

pub(crate) struct ArgWriter<'a> {
    dst: &'a mut BytesMut,
    bits: Option<(u8, u8)>,
}

impl<'a> ArgWriter<'a> {
    pub fn new(dst: &'a mut BytesMut) -> Self {
        Self { dst, bits: None }
    }

    fn flush_bits(&mut self) {
        if let Some((octet, _)) = self.bits.take() {
            self.dst.put_u8(octet);
        }
    }

    pub fn bit(&mut self, value: &bool) -> Result<(), Error> {
        let (mut octet, mut idx) = match self.bits.take() {
            Some((octet, idx)) if idx < 8 => (octet, idx),
            Some((octet, _)) => {
                self.dst.put_u8(octet);
                (0, 0)
            }
            None => (0, 0),
        };
        if *value {
            octet |= 1 << idx;
        }
        idx += 1;
        self.bits = Some((octet, idx));
        Ok(())
    }

    pub fn octet(&mut self, value: &u8) -> Result<(), Error> {
        self.flush_bits();
        self.dst.put_u8(*value);
        Ok(())
    }

    pub fn short(&mut self, value: &u16) -> Result<(), Error> {
        self.flush_bits();
        self.dst.put_u16(*value);
        Ok(())
    }

    pub fn long(&mut self, value: &u32) -> Result<(), Error> {
        self.flush_bits();
        self.dst.put_u32(*value);
        Ok(())
    }

    pub fn longlong(&mut self, value: &u64) -> Result<(), Error> {
        self.flush_bits();
        self.dst.put_u64(*value);
        Ok(())
    }

    pub fn shortstr(&mut self, value: &str) -> Result<(), Error> {
        self.flush_bits();
        write_short_str(&mut *self.dst, value)
    }

    pub fn longstr(&mut self, value: &str) -> Result<(), Error> {
        self.flush_bits();
        write_long_str(&mut *self.dst, value.as_bytes())
    }

    pub fn binary(&mut self, value: &Bytes) -> Result<(), Error> {
        self.flush_bits();
        write_long_str(&mut *self.dst, value)
    }

    pub fn table(&mut self, value: &FieldTable) -> Result<(), Error> {
        self.flush_bits();
        value.encode(&mut *self.dst)
    }

    pub fn content<T>(&mut self, _: &T) -> Result<(), Error> {
        Ok(())
    }

    pub fn finish(mut self) -> Result<(), Error> {
        self.flush_bits();
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct ArgLen {
    len: usize,
    bits: u8,
}

impl ArgLen {
    fn close_bits(&mut self) {
        if self.bits > 0 {
            self.len += 1;
            self.bits = 0;
        }
    }

    fn fixed(&mut self, width: usize) {
        self.close_bits();
        self.len += width;
    }

    pub fn bit(&mut self, _: &bool) {
        if self.bits == 8 {
            self.close_bits();
        }
        self.bits += 1;
    }

    pub fn octet(&mut self, _: &u8) {
        self.fixed(1)
    }

    pub fn short(&mut self, _: &u16) {
        self.fixed(2)
    }

    pub fn long(&mut self, _: &u32) {
        self.fixed(4)
    }

    pub fn longlong(&mut self, _: &u64) {
        self.fixed(8)
    }

    pub fn shortstr(&mut self, value: &str) {
        self.fixed(short_str_len(value))
    }

    pub fn longstr(&mut self, value: &str) {
        self.fixed(long_str_len(value.as_bytes()))
    }

    pub fn binary(&mut self, value: &Bytes) {
        self.fixed(long_str_len(value))
    }

    pub fn table(&mut self, value: &FieldTable) {
        self.fixed(value.encoded_len())
    }

    pub fn content<T>(&mut self, _: &T) {}

    pub fn finish(mut self) -> usize {
        self.close_bits();
        self.len
    }
}

pub(crate) struct ArgReader<'a, B> {
    src: &'a mut B,
    bits: Option<(u8, u8)>,
}

impl<'a, B: Buf> ArgReader<'a, B> {
    pub fn new(src: &'a mut B) -> Self {
        Self { src, bits: None }
    }

    pub fn bit(&mut self) -> Result<bool, Error> {
        let (octet, idx) = match self.bits.take() {
            Some((octet, idx)) if idx < 8 => (octet, idx),
            _ => (read_u8(&mut *self.src)?, 0),
        };
        self.bits = Some((octet, idx + 1));
        Ok(octet & (1 << idx) != 0)
    }

    pub fn octet(&mut self) -> Result<u8, Error> {
        self.bits = None;
        read_u8(&mut *self.src)
    }

    pub fn short(&mut self) -> Result<u16, Error> {
        self.bits = None;
        read_u16(&mut *self.src)
    }

    pub fn long(&mut self) -> Result<u32, Error> {
        self.bits = None;
        read_u32(&mut *self.src)
    }

    pub fn longlong(&mut self) -> Result<u64, Error> {
        self.bits = None;
        read_u64(&mut *self.src)
    }

    pub fn shortstr(&mut self) -> Result<String, Error> {
        self.bits = None;
        read_short_str(&mut *self.src)
    }

    pub fn longstr(&mut self) -> Result<String, Error> {
        self.bits = None;
        read_long_str(&mut *self.src)
    }

    pub fn binary(&mut self) -> Result<Bytes, Error> {
        self.bits = None;
        read_long_bytes(&mut *self.src)
    }

    pub fn table(&mut self) -> Result<FieldTable, Error> {
        self.bits = None;
        FieldTable::decode(&mut *self.src)
    }

    pub fn content<T: Default>(&mut self) -> Result<T, Error> {
        Ok(T::default())
    }
}
