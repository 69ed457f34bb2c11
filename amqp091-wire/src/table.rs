//! Field table

use bytes::{Buf, BufMut, BytesMut};
use indexmap::IndexMap;

pub use indexmap::map::{IntoIter, Iter, Keys, Values};

use crate::{
    codec::{
        read_bytes, read_short_str, read_u32, short_str_len, validate_long_len,
        validate_short_str, write_short_str, Decode, Encode,
    },
    error::Error,
    value::FieldValue,
};

/// A mapping from short string keys to [`FieldValue`]s
///
/// Insertion order is kept for encoding but ignored by equality.
///
/// encoding code = 'F', a 32-bit byte count followed by (short string key, tagged value) pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct FieldTable(IndexMap<String, FieldValue>);

impl From<IndexMap<String, FieldValue>> for FieldTable {
    fn from(map: IndexMap<String, FieldValue>) -> Self {
        Self(map)
    }
}

impl FieldTable {
    /// Creates an empty [`FieldTable`]
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Insert a key-value pair, returning the previous value of the key
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Get the value of a key
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    /// Get a mutable reference to the value of a key
    pub fn get_mut(&mut self, key: &str) -> Option<&mut FieldValue> {
        self.0.get_mut(key)
    }

    /// Remove a key, keeping the order of the remaining entries
    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.0.shift_remove(key)
    }

    /// Whether the table contains the key
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Return the number of key-value pairs
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return an iterator over the key-value pairs in insertion order
    pub fn iter(&self) -> Iter<'_, String, FieldValue> {
        self.0.iter()
    }

    /// Return an iterator over the keys in insertion order
    pub fn keys(&self) -> Keys<'_, String, FieldValue> {
        self.0.keys()
    }

    /// Get a reference to the inner [`IndexMap`]
    pub fn as_inner(&self) -> &IndexMap<String, FieldValue> {
        &self.0
    }

    /// Consumes the wrapper into the inner [`IndexMap`]
    pub fn into_inner(self) -> IndexMap<String, FieldValue> {
        self.0
    }

    /// Checks key lengths and the total size, recursing into nested values
    pub fn validate(&self) -> Result<(), Error> {
        for (key, value) in &self.0 {
            validate_short_str(key)?;
            value.validate()?;
        }
        validate_long_len(self.payload_len())
    }

    fn payload_len(&self) -> usize {
        self.0
            .iter()
            .map(|(k, v)| short_str_len(k) + v.encoded_len())
            .sum()
    }

    /// Decode the pairs found in `payload` until it is exhausted
    pub fn decode_pairs<B: Buf>(payload: &mut B) -> Result<Self, Error> {
        let mut map = IndexMap::new();
        while payload.has_remaining() {
            let key = read_short_str(payload)?;
            let value = FieldValue::decode(payload)?;
            map.insert(key, value);
        }
        Ok(Self(map))
    }

    /// Encode the pairs without the leading byte count
    pub fn encode_pairs(&self, dst: &mut BytesMut) -> Result<(), Error> {
        for (key, value) in &self.0 {
            write_short_str(dst, key)?;
            value.encode(dst)?;
        }
        Ok(())
    }
}

impl Encode for FieldTable {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        let start = dst.len();
        let len = self.payload_len();
        let result = validate_long_len(len).and_then(|_| {
            dst.put_u32(len as u32);
            self.encode_pairs(dst)
        });
        if result.is_err() {
            dst.truncate(start);
        }
        result
    }

    fn encoded_len(&self) -> usize {
        4 + self.payload_len()
    }
}

impl Decode for FieldTable {
    fn decode<B: Buf>(src: &mut B) -> Result<Self, Error> {
        let len = read_u32(src)? as usize;
        let mut payload = read_bytes(src, len)?;
        Self::decode_pairs(&mut payload)
    }
}

impl<K, V> FromIterator<(K, V)> for FieldTable
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K, V> Extend<(K, V)> for FieldTable
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        self.0
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())))
    }
}

impl IntoIterator for FieldTable {
    type Item = (String, FieldValue);
    type IntoIter = IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FieldTable {
    type Item = (&'a String, &'a FieldValue);
    type IntoIter = Iter<'a, String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};

    use crate::{
        codec::{Decode, Encode},
        value::FieldValue,
    };

    use super::FieldTable;

    #[test]
    fn table_equality_ignores_order() {
        let a: FieldTable = [("a", 1i32), ("b", 2i32)].into_iter().collect();
        let b: FieldTable = [("b", 2i32), ("a", 1i32)].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn table_round_trip_keeps_insertion_order() {
        let mut table = FieldTable::new();
        table.insert("x-max-length", 10i32);
        table.insert("x-queue-type", "quorum");
        table.insert("flags", FieldValue::FieldArray(vec![true.into(), ().into()]));

        let mut dst = BytesMut::new();
        table.encode(&mut dst).unwrap();
        assert_eq!(dst.len(), table.encoded_len());

        let mut src = dst.freeze();
        let decoded = FieldTable::decode(&mut src).unwrap();
        assert_eq!(decoded, table);
        let keys: Vec<_> = decoded.keys().cloned().collect();
        assert_eq!(keys, vec!["x-max-length", "x-queue-type", "flags"]);
    }

    #[test]
    fn table_with_trailing_bytes_is_an_error() {
        // byte count covers one extra octet that is not a complete pair
        let mut src = Bytes::from_static(b"\x00\x00\x00\x07\x03fooB\x01\x40");
        assert!(FieldTable::decode(&mut src).is_err());
    }

    #[test]
    fn table_with_too_few_bytes_is_an_error() {
        let mut src = Bytes::from_static(b"\x00\x00\x00\x06\x03foou\x30");
        assert!(FieldTable::decode(&mut src).is_err());
    }

    #[test]
    fn empty_table() {
        let mut dst = BytesMut::new();
        FieldTable::new().encode(&mut dst).unwrap();
        assert_eq!(&dst[..], b"\x00\x00\x00\x00");
    }
}
