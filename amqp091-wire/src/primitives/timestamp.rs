use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, BytesMut};

use crate::{
    codec::{read_i64, Decode, Encode},
    error::Error,
};

/// Seconds since the unix epoch
///
/// encoding code = 'T', width = 8
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a [`Timestamp`] from seconds since the unix epoch
    pub fn from_seconds(seconds: i64) -> Self {
        Self(seconds)
    }

    /// Seconds since the unix epoch
    pub fn seconds(&self) -> i64 {
        self.0
    }

    /// The current time truncated to whole seconds
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    /// Converts into a [`SystemTime`], `None` if the platform cannot represent it
    pub fn to_system_time(&self) -> Option<SystemTime> {
        let offset = Duration::from_secs(self.0.unsigned_abs());
        match self.0 >= 0 {
            true => UNIX_EPOCH.checked_add(offset),
            false => UNIX_EPOCH.checked_sub(offset),
        }
    }

    /// Consumes the wrapper into the inner i64
    pub fn into_inner(self) -> i64 {
        self.0
    }
}

impl From<i64> for Timestamp {
    fn from(val: i64) -> Self {
        Self(val)
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => Self(d.as_secs() as i64),
            Err(e) => Self(-(e.duration().as_secs() as i64)),
        }
    }
}

impl TryFrom<Timestamp> for SystemTime {
    type Error = Timestamp;

    fn try_from(value: Timestamp) -> Result<Self, Self::Error> {
        value.to_system_time().ok_or(value)
    }
}

#[cfg(feature = "chrono")]
impl From<chrono::DateTime<chrono::Utc>> for Timestamp {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        Self(value.timestamp())
    }
}

#[cfg(feature = "chrono")]
impl TryFrom<Timestamp> for chrono::DateTime<chrono::Utc> {
    type Error = Timestamp;

    fn try_from(value: Timestamp) -> Result<Self, Self::Error> {
        chrono::DateTime::from_timestamp(value.0, 0).ok_or(value)
    }
}

#[cfg(feature = "time")]
impl From<time::OffsetDateTime> for Timestamp {
    fn from(value: time::OffsetDateTime) -> Self {
        Self(value.unix_timestamp())
    }
}

#[cfg(feature = "time")]
impl TryFrom<Timestamp> for time::OffsetDateTime {
    type Error = time::error::ComponentRange;

    fn try_from(value: Timestamp) -> Result<Self, Self::Error> {
        time::OffsetDateTime::from_unix_timestamp(value.0)
    }
}

impl Encode for Timestamp {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_i64(self.0);
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        8
    }
}

impl Decode for Timestamp {
    fn decode<B: Buf>(src: &mut B) -> Result<Self, Error> {
        read_i64(src).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::Timestamp;

    #[test]
    fn system_time_conversion() {
        let ts = Timestamp::from_seconds(1_234_567_890);
        let time = ts.to_system_time().unwrap();
        assert_eq!(time, UNIX_EPOCH + Duration::from_secs(1_234_567_890));
        assert_eq!(Timestamp::from(time), ts);
    }

    #[test]
    fn negative_timestamp() {
        let ts = Timestamp::from_seconds(-60);
        assert_eq!(Timestamp::from(ts.to_system_time().unwrap()), ts);
    }
}
