//! Content header and the properties of the `basic` class

use amqp091_wire::{
    codec::{read_short_str, read_u16, read_u64, read_u8, short_str_len, write_short_str},
    primitives::Timestamp,
    Decode, Encode, Error, FieldTable, FieldValue,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::constants::class_id;

/// Delivery mode of a non-persistent message
pub const TRANSIENT: u8 = 1;

/// Delivery mode of a persistent message
pub const PERSISTENT: u8 = 2;

/// Presence flags of the basic properties, highest bit first
pub mod flags {
    /// content-type
    pub const CONTENT_TYPE: u16 = 0x8000;
    /// content-encoding
    pub const CONTENT_ENCODING: u16 = 0x4000;
    /// headers
    pub const HEADERS: u16 = 0x2000;
    /// delivery-mode
    pub const DELIVERY_MODE: u16 = 0x1000;
    /// priority
    pub const PRIORITY: u16 = 0x0800;
    /// correlation-id
    pub const CORRELATION_ID: u16 = 0x0400;
    /// reply-to
    pub const REPLY_TO: u16 = 0x0200;
    /// expiration
    pub const EXPIRATION: u16 = 0x0100;
    /// message-id
    pub const MESSAGE_ID: u16 = 0x0080;
    /// timestamp
    pub const TIMESTAMP: u16 = 0x0040;
    /// type
    pub const TYPE: u16 = 0x0020;
    /// user-id
    pub const USER_ID: u16 = 0x0010;
    /// app-id
    pub const APP_ID: u16 = 0x0008;
    /// cluster-id, reserved
    pub const CLUSTER_ID: u16 = 0x0004;
}

/// Properties of a message of the `basic` class
///
/// A property is sent only when it is `Some`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasicProperties {
    /// MIME content type
    pub content_type: Option<String>,

    /// MIME content encoding
    pub content_encoding: Option<String>,

    /// Application headers
    pub headers: Option<FieldTable>,

    /// [`TRANSIENT`] or [`PERSISTENT`]
    pub delivery_mode: Option<u8>,

    /// Message priority, 0 to 9
    pub priority: Option<u8>,

    /// Application correlation identifier
    pub correlation_id: Option<String>,

    /// Address to reply to
    pub reply_to: Option<String>,

    /// Message expiration specification
    pub expiration: Option<String>,

    /// Application message identifier
    pub message_id: Option<String>,

    /// Message timestamp
    pub timestamp: Option<Timestamp>,

    /// Message type name
    pub kind: Option<String>,

    /// Creating user id
    pub user_id: Option<String>,

    /// Creating application id
    pub app_id: Option<String>,

    /// Reserved, must be empty
    pub cluster_id: Option<String>,
}

macro_rules! with_property {
    ($($fn_name:ident => $field:ident: $ty:ty),*) => {
        $(
            #[doc = concat!("Set `", stringify!($field), "`")]
            pub fn $fn_name(mut self, value: impl Into<$ty>) -> Self {
                self.$field = Some(value.into());
                self
            }
        )*
    };
}

impl BasicProperties {
    with_property! {
        with_content_type => content_type: String,
        with_content_encoding => content_encoding: String,
        with_headers => headers: FieldTable,
        with_delivery_mode => delivery_mode: u8,
        with_priority => priority: u8,
        with_correlation_id => correlation_id: String,
        with_reply_to => reply_to: String,
        with_expiration => expiration: String,
        with_message_id => message_id: String,
        with_timestamp => timestamp: Timestamp,
        with_kind => kind: String,
        with_user_id => user_id: String,
        with_app_id => app_id: String
    }

    /// Presence bitmask of the properties that are set
    pub fn flags(&self) -> u16 {
        let mut mask = 0;
        let mut set = |present: bool, flag: u16| {
            if present {
                mask |= flag;
            }
        };
        set(self.content_type.is_some(), flags::CONTENT_TYPE);
        set(self.content_encoding.is_some(), flags::CONTENT_ENCODING);
        set(self.headers.is_some(), flags::HEADERS);
        set(self.delivery_mode.is_some(), flags::DELIVERY_MODE);
        set(self.priority.is_some(), flags::PRIORITY);
        set(self.correlation_id.is_some(), flags::CORRELATION_ID);
        set(self.reply_to.is_some(), flags::REPLY_TO);
        set(self.expiration.is_some(), flags::EXPIRATION);
        set(self.message_id.is_some(), flags::MESSAGE_ID);
        set(self.timestamp.is_some(), flags::TIMESTAMP);
        set(self.kind.is_some(), flags::TYPE);
        set(self.user_id.is_some(), flags::USER_ID);
        set(self.app_id.is_some(), flags::APP_ID);
        set(self.cluster_id.is_some(), flags::CLUSTER_ID);
        mask
    }

    /// Whether the message asks to be persisted
    pub fn is_persistent(&self) -> bool {
        self.delivery_mode == Some(PERSISTENT)
    }

    /// Value of an application header
    pub fn header(&self, key: &str) -> Option<&FieldValue> {
        self.headers.as_ref()?.get(key)
    }

    /// Set an application header, creating the header table if there is none
    pub fn set_header(
        &mut self,
        key: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        self.headers
            .get_or_insert_with(FieldTable::new)
            .insert(key, value)
    }

    /// Keys of the application headers
    pub fn header_keys(&self) -> impl Iterator<Item = &str> {
        self.headers
            .iter()
            .flat_map(|headers| headers.keys().map(String::as_str))
    }

    fn short_strs(&self) -> [&Option<String>; 10] {
        [
            &self.content_type,
            &self.content_encoding,
            &self.correlation_id,
            &self.reply_to,
            &self.expiration,
            &self.message_id,
            &self.kind,
            &self.user_id,
            &self.app_id,
            &self.cluster_id,
        ]
    }
}

impl Encode for BasicProperties {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        let start = dst.len();
        let result = encode_properties(self, dst);
        if result.is_err() {
            dst.truncate(start);
        }
        result
    }

    fn encoded_len(&self) -> usize {
        let strs: usize = self
            .short_strs()
            .iter()
            .filter_map(|s| s.as_deref())
            .map(short_str_len)
            .sum();
        let headers = self.headers.as_ref().map_or(0, Encode::encoded_len);
        let octets = self.delivery_mode.map_or(0, |_| 1) + self.priority.map_or(0, |_| 1);
        let timestamp = self.timestamp.map_or(0, |_| 8);
        2 + strs + headers + octets + timestamp
    }
}

fn encode_properties(props: &BasicProperties, dst: &mut BytesMut) -> Result<(), Error> {
    fn opt_str(dst: &mut BytesMut, value: &Option<String>) -> Result<(), Error> {
        match value {
            Some(s) => write_short_str(dst, s),
            None => Ok(()),
        }
    }

    dst.put_u16(props.flags());
    opt_str(dst, &props.content_type)?;
    opt_str(dst, &props.content_encoding)?;
    if let Some(headers) = &props.headers {
        headers.encode(dst)?;
    }
    if let Some(mode) = props.delivery_mode {
        dst.put_u8(mode);
    }
    if let Some(priority) = props.priority {
        dst.put_u8(priority);
    }
    opt_str(dst, &props.correlation_id)?;
    opt_str(dst, &props.reply_to)?;
    opt_str(dst, &props.expiration)?;
    opt_str(dst, &props.message_id)?;
    if let Some(timestamp) = &props.timestamp {
        timestamp.encode(dst)?;
    }
    opt_str(dst, &props.kind)?;
    opt_str(dst, &props.user_id)?;
    opt_str(dst, &props.app_id)?;
    opt_str(dst, &props.cluster_id)
}

impl Decode for BasicProperties {
    fn decode<B: Buf>(src: &mut B) -> Result<Self, Error> {
        let mask = read_u16(src)?;
        let has = |flag: u16| mask & flag != 0;
        let opt_str = |src: &mut B, flag: u16| -> Result<Option<String>, Error> {
            match has(flag) {
                true => read_short_str(src).map(Some),
                false => Ok(None),
            }
        };

        let content_type = opt_str(src, flags::CONTENT_TYPE)?;
        let content_encoding = opt_str(src, flags::CONTENT_ENCODING)?;
        let headers = match has(flags::HEADERS) {
            true => Some(FieldTable::decode(src)?),
            false => None,
        };
        let delivery_mode = match has(flags::DELIVERY_MODE) {
            true => Some(read_u8(src)?),
            false => None,
        };
        let priority = match has(flags::PRIORITY) {
            true => Some(read_u8(src)?),
            false => None,
        };
        let correlation_id = opt_str(src, flags::CORRELATION_ID)?;
        let reply_to = opt_str(src, flags::REPLY_TO)?;
        let expiration = opt_str(src, flags::EXPIRATION)?;
        let message_id = opt_str(src, flags::MESSAGE_ID)?;
        let timestamp = match has(flags::TIMESTAMP) {
            true => Some(Timestamp::decode(src)?),
            false => None,
        };
        let kind = opt_str(src, flags::TYPE)?;
        let user_id = opt_str(src, flags::USER_ID)?;
        let app_id = opt_str(src, flags::APP_ID)?;
        let cluster_id = opt_str(src, flags::CLUSTER_ID)?;

        Ok(Self {
            content_type,
            content_encoding,
            headers,
            delivery_mode,
            priority,
            correlation_id,
            reply_to,
            expiration,
            message_id,
            timestamp,
            kind,
            user_id,
            app_id,
            cluster_id,
        })
    }
}

/// Properties and body that follow a content-bearing method
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Content {
    /// Message properties
    pub properties: BasicProperties,

    /// Message body
    pub body: Bytes,
}

impl Content {
    /// Creates a new [`Content`]
    pub fn new(properties: BasicProperties, body: impl Into<Bytes>) -> Self {
        Self {
            properties,
            body: body.into(),
        }
    }
}

/// Payload of a content header frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentHeader {
    /// Class of the content, always `basic` in practice
    pub class_id: u16,

    /// Unused, always zero
    pub weight: u16,

    /// Total size of the body frames that follow
    pub body_size: u64,

    /// Message properties
    pub properties: BasicProperties,
}

impl ContentHeader {
    /// Header of a `basic` class message
    pub fn basic(body_size: u64, properties: BasicProperties) -> Self {
        Self {
            class_id: class_id::BASIC,
            weight: 0,
            body_size,
            properties,
        }
    }
}

impl Encode for ContentHeader {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        let start = dst.len();
        dst.put_u16(self.class_id);
        dst.put_u16(self.weight);
        dst.put_u64(self.body_size);
        if let Err(err) = self.properties.encode(dst) {
            dst.truncate(start);
            return Err(err);
        }
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        12 + self.properties.encoded_len()
    }
}

impl Decode for ContentHeader {
    fn decode<B: Buf>(src: &mut B) -> Result<Self, Error> {
        let class_id = read_u16(src)?;
        let weight = read_u16(src)?;
        let body_size = read_u64(src)?;
        let properties = BasicProperties::decode(src)?;
        Ok(Self {
            class_id,
            weight,
            body_size,
            properties,
        })
    }
}
