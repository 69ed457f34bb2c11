//! AMQP 0-9-1 frames and the frame codec
//!
//! ```text
//! +------+---------+-------------+  +-------------+  +-----------+
//! | type | channel |     size    |  |   payload   |  | frame-end |
//! +------+---------+-------------+  +-------------+  +-----------+
//!  octet   short        long          size octets       0xCE
//! ```

use amqp091_types::{
    constants::{
        FRAME_BODY, FRAME_END, FRAME_HEADER, FRAME_HEADER_SIZE, FRAME_HEARTBEAT, FRAME_METHOD,
        FRAME_OVERHEAD,
    },
    Content, ContentHeader, Method,
};
use amqp091_wire::{Decode, Encode};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

mod error;
pub use error::Error;

/// A frame on a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Channel id, 0 for the connection itself
    pub channel: u16,

    /// Payload of the frame
    pub body: FrameBody,
}

/// Payload of a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBody {
    /// A method; content-bearing methods carry empty content on the wire
    Method(Box<Method>),

    /// Content header following a content-bearing method
    Header(Box<ContentHeader>),

    /// A chunk of the content body
    Body(Bytes),

    /// Heartbeat, only valid on channel 0
    Heartbeat,
}

impl Frame {
    /// Creates a new frame
    pub fn new(channel: u16, body: FrameBody) -> Self {
        Self { channel, body }
    }

    /// A method frame
    pub fn method(channel: u16, method: impl Into<Method>) -> Self {
        Self::new(channel, FrameBody::Method(Box::new(method.into())))
    }

    /// A heartbeat frame on channel 0
    pub fn heartbeat() -> Self {
        Self::new(0, FrameBody::Heartbeat)
    }

    /// The frame type octet
    pub fn frame_type(&self) -> u8 {
        match self.body {
            FrameBody::Method(_) => FRAME_METHOD,
            FrameBody::Header(_) => FRAME_HEADER,
            FrameBody::Body(_) => FRAME_BODY,
            FrameBody::Heartbeat => FRAME_HEARTBEAT,
        }
    }

    fn payload_len(&self) -> usize {
        match &self.body {
            FrameBody::Method(m) => m.encoded_len(),
            FrameBody::Header(h) => h.encoded_len(),
            FrameBody::Body(b) => b.len(),
            FrameBody::Heartbeat => 0,
        }
    }
}

/// Split a method into the frames that carry it.
///
/// A content-bearing method is followed by a content header and as many body frames as needed
/// to keep every frame within `frame_max` (0 means no limit). An empty body sends no body
/// frame.
pub fn method_frames(channel: u16, mut method: Method, frame_max: u32) -> Vec<Frame> {
    let content = method.take_content();
    let mut frames = vec![Frame::new(channel, FrameBody::Method(Box::new(method)))];

    if let Some(Content { properties, body }) = content {
        let header = ContentHeader::basic(body.len() as u64, properties);
        frames.push(Frame::new(channel, FrameBody::Header(Box::new(header))));

        let chunk_size = match frame_max as usize {
            0 => body.len().max(1),
            max => max.saturating_sub(FRAME_OVERHEAD).max(1),
        };
        let mut rest = body;
        while !rest.is_empty() {
            let chunk = rest.split_to(chunk_size.min(rest.len()));
            frames.push(Frame::new(channel, FrameBody::Body(chunk)));
        }
    }

    frames
}

/// Frame encoder and decoder
///
/// A `max_frame_size` of 0 means no limit is enforced.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Creates a codec that enforces `max_frame_size`
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// The enforced maximum
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Update the enforced maximum, used once tuning completes
    pub fn set_max_frame_size(&mut self, max_frame_size: usize) -> &mut Self {
        self.max_frame_size = max_frame_size;
        self
    }

    fn check_size(&self, size: usize) -> Result<(), Error> {
        if self.max_frame_size != 0 && size > self.max_frame_size {
            return Err(Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }

    fn encode_frame(&self, item: &Frame, dst: &mut BytesMut) -> Result<(), Error> {
        let size = item.payload_len();
        self.check_size(size + FRAME_OVERHEAD)?;
        let size = u32::try_from(size).map_err(|_| Error::FrameTooLarge {
            size: size + FRAME_OVERHEAD,
            max: u32::MAX as usize,
        })?;

        dst.reserve(size as usize + FRAME_OVERHEAD);
        dst.put_u8(item.frame_type());
        dst.put_u16(item.channel);
        dst.put_u32(size);
        let payload_start = dst.len();
        match &item.body {
            FrameBody::Method(method) => method.encode(dst)?,
            FrameBody::Header(header) => header.encode(dst)?,
            FrameBody::Body(body) => dst.put_slice(body),
            FrameBody::Heartbeat => {}
        }

        let written = dst.len() - payload_start;
        if written != size as usize {
            return Err(Error::TrailingBytes(written.abs_diff(size as usize)));
        }
        dst.put_u8(FRAME_END);
        Ok(())
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let start = dst.len();
        let result = self.encode_frame(&item, dst);
        if result.is_err() {
            dst.truncate(start);
        }
        result
    }
}

/// Frames that are already encoded pass through unchanged
impl Encoder<Bytes> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let kind = src[0];
        let channel = u16::from_be_bytes([src[1], src[2]]);
        let size = u32::from_be_bytes([src[3], src[4], src[5], src[6]]) as usize;

        match kind {
            FRAME_METHOD | FRAME_HEADER | FRAME_BODY => {}
            FRAME_HEARTBEAT if size == 0 => {}
            FRAME_HEARTBEAT => return Err(Error::HeartbeatPayload(size)),
            b'A' if src.starts_with(b"AMQP") => {
                if src.len() < 8 {
                    return Ok(None);
                }
                let mut header = [0u8; 8];
                header.copy_from_slice(&src[..8]);
                return Err(Error::ProtocolHeaderMismatch(header));
            }
            other => return Err(Error::UnknownFrameType(other)),
        }
        self.check_size(size + FRAME_OVERHEAD)?;

        let total = FRAME_HEADER_SIZE + size + 1;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total);
        let frame_end = frame[total - 1];
        if frame_end != FRAME_END {
            return Err(Error::InvalidFrameEnd(frame_end));
        }
        frame.advance(FRAME_HEADER_SIZE);
        frame.truncate(size);
        let mut payload = frame.freeze();

        let body = match kind {
            FRAME_METHOD => {
                let method = Method::decode_payload(&mut payload)?;
                FrameBody::Method(Box::new(method))
            }
            FRAME_HEADER => {
                let header = ContentHeader::decode(&mut payload)?;
                FrameBody::Header(Box::new(header))
            }
            FRAME_BODY => FrameBody::Body(std::mem::take(&mut payload)),
            _ => FrameBody::Heartbeat,
        };

        if payload.has_remaining() {
            return Err(Error::TrailingBytes(payload.remaining()));
        }

        Ok(Some(Frame { channel, body }))
    }
}

#[cfg(test)]
mod tests {
    use amqp091_types::{
        methods::{BasicPublish, ChannelOpenOk, QueueDeclare},
        BasicProperties, Content, ContentHeader, Method,
    };
    use amqp091_wire::{FieldTable, FieldValue};
    use bytes::{Bytes, BytesMut};
    use tokio_util::codec::{Decoder, Encoder};

    use super::{method_frames, Error, Frame, FrameBody, FrameCodec};

    fn encode(frame: Frame) -> BytesMut {
        let mut dst = BytesMut::new();
        FrameCodec::default().encode(frame, &mut dst).unwrap();
        dst
    }

    fn decode_all(bytes: &[u8]) -> Result<Option<Frame>, Error> {
        let mut src = BytesMut::from(bytes);
        let mut codec = FrameCodec::default();
        match codec.decode(&mut src)? {
            Some(frame) => Ok(Some(frame)),
            None => codec.decode_eof(&mut src),
        }
    }

    #[test]
    fn heartbeat_bytes() {
        assert_eq!(
            &encode(Frame::heartbeat())[..],
            b"\x08\x00\x00\x00\x00\x00\x00\xce"
        );
        let frame = decode_all(b"\x08\x00\x00\x00\x00\x00\x00\xce")
            .unwrap()
            .unwrap();
        assert_eq!(frame, Frame::heartbeat());
    }

    #[test]
    fn method_frame_round_trip() {
        let frame = Frame::method(
            3,
            QueueDeclare {
                queue: "q".into(),
                durable: true,
                ..Default::default()
            },
        );
        let bytes = encode(frame.clone());
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..3], &[0, 3]);
        assert_eq!(*bytes.last().unwrap(), 0xce);

        let decoded = decode_all(&bytes).unwrap().unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn channel_open_ok_with_longstr_reserved_field() {
        let bytes = b"\x01\x00\x01\x00\x00\x00\x08\x00\x14\x00\x0b\x00\x00\x00\x00\xce";
        let frame = decode_all(bytes).unwrap().unwrap();
        assert_eq!(frame, Frame::method(1, ChannelOpenOk::default()));
    }

    #[test]
    fn header_frame_round_trip() {
        let header = ContentHeader::basic(
            11,
            BasicProperties::default().with_content_type("text/plain"),
        );
        let frame = Frame::new(1, FrameBody::Header(Box::new(header)));
        let decoded = decode_all(&encode(frame.clone())).unwrap().unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn header_with_non_utf8_string_header_decodes() {
        let mut headers = FieldTable::new();
        headers.insert(
            "k",
            FieldValue::LongStringBytes(Bytes::from_static(b"\xff")),
        );
        let properties = BasicProperties {
            headers: Some(headers),
            ..Default::default()
        };
        let frame = Frame::new(1, FrameBody::Header(Box::new(ContentHeader::basic(0, properties))));
        let bytes = encode(frame.clone());
        assert!(bytes
            .windows(7)
            .any(|w| w == b"\x01kS\x00\x00\x00\x01"));

        let decoded = decode_all(&bytes).unwrap().unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn body_frame_keeps_bytes() {
        let frame = Frame::new(2, FrameBody::Body(Bytes::from_static(b"hello")));
        let bytes = encode(frame.clone());
        assert_eq!(&bytes[..], b"\x03\x00\x02\x00\x00\x00\x05hello\xce");
        assert_eq!(decode_all(&bytes).unwrap().unwrap(), frame);
    }

    #[test]
    fn partial_frame_waits_for_more() {
        let bytes = encode(Frame::new(2, FrameBody::Body(Bytes::from_static(b"hello"))));
        let mut codec = FrameCodec::default();
        let mut src = BytesMut::from(&bytes[..6]);
        assert!(codec.decode(&mut src).unwrap().is_none());
        src.extend_from_slice(&bytes[6..]);
        assert!(codec.decode(&mut src).unwrap().is_some());
        assert!(src.is_empty());
    }

    #[test]
    fn malformed_inputs_are_errors() {
        let inputs: [&[u8]; 3] = [
            b"\x08000000",
            b"\x05\x00\x00\x00\x00\x00\x00\xce",
            b"\x0300\x00\x00\x00\x040000",
        ];
        for input in inputs {
            assert!(decode_all(input).is_err(), "{input:?}");
        }
    }

    #[test]
    fn bad_frame_end() {
        let result = decode_all(b"\x08\x00\x00\x00\x00\x00\x00\xcf");
        assert!(matches!(result, Err(Error::InvalidFrameEnd(0xcf))));
    }

    #[test]
    fn payload_must_be_consumed_exactly() {
        // channel.open-ok followed by an extra byte inside the declared size
        let bytes = b"\x01\x00\x01\x00\x00\x00\x09\x00\x14\x00\x0b\x00\x00\x00\x00\x00\xce";
        assert!(matches!(decode_all(bytes), Err(Error::TrailingBytes(1))));
    }

    #[test]
    fn protocol_header_from_server() {
        let result = decode_all(b"AMQP\x00\x00\x09\x01");
        assert!(matches!(result, Err(Error::ProtocolHeaderMismatch(_))));
    }

    #[test]
    fn frame_size_limit() {
        let mut codec = FrameCodec::new(16);
        let mut dst = BytesMut::new();
        let frame = Frame::new(1, FrameBody::Body(Bytes::from(vec![0u8; 9])));
        let result = codec.encode(frame, &mut dst);
        assert!(matches!(result, Err(Error::FrameTooLarge { size: 17, max: 16 })));
        assert!(dst.is_empty());

        let mut src = BytesMut::from(&b"\x03\x00\x01\x00\x00\x00\x09"[..]);
        assert!(codec.decode(&mut src).is_err());
    }

    #[test]
    fn invalid_method_leaves_buffer_untouched() {
        let mut dst = BytesMut::from(&b"prefix"[..]);
        let frame = Frame::method(
            1,
            QueueDeclare {
                queue: "q".repeat(256),
                ..Default::default()
            },
        );
        assert!(FrameCodec::default().encode(frame, &mut dst).is_err());
        assert_eq!(&dst[..], b"prefix");
    }

    #[test]
    fn content_is_split_by_frame_max() {
        let publish = BasicPublish {
            routing_key: "q".into(),
            content: Content::new(BasicProperties::default(), vec![7u8; 10]),
            ..Default::default()
        };
        let frames = method_frames(1, Method::from(publish), 12);
        assert_eq!(frames.len(), 5);
        assert!(matches!(frames[0].body, FrameBody::Method(ref m) if m.content().unwrap().body.is_empty()));
        assert!(matches!(frames[1].body, FrameBody::Header(ref h) if h.body_size == 10));
        let chunks: Vec<usize> = frames[2..]
            .iter()
            .map(|f| match &f.body {
                FrameBody::Body(b) => b.len(),
                _ => 0,
            })
            .collect();
        assert_eq!(chunks, vec![4, 4, 2]);
    }

    #[test]
    fn empty_body_has_no_body_frame() {
        let publish = BasicPublish::default();
        let frames = method_frames(1, Method::from(publish), 4096);
        assert_eq!(frames.len(), 2);
    }
}
