//! Implements low level transport framing
//!
//! The byte stream is framed by [`FrameCodec`]. On top of that the transport watches an idle
//! deadline that is pushed back whenever anything is received.

use std::{task::Poll, time::Duration};

use bytes::Bytes;
use futures_util::{Future, Sink, Stream};
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Framed;

use crate::{
    frames::{Frame, FrameCodec},
    util::IdleTimeout,
};

mod error;
pub mod protocol_header;

#[cfg(any(feature = "rustls", feature = "native-tls"))]
pub(crate) mod tls;

pub use error::Error;
use protocol_header::ProtocolHeader;

pin_project! {
    /// Frame sink and stream over an IO object
    #[derive(Debug)]
    pub struct Transport<Io> {
        #[pin]
        framed: Framed<Io, FrameCodec>,
        #[pin]
        idle_timeout: Option<IdleTimeout>,
    }
}

impl<Io> Transport<Io>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap the IO object. `max_frame_size` of 0 disables the limit and an `idle_timeout` of
    /// zero disables the deadline.
    pub fn bind(io: Io, max_frame_size: usize, idle_timeout: Option<Duration>) -> Self {
        let framed = Framed::new(io, FrameCodec::new(max_frame_size));
        let idle_timeout = match idle_timeout {
            Some(duration) if !duration.is_zero() => Some(IdleTimeout::new(duration)),
            _ => None,
        };

        Self {
            framed,
            idle_timeout,
        }
    }

    /// Write the protocol header that opens the conversation
    pub async fn send_proto_header(io: &mut Io, proto_header: ProtocolHeader) -> Result<(), Error> {
        let buf: [u8; 8] = proto_header.into();
        io.write_all(&buf).await?;
        io.flush().await?;
        Ok(())
    }

    /// Change the enforced frame size limit
    pub fn set_max_frame_size(&mut self, max_frame_size: usize) -> &mut Self {
        self.framed.codec_mut().set_max_frame_size(max_frame_size);
        self
    }

    /// Replace the idle deadline. A zero duration disables it.
    pub fn set_idle_timeout(&mut self, duration: Duration) -> &mut Self {
        self.idle_timeout = match duration.is_zero() {
            true => None,
            false => Some(IdleTimeout::new(duration)),
        };
        self
    }

    /// Consumes the transport, returning the IO object
    pub fn into_inner(self) -> Io {
        self.framed.into_inner()
    }
}

impl<Io> Sink<Frame> for Transport<Io>
where
    Io: AsyncWrite + Unpin,
{
    type Error = Error;

    fn poll_ready(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        Sink::<Frame>::poll_ready(this.framed, cx).map_err(Into::into)
    }

    fn start_send(self: std::pin::Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        let this = self.project();
        Sink::<Frame>::start_send(this.framed, item).map_err(Into::into)
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        Sink::<Frame>::poll_flush(this.framed, cx).map_err(Into::into)
    }

    fn poll_close(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        Sink::<Frame>::poll_close(this.framed, cx).map_err(Into::into)
    }
}

/// Accepts frames that were encoded by the sender
impl<Io> Sink<Bytes> for Transport<Io>
where
    Io: AsyncWrite + Unpin,
{
    type Error = Error;

    fn poll_ready(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        Sink::<Bytes>::poll_ready(this.framed, cx).map_err(Into::into)
    }

    fn start_send(self: std::pin::Pin<&mut Self>, item: Bytes) -> Result<(), Self::Error> {
        let this = self.project();
        Sink::<Bytes>::start_send(this.framed, item).map_err(Into::into)
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        Sink::<Bytes>::poll_flush(this.framed, cx).map_err(Into::into)
    }

    fn poll_close(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        Sink::<Bytes>::poll_close(this.framed, cx).map_err(Into::into)
    }
}

impl<Io> Stream for Transport<Io>
where
    Io: AsyncRead + Unpin,
{
    type Item = Result<Frame, Error>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.framed.poll_next(cx) {
            Poll::Ready(next) => {
                if let Some(delay) = this.idle_timeout.as_pin_mut() {
                    delay.get_mut().reset();
                }
                Poll::Ready(next.map(|item| item.map_err(Into::into)))
            }
            Poll::Pending => {
                if let Some(delay) = this.idle_timeout.as_pin_mut() {
                    if delay.poll(cx).is_ready() {
                        return Poll::Ready(Some(Err(Error::IdleTimeout)));
                    }
                }
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use amqp091_types::methods::ChannelOpen;
    use bytes::Bytes;
    use futures_util::{SinkExt, StreamExt};
    use tokio_test::io::Builder;

    use crate::frames::{Frame, FrameBody};

    use super::{protocol_header::ProtocolHeader, Error, Transport};

    #[tokio::test]
    async fn send_protocol_header() {
        let mut mock = Builder::new().write(b"AMQP\x00\x00\x09\x01").build();
        Transport::send_proto_header(&mut mock, ProtocolHeader::amqp091())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn frame_sink() {
        let mock = Builder::new()
            .write(b"\x01\x00\x01\x00\x00\x00\x05\x00\x14\x00\x0a\x00\xce")
            .build();
        let mut transport = Transport::bind(mock, 4096, None);
        transport
            .send(Frame::method(1, ChannelOpen::default()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn encoded_bytes_pass_through() {
        let mock = Builder::new()
            .write(b"\x08\x00\x00\x00\x00\x00\x00\xce")
            .build();
        let mut transport = Transport::bind(mock, 4096, None);
        transport
            .send(Bytes::from_static(b"\x08\x00\x00\x00\x00\x00\x00\xce"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn frame_stream() {
        let mock = Builder::new()
            .read(b"\x08\x00\x00\x00\x00\x00\x00\xce\x03\x00\x02\x00\x00\x00\x02hi\xce")
            .build();
        let mut transport = Transport::bind(mock, 4096, None);
        let first = transport.next().await.unwrap().unwrap();
        assert_eq!(first, Frame::heartbeat());
        let second = transport.next().await.unwrap().unwrap();
        assert_eq!(
            second,
            Frame::new(2, FrameBody::Body(Bytes::from_static(b"hi")))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_fires_without_traffic() {
        let mock = Builder::new().wait(Duration::from_secs(10)).build();
        let mut transport = Transport::bind(mock, 4096, Some(Duration::from_secs(1)));
        let result = transport.next().await.unwrap();
        assert!(matches!(result, Err(Error::IdleTimeout)));
    }
}
