#![allow(dead_code)]

use std::time::Duration;

use amqp091::{
    frames::{method_frames, Frame, FrameBody, FrameCodec},
    types::methods::{
        ChannelCloseOk, ChannelOpenOk, ConnectionCloseOk, ConnectionOpenOk, ConnectionStart,
        ConnectionTune,
    },
    Builder, Channel, Connection, FieldTable, Method,
};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio_util::codec::Framed;

/// Scripted peer playing the broker side of a connection
pub struct Broker {
    framed: Framed<DuplexStream, FrameCodec>,
}

impl Broker {
    /// Frame a stream whose protocol header was already read
    pub fn from_stream(io: DuplexStream) -> Self {
        Self {
            framed: Framed::new(io, FrameCodec::new(0)),
        }
    }

    /// Next frame that is not a heartbeat
    pub async fn recv(&mut self) -> Frame {
        loop {
            let frame = self
                .framed
                .next()
                .await
                .expect("client closed the stream")
                .expect("client sent an invalid frame");
            if frame.body != FrameBody::Heartbeat {
                return frame;
            }
        }
    }

    /// Next frame, heartbeats included
    pub async fn recv_any(&mut self) -> Option<Frame> {
        self.framed.next().await.map(|frame| frame.unwrap())
    }

    pub async fn recv_method(&mut self, channel: u16) -> Method {
        let frame = self.recv().await;
        assert_eq!(frame.channel, channel);
        match frame.body {
            FrameBody::Method(method) => *method,
            other => panic!("expecting a method, got {other:?}"),
        }
    }

    /// A content-bearing method with its header and body frames joined back together
    pub async fn recv_content(&mut self, channel: u16) -> (Method, Vec<u8>) {
        let method = self.recv_method(channel).await;
        let header = match self.recv().await.body {
            FrameBody::Header(header) => header,
            other => panic!("expecting a content header, got {other:?}"),
        };
        let mut body = Vec::new();
        while (body.len() as u64) < header.body_size {
            match self.recv().await.body {
                FrameBody::Body(chunk) => body.extend_from_slice(&chunk),
                other => panic!("expecting a content body, got {other:?}"),
            }
        }
        (method, body)
    }

    pub async fn send(&mut self, channel: u16, method: impl Into<Method>) {
        for frame in method_frames(channel, method.into(), 0) {
            SinkExt::<Frame>::feed(&mut self.framed, frame).await.unwrap();
        }
        SinkExt::<Frame>::flush(&mut self.framed).await.unwrap();
    }

    pub async fn send_frame(&mut self, frame: Frame) {
        self.framed.send(frame).await.unwrap();
    }

    /// Answer a `channel.open` with `channel.open-ok`
    pub async fn accept_channel(&mut self, channel: u16) {
        match self.recv_method(channel).await {
            Method::ChannelOpen(_) => {}
            other => panic!("expecting channel.open, got {other:?}"),
        }
        self.send(channel, ChannelOpenOk::default()).await;
    }

    /// Answer a `channel.close` with `channel.close-ok`
    pub async fn accept_channel_close(&mut self, channel: u16) {
        match self.recv_method(channel).await {
            Method::ChannelClose(close) => assert_eq!(close.reply_code, 200),
            other => panic!("expecting channel.close, got {other:?}"),
        }
        self.send(channel, ChannelCloseOk {}).await;
    }

    /// Answer a `connection.close` with `connection.close-ok`
    pub async fn accept_close(&mut self) {
        match self.recv_method(0).await {
            Method::ConnectionClose(close) => assert_eq!(close.reply_code, 200),
            other => panic!("expecting connection.close, got {other:?}"),
        }
        self.send(0, ConnectionCloseOk {}).await;
    }

    /// Whether the client dropped its end of the stream
    pub async fn is_disconnected(&mut self) -> bool {
        loop {
            match self.framed.next().await {
                None | Some(Err(_)) => return true,
                Some(Ok(_)) => continue,
            }
        }
    }
}

pub fn server_properties() -> FieldTable {
    let mut capabilities = FieldTable::new();
    capabilities.insert("publisher_confirms", true);
    capabilities.insert("basic.nack", true);

    let mut properties = FieldTable::new();
    properties.insert("product", "scripted");
    properties.insert("capabilities", capabilities);
    properties
}

/// Run the server side of the opening handshake
pub async fn serve_handshake(mut io: DuplexStream, tune: ConnectionTune) -> Broker {
    let mut header = [0u8; 8];
    io.read_exact(&mut header).await.unwrap();
    assert_eq!(&header, b"AMQP\x00\x00\x09\x01");

    let mut broker = Broker::from_stream(io);
    let start = ConnectionStart {
        version_major: 0,
        version_minor: 9,
        server_properties: server_properties(),
        mechanisms: "PLAIN AMQPLAIN".into(),
        locales: "en_US".into(),
    };
    broker.send(0, start).await;

    match broker.recv_method(0).await {
        Method::ConnectionStartOk(start_ok) => {
            assert_eq!(start_ok.mechanism, "PLAIN");
            assert_eq!(&start_ok.response[..], b"\x00guest\x00guest");
        }
        other => panic!("expecting connection.start-ok, got {other:?}"),
    }

    broker.send(0, tune).await;
    match broker.recv_method(0).await {
        Method::ConnectionTuneOk(_) => {}
        other => panic!("expecting connection.tune-ok, got {other:?}"),
    }
    match broker.recv_method(0).await {
        Method::ConnectionOpen(open) => assert_eq!(open.virtual_host, "/"),
        other => panic!("expecting connection.open, got {other:?}"),
    }
    broker.send(0, ConnectionOpenOk::default()).await;
    broker
}

pub fn default_tune() -> ConnectionTune {
    ConnectionTune {
        channel_max: 2047,
        frame_max: 131_072,
        heartbeat: 0,
    }
}

/// A client connection and its scripted broker. Heartbeats are disabled.
pub async fn connect() -> (Connection, Broker) {
    let builder = Builder::new().heartbeat(Duration::ZERO);
    connect_with(builder, default_tune()).await
}

pub async fn connect_with(builder: Builder, tune: ConnectionTune) -> (Connection, Broker) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (connection, broker) = tokio::join!(
        builder.open_with_stream(client),
        serve_handshake(server, tune)
    );
    (connection.unwrap(), broker)
}

/// Open a channel, returning it with the id the broker saw
pub async fn open_channel(connection: &Connection, broker: &mut Broker, id: u16) -> Channel {
    let (channel, _) = tokio::join!(connection.open_channel(), broker.accept_channel(id));
    let channel = channel.unwrap();
    assert_eq!(channel.id(), id);
    channel
}
