//! The engine owns the transport. It writes the frames queued by channels, reads every
//! inbound frame and hands it to the channel it is addressed to.

use std::{sync::Arc, time::Duration};

use amqp091_types::{
    constants::FRAME_MIN_SIZE,
    methods::{
        ChannelCloseOk, ConnectionClose, ConnectionCloseOk, ConnectionOpen, ConnectionSecureOk,
        ConnectionStartOk, ConnectionTune, ConnectionTuneOk,
    },
    wire::FieldTable,
    Method, ReplyCode,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
    task::JoinHandle,
};

use crate::{
    auth::pick_sasl_mechanism,
    error::{Error, Exception},
    frames::{Frame, FrameBody},
    transport::{protocol_header::ProtocolHeader, Transport},
    util::Running,
};

use super::{
    heartbeat::HeartBeat, negotiate, Blocking, Builder, ConnectionShared, OpenError, Tuning,
};

/// Queued frames written before the transport is flushed
const MAX_BATCH: usize = 64;

/// Outcome of a successful handshake
#[derive(Debug)]
pub(crate) struct Negotiated {
    pub tuning: Tuning,
    pub server_properties: FieldTable,
}

async fn recv_method<Io>(transport: &mut Transport<Io>) -> Result<Method, OpenError>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let frame = match transport.next().await {
            Some(frame) => frame?,
            None => return Err(OpenError::Closed),
        };
        match frame {
            Frame {
                channel: 0,
                body: FrameBody::Method(method),
            } => return Ok(*method),
            Frame {
                body: FrameBody::Heartbeat,
                ..
            } => continue,
            _ => return Err(OpenError::UnexpectedFrame("a method on channel 0")),
        }
    }
}

/// The server refused the connection. Acknowledge and report its exception.
async fn on_close_during_handshake<Io>(
    transport: &mut Transport<Io>,
    close: ConnectionClose,
) -> OpenError
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    let _ = transport.send(Frame::method(0, ConnectionCloseOk {})).await;
    OpenError::Exception(Exception::from_server(close.reply_code, close.reply_text))
}

fn tune(builder: &Builder, server: &ConnectionTune) -> Tuning {
    let channel_max = negotiate(builder.channel_max, server.channel_max);
    let frame_max = match negotiate(builder.frame_max, server.frame_max) {
        0 => 0,
        max => max.max(FRAME_MIN_SIZE),
    };
    let heartbeat = negotiate(
        builder.heartbeat.as_secs().min(u16::MAX as u64) as u16,
        server.heartbeat,
    );
    Tuning {
        channel_max,
        frame_max,
        heartbeat: Duration::from_secs(heartbeat as u64),
    }
}

/// Run the opening handshake: protocol header, start, SASL, tune and open
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
pub(crate) async fn handshake<Io>(
    mut io: Io,
    builder: &Builder,
) -> Result<(Transport<Io>, Negotiated), OpenError>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    Transport::send_proto_header(&mut io, ProtocolHeader::amqp091()).await?;
    // frames are limited to the protocol minimum until tuned
    let mut transport = Transport::bind(io, FRAME_MIN_SIZE as usize, None);

    let start = match recv_method(&mut transport).await? {
        Method::ConnectionStart(start) => start,
        _ => return Err(OpenError::UnexpectedFrame("connection.start")),
    };
    if (start.version_major, start.version_minor) != (0, 9) {
        return Err(OpenError::ProtocolVersion {
            major: start.version_major,
            minor: start.version_minor,
        });
    }

    let auth = pick_sasl_mechanism(&builder.sasl_mechanisms(), &start.mechanisms)
        .ok_or_else(|| OpenError::SaslMechanismNotSupported(start.mechanisms.clone()))?;
    #[cfg(feature = "tracing")]
    tracing::debug!(mechanism = auth.mechanism(), "Authenticating");
    #[cfg(feature = "log")]
    log::debug!("Authenticating with {}", auth.mechanism());

    let start_ok = ConnectionStartOk {
        client_properties: builder.properties.to_table(),
        mechanism: auth.mechanism().to_string(),
        response: auth.response(),
        locale: builder.locale.clone(),
    };
    transport.send(Frame::method(0, start_ok)).await?;

    let server_tune = loop {
        match recv_method(&mut transport).await? {
            Method::ConnectionSecure(_) => {
                let secure_ok = ConnectionSecureOk {
                    response: auth.response(),
                };
                transport.send(Frame::method(0, secure_ok)).await?;
            }
            Method::ConnectionTune(tune) => break tune,
            Method::ConnectionClose(close) => {
                return Err(on_close_during_handshake(&mut transport, close).await)
            }
            _ => return Err(OpenError::UnexpectedFrame("connection.tune")),
        }
    };

    let tuning = tune(builder, &server_tune);
    let tune_ok = ConnectionTuneOk {
        channel_max: tuning.channel_max,
        frame_max: tuning.frame_max,
        heartbeat: tuning.heartbeat.as_secs() as u16,
    };
    transport.send(Frame::method(0, tune_ok)).await?;
    transport.set_max_frame_size(tuning.frame_max as usize);

    let open = ConnectionOpen {
        virtual_host: builder.vhost.clone(),
        ..Default::default()
    };
    transport.send(Frame::method(0, open)).await?;
    match recv_method(&mut transport).await? {
        Method::ConnectionOpenOk(_) => {}
        Method::ConnectionClose(close) => {
            return Err(on_close_during_handshake(&mut transport, close).await)
        }
        _ => return Err(OpenError::UnexpectedFrame("connection.open-ok")),
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(?tuning, vhost = %builder.vhost, "Connection opened");
    #[cfg(feature = "log")]
    log::debug!("Connection opened to vhost {}, {:?}", builder.vhost, tuning);

    // missing heartbeats only count once the connection is open
    transport.set_idle_timeout(tuning.heartbeat);

    let negotiated = Negotiated {
        tuning,
        server_properties: start.server_properties,
    };
    Ok((transport, negotiated))
}

pub(crate) struct ConnectionEngine<Io> {
    transport: Transport<Io>,
    shared: Arc<ConnectionShared>,
    outgoing: mpsc::Receiver<Bytes>,
    heartbeat: HeartBeat,
}

impl<Io> std::fmt::Debug for ConnectionEngine<Io> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionEngine")
            .field("heartbeat", &self.heartbeat)
            .finish_non_exhaustive()
    }
}

impl<Io> ConnectionEngine<Io>
where
    Io: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    pub(crate) fn new(
        transport: Transport<Io>,
        shared: Arc<ConnectionShared>,
        outgoing: mpsc::Receiver<Bytes>,
    ) -> Self {
        let heartbeat = HeartBeat::from_negotiated(shared.tuning.heartbeat);
        Self {
            transport,
            shared,
            outgoing,
            heartbeat,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.event_loop())
    }
}

impl<Io> ConnectionEngine<Io>
where
    Io: AsyncRead + AsyncWrite + Send + Unpin,
{
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn on_incoming(&mut self, frame: Frame) -> Result<Running, Error> {
        let Frame { channel, body } = frame;
        if channel == 0 {
            return self.on_connection_frame(body).await;
        }

        let target = self.shared.channels.lock().get(channel).cloned();
        match target {
            Some(target) => {
                if let Some(reply) = target.on_frame(body) {
                    self.transport.send(reply).await?;
                }
            }
            None => match body {
                // the handle may already be gone; the server still waits for the reply
                FrameBody::Method(method) if matches!(*method, Method::ChannelClose(_)) => {
                    self.transport
                        .send(Frame::method(channel, ChannelCloseOk {}))
                        .await?;
                }
                _ => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(channel, "Dropping frame for unknown channel");
                    #[cfg(feature = "log")]
                    log::debug!("Dropping frame for unknown channel {}", channel);
                }
            },
        }
        Ok(Running::Continue)
    }

    async fn on_connection_frame(&mut self, body: FrameBody) -> Result<Running, Error> {
        let method = match body {
            FrameBody::Heartbeat => return Ok(Running::Continue),
            FrameBody::Method(method) => *method,
            FrameBody::Header(_) | FrameBody::Body(_) => {
                return Err(Exception::local(
                    ReplyCode::UnexpectedFrame,
                    "content frame on channel 0",
                )
                .into())
            }
        };

        match method {
            Method::ConnectionClose(close) => {
                let exception = Exception::from_server(close.reply_code, close.reply_text);
                #[cfg(feature = "tracing")]
                tracing::info!(%exception, "Connection closed by server");
                #[cfg(feature = "log")]
                log::info!("Connection closed by server: {}", exception);

                self.transport
                    .send(Frame::method(0, ConnectionCloseOk {}))
                    .await?;
                self.shared.shutdown(exception.into());
                Ok(Running::Stop)
            }
            Method::ConnectionCloseOk(close_ok) => {
                self.shared.rpc.deliver(close_ok.into());
                self.shared.shutdown(Error::Closed);
                Ok(Running::Stop)
            }
            Method::ConnectionBlocked(blocked) => {
                self.shared.on_blocking(Blocking {
                    active: true,
                    reason: blocked.reason,
                });
                Ok(Running::Continue)
            }
            Method::ConnectionUnblocked(_) => {
                self.shared.on_blocking(Blocking {
                    active: false,
                    reason: String::new(),
                });
                Ok(Running::Continue)
            }
            Method::ConnectionUpdateSecretOk(ok) => {
                self.shared.rpc.deliver(ok.into());
                Ok(Running::Continue)
            }
            other => Err(Exception::local(
                ReplyCode::CommandInvalid,
                format!("unexpected {} on channel 0", other.name()),
            )
            .into()),
        }
    }

    /// Write queued frames, batching whatever else is already waiting
    async fn on_outgoing(&mut self, frames: Bytes) -> Result<Running, Error> {
        self.transport.feed(frames).await?;
        for _ in 0..MAX_BATCH {
            match self.outgoing.try_recv() {
                Ok(frames) => self.transport.feed(frames).await?,
                Err(_) => break,
            }
        }
        SinkExt::<Bytes>::flush(&mut self.transport).await?;
        Ok(Running::Continue)
    }

    async fn on_heartbeat(&mut self) -> Result<Running, Error> {
        self.transport.send(Frame::heartbeat()).await?;
        Ok(Running::Continue)
    }

    /// Tell the server why the connection is being dropped if the transport still works
    async fn on_error(&mut self, error: &Error) {
        #[cfg(feature = "tracing")]
        tracing::error!(?error, "Connection failed");
        #[cfg(feature = "log")]
        log::error!("Connection failed: {:?}", error);

        let reply_code = match error {
            Error::Io(_) | Error::MissedHeartbeats => return,
            Error::Exception(exception) if exception.server => return,
            error => error.reply_code(),
        };
        if let Some(reply_code) = reply_code {
            let close = ConnectionClose {
                reply_code,
                reply_text: error.to_string(),
                class_id: 0,
                method_id: 0,
            };
            let _ = self.transport.send(Frame::method(0, close)).await;
        }
    }

    async fn event_loop(mut self) {
        let reason = loop {
            let result = tokio::select! {
                _ = self.heartbeat.next() => self.on_heartbeat().await,
                incoming = self.transport.next() => match incoming {
                    Some(Ok(frame)) => self.on_incoming(frame).await,
                    Some(Err(err)) => Err(err.into()),
                    None => Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into()),
                },
                outgoing = self.outgoing.recv() => match outgoing {
                    Some(frames) => self.on_outgoing(frames).await,
                    None => Ok(Running::Stop),
                },
                _ = self.shared.shutdown.triggered() => Ok(Running::Stop),
            };

            match result {
                Ok(Running::Continue) => {}
                Ok(Running::Stop) => break Error::Closed,
                Err(err) => {
                    self.on_error(&err).await;
                    break err;
                }
            }
        };

        self.shared.shutdown(reason);
        let _ = SinkExt::<Frame>::close(&mut self.transport).await;

        #[cfg(feature = "tracing")]
        tracing::debug!("Connection engine stopped");
        #[cfg(feature = "log")]
        log::debug!("Connection engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use amqp091_types::methods::ConnectionTune;

    use crate::connection::Builder;

    use super::tune;

    #[test]
    fn tuning_takes_server_values_when_client_has_none() {
        let builder = Builder::new().frame_max(0).channel_max(0);
        let server = ConnectionTune {
            channel_max: 2047,
            frame_max: 131_072,
            heartbeat: 60,
        };
        let tuning = tune(&builder, &server);
        assert_eq!(tuning.channel_max, 2047);
        assert_eq!(tuning.frame_max, 131_072);
        assert_eq!(tuning.heartbeat, Duration::from_secs(10));
    }

    #[test]
    fn frame_max_is_never_below_minimum() {
        let builder = Builder::new().frame_max(512);
        let server = ConnectionTune {
            channel_max: 0,
            frame_max: 131_072,
            heartbeat: 0,
        };
        let tuning = tune(&builder, &server);
        assert_eq!(tuning.frame_max, 4096);
        assert_eq!(tuning.channel_max, 2047);
        assert_eq!(tuning.heartbeat, Duration::from_secs(10));
    }
}
