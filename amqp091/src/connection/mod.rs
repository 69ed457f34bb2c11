//! Connections to an AMQP 0-9-1 broker
//!
//! A [`Connection`] owns a reader task that performs all IO. Channels queue their encoded
//! frames to that task, which writes them in the order they were queued and dispatches every
//! inbound frame to the channel it is addressed to. Frames on channel 0 control the connection
//! itself.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use amqp091_types::{
    methods::{ConnectionClose, ConnectionUpdateSecret},
    wire::FieldTable,
    Method, MethodKind, ReplyCode,
};
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::codec::Encoder;

use crate::{
    channel::{rpc::Rpc, shared::ChannelShared, table::ChannelTable, Channel},
    error::Error,
    frames::{method_frames, FrameCodec},
    observer::Observer,
    util::Shutdown,
};

mod builder;
mod engine;
mod error;
mod heartbeat;
mod properties;

pub use builder::Builder;
pub use error::OpenError;
pub use properties::ConnectionProperties;

/// Reply text of a close requested by the client
pub(crate) const CLOSE_REPLY_TEXT: &str = "Goodbye";

/// Values agreed on during the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning {
    /// Highest channel id, 0 for no limit
    pub channel_max: u16,

    /// Largest frame in bytes, 0 for no limit
    pub frame_max: u32,

    /// Heartbeat interval, zero when disabled
    pub heartbeat: Duration,
}

/// `connection.blocked` and `connection.unblocked` notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocking {
    /// `true` while the server refuses to accept publishes
    pub active: bool,

    /// Why the server blocked the connection, empty when unblocking
    pub reason: String,
}

/// Pick the tuning value. Zero means "no preference" on either side.
pub(crate) fn negotiate<T>(client: T, server: T) -> T
where
    T: Ord + Default + Copy,
{
    let zero = T::default();
    if client == zero || server == zero {
        client.max(server)
    } else {
        client.min(server)
    }
}

/// State shared by the connection handle, its channels and the reader task
#[derive(Debug)]
pub(crate) struct ConnectionShared {
    outgoing: mpsc::Sender<Bytes>,
    pub(crate) channels: Mutex<ChannelTable<ChannelShared>>,
    pub(crate) shutdown: Shutdown,
    closing: AtomicBool,

    /// Synchronous replies on channel 0
    pub(crate) rpc: Rpc,
    tuning: Tuning,
    server_properties: FieldTable,
    pub(crate) observer: Arc<dyn Observer>,

    close_listeners: Mutex<Vec<mpsc::UnboundedSender<Error>>>,
    blocked_listeners: Mutex<Vec<mpsc::UnboundedSender<Blocking>>>,
}

impl ConnectionShared {
    pub(crate) fn new(
        outgoing: mpsc::Sender<Bytes>,
        tuning: Tuning,
        server_properties: FieldTable,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            outgoing,
            channels: Mutex::new(ChannelTable::new(tuning.channel_max)),
            shutdown: Shutdown::new(),
            closing: AtomicBool::new(false),
            rpc: Rpc::new(),
            tuning,
            server_properties,
            observer,
            close_listeners: Mutex::new(Vec::new()),
            blocked_listeners: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Encode a method with its content frames. Nothing is queued if any frame fails to encode.
    pub(crate) fn encode(&self, channel: u16, method: Method) -> Result<Bytes, Error> {
        let frame_max = self.tuning.frame_max;
        let mut codec = FrameCodec::new(frame_max as usize);
        let mut dst = BytesMut::new();
        for frame in method_frames(channel, method, frame_max) {
            codec.encode(frame, &mut dst)?;
        }
        Ok(dst.freeze())
    }

    /// Queue encoded frames for the reader task to write
    pub(crate) async fn send(&self, frames: Bytes) -> Result<(), Error> {
        tokio::select! {
            biased;
            _ = self.shutdown.triggered() => Err(self.shutdown.reason_or_closed()),
            sent = self.outgoing.send(frames) => {
                sent.map_err(|_| self.shutdown.reason_or_closed())
            }
        }
    }

    /// Wait for room in the outgoing queue
    pub(crate) async fn reserve(&self) -> Result<mpsc::Permit<'_, Bytes>, Error> {
        tokio::select! {
            biased;
            _ = self.shutdown.triggered() => Err(self.shutdown.reason_or_closed()),
            permit = self.outgoing.reserve() => {
                permit.map_err(|_| self.shutdown.reason_or_closed())
            }
        }
    }

    /// Fire the shutdown signal and close every channel with `reason`
    ///
    /// Only the first call has an effect.
    pub(crate) fn shutdown(&self, reason: Error) {
        if !self.shutdown.trigger(reason.clone()) {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(reason = %reason, "Connection shut down");
        #[cfg(feature = "log")]
        log::debug!("Connection shut down: {}", reason);

        self.rpc.close();
        let channels = self.channels.lock().drain();
        for channel in channels {
            channel.shutdown_channel(reason.clone());
        }

        let listeners = std::mem::take(&mut *self.close_listeners.lock());
        if !matches!(reason, Error::Closed) {
            for tx in listeners {
                let _ = tx.send(reason.clone());
            }
        }
        self.blocked_listeners.lock().clear();
    }

    pub(crate) fn on_blocking(&self, blocking: Blocking) {
        #[cfg(feature = "tracing")]
        tracing::info!(active = blocking.active, reason = %blocking.reason, "Connection blocking changed");
        #[cfg(feature = "log")]
        log::info!(
            "Connection blocking changed, active: {}, reason: {}",
            blocking.active,
            blocking.reason
        );

        self.blocked_listeners
            .lock()
            .retain(|tx| tx.send(blocking.clone()).is_ok());
    }
}

/// Closes the connection once the last [`Connection`] handle is dropped
#[derive(Debug)]
struct CloseOnDrop {
    shared: Arc<ConnectionShared>,
}

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        if self.shared.is_closed() || self.shared.closing.swap(true, Ordering::AcqRel) {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Last connection handle dropped, closing");
        #[cfg(feature = "log")]
        log::debug!("Last connection handle dropped, closing");

        let queued = self
            .shared
            .encode(0, close_method().into())
            .ok()
            .and_then(|frames| self.shared.outgoing.try_send(frames).ok());
        if queued.is_none() {
            // no room to ask politely, stop the reader task right away
            self.shared.shutdown(Error::Closed);
        }
    }
}

fn close_method() -> ConnectionClose {
    ConnectionClose {
        reply_code: ReplyCode::ReplySuccess.into(),
        reply_text: CLOSE_REPLY_TEXT.to_string(),
        class_id: 0,
        method_id: 0,
    }
}

/// A connection to a broker
///
/// Clones share the same connection. Dropping the last clone closes the connection along with
/// every channel opened on it.
#[derive(Debug, Clone)]
pub struct Connection {
    shared: Arc<ConnectionShared>,
    engine: Arc<tokio::sync::Mutex<Option<JoinHandle<()>>>>,
    _close_on_drop: Arc<CloseOnDrop>,
}

impl Connection {
    /// Creates a builder with default settings
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Connect with default settings
    pub async fn open(uri: &str) -> Result<Self, OpenError> {
        Builder::new().open(uri).await
    }

    pub(crate) fn new(shared: Arc<ConnectionShared>, engine: JoinHandle<()>) -> Self {
        Self {
            _close_on_drop: Arc::new(CloseOnDrop {
                shared: shared.clone(),
            }),
            shared,
            engine: Arc::new(tokio::sync::Mutex::new(Some(engine))),
        }
    }

    /// Open a new channel
    ///
    /// Fails with [`Error::Closed`] once the connection is closed and with
    /// [`Error::ChannelMaxReached`] when every channel id is in use.
    pub async fn open_channel(&self) -> Result<Channel, Error> {
        if self.shared.closing.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        ChannelShared::open(&self.shared).await.map(Channel::new)
    }

    /// Close the connection and every channel on it
    ///
    /// The first caller runs the `connection.close` handshake, other callers get
    /// [`Error::Closed`]. An IO error racing the handshake may be returned instead.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn close(&self) -> Result<(), Error> {
        if self.shared.is_closed() || self.shared.closing.swap(true, Ordering::AcqRel) {
            return Err(Error::Closed);
        }

        let frames = self.shared.encode(0, close_method().into())?;
        let result = self
            .shared
            .rpc
            .call(
                &self.shared.shutdown,
                &[MethodKind::ConnectionCloseOk],
                self.shared.send(frames),
            )
            .await;

        if let Some(engine) = self.engine.lock().await.take() {
            let _ = engine.await;
        }
        result.map(|_| ())
    }

    /// Whether the connection is closed
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Number of open channels
    pub fn channel_count(&self) -> usize {
        self.shared.channels.lock().len()
    }

    /// Properties the server sent in `connection.start`
    pub fn server_properties(&self) -> &FieldTable {
        &self.shared.server_properties
    }

    /// The negotiated tuning
    pub fn tuning(&self) -> Tuning {
        self.shared.tuning
    }

    /// The error that closed the connection. Nothing is sent for a close requested by the
    /// client.
    pub fn notify_close(&self) -> mpsc::UnboundedReceiver<Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut listeners = self.shared.close_listeners.lock();
        if !self.shared.is_closed() {
            listeners.push(tx);
        }
        rx
    }

    /// Blocked and unblocked notifications
    pub fn notify_blocked(&self) -> mpsc::UnboundedReceiver<Blocking> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut listeners = self.shared.blocked_listeners.lock();
        if !self.shared.is_closed() {
            listeners.push(tx);
        }
        rx
    }

    /// Replace the credentials of the connection, e.g. a refreshed OAuth 2 token
    pub async fn update_secret(
        &self,
        new_secret: impl Into<Bytes>,
        reason: impl Into<String>,
    ) -> Result<(), Error> {
        let update = ConnectionUpdateSecret {
            new_secret: new_secret.into(),
            reason: reason.into(),
        };
        let frames = self.shared.encode(0, update.into())?;
        self.shared
            .rpc
            .call(
                &self.shared.shutdown,
                &[MethodKind::ConnectionUpdateSecretOk],
                self.shared.send(frames),
            )
            .await
            .map(|_| ())
    }
}
