//! Channel state shared between the handles given to users and the connection's reader task

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use amqp091_types::{
    methods::{
        BasicAck, BasicCancelOk, BasicNack, BasicPublish, BasicReject, ChannelClose,
        ChannelCloseOk, ChannelFlowOk, ChannelOpen, ConfirmSelect,
    },
    Content, ContentHeader, Method, MethodKind, ReplyCode,
};
use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::{
    confirms::{Confirmation, Confirms, DeferredConfirmation},
    connection::ConnectionShared,
    delivery::{Acknowledger, Delivery, Return},
    error::{Error, Exception},
    frames::{Frame, FrameBody},
    observer::Settlement,
    util::Shutdown,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Opening,
    Open,
    Closing,
    Closed,
}

/// A content-bearing method waiting for its header and body frames
#[derive(Debug)]
struct Assembly {
    method: Method,
    header: Option<ContentHeader>,
    body: BytesMut,
}

#[derive(Debug, Default)]
struct Listeners {
    close: Vec<mpsc::UnboundedSender<Error>>,
    flow: Vec<mpsc::UnboundedSender<bool>>,
    returns: Vec<mpsc::UnboundedSender<Return>>,
    cancel: Vec<mpsc::UnboundedSender<String>>,
}

fn broadcast<T: Clone>(listeners: &mut Vec<mpsc::UnboundedSender<T>>, value: T) {
    listeners.retain(|tx| tx.send(value.clone()).is_ok());
}

pub(crate) struct ChannelShared {
    id: u16,
    conn: Arc<ConnectionShared>,
    state: Mutex<State>,
    shutdown: Shutdown,
    rpc: super::rpc::Rpc,

    /// Held while a publish takes its delivery tag and is queued
    publish_gate: tokio::sync::Mutex<()>,
    confirms: Confirms,
    confirming: AtomicBool,
    flow_active: AtomicBool,

    assembly: Mutex<Option<Assembly>>,
    consumers: Mutex<HashMap<String, mpsc::UnboundedSender<Delivery>>>,
    listeners: Mutex<Listeners>,
}

impl std::fmt::Debug for ChannelShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelShared")
            .field("id", &self.id)
            .field("state", &*self.state.lock())
            .field("confirming", &self.is_confirming())
            .field("flow_active", &self.is_flow_active())
            .finish_non_exhaustive()
    }
}

impl ChannelShared {
    fn new(id: u16, conn: Arc<ConnectionShared>) -> Self {
        let shutdown = conn.shutdown.child();
        Self {
            id,
            conn,
            state: Mutex::new(State::Opening),
            shutdown,
            rpc: super::rpc::Rpc::new(),
            publish_gate: tokio::sync::Mutex::new(()),
            confirms: Confirms::new(),
            confirming: AtomicBool::new(false),
            flow_active: AtomicBool::new(true),
            assembly: Mutex::new(None),
            consumers: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Listeners::default()),
        }
    }

    /// Allocate an id and run the `channel.open` handshake. The id is released if the
    /// handshake fails.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub(crate) async fn open(conn: &Arc<ConnectionShared>) -> Result<Arc<Self>, Error> {
        if conn.is_closed() {
            return Err(Error::Closed);
        }
        let channel = conn
            .channels
            .lock()
            .allocate(|id| Self::new(id, conn.clone()))?;

        match channel
            .call(ChannelOpen::default().into(), &[MethodKind::ChannelOpenOk])
            .await
        {
            Ok(_) => {
                let mut state = channel.state.lock();
                if *state == State::Opening {
                    *state = State::Open;
                }
                drop(state);

                #[cfg(feature = "tracing")]
                tracing::debug!(channel = channel.id, "Channel opened");
                #[cfg(feature = "log")]
                log::debug!("Channel {} opened", channel.id);
                Ok(channel)
            }
            Err(err) => {
                channel.shutdown_channel(err.clone());
                Err(err)
            }
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_triggered()
    }

    pub fn confirms(&self) -> &Confirms {
        &self.confirms
    }

    pub fn is_confirming(&self) -> bool {
        self.confirming.load(Ordering::Acquire)
    }

    pub fn is_flow_active(&self) -> bool {
        self.flow_active.load(Ordering::Acquire)
    }

    pub fn observer(&self) -> &dyn crate::observer::Observer {
        self.conn.observer.as_ref()
    }

    /// Send a synchronous method and wait for one of the `expect`ed replies
    pub async fn call(&self, method: Method, expect: &[MethodKind]) -> Result<Option<Method>, Error> {
        let frames = self.conn.encode(self.id, method)?;
        self.rpc
            .call(&self.shutdown, expect, self.conn.send(frames))
            .await
    }

    /// Send a method that has no reply without waiting for other callers
    pub async fn send(&self, method: Method) -> Result<(), Error> {
        if self.shutdown.is_triggered() {
            return Err(self.shutdown.reason_or_closed());
        }
        let frames = self.conn.encode(self.id, method)?;
        self.conn.send(frames).await
    }

    /// Queue a publish, numbering it first when the channel is in confirm mode
    pub async fn publish(
        &self,
        mut publish: BasicPublish,
        track: bool,
    ) -> Result<Option<DeferredConfirmation>, Error> {
        if self.shutdown.is_triggered() {
            return Err(self.shutdown.reason_or_closed());
        }
        self.conn.observer.on_publish(
            self.id,
            &publish.exchange,
            &publish.routing_key,
            &mut publish.content.properties,
        );
        let frames = self.conn.encode(self.id, publish.into())?;

        let _gate = self.publish_gate.lock().await;
        // the tag is only taken once the frames are sure to be queued
        let permit = self.conn.reserve().await?;
        let deferred = match (self.is_confirming(), track) {
            (true, true) => Some(self.confirms.publish_deferred()),
            (true, false) => {
                self.confirms.publish();
                None
            }
            (false, _) => None,
        };
        permit.send(frames);
        Ok(deferred)
    }

    pub async fn confirm_select(&self, no_wait: bool) -> Result<(), Error> {
        let expect: &[MethodKind] = if no_wait {
            &[]
        } else {
            &[MethodKind::ConfirmSelectOk]
        };
        self.call(ConfirmSelect { nowait: no_wait }.into(), expect)
            .await?;
        self.confirming.store(true, Ordering::Release);
        Ok(())
    }

    pub async fn settle(&self, delivery_tag: u64, settlement: Settlement) -> Result<(), Error> {
        let method: Method = match settlement {
            Settlement::Ack { multiple } => BasicAck {
                delivery_tag,
                multiple,
            }
            .into(),
            Settlement::Nack { multiple, requeue } => BasicNack {
                delivery_tag,
                multiple,
                requeue,
            }
            .into(),
            Settlement::Reject { requeue } => BasicReject {
                delivery_tag,
                requeue,
            }
            .into(),
        };
        self.send(method).await?;
        self.conn.observer.on_settle(self.id, delivery_tag, settlement);
        Ok(())
    }

    /// Register a consumer before `basic.consume` is sent so no delivery is missed
    pub fn add_consumer(&self, tag: String) -> Result<mpsc::UnboundedReceiver<Delivery>, Error> {
        let mut consumers = self.consumers.lock();
        if self.shutdown.is_triggered() {
            return Err(self.shutdown.reason_or_closed());
        }
        let (tx, rx) = mpsc::unbounded_channel();
        consumers.insert(tag, tx);
        Ok(rx)
    }

    /// Ends the consumer's stream
    pub fn remove_consumer(&self, tag: &str) -> bool {
        self.consumers.lock().remove(tag).is_some()
    }

    fn listen<T>(
        &self,
        select: impl FnOnce(&mut Listeners) -> &mut Vec<mpsc::UnboundedSender<T>>,
    ) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut listeners = self.listeners.lock();
        // a closed channel hands out an already finished receiver
        if !self.shutdown.is_triggered() {
            select(&mut listeners).push(tx);
        }
        rx
    }

    pub fn notify_close(&self) -> mpsc::UnboundedReceiver<Error> {
        self.listen(|l| &mut l.close)
    }

    pub fn notify_flow(&self) -> mpsc::UnboundedReceiver<bool> {
        self.listen(|l| &mut l.flow)
    }

    pub fn notify_return(&self) -> mpsc::UnboundedReceiver<Return> {
        self.listen(|l| &mut l.returns)
    }

    pub fn notify_cancel(&self) -> mpsc::UnboundedReceiver<String> {
        self.listen(|l| &mut l.cancel)
    }

    /// Run the `channel.close` handshake. Only the first caller does; the others get
    /// [`Error::Closed`].
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(channel = self.id)))]
    pub async fn close(self: &Arc<Self>) -> Result<(), Error> {
        {
            let mut state = self.state.lock();
            match *state {
                State::Opening | State::Open => *state = State::Closing,
                State::Closing | State::Closed => return Err(Error::Closed),
            }
        }

        let close = ChannelClose {
            reply_code: ReplyCode::ReplySuccess.into(),
            ..Default::default()
        };
        let result = self
            .call(close.into(), &[MethodKind::ChannelCloseOk])
            .await;
        self.shutdown_channel(Error::Closed);
        result.map(|_| ())
    }

    /// Move to `Closed`, release the id and wake everything waiting on the channel
    ///
    /// Close listeners hear about every reason except a graceful close.
    pub(crate) fn shutdown_channel(self: &Arc<Self>, reason: Error) {
        {
            let mut state = self.state.lock();
            if *state == State::Closed {
                return;
            }
            *state = State::Closed;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(channel = self.id, reason = %reason, "Channel shut down");
        #[cfg(feature = "log")]
        log::debug!("Channel {} shut down: {}", self.id, reason);

        self.conn.channels.lock().remove(self.id, self);
        self.shutdown.trigger(reason.clone());
        self.rpc.close();
        self.confirms.close();
        self.assembly.lock().take();
        self.consumers.lock().clear();

        let listeners = std::mem::take(&mut *self.listeners.lock());
        if !matches!(reason, Error::Closed) {
            for tx in listeners.close {
                let _ = tx.send(reason.clone());
            }
        }
    }

    /// Handle one inbound frame, returning the reply the reader task must write
    ///
    /// Content-bearing methods are held back until the header and every body frame arrived.
    /// Header and body frames that do not continue a method in progress are dropped.
    pub(crate) fn on_frame(self: &Arc<Self>, body: FrameBody) -> Option<Frame> {
        match body {
            FrameBody::Method(method) => {
                let method = *method;
                {
                    let mut assembly = self.assembly.lock();
                    if let Some(interrupted) = assembly.take() {
                        self.log_interrupted(&interrupted.method);
                    }
                    if method.has_content() {
                        *assembly = Some(Assembly {
                            method,
                            header: None,
                            body: BytesMut::new(),
                        });
                        return None;
                    }
                }
                self.on_method(method)
            }
            FrameBody::Header(header) => {
                let complete = {
                    let mut assembly = self.assembly.lock();
                    match assembly.as_mut() {
                        Some(pending) if pending.header.is_none() => {
                            let empty = header.body_size == 0;
                            pending.header = Some(*header);
                            if empty {
                                assembly.take()
                            } else {
                                None
                            }
                        }
                        _ => {
                            self.drop_unexpected("header");
                            assembly.take();
                            None
                        }
                    }
                };
                complete.and_then(|assembly| self.on_content(assembly))
            }
            FrameBody::Body(chunk) => {
                let complete = {
                    let mut assembly = self.assembly.lock();
                    match assembly.as_mut() {
                        Some(Assembly {
                            header: Some(header),
                            body,
                            ..
                        }) => {
                            body.extend_from_slice(&chunk);
                            let received = body.len() as u64;
                            if received >= header.body_size {
                                assembly.take()
                            } else {
                                None
                            }
                        }
                        _ => {
                            self.drop_unexpected("body");
                            assembly.take();
                            None
                        }
                    }
                };
                complete.and_then(|assembly| self.on_content(assembly))
            }
            FrameBody::Heartbeat => None,
        }
    }

    #[cfg_attr(not(any(feature = "tracing", feature = "log")), allow(unused_variables))]
    fn drop_unexpected(&self, kind: &'static str) {
        #[cfg(feature = "tracing")]
        tracing::warn!(channel = self.id, kind, "Dropping unexpected content frame");
        #[cfg(feature = "log")]
        log::warn!("Channel {}: dropping unexpected {} frame", self.id, kind);
    }

    #[cfg_attr(not(any(feature = "tracing", feature = "log")), allow(unused_variables))]
    fn log_interrupted(&self, method: &Method) {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            channel = self.id,
            method = method.name(),
            "Content interrupted by a method frame"
        );
        #[cfg(feature = "log")]
        log::warn!(
            "Channel {}: content of {} interrupted by a method frame",
            self.id,
            method.name()
        );
    }

    fn on_content(self: &Arc<Self>, assembly: Assembly) -> Option<Frame> {
        let Assembly {
            mut method,
            header,
            body,
        } = assembly;
        let header = header?;
        if body.len() as u64 != header.body_size {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                channel = self.id,
                expected = header.body_size,
                received = body.len(),
                "Body size does not match the content header"
            );
            #[cfg(feature = "log")]
            log::warn!(
                "Channel {}: body of {} bytes does not match the header's {}",
                self.id,
                body.len(),
                header.body_size
            );
            return None;
        }

        let content = Content::new(header.properties, body.freeze());
        // only content-bearing methods start an assembly
        let _ = method.set_content(content);
        self.on_method(method)
    }

    fn on_method(self: &Arc<Self>, method: Method) -> Option<Frame> {
        match method {
            Method::ChannelClose(close) => {
                let exception = Exception::from_server(close.reply_code, close.reply_text);
                #[cfg(feature = "tracing")]
                tracing::info!(channel = self.id, %exception, "Channel closed by server");
                #[cfg(feature = "log")]
                log::info!("Channel {} closed by server: {}", self.id, exception);

                self.shutdown_channel(exception.into());
                Some(Frame::method(self.id, ChannelCloseOk {}))
            }
            Method::ChannelFlow(flow) => {
                self.flow_active.store(flow.active, Ordering::Release);
                broadcast(&mut self.listeners.lock().flow, flow.active);
                Some(Frame::method(
                    self.id,
                    ChannelFlowOk {
                        active: flow.active,
                    },
                ))
            }
            Method::BasicAck(ack) => {
                self.confirm(Confirmation::new(ack.delivery_tag, true), ack.multiple);
                None
            }
            Method::BasicNack(nack) => {
                self.confirm(Confirmation::new(nack.delivery_tag, false), nack.multiple);
                None
            }
            Method::BasicDeliver(deliver) => {
                let delivery = Delivery::from_deliver(deliver, Acknowledger::new(self.clone()));
                self.conn.observer.on_deliver(self.id, &delivery);

                let consumers = self.consumers.lock();
                match consumers.get(&delivery.consumer_tag) {
                    Some(tx) => {
                        let _ = tx.send(delivery);
                    }
                    None => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            channel = self.id,
                            consumer_tag = %delivery.consumer_tag,
                            "Delivery for unknown consumer"
                        );
                        #[cfg(feature = "log")]
                        log::warn!(
                            "Channel {}: delivery for unknown consumer {}",
                            self.id,
                            delivery.consumer_tag
                        );
                    }
                }
                None
            }
            Method::BasicReturn(ret) => {
                let returned = Return::from(ret);
                self.conn.observer.on_return(self.id, &returned);
                broadcast(&mut self.listeners.lock().returns, returned);
                None
            }
            Method::BasicCancel(cancel) => {
                self.remove_consumer(&cancel.consumer_tag);
                let reply = (!cancel.no_wait).then(|| {
                    Frame::method(
                        self.id,
                        BasicCancelOk {
                            consumer_tag: cancel.consumer_tag.clone(),
                        },
                    )
                });
                broadcast(&mut self.listeners.lock().cancel, cancel.consumer_tag);
                reply
            }
            reply => {
                if !self.rpc.deliver(reply) {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(channel = self.id, "Reply arrived after the channel closed");
                    #[cfg(feature = "log")]
                    log::debug!("Channel {}: reply arrived after the channel closed", self.id);
                }
                None
            }
        }
    }

    fn confirm(&self, confirmation: Confirmation, multiple: bool) {
        if multiple {
            self.confirms.multiple(confirmation)
        } else {
            self.confirms.one(confirmation)
        }
    }
}
