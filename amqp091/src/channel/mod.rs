//! Channels multiplexed over a connection
//!
//! Every operation that has a reply in the protocol waits for it unless `no_wait` is set.
//! Synchronous operations on one channel run one at a time; publishes and acknowledgements do
//! not wait behind them.

use std::sync::Arc;

use amqp091_types::{
    methods::{
        BasicCancel, BasicConsume, BasicGet, BasicPublish, BasicQos, BasicRecover,
        BasicRecoverAsync, ChannelFlow, ExchangeBind, ExchangeDeclare, ExchangeDelete,
        ExchangeUnbind, QueueBind, QueueDeclare, QueueDelete, QueuePurge, QueueUnbind, TxCommit,
        TxRollback, TxSelect,
    },
    wire::FieldTable,
    BasicProperties, Content, Method, MethodKind,
};
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::{
    confirms::{Confirmation, DeferredConfirmation},
    delivery::{Acknowledger, GetMessage, Return},
    error::Error,
    observer::Settlement,
};

mod consumer;
pub(crate) mod rpc;
pub(crate) mod shared;
pub(crate) mod table;

pub use consumer::Consumer;

use shared::ChannelShared;

/// Options of `exchange.declare`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeDeclareOptions {
    /// Only check that the exchange exists
    pub passive: bool,

    /// Survive a broker restart
    pub durable: bool,

    /// Delete once the last binding is removed
    pub auto_delete: bool,

    /// Not directly publishable, only reachable through exchange bindings
    pub internal: bool,

    /// Do not wait for `exchange.declare-ok`
    pub no_wait: bool,
}

/// Options of `exchange.delete`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeDeleteOptions {
    /// Only delete the exchange if it has no bindings
    pub if_unused: bool,

    /// Do not wait for `exchange.delete-ok`
    pub no_wait: bool,
}

/// Options of `queue.declare`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDeclareOptions {
    /// Only check that the queue exists
    pub passive: bool,

    /// Survive a broker restart
    pub durable: bool,

    /// Only accessible by this connection and deleted when it closes
    pub exclusive: bool,

    /// Delete once the last consumer is cancelled
    pub auto_delete: bool,

    /// Do not wait for `queue.declare-ok`
    pub no_wait: bool,
}

/// Options of `queue.delete`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDeleteOptions {
    /// Only delete the queue if it has no consumers
    pub if_unused: bool,

    /// Only delete the queue if it has no messages
    pub if_empty: bool,

    /// Do not wait for `queue.delete-ok`
    pub no_wait: bool,
}

/// Options of `basic.consume`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumeOptions {
    /// Do not receive messages published on this connection
    pub no_local: bool,

    /// Deliveries are settled as soon as they are sent
    pub no_ack: bool,

    /// Be the only consumer of the queue
    pub exclusive: bool,

    /// Do not wait for `basic.consume-ok`
    pub no_wait: bool,
}

/// Options of `basic.publish`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Return the message if it cannot be routed to any queue
    pub mandatory: bool,

    /// Return the message if it cannot be delivered to a consumer right away
    pub immediate: bool,
}

/// A declared queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Queue {
    /// Name of the queue, generated by the server if the declaration left it empty
    pub name: String,

    /// Messages ready for delivery
    pub message_count: u32,

    /// Active consumers
    pub consumer_count: u32,
}

/// A channel of a [`Connection`](crate::Connection)
///
/// Clones refer to the same channel.
#[derive(Debug, Clone)]
pub struct Channel {
    shared: Arc<ChannelShared>,
}

impl Channel {
    pub(crate) fn new(shared: Arc<ChannelShared>) -> Self {
        Self { shared }
    }

    /// The channel id
    pub fn id(&self) -> u16 {
        self.shared.id()
    }

    /// Whether the channel was closed, by either side or with its connection
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Close the channel
    ///
    /// Returns [`Error::Closed`] if the channel is already closed or another close is in
    /// progress.
    pub async fn close(&self) -> Result<(), Error> {
        self.shared.close().await
    }

    async fn rpc(
        &self,
        method: Method,
        reply: &'static [MethodKind],
    ) -> Result<Option<Method>, Error> {
        let expect: &[MethodKind] = if method.wait() { reply } else { &[] };
        self.shared.call(method, expect).await
    }

    /// Ask the server to pause (`false`) or resume (`true`) deliveries
    pub async fn flow(&self, active: bool) -> Result<bool, Error> {
        match self
            .rpc(ChannelFlow { active }.into(), &[MethodKind::ChannelFlowOk])
            .await?
        {
            Some(Method::ChannelFlowOk(ok)) => Ok(ok.active),
            other => Err(unexpected(other)),
        }
    }

    /// Whether the server currently allows publishing on this channel
    pub fn is_flow_active(&self) -> bool {
        self.shared.is_flow_active()
    }

    /// `exchange.declare`
    pub async fn exchange_declare(
        &self,
        exchange: &str,
        kind: &str,
        options: ExchangeDeclareOptions,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        let declare = ExchangeDeclare {
            reserved_1: 0,
            exchange: exchange.into(),
            kind: kind.into(),
            passive: options.passive,
            durable: options.durable,
            auto_delete: options.auto_delete,
            internal: options.internal,
            no_wait: options.no_wait,
            arguments,
        };
        self.rpc(declare.into(), &[MethodKind::ExchangeDeclareOk])
            .await
            .map(|_| ())
    }

    /// Check that an exchange exists. The server closes the channel with `404` if it does not.
    pub async fn exchange_declare_passive(&self, exchange: &str) -> Result<(), Error> {
        let options = ExchangeDeclareOptions {
            passive: true,
            ..Default::default()
        };
        self.exchange_declare(exchange, "", options, FieldTable::new())
            .await
    }

    /// `exchange.delete`
    pub async fn exchange_delete(
        &self,
        exchange: &str,
        options: ExchangeDeleteOptions,
    ) -> Result<(), Error> {
        let delete = ExchangeDelete {
            reserved_1: 0,
            exchange: exchange.into(),
            if_unused: options.if_unused,
            no_wait: options.no_wait,
        };
        self.rpc(delete.into(), &[MethodKind::ExchangeDeleteOk])
            .await
            .map(|_| ())
    }

    /// Route messages from `source` to `destination`
    pub async fn exchange_bind(
        &self,
        destination: &str,
        source: &str,
        routing_key: &str,
        no_wait: bool,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        let bind = ExchangeBind {
            reserved_1: 0,
            destination: destination.into(),
            source: source.into(),
            routing_key: routing_key.into(),
            no_wait,
            arguments,
        };
        self.rpc(bind.into(), &[MethodKind::ExchangeBindOk])
            .await
            .map(|_| ())
    }

    /// Remove a binding made with [`exchange_bind`](Self::exchange_bind)
    pub async fn exchange_unbind(
        &self,
        destination: &str,
        source: &str,
        routing_key: &str,
        no_wait: bool,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        let unbind = ExchangeUnbind {
            reserved_1: 0,
            destination: destination.into(),
            source: source.into(),
            routing_key: routing_key.into(),
            no_wait,
            arguments,
        };
        self.rpc(unbind.into(), &[MethodKind::ExchangeUnbindOk])
            .await
            .map(|_| ())
    }

    /// `queue.declare`
    ///
    /// With `no_wait` the returned counts are zero and the name is the one given.
    pub async fn queue_declare(
        &self,
        queue: &str,
        options: QueueDeclareOptions,
        arguments: FieldTable,
    ) -> Result<Queue, Error> {
        let declare = QueueDeclare {
            reserved_1: 0,
            queue: queue.into(),
            passive: options.passive,
            durable: options.durable,
            exclusive: options.exclusive,
            auto_delete: options.auto_delete,
            no_wait: options.no_wait,
            arguments,
        };
        match self
            .rpc(declare.into(), &[MethodKind::QueueDeclareOk])
            .await?
        {
            Some(Method::QueueDeclareOk(ok)) => Ok(Queue {
                name: ok.queue,
                message_count: ok.message_count,
                consumer_count: ok.consumer_count,
            }),
            None => Ok(Queue {
                name: queue.into(),
                ..Default::default()
            }),
            other => Err(unexpected(other)),
        }
    }

    /// Check that a queue exists and read its counts
    pub async fn queue_declare_passive(&self, queue: &str) -> Result<Queue, Error> {
        let options = QueueDeclareOptions {
            passive: true,
            ..Default::default()
        };
        self.queue_declare(queue, options, FieldTable::new()).await
    }

    /// `queue.bind`
    pub async fn queue_bind(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
        no_wait: bool,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        let bind = QueueBind {
            reserved_1: 0,
            queue: queue.into(),
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            no_wait,
            arguments,
        };
        self.rpc(bind.into(), &[MethodKind::QueueBindOk])
            .await
            .map(|_| ())
    }

    /// `queue.unbind`, which has no `no_wait` form
    pub async fn queue_unbind(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        let unbind = QueueUnbind {
            reserved_1: 0,
            queue: queue.into(),
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            arguments,
        };
        self.rpc(unbind.into(), &[MethodKind::QueueUnbindOk])
            .await
            .map(|_| ())
    }

    /// Drop every ready message, returning how many were dropped
    pub async fn queue_purge(&self, queue: &str, no_wait: bool) -> Result<u32, Error> {
        let purge = QueuePurge {
            reserved_1: 0,
            queue: queue.into(),
            no_wait,
        };
        match self.rpc(purge.into(), &[MethodKind::QueuePurgeOk]).await? {
            Some(Method::QueuePurgeOk(ok)) => Ok(ok.message_count),
            None => Ok(0),
            other => Err(unexpected(other)),
        }
    }

    /// Delete a queue, returning how many messages it held
    pub async fn queue_delete(
        &self,
        queue: &str,
        options: QueueDeleteOptions,
    ) -> Result<u32, Error> {
        let delete = QueueDelete {
            reserved_1: 0,
            queue: queue.into(),
            if_unused: options.if_unused,
            if_empty: options.if_empty,
            no_wait: options.no_wait,
        };
        match self.rpc(delete.into(), &[MethodKind::QueueDeleteOk]).await? {
            Some(Method::QueueDeleteOk(ok)) => Ok(ok.message_count),
            None => Ok(0),
            other => Err(unexpected(other)),
        }
    }

    /// Limit unacknowledged deliveries, per consumer or, with `global`, per channel
    pub async fn basic_qos(
        &self,
        prefetch_count: u16,
        prefetch_size: u32,
        global: bool,
    ) -> Result<(), Error> {
        let qos = BasicQos {
            prefetch_size,
            prefetch_count,
            global,
        };
        self.rpc(qos.into(), &[MethodKind::BasicQosOk])
            .await
            .map(|_| ())
    }

    /// Start consuming from `queue`
    ///
    /// An empty `consumer_tag` is replaced by one unique to this process.
    pub async fn basic_consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        options: ConsumeOptions,
        arguments: FieldTable,
    ) -> Result<Consumer, Error> {
        let tag = match consumer_tag {
            "" => consumer::unique_consumer_tag(),
            tag => tag.to_string(),
        };
        let deliveries = self.shared.add_consumer(tag.clone())?;

        let consume = BasicConsume {
            reserved_1: 0,
            queue: queue.into(),
            consumer_tag: tag.clone(),
            no_local: options.no_local,
            no_ack: options.no_ack,
            exclusive: options.exclusive,
            no_wait: options.no_wait,
            arguments,
        };
        match self.rpc(consume.into(), &[MethodKind::BasicConsumeOk]).await {
            Ok(_) => Ok(Consumer::new(tag, deliveries)),
            Err(err) => {
                self.shared.remove_consumer(&tag);
                Err(err)
            }
        }
    }

    /// Stop a consumer. Its stream ends once the server confirmed.
    pub async fn basic_cancel(&self, consumer_tag: &str, no_wait: bool) -> Result<(), Error> {
        let cancel = BasicCancel {
            consumer_tag: consumer_tag.into(),
            no_wait,
        };
        self.rpc(cancel.into(), &[MethodKind::BasicCancelOk]).await?;
        self.shared.remove_consumer(consumer_tag);
        Ok(())
    }

    fn publish_method(
        exchange: &str,
        routing_key: &str,
        options: PublishOptions,
        properties: BasicProperties,
        body: Bytes,
    ) -> BasicPublish {
        BasicPublish {
            reserved_1: 0,
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            mandatory: options.mandatory,
            immediate: options.immediate,
            content: Content::new(properties, body),
        }
    }

    /// Publish a message
    ///
    /// The body is split into frames no larger than the negotiated maximum. In confirm mode the
    /// publish takes the next delivery tag; see [`notify_publish`](Self::notify_publish).
    pub async fn basic_publish(
        &self,
        exchange: &str,
        routing_key: &str,
        options: PublishOptions,
        properties: BasicProperties,
        body: impl Into<Bytes>,
    ) -> Result<(), Error> {
        let publish = Self::publish_method(exchange, routing_key, options, properties, body.into());
        self.shared.publish(publish, false).await.map(|_| ())
    }

    /// Publish a message and track its confirmation
    ///
    /// Returns `None` when the channel is not in confirm mode.
    pub async fn basic_publish_with_deferred_confirm(
        &self,
        exchange: &str,
        routing_key: &str,
        options: PublishOptions,
        properties: BasicProperties,
        body: impl Into<Bytes>,
    ) -> Result<Option<DeferredConfirmation>, Error> {
        let publish = Self::publish_method(exchange, routing_key, options, properties, body.into());
        self.shared.publish(publish, true).await
    }

    /// Fetch one message, `None` if the queue is empty
    pub async fn basic_get(&self, queue: &str, no_ack: bool) -> Result<Option<GetMessage>, Error> {
        let get = BasicGet {
            reserved_1: 0,
            queue: queue.into(),
            no_ack,
        };
        match self
            .rpc(
                get.into(),
                &[MethodKind::BasicGetOk, MethodKind::BasicGetEmpty],
            )
            .await?
        {
            Some(Method::BasicGetOk(ok)) => {
                let message = GetMessage::from_get_ok(ok, Acknowledger::new(self.shared.clone()));
                self.shared
                    .observer()
                    .on_deliver(self.id(), &message.delivery);
                Ok(Some(message))
            }
            Some(Method::BasicGetEmpty(_)) => Ok(None),
            other => Err(unexpected(other)),
        }
    }

    /// `basic.ack`
    pub async fn basic_ack(&self, delivery_tag: u64, multiple: bool) -> Result<(), Error> {
        self.shared
            .settle(delivery_tag, Settlement::Ack { multiple })
            .await
    }

    /// `basic.nack`
    pub async fn basic_nack(
        &self,
        delivery_tag: u64,
        multiple: bool,
        requeue: bool,
    ) -> Result<(), Error> {
        self.shared
            .settle(delivery_tag, Settlement::Nack { multiple, requeue })
            .await
    }

    /// `basic.reject`
    pub async fn basic_reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), Error> {
        self.shared
            .settle(delivery_tag, Settlement::Reject { requeue })
            .await
    }

    /// Redeliver every unacknowledged message, to any consumer if `requeue`
    pub async fn basic_recover(&self, requeue: bool) -> Result<(), Error> {
        self.rpc(
            BasicRecover { requeue }.into(),
            &[MethodKind::BasicRecoverOk],
        )
        .await
        .map(|_| ())
    }

    /// [`basic_recover`](Self::basic_recover) without a reply
    pub async fn basic_recover_async(&self, requeue: bool) -> Result<(), Error> {
        self.shared
            .send(BasicRecoverAsync { requeue }.into())
            .await
    }

    /// Put the channel in transaction mode
    pub async fn tx_select(&self) -> Result<(), Error> {
        self.rpc(TxSelect {}.into(), &[MethodKind::TxSelectOk])
            .await
            .map(|_| ())
    }

    /// Commit the current transaction
    pub async fn tx_commit(&self) -> Result<(), Error> {
        self.rpc(TxCommit {}.into(), &[MethodKind::TxCommitOk])
            .await
            .map(|_| ())
    }

    /// Abandon the current transaction
    pub async fn tx_rollback(&self) -> Result<(), Error> {
        self.rpc(TxRollback {}.into(), &[MethodKind::TxRollbackOk])
            .await
            .map(|_| ())
    }

    /// Put the channel in confirm mode. Every later publish takes a delivery tag, starting
    /// at 1.
    pub async fn confirm_select(&self, no_wait: bool) -> Result<(), Error> {
        self.shared.confirm_select(no_wait).await
    }

    /// Delivery tag of the next publish in confirm mode
    pub fn next_publish_seq_no(&self) -> u64 {
        self.shared.confirms().next_publish_seq_no()
    }

    /// Confirmations in delivery tag order
    pub fn notify_publish(&self) -> mpsc::UnboundedReceiver<Confirmation> {
        self.shared.confirms().listen()
    }

    /// The error that closed the channel. Nothing is sent for a close requested by the client.
    pub fn notify_close(&self) -> mpsc::UnboundedReceiver<Error> {
        self.shared.notify_close()
    }

    /// `channel.flow` requests from the server
    pub fn notify_flow(&self) -> mpsc::UnboundedReceiver<bool> {
        self.shared.notify_flow()
    }

    /// Messages returned by the server
    pub fn notify_return(&self) -> mpsc::UnboundedReceiver<Return> {
        self.shared.notify_return()
    }

    /// Tags of consumers cancelled by the server
    pub fn notify_cancel(&self) -> mpsc::UnboundedReceiver<String> {
        self.shared.notify_cancel()
    }
}

fn unexpected(reply: Option<Method>) -> Error {
    match reply {
        Some(method) => Error::UnexpectedReply(method.name()),
        None => Error::UnexpectedReply("none"),
    }
}
