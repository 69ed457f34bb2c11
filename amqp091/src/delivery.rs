//! Messages received from the server

use std::{ops::Deref, sync::Arc};

use amqp091_types::{
    methods::{BasicDeliver, BasicGetOk, BasicReturn},
    BasicProperties,
};
use bytes::Bytes;

use crate::{channel::shared::ChannelShared, error::Error, observer::Settlement};

/// Settles deliveries on the channel they arrived on
#[derive(Clone)]
pub struct Acknowledger {
    channel: Arc<ChannelShared>,
}

impl std::fmt::Debug for Acknowledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acknowledger")
            .field("channel", &self.channel.id())
            .finish()
    }
}

impl Acknowledger {
    pub(crate) fn new(channel: Arc<ChannelShared>) -> Self {
        Self { channel }
    }

    /// Id of the channel the delivery arrived on
    pub fn channel_id(&self) -> u16 {
        self.channel.id()
    }

    /// `basic.ack`
    pub async fn ack(&self, delivery_tag: u64, multiple: bool) -> Result<(), Error> {
        self.channel
            .settle(delivery_tag, Settlement::Ack { multiple })
            .await
    }

    /// `basic.nack`
    pub async fn nack(&self, delivery_tag: u64, multiple: bool, requeue: bool) -> Result<(), Error> {
        self.channel
            .settle(delivery_tag, Settlement::Nack { multiple, requeue })
            .await
    }

    /// `basic.reject`
    pub async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), Error> {
        self.channel
            .settle(delivery_tag, Settlement::Reject { requeue })
            .await
    }
}

/// A message delivered to a consumer
///
/// A `Delivery` built with `Default` is not attached to any channel; settling it returns
/// [`Error::NotInitialized`].
#[derive(Debug, Clone, Default)]
pub struct Delivery {
    acknowledger: Option<Acknowledger>,

    /// Tag of the consumer the message was delivered to, empty for `basic.get`
    pub consumer_tag: String,

    /// Server assigned tag used to settle the delivery
    pub delivery_tag: u64,

    /// The message was delivered before and not settled
    pub redelivered: bool,

    /// Exchange the message was published to
    pub exchange: String,

    /// Routing key the message was published with
    pub routing_key: String,

    /// Message properties
    pub properties: BasicProperties,

    /// Message body
    pub body: Bytes,
}

impl Delivery {
    pub(crate) fn from_deliver(deliver: BasicDeliver, acknowledger: Acknowledger) -> Self {
        Self {
            acknowledger: Some(acknowledger),
            consumer_tag: deliver.consumer_tag,
            delivery_tag: deliver.delivery_tag,
            redelivered: deliver.redelivered,
            exchange: deliver.exchange,
            routing_key: deliver.routing_key,
            properties: deliver.content.properties,
            body: deliver.content.body,
        }
    }

    /// The acknowledger, `None` when not attached to a channel
    pub fn acknowledger(&self) -> Option<&Acknowledger> {
        self.acknowledger.as_ref()
    }

    fn acker(&self) -> Result<&Acknowledger, Error> {
        self.acknowledger.as_ref().ok_or(Error::NotInitialized)
    }

    /// Acknowledge this delivery, and every earlier one if `multiple`
    pub async fn ack(&self, multiple: bool) -> Result<(), Error> {
        self.acker()?.ack(self.delivery_tag, multiple).await
    }

    /// Negatively acknowledge this delivery, and every earlier one if `multiple`
    pub async fn nack(&self, multiple: bool, requeue: bool) -> Result<(), Error> {
        self.acker()?
            .nack(self.delivery_tag, multiple, requeue)
            .await
    }

    /// Reject this delivery
    pub async fn reject(&self, requeue: bool) -> Result<(), Error> {
        self.acker()?.reject(self.delivery_tag, requeue).await
    }
}

/// A message fetched with `basic.get`
#[derive(Debug, Clone, Default)]
pub struct GetMessage {
    /// The message
    pub delivery: Delivery,

    /// Messages left in the queue
    pub message_count: u32,
}

impl GetMessage {
    pub(crate) fn from_get_ok(get_ok: BasicGetOk, acknowledger: Acknowledger) -> Self {
        let delivery = Delivery {
            acknowledger: Some(acknowledger),
            consumer_tag: String::new(),
            delivery_tag: get_ok.delivery_tag,
            redelivered: get_ok.redelivered,
            exchange: get_ok.exchange,
            routing_key: get_ok.routing_key,
            properties: get_ok.content.properties,
            body: get_ok.content.body,
        };
        Self {
            delivery,
            message_count: get_ok.message_count,
        }
    }

    /// Take the delivery
    pub fn into_delivery(self) -> Delivery {
        self.delivery
    }
}

impl Deref for GetMessage {
    type Target = Delivery;

    fn deref(&self) -> &Self::Target {
        &self.delivery
    }
}

/// An unroutable mandatory or immediate publish handed back by the server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Return {
    /// Reason code, e.g. 312 `NO_ROUTE`
    pub reply_code: u16,

    /// Reason text
    pub reply_text: String,

    /// Exchange the message was published to
    pub exchange: String,

    /// Routing key the message was published with
    pub routing_key: String,

    /// Message properties
    pub properties: BasicProperties,

    /// Message body
    pub body: Bytes,
}

impl From<BasicReturn> for Return {
    fn from(value: BasicReturn) -> Self {
        Self {
            reply_code: value.reply_code,
            reply_text: value.reply_text,
            exchange: value.exchange,
            routing_key: value.routing_key,
            properties: value.content.properties,
            body: value.content.body,
        }
    }
}
