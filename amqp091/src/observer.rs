//! Hooks observing messages flowing through channels
//!
//! An [`Observer`] is injected through the connection builder and shared by every channel.
//! [`NoopObserver`] is used when none is given.
//!
//! [`Observer::on_publish`] may rewrite the message properties before they are encoded, which
//! is how trace context travels in the application headers:
//!
//! ```rust
//! use amqp091::{observer::Observer, BasicProperties, Delivery};
//!
//! #[derive(Debug)]
//! struct Propagate;
//!
//! impl Observer for Propagate {
//!     fn on_publish(&self, _: u16, _: &str, _: &str, properties: &mut BasicProperties) {
//!         properties.set_header("traceparent", "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01");
//!     }
//!
//!     fn on_deliver(&self, _: u16, delivery: &Delivery) {
//!         let _parent = delivery.properties.header("traceparent");
//!     }
//! }
//! ```

use std::fmt::Debug;

use amqp091_types::BasicProperties;

use crate::delivery::{Delivery, Return};

/// How a delivery was settled by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// `basic.ack`
    Ack {
        /// Also settles every earlier unsettled delivery
        multiple: bool,
    },

    /// `basic.nack`
    Nack {
        /// Also settles every earlier unsettled delivery
        multiple: bool,

        /// Ask the server to redeliver
        requeue: bool,
    },

    /// `basic.reject`
    Reject {
        /// Ask the server to redeliver
        requeue: bool,
    },
}

/// Message level hooks
///
/// Every method has an empty default body. Hooks run on the task that performs the operation,
/// deliveries and returns on the connection's reader task, so they should return quickly.
pub trait Observer: Debug + Send + Sync {
    /// A message is about to be published. Changes to `properties` are sent with it.
    fn on_publish(
        &self,
        _channel: u16,
        _exchange: &str,
        _routing_key: &str,
        _properties: &mut BasicProperties,
    ) {
    }

    /// A message was delivered to a consumer or fetched with `basic.get`
    fn on_deliver(&self, _channel: u16, _delivery: &Delivery) {}

    /// The server returned an unroutable message
    fn on_return(&self, _channel: u16, _returned: &Return) {}

    /// A delivery was settled
    fn on_settle(&self, _channel: u16, _delivery_tag: u64, _settlement: Settlement) {}
}

/// Does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Emits a `tracing` event for every hook
#[cfg(feature = "tracing")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

#[cfg(feature = "tracing")]
impl Observer for TracingObserver {
    fn on_publish(
        &self,
        channel: u16,
        exchange: &str,
        routing_key: &str,
        properties: &mut BasicProperties,
    ) {
        tracing::trace!(
            channel,
            exchange,
            routing_key,
            message_id = ?properties.message_id,
            "publish"
        );
    }

    fn on_deliver(&self, channel: u16, delivery: &Delivery) {
        tracing::trace!(
            channel,
            consumer_tag = %delivery.consumer_tag,
            delivery_tag = delivery.delivery_tag,
            redelivered = delivery.redelivered,
            "deliver"
        );
    }

    fn on_return(&self, channel: u16, returned: &Return) {
        tracing::debug!(
            channel,
            reply_code = returned.reply_code,
            reply_text = %returned.reply_text,
            exchange = %returned.exchange,
            routing_key = %returned.routing_key,
            "return"
        );
    }

    fn on_settle(&self, channel: u16, delivery_tag: u64, settlement: Settlement) {
        tracing::trace!(channel, delivery_tag, ?settlement, "settle");
    }
}
