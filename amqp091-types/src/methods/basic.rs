//! Methods of the `basic` class (class id 60)

use amqp091_wire::FieldTable;

use crate::properties::Content;

method_struct! {
    /// Specify quality of service
    pub struct BasicQos {
        /// Prefetch window in octets
        pub prefetch_size: u32 => long,
        /// Prefetch window in messages
        pub prefetch_count: u16 => short,
        /// Apply to the entire connection
        pub global: bool => bit,
    }
}

method_struct! {
    /// Confirm the requested qos
    pub struct BasicQosOk {}
}

method_struct! {
    /// Start a queue consumer
    pub struct BasicConsume {
        /// Deprecated ticket
        pub reserved_1: u16 => short,
        /// Queue name
        pub queue: String => shortstr,
        /// Consumer tag, empty to let the server generate one
        pub consumer_tag: String => shortstr,
        /// Do not receive messages published on this connection
        pub no_local: bool => bit,
        /// No acknowledgement needed
        pub no_ack: bool => bit,
        /// Request exclusive access
        pub exclusive: bool => bit,
        /// Do not send a reply method
        pub no_wait: bool => bit,
        /// Arguments for consume
        pub arguments: FieldTable => table,
    }
}

method_struct! {
    /// Confirm a new consumer
    pub struct BasicConsumeOk {
        /// Consumer tag
        pub consumer_tag: String => shortstr,
    }
}

method_struct! {
    /// End a queue consumer
    pub struct BasicCancel {
        /// Consumer tag
        pub consumer_tag: String => shortstr,
        /// Do not send a reply method
        pub no_wait: bool => bit,
    }
}

method_struct! {
    /// Confirm a cancelled consumer
    pub struct BasicCancelOk {
        /// Consumer tag
        pub consumer_tag: String => shortstr,
    }
}

method_struct! {
    /// Publish a message
    pub struct BasicPublish {
        /// Deprecated ticket
        pub reserved_1: u16 => short,
        /// Exchange name
        pub exchange: String => shortstr,
        /// Message routing key
        pub routing_key: String => shortstr,
        /// Return the message if it cannot be routed
        pub mandatory: bool => bit,
        /// Return the message if it cannot be delivered immediately
        pub immediate: bool => bit,
        /// Properties and body
        pub content: Content => content,
    }
}

method_struct! {
    /// Return a failed message
    pub struct BasicReturn {
        /// Reply code
        pub reply_code: u16 => short,
        /// Localised reply text
        pub reply_text: String => shortstr,
        /// Exchange name
        pub exchange: String => shortstr,
        /// Message routing key
        pub routing_key: String => shortstr,
        /// Properties and body
        pub content: Content => content,
    }
}

method_struct! {
    /// Notify the client of a consumer message
    pub struct BasicDeliver {
        /// Consumer tag
        pub consumer_tag: String => shortstr,
        /// Server assigned delivery tag
        pub delivery_tag: u64 => longlong,
        /// Message is being redelivered
        pub redelivered: bool => bit,
        /// Exchange name
        pub exchange: String => shortstr,
        /// Message routing key
        pub routing_key: String => shortstr,
        /// Properties and body
        pub content: Content => content,
    }
}

method_struct! {
    /// Direct access to a queue
    pub struct BasicGet {
        /// Deprecated ticket
        pub reserved_1: u16 => short,
        /// Queue name
        pub queue: String => shortstr,
        /// No acknowledgement needed
        pub no_ack: bool => bit,
    }
}

method_struct! {
    /// Provide the client with a message
    pub struct BasicGetOk {
        /// Server assigned delivery tag
        pub delivery_tag: u64 => longlong,
        /// Message is being redelivered
        pub redelivered: bool => bit,
        /// Exchange name
        pub exchange: String => shortstr,
        /// Message routing key
        pub routing_key: String => shortstr,
        /// Number of messages left in the queue
        pub message_count: u32 => long,
        /// Properties and body
        pub content: Content => content,
    }
}

method_struct! {
    /// Indicate no messages available
    pub struct BasicGetEmpty {
        /// Deprecated cluster id
        pub reserved_1: String => shortstr,
    }
}

method_struct! {
    /// Acknowledge one or more messages
    pub struct BasicAck {
        /// Delivery tag
        pub delivery_tag: u64 => longlong,
        /// Acknowledge every message up to and including the tag
        pub multiple: bool => bit,
    }
}

method_struct! {
    /// Reject an incoming message
    pub struct BasicReject {
        /// Delivery tag
        pub delivery_tag: u64 => longlong,
        /// Requeue the message
        pub requeue: bool => bit,
    }
}

method_struct! {
    /// Redeliver unacknowledged messages, without a reply
    pub struct BasicRecoverAsync {
        /// Requeue the messages
        pub requeue: bool => bit,
    }
}

method_struct! {
    /// Redeliver unacknowledged messages
    pub struct BasicRecover {
        /// Requeue the messages
        pub requeue: bool => bit,
    }
}

method_struct! {
    /// Confirm recovery
    pub struct BasicRecoverOk {}
}

method_struct! {
    /// Reject one or more incoming messages
    pub struct BasicNack {
        /// Delivery tag
        pub delivery_tag: u64 => longlong,
        /// Reject every message up to and including the tag
        pub multiple: bool => bit,
        /// Requeue the messages
        pub requeue: bool => bit,
    }
}
