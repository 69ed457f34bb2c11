//! Methods of the `queue` class (class id 50)

use amqp091_wire::FieldTable;

method_struct! {
    /// Declare a queue, create it if needed
    pub struct QueueDeclare {
        /// Deprecated ticket
        pub reserved_1: u16 => short,
        /// Queue name, empty to let the server name it
        pub queue: String => shortstr,
        /// Do not create the queue
        pub passive: bool => bit,
        /// Request a durable queue
        pub durable: bool => bit,
        /// Request an exclusive queue
        pub exclusive: bool => bit,
        /// Auto-delete queue when unused
        pub auto_delete: bool => bit,
        /// Do not send a reply method
        pub no_wait: bool => bit,
        /// Arguments for declaration
        pub arguments: FieldTable => table,
    }
}

method_struct! {
    /// Confirm a queue declaration
    pub struct QueueDeclareOk {
        /// Queue name
        pub queue: String => shortstr,
        /// Number of messages in the queue
        pub message_count: u32 => long,
        /// Number of consumers
        pub consumer_count: u32 => long,
    }
}

method_struct! {
    /// Bind a queue to an exchange
    pub struct QueueBind {
        /// Deprecated ticket
        pub reserved_1: u16 => short,
        /// Queue name
        pub queue: String => shortstr,
        /// Name of the exchange to bind to
        pub exchange: String => shortstr,
        /// Message routing key
        pub routing_key: String => shortstr,
        /// Do not send a reply method
        pub no_wait: bool => bit,
        /// Arguments for binding
        pub arguments: FieldTable => table,
    }
}

method_struct! {
    /// Confirm bind successful
    pub struct QueueBindOk {}
}

method_struct! {
    /// Unbind a queue from an exchange
    pub struct QueueUnbind {
        /// Deprecated ticket
        pub reserved_1: u16 => short,
        /// Queue name
        pub queue: String => shortstr,
        /// Exchange name
        pub exchange: String => shortstr,
        /// Routing key of binding
        pub routing_key: String => shortstr,
        /// Arguments of binding
        pub arguments: FieldTable => table,
    }
}

method_struct! {
    /// Confirm unbind successful
    pub struct QueueUnbindOk {}
}

method_struct! {
    /// Purge a queue
    pub struct QueuePurge {
        /// Deprecated ticket
        pub reserved_1: u16 => short,
        /// Queue name
        pub queue: String => shortstr,
        /// Do not send a reply method
        pub no_wait: bool => bit,
    }
}

method_struct! {
    /// Confirm a queue purge
    pub struct QueuePurgeOk {
        /// Number of messages purged
        pub message_count: u32 => long,
    }
}

method_struct! {
    /// Delete a queue
    pub struct QueueDelete {
        /// Deprecated ticket
        pub reserved_1: u16 => short,
        /// Queue name
        pub queue: String => shortstr,
        /// Delete only if unused
        pub if_unused: bool => bit,
        /// Delete only if empty
        pub if_empty: bool => bit,
        /// Do not send a reply method
        pub no_wait: bool => bit,
    }
}

method_struct! {
    /// Confirm deletion of a queue
    pub struct QueueDeleteOk {
        /// Number of messages deleted
        pub message_count: u32 => long,
    }
}
