//! Methods of the `exchange` class (class id 40)

use amqp091_wire::FieldTable;

method_struct! {
    /// Verify an exchange exists, create it if needed
    pub struct ExchangeDeclare {
        /// Deprecated ticket
        pub reserved_1: u16 => short,
        /// Exchange name
        pub exchange: String => shortstr,
        /// Exchange type
        pub kind: String => shortstr,
        /// Do not create the exchange
        pub passive: bool => bit,
        /// Request a durable exchange
        pub durable: bool => bit,
        /// Auto-delete when unused
        pub auto_delete: bool => bit,
        /// Create an internal exchange
        pub internal: bool => bit,
        /// Do not send a reply method
        pub no_wait: bool => bit,
        /// Arguments for declaration
        pub arguments: FieldTable => table,
    }
}

method_struct! {
    /// Confirm exchange declaration
    pub struct ExchangeDeclareOk {}
}

method_struct! {
    /// Delete an exchange
    pub struct ExchangeDelete {
        /// Deprecated ticket
        pub reserved_1: u16 => short,
        /// Exchange name
        pub exchange: String => shortstr,
        /// Delete only if unused
        pub if_unused: bool => bit,
        /// Do not send a reply method
        pub no_wait: bool => bit,
    }
}

method_struct! {
    /// Confirm deletion of an exchange
    pub struct ExchangeDeleteOk {}
}

method_struct! {
    /// Bind exchange to an exchange
    pub struct ExchangeBind {
        /// Deprecated ticket
        pub reserved_1: u16 => short,
        /// Name of the destination exchange to bind to
        pub destination: String => shortstr,
        /// Name of the source exchange to bind to
        pub source: String => shortstr,
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
    pub struct ExchangeBindOk {}
}

method_struct! {
    /// Unbind an exchange from an exchange
    pub struct ExchangeUnbind {
        /// Deprecated ticket
        pub reserved_1: u16 => short,
        /// Name of the destination exchange
        pub destination: String => shortstr,
        /// Name of the source exchange
        pub source: String => shortstr,
        /// Routing key of binding
        pub routing_key: String => shortstr,
        /// Do not send a reply method
        pub no_wait: bool => bit,
        /// Arguments of binding
        pub arguments: FieldTable => table,
    }
}

method_struct! {
    /// Confirm unbind successful
    pub struct ExchangeUnbindOk {}
}
