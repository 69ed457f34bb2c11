use amqp091_types::wire::FieldTable;

/// Client properties sent in `connection.start-ok`
///
/// The capabilities table advertises the RabbitMQ extensions this client understands.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionProperties {
    /// Product name
    pub product: String,

    /// Platform
    pub platform: String,

    /// Client version
    pub version: String,

    /// Free-form information
    pub information: String,

    /// Name shown in the management UI
    pub connection_name: Option<String>,

    /// Extension flags
    pub capabilities: FieldTable,

    /// Any other properties
    pub extra: FieldTable,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        let capabilities = [
            "publisher_confirms",
            "exchange_exchange_bindings",
            "basic.nack",
            "consumer_cancel_notify",
            "connection.blocked",
            "authentication_failure_close",
            "per_consumer_qos",
        ]
        .into_iter()
        .map(|name| (name, true))
        .collect();

        Self {
            product: env!("CARGO_PKG_NAME").to_string(),
            platform: "Rust".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            information: env!("CARGO_PKG_DESCRIPTION").to_string(),
            connection_name: None,
            capabilities,
            extra: FieldTable::new(),
        }
    }
}

impl ConnectionProperties {
    /// The table sent on the wire
    pub fn to_table(&self) -> FieldTable {
        let mut table = self.extra.clone();
        table.insert("product", self.product.as_str());
        table.insert("platform", self.platform.as_str());
        table.insert("version", self.version.as_str());
        table.insert("information", self.information.as_str());
        if let Some(name) = &self.connection_name {
            table.insert("connection_name", name.as_str());
        }
        table.insert("capabilities", self.capabilities.clone());
        table
    }
}
