//! SASL mechanisms offered during the connection handshake

use std::{fmt::Debug, sync::Arc};

use amqp091_wire::{FieldTable, FieldValue};
use bytes::{Bytes, BytesMut};

/// A SASL mechanism
///
/// The client offers its mechanisms in order of preference; the first one the server also
/// lists in `connection.start` is used.
pub trait Authentication: Debug + Send + Sync {
    /// Name of the mechanism as it appears in the server's list
    fn mechanism(&self) -> &str;

    /// The initial response sent with `connection.start-ok`
    fn response(&self) -> Bytes;
}

/// The `PLAIN` mechanism
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainAuth {
    /// Username
    pub username: String,

    /// Password
    pub password: String,
}

impl PlainAuth {
    /// Creates a new `PLAIN` mechanism
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Authentication for PlainAuth {
    fn mechanism(&self) -> &str {
        "PLAIN"
    }

    fn response(&self) -> Bytes {
        let mut buf = Vec::with_capacity(2 + self.username.len() + self.password.len());
        buf.push(0);
        buf.extend_from_slice(self.username.as_bytes());
        buf.push(0);
        buf.extend_from_slice(self.password.as_bytes());
        Bytes::from(buf)
    }
}

/// The RabbitMQ specific `AMQPLAIN` mechanism
///
/// The response is a field table without its length prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmqPlainAuth {
    /// Username
    pub username: String,

    /// Password
    pub password: String,
}

impl AmqPlainAuth {
    /// Creates a new `AMQPLAIN` mechanism
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Authentication for AmqPlainAuth {
    fn mechanism(&self) -> &str {
        "AMQPLAIN"
    }

    fn response(&self) -> Bytes {
        let mut table = FieldTable::new();
        table.insert("LOGIN", FieldValue::LongString(self.username.clone()));
        table.insert("PASSWORD", FieldValue::LongString(self.password.clone()));

        let mut buf = BytesMut::new();
        match table.encode_pairs(&mut buf) {
            Ok(()) => buf.freeze(),
            // only fails for credentials longer than u32::MAX bytes
            Err(_) => Bytes::new(),
        }
    }
}

/// The `EXTERNAL` mechanism, identity is taken from the TLS client certificate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalAuth;

impl Authentication for ExternalAuth {
    fn mechanism(&self) -> &str {
        "EXTERNAL"
    }

    fn response(&self) -> Bytes {
        Bytes::from_static(b"\x00*\x00*")
    }
}

/// Pick the first client mechanism that the server lists
///
/// `server` is the space separated list from `connection.start`.
pub fn pick_sasl_mechanism(
    client: &[Arc<dyn Authentication>],
    server: &str,
) -> Option<Arc<dyn Authentication>> {
    client
        .iter()
        .find(|auth| server.split(' ').any(|name| name == auth.mechanism()))
        .cloned()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{pick_sasl_mechanism, AmqPlainAuth, Authentication, ExternalAuth, PlainAuth};

    #[test]
    fn plain_response() {
        let auth = PlainAuth::new("user", "pass");
        assert_eq!(auth.mechanism(), "PLAIN");
        assert_eq!(&auth.response()[..], b"\x00user\x00pass");
    }

    #[test]
    fn external_response() {
        let auth = ExternalAuth;
        assert_eq!(auth.mechanism(), "EXTERNAL");
        assert_eq!(&auth.response()[..], b"\x00*\x00*");
    }

    #[test]
    fn amqplain_response_is_unprefixed_table() {
        let auth = AmqPlainAuth::new("u", "p");
        assert_eq!(
            &auth.response()[..],
            b"\x05LOGINS\x00\x00\x00\x01u\x08PASSWORDS\x00\x00\x00\x01p"
        );
    }

    #[test]
    fn first_client_preference_wins() {
        let client: Vec<Arc<dyn Authentication>> = vec![
            Arc::new(ExternalAuth),
            Arc::new(PlainAuth::new("guest", "guest")),
        ];
        let picked = pick_sasl_mechanism(&client, "PLAIN AMQPLAIN").unwrap();
        assert_eq!(picked.mechanism(), "PLAIN");

        let picked = pick_sasl_mechanism(&client, "EXTERNAL PLAIN").unwrap();
        assert_eq!(picked.mechanism(), "EXTERNAL");

        assert!(pick_sasl_mechanism(&client, "SCRAM-SHA-256").is_none());
    }
}
