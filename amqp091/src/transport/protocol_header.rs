//! Implements the protocol header

use std::fmt::Display;

const PROTOCOL_HEADER_PREFIX: &[u8; 4] = b"AMQP";

/// Protocol header
///
/// Sent by the client before any frame. A server that does not accept the version answers with
/// the header it does support and closes the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolHeader {
    /// Protocol id, 0 for AMQP 0-9-1
    pub id: u8,

    /// Major number
    pub major: u8,

    /// Minor number
    pub minor: u8,

    /// Revision number
    pub revision: u8,
}

impl Default for ProtocolHeader {
    fn default() -> Self {
        Self {
            id: 0,
            major: 0,
            minor: 9,
            revision: 1,
        }
    }
}

impl ProtocolHeader {
    /// The AMQP 0-9-1 header
    pub fn amqp091() -> Self {
        Self::default()
    }

    /// Parse a header the peer sent in place of a frame
    pub fn parse(buf: [u8; 8]) -> Option<Self> {
        if &buf[..4] != PROTOCOL_HEADER_PREFIX {
            return None;
        }
        Some(Self {
            id: buf[4],
            major: buf[5],
            minor: buf[6],
            revision: buf[7],
        })
    }
}

impl From<ProtocolHeader> for [u8; 8] {
    fn from(value: ProtocolHeader) -> Self {
        [
            b'A',
            b'M',
            b'Q',
            b'P',
            value.id,
            value.major,
            value.minor,
            value.revision,
        ]
    }
}

impl Display for ProtocolHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AMQP {}-{}-{} (id {})",
            self.major, self.minor, self.revision, self.id
        )
    }
}
