use std::io;

/// Errors raised while framing the byte stream
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The frame payload could not be decoded, or a method could not be encoded
    #[error(transparent)]
    Codec(#[from] amqp091_types::Error),

    /// The frame type octet is not one of method, header, body or heartbeat
    #[error("Unknown frame type {0}")]
    UnknownFrameType(u8),

    /// The byte after the payload is not the frame-end octet
    #[error("Invalid frame end octet {0:#04x}")]
    InvalidFrameEnd(u8),

    /// The frame exceeds the negotiated maximum frame size
    #[error("Frame of {size} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge {
        /// Size of the frame including header and frame-end
        size: usize,

        /// Negotiated maximum
        max: usize,
    },

    /// A heartbeat frame with a non-empty payload
    #[error("Heartbeat frame with {0} bytes of payload")]
    HeartbeatPayload(usize),

    /// The payload decoded without consuming every byte the header declared
    #[error("{0} trailing bytes in frame payload")]
    TrailingBytes(usize),

    /// The peer answered with a protocol header, refusing our protocol version
    #[error("Peer does not support the protocol version, offered {0:?}")]
    ProtocolHeaderMismatch([u8; 8]),
}

impl From<amqp091_wire::Error> for Error {
    fn from(err: amqp091_wire::Error) -> Self {
        Self::Codec(err.into())
    }
}
