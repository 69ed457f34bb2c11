//! Errors raised while opening a connection

use std::{convert::Infallible, io};

use crate::{
    error::{Error, Exception},
    frames,
    transport::{self, protocol_header::ProtocolHeader},
    uri,
};

/// Errors raised by [`Builder::open`](super::Builder::open) and
/// [`Builder::open_with_stream`](super::Builder::open_with_stream)
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    /// IO error
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// The URI could not be parsed
    #[error(transparent)]
    Uri(#[from] uri::Error),

    /// The byte stream could not be framed
    #[error(transparent)]
    Frame(frames::Error),

    /// `amqps` was requested but no TLS feature is enabled
    #[error("TLS is not enabled, enable the \"rustls\" or \"native-tls\" feature")]
    TlsNotEnabled,

    /// The domain is not a valid TLS server name
    #[error("Invalid domain {0:?}")]
    InvalidDomain(String),

    /// The TLS handshake failed
    #[error("TLS error: {0}")]
    Tls(String),

    /// The handshake did not finish within the connection timeout
    #[error("Connection timed out")]
    Timeout,

    /// The server refused the protocol version and offered its own
    #[error("Server does not support AMQP 0-9-1, offered {0}")]
    ProtocolHeaderMismatch(ProtocolHeader),

    /// `connection.start` announced a version other than 0-9
    #[error("Unsupported protocol version {major}-{minor}")]
    ProtocolVersion {
        /// Major version announced by the server
        major: u8,

        /// Minor version announced by the server
        minor: u8,
    },

    /// None of the client's SASL mechanisms is offered by the server
    #[error("SASL mechanism not supported, server offers {0:?}")]
    SaslMechanismNotSupported(String),

    /// The server sent a frame the handshake does not allow at this point
    #[error("Unexpected frame during handshake, expecting {0}")]
    UnexpectedFrame(&'static str),

    /// The server closed the connection during the handshake, e.g. `403 ACCESS_REFUSED`
    #[error(transparent)]
    Exception(#[from] Exception),

    /// The server closed the stream during the handshake
    #[error("Connection closed during handshake")]
    Closed,
}

impl From<Infallible> for OpenError {
    fn from(err: Infallible) -> Self {
        match err {}
    }
}

impl From<frames::Error> for OpenError {
    fn from(err: frames::Error) -> Self {
        match err {
            frames::Error::Io(err) => Self::Io(err),
            frames::Error::ProtocolHeaderMismatch(buf) => match ProtocolHeader::parse(buf) {
                Some(header) => Self::ProtocolHeaderMismatch(header),
                None => Self::Frame(frames::Error::ProtocolHeaderMismatch(buf)),
            },
            err => Self::Frame(err),
        }
    }
}

impl From<transport::Error> for OpenError {
    fn from(err: transport::Error) -> Self {
        match err {
            transport::Error::Io(err) => Self::Io(err),
            transport::Error::IdleTimeout => Self::Timeout,
            transport::Error::Frame(err) => err.into(),
        }
    }
}

impl From<Error> for OpenError {
    fn from(err: Error) -> Self {
        match err {
            Error::Exception(ex) => Self::Exception(ex),
            Error::Timeout => Self::Timeout,
            Error::Io(err) => Self::Io(io::Error::new(err.kind(), err.to_string())),
            _ => Self::Closed,
        }
    }
}
