//! Errors surfaced by connections and channels

use std::{fmt::Display, io, sync::Arc};

use amqp091_types::{reply_code::is_soft_code, ReplyCode};

use crate::frames;

/// An AMQP exception, raised by the server through `connection.close`/`channel.close` or
/// raised locally when the client detects a protocol violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    /// Reply code
    pub code: u16,

    /// Human readable reason
    pub reason: String,

    /// `true` if the server raised the exception
    pub server: bool,

    /// `true` if the exception only affects a channel and the connection is still usable
    pub recover: bool,
}

impl Exception {
    /// An exception raised by the server
    pub fn from_server(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            server: true,
            recover: is_soft_code(code),
        }
    }

    pub(crate) fn local(code: ReplyCode, reason: impl Into<String>) -> Self {
        let code = u16::from(code);
        Self {
            code,
            reason: reason.into(),
            server: false,
            recover: is_soft_code(code),
        }
    }

    /// The standard reply code, if the code is one
    pub fn reply_code(&self) -> Option<ReplyCode> {
        ReplyCode::try_from(self.code).ok()
    }

    /// Whether the exception is a soft error that only closed a channel
    pub fn is_recoverable(&self) -> bool {
        self.recover
    }

    /// Whether retrying the same operation can succeed (`content-too-large` only)
    pub fn is_retryable(&self) -> bool {
        self.code == u16::from(ReplyCode::ContentTooLarge)
    }
}

impl Display for Exception {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Exception ({}) Reason: {:?}", self.code, self.reason)
    }
}

impl std::error::Error for Exception {}

/// Errors returned by connection and channel operations
///
/// The type is cheap to clone so that one shutdown reason can be handed to every waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The connection or channel is closed
    #[error("Connection or channel is closed")]
    Closed,

    /// An exception closed the connection or channel
    #[error(transparent)]
    Exception(#[from] Exception),

    /// IO error on the underlying stream
    #[error("IO error: {0}")]
    Io(Arc<io::Error>),

    /// The byte stream could not be framed
    #[error("Framing error: {0}")]
    Frame(Arc<frames::Error>),

    /// A method argument or content could not be encoded
    #[error(transparent)]
    Codec(#[from] amqp091_types::Error),

    /// The peer stopped responding within the heartbeat interval
    #[error("Missed heartbeats")]
    MissedHeartbeats,

    /// The wait was cancelled
    #[error("Cancelled")]
    Cancelled,

    /// The wait did not complete in time
    #[error("Timed out")]
    Timeout,

    /// The delivery did not come from a channel and cannot be acknowledged
    #[error("Delivery not initialized")]
    NotInitialized,

    /// Every channel id up to the negotiated maximum is in use
    #[error("Channel id space exhausted")]
    ChannelMaxReached,

    /// A reply did not match the request that was sent
    #[error("Unexpected reply {0}")]
    UnexpectedReply(&'static str),
}

impl Error {
    /// The reply code that best describes the error
    pub fn reply_code(&self) -> Option<u16> {
        let code = match self {
            Error::Closed => ReplyCode::ChannelError,
            Error::Exception(ex) => return Some(ex.code),
            Error::Io(_) | Error::MissedHeartbeats => ReplyCode::ConnectionForced,
            Error::Frame(_) => ReplyCode::FrameError,
            Error::Codec(_) => ReplyCode::SyntaxError,
            Error::UnexpectedReply(_) => ReplyCode::CommandInvalid,
            Error::ChannelMaxReached => ReplyCode::ResourceError,
            Error::Cancelled | Error::Timeout | Error::NotInitialized => return None,
        };
        Some(code.into())
    }

    /// Whether the connection remains usable after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Exception(ex) => ex.recover,
            _ => false,
        }
    }

    /// Whether retrying the operation that failed can succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Exception(ex) => ex.is_retryable(),
            _ => false,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<frames::Error> for Error {
    fn from(err: frames::Error) -> Self {
        match err {
            frames::Error::Io(err) => Self::Io(Arc::new(err)),
            err => Self::Frame(Arc::new(err)),
        }
    }
}

impl From<amqp091_wire::Error> for Error {
    fn from(err: amqp091_wire::Error) -> Self {
        Self::Codec(err.into())
    }
}
