//! Reply codes carried by `connection.close` and `channel.close`

use std::{convert::TryFrom, fmt::Display};

/// Reply codes defined by AMQP 0-9-1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u16)]
pub enum ReplyCode {
    /// Indicates that the method completed successfully
    ReplySuccess = 200,

    /// The client attempted to transfer content larger than the server could accept
    ContentTooLarge = 311,

    /// Returned for a mandatory message that could not be routed
    NoRoute = 312,

    /// Returned for an immediate message with no consumer
    NoConsumers = 313,

    /// An operator intervened to close the connection
    ConnectionForced = 320,

    /// The client tried to work with an unknown virtual host
    InvalidPath = 402,

    /// The client attempted to work with a server entity it has no access to
    AccessRefused = 403,

    /// The client asked for a specific entity that does not exist
    NotFound = 404,

    /// The client attempted to work with a locked entity
    ResourceLocked = 405,

    /// The request failed because a precondition was not met
    PreconditionFailed = 406,

    /// The sender sent a malformed frame
    FrameError = 501,

    /// The sender sent a frame with illegal values
    SyntaxError = 502,

    /// The method was not valid in the current state
    CommandInvalid = 503,

    /// A channel was used that is not open
    ChannelError = 504,

    /// The peer sent a frame it was not expected to send
    UnexpectedFrame = 505,

    /// The server ran out of a resource
    ResourceError = 506,

    /// The method is not permitted
    NotAllowed = 530,

    /// The method is not implemented by the server
    NotImplemented = 540,

    /// The server hit an internal error
    InternalError = 541,
}

impl ReplyCode {
    /// Soft errors close the channel only
    pub fn is_soft(&self) -> bool {
        is_soft_code(*self as u16)
    }

    /// Hard errors close the connection
    pub fn is_hard(&self) -> bool {
        !self.is_soft() && *self != ReplyCode::ReplySuccess
    }

    /// Upper-snake-case name as used by brokers in reply texts
    pub fn name(&self) -> &'static str {
        match self {
            ReplyCode::ReplySuccess => "REPLY_SUCCESS",
            ReplyCode::ContentTooLarge => "CONTENT_TOO_LARGE",
            ReplyCode::NoRoute => "NO_ROUTE",
            ReplyCode::NoConsumers => "NO_CONSUMERS",
            ReplyCode::ConnectionForced => "CONNECTION_FORCED",
            ReplyCode::InvalidPath => "INVALID_PATH",
            ReplyCode::AccessRefused => "ACCESS_REFUSED",
            ReplyCode::NotFound => "NOT_FOUND",
            ReplyCode::ResourceLocked => "RESOURCE_LOCKED",
            ReplyCode::PreconditionFailed => "PRECONDITION_FAILED",
            ReplyCode::FrameError => "FRAME_ERROR",
            ReplyCode::SyntaxError => "SYNTAX_ERROR",
            ReplyCode::CommandInvalid => "COMMAND_INVALID",
            ReplyCode::ChannelError => "CHANNEL_ERROR",
            ReplyCode::UnexpectedFrame => "UNEXPECTED_FRAME",
            ReplyCode::ResourceError => "RESOURCE_ERROR",
            ReplyCode::NotAllowed => "NOT_ALLOWED",
            ReplyCode::NotImplemented => "NOT_IMPLEMENTED",
            ReplyCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

/// Whether a raw reply code is a soft (channel scoped) error
pub fn is_soft_code(code: u16) -> bool {
    matches!(code, 311 | 312 | 313 | 403 | 404 | 405 | 406)
}

impl From<ReplyCode> for u16 {
    fn from(value: ReplyCode) -> Self {
        value as u16
    }
}

impl TryFrom<u16> for ReplyCode {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            200 => ReplyCode::ReplySuccess,
            311 => ReplyCode::ContentTooLarge,
            312 => ReplyCode::NoRoute,
            313 => ReplyCode::NoConsumers,
            320 => ReplyCode::ConnectionForced,
            402 => ReplyCode::InvalidPath,
            403 => ReplyCode::AccessRefused,
            404 => ReplyCode::NotFound,
            405 => ReplyCode::ResourceLocked,
            406 => ReplyCode::PreconditionFailed,
            501 => ReplyCode::FrameError,
            502 => ReplyCode::SyntaxError,
            503 => ReplyCode::CommandInvalid,
            504 => ReplyCode::ChannelError,
            505 => ReplyCode::UnexpectedFrame,
            506 => ReplyCode::ResourceError,
            530 => ReplyCode::NotAllowed,
            540 => ReplyCode::NotImplemented,
            541 => ReplyCode::InternalError,
            _ => return Err(value),
        };
        Ok(code)
    }
}

impl Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), *self as u16)
    }
}
