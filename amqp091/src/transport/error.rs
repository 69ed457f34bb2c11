use std::io;

use crate::frames;

/// Transport error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// Nothing was received within the idle timeout
    #[error("Idle timeout")]
    IdleTimeout,

    /// The byte stream could not be framed
    #[error(transparent)]
    Frame(frames::Error),
}

impl From<frames::Error> for Error {
    fn from(err: frames::Error) -> Self {
        match err {
            frames::Error::Io(err) => Self::Io(err),
            err => Self::Frame(err),
        }
    }
}

impl From<Error> for crate::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => err.into(),
            Error::IdleTimeout => crate::Error::MissedHeartbeats,
            Error::Frame(err) => err.into(),
        }
    }
}
