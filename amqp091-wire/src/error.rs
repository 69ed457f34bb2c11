//! Custom error

/// Errors produced while encoding or decoding field values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Input ended before a fixed-width or length-prefixed value was complete
    #[error("Unexpected end of input, needed {needed} bytes but only {remaining} remain")]
    UnexpectedEof {
        /// Number of bytes the value requires
        needed: usize,

        /// Number of bytes left in the input
        remaining: usize,
    },

    /// The type tag is not part of the field type alphabet
    #[error("Invalid field type tag 0x{0:02x}")]
    InvalidFieldType(u8),

    /// Found invalid UTF-8 encoding
    #[error("Invalid UTF-8 encoding")]
    InvalidUtf8Encoding,

    /// A short string is limited to 255 bytes
    #[error("Short string of {0} bytes exceeds 255 bytes")]
    ShortStringTooLong(usize),

    /// A long string, table or array is limited to `u32::MAX` bytes
    #[error("Value of {0} bytes exceeds the 32-bit length prefix")]
    LongStringTooLong(usize),

    /// More than eight bits were packed into one octet
    #[error("At most 8 bits can be packed into one octet, found {0}")]
    TooManyBits(usize),
}

impl Error {
    pub(crate) fn eof(needed: usize, remaining: usize) -> Self {
        Self::UnexpectedEof { needed, remaining }
    }

    /// Whether the error was raised while checking a value before encoding
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::ShortStringTooLong(_) | Error::LongStringTooLong(_) | Error::TooManyBits(_)
        )
    }

    /// Whether the error was raised while decoding malformed input
    pub fn is_syntax(&self) -> bool {
        !self.is_validation()
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(_: std::string::FromUtf8Error) -> Self {
        Error::InvalidUtf8Encoding
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8Encoding
    }
}
