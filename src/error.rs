//! Error types shared by streams, the reader and the writer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad size/offset, malformed user stream, undersized buffer.
    Argument,
    /// Bad magic, unsupported version, unknown chunk.
    Format,
    /// Underlying stream failure, short read/write, decompression mismatch.
    Io,
    /// Writer used out of order, or stream lacks a required capability.
    Protocol,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("format error: {message}")]
    Format { message: String },

    #[error("chunk {id:?} index {index} not found")]
    ChunkNotFound { id: String, index: usize },

    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("protocol error: {message}")]
    Protocol { message: String },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument { .. } => ErrorKind::Argument,
            Error::Format { .. } | Error::ChunkNotFound { .. } => ErrorKind::Format,
            Error::Io { .. } => ErrorKind::Io,
            Error::Protocol { .. } => ErrorKind::Protocol,
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            message: message.into(),
        }
    }

    pub(crate) fn format(message: impl Into<String>) -> Self {
        Error::Format {
            message: message.into(),
        }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol {
            message: message.into(),
        }
    }

    pub(crate) fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source,
        }
    }

    pub(crate) fn unexpected_eof(what: &str, expected: u64, actual: u64) -> Self {
        Error::io(
            format!("{what}: expected {expected} bytes, got {actual}"),
            std::io::Error::from(std::io::ErrorKind::UnexpectedEof),
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(Error::invalid_argument("x").kind(), ErrorKind::Argument);
        assert_eq!(
            Error::ChunkNotFound {
                id: "A".into(),
                index: 3
            }
            .kind(),
            ErrorKind::Format
        );
        assert_eq!(
            Error::from(std::io::Error::other("boom")).kind(),
            ErrorKind::Io
        );
        assert_eq!(Error::protocol("x").kind(), ErrorKind::Protocol);
    }
}
