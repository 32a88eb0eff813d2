use std::io;
use thiserror::Error;

/// Central error type for the ravel engine.
///
/// Everything that can travel down a sender's error channel is one of these.
/// Protocol stages recover the variants they understand (`Unauthorized` to a
/// 401, `ParseMalformed` to a 400); whatever reaches the outermost stage of a
/// session loop terminates that session.
#[derive(Debug, Error)]
pub enum RavelError {
    /// The I/O engine was cancelled; the operation did not complete.
    #[error("i/o engine cancelled")]
    Cancelled,

    /// A ring-submitted socket operation failed with the carried errno.
    #[error("socket operation failed (errno {0})")]
    Io(i32),

    /// Underlying OS error outside the ring (socket setup, ring init).
    #[error("system error: {0}")]
    Sys(#[from] io::Error),

    /// Peer closed the connection. Drives orderly session teardown.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The codec rejected the byte stream.
    #[error("malformed request")]
    ParseMalformed,

    /// An auth middleware rejected the request.
    #[error("unauthorized")]
    Unauthorized,

    /// A user handler panicked or otherwise failed.
    #[error("handler failed: {0}")]
    Handler(String),

    /// Text did not parse as an address or endpoint.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl RavelError {
    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }

    pub fn invalid_address(text: impl Into<String>) -> Self {
        Self::InvalidAddress(text.into())
    }

    /// Errno carried by a failed ring operation, if that is what this is.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Io(code) => Some(*code),
            _ => None,
        }
    }
}

pub type RavelResult<T> = Result<T, RavelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_is_surfaced() {
        assert_eq!(RavelError::Io(libc::ECONNRESET).errno(), Some(libc::ECONNRESET));
        assert_eq!(RavelError::Cancelled.errno(), None);
    }

    #[test]
    fn io_error_converts() {
        let err: RavelError = io::Error::from_raw_os_error(libc::EMFILE).into();
        assert!(matches!(err, RavelError::Sys(_)));
    }
}
