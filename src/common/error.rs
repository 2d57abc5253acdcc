//! Unified error type for lock operations.

use std::fmt;

/// Coarse classification of a [`LockError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidBuffer,
    InvalidTimeout,
    InvalidArgument,
    AcquisitionTimedOut,
    WaitInterrupted,
    NotLocked,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidBuffer => "invalid buffer",
            ErrorKind::InvalidTimeout => "invalid timeout",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::AcquisitionTimedOut => "acquisition timed out",
            ErrorKind::WaitInterrupted => "wait interrupted",
            ErrorKind::NotLocked => "not locked",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for every fallible operation in this crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockError {
    /// Region has the wrong element type, too little capacity, or private backing memory.
    InvalidBuffer(String),
    /// Timeout is negative or not a number.
    InvalidTimeout(String),
    /// Missing or malformed argument (e.g. an empty identifier).
    InvalidArgument(String),
    /// The deadline elapsed while contending. Carries the rendered timeout (`"10ms"`).
    AcquisitionTimedOut { timeout: String },
    /// The wait primitive stopped without a wake, mismatch or timeout.
    WaitInterrupted(String),
    /// Explicit unlock of a word that was not locked.
    NotLocked,
}

impl LockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LockError::InvalidBuffer(_) => ErrorKind::InvalidBuffer,
            LockError::InvalidTimeout(_) => ErrorKind::InvalidTimeout,
            LockError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            LockError::AcquisitionTimedOut { .. } => ErrorKind::AcquisitionTimedOut,
            LockError::WaitInterrupted(_) => ErrorKind::WaitInterrupted,
            LockError::NotLocked => ErrorKind::NotLocked,
        }
    }
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::InvalidBuffer(msg) => write!(f, "invalid lock buffer: {}", msg),
            LockError::InvalidTimeout(msg) => write!(f, "invalid timeout: {}", msg),
            LockError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            LockError::AcquisitionTimedOut { timeout } => {
                write!(f, "failed to acquire lock within {}", timeout)
            }
            LockError::WaitInterrupted(msg) => write!(f, "wait interrupted: {}", msg),
            LockError::NotLocked => write!(f, "cannot unlock: mutex is not locked"),
        }
    }
}

impl std::error::Error for LockError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_embeds_value() {
        let e = LockError::AcquisitionTimedOut { timeout: "10ms".into() };
        assert_eq!(e.kind(), ErrorKind::AcquisitionTimedOut);
        assert!(e.to_string().contains("10ms"));
    }

    #[test]
    fn kinds_are_distinct() {
        assert_eq!(LockError::NotLocked.kind(), ErrorKind::NotLocked);
        assert_eq!(
            LockError::InvalidBuffer("x".into()).kind(),
            ErrorKind::InvalidBuffer
        );
        assert_ne!(ErrorKind::InvalidTimeout, ErrorKind::InvalidArgument);
    }
}
