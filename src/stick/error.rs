//! Stick protocol error types.

use std::io;

use thiserror::Error;

/// Errors that can occur while talking to the stick.
#[derive(Error, Debug)]
pub enum StickError {
    /// Operation attempted before a connection was attached.
    #[error("Stick not connected")]
    NotConnected,

    /// INFO handshake reply did not start with the expected magic byte.
    #[error("Protocol version mismatch: expected magic {expected:#04x}, got {got:#04x}")]
    ProtocolVersionMismatch { expected: u8, got: u8 },

    /// Image is taller than the stick can display.
    #[error("Device limit exceeded: image height {height} > {max_pixels} pixels per column")]
    DeviceLimitExceeded { height: usize, max_pixels: u8 },

    /// Caller supplied an out of range or inconsistent argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The stream closed in the middle of a reply.
    #[error("Unexpected end of stream")]
    UnexpectedEndOfStream,

    /// Acknowledged CRC does not match the bytes that were sent.
    #[error("Corrupted transmission: expected crc {expected:#010x}, got {actual:#010x}")]
    CorruptedTransmission { expected: u32, actual: u32 },

    /// The stick answered with a status other than ok.
    #[error("Device nack: status {status:#04x}")]
    DeviceNack { status: u8 },

    /// Transmission stopped cooperatively by the caller.
    #[error("Transmission cancelled")]
    Cancelled,

    /// Read or write did not complete within the transport timeout.
    #[error("Timeout waiting for the stick")]
    Timeout,

    /// Reply is well framed but carries nonsensical values.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Any other transport failure.
    #[error("IO error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for StickError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::UnexpectedEndOfStream,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout,
            _ => Self::Io(err),
        }
    }
}

impl StickError {
    /// Create an invalid argument error with message
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Whether this is the silent, user-initiated stop path.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type for stick protocol operations.
pub type Result<T> = std::result::Result<T, StickError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_kinds_are_classified() {
        let eof: StickError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(eof, StickError::UnexpectedEndOfStream));

        let timed_out: StickError = io::Error::new(io::ErrorKind::TimedOut, "slow").into();
        assert!(matches!(timed_out, StickError::Timeout));

        let would_block: StickError = io::Error::new(io::ErrorKind::WouldBlock, "slow").into();
        assert!(matches!(would_block, StickError::Timeout));

        let broken: StickError = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert!(matches!(broken, StickError::Io(_)));
    }

    #[test]
    fn test_crc_error_message() {
        let err = StickError::CorruptedTransmission {
            expected: 0xDEADBEEF,
            actual: 0x1,
        };
        assert_eq!(
            err.to_string(),
            "Corrupted transmission: expected crc 0xdeadbeef, got 0x00000001"
        );
    }
}
