//! Error types for Resumer core

use resumer_types::FailureKind;
use thiserror::Error;

/// Errors that can occur during a single download attempt
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Probe failed: {0}")]
    Probe(String),

    #[error("Server reported a zero or missing content length")]
    ZeroLength,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stream error: {0}")]
    Stream(std::io::Error),

    #[error("Range not honored: requested offset {requested}, server answered {status}")]
    UnsupportedRange { requested: u64, status: String },

    #[error("Length mismatch: expected at most {expected} bytes, got {actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    #[error("Local file holds {local} bytes but the remote resource has {remote}")]
    LocalFileTooLarge { local: u64, remote: u64 },

    #[error("Timeout")]
    Timeout,

    #[error("Settings error: {0}")]
    Settings(String),
}

impl TransferError {
    /// Collapse into the coarse kind reported to observers
    pub fn kind(&self) -> FailureKind {
        match self {
            TransferError::Probe(_) | TransferError::ZeroLength => FailureKind::Probe,
            TransferError::Network(e) if e.is_timeout() => FailureKind::Timeout,
            TransferError::Stream(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                FailureKind::Timeout
            }
            TransferError::Network(_)
            | TransferError::Stream(_)
            | TransferError::LengthMismatch { .. } => FailureKind::Transfer,
            TransferError::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                FailureKind::Timeout
            }
            TransferError::Io(_)
            | TransferError::LocalFileTooLarge { .. }
            | TransferError::Settings(_) => FailureKind::Io,
            TransferError::UnsupportedRange { .. } => FailureKind::UnsupportedRange,
            TransferError::Timeout => FailureKind::Timeout,
        }
    }
}

impl From<TransferError> for String {
    fn from(error: TransferError) -> Self {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_collapse_as_expected() {
        assert_eq!(TransferError::ZeroLength.kind(), FailureKind::Probe);
        assert_eq!(TransferError::Timeout.kind(), FailureKind::Timeout);
        assert_eq!(
            TransferError::LengthMismatch { expected: 1, actual: 2 }.kind(),
            FailureKind::Transfer
        );
        assert_eq!(
            TransferError::UnsupportedRange { requested: 5, status: "416".into() }.kind(),
            FailureKind::UnsupportedRange
        );
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(TransferError::from(io).kind(), FailureKind::Io);
        let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert_eq!(TransferError::from(timed_out).kind(), FailureKind::Timeout);
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert_eq!(TransferError::Stream(reset).kind(), FailureKind::Transfer);
    }
}
