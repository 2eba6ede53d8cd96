use std::time::Duration;

use qmilink_wire::{ErrorCode, Service, WireError};

/// Errors that can occur in client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Wire-level encode/decode error.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// An I/O error occurred on the device stream.
    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No correlated response arrived within the caller's deadline.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The response carried a QMI-level error in its result parameter.
    #[error("QMI error: {0}")]
    Qmi(ErrorCode),

    /// The response lacks the mandatory result parameter (type 0x02).
    #[error("response is missing the result parameter")]
    MissingResult,

    /// The result parameter is not the mandatory 4 bytes.
    #[error("result parameter has invalid length {0}")]
    InvalidResultLength(usize),

    /// A response lacks a parameter the operation requires.
    #[error("response is missing parameter {0:#04x}")]
    MissingTlv(u8),

    /// A response parameter has the wrong shape for the operation.
    #[error("malformed parameter {tlv_type:#04x}: {reason}")]
    MalformedTlv { tlv_type: u8, reason: &'static str },

    /// Handle allocation echoed a different service than requested.
    #[error("allocation echoed service {granted} instead of {requested}")]
    ServiceMismatch { requested: Service, granted: u8 },

    /// The client's worker loops are not (or no longer) running.
    #[error("client is not running")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, ClientError>;
