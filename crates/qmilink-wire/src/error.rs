/// Errors that can occur while encoding or decoding QMI messages.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// First byte of the frame was not the 0x01 serial frame marker.
    #[error("bad frame marker {0:#04x}")]
    BadFrameMarker(u8),

    /// The qmux length field disagrees with the size of the physical read.
    #[error("frame length mismatch: header says {declared}, frame has {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// The qmux flags byte was not the expected device-to-host value.
    #[error("unexpected qmux flags {0:#04x}")]
    UnexpectedQmuxFlags(u8),

    /// The frame ended before the message was fully parsed.
    #[error("message truncated")]
    Truncated,

    /// A parameter record runs past the declared parameter-block length.
    #[error("parameter block overruns its declared length of {declared} bytes")]
    TlvOverrun { declared: usize },

    /// Bytes were left over after the declared message content.
    #[error("{trailing} bytes left after message body")]
    TrailingBytes { trailing: usize },

    /// A parameter value is too large for its 16-bit length field.
    #[error("parameter value of {len} bytes exceeds 16-bit length field")]
    ValueTooLong { len: usize },

    /// The encoded message is too large for the 16-bit frame length field.
    #[error("encoded message of {len} bytes exceeds 16-bit frame length")]
    MessageTooLarge { len: usize },
}

pub type Result<T> = std::result::Result<T, WireError>;
