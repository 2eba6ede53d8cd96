//! QMI/qmux wire codec.
//!
//! QMI multiplexes logical services over one control device. Every message
//! is framed with:
//! - A 1-byte serial frame marker (0x01)
//! - A qmux header: 2-byte little-endian length, flags, service, client id
//! - A service header: flags, transaction id (1 byte on the Control
//!   service, 2 bytes elsewhere), 2-byte message code
//! - A block of type-length-value parameters
//!
//! This crate is pure encode/decode — no I/O, no protocol state.

pub mod code;
pub mod error;
pub mod message;
pub mod service;
pub mod tlv;

pub use code::ErrorCode;
pub use error::{Result, WireError};
pub use message::{Message, FLAG_INDICATION, FRAME_MARKER, QMUX_FLAGS_INBOUND};
pub use service::Service;
pub use tlv::Tlvs;
