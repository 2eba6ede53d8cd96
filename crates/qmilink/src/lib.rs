//! QMI modem control over cdc-wdm character devices.
//!
//! qmilink speaks the qmux-framed QMI protocol to a modem's control
//! endpoint: a concurrent request/response engine with lazy client-handle
//! allocation, plus a SIM Access Profile client for smartcard-style access
//! to the SIM.
//!
//! # Crate Structure
//!
//! - [`transport`] — cdc-wdm character device access
//! - [`wire`] — qmux framing, message codec, and TLV parameter store
//! - [`client`] — the client engine and the SAP layer on top of it

/// Re-export transport types.
pub mod transport {
    pub use qmilink_transport::*;
}

/// Re-export wire codec types.
pub mod wire {
    pub use qmilink_wire::*;
}

/// Re-export client engine and SAP types.
pub mod client {
    pub use qmilink_client::*;
}
