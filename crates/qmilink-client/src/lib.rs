//! Concurrent QMI client engine, plus a SIM Access Profile client built
//! on top of it.
//!
//! [`Client`] turns a raw duplex device stream into a correlated
//! request/response API: one inbound and one outbound worker thread, a
//! `(client handle, transaction id)` correlation table, lazy per-service
//! client-handle allocation, and ordered fan-out of unsolicited
//! indications. [`SapClient`] layers the SAP connect/disconnect state
//! machine and smartcard-style command exchange on top.

pub mod client;
pub mod error;
pub mod sap;

pub use client::Client;
pub use error::{ClientError, Result};
pub use sap::{ConnectionStatus, SapClient};
