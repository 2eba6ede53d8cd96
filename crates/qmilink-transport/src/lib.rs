//! Character-device transport for QMI control channels.
//!
//! A QMI modem exposes its control channel as a character device
//! (typically `/dev/cdc-wdm*` from the cdc-wdm driver). The device is
//! duplex: it is opened once for reading and once for writing, and each
//! successful read yields exactly one protocol frame.

pub mod device;
pub mod error;

pub use device::{CdcDevice, DeviceReader, DeviceWriter, DEFAULT_DEVICE_PATH};
pub use error::{Result, TransportError};
