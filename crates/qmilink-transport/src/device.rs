use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{Result, TransportError};

/// A duplex QMI control device.
///
/// The same path is opened twice — read-only and write-only — so the two
/// halves can be moved onto independent threads, which is how the client
/// engine consumes them.
#[derive(Debug)]
pub struct CdcDevice {
    reader: DeviceReader,
    writer: DeviceWriter,
}

/// The read half of a control device.
#[derive(Debug)]
pub struct DeviceReader {
    inner: File,
}

/// The write half of a control device.
#[derive(Debug)]
pub struct DeviceWriter {
    inner: File,
}

impl CdcDevice {
    /// Open a control device (e.g. `/dev/cdc-wdm0`) for duplex access.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let reader = OpenOptions::new()
            .read(true)
            .open(path)
            .map_err(|source| TransportError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let writer = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|source| TransportError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(?path, "opened control device");

        Ok(Self {
            reader: DeviceReader { inner: reader },
            writer: DeviceWriter { inner: writer },
        })
    }

    /// Split the device into its read and write halves.
    pub fn split(self) -> (DeviceReader, DeviceWriter) {
        (self.reader, self.writer)
    }
}

impl Read for DeviceReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for DeviceWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Well-known default device path on Linux hosts.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/cdc-wdm0";

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn open_missing_device_reports_path() {
        let err = CdcDevice::open("/dev/does-not-exist-qmilink").unwrap_err();
        match err {
            TransportError::Open { path, .. } => {
                assert_eq!(path, PathBuf::from("/dev/does-not-exist-qmilink"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn open_and_split_regular_file() {
        let dir = std::env::temp_dir().join(format!("qmilink-transport-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dev");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let device = CdcDevice::open(&path).unwrap();
        let (mut reader, mut writer) = device.split();

        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);
        writer.write_all(&[9]).unwrap();

        let _ = std::fs::remove_dir_all(&dir);
    }
}
