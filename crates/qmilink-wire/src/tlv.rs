use std::collections::btree_map;
use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};

/// Per-record overhead: 1-byte type + 2-byte length.
const RECORD_HEADER: usize = 3;

/// The keyed parameter set of a message.
///
/// Each record is `[type u8][len u16 LE][value]`. Types are unique within a
/// message — inserting a duplicate type replaces the earlier value, and when
/// decoding, the last record of a type wins. The value bytes carry no
/// semantics at this layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tlvs {
    entries: BTreeMap<u8, Bytes>,
}

impl Tlvs {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter, replacing any previous value of the same type.
    ///
    /// Fails if the value cannot be represented by the 16-bit length field.
    pub fn insert(&mut self, tlv_type: u8, value: impl Into<Bytes>) -> Result<()> {
        let value = value.into();
        if value.len() > u16::MAX as usize {
            return Err(WireError::ValueTooLong { len: value.len() });
        }
        self.entries.insert(tlv_type, value);
        Ok(())
    }

    /// Get a parameter value by type.
    pub fn get(&self, tlv_type: u8) -> Option<&[u8]> {
        self.entries.get(&tlv_type).map(|value| value.as_ref())
    }

    /// Number of parameters in the set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(type, value)` pairs in type order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &[u8])> {
        self.entries
            .iter()
            .map(|(tlv_type, value)| (*tlv_type, value.as_ref()))
    }

    /// Total encoded size of all records.
    pub fn encoded_len(&self) -> usize {
        self.entries
            .values()
            .map(|value| RECORD_HEADER + value.len())
            .sum()
    }

    /// Append all records to `dst`.
    pub(crate) fn encode(&self, dst: &mut BytesMut) {
        for (tlv_type, value) in &self.entries {
            dst.put_u8(*tlv_type);
            dst.put_u16_le(value.len() as u16);
            dst.put_slice(value);
        }
    }

    /// Read records from `src` until exactly `declared` bytes are consumed.
    pub(crate) fn decode(src: &mut &[u8], declared: usize) -> Result<Self> {
        let mut entries = BTreeMap::new();
        let mut consumed = 0usize;

        while consumed < declared {
            if src.remaining() < RECORD_HEADER {
                return Err(WireError::Truncated);
            }
            let tlv_type = src.get_u8();
            let len = src.get_u16_le() as usize;
            consumed += RECORD_HEADER + len;
            if consumed > declared {
                return Err(WireError::TlvOverrun { declared });
            }
            if src.remaining() < len {
                return Err(WireError::Truncated);
            }
            entries.insert(tlv_type, src.copy_to_bytes(len));
        }

        Ok(Self { entries })
    }
}

impl<'a> IntoIterator for &'a Tlvs {
    type Item = (&'a u8, &'a Bytes);
    type IntoIter = btree_map::Iter<'a, u8, Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
