use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};
use crate::service::Service;
use crate::tlv::Tlvs;

/// Serial frame marker opening every QMI frame.
pub const FRAME_MARKER: u8 = 0x01;

/// qmux flags value on device-to-host frames.
pub const QMUX_FLAGS_INBOUND: u8 = 0x80;

/// qmux flags value on host-to-device frames.
const QMUX_FLAGS_OUTBOUND: u8 = 0x00;

/// Service-header flag bit marking an unsolicited indication.
pub const FLAG_INDICATION: u8 = 0x04;

/// Fixed header bytes: marker + qmux header + service flags byte.
const FIXED_HEADER: usize = 1 + 5 + 1;

/// A QMI message: a service, a message code, routing ids, and parameters.
///
/// Outbound messages are built by the caller and stamped with client and
/// transaction ids by the engine; inbound messages come out of
/// [`Message::decode`]. Either way a message is plain data — the engine
/// interprets the routing fields, higher layers interpret the parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Target or originating service.
    pub service: Service,
    /// Message code within the service's namespace.
    pub message_code: u16,
    /// Client handle on non-Control services; 0 on Control.
    pub client_id: u8,
    /// Correlation id. Carried as one byte on Control, two elsewhere.
    pub tx_id: u16,
    /// Service-header flags; bit 2 marks an indication.
    pub flags: u8,
    tlvs: Tlvs,
}

impl Message {
    /// Create a message for a service and message code.
    pub fn new(service: Service, message_code: u16) -> Self {
        Self {
            service,
            message_code,
            client_id: 0,
            tx_id: 0,
            flags: 0,
            tlvs: Tlvs::new(),
        }
    }

    /// Add a parameter, replacing any previous value of the same type.
    pub fn add_tlv(&mut self, tlv_type: u8, value: impl Into<Bytes>) -> Result<()> {
        self.tlvs.insert(tlv_type, value)
    }

    /// Add a single-byte parameter.
    pub fn add_tlv_u8(&mut self, tlv_type: u8, value: u8) -> Result<()> {
        self.tlvs.insert(tlv_type, vec![value])
    }

    /// Get a parameter value by type.
    pub fn tlv(&self, tlv_type: u8) -> Option<&[u8]> {
        self.tlvs.get(tlv_type)
    }

    /// The full parameter set.
    pub fn tlvs(&self) -> &Tlvs {
        &self.tlvs
    }

    /// Whether this message is an unsolicited indication.
    pub fn is_indication(&self) -> bool {
        self.flags & FLAG_INDICATION != 0
    }

    /// Encode this message into one wire frame.
    pub fn encode(&self) -> Result<Bytes> {
        let control = self.service == Service::Control;
        let tlv_len = self.tlvs.encoded_len();
        if tlv_len > u16::MAX as usize {
            return Err(WireError::MessageTooLarge {
                len: FIXED_HEADER + tlv_len,
            });
        }

        // marker + qmux header + service flags + txid + message code + tlv length
        let total = FIXED_HEADER + if control { 1 } else { 2 } + 2 + 2 + tlv_len;
        if total - 1 > u16::MAX as usize {
            return Err(WireError::MessageTooLarge { len: total });
        }

        let mut buf = BytesMut::with_capacity(total);
        buf.put_u8(FRAME_MARKER);
        // qmux header; length covers everything after the frame marker,
        // including the length field itself
        buf.put_u16_le((total - 1) as u16);
        buf.put_u8(QMUX_FLAGS_OUTBOUND);
        buf.put_u8(self.service.code());
        buf.put_u8(if control { 0 } else { self.client_id });
        // service header
        buf.put_u8(self.flags);
        if control {
            buf.put_u8(self.tx_id as u8);
        } else {
            buf.put_u16_le(self.tx_id);
        }
        buf.put_u16_le(self.message_code);
        buf.put_u16_le(tlv_len as u16);
        self.tlvs.encode(&mut buf);

        Ok(buf.freeze())
    }

    /// Decode one wire frame, as yielded by a single device read.
    ///
    /// The transport delivers exactly one frame per read, so the frame
    /// must account for every byte of `frame` — trailing bytes mean the
    /// framing and message lengths disagree and the message is rejected.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let mut src = frame;

        if src.remaining() < FIXED_HEADER {
            return Err(WireError::Truncated);
        }

        let marker = src.get_u8();
        if marker != FRAME_MARKER {
            return Err(WireError::BadFrameMarker(marker));
        }

        let declared = src.get_u16_le() as usize;
        if declared != frame.len() - 1 {
            return Err(WireError::LengthMismatch {
                declared,
                actual: frame.len() - 1,
            });
        }

        let qmux_flags = src.get_u8();
        if qmux_flags != QMUX_FLAGS_INBOUND {
            return Err(WireError::UnexpectedQmuxFlags(qmux_flags));
        }

        let service = Service::from_code(src.get_u8());
        let client_id = src.get_u8();
        let flags = src.get_u8();

        let control = service == Service::Control;
        let id_and_header = if control { 1 } else { 2 } + 2 + 2;
        if src.remaining() < id_and_header {
            return Err(WireError::Truncated);
        }
        let tx_id = if control {
            u16::from(src.get_u8())
        } else {
            src.get_u16_le()
        };
        let message_code = src.get_u16_le();

        let tlv_len = src.get_u16_le() as usize;
        let tlvs = Tlvs::decode(&mut src, tlv_len)?;

        if !src.is_empty() {
            return Err(WireError::TrailingBytes {
                trailing: src.len(),
            });
        }

        Ok(Self {
            service,
            message_code,
            client_id,
            tx_id,
            flags,
            tlvs,
        })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} msg={} client={} txid={} flags={}",
            self.service, self.message_code, self.client_id, self.tx_id, self.flags
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Make an encoded frame decodable by stamping the device-to-host
    /// qmux flags value. Host frames carry 0x00 there; the decoder only
    /// ever sees device frames, which carry 0x80.
    fn as_inbound(frame: &Bytes) -> Vec<u8> {
        let mut frame = frame.to_vec();
        frame[3] = QMUX_FLAGS_INBOUND;
        frame
    }

    fn sample() -> Message {
        let mut msg = Message::new(Service::Uim, 61);
        msg.client_id = 2;
        msg.tx_id = 0x1234;
        msg.add_tlv_u8(0x01, 4).unwrap();
        msg.add_tlv(0x10, vec![0x05, 0x00, 0xA0, 0xA4, 0x00]).unwrap();
        msg
    }

    #[test]
    fn round_trip_non_control() {
        let msg = sample();
        let decoded = Message::decode(&as_inbound(&msg.encode().unwrap())).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn round_trip_control() {
        let mut msg = Message::new(Service::Control, 0x22);
        msg.tx_id = 0x5A;
        msg.add_tlv_u8(0x01, 11).unwrap();

        let frame = msg.encode().unwrap();
        // Control carries a 1-byte transaction id.
        assert_eq!(frame.len(), 1 + 5 + 1 + 1 + 2 + 2 + 4);

        let decoded = Message::decode(&as_inbound(&frame)).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn length_field_covers_itself() {
        let frame = sample().encode().unwrap();
        let declared = u16::from_le_bytes([frame[1], frame[2]]) as usize;
        assert_eq!(declared, frame.len() - 1);
    }

    #[test]
    fn control_client_byte_is_zero() {
        let mut msg = Message::new(Service::Control, 0x22);
        msg.client_id = 7; // ignored on the wire
        let frame = msg.encode().unwrap();
        assert_eq!(frame[5], 0);
    }

    #[test]
    fn bad_marker_is_rejected() {
        let mut frame = as_inbound(&sample().encode().unwrap());
        frame[0] = 0x02;
        let err = Message::decode(&frame).unwrap_err();
        assert!(matches!(err, WireError::BadFrameMarker(0x02)));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let mut frame = as_inbound(&sample().encode().unwrap());
        frame[1] = frame[1].wrapping_add(1);
        let err = Message::decode(&frame).unwrap_err();
        assert!(matches!(err, WireError::LengthMismatch { .. }));
    }

    #[test]
    fn wrong_qmux_flags_is_rejected() {
        // As encoded, the frame still carries the host-to-device flags byte.
        let frame = sample().encode().unwrap();
        let err = Message::decode(&frame).unwrap_err();
        assert!(matches!(err, WireError::UnexpectedQmuxFlags(0x00)));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut frame = as_inbound(&sample().encode().unwrap());
        frame.push(0xFF);
        // Keep the qmux length honest so only the tlv accounting disagrees.
        let declared = (frame.len() - 1) as u16;
        frame[1..3].copy_from_slice(&declared.to_le_bytes());

        let err = Message::decode(&frame).unwrap_err();
        assert!(matches!(err, WireError::TrailingBytes { trailing: 1 }));
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let err = Message::decode(&[FRAME_MARKER, 0x00]).unwrap_err();
        assert!(matches!(err, WireError::Truncated));
    }

    #[test]
    fn unknown_service_decodes_to_sentinel() {
        let mut frame = as_inbound(&sample().encode().unwrap());
        frame[4] = 99;
        let decoded = Message::decode(&frame).unwrap();
        assert_eq!(decoded.service, Service::Unknown(99));
    }

    #[test]
    fn indication_bit_comes_from_service_flags() {
        let mut msg = sample();
        assert!(!msg.is_indication());
        msg.flags = FLAG_INDICATION;

        let decoded = Message::decode(&as_inbound(&msg.encode().unwrap())).unwrap();
        assert!(decoded.is_indication());
    }

    #[test]
    fn display_matches_trace_shape() {
        let msg = sample();
        assert_eq!(msg.to_string(), "Uim(11) msg=61 client=2 txid=4660 flags=0");
    }
}
