#![allow(dead_code)] // not every test binary uses every helper

//! In-memory modem for engine tests.
//!
//! The cdc-wdm transport contract is frame-per-read: each queued buffer is
//! handed to the client in exactly one `read` call. Frames written by the
//! client carry the host-to-device qmux flags byte; the modem stamps the
//! device-to-host value before decoding, and on everything it sends back,
//! exactly as the real endpoint does.

use std::io::{Read, Write};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use qmilink_wire::{Message, Service, FLAG_INDICATION, QMUX_FLAGS_INBOUND};

pub struct ClientReader {
    rx: Receiver<Vec<u8>>,
}

pub struct ClientWriter {
    tx: Sender<Vec<u8>>,
}

impl Read for ClientReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.rx.recv() {
            Ok(frame) => {
                assert!(frame.len() <= buf.len(), "frame larger than read buffer");
                buf[..frame.len()].copy_from_slice(&frame);
                Ok(frame.len())
            }
            Err(_) => Ok(0), // modem gone: EOF
        }
    }
}

impl Write for ClientWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.tx
            .send(buf.to_vec())
            .map_err(|_| std::io::Error::from(std::io::ErrorKind::BrokenPipe))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// The device end of the pair: sees every frame the client writes, and can
/// push frames (responses, indications) back.
pub struct Modem {
    from_client: Receiver<Vec<u8>>,
    to_client: Sender<Vec<u8>>,
}

pub fn device_pair() -> (ClientReader, ClientWriter, Modem) {
    let (to_client, client_rx) = channel();
    let (client_tx, from_client) = channel();
    (
        ClientReader { rx: client_rx },
        ClientWriter { tx: client_tx },
        Modem {
            from_client,
            to_client,
        },
    )
}

fn decode_outbound(frame: &[u8]) -> Message {
    let mut frame = frame.to_vec();
    frame[3] = QMUX_FLAGS_INBOUND;
    Message::decode(&frame).expect("client wrote an undecodable frame")
}

fn encode_inbound(msg: &Message) -> Vec<u8> {
    let mut frame = msg.encode().expect("unencodable modem frame").to_vec();
    frame[3] = QMUX_FLAGS_INBOUND;
    frame
}

impl Modem {
    /// Receive the next frame the client wrote. Panics after 5 s of
    /// silence; returns `None` once the client is gone.
    pub fn recv(&self) -> Option<Message> {
        match self.from_client.recv_timeout(Duration::from_secs(5)) {
            Ok(frame) => Some(decode_outbound(&frame)),
            Err(RecvTimeoutError::Disconnected) => None,
            Err(RecvTimeoutError::Timeout) => panic!("modem: no frame within 5s"),
        }
    }

    /// Receive with an explicit deadline; `None` on timeout or hangup.
    pub fn recv_within(&self, timeout: Duration) -> Option<Message> {
        self.from_client
            .recv_timeout(timeout)
            .ok()
            .map(|frame| decode_outbound(&frame))
    }

    /// Queue one frame for the client; one frame per client read.
    pub fn send(&self, msg: &Message) {
        let _ = self.to_client.send(encode_inbound(msg));
    }

    /// Queue raw bytes as one physical read.
    pub fn send_raw(&self, frame: Vec<u8>) {
        let _ = self.to_client.send(frame);
    }

    /// Run a request handler on its own thread until the client hangs up.
    /// Every message the handler returns is sent back in order.
    pub fn serve(
        self,
        mut handler: impl FnMut(&Message) -> Vec<Message> + Send + 'static,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            while let Ok(frame) = self.from_client.recv() {
                let request = decode_outbound(&frame);
                for msg in handler(&request) {
                    if self.to_client.send(encode_inbound(&msg)).is_err() {
                        return;
                    }
                }
            }
        })
    }
}

/// A success response echoing the request's routing fields.
pub fn success_response(request: &Message) -> Message {
    let mut resp = Message::new(request.service, request.message_code);
    resp.client_id = request.client_id;
    resp.tx_id = request.tx_id;
    resp.add_tlv(0x02, vec![0, 0, 0, 0]).unwrap();
    resp
}

/// An error response carrying a QMI error value.
pub fn error_response(request: &Message, code: u16) -> Message {
    let mut resp = Message::new(request.service, request.message_code);
    resp.client_id = request.client_id;
    resp.tx_id = request.tx_id;
    let [lo, hi] = code.to_le_bytes();
    resp.add_tlv(0x02, vec![1, 0, lo, hi]).unwrap();
    resp
}

/// An unsolicited indication carrying one parameter.
pub fn indication(service: Service, message_code: u16, tlv_type: u8, value: Vec<u8>) -> Message {
    let mut msg = Message::new(service, message_code);
    msg.flags = FLAG_INDICATION;
    msg.add_tlv(tlv_type, value).unwrap();
    msg
}

/// Client handle granted for a service by [`housekeeping`].
pub fn granted_handle(service: Service) -> u8 {
    service.code().wrapping_add(0x10)
}

/// Stock handling for the engine's own traffic: handle allocation
/// (granting a predictable handle per service), handle release, and the
/// UIM event registration. Returns `None` for anything else.
pub fn housekeeping(request: &Message) -> Option<Vec<Message>> {
    match (request.service, request.message_code) {
        (Service::Control, 0x22) => {
            let service = request.tlv(0x01).expect("allocate without service tlv")[0];
            let mut resp = success_response(request);
            resp.add_tlv(0x01, vec![service, service.wrapping_add(0x10)])
                .unwrap();
            Some(vec![resp])
        }
        (Service::Control, 0x23) => Some(vec![success_response(request)]),
        (Service::Uim, 46) => Some(vec![success_response(request)]),
        _ => None,
    }
}
