use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use qmilink_wire::{Message, Service, WireError};
use tracing::debug;

use crate::client::{lock, Client};
use crate::error::{ClientError, Result};

/// UIM service: SAP connection management (connect/disconnect/status).
const UIM_SAP_CONNECTION: u16 = 60;

/// UIM service: SAP card requests (ATR, APDU, power, reset).
const UIM_SAP_REQUEST: u16 = 61;

/// UIM service: unsolicited SAP connection status indication.
const UIM_SAP_CONNECTION_EVENT: u16 = 62;

// UIM_SAP_CONNECTION request codes.
const OP_DISCONNECT: u8 = 0;
const OP_CONNECT: u8 = 1;
const OP_STATUS: u8 = 2;

// UIM_SAP_REQUEST request codes.
const REQ_ATR: u8 = 0;
const REQ_APDU: u8 = 1;
const REQ_RESET: u8 = 4;

/// SAP connection state for one card slot.
///
/// Updated only by indication delivery; read by callers waiting on
/// connect/disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    NotEnabled,
    Connecting,
    ConnectedSuccessfully,
    ConnectionError,
    Disconnecting,
    DisconnectedSuccessfully,
}

impl ConnectionStatus {
    /// Look up a status by its on-wire value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::NotEnabled),
            1 => Some(Self::Connecting),
            2 => Some(Self::ConnectedSuccessfully),
            3 => Some(Self::ConnectionError),
            4 => Some(Self::Disconnecting),
            5 => Some(Self::DisconnectedSuccessfully),
            _ => None,
        }
    }
}

/// A client for the QMI SIM Access Profile, scoped to one card slot.
///
/// Connection state is driven entirely by UIM indications: the client
/// filters them on its slot and wakes any caller blocked in
/// [`connect`](SapClient::connect) or [`disconnect`](SapClient::disconnect).
pub struct SapClient {
    client: Arc<Client>,
    slot: u8,
    status: Arc<StatusCell>,
}

struct StatusCell {
    current: Mutex<ConnectionStatus>,
    changed: Condvar,
}

impl StatusCell {
    fn set(&self, status: ConnectionStatus) {
        *lock(&self.current) = status;
        self.changed.notify_all();
    }

    /// Block until the status is in `terminal`, or the timeout elapses.
    /// `None` waits indefinitely. Returns whether a terminal state was
    /// reached.
    fn wait_for(&self, terminal: &[ConnectionStatus], timeout: Option<Duration>) -> bool {
        // A timeout too far out for an Instant degrades to an unbounded wait.
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let mut current = lock(&self.current);

        while !terminal.contains(&*current) {
            match deadline {
                None => {
                    current = self
                        .changed
                        .wait(current)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    let (guard, _) = self
                        .changed
                        .wait_timeout(current, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    current = guard;
                }
            }
        }
        true
    }
}

impl SapClient {
    /// Create a SAP client for `slot` and hook it into the engine's
    /// indication stream.
    pub fn new(client: Arc<Client>, slot: u8) -> Self {
        let status = Arc::new(StatusCell {
            current: Mutex::new(ConnectionStatus::NotEnabled),
            changed: Condvar::new(),
        });

        let cell = Arc::clone(&status);
        client.register_indication_handler(move |msg| {
            if msg.service != Service::Uim || msg.message_code != UIM_SAP_CONNECTION_EVENT {
                return;
            }
            let Some(value) = msg.tlv(0x10) else { return };
            if value.len() < 2 || value[1] != slot {
                return;
            }
            let Some(status) = ConnectionStatus::from_u8(value[0]) else {
                return;
            };
            debug!(slot, ?status, "SAP connection status changed");
            cell.set(status);
        });

        Self {
            client,
            slot,
            status,
        }
    }

    /// The card slot this client is scoped to.
    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// Connect to the SIM. Blocks until the connection settles
    /// (successfully or not) or the timeout elapses; `None` waits
    /// indefinitely. Returns whether a terminal state was reached.
    pub fn connect(&self, timeout: Option<Duration>) -> Result<bool> {
        self.transition(true, timeout)
    }

    /// Disconnect from the SIM. Same blocking contract as
    /// [`connect`](SapClient::connect).
    pub fn disconnect(&self, timeout: Option<Duration>) -> Result<bool> {
        self.transition(false, timeout)
    }

    fn transition(&self, connecting: bool, timeout: Option<Duration>) -> Result<bool> {
        let op = if connecting { OP_CONNECT } else { OP_DISCONNECT };
        self.send_request(UIM_SAP_CONNECTION, op, None)?;

        // Broad terminal sets: an explicit error or neutral state also
        // ends the wait, leaving the timeout for the truly unresolved case.
        let terminal: &[ConnectionStatus] = if connecting {
            &[
                ConnectionStatus::ConnectedSuccessfully,
                ConnectionStatus::ConnectionError,
            ]
        } else {
            &[
                ConnectionStatus::DisconnectedSuccessfully,
                ConnectionStatus::NotEnabled,
            ]
        };

        Ok(self.status.wait_for(terminal, timeout))
    }

    /// Query the connection status directly (not via indication).
    pub fn connection_status(&self) -> Result<ConnectionStatus> {
        let response = self.send_request(UIM_SAP_CONNECTION, OP_STATUS, None)?;
        let value = response.tlv(0x10).ok_or(ClientError::MissingTlv(0x10))?;
        if value.is_empty() {
            return Err(ClientError::MalformedTlv {
                tlv_type: 0x10,
                reason: "status must be one byte",
            });
        }
        ConnectionStatus::from_u8(value[0]).ok_or(ClientError::MalformedTlv {
            tlv_type: 0x10,
            reason: "unknown connection status value",
        })
    }

    /// Reset the SIM card. Fire-and-forget.
    pub fn reset_sim(&self) -> Result<()> {
        let mut msg = Message::new(Service::Uim, UIM_SAP_REQUEST);
        msg.add_tlv(0x01, vec![REQ_RESET, self.slot])?;
        self.client.send_async(msg)
    }

    /// Get the card's ATR. The response parameter is length-prefixed, the
    /// length byte covering itself excluded.
    pub fn atr(&self) -> Result<Vec<u8>> {
        let response = self.send_request(UIM_SAP_REQUEST, REQ_ATR, None)?;
        let value = response.tlv(0x10).ok_or(ClientError::MissingTlv(0x10))?;
        if value.is_empty() {
            return Err(ClientError::MalformedTlv {
                tlv_type: 0x10,
                reason: "ATR must carry a length byte",
            });
        }
        if usize::from(value[0]) != value.len() - 1 {
            return Err(ClientError::MalformedTlv {
                tlv_type: 0x10,
                reason: "ATR length byte disagrees with payload",
            });
        }
        Ok(value[1..].to_vec())
    }

    /// Send a command APDU to the card and return the response APDU.
    ///
    /// An access-denied QMI error propagates as
    /// [`ClientError::Qmi`]; mapping it to a smartcard status word is the
    /// caller's policy.
    pub fn send_apdu(&self, command: &[u8]) -> Result<Vec<u8>> {
        if command.len() + 2 > u16::MAX as usize {
            return Err(WireError::ValueTooLong { len: command.len() }.into());
        }
        let mut value = Vec::with_capacity(2 + command.len());
        value.extend_from_slice(&(command.len() as u16).to_le_bytes());
        value.extend_from_slice(command);

        let response = self.send_request(UIM_SAP_REQUEST, REQ_APDU, Some((0x10, value)))?;

        let payload = response.tlv(0x11).ok_or(ClientError::MissingTlv(0x11))?;
        if payload.len() < 2 {
            return Err(ClientError::MalformedTlv {
                tlv_type: 0x11,
                reason: "APDU response must carry a 2-byte length",
            });
        }
        let declared = usize::from(u16::from_le_bytes([payload[0], payload[1]]));
        if declared != payload.len() - 2 {
            return Err(ClientError::MalformedTlv {
                tlv_type: 0x11,
                reason: "APDU response length disagrees with payload",
            });
        }
        Ok(payload[2..].to_vec())
    }

    /// Send a SAP message carrying `[request_code, slot]` plus an optional
    /// extra parameter, and wait for its response.
    fn send_request(
        &self,
        message_code: u16,
        request_code: u8,
        extra: Option<(u8, Vec<u8>)>,
    ) -> Result<Message> {
        let mut msg = Message::new(Service::Uim, message_code);
        msg.add_tlv(0x01, vec![request_code, self.slot])?;
        if let Some((tlv_type, value)) = extra {
            msg.add_tlv(tlv_type, value)?;
        }
        self.client.send(msg, None)
    }
}
