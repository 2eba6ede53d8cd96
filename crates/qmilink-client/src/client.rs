use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use qmilink_wire::{ErrorCode, Message, Service};
use tracing::{debug, error, warn};

use crate::error::{ClientError, Result};

/// One device read yields one frame; libqmi sizes its read buffer at 2k.
const READ_BUFFER_SIZE: usize = 2048;

/// Mandatory result parameter present in every response.
const RESULT_TLV: u8 = 0x02;

/// Control service: allocate a client handle for a service.
const CTL_ALLOCATE_CLIENT: u16 = 0x22;

/// Control service: release a previously allocated client handle.
const CTL_RELEASE_CLIENT: u16 = 0x23;

/// UIM service: register for unsolicited event indications.
const UIM_REGISTER_EVENTS: u16 = 46;

/// Event mask selecting card status indications.
const UIM_CARD_STATUS_EVENTS: u8 = 0x07;

/// Bounded wait for each handle release during shutdown.
const RELEASE_TIMEOUT: Duration = Duration::from_millis(2500);

type ResponseCallback = Box<dyn FnOnce(Message) + Send>;
type IndicationHandler = Box<dyn Fn(&Message) + Send + Sync>;

enum Outbound {
    Frame { msg: Message, frame: Bytes },
    Shutdown,
}

/// A QMI client engine.
///
/// Owns the duplex device stream and, once [`start`](Client::start)ed, runs
/// one inbound and one outbound worker thread. Requests are correlated to
/// responses by `(client handle, transaction id)`; unsolicited indications
/// fan out to every registered handler. Client handles for non-Control
/// services are allocated lazily on first use and released on
/// [`stop`](Client::stop).
pub struct Client {
    shared: Arc<Shared>,
    outbound: mpsc::Sender<Outbound>,
    io: Mutex<Option<Io>>,
    workers: Mutex<Workers>,
}

struct Io {
    reader: Box<dyn Read + Send>,
    writer: Box<dyn Write + Send>,
    queue: mpsc::Receiver<Outbound>,
}

#[derive(Default)]
struct Workers {
    inbound: Option<JoinHandle<()>>,
    outbound: Option<JoinHandle<()>>,
}

struct Shared {
    /// Correlation table: `(client, txid)` key to one-shot callback.
    pending: Mutex<HashMap<u32, ResponseCallback>>,
    /// Indication fan-out, in registration order. Append-only.
    handlers: RwLock<Vec<IndicationHandler>>,
    /// Allocated client handles per service. Not used for Control.
    handles: Mutex<HashMap<Service, u8>>,
    next_tx_id: AtomicU16,
    stopping: AtomicBool,
    /// Set by the inbound loop when it exits; guarded by `pending`'s lock
    /// wherever the two must be consistent.
    dead: AtomicBool,
    fault: Mutex<Option<ClientError>>,
}

impl Shared {
    fn park_fault(&self, err: ClientError) {
        error!(error = %err, "client fault");
        let mut fault = lock(&self.fault);
        if fault.is_none() {
            *fault = Some(err);
        }
    }
}

/// Poison-tolerant lock: a panicked handler must not wedge shutdown.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Client {
    /// Create a client over a duplex byte stream.
    ///
    /// Nothing is read or written until [`start`](Client::start).
    pub fn new(
        reader: impl Read + Send + 'static,
        writer: impl Write + Send + 'static,
    ) -> Self {
        let (outbound, queue) = mpsc::channel();
        Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(HashMap::new()),
                handlers: RwLock::new(Vec::new()),
                handles: Mutex::new(HashMap::new()),
                next_tx_id: AtomicU16::new(1),
                stopping: AtomicBool::new(false),
                dead: AtomicBool::new(false),
                fault: Mutex::new(None),
            }),
            outbound,
            io: Mutex::new(Some(Io {
                reader: Box::new(reader),
                writer: Box::new(writer),
                queue,
            })),
            workers: Mutex::new(Workers::default()),
        }
    }

    /// Start the inbound and outbound worker threads.
    ///
    /// Calling `start` more than once is a no-op.
    pub fn start(&self) -> Result<()> {
        let Some(io) = lock(&self.io).take() else {
            return Ok(());
        };

        let shared = Arc::clone(&self.shared);
        let inbound = thread::Builder::new()
            .name("qmi-inbound".into())
            .spawn(move || inbound_loop(io.reader, shared))?;

        let shared = Arc::clone(&self.shared);
        let outbound = thread::Builder::new()
            .name("qmi-outbound".into())
            .spawn(move || outbound_loop(io.writer, io.queue, shared))?;

        let mut workers = lock(&self.workers);
        workers.inbound = Some(inbound);
        workers.outbound = Some(outbound);
        Ok(())
    }

    /// Stop the client: release every allocated handle (bounded wait each,
    /// failures logged, never fatal), then stop the worker loops.
    ///
    /// Returns true if any release failed.
    pub fn stop(&self) -> bool {
        self.shared.stopping.store(true, Ordering::SeqCst);
        let had_errors = self.release_handles();
        let _ = self.outbound.send(Outbound::Shutdown);

        let mut workers = lock(&self.workers);
        if let Some(worker) = workers.outbound.take() {
            let _ = worker.join();
        }
        // The inbound loop exits once the correlation table drains or the
        // stream ends. If the device is silent after a timed-out release
        // the loop may still be parked in read(); joining it here would
        // hang shutdown, so it is signalled but not joined.
        workers.inbound.take();

        had_errors
    }

    /// Asynchronously send a message. Any response is dropped.
    pub fn send_async(&self, msg: Message) -> Result<()> {
        self.enqueue(msg, None).map(|_| ())
    }

    /// Asynchronously send a message, invoking `callback` on the inbound
    /// worker thread when the correlated response arrives.
    pub fn send_async_with(
        &self,
        msg: Message,
        callback: impl FnOnce(Message) + Send + 'static,
    ) -> Result<()> {
        self.enqueue(msg, Some(Box::new(callback))).map(|_| ())
    }

    /// Synchronously send a message and wait for its response.
    ///
    /// `timeout` of `None` waits indefinitely. On timeout the pending
    /// entry is cancelled so a late response cannot wake a caller that is
    /// no longer there. The response's result parameter is checked: a
    /// QMI-level error code is raised as [`ClientError::Qmi`].
    pub fn send(&self, msg: Message, timeout: Option<Duration>) -> Result<Message> {
        let (tx, rx) = mpsc::channel();
        let key = self.enqueue(
            msg,
            Some(Box::new(move |response| {
                let _ = tx.send(response);
            })),
        )?;

        let response = match timeout {
            None => rx.recv().map_err(|_| ClientError::Stopped)?,
            Some(timeout) => match rx.recv_timeout(timeout) {
                Ok(response) => response,
                Err(RecvTimeoutError::Timeout) => {
                    lock(&self.shared.pending).remove(&key);
                    return Err(ClientError::Timeout(timeout));
                }
                Err(RecvTimeoutError::Disconnected) => return Err(ClientError::Stopped),
            },
        };

        check_result(&response)?;
        Ok(response)
    }

    /// Register a handler invoked for every inbound indication, on the
    /// inbound worker thread, in registration order.
    ///
    /// There is no per-type filtering and no unregistration; handlers
    /// self-filter on service and message code, and must not block — a
    /// stalled handler stalls all further response delivery.
    pub fn register_indication_handler(
        &self,
        handler: impl Fn(&Message) + Send + Sync + 'static,
    ) {
        self.shared
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(handler));
    }

    /// Take the error that terminated a worker loop, if any.
    pub fn take_fault(&self) -> Option<ClientError> {
        lock(&self.shared.fault).take()
    }

    /// Stamp routing ids, register the callback, and queue the message.
    fn enqueue(&self, mut msg: Message, callback: Option<ResponseCallback>) -> Result<u32> {
        if msg.service != Service::Control {
            msg.client_id = self.client_handle(msg.service)?;
        }

        let raw = self.shared.next_tx_id.fetch_add(1, Ordering::Relaxed);
        // Control carries a 1-byte id on the wire; store what the response
        // can echo so the correlation keys match.
        msg.tx_id = if msg.service == Service::Control {
            u16::from(raw as u8)
        } else {
            raw
        };

        let frame = msg.encode()?;
        let key = correlation_key(msg.client_id, msg.tx_id);

        if let Some(callback) = callback {
            let mut pending = lock(&self.shared.pending);
            if self.shared.dead.load(Ordering::SeqCst)
                && !self.shared.stopping.load(Ordering::SeqCst)
            {
                return Err(ClientError::Stopped);
            }
            pending.insert(key, callback);
        }

        if self.outbound.send(Outbound::Frame { msg, frame }).is_err() {
            lock(&self.shared.pending).remove(&key);
            return Err(ClientError::Stopped);
        }
        Ok(key)
    }

    /// Resolve the client handle for a service, allocating on first use.
    fn client_handle(&self, service: Service) -> Result<u8> {
        let mut first_uim_use = false;
        let handle = {
            let mut handles = lock(&self.shared.handles);
            match handles.get(&service) {
                Some(handle) => *handle,
                None => {
                    let handle = self.allocate(service)?;
                    handles.insert(service, handle);
                    first_uim_use = service == Service::Uim;
                    handle
                }
            }
        };

        // The UIM service wants card-status indications registered as soon
        // as a handle exists. Sent after the cache lock is released — the
        // send re-enters the handle lookup.
        if first_uim_use {
            self.register_uim_events(UIM_CARD_STATUS_EVENTS)?;
        }
        Ok(handle)
    }

    fn allocate(&self, service: Service) -> Result<u8> {
        let mut msg = Message::new(Service::Control, CTL_ALLOCATE_CLIENT);
        msg.add_tlv_u8(0x01, service.code())?;
        let response = self.send(msg, None)?;

        let value = response.tlv(0x01).ok_or(ClientError::MissingTlv(0x01))?;
        if value.len() != 2 {
            return Err(ClientError::MalformedTlv {
                tlv_type: 0x01,
                reason: "allocation grant must be [service, handle]",
            });
        }
        if value[0] != service.code() {
            return Err(ClientError::ServiceMismatch {
                requested: service,
                granted: value[0],
            });
        }

        debug!(service = %service, handle = value[1], "allocated client handle");
        Ok(value[1])
    }

    /// Fire-and-forget registration for unsolicited UIM indications.
    fn register_uim_events(&self, mask: u8) -> Result<()> {
        let mut msg = Message::new(Service::Uim, UIM_REGISTER_EVENTS);
        msg.add_tlv(0x01, vec![mask, 0, 0, 0])?;
        self.send_async(msg)
    }

    /// Release every cached handle. Failures are logged and folded into
    /// the returned flag; every handle is attempted regardless.
    fn release_handles(&self) -> bool {
        let cached: Vec<(Service, u8)> = lock(&self.shared.handles).drain().collect();

        let mut had_errors = false;
        for (service, handle) in cached {
            if let Err(err) = self.release_handle(service, handle) {
                warn!(service = %service, handle, error = %err, "failed releasing client handle");
                had_errors = true;
            }
        }
        had_errors
    }

    fn release_handle(&self, service: Service, handle: u8) -> Result<()> {
        let mut msg = Message::new(Service::Control, CTL_RELEASE_CLIENT);
        msg.add_tlv(0x01, vec![service.code(), handle])?;
        self.send(msg, Some(RELEASE_TIMEOUT)).map(|_| ())
    }
}

fn correlation_key(client_id: u8, tx_id: u16) -> u32 {
    u32::from(client_id) << 16 | u32::from(tx_id)
}

/// Check a response's mandatory result parameter: 4 bytes, first two zero
/// on success, bytes 3-4 a little-endian QMI error value otherwise.
fn check_result(msg: &Message) -> Result<()> {
    let value = msg.tlv(RESULT_TLV).ok_or(ClientError::MissingResult)?;
    if value.len() != 4 {
        return Err(ClientError::InvalidResultLength(value.len()));
    }
    if value[0] != 0 || value[1] != 0 {
        let code = u16::from_le_bytes([value[2], value[3]]);
        return Err(ClientError::Qmi(ErrorCode::from_value(code)));
    }
    Ok(())
}

fn inbound_loop(mut reader: Box<dyn Read + Send>, shared: Arc<Shared>) {
    let mut buf = [0u8; READ_BUFFER_SIZE];

    loop {
        if shared.stopping.load(Ordering::SeqCst) && lock(&shared.pending).is_empty() {
            break;
        }

        let n = match reader.read(&mut buf) {
            Ok(0) => {
                if !shared.stopping.load(Ordering::SeqCst) {
                    shared.park_fault(ClientError::Io(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "device stream closed",
                    )));
                }
                break;
            }
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                shared.park_fault(ClientError::Io(err));
                break;
            }
        };

        // The transport guarantees one frame per read; a frame the codec
        // rejects means the stream is corrupt beyond this point.
        let msg = match Message::decode(&buf[..n]) {
            Ok(msg) => msg,
            Err(err) => {
                shared.park_fault(ClientError::Wire(err));
                break;
            }
        };

        if msg.is_indication() {
            // Indications are not traced.
            for handler in shared
                .handlers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
            {
                handler(&msg);
            }
        } else {
            let callback = lock(&shared.pending).remove(&correlation_key(msg.client_id, msg.tx_id));
            debug!("<< {msg}");
            match callback {
                Some(callback) => callback(msg),
                // Late response racing a cancelled waiter; dropping it here
                // is the idempotent half of pending-entry removal.
                None => debug!("uncorrelated response dropped"),
            }
        }
    }

    debug!("inbound loop stopping");
    // Wake every synchronous caller still parked on the correlation table.
    // `dead` flips under the same lock new entries are added under, so no
    // caller can register after the final drain.
    let mut pending = lock(&shared.pending);
    shared.dead.store(true, Ordering::SeqCst);
    pending.clear();
}

fn outbound_loop(
    mut writer: Box<dyn Write + Send>,
    queue: mpsc::Receiver<Outbound>,
    shared: Arc<Shared>,
) {
    while let Ok(item) = queue.recv() {
        let (msg, frame) = match item {
            Outbound::Shutdown => break,
            Outbound::Frame { msg, frame } => (msg, frame),
        };

        if let Err(err) = writer.write_all(&frame).and_then(|()| writer.flush()) {
            shared.park_fault(ClientError::Io(err));
            break;
        }
        debug!(">> {msg}");
    }

    debug!("outbound loop stopping");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with_result(result: &[u8]) -> Message {
        let mut msg = Message::new(Service::Dms, 0x25);
        msg.add_tlv(RESULT_TLV, result.to_vec()).unwrap();
        msg
    }

    #[test]
    fn result_all_zero_is_success() {
        check_result(&response_with_result(&[0, 0, 0, 0])).unwrap();
    }

    #[test]
    fn result_error_maps_to_named_code() {
        let err = check_result(&response_with_result(&[1, 0, 48, 0])).unwrap_err();
        assert!(matches!(err, ClientError::Qmi(ErrorCode::InvalidArgument)));
    }

    #[test]
    fn result_unknown_code_falls_back() {
        let err = check_result(&response_with_result(&[1, 0, 0x39, 0x30])).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Qmi(ErrorCode::Unrecognized(12345))
        ));
    }

    #[test]
    fn missing_result_is_an_error() {
        let msg = Message::new(Service::Dms, 0x25);
        let err = check_result(&msg).unwrap_err();
        assert!(matches!(err, ClientError::MissingResult));
    }

    #[test]
    fn short_result_is_an_error() {
        let err = check_result(&response_with_result(&[0, 0])).unwrap_err();
        assert!(matches!(err, ClientError::InvalidResultLength(2)));
    }

    #[test]
    fn correlation_key_packs_client_and_txid() {
        assert_eq!(correlation_key(0, 1), 1);
        assert_eq!(correlation_key(2, 0x1234), 0x0002_1234);
        assert_ne!(correlation_key(1, 5), correlation_key(2, 5));
    }
}
