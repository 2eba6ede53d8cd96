use std::sync::mpsc;

use qmilink_client::ConnectionStatus;
use qmilink_wire::Service;

use crate::cmd::{MonitorArgs, Session};
use crate::exit::{client_error, CliError, CliResult, INTERNAL};

pub fn run(args: MonitorArgs) -> CliResult<i32> {
    let session = Session::open(&args.device)?;

    session.client.register_indication_handler(|msg| {
        // Card status indications carry [status, slot] in parameter 0x10.
        if msg.service == Service::Uim && msg.message_code == 62 {
            if let Some(value) = msg.tlv(0x10) {
                if value.len() >= 2 {
                    if let Some(status) = ConnectionStatus::from_u8(value[0]) {
                        println!("slot {}: connection status {status:?}", value[1]);
                        return;
                    }
                }
            }
        }
        println!("indication: {msg}");
    });

    // Allocating the UIM handle registers for card status events as a side
    // effect; the status itself is worth a line too.
    let status = session
        .sap
        .connection_status()
        .map_err(|err| client_error("status query failed", err))?;
    println!("slot {}: connection status {status:?}", session.sap.slot());

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;

    let _ = rx.recv();
    Ok(session.close())
}
