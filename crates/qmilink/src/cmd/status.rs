use qmilink_client::ConnectionStatus;

use crate::cmd::{Session, StatusArgs};
use crate::exit::{client_error, CliResult};

pub fn run(args: StatusArgs) -> CliResult<i32> {
    let session = Session::open(&args.device)?;

    let status = session
        .sap
        .connection_status()
        .map_err(|err| client_error("status query failed", err))?;
    println!("{}", describe(status));

    Ok(session.close())
}

fn describe(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::NotEnabled => "not enabled",
        ConnectionStatus::Connecting => "connecting",
        ConnectionStatus::ConnectedSuccessfully => "connected",
        ConnectionStatus::ConnectionError => "connection error",
        ConnectionStatus::Disconnecting => "disconnecting",
        ConnectionStatus::DisconnectedSuccessfully => "disconnected",
    }
}
