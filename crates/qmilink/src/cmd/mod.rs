use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use qmilink_client::{Client, SapClient};
use qmilink_transport::{CdcDevice, DEFAULT_DEVICE_PATH};

use crate::exit::{client_error, transport_error, CliResult, FAILURE, SUCCESS};

pub mod apdu;
pub mod atr;
pub mod monitor;
pub mod reset;
pub mod status;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Query the SAP connection status.
    Status(StatusArgs),
    /// Connect to the SIM and print its answer-to-reset.
    Atr(AtrArgs),
    /// Connect to the SIM and exchange one command APDU.
    Apdu(ApduArgs),
    /// Reset the SIM card.
    Reset(ResetArgs),
    /// Print unsolicited indications until interrupted.
    Monitor(MonitorArgs),
}

pub fn run(command: Command) -> CliResult<i32> {
    match command {
        Command::Status(args) => status::run(args),
        Command::Atr(args) => atr::run(args),
        Command::Apdu(args) => apdu::run(args),
        Command::Reset(args) => reset::run(args),
        Command::Monitor(args) => monitor::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// QMI control device.
    #[arg(default_value = DEFAULT_DEVICE_PATH)]
    pub device: PathBuf,
    /// SIM card slot.
    #[arg(long, default_value = "0")]
    pub slot: u8,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
}

#[derive(Args, Debug)]
pub struct AtrArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Maximum time to wait for the SAP connection (e.g. 5s, 500ms).
    #[arg(long, value_parser = parse_timeout, default_value = "10s")]
    pub timeout: Duration,
}

#[derive(Args, Debug)]
#[command(allow_missing_positional = true)]
pub struct ApduArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Command APDU as hex (e.g. 00a40004023f00).
    pub apdu: String,
    /// Maximum time to wait for the SAP connection (e.g. 5s, 500ms).
    #[arg(long, value_parser = parse_timeout, default_value = "10s")]
    pub timeout: Duration,
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
}

/// An open device with a started engine and a slot-scoped SAP client.
pub struct Session {
    pub client: Arc<Client>,
    pub sap: SapClient,
}

impl Session {
    pub fn open(args: &DeviceArgs) -> CliResult<Self> {
        let device =
            CdcDevice::open(&args.device).map_err(|err| transport_error("open failed", err))?;
        let (reader, writer) = device.split();

        let client = Arc::new(Client::new(reader, writer));
        client
            .start()
            .map_err(|err| client_error("start failed", err))?;
        let sap = SapClient::new(Arc::clone(&client), args.slot);
        Ok(Self { client, sap })
    }

    /// Release handles and stop the engine. A failed release is already
    /// logged; it only shows in the exit code.
    pub fn close(self) -> i32 {
        if self.client.stop() {
            FAILURE
        } else {
            SUCCESS
        }
    }
}

impl Drop for Session {
    // Commands bail with `?` on failure; the device still gets its
    // handles released. Stopping an already stopped engine is a no-op.
    fn drop(&mut self) {
        let _ = self.client.stop();
    }
}

/// Upper bound for `--timeout`; a modem that has not answered within an
/// hour never will.
const MAX_TIMEOUT: Duration = Duration::from_secs(3600);

/// Parse a human-readable timeout: `10s`, `500ms`, or bare seconds.
pub fn parse_timeout(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let (digits, unit_ms) = match input.strip_suffix("ms") {
        Some(digits) => (digits, 1u64),
        None => (input.strip_suffix('s').unwrap_or(input), 1000),
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("not a timeout: {input:?}"))?;
    if value == 0 {
        return Err(String::from("timeout must be greater than zero"));
    }

    value
        .checked_mul(unit_ms)
        .map(Duration::from_millis)
        .filter(|timeout| *timeout <= MAX_TIMEOUT)
        .ok_or_else(|| format!("timeout larger than {}s", MAX_TIMEOUT.as_secs()))
}
