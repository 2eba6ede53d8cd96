mod cmd;
mod exit;
mod logging;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};

#[derive(Parser, Debug)]
#[command(name = "qmilink", version, about = "QMI modem control CLI")]
struct Cli {
    /// Log output format (stderr).
    #[arg(
        long,
        value_name = "FORMAT",
        env = "QMILINK_LOG_FORMAT",
        default_value = "text",
        global = true
    )]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        env = "QMILINK_LOG_LEVEL",
        default_value = "info",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    match cmd::run(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_apdu_subcommand() {
        let cli = Cli::try_parse_from([
            "qmilink",
            "apdu",
            "/dev/cdc-wdm1",
            "00a40004023f00",
            "--timeout",
            "3s",
        ])
        .expect("apdu args should parse");

        match cli.command {
            Command::Apdu(args) => {
                assert_eq!(args.device.device.to_str(), Some("/dev/cdc-wdm1"));
                assert_eq!(args.apdu, "00a40004023f00");
                assert_eq!(args.timeout, std::time::Duration::from_secs(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn device_path_defaults_when_omitted() {
        let cli = Cli::try_parse_from(["qmilink", "status"]).expect("status args should parse");
        match cli.command {
            Command::Status(args) => {
                assert_eq!(args.device.device.to_str(), Some("/dev/cdc-wdm0"));
                assert_eq!(args.device.slot, 0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_monitor_with_slot() {
        let cli = Cli::try_parse_from(["qmilink", "monitor", "--slot", "1"])
            .expect("monitor args should parse");
        match cli.command {
            Command::Monitor(args) => assert_eq!(args.device.slot, 1),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
