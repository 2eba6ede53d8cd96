use crate::cmd::{ApduArgs, Session};
use crate::exit::{client_error, CliError, CliResult, TIMEOUT, USAGE};

pub fn run(args: ApduArgs) -> CliResult<i32> {
    let command = hex::decode(args.apdu.trim())
        .map_err(|err| CliError::new(USAGE, format!("APDU is not valid hex: {err}")))?;
    if command.is_empty() {
        return Err(CliError::new(USAGE, "APDU must not be empty"));
    }

    let session = Session::open(&args.device)?;

    let settled = session
        .sap
        .connect(Some(args.timeout))
        .map_err(|err| client_error("connect failed", err))?;
    if !settled {
        return Err(CliError::new(TIMEOUT, "SAP connection did not settle"));
    }

    let response = session
        .sap
        .send_apdu(&command)
        .map_err(|err| client_error("APDU exchange failed", err))?;
    println!("{}", hex::encode(response));

    let _ = session.sap.disconnect(Some(args.timeout));
    Ok(session.close())
}
