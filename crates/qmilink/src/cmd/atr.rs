use crate::cmd::{AtrArgs, Session};
use crate::exit::{client_error, CliError, CliResult, TIMEOUT};

pub fn run(args: AtrArgs) -> CliResult<i32> {
    let session = Session::open(&args.device)?;

    let settled = session
        .sap
        .connect(Some(args.timeout))
        .map_err(|err| client_error("connect failed", err))?;
    if !settled {
        return Err(CliError::new(TIMEOUT, "SAP connection did not settle"));
    }

    let atr = session
        .sap
        .atr()
        .map_err(|err| client_error("ATR request failed", err))?;
    println!("{}", hex::encode(atr));

    let _ = session.sap.disconnect(Some(args.timeout));
    Ok(session.close())
}
