use crate::cmd::{ResetArgs, Session};
use crate::exit::{client_error, CliResult};

pub fn run(args: ResetArgs) -> CliResult<i32> {
    let session = Session::open(&args.device)?;

    session
        .sap
        .reset_sim()
        .map_err(|err| client_error("reset failed", err))?;
    println!("reset requested on slot {}", session.sap.slot());

    Ok(session.close())
}
