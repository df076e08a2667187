use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match switchboardd::run_server() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            drop(writeln!(io::stderr(), "switchboardd: {error}"));
            ExitCode::FAILURE
        }
    }
}
