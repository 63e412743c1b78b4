//! Binary entrypoint that launches the scout agent server.

use std::process::ExitCode;

use scout_agent::start_scout_agent;

fn main() -> ExitCode {
    start_scout_agent::run()
}
