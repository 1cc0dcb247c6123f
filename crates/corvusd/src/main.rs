//! CLI entrypoint for the corvus daemon supervisor.

use std::process::ExitCode;

use clap::Parser;

use corvus_config::BootstrapOptions;

fn main() -> ExitCode {
    let options = BootstrapOptions::parse();
    corvusd::run(&options)
}
