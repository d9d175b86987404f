use clap::Parser;
use rotor::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
