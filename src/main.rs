use clap::Parser;
use signalcheck::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
