use clap::Parser;
use squirrel::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
