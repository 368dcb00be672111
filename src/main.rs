use clap::Parser;
use panelbt::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
