#![forbid(unsafe_code)]

//! isentry — Integrity Sentry CLI entry point.

use clap::Parser;

mod cli_app;

fn main() {
    let args = cli_app::Cli::parse();
    if let Err(e) = cli_app::run(&args) {
        eprintln!("isentry: {e}");
        std::process::exit(1);
    }
}
