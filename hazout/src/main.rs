//! `hazout` binary. Results go to stdout, logs to stderr.

use std::io::IsTerminal;
use std::process::ExitCode;

use clap::Parser;
use hazout::cli::{run, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    if let Err(e) = dotenv {
        if !e.not_found() {
            tracing::warn!(error = %e, "Ignoring unreadable .env file");
        }
    }

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "hazout failed");
            ExitCode::FAILURE
        }
    }
}
