//! phantom - Command-line client for the Phantom scheduling API.
//!
//! A thin wrapper over `phantom-rest`: it stores the session in a token
//! file, restores it on every run, and prints what the API returns.

mod cli;
mod commands;
mod context;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs);

    commands::handle(cli.command, &cli.connection).await
}

/// Logs go to stderr so command output on stdout stays machine-readable.
///
/// `-v` raises only the phantom crates; `RUST_LOG` overrides everything.
fn init_logging(verbosity: u8, json: bool) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let directives = format!(
        "warn,phantom={level},phantom_core={level},phantom_rest={level},phantom_file={level}"
    );
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
