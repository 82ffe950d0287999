//! # memtrail
//!
//! Runs a program, samples its resident memory and writes the trace as PNG, HTML,
//! CSV or JSON. A saved JSON trace can be converted to the other formats later.
//!
//! ## Exit codes
//!
//! - `0`: success
//! - `1`: invalid configuration, missing input, spawn failure or tracking failure
//! - otherwise: the exit code of a tracked program that failed

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

mod cli;
mod commands;
mod settings;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::commands::{Outcome, execute_command};

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    match execute_command(cli.command) {
        Ok(Outcome::Success) => ExitCode::SUCCESS,
        Ok(Outcome::ProgramFailed(code)) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Install the global subscriber; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
