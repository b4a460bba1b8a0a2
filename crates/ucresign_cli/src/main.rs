//! ucresign CLI
//!
//! Mirrors a Jenkins update center: the upstream document is verified,
//! its download URLs are rewritten and it is signed again with the
//! mirror's own key.

use std::process::ExitCode;

use clap::Parser;
use miette::Result;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod proxy;
mod utils;

use cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Serve(args) => commands::serve::run_serve(args).map(|()| false),
        Commands::Refresh { app } => commands::refresh::run_refresh(app).map(|()| false),
        Commands::Verify {
            file,
            envelope,
            certificate,
        } => commands::verify::run_verify(&file, envelope, certificate.as_deref()),
    }
}
