//! sage-build CLI - dependency-ordered package build orchestrator
//!
//! Entry point for the sage-build command-line application.

use anyhow::Result;
use clap::Parser;

use sage_build::cli::output::display_error;
use sage_build::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber; RUST_LOG wins over -v
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::WARN,
        (false, 1) => tracing::Level::INFO,
        (false, _) => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    // Run the command and handle errors
    match cli.run().await {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            display_error(&e);
            std::process::exit(1);
        }
    }
}
