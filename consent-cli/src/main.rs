//! Consent: record a data-processing consent decision and keep it in sync
//! with the remote consent endpoint.
//!
//! # Usage
//!
//! ```text
//! consent init [--endpoint <url>] [--device-id <id>] [--force]
//! consent status [--json]
//! consent accept | deny
//! consent start
//! consent prompt [--title <text>] [--message <text>]
//! consent sync
//! consent clear
//! ```

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{
    decide::Decision, init::InitArgs, prompt::PromptArgs, status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "consent",
    version,
    about = "Record a data-processing consent decision and sync it to the consent endpoint",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write ~/.consent/config.yaml.
    Init(InitArgs),

    /// Show the stored decision and whether the endpoint acknowledged it.
    Status(StatusArgs),

    /// Record acceptance and send it.
    Accept,

    /// Record denial and send it.
    Deny,

    /// Startup check: prompt if undecided, resend if unacknowledged.
    Start,

    /// Ask for a decision now, regardless of what is stored.
    Prompt(PromptArgs),

    /// Resend the stored decision if the endpoint has not acknowledged it.
    Sync,

    /// Forget the stored decision.
    Clear,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Commands::Init(args) => args.run(),
            Commands::Status(args) => args.run(),
            Commands::Accept => commands::decide::run(Decision::Accept).await,
            Commands::Deny => commands::decide::run(Decision::Deny).await,
            Commands::Start => commands::start::run().await,
            Commands::Prompt(args) => args.run().await,
            Commands::Sync => commands::sync::run().await,
            Commands::Clear => commands::clear::run(),
        }
    })
}

/// `RUST_LOG` overrides the default `warn` level.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
