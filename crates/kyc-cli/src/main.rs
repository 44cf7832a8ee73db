//! # kycctl entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.
//! Case commands run on a Tokio runtime against the Postgres version store;
//! `derive` runs synchronously and offline.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kyc_amend::{AmendConfig, Amender, PgVersionStore};
use kyc_cli::case::{run_case, CaseCommand};
use kyc_cli::derive::{run_derive, DeriveArgs};
use kyc_dsl::SexprCodec;

/// KYC case stack CLI.
///
/// Creates and amends versioned KYC cases, inspects their version and
/// amendment history, and evaluates derived-attribute rules.
#[derive(Parser, Debug)]
#[command(name = "kycctl", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Postgres connection string for the version store.
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Case(CaseCommand),

    /// Evaluate derived-attribute rules against attribute values.
    Derive(DeriveArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut stdout = std::io::stdout().lock();
    let result = match &cli.command {
        Commands::Derive(args) => run_derive(args, &mut stdout),
        Commands::Case(command) => run_with_store(command, cli.database_url.as_deref(), &mut stdout),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn run_with_store(
    command: &CaseCommand,
    database_url: Option<&str>,
    out: &mut dyn std::io::Write,
) -> Result<u8> {
    let url = database_url.context("DATABASE_URL is required for case commands")?;
    let config = AmendConfig::from_env()?;
    tracing::debug!(?config, "loaded amendment config");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(async move {
        let store = PgVersionStore::connect(url).await?;
        let amender = Amender::new(Arc::new(store), Arc::new(SexprCodec::new()?), config);
        run_case(command, &amender, out).await
    })
}
