//! Lectern operator tool.
//!
//! Usage:
//!   lectern schema site.toml [--entity posts]
//!   lectern check site.toml
//!
//! Both commands load a TOML entity config, sanitize every field tree and
//! compile the storage schemas without touching any data.

use anyhow::Result;
use clap::{Parser, Subcommand};
use lectern_cli::{compile, load_config, render};
use lectern_schema::UnknownKindPolicy;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "lectern")]
#[command(about = "Compile and check Lectern entity configs")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Skip fields of unknown kind instead of failing
    #[arg(long, global = true)]
    allow_unknown_kinds: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print compiled storage schemas as JSON
    Schema {
        /// Path to the TOML config
        config: PathBuf,

        /// Only print this collection or global
        #[arg(short, long)]
        entity: Option<String>,
    },
    /// Validate a config and report the first error
    Check {
        /// Path to the TOML config
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let policy = if args.allow_unknown_kinds {
        UnknownKindPolicy::Skip
    } else {
        UnknownKindPolicy::Reject
    };

    match args.command {
        Command::Schema { config, entity } => {
            let report = compile(load_config(&config)?, policy).await?;
            println!("{}", render(&report, entity.as_deref())?);
        }
        Command::Check { config } => {
            let report = compile(load_config(&config)?, policy).await?;
            info!("{} is valid", config.display());
            println!("{}", report.summary());
        }
    }
    Ok(())
}
