//! EscrowKit CLI - scenario demos and payout calculator
//!
//! # Quick Start
//!
//! ```bash
//! # Walk through every escrow scenario against an in-memory ledger
//! escrowkit demo
//!
//! # Only the disputed transaction, with debug logs
//! ESCROW_LOG_LEVEL=debug escrowkit demo --scenario dispute
//!
//! # How would 1001 units be split?
//! escrowkit distribute --committed 1001 --terms half-half --json
//! ```

use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod config;
mod display;

use commands::{demo, distribute};
use config::LoggingConfig;
use escrowkit_types::Terms;

/// EscrowKit CLI - multi-party escrow with optional arbitration
#[derive(Parser)]
#[command(name = "escrowkit")]
#[command(author = "EscrowKit Contributors")]
#[command(version)]
#[command(about = "Escrow transactions with mutual agreement and broker arbitration", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run escrow scenarios end to end
    Demo {
        /// Scenario to run
        #[arg(short, long, value_enum, default_value = "all")]
        scenario: demo::Scenario,
    },

    /// Show how committed value is split by the terms
    Distribute {
        /// Committed amount
        #[arg(short, long)]
        committed: u64,

        /// Distribution terms
        #[arg(short, long, value_enum)]
        terms: TermsArg,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// Distribution terms as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TermsArg {
    BackToSender,
    BackToReceiver,
    HalfHalf,
}

impl From<TermsArg> for Terms {
    fn from(arg: TermsArg) -> Self {
        match arg {
            TermsArg::BackToSender => Terms::BackToSender,
            TermsArg::BackToReceiver => Terms::BackToReceiver,
            TermsArg::HalfHalf => Terms::HalfHalf,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    config::init_logging(&LoggingConfig::from_env())?;

    match cli.command {
        Commands::Demo { scenario } => {
            demo::run(scenario).await?;
        }
        Commands::Distribute {
            committed,
            terms,
            json,
        } => {
            distribute::run(committed, terms.into(), json)?;
        }
    }

    Ok(())
}
