use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kh2cc::SymmetryPolicy;

#[derive(Parser)]
#[command(name = "kh2cc")]
#[command(about = "Kingdom Hearts II effect pack runner")]
pub struct Args {
    #[arg(short, long, default_value = "kh2cc.toml", env = "KH2CC_CONFIG")]
    pub config: PathBuf,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List every effect in the catalog
    List {
        #[arg(long)]
        json: bool,
    },
    /// Validate the conflict table and report one-sided entries
    Check {
        /// symmetrize, strict or as_written (defaults to the configured policy)
        #[arg(long)]
        policy: Option<SymmetryPolicy>,
    },
    /// Run one effect against an in-process simulated game
    Simulate {
        effect: String,

        #[arg(long)]
        variant: Option<String>,

        /// Stop the effect after this many seconds instead of waiting for expiry
        #[arg(long)]
        stop_after: Option<u64>,
    },
}
