mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use kh2cc::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Command};

fn main() -> Result<()> {
    let args = Args::parse();

    let directive = if args.verbose { "kh2cc=debug" } else { "kh2cc=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load_or_default(&args.config)?;
    info!("kh2cc {}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::List { json } => commands::list::run(&config, json),
        Command::Check { policy } => commands::check::run(policy.unwrap_or(config.conflicts.policy)),
        Command::Simulate {
            effect,
            variant,
            stop_after,
        } => commands::simulate::run(&config, &effect, variant.as_deref(), stop_after),
    }
}
