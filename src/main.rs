//! stravacache CLI entry point.

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    // A missing .env is normal; only explicit config matters.
    let _ = dotenvy::dotenv();

    let args = cli::Cli::parse();
    cli::init_logging(args.log_json);
    cli::run(args)
}
