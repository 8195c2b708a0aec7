//! onion-index CLI binary.

use std::process;

use clap::Parser;
use onion_index::cli::{args::*, commands::*};
use tracing_subscriber::EnvFilter;

fn main() {
    let args = OnionIndexArgs::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = execute_command(args) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
