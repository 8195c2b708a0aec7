//! Command line argument parsing for the onion-index CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// onion-index - search index and ban list administration for the crawler
#[derive(Parser, Debug, Clone)]
#[command(name = "onion-index")]
#[command(about = "Administer the crawler's search index, ban list and host table")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct OnionIndexArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Configuration file (TOML)
    #[arg(short, long, env = "ONION_INDEX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Index directory, overriding the configuration file
    #[arg(long)]
    pub index_dir: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl OnionIndexArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }

    /// Default log filter for the effective verbosity, used when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        match self.verbosity() {
            0 => "error",
            1 => "warn",
            2 => "info",
            _ => "debug",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Search the index
    Search(SearchArgs),

    /// Show index statistics
    Stats,

    /// Add documents from a JSON-lines file and persist them
    Add(AddArgs),

    /// Remove every document with the given URL and persist
    Remove(UrlArgs),

    /// Ban the host of a URL
    Ban(UrlArgs),

    /// Lift the ban on the host of a URL
    Unban(UrlArgs),

    /// Check whether the host of a URL is banned
    #[command(name = "is-banned")]
    IsBanned(UrlArgs),

    /// Show or update crawled host status
    Hosts(HostsArgs),
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Query text
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Maximum number of hits
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Number of hits to skip
    #[arg(short, long, default_value = "0")]
    pub offset: usize,
}

/// Arguments for adding documents
#[derive(Parser, Debug, Clone)]
pub struct AddArgs {
    /// JSON-lines file, one document object per line
    #[arg(value_name = "FILE")]
    pub document_file: PathBuf,

    /// Stop at the first malformed line instead of skipping it
    #[arg(long)]
    pub strict: bool,
}

/// A single URL argument
#[derive(Parser, Debug, Clone)]
pub struct UrlArgs {
    #[arg(value_name = "URL")]
    pub url: String,
}

/// Arguments for the host table
#[derive(Parser, Debug, Clone)]
pub struct HostsArgs {
    /// Show the status of one host
    #[arg(value_name = "HOST")]
    pub host: Option<String>,

    /// Record a new status for HOST
    #[arg(long, requires = "host")]
    pub set: Option<HostState>,
}

/// Status value accepted by `hosts --set`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Online,
    Offline,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable format
    Human,
    /// JSON format
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        let args = OnionIndexArgs::try_parse_from([
            "onion-index",
            "-vv",
            "search",
            "hello world",
            "-l",
            "5",
        ])
        .unwrap();

        assert_eq!(args.verbosity(), 2);
        assert_eq!(args.log_filter(), "info");
        match args.command {
            Command::Search(search) => {
                assert_eq!(search.query, "hello world");
                assert_eq!(search.limit, Some(5));
                assert_eq!(search.offset, 0);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_quiet_overrides_verbose() {
        let args = OnionIndexArgs::try_parse_from(["onion-index", "-q", "-vvv", "stats"]).unwrap();
        assert_eq!(args.verbosity(), 0);
        assert_eq!(args.log_filter(), "error");
    }

    #[test]
    fn test_hosts_set_requires_host() {
        let orphan_set = ["onion-index", "hosts", "--set", "online"];
        assert!(OnionIndexArgs::try_parse_from(orphan_set).is_err());

        let args = OnionIndexArgs::try_parse_from([
            "onion-index",
            "-f",
            "json",
            "hosts",
            "a.onion",
            "--set",
            "offline",
        ])
        .unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
        match args.command {
            Command::Hosts(hosts) => {
                assert_eq!(hosts.host.as_deref(), Some("a.onion"));
                assert_eq!(hosts.set, Some(HostState::Offline));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_is_banned_name() {
        let args = OnionIndexArgs::try_parse_from(["onion-index", "is-banned", "http://a.onion/"])
            .unwrap();
        assert!(matches!(
            args.command,
            Command::IsBanned(UrlArgs { ref url }) if url == "http://a.onion/"
        ));
    }
}
