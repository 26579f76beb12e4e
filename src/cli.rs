//! Command-line flags

use std::path::PathBuf;

use clap::Parser;

/// Seed an Elasticsearch people index and serve search over HTTP.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about)]
pub struct Cli {
    /// Server listen address, e.g. ":5000" or "127.0.0.1:8080"
    #[arg(long, value_name = "ADDR")]
    pub listen_addr: Option<String>,

    /// Comma separated Elasticsearch addresses
    #[arg(long, value_name = "LIST")]
    pub es_addresses: Option<String>,

    /// Configuration file (defaults to $PEOPLE_SEARCH_CONFIG or config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log level or filter directive
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}
