use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "faucet-claimer")]
#[command(version, about = "Automated faucet claims for a set of managed wallets", long_about = None)]
pub struct Cli {
    /// Optional configuration file (TOML, YAML or JSON); environment wins
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Wallet store file
    #[arg(long, value_name = "FILE")]
    pub wallets_file: Option<PathBuf>,

    /// Faucet API base URL
    #[arg(long, value_name = "URL")]
    pub faucet_api: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Print results as JSON where supported
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Run the scheduler until interrupted (default)
    Run,
    /// Generate new wallets
    Create {
        #[arg(default_value_t = 1)]
        count: usize,
    },
    /// List wallets with their claim totals
    List,
    /// Claim for every wallet now
    Claim,
    /// Show faucet status
    Info,
    /// Show aggregate claim statistics
    Stats,
    /// Print all addresses and private keys via a transient file
    Export,
    /// Delete a wallet by its 1-based index from `list`
    Delete { index: usize },
}
