use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "monero-connections")]
#[command(version = concat!("Ver:", env!("CARGO_PKG_VERSION")))]
#[command(about = "Check and watch a pool of Monero RPC connections with automatic failover")]
pub struct Cli {
    /// Config file (default: ~/.monero-connection-manager/config.toml)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Write a default config file if none exists
    #[arg(long = "init")]
    pub init: bool,

    /// Validate the config file and exit
    #[arg(long = "check-config")]
    pub check_config: bool,

    /// Poll for the given number of seconds, printing each connection change.
    /// Without this flag every connection is probed once and the best one printed.
    #[arg(short = 'w', long = "watch", value_name = "SECONDS")]
    pub watch: Option<u64>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
