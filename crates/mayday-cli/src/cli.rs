//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "mayday", author, version, about = "Emergency beacon for mesh radio networks", long_about = None)]
pub struct Cli {
    /// Mesh gateway address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:4403")]
    pub gateway: String,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
