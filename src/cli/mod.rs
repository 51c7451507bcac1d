// CLI module for provit
// Author: kelexine (https://github.com/kelexine)

use clap::Parser;
use std::path::PathBuf;

/// provit - hybrid async/sync dispatch backend for a slow AI chat upstream
#[derive(Parser, Debug)]
#[command(name = "provit", version, about, long_about = None)]
pub struct Args {
    /// Path to a TOML config file (default: ~/.provit/config.toml if present)
    #[arg(short, long, env = "PROVIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the bind address
    #[arg(long)]
    pub host: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    pub port: Option<u16>,
}
