//! CLI definitions for HostBridge.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// HostBridge CLI.
#[derive(Parser)]
#[command(name = "hostbridge")]
#[command(about = "Command execution bridge into a single-threaded host")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/hostbridge.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the bridge server in foreground (default)
    Run {
        /// Server host, overrides the config file
        #[arg(long, env = "HOSTBRIDGE_HOST")]
        host: Option<String>,

        /// Server port, overrides the config file
        #[arg(long, env = "HOSTBRIDGE_PORT")]
        port: Option<u16>,
    },

    /// Submit one command to a running bridge and wait for it
    Call {
        /// Command name
        name: String,

        /// Arguments as a JSON array or object
        #[arg(default_value = "[]")]
        arguments: String,

        /// Bridge base URL
        #[arg(long, default_value = "http://127.0.0.1:5000")]
        url: String,

        /// Seconds to wait for the result
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },

    /// Print the effective configuration
    Config,
}
