//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Panasonic Comfort Cloud client
#[derive(Parser, Debug)]
#[command(name = "comfort-cloud")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "COMFORT_CLOUD_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Token file (defaults to ~/.comfort-cloud/token.json)
    #[arg(long, env = "COMFORT_CLOUD_TOKEN_FILE", global = true)]
    pub token_file: Option<PathBuf>,

    /// Panasonic ID username
    #[arg(short, long, env = "PANASONIC_USER", global = true)]
    pub username: Option<String>,

    /// Panasonic ID password
    #[arg(
        short,
        long,
        env = "PANASONIC_PASSWORD",
        hide_env_values = true,
        global = true
    )]
    pub password: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "warn",
        env = "COMFORT_CLOUD_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "COMFORT_CLOUD_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in (or reuse a valid token) and save the token
    Login,

    /// End the backend session
    Logout,

    /// Show the state of the stored token
    Token,

    /// List groups and devices
    Devices {
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Print the status of one device
    Device {
        /// Device hash GUID, raw GUID or MD5 of the GUID
        #[arg(required = true)]
        id: String,
    },
}
