//! Device Connector
//!
//! Bring-up helper for NDN onboarding devices on ESP32-style dev boards.
//! Opens the board's USB serial port, pulses reset through the DTR/RTS
//! lines, then prints every firmware log line tagged with the ` [pion`
//! marker, prefixed with the wall-clock time in milliseconds.
//!
//! # Usage
//!
//! ```bash
//! # Watch the default port (/dev/ttyUSB0)
//! device-conn
//!
//! # Watch another port
//! device-conn --port /dev/ttyACM0
//!
//! # Read port and marker from a config file
//! device-conn --config device.toml
//!
//! # List available serial ports
//! device-conn --list-ports
//! ```
//!
//! Matched lines are the only thing written to stdout:
//!
//! ```text
//! 1699999999123 [pion] device ready
//! ```

mod config;
mod error;
mod serial;
mod signal;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use config::WatchConfig;

/// Device Connector
///
/// Resets a dev board and streams its timestamped firmware log lines
#[derive(Parser, Debug)]
#[command(name = "device-conn")]
#[command(author = "Prasanna Gautam")]
#[command(version = "0.1.0")]
#[command(about = "NDN onboarding device connector")]
struct Cli {
    /// Serial port path [default: /dev/ttyUSB0]
    #[arg(long)]
    port: Option<String>,

    /// TOML file providing `port` and/or `marker`
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger; stdout is reserved for matched lines
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if cli.list_ports {
        return serial::discover::print_ports();
    }

    let config = WatchConfig::resolve(cli.config.as_deref(), cli.port)
        .context("Failed to load configuration")?;
    log::debug!("Resolved configuration: {:?}", config);

    let stop = signal::install()?;

    serial::watcher::watch(&config, stop)
        .with_context(|| format!("Watching {} failed", config.port))?;

    Ok(())
}
