//! Serial port access for device bring-up
//!
//! This module provides:
//! - The `SerialLink` capability the watcher drives
//! - A `serialport`-backed connection implementing it
//! - Serial port discovery for `--list-ports`

pub mod discover;
pub mod port;
pub mod watcher;

pub use port::{PortConfig, SerialConnection};

use crate::error::WatchError;

/// Operations the watcher needs from a serial backend
///
/// `read_line` blocks until a newline arrives or the backend's read
/// deadline passes. On timeout it returns whatever was collected, which may
/// be empty. A timeout is never an error. The link is closed when dropped.
pub trait SerialLink {
    /// Drive the DTR (Data Terminal Ready) line
    fn set_dtr(&mut self, level: bool) -> Result<(), WatchError>;

    /// Drive the RTS (Request To Send) line
    fn set_rts(&mut self, level: bool) -> Result<(), WatchError>;

    /// Read bytes up to and including `\n`, or until the read deadline
    fn read_line(&mut self) -> Result<Vec<u8>, WatchError>;
}
