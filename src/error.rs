//! Error types for the device watcher

use std::string::FromUtf8Error;
use thiserror::Error;

/// Errors that end a watch session
///
/// Every variant is fatal: nothing is retried, the error travels up to
/// `main` and the connection is dropped on the way.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to open serial port {port}")]
    Connection {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Failed to set {line} control line")]
    ControlLine {
        line: ControlLine,
        #[source]
        source: serialport::Error,
    },

    #[error("Matched line is not valid UTF-8")]
    Decode(#[from] FromUtf8Error),

    #[error("Failed to read from serial port")]
    Read(#[source] std::io::Error),

    #[error("Failed to write output line")]
    Output(#[source] std::io::Error),
}

/// Modem control lines driven during reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlLine {
    /// Data Terminal Ready
    Dtr,
    /// Request To Send
    Rts,
}

impl std::fmt::Display for ControlLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlLine::Dtr => write!(f, "DTR"),
            ControlLine::Rts => write!(f, "RTS"),
        }
    }
}
