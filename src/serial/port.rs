//! Serial port configuration and connection management
//!
//! Opens the device's debug UART and implements `SerialLink` on top of the
//! `serialport` crate.

use crate::config::{BAUD_RATE, DEFAULT_PORT, READ_TIMEOUT};
use crate::error::{ControlLine, WatchError};
use crate::serial::SerialLink;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

/// Configuration for serial port connection
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Serial port path (e.g., /dev/ttyUSB0, /dev/ttyACM0)
    pub port_path: String,
    /// Baud rate (default: 115200)
    pub baud_rate: u32,
    /// Data bits (default: 8)
    pub data_bits: DataBits,
    /// Parity (default: None)
    pub parity: Parity,
    /// Stop bits (default: 1)
    pub stop_bits: StopBits,
    /// Flow control (default: None, DTR/RTS are reserved for reset)
    pub flow_control: FlowControl,
    /// Deadline for a whole line read
    pub timeout: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            port_path: String::from(DEFAULT_PORT),
            baud_rate: BAUD_RATE,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            timeout: READ_TIMEOUT,
        }
    }
}

impl PortConfig {
    /// Create a new configuration with the device's fixed serial settings
    pub fn new(port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            ..Default::default()
        }
    }
}

/// An open serial connection to the device
///
/// The port is closed when the connection is dropped.
pub struct SerialConnection {
    port: Box<dyn SerialPort>,
    config: PortConfig,
    /// Bytes received after the last returned newline
    pending: Vec<u8>,
}

impl SerialConnection {
    /// Open a serial connection with the given configuration
    pub fn open(config: PortConfig) -> Result<Self, WatchError> {
        let port = serialport::new(&config.port_path, config.baud_rate)
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .flow_control(config.flow_control)
            .timeout(config.timeout)
            .open()
            .map_err(|source| WatchError::Connection {
                port: config.port_path.clone(),
                source,
            })?;

        log::info!(
            "Connected to {} at {} baud",
            config.port_path,
            config.baud_rate
        );

        Ok(Self::from_port(port, config))
    }

    /// Wrap an already opened port
    pub fn from_port(port: Box<dyn SerialPort>, config: PortConfig) -> Self {
        Self {
            port,
            config,
            pending: Vec::new(),
        }
    }
}

impl SerialLink for SerialConnection {
    fn set_dtr(&mut self, level: bool) -> Result<(), WatchError> {
        self.port
            .write_data_terminal_ready(level)
            .map_err(|source| WatchError::ControlLine {
                line: ControlLine::Dtr,
                source,
            })
    }

    fn set_rts(&mut self, level: bool) -> Result<(), WatchError> {
        self.port
            .write_request_to_send(level)
            .map_err(|source| WatchError::ControlLine {
                line: ControlLine::Rts,
                source,
            })
    }

    fn read_line(&mut self) -> Result<Vec<u8>, WatchError> {
        let deadline = Instant::now() + self.config.timeout;
        let mut chunk = [0u8; 256];

        loop {
            if let Some(line) = take_line(&mut self.pending) {
                return Ok(line);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(std::mem::take(&mut self.pending));
            }

            // serialport's timeout applies per read() call
            self.port
                .set_timeout(remaining)
                .map_err(|e| WatchError::Read(e.into()))?;

            match self.port.read(&mut chunk) {
                Ok(0) => return Ok(std::mem::take(&mut self.pending)),
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                // Interrupted: a stop signal arrived, let the caller check it
                Err(ref e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                    log::trace!("Read ended without newline ({:?})", e.kind());
                    return Ok(std::mem::take(&mut self.pending));
                }
                Err(e) => return Err(WatchError::Read(e)),
            }
        }
    }
}

impl Drop for SerialConnection {
    fn drop(&mut self) {
        log::debug!("Closing serial port {}", self.config.port_path);
    }
}

/// Split the first complete line (including `\n`) off the front of `pending`
fn take_line(pending: &mut Vec<u8>) -> Option<Vec<u8>> {
    let end = pending.iter().position(|&b| b == b'\n')? + 1;
    let rest = pending.split_off(end);
    Some(std::mem::replace(pending, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PortConfig::default();
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.port_path, "/dev/ttyUSB0");
        assert_eq!(config.timeout, Duration::from_secs(8));
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.flow_control, FlowControl::None);
    }

    #[test]
    fn test_config_for_port() {
        let config = PortConfig::new("/dev/ttyACM0");

        assert_eq!(config.port_path, "/dev/ttyACM0");
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.timeout, Duration::from_secs(8));
    }

    #[test]
    fn test_take_line_keeps_remainder() {
        let mut pending = b"a [pion] one\nb [pi".to_vec();
        assert_eq!(take_line(&mut pending).unwrap(), b"a [pion] one\n");
        assert_eq!(pending, b"b [pi");
        assert!(take_line(&mut pending).is_none());
        assert_eq!(pending, b"b [pi");
    }

    #[test]
    fn test_take_line_multiple() {
        let mut pending = b"x\ny\n".to_vec();
        assert_eq!(take_line(&mut pending).unwrap(), b"x\n");
        assert_eq!(take_line(&mut pending).unwrap(), b"y\n");
        assert!(pending.is_empty());
        assert!(take_line(&mut pending).is_none());
    }

    #[test]
    fn test_take_line_bare_newline() {
        let mut pending = b"\n".to_vec();
        assert_eq!(take_line(&mut pending).unwrap(), b"\n");
        assert!(pending.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_open_missing_port() {
        let config = PortConfig::new("/dev/device-conn-no-such-port");
        match SerialConnection::open(config) {
            Err(WatchError::Connection { port, .. }) => {
                assert_eq!(port, "/dev/device-conn-no-such-port");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("opened a port that does not exist"),
        }
    }

    /// poll() rounds its timeout to whole milliseconds
    #[cfg(unix)]
    const SLACK: Duration = Duration::from_millis(20);

    #[cfg(unix)]
    fn pty_connection(timeout: Duration) -> (serialport::TTYPort, SerialConnection) {
        let (master, slave) = serialport::TTYPort::pair().unwrap();
        let mut config = PortConfig::new("pty");
        config.timeout = timeout;
        (master, SerialConnection::from_port(Box::new(slave), config))
    }

    #[cfg(unix)]
    #[test]
    fn test_read_line_over_pty() {
        use std::io::Write;

        let timeout = Duration::from_millis(300);
        let (mut master, mut conn) = pty_connection(timeout);
        master.write_all(b"a [pion] x\nb [pi").unwrap();
        master.flush().unwrap();

        let started = Instant::now();
        assert_eq!(conn.read_line().unwrap(), b"a [pion] x\n");

        // Partial line comes back once the deadline passes
        assert_eq!(conn.read_line().unwrap(), b"b [pi");
        assert!(started.elapsed() + SLACK >= timeout);

        // Nothing left: a pure timeout is an empty buffer, not an error
        let idle = Instant::now();
        assert!(conn.read_line().unwrap().is_empty());
        assert!(idle.elapsed() + SLACK >= timeout);
    }

    #[cfg(unix)]
    #[test]
    fn test_read_line_keeps_bytes_after_newline() {
        use std::io::Write;

        let (mut master, mut conn) = pty_connection(Duration::from_millis(300));
        master.write_all(b"one [pion] 1\ntwo [pion] 2\n").unwrap();
        master.flush().unwrap();

        assert_eq!(conn.read_line().unwrap(), b"one [pion] 1\n");
        assert_eq!(conn.read_line().unwrap(), b"two [pion] 2\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_read_line_deadline_spans_whole_line() {
        use std::io::Write;

        let timeout = Duration::from_millis(400);
        let (mut master, mut conn) = pty_connection(timeout);

        // Bytes keep trickling in, but the line never completes
        let writer = std::thread::spawn(move || {
            for _ in 0..8 {
                master.write_all(b"x").unwrap();
                master.flush().unwrap();
                std::thread::sleep(Duration::from_millis(100));
            }
            master
        });

        let started = Instant::now();
        let partial = conn.read_line().unwrap();
        let elapsed = started.elapsed();

        assert!(!partial.is_empty());
        assert!(partial.iter().all(|&b| b == b'x'));
        assert!(elapsed + SLACK >= timeout);
        assert!(elapsed < Duration::from_millis(750));
        drop(writer.join().unwrap());
    }
}
