//! Device log watcher
//!
//! Resets the board through its DTR/RTS transistor pair, then reads the
//! debug UART forever and prints every line carrying the firmware's log
//! marker, prefixed with a millisecond wall-clock timestamp.

use crate::config::WatchConfig;
use crate::error::WatchError;
use crate::serial::{PortConfig, SerialConnection, SerialLink};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// DTR level held during and after reset
pub const RESET_DTR_LEVEL: bool = false;

/// How long RTS is asserted to hold the chip in reset
pub const RESET_PULSE: Duration = Duration::from_millis(100);

/// Milliseconds since the Unix epoch, truncated
pub fn epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Filter one raw read
///
/// A read is kept only if it is a complete line (ends with `\n`) and
/// contains `marker`. Kept lines are decoded as UTF-8 and trimmed of
/// whitespace, including the ASCII separators 0x1C-0x1F that noisy UARTs
/// produce; invalid UTF-8 is an error rather than a dropped line.
pub fn accept_line(raw: Vec<u8>, marker: &str) -> Result<Option<String>, WatchError> {
    if raw.last() != Some(&b'\n') || !contains(&raw, marker.as_bytes()) {
        return Ok(None);
    }

    let text = String::from_utf8(raw)?;
    Ok(Some(text.trim_matches(is_strippable).to_string()))
}

fn is_strippable(c: char) -> bool {
    c.is_whitespace() || ('\x1c'..='\x1f').contains(&c)
}

/// `needle` must be non-empty: `windows(0)` panics
fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Owns the link to one device for the life of a watch session
pub struct DeviceWatcher<L: SerialLink> {
    link: L,
    marker: String,
    clock: fn() -> i64,
}

impl<L: SerialLink> DeviceWatcher<L> {
    /// Create a watcher over an open link
    pub fn new(link: L, marker: &str) -> Self {
        debug_assert!(!marker.is_empty(), "line marker must not be empty");
        Self {
            link,
            marker: marker.to_string(),
            clock: epoch_millis,
        }
    }

    /// Pulse the reset line: DTR low, RTS high, wait, RTS low
    pub fn hard_reset(&mut self) -> Result<(), WatchError> {
        log::info!("Resetting device ({} ms RTS pulse)", RESET_PULSE.as_millis());

        self.link.set_dtr(RESET_DTR_LEVEL)?;
        self.link.set_rts(true)?;
        std::thread::sleep(RESET_PULSE);
        self.link.set_rts(false)?;

        Ok(())
    }

    /// Read one line and return it if it passes the marker filter
    pub fn read_filtered_line(&mut self) -> Result<Option<String>, WatchError> {
        let raw = self.link.read_line()?;

        if raw.is_empty() {
            log::trace!("Read timed out with no data");
            return Ok(None);
        }

        let line = accept_line(raw, &self.marker)?;
        if line.is_none() {
            log::debug!("Dropped line without marker or newline");
        }
        Ok(line)
    }

    /// Reset the device, then print matching lines until `stop` is raised
    pub fn run<W: Write>(&mut self, out: &mut W, stop: &AtomicBool) -> Result<(), WatchError> {
        self.hard_reset()?;

        while !stop.load(Ordering::SeqCst) {
            if let Some(line) = self.read_filtered_line()? {
                self.emit(out, &line)?;
            }
        }

        log::info!("Stop requested, closing connection");
        Ok(())
    }

    fn emit<W: Write>(&self, out: &mut W, line: &str) -> Result<(), WatchError> {
        writeln!(out, "{} {}", (self.clock)(), line).map_err(WatchError::Output)?;
        out.flush().map_err(WatchError::Output)
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }
}

/// Open the configured port and watch it until stopped or a fatal error
///
/// Matched lines go to stdout. The connection is dropped before this
/// returns, on every path.
pub fn watch(config: &WatchConfig, stop: &AtomicBool) -> Result<(), WatchError> {
    let connection = SerialConnection::open(PortConfig::new(&config.port))?;
    let mut watcher = DeviceWatcher::new(connection, &config.marker);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    watcher.run(&mut out, stop)
}
