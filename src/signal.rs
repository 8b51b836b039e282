//! Stop flag raised by SIGINT / SIGTERM
//!
//! The handler only stores to an atomic. A blocking serial read interrupted
//! by the signal returns early, the watch loop sees the flag and returns, and
//! the connection is closed on the way out.

use anyhow::Result;
use std::sync::atomic::AtomicBool;

static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Install the termination handlers and return the flag they raise
pub fn install() -> Result<&'static AtomicBool> {
    #[cfg(unix)]
    unix::install()?;

    Ok(&STOP_REQUESTED)
}

#[cfg(unix)]
mod unix {
    use super::STOP_REQUESTED;
    use anyhow::{Context, Result};
    use std::sync::atomic::Ordering;

    extern "C" fn handle_stop(_: libc::c_int) {
        STOP_REQUESTED.store(true, Ordering::SeqCst);
    }

    pub fn install() -> Result<()> {
        for signum in [libc::SIGINT, libc::SIGTERM] {
            // SAFETY: the handler is async-signal-safe, it only touches an atomic
            let previous = unsafe {
                libc::signal(signum, handle_stop as extern "C" fn(libc::c_int) as libc::sighandler_t)
            };
            if previous == libc::SIG_ERR {
                return Err(std::io::Error::last_os_error())
                    .with_context(|| format!("Failed to install handler for signal {}", signum));
            }
        }
        Ok(())
    }
}
