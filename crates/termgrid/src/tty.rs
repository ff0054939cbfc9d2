#![forbid(unsafe_code)]

//! Controlling-terminal acquisition.
//!
//! Opens `/dev/tty` for reading and writing, switches it into raw mode
//! behind an RAII guard, and answers window-size queries. The guard
//! restores the original termios on drop, so even a panicking application
//! leaves the terminal usable.

use std::fs::File;
use std::io;

/// RAII guard that saves the original termios and restores it on drop.
#[cfg(unix)]
pub struct RawModeGuard {
    original: nix::sys::termios::Termios,
    tty: File,
}

#[cfg(unix)]
impl RawModeGuard {
    /// Enter raw mode on the controlling terminal.
    pub fn enter() -> io::Result<Self> {
        let tty = File::open("/dev/tty")?;
        let original = nix::sys::termios::tcgetattr(&tty).map_err(io::Error::other)?;

        let mut raw = original.clone();
        nix::sys::termios::cfmakeraw(&mut raw);
        nix::sys::termios::tcsetattr(&tty, nix::sys::termios::SetArg::TCSAFLUSH, &raw)
            .map_err(io::Error::other)?;

        Ok(Self { original, tty })
    }
}

#[cfg(unix)]
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // Best-effort restore; errors during cleanup have nowhere to go.
        let _ = nix::sys::termios::tcsetattr(
            &self.tty,
            nix::sys::termios::SetArg::TCSAFLUSH,
            &self.original,
        );
    }
}

impl std::fmt::Debug for RawModeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawModeGuard").finish_non_exhaustive()
    }
}

/// The acquired controlling terminal, split into its working parts.
#[derive(Debug)]
pub struct Tty {
    /// Raw input byte stream.
    pub reader: File,
    /// Output byte stream.
    pub writer: File,
    /// Handle for window-size queries.
    pub winsize: File,
    /// Keeps raw mode alive; dropping it restores the terminal.
    pub raw_guard: RawModeGuard,
}

#[cfg(unix)]
impl Tty {
    /// Open `/dev/tty` and enter raw mode.
    pub fn acquire() -> io::Result<Self> {
        let reader = File::open("/dev/tty")?;
        let writer = std::fs::OpenOptions::new().write(true).open("/dev/tty")?;
        let winsize = writer.try_clone()?;
        let raw_guard = RawModeGuard::enter()?;
        Ok(Self {
            reader,
            writer,
            winsize,
            raw_guard,
        })
    }
}

/// Query the window size of a terminal fd. `None` when the ioctl fails
/// or reports a zero dimension.
#[cfg(unix)]
#[must_use]
pub fn window_size(fd: &File) -> Option<(u16, u16)> {
    match rustix::termios::tcgetwinsize(fd) {
        Ok(ws) if ws.ws_col > 0 && ws.ws_row > 0 => Some((ws.ws_col, ws.ws_row)),
        _ => None,
    }
}

/// Window size from the `COLUMNS`/`LINES` environment overrides.
#[must_use]
pub fn env_size() -> (Option<u16>, Option<u16>) {
    let parse = |name: &str| {
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .filter(|&v| v != 0)
    };
    (parse("COLUMNS"), parse("LINES"))
}
