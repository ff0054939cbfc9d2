#![forbid(unsafe_code)]

//! Screen errors.

use std::io;

/// Errors surfaced by the screen facade.
#[derive(Debug)]
pub enum ScreenError {
    /// No capability record for the `TERM` in effect; the screen is
    /// unusable.
    TerminfoNotFound(String),
    /// The locale names a charset the engine has no transcoder for.
    CharsetUnsupported(String),
    /// The controlling terminal could not be acquired or configured.
    TtyAcquire(io::Error),
    /// A clipboard register other than `c` or `p` was requested.
    InvalidRegister(String),
    /// The clipboard text exceeded the OSC-52 practical limit; it was
    /// still sent, but the receiving terminal may truncate it.
    ClipboardTruncated,
}

impl std::fmt::Display for ScreenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TerminfoNotFound(term) => {
                write!(f, "no terminal capability record for {term:?}")
            }
            Self::CharsetUnsupported(charset) => {
                write!(f, "unsupported charset {charset:?}")
            }
            Self::TtyAcquire(err) => write!(f, "failed to acquire tty: {err}"),
            Self::InvalidRegister(register) => {
                write!(f, "invalid clipboard register {register:?} (want \"c\" or \"p\")")
            }
            Self::ClipboardTruncated => {
                write!(f, "clipboard text exceeds 74994 bytes and may be truncated")
            }
        }
    }
}

impl std::error::Error for ScreenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TtyAcquire(err) => Some(err),
            _ => None,
        }
    }
}

impl From<termgrid_core::TerminfoError> for ScreenError {
    fn from(err: termgrid_core::TerminfoError) -> Self {
        match err {
            termgrid_core::TerminfoError::NotFound(name) => Self::TerminfoNotFound(name),
        }
    }
}
