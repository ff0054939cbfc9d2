#![forbid(unsafe_code)]

//! Core types for the termgrid terminal screen engine.
//!
//! This crate holds everything the engine needs to *understand* a
//! terminal: the event model, the capability database, charset
//! transcoders, the key table built from a capability record, and the
//! speculative input parser that turns the raw byte stream into events.
//!
//! Rendering lives in `termgrid-render`; the screen facade tying both
//! sides to a real TTY lives in `termgrid`.

pub mod charset;
pub mod event;
pub mod input;
pub mod key;
pub mod keytable;
pub mod terminfo;

pub use event::{ButtonMask, Event, KeyEvent, MouseEvent, PasteEvent};
pub use input::{InputBuffer, InputConfig, InputParser};
pub use key::{Key, ModMask};
pub use keytable::{KeyPress, KeyTable};
pub use terminfo::{add_terminfo, lookup_terminfo, Terminfo, TerminfoError};
