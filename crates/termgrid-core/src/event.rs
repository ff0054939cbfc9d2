#![forbid(unsafe_code)]

//! Input events.
//!
//! Every event that came off the wire carries the exact bytes that produced
//! it in its `raw` field, so consumers that only handle a subset of the
//! protocol can forward the rest verbatim.
//!
//! # Design Notes
//!
//! - Mouse coordinates are 0-indexed and clipped to the screen.
//! - A composite event (function key, mouse report, paste) is always
//!   delivered as a single value; the parser never leaks its pieces.
//! - `ButtonMask` is a set: a release event carries an empty mask.

use bitflags::bitflags;

use crate::key::{Key, ModMask};

/// An input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A keyboard event.
    Key(KeyEvent),

    /// A mouse event.
    Mouse(MouseEvent),

    /// Pasted text (bracketed, OSC-52, or heuristic).
    Paste(PasteEvent),

    /// Bytes the parser could not (or was told not to) interpret.
    Raw(Vec<u8>),

    /// The terminal was resized.
    Resize {
        /// New width in columns.
        width: u16,
        /// New height in rows.
        height: u16,
    },

    /// The input stream failed; the reader has stopped.
    Error {
        /// What went wrong.
        cause: String,
    },
}

/// A keyboard event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Which key.
    pub key: Key,
    /// The rune, when `key` is [`Key::Rune`] (or the raw control
    /// character for single-byte keys). `'\0'` otherwise.
    pub ch: char,
    /// Modifiers held.
    pub mods: ModMask,
    /// The exact input bytes that produced this event.
    pub raw: Vec<u8>,
}

impl KeyEvent {
    /// Create a key event.
    #[must_use]
    pub fn new(key: Key, ch: char, mods: ModMask, raw: Vec<u8>) -> Self {
        Self {
            key,
            ch,
            mods,
            raw,
        }
    }

    /// Check whether this is a specific rune with no modifiers.
    #[must_use]
    pub fn is_rune(&self, ch: char) -> bool {
        self.key == Key::Rune && self.ch == ch && self.mods.is_empty()
    }
}

bitflags! {
    /// Mouse buttons (and wheel impulses) active in a mouse event.
    ///
    /// An empty mask is a release: all buttons are up.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ButtonMask: u8 {
        /// Primary (usually left) button.
        const BUTTON1 = 0b0000_0001;
        /// Middle button.
        const BUTTON2 = 0b0000_0010;
        /// Secondary (usually right) button.
        const BUTTON3 = 0b0000_0100;
        /// Wheel rolled away from the user.
        const WHEEL_UP = 0b0000_1000;
        /// Wheel rolled towards the user.
        const WHEEL_DOWN = 0b0001_0000;
    }
}

/// A mouse event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MouseEvent {
    /// Column, 0-indexed.
    pub x: u16,
    /// Row, 0-indexed.
    pub y: u16,
    /// Buttons held (empty = release).
    pub buttons: ButtonMask,
    /// Modifiers held.
    pub mods: ModMask,
    /// The exact input bytes that produced this event.
    pub raw: Vec<u8>,
}

impl MouseEvent {
    /// Create a mouse event.
    #[must_use]
    pub fn new(x: u16, y: u16, buttons: ButtonMask, mods: ModMask, raw: Vec<u8>) -> Self {
        Self {
            x,
            y,
            buttons,
            mods,
            raw,
        }
    }
}

/// A paste event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteEvent {
    /// The pasted text, carriage returns normalised to newlines.
    pub text: String,
    /// The exact input bytes (framing included) that produced this event.
    pub raw: Vec<u8>,
}

impl PasteEvent {
    /// Create a paste event.
    #[must_use]
    pub fn new(text: impl Into<String>, raw: Vec<u8>) -> Self {
        Self {
            text: text.into(),
            raw,
        }
    }
}
