#![forbid(unsafe_code)]

//! Key codes and modifier masks.
//!
//! A [`Key`] identifies *which* key produced an event; the accompanying
//! rune (for [`Key::Rune`]) and [`ModMask`] live on the event itself.
//!
//! Control bytes are first-class keys: the terminal delivers them as single
//! bytes and several of them double as named keys (Tab is Ctrl-I, Enter is
//! Ctrl-M, and so on). [`Key::from_control_byte`] performs that aliasing so
//! the rest of the engine only ever sees the canonical variant.

use bitflags::bitflags;

/// A key identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A printable rune; the character rides on the event.
    Rune,

    /// Up arrow.
    Up,
    /// Down arrow.
    Down,
    /// Left arrow.
    Left,
    /// Right arrow.
    Right,
    /// Home key.
    Home,
    /// End key.
    End,
    /// Page Up key.
    PageUp,
    /// Page Down key.
    PageDown,
    /// Insert key.
    Insert,
    /// Delete key.
    Delete,
    /// Help key.
    Help,
    /// Print key.
    Print,
    /// Cancel key.
    Cancel,
    /// Exit key.
    Exit,
    /// Shift-Tab.
    Backtab,
    /// Backspace as DEL (0x7F).
    Backspace,

    /// Tab (the control byte 0x09).
    Tab,
    /// Enter / carriage return (0x0D).
    Enter,
    /// Escape (0x1B).
    Esc,
    /// Backspace as Ctrl-H (0x08).
    BS,

    /// Function key F1..=F64.
    F(u8),

    /// Any other control byte in 0x00..=0x1F.
    Ctrl(u8),
}

impl Key {
    /// Canonical key for a raw control byte.
    ///
    /// Tab, Enter, Esc, and BS alias onto their control-byte identities;
    /// everything else in 0x00..=0x1F stays a bare [`Key::Ctrl`].
    #[must_use]
    pub const fn from_control_byte(b: u8) -> Key {
        match b {
            0x08 => Key::BS,
            0x09 => Key::Tab,
            0x0D => Key::Enter,
            0x1B => Key::Esc,
            _ => Key::Ctrl(b),
        }
    }

    /// True for keys the user types directly, with no control-key chord.
    ///
    /// These are the control bytes that carry no implicit Ctrl modifier
    /// when they arrive on the wire.
    #[must_use]
    pub const fn is_bare_control(self) -> bool {
        matches!(self, Key::BS | Key::Tab | Key::Enter | Key::Esc)
    }

    /// Human-readable name.
    #[must_use]
    pub fn name(self) -> String {
        match self {
            Key::Rune => "Rune".into(),
            Key::Up => "Up".into(),
            Key::Down => "Down".into(),
            Key::Left => "Left".into(),
            Key::Right => "Right".into(),
            Key::Home => "Home".into(),
            Key::End => "End".into(),
            Key::PageUp => "PgUp".into(),
            Key::PageDown => "PgDn".into(),
            Key::Insert => "Insert".into(),
            Key::Delete => "Delete".into(),
            Key::Help => "Help".into(),
            Key::Print => "Print".into(),
            Key::Cancel => "Cancel".into(),
            Key::Exit => "Exit".into(),
            Key::Backtab => "Backtab".into(),
            Key::Backspace => "Backspace".into(),
            Key::Tab => "Tab".into(),
            Key::Enter => "Enter".into(),
            Key::Esc => "Esc".into(),
            Key::BS => "Ctrl-H".into(),
            Key::F(n) => format!("F{n}"),
            Key::Ctrl(b) => {
                if (1..=26).contains(&b) {
                    format!("Ctrl-{}", (b + b'a' - 1) as char)
                } else {
                    format!("Ctrl-0x{b:02x}")
                }
            }
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

bitflags! {
    /// Modifier keys held during a key or mouse event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModMask: u8 {
        /// Shift key.
        const SHIFT = 0b0001;
        /// Control key.
        const CTRL  = 0b0010;
        /// Alt/Option key.
        const ALT   = 0b0100;
        /// Meta key.
        const META  = 0b1000;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_byte_aliasing() {
        assert_eq!(Key::from_control_byte(0x09), Key::Tab);
        assert_eq!(Key::from_control_byte(0x0D), Key::Enter);
        assert_eq!(Key::from_control_byte(0x1B), Key::Esc);
        assert_eq!(Key::from_control_byte(0x08), Key::BS);
        assert_eq!(Key::from_control_byte(0x01), Key::Ctrl(0x01));
    }

    #[test]
    fn bare_controls_carry_no_ctrl() {
        assert!(Key::Tab.is_bare_control());
        assert!(Key::Esc.is_bare_control());
        assert!(!Key::Ctrl(0x01).is_bare_control());
    }

    #[test]
    fn names() {
        assert_eq!(Key::F(12).name(), "F12");
        assert_eq!(Key::Ctrl(0x01).name(), "Ctrl-a");
        assert_eq!(Key::PageUp.name(), "PgUp");
    }
}
