#![forbid(unsafe_code)]

//! Key table construction.
//!
//! Builds the prefix-indexed map from escape-sequence bytes to
//! (key, modifiers) out of a capability record, then layers on:
//!
//! 1. XTerm PC-style modifier synthesis for every navigation and F1..F12
//!    capability (suffixes `;2`..`;16`).
//! 2. Cursor-mode and application-mode fallbacks, because xterm sends
//!    different codes depending on keypad mode and terminfo frequently
//!    only describes one of them.
//! 3. Single-byte entries for the control bytes nothing else claims.
//!
//! Insertion never overrides an existing entry, except through the
//! `replace` escape hatch used when a canonical F-key sequence (say F13)
//! is superseded by its modifier-decorated reading (Shift-F1).

use std::collections::{HashMap, HashSet};

use crate::key::{Key, ModMask};
use crate::terminfo::{Modifiers, Terminfo};

/// A resolved key press: which key, with which modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    /// The key.
    pub key: Key,
    /// Modifiers encoded in the sequence itself.
    pub mods: ModMask,
}

/// Escape-sequence-to-key lookup table.
#[derive(Debug, Default)]
pub struct KeyTable {
    codes: HashMap<Vec<u8>, KeyPress>,
    exist: HashSet<Key>,
}

impl KeyTable {
    /// Build the table for a capability record.
    #[must_use]
    pub fn new(ti: &Terminfo) -> Self {
        let mut table = Self::default();
        table.prepare_keys(ti);
        table
    }

    /// Exact-sequence lookup.
    #[must_use]
    pub fn get(&self, seq: &[u8]) -> Option<KeyPress> {
        self.codes.get(seq).copied()
    }

    /// Iterate over every registered (sequence, key press) pair.
    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &KeyPress)> {
        self.codes.iter()
    }

    /// Whether this terminal can deliver `key` at all.
    #[must_use]
    pub fn has_key(&self, key: Key) -> bool {
        key == Key::Rune || self.exist.contains(&key)
    }

    /// Number of registered sequences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    fn prepare_key_mod(&mut self, key: Key, mods: ModMask, seq: &str) {
        self.prepare_key_mod_replace(key, None, mods, seq);
    }

    fn prepare_key_mod_replace(&mut self, key: Key, replace: Option<Key>, mods: ModMask, seq: &str) {
        if seq.is_empty() {
            return;
        }
        let bytes = seq.as_bytes().to_vec();
        match self.codes.get(&bytes) {
            Some(existing) if Some(existing.key) != replace => {}
            _ => {
                self.exist.insert(key);
                self.codes.insert(bytes, KeyPress { key, mods });
            }
        }
    }

    fn prepare_key(&mut self, key: Key, seq: &str) {
        self.prepare_key_mod(key, ModMask::empty(), seq);
    }

    fn prepare_keys(&mut self, ti: &Terminfo) {
        self.prepare_key(Key::Backspace, &ti.key_backspace);
        for n in 1..=64u8 {
            self.prepare_key(Key::F(n), ti.key_fn(n));
        }
        self.prepare_key(Key::Insert, &ti.key_insert);
        self.prepare_key(Key::Delete, &ti.key_delete);
        self.prepare_key(Key::Home, &ti.key_home);
        self.prepare_key(Key::End, &ti.key_end);
        self.prepare_key(Key::Up, &ti.key_up);
        self.prepare_key(Key::Down, &ti.key_down);
        self.prepare_key(Key::Left, &ti.key_left);
        self.prepare_key(Key::Right, &ti.key_right);
        self.prepare_key(Key::PageUp, &ti.key_pgup);
        self.prepare_key(Key::PageDown, &ti.key_pgdn);
        self.prepare_key(Key::Help, &ti.key_help);
        self.prepare_key(Key::Print, &ti.key_print);
        self.prepare_key(Key::Cancel, &ti.key_cancel);
        self.prepare_key(Key::Exit, &ti.key_exit);
        self.prepare_key(Key::Backtab, &ti.key_backtab);

        self.prepare_key_mod(Key::Right, ModMask::SHIFT, &ti.key_shf_right);
        self.prepare_key_mod(Key::Left, ModMask::SHIFT, &ti.key_shf_left);
        self.prepare_key_mod(Key::Up, ModMask::SHIFT, &ti.key_shf_up);
        self.prepare_key_mod(Key::Down, ModMask::SHIFT, &ti.key_shf_down);
        self.prepare_key_mod(Key::Home, ModMask::SHIFT, &ti.key_shf_home);
        self.prepare_key_mod(Key::End, ModMask::SHIFT, &ti.key_shf_end);
        self.prepare_key_mod(Key::PageUp, ModMask::SHIFT, &ti.key_shf_pgup);
        self.prepare_key_mod(Key::PageDown, ModMask::SHIFT, &ti.key_shf_pgdn);

        self.prepare_key_mod(Key::Right, ModMask::CTRL, &ti.key_ctrl_right);
        self.prepare_key_mod(Key::Left, ModMask::CTRL, &ti.key_ctrl_left);
        self.prepare_key_mod(Key::Up, ModMask::CTRL, &ti.key_ctrl_up);
        self.prepare_key_mod(Key::Down, ModMask::CTRL, &ti.key_ctrl_down);
        self.prepare_key_mod(Key::Home, ModMask::CTRL, &ti.key_ctrl_home);
        self.prepare_key_mod(Key::End, ModMask::CTRL, &ti.key_ctrl_end);

        if ti.modifiers == Modifiers::Dynamic {
            self.prepare_dynamic_modifiers(ti);
        }

        // xterm sends different codes depending on whether application
        // keypad mode is active, and terminfo entries routinely describe
        // only one of the two. Inject the other spelling for terminals
        // that have the mode at all; prepare_key never clobbers sequences
        // the record already claims.
        if !ti.enter_keypad.is_empty() {
            // Cursor mode
            self.prepare_key(Key::Up, "\x1b[A");
            self.prepare_key(Key::Down, "\x1b[B");
            self.prepare_key(Key::Right, "\x1b[C");
            self.prepare_key(Key::Left, "\x1b[D");
            self.prepare_key(Key::End, "\x1b[F");
            self.prepare_key(Key::Home, "\x1b[H");
            self.prepare_key(Key::Delete, "\x1b[3~");
            self.prepare_key(Key::Home, "\x1b[1~");
            self.prepare_key(Key::End, "\x1b[4~");
            self.prepare_key(Key::PageUp, "\x1b[5~");
            self.prepare_key(Key::PageDown, "\x1b[6~");

            // Application mode
            self.prepare_key(Key::Up, "\x1bOA");
            self.prepare_key(Key::Down, "\x1bOB");
            self.prepare_key(Key::Right, "\x1bOC");
            self.prepare_key(Key::Left, "\x1bOD");
            self.prepare_key(Key::Home, "\x1bOH");
        }

        if ti.modifiers == Modifiers::XTerm {
            self.prepare_xterm_modifiers(ti);
        }

        self.prepare_control_keys();
    }

    fn prepare_dynamic_modifiers(&mut self, ti: &Terminfo) {
        self.prepare_key_mod(Key::Up, ModMask::META, &ti.key_meta_up);
        self.prepare_key_mod(Key::Down, ModMask::META, &ti.key_meta_down);
        self.prepare_key_mod(Key::Right, ModMask::META, &ti.key_meta_right);
        self.prepare_key_mod(Key::Left, ModMask::META, &ti.key_meta_left);
        self.prepare_key_mod(Key::Up, ModMask::ALT, &ti.key_alt_up);
        self.prepare_key_mod(Key::Down, ModMask::ALT, &ti.key_alt_down);
        self.prepare_key_mod(Key::Right, ModMask::ALT, &ti.key_alt_right);
        self.prepare_key_mod(Key::Left, ModMask::ALT, &ti.key_alt_left);
        self.prepare_key_mod(Key::Up, ModMask::ALT | ModMask::SHIFT, &ti.key_alt_shf_up);
        self.prepare_key_mod(Key::Down, ModMask::ALT | ModMask::SHIFT, &ti.key_alt_shf_down);
        self.prepare_key_mod(Key::Right, ModMask::ALT | ModMask::SHIFT, &ti.key_alt_shf_right);
        self.prepare_key_mod(Key::Left, ModMask::ALT | ModMask::SHIFT, &ti.key_alt_shf_left);

        self.prepare_key_mod(Key::Up, ModMask::META | ModMask::SHIFT, &ti.key_meta_shf_up);
        self.prepare_key_mod(Key::Down, ModMask::META | ModMask::SHIFT, &ti.key_meta_shf_down);
        self.prepare_key_mod(Key::Right, ModMask::META | ModMask::SHIFT, &ti.key_meta_shf_right);
        self.prepare_key_mod(Key::Left, ModMask::META | ModMask::SHIFT, &ti.key_meta_shf_left);

        self.prepare_key_mod(Key::Up, ModMask::CTRL | ModMask::SHIFT, &ti.key_ctrl_shf_up);
        self.prepare_key_mod(Key::Down, ModMask::CTRL | ModMask::SHIFT, &ti.key_ctrl_shf_down);
        self.prepare_key_mod(Key::Right, ModMask::CTRL | ModMask::SHIFT, &ti.key_ctrl_shf_right);
        self.prepare_key_mod(Key::Left, ModMask::CTRL | ModMask::SHIFT, &ti.key_ctrl_shf_left);

        self.prepare_key_mod(Key::Home, ModMask::ALT, &ti.key_alt_home);
        self.prepare_key_mod(Key::End, ModMask::ALT, &ti.key_alt_end);
        self.prepare_key_mod(Key::Home, ModMask::CTRL | ModMask::SHIFT, &ti.key_ctrl_shf_home);
        self.prepare_key_mod(Key::End, ModMask::CTRL | ModMask::SHIFT, &ti.key_ctrl_shf_end);
        self.prepare_key_mod(Key::Home, ModMask::ALT | ModMask::SHIFT, &ti.key_alt_shf_home);
        self.prepare_key_mod(Key::End, ModMask::ALT | ModMask::SHIFT, &ti.key_alt_shf_end);
        self.prepare_key_mod(Key::Home, ModMask::META | ModMask::SHIFT, &ti.key_meta_shf_home);
        self.prepare_key_mod(Key::End, ModMask::META | ModMask::SHIFT, &ti.key_meta_shf_end);
    }

    fn prepare_xterm_modifiers(&mut self, ti: &Terminfo) {
        self.prepare_key_mod_xterm(Key::Right, &ti.key_right);
        self.prepare_key_mod_xterm(Key::Left, &ti.key_left);
        self.prepare_key_mod_xterm(Key::Up, &ti.key_up);
        self.prepare_key_mod_xterm(Key::Down, &ti.key_down);
        self.prepare_key_mod_xterm(Key::Insert, &ti.key_insert);
        self.prepare_key_mod_xterm(Key::Delete, &ti.key_delete);
        self.prepare_key_mod_xterm(Key::PageUp, &ti.key_pgup);
        self.prepare_key_mod_xterm(Key::PageDown, &ti.key_pgdn);
        self.prepare_key_mod_xterm(Key::Home, &ti.key_home);
        self.prepare_key_mod_xterm(Key::End, &ti.key_end);
        for n in 1..=12u8 {
            let seq = ti.key_fn(n).to_string();
            self.prepare_key_mod_xterm(Key::F(n), &seq);
        }
    }

    /// XTerm PC-style modifier synthesis for one key.
    ///
    /// Modifier parameters 2..=16 map to Shift, Alt, Alt+Shift, Ctrl,
    /// Ctrl+Shift, Alt+Ctrl, Alt+Ctrl+Shift, Meta, Meta+Shift, Meta+Alt,
    /// Meta+Alt+Shift, Meta+Ctrl, Meta+Ctrl+Shift, Meta+Ctrl+Alt, and all
    /// four. The first five may displace a canonical F-key reading (F13 is
    /// really Shift-F1), which is what the `replace` argument expresses.
    fn prepare_key_mod_xterm(&mut self, key: Key, seq: &str) {
        const SHIFT: ModMask = ModMask::SHIFT;
        const ALT: ModMask = ModMask::ALT;
        const CTRL: ModMask = ModMask::CTRL;
        const META: ModMask = ModMask::META;

        if let Some(body) = seq.strip_prefix("\x1b[").and_then(|s| s.strip_suffix('~')) {
            let base = format!("\x1b[{body}");
            self.prepare_key_mod_replace(key, fkey_offset(key, 12), SHIFT, &format!("{base};2~"));
            self.prepare_key_mod_replace(key, fkey_offset(key, 48), ALT, &format!("{base};3~"));
            self.prepare_key_mod_replace(key, fkey_offset(key, 60), ALT | SHIFT, &format!("{base};4~"));
            self.prepare_key_mod_replace(key, fkey_offset(key, 24), CTRL, &format!("{base};5~"));
            self.prepare_key_mod_replace(key, fkey_offset(key, 36), CTRL | SHIFT, &format!("{base};6~"));
            self.prepare_key_mod(key, ALT | CTRL, &format!("{base};7~"));
            self.prepare_key_mod(key, SHIFT | ALT | CTRL, &format!("{base};8~"));
            self.prepare_key_mod(key, META, &format!("{base};9~"));
            self.prepare_key_mod(key, META | SHIFT, &format!("{base};10~"));
            self.prepare_key_mod(key, META | ALT, &format!("{base};11~"));
            self.prepare_key_mod(key, META | ALT | SHIFT, &format!("{base};12~"));
            self.prepare_key_mod(key, META | CTRL, &format!("{base};13~"));
            self.prepare_key_mod(key, META | CTRL | SHIFT, &format!("{base};14~"));
            self.prepare_key_mod(key, META | CTRL | ALT, &format!("{base};15~"));
            self.prepare_key_mod(key, META | CTRL | ALT | SHIFT, &format!("{base};16~"));
        } else if seq.len() == 3 && seq.starts_with("\x1bO") {
            let tail = &seq[2..];
            self.prepare_key_mod_replace(key, fkey_offset(key, 12), SHIFT, &format!("\x1b[1;2{tail}"));
            self.prepare_key_mod_replace(key, fkey_offset(key, 48), ALT, &format!("\x1b[1;3{tail}"));
            self.prepare_key_mod_replace(key, fkey_offset(key, 24), CTRL, &format!("\x1b[1;5{tail}"));
            self.prepare_key_mod_replace(key, fkey_offset(key, 36), CTRL | SHIFT, &format!("\x1b[1;6{tail}"));
            self.prepare_key_mod_replace(key, fkey_offset(key, 60), ALT | SHIFT, &format!("\x1b[1;4{tail}"));
            self.prepare_key_mod(key, ALT | CTRL, &format!("\x1b[1;7{tail}"));
            self.prepare_key_mod(key, SHIFT | ALT | CTRL, &format!("\x1b[1;8{tail}"));
            self.prepare_key_mod(key, META, &format!("\x1b[1;9{tail}"));
            self.prepare_key_mod(key, META | SHIFT, &format!("\x1b[1;10{tail}"));
            self.prepare_key_mod(key, META | ALT, &format!("\x1b[1;11{tail}"));
            self.prepare_key_mod(key, META | ALT | SHIFT, &format!("\x1b[1;12{tail}"));
            self.prepare_key_mod(key, META | CTRL, &format!("\x1b[1;13{tail}"));
            self.prepare_key_mod(key, META | CTRL | SHIFT, &format!("\x1b[1;14{tail}"));
            self.prepare_key_mod(key, META | CTRL | ALT, &format!("\x1b[1;15{tail}"));
            self.prepare_key_mod(key, META | CTRL | ALT | SHIFT, &format!("\x1b[1;16{tail}"));
        }
    }

    /// Register the bare control bytes nothing else has claimed.
    ///
    /// A byte that is the first byte of some registered sequence (ESC,
    /// most prominently) is left out: resolving it needs the quiet-time
    /// machinery, not a table hit.
    fn prepare_control_keys(&mut self) {
        'outer: for b in 0u8..0x20 {
            for seq in self.codes.keys() {
                if seq.first() == Some(&b) {
                    continue 'outer;
                }
            }
            let key = Key::from_control_byte(b);
            let mods = if key.is_bare_control() {
                ModMask::empty()
            } else {
                ModMask::CTRL
            };
            self.exist.insert(key);
            self.codes.insert(vec![b], KeyPress { key, mods });
        }
    }
}

/// XTerm `replace` target: the canonical F-key that sits `offset`
/// positions up the bank, when there is one.
fn fkey_offset(key: Key, offset: u8) -> Option<Key> {
    match key {
        Key::F(n) if n + offset <= 64 => Some(Key::F(n + offset)),
        _ => None,
    }
}
