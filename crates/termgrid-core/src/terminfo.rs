#![forbid(unsafe_code)]

//! Terminal capability records.
//!
//! A [`Terminfo`] describes one terminal type: the escape strings it
//! understands, its palette size, and the byte sequences its keys send.
//! Records live in a process-wide registry, lazily initialised from the
//! built-in database and augmentable through [`add_terminfo`].
//!
//! Parametrised capabilities use the terminfo `%` stack language;
//! [`parm`] interprets the subset every built-in capability needs:
//!
//! ```text
//! %%   literal percent          %i   increment first two params
//! %pN  push parameter N         %d   pop, print decimal
//! %c   pop, print as char       %{n} push integer literal
//! %'c' push char literal        %PN  pop into variable N
//! %gN  push variable N          %+ %- %* %/ %m   arithmetic
//! %= %< %>  comparisons         %A %O  logical and/or
//! %! %~     unary not/complement
//! %? expr %t then %e else %;    conditionals (nesting allowed)
//! ```

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

pub mod builtin;

/// How this terminal reports modified function/navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Modifiers {
    /// No modifier reporting beyond dedicated capability strings.
    #[default]
    None,
    /// XTerm PC-style modifier suffixes (`;2` .. `;16`).
    XTerm,
    /// Dedicated capability strings for each modifier combination.
    Dynamic,
}

/// A terminal capability record.
///
/// Empty strings mean "capability absent". Key capability strings are the
/// byte sequences the terminal *sends*; everything else is what the engine
/// *emits*.
#[derive(Debug, Clone, Default)]
pub struct Terminfo {
    /// Primary name (the `TERM` value).
    pub name: String,
    /// Alternate names this record also answers to.
    pub aliases: Vec<String>,

    /// Default width when the window size cannot be queried.
    pub columns: u16,
    /// Default height when the window size cannot be queried.
    pub lines: u16,
    /// Palette size (8, 16, 256, ...). Zero means no colour.
    pub colors: u16,

    /// Audible bell.
    pub bell: String,
    /// Clear screen and home the cursor.
    pub clear: String,
    /// Enter the alternate screen.
    pub enter_ca: String,
    /// Leave the alternate screen.
    pub exit_ca: String,
    /// Make the cursor visible.
    pub show_cursor: String,
    /// Hide the cursor.
    pub hide_cursor: String,
    /// Reset every attribute and colour.
    pub attr_off: String,
    /// Enter bold.
    pub bold: String,
    /// Enter underline.
    pub underline: String,
    /// Enter reverse video.
    pub reverse: String,
    /// Enter blink.
    pub blink: String,
    /// Enter dim.
    pub dim: String,
    /// Enter italic.
    pub italic: String,
    /// Enter strikethrough.
    pub strikethrough: String,
    /// Enter application keypad mode.
    pub enter_keypad: String,
    /// Leave application keypad mode.
    pub exit_keypad: String,

    /// Set foreground to palette index `%p1`.
    pub set_fg: String,
    /// Set background to palette index `%p1`.
    pub set_bg: String,
    /// Set foreground and background in one sequence (`%p1`, `%p2`).
    pub set_fg_bg: String,
    /// Reset foreground and background to the terminal defaults.
    pub reset_fg_bg: String,
    /// Set foreground to RGB `%p1 %p2 %p3`.
    pub set_fg_rgb: String,
    /// Set background to RGB `%p1 %p2 %p3`.
    pub set_bg_rgb: String,
    /// Set both sides to RGB (`%p1..%p3` fg, `%p4..%p6` bg).
    pub set_fg_bg_rgb: String,

    /// Enter the alternate character set.
    pub enter_acs: String,
    /// Leave the alternate character set.
    pub exit_acs: String,
    /// Arm the alternate character set (emitted once at init).
    pub enable_acs: String,
    /// Pairs of (source byte, ACS byte) describing the drawing set.
    pub alt_chars: String,

    /// Prefix identifying this terminal's mouse reports.
    pub mouse: String,
    /// Mouse reporting on/off template (`%p1` = 1 to enable, 0 to disable).
    pub mouse_mode: String,

    /// Cursor positioning template (`%p1` = row, `%p2` = column).
    pub set_cursor: String,

    /// Modifier reporting style.
    pub modifiers: Modifiers,

    /// Backspace key.
    pub key_backspace: String,
    /// Function keys F1..=F64 (index 0 is F1). Always 64 entries.
    pub key_f: Vec<String>,
    /// Insert key.
    pub key_insert: String,
    /// Delete key.
    pub key_delete: String,
    /// Home key.
    pub key_home: String,
    /// End key.
    pub key_end: String,
    /// Page Up key.
    pub key_pgup: String,
    /// Page Down key.
    pub key_pgdn: String,
    /// Up arrow.
    pub key_up: String,
    /// Down arrow.
    pub key_down: String,
    /// Left arrow.
    pub key_left: String,
    /// Right arrow.
    pub key_right: String,
    /// Help key.
    pub key_help: String,
    /// Print key.
    pub key_print: String,
    /// Cancel key.
    pub key_cancel: String,
    /// Exit key.
    pub key_exit: String,
    /// Shift-Tab.
    pub key_backtab: String,

    /// Shift-modified navigation keys.
    pub key_shf_up: String,
    /// See [`Terminfo::key_shf_up`].
    pub key_shf_down: String,
    /// See [`Terminfo::key_shf_up`].
    pub key_shf_left: String,
    /// See [`Terminfo::key_shf_up`].
    pub key_shf_right: String,
    /// See [`Terminfo::key_shf_up`].
    pub key_shf_home: String,
    /// See [`Terminfo::key_shf_up`].
    pub key_shf_end: String,
    /// See [`Terminfo::key_shf_up`].
    pub key_shf_pgup: String,
    /// See [`Terminfo::key_shf_up`].
    pub key_shf_pgdn: String,

    /// Ctrl-modified navigation keys.
    pub key_ctrl_up: String,
    /// See [`Terminfo::key_ctrl_up`].
    pub key_ctrl_down: String,
    /// See [`Terminfo::key_ctrl_up`].
    pub key_ctrl_left: String,
    /// See [`Terminfo::key_ctrl_up`].
    pub key_ctrl_right: String,
    /// See [`Terminfo::key_ctrl_up`].
    pub key_ctrl_home: String,
    /// See [`Terminfo::key_ctrl_up`].
    pub key_ctrl_end: String,

    // Dedicated modifier strings, consulted only under Modifiers::Dynamic.
    /// Meta-modified arrows (Dynamic terminals only).
    pub key_meta_up: String,
    /// See [`Terminfo::key_meta_up`].
    pub key_meta_down: String,
    /// See [`Terminfo::key_meta_up`].
    pub key_meta_left: String,
    /// See [`Terminfo::key_meta_up`].
    pub key_meta_right: String,
    /// Alt-modified arrows (Dynamic terminals only).
    pub key_alt_up: String,
    /// See [`Terminfo::key_alt_up`].
    pub key_alt_down: String,
    /// See [`Terminfo::key_alt_up`].
    pub key_alt_left: String,
    /// See [`Terminfo::key_alt_up`].
    pub key_alt_right: String,
    /// Alt+Shift arrows (Dynamic terminals only).
    pub key_alt_shf_up: String,
    /// See [`Terminfo::key_alt_shf_up`].
    pub key_alt_shf_down: String,
    /// See [`Terminfo::key_alt_shf_up`].
    pub key_alt_shf_left: String,
    /// See [`Terminfo::key_alt_shf_up`].
    pub key_alt_shf_right: String,
    /// Meta+Shift arrows (Dynamic terminals only).
    pub key_meta_shf_up: String,
    /// See [`Terminfo::key_meta_shf_up`].
    pub key_meta_shf_down: String,
    /// See [`Terminfo::key_meta_shf_up`].
    pub key_meta_shf_left: String,
    /// See [`Terminfo::key_meta_shf_up`].
    pub key_meta_shf_right: String,
    /// Ctrl+Shift arrows (Dynamic terminals only).
    pub key_ctrl_shf_up: String,
    /// See [`Terminfo::key_ctrl_shf_up`].
    pub key_ctrl_shf_down: String,
    /// See [`Terminfo::key_ctrl_shf_up`].
    pub key_ctrl_shf_left: String,
    /// See [`Terminfo::key_ctrl_shf_up`].
    pub key_ctrl_shf_right: String,
    /// Alt Home/End (Dynamic terminals only).
    pub key_alt_home: String,
    /// See [`Terminfo::key_alt_home`].
    pub key_alt_end: String,
    /// Ctrl+Shift Home/End (Dynamic terminals only).
    pub key_ctrl_shf_home: String,
    /// See [`Terminfo::key_ctrl_shf_home`].
    pub key_ctrl_shf_end: String,
    /// Alt+Shift Home/End (Dynamic terminals only).
    pub key_alt_shf_home: String,
    /// See [`Terminfo::key_alt_shf_home`].
    pub key_alt_shf_end: String,
    /// Meta+Shift Home/End (Dynamic terminals only).
    pub key_meta_shf_home: String,
    /// See [`Terminfo::key_meta_shf_home`].
    pub key_meta_shf_end: String,
}

impl Terminfo {
    /// Expand a parametrised capability against `params`.
    #[must_use]
    pub fn tparm(&self, template: &str, params: &[i64]) -> String {
        parm(template, params)
    }

    /// Cursor positioning sequence for column `x`, row `y` (0-indexed).
    #[must_use]
    pub fn tgoto(&self, x: u16, y: u16) -> String {
        parm(&self.set_cursor, &[i64::from(y), i64::from(x)])
    }

    /// The F-key capability string for `n` in 1..=64, or "" when absent.
    #[must_use]
    pub fn key_fn(&self, n: u8) -> &str {
        debug_assert!((1..=64).contains(&n));
        self.key_f
            .get(usize::from(n) - 1)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Whether any RGB capability is present.
    #[must_use]
    pub fn has_rgb(&self) -> bool {
        !self.set_fg_bg_rgb.is_empty() || !self.set_fg_rgb.is_empty() || !self.set_bg_rgb.is_empty()
    }
}

/// Capability database failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminfoError {
    /// No record for the requested terminal name.
    NotFound(String),
}

impl std::fmt::Display for TerminfoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(name) => write!(f, "no terminal capability record for {name:?}"),
        }
    }
}

impl std::error::Error for TerminfoError {}

fn registry() -> &'static RwLock<HashMap<String, Terminfo>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, Terminfo>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(builtin::database()))
}

/// Look up the capability record for a terminal name.
///
/// Tries the exact name first, then the name with its final `-suffix`
/// stripped (so `xterm-256color-italic` finds `xterm-256color`).
pub fn lookup_terminfo(name: &str) -> Result<Terminfo, TerminfoError> {
    if name.is_empty() {
        return Err(TerminfoError::NotFound(String::new()));
    }
    let map = registry().read().unwrap_or_else(|e| e.into_inner());
    if let Some(ti) = map.get(name) {
        return Ok(ti.clone());
    }
    if let Some((base, _)) = name.rsplit_once('-') {
        if let Some(ti) = map.get(base) {
            tracing::debug!(term = name, base, "terminfo fallback to base entry");
            return Ok(ti.clone());
        }
    }
    Err(TerminfoError::NotFound(name.to_string()))
}

/// Register a capability record under its name and aliases.
///
/// An existing entry with the same name is replaced.
pub fn add_terminfo(ti: Terminfo) {
    let mut map = registry().write().unwrap_or_else(|e| e.into_inner());
    for alias in &ti.aliases {
        map.insert(alias.clone(), ti.clone());
    }
    map.insert(ti.name.clone(), ti);
}

/// Strip `$<ms>` padding indications from a capability string.
///
/// Padding delays exist for hardware terminals; none of the supported
/// terminals need them, so they are removed rather than slept through.
#[must_use]
pub fn strip_padding(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'<' {
            match bytes[i + 2..].iter().position(|&b| b == b'>') {
                Some(end) => {
                    i += end + 3;
                    continue;
                }
                None => {}
            }
        }
        let ch_len = s[i..].chars().next().map_or(1, char::len_utf8);
        out.push_str(&s[i..i + ch_len]);
        i += ch_len;
    }
    out
}

/// Interpret a terminfo `%` template. See the module docs for the
/// supported operator set.
#[must_use]
pub fn parm(template: &str, params: &[i64]) -> String {
    let mut ps = [0i64; 9];
    for (i, p) in params.iter().take(9).enumerate() {
        ps[i] = *p;
    }

    let bytes = template.as_bytes();
    let mut out = Vec::with_capacity(template.len());
    let mut stack: Vec<i64> = Vec::new();
    let mut vars = [0i64; 52];
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        i += 1;
        if i >= bytes.len() {
            break;
        }
        let op = bytes[i];
        i += 1;
        match op {
            b'%' => out.push(b'%'),
            b'i' => {
                ps[0] += 1;
                ps[1] += 1;
            }
            b'p' => {
                if i < bytes.len() && bytes[i].is_ascii_digit() {
                    let n = usize::from(bytes[i] - b'0');
                    stack.push(if (1..=9).contains(&n) { ps[n - 1] } else { 0 });
                    i += 1;
                }
            }
            b'd' => {
                let v = stack.pop().unwrap_or(0);
                out.extend_from_slice(v.to_string().as_bytes());
            }
            b'c' => {
                let v = stack.pop().unwrap_or(0);
                out.push((v & 0xFF) as u8);
            }
            b'{' => {
                let mut v: i64 = 0;
                let mut neg = false;
                if i < bytes.len() && bytes[i] == b'-' {
                    neg = true;
                    i += 1;
                }
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    v = v * 10 + i64::from(bytes[i] - b'0');
                    i += 1;
                }
                if i < bytes.len() && bytes[i] == b'}' {
                    i += 1;
                }
                stack.push(if neg { -v } else { v });
            }
            b'\'' => {
                if i < bytes.len() {
                    stack.push(i64::from(bytes[i]));
                    i += 1;
                }
                if i < bytes.len() && bytes[i] == b'\'' {
                    i += 1;
                }
            }
            b'P' => {
                if i < bytes.len() {
                    if let Some(slot) = var_slot(bytes[i]) {
                        vars[slot] = stack.pop().unwrap_or(0);
                    }
                    i += 1;
                }
            }
            b'g' => {
                if i < bytes.len() {
                    let v = var_slot(bytes[i]).map_or(0, |slot| vars[slot]);
                    stack.push(v);
                    i += 1;
                }
            }
            b'+' | b'-' | b'*' | b'/' | b'm' | b'=' | b'<' | b'>' | b'A' | b'O' => {
                let b = stack.pop().unwrap_or(0);
                let a = stack.pop().unwrap_or(0);
                let v = match op {
                    b'+' => a.wrapping_add(b),
                    b'-' => a.wrapping_sub(b),
                    b'*' => a.wrapping_mul(b),
                    b'/' => {
                        if b == 0 {
                            0
                        } else {
                            a / b
                        }
                    }
                    b'm' => {
                        if b == 0 {
                            0
                        } else {
                            a % b
                        }
                    }
                    b'=' => i64::from(a == b),
                    b'<' => i64::from(a < b),
                    b'>' => i64::from(a > b),
                    b'A' => i64::from(a != 0 && b != 0),
                    _ => i64::from(a != 0 || b != 0),
                };
                stack.push(v);
            }
            b'!' => {
                let a = stack.pop().unwrap_or(0);
                stack.push(i64::from(a == 0));
            }
            b'~' => {
                let a = stack.pop().unwrap_or(0);
                stack.push(!a);
            }
            b'?' | b';' => {}
            b't' => {
                let cond = stack.pop().unwrap_or(0);
                if cond == 0 {
                    i = skip_branch(bytes, i, true);
                }
            }
            b'e' => {
                // The then-branch just finished; skip the else-branch.
                i = skip_branch(bytes, i, false);
            }
            _ => {
                // Unknown operator: emit verbatim so malformed templates
                // stay visible instead of silently vanishing.
                out.push(b'%');
                out.push(op);
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Skip forward past a conditional branch.
///
/// With `stop_at_else` the scan ends just after a `%e` at the current
/// nesting depth (false condition: execution resumes in the else-branch);
/// either way it ends just after the matching `%;`.
fn skip_branch(bytes: &[u8], mut i: usize, stop_at_else: bool) -> usize {
    let mut depth = 0usize;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        i += 1;
        if i >= bytes.len() {
            break;
        }
        let op = bytes[i];
        i += 1;
        match op {
            b'?' => depth += 1,
            b';' => {
                if depth == 0 {
                    return i;
                }
                depth -= 1;
            }
            b'e' if depth == 0 && stop_at_else => return i,
            b'{' => {
                while i < bytes.len() && bytes[i] != b'}' {
                    i += 1;
                }
                i += 1;
            }
            b'\'' => {
                i += 2;
            }
            _ => {}
        }
    }
    i
}

fn var_slot(name: u8) -> Option<usize> {
    match name {
        b'a'..=b'z' => Some(usize::from(name - b'a')),
        b'A'..=b'Z' => Some(26 + usize::from(name - b'A')),
        _ => None,
    }
}
