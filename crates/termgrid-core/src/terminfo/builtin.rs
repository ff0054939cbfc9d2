#![forbid(unsafe_code)]

//! The built-in capability database.
//!
//! Two xterm flavours cover the terminals the engine is expected to meet in
//! practice; anything else can be registered at runtime with
//! [`add_terminfo`](super::add_terminfo).

use std::collections::HashMap;

use super::{Modifiers, Terminfo};

/// Build the initial registry contents.
#[must_use]
pub fn database() -> HashMap<String, Terminfo> {
    let mut map = HashMap::new();
    for ti in [xterm(), xterm_256color()] {
        for alias in &ti.aliases {
            map.insert(alias.clone(), ti.clone());
        }
        map.insert(ti.name.clone(), ti);
    }
    map
}

/// Shared xterm plumbing; colour capabilities differ per flavour.
fn xterm_base() -> Terminfo {
    Terminfo {
        columns: 80,
        lines: 24,

        bell: "\u{7}".into(),
        clear: "\x1b[H\x1b[2J".into(),
        enter_ca: "\x1b[?1049h".into(),
        exit_ca: "\x1b[?1049l".into(),
        show_cursor: "\x1b[?12l\x1b[?25h".into(),
        hide_cursor: "\x1b[?25l".into(),
        attr_off: "\x1b(B\x1b[m".into(),
        bold: "\x1b[1m".into(),
        dim: "\x1b[2m".into(),
        italic: "\x1b[3m".into(),
        underline: "\x1b[4m".into(),
        blink: "\x1b[5m".into(),
        reverse: "\x1b[7m".into(),
        strikethrough: "\x1b[9m".into(),
        enter_keypad: "\x1b[?1h\x1b=".into(),
        exit_keypad: "\x1b[?1l\x1b>".into(),
        reset_fg_bg: "\x1b[39;49m".into(),

        enter_acs: "\x1b(0".into(),
        exit_acs: "\x1b(B".into(),
        enable_acs: "\x1b(B\x1b)0".into(),
        alt_chars: "``aaffggiijjkkllmmnnooppqqrrssttuuvvwwxxyyzz{{||}}~~".into(),

        mouse: "\x1b[<".into(),
        mouse_mode:
            "%?%p1%{1}%=%t%'h'%Pa%e%'l'%Pa%;\x1b[?1000%ga%c\x1b[?1002%ga%c\x1b[?1003%ga%c\x1b[?1006%ga%c"
                .into(),

        set_cursor: "\x1b[%i%p1%d;%p2%dH".into(),
        modifiers: Modifiers::XTerm,

        key_backspace: "\u{7f}".into(),
        key_f: fkeys(),
        key_insert: "\x1b[2~".into(),
        key_delete: "\x1b[3~".into(),
        key_home: "\x1bOH".into(),
        key_end: "\x1bOF".into(),
        key_pgup: "\x1b[5~".into(),
        key_pgdn: "\x1b[6~".into(),
        key_up: "\x1bOA".into(),
        key_down: "\x1bOB".into(),
        key_right: "\x1bOC".into(),
        key_left: "\x1bOD".into(),
        key_backtab: "\x1b[Z".into(),

        key_shf_up: "\x1b[1;2A".into(),
        key_shf_down: "\x1b[1;2B".into(),
        key_shf_right: "\x1b[1;2C".into(),
        key_shf_left: "\x1b[1;2D".into(),
        key_shf_home: "\x1b[1;2H".into(),
        key_shf_end: "\x1b[1;2F".into(),
        key_shf_pgup: "\x1b[5;2~".into(),
        key_shf_pgdn: "\x1b[6;2~".into(),

        key_ctrl_up: "\x1b[1;5A".into(),
        key_ctrl_down: "\x1b[1;5B".into(),
        key_ctrl_right: "\x1b[1;5C".into(),
        key_ctrl_left: "\x1b[1;5D".into(),
        key_ctrl_home: "\x1b[1;5H".into(),
        key_ctrl_end: "\x1b[1;5F".into(),

        ..Terminfo::default()
    }
}

/// Plain 8-colour xterm.
#[must_use]
pub fn xterm() -> Terminfo {
    Terminfo {
        name: "xterm".into(),
        colors: 8,
        set_fg: "\x1b[3%p1%dm".into(),
        set_bg: "\x1b[4%p1%dm".into(),
        set_fg_bg: "\x1b[3%p1%d;4%p2%dm".into(),
        ..xterm_base()
    }
}

/// 256-colour xterm, with direct-colour escapes.
#[must_use]
pub fn xterm_256color() -> Terminfo {
    Terminfo {
        name: "xterm-256color".into(),
        colors: 256,
        set_fg: "\x1b[%?%p1%{8}%<%t3%p1%d%e%p1%{16}%<%t9%p1%{8}%-%d%e38;5;%p1%d%;m".into(),
        set_bg: "\x1b[%?%p1%{8}%<%t4%p1%d%e%p1%{16}%<%t10%p1%{8}%-%d%e48;5;%p1%d%;m".into(),
        set_fg_bg: "\x1b[%?%p1%{8}%<%t3%p1%d%e%p1%{16}%<%t9%p1%{8}%-%d%e38;5;%p1%d%;;%?%p2%{8}%<%t4%p2%d%e%p2%{16}%<%t10%p2%{8}%-%d%e48;5;%p2%d%;m".into(),
        set_fg_rgb: "\x1b[38;2;%p1%d;%p2%d;%p3%dm".into(),
        set_bg_rgb: "\x1b[48;2;%p1%d;%p2%d;%p3%dm".into(),
        set_fg_bg_rgb: "\x1b[38;2;%p1%d;%p2%d;%p3%d;48;2;%p4%d;%p5%d;%p6%dm".into(),
        ..xterm_base()
    }
}

/// F1..=F64 capability strings following the xterm PC-style convention:
/// F13..F64 are F1..F12 decorated with a modifier suffix.
fn fkeys() -> Vec<String> {
    const BASE: [&str; 12] = [
        "\x1bOP", "\x1bOQ", "\x1bOR", "\x1bOS", "\x1b[15~", "\x1b[17~", "\x1b[18~", "\x1b[19~",
        "\x1b[20~", "\x1b[21~", "\x1b[23~", "\x1b[24~",
    ];
    // Modifier parameter per 12-key bank: shift, ctrl, ctrl+shift, alt, alt+shift.
    const BANK_MOD: [u8; 5] = [2, 5, 6, 3, 4];

    let mut keys: Vec<String> = BASE.iter().map(|s| (*s).to_string()).collect();
    for &modifier in &BANK_MOD {
        for base in &BASE {
            if keys.len() >= 64 {
                break;
            }
            keys.push(with_xterm_modifier(base, modifier));
        }
    }
    keys
}

/// Decorate an F-key sequence with an xterm modifier parameter.
fn with_xterm_modifier(seq: &str, modifier: u8) -> String {
    if let Some(rest) = seq.strip_prefix("\x1bO") {
        // SS3 form becomes CSI 1;m X
        format!("\x1b[1;{modifier}{rest}")
    } else if let Some(body) = seq.strip_suffix('~') {
        format!("{body};{modifier}~")
    } else {
        seq.to_string()
    }
}
