#![forbid(unsafe_code)]

//! Alternate character set plumbing.
//!
//! VT100-era terminals draw lines by remapping printable ASCII while an
//! alternate character set is active. The capability record's alt-chars
//! string pairs each terminfo source byte with the byte to print; this
//! module knows which Unicode rune each source byte stands for, and
//! supplies plain-ASCII approximations for terminals that can do neither.

use std::collections::HashMap;

use termgrid_core::Terminfo;

/// Upper-left corner `┌`.
pub const RUNE_ULCORNER: char = '┌';
/// Upper-right corner `┐`.
pub const RUNE_URCORNER: char = '┐';
/// Lower-left corner `└`.
pub const RUNE_LLCORNER: char = '└';
/// Lower-right corner `┘`.
pub const RUNE_LRCORNER: char = '┘';
/// Horizontal line `─`.
pub const RUNE_HLINE: char = '─';
/// Vertical line `│`.
pub const RUNE_VLINE: char = '│';
/// Crossing lines `┼`.
pub const RUNE_PLUS: char = '┼';
/// Top tee `┬`.
pub const RUNE_TTEE: char = '┬';
/// Bottom tee `┴`.
pub const RUNE_BTEE: char = '┴';
/// Left tee `├`.
pub const RUNE_LTEE: char = '├';
/// Right tee `┤`.
pub const RUNE_RTEE: char = '┤';
/// Solid block `█`.
pub const RUNE_BLOCK: char = '█';
/// Diamond `◆`.
pub const RUNE_DIAMOND: char = '◆';
/// Checker board `▒`.
pub const RUNE_CKBOARD: char = '▒';
/// Board of squares `░`.
pub const RUNE_BOARD: char = '░';
/// Degree sign `°`.
pub const RUNE_DEGREE: char = '°';
/// Plus/minus `±`.
pub const RUNE_PLMINUS: char = '±';
/// Lantern `§`.
pub const RUNE_LANTERN: char = '§';
/// Scan line 1 `⎺`.
pub const RUNE_S1: char = '⎺';
/// Scan line 3 `⎻`.
pub const RUNE_S3: char = '⎻';
/// Scan line 7 `⎼`.
pub const RUNE_S7: char = '⎼';
/// Scan line 9 `⎽`.
pub const RUNE_S9: char = '⎽';
/// Less-than-or-equal `≤`.
pub const RUNE_LEQUAL: char = '≤';
/// Greater-than-or-equal `≥`.
pub const RUNE_GEQUAL: char = '≥';
/// Pi `π`.
pub const RUNE_PI: char = 'π';
/// Not-equal `≠`.
pub const RUNE_NEQUAL: char = '≠';
/// Sterling `£`.
pub const RUNE_STERLING: char = '£';
/// Bullet `·`.
pub const RUNE_BULLET: char = '·';
/// Up arrow `↑`.
pub const RUNE_UARROW: char = '↑';
/// Down arrow `↓`.
pub const RUNE_DARROW: char = '↓';
/// Left arrow `←`.
pub const RUNE_LARROW: char = '←';
/// Right arrow `→`.
pub const RUNE_RARROW: char = '→';

/// The Unicode rune a terminfo alt-chars source byte stands for.
///
/// The `b`..`e` entries are VT100 control pictures terminfo never names.
#[must_use]
pub fn vt_acs_rune(src: u8) -> Option<char> {
    Some(match src {
        b'+' => RUNE_RARROW,
        b',' => RUNE_LARROW,
        b'-' => RUNE_UARROW,
        b'.' => RUNE_DARROW,
        b'0' => RUNE_BLOCK,
        b'`' => RUNE_DIAMOND,
        b'a' => RUNE_CKBOARD,
        b'b' => '␉',
        b'c' => '␌',
        b'd' => '␋',
        b'e' => '␊',
        b'f' => RUNE_DEGREE,
        b'g' => RUNE_PLMINUS,
        b'h' => RUNE_BOARD,
        b'i' => RUNE_LANTERN,
        b'j' => RUNE_LRCORNER,
        b'k' => RUNE_URCORNER,
        b'l' => RUNE_ULCORNER,
        b'm' => RUNE_LLCORNER,
        b'n' => RUNE_PLUS,
        b'o' => RUNE_S1,
        b'p' => RUNE_S3,
        b'q' => RUNE_HLINE,
        b'r' => RUNE_S7,
        b's' => RUNE_S9,
        b't' => RUNE_LTEE,
        b'u' => RUNE_RTEE,
        b'v' => RUNE_BTEE,
        b'w' => RUNE_TTEE,
        b'x' => RUNE_VLINE,
        b'y' => RUNE_LEQUAL,
        b'z' => RUNE_GEQUAL,
        b'{' => RUNE_PI,
        b'|' => RUNE_NEQUAL,
        b'}' => RUNE_STERLING,
        b'~' => RUNE_BULLET,
        _ => return None,
    })
}

/// Build the rune → output-bytes map for a terminal's drawing set.
///
/// Each entry is the full `enter-acs, glyph, exit-acs` sandwich so the
/// renderer can emit it wholesale when the encoder cannot represent the
/// rune directly.
#[must_use]
pub fn build_acs_map(ti: &Terminfo) -> HashMap<char, String> {
    let mut map = HashMap::new();
    let bytes = ti.alt_chars.as_bytes();
    let mut pairs = bytes.chunks_exact(2);
    for pair in &mut pairs {
        if let Some(rune) = vt_acs_rune(pair[0]) {
            map.insert(
                rune,
                format!("{}{}{}", ti.enter_acs, pair[1] as char, ti.exit_acs),
            );
        }
    }
    map
}

/// Plain-ASCII stand-ins for the drawing runes, used when neither the
/// encoder nor the ACS can produce a glyph.
#[must_use]
pub fn default_rune_fallbacks() -> HashMap<char, String> {
    let pairs: &[(char, &str)] = &[
        (RUNE_STERLING, "f"),
        (RUNE_DARROW, "v"),
        (RUNE_LARROW, "<"),
        (RUNE_RARROW, ">"),
        (RUNE_UARROW, "^"),
        (RUNE_BULLET, "o"),
        (RUNE_BOARD, "#"),
        (RUNE_CKBOARD, ":"),
        (RUNE_DEGREE, "\\"),
        (RUNE_DIAMOND, "+"),
        (RUNE_GEQUAL, ">"),
        (RUNE_PI, "*"),
        (RUNE_HLINE, "-"),
        (RUNE_LANTERN, "#"),
        (RUNE_PLUS, "+"),
        (RUNE_LEQUAL, "<"),
        (RUNE_LLCORNER, "+"),
        (RUNE_LRCORNER, "+"),
        (RUNE_NEQUAL, "!"),
        (RUNE_PLMINUS, "#"),
        (RUNE_S1, "~"),
        (RUNE_S3, "-"),
        (RUNE_S7, "-"),
        (RUNE_S9, "_"),
        (RUNE_BLOCK, "#"),
        (RUNE_TTEE, "+"),
        (RUNE_RTEE, "+"),
        (RUNE_LTEE, "+"),
        (RUNE_BTEE, "+"),
        (RUNE_ULCORNER, "+"),
        (RUNE_URCORNER, "+"),
        (RUNE_VLINE, "|"),
    ];
    pairs.iter().map(|&(r, s)| (r, s.to_string())).collect()
}
