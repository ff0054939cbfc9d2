//! Property tests for the cell grid.
//!
//! The contract under test: reads return exactly what was last written
//! (combining marks included), resizes preserve the overlap, and dirty
//! state is value-derived.

use proptest::prelude::*;

use termgrid_render::{CellBuffer, Color, Style};

const COMBINERS: [char; 3] = ['\u{0301}', '\u{0308}', '\u{20D7}'];

#[derive(Debug, Clone)]
struct Write {
    x: u16,
    y: u16,
    ch: char,
    comb: Vec<char>,
    style: Style,
}

fn write_strategy(w: u16, h: u16) -> impl Strategy<Value = Write> {
    (
        0..w,
        0..h,
        proptest::char::range('!', '~'),
        proptest::collection::vec(proptest::sample::select(&COMBINERS[..]), 0..3),
        0u8..16,
    )
        .prop_map(|(x, y, ch, comb, color)| Write {
            x,
            y,
            ch,
            comb,
            style: Style::default().foreground(Color::Palette(color)),
        })
}

proptest! {
    // For every sequence of writes, reads return the last write per cell.
    #[test]
    fn reads_return_last_write(
        writes in proptest::collection::vec(write_strategy(12, 6), 1..64)
    ) {
        let mut cb = CellBuffer::new();
        cb.resize(12, 6);
        for wr in &writes {
            cb.set_content(wr.x, wr.y, wr.ch, &wr.comb, wr.style);
        }

        // Last write wins, per cell.
        let mut last: std::collections::HashMap<(u16, u16), &Write> =
            std::collections::HashMap::new();
        for wr in &writes {
            last.insert((wr.x, wr.y), wr);
        }

        for ((x, y), wr) in last {
            let (main, comb, style, width) = cb.get_content(x, y).unwrap();
            prop_assert_eq!(main, wr.ch);
            prop_assert_eq!(comb, wr.comb.clone());
            prop_assert_eq!(style, wr.style);
            prop_assert_eq!(width, 1);
        }
    }

    // Shrinking then growing preserves whatever stayed inside the overlap.
    #[test]
    fn resize_preserves_overlap(
        writes in proptest::collection::vec(write_strategy(10, 8), 1..32),
        w2 in 1u16..16,
        h2 in 1u16..12,
    ) {
        let mut cb = CellBuffer::new();
        cb.resize(10, 8);
        for wr in &writes {
            cb.set_content(wr.x, wr.y, wr.ch, &wr.comb, wr.style);
        }
        let mut expected = std::collections::HashMap::new();
        for wr in &writes {
            if wr.x < w2 && wr.y < h2 {
                expected.insert((wr.x, wr.y), wr);
            }
        }

        cb.resize(w2, h2);
        prop_assert_eq!(cb.size(), (w2, h2));
        for ((x, y), wr) in expected {
            let (main, ..) = cb.get_content(x, y).unwrap();
            prop_assert_eq!(main, wr.ch);
        }
    }

    // Rewriting a cell with its current content never dirties it; any
    // change does.
    #[test]
    fn dirtiness_is_value_derived(wr in write_strategy(6, 4)) {
        let mut cb = CellBuffer::new();
        cb.resize(6, 4);
        cb.set_content(wr.x, wr.y, wr.ch, &wr.comb, wr.style);
        cb.set_dirty(wr.x, wr.y, false);

        cb.set_content(wr.x, wr.y, wr.ch, &wr.comb, wr.style);
        prop_assert!(!cb.dirty(wr.x, wr.y));

        let other = if wr.ch == '!' { '"' } else { '!' };
        cb.set_content(wr.x, wr.y, other, &wr.comb, wr.style);
        prop_assert!(cb.dirty(wr.x, wr.y));
    }
}

// ── Wide glyph boundaries ────────────────────────────────────────────

#[test]
fn wide_glyph_shadow_and_width() {
    let mut cb = CellBuffer::new();
    cb.resize(6, 1);
    cb.set_content(0, 0, '日', &[], Style::default());
    let (main, _, _, width) = cb.get_content(0, 0).unwrap();
    assert_eq!(main, '日');
    assert_eq!(width, 2);
    // The shadow column answers reads but owes its pixels to the glyph.
    assert!(cb.get_content(1, 0).is_some());
}

#[test]
fn invalidate_marks_the_whole_grid() {
    let mut cb = CellBuffer::new();
    cb.resize(4, 4);
    for y in 0..4 {
        for x in 0..4 {
            cb.set_dirty(x, y, false);
        }
    }
    cb.invalidate();
    let mut dirty = 0;
    for y in 0..4 {
        for x in 0..4 {
            if cb.dirty(x, y) {
                dirty += 1;
            }
        }
    }
    assert_eq!(dirty, 16);
}
