#![forbid(unsafe_code)]

//! The cell grid.
//!
//! A dense `W×H` array of [`Cell`]s in row-major order.
//!
//! # Invariants
//!
//! 1. `cells.len() == w * h`.
//! 2. A cell of width 2 owns the column to its right: that column is
//!    shadowed and the renderer never draws it independently.
//! 3. Resizing preserves content inside the overlap region; fresh cells
//!    are blank and dirty.
//! 4. Dirtiness is value-derived: rewriting identical content leaves a
//!    cell clean.

use crate::cell::{rune_width, Cell, CellContent, CombSeq};
use crate::style::Style;

/// A 2-D grid of styled cells with per-cell dirty tracking.
#[derive(Debug, Default)]
pub struct CellBuffer {
    w: u16,
    h: u16,
    cells: Vec<Cell>,
}

impl CellBuffer {
    /// Create an empty (0×0) buffer; size it with [`resize`](Self::resize).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grid dimensions.
    #[must_use]
    pub fn size(&self) -> (u16, u16) {
        (self.w, self.h)
    }

    fn index(&self, x: u16, y: u16) -> Option<usize> {
        if x < self.w && y < self.h {
            Some(usize::from(y) * usize::from(self.w) + usize::from(x))
        } else {
            None
        }
    }

    /// Resize to `w × h`, preserving the overlap region.
    ///
    /// Every surviving cell is marked dirty: after a resize the terminal's
    /// notion of the screen is unknown.
    pub fn resize(&mut self, w: u16, h: u16) {
        if w == self.w && h == self.h {
            return;
        }
        let mut cells = vec![Cell::default(); usize::from(w) * usize::from(h)];
        let copy_w = self.w.min(w);
        let copy_h = self.h.min(h);
        for y in 0..copy_h {
            for x in 0..copy_w {
                let old = usize::from(y) * usize::from(self.w) + usize::from(x);
                let new = usize::from(y) * usize::from(w) + usize::from(x);
                cells[new] = self.cells[old].clone();
                cells[new].last = None;
            }
        }
        self.cells = cells;
        self.w = w;
        self.h = h;
    }

    /// Fill the whole grid with one rune and style.
    pub fn fill(&mut self, ch: char, style: Style) {
        let width = rune_width(ch).max(1);
        for cell in &mut self.cells {
            cell.curr = CellContent {
                main: ch,
                comb: CombSeq::new(),
                style,
            };
            cell.width = width;
        }
    }

    /// Set the content of one cell. Out-of-range writes are ignored.
    ///
    /// A zero-width `main` attaches to the owning cell to its left (the
    /// cell before, or the one before that when the immediate neighbour is
    /// the shadow of a wide glyph) instead of occupying a column.
    pub fn set_content(&mut self, x: u16, y: u16, main: char, comb: &[char], style: Style) {
        let Some(idx) = self.index(x, y) else {
            return;
        };

        if rune_width(main) == 0 && main >= ' ' {
            // Combining mark: find the owner and append.
            if x == 0 {
                return;
            }
            let owner_x = if x >= 2
                && self
                    .index(x - 2, y)
                    .is_some_and(|i| self.cells[i].width == 2)
            {
                x - 2
            } else {
                x - 1
            };
            if let Some(owner) = self.index(owner_x, y) {
                let cell = &mut self.cells[owner];
                cell.curr.comb.push(main);
                cell.curr.comb.extend_from_slice(comb);
                cell.curr.style = style;
            }
            return;
        }

        let cell = &mut self.cells[idx];
        if cell.curr.main != main {
            cell.width = rune_width(main);
        }
        cell.curr.main = main;
        cell.curr.comb = CombSeq::from_slice(comb);
        cell.curr.style = style;
        let wide = cell.width == 2;

        // The column shadowed by a wide glyph must repaint with it.
        if wide {
            if let Some(shadow) = self.index(x + 1, y) {
                self.cells[shadow].last = None;
            }
        }
    }

    /// Read one cell back: (main, combining, style, width).
    ///
    /// In-range cells always answer; zero-width or control mains read as a
    /// single-width space for rendering purposes.
    #[must_use]
    pub fn get_content(&self, x: u16, y: u16) -> Option<(char, Vec<char>, Style, u8)> {
        let idx = self.index(x, y)?;
        let cell = &self.cells[idx];
        let mut main = cell.curr.main;
        let mut width = cell.width;
        if width == 0 || main < ' ' {
            width = 1;
            main = ' ';
        }
        Some((main, cell.curr.comb.to_vec(), cell.curr.style, width))
    }

    /// Whether the cell at (x, y) needs repainting.
    #[must_use]
    pub fn dirty(&self, x: u16, y: u16) -> bool {
        self.index(x, y)
            .map(|idx| self.cells[idx].dirty())
            .unwrap_or(false)
    }

    /// Force or clear one cell's dirty state.
    ///
    /// Clearing snapshots the current content as "what the terminal
    /// shows"; forcing discards the snapshot.
    pub fn set_dirty(&mut self, x: u16, y: u16, dirty: bool) {
        if let Some(idx) = self.index(x, y) {
            let cell = &mut self.cells[idx];
            cell.last = if dirty { None } else { Some(cell.curr.clone()) };
        }
    }

    /// Mark every cell dirty.
    pub fn invalidate(&mut self) {
        for cell in &mut self.cells {
            cell.last = None;
        }
    }
}
