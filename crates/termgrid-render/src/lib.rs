#![forbid(unsafe_code)]

//! Cell grid and styling for the termgrid terminal screen engine.
//!
//! The [`CellBuffer`] is the back-buffer the screen facade mutates and the
//! renderer reads; [`Style`] and [`Color`] describe how each cell should
//! look. Nothing in this crate touches a terminal: it is pure data, which
//! is what makes the renderer's minimal-update diffing testable.

pub mod buffer;
pub mod cell;
pub mod color;
pub mod style;

pub use buffer::CellBuffer;
pub use cell::{rune_width, CombSeq};
pub use color::{find_color, palette_rgb, Color};
pub use style::{AttrMask, Style};
