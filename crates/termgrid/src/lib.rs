#![forbid(unsafe_code)]

//! termgrid — a terminal screen engine.
//!
//! A bidirectional driver for character-cell terminals: it parses the
//! byte stream a terminal emulator sends into structured input events,
//! and renders a styled cell back-buffer to the terminal's output stream
//! through a capability database, minimising the bytes written.
//!
//! ```no_run
//! use termgrid::{Screen, Style, Color, Event, Key};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let screen = Screen::new()?;
//!     screen.init()?;
//!
//!     let style = Style::default().foreground(Color::Palette(2));
//!     for (i, ch) in "hello".chars().enumerate() {
//!         screen.set_content(i as u16, 0, ch, &[], style);
//!     }
//!     screen.show();
//!
//!     while let Some(ev) = screen.poll_event() {
//!         match ev {
//!             Event::Key(k) if k.key == Key::Esc => break,
//!             Event::Resize { .. } => screen.sync(),
//!             _ => {}
//!         }
//!     }
//!     screen.fini();
//!     Ok(())
//! }
//! ```

pub mod acs;
pub mod error;
mod pump;
mod screen;
#[cfg(unix)]
pub mod tty;

pub use error::ScreenError;
pub use screen::Screen;

pub use termgrid_core::{
    add_terminfo, lookup_terminfo, ButtonMask, Event, Key, KeyEvent, ModMask, MouseEvent,
    PasteEvent, Terminfo,
};
pub use termgrid_render::{AttrMask, Color, Style};
