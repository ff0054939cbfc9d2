#![forbid(unsafe_code)]

//! Styles: a foreground, a background, and an attribute set.

use bitflags::bitflags;

use crate::color::Color;

bitflags! {
    /// Text attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AttrMask: u8 {
        /// Bold (or bright).
        const BOLD = 0b0000_0001;
        /// Blinking.
        const BLINK = 0b0000_0010;
        /// Reverse video.
        const REVERSE = 0b0000_0100;
        /// Underline.
        const UNDERLINE = 0b0000_1000;
        /// Dim (half-bright).
        const DIM = 0b0001_0000;
        /// Italic.
        const ITALIC = 0b0010_0000;
        /// Struck through.
        const STRIKETHROUGH = 0b0100_0000;
        /// Sentinel bit: never emitted, never set by callers. A style
        /// carrying it compares unequal to every real style, which is how
        /// the renderer forces an attribute re-emit.
        const INVALID = 0b1000_0000;
    }
}

/// A cell style.
///
/// `Style::default()` means "the screen's default style": the renderer
/// substitutes the screen-wide style for it at draw time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Style {
    fg: Color,
    bg: Color,
    attrs: AttrMask,
}

impl Style {
    /// The sentinel that forces the renderer to re-emit attributes.
    pub const INVALID: Style = Style {
        fg: Color::Default,
        bg: Color::Default,
        attrs: AttrMask::INVALID,
    };

    /// Replace the foreground colour.
    #[must_use]
    pub const fn foreground(mut self, fg: Color) -> Self {
        self.fg = fg;
        self
    }

    /// Replace the background colour.
    #[must_use]
    pub const fn background(mut self, bg: Color) -> Self {
        self.bg = bg;
        self
    }

    /// Replace the whole attribute set.
    #[must_use]
    pub const fn attributes(mut self, attrs: AttrMask) -> Self {
        self.attrs = attrs;
        self
    }

    /// Toggle bold.
    #[must_use]
    pub const fn bold(self, on: bool) -> Self {
        self.set(AttrMask::BOLD, on)
    }

    /// Toggle blink.
    #[must_use]
    pub const fn blink(self, on: bool) -> Self {
        self.set(AttrMask::BLINK, on)
    }

    /// Toggle reverse video.
    #[must_use]
    pub const fn reverse(self, on: bool) -> Self {
        self.set(AttrMask::REVERSE, on)
    }

    /// Toggle underline.
    #[must_use]
    pub const fn underline(self, on: bool) -> Self {
        self.set(AttrMask::UNDERLINE, on)
    }

    /// Toggle dim.
    #[must_use]
    pub const fn dim(self, on: bool) -> Self {
        self.set(AttrMask::DIM, on)
    }

    /// Toggle italic.
    #[must_use]
    pub const fn italic(self, on: bool) -> Self {
        self.set(AttrMask::ITALIC, on)
    }

    /// Toggle strikethrough.
    #[must_use]
    pub const fn strikethrough(self, on: bool) -> Self {
        self.set(AttrMask::STRIKETHROUGH, on)
    }

    const fn set(mut self, attr: AttrMask, on: bool) -> Self {
        if on {
            self.attrs = self.attrs.union(attr);
        } else {
            self.attrs = self.attrs.difference(attr);
        }
        self
    }

    /// Split into (foreground, background, attributes).
    #[must_use]
    pub const fn decompose(self) -> (Color, Color, AttrMask) {
        (self.fg, self.bg, self.attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chains() {
        let style = Style::default()
            .foreground(Color::Palette(2))
            .background(Color::Rgb(10, 20, 30))
            .bold(true)
            .underline(true)
            .underline(false);
        let (fg, bg, attrs) = style.decompose();
        assert_eq!(fg, Color::Palette(2));
        assert_eq!(bg, Color::Rgb(10, 20, 30));
        assert_eq!(attrs, AttrMask::BOLD);
    }

    #[test]
    fn invalid_never_equals_a_real_style() {
        assert_ne!(Style::INVALID, Style::default());
        assert_ne!(Style::INVALID, Style::default().bold(true));
    }
}
