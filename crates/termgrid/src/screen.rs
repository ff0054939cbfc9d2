#![forbid(unsafe_code)]

//! The screen facade and renderer.
//!
//! A [`Screen`] owns the cell back-buffer, the renderer's notion of where
//! the terminal cursor is, and the event pump. Callers mutate cells and
//! call [`show`](Screen::show); the renderer computes the smallest byte
//! stream that brings the terminal into agreement with the buffer and
//! flushes it in a single write.
//!
//! # Locking
//!
//! One mutex guards the buffer, style machine, and cursor bookkeeping.
//! Frames are assembled under that mutex but always *written* after it is
//! released; the output stream has its own lock. `poll_event` waits on
//! the event queue without touching the screen mutex.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{RecvTimeoutError, SyncSender, TryRecvError};
use std::sync::{mpsc, Arc, Mutex, MutexGuard};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use termgrid_core::charset::{self, Transcoder, TransformState, SUBSTITUTE};
use termgrid_core::input::{InputConfig, InputParser};
use termgrid_core::terminfo::{self, strip_padding, Terminfo};
use termgrid_core::{Event, Key, KeyTable};
use termgrid_render::style::AttrMask;
use termgrid_render::{find_color, CellBuffer, Color, Style};

use crate::acs;
use crate::error::ScreenError;
use crate::pump::{self, PumpMsg, QUEUE_DEPTH};
#[cfg(unix)]
use crate::tty;

const PASTE_ENABLE: &[u8] = b"\x1b[?2004h";
const PASTE_DISABLE: &[u8] = b"\x1b[?2004l";

/// OSC-52 practical payload limit, in text bytes.
const OSC52_LIMIT: usize = 74_994;

/// A capability-driven terminal screen.
///
/// All operations are thread-safe. After [`fini`](Screen::fini) the
/// screen is terminal: every further operation is a no-op.
pub struct Screen {
    shared: Arc<Shared>,
}

/// State shared between the facade and the pump thread.
pub(crate) struct Shared {
    pub(crate) ti: Terminfo,
    keys: Arc<KeyTable>,
    input_cfg: Arc<InputConfig>,
    inner: Mutex<Inner>,
    out: Mutex<Box<dyn Write + Send>>,
    ev_rx: Mutex<Option<mpsc::Receiver<Event>>>,
    pub(crate) quit: AtomicBool,
    pump_tx: Mutex<Option<SyncSender<PumpMsg>>>,
}

struct Inner {
    cells: CellBuffer,
    w: u16,
    h: u16,
    /// Screen-wide default style, substituted for `Style::default()` cells.
    style: Style,
    /// The style the terminal is currently showing.
    curstyle: Style,
    /// Terminal cursor position as the renderer last left it.
    cx: Option<u16>,
    cy: Option<u16>,
    /// Where the application wants the visible cursor; `None` = hidden.
    cursor: Option<(u16, u16)>,
    clear: bool,
    fini: bool,
    started: bool,
    truecolor: bool,
    /// Memoised palette approximations.
    colors: HashMap<Color, Color>,
    palette: Vec<Color>,
    acs: HashMap<char, String>,
    fallback: HashMap<char, String>,
    encoder: Option<Box<dyn Transcoder>>,
    charset: String,
    ev_tx: Option<SyncSender<Event>>,
    input: Option<Box<dyn Read + Send>>,
    fixed_size: Option<(u16, u16)>,
    force_charset: Option<String>,
    #[cfg(unix)]
    winsize_fd: Option<std::fs::File>,
    #[cfg(unix)]
    raw_guard: Option<tty::RawModeGuard>,
    #[cfg(unix)]
    winch_guard: Option<pump::WinchGuard>,
}

impl Screen {
    /// Create a screen for the terminal named by `TERM`.
    ///
    /// The controlling terminal itself is acquired by
    /// [`init`](Screen::init).
    pub fn new() -> Result<Self, ScreenError> {
        let term = std::env::var("TERM").unwrap_or_default();
        let ti = terminfo::lookup_terminfo(&term)?;
        Ok(Self::build(ti, None, Box::new(std::io::sink()), None, None))
    }

    /// Create a screen over caller-supplied streams with a fixed size.
    ///
    /// No termios or signal handling is involved; this is the
    /// constructor for tests and for embedding the engine behind
    /// something that is not a local TTY. The charset is pinned to UTF-8.
    #[must_use]
    pub fn with_streams(
        ti: Terminfo,
        input: Box<dyn Read + Send>,
        output: Box<dyn Write + Send>,
        size: (u16, u16),
    ) -> Self {
        Self::build(ti, Some(input), output, Some(size), Some("UTF-8".into()))
    }

    fn build(
        ti: Terminfo,
        input: Option<Box<dyn Read + Send>>,
        output: Box<dyn Write + Send>,
        fixed_size: Option<(u16, u16)>,
        force_charset: Option<String>,
    ) -> Self {
        let keys = Arc::new(KeyTable::new(&ti));
        let acs_map = acs::build_acs_map(&ti);
        let inner = Inner {
            cells: CellBuffer::new(),
            w: 0,
            h: 0,
            style: Style::default(),
            curstyle: Style::INVALID,
            cx: None,
            cy: None,
            cursor: None,
            clear: false,
            fini: false,
            started: false,
            truecolor: false,
            colors: HashMap::new(),
            palette: Vec::new(),
            acs: acs_map,
            fallback: acs::default_rune_fallbacks(),
            encoder: None,
            charset: String::new(),
            ev_tx: None,
            input,
            fixed_size,
            force_charset,
            #[cfg(unix)]
            winsize_fd: None,
            #[cfg(unix)]
            raw_guard: None,
            #[cfg(unix)]
            winch_guard: None,
        };
        Self {
            shared: Arc::new(Shared {
                ti,
                keys,
                input_cfg: Arc::new(InputConfig::new()),
                inner: Mutex::new(inner),
                out: Mutex::new(output),
                ev_rx: Mutex::new(None),
                quit: AtomicBool::new(false),
                pump_tx: Mutex::new(None),
            }),
        }
    }

    /// Acquire the terminal, enter the alternate screen, size the buffer,
    /// and start the event pump.
    pub fn init(&self) -> Result<(), ScreenError> {
        let shared = &self.shared;
        let mut inner = shared.lock_inner();
        if inner.fini || inner.started {
            return Ok(());
        }

        let charset = inner
            .force_charset
            .clone()
            .unwrap_or_else(charset::charset_from_env);
        let (encoder, decoder) = charset::lookup_charset(&charset)
            .ok_or_else(|| ScreenError::CharsetUnsupported(charset.clone()))?;
        inner.charset = charset;
        inner.encoder = Some(encoder);

        if inner.input.is_none() && inner.fixed_size.is_none() {
            #[cfg(unix)]
            {
                let t = tty::Tty::acquire().map_err(ScreenError::TtyAcquire)?;
                inner.input = Some(Box::new(t.reader));
                inner.winsize_fd = Some(t.winsize);
                inner.raw_guard = Some(t.raw_guard);
                *shared.out.lock().unwrap_or_else(|e| e.into_inner()) = Box::new(t.writer);
            }
            #[cfg(not(unix))]
            {
                return Err(ScreenError::TtyAcquire(std::io::Error::other(
                    "no controlling-terminal support on this platform",
                )));
            }
        }

        inner.truecolor = shared.ti.has_rgb()
            && std::env::var("TCELL_TRUECOLOR").map_or(true, |v| v != "disable");

        let ncolors = shared.ti.colors.min(256);
        let palette: Vec<Color> = (0..ncolors).map(|i| Color::Palette(i as u8)).collect();
        // Identity map for the built-in palette entries.
        inner.colors = palette.iter().map(|&c| (c, c)).collect();
        inner.palette = palette;

        let (w, h) = inner.query_size(&shared.ti);
        inner.cells.resize(w, h);
        inner.w = w;
        inner.h = h;
        inner.cx = None;
        inner.cy = None;
        inner.cursor = None;
        inner.curstyle = Style::INVALID;
        inner.started = true;

        let (ev_tx, ev_rx) = mpsc::sync_channel(QUEUE_DEPTH);
        let (pump_tx, pump_rx) = mpsc::sync_channel(QUEUE_DEPTH);
        inner.ev_tx = Some(ev_tx.clone());
        *shared.ev_rx.lock().unwrap_or_else(|e| e.into_inner()) = Some(ev_rx);
        *shared.pump_tx.lock().unwrap_or_else(|e| e.into_inner()) = Some(pump_tx.clone());
        let _ = ev_tx.try_send(Event::Resize {
            width: w,
            height: h,
        });

        #[cfg(unix)]
        if inner.winsize_fd.is_some() {
            match pump::WinchGuard::new(pump_tx.clone()) {
                Ok(guard) => inner.winch_guard = Some(guard),
                Err(err) => tracing::warn!(%err, "resize signal watcher unavailable"),
            }
        }

        let mut parser = InputParser::new(
            Arc::clone(&shared.keys),
            Arc::clone(&shared.input_cfg),
            decoder,
            !shared.ti.mouse.is_empty(),
        );
        parser.set_screen_size(w, h);

        let input = match inner.input.take() {
            Some(input) => input,
            None => return Ok(()),
        };
        drop(inner);

        let ti = &shared.ti;
        let mut hello = Vec::new();
        tput(&mut hello, &ti.enter_ca);
        tput(&mut hello, &ti.hide_cursor);
        tput(&mut hello, &ti.enable_acs);
        tput(&mut hello, &ti.clear);
        hello.extend_from_slice(PASTE_ENABLE);
        shared.write_out(&hello);

        pump::spawn_reader(input, pump_tx, ev_tx.clone());
        let pump_shared = Arc::clone(&self.shared);
        std::thread::spawn(move || pump::run_pump(pump_shared, pump_rx, parser, ev_tx));

        Ok(())
    }

    /// Restore the terminal and stop the pump. Idempotent.
    pub fn fini(&self) {
        let shared = &self.shared;
        let mut teardown = Vec::new();
        #[cfg(unix)]
        let raw_guard;
        {
            let mut inner = shared.lock_inner();
            if inner.fini {
                return;
            }
            inner.fini = true;
            inner.cells.resize(0, 0);
            inner.w = 0;
            inner.h = 0;
            if inner.started {
                let ti = &shared.ti;
                tput(&mut teardown, &ti.show_cursor);
                tput(&mut teardown, &ti.attr_off);
                tput(&mut teardown, &ti.clear);
                tput(&mut teardown, &ti.exit_ca);
                tput(&mut teardown, &ti.exit_keypad);
                if !ti.mouse.is_empty() {
                    tput(&mut teardown, &ti.tparm(&ti.mouse_mode, &[0]));
                }
                teardown.extend_from_slice(PASTE_DISABLE);
            }
            inner.curstyle = Style::INVALID;
            inner.clear = false;
            inner.ev_tx = None;
            #[cfg(unix)]
            {
                inner.winch_guard = None;
                raw_guard = inner.raw_guard.take();
            }
        }
        shared.write_out(&teardown);
        shared.quit.store(true, Ordering::Release);
        if let Some(tx) = shared
            .pump_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            let _ = tx.try_send(PumpMsg::Quit);
        }
        // Leave raw mode only after the teardown bytes are on the wire.
        #[cfg(unix)]
        drop(raw_guard);
    }

    /// Bring the terminal up to date with the cell buffer.
    pub fn show(&self) {
        let frame = {
            let mut inner = self.shared.lock_inner();
            if inner.fini || !inner.started {
                return;
            }
            inner.check_resize(&self.shared.ti);
            inner.draw(&self.shared.ti)
        };
        self.shared.write_out(&frame);
    }

    /// Redraw everything from scratch, dirty or not.
    pub fn sync(&self) {
        let frame = {
            let mut inner = self.shared.lock_inner();
            if inner.fini || !inner.started {
                return;
            }
            inner.cx = None;
            inner.cy = None;
            inner.check_resize(&self.shared.ti);
            inner.clear = true;
            inner.cells.invalidate();
            inner.draw(&self.shared.ti)
        };
        self.shared.write_out(&frame);
    }

    /// Set the screen-wide default style.
    pub fn set_style(&self, style: Style) {
        let mut inner = self.shared.lock_inner();
        if !inner.fini {
            inner.style = style;
        }
    }

    /// Fill the screen with spaces in the default style.
    pub fn clear(&self) {
        let mut inner = self.shared.lock_inner();
        if !inner.fini {
            let style = inner.style;
            inner.cells.fill(' ', style);
        }
    }

    /// Fill the screen with one rune and style.
    pub fn fill(&self, ch: char, style: Style) {
        let mut inner = self.shared.lock_inner();
        if !inner.fini {
            inner.cells.fill(ch, style);
        }
    }

    /// Set one cell's content. Out-of-range writes are ignored.
    pub fn set_content(&self, x: u16, y: u16, main: char, comb: &[char], style: Style) {
        let mut inner = self.shared.lock_inner();
        if !inner.fini {
            inner.cells.set_content(x, y, main, comb, style);
        }
    }

    /// Read one cell back: (main, combining, style, width).
    #[must_use]
    pub fn get_content(&self, x: u16, y: u16) -> Option<(char, Vec<char>, Style, u8)> {
        self.shared.lock_inner().cells.get_content(x, y)
    }

    /// Convenience: set a cell from a rune slice (first is the main rune,
    /// the rest combine). An empty slice writes a space.
    pub fn set_cell(&self, x: u16, y: u16, style: Style, chars: &[char]) {
        match chars.split_first() {
            Some((main, comb)) => self.set_content(x, y, *main, comb, style),
            None => self.set_content(x, y, ' ', &[], style),
        }
    }

    /// Place the visible cursor. Out-of-range coordinates hide it.
    pub fn show_cursor(&self, x: u16, y: u16) {
        let mut inner = self.shared.lock_inner();
        if !inner.fini {
            inner.cursor = Some((x, y));
        }
    }

    /// Hide the visible cursor.
    pub fn hide_cursor(&self) {
        let mut inner = self.shared.lock_inner();
        if !inner.fini {
            inner.cursor = None;
        }
    }

    /// Start mouse reporting, when the terminal has any.
    pub fn enable_mouse(&self) {
        self.set_mouse_mode(1);
    }

    /// Stop mouse reporting.
    pub fn disable_mouse(&self) {
        self.set_mouse_mode(0);
    }

    fn set_mouse_mode(&self, on: i64) {
        let ti = &self.shared.ti;
        if ti.mouse.is_empty() {
            return;
        }
        if self.shared.lock_inner().fini {
            return;
        }
        let mut buf = Vec::new();
        tput(&mut buf, &ti.tparm(&ti.mouse_mode, &[on]));
        self.shared.write_out(&buf);
    }

    /// Wait for the next event. `None` is the quit sentinel: the screen
    /// has been finalised and the queue has drained.
    #[must_use]
    pub fn poll_event(&self) -> Option<Event> {
        let guard = self.shared.ev_rx.lock().unwrap_or_else(|e| e.into_inner());
        let rx = guard.as_ref()?;
        loop {
            match rx.try_recv() {
                Ok(ev) => return Some(ev),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => return None,
            }
            if self.shared.quitting() {
                return None;
            }
            match rx.recv_timeout(Duration::from_millis(25)) {
                Ok(ev) => return Some(ev),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    /// Whether this terminal can deliver `key` at all.
    #[must_use]
    pub fn has_key(&self, key: Key) -> bool {
        self.shared.keys.has_key(key)
    }

    /// Whether this terminal reports the mouse.
    #[must_use]
    pub fn has_mouse(&self) -> bool {
        !self.shared.ti.mouse.is_empty()
    }

    /// Whether `ch` can be shown: directly by the encoder, through the
    /// alternate character set, or (optionally) via a registered
    /// fallback.
    #[must_use]
    pub fn can_display(&self, ch: char, check_fallbacks: bool) -> bool {
        let mut inner = self.shared.lock_inner();
        if let Some(enc) = inner.encoder.as_mut() {
            let mut src = [0u8; 4];
            let s = ch.encode_utf8(&mut src);
            let mut dst = [0u8; 16];
            enc.reset();
            let (n_out, _, state) = enc.transform(&mut dst, s.as_bytes(), true);
            if n_out > 0 && state == TransformState::Done && dst[0] != SUBSTITUTE {
                return true;
            }
        }
        if inner.acs.contains_key(&ch) {
            return true;
        }
        check_fallbacks && inner.fallback.contains_key(&ch)
    }

    /// Arm or disarm the unstructured-paste heuristic.
    ///
    /// Bracketed paste always works; this additionally treats any
    /// multi-byte run of escape-free input as a paste, which suits
    /// terminals that cannot frame pastes but will occasionally fuse
    /// fast keystrokes.
    pub fn set_paste(&self, on: bool) {
        self.shared.input_cfg.set_paste(on);
    }

    /// Register an escape-sequence prefix the parser should hand back
    /// verbatim as [`Event::Raw`] instead of interpreting.
    pub fn register_raw_seq(&self, seq: &str) {
        self.shared.input_cfg.register_raw_seq(seq.as_bytes());
    }

    /// Register a plain-text stand-in for a rune the terminal cannot
    /// display.
    pub fn register_rune_fallback(&self, ch: char, fallback: &str) {
        let mut inner = self.shared.lock_inner();
        if !inner.fini {
            inner.fallback.insert(ch, fallback.to_string());
        }
    }

    /// Remove a registered rune fallback.
    pub fn unregister_rune_fallback(&self, ch: char) {
        let mut inner = self.shared.lock_inner();
        if !inner.fini {
            inner.fallback.remove(&ch);
        }
    }

    /// Ask the terminal to send the clipboard contents. The reply, if
    /// the terminal cooperates, arrives as an [`Event::Paste`].
    ///
    /// Valid registers are `"c"` (clipboard) and `"p"` (primary).
    pub fn get_clipboard(&self, register: &str) -> Result<(), ScreenError> {
        let r = clipboard_register(register)?;
        if self.shared.lock_inner().fini {
            return Ok(());
        }
        self.shared
            .write_out(format!("\x1b]52;{r};?\x1b\\").as_bytes());
        Ok(())
    }

    /// Put `text` on the terminal's clipboard via OSC-52.
    ///
    /// Text at or beyond the protocol's practical limit is still sent,
    /// but the call reports [`ScreenError::ClipboardTruncated`] so the
    /// caller knows the far end may clip it.
    pub fn set_clipboard(&self, text: &str, register: &str) -> Result<(), ScreenError> {
        let r = clipboard_register(register)?;
        if self.shared.lock_inner().fini {
            return Ok(());
        }
        let mut bytes = Vec::with_capacity(text.len() * 4 / 3 + 32);
        bytes.extend_from_slice(format!("\x1b]52;{r};!\x1b\\").as_bytes());
        bytes.extend_from_slice(format!("\x1b]52;{r};").as_bytes());
        bytes.extend_from_slice(BASE64.encode(text).as_bytes());
        bytes.extend_from_slice(b"\x1b\\");
        self.shared.write_out(&bytes);
        if text.len() >= OSC52_LIMIT {
            return Err(ScreenError::ClipboardTruncated);
        }
        Ok(())
    }

    /// Current size in cells.
    #[must_use]
    pub fn size(&self) -> (u16, u16) {
        let inner = self.shared.lock_inner();
        (inner.w, inner.h)
    }

    /// How many colours the terminal can show (`1 << 24` with
    /// truecolour).
    #[must_use]
    pub fn colors(&self) -> u32 {
        if self.shared.lock_inner().truecolor {
            1 << 24
        } else {
            u32::from(self.shared.ti.colors)
        }
    }

    /// The charset in effect.
    #[must_use]
    pub fn character_set(&self) -> String {
        self.shared.lock_inner().charset.clone()
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        self.fini();
    }
}

impl std::fmt::Debug for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen")
            .field("term", &self.shared.ti.name)
            .finish_non_exhaustive()
    }
}

fn clipboard_register(register: &str) -> Result<char, ScreenError> {
    match register.chars().next() {
        Some(r @ ('c' | 'p')) if register.len() == 1 => Ok(r),
        _ => Err(ScreenError::InvalidRegister(register.to_string())),
    }
}

impl Shared {
    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn quitting(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }

    /// Single write of a fully assembled byte sequence.
    pub(crate) fn write_out(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(err) = out.write_all(bytes).and_then(|()| out.flush()) {
            tracing::warn!(%err, "terminal write failed");
        }
    }

    /// Pump-side resize: re-query the size, repaint everything, report
    /// the new dimensions for mouse clipping.
    pub(crate) fn handle_resize(&self) -> Option<(u16, u16)> {
        let (frame, size) = {
            let mut inner = self.lock_inner();
            if inner.fini || !inner.started {
                return None;
            }
            inner.cx = None;
            inner.cy = None;
            inner.check_resize(&self.ti);
            inner.cells.invalidate();
            let frame = inner.draw(&self.ti);
            (frame, (inner.w, inner.h))
        };
        self.write_out(&frame);
        Some(size)
    }
}

impl Inner {
    /// Authoritative window size: fixed size, then the TTY, then the
    /// `COLUMNS`/`LINES` overrides, then the capability defaults.
    fn query_size(&self, ti: &Terminfo) -> (u16, u16) {
        if let Some(size) = self.fixed_size {
            return size;
        }
        #[cfg(unix)]
        if let Some(fd) = &self.winsize_fd {
            if let Some(size) = tty::window_size(fd) {
                return size;
            }
        }
        #[cfg(unix)]
        let (cols, lines) = tty::env_size();
        #[cfg(not(unix))]
        let (cols, lines): (Option<u16>, Option<u16>) = (None, None);
        (cols.unwrap_or(ti.columns), lines.unwrap_or(ti.lines))
    }

    /// Adopt a new window size, preserving the overlap region.
    fn check_resize(&mut self, ti: &Terminfo) {
        let (w, h) = self.query_size(ti);
        if w == self.w && h == self.h {
            return;
        }
        self.cx = None;
        self.cy = None;
        self.cells.resize(w, h);
        self.w = w;
        self.h = h;
        if let Some(tx) = &self.ev_tx {
            if tx
                .try_send(Event::Resize {
                    width: w,
                    height: h,
                })
                .is_err()
            {
                tracing::debug!("resize event dropped; queue full");
            }
        }
    }

    // ── Renderer ─────────────────────────────────────────────────────

    /// Produce the byte stream bringing the terminal into agreement with
    /// the buffer. The caller writes it out after releasing the lock.
    fn draw(&mut self, ti: &Terminfo) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4096);
        self.cx = None;
        self.cy = None;

        // Hide the cursor while cells move around.
        self.emit_hide_cursor(ti, &mut buf);

        if self.clear {
            self.clear_screen(ti, &mut buf);
        }

        let (w, h) = (self.w, self.h);
        for y in 0..h {
            let mut x = 0u16;
            while x < w {
                let width = self.draw_cell(ti, &mut buf, x, y).max(1);
                if width > 1 && x + 1 < w {
                    // If the wide glyph ever narrows, its shadow column
                    // must actually repaint.
                    self.cells.set_dirty(x + 1, y, true);
                }
                x += u16::from(width);
            }
        }

        self.emit_show_cursor(ti, &mut buf);
        buf
    }

    /// Draw one cell if dirty; returns the cell's width so the caller
    /// can skip shadowed columns.
    fn draw_cell(&mut self, ti: &Terminfo, buf: &mut Vec<u8>, x: u16, y: u16) -> u8 {
        let Some((main, comb, mut style, mut width)) = self.cells.get_content(x, y) else {
            return 1;
        };
        if !self.cells.dirty(x, y) {
            return width;
        }

        if self.cx != Some(x) || self.cy != Some(y) {
            tput(buf, &ti.tgoto(x, y));
            self.cx = Some(x);
            self.cy = Some(y);
        }

        if style == Style::default() {
            style = self.style;
        }
        if style != self.curstyle {
            let (fg, bg, attrs) = style.decompose();
            tput(buf, &ti.attr_off);
            self.send_fg_bg(ti, buf, fg, bg);
            if attrs.contains(AttrMask::BOLD) {
                tput(buf, &ti.bold);
            }
            if attrs.contains(AttrMask::UNDERLINE) {
                tput(buf, &ti.underline);
            }
            if attrs.contains(AttrMask::REVERSE) {
                tput(buf, &ti.reverse);
            }
            if attrs.contains(AttrMask::BLINK) {
                tput(buf, &ti.blink);
            }
            if attrs.contains(AttrMask::DIM) {
                tput(buf, &ti.dim);
            }
            if attrs.contains(AttrMask::ITALIC) {
                tput(buf, &ti.italic);
            }
            if attrs.contains(AttrMask::STRIKETHROUGH) {
                tput(buf, &ti.strikethrough);
            }
            self.curstyle = style;
        }

        if width < 1 {
            width = 1;
        }

        let mut bytes: Vec<u8> = Vec::with_capacity(6);
        self.encode_rune(main, &mut bytes);
        for r in &comb {
            self.encode_rune(*r, &mut bytes);
        }

        if width > 1 && bytes.as_slice() == b"?" {
            // No full-width support for this glyph; pad and force the
            // next cell to re-position.
            bytes = b"? ".to_vec();
            self.cx = None;
        }

        if x + u16::from(width) > self.w {
            // Too wide to fit; emit a single space instead.
            width = 1;
            bytes = b" ".to_vec();
        }

        buf.extend_from_slice(&bytes);
        self.cx = self.cx.map(|cx| cx + u16::from(width));
        self.cells.set_dirty(x, y, false);
        if width > 1 {
            self.cx = None;
        }
        width
    }

    /// Encode one rune through the terminal charset, falling back to the
    /// ACS glyph, a registered fallback, or `?`.
    ///
    /// Combining runes that fail to encode are elided (`out` non-empty).
    fn encode_rune(&mut self, ch: char, out: &mut Vec<u8>) {
        let mut src = [0u8; 4];
        let s = ch.encode_utf8(&mut src);
        let mut dst = [0u8; 16];
        let mut encoded = 0usize;
        if let Some(enc) = self.encoder.as_mut() {
            enc.reset();
            let (n_out, _, state) = enc.transform(&mut dst, s.as_bytes(), true);
            if state == TransformState::Done && n_out > 0 && dst[0] != SUBSTITUTE {
                encoded = n_out;
            }
        }
        if encoded > 0 {
            out.extend_from_slice(&dst[..encoded]);
        } else if out.is_empty() {
            if let Some(acs) = self.acs.get(&ch) {
                out.extend_from_slice(acs.as_bytes());
            } else if let Some(fb) = self.fallback.get(&ch) {
                out.extend_from_slice(fb.as_bytes());
            } else {
                out.push(b'?');
            }
        }
    }

    /// Emit the colour transition for (fg, bg): reset first, truecolour
    /// when possible, then palette approximation through the memo cache.
    fn send_fg_bg(&mut self, ti: &Terminfo, buf: &mut Vec<u8>, fg: Color, bg: Color) {
        if ti.colors == 0 {
            return;
        }
        let (mut fg, mut bg) = (fg, bg);

        if fg == Color::Reset || bg == Color::Reset {
            tput(buf, &ti.reset_fg_bg);
        }

        if self.truecolor {
            if !ti.set_fg_bg_rgb.is_empty() && fg.is_rgb() && bg.is_rgb() {
                let (r1, g1, b1) = fg.rgb();
                let (r2, g2, b2) = bg.rgb();
                tput(
                    buf,
                    &ti.tparm(
                        &ti.set_fg_bg_rgb,
                        &[
                            i64::from(r1),
                            i64::from(g1),
                            i64::from(b1),
                            i64::from(r2),
                            i64::from(g2),
                            i64::from(b2),
                        ],
                    ),
                );
                return;
            }
            if fg.is_rgb() && !ti.set_fg_rgb.is_empty() {
                let (r, g, b) = fg.rgb();
                tput(
                    buf,
                    &ti.tparm(
                        &ti.set_fg_rgb,
                        &[i64::from(r), i64::from(g), i64::from(b)],
                    ),
                );
                fg = Color::Default;
            }
            if bg.is_rgb() && !ti.set_bg_rgb.is_empty() {
                let (r, g, b) = bg.rgb();
                tput(
                    buf,
                    &ti.tparm(
                        &ti.set_bg_rgb,
                        &[i64::from(r), i64::from(g), i64::from(b)],
                    ),
                );
                bg = Color::Default;
            }
        }

        if fg.is_valid() {
            fg = self.resolve_color(fg);
        }
        if bg.is_valid() {
            bg = self.resolve_color(bg);
        }

        match (palette_index(fg), palette_index(bg)) {
            (Some(f), Some(b)) if !ti.set_fg_bg.is_empty() => {
                tput(buf, &ti.tparm(&ti.set_fg_bg, &[f, b]));
            }
            (f, b) => {
                if let Some(f) = f {
                    if !ti.set_fg.is_empty() {
                        tput(buf, &ti.tparm(&ti.set_fg, &[f]));
                    }
                }
                if let Some(b) = b {
                    if !ti.set_bg.is_empty() {
                        tput(buf, &ti.tparm(&ti.set_bg, &[b]));
                    }
                }
            }
        }
    }

    /// Nearest palette representative, memoised.
    fn resolve_color(&mut self, c: Color) -> Color {
        if let Some(&resolved) = self.colors.get(&c) {
            return resolved;
        }
        let resolved = find_color(c, &self.palette);
        self.colors.insert(c, resolved);
        resolved
    }

    fn clear_screen(&mut self, ti: &Terminfo, buf: &mut Vec<u8>) {
        let (fg, bg, _) = self.style.decompose();
        self.send_fg_bg(ti, buf, fg, bg);
        tput(buf, &ti.clear);
        self.clear = false;
    }

    fn emit_hide_cursor(&mut self, ti: &Terminfo, buf: &mut Vec<u8>) {
        if !ti.hide_cursor.is_empty() {
            tput(buf, &ti.hide_cursor);
        } else {
            // No way to hide it; park it bottom-right.
            let (w, h) = self.cells.size();
            self.cx = Some(w);
            self.cy = Some(h);
            tput(buf, &ti.tgoto(w, h));
        }
    }

    fn emit_show_cursor(&mut self, ti: &Terminfo, buf: &mut Vec<u8>) {
        match self.cursor {
            Some((x, y)) if x < self.w && y < self.h => {
                tput(buf, &ti.tgoto(x, y));
                tput(buf, &ti.show_cursor);
                self.cx = Some(x);
                self.cy = Some(y);
            }
            _ => self.emit_hide_cursor(ti, buf),
        }
    }
}

fn palette_index(c: Color) -> Option<i64> {
    match c {
        Color::Palette(idx) => Some(i64::from(idx)),
        _ => None,
    }
}

/// Append a capability string, stripping `$<ms>` padding markers.
fn tput(buf: &mut Vec<u8>, s: &str) {
    if s.is_empty() {
        return;
    }
    if s.contains("$<") {
        buf.extend_from_slice(strip_padding(s).as_bytes());
    } else {
        buf.extend_from_slice(s.as_bytes());
    }
}
