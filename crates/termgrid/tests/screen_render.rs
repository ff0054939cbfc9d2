//! End-to-end screen tests over in-memory streams.
//!
//! The renderer's output is replayed through a minimal terminal
//! interpreter: a grid of (text, style-token) cells driven by the cursor
//! addressing and SGR sequences the engine emits. If the interpreter's
//! grid matches the cell buffer, the byte stream was sufficient to
//! reproduce the screen.

use std::io::{Read, Write};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use termgrid::{lookup_terminfo, Color, Event, Key, Screen, Style};
use termgrid_render::rune_width;

// ── Test plumbing ────────────────────────────────────────────────────

/// Shared byte sink standing in for the terminal's output stream.
#[derive(Clone, Default)]
struct SharedOut(Arc<Mutex<Vec<u8>>>);

impl SharedOut {
    fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl Write for SharedOut {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Blocking reader fed from a channel, standing in for the TTY.
struct ChannelReader {
    rx: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv() {
                Ok(chunk) => self.pending = chunk,
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

fn new_screen(w: u16, h: u16) -> (Screen, SharedOut, mpsc::Sender<Vec<u8>>) {
    let ti = lookup_terminfo("xterm-256color").unwrap();
    let (tx, rx) = mpsc::channel();
    let out = SharedOut::default();
    let screen = Screen::with_streams(
        ti,
        Box::new(ChannelReader {
            rx,
            pending: Vec::new(),
        }),
        Box::new(out.clone()),
        (w, h),
    );
    screen.init().unwrap();
    (screen, out, tx)
}

// ── Minimal terminal interpreter ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct TermCell {
    text: String,
    token: String,
}

struct Term {
    w: usize,
    h: usize,
    grid: Vec<Vec<TermCell>>,
    cx: usize,
    cy: usize,
    sgr: Vec<String>,
    cursor_visible: bool,
}

impl Term {
    fn new(w: u16, h: u16) -> Self {
        let blank = TermCell {
            text: " ".into(),
            token: String::new(),
        };
        Self {
            w: usize::from(w),
            h: usize::from(h),
            grid: vec![vec![blank; usize::from(w)]; usize::from(h)],
            cx: 0,
            cy: 0,
            sgr: Vec::new(),
            cursor_visible: true,
        }
    }

    fn token(&self) -> String {
        self.sgr.join("|")
    }

    fn feed(&mut self, bytes: &[u8]) {
        let text = String::from_utf8_lossy(bytes).into_owned();
        let chars: Vec<char> = text.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let ch = chars[i];
            if ch == '\u{1b}' {
                i += 1;
                match chars.get(i) {
                    Some('[') => {
                        i += 1;
                        let start = i;
                        while i < chars.len() && !('\u{40}'..='\u{7e}').contains(&chars[i]) {
                            i += 1;
                        }
                        if i >= chars.len() {
                            return;
                        }
                        let params: String = chars[start..i].iter().collect();
                        self.csi(&params, chars[i]);
                        i += 1;
                    }
                    Some('(') | Some(')') => i += 2,
                    Some(']') => {
                        // OSC: swallow until ST or BEL.
                        while i < chars.len()
                            && chars[i] != '\u{7}'
                            && !(chars[i] == '\u{1b}' && chars.get(i + 1) == Some(&'\\'))
                        {
                            i += 1;
                        }
                        if i < chars.len() && chars[i] == '\u{1b}' {
                            i += 2;
                        } else {
                            i += 1;
                        }
                    }
                    _ => i += 1,
                }
                continue;
            }
            if !ch.is_control() {
                self.print(ch);
            }
            i += 1;
        }
    }

    fn csi(&mut self, params: &str, fin: char) {
        match fin {
            'H' => {
                let mut parts = params.split(';');
                let row: usize = parts.next().and_then(|p| p.parse().ok()).unwrap_or(1);
                let col: usize = parts.next().and_then(|p| p.parse().ok()).unwrap_or(1);
                self.cy = row.saturating_sub(1).min(self.h.saturating_sub(1));
                self.cx = col.saturating_sub(1);
            }
            'm' => {
                if params.is_empty() || params == "0" {
                    self.sgr.clear();
                } else {
                    self.sgr.push(params.to_string());
                }
            }
            'J' => {
                let token = self.token();
                for row in &mut self.grid {
                    for cell in row {
                        cell.text = " ".into();
                        cell.token = token.clone();
                    }
                }
            }
            'h' | 'l' => {
                if params == "?25" {
                    self.cursor_visible = fin == 'h';
                }
            }
            _ => {}
        }
    }

    fn print(&mut self, ch: char) {
        let width = usize::from(rune_width(ch));
        if width == 0 {
            // Combining mark: attach to the previously printed cell.
            if self.cx > 0 && self.cy < self.h {
                let x = (self.cx - 1).min(self.w - 1);
                if let Some(cell) = self.grid[self.cy].get_mut(x) {
                    if cell.text == "\u{0}" && x > 0 {
                        self.grid[self.cy][x - 1].text.push(ch);
                    } else {
                        cell.text.push(ch);
                    }
                }
            }
            return;
        }
        if self.cy < self.h && self.cx < self.w {
            let token = self.token();
            self.grid[self.cy][self.cx] = TermCell {
                text: ch.to_string(),
                token,
            };
            if width == 2 && self.cx + 1 < self.w {
                self.grid[self.cy][self.cx + 1] = TermCell {
                    text: "\u{0}".into(),
                    token: String::new(),
                };
            }
        }
        self.cx += width;
    }

    fn text_at(&self, x: u16, y: u16) -> &str {
        &self.grid[usize::from(y)][usize::from(x)].text
    }

    fn token_at(&self, x: u16, y: u16) -> &str {
        &self.grid[usize::from(y)][usize::from(x)].token
    }
}

/// Replay the emitted stream into a fresh interpreter and check that the
/// visible grid matches the screen's cell buffer.
fn assert_replay_matches(screen: &Screen, term: &Term, w: u16, h: u16) {
    for y in 0..h {
        let mut x = 0u16;
        while x < w {
            let (main, comb, _, width) = screen.get_content(x, y).unwrap();
            let mut expected = main.to_string();
            for c in comb {
                expected.push(c);
            }
            assert_eq!(
                term.text_at(x, y),
                expected,
                "cell ({x}, {y}) diverged"
            );
            x += u16::from(width.max(1));
        }
    }
}

// ── Lifecycle wire surface ───────────────────────────────────────────

#[test]
fn init_announces_the_session() {
    let (_screen, out, _tx) = new_screen(8, 3);
    let bytes = out.take();
    // Alternate screen, hidden cursor, ACS armed, clear, bracketed paste.
    assert_eq!(
        bytes,
        b"\x1b[?1049h\x1b[?25l\x1b(B\x1b)0\x1b[H\x1b[2J\x1b[?2004h"
    );
}

#[test]
fn fini_restores_the_terminal_and_quiets_the_screen() {
    let (screen, out, _tx) = new_screen(8, 3);
    assert!(matches!(
        screen.poll_event(),
        Some(Event::Resize {
            width: 8,
            height: 3
        })
    ));
    out.take();

    screen.fini();
    let teardown = out.take();
    let text = String::from_utf8_lossy(&teardown);
    assert!(text.contains("\x1b[?1049l"), "alternate screen not left");
    assert!(text.contains("\x1b[?25h"), "cursor not restored");
    assert!(text.contains("\x1b[?2004l"), "bracketed paste not disabled");
    assert!(text.contains("\x1b[?1000l"), "mouse not disabled");

    // Terminal state: everything else is a no-op.
    screen.fini();
    screen.set_content(0, 0, 'x', &[], Style::default());
    screen.show();
    screen.sync();
    assert!(out.take().is_empty());
    assert_eq!(screen.poll_event(), None);
}

// ── Renderer properties ──────────────────────────────────────────────

#[test]
fn show_is_idempotent_without_mutations() {
    let (screen, out, _tx) = new_screen(10, 4);
    out.take();

    screen.set_content(1, 1, 'q', &[], Style::default());
    screen.show();
    let first = out.take();
    assert!(!first.is_empty());

    // No mutations: the second frame may only hide/show the cursor.
    screen.show();
    assert_eq!(out.take(), b"\x1b[?25l\x1b[?25l".to_vec());
}

#[test]
fn replay_reproduces_the_grid() {
    let (w, h) = (20, 6);
    let (screen, out, _tx) = new_screen(w, h);
    out.take();

    let red = Style::default().foreground(Color::Palette(1));
    let fancy = Style::default()
        .foreground(Color::Palette(200))
        .background(Color::Palette(17))
        .bold(true);
    let rgb = Style::default().foreground(Color::Rgb(250, 100, 50));

    for (i, ch) in "hello".chars().enumerate() {
        screen.set_content(i as u16, 0, ch, &[], red);
    }
    for (i, ch) in "world".chars().enumerate() {
        screen.set_content(i as u16 + 3, 2, ch, &[], fancy);
    }
    screen.set_content(0, 3, '日', &[], Style::default());
    screen.set_content(2, 3, '本', &[], Style::default());
    screen.set_content(10, 4, 'e', &['\u{0301}'], rgb);
    screen.show();

    let mut term = Term::new(w, h);
    term.feed(&out.take());
    assert_replay_matches(&screen, &term, w, h);

    // Same-styled cells share a style token; differently-styled do not.
    assert_eq!(term.token_at(0, 0), term.token_at(4, 0));
    assert_ne!(term.token_at(0, 0), term.token_at(3, 2));
    assert_ne!(term.token_at(0, 0), term.token_at(0, 1));

    // Incremental update: only the changed cell is repainted, and replay
    // still agrees.
    screen.set_content(1, 0, 'a', &[], red);
    screen.show();
    term.feed(&out.take());
    assert_replay_matches(&screen, &term, w, h);
}

#[test]
fn sync_repaints_everything() {
    let (w, h) = (12, 4);
    let (screen, out, _tx) = new_screen(w, h);
    screen.set_content(5, 2, 'z', &[], Style::default());
    screen.show();
    out.take();

    // A fresh interpreter fed only the sync frame must still match.
    screen.sync();
    let mut term = Term::new(w, h);
    term.feed(&out.take());
    assert_replay_matches(&screen, &term, w, h);
    assert_eq!(term.text_at(5, 2), "z");
}

#[test]
fn truecolor_styles_use_direct_color() {
    let (screen, out, _tx) = new_screen(8, 2);
    out.take();
    screen.set_content(
        0,
        0,
        'x',
        &[],
        Style::default()
            .foreground(Color::Rgb(1, 2, 3))
            .background(Color::Rgb(4, 5, 6)),
    );
    screen.show();
    let text = String::from_utf8_lossy(&out.take()).into_owned();
    assert!(
        text.contains("\x1b[38;2;1;2;3;48;2;4;5;6m"),
        "no combined direct-colour sequence in {text:?}"
    );
}

#[test]
fn wide_glyph_clips_to_space_at_right_margin() {
    let (w, h) = (6, 2);
    let (screen, out, _tx) = new_screen(w, h);
    out.take();
    screen.set_content(5, 0, '字', &[], Style::default());
    screen.show();

    let mut term = Term::new(w, h);
    term.feed(&out.take());
    assert_eq!(term.text_at(5, 0), " ");
}

#[test]
fn cursor_clips_when_out_of_range() {
    let (screen, out, _tx) = new_screen(8, 3);
    out.take();

    screen.show_cursor(20, 1);
    screen.show();
    let mut term = Term::new(8, 3);
    term.feed(&out.take());
    assert!(!term.cursor_visible);

    screen.show_cursor(2, 1);
    screen.show();
    term.feed(&out.take());
    assert!(term.cursor_visible);
    assert_eq!((term.cx, term.cy), (2, 1));
}

// ── Event flow through the pump ──────────────────────────────────────

#[test]
fn input_flows_through_the_pump() {
    let (screen, _out, tx) = new_screen(10, 4);
    assert!(matches!(screen.poll_event(), Some(Event::Resize { .. })));

    tx.send(b"a".to_vec()).unwrap();
    match screen.poll_event() {
        Some(Event::Key(k)) => {
            assert_eq!(k.key, Key::Rune);
            assert_eq!(k.ch, 'a');
        }
        other => panic!("unexpected {other:?}"),
    }

    tx.send(b"\x1b[<0;3;2M".to_vec()).unwrap();
    match screen.poll_event() {
        Some(Event::Mouse(m)) => assert_eq!((m.x, m.y), (2, 1)),
        other => panic!("unexpected {other:?}"),
    }

    tx.send(b"\x1b[200~copy\r\npaste\x1b[201~".to_vec()).unwrap();
    match screen.poll_event() {
        Some(Event::Paste(p)) => assert_eq!(p.text, "copy\n\npaste"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn lone_escape_resolves_after_the_quiet_time() {
    let (screen, _out, tx) = new_screen(10, 4);
    assert!(matches!(screen.poll_event(), Some(Event::Resize { .. })));

    let start = Instant::now();
    tx.send(b"\x1b".to_vec()).unwrap();
    match screen.poll_event() {
        Some(Event::Key(k)) => assert_eq!(k.key, Key::Esc),
        other => panic!("unexpected {other:?}"),
    }
    let elapsed = start.elapsed();
    assert!(
        elapsed >= Duration::from_millis(30),
        "escape resolved before the quiet time: {elapsed:?}"
    );
}

#[test]
fn split_escape_sequence_reassembles() {
    let (screen, _out, tx) = new_screen(10, 4);
    assert!(matches!(screen.poll_event(), Some(Event::Resize { .. })));

    tx.send(b"\x1b[".to_vec()).unwrap();
    tx.send(b"A".to_vec()).unwrap();
    match screen.poll_event() {
        Some(Event::Key(k)) => {
            assert_eq!(k.key, Key::Up);
            assert_eq!(k.raw, b"\x1b[A".to_vec());
        }
        other => panic!("unexpected {other:?}"),
    }
}

// ── Clipboard wire surface ───────────────────────────────────────────

#[test]
fn clipboard_wire_format() {
    let (screen, out, _tx) = new_screen(10, 4);
    out.take();

    screen.set_clipboard("hello", "c").unwrap();
    assert_eq!(
        out.take(),
        b"\x1b]52;c;!\x1b\\\x1b]52;c;aGVsbG8=\x1b\\".to_vec()
    );

    screen.get_clipboard("p").unwrap();
    assert_eq!(out.take(), b"\x1b]52;p;?\x1b\\".to_vec());

    assert!(screen.get_clipboard("x").is_err());
    assert!(screen.set_clipboard("hi", "").is_err());
    assert!(out.take().is_empty());
}

#[test]
fn oversized_clipboard_still_writes_but_reports_truncation() {
    let (screen, out, _tx) = new_screen(10, 4);
    out.take();

    let big = "x".repeat(80_000);
    let err = screen.set_clipboard(&big, "c");
    assert!(err.is_err());
    let bytes = out.take();
    assert!(bytes.starts_with(b"\x1b]52;c;!\x1b\\\x1b]52;c;"));
}

#[test]
fn clipboard_echo_comes_back_as_paste() {
    use base64::Engine as _;
    let (screen, out, tx) = new_screen(10, 4);
    assert!(matches!(screen.poll_event(), Some(Event::Resize { .. })));
    out.take();

    // A cooperating terminal answers a get with the same OSC-52 framing.
    let payload = base64::engine::general_purpose::STANDARD.encode("snippet");
    tx.send(format!("\x1b]52;c;{payload}\x1b\\").into_bytes())
        .unwrap();
    match screen.poll_event() {
        Some(Event::Paste(p)) => assert_eq!(p.text, "snippet"),
        other => panic!("unexpected {other:?}"),
    }
}

// ── Mouse mode toggles ───────────────────────────────────────────────

#[test]
fn mouse_mode_toggles_on_and_off() {
    let (screen, out, _tx) = new_screen(10, 4);
    out.take();

    assert!(screen.has_mouse());
    screen.enable_mouse();
    assert_eq!(
        out.take(),
        b"\x1b[?1000h\x1b[?1002h\x1b[?1003h\x1b[?1006h".to_vec()
    );
    screen.disable_mouse();
    assert_eq!(
        out.take(),
        b"\x1b[?1000l\x1b[?1002l\x1b[?1003l\x1b[?1006l".to_vec()
    );
}
