#![forbid(unsafe_code)]

//! The input parser.
//!
//! Terminal input is ambiguous at the byte level: a lone ESC keypress, the
//! prefix of a function-key sequence, two mouse report formats, and two
//! paste protocols all begin with the same byte. The parser resolves the
//! ambiguity speculatively: a committee of sub-parsers is polled in a
//! fixed order against the buffer prefix, each answering *abstain*,
//! *partial* (a longer input might match), or *complete* (bytes consumed,
//! events emitted). When every sub-parser abstains — or when the caller
//! signals that the 50 ms quiet-time expired — the catch-all resolves the
//! leading byte by fiat.
//!
//! Sub-parsers only inspect the prefix; bytes are consumed exclusively on
//! a complete match, so no backtracking is ever needed.
//!
//! The `escbuf` accumulator collects every byte confirmed to belong to the
//! event currently being assembled and becomes that event's `raw` field;
//! it survives partial returns and resets on each emission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::charset::{Transcoder, TransformState};
use crate::event::{ButtonMask, Event, KeyEvent, MouseEvent, PasteEvent};
use crate::key::{Key, ModMask};
use crate::keytable::KeyTable;

const ESC: u8 = 0x1B;
const PASTE_BEGIN: &[u8] = b"\x1b[200~";
const PASTE_END: &[u8] = b"\x1b[201~";
const OSC52_BEGIN: &[u8] = b"\x1b]52;";
const OSC52_END: &[u8] = b"\x1b\\";

/// A FIFO of raw input bytes with prefix inspection.
#[derive(Debug, Default)]
pub struct InputBuffer {
    bytes: Vec<u8>,
}

impl InputBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk read from the terminal.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// The buffered bytes, oldest first.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of buffered bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Remove and return the first `n` bytes.
    pub fn take(&mut self, n: usize) -> Vec<u8> {
        let n = n.min(self.bytes.len());
        self.bytes.drain(..n).collect()
    }
}

/// Parser configuration shared with the screen facade.
///
/// The facade flips these from caller threads while the pump keeps
/// parsing, so they sit behind atomics and a mutex rather than in the
/// parser proper.
#[derive(Debug, Default)]
pub struct InputConfig {
    paste: AtomicBool,
    rawseq: Mutex<Vec<Vec<u8>>>,
}

impl InputConfig {
    /// Create a config with unstructured paste off and no raw sequences.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm or disarm the unstructured-paste heuristic.
    pub fn set_paste(&self, on: bool) {
        self.paste.store(on, Ordering::Relaxed);
    }

    /// Whether unstructured paste is armed.
    #[must_use]
    pub fn paste_enabled(&self) -> bool {
        self.paste.load(Ordering::Relaxed)
    }

    /// Register an escape-sequence prefix to surface as [`Event::Raw`].
    pub fn register_raw_seq(&self, seq: &[u8]) {
        let mut guard = self.rawseq.lock().unwrap_or_else(|e| e.into_inner());
        guard.push(seq.to_vec());
    }

    fn raw_seqs(&self) -> Vec<Vec<u8>> {
        self.rawseq
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// A sub-parser's answer for the current buffer prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// The prefix is definitely not ours.
    Abstain,
    /// A longer input might match; consume nothing.
    Partial,
    /// Bytes consumed, events emitted.
    Complete,
}

/// The speculative input parser.
pub struct InputParser {
    keys: Arc<KeyTable>,
    cfg: Arc<InputConfig>,
    decoder: Box<dyn Transcoder>,
    mouse_support: bool,

    escbuf: Vec<u8>,
    /// A bare ESC was consumed without follow-up; the next key or rune
    /// event inherits ALT.
    escaped: bool,
    /// A button was down recently; wheel impulses debounce to button 1.
    was_button: bool,
    /// SGR button-state tracking for broken motion reports.
    button_down: bool,

    paste_threshold: usize,
    size: (u16, u16),
}

impl InputParser {
    /// Create a parser.
    ///
    /// `mouse_support` should reflect whether the capability record
    /// advertises mouse reports; without it the mouse sub-parsers never
    /// run.
    #[must_use]
    pub fn new(
        keys: Arc<KeyTable>,
        cfg: Arc<InputConfig>,
        decoder: Box<dyn Transcoder>,
        mouse_support: bool,
    ) -> Self {
        Self {
            keys,
            cfg,
            decoder,
            mouse_support,
            escbuf: Vec::new(),
            escaped: false,
            was_button: false,
            button_down: false,
            paste_threshold: 2,
            size: (80, 24),
        }
    }

    /// Minimum length of a non-escape byte run that the unstructured
    /// paste heuristic converts into a single [`Event::Paste`].
    ///
    /// Defaults to 2: any multi-byte run dispatches as a paste while the
    /// heuristic is armed. Raising it makes fast typists less likely to
    /// see their keystrokes fused, at the cost of splitting small pastes.
    pub fn set_paste_threshold(&mut self, threshold: usize) {
        self.paste_threshold = threshold.max(2);
    }

    /// Tell the parser the screen size, for mouse coordinate clipping.
    pub fn set_screen_size(&mut self, width: u16, height: u16) {
        self.size = (width, height);
    }

    /// Drain as many events as possible from `buf`.
    ///
    /// `expire` reports that the quiet-time elapsed with the buffer
    /// unchanged: ambiguous prefixes are then resolved by the catch-all
    /// instead of waiting for more bytes.
    pub fn scan(&mut self, buf: &mut InputBuffer, expire: bool) -> Vec<Event> {
        let mut evs = Vec::new();

        loop {
            if buf.is_empty() {
                break;
            }
            let mut partials = 0usize;

            if self.cfg.paste_enabled() && self.parse_paste(buf, &mut evs) {
                continue;
            }

            match self.parse_osc52_paste(buf, &mut evs) {
                Scan::Complete => continue,
                Scan::Partial => partials += 1,
                Scan::Abstain => {}
            }

            match self.parse_bracketed_paste(buf, &mut evs) {
                Scan::Complete => continue,
                Scan::Partial => partials += 1,
                Scan::Abstain => {}
            }

            match self.parse_rune(buf, &mut evs) {
                Scan::Complete => continue,
                Scan::Partial => partials += 1,
                Scan::Abstain => {}
            }

            match self.parse_function_key(buf, &mut evs) {
                Scan::Complete => continue,
                Scan::Partial => partials += 1,
                Scan::Abstain => {}
            }

            if self.mouse_support {
                match self.parse_xterm_mouse(buf, &mut evs) {
                    Scan::Complete => continue,
                    Scan::Partial => partials += 1,
                    Scan::Abstain => {}
                }

                match self.parse_sgr_mouse(buf, &mut evs) {
                    Scan::Complete => continue,
                    Scan::Partial => partials += 1,
                    Scan::Abstain => {}
                }
            }

            if partials == 0 || expire {
                self.catch_all(buf, &mut evs);
                continue;
            }

            // Some sub-parser still hopes for more bytes; let them arrive.
            break;
        }

        evs
    }

    fn take_escbuf(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.escbuf)
    }

    /// Unstructured paste: a multi-byte run without escapes.
    fn parse_paste(&mut self, buf: &mut InputBuffer, evs: &mut Vec<Event>) -> bool {
        let b = buf.as_slice();
        if b[0] == ESC {
            return false;
        }
        let run = b.iter().position(|&c| c == ESC).unwrap_or(b.len());
        if run < self.paste_threshold {
            return false;
        }
        let taken = buf.take(run);
        self.escbuf.extend_from_slice(&taken);
        let text = normalize_cr(&String::from_utf8_lossy(&taken));
        let raw = self.take_escbuf();
        evs.push(Event::Paste(PasteEvent::new(text, raw)));
        true
    }

    /// OSC-52 clipboard response.
    fn parse_osc52_paste(&mut self, buf: &mut InputBuffer, evs: &mut Vec<Event>) -> Scan {
        let b = buf.as_slice();
        if !(b.starts_with(OSC52_BEGIN) || OSC52_BEGIN.starts_with(b)) {
            return Scan::Abstain;
        }
        // Register byte plus its separating semicolon.
        let prefix_len = OSC52_BEGIN.len() + 2;
        let Some(end) = find_subslice(b, OSC52_END) else {
            return Scan::Partial;
        };
        if end < prefix_len {
            return Scan::Partial;
        }

        let taken = buf.take(end + OSC52_END.len());
        self.escbuf.extend_from_slice(&taken);
        match BASE64.decode(&taken[prefix_len..end]) {
            Ok(data) => {
                let raw = self.take_escbuf();
                evs.push(Event::Paste(PasteEvent::new(
                    String::from_utf8_lossy(&data),
                    raw,
                )));
            }
            Err(err) => {
                // Invalid payload: swallow the sequence.
                tracing::debug!(%err, "discarding undecodable OSC-52 paste");
                self.escbuf.clear();
            }
        }
        Scan::Complete
    }

    /// Bracketed paste.
    fn parse_bracketed_paste(&mut self, buf: &mut InputBuffer, evs: &mut Vec<Event>) -> Scan {
        let b = buf.as_slice();
        if !(b.starts_with(PASTE_BEGIN) || PASTE_BEGIN.starts_with(b)) {
            return Scan::Abstain;
        }
        let Some(end) = find_subslice(b, PASTE_END) else {
            return Scan::Partial;
        };
        if end < PASTE_BEGIN.len() {
            return Scan::Partial;
        }

        let taken = buf.take(end + PASTE_END.len());
        self.escbuf.extend_from_slice(&taken);
        let text = normalize_cr(&String::from_utf8_lossy(&taken[PASTE_BEGIN.len()..end]));
        let raw = self.take_escbuf();
        evs.push(Event::Paste(PasteEvent::new(text, raw)));
        Scan::Complete
    }

    /// A printable rune: ASCII fast path, or via the decoder.
    fn parse_rune(&mut self, buf: &mut InputBuffer, evs: &mut Vec<Event>) -> Scan {
        let b = buf.as_slice();
        if (0x20..=0x7F).contains(&b[0]) {
            // Printable ASCII needs no decoding.
            let mods = self.consume_escaped();
            let taken = buf.take(1);
            self.escbuf.extend_from_slice(&taken);
            let raw = self.take_escbuf();
            evs.push(Event::Key(KeyEvent::new(
                Key::Rune,
                taken[0] as char,
                mods,
                raw,
            )));
            return Scan::Complete;
        }
        if b[0] < 0x80 {
            // Control bytes are keys, not runes.
            return Scan::Abstain;
        }

        let mut out = [0u8; 12];
        let max = b.len().min(8);
        for len in 1..=max {
            self.decoder.reset();
            let (n_out, n_in, state) = self.decoder.transform(&mut out, &b[..len], true);
            if state == TransformState::ShortSrc {
                continue;
            }
            if n_out > 0 {
                let decoded = std::str::from_utf8(&out[..n_out])
                    .ok()
                    .and_then(|s| s.chars().next());
                let taken = buf.take(n_in.max(1));
                self.escbuf.extend_from_slice(&taken);
                match decoded {
                    Some(ch) if ch != char::REPLACEMENT_CHARACTER => {
                        let mods = self.consume_escaped();
                        let raw = self.take_escbuf();
                        evs.push(Event::Key(KeyEvent::new(Key::Rune, ch, mods, raw)));
                    }
                    _ => {
                        // Undecodable glyph: consume the bytes silently.
                        self.escbuf.clear();
                    }
                }
                return Scan::Complete;
            }
        }

        // Could be the start of a longer encoded sequence.
        Scan::Partial
    }

    /// Longest-prefix match against the key table.
    fn parse_function_key(&mut self, buf: &mut InputBuffer, evs: &mut Vec<Event>) -> Scan {
        let b = buf.as_slice();
        let mut partial = false;
        let mut best: Option<(usize, Key, ModMask)> = None;

        for (seq, kp) in self.keys.iter() {
            // The single-byte ESC entry (if any) belongs to the timeout path.
            if seq.len() == 1 && seq[0] == ESC {
                continue;
            }
            if b.starts_with(seq) {
                if best.map_or(true, |(len, _, _)| seq.len() > len) {
                    best = Some((seq.len(), kp.key, kp.mods));
                }
            } else if seq.starts_with(b) {
                partial = true;
            }
        }

        if let Some((len, key, mods)) = best {
            let ch = if len == 1 { b[0] as char } else { '\0' };
            let mut mods = mods;
            if self.escaped {
                mods |= ModMask::ALT;
                self.escaped = false;
            }
            let taken = buf.take(len);
            self.escbuf.extend_from_slice(&taken);
            let raw = self.take_escbuf();
            evs.push(Event::Key(KeyEvent::new(key, ch, mods, raw)));
            return Scan::Complete;
        }
        if partial {
            Scan::Partial
        } else {
            Scan::Abstain
        }
    }

    /// Legacy X10 mouse report: `ESC [ M` plus three biased bytes.
    fn parse_xterm_mouse(&mut self, buf: &mut InputBuffer, evs: &mut Vec<Event>) -> Scan {
        let b = buf.as_slice();
        let mut state = if self.escaped { 1 } else { 0 };
        let mut btn = 0i32;
        let mut x = 0i32;

        for i in 0..b.len() {
            match state {
                0 => match b[i] {
                    0x1B => state = 1,
                    0x9B => state = 2,
                    _ => return Scan::Abstain,
                },
                1 => {
                    if b[i] != b'[' {
                        return Scan::Abstain;
                    }
                    state = 2;
                }
                2 => {
                    if b[i] != b'M' {
                        return Scan::Abstain;
                    }
                    state = 3;
                }
                3 => {
                    btn = i32::from(b[i]);
                    state = 4;
                }
                4 => {
                    x = i32::from(b[i]) - 32 - 1;
                    state = 5;
                }
                _ => {
                    let y = i32::from(b[i]) - 32 - 1;
                    let taken = buf.take(i + 1);
                    self.escbuf.extend_from_slice(&taken);
                    evs.push(self.build_mouse_event(x, y, btn));
                    return Scan::Complete;
                }
            }
        }
        Scan::Partial
    }

    /// SGR mouse report: `ESC [ <` decimal params, `M`/`m`.
    fn parse_sgr_mouse(&mut self, buf: &mut InputBuffer, evs: &mut Vec<Event>) -> Scan {
        let b = buf.as_slice();
        let mut state = if self.escaped { 1 } else { 0 };
        let mut val = 0i32;
        let mut dig = false;
        let mut neg = false;
        let (mut btn, mut x) = (0i32, 0i32);

        for i in 0..b.len() {
            match b[i] {
                0x1B => {
                    if state != 0 {
                        return Scan::Abstain;
                    }
                    state = 1;
                }
                0x9B => {
                    if state != 0 {
                        return Scan::Abstain;
                    }
                    state = 2;
                }
                b'[' => {
                    if state != 1 {
                        return Scan::Abstain;
                    }
                    state = 2;
                }
                b'<' => {
                    if state != 2 {
                        return Scan::Abstain;
                    }
                    val = 0;
                    dig = false;
                    neg = false;
                    state = 3;
                }
                b'-' => {
                    if !(3..=5).contains(&state) || dig || neg {
                        return Scan::Abstain;
                    }
                    neg = true;
                }
                b'0'..=b'9' => {
                    if !(3..=5).contains(&state) {
                        return Scan::Abstain;
                    }
                    val = val * 10 + i32::from(b[i] - b'0');
                    dig = true;
                }
                b';' => {
                    let v = if neg { -val } else { val };
                    match state {
                        3 => btn = v,
                        4 => x = v - 1,
                        _ => return Scan::Abstain,
                    }
                    val = 0;
                    dig = false;
                    neg = false;
                    state += 1;
                }
                b'm' | b'M' => {
                    if state != 5 {
                        return Scan::Abstain;
                    }
                    let y = (if neg { -val } else { val }) - 1;

                    let motion = btn & 32 != 0;
                    btn &= !32;
                    if b[i] == b'm' {
                        // Release clears every button.
                        btn |= 3;
                        btn &= !0x40;
                        self.button_down = false;
                    } else if motion {
                        // Some terminals report button-one motion instead
                        // of encoding "no buttons"; repair it unless a
                        // press is actually outstanding.
                        if !self.button_down {
                            btn |= 3;
                            btn &= !0x40;
                        }
                    } else {
                        self.button_down = true;
                    }

                    let taken = buf.take(i + 1);
                    self.escbuf.extend_from_slice(&taken);
                    evs.push(self.build_mouse_event(x, y, btn));
                    return Scan::Complete;
                }
                _ => return Scan::Abstain,
            }
        }
        Scan::Partial
    }

    /// Resolve a leading byte nothing else wants.
    fn catch_all(&mut self, buf: &mut InputBuffer, evs: &mut Vec<Event>) {
        let b = buf.as_slice();
        if b[0] == ESC {
            for seq in self.cfg.raw_seqs() {
                if b.starts_with(&seq) {
                    buf.take(seq.len());
                    self.escbuf.clear();
                    evs.push(Event::Raw(seq));
                    return;
                }
            }
            if b.len() == 1 {
                let taken = buf.take(1);
                self.escbuf.clear();
                self.escaped = false;
                evs.push(Event::Key(KeyEvent::new(
                    Key::Esc,
                    '\0',
                    ModMask::empty(),
                    taken,
                )));
            } else {
                let taken = buf.take(1);
                self.escbuf.extend_from_slice(&taken);
                self.escaped = true;
            }
            return;
        }

        // Nothing was ever going to match; hand the byte to the
        // application and let it sort things out.
        let taken = buf.take(1);
        self.escbuf.extend_from_slice(&taken);
        let raw = self.take_escbuf();
        evs.push(Event::Raw(raw));
    }

    fn consume_escaped(&mut self) -> ModMask {
        if self.escaped {
            self.escaped = false;
            ModMask::ALT
        } else {
            ModMask::empty()
        }
    }

    /// Assemble a mouse event from decoded coordinates and button state.
    ///
    /// Wheel impulses have bit 6 set and no release events; during a
    /// click-drag some terminals misdeliver them, so while a button is
    /// held they debounce to button 1.
    fn build_mouse_event(&mut self, x: i32, y: i32, btn: i32) -> Event {
        let buttons = match btn & 0x43 {
            0 => {
                self.was_button = true;
                ButtonMask::BUTTON1
            }
            1 => {
                self.was_button = true;
                ButtonMask::BUTTON3
            }
            2 => {
                self.was_button = true;
                ButtonMask::BUTTON2
            }
            3 => {
                self.was_button = false;
                ButtonMask::empty()
            }
            0x40 => {
                if self.was_button {
                    ButtonMask::BUTTON1
                } else {
                    ButtonMask::WHEEL_UP
                }
            }
            0x41 => {
                if self.was_button {
                    ButtonMask::BUTTON1
                } else {
                    ButtonMask::WHEEL_DOWN
                }
            }
            _ => ButtonMask::empty(),
        };

        let mut mods = ModMask::empty();
        if btn & 0x4 != 0 {
            mods |= ModMask::SHIFT;
        }
        if btn & 0x8 != 0 {
            mods |= ModMask::ALT;
        }
        if btn & 0x10 != 0 {
            mods |= ModMask::CTRL;
        }

        // Click-drags can report coordinates outside the screen.
        let (w, h) = self.size;
        let x = x.clamp(0, i32::from(w.saturating_sub(1))) as u16;
        let y = y.clamp(0, i32::from(h.saturating_sub(1))) as u16;

        self.escaped = false;
        let raw = self.take_escbuf();
        Event::Mouse(MouseEvent::new(x, y, buttons, mods, raw))
    }
}

/// Replace every carriage return with a newline.
fn normalize_cr(s: &str) -> String {
    s.replace('\r', "\n")
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::Utf8Codec;
    use crate::terminfo::builtin;

    fn parser() -> (InputParser, Arc<InputConfig>) {
        let ti = builtin::xterm_256color();
        let keys = Arc::new(KeyTable::new(&ti));
        let cfg = Arc::new(InputConfig::new());
        let parser = InputParser::new(keys, Arc::clone(&cfg), Box::new(Utf8Codec), true);
        (parser, cfg)
    }

    fn feed(parser: &mut InputParser, bytes: &[u8], expire: bool) -> Vec<Event> {
        let mut buf = InputBuffer::new();
        buf.extend(bytes);
        parser.scan(&mut buf, expire)
    }

    // ── Runes ────────────────────────────────────────────────────────

    #[test]
    fn ascii_rune() {
        let (mut p, _) = parser();
        let evs = feed(&mut p, b"a", false);
        assert_eq!(
            evs,
            vec![Event::Key(KeyEvent::new(
                Key::Rune,
                'a',
                ModMask::empty(),
                b"a".to_vec()
            ))]
        );
    }

    #[test]
    fn utf8_rune_assembled_across_scans() {
        let (mut p, _) = parser();
        let mut buf = InputBuffer::new();
        buf.extend(&[0xC3]);
        assert!(p.scan(&mut buf, false).is_empty());
        buf.extend(&[0xA9]);
        let evs = p.scan(&mut buf, false);
        assert_eq!(evs.len(), 1);
        assert!(matches!(
            &evs[0],
            Event::Key(k) if k.key == Key::Rune && k.ch == 'é'
        ));
    }

    #[test]
    fn control_byte_is_a_key_not_a_rune() {
        let (mut p, _) = parser();
        let evs = feed(&mut p, &[0x01], false);
        assert_eq!(evs.len(), 1);
        assert!(matches!(
            &evs[0],
            Event::Key(k) if k.key == Key::Ctrl(0x01) && k.mods == ModMask::CTRL
        ));
    }

    // ── Escape disambiguation ────────────────────────────────────────

    #[test]
    fn lone_esc_waits_for_expiry() {
        let (mut p, _) = parser();
        let mut buf = InputBuffer::new();
        buf.extend(b"\x1b");
        assert!(p.scan(&mut buf, false).is_empty());
        let evs = p.scan(&mut buf, true);
        assert_eq!(
            evs,
            vec![Event::Key(KeyEvent::new(
                Key::Esc,
                '\0',
                ModMask::empty(),
                b"\x1b".to_vec()
            ))]
        );
    }

    #[test]
    fn esc_then_rune_becomes_alt() {
        let (mut p, _) = parser();
        let evs = feed(&mut p, b"\x1ba", true);
        assert_eq!(
            evs,
            vec![Event::Key(KeyEvent::new(
                Key::Rune,
                'a',
                ModMask::ALT,
                b"\x1ba".to_vec()
            ))]
        );
    }

    #[test]
    fn function_keys_resolve_without_expiry() {
        let (mut p, _) = parser();
        let evs = feed(&mut p, b"\x1b[A", false);
        assert_eq!(
            evs,
            vec![Event::Key(KeyEvent::new(
                Key::Up,
                '\0',
                ModMask::empty(),
                b"\x1b[A".to_vec()
            ))]
        );
    }

    #[test]
    fn modified_function_key() {
        let (mut p, _) = parser();
        let evs = feed(&mut p, b"\x1b[1;5C", false);
        assert!(matches!(
            &evs[0],
            Event::Key(k) if k.key == Key::Right && k.mods == ModMask::CTRL
        ));
    }

    #[test]
    fn function_key_prefix_stays_pending() {
        let (mut p, _) = parser();
        let mut buf = InputBuffer::new();
        buf.extend(b"\x1b[");
        assert!(p.scan(&mut buf, false).is_empty());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn registered_raw_seq_wins_on_expiry() {
        let (mut p, cfg) = parser();
        cfg.register_raw_seq(b"\x1b[!special");
        let evs = feed(&mut p, b"\x1b[!special", true);
        assert_eq!(evs, vec![Event::Raw(b"\x1b[!special".to_vec())]);
    }

    // ── Mouse ────────────────────────────────────────────────────────

    #[test]
    fn sgr_press_then_release() {
        let (mut p, _) = parser();
        let evs = feed(&mut p, b"\x1b[<0;10;5M\x1b[<0;10;5m", false);
        assert_eq!(evs.len(), 2);
        assert!(matches!(
            &evs[0],
            Event::Mouse(m) if m.x == 9 && m.y == 4 && m.buttons == ButtonMask::BUTTON1
        ));
        assert!(matches!(
            &evs[1],
            Event::Mouse(m) if m.x == 9 && m.y == 4 && m.buttons.is_empty()
        ));
    }

    #[test]
    fn sgr_wheel_and_modifiers() {
        let (mut p, _) = parser();
        let evs = feed(&mut p, b"\x1b[<64;3;3M", false);
        assert!(matches!(
            &evs[0],
            Event::Mouse(m) if m.buttons == ButtonMask::WHEEL_UP
        ));
        let evs = feed(&mut p, b"\x1b[<69;3;3M", false);
        assert!(matches!(
            &evs[0],
            Event::Mouse(m) if m.buttons == ButtonMask::WHEEL_DOWN && m.mods == ModMask::SHIFT
        ));
    }

    #[test]
    fn wheel_debounces_to_button_one_while_dragging() {
        let (mut p, _) = parser();
        feed(&mut p, b"\x1b[<0;2;2M", false); // press
        let evs = feed(&mut p, b"\x1b[<64;2;2M", false); // wheel impulse mid-drag
        assert!(matches!(
            &evs[0],
            Event::Mouse(m) if m.buttons == ButtonMask::BUTTON1
        ));
        feed(&mut p, b"\x1b[<0;2;2m", false); // release
        let evs = feed(&mut p, b"\x1b[<64;2;2M", false);
        assert!(matches!(
            &evs[0],
            Event::Mouse(m) if m.buttons == ButtonMask::WHEEL_UP
        ));
    }

    #[test]
    fn x10_mouse_report() {
        let (mut p, _) = parser();
        // btn byte 32 = press button 1; coordinates biased by 32+1.
        let evs = feed(&mut p, &[0x1B, b'[', b'M', 32, 43, 37], false);
        assert!(matches!(
            &evs[0],
            Event::Mouse(m) if m.x == 10 && m.y == 4 && m.buttons == ButtonMask::BUTTON1
        ));
    }

    #[test]
    fn mouse_coordinates_clip_to_screen() {
        let (mut p, _) = parser();
        p.set_screen_size(10, 5);
        let evs = feed(&mut p, b"\x1b[<0;500;500M", false);
        assert!(matches!(
            &evs[0],
            Event::Mouse(m) if m.x == 9 && m.y == 4
        ));
    }

    // ── Paste ────────────────────────────────────────────────────────

    #[test]
    fn bracketed_paste_normalises_cr() {
        let (mut p, _) = parser();
        let evs = feed(&mut p, b"\x1b[200~hello\r\nworld\x1b[201~", false);
        assert_eq!(evs.len(), 1);
        assert!(matches!(
            &evs[0],
            Event::Paste(ev) if ev.text == "hello\n\nworld"
        ));
    }

    #[test]
    fn bracketed_paste_waits_for_terminator() {
        let (mut p, _) = parser();
        let mut buf = InputBuffer::new();
        buf.extend(b"\x1b[200~partial");
        assert!(p.scan(&mut buf, false).is_empty());
        buf.extend(b"\x1b[201~");
        let evs = p.scan(&mut buf, false);
        assert!(matches!(&evs[0], Event::Paste(ev) if ev.text == "partial"));
    }

    #[test]
    fn osc52_paste_decodes_base64() {
        let (mut p, _) = parser();
        let evs = feed(&mut p, b"\x1b]52;c;aGVsbG8=\x1b\\", false);
        assert_eq!(evs.len(), 1);
        assert!(matches!(&evs[0], Event::Paste(ev) if ev.text == "hello"));
    }

    #[test]
    fn osc52_decode_error_is_swallowed() {
        let (mut p, _) = parser();
        let evs = feed(&mut p, b"\x1b]52;c;@@bad@@\x1b\\a", false);
        // The broken sequence vanishes; the trailing byte still parses.
        assert_eq!(evs.len(), 1);
        assert!(matches!(&evs[0], Event::Key(k) if k.ch == 'a'));
    }

    #[test]
    fn unstructured_paste_when_armed() {
        let (mut p, cfg) = parser();
        cfg.set_paste(true);
        let evs = feed(&mut p, b"lorem ipsum\r", false);
        assert_eq!(evs.len(), 1);
        assert!(matches!(
            &evs[0],
            Event::Paste(ev) if ev.text == "lorem ipsum\n"
        ));
    }

    #[test]
    fn unstructured_paste_off_by_default() {
        let (mut p, _) = parser();
        let evs = feed(&mut p, b"hi", false);
        assert_eq!(evs.len(), 2);
        assert!(matches!(&evs[0], Event::Key(k) if k.ch == 'h'));
        assert!(matches!(&evs[1], Event::Key(k) if k.ch == 'i'));
    }

    #[test]
    fn single_byte_never_pastes() {
        let (mut p, cfg) = parser();
        cfg.set_paste(true);
        let evs = feed(&mut p, b"x", false);
        assert!(matches!(&evs[0], Event::Key(k) if k.ch == 'x'));
    }

    // ── Catch-all ────────────────────────────────────────────────────

    #[test]
    fn undecodable_byte_surfaces_as_raw_on_expiry() {
        let (mut p, _) = parser();
        let mut buf = InputBuffer::new();
        buf.extend(&[0xFF]);
        assert!(p.scan(&mut buf, false).is_empty());
        let evs = p.scan(&mut buf, true);
        assert_eq!(evs, vec![Event::Raw(vec![0xFF])]);
    }
}
