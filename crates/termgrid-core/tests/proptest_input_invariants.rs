//! Property tests for the input parser.
//!
//! These pin the parser's externally observable contract: rune streams
//! decode 1:1, every registered key sequence resolves to its table entry,
//! paste framing is atomic, and ambiguous prefixes resolve deterministically
//! once the quiet-time expires.

use std::sync::Arc;

use proptest::prelude::*;

use termgrid_core::charset::Utf8Codec;
use termgrid_core::input::{InputBuffer, InputConfig, InputParser};
use termgrid_core::terminfo::builtin;
use termgrid_core::{Event, Key, KeyTable, ModMask};

fn parser() -> InputParser {
    let ti = builtin::xterm_256color();
    let keys = Arc::new(KeyTable::new(&ti));
    InputParser::new(keys, Arc::new(InputConfig::new()), Box::new(Utf8Codec), true)
}

fn scan_all(parser: &mut InputParser, bytes: &[u8], expire: bool) -> Vec<Event> {
    let mut buf = InputBuffer::new();
    buf.extend(bytes);
    let mut evs = parser.scan(&mut buf, false);
    if expire {
        evs.extend(parser.scan(&mut buf, true));
    }
    evs
}

proptest! {
    // Every ESC-free, control-free byte stream decodes to exactly one
    // rune event per codepoint, in order, consuming every byte.
    #[test]
    fn rune_streams_decode_one_to_one(
        chars in proptest::collection::vec(
            any::<char>().prop_filter("printable", |c| {
                !c.is_control() && *c != char::REPLACEMENT_CHARACTER
            }),
            0..64,
        )
    ) {
        let text: String = chars.iter().collect();
        let mut p = parser();
        let mut buf = InputBuffer::new();
        buf.extend(text.as_bytes());
        let evs = p.scan(&mut buf, false);

        prop_assert!(buf.is_empty(), "unconsumed bytes remain");
        prop_assert_eq!(evs.len(), chars.len());
        for (ev, expected) in evs.iter().zip(&chars) {
            match ev {
                Event::Key(k) => {
                    prop_assert_eq!(k.key, Key::Rune);
                    prop_assert_eq!(k.ch, *expected);
                    prop_assert_eq!(k.mods, ModMask::empty());
                }
                other => prop_assert!(false, "unexpected event {:?}", other),
            }
        }
    }

    // Rune streams survive arbitrary chunking: splitting the byte stream
    // at any point yields the same events.
    #[test]
    fn rune_streams_survive_chunking(
        text in "[a-zé世λ ]{1,32}",
        split in 0usize..32,
    ) {
        let bytes = text.as_bytes();
        let split = split.min(bytes.len());

        let mut whole = parser();
        let expected = scan_all(&mut whole, bytes, false);

        let mut chunked = parser();
        let mut buf = InputBuffer::new();
        buf.extend(&bytes[..split]);
        let mut evs = chunked.scan(&mut buf, false);
        buf.extend(&bytes[split..]);
        evs.extend(chunked.scan(&mut buf, false));

        prop_assert_eq!(evs, expected);
    }

    // Bracketed paste is atomic and CR-normalised, whatever the payload.
    #[test]
    fn bracketed_paste_is_atomic(payload in "[a-zA-Z0-9 \r\n.,!?]{0,128}") {
        let mut bytes = b"\x1b[200~".to_vec();
        bytes.extend_from_slice(payload.as_bytes());
        bytes.extend_from_slice(b"\x1b[201~");

        let mut p = parser();
        let evs = scan_all(&mut p, &bytes, false);
        prop_assert_eq!(evs.len(), 1);
        match &evs[0] {
            Event::Paste(ev) => {
                prop_assert_eq!(&ev.text, &payload.replace('\r', "\n"));
                prop_assert_eq!(&ev.raw, &bytes);
            }
            other => prop_assert!(false, "unexpected event {:?}", other),
        }
    }

    // OSC-52 payloads round-trip: the sequence SetClipboard emits, fed
    // back as input, reproduces the original text.
    #[test]
    fn osc52_round_trips(text in "[ -~]{0,64}") {
        use base64::Engine as _;
        let payload = base64::engine::general_purpose::STANDARD.encode(&text);
        let bytes = format!("\x1b]52;c;{payload}\x1b\\");

        let mut p = parser();
        let evs = scan_all(&mut p, bytes.as_bytes(), false);
        prop_assert_eq!(evs.len(), 1);
        match &evs[0] {
            Event::Paste(ev) => prop_assert_eq!(&ev.text, &text),
            other => prop_assert!(false, "unexpected event {:?}", other),
        }
    }
}

// ── Key table round-trips ────────────────────────────────────────────

/// Feeding any registered multi-byte sequence (or single control byte)
/// produces exactly its table entry.
#[test]
fn every_registered_sequence_resolves() {
    let ti = builtin::xterm_256color();
    let keys = Arc::new(KeyTable::new(&ti));

    let entries: Vec<(Vec<u8>, Key, ModMask)> = keys
        .iter()
        .map(|(seq, kp)| (seq.clone(), kp.key, kp.mods))
        // Single printable bytes (DEL) are claimed by the rune parser.
        .filter(|(seq, _, _)| !(seq.len() == 1 && (0x20..=0x7F).contains(&seq[0])))
        .collect();
    assert!(!entries.is_empty());

    for (seq, key, mods) in entries {
        let mut p = parser();
        let mut buf = InputBuffer::new();
        buf.extend(&seq);
        let evs = p.scan(&mut buf, false);
        assert!(buf.is_empty(), "{seq:?} left bytes behind");
        assert_eq!(evs.len(), 1, "{seq:?} produced {evs:?}");
        match &evs[0] {
            Event::Key(k) => {
                assert_eq!(k.key, key, "sequence {seq:?}");
                assert_eq!(k.mods, mods, "sequence {seq:?}");
                assert_eq!(k.raw, seq, "sequence {seq:?}");
            }
            other => panic!("sequence {seq:?} produced {other:?}"),
        }
    }
}

/// A lone ESC resolves to Escape only after the quiet-time, never before.
#[test]
fn lone_esc_needs_expiry() {
    let mut p = parser();
    let mut buf = InputBuffer::new();
    buf.extend(b"\x1b");

    assert!(p.scan(&mut buf, false).is_empty());
    assert_eq!(buf.len(), 1);

    let evs = p.scan(&mut buf, true);
    assert_eq!(evs.len(), 1);
    assert!(matches!(&evs[0], Event::Key(k) if k.key == Key::Esc));
    assert!(buf.is_empty());
}

/// An expired function-key prefix resolves through the escape path: the
/// ESC is absorbed and the remainder re-parses as ALT-decorated input,
/// with the prefix preserved in the raw bytes.
#[test]
fn expired_prefix_resolves_deterministically() {
    let mut p = parser();
    let mut buf = InputBuffer::new();
    buf.extend(b"\x1b[");

    assert!(p.scan(&mut buf, false).is_empty());
    let evs = p.scan(&mut buf, true);
    assert_eq!(evs.len(), 1);
    match &evs[0] {
        Event::Key(k) => {
            assert_eq!(k.key, Key::Rune);
            assert_eq!(k.ch, '[');
            assert_eq!(k.mods, ModMask::ALT);
            assert_eq!(k.raw, b"\x1b[".to_vec());
        }
        other => panic!("unexpected {other:?}"),
    }
}

// ── End-to-end input scenarios ───────────────────────────────────────

#[test]
fn scenario_plain_rune() {
    let mut p = parser();
    let evs = scan_all(&mut p, b"a", false);
    assert_eq!(evs.len(), 1);
    assert!(matches!(
        &evs[0],
        Event::Key(k) if k.key == Key::Rune && k.ch == 'a'
            && k.mods == ModMask::empty() && k.raw == b"a"
    ));
}

#[test]
fn scenario_up_arrow() {
    let mut p = parser();
    let evs = scan_all(&mut p, b"\x1b[A", true);
    assert_eq!(evs.len(), 1);
    assert!(matches!(
        &evs[0],
        Event::Key(k) if k.key == Key::Up && k.mods == ModMask::empty() && k.raw == b"\x1b[A"
    ));
}

#[test]
fn scenario_alt_rune() {
    let mut p = parser();
    let evs = scan_all(&mut p, b"\x1ba", true);
    assert_eq!(evs.len(), 1);
    assert!(matches!(
        &evs[0],
        Event::Key(k) if k.key == Key::Rune && k.ch == 'a'
            && k.mods == ModMask::ALT && k.raw == b"\x1ba"
    ));
}

#[test]
fn scenario_sgr_press_release() {
    use termgrid_core::ButtonMask;
    let mut p = parser();
    let evs = scan_all(&mut p, b"\x1b[<0;10;5M\x1b[<0;10;5m", false);
    assert_eq!(evs.len(), 2);
    assert!(matches!(
        &evs[0],
        Event::Mouse(m) if m.x == 9 && m.y == 4
            && m.buttons == ButtonMask::BUTTON1 && m.mods == ModMask::empty()
    ));
    assert!(matches!(
        &evs[1],
        Event::Mouse(m) if m.x == 9 && m.y == 4 && m.buttons.is_empty()
    ));
}

#[test]
fn scenario_bracketed_paste() {
    let mut p = parser();
    let evs = scan_all(&mut p, b"\x1b[200~hello\r\nworld\x1b[201~", false);
    assert_eq!(evs.len(), 1);
    assert!(matches!(
        &evs[0],
        Event::Paste(ev) if ev.text == "hello\n\nworld"
    ));
}

#[test]
fn scenario_osc52_paste() {
    let mut p = parser();
    let evs = scan_all(&mut p, b"\x1b]52;c;aGVsbG8=\x1b\\", false);
    assert_eq!(evs.len(), 1);
    assert!(matches!(&evs[0], Event::Paste(ev) if ev.text == "hello"));
}
