#![forbid(unsafe_code)]

//! Charset transcoders.
//!
//! The engine converts between Unicode codepoints and the terminal's byte
//! charset through a pair of stateful [`Transcoder`]s. The contract mirrors
//! an incremental transform: the caller feeds a destination buffer, a
//! source slice, and an at-end-of-input flag, and receives how much of each
//! was used plus a [`TransformState`].
//!
//! An *encoder* maps UTF-8 bytes to terminal bytes and signals "this
//! codepoint cannot be represented" by emitting the substitution byte
//! [`SUBSTITUTE`]. A *decoder* maps terminal bytes back to UTF-8.

/// The encoder's "cannot represent" byte (ASCII SUB).
pub const SUBSTITUTE: u8 = 0x1A;

/// Outcome of a [`Transcoder::transform`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformState {
    /// All source bytes consumed and converted.
    Done,
    /// The source ends mid-sequence; feed more bytes.
    ShortSrc,
    /// The destination buffer is too small.
    ShortDst,
    /// The source contains bytes the transcoder cannot make sense of.
    Malformed,
}

/// A stateful byte-stream transcoder.
pub trait Transcoder: Send {
    /// Discard any buffered partial sequence.
    fn reset(&mut self);

    /// Transform `src` into `dst`.
    ///
    /// Returns `(n_out, n_in, state)`: bytes written to `dst`, bytes
    /// consumed from `src`, and the terminal condition. `at_eof` tells the
    /// transcoder that no more source bytes will follow, so a trailing
    /// partial sequence is malformed rather than short.
    fn transform(&mut self, dst: &mut [u8], src: &[u8], at_eof: bool) -> (usize, usize, TransformState);
}

/// UTF-8 ⇄ UTF-8: a validating pass-through.
#[derive(Debug, Default)]
pub struct Utf8Codec;

impl Transcoder for Utf8Codec {
    fn reset(&mut self) {}

    fn transform(&mut self, dst: &mut [u8], src: &[u8], at_eof: bool) -> (usize, usize, TransformState) {
        let mut n_in = 0;
        let mut n_out = 0;
        while n_in < src.len() {
            let len = utf8_len(src[n_in]);
            let Some(len) = len else {
                return (n_out, n_in, TransformState::Malformed);
            };
            if n_in + len > src.len() {
                if at_eof {
                    return (n_out, n_in, TransformState::Malformed);
                }
                return (n_out, n_in, TransformState::ShortSrc);
            }
            let seq = &src[n_in..n_in + len];
            if std::str::from_utf8(seq).is_err() {
                return (n_out, n_in, TransformState::Malformed);
            }
            if n_out + len > dst.len() {
                return (n_out, n_in, TransformState::ShortDst);
            }
            dst[n_out..n_out + len].copy_from_slice(seq);
            n_out += len;
            n_in += len;
        }
        (n_out, n_in, TransformState::Done)
    }
}

/// Sequence length implied by a UTF-8 lead byte.
fn utf8_len(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7F => Some(1),
        0xC2..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF4 => Some(4),
        _ => None,
    }
}

/// US-ASCII: 7-bit only.
///
/// The encoder substitutes for anything above 0x7F; the decoder treats
/// bytes above 0x7F as malformed.
#[derive(Debug, Default)]
pub struct AsciiEncoder;

impl Transcoder for AsciiEncoder {
    fn reset(&mut self) {}

    fn transform(&mut self, dst: &mut [u8], src: &[u8], at_eof: bool) -> (usize, usize, TransformState) {
        let mut n_in = 0;
        let mut n_out = 0;
        while n_in < src.len() {
            let len = match utf8_len(src[n_in]) {
                Some(len) => len,
                None => return (n_out, n_in, TransformState::Malformed),
            };
            if n_in + len > src.len() {
                if at_eof {
                    return (n_out, n_in, TransformState::Malformed);
                }
                return (n_out, n_in, TransformState::ShortSrc);
            }
            if n_out >= dst.len() {
                return (n_out, n_in, TransformState::ShortDst);
            }
            dst[n_out] = if len == 1 { src[n_in] } else { SUBSTITUTE };
            n_out += 1;
            n_in += len;
        }
        (n_out, n_in, TransformState::Done)
    }
}

/// US-ASCII decoder.
#[derive(Debug, Default)]
pub struct AsciiDecoder;

impl Transcoder for AsciiDecoder {
    fn reset(&mut self) {}

    fn transform(&mut self, dst: &mut [u8], src: &[u8], _at_eof: bool) -> (usize, usize, TransformState) {
        let mut n = 0;
        while n < src.len() {
            if src[n] >= 0x80 {
                return (n, n, TransformState::Malformed);
            }
            if n >= dst.len() {
                return (n, n, TransformState::ShortDst);
            }
            dst[n] = src[n];
            n += 1;
        }
        (n, n, TransformState::Done)
    }
}

/// ISO-8859-1 encoder: codepoints below U+0100 map 1:1, the rest substitute.
#[derive(Debug, Default)]
pub struct Latin1Encoder;

impl Transcoder for Latin1Encoder {
    fn reset(&mut self) {}

    fn transform(&mut self, dst: &mut [u8], src: &[u8], at_eof: bool) -> (usize, usize, TransformState) {
        let mut n_in = 0;
        let mut n_out = 0;
        while n_in < src.len() {
            let len = match utf8_len(src[n_in]) {
                Some(len) => len,
                None => return (n_out, n_in, TransformState::Malformed),
            };
            if n_in + len > src.len() {
                if at_eof {
                    return (n_out, n_in, TransformState::Malformed);
                }
                return (n_out, n_in, TransformState::ShortSrc);
            }
            let ch = match std::str::from_utf8(&src[n_in..n_in + len]).ok().and_then(|s| s.chars().next()) {
                Some(ch) => ch,
                None => return (n_out, n_in, TransformState::Malformed),
            };
            if n_out >= dst.len() {
                return (n_out, n_in, TransformState::ShortDst);
            }
            dst[n_out] = if (ch as u32) < 0x100 {
                ch as u32 as u8
            } else {
                SUBSTITUTE
            };
            n_out += 1;
            n_in += len;
        }
        (n_out, n_in, TransformState::Done)
    }
}

/// ISO-8859-1 decoder: every byte is a codepoint.
#[derive(Debug, Default)]
pub struct Latin1Decoder;

impl Transcoder for Latin1Decoder {
    fn reset(&mut self) {}

    fn transform(&mut self, dst: &mut [u8], src: &[u8], _at_eof: bool) -> (usize, usize, TransformState) {
        let mut n_in = 0;
        let mut n_out = 0;
        while n_in < src.len() {
            let ch = src[n_in] as char;
            let mut buf = [0u8; 4];
            let encoded = ch.encode_utf8(&mut buf);
            if n_out + encoded.len() > dst.len() {
                return (n_out, n_in, TransformState::ShortDst);
            }
            dst[n_out..n_out + encoded.len()].copy_from_slice(encoded.as_bytes());
            n_out += encoded.len();
            n_in += 1;
        }
        (n_out, n_in, TransformState::Done)
    }
}

/// Look up the encoder/decoder pair for a charset name.
///
/// Returns `None` for charsets the engine does not carry; the screen
/// surfaces that as an init-time error.
#[must_use]
pub fn lookup_charset(name: &str) -> Option<(Box<dyn Transcoder>, Box<dyn Transcoder>)> {
    match name.to_ascii_uppercase().as_str() {
        "UTF-8" | "UTF8" => Some((Box::new(Utf8Codec), Box::new(Utf8Codec))),
        "US-ASCII" | "ASCII" | "ANSI_X3.4-1968" => {
            Some((Box::new(AsciiEncoder), Box::new(AsciiDecoder)))
        }
        "ISO-8859-1" | "ISO8859-1" | "LATIN1" | "LATIN-1" => {
            Some((Box::new(Latin1Encoder), Box::new(Latin1Decoder)))
        }
        _ => None,
    }
}

/// Derive the charset name from the locale environment.
///
/// Consults `LC_ALL`, then `LC_CTYPE`, then `LANG`. A locale of the form
/// `lang_REGION.CHARSET@mod` yields `CHARSET`; an empty, `C`, or `POSIX`
/// locale yields `US-ASCII`; anything else defaults to `UTF-8`.
#[must_use]
pub fn charset_from_env() -> String {
    let locale = std::env::var("LC_ALL")
        .or_else(|_| std::env::var("LC_CTYPE"))
        .or_else(|_| std::env::var("LANG"))
        .unwrap_or_default();
    charset_from_locale(&locale)
}

/// Charset name for a locale string. See [`charset_from_env`].
#[must_use]
pub fn charset_from_locale(locale: &str) -> String {
    let locale = locale.split('@').next().unwrap_or("");
    if locale.is_empty() || locale == "C" || locale == "POSIX" {
        return "US-ASCII".into();
    }
    match locale.split_once('.') {
        Some((_, charset)) if !charset.is_empty() => charset.to_ascii_uppercase(),
        _ => "UTF-8".into(),
    }
}
