//! Incremental byte ⇄ text transcoding.
//!
//! [`CharDecoder`] accepts bytes in arbitrary chunks and appends the decoded
//! characters to a `String`. A multi-byte sequence split across two chunks is
//! held back until the rest of it arrives, so decoding a body in pieces gives
//! exactly the same text as decoding it in one go. [`CharEncoder`] performs the
//! inverse for the send direction.
//!
//! Malformed input is reported as a [`DecodeError`]; nothing is ever replaced
//! with U+FFFD.
use core::{fmt, str::FromStr};

use bstr::{BString, ByteSlice};
use serde::Deserialize;
use thiserror::Error;

/// Text encodings a body may be transferred in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Charset {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    /// ISO-8859-1: each byte is the code point of the same value.
    Latin1,
    Ascii,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported charset '{0}'")]
pub struct UnsupportedCharset(pub String);

/// Malformed bytes for the charset in use.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed {charset} input at byte {offset}: {:?}", .bytes.as_bstr())]
pub struct DecodeError {
    pub charset: Charset,
    /// Offset of the first offending byte from the start of the body.
    pub offset: u64,
    pub bytes: BString,
}

/// A character that the target charset has no representation for.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("'{}' cannot be encoded as {charset}", .ch.escape_unicode())]
pub struct EncodeError {
    pub charset: Charset,
    pub ch: char,
}

impl Charset {
    /// The canonical IANA name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Utf16Le => "UTF-16LE",
            Self::Utf16Be => "UTF-16BE",
            Self::Latin1 => "ISO-8859-1",
            Self::Ascii => "US-ASCII",
        }
    }

    /// Highest code point the charset can carry directly. Anything above must
    /// be escaped when writing JSON.
    #[must_use]
    pub fn max_code_point(self) -> u32 {
        match self {
            Self::Utf8 | Self::Utf16Le | Self::Utf16Be => char::MAX as u32,
            Self::Latin1 => 0xFF,
            Self::Ascii => 0x7F,
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Charset {
    type Err = UnsupportedCharset;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "utf-16le" | "utf16le" => Ok(Self::Utf16Le),
            "utf-16be" | "utf16be" => Ok(Self::Utf16Be),
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "l1" => Ok(Self::Latin1),
            "us-ascii" | "ascii" => Ok(Self::Ascii),
            _ => Err(UnsupportedCharset(label.to_string())),
        }
    }
}

impl TryFrom<String> for Charset {
    type Error = UnsupportedCharset;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        label.parse()
    }
}

// ------------------------------------------------------------------------------------------------
// Decoder
// ------------------------------------------------------------------------------------------------

/// Stateful decoder for one body.
#[derive(Debug)]
pub struct CharDecoder {
    charset: Charset,
    /// Bytes of an incomplete sequence carried over from the previous chunk.
    pending: Vec<u8>,
    /// High surrogate waiting for its low half (UTF-16 only).
    high_surrogate: Option<u16>,
    /// Bytes consumed so far, for error offsets.
    offset: u64,
    at_start: bool,
}

impl CharDecoder {
    #[must_use]
    pub fn new(charset: Charset) -> Self {
        Self {
            charset,
            pending: Vec::with_capacity(4),
            high_surrogate: None,
            offset: 0,
            at_start: true,
        }
    }

    #[must_use]
    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Decodes `bytes` and appends the text to `out`. Trailing bytes of an
    /// incomplete sequence are kept for the next call.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the bytes are not valid in the charset.
    pub fn decode(&mut self, bytes: &[u8], out: &mut String) -> Result<(), DecodeError> {
        let start = out.len();
        match self.charset {
            Charset::Utf8 => self.decode_utf8(bytes, out)?,
            Charset::Utf16Le => self.decode_utf16(bytes, out, u16::from_le_bytes)?,
            Charset::Utf16Be => self.decode_utf16(bytes, out, u16::from_be_bytes)?,
            Charset::Latin1 => out.extend(bytes.iter().map(|&b| char::from(b))),
            Charset::Ascii => {
                if let Some(pos) = bytes.iter().position(|b| !b.is_ascii()) {
                    return Err(self.error_at(pos, &bytes[pos..=pos]));
                }
                // ASCII is a subset of UTF-8
                out.extend(bytes.iter().map(|&b| char::from(b)));
            }
        }
        self.offset += bytes.len() as u64;
        if self.at_start && out.len() > start {
            self.at_start = false;
            if out[start..].starts_with('\u{FEFF}') {
                out.replace_range(start..start + '\u{FEFF}'.len_utf8(), "");
            }
        }
        Ok(())
    }

    /// Signals the end of the body.
    ///
    /// # Errors
    ///
    /// Fails if the body ended in the middle of a multi-byte sequence.
    pub fn finish(&mut self) -> Result<(), DecodeError> {
        if let Some(high) = self.high_surrogate.take() {
            let bytes = match self.charset {
                Charset::Utf16Le => high.to_le_bytes(),
                _ => high.to_be_bytes(),
            };
            return Err(DecodeError {
                charset: self.charset,
                offset: self.offset.saturating_sub(2 + self.pending.len() as u64),
                bytes: BString::from(bytes.to_vec()),
            });
        }
        if !self.pending.is_empty() {
            let bytes = core::mem::take(&mut self.pending);
            return Err(DecodeError {
                charset: self.charset,
                offset: self.offset - bytes.len() as u64,
                bytes: BString::from(bytes),
            });
        }
        Ok(())
    }

    fn error_at(&self, pos: usize, bytes: &[u8]) -> DecodeError {
        DecodeError {
            charset: self.charset,
            offset: self.offset + pos as u64,
            bytes: BString::from(bytes),
        }
    }

    /// Error for a unit that ended at `pos` in the current chunk and started
    /// `back` bytes earlier, possibly in a previous chunk.
    fn error_before(&self, pos: usize, back: u64, bytes: &[u8]) -> DecodeError {
        DecodeError {
            charset: self.charset,
            offset: (self.offset + pos as u64).saturating_sub(back),
            bytes: BString::from(bytes),
        }
    }

    fn decode_utf8(&mut self, mut bytes: &[u8], out: &mut String) -> Result<(), DecodeError> {
        let mut consumed = 0;
        if !self.pending.is_empty() {
            let needed = utf8_width(self.pending[0]) - self.pending.len();
            let take = needed.min(bytes.len());
            self.pending.extend_from_slice(&bytes[..take]);
            bytes = &bytes[take..];
            consumed = take;
            if take < needed {
                return Ok(());
            }
            match core::str::from_utf8(&self.pending) {
                Ok(s) => out.push_str(s),
                Err(_) => {
                    let carried = self.pending.len() - take;
                    return Err(DecodeError {
                        charset: self.charset,
                        offset: self.offset - carried as u64,
                        bytes: BString::from(core::mem::take(&mut self.pending)),
                    });
                }
            }
            self.pending.clear();
        }

        match core::str::from_utf8(bytes) {
            Ok(s) => out.push_str(s),
            Err(err) => {
                let valid = err.valid_up_to();
                // the prefix up to `valid` is valid, so nothing is substituted
                out.push_str(&String::from_utf8_lossy(&bytes[..valid]));
                match err.error_len() {
                    Some(len) => {
                        return Err(self.error_at(consumed + valid, &bytes[valid..valid + len]));
                    }
                    // an incomplete but so far valid sequence at the end
                    None => self.pending.extend_from_slice(&bytes[valid..]),
                }
            }
        }
        Ok(())
    }

    fn decode_utf16(
        &mut self,
        bytes: &[u8],
        out: &mut String,
        unit: fn([u8; 2]) -> u16,
    ) -> Result<(), DecodeError> {
        let mut pos = 0;
        let mut pair = [0u8; 2];
        let mut filled = 0;
        if let Some(&b) = self.pending.first() {
            pair[0] = b;
            filled = 1;
        }
        while pos < bytes.len() {
            pair[filled] = bytes[pos];
            filled += 1;
            pos += 1;
            if filled < 2 {
                continue;
            }
            filled = 0;
            let code = unit(pair);
            match (self.high_surrogate.take(), code) {
                (None, 0xD800..=0xDBFF) => self.high_surrogate = Some(code),
                (None, 0xDC00..=0xDFFF) => return Err(self.error_before(pos, 2, &pair)),
                (None, _) => out.push(char::from_u32(u32::from(code)).unwrap_or_default()),
                (Some(high), 0xDC00..=0xDFFF) => {
                    let c = 0x10000 + ((u32::from(high) - 0xD800) << 10) + (u32::from(code) - 0xDC00);
                    // every paired surrogate combination is a valid scalar value
                    out.push(char::from_u32(c).unwrap_or_default());
                }
                (Some(_), _) => return Err(self.error_before(pos, 4, &pair)),
            }
        }
        self.pending.clear();
        if filled == 1 {
            self.pending.push(pair[0]);
        }
        Ok(())
    }
}

/// Length of the UTF-8 sequence introduced by `lead`. Only called for lead
/// bytes that `str::from_utf8` reported as the start of an incomplete
/// sequence, which are always 2, 3 or 4 byte leads.
fn utf8_width(lead: u8) -> usize {
    match lead {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        _ => 4,
    }
}

// ------------------------------------------------------------------------------------------------
// Encoder
// ------------------------------------------------------------------------------------------------

/// Encodes text into bytes of one charset.
#[derive(Debug, Clone, Copy)]
pub struct CharEncoder {
    charset: Charset,
}

impl CharEncoder {
    #[must_use]
    pub fn new(charset: Charset) -> Self {
        Self { charset }
    }

    /// Appends the encoding of `text` to `out`.
    ///
    /// # Errors
    ///
    /// Fails if `text` contains a character above the charset's range.
    pub fn encode(&self, text: &str, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        match self.charset {
            Charset::Utf8 => out.extend_from_slice(text.as_bytes()),
            Charset::Utf16Le => out.extend(text.encode_utf16().flat_map(u16::to_le_bytes)),
            Charset::Utf16Be => out.extend(text.encode_utf16().flat_map(u16::to_be_bytes)),
            Charset::Latin1 | Charset::Ascii => {
                let max = self.charset.max_code_point();
                out.reserve(text.len());
                for ch in text.chars() {
                    let code = ch as u32;
                    if code > max {
                        return Err(EncodeError {
                            charset: self.charset,
                            ch,
                        });
                    }
                    // code fits in a byte, checked just above
                    out.push(u8::try_from(code).unwrap_or(b'?'));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn decode_in_pieces(charset: Charset, bytes: &[u8], piece: usize) -> Result<String, DecodeError> {
        let mut decoder = CharDecoder::new(charset);
        let mut out = String::new();
        for chunk in bytes.chunks(piece) {
            decoder.decode(chunk, &mut out)?;
        }
        decoder.finish()?;
        Ok(out)
    }

    #[rstest]
    #[case(Charset::Utf8)]
    #[case(Charset::Utf16Le)]
    #[case(Charset::Utf16Be)]
    fn split_sequences_decode_like_whole_input(#[case] charset: Charset) {
        let text = "aé€😀z \"ключ\": [1, 2]";
        let mut bytes = Vec::new();
        CharEncoder::new(charset).encode(text, &mut bytes).unwrap();
        for piece in 1..=bytes.len() {
            assert_eq!(decode_in_pieces(charset, &bytes, piece).unwrap(), text, "piece size {piece}");
        }
    }

    #[test]
    fn malformed_utf8_is_an_error_not_a_replacement() {
        let err = decode_in_pieces(Charset::Utf8, b"[\"a\xFFb\"]", 3).unwrap_err();
        assert_eq!(err.offset, 3);
        assert_eq!(err.bytes, BString::from(&b"\xFF"[..]));
        insta::assert_snapshot!(err.to_string(), @r#"malformed UTF-8 input at byte 3: "\xff""#);
    }

    #[test]
    fn invalid_continuation_across_chunks() {
        // E2 82 starts '€', but the third byte is not a continuation byte
        let mut decoder = CharDecoder::new(Charset::Utf8);
        let mut out = String::new();
        decoder.decode(b"x\xE2\x82", &mut out).unwrap();
        assert_eq!(out, "x");
        let err = decoder.decode(b"A", &mut out).unwrap_err();
        assert_eq!(err.offset, 1);
    }

    #[test]
    fn truncated_body_fails_on_finish() {
        let mut decoder = CharDecoder::new(Charset::Utf8);
        let mut out = String::new();
        decoder.decode(b"ok\xF0\x9F", &mut out).unwrap();
        let err = decoder.finish().unwrap_err();
        assert_eq!(err.offset, 2);
        assert_eq!(out, "ok");
    }

    #[test]
    fn lone_utf16_surrogates_are_rejected() {
        assert!(decode_in_pieces(Charset::Utf16Le, &[0x00, 0xDC], 1).is_err());
        assert!(decode_in_pieces(Charset::Utf16Be, &[0xD8, 0x3D, 0x00, 0x41], 2).is_err());
        assert!(decode_in_pieces(Charset::Utf16Be, &[0xD8, 0x3D], 2).is_err());
    }

    #[test]
    fn latin1_and_ascii() {
        assert_eq!(decode_in_pieces(Charset::Latin1, b"caf\xE9", 2).unwrap(), "café");
        let err = decode_in_pieces(Charset::Ascii, b"caf\xE9", 2).unwrap_err();
        assert_eq!(err.offset, 3);

        let mut out = Vec::new();
        CharEncoder::new(Charset::Latin1).encode("café", &mut out).unwrap();
        assert_eq!(out, b"caf\xE9");
        let err = CharEncoder::new(Charset::Ascii).encode("café", &mut out).unwrap_err();
        assert_eq!(err.ch, 'é');
    }

    #[test]
    fn leading_byte_order_mark_is_skipped() {
        assert_eq!(decode_in_pieces(Charset::Utf8, b"\xEF\xBB\xBF[1]", 1).unwrap(), "[1]");
        assert_eq!(
            decode_in_pieces(Charset::Utf16Le, &[0xFF, 0xFE, b'1', 0], 3).unwrap(),
            "1"
        );
    }

    #[rstest]
    #[case("UTF-8", Charset::Utf8)]
    #[case(" utf8 ", Charset::Utf8)]
    #[case("ISO-8859-1", Charset::Latin1)]
    #[case("utf-16be", Charset::Utf16Be)]
    #[case("US-ASCII", Charset::Ascii)]
    fn labels(#[case] label: &str, #[case] expected: Charset) {
        assert_eq!(label.parse::<Charset>(), Ok(expected));
    }

    #[test]
    fn unknown_label() {
        assert_eq!(
            "ebcdic".parse::<Charset>(),
            Err(UnsupportedCharset("ebcdic".to_string()))
        );
    }
}
