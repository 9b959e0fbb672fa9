//! Decoding of `\uXXXX` escapes, including UTF-16 surrogate pairs.
//!
//! The [`UnicodeEscapeBuffer`] accumulates exactly four hexadecimal digits as
//! they arrive. A high surrogate is held until the following escape supplies
//! the low half; the pair is then combined into one `char`. A surrogate that
//! is not part of a pair is an error.

use crate::error::SyntaxError;

/// Outcome of feeding one hex digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Fewer than four digits so far.
    NeedMore,
    /// Four digits completed a character.
    Char(char),
    /// Four digits formed a high surrogate. The string must continue with
    /// `\u` and a low surrogate.
    NeedLowSurrogate,
}

#[derive(Debug, Default)]
pub(crate) struct UnicodeEscapeBuffer {
    acc: u32,
    len: u8,
    high: Option<u32>,
}

impl UnicodeEscapeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all state, including a pending high surrogate.
    #[cfg(test)]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether a high surrogate is waiting for its low half.
    pub fn awaiting_low_surrogate(&self) -> bool {
        self.high.is_some()
    }

    /// The pending high surrogate, consumed. Used to report a pair that was
    /// cut short by something other than `\u`.
    pub fn take_high(&mut self) -> Option<u32> {
        self.high.take()
    }

    #[inline]
    fn hex_val(c: char) -> Option<u32> {
        c.to_digit(16)
    }

    /// Feeds one hexadecimal digit.
    pub fn feed(&mut self, c: char) -> Result<Step, SyntaxError> {
        let d = Self::hex_val(c).ok_or(SyntaxError::InvalidEscape(c))?;
        self.acc = (self.acc << 4) | d;
        self.len += 1;
        if self.len < 4 {
            return Ok(Step::NeedMore);
        }

        let code = self.acc;
        self.acc = 0;
        self.len = 0;

        match (self.high.take(), code) {
            (None, 0xD800..=0xDBFF) => {
                self.high = Some(code);
                Ok(Step::NeedLowSurrogate)
            }
            (None, 0xDC00..=0xDFFF) => Err(SyntaxError::InvalidUnicodeEscape(code)),
            (None, _) => char::from_u32(code)
                .map(Step::Char)
                .ok_or(SyntaxError::InvalidUnicodeEscape(code)),
            (Some(high), 0xDC00..=0xDFFF) => {
                let combined = 0x10000 + ((high - 0xD800) << 10) + (code - 0xDC00);
                char::from_u32(combined)
                    .map(Step::Char)
                    .ok_or(SyntaxError::InvalidUnicodeEscape(combined))
            }
            (Some(high), _) => Err(SyntaxError::InvalidUnicodeEscape(high)),
        }
    }
}
