//! The states a JSON number token passes through.
//!
//! Numbers are kept as text, so the lexer only has to decide whether the
//! next character can continue the token and whether the token may stop
//! where it is.

/// Position within a number token, named after the last character read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NumberState {
    /// Nothing read yet.
    Start,
    /// `-`
    Sign,
    /// A leading `0`, which may only be followed by `.`, `e` or the end.
    Zero,
    Integer,
    /// `.` with no fraction digit yet.
    Point,
    Fraction,
    /// `e` or `E`.
    Exponent,
    ExponentSign,
    ExponentInteger,
}

impl NumberState {
    /// The state after `c`, or `None` if `c` cannot continue the number.
    pub(crate) fn advance(self, c: char) -> Option<Self> {
        use NumberState::*;
        match (self, c) {
            (Start, '-') => Some(Sign),
            (Start | Sign, '0') => Some(Zero),
            (Start | Sign, '1'..='9') => Some(Integer),
            (Integer, '0'..='9') => Some(Integer),
            (Zero | Integer, '.') => Some(Point),
            (Point | Fraction, '0'..='9') => Some(Fraction),
            (Zero | Integer | Fraction, 'e' | 'E') => Some(Exponent),
            (Exponent, '+' | '-') => Some(ExponentSign),
            (Exponent | ExponentSign | ExponentInteger, '0'..='9') => Some(ExponentInteger),
            _ => None,
        }
    }

    /// Whether the text read so far is a complete number.
    pub(crate) fn is_complete(self) -> bool {
        matches!(self, Self::Zero | Self::Integer | Self::Fraction | Self::ExponentInteger)
    }
}
