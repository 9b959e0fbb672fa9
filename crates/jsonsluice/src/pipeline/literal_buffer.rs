use crate::value::Value;

/// What happened after feeding one more character into the literal matcher?
#[derive(Debug, PartialEq)]
pub(crate) enum Step {
    /// Character matched, but the literal is not finished yet.
    NeedMore,
    /// Character matched and completed the literal.
    Done(Value),
    /// Character did not match the expected byte.
    Reject,
}

/// Remaining bytes of `null`, `true` or `false` after the first character,
/// and the value they spell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExpectedLiteralBuffer {
    rest: &'static [u8],
    value: Option<bool>,
}

impl ExpectedLiteralBuffer {
    /// Starts matching after the first character (`n`, `t` or `f`).
    pub fn new(first: char) -> Option<Self> {
        let (rest, value): (&'static [u8], _) = match first {
            'n' => (b"ull", None),
            't' => (b"rue", Some(true)),
            'f' => (b"alse", Some(false)),
            _ => return None,
        };
        Some(Self { rest, value })
    }

    pub fn step(&mut self, c: char) -> Step {
        match self.rest.split_first() {
            Some((&b, rest)) if char::from(b) == c => {
                self.rest = rest;
                if rest.is_empty() {
                    Step::Done(self.value.map_or(Value::Null, Value::Boolean))
                } else {
                    Step::NeedMore
                }
            }
            _ => Step::Reject,
        }
    }
}
