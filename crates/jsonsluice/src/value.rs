//! JSON value types.
//!
//! [`Value`] is the structural model every conversion passes through: the
//! pipeline builds it from text, the [`Materializer`] turns it into typed
//! values and back, and the encoder walks it to produce text again.
//!
//! Numbers keep the exact text they were read from, so a value that was
//! decoded and then encoded again reproduces its numbers digit for digit.
//!
//! [`Materializer`]: crate::Materializer
use core::{fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Object storage. Keeps insertion order; inserting an existing key replaces
/// the value and keeps the key at its first position.
pub type Map = IndexMap<String, Value>;
pub type Array = Vec<Value>;

/// A JSON value as defined by [RFC 8259].
///
/// # Examples
///
/// ```
/// use jsonsluice::{Map, Value};
///
/// let mut map = Map::new();
/// map.insert("key".to_string(), Value::from("value"));
/// map.insert("n".to_string(), Value::from(7));
/// let v = Value::Object(map);
/// assert_eq!(v.to_string(), r#"{"key":"value","n":7}"#);
/// ```
///
/// [RFC 8259]: https://datatracker.ietf.org/doc/html/rfc8259
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Number(Number),
    String(String),
    Array(Array),
    Object(Map),
}

/// A JSON number in its exact textual form.
///
/// The text is validated against the JSON number grammar on construction, so
/// every `Number` can be written out unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Number(String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("'{0}' is not a valid JSON number")]
pub struct InvalidNumberText(pub String);

/// Largest integer a double can hold exactly (2^53 - 1).
const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

impl Number {
    /// Wraps text that the pipeline already checked digit by digit.
    pub(crate) fn from_validated(text: String) -> Self {
        Self(text)
    }

    /// Builds a number from a finite float. Returns `None` for NaN and
    /// infinities, which JSON cannot represent.
    #[must_use]
    pub fn from_f64(value: f64) -> Option<Self> {
        value.is_finite().then(|| Self(value.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when the text has no fraction or exponent part.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        !self.0.contains(['.', 'e', 'E'])
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }

    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.0.parse().ok()
    }

    /// `true` for integers a JavaScript client could not hold without losing
    /// precision.
    #[must_use]
    pub fn exceeds_safe_integer(&self) -> bool {
        if !self.is_integer() {
            return false;
        }
        let digits = self.0.trim_start_matches('-');
        // anything that overflows u64 is certainly too large
        digits.parse::<u64>().map_or(true, |n| n > MAX_SAFE_INTEGER)
    }
}

impl FromStr for Number {
    type Err = InvalidNumberText;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut state = Some(crate::pipeline::NumberState::Start);
        for c in s.chars() {
            state = state.and_then(|st| st.advance(c));
        }
        match state {
            Some(st) if st.is_complete() => Ok(Self(s.to_string())),
            _ => Err(InvalidNumberText(s.to_string())),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! number_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Number {
                fn from(n: $t) -> Self {
                    Self(n.to_string())
                }
            }

            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Self::Number(Number::from(n))
                }
            }
        )*
    };
}

number_from_integer!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<Number> for Value {
    fn from(v: Number) -> Self {
        Self::Number(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Array(v)
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Self {
        Self::Object(v)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Object(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl Value {
    /// Returns `true` if the value is [`Null`].
    ///
    /// [`Null`]: Value::Null
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Self::Number(n) => Some(n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_number().and_then(Number::as_i64)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Self::Object(m) => Some(m),
            _ => None,
        }
    }

    /// Looks up `key` when the value is an object.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|m| m.get(key))
    }
}

/// Writes `src` as the body of a JSON string literal (without the quotes).
///
/// Quotes, backslashes and control characters are always escaped, as are the
/// line separators U+2028 and U+2029 that older JavaScript parsers reject.
/// Characters above `escape_above` are written as `\uXXXX` escapes, using a
/// surrogate pair outside the basic multilingual plane; this lets callers
/// target charsets that cannot represent every code point.
pub(crate) fn write_escaped_string<W: fmt::Write>(
    src: &str,
    escape_above: u32,
    f: &mut W,
) -> fmt::Result {
    for c in src.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\u{08}' => f.write_str("\\b")?,
            '\u{0C}' => f.write_str("\\f")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            '\u{2028}' | '\u{2029}' => write!(f, "\\u{:04X}", c as u32)?,
            c if c.is_ascii_control() => write!(f, "\\u{:04X}", c as u32)?,
            c if c as u32 > escape_above => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    write!(f, "\\u{:04X}", *unit)?;
                }
            }
            _ => f.write_char(c)?,
        }
    }
    Ok(())
}

/// Compact JSON text. Large documents should go through [`JsonEmitter`]
/// instead, which never holds more than one token at a time.
///
/// [`JsonEmitter`]: crate::JsonEmitter
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => f.write_str(if *b { "true" } else { "false" }),
            Value::Number(n) => f.write_str(n.as_str()),
            Value::String(s) => {
                f.write_str("\"")?;
                write_escaped_string(s, u32::MAX, f)?;
                f.write_str("\"")
            }
            Value::Array(arr) => {
                f.write_str("[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Value::Object(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    f.write_str("\"")?;
                    write_escaped_string(k, u32::MAX, f)?;
                    write!(f, "\":{v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// serde bridge
// ------------------------------------------------------------------------------------------------

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Boolean(b) => Self::Bool(b),
            // Number text is grammar-checked on construction, and serde_json
            // keeps arbitrary precision, so the parse cannot fail.
            Value::Number(n) => serde_json::Number::from_str(n.as_str()).map_or(Self::Null, Self::Number),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Boolean(b),
            serde_json::Value::Number(n) => Self::Number(Number(n.to_string())),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_json::Value::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}
