//! JSON text production for the send direction.
//!
//! [`JsonEmitter`] walks a [`Value`] with an explicit stack and appends one
//! token at a time, so a deeply nested value never recurses and a large one
//! can be written out while it is being walked. [`TextWriter`] collects those
//! tokens, encodes them in the target charset and writes them to a
//! [`ByteSink`] whenever a chunk's worth of text is pending.
use core::slice;

use futures::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;

use crate::{
    charset::{CharEncoder, Charset},
    error::ConvertError,
    materialize::MaterializeError,
    options::ConverterOptions,
    transport::ByteSink,
    value::{Number, Value, write_escaped_string},
};

enum Walk<'a> {
    Value(&'a Value),
    Items { iter: slice::Iter<'a, Value>, first: bool },
    Entries { iter: indexmap::map::Iter<'a, String, Value>, first: bool },
}

/// Token-by-token JSON writer over a borrowed [`Value`].
///
/// # Examples
///
/// ```rust
/// use jsonsluice::{Charset, ConverterOptions, JsonEmitter, Value};
///
/// let value = Value::from_iter([("id", Value::from(9_007_199_254_740_993u64)), ("name", "Zoë".into())]);
/// let options = ConverterOptions { big_number_as_string: true, ..Default::default() };
///
/// let mut emitter = JsonEmitter::new(&value, &options, Charset::Ascii);
/// let mut out = String::new();
/// while emitter.emit_next(&mut out) {}
/// assert_eq!(out, r#"{"id":"9007199254740993","name":"Zo\u00EB"}"#);
/// ```
pub struct JsonEmitter<'a> {
    stack: Vec<Walk<'a>>,
    escape_above: u32,
    big_number_as_string: bool,
}

impl<'a> JsonEmitter<'a> {
    /// Characters the target `charset` cannot represent are written as
    /// `\uXXXX` escapes.
    #[must_use]
    pub fn new(value: &'a Value, options: &ConverterOptions, charset: Charset) -> Self {
        Self {
            stack: vec![Walk::Value(value)],
            escape_above: charset.max_code_point(),
            big_number_as_string: options.big_number_as_string,
        }
    }

    /// Appends the next token to `out`. Returns `false` once the value has
    /// been written completely.
    pub fn emit_next(&mut self, out: &mut String) -> bool {
        let Some(top) = self.stack.pop() else {
            return false;
        };
        match top {
            Walk::Value(value) => self.emit_value(value, out),
            Walk::Items { mut iter, first } => match iter.next() {
                Some(item) => {
                    if !first {
                        out.push(',');
                    }
                    self.stack.push(Walk::Items { iter, first: false });
                    self.stack.push(Walk::Value(item));
                }
                None => out.push(']'),
            },
            Walk::Entries { mut iter, first } => match iter.next() {
                Some((key, item)) => {
                    if !first {
                        out.push(',');
                    }
                    self.push_string(key, out);
                    out.push(':');
                    self.stack.push(Walk::Entries { iter, first: false });
                    self.stack.push(Walk::Value(item));
                }
                None => out.push('}'),
            },
        }
        true
    }

    fn emit_value(&mut self, value: &'a Value, out: &mut String) {
        match value {
            Value::Null => out.push_str("null"),
            Value::Boolean(true) => out.push_str("true"),
            Value::Boolean(false) => out.push_str("false"),
            Value::Number(n) => self.push_number(n, out),
            Value::String(s) => self.push_string(s, out),
            Value::Array(items) => {
                out.push('[');
                self.stack.push(Walk::Items {
                    iter: items.iter(),
                    first: true,
                });
            }
            Value::Object(map) => {
                out.push('{');
                self.stack.push(Walk::Entries {
                    iter: map.iter(),
                    first: true,
                });
            }
        }
    }

    fn push_number(&self, n: &Number, out: &mut String) {
        if self.big_number_as_string && n.exceeds_safe_integer() {
            out.push('"');
            out.push_str(n.as_str());
            out.push('"');
        } else {
            out.push_str(n.as_str());
        }
    }

    fn push_string(&self, s: &str, out: &mut String) {
        out.push('"');
        // writing into a String cannot fail
        let _ = write_escaped_string(s, self.escape_above, out);
        out.push('"');
    }
}

/// Writes a whole value into a string.
#[must_use]
pub fn to_json_string(value: &Value, options: &ConverterOptions, charset: Charset) -> String {
    let mut emitter = JsonEmitter::new(value, options, charset);
    let mut out = String::new();
    while emitter.emit_next(&mut out) {}
    out
}

/// Buffers JSON text, encodes it and writes it to a sink in chunks.
#[derive(Debug)]
pub struct TextWriter<'w, W: ?Sized> {
    sink: &'w mut W,
    charset: Charset,
    encoder: CharEncoder,
    text: String,
    bytes: Vec<u8>,
    chunk_size: usize,
    written: u64,
}

impl<'w, W: ByteSink + ?Sized> TextWriter<'w, W> {
    pub fn new(sink: &'w mut W, charset: Charset, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            sink,
            charset,
            encoder: CharEncoder::new(charset),
            text: String::with_capacity(chunk_size),
            bytes: Vec::with_capacity(chunk_size),
            chunk_size,
            written: 0,
        }
    }

    /// Writes `value`, flushing encoded bytes each time a chunk of text is
    /// pending.
    ///
    /// # Errors
    ///
    /// Returns the sink's write error or an encoding error.
    pub async fn write_value(&mut self, value: &Value, options: &ConverterOptions) -> Result<(), ConvertError> {
        let mut emitter = JsonEmitter::new(value, options, self.charset);
        while emitter.emit_next(&mut self.text) {
            if self.text.len() >= self.chunk_size {
                self.flush_text().await?;
            }
        }
        Ok(())
    }

    /// Appends raw JSON punctuation or text.
    pub fn push_raw(&mut self, text: &str) {
        self.text.push_str(text);
    }

    async fn flush_text(&mut self) -> Result<(), ConvertError> {
        if self.text.is_empty() {
            return Ok(());
        }
        self.bytes.clear();
        self.encoder.encode(&self.text, &mut self.bytes)?;
        self.sink.write_all(&self.bytes).await?;
        self.written += self.bytes.len() as u64;
        tracing::trace!(len = self.bytes.len(), "wrote chunk");
        self.text.clear();
        Ok(())
    }

    /// Writes whatever is pending and flushes the sink. Returns the number of
    /// bytes written overall.
    ///
    /// # Errors
    ///
    /// Returns the sink's write error or an encoding error.
    pub async fn finish(mut self) -> Result<u64, ConvertError> {
        self.flush_text().await?;
        self.sink.flush().await?;
        Ok(self.written)
    }
}

/// Writes the items of `elements` as one JSON array, turning each element
/// into a [`Value`] with `to_value` and encoding it as it arrives.
///
/// # Errors
///
/// Fails on the first element that cannot be serialized, or on a write error.
pub async fn write_elements<T, S, W, F>(
    writer: &mut TextWriter<'_, W>,
    elements: S,
    mut to_value: F,
    options: &ConverterOptions,
) -> Result<usize, ConvertError>
where
    S: Stream<Item = T>,
    W: ByteSink + ?Sized,
    F: FnMut(&T) -> Result<Value, MaterializeError>,
{
    let mut elements = core::pin::pin!(elements);
    let mut count = 0;
    writer.push_raw("[");
    while let Some(element) = elements.next().await {
        let value = to_value(&element).map_err(ConvertError::Serialize)?;
        if count > 0 {
            writer.push_raw(",");
        }
        writer.write_value(&value, options).await?;
        count += 1;
    }
    writer.push_raw("]");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_output_matches_display() {
        let value = crate::pipeline::parse(r#" { "a" : [ 1 , { } , [ ] , "x\ty" ] , "b" : null } "#).unwrap();
        let text = to_json_string(&value, &ConverterOptions::default(), Charset::Utf8);
        insta::assert_snapshot!(text, @r#"{"a":[1,{},[],"x\ty"],"b":null}"#);
        assert_eq!(text, value.to_string());
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let mut value = Value::Null;
        for _ in 0..100_000 {
            value = Value::Array(vec![value]);
        }
        let text = to_json_string(&value, &ConverterOptions::default(), Charset::Utf8);
        assert_eq!(text.len(), 100_000 * 2 + 4);
        // dropping the nested value recursively would overflow the stack
        core::mem::forget(value);
    }

    #[test]
    fn big_numbers_are_quoted_only_when_asked() {
        let value = Value::from(vec![
            Value::from(9_007_199_254_740_991u64),
            Value::from(-9_007_199_254_740_992i64),
            "1.5e300".parse::<Number>().unwrap().into(),
        ]);
        let plain = to_json_string(&value, &ConverterOptions::default(), Charset::Utf8);
        assert_eq!(plain, "[9007199254740991,-9007199254740992,1.5e300]");

        let options = ConverterOptions {
            big_number_as_string: true,
            ..Default::default()
        };
        let quoted = to_json_string(&value, &options, Charset::Utf8);
        assert_eq!(quoted, "[9007199254740991,\"-9007199254740992\",1.5e300]");
    }

    #[test]
    fn unmappable_characters_are_escaped() {
        let value = Value::from("€ and é");
        assert_eq!(
            to_json_string(&value, &ConverterOptions::default(), Charset::Latin1),
            "\"\\u20AC and é\""
        );
        assert_eq!(
            to_json_string(&value, &ConverterOptions::default(), Charset::Ascii),
            "\"\\u20AC and \\u00E9\""
        );
    }

    #[tokio::test]
    async fn writer_flushes_in_chunks() {
        let value = Value::from_iter((0..50).map(|i| (format!("key{i}"), i)));
        let mut sink = Vec::new();
        let mut writer = TextWriter::new(&mut sink, Charset::Utf16Be, 16);
        writer.write_value(&value, &ConverterOptions::default()).await.unwrap();
        let written = writer.finish().await.unwrap();

        assert_eq!(written, sink.len() as u64);
        let units: Vec<u16> = sink.chunks(2).map(|b| u16::from_be_bytes([b[0], b[1]])).collect();
        assert_eq!(String::from_utf16(&units).unwrap(), value.to_string());
    }

    #[tokio::test]
    async fn elements_are_written_as_an_array() {
        let mut sink = Vec::new();
        let mut writer = TextWriter::new(&mut sink, Charset::Utf8, 4);
        let options = ConverterOptions::default();
        let count = write_elements(
            &mut writer,
            futures::stream::iter(vec![(1, "one"), (2, "two")]),
            |element| crate::materialize::Materializer::default().serialize(element, &options),
            &options,
        )
        .await
        .unwrap();
        writer.finish().await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(sink, br#"[[1,"one"],[2,"two"]]"#);
    }
}
