//! Per-body decoding state shared by every receive mode.
//!
//! An [`ElementSession`] owns the charset decoder, the pipeline, and a queue of
//! values the pipeline has completed but nobody has taken yet. Raw chunks go
//! in, and complete [`Value`]s or a single terminal error come out.
use std::collections::VecDeque;

use crate::{
    charset::{CharDecoder, Charset},
    error::ConvertError,
    options::ConverterOptions,
    pipeline::{JsonPipeline, PipelineMode},
    value::Value,
};

#[derive(Debug)]
pub struct ElementSession {
    decoder: CharDecoder,
    pipeline: JsonPipeline,
    /// Reused decode buffer.
    text: String,
    ready: VecDeque<Value>,
    error: Option<ConvertError>,
    terminated: bool,
}

impl ElementSession {
    #[must_use]
    pub fn new(mode: PipelineMode, charset: Charset, options: &ConverterOptions) -> Self {
        Self {
            decoder: CharDecoder::new(charset),
            pipeline: JsonPipeline::new(mode, options.max_depth),
            text: String::new(),
            ready: VecDeque::new(),
            error: None,
            terminated: false,
        }
    }

    /// Decodes and parses one chunk of the body.
    ///
    /// A failure is stored and reported by [`ElementSession::next_item`] after
    /// every value completed before it.
    pub fn feed(&mut self, bytes: &[u8]) {
        if self.terminated {
            return;
        }
        self.text.clear();
        // the decoder leaves the text before a malformed sequence in `text`
        let decoded = self.decoder.decode(bytes, &mut self.text);
        let ready = &mut self.ready;
        let parsed = self.pipeline.feed_str(&self.text, &mut |value| ready.push_back(value));
        if let Err(err) = parsed {
            self.fail(err.into());
        } else if let Err(err) = decoded {
            self.fail(err.into());
        }
    }

    /// Marks the end of the body.
    pub fn finish(&mut self) {
        if self.terminated {
            return;
        }
        if let Err(err) = self.decoder.finish() {
            self.fail(err.into());
            return;
        }
        let ready = &mut self.ready;
        let finished = self.pipeline.finish(&mut |value| ready.push_back(value));
        match finished {
            Ok(()) => self.terminated = true,
            Err(err) => self.fail(err.into()),
        }
    }

    /// Ends the session with `err`, for failures outside the pipeline such as
    /// transport errors.
    pub fn fail(&mut self, err: ConvertError) {
        if !self.terminated {
            self.error = Some(err);
            self.terminated = true;
        }
    }

    /// Drops everything queued and ends the session.
    pub fn abort(&mut self) {
        self.ready.clear();
        self.error = None;
        self.terminated = true;
    }

    /// The next queued value, then the terminal error if there is one.
    pub fn next_item(&mut self) -> Option<Result<Value, ConvertError>> {
        if let Some(value) = self.ready.pop_front() {
            return Some(Ok(value));
        }
        self.error.take().map(Err)
    }

    /// `true` once the body has been fully read or has failed. Queued values
    /// may still be waiting.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    #[must_use]
    pub fn elements_parsed(&self) -> usize {
        self.pipeline.elements_emitted()
    }
}

/// Decodes and parses a complete body held in memory.
///
/// # Errors
///
/// Returns the first decode or syntax error, including content after the
/// value.
pub fn decode_value(bytes: &[u8], charset: Charset, options: &ConverterOptions) -> Result<Value, ConvertError> {
    let mut session = ElementSession::new(PipelineMode::Scalar, charset, options);
    session.feed(bytes);
    session.finish();
    let value = session.next_item().unwrap_or(Ok(Value::Null))?;
    // anything queued behind the value is the terminal error
    match session.next_item() {
        Some(Err(err)) => Err(err),
        _ => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyntaxError;

    fn drain(session: &mut ElementSession) -> Vec<Result<Value, ConvertError>> {
        core::iter::from_fn(|| session.next_item()).collect()
    }

    #[test]
    fn values_queue_before_the_error() {
        let mut session = ElementSession::new(PipelineMode::Elements, Charset::Utf8, &ConverterOptions::default());
        session.feed(b"[1, 2, ");
        session.feed(b"oops]");
        assert!(session.is_terminated());
        let items = drain(&mut session);
        assert_eq!(items.len(), 3);
        assert!(matches!(items[0], Ok(ref v) if *v == Value::from(1)));
        assert!(matches!(items[1], Ok(ref v) if *v == Value::from(2)));
        assert!(matches!(
            items[2],
            Err(ConvertError::Syntax(ref e)) if e.kind == SyntaxError::UnexpectedCharacter('o')
        ));
        // the error is reported once
        assert!(session.next_item().is_none());
    }

    #[test]
    fn feeding_after_termination_is_ignored() {
        let mut session = ElementSession::new(PipelineMode::Elements, Charset::Utf8, &ConverterOptions::default());
        session.feed(b"[]");
        session.finish();
        session.feed(b"[1]");
        assert!(session.next_item().is_none());
    }

    #[test]
    fn decode_error_terminates_the_session() {
        let mut session = ElementSession::new(PipelineMode::Elements, Charset::Utf8, &ConverterOptions::default());
        session.feed(b"[\"\xC3");
        session.feed(b"(\"]");
        assert!(matches!(session.next_item(), Some(Err(ConvertError::Decode(_)))));
    }

    #[test]
    fn values_before_a_malformed_byte_are_kept() {
        let mut session = ElementSession::new(PipelineMode::Elements, Charset::Utf8, &ConverterOptions::default());
        session.feed(b"[1,2,\"\xFF\"]");
        let items = drain(&mut session);
        assert_eq!(items.len(), 3);
        assert!(matches!(items[0], Ok(ref v) if *v == Value::from(1)));
        assert!(matches!(items[1], Ok(ref v) if *v == Value::from(2)));
        assert!(matches!(items[2], Err(ConvertError::Decode(ref e)) if e.offset == 6));
    }

    #[test]
    fn abort_discards_queued_values() {
        let mut session = ElementSession::new(PipelineMode::Elements, Charset::Utf8, &ConverterOptions::default());
        session.feed(b"[1,2,3,");
        session.abort();
        assert!(session.next_item().is_none());
        assert_eq!(session.elements_parsed(), 3);
    }

    #[test]
    fn decode_whole_body() {
        let options = ConverterOptions::default();
        let value = decode_value("{\"k\": \"v\u{e9}\"}".as_bytes(), Charset::Utf8, &options).unwrap();
        assert_eq!(value.get("k"), Some(&Value::from("vé")));
        let err = decode_value(b"[1] 2", Charset::Utf8, &options).unwrap_err();
        assert!(matches!(err, ConvertError::TrailingData(_)));
    }

    #[rstest::rstest]
    #[case::scalar_after_scalar("true false")]
    #[case::object_then_word("{\"a\":1} x")]
    #[case::split_across_lines("1\n2")]
    fn trailing_values_fail_the_whole_body(#[case] body: &str) {
        let result = decode_value(body.as_bytes(), Charset::Utf8, &ConverterOptions::default());
        assert!(matches!(result, Err(ConvertError::TrailingData(_))), "{result:?}");
    }
}
