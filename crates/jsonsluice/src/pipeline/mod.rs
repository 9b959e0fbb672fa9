//! The incremental JSON pipeline.
//!
//! [`JsonPipeline`] consumes text one character at a time and hands every
//! value to a callback as soon as it is structurally closed. Only the open
//! nesting path and the current scalar token are buffered.
//!
//! In [`PipelineMode::Elements`] the outermost array is never built: each of
//! its elements is emitted on its own, so an array of any length is processed
//! with memory proportional to its largest element. In
//! [`PipelineMode::Scalar`] the single top-level value is emitted once it
//! closes.
//!
//! # Examples
//!
//! ```rust
//! use jsonsluice::{JsonPipeline, PipelineMode, Value};
//!
//! let mut pipeline = JsonPipeline::new(PipelineMode::Elements, 64);
//! let mut elements = Vec::new();
//! let mut push = |value: Value| elements.push(value);
//! pipeline.feed_str(r#"[1, {"a": "#, &mut push).unwrap();
//! pipeline.feed_str(r#"true}, "x"]"#, &mut push).unwrap();
//! pipeline.finish(&mut push).unwrap();
//! assert_eq!(elements.len(), 3);
//! assert_eq!(elements[1].get("a"), Some(&Value::Boolean(true)));
//! ```
#![allow(clippy::enum_glob_use)]

mod escape_buffer;
mod literal_buffer;
mod number;


pub(crate) use number::NumberState;

use self::{
    escape_buffer::UnicodeEscapeBuffer,
    literal_buffer::{ExpectedLiteralBuffer, Step as LiteralStep},
};
use crate::{
    error::{ParserError, SyntaxError},
    value::{Array, Map, Number, Value},
};

/// Whether the outermost value is built whole or streamed element by element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineMode {
    /// Emit the single top-level value once it closes.
    #[default]
    Scalar,
    /// The top-level value must be an array; emit each element as it closes.
    Elements,
}

// ------------------------------------------------------------------------------------------------
// State machines
// ------------------------------------------------------------------------------------------------

/// Structural position between tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Start,
    /// Right after `[`; `]` is allowed.
    ArrayStart,
    /// After `,` in an array; a value is required.
    BeforeArrayValue,
    AfterArrayValue,
    /// Right after `{`; `}` is allowed.
    ObjectStart,
    /// After `,` in an object; a key is required.
    BeforePropertyName,
    /// Reading a key string.
    PropertyName,
    AfterPropertyName,
    BeforePropertyValue,
    AfterPropertyValue,
    End,
    Error,
}

/// The scalar token being lexed, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenState {
    None,
    String,
    StringEscape,
    StringUnicode,
    Literal,
    Number(NumberState),
}

/// An open container on the nesting path.
#[derive(Debug)]
enum Frame {
    /// The outermost array in [`PipelineMode::Elements`]. Elements are emitted,
    /// not stored.
    Stream,
    Array(Array),
    Object { map: Map, key: Option<String> },
}

/// Incremental, single-pass JSON tokenizer and value builder.
#[derive(Debug)]
pub struct JsonPipeline {
    mode: PipelineMode,
    max_depth: usize,

    parse_state: ParseState,
    token: TokenState,
    /// Text of the current string or number token.
    buffer: String,
    literal: Option<ExpectedLiteralBuffer>,
    escape: UnicodeEscapeBuffer,
    stack: Vec<Frame>,

    /// Position of the next character, 1-based.
    line: usize,
    column: usize,

    emitted: usize,
    error: Option<ParserError>,
}

impl JsonPipeline {
    /// Creates a pipeline. Opening a container beyond `max_depth` levels is a
    /// [`SyntaxError::NestingTooDeep`] error.
    #[must_use]
    pub fn new(mode: PipelineMode, max_depth: usize) -> Self {
        Self {
            mode,
            max_depth,
            parse_state: ParseState::Start,
            token: TokenState::None,
            buffer: String::new(),
            literal: None,
            escape: UnicodeEscapeBuffer::new(),
            stack: Vec::new(),
            line: 1,
            column: 1,
            emitted: 0,
            error: None,
        }
    }

    #[must_use]
    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    /// `true` once the top-level value has closed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.parse_state == ParseState::End
    }

    /// Number of values handed to the callback so far.
    #[must_use]
    pub fn elements_emitted(&self) -> usize {
        self.emitted
    }

    /// Current nesting depth, counting the streamed outer array.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Feeds every character of `text`.
    ///
    /// # Errors
    ///
    /// Stops at the first malformed character. Values completed before it
    /// have already been passed to `emit`.
    pub fn feed_str<F: FnMut(Value)>(&mut self, text: &str, emit: &mut F) -> Result<(), ParserError> {
        for c in text.chars() {
            self.accept(c, emit)?;
        }
        Ok(())
    }

    /// Feeds one character.
    ///
    /// A character that ends a number is first used to close the number and
    /// then processed again in the enclosing state.
    ///
    /// # Errors
    ///
    /// Returns the error for a malformed character. The pipeline is then
    /// poisoned: every later call returns the same error.
    pub fn accept<F: FnMut(Value)>(&mut self, c: char, emit: &mut F) -> Result<(), ParserError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let mut pending = Some(c);
        while let Some(c) = pending {
            pending = match self.step(c, emit) {
                Ok(pushback) => pushback,
                Err(kind) => return Err(self.fail(kind)),
            };
        }
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Ok(())
    }

    /// Signals the end of input. A top-level number has no closing character,
    /// so it is completed here.
    ///
    /// # Errors
    ///
    /// Fails if the input ended before the top-level value closed.
    pub fn finish<F: FnMut(Value)>(&mut self, emit: &mut F) -> Result<(), ParserError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if let TokenState::Number(state) = self.token {
            if state.is_complete() && self.stack.is_empty() {
                self.complete_number(emit);
            }
        }
        match (self.token, self.parse_state) {
            (TokenState::None, ParseState::End) => Ok(()),
            (TokenState::String | TokenState::StringEscape | TokenState::StringUnicode, _) => {
                Err(self.fail(SyntaxError::UnterminatedString))
            }
            _ => Err(self.fail(SyntaxError::UnexpectedEndOfInput)),
        }
    }

    fn fail(&mut self, kind: SyntaxError) -> ParserError {
        let err = ParserError {
            kind,
            line: self.line,
            column: self.column,
        };
        self.parse_state = ParseState::Error;
        self.stack.clear();
        self.buffer.clear();
        self.error = Some(err.clone());
        err
    }

    /// Processes `c`; returns it back if it must be processed again.
    fn step<F: FnMut(Value)>(&mut self, c: char, emit: &mut F) -> Result<Option<char>, SyntaxError> {
        match self.token {
            TokenState::None => self.step_structure(c, emit).map(|()| None),

            TokenState::String => {
                if self.escape.awaiting_low_surrogate() && c != '\\' {
                    return Err(self.lone_high_surrogate());
                }
                match c {
                    '"' => self.complete_string(emit),
                    '\\' => self.token = TokenState::StringEscape,
                    c if u32::from(c) < 0x20 => return Err(SyntaxError::UnexpectedCharacter(c)),
                    c => self.buffer.push(c),
                }
                Ok(None)
            }

            TokenState::StringEscape => {
                if self.escape.awaiting_low_surrogate() && c != 'u' {
                    return Err(self.lone_high_surrogate());
                }
                let unescaped = match c {
                    '"' | '\\' | '/' => c,
                    'b' => '\u{08}',
                    'f' => '\u{0C}',
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    'u' => {
                        self.token = TokenState::StringUnicode;
                        return Ok(None);
                    }
                    c => return Err(SyntaxError::InvalidEscape(c)),
                };
                self.buffer.push(unescaped);
                self.token = TokenState::String;
                Ok(None)
            }

            TokenState::StringUnicode => {
                match self.escape.feed(c)? {
                    escape_buffer::Step::NeedMore => {}
                    escape_buffer::Step::Char(ch) => {
                        self.buffer.push(ch);
                        self.token = TokenState::String;
                    }
                    escape_buffer::Step::NeedLowSurrogate => self.token = TokenState::String,
                }
                Ok(None)
            }

            TokenState::Literal => {
                let step = match &mut self.literal {
                    Some(literal) => literal.step(c),
                    None => LiteralStep::Reject,
                };
                match step {
                    LiteralStep::NeedMore => Ok(None),
                    LiteralStep::Done(value) => {
                        self.literal = None;
                        self.token = TokenState::None;
                        self.complete_value(value, emit);
                        Ok(None)
                    }
                    LiteralStep::Reject => Err(SyntaxError::UnexpectedCharacter(c)),
                }
            }

            TokenState::Number(state) => match state.advance(c) {
                Some(next) => {
                    self.buffer.push(c);
                    self.token = TokenState::Number(next);
                    Ok(None)
                }
                None if state.is_complete() && !c.is_ascii_digit() => {
                    self.complete_number(emit);
                    Ok(Some(c))
                }
                None => {
                    self.buffer.push(c);
                    Err(SyntaxError::InvalidNumber(core::mem::take(&mut self.buffer)))
                }
            },
        }
    }

    fn step_structure<F: FnMut(Value)>(&mut self, c: char, emit: &mut F) -> Result<(), SyntaxError> {
        use ParseState::*;

        if matches!(c, ' ' | '\t' | '\n' | '\r') {
            return Ok(());
        }
        match self.parse_state {
            Start => match self.mode {
                PipelineMode::Elements if c == '[' => {
                    self.open(Frame::Stream)?;
                    self.parse_state = ArrayStart;
                    Ok(())
                }
                PipelineMode::Elements => Err(SyntaxError::ExpectedArray(c)),
                PipelineMode::Scalar => self.begin_value(c),
            },

            ArrayStart if c == ']' => {
                self.close(emit);
                Ok(())
            }
            ArrayStart | BeforeArrayValue | BeforePropertyValue => self.begin_value(c),
            AfterArrayValue => match c {
                ',' => {
                    self.parse_state = BeforeArrayValue;
                    Ok(())
                }
                ']' => {
                    self.close(emit);
                    Ok(())
                }
                c => Err(SyntaxError::UnexpectedCharacter(c)),
            },

            ObjectStart if c == '}' => {
                self.close(emit);
                Ok(())
            }
            ObjectStart | BeforePropertyName => match c {
                '"' => {
                    self.buffer.clear();
                    self.token = TokenState::String;
                    self.parse_state = PropertyName;
                    Ok(())
                }
                c => Err(SyntaxError::UnexpectedCharacter(c)),
            },
            AfterPropertyName => match c {
                ':' => {
                    self.parse_state = BeforePropertyValue;
                    Ok(())
                }
                c => Err(SyntaxError::UnexpectedCharacter(c)),
            },
            AfterPropertyValue => match c {
                ',' => {
                    self.parse_state = BeforePropertyName;
                    Ok(())
                }
                '}' => {
                    self.close(emit);
                    Ok(())
                }
                c => Err(SyntaxError::UnexpectedCharacter(c)),
            },

            End => Err(SyntaxError::TrailingData(c)),
            // keys are lexed as string tokens; errors poison the pipeline
            PropertyName | Error => Err(SyntaxError::UnexpectedCharacter(c)),
        }
    }

    fn begin_value(&mut self, c: char) -> Result<(), SyntaxError> {
        match c {
            '{' => {
                self.open(Frame::Object {
                    map: Map::new(),
                    key: None,
                })?;
                self.parse_state = ParseState::ObjectStart;
            }
            '[' => {
                self.open(Frame::Array(Array::new()))?;
                self.parse_state = ParseState::ArrayStart;
            }
            '"' => {
                self.buffer.clear();
                self.token = TokenState::String;
            }
            'n' | 't' | 'f' => {
                self.literal = ExpectedLiteralBuffer::new(c);
                self.token = TokenState::Literal;
            }
            '-' | '0'..='9' => {
                self.buffer.clear();
                self.buffer.push(c);
                // '-' and every digit are valid first characters
                let state = NumberState::Start.advance(c).unwrap_or(NumberState::Sign);
                self.token = TokenState::Number(state);
            }
            c => return Err(SyntaxError::UnexpectedCharacter(c)),
        }
        Ok(())
    }

    fn open(&mut self, frame: Frame) -> Result<(), SyntaxError> {
        if self.stack.len() >= self.max_depth {
            return Err(SyntaxError::NestingTooDeep(self.max_depth));
        }
        self.stack.push(frame);
        Ok(())
    }

    /// Pops the innermost container and completes it as a value.
    fn close<F: FnMut(Value)>(&mut self, emit: &mut F) {
        match self.stack.pop() {
            Some(Frame::Array(items)) => self.complete_value(Value::Array(items), emit),
            Some(Frame::Object { map, .. }) => self.complete_value(Value::Object(map), emit),
            Some(Frame::Stream) | None => self.parse_state = ParseState::End,
        }
    }

    fn complete_string<F: FnMut(Value)>(&mut self, emit: &mut F) {
        let text = core::mem::take(&mut self.buffer);
        self.token = TokenState::None;
        if self.parse_state == ParseState::PropertyName {
            if let Some(Frame::Object { key, .. }) = self.stack.last_mut() {
                *key = Some(text);
            }
            self.parse_state = ParseState::AfterPropertyName;
        } else {
            self.complete_value(Value::String(text), emit);
        }
    }

    fn complete_number<F: FnMut(Value)>(&mut self, emit: &mut F) {
        let text = core::mem::take(&mut self.buffer);
        self.token = TokenState::None;
        self.complete_value(Value::Number(Number::from_validated(text)), emit);
    }

    /// Places a finished value into its parent, or emits it.
    fn complete_value<F: FnMut(Value)>(&mut self, value: Value, emit: &mut F) {
        match self.stack.last_mut() {
            None => {
                self.emitted += 1;
                emit(value);
                self.parse_state = ParseState::End;
            }
            Some(Frame::Stream) => {
                self.emitted += 1;
                emit(value);
                self.parse_state = ParseState::AfterArrayValue;
            }
            Some(Frame::Array(items)) => {
                items.push(value);
                self.parse_state = ParseState::AfterArrayValue;
            }
            Some(Frame::Object { map, key }) => {
                if let Some(key) = key.take() {
                    // last write wins, the first occurrence keeps its position
                    map.insert(key, value);
                }
                self.parse_state = ParseState::AfterPropertyValue;
            }
        }
    }

    fn lone_high_surrogate(&mut self) -> SyntaxError {
        SyntaxError::InvalidUnicodeEscape(self.escape.take_high().unwrap_or_default())
    }
}

/// Parses one complete JSON document.
///
/// # Errors
///
/// Returns the first syntax error, or [`SyntaxError::UnexpectedEndOfInput`]
/// if `text` ends before the value closes.
pub fn parse(text: &str) -> Result<Value, ParserError> {
    let mut pipeline = JsonPipeline::new(PipelineMode::Scalar, crate::options::DEFAULT_MAX_DEPTH);
    let mut result = None;
    let mut store = |value| result = Some(value);
    pipeline.feed_str(text, &mut store)?;
    pipeline.finish(&mut store)?;
    Ok(result.unwrap_or_default())
}
