//! Streaming conversion between JSON bodies and typed values.
//!
//! A [`JsonConverter`] reads JSON from any asynchronous byte source and
//! writes it to any asynchronous byte sink. A body can be received in one of
//! three ways:
//!
//! - whole, as a single value ([`JsonConverter::receive`]);
//! - as a lazy sequence of the elements of a top-level array, read only as
//!   fast as the consumer pulls ([`JsonConverter::receive_elements`]);
//! - as a bounded channel fed by a background task
//!   ([`JsonConverter::receive_channel`]).
//!
//! The streaming modes never hold the whole array: each element is decoded,
//! materialized and handed over as soon as its closing character arrives.
//!
//! Values are sent either in one piece or streamed token by token
//! ([`JsonConverter::send`], [`JsonConverter::send_elements`]).

#![allow(missing_docs)]

mod aggregate;
mod charset;
mod converter;
mod encode;
mod error;
mod materialize;
mod options;
mod pipeline;
mod pull;
mod push;
mod session;
mod transport;
mod value;


pub use aggregate::{BlockingChunkReader, Chunk, ChunkReader, read_all};
pub use charset::{CharDecoder, CharEncoder, Charset, DecodeError, EncodeError, UnsupportedCharset};
pub use converter::JsonConverter;
pub use encode::{JsonEmitter, TextWriter, to_json_string, write_elements};
pub use error::{ConvertError, ParserError, SyntaxError};
pub use materialize::{MaterializeError, Materializer};
pub use options::{
    ConverterConfig, ConverterOptions, DEFAULT_CHANNEL_CAPACITY, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_DEPTH,
};
pub use pipeline::{JsonPipeline, PipelineMode, parse};
pub use pull::{BlockingElements, Elements};
pub use push::{ElementReceiver, SessionOutcome};
pub use session::{ElementSession, decode_value};
pub use transport::{ByteSink, ByteSource};
pub use value::{Array, InvalidNumberText, Map, Number, Value};
