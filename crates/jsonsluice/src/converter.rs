//! The converter facade: receive and send entry points over one shared
//! configuration snapshot.
use std::{io::Read, sync::Arc};

use futures::Stream;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::{
    aggregate::read_all,
    charset::Charset,
    encode::{self, TextWriter},
    error::ConvertError,
    materialize::{FromValue, MaterializeError, Materializer},
    options::{ConverterConfig, ConverterOptions},
    pull::{BlockingElements, Elements},
    push::{self, ElementReceiver},
    session::decode_value,
    transport::{ByteSink, ByteSource},
    value::Value,
};

/// Converts between JSON bodies and typed values.
///
/// Cloning is cheap: clones share the same configuration snapshot, which is
/// never modified after construction. Every conversion owns its own buffers
/// and pipeline state.
///
/// Every entry point takes an optional charset; `None` selects the configured
/// one.
///
/// # Examples
///
/// ```rust
/// # tokio_test::block_on(async {
/// use jsonsluice::JsonConverter;
///
/// #[derive(serde::Deserialize, serde::Serialize, Debug, PartialEq)]
/// struct Entry {
///     n: u32,
///     t: String,
/// }
///
/// let converter = JsonConverter::default();
/// let body: &[u8] = br#"[{"n":0,"t":"zero"},{"n":1,"t":"one"}]"#;
///
/// let mut elements = converter.receive_elements::<Entry, _>(body, None);
/// let first = elements.next_element().await.unwrap().unwrap();
/// assert_eq!(first, Entry { n: 0, t: "zero".into() });
///
/// let mut out = Vec::new();
/// converter.send(&mut out, &first, None).await.unwrap();
/// assert_eq!(out, br#"{"n":0,"t":"zero"}"#);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonConverter {
    config: Arc<ConverterConfig>,
}

impl JsonConverter {
    #[must_use]
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    #[must_use]
    pub fn options(&self) -> &ConverterOptions {
        &self.config.options
    }

    fn charset(&self, requested: Option<Charset>) -> Charset {
        requested.unwrap_or(self.config.options.charset)
    }

    // --------------------------------------------------------------------------------------------
    // Receive
    // --------------------------------------------------------------------------------------------

    /// Reads the whole body and converts it into one `T`.
    ///
    /// The source is dropped as soon as it is exhausted, before the body is
    /// parsed.
    ///
    /// # Errors
    ///
    /// Fails on a transport, decode or syntax error, on trailing content after
    /// the value, or if the value does not have the shape of `T`.
    pub async fn receive<T, R>(&self, source: R, charset: Option<Charset>) -> Result<T, ConvertError>
    where
        T: DeserializeOwned + Send + 'static,
        R: ByteSource,
    {
        self.receive_via(source, charset, Materializer::deserialize).await
    }

    /// Like [`JsonConverter::receive`] for a type converted only by its
    /// registered deserializer; see [`Materializer::deserialize_custom`].
    ///
    /// # Errors
    ///
    /// As [`JsonConverter::receive`], and if no deserializer is registered for
    /// `T`.
    pub async fn receive_custom<T, R>(&self, source: R, charset: Option<Charset>) -> Result<T, ConvertError>
    where
        T: Send + 'static,
        R: ByteSource,
    {
        self.receive_via(source, charset, Materializer::deserialize_custom).await
    }

    async fn receive_via<T, R>(
        &self,
        mut source: R,
        charset: Option<Charset>,
        from_value: FromValue<T>,
    ) -> Result<T, ConvertError>
    where
        R: ByteSource,
    {
        let charset = self.charset(charset);
        let options = &self.config.options;
        let body = read_all(&mut source, options.chunk_size).await?;
        drop(source);
        tracing::debug!(len = body.len(), %charset, "received body");

        let value = decode_value(&body, charset, options)?;
        from_value(&self.config.materializer, value, options).map_err(ConvertError::TypeMismatch)
    }

    /// Reads a top-level array lazily; see [`Elements`].
    pub fn receive_elements<T, R>(&self, source: R, charset: Option<Charset>) -> Elements<T, R>
    where
        T: DeserializeOwned + Send + 'static,
        R: ByteSource,
    {
        self.elements_via(source, charset, Materializer::deserialize)
    }

    /// [`JsonConverter::receive_elements`] for a type converted only by its
    /// registered deserializer.
    pub fn receive_elements_custom<T, R>(&self, source: R, charset: Option<Charset>) -> Elements<T, R>
    where
        T: Send + 'static,
        R: ByteSource,
    {
        self.elements_via(source, charset, Materializer::deserialize_custom)
    }

    fn elements_via<T, R>(&self, source: R, charset: Option<Charset>, from_value: FromValue<T>) -> Elements<T, R>
    where
        T: Send + 'static,
        R: ByteSource,
    {
        let charset = self.charset(charset);
        tracing::debug!(%charset, "element sequence started");
        Elements::new(source, charset, Arc::clone(&self.config), from_value)
    }

    /// Reads a top-level array lazily from a blocking reader; see
    /// [`BlockingElements`].
    pub fn receive_blocking_elements<T, R>(&self, source: R, charset: Option<Charset>) -> BlockingElements<T, R>
    where
        T: DeserializeOwned + Send + 'static,
        R: Read,
    {
        BlockingElements::new(source, self.charset(charset), Arc::clone(&self.config), Materializer::deserialize)
    }

    /// [`JsonConverter::receive_blocking_elements`] for a type converted only
    /// by its registered deserializer.
    pub fn receive_blocking_elements_custom<T, R>(&self, source: R, charset: Option<Charset>) -> BlockingElements<T, R>
    where
        T: Send + 'static,
        R: Read,
    {
        BlockingElements::new(
            source,
            self.charset(charset),
            Arc::clone(&self.config),
            Materializer::deserialize_custom,
        )
    }

    /// Reads a top-level array on a background task and delivers each element
    /// through a channel bounded by
    /// [`channel_capacity`](ConverterOptions::channel_capacity).
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn receive_channel<T, R>(&self, source: R, charset: Option<Charset>) -> ElementReceiver<T>
    where
        T: DeserializeOwned + Send + 'static,
        R: ByteSource + 'static,
    {
        let elements = self.receive_elements(source, charset);
        push::spawn(elements, self.config.options.channel_capacity)
    }

    /// [`JsonConverter::receive_channel`] for a type converted only by its
    /// registered deserializer.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn receive_channel_custom<T, R>(&self, source: R, charset: Option<Charset>) -> ElementReceiver<T>
    where
        T: Send + 'static,
        R: ByteSource + 'static,
    {
        let elements = self.receive_elements_custom(source, charset);
        push::spawn(elements, self.config.options.channel_capacity)
    }

    // --------------------------------------------------------------------------------------------
    // Send
    // --------------------------------------------------------------------------------------------

    /// Serializes `value` into a JSON string in one piece.
    ///
    /// Characters the configured charset cannot represent are escaped.
    ///
    /// # Errors
    ///
    /// Fails if `value` cannot be serialized.
    pub fn to_json<T>(&self, value: &T) -> Result<String, ConvertError>
    where
        T: Serialize + 'static,
    {
        let value = self
            .config
            .materializer
            .serialize(value, &self.config.options)
            .map_err(ConvertError::Serialize)?;
        Ok(self.value_to_json(&value))
    }

    /// [`JsonConverter::to_json`] for a type converted only by its registered
    /// serializer; see [`Materializer::serialize_custom`].
    ///
    /// # Errors
    ///
    /// Fails if no serializer is registered for `T` or it fails.
    pub fn to_json_custom<T>(&self, value: &T) -> Result<String, ConvertError>
    where
        T: 'static,
    {
        let value = self
            .config
            .materializer
            .serialize_custom(value, &self.config.options)
            .map_err(ConvertError::Serialize)?;
        Ok(self.value_to_json(&value))
    }

    fn value_to_json(&self, value: &Value) -> String {
        let options = &self.config.options;
        encode::to_json_string(value, options, options.charset)
    }

    /// Writes `value` to `sink` without building the whole text first, and
    /// flushes the sink. The sink stays open.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Fails if `value` cannot be serialized or on a write error.
    pub async fn write_value<T, W>(&self, sink: &mut W, value: &T, charset: Option<Charset>) -> Result<u64, ConvertError>
    where
        T: Serialize + 'static,
        W: ByteSink + ?Sized,
    {
        let value = self
            .config
            .materializer
            .serialize(value, &self.config.options)
            .map_err(ConvertError::Serialize)?;
        self.write_converted(sink, &value, charset).await
    }

    /// [`JsonConverter::write_value`] for a type converted only by its
    /// registered serializer.
    ///
    /// # Errors
    ///
    /// Fails if no serializer is registered for `T` or it fails, or on a write
    /// error.
    pub async fn write_value_custom<T, W>(
        &self,
        sink: &mut W,
        value: &T,
        charset: Option<Charset>,
    ) -> Result<u64, ConvertError>
    where
        T: 'static,
        W: ByteSink + ?Sized,
    {
        let value = self
            .config
            .materializer
            .serialize_custom(value, &self.config.options)
            .map_err(ConvertError::Serialize)?;
        self.write_converted(sink, &value, charset).await
    }

    async fn write_converted<W>(&self, sink: &mut W, value: &Value, charset: Option<Charset>) -> Result<u64, ConvertError>
    where
        W: ByteSink + ?Sized,
    {
        let options = &self.config.options;
        let mut writer = TextWriter::new(sink, self.charset(charset), options.chunk_size);
        writer.write_value(value, options).await?;
        let written = writer.finish().await?;
        tracing::debug!(written, "sent value");
        Ok(written)
    }

    /// Like [`JsonConverter::write_value`], then shuts the sink down to mark
    /// the end of the body.
    ///
    /// # Errors
    ///
    /// Fails if `value` cannot be serialized or on a write error.
    pub async fn send<T, W>(&self, mut sink: W, value: &T, charset: Option<Charset>) -> Result<u64, ConvertError>
    where
        T: Serialize + 'static,
        W: ByteSink,
    {
        let written = self.write_value(&mut sink, value, charset).await?;
        sink.shutdown().await?;
        Ok(written)
    }

    /// [`JsonConverter::send`] for a type converted only by its registered
    /// serializer.
    ///
    /// # Errors
    ///
    /// Fails if no serializer is registered for `T` or it fails, or on a write
    /// error.
    pub async fn send_custom<T, W>(&self, mut sink: W, value: &T, charset: Option<Charset>) -> Result<u64, ConvertError>
    where
        T: 'static,
        W: ByteSink,
    {
        let written = self.write_value_custom(&mut sink, value, charset).await?;
        sink.shutdown().await?;
        Ok(written)
    }

    /// Writes the items of `elements` as a JSON array, one element at a time,
    /// then shuts the sink down.
    ///
    /// # Errors
    ///
    /// Fails on the first element that cannot be serialized, or on a write
    /// error. The sink is left without a closing bracket in that case.
    pub async fn send_elements<T, S, W>(&self, sink: W, elements: S, charset: Option<Charset>) -> Result<u64, ConvertError>
    where
        T: Serialize + 'static,
        S: Stream<Item = T>,
        W: ByteSink,
    {
        let materializer = &self.config.materializer;
        let options = &self.config.options;
        self.send_elements_via(sink, elements, charset, |element| materializer.serialize(element, options))
            .await
    }

    /// [`JsonConverter::send_elements`] for a type converted only by its
    /// registered serializer.
    ///
    /// # Errors
    ///
    /// As [`JsonConverter::send_elements`], and if no serializer is registered
    /// for `T`.
    pub async fn send_elements_custom<T, S, W>(
        &self,
        sink: W,
        elements: S,
        charset: Option<Charset>,
    ) -> Result<u64, ConvertError>
    where
        T: 'static,
        S: Stream<Item = T>,
        W: ByteSink,
    {
        let materializer = &self.config.materializer;
        let options = &self.config.options;
        self.send_elements_via(sink, elements, charset, |element| materializer.serialize_custom(element, options))
            .await
    }

    async fn send_elements_via<T, S, W, F>(
        &self,
        mut sink: W,
        elements: S,
        charset: Option<Charset>,
        to_value: F,
    ) -> Result<u64, ConvertError>
    where
        S: Stream<Item = T>,
        W: ByteSink,
        F: FnMut(&T) -> Result<Value, MaterializeError>,
    {
        let options = &self.config.options;
        let mut writer = TextWriter::new(&mut sink, self.charset(charset), options.chunk_size);
        let count = encode::write_elements(&mut writer, elements, to_value, options).await?;
        let written = writer.finish().await?;
        sink.shutdown().await?;
        tracing::debug!(count, written, "sent element stream");
        Ok(written)
    }
}
