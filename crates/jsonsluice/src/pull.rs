//! Lazy, pull-driven element sequences.
//!
//! Nothing is read from the source until the consumer asks for an element,
//! and then only as many chunks as it takes to complete one more element.
use std::{io::Read, sync::Arc};

use futures::Stream;

use crate::{
    aggregate::{BlockingChunkReader, ChunkReader},
    charset::Charset,
    error::ConvertError,
    materialize::FromValue,
    options::ConverterConfig,
    pipeline::PipelineMode,
    session::ElementSession,
    transport::ByteSource,
    value::Value,
};

/// The elements of a top-level JSON array read from an asynchronous source.
///
/// The sequence is forward-only and fused: after the end of the array or the
/// first error, [`Elements::next_element`] keeps returning `None`. Dropping it
/// drops the source.
#[derive(Debug)]
pub struct Elements<T, R> {
    reader: ChunkReader<R>,
    session: ElementSession,
    config: Arc<ConverterConfig>,
    from_value: FromValue<T>,
    delivered: usize,
    done: bool,
}

impl<T, R> Elements<T, R>
where
    T: Send + 'static,
    R: ByteSource,
{
    pub(crate) fn new(source: R, charset: Charset, config: Arc<ConverterConfig>, from_value: FromValue<T>) -> Self {
        Self {
            reader: ChunkReader::new(source, config.options.chunk_size),
            session: ElementSession::new(PipelineMode::Elements, charset, &config.options),
            config,
            from_value,
            delivered: 0,
            done: false,
        }
    }

    /// Reads until one more element is complete and returns it.
    ///
    /// Returns `None` after the closing `]`. A failure is returned once, after
    /// every element that completed before it.
    pub async fn next_element(&mut self) -> Option<Result<T, ConvertError>> {
        loop {
            if self.done {
                return None;
            }
            if let Some(item) = self.session.next_item() {
                return Some(self.materialize(item));
            }
            if self.session.is_terminated() {
                tracing::debug!(delivered = self.delivered, "element sequence finished");
                self.done = true;
                return None;
            }
            match self.reader.next_chunk().await {
                Ok(Some(chunk)) => self.session.feed(chunk),
                Ok(None) => self.session.finish(),
                Err(err) => self.session.fail(err.into()),
            }
        }
    }

    fn materialize(&mut self, item: Result<Value, ConvertError>) -> Result<T, ConvertError> {
        let result = item.and_then(|value| {
            (self.from_value)(&self.config.materializer, value, &self.config.options).map_err(ConvertError::TypeMismatch)
        });
        match &result {
            Ok(_) => {
                self.delivered += 1;
                tracing::trace!(index = self.delivered - 1, "element delivered");
            }
            Err(_) => {
                self.session.abort();
                self.done = true;
            }
        }
        result
    }

    /// Number of elements returned so far.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Adapts the sequence into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<T, ConvertError>> + Send {
        futures::stream::unfold(self, |mut elements| async move {
            let item = elements.next_element().await?;
            Some((item, elements))
        })
    }
}

/// Blocking counterpart of [`Elements`] over [`std::io::Read`].
///
/// # Examples
///
/// ```rust
/// use jsonsluice::JsonConverter;
///
/// let converter = JsonConverter::default();
/// let body: &[u8] = br#"[{"id": 1}, {"id": 2}]"#;
/// let ids: Vec<u64> = converter
///     .receive_blocking_elements::<serde_json::Value, _>(body, None)
///     .map(|item| item.unwrap()["id"].as_u64().unwrap())
///     .collect();
/// assert_eq!(ids, [1, 2]);
/// ```
#[derive(Debug)]
pub struct BlockingElements<T, R> {
    reader: BlockingChunkReader<R>,
    session: ElementSession,
    config: Arc<ConverterConfig>,
    from_value: FromValue<T>,
    done: bool,
}

impl<T, R> BlockingElements<T, R>
where
    T: Send + 'static,
    R: Read,
{
    pub(crate) fn new(source: R, charset: Charset, config: Arc<ConverterConfig>, from_value: FromValue<T>) -> Self {
        Self {
            reader: BlockingChunkReader::new(source, config.options.chunk_size),
            session: ElementSession::new(PipelineMode::Elements, charset, &config.options),
            config,
            from_value,
            done: false,
        }
    }
}

impl<T, R> Iterator for BlockingElements<T, R>
where
    T: Send + 'static,
    R: Read,
{
    type Item = Result<T, ConvertError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if let Some(item) = self.session.next_item() {
                let result = item.and_then(|value| {
                    (self.from_value)(&self.config.materializer, value, &self.config.options)
                        .map_err(ConvertError::TypeMismatch)
                });
                if result.is_err() {
                    self.session.abort();
                    self.done = true;
                }
                return Some(result);
            }
            if self.session.is_terminated() {
                self.done = true;
                break;
            }
            match self.reader.next_chunk() {
                Ok(Some(chunk)) => self.session.feed(chunk),
                Ok(None) => self.session.finish(),
                Err(err) => self.session.fail(err.into()),
            }
        }
        None
    }
}

impl<T, R> core::iter::FusedIterator for BlockingElements<T, R>
where
    T: Send + 'static,
    R: Read,
{
}
