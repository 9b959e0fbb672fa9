use serde::Deserialize;

use crate::{charset::Charset, materialize::Materializer};

/// Default read chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;
/// Default number of elements buffered between a push-mode producer and its
/// consumer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;
/// Default limit on container nesting.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Options consulted by every conversion.
///
/// Options can be built in code or loaded from JSON configuration. Field
/// names are camelCase there and every field may be omitted.
///
/// # Examples
///
/// ```rust
/// use jsonsluice::{Charset, ConverterOptions};
///
/// let options: ConverterOptions =
///     serde_json::from_str(r#"{"chunkSize": 1280, "charset": "ISO-8859-1"}"#).unwrap();
/// assert_eq!(options.chunk_size, 1280);
/// assert_eq!(options.charset, Charset::Latin1);
/// assert!(!options.big_number_as_string);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConverterOptions {
    /// Size of each read from a byte source. Values below one are treated as
    /// one.
    ///
    /// # Default
    ///
    /// `8192`
    pub chunk_size: usize,

    /// Charset of bodies that do not declare their own.
    ///
    /// # Default
    ///
    /// UTF-8
    pub charset: Charset,

    /// Whether integers outside the range a JavaScript client can represent
    /// exactly (beyond ±(2^53 − 1)) are written as JSON strings.
    ///
    /// Only affects the send direction. Received numbers always keep their
    /// source text.
    ///
    /// # Default
    ///
    /// `false`
    pub big_number_as_string: bool,

    /// Bound of the channel between a push-mode producer task and its
    /// consumer. A full channel suspends the producer, which then stops
    /// reading from the source. Values below one are treated as one.
    ///
    /// # Default
    ///
    /// `16`
    pub channel_capacity: usize,

    /// Maximum container nesting accepted by the pipeline.
    ///
    /// # Default
    ///
    /// `512`
    pub max_depth: usize,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            charset: Charset::Utf8,
            big_number_as_string: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// An immutable configuration snapshot: options plus the custom
/// (de)serializer registry.
///
/// Built once at setup and shared read-only by all conversions of a
/// [`JsonConverter`].
///
/// [`JsonConverter`]: crate::JsonConverter
#[derive(Debug, Clone, Default)]
pub struct ConverterConfig {
    pub options: ConverterOptions,
    pub materializer: Materializer,
}

impl ConverterConfig {
    #[must_use]
    pub fn new(options: ConverterOptions) -> Self {
        Self {
            options,
            materializer: Materializer::default(),
        }
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.options.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.options.charset = charset;
        self
    }

    #[must_use]
    pub fn with_big_number_as_string(mut self, enabled: bool) -> Self {
        self.options.big_number_as_string = enabled;
        self
    }

    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.options.channel_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.options.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_materializer(mut self, materializer: Materializer) -> Self {
        self.materializer = materializer;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let options: ConverterOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, ConverterOptions::default());
    }

    #[test]
    fn unknown_charset_is_rejected() {
        let err = serde_json::from_str::<ConverterOptions>(r#"{"charset":"koi8-r"}"#).unwrap_err();
        assert!(err.to_string().contains("unsupported charset 'koi8-r'"), "{err}");
    }

    #[test]
    fn builder_overrides_single_fields() {
        let config = ConverterConfig::default()
            .with_chunk_size(4)
            .with_channel_capacity(2)
            .with_big_number_as_string(true);
        assert_eq!(config.options.chunk_size, 4);
        assert_eq!(config.options.channel_capacity, 2);
        assert!(config.options.big_number_as_string);
        assert_eq!(config.options.max_depth, DEFAULT_MAX_DEPTH);
    }
}
