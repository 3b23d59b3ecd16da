use crate::ser::{QueryEncoder, encode};

/// Configuration for encoding behavior.
///
/// ## Nesting Depth
///
/// The `max_depth` parameter controls how deeply an instance may nest
/// before encoding gives up with [`Error::DepthLimit`](crate::Error).
/// This bounds the recursion into nested records, sequences and maps, so a
/// pathological value fails fast instead of exhausting the stack.
///
/// Default value: `max_depth = 8`
///
/// ## Date Format
///
/// Date-time fields without a date-format directive are rendered with
/// `default_date_format`, a strftime template.
///
/// Default value: `"%Y-%m-%dT%H:%M:%SZ"`
///
/// ```
/// use query_url::Config;
///
/// let encoder = Config::new()
///     .max_depth(2)
///     .default_date_format("%Y-%m-%d")
///     .encoder();
/// assert_eq!(encoder.config().get_max_depth(), 2);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    max_depth: usize,
    default_date_format: &'static str,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub const fn new() -> Self {
        Self {
            max_depth: 8,
            default_date_format: encode::DEFAULT_DATE_FORMAT,
        }
    }

    /// Specifies the maximum nesting depth of an encoded instance.
    /// Default is 8.
    pub const fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Specifies the template used for date-time fields that carry no
    /// date-format directive of their own.
    pub const fn default_date_format(mut self, format: &'static str) -> Self {
        self.default_date_format = format;
        self
    }

    pub const fn get_max_depth(&self) -> usize {
        self.max_depth
    }

    pub const fn get_default_date_format(&self) -> &'static str {
        self.default_date_format
    }

    /// Builds an encoder with this configuration and the default handler
    /// chain.
    pub fn encoder(self) -> QueryEncoder {
        QueryEncoder::with_config(self)
    }
}
