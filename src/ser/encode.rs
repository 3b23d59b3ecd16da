//! Encoding primitives: one scalar in, one URL-safe string out.

use std::borrow::Cow;
use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, TimeZone};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};

/// Format used for date-time fields without an explicit template.
///
/// The trailing `Z` is literal text, it is not replaced by the offset.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// As defined in <https://www.rfc-editor.org/rfc/rfc3986#section-2.3>
///
/// Everything is percent-encoded except the unreserved characters:
/// ASCII alphanumerics, U+002D (-), U+002E (.), U+005F (_) and U+007E (~).
/// Spaces become `%20`, never `+`.
const DATA_ESCAPE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes `input` for use as a query key or value.
///
/// Borrows when nothing needs escaping.
pub fn escape(input: &str) -> Cow<'_, str> {
    if input
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
    {
        // fast path for the common case of keys and plain numbers
        return Cow::Borrowed(input);
    }
    percent_encoding::utf8_percent_encode(input, DATA_ESCAPE_SET).into()
}

/// Encodes a string value.
///
/// Returns `None` for empty or whitespace-only input: such a field is
/// suppressed entirely rather than written as `key=`.
pub fn encode_string(value: &str) -> Option<Cow<'_, str>> {
    if value.trim().is_empty() {
        return None;
    }
    Some(escape(value))
}

pub fn encode_bool(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

pub fn encode_int<I: itoa::Integer>(value: I) -> String {
    let mut buffer = itoa::Buffer::new();
    buffer.format(value).to_owned()
}

/// Culture-invariant float text: shortest round-trip form, `.` as the
/// decimal point and no grouping.
pub fn encode_float(value: f64) -> String {
    let mut buffer = ryu::Buffer::new();
    buffer.format(value).to_owned()
}

/// Encodes an enum member either by name or by its integer value.
pub fn encode_enum(index: u32, name: &str, as_string: bool) -> Cow<'_, str> {
    if as_string {
        escape(name)
    } else {
        Cow::Owned(encode_int(index))
    }
}

/// Checks that `format` is a well-formed strftime template.
pub fn is_valid_date_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

/// Renders `value` with `format` (or [`DEFAULT_DATE_FORMAT`] when blank) and
/// percent-encodes the result.
///
/// Returns `None` when the template cannot be applied to the value.
pub fn encode_date_time<Tz>(value: &DateTime<Tz>, format: &str) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let format = if format.trim().is_empty() {
        DEFAULT_DATE_FORMAT
    } else {
        format
    };
    if !is_valid_date_format(format) {
        return None;
    }

    let mut rendered = String::with_capacity(format.len() + 8);
    write!(rendered, "{}", value.format(format)).ok()?;
    Some(escape(&rendered).into_owned())
}
