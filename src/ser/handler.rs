//! The handler chain: ordered field encoders, first match wins.
//!
//! Categories overlap (a dictionary is also multi-valued), so the order of
//! the chain is significant and is never replaced by a lookup table.

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

use crate::error::*;
use crate::schema::{FieldSchema, TypeCategory};

use super::EncodeContext;
use super::capture::Value;
use super::encode;

/// Encodes the value of one field as zero or more `key=value` pairs.
///
/// Handlers write through the [`EncodeContext`], which owns separator
/// placement; a handler never writes `&` itself.
pub trait FieldHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this handler encodes `field`. Decided from the schema only,
    /// never from the value.
    fn can_handle(&self, field: &FieldSchema) -> bool;

    /// Writes `value`, which is never [`Value::Null`].
    fn encode(&self, field: &FieldSchema, value: &Value, ctx: &mut EncodeContext<'_>)
    -> Result<()>;
}

/// An ordered list of handlers.
pub struct Resolver {
    handlers: Vec<Box<dyn FieldHandler>>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// The default chain.
    pub fn new() -> Self {
        Self::empty()
            .with_handler(NestedRecordHandler)
            .with_handler(DictionaryHandler)
            .with_handler(SequenceHandler)
            .with_handler(StringHandler)
            .with_handler(NumberHandler)
            .with_handler(DateTimeHandler)
            .with_handler(BoolHandler)
            .with_handler(EnumHandler)
            .with_handler(DefaultHandler)
    }

    /// A chain without any handler. Every field fails to resolve until
    /// handlers are added.
    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Appends a handler at the end of the chain.
    pub fn with_handler<H: FieldHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Inserts a handler ahead of every existing one.
    pub fn with_handler_first<H: FieldHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.insert(0, Box::new(handler));
        self
    }

    /// Handler names in evaluation order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.iter().map(|handler| handler.name())
    }

    /// The first handler accepting `field`.
    pub fn resolve(&self, field: &FieldSchema) -> Result<&dyn FieldHandler> {
        self.resolve_index(field).map(|index| self.handler(index))
    }

    pub(crate) fn resolve_index(&self, field: &FieldSchema) -> Result<usize> {
        self.handlers
            .iter()
            .position(|handler| handler.can_handle(field))
            .ok_or_else(|| Error::unsupported_field(field.source_accessor()))
    }

    pub(crate) fn handler(&self, index: usize) -> &dyn FieldHandler {
        self.handlers[index].as_ref()
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

fn mismatch(field: &FieldSchema, expected: &'static str, value: &Value) -> Error {
    Error::Mismatch {
        field: field.source_accessor().to_owned(),
        expected,
        found: value.kind(),
    }
}

/// Textual form of an element inside a collection.
fn element_text<'v>(field: &FieldSchema, value: &'v Value) -> Result<Cow<'v, str>> {
    value.text().ok_or_else(|| Error::NoTextualForm {
        field: field.source_accessor().to_owned(),
    })
}

/// Delegates to the nested type's own schema and appends its rendered
/// parameters as one segment.
pub struct NestedRecordHandler;

impl FieldHandler for NestedRecordHandler {
    fn name(&self) -> &'static str {
        "nested_record"
    }

    fn can_handle(&self, field: &FieldSchema) -> bool {
        matches!(field.category(), TypeCategory::NestedRecord(_))
    }

    fn encode(
        &self,
        field: &FieldSchema,
        value: &Value,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<()> {
        let TypeCategory::NestedRecord(nested) = field.category() else {
            return Err(Error::unsupported_field(field.source_accessor()));
        };
        if !matches!(value, Value::Struct { .. } | Value::Map(_)) {
            return Err(mismatch(field, "a record", value));
        }
        let segment = ctx.render_nested(&nested, value)?;
        ctx.write_segment(&segment)
    }
}

/// One pair per entry, keyed by the entry's own key.
pub struct DictionaryHandler;

impl FieldHandler for DictionaryHandler {
    fn name(&self) -> &'static str {
        "dictionary"
    }

    fn can_handle(&self, field: &FieldSchema) -> bool {
        field.category() == TypeCategory::Dictionary
    }

    fn encode(
        &self,
        field: &FieldSchema,
        value: &Value,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<()> {
        let Value::Map(entries) = value else {
            return Err(mismatch(field, "a map", value));
        };
        for (key, value) in entries {
            if key.is_null() || value.is_null() {
                continue;
            }
            let key = element_text(field, key)?;
            let value = element_text(field, value)?;
            if key.is_empty() || value.is_empty() {
                continue;
            }
            ctx.write_pair(&key, &encode::escape(&value))?;
        }
        Ok(())
    }
}

/// One pair per element, all under the field's key.
///
/// Matches every multi-valued field, dictionaries included, so it must come
/// after [`DictionaryHandler`]. A map that reaches it contributes its values.
pub struct SequenceHandler;

impl FieldHandler for SequenceHandler {
    fn name(&self) -> &'static str {
        "sequence"
    }

    fn can_handle(&self, field: &FieldSchema) -> bool {
        field.category().is_multi_valued()
    }

    fn encode(
        &self,
        field: &FieldSchema,
        value: &Value,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<()> {
        let elements: Box<dyn Iterator<Item = &Value>> = match value {
            Value::Seq(items) => Box::new(items.iter()),
            Value::Map(entries) => Box::new(entries.iter().map(|(_, value)| value)),
            other => return Err(mismatch(field, "a sequence", other)),
        };
        for element in elements.filter(|element| !element.is_null()) {
            let text = element_text(field, element)?;
            if text.is_empty() {
                continue;
            }
            ctx.write_pair(field.query_key(), &encode::escape(&text))?;
        }
        Ok(())
    }
}

pub struct StringHandler;

impl FieldHandler for StringHandler {
    fn name(&self) -> &'static str {
        "string"
    }

    fn can_handle(&self, field: &FieldSchema) -> bool {
        field.category() == TypeCategory::String
    }

    fn encode(
        &self,
        field: &FieldSchema,
        value: &Value,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<()> {
        let text = value
            .text()
            .ok_or_else(|| mismatch(field, "a string", value))?;
        match encode::encode_string(&text) {
            Some(encoded) => ctx.write_pair(field.query_key(), &encoded),
            None => Ok(()),
        }
    }
}

/// Int, Double and Decimal fields.
///
/// Decimals that serialize as text (such as `rust_decimal::Decimal`) are
/// passed through as written.
pub struct NumberHandler;

impl FieldHandler for NumberHandler {
    fn name(&self) -> &'static str {
        "number"
    }

    fn can_handle(&self, field: &FieldSchema) -> bool {
        field.category().is_numeric()
    }

    fn encode(
        &self,
        field: &FieldSchema,
        value: &Value,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<()> {
        let text = match value {
            Value::I64(n) => encode::encode_int(*n),
            Value::U64(n) => encode::encode_int(*n),
            Value::F64(n) => encode::encode_float(*n),
            Value::Str(s) if !s.trim().is_empty() => encode::escape(s).into_owned(),
            Value::Str(_) => return Ok(()),
            other => return Err(mismatch(field, "a number", other)),
        };
        ctx.write_pair(field.query_key(), &text)
    }
}

/// Reads RFC 3339 strings, naive date-times, dates and unix timestamps.
pub struct DateTimeHandler;

impl DateTimeHandler {
    fn parse(field: &FieldSchema, value: &Value) -> Result<DateTime<FixedOffset>> {
        let invalid = || Error::InvalidDateTime {
            field: field.source_accessor().to_owned(),
            value: value.text().map(Cow::into_owned).unwrap_or_default(),
        };
        match value {
            Value::Str(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                        .ok()
                        .map(|naive| naive.and_utc().fixed_offset())
                })
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                        .map(|naive| naive.and_utc().fixed_offset())
                })
                .ok_or_else(invalid),
            Value::I64(secs) => DateTime::<Utc>::from_timestamp(*secs, 0)
                .map(|utc| utc.fixed_offset())
                .ok_or_else(invalid),
            Value::U64(secs) => i64::try_from(*secs)
                .ok()
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
                .map(|utc| utc.fixed_offset())
                .ok_or_else(invalid),
            other => Err(mismatch(field, "a date-time", other)),
        }
    }
}

impl FieldHandler for DateTimeHandler {
    fn name(&self) -> &'static str {
        "date_time"
    }

    fn can_handle(&self, field: &FieldSchema) -> bool {
        field.category() == TypeCategory::DateTime
    }

    fn encode(
        &self,
        field: &FieldSchema,
        value: &Value,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<()> {
        let date = Self::parse(field, value)?;
        let format = field
            .format()
            .date_format
            .as_deref()
            .unwrap_or(ctx.config().get_default_date_format());
        let encoded = encode::encode_date_time(&date, format).ok_or_else(|| {
            Error::Custom(format!(
                "date format {format:?} cannot be applied to field `{}`",
                field.source_accessor()
            ))
        })?;
        ctx.write_pair(field.query_key(), &encoded)
    }
}

/// A present `false` is written, only an absent value is omitted.
pub struct BoolHandler;

impl FieldHandler for BoolHandler {
    fn name(&self) -> &'static str {
        "bool"
    }

    fn can_handle(&self, field: &FieldSchema) -> bool {
        field.category() == TypeCategory::Bool
    }

    fn encode(
        &self,
        field: &FieldSchema,
        value: &Value,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<()> {
        let Value::Bool(b) = value else {
            return Err(mismatch(field, "a bool", value));
        };
        ctx.write_pair(field.query_key(), encode::encode_bool(*b))
    }
}

/// Unit variants by index or by name.
///
/// Enums that serialize as integers are written as integers; enums that
/// serialize as strings are written as strings either way.
pub struct EnumHandler;

impl FieldHandler for EnumHandler {
    fn name(&self) -> &'static str {
        "enum"
    }

    fn can_handle(&self, field: &FieldSchema) -> bool {
        field.category() == TypeCategory::Enum
    }

    fn encode(
        &self,
        field: &FieldSchema,
        value: &Value,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<()> {
        let as_string = field.format().enum_as_string;
        let text = match value {
            Value::Variant { index, name } => encode::encode_enum(*index, name, as_string),
            Value::I64(n) => Cow::Owned(encode::encode_int(*n)),
            Value::U64(n) => Cow::Owned(encode::encode_int(*n)),
            Value::Str(s) => match encode::encode_string(s) {
                Some(encoded) => encoded,
                None => return Ok(()),
            },
            other => return Err(mismatch(field, "a unit enum variant", other)),
        };
        ctx.write_pair(field.query_key(), &text)
    }
}

/// Anything else, written through its own textual form.
///
/// Types that should be written this way serialize through `Display`, for
/// example with `serializer.collect_str(self)`.
pub struct DefaultHandler;

impl FieldHandler for DefaultHandler {
    fn name(&self) -> &'static str {
        "default"
    }

    fn can_handle(&self, _field: &FieldSchema) -> bool {
        true
    }

    fn encode(
        &self,
        field: &FieldSchema,
        value: &Value,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<()> {
        let text = value.text().ok_or_else(|| Error::NoTextualForm {
            field: field.source_accessor().to_owned(),
        })?;
        if text.is_empty() {
            return Ok(());
        }
        ctx.write_pair(field.query_key(), &encode::escape(&text))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::{FieldDecl, SchemaBuilder, TypeDecl, TypeRef};

    fn field(ty: TypeRef) -> FieldSchema {
        let decl = TypeDecl::new("T").field(FieldDecl::new("Field", ty));
        SchemaBuilder::new().build(&decl).schema.fields()[0].clone()
    }

    fn resolved(ty: TypeRef) -> &'static str {
        Resolver::new().resolve(&field(ty)).unwrap().name()
    }

    #[test]
    fn default_chain_order() {
        let names: Vec<_> = Resolver::new().names().collect();
        assert_eq!(
            names,
            [
                "nested_record",
                "dictionary",
                "sequence",
                "string",
                "number",
                "date_time",
                "bool",
                "enum",
                "default"
            ]
        );
    }

    #[test]
    fn resolves_by_category() {
        assert_eq!(resolved(TypeRef::String), "string");
        assert_eq!(resolved(TypeRef::nullable(TypeRef::Int)), "number");
        assert_eq!(resolved(TypeRef::Decimal), "number");
        assert_eq!(resolved(TypeRef::Double), "number");
        assert_eq!(resolved(TypeRef::DateTime), "date_time");
        assert_eq!(resolved(TypeRef::Bool), "bool");
        assert_eq!(resolved(TypeRef::Enum("Status")), "enum");
        assert_eq!(resolved(TypeRef::sequence(TypeRef::String)), "sequence");
        assert_eq!(
            resolved(TypeRef::dictionary(TypeRef::String, TypeRef::String)),
            "dictionary"
        );
        assert_eq!(resolved(TypeRef::Other("Point")), "default");
    }

    #[test]
    fn dictionary_falls_to_sequence_without_its_handler() {
        let resolver = Resolver::empty()
            .with_handler(SequenceHandler)
            .with_handler(DictionaryHandler);
        let field = field(TypeRef::dictionary(TypeRef::String, TypeRef::Int));
        assert_eq!(resolver.resolve(&field).unwrap().name(), "sequence");
    }

    #[test]
    fn missing_default_is_an_unsupported_field() {
        let resolver = Resolver::empty().with_handler(StringHandler);
        let err = resolver.resolve(&field(TypeRef::Int)).err().unwrap();
        assert!(
            matches!(&err, Error::UnsupportedField { field } if field == "Field"),
            "got: {err}"
        );
        assert_eq!(err.to_string(), "unsupported field type of field `Field`");
    }

    #[test]
    fn custom_handler_takes_priority() {
        struct Shout;
        impl FieldHandler for Shout {
            fn name(&self) -> &'static str {
                "shout"
            }
            fn can_handle(&self, field: &FieldSchema) -> bool {
                field.category() == TypeCategory::String
            }
            fn encode(
                &self,
                _field: &FieldSchema,
                _value: &Value,
                _ctx: &mut EncodeContext<'_>,
            ) -> Result<()> {
                Ok(())
            }
        }

        let resolver = Resolver::new().with_handler_first(Shout);
        assert_eq!(resolver.resolve(&field(TypeRef::String)).unwrap().name(), "shout");
        assert_eq!(resolver.resolve(&field(TypeRef::Int)).unwrap().name(), "number");
    }
}
