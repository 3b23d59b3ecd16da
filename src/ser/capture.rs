//! Captures a `Serialize` instance into an in-memory [`Value`] tree.
//!
//! The encode plan needs random access to fields by accessor name and needs
//! to know which values are absent, so instances are first serialized into
//! this lightweight model and then walked field by field.

use std::borrow::Cow;

use serde::ser;

use crate::error::*;

use super::encode;

/// A captured value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// `None`, `()` and unit structs.
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    /// A unit enum variant.
    Variant { index: u32, name: &'static str },
    Seq(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Struct {
        name: &'static str,
        fields: Vec<(&'static str, Value)>,
    },
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Looks up a field of a captured record by its serialized name.
    ///
    /// Maps are searched by string key so that `#[serde(flatten)]` records,
    /// which serde emits as maps, resolve the same way as plain structs.
    pub fn field(&self, accessor: &str) -> Option<&Value> {
        match self {
            Value::Struct { fields, .. } => fields
                .iter()
                .find(|(name, _)| *name == accessor)
                .map(|(_, value)| value),
            Value::Map(entries) => entries
                .iter()
                .find(|(key, _)| matches!(key, Value::Str(k) if k == accessor))
                .map(|(_, value)| value),
            _ => None,
        }
    }

    /// Returns the value's own textual form, unescaped.
    ///
    /// Scalars render as text, enum variants by name. Composite values have
    /// no textual form.
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Bool(b) => Some(Cow::Borrowed(encode::encode_bool(*b))),
            Value::I64(n) => Some(Cow::Owned(encode::encode_int(*n))),
            Value::U64(n) => Some(Cow::Owned(encode::encode_int(*n))),
            Value::F64(n) => Some(Cow::Owned(encode::encode_float(*n))),
            Value::Str(s) => Some(Cow::Borrowed(s)),
            Value::Variant { name, .. } => Some(Cow::Borrowed(name)),
            Value::Null | Value::Seq(_) | Value::Map(_) | Value::Struct { .. } => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I64(_) | Value::U64(_) => "integer",
            Value::F64(_) => "float",
            Value::Str(_) => "string",
            Value::Variant { .. } => "enum variant",
            Value::Seq(_) => "sequence",
            Value::Map(_) => "map",
            Value::Struct { .. } => "struct",
        }
    }
}

/// Serializes `input` into a [`Value`], refusing to nest deeper than
/// `max_depth` levels.
pub fn capture<T: ser::Serialize + ?Sized>(input: &T, max_depth: usize) -> Result<Value> {
    input.serialize(ValueSerializer::new(0, max_depth))
}

/// A serializer that builds a [`Value`] instead of writing output.
#[derive(Clone, Copy)]
pub(crate) struct ValueSerializer {
    depth: usize,
    max_depth: usize,
}

impl ValueSerializer {
    fn new(depth: usize, max_depth: usize) -> Self {
        Self { depth, max_depth }
    }

    /// Serializer for the next nesting level.
    fn nested(self) -> Result<Self> {
        if self.depth >= self.max_depth {
            return Err(Error::DepthLimit(self.max_depth));
        }
        Ok(Self::new(self.depth + 1, self.max_depth))
    }
}

macro_rules! capture_signed {
    (
        $($ty:ty => $meth:ident,)*) => {
        $(
            fn $meth(self, v: $ty) -> Result<Value> {
                Ok(Value::I64(i64::from(v)))
            }
        )*
    };
}

macro_rules! capture_unsigned {
    (
        $($ty:ty => $meth:ident,)*) => {
        $(
            fn $meth(self, v: $ty) -> Result<Value> {
                Ok(Value::U64(u64::from(v)))
            }
        )*
    };
}

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = Error;
    type SerializeSeq = SeqCapture;
    type SerializeTuple = SeqCapture;
    type SerializeTupleStruct = SeqCapture;
    type SerializeTupleVariant = VariantCapture<SeqCapture>;
    type SerializeMap = MapCapture;
    type SerializeStruct = StructCapture;
    type SerializeStructVariant = VariantCapture<StructCapture>;

    capture_signed! {
        i8  => serialize_i8,
        i16 => serialize_i16,
        i32 => serialize_i32,
        i64 => serialize_i64,
    }
    capture_unsigned! {
        u8  => serialize_u8,
        u16 => serialize_u16,
        u32 => serialize_u32,
        u64 => serialize_u64,
    }

    fn serialize_i128(self, v: i128) -> Result<Value> {
        i64::try_from(v)
            .map(Value::I64)
            .or_else(|_| u64::try_from(v).map(Value::U64))
            .map_err(|_| Error::Custom(format!("integer {v} does not fit in 64 bits")))
    }

    fn serialize_u128(self, v: u128) -> Result<Value> {
        u64::try_from(v)
            .map(Value::U64)
            .map_err(|_| Error::Custom(format!("integer {v} does not fit in 64 bits")))
    }

    fn serialize_f32(self, v: f32) -> Result<Value> {
        Ok(Value::F64(f64::from(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<Value> {
        Ok(Value::F64(v))
    }

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(Value::Bool(v))
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        Ok(Value::Str(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        Ok(Value::Str(v.to_owned()))
    }

    fn serialize_bytes(self, value: &[u8]) -> Result<Value> {
        Ok(Value::Str(String::from_utf8_lossy(value).into_owned()))
    }

    fn serialize_none(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_some<T: ?Sized + ser::Serialize>(self, value: &T) -> Result<Value> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        Ok(Value::Variant {
            index: variant_index,
            name: variant,
        })
    }

    fn serialize_newtype_struct<T: ?Sized + ser::Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + ser::Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value> {
        let inner = value.serialize(self.nested()?)?;
        Ok(Value::Map(vec![(Value::Str(variant.to_owned()), inner)]))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqCapture> {
        Ok(SeqCapture::new(self.nested()?, len.unwrap_or(0)))
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqCapture> {
        Ok(SeqCapture::new(self.nested()?, len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqCapture> {
        Ok(SeqCapture::new(self.nested()?, len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantCapture<SeqCapture>> {
        Ok(VariantCapture {
            variant,
            inner: SeqCapture::new(self.nested()?.nested()?, len),
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapCapture> {
        Ok(MapCapture::new(self.nested()?, len.unwrap_or(0)))
    }

    fn serialize_struct(self, name: &'static str, len: usize) -> Result<StructCapture> {
        Ok(StructCapture::new(self.nested()?, name, len))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantCapture<StructCapture>> {
        Ok(VariantCapture {
            variant,
            inner: StructCapture::new(self.nested()?.nested()?, name, len),
        })
    }
}

#[doc(hidden)]
pub struct SeqCapture {
    ser: ValueSerializer,
    items: Vec<Value>,
}

impl SeqCapture {
    fn new(ser: ValueSerializer, len: usize) -> Self {
        Self {
            ser,
            items: Vec::with_capacity(len),
        }
    }

    fn push<T: ?Sized + ser::Serialize>(&mut self, value: &T) -> Result<()> {
        self.items.push(value.serialize(self.ser)?);
        Ok(())
    }
}

impl ser::SerializeSeq for SeqCapture {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Seq(self.items))
    }
}

impl ser::SerializeTuple for SeqCapture {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Seq(self.items))
    }
}

impl ser::SerializeTupleStruct for SeqCapture {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Seq(self.items))
    }
}

#[doc(hidden)]
pub struct MapCapture {
    ser: ValueSerializer,
    entries: Vec<(Value, Value)>,
    pending_key: Option<Value>,
}

impl MapCapture {
    fn new(ser: ValueSerializer, len: usize) -> Self {
        Self {
            ser,
            entries: Vec::with_capacity(len),
            pending_key: None,
        }
    }
}

impl ser::SerializeMap for MapCapture {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        self.pending_key = Some(key.serialize(self.ser)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        let Some(key) = self.pending_key.take() else {
            return Err(Error::Custom(
                "internal error: map value serialized before its key".to_string(),
            ));
        };
        let value = value.serialize(self.ser)?;
        self.entries.push((key, value));
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Map(self.entries))
    }
}

#[doc(hidden)]
pub struct StructCapture {
    ser: ValueSerializer,
    name: &'static str,
    fields: Vec<(&'static str, Value)>,
}

impl StructCapture {
    fn new(ser: ValueSerializer, name: &'static str, len: usize) -> Self {
        Self {
            ser,
            name,
            fields: Vec::with_capacity(len),
        }
    }

    fn push<T: ?Sized + ser::Serialize>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.fields.push((key, value.serialize(self.ser)?));
        Ok(())
    }
}

impl ser::SerializeStruct for StructCapture {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        self.push(key, value)
    }

    fn skip_field(&mut self, key: &'static str) -> Result<()> {
        self.fields.push((key, Value::Null));
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Struct {
            name: self.name,
            fields: self.fields,
        })
    }
}

/// Wraps a tuple or struct variant as a single-entry map keyed by the
/// variant name.
#[doc(hidden)]
pub struct VariantCapture<C> {
    variant: &'static str,
    inner: C,
}

impl VariantCapture<SeqCapture> {
    fn finish(self) -> Value {
        let inner = Value::Seq(self.inner.items);
        Value::Map(vec![(Value::Str(self.variant.to_owned()), inner)])
    }
}

impl ser::SerializeTupleVariant for VariantCapture<SeqCapture> {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        self.inner.push(value)
    }

    fn end(self) -> Result<Value> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for VariantCapture<StructCapture> {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ser::Serialize + ?Sized,
    {
        self.inner.push(key, value)
    }

    fn end(self) -> Result<Value> {
        let inner = Value::Struct {
            name: self.inner.name,
            fields: self.inner.fields,
        };
        Ok(Value::Map(vec![(Value::Str(self.variant.to_owned()), inner)]))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Serialize;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct Inner {
        city: String,
    }

    #[derive(Serialize)]
    #[allow(dead_code)]
    enum Status {
        Active,
        Inactive,
    }

    #[derive(Serialize)]
    struct Outer {
        id: u8,
        name: Option<String>,
        status: Status,
        inner: Inner,
        tags: Vec<&'static str>,
        meta: BTreeMap<&'static str, i32>,
    }

    fn outer() -> Outer {
        Outer {
            id: 7,
            name: None,
            status: Status::Inactive,
            inner: Inner {
                city: "Carrot City".to_string(),
            },
            tags: vec!["a", "b"],
            meta: BTreeMap::from([("k", -1)]),
        }
    }

    #[test]
    fn captures_struct_fields_in_order() {
        let value = capture(&outer(), 8).unwrap();
        let Value::Struct { name, fields } = &value else {
            panic!("expected a struct, got {value:?}");
        };
        assert_eq!(*name, "Outer");
        let names: Vec<_> = fields.iter().map(|(k, _)| *k).collect();
        assert_eq!(names, ["id", "name", "status", "inner", "tags", "meta"]);

        assert_eq!(value.field("id"), Some(&Value::U64(7)));
        assert_eq!(value.field("name"), Some(&Value::Null));
        assert_eq!(
            value.field("status"),
            Some(&Value::Variant {
                index: 1,
                name: "Inactive"
            })
        );
        assert_eq!(
            value.field("tags"),
            Some(&Value::Seq(vec![
                Value::Str("a".into()),
                Value::Str("b".into())
            ]))
        );
        assert_eq!(
            value.field("meta"),
            Some(&Value::Map(vec![(Value::Str("k".into()), Value::I64(-1))]))
        );
        assert_eq!(value.field("missing"), None);
    }

    #[test]
    fn enforces_max_depth() {
        let err = capture(&outer(), 1).unwrap_err();
        assert!(matches!(err, Error::DepthLimit(1)), "got: {err}");
    }

    #[test]
    fn text_of_scalars() {
        assert_eq!(Value::Bool(false).text().as_deref(), Some("false"));
        assert_eq!(Value::F64(19.99).text().as_deref(), Some("19.99"));
        assert_eq!(Value::Seq(vec![]).text(), None);
        assert_eq!(Value::Null.text(), None);
    }
}
