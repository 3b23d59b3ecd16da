//! Derived, immutable schemas describing how a type encodes.
//!
//! A [`TypeDecl`] is turned into a [`ClassSchema`] by the
//! [`SchemaBuilder`]. The schema records, per field, the query key, the
//! accessor the value is read from, the type category that decides which
//! handler encodes it and the formatting options that survived validation.

mod builder;
mod cache;
mod decl;
mod naming;

pub use builder::{Built, Diagnostic, DiagnosticCode, SchemaBuilder, Severity};
pub use cache::SchemaCache;
pub use decl::{DateFormatArgs, Directive, FieldDecl, NestedRef, QueryUrl, TypeDecl, TypeRef};
pub use naming::{query_key, to_snake_case};

use std::fmt;

/// What kind of value a field holds, decided once when the schema is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeCategory {
    String,
    Int,
    Double,
    Decimal,
    Bool,
    DateTime,
    Enum,
    Dictionary,
    Sequence,
    NestedRecord(NestedRef),
    Unknown,
}

impl TypeCategory {
    /// Category of a declared type, looking through nullable wrappers.
    pub fn of(ty: &TypeRef) -> Self {
        match ty.unwrap_nullable() {
            TypeRef::String => TypeCategory::String,
            TypeRef::Int => TypeCategory::Int,
            TypeRef::Double => TypeCategory::Double,
            TypeRef::Decimal => TypeCategory::Decimal,
            TypeRef::Bool => TypeCategory::Bool,
            TypeRef::DateTime => TypeCategory::DateTime,
            TypeRef::Enum(_) => TypeCategory::Enum,
            TypeRef::Sequence(_) => TypeCategory::Sequence,
            TypeRef::Dictionary(..) => TypeCategory::Dictionary,
            TypeRef::Nested(nested) => TypeCategory::NestedRecord(*nested),
            TypeRef::Other(_) => TypeCategory::Unknown,
            TypeRef::Nullable(_) => unreachable!("nullable wrappers are unwrapped"),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TypeCategory::Int | TypeCategory::Double | TypeCategory::Decimal
        )
    }

    /// Dictionaries are multi-valued too, so a handler matching on this must
    /// be ordered after the dictionary handler.
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, TypeCategory::Sequence | TypeCategory::Dictionary)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TypeCategory::String => "String",
            TypeCategory::Int => "Int",
            TypeCategory::Double => "Double",
            TypeCategory::Decimal => "Decimal",
            TypeCategory::Bool => "Bool",
            TypeCategory::DateTime => "DateTime",
            TypeCategory::Enum => "Enum",
            TypeCategory::Dictionary => "Dictionary",
            TypeCategory::Sequence => "Sequence",
            TypeCategory::NestedRecord(_) => "NestedRecord",
            TypeCategory::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeCategory::NestedRecord(nested) => write!(f, "NestedRecord({})", nested.key()),
            other => f.write_str(other.name()),
        }
    }
}

/// Formatting options that survived validation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormatOptions {
    pub date_format: Option<String>,
    pub enum_as_string: bool,
}

/// The canonical description of one field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSchema {
    query_key: String,
    source_accessor: &'static str,
    category: TypeCategory,
    format: FormatOptions,
    ignored: bool,
}

impl FieldSchema {
    pub(crate) fn new(
        query_key: String,
        source_accessor: &'static str,
        category: TypeCategory,
        format: FormatOptions,
        ignored: bool,
    ) -> Self {
        debug_assert!(!query_key.is_empty(), "query keys are never empty");
        Self {
            query_key,
            source_accessor,
            category,
            format,
            ignored,
        }
    }

    /// The naming-converted output key.
    pub fn query_key(&self) -> &str {
        &self.query_key
    }

    /// The name the field's value is serialized under.
    pub fn source_accessor(&self) -> &'static str {
        self.source_accessor
    }

    pub fn category(&self) -> TypeCategory {
        self.category
    }

    pub fn format(&self) -> &FormatOptions {
        &self.format
    }

    pub fn ignored(&self) -> bool {
        self.ignored
    }
}

/// The ordered field schemas of one type.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassSchema {
    type_name: &'static str,
    namespace: &'static str,
    base_url: String,
    fields: Vec<FieldSchema>,
}

impl ClassSchema {
    pub(crate) fn new(
        type_name: &'static str,
        namespace: &'static str,
        base_url: String,
        fields: Vec<FieldSchema>,
    ) -> Self {
        Self {
            type_name,
            namespace,
            base_url,
            fields,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    /// The type's default base URL, empty when none was declared.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// All fields in declaration order, ignored ones included.
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Fields that take part in encoding.
    pub fn encoded_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|field| !field.ignored)
    }

    pub fn field(&self, source_accessor: &str) -> Option<&FieldSchema> {
        self.fields
            .iter()
            .find(|field| field.source_accessor == source_accessor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn category_looks_through_nullable() {
        let ty = TypeRef::nullable(TypeRef::Bool);
        assert_eq!(TypeCategory::of(&ty), TypeCategory::Bool);
        assert_eq!(
            TypeCategory::of(&TypeRef::Other("Point")),
            TypeCategory::Unknown
        );
    }

    #[test]
    fn dictionaries_are_multi_valued() {
        assert!(TypeCategory::Dictionary.is_multi_valued());
        assert!(TypeCategory::Sequence.is_multi_valued());
        assert!(!TypeCategory::String.is_multi_valued());
        assert!(TypeCategory::Decimal.is_numeric());
    }
}
