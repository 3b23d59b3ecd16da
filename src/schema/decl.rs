//! Raw type declarations: the field list and the directives attached to a
//! type and its fields, before any naming conversion or validation.

use std::fmt;

use serde::Serialize;

/// A type that can be encoded as a query string.
///
/// Implementors describe their fields with a [`TypeDecl`]; the declaration
/// is turned into a [`ClassSchema`](super::ClassSchema) once and cached.
///
/// ```
/// use query_url::{FieldDecl, QueryUrl, TypeDecl, TypeRef};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// #[serde(rename_all = "PascalCase")]
/// struct Search {
///     query: Option<String>,
///     page: Option<u32>,
/// }
///
/// impl QueryUrl for Search {
///     fn declaration() -> TypeDecl {
///         TypeDecl::new("Search")
///             .base_url("https://example.com/search")
///             .field(FieldDecl::new("Query", TypeRef::String).nullable())
///             .field(FieldDecl::new("Page", TypeRef::Int).nullable())
///     }
/// }
///
/// let search = Search { query: Some("rust serde".into()), page: Some(2) };
/// assert_eq!(
///     query_url::to_query_url(&search).unwrap(),
///     "https://example.com/search?query=rust%20serde&page=2"
/// );
/// ```
pub trait QueryUrl: Serialize {
    /// Describes the type's fields and directives.
    fn declaration() -> TypeDecl;

    /// Identity under which the derived schema is cached.
    fn schema_key() -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<T: QueryUrl + ?Sized> QueryUrl for &T {
    fn declaration() -> TypeDecl {
        T::declaration()
    }

    fn schema_key() -> &'static str {
        T::schema_key()
    }
}

impl<T: QueryUrl + ?Sized> QueryUrl for Box<T> {
    fn declaration() -> TypeDecl {
        T::declaration()
    }

    fn schema_key() -> &'static str {
        T::schema_key()
    }
}

/// `None` is the null instance and encodes to an empty parameter string.
impl<T: QueryUrl> QueryUrl for Option<T> {
    fn declaration() -> TypeDecl {
        T::declaration()
    }

    fn schema_key() -> &'static str {
        T::schema_key()
    }
}

/// Class-level declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeDecl {
    pub type_name: &'static str,
    pub namespace: &'static str,
    pub base_url: String,
    /// Convert field identifiers to snake_case keys. Defaults to `true`.
    pub snake_case: bool,
    pub fields: Vec<FieldDecl>,
}

impl TypeDecl {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            namespace: "",
            base_url: String::new(),
            snake_case: true,
            fields: Vec::new(),
        }
    }

    pub fn namespace(mut self, namespace: &'static str) -> Self {
        self.namespace = namespace;
        self
    }

    /// Base URL used when none is supplied at call time.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn snake_case(mut self, snake_case: bool) -> Self {
        self.snake_case = snake_case;
        self
    }

    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }
}

/// Field-level declaration.
///
/// `name` is the identifier the field serializes under; it doubles as the
/// source accessor and as the input to the naming convention.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDecl {
    pub name: &'static str,
    pub ty: TypeRef,
    pub directives: Vec<Directive>,
}

impl FieldDecl {
    pub fn new(name: &'static str, ty: TypeRef) -> Self {
        Self {
            name,
            ty,
            directives: Vec::new(),
        }
    }

    /// Wraps the declared type as nullable.
    pub fn nullable(mut self) -> Self {
        self.ty = TypeRef::Nullable(Box::new(self.ty));
        self
    }

    pub fn directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn ignore(self) -> Self {
        self.directive(Directive::Ignore)
    }

    pub fn rename(self, key: impl Into<String>) -> Self {
        self.directive(Directive::Rename(key.into()))
    }

    /// Attaches a date-format directive with a positional template.
    pub fn date_format(self, format: impl Into<String>) -> Self {
        self.directive(Directive::DateFormat(DateFormatArgs::positional(format)))
    }

    pub fn enum_as_string(self) -> Self {
        self.directive(Directive::EnumAsString)
    }
}

/// A per-field formatting instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Directive {
    Ignore,
    /// Explicit output key, overrides the naming convention.
    Rename(String),
    DateFormat(DateFormatArgs),
    EnumAsString,
}

impl Directive {
    pub fn name(&self) -> &'static str {
        match self {
            Directive::Ignore => "ignore",
            Directive::Rename(_) => "rename",
            Directive::DateFormat(_) => "date_format",
            Directive::EnumAsString => "enum_as_string",
        }
    }
}

/// Arguments of a date-format directive.
///
/// A template may be given positionally or as a named `format` argument;
/// the named one wins when both are non-blank.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DateFormatArgs {
    pub positional: Option<String>,
    pub named: Option<String>,
}

impl DateFormatArgs {
    pub fn positional(format: impl Into<String>) -> Self {
        Self {
            positional: Some(format.into()),
            named: None,
        }
    }

    pub fn named(format: impl Into<String>) -> Self {
        Self {
            positional: None,
            named: Some(format.into()),
        }
    }

    /// The first non-blank template, named before positional.
    pub fn resolve(&self) -> Option<&str> {
        [self.named.as_deref(), self.positional.as_deref()]
            .into_iter()
            .flatten()
            .find(|f| !f.trim().is_empty())
    }
}

/// The declared type of a field.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeRef {
    String,
    Int,
    Double,
    Decimal,
    Bool,
    DateTime,
    Enum(&'static str),
    Sequence(Box<TypeRef>),
    Dictionary(Box<TypeRef>, Box<TypeRef>),
    /// A record type that carries its own query declaration.
    Nested(NestedRef),
    /// Any other type, encoded through its textual form.
    Other(&'static str),
    Nullable(Box<TypeRef>),
}

impl TypeRef {
    pub fn sequence(element: TypeRef) -> Self {
        TypeRef::Sequence(Box::new(element))
    }

    pub fn dictionary(key: TypeRef, value: TypeRef) -> Self {
        TypeRef::Dictionary(Box::new(key), Box::new(value))
    }

    pub fn nullable(inner: TypeRef) -> Self {
        TypeRef::Nullable(Box::new(inner))
    }

    pub fn nested<T: QueryUrl>() -> Self {
        TypeRef::Nested(NestedRef::of::<T>())
    }

    /// Strips every nullable wrapper.
    pub fn unwrap_nullable(&self) -> &TypeRef {
        let mut ty = self;
        while let TypeRef::Nullable(inner) = ty {
            ty = inner;
        }
        ty
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, TypeRef::Nullable(_))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::String => f.write_str("String"),
            TypeRef::Int => f.write_str("Int"),
            TypeRef::Double => f.write_str("Double"),
            TypeRef::Decimal => f.write_str("Decimal"),
            TypeRef::Bool => f.write_str("Bool"),
            TypeRef::DateTime => f.write_str("DateTime"),
            TypeRef::Enum(name) | TypeRef::Other(name) => f.write_str(name),
            TypeRef::Sequence(element) => write!(f, "Sequence<{element}>"),
            TypeRef::Dictionary(key, value) => write!(f, "Dictionary<{key}, {value}>"),
            TypeRef::Nested(nested) => f.write_str(nested.key()),
            TypeRef::Nullable(inner) => write!(f, "{inner}?"),
        }
    }
}

/// A reference to another query type, resolved through the schema cache
/// when the field is encoded.
#[derive(Clone, Copy)]
pub struct NestedRef {
    key: fn() -> &'static str,
    declaration: fn() -> TypeDecl,
}

impl NestedRef {
    pub fn of<T: QueryUrl>() -> Self {
        Self {
            key: T::schema_key,
            declaration: T::declaration,
        }
    }

    pub fn key(&self) -> &'static str {
        (self.key)()
    }

    pub fn declaration(&self) -> TypeDecl {
        (self.declaration)()
    }
}

impl PartialEq for NestedRef {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for NestedRef {}

impl fmt::Debug for NestedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NestedRef").field(&self.key()).finish()
    }
}
