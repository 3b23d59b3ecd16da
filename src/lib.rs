//! Declarative query string encoding for URL-bound request types.
//!
//! A type describes its query parameters once, through a [`TypeDecl`]
//! returned from [`QueryUrl::declaration`]. The declaration is compiled into
//! a [`ClassSchema`](schema::ClassSchema) the first time the type is
//! encoded, and every instance after that is rendered by walking the cached
//! schema.
//!
//! ## Query keys
//!
//! Field names become query keys in `snake_case` by default, so a field
//! declared as `IsValid` is written as `is_valid`. A type can opt out with
//! [`TypeDecl::snake_case`], in which case names are only lower-cased, and
//! a single field can be renamed with [`FieldDecl::rename`].
//!
//! ## Values
//!
//! * strings, numbers and booleans are written as text, percent-encoded so
//!   that only `A-Z a-z 0-9 - . _ ~` survive unescaped;
//! * sequences repeat the key once per element: `tags=a&tags=b`;
//! * dictionaries write one pair per entry, keyed by the entry's key;
//! * nested records delegate to their own schema;
//! * enums are written as their ordinal, or their name with
//!   [`FieldDecl::enum_as_string`];
//! * date-times follow a strftime template, see [`FieldDecl::date_format`].
//!
//! Absent values (`None`, or fields skipped by serde) and blank strings are
//! omitted entirely.
//!
//! ## Usage
//!
//! ```
//! use query_url::{FieldDecl, QueryUrl, TypeDecl, TypeRef};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! enum Sort {
//!     Newest,
//!     Oldest,
//! }
//!
//! #[derive(Serialize)]
//! struct Search {
//!     #[serde(rename = "SearchTerm")]
//!     term: String,
//!     #[serde(rename = "Sort")]
//!     sort: Sort,
//!     #[serde(rename = "Cursor")]
//!     cursor: Option<String>,
//! }
//!
//! impl QueryUrl for Search {
//!     fn declaration() -> TypeDecl {
//!         TypeDecl::new("Search")
//!             .base_url("https://example.com/search")
//!             .field(FieldDecl::new("SearchTerm", TypeRef::String).rename("q"))
//!             .field(FieldDecl::new("Sort", TypeRef::Enum("Sort")).enum_as_string())
//!             .field(FieldDecl::new("Cursor", TypeRef::String).nullable())
//!     }
//! }
//!
//! let search = Search {
//!     term: "a & b".to_owned(),
//!     sort: Sort::Oldest,
//!     cursor: None,
//! };
//! assert_eq!(
//!     query_url::to_query_url(&search).unwrap(),
//!     "https://example.com/search?q=a%20%26%20b&sort=Oldest");
//! ```
//!
//! ## Diagnostics
//!
//! Directives that do not fit their field are not fatal. They are dropped
//! and reported as [`Diagnostic`]s, which are logged through `tracing` when
//! the schema is first derived and can be inspected with
//! [`QueryEncoder::diagnostics`].

mod config;
mod error;
pub mod schema;
pub mod ser;

#[doc(inline)]
pub use config::Config;
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use schema::{
    Diagnostic, DiagnosticCode, Directive, FieldDecl, QueryUrl, SchemaBuilder, Severity,
    TypeDecl, TypeRef,
};
#[doc(inline)]
pub use ser::{
    EncodeContext, FieldHandler, QueryEncoder, Resolver, assemble_url, get_object_query_params,
    to_query_url, to_query_url_with_base, to_writer,
};
