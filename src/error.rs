use serde::ser;

use std::fmt::Display;
use std::io;
use std::string;

/// Errors produced while building an encode plan or encoding an instance.
///
/// Schema misuse (a directive attached to the wrong kind of field) is not an
/// error: it is reported as a [`Diagnostic`](crate::schema::Diagnostic)
/// and the offending directive is dropped.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No handler in the resolver chain accepts the field.
    ///
    /// This only happens when a custom resolver leaves out the default
    /// handler, and indicates a configuration defect rather than bad input.
    #[error("unsupported field type of field `{field}`")]
    UnsupportedField { field: String },

    /// The instance did not capture as a record.
    #[error("cannot encode {0} at the top level, try encoding a struct or a map")]
    TopLevel(&'static str),

    /// The default handler was given a composite value with no textual form.
    #[error("field `{field}` has no textual representation")]
    NoTextualForm { field: String },

    /// A field's value does not have the shape its category expects.
    #[error("field `{field}` expected {expected}, found {found}")]
    Mismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A declared field is missing from the serialized struct.
    ///
    /// The declared name must match the name serde writes, after any
    /// `rename` or `rename_all`. Fields marked `#[serde(skip)]` are never
    /// written and must be declared with
    /// [`FieldDecl::ignore`](crate::FieldDecl::ignore).
    #[error("field `{field}` declared on `{type_name}` is not serialized by the value")]
    UnknownAccessor {
        field: String,
        type_name: &'static str,
    },

    /// A date-time field held a value that could not be read as a date.
    #[error("field `{field}` cannot be read as a date-time: {value:?}")]
    InvalidDateTime { field: String, value: String },

    /// The instance nests deeper than `Config::max_depth`.
    #[error("maximum nesting depth of {0} exceeded")]
    DepthLimit(usize),

    /// A type's declaration was re-entered while it was being derived.
    #[error("cyclic schema derivation of `{0}`")]
    SchemaCycle(String),

    #[error("{0}")]
    Custom(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    FromUtf8(#[from] string::FromUtf8Error),
}

impl Error {
    /// Generate error to show the top-level type cannot be encoded.
    pub fn top_level(object: &'static str) -> Self {
        Error::TopLevel(object)
    }

    pub(crate) fn unsupported_field(field: impl Into<String>) -> Self {
        Error::UnsupportedField {
            field: field.into(),
        }
    }
}

impl ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: Display,
    {
        Error::Custom(msg.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
