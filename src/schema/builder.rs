use std::collections::HashMap;
use std::fmt;

use crate::ser::encode;

use super::decl::{Directive, FieldDecl, TypeDecl, TypeRef};
use super::naming;
use super::{ClassSchema, FieldSchema, FormatOptions, TypeCategory};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// Stable identifiers for schema diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// A field was declared with an empty identifier and was dropped.
    EmptyFieldName,
    /// A date-format directive is attached to a field that is not a date.
    DateFormatOnNonDate,
    /// An enum-as-string directive is attached to a field that is not an enum.
    EnumAsStringOnNonEnum,
    /// A date-format template is not a valid strftime template.
    InvalidDateFormat,
    /// A rename directive has a blank key.
    BlankRename,
    /// Two fields resolve to the same query key.
    DuplicateQueryKey,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::EmptyFieldName => "QUPG001",
            DiagnosticCode::DateFormatOnNonDate => "QUPG002",
            DiagnosticCode::EnumAsStringOnNonEnum => "QUPG003",
            DiagnosticCode::InvalidDateFormat => "QUPG004",
            DiagnosticCode::BlankRename => "QUPG005",
            DiagnosticCode::DuplicateQueryKey => "QUPG006",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticCode::EmptyFieldName => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal problem found while building a schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub field_name: String,
}

impl Diagnostic {
    fn new(code: DiagnosticCode, field_name: &str, message: String) -> Self {
        Self {
            code,
            severity: code.severity(),
            message,
            field_name: field_name.to_owned(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)
    }
}

/// The result of building a schema: the schema itself and whatever was
/// reported along the way.
#[derive(Clone, Debug)]
pub struct Built {
    pub schema: ClassSchema,
    pub diagnostics: Vec<Diagnostic>,
}

impl Built {
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diagnostic| diagnostic.severity == Severity::Error)
    }
}

/// Derives a [`ClassSchema`] from a [`TypeDecl`].
///
/// Invalid directives never abort the build. Each one is reported as a
/// [`Diagnostic`] and dropped, and the field falls back to the default
/// behaviour for its type.
#[derive(Clone, Copy, Debug, Default)]
pub struct SchemaBuilder;

impl SchemaBuilder {
    pub const fn new() -> Self {
        Self
    }

    pub fn build(&self, decl: &TypeDecl) -> Built {
        let mut diagnostics = Vec::new();
        let mut fields = Vec::with_capacity(decl.fields.len());

        for field in &decl.fields {
            if let Some(schema) = self.build_field(field, decl.snake_case, &mut diagnostics) {
                fields.push(schema);
            }
        }
        check_duplicate_keys(&fields, &mut diagnostics);

        Built {
            schema: ClassSchema::new(
                decl.type_name,
                decl.namespace,
                decl.base_url.clone(),
                fields,
            ),
            diagnostics,
        }
    }

    fn build_field(
        &self,
        field: &FieldDecl,
        snake_case: bool,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<FieldSchema> {
        if field.name.trim().is_empty() {
            diagnostics.push(Diagnostic::new(
                DiagnosticCode::EmptyFieldName,
                field.name,
                format!("field of type '{}' has an empty name", field.ty),
            ));
            return None;
        }

        let ignored = field
            .directives
            .iter()
            .any(|directive| matches!(directive, Directive::Ignore));
        let category = TypeCategory::of(&field.ty);

        if field
            .directives
            .iter()
            .any(|directive| matches!(directive, Directive::Rename(key) if key.trim().is_empty()))
        {
            diagnostics.push(Diagnostic::new(
                DiagnosticCode::BlankRename,
                field.name,
                format!("rename of field '{}' is blank and is ignored", field.name),
            ));
        }

        let format = if ignored {
            FormatOptions::default()
        } else {
            format_options(field, diagnostics)
        };

        Some(FieldSchema::new(
            naming::query_key(field, snake_case),
            field.name,
            category,
            format,
            ignored,
        ))
    }
}

/// Validates the formatting directives of a field and keeps the ones that
/// apply to its type.
fn format_options(field: &FieldDecl, diagnostics: &mut Vec<Diagnostic>) -> FormatOptions {
    let effective = field.ty.unwrap_nullable();
    let mut options = FormatOptions::default();
    let mut date_format_reported = false;
    let mut enum_reported = false;

    for directive in &field.directives {
        match directive {
            Directive::DateFormat(args) => {
                if !matches!(effective, TypeRef::DateTime) {
                    if !date_format_reported {
                        diagnostics.push(Diagnostic::new(
                            DiagnosticCode::DateFormatOnNonDate,
                            field.name,
                            format!(
                                "date format directive is not supported for field '{}' of type '{}'",
                                field.name, field.ty
                            ),
                        ));
                        date_format_reported = true;
                    }
                    continue;
                }
                if options.date_format.is_some() {
                    continue;
                }
                let Some(format) = args.resolve() else {
                    continue;
                };
                if encode::is_valid_date_format(format) {
                    options.date_format = Some(format.to_owned());
                } else {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticCode::InvalidDateFormat,
                        field.name,
                        format!(
                            "date format '{format}' of field '{}' is invalid, the default format is used",
                            field.name
                        ),
                    ));
                }
            }
            Directive::EnumAsString => {
                if matches!(effective, TypeRef::Enum(_)) {
                    options.enum_as_string = true;
                } else if !enum_reported {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticCode::EnumAsStringOnNonEnum,
                        field.name,
                        format!(
                            "enum as string directive is not supported for field '{}' of type '{}'",
                            field.name, field.ty
                        ),
                    ));
                    enum_reported = true;
                }
            }
            Directive::Ignore | Directive::Rename(_) => {}
        }
    }

    options
}

fn check_duplicate_keys(fields: &[FieldSchema], diagnostics: &mut Vec<Diagnostic>) {
    let mut seen: HashMap<&str, &str> = HashMap::with_capacity(fields.len());
    for field in fields.iter().filter(|field| !field.ignored()) {
        if let Some(first) = seen.insert(field.query_key(), field.source_accessor()) {
            diagnostics.push(Diagnostic::new(
                DiagnosticCode::DuplicateQueryKey,
                field.source_accessor(),
                format!(
                    "fields '{first}' and '{}' both encode under the key '{}'",
                    field.source_accessor(),
                    field.query_key()
                ),
            ));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::DateFormatArgs;

    fn decl() -> TypeDecl {
        TypeDecl::new("SomeUrlParams")
            .namespace("TestApp")
            .field(FieldDecl::new("Name", TypeRef::String).nullable())
            .field(FieldDecl::new("StartTime", TypeRef::DateTime).date_format("%Y-%m"))
            .field(FieldDecl::new("Secret", TypeRef::String).ignore())
            .field(FieldDecl::new("Status", TypeRef::Enum("Status")).enum_as_string())
    }

    #[test]
    fn builds_fields_in_declaration_order() {
        let built = SchemaBuilder::new().build(&decl());
        assert!(built.diagnostics.is_empty(), "{:?}", built.diagnostics);

        let schema = built.schema;
        assert_eq!(schema.type_name(), "SomeUrlParams");
        assert_eq!(schema.namespace(), "TestApp");
        assert_eq!(schema.base_url(), "");
        let keys: Vec<_> = schema.fields().iter().map(FieldSchema::query_key).collect();
        assert_eq!(keys, ["name", "start_time", "secret", "status"]);

        let encoded: Vec<_> = schema.encoded_fields().map(FieldSchema::query_key).collect();
        assert_eq!(encoded, ["name", "start_time", "status"]);

        let start = schema.field("StartTime").unwrap();
        assert_eq!(start.category(), TypeCategory::DateTime);
        assert_eq!(start.format().date_format.as_deref(), Some("%Y-%m"));
        assert!(schema.field("Status").unwrap().format().enum_as_string);
        assert!(schema.field("Secret").unwrap().ignored());
    }

    #[test]
    fn date_format_on_string_is_a_warning() {
        let decl = TypeDecl::new("SomeUrlParams")
            .field(
                FieldDecl::new("Name", TypeRef::String)
                    .nullable()
                    .date_format("o"),
            )
            .field(FieldDecl::new("Age", TypeRef::Int));
        let built = SchemaBuilder::new().build(&decl);

        assert_eq!(built.diagnostics.len(), 1);
        let diagnostic = &built.diagnostics[0];
        assert_eq!(diagnostic.code, DiagnosticCode::DateFormatOnNonDate);
        assert_eq!(diagnostic.code.as_str(), "QUPG002");
        assert_eq!(diagnostic.severity, Severity::Warning);
        assert_eq!(diagnostic.field_name, "Name");
        assert!(!built.has_errors());

        // the field is still there, without the directive
        let name = built.schema.field("Name").unwrap();
        assert_eq!(name.format(), &FormatOptions::default());
        assert_eq!(built.schema.fields().len(), 2);
    }

    #[test]
    fn enum_as_string_on_int_is_a_warning() {
        let decl = TypeDecl::new("T")
            .field(FieldDecl::new("Count", TypeRef::Int).enum_as_string().enum_as_string());
        let built = SchemaBuilder::new().build(&decl);
        assert_eq!(built.diagnostics.len(), 1);
        assert_eq!(built.diagnostics[0].code, DiagnosticCode::EnumAsStringOnNonEnum);
        assert!(!built.schema.field("Count").unwrap().format().enum_as_string);
    }

    #[test]
    fn invalid_date_template_falls_back_to_default() {
        let decl = TypeDecl::new("T").field(
            FieldDecl::new("When", TypeRef::DateTime)
                .date_format("%Q")
                .date_format("%Y"),
        );
        let built = SchemaBuilder::new().build(&decl);
        assert_eq!(built.diagnostics.len(), 1);
        assert_eq!(built.diagnostics[0].code, DiagnosticCode::InvalidDateFormat);
        // the next valid template is picked up
        let when = built.schema.field("When").unwrap();
        assert_eq!(when.format().date_format.as_deref(), Some("%Y"));
    }

    #[test]
    fn named_date_format_wins() {
        let decl = TypeDecl::new("T").field(FieldDecl::new("When", TypeRef::DateTime).directive(
            Directive::DateFormat(DateFormatArgs {
                positional: Some("%Y".into()),
                named: Some("%d".into()),
            }),
        ));
        let built = SchemaBuilder::new().build(&decl);
        let when = built.schema.field("When").unwrap();
        assert_eq!(when.format().date_format.as_deref(), Some("%d"));
    }

    #[test]
    fn empty_field_name_is_an_error() {
        let decl = TypeDecl::new("T")
            .field(FieldDecl::new("", TypeRef::String))
            .field(FieldDecl::new("Ok", TypeRef::String));
        let built = SchemaBuilder::new().build(&decl);
        assert!(built.has_errors());
        assert_eq!(built.diagnostics[0].code, DiagnosticCode::EmptyFieldName);
        assert_eq!(built.schema.fields().len(), 1);
    }

    #[test]
    fn duplicate_keys_are_reported() {
        let decl = TypeDecl::new("T")
            .field(FieldDecl::new("UserName", TypeRef::String))
            .field(FieldDecl::new("user_name", TypeRef::String))
            .field(FieldDecl::new("Other", TypeRef::String).rename("user_name").ignore());
        let built = SchemaBuilder::new().build(&decl);
        assert_eq!(built.diagnostics.len(), 1);
        assert_eq!(built.diagnostics[0].code, DiagnosticCode::DuplicateQueryKey);
        assert_eq!(built.diagnostics[0].field_name, "user_name");
        assert_eq!(
            built.diagnostics[0].to_string(),
            "warning[QUPG006]: fields 'UserName' and 'user_name' both encode under the key 'user_name'"
        );
    }

    #[test]
    fn blank_rename_is_reported() {
        let decl = TypeDecl::new("T").field(FieldDecl::new("UserName", TypeRef::String).rename(""));
        let built = SchemaBuilder::new().build(&decl);
        assert_eq!(built.diagnostics[0].code, DiagnosticCode::BlankRename);
        assert_eq!(built.schema.fields()[0].query_key(), "user_name");
    }
}
