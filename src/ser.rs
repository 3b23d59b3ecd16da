//! Query string encoding.

mod capture;
pub mod encode;
mod handler;

pub use capture::{Value, capture};
pub use handler::{
    BoolHandler, DateTimeHandler, DefaultHandler, DictionaryHandler, EnumHandler, FieldHandler,
    NestedRecordHandler, NumberHandler, Resolver, SequenceHandler, StringHandler,
};

use std::io::Write;
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use tracing::trace;

use crate::config::Config;
use crate::error::*;
use crate::schema::{
    Built, ClassSchema, Diagnostic, FieldSchema, NestedRef, QueryUrl, SchemaCache,
};

static DEFAULT_ENCODER: LazyLock<QueryEncoder> = LazyLock::new(QueryEncoder::new);

/// Encodes a value into a full URL, using the type's declared base URL.
///
/// ```
/// use query_url::{FieldDecl, QueryUrl, TypeDecl, TypeRef};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// #[serde(rename_all = "PascalCase")]
/// struct Query {
///     name: String,
///     age: u8,
///     tags: Vec<String>,
///     is_valid: bool,
/// }
///
/// impl QueryUrl for Query {
///     fn declaration() -> TypeDecl {
///         TypeDecl::new("Query")
///             .base_url("https://example.com/api")
///             .field(FieldDecl::new("Name", TypeRef::String))
///             .field(FieldDecl::new("Age", TypeRef::Int))
///             .field(FieldDecl::new("Tags", TypeRef::sequence(TypeRef::String)))
///             .field(FieldDecl::new("IsValid", TypeRef::Bool))
///     }
/// }
///
/// let q = Query {
///     name: "John Doe".to_owned(),
///     age: 30,
///     tags: vec!["tag1".to_owned(), "tag2".to_owned()],
///     is_valid: true,
/// };
///
/// assert_eq!(
///     query_url::to_query_url(&q).unwrap(),
///     "https://example.com/api?name=John%20Doe&age=30&tags=tag1&tags=tag2&is_valid=true");
/// ```
pub fn to_query_url<T: QueryUrl + ?Sized>(input: &T) -> Result<String> {
    DEFAULT_ENCODER.to_query_url(input)
}

/// Encodes a value into a full URL under an explicit base URL.
pub fn to_query_url_with_base<T: QueryUrl + ?Sized>(input: &T, base_url: &str) -> Result<String> {
    DEFAULT_ENCODER.to_query_url_with_base(input, base_url)
}

/// Encodes the parameter portion only: no base URL and no leading `?`.
pub fn get_object_query_params<T: QueryUrl + ?Sized>(input: &T) -> Result<String> {
    DEFAULT_ENCODER.get_object_query_params(input)
}

/// Encodes the parameter portion into a generic writer object.
pub fn to_writer<T: QueryUrl + ?Sized, W: Write>(input: &T, writer: &mut W) -> Result<()> {
    DEFAULT_ENCODER.to_writer(input, writer)
}

/// Joins a base URL and rendered parameters.
///
/// Empty parameters return the base URL unchanged, without a trailing `?`.
pub fn assemble_url(base_url: &str, params: &str) -> String {
    if params.is_empty() {
        return base_url.to_owned();
    }
    let mut url = String::with_capacity(base_url.len() + 1 + params.len());
    url.push_str(base_url);
    url.push('?');
    url.push_str(params);
    url
}

/// A compiled schema: the fields to encode, each with its resolved handler.
struct Plan {
    built: Arc<Built>,
    steps: Vec<(usize, usize)>,
}

impl Plan {
    fn schema(&self) -> &ClassSchema {
        &self.built.schema
    }
}

/// Executes schemas against instances.
///
/// Holds the configuration, the handler chain and the caches of derived
/// schemas and compiled plans. Encoding takes `&self`, so one encoder can
/// be shared between threads.
///
/// ```
/// use query_url::{Config, QueryEncoder, Resolver};
///
/// let encoder = QueryEncoder::with_config(Config::new().max_depth(4))
///     .resolver(Resolver::new());
/// # let _ = encoder;
/// ```
pub struct QueryEncoder {
    config: Config,
    resolver: Resolver,
    schemas: SchemaCache,
    plans: DashMap<&'static str, Arc<Plan>>,
}

impl Default for QueryEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for QueryEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEncoder")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .field("schemas", &self.schemas.len())
            .finish()
    }
}

impl QueryEncoder {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            resolver: Resolver::new(),
            schemas: SchemaCache::new(),
            plans: DashMap::new(),
        }
    }

    /// Replaces the handler chain.
    pub fn resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self.plans.clear();
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn schemas(&self) -> &SchemaCache {
        &self.schemas
    }

    /// The derived schema of `T`.
    pub fn schema<T: QueryUrl + ?Sized>(&self) -> Result<Arc<Built>> {
        self.schemas.get::<T>()
    }

    /// Diagnostics reported while deriving the schema of `T`.
    pub fn diagnostics<T: QueryUrl + ?Sized>(&self) -> Result<Vec<Diagnostic>> {
        Ok(self.schema::<T>()?.diagnostics.clone())
    }

    pub fn to_query_url<T: QueryUrl + ?Sized>(&self, input: &T) -> Result<String> {
        let plan = self.plan(T::schema_key(), || self.schemas.get::<T>())?;
        let params = self.render(&plan, input)?;
        Ok(assemble_url(plan.schema().base_url(), &params))
    }

    pub fn to_query_url_with_base<T: QueryUrl + ?Sized>(
        &self,
        input: &T,
        base_url: &str,
    ) -> Result<String> {
        let params = self.get_object_query_params(input)?;
        Ok(assemble_url(base_url, &params))
    }

    pub fn get_object_query_params<T: QueryUrl + ?Sized>(&self, input: &T) -> Result<String> {
        let plan = self.plan(T::schema_key(), || self.schemas.get::<T>())?;
        self.render(&plan, input)
    }

    pub fn to_writer<T: QueryUrl + ?Sized, W: Write>(&self, input: &T, writer: &mut W) -> Result<()> {
        let plan = self.plan(T::schema_key(), || self.schemas.get::<T>())?;
        let record = capture(input, self.config.get_max_depth())?;
        if record.is_null() {
            return Ok(());
        }
        self.execute(&plan, &record, writer)
    }

    fn render<T: serde::Serialize + ?Sized>(&self, plan: &Plan, input: &T) -> Result<String> {
        let record = capture(input, self.config.get_max_depth())?;
        if record.is_null() {
            return Ok(String::new());
        }
        self.render_value(plan, &record)
    }

    fn render_value(&self, plan: &Plan, record: &Value) -> Result<String> {
        // initialize the buffer with 128 bytes
        // this is a guess based on what `serde_json` does
        let mut buffer = Vec::with_capacity(128);
        self.execute(plan, record, &mut buffer)?;
        String::from_utf8(buffer).map_err(Error::from)
    }

    /// Walks the plan's fields in order and lets each handler write.
    fn execute(&self, plan: &Plan, record: &Value, writer: &mut dyn Write) -> Result<()> {
        if !matches!(record, Value::Struct { .. } | Value::Map(_)) {
            return Err(Error::top_level(record.kind()));
        }

        let fields = plan.schema().fields();
        let mut ctx = EncodeContext {
            encoder: self,
            writer: QueryWriter::new(writer),
        };
        for &(field_index, handler_index) in &plan.steps {
            let field = &fields[field_index];
            let value = match record.field(field.source_accessor()) {
                Some(value) => value,
                // flattened records capture as maps and may leave keys out
                None if matches!(record, Value::Map(_)) => continue,
                None => {
                    return Err(Error::UnknownAccessor {
                        field: field.source_accessor().to_owned(),
                        type_name: plan.schema().type_name(),
                    });
                }
            };
            if value.is_null() {
                continue;
            }
            self.resolver
                .handler(handler_index)
                .encode(field, value, &mut ctx)?;
        }
        Ok(())
    }

    /// The compiled plan for a schema key, compiled on first use.
    fn plan<F>(&self, key: &'static str, schema: F) -> Result<Arc<Plan>>
    where
        F: FnOnce() -> Result<Arc<Built>>,
    {
        if let Some(plan) = self.plans.get(key) {
            return Ok(Arc::clone(plan.value()));
        }

        let built = schema()?;
        let steps = built
            .schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, field)| !field.ignored())
            .map(|(index, field)| Ok((index, self.resolve(field)?)))
            .collect::<Result<Vec<_>>>()?;
        trace!(key, steps = steps.len(), "compiled query plan");

        let plan = self
            .plans
            .entry(key)
            .or_insert_with(|| Arc::new(Plan { built, steps }));
        Ok(Arc::clone(plan.value()))
    }

    fn resolve(&self, field: &FieldSchema) -> Result<usize> {
        let index = self.resolver.resolve_index(field)?;
        trace!(
            field = field.source_accessor(),
            category = %field.category(),
            handler = self.resolver.handler(index).name(),
            "resolved field handler"
        );
        Ok(index)
    }
}

/// Output buffer that places `&` between pairs.
///
/// Tracks whether anything has been written; a separator goes in front of
/// every non-empty pair or segment except the first.
pub struct QueryWriter<'w> {
    writer: &'w mut dyn Write,
    first_kv: bool,
}

impl<'w> QueryWriter<'w> {
    pub fn new(writer: &'w mut dyn Write) -> Self {
        Self {
            writer,
            first_kv: true,
        }
    }

    fn write_separator(&mut self) -> Result<()> {
        if self.first_kv {
            self.first_kv = false;
        } else {
            self.writer.write_all(b"&")?;
        }
        Ok(())
    }

    /// Writes `key=value`. The key is percent-encoded here, the value must
    /// already be.
    pub fn write_pair(&mut self, key: &str, value: &str) -> Result<()> {
        self.write_separator()?;
        self.writer.write_all(encode::escape(key).as_bytes())?;
        self.writer.write_all(b"=")?;
        self.writer.write_all(value.as_bytes())?;
        Ok(())
    }

    /// Writes an already rendered run of pairs as one unit.
    pub fn write_segment(&mut self, segment: &str) -> Result<()> {
        if segment.is_empty() {
            return Ok(());
        }
        self.write_separator()?;
        self.writer.write_all(segment.as_bytes())?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.first_kv
    }
}

/// What a [`FieldHandler`] gets to write with.
pub struct EncodeContext<'a> {
    encoder: &'a QueryEncoder,
    writer: QueryWriter<'a>,
}

impl EncodeContext<'_> {
    pub fn config(&self) -> &Config {
        &self.encoder.config
    }

    pub fn write_pair(&mut self, key: &str, value: &str) -> Result<()> {
        self.writer.write_pair(key, value)
    }

    pub fn write_segment(&mut self, segment: &str) -> Result<()> {
        self.writer.write_segment(segment)
    }

    /// Renders a nested record with its own schema.
    pub fn render_nested(&self, nested: &NestedRef, record: &Value) -> Result<String> {
        let encoder = self.encoder;
        let plan = encoder.plan(nested.key(), || encoder.schemas.get_nested(nested))?;
        encoder.render_value(&plan, record)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn assembles_urls() {
        assert_eq!(assemble_url("https://example.com/api", ""), "https://example.com/api");
        assert_eq!(
            assemble_url("https://example.com/api", "a=1"),
            "https://example.com/api?a=1"
        );
        assert_eq!(assemble_url("", "a=1"), "?a=1");
    }

    #[test]
    fn writer_places_separators() {
        let mut buffer = Vec::new();
        let mut writer = QueryWriter::new(&mut buffer);
        assert!(writer.is_empty());
        writer.write_segment("").unwrap();
        writer.write_pair("a key", "1").unwrap();
        writer.write_segment("b=2&c=3").unwrap();
        writer.write_segment("").unwrap();
        writer.write_pair("d", "4").unwrap();
        assert!(!writer.is_empty());
        assert_eq!(String::from_utf8(buffer).unwrap(), "a%20key=1&b=2&c=3&d=4");
    }
}
