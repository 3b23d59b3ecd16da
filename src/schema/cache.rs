use std::cell::RefCell;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::error::*;

use super::builder::{Built, SchemaBuilder};
use super::decl::{NestedRef, QueryUrl, TypeDecl};
use super::TypeCategory;

thread_local! {
    /// Schema keys whose derivation is running on this thread.
    static IN_PROGRESS: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
}

/// Marks a key as being derived until dropped.
struct InProgress(&'static str);

impl InProgress {
    fn enter(key: &'static str) -> Result<Self> {
        IN_PROGRESS.with(|keys| {
            let mut keys = keys.borrow_mut();
            if keys.contains(&key) {
                return Err(Error::SchemaCycle(key.to_owned()));
            }
            keys.push(key);
            Ok(InProgress(key))
        })
    }

    fn contains(key: &'static str) -> bool {
        IN_PROGRESS.with(|keys| keys.borrow().contains(&key))
    }
}

impl Drop for InProgress {
    fn drop(&mut self) {
        IN_PROGRESS.with(|keys| {
            let mut keys = keys.borrow_mut();
            if let Some(pos) = keys.iter().rposition(|key| *key == self.0) {
                keys.remove(pos);
            }
        });
    }
}

/// Memoizes derived schemas per type.
///
/// Schemas are built on first use and shared afterwards. Two threads racing
/// to derive the same type both build it, the first insert wins and both
/// results are equal.
#[derive(Debug, Default)]
pub struct SchemaCache {
    builder: SchemaBuilder,
    entries: DashMap<&'static str, Arc<Built>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The schema of `T`, derived on first use.
    pub fn get<T: QueryUrl + ?Sized>(&self) -> Result<Arc<Built>> {
        self.get_or_build(T::schema_key(), T::declaration)
    }

    /// The schema a nested field refers to.
    pub fn get_nested(&self, nested: &NestedRef) -> Result<Arc<Built>> {
        self.get_or_build(nested.key(), || nested.declaration())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get_or_build<F>(&self, key: &'static str, declaration: F) -> Result<Arc<Built>>
    where
        F: FnOnce() -> TypeDecl,
    {
        if let Some(built) = self.entries.get(key) {
            return Ok(Arc::clone(built.value()));
        }

        let built = {
            let _guard = InProgress::enter(key)?;
            let built = self.builder.build(&declaration());
            debug!(
                type_name = built.schema.type_name(),
                key,
                fields = built.schema.fields().len(),
                "derived query schema"
            );
            for diagnostic in &built.diagnostics {
                warn!(
                    code = diagnostic.code.as_str(),
                    field = %diagnostic.field_name,
                    type_name = built.schema.type_name(),
                    "{}",
                    diagnostic.message
                );
            }
            self.warm_nested(&built)?;
            built
        };

        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| Arc::new(built));
        Ok(Arc::clone(entry.value()))
    }

    /// Derives the schemas of nested fields so that their diagnostics are
    /// reported together with the outer type.
    ///
    /// A nested type that is already being derived is a back-edge of a
    /// recursive type and is left to be looked up when encoding.
    fn warm_nested(&self, built: &Built) -> Result<()> {
        for field in built.schema.encoded_fields() {
            if let TypeCategory::NestedRecord(nested) = field.category() {
                let key = nested.key();
                if self.contains(key) || InProgress::contains(key) {
                    continue;
                }
                self.get_nested(&nested)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::{FieldDecl, TypeRef};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Inner {
        name: String,
    }

    impl QueryUrl for Inner {
        fn declaration() -> TypeDecl {
            TypeDecl::new("Inner").field(FieldDecl::new("name", TypeRef::String))
        }
    }

    #[derive(Serialize)]
    struct Tree {
        label: String,
        child: Option<Box<Tree>>,
        inner: Inner,
    }

    impl QueryUrl for Tree {
        fn declaration() -> TypeDecl {
            TypeDecl::new("Tree")
                .field(FieldDecl::new("label", TypeRef::String))
                .field(FieldDecl::new("child", TypeRef::nested::<Tree>()).nullable())
                .field(FieldDecl::new("inner", TypeRef::nested::<Inner>()))
        }
    }

    #[derive(Serialize)]
    struct Reentrant;

    impl QueryUrl for Reentrant {
        fn declaration() -> TypeDecl {
            // re-enters its own derivation on the same thread
            let cycle = matches!(
                SchemaCache::new().get::<Reentrant>(),
                Err(Error::SchemaCycle(_))
            );
            let name = if cycle { "cycle" } else { "no_cycle" };
            TypeDecl::new("Reentrant").field(FieldDecl::new(name, TypeRef::String))
        }
    }

    #[test]
    fn caches_by_type() {
        let cache = SchemaCache::new();
        assert!(cache.is_empty());
        let first = cache.get::<Inner>().unwrap();
        let second = cache.get::<Option<&Inner>>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn recursive_types_are_derived_once() {
        let cache = SchemaCache::new();
        let tree = cache.get::<Tree>().unwrap();
        assert_eq!(tree.schema.fields().len(), 3);
        // the nested type is warmed, the recursive back-edge is not rebuilt
        assert!(cache.contains(Inner::schema_key()));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn reentrant_derivation_fails_fast() {
        let cache = SchemaCache::new();
        let built = cache.get::<Reentrant>().unwrap();
        assert_eq!(built.schema.fields()[0].source_accessor(), "cycle");
    }
}
