//! Process-wide catalog of table schemas.
//!
//! The catalog has two halves: a closed built-in half filled by this
//! crate, and an open public half populated by user code. Every built-in
//! is mirrored into the public half; `resolve` consults the public half
//! first and falls back to the built-ins. Like the type registry, the
//! catalog freezes on first lookup.

use std::sync::{
    OnceLock, RwLock,
    atomic::{AtomicBool, Ordering},
};

use ahash::AHashMap;
use fovea_common::{Result, error::Error, name::canonical_name};

use crate::builtin;
use crate::schema::TableSchema;

pub struct SchemaRegistry {
    builtin: AHashMap<String, TableSchema>,
    public: RwLock<AHashMap<String, TableSchema>>,
    frozen: AtomicBool,
}

impl SchemaRegistry {
    pub fn with_builtins() -> SchemaRegistry {
        let builtin: AHashMap<String, TableSchema> = builtin::all()
            .into_iter()
            .map(|schema| (schema.concrete_name().to_string(), schema))
            .collect();
        let public = builtin.clone();
        SchemaRegistry {
            builtin,
            public: RwLock::new(public),
            frozen: AtomicBool::new(false),
        }
    }

    /// Registers a user schema into the public half.
    ///
    /// Registration under a canonical name that is already taken
    /// (including by a built-in) is a configuration error
    /// (`DuplicateSchema`); registration after the first lookup fails
    /// with `RegistryFrozen`.
    pub fn register(&self, schema: TableSchema) -> Result<()> {
        let key = schema.concrete_name().to_string();
        if self.frozen.load(Ordering::Acquire) {
            return Err(Error::registry_frozen("schemas", key));
        }
        let mut public = self
            .public
            .write()
            .map_err(|_| Error::invalid_arg("schemas", "registry lock poisoned"))?;
        if public.contains_key(&key) {
            return Err(Error::duplicate_schema(key));
        }
        public.insert(key, schema);
        Ok(())
    }

    /// Resolves a canonical name, public half first, built-ins as
    /// fallback. The first lookup freezes the registry.
    pub fn resolve(&self, name: &str) -> Option<TableSchema> {
        self.frozen.store(true, Ordering::Release);
        let key = canonical_name(name);
        if let Ok(public) = self.public.read() {
            if let Some(schema) = public.get(&key) {
                return Some(schema.clone());
            }
        }
        self.builtin.get(&key).cloned()
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtin.contains_key(&canonical_name(name))
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }
}

static SCHEMAS: OnceLock<SchemaRegistry> = OnceLock::new();

/// The process-wide schema registry.
pub fn global() -> &'static SchemaRegistry {
    SCHEMAS.get_or_init(SchemaRegistry::with_builtins)
}

/// Registers a user schema into the global registry.
pub fn register_schema(schema: TableSchema) -> Result<()> {
    global().register(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, Group};
    use fovea_common::error::ErrorKind;

    fn custom_object(name: &str) -> TableSchema {
        builtin::object().with_extra_fields(
            name,
            [("category".to_string(), FieldSpec::scalar("string"))],
        )
    }

    #[test]
    fn builtins_resolve_through_both_halves() {
        let registry = SchemaRegistry::with_builtins();
        assert!(registry.is_builtin("item"));
        let image = registry.resolve("Image").unwrap();
        assert_eq!(image.group(), Group::View);
    }

    #[test]
    fn duplicate_of_builtin_name_is_fatal() {
        let registry = SchemaRegistry::with_builtins();
        let err = registry.register(builtin::object()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DuplicateSchema { .. }));
    }

    #[test]
    fn user_schema_resolves_before_freeze_only() {
        let registry = SchemaRegistry::with_builtins();
        registry.register(custom_object("category_object")).unwrap();
        assert!(registry.resolve("category_object").is_some());

        let err = registry.register(custom_object("too_late")).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RegistryFrozen { .. }));
    }
}
