//! Table schema descriptors.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use fovea_common::{Result, error::Error, name::canonical_name};

/// Partition of table names used for read selection: every table belongs
/// to exactly one group, determined by its base schema lineage. Tracklets
/// and track-objects classify under `Object`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    Item,
    View,
    Object,
    Embedding,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Group::Item => "item",
            Group::View => "view",
            Group::Object => "object",
            Group::Embedding => "embedding",
        };
        f.write_str(name)
    }
}

/// Declared type of a single table field: a canonical type name plus a
/// collection flag. Collections are flat lists of a registered type;
/// nested collections are not expressible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub type_name: String,
    pub collection: bool,
}

impl FieldSpec {
    pub fn scalar(type_name: impl Into<String>) -> FieldSpec {
        FieldSpec {
            type_name: canonical_name(&type_name.into()),
            collection: false,
        }
    }

    pub fn list(type_name: impl Into<String>) -> FieldSpec {
        FieldSpec {
            type_name: canonical_name(&type_name.into()),
            collection: true,
        }
    }
}

/// Schema of one table: a concrete name, the registered ancestor it
/// derives from, its group, and the declared fields.
///
/// A concrete schema equals its base when the table is used as-is; user
/// extensions keep the base name and add extra fields under their own
/// concrete name.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    concrete_name: String,
    base_name: String,
    group: Group,
    fields: BTreeMap<String, FieldSpec>,
}

impl TableSchema {
    /// Creates a schema descriptor. Names are canonicalized; field types
    /// are validated where the schema is consumed (shape derivation and
    /// document deserialization), not here.
    pub fn new(
        concrete_name: &str,
        base_name: &str,
        group: Group,
        fields: impl IntoIterator<Item = (String, FieldSpec)>,
    ) -> TableSchema {
        TableSchema {
            concrete_name: canonical_name(concrete_name),
            base_name: canonical_name(base_name),
            group,
            fields: fields
                .into_iter()
                .map(|(name, spec)| (canonical_name(&name), spec))
                .collect(),
        }
    }

    pub fn concrete_name(&self) -> &str {
        &self.concrete_name
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn group(&self) -> Group {
        self.group
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldSpec> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Returns a copy extended with extra fields under a new concrete
    /// name. Existing fields keep their declared types.
    pub fn with_extra_fields(
        &self,
        concrete_name: &str,
        extras: impl IntoIterator<Item = (String, FieldSpec)>,
    ) -> TableSchema {
        let mut fields = self.fields.clone();
        for (name, spec) in extras {
            fields.entry(canonical_name(&name)).or_insert(spec);
        }
        TableSchema {
            concrete_name: canonical_name(concrete_name),
            base_name: self.base_name.clone(),
            group: self.group,
            fields,
        }
    }
}

/// Builder for user schema extensions: starts from a registered base
/// schema and adds fields.
///
/// ```ignore
/// let part = TableSchemaBuilder::new("part_object", "object")
///     .field("part_label", "string")
///     .build()?;
/// fovea_schema::registry::register_schema(part)?;
/// ```
pub struct TableSchemaBuilder {
    concrete_name: String,
    base_name: String,
    fields: Vec<(String, FieldSpec)>,
}

impl TableSchemaBuilder {
    pub fn new(concrete_name: &str, base_name: &str) -> TableSchemaBuilder {
        TableSchemaBuilder {
            concrete_name: concrete_name.to_string(),
            base_name: base_name.to_string(),
            fields: Vec::new(),
        }
    }

    /// Adds a scalar field of a registered type.
    pub fn field(mut self, name: &str, type_name: &str) -> TableSchemaBuilder {
        self.fields
            .push((name.to_string(), FieldSpec::scalar(type_name)));
        self
    }

    /// Adds a list field of a registered type.
    pub fn collection_field(mut self, name: &str, type_name: &str) -> TableSchemaBuilder {
        self.fields
            .push((name.to_string(), FieldSpec::list(type_name)));
        self
    }

    /// Resolves the base schema in the schema registry, validates the
    /// extra field types against the type registry, and produces the
    /// extended schema.
    pub fn build(self) -> Result<TableSchema> {
        let base = crate::registry::global()
            .resolve(&self.base_name)
            .ok_or_else(|| Error::schema_not_registered(&self.base_name))?;
        for (name, spec) in &self.fields {
            if !fovea_types::registry::global().is_registered(&spec.type_name) {
                return Err(Error::invalid_collection(
                    name.clone(),
                    format!("unknown type '{}'", spec.type_name),
                ));
            }
        }
        Ok(base.with_extra_fields(&self.concrete_name, self.fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_canonicalized() {
        let schema = TableSchema::new(
            "My Objects",
            "Object",
            Group::Object,
            [("Part Label".to_string(), FieldSpec::scalar("String"))],
        );
        assert_eq!(schema.concrete_name(), "my_objects");
        assert_eq!(schema.base_name(), "object");
        assert!(schema.has_field("part_label"));
        assert_eq!(schema.field("part_label").unwrap().type_name, "string");
    }

    #[test]
    fn extension_keeps_base_fields() {
        let base = TableSchema::new(
            "object",
            "object",
            Group::Object,
            [
                ("id".to_string(), FieldSpec::scalar("string")),
                ("bbox".to_string(), FieldSpec::scalar("bbox")),
            ],
        );
        let extended = base.with_extra_fields(
            "scored_object",
            [("score".to_string(), FieldSpec::scalar("floating"))],
        );
        assert_eq!(extended.concrete_name(), "scored_object");
        assert_eq!(extended.base_name(), "object");
        assert!(extended.has_field("id"));
        assert!(extended.has_field("bbox"));
        assert!(extended.has_field("score"));
    }
}
