//! The dataset schema: table set, relation cardinalities, and the
//! `schema.json` document form.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use fovea_common::{Result, error::Error, name::canonical_name};

use crate::builtin;
use crate::item_shape::{ItemShape, ShapeField};
use crate::registry::SchemaRegistry;
use crate::schema::{FieldSpec, Group, TableSchema};

/// Relation cardinality between two tables.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    /// The same relation seen from the other side.
    pub fn inverse(&self) -> Cardinality {
        match self {
            Cardinality::OneToOne => Cardinality::OneToOne,
            Cardinality::OneToMany => Cardinality::ManyToOne,
            Cardinality::ManyToOne => Cardinality::OneToMany,
            Cardinality::ManyToMany => Cardinality::ManyToMany,
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cardinality::OneToOne => "one_to_one",
            Cardinality::OneToMany => "one_to_many",
            Cardinality::ManyToOne => "many_to_one",
            Cardinality::ManyToMany => "many_to_many",
        };
        f.write_str(name)
    }
}

/// The derived multi-table schema of one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSchema {
    schemas: BTreeMap<String, TableSchema>,
    relations: BTreeMap<String, BTreeMap<String, Cardinality>>,
}

/// Canonical name of the item table.
pub const ITEM_TABLE: &str = "item";

impl DatasetSchema {
    /// Derives the dataset schema from a declared dataset-item shape.
    ///
    /// List-typed schema fields become `one_to_many` tables, scalar
    /// schema fields become `one_to_one` tables, and every remaining
    /// field is added to the item table as a typed attribute.
    pub fn from_item_shape(shape: &ItemShape) -> Result<DatasetSchema> {
        Self::from_item_shape_with(shape, crate::registry::global())
    }

    pub(crate) fn from_item_shape_with(
        shape: &ItemShape,
        registry: &SchemaRegistry,
    ) -> Result<DatasetSchema> {
        let mut schemas: BTreeMap<String, TableSchema> = BTreeMap::new();
        let mut relations: BTreeMap<String, BTreeMap<String, Cardinality>> = BTreeMap::new();
        let mut attributes: Vec<(String, FieldSpec)> = Vec::new();

        for (field_name, field) in shape.fields() {
            let table_name = canonical_name(field_name);
            match field {
                ShapeField::Attribute(type_name) => {
                    attributes.push((table_name, FieldSpec::scalar(type_name.as_str())));
                }
                ShapeField::Table(schema_name) => {
                    let schema = registry
                        .resolve(schema_name)
                        .ok_or_else(|| Error::schema_not_registered(schema_name))?;
                    schemas.insert(table_name.clone(), schema);
                    record_relation(
                        &mut relations,
                        ITEM_TABLE,
                        &table_name,
                        Cardinality::OneToOne,
                    );
                }
                ShapeField::TableList(schema_name) => {
                    let schema = registry
                        .resolve(schema_name)
                        .ok_or_else(|| Error::schema_not_registered(schema_name))?;
                    schemas.insert(table_name.clone(), schema);
                    record_relation(
                        &mut relations,
                        ITEM_TABLE,
                        &table_name,
                        Cardinality::OneToMany,
                    );
                }
            }
        }

        let item = builtin::item().with_extra_fields(ITEM_TABLE, attributes);
        schemas.insert(ITEM_TABLE.to_string(), item);

        Ok(DatasetSchema { schemas, relations })
    }

    /// Name of the unique item table. Fails when the schema holds none.
    pub fn item_table(&self) -> Result<&str> {
        let mut item_tables = self
            .schemas
            .iter()
            .filter(|(_, schema)| schema.group() == Group::Item)
            .map(|(name, _)| name.as_str());
        let first = item_tables.next().ok_or_else(Error::schema_missing_item)?;
        if item_tables.next().is_some() {
            return Err(Error::invalid_arg(
                "schema",
                "dataset schema holds more than one item table",
            ));
        }
        Ok(first)
    }

    pub fn table(&self, name: &str) -> Result<&TableSchema> {
        let key = canonical_name(name);
        self.schemas
            .get(&key)
            .ok_or_else(|| Error::table_not_found(key))
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.schemas.contains_key(&canonical_name(name))
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &TableSchema)> {
        self.schemas
            .iter()
            .map(|(name, schema)| (name.as_str(), schema))
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Cardinality of the relation from `from` to `to`, if declared.
    pub fn relation(&self, from: &str, to: &str) -> Option<Cardinality> {
        self.relations
            .get(&canonical_name(from))?
            .get(&canonical_name(to))
            .copied()
    }

    pub fn group_of(&self, table: &str) -> Result<Group> {
        Ok(self.table(table)?.group())
    }

    /// Table names classified under the given group, in name order.
    pub fn tables_in_group(&self, group: Group) -> Vec<&str> {
        self.schemas
            .iter()
            .filter(|(_, schema)| schema.group() == group)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Non-item table names, in name order.
    pub fn related_tables(&self) -> Vec<&str> {
        self.schemas
            .iter()
            .filter(|(_, schema)| schema.group() != Group::Item)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Serializes into the document form. Fails unless the schema holds
    /// exactly one item table, and validates every field type.
    pub fn to_document(&self) -> Result<SchemaDocument> {
        self.item_table()?;
        let mut tables = BTreeMap::new();
        for (name, schema) in &self.schemas {
            let mut fields = BTreeMap::new();
            for (field_name, spec) in schema.fields() {
                if !fovea_types::registry::global().is_registered(&spec.type_name) {
                    return Err(Error::schema_not_registered(&spec.type_name));
                }
                fields.insert(
                    field_name.clone(),
                    FieldDocument {
                        type_name: spec.type_name.clone(),
                        collection: spec.collection,
                    },
                );
            }
            tables.insert(
                name.clone(),
                TableDocument {
                    schema: schema.concrete_name().to_string(),
                    base_schema: schema.base_name().to_string(),
                    fields,
                },
            );
        }
        Ok(SchemaDocument {
            schemas: tables,
            relations: self.relations.clone(),
        })
    }

    /// Reconstructs a dataset schema from its document form.
    ///
    /// The concrete schema name is looked up in the registry (public
    /// half first, built-ins as fallback); declared fields beyond the
    /// registered set are reattached as extras, preserving the
    /// serialized concrete name.
    pub fn from_document(document: &SchemaDocument) -> Result<DatasetSchema> {
        Self::from_document_with(document, crate::registry::global())
    }

    pub(crate) fn from_document_with(
        document: &SchemaDocument,
        registry: &SchemaRegistry,
    ) -> Result<DatasetSchema> {
        let mut schemas = BTreeMap::new();
        for (table_name, table_doc) in &document.schemas {
            let base = registry
                .resolve(&table_doc.schema)
                .or_else(|| registry.resolve(&table_doc.base_schema))
                .ok_or_else(|| Error::schema_not_registered(&table_doc.schema))?;
            builtin::base_group(base.base_name())?;

            let mut extras: Vec<(String, FieldSpec)> = Vec::new();
            for (field_name, field_doc) in &table_doc.fields {
                if base.has_field(field_name) {
                    continue;
                }
                if !fovea_types::registry::global().is_registered(&field_doc.type_name) {
                    return Err(Error::schema_not_registered(&field_doc.type_name));
                }
                extras.push((
                    field_name.clone(),
                    FieldSpec {
                        type_name: canonical_name(&field_doc.type_name),
                        collection: field_doc.collection,
                    },
                ));
            }
            let schema = base.with_extra_fields(&table_doc.schema, extras);
            schemas.insert(canonical_name(table_name), schema);
        }

        let reconstructed = DatasetSchema {
            schemas,
            relations: document
                .relations
                .iter()
                .map(|(from, to_map)| {
                    (
                        canonical_name(from),
                        to_map
                            .iter()
                            .map(|(to, card)| (canonical_name(to), *card))
                            .collect(),
                    )
                })
                .collect(),
        };
        reconstructed.item_table()?;
        Ok(reconstructed)
    }

    /// Writes the document form as JSON to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let document = self.to_document()?;
        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| Error::invalid_format("schema.json", e.to_string()))?;
        std::fs::write(path, json).map_err(|e| Error::io(path.display().to_string(), e))?;
        Ok(())
    }

    /// Reads the document form from a JSON file.
    pub fn load(path: &Path) -> Result<DatasetSchema> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::io(path.display().to_string(), e))?;
        let document: SchemaDocument = serde_json::from_str(&json)
            .map_err(|e| Error::invalid_format("schema.json", e.to_string()))?;
        Self::from_document(&document)
    }
}

fn record_relation(
    relations: &mut BTreeMap<String, BTreeMap<String, Cardinality>>,
    item: &str,
    table: &str,
    cardinality: Cardinality,
) {
    relations
        .entry(item.to_string())
        .or_default()
        .insert(table.to_string(), cardinality);
    relations
        .entry(table.to_string())
        .or_default()
        .insert(item.to_string(), cardinality.inverse());
}

/// `schema.json` document: one entry per table plus the relation map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub schemas: BTreeMap<String, TableDocument>,
    pub relations: BTreeMap<String, BTreeMap<String, Cardinality>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDocument {
    pub schema: String,
    pub base_schema: String,
    pub fields: BTreeMap<String, FieldDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDocument {
    #[serde(rename = "type")]
    pub type_name: String,
    pub collection: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item_shape::ItemShape;

    fn image_and_objects() -> DatasetSchema {
        let shape = ItemShape::builder()
            .attribute("metadata", "string")
            .table("image", "image")
            .table_list("objects", "object")
            .build()
            .unwrap();
        DatasetSchema::from_item_shape(&shape).unwrap()
    }

    #[test]
    fn derivation_infers_cardinalities() {
        let schema = image_and_objects();
        assert_eq!(
            schema.relation("item", "objects"),
            Some(Cardinality::OneToMany)
        );
        assert_eq!(
            schema.relation("objects", "item"),
            Some(Cardinality::ManyToOne)
        );
        assert_eq!(
            schema.relation("item", "image"),
            Some(Cardinality::OneToOne)
        );
        assert_eq!(
            schema.relation("image", "item"),
            Some(Cardinality::OneToOne)
        );
    }

    #[test]
    fn derivation_adds_item_attributes() {
        let schema = image_and_objects();
        let item = schema.table("item").unwrap();
        assert!(item.has_field("id"));
        assert!(item.has_field("split"));
        assert_eq!(item.field("metadata").unwrap().type_name, "string");
    }

    #[test]
    fn groups_partition_tables() {
        let schema = image_and_objects();
        assert_eq!(schema.tables_in_group(Group::Item), vec!["item"]);
        assert_eq!(schema.tables_in_group(Group::View), vec!["image"]);
        assert_eq!(schema.tables_in_group(Group::Object), vec!["objects"]);
        assert!(schema.tables_in_group(Group::Embedding).is_empty());
    }

    #[test]
    fn document_round_trip_preserves_schema() {
        let schema = image_and_objects();
        let document = schema.to_document().unwrap();
        let back = DatasetSchema::from_document(&document).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn document_round_trip_through_json_text() {
        let schema = image_and_objects();
        let text = serde_json::to_string(&schema.to_document().unwrap()).unwrap();
        let document: SchemaDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(DatasetSchema::from_document(&document).unwrap(), schema);
    }

    #[test]
    fn cardinalities_serialize_snake_case() {
        let schema = image_and_objects();
        let text = serde_json::to_string(&schema.to_document().unwrap()).unwrap();
        assert!(text.contains("\"one_to_many\""));
        assert!(text.contains("\"many_to_one\""));
        assert!(text.contains("\"one_to_one\""));
    }

    #[test]
    fn missing_item_table_fails_serialization() {
        let mut schema = image_and_objects();
        schema.schemas.remove("item");
        let err = schema.to_document().unwrap_err();
        assert!(matches!(
            err.kind(),
            fovea_common::error::ErrorKind::SchemaMissingItem
        ));
    }

    #[test]
    fn unknown_concrete_schema_reconstructs_from_base_with_extras() {
        let schema = image_and_objects();
        let mut document = schema.to_document().unwrap();
        {
            let objects = document.schemas.get_mut("objects").unwrap();
            objects.schema = "scored_object".to_string();
            objects.fields.insert(
                "score".to_string(),
                FieldDocument {
                    type_name: "floating".to_string(),
                    collection: false,
                },
            );
        }
        let back = DatasetSchema::from_document(&document).unwrap();
        let objects = back.table("objects").unwrap();
        assert_eq!(objects.concrete_name(), "scored_object");
        assert_eq!(objects.base_name(), "object");
        assert!(objects.has_field("bbox"));
        assert_eq!(objects.field("score").unwrap().type_name, "floating");
    }

    #[test]
    fn unknown_base_schema_is_rejected() {
        let schema = image_and_objects();
        let mut document = schema.to_document().unwrap();
        {
            let objects = document.schemas.get_mut("objects").unwrap();
            objects.schema = "martian_object".to_string();
            objects.base_schema = "martian_object".to_string();
        }
        let err = DatasetSchema::from_document(&document).unwrap_err();
        assert!(matches!(
            err.kind(),
            fovea_common::error::ErrorKind::SchemaNotRegistered { .. }
        ));
    }

    #[test]
    fn unknown_table_lookup_is_distinct() {
        let schema = image_and_objects();
        let err = schema.table("lidar").unwrap_err();
        assert!(matches!(
            err.kind(),
            fovea_common::error::ErrorKind::TableNotFound { .. }
        ));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        let schema = image_and_objects();
        schema.save(&path).unwrap();
        assert_eq!(DatasetSchema::load(&path).unwrap(), schema);
    }
}
