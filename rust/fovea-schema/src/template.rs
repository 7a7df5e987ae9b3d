//! The custom dataset-item shape derived from a dataset schema.
//!
//! Built once per dataset: one relation slot per non-item table (a list
//! when the relation is one-to-many, a single optional row otherwise)
//! plus every item-table attribute. A projection keeps only the id field
//! and the explicitly selected tables.

use std::collections::{BTreeMap, BTreeSet};

use fovea_common::{Result, name::canonical_name};

use crate::dataset_schema::{Cardinality, DatasetSchema};
use crate::schema::FieldSpec;

/// How a related table materializes on an assembled dataset item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Exactly one row or absent (`one_to_one`).
    One,
    /// A possibly empty list of rows (`one_to_many`).
    Many,
}

/// Assembly template for dataset items of one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemTemplate {
    item_table: String,
    item_selected: bool,
    attributes: BTreeMap<String, FieldSpec>,
    relations: BTreeMap<String, RelationKind>,
}

impl ItemTemplate {
    /// Builds the template from the dataset schema.
    pub fn new(schema: &DatasetSchema) -> Result<ItemTemplate> {
        let item_table = schema.item_table()?.to_string();
        let attributes = schema
            .table(&item_table)?
            .fields()
            .iter()
            .filter(|(name, _)| name.as_str() != "id")
            .map(|(name, spec)| (name.clone(), spec.clone()))
            .collect();
        let mut relations = BTreeMap::new();
        for table in schema.related_tables() {
            let kind = match schema.relation(&item_table, table) {
                Some(Cardinality::OneToMany) | Some(Cardinality::ManyToMany) => RelationKind::Many,
                _ => RelationKind::One,
            };
            relations.insert(table.to_string(), kind);
        }
        Ok(ItemTemplate {
            item_table,
            item_selected: true,
            attributes,
            relations,
        })
    }

    /// Projects the template down to a sub-shape: the id field plus the
    /// selected tables. Item attributes survive only when the item table
    /// itself is selected.
    pub fn project(&self, tables: &BTreeSet<String>) -> ItemTemplate {
        let keep_item = tables.contains(&self.item_table);
        ItemTemplate {
            item_table: self.item_table.clone(),
            item_selected: keep_item,
            attributes: if keep_item {
                self.attributes.clone()
            } else {
                BTreeMap::new()
            },
            relations: self
                .relations
                .iter()
                .filter(|(name, _)| tables.contains(*name))
                .map(|(name, kind)| (name.clone(), *kind))
                .collect(),
        }
    }

    pub fn item_table(&self) -> &str {
        &self.item_table
    }

    /// Whether the item table's own attributes are part of this shape.
    pub fn item_selected(&self) -> bool {
        self.item_selected
    }

    pub fn attributes(&self) -> &BTreeMap<String, FieldSpec> {
        &self.attributes
    }

    pub fn relations(&self) -> &BTreeMap<String, RelationKind> {
        &self.relations
    }

    pub fn relation_kind(&self, table: &str) -> Option<RelationKind> {
        self.relations.get(&canonical_name(table)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item_shape::ItemShape;

    fn template() -> ItemTemplate {
        let shape = ItemShape::builder()
            .attribute("metadata", "string")
            .table("image", "image")
            .table_list("objects", "object")
            .build()
            .unwrap();
        let schema = DatasetSchema::from_item_shape(&shape).unwrap();
        ItemTemplate::new(&schema).unwrap()
    }

    #[test]
    fn relations_follow_cardinality() {
        let template = template();
        assert_eq!(template.relation_kind("image"), Some(RelationKind::One));
        assert_eq!(template.relation_kind("objects"), Some(RelationKind::Many));
        assert!(template.attributes().contains_key("metadata"));
        assert!(template.attributes().contains_key("split"));
        assert!(!template.attributes().contains_key("id"));
    }

    #[test]
    fn projection_keeps_id_and_selected_tables() {
        let template = template();
        let projected = template.project(&BTreeSet::from(["image".to_string()]));
        assert_eq!(projected.relation_kind("image"), Some(RelationKind::One));
        assert_eq!(projected.relation_kind("objects"), None);
        assert!(!projected.item_selected());
        assert!(projected.attributes().is_empty());
    }
}
