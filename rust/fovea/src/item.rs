//! Assembled dataset items.

use std::collections::BTreeMap;

use fovea_schema::{ItemTemplate, RelationKind};
use fovea_types::{Record, Value};

/// Materialization of one related table on a dataset item: a single
/// optional row for one-to-one relations, a list for one-to-many.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationValue {
    One(Option<Record>),
    Many(Vec<Record>),
}

/// The reassembled cross-table record associated with one item id,
/// instantiated against the dataset's item template (or a projected
/// sub-shape of it).
///
/// Missing one-to-many relations materialize as empty lists, missing
/// one-to-one relations as absent rows. The id is always present.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetItem {
    id: String,
    attributes: Record,
    relations: BTreeMap<String, RelationValue>,
}

impl DatasetItem {
    /// Instantiates an empty item with the template's defaults.
    pub(crate) fn from_template(template: &ItemTemplate, id: &str) -> DatasetItem {
        let relations = template
            .relations()
            .iter()
            .map(|(table, kind)| {
                let value = match kind {
                    RelationKind::One => RelationValue::One(None),
                    RelationKind::Many => RelationValue::Many(Vec::new()),
                };
                (table.clone(), value)
            })
            .collect();
        DatasetItem {
            id: id.to_string(),
            attributes: Record::new(),
            relations,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Item-table attributes (split and the user-declared fields). Empty
    /// when the item table was not part of the selection.
    pub fn attributes(&self) -> &Record {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub(crate) fn set_attributes(&mut self, mut row: Record) {
        row.remove("id");
        self.attributes = row;
    }

    pub fn relation(&self, table: &str) -> Option<&RelationValue> {
        self.relations.get(table)
    }

    /// The single row of a one-to-one relation, if materialized.
    pub fn one(&self, table: &str) -> Option<&Record> {
        match self.relations.get(table)? {
            RelationValue::One(row) => row.as_ref(),
            RelationValue::Many(_) => None,
        }
    }

    /// The rows of a one-to-many relation (empty when none matched).
    pub fn many(&self, table: &str) -> &[Record] {
        match self.relations.get(table) {
            Some(RelationValue::Many(rows)) => rows,
            _ => &[],
        }
    }

    pub fn relations(&self) -> &BTreeMap<String, RelationValue> {
        &self.relations
    }

    pub(crate) fn push_row(&mut self, table: &str, row: Record) {
        match self.relations.get_mut(table) {
            Some(RelationValue::Many(rows)) => rows.push(row),
            Some(RelationValue::One(slot)) => *slot = Some(row),
            None => {}
        }
    }

    /// Number of materialized relation rows.
    pub fn num_relation_rows(&self) -> usize {
        self.relations
            .values()
            .map(|value| match value {
                RelationValue::One(row) => usize::from(row.is_some()),
                RelationValue::Many(rows) => rows.len(),
            })
            .sum()
    }

    /// The generic `{table -> value}` JSON form.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("id".to_string(), serde_json::Value::String(self.id.clone()));
        for (name, value) in self.attributes.iter() {
            map.insert(name.clone(), value.to_json());
        }
        for (table, value) in &self.relations {
            let json = match value {
                RelationValue::One(None) => serde_json::Value::Null,
                RelationValue::One(Some(row)) => row.to_json(),
                RelationValue::Many(rows) => {
                    serde_json::Value::Array(rows.iter().map(Record::to_json).collect())
                }
            };
            map.insert(table.clone(), json);
        }
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fovea_schema::{DatasetSchema, ItemShape};

    fn template() -> ItemTemplate {
        let shape = ItemShape::builder()
            .table("image", "image")
            .table_list("objects", "object")
            .build()
            .unwrap();
        let schema = DatasetSchema::from_item_shape(&shape).unwrap();
        ItemTemplate::new(&schema).unwrap()
    }

    #[test]
    fn defaults_follow_cardinality() {
        let item = DatasetItem::from_template(&template(), "item_0");
        assert_eq!(item.id(), "item_0");
        assert_eq!(item.one("image"), None);
        assert!(item.many("objects").is_empty());
        assert_eq!(item.num_relation_rows(), 0);
    }

    #[test]
    fn rows_accumulate_by_kind() {
        let mut item = DatasetItem::from_template(&template(), "item_0");
        item.push_row("image", Record::new().with("id", "view_0"));
        item.push_row("objects", Record::new().with("id", "obj_0"));
        item.push_row("objects", Record::new().with("id", "obj_1"));
        assert_eq!(item.one("image").and_then(Record::id), Some("view_0"));
        assert_eq!(item.many("objects").len(), 2);
        assert_eq!(item.num_relation_rows(), 3);
    }

    #[test]
    fn json_form_is_table_keyed() {
        let mut item = DatasetItem::from_template(&template(), "item_0");
        item.set_attributes(Record::new().with("id", "item_0").with("split", "train"));
        item.push_row("objects", Record::new().with("id", "obj_0"));
        let json = item.to_json();
        assert_eq!(json["id"], "item_0");
        assert_eq!(json["split"], "train");
        assert!(json["image"].is_null());
        assert_eq!(json["objects"].as_array().unwrap().len(), 1);
    }
}
