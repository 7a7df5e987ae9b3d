//! The user-declared dataset-item shape.
//!
//! A dataset is declared as a single composite shape whose fields are
//! either primitive-typed item attributes, schema-typed single relations,
//! or lists of a schema type. The shape is the sole input to dataset
//! schema derivation.

use fovea_common::{Result, error::Error, name::canonical_name};

/// One declared field of the dataset-item shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeField {
    /// An item attribute of a primitive (registered value) type.
    Attribute(String),
    /// A single related row of a registered schema type.
    Table(String),
    /// A list of related rows of a registered schema type.
    TableList(String),
}

/// The declared dataset-item shape: an ordered list of named fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemShape {
    fields: Vec<(String, ShapeField)>,
}

impl ItemShape {
    pub fn builder() -> ItemShapeBuilder {
        ItemShapeBuilder { fields: Vec::new() }
    }

    pub fn fields(&self) -> &[(String, ShapeField)] {
        &self.fields
    }
}

/// Builder for [`ItemShape`]; validates every referenced type and schema
/// name on `build`.
pub struct ItemShapeBuilder {
    fields: Vec<(String, ShapeField)>,
}

impl ItemShapeBuilder {
    /// Declares a primitive-typed item attribute.
    pub fn attribute(mut self, name: &str, type_name: &str) -> ItemShapeBuilder {
        self.fields.push((
            name.to_string(),
            ShapeField::Attribute(canonical_name(type_name)),
        ));
        self
    }

    /// Declares a one-to-one related table of the given schema.
    pub fn table(mut self, name: &str, schema_name: &str) -> ItemShapeBuilder {
        self.fields.push((
            name.to_string(),
            ShapeField::Table(canonical_name(schema_name)),
        ));
        self
    }

    /// Declares a one-to-many related table of the given schema.
    pub fn table_list(mut self, name: &str, schema_name: &str) -> ItemShapeBuilder {
        self.fields.push((
            name.to_string(),
            ShapeField::TableList(canonical_name(schema_name)),
        ));
        self
    }

    pub fn build(self) -> Result<ItemShape> {
        let mut seen: Vec<String> = Vec::new();
        for (name, field) in &self.fields {
            let canonical = canonical_name(name);
            if canonical.is_empty() {
                return Err(Error::invalid_arg("shape", "field names must be non-empty"));
            }
            if canonical == "item" {
                return Err(Error::invalid_arg(
                    "shape",
                    "'item' is reserved for the item table",
                ));
            }
            if seen.contains(&canonical) {
                return Err(Error::invalid_arg(
                    "shape",
                    format!("duplicate field '{canonical}'"),
                ));
            }
            seen.push(canonical);
            match field {
                ShapeField::Attribute(type_name) => {
                    if crate::registry::global().is_registered(type_name) {
                        // A schema name in attribute position means the
                        // caller wanted a relation, not an attribute.
                        return Err(Error::invalid_collection(
                            name.clone(),
                            format!("'{type_name}' is a schema; declare it as a table field"),
                        ));
                    }
                    if !fovea_types::registry::global().is_registered(type_name) {
                        return Err(Error::invalid_collection(
                            name.clone(),
                            format!("'{type_name}' is neither a primitive nor a registered schema"),
                        ));
                    }
                }
                ShapeField::Table(schema_name) | ShapeField::TableList(schema_name) => {
                    if !crate::registry::global().is_registered(schema_name) {
                        return Err(Error::schema_not_registered(schema_name));
                    }
                }
            }
        }
        Ok(ItemShape {
            fields: self.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fovea_common::error::ErrorKind;

    #[test]
    fn declares_attributes_and_relations() {
        let shape = ItemShape::builder()
            .attribute("metadata", "string")
            .table("image", "image")
            .table_list("objects", "object")
            .build()
            .unwrap();
        assert_eq!(shape.fields().len(), 3);
        assert_eq!(
            shape.fields()[2].1,
            ShapeField::TableList("object".to_string())
        );
    }

    #[test]
    fn rejects_unknown_schema() {
        let err = ItemShape::builder()
            .table("lidar", "no_such_schema")
            .build()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::SchemaNotRegistered { .. }));
    }

    #[test]
    fn rejects_unknown_attribute_type() {
        let err = ItemShape::builder()
            .attribute("weird", "quaternion_soup")
            .build()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidCollection { .. }));
    }

    #[test]
    fn rejects_schema_in_attribute_position() {
        let err = ItemShape::builder()
            .attribute("image", "image")
            .build()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidCollection { .. }));
    }

    #[test]
    fn rejects_duplicates_and_reserved_names() {
        assert!(
            ItemShape::builder()
                .table("views", "image")
                .table("Views", "video")
                .build()
                .is_err()
        );
        assert!(
            ItemShape::builder()
                .table("item", "image")
                .build()
                .is_err()
        );
    }
}
