//! Table schemas, the schema registry and the dataset schema.
//!
//! A dataset is declared through a single [`ItemShape`](item_shape::ItemShape);
//! from it this crate derives the multi-table [`DatasetSchema`], the set of
//! table schemas plus the pairwise relation cardinalities between the item
//! table and every other table, and serializes it to and from the
//! `schema.json` sideband document.

pub mod builtin;
pub mod dataset_schema;
pub mod item_shape;
pub mod registry;
pub mod schema;
pub mod template;

pub use dataset_schema::{Cardinality, DatasetSchema};
pub use item_shape::{ItemShape, ItemShapeBuilder};
pub use schema::{FieldSpec, Group, TableSchema, TableSchemaBuilder};
pub use template::{ItemTemplate, RelationKind};
