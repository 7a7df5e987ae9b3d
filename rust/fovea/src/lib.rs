//! `fovea` is a typed, columnar dataset store for labeled computer-vision
//! data.
//!
//! A dataset is a collection of related tables (items, views, objects,
//! tracklets, embeddings) derived from a single declared dataset-item
//! shape, persisted as columnar tables beside JSON sideband documents,
//! and read back as assembled cross-table dataset items.
//!
//! ```ignore
//! let shape = ItemShape::builder()
//!     .attribute("metadata", "string")
//!     .table("image", "image")
//!     .table_list("objects", "object")
//!     .build()?;
//! let dataset = DatasetBuilder::new(source, target, shape, "birds", "")?
//!     .build(BuildMode::Create)?;
//! let items = dataset.get_dataset_items(0, 20, None)?;
//! ```

pub mod build;
pub mod dataset;
pub mod features;
pub mod info;
pub mod item;
pub mod media;
pub mod preview;
pub mod select;
pub mod stats;

pub use build::{BuildMode, DatasetBuilder};
pub use dataset::Dataset;
pub use features::{FeaturesValues, FieldValues};
pub use info::DatasetInfo;
pub use item::{DatasetItem, RelationValue};
pub use media::MediaUrl;
pub use preview::{PreviewConfig, SequenceEncoder, generate_previews};
pub use select::ReadSelection;
pub use stats::{DatasetStat, StatType};

pub use fovea_schema::{
    Cardinality, DatasetSchema, Group, ItemShape, ItemShapeBuilder, TableSchema,
    TableSchemaBuilder,
};
pub use fovea_store::{Connection, CreateMode, Predicate};
pub use fovea_types::{Record, Value};
