//! The built-in table schemas.
//!
//! One authoritative hierarchy: `item`; the view schemas `image`,
//! `video`, `sequence_frame`, `point_cloud`; the annotation schemas
//! `object`, `track_object`, `tracklet`; and `embedding`. Optional
//! geometry (bbox/mask) and optional temporal bounds are flattened into
//! nullable fields of the base schemas rather than modeled as separate
//! subclasses; the serialized concrete name still records what a user
//! extension calls itself.

use fovea_common::{Result, error::Error};

use crate::schema::{FieldSpec, Group, TableSchema};

fn fields(specs: &[(&str, &str, bool)]) -> Vec<(String, FieldSpec)> {
    specs
        .iter()
        .map(|(name, type_name, collection)| {
            (
                name.to_string(),
                if *collection {
                    FieldSpec::list(*type_name)
                } else {
                    FieldSpec::scalar(*type_name)
                },
            )
        })
        .collect()
}

/// The unit of annotation. Every dataset has exactly one item table.
pub fn item() -> TableSchema {
    TableSchema::new(
        "item",
        "item",
        Group::Item,
        fields(&[("id", "string", false), ("split", "string", false)]),
    )
}

pub fn image() -> TableSchema {
    TableSchema::new(
        "image",
        "image",
        Group::View,
        fields(&[
            ("id", "string", false),
            ("item_id", "string", false),
            ("url", "string", false),
            ("width", "integer", false),
            ("height", "integer", false),
            ("format", "string", false),
        ]),
    )
}

pub fn video() -> TableSchema {
    TableSchema::new(
        "video",
        "video",
        Group::View,
        fields(&[
            ("id", "string", false),
            ("item_id", "string", false),
            ("url", "string", false),
            ("num_frames", "integer", false),
            ("fps", "floating", false),
            ("width", "integer", false),
            ("height", "integer", false),
            ("format", "string", false),
            ("duration", "floating", false),
        ]),
    )
}

/// A single frame of a sequence; extends `image` with its position in
/// the sequence.
pub fn sequence_frame() -> TableSchema {
    image().with_extra_fields(
        "sequence_frame",
        fields(&[
            ("sequence_id", "string", false),
            ("timestamp", "floating", false),
            ("frame_index", "integer", false),
        ]),
    )
    .rebased("sequence_frame")
}

pub fn point_cloud() -> TableSchema {
    TableSchema::new(
        "point_cloud",
        "point_cloud",
        Group::View,
        fields(&[
            ("id", "string", false),
            ("item_id", "string", false),
            ("url", "string", false),
        ]),
    )
}

/// An annotation attached to one item through one view. Bounding box and
/// mask are both optional.
pub fn object() -> TableSchema {
    TableSchema::new(
        "object",
        "object",
        Group::Object,
        fields(&[
            ("id", "string", false),
            ("item_id", "string", false),
            ("view_id", "string", false),
            ("bbox", "bbox", false),
            ("mask", "compressed_rle", false),
        ]),
    )
}

/// An object that belongs to a tracklet.
pub fn track_object() -> TableSchema {
    object()
        .with_extra_fields(
            "track_object",
            fields(&[
                ("tracklet_id", "string", false),
                ("is_key", "boolean", false),
                ("frame_index", "integer", false),
            ]),
        )
        .rebased("track_object")
}

/// A temporal span within a track. Start/end may be given in timestep
/// units, timestamp units, or both.
pub fn tracklet() -> TableSchema {
    TableSchema::new(
        "tracklet",
        "tracklet",
        Group::Object,
        fields(&[
            ("id", "string", false),
            ("item_id", "string", false),
            ("track_id", "string", false),
            ("start_timestep", "integer", false),
            ("end_timestep", "integer", false),
            ("start_timestamp", "floating", false),
            ("end_timestamp", "floating", false),
        ]),
    )
}

/// A binary-valued vector attached to an item, optionally through a view.
pub fn embedding() -> TableSchema {
    TableSchema::new(
        "embedding",
        "embedding",
        Group::Embedding,
        fields(&[
            ("id", "string", false),
            ("item_id", "string", false),
            ("view_id", "string", false),
            ("vector", "bytes", false),
        ]),
    )
}

/// All built-in schemas, in registration order.
pub fn all() -> Vec<TableSchema> {
    vec![
        item(),
        image(),
        video(),
        sequence_frame(),
        point_cloud(),
        object(),
        track_object(),
        tracklet(),
        embedding(),
    ]
}

/// Group of a built-in base schema name. Deserialization resolves the
/// group of every table through its registered ancestor; an ancestor
/// outside this catalog has no group and is rejected.
pub fn base_group(base_name: &str) -> Result<Group> {
    match base_name {
        "item" => Ok(Group::Item),
        "image" | "video" | "sequence_frame" | "point_cloud" => Ok(Group::View),
        "object" | "track_object" | "tracklet" => Ok(Group::Object),
        "embedding" => Ok(Group::Embedding),
        other => Err(Error::invalid_arg(
            "base_schema",
            format!("'{other}' does not derive from item, a view, an object or an embedding"),
        )),
    }
}

impl TableSchema {
    /// Re-declares a derived built-in under its own base name, so that
    /// further user extensions of e.g. `sequence_frame` record the right
    /// ancestor.
    fn rebased(self, base: &str) -> TableSchema {
        TableSchema::new(
            self.concrete_name(),
            base,
            self.group(),
            self.fields().clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_frame_extends_image() {
        let schema = sequence_frame();
        assert_eq!(schema.base_name(), "sequence_frame");
        assert_eq!(schema.group(), Group::View);
        assert!(schema.has_field("url"));
        assert!(schema.has_field("sequence_id"));
        assert!(schema.has_field("frame_index"));
    }

    #[test]
    fn track_object_extends_object() {
        let schema = track_object();
        assert!(schema.has_field("bbox"));
        assert!(schema.has_field("tracklet_id"));
        assert_eq!(schema.group(), Group::Object);
    }

    #[test]
    fn groups_classify_by_base() {
        assert_eq!(base_group("image").unwrap(), Group::View);
        assert_eq!(base_group("tracklet").unwrap(), Group::Object);
        assert_eq!(base_group("embedding").unwrap(), Group::Embedding);
        assert!(base_group("mystery").is_err());
    }
}
