//! Axis-aligned 3D boxes with a yaw heading.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fovea_common::{Result, error::Error};

use crate::registry::ValueLayout;
use crate::value::{Value, expect_struct, struct_member};

/// A 3D box: center position, extents and heading angle (radians around
/// the up axis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BBox3D {
    pub position: [f32; 3],
    pub size: [f32; 3],
    pub heading: f32,
}

impl BBox3D {
    pub fn new(position: [f32; 3], size: [f32; 3], heading: f32) -> BBox3D {
        BBox3D {
            position,
            size,
            heading,
        }
    }

    pub fn layout() -> ValueLayout {
        ValueLayout::structure(&[
            ("position", ValueLayout::FixedSizeFloat(3)),
            ("size", ValueLayout::FixedSizeFloat(3)),
            ("heading", ValueLayout::Float32),
        ])
    }

    pub fn to_value(&self) -> Value {
        Value::Struct(BTreeMap::from([
            ("position".to_string(), Value::from(self.position)),
            ("size".to_string(), Value::from(self.size)),
            ("heading".to_string(), Value::from(self.heading)),
        ]))
    }

    pub fn from_value(value: &Value) -> Result<BBox3D> {
        let fields = expect_struct(value, "bbox3d")?;
        let position = struct_member(fields, "bbox3d", "position")?
            .as_f32_array::<3>()
            .ok_or_else(|| Error::invalid_format("bbox3d", "position must be 3 floats"))?;
        let size = struct_member(fields, "bbox3d", "size")?
            .as_f32_array::<3>()
            .ok_or_else(|| Error::invalid_format("bbox3d", "size must be 3 floats"))?;
        let heading = struct_member(fields, "bbox3d", "heading")?
            .as_f32()
            .ok_or_else(|| Error::invalid_format("bbox3d", "heading must be a float"))?;
        Ok(BBox3D {
            position,
            size,
            heading,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_round_trip() {
        let bbox = BBox3D::new([1.0, 2.0, 3.0], [4.0, 5.0, 6.0], 0.5);
        assert_eq!(BBox3D::from_value(&bbox.to_value()).unwrap(), bbox);
    }
}
