//! 2D bounding boxes.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use fovea_common::{Result, error::Error};

use crate::registry::ValueLayout;
use crate::value::{Value, expect_struct, struct_member};

/// Coordinate convention of a [`BBox`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BBoxFormat {
    /// `[x_min, y_min, x_max, y_max]`
    Xyxy,
    /// `[x_min, y_min, width, height]`
    Xywh,
}

impl BBoxFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            BBoxFormat::Xyxy => "xyxy",
            BBoxFormat::Xywh => "xywh",
        }
    }
}

impl FromStr for BBoxFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<BBoxFormat> {
        match s {
            "xyxy" => Ok(BBoxFormat::Xyxy),
            "xywh" => Ok(BBoxFormat::Xywh),
            other => Err(Error::invalid_format(
                "bbox",
                format!("unknown bbox format '{other}'"),
            )),
        }
    }
}

/// A single 2D bounding box with its coordinate convention, normalization
/// flag and detection confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub coords: [f32; 4],
    pub format: BBoxFormat,
    pub is_normalized: bool,
    pub confidence: f32,
}

impl BBox {
    pub fn new(coords: [f32; 4], format: BBoxFormat, is_normalized: bool, confidence: f32) -> BBox {
        BBox {
            coords,
            format,
            is_normalized,
            confidence,
        }
    }

    /// A normalized `xywh` box with full confidence, the shape bare
    /// 4-number metadata annotations are interpreted as.
    pub fn from_xywh_list(coords: [f32; 4]) -> BBox {
        BBox::new(coords, BBoxFormat::Xywh, true, 1.0)
    }

    pub fn xyxy(coords: [f32; 4]) -> BBox {
        BBox::new(coords, BBoxFormat::Xyxy, false, 1.0)
    }

    pub fn xywh(coords: [f32; 4]) -> BBox {
        BBox::new(coords, BBoxFormat::Xywh, false, 1.0)
    }

    /// Converts the box to the `[x_min, y_min, x_max, y_max]` convention.
    pub fn to_xyxy(&self) -> BBox {
        let coords = match self.format {
            BBoxFormat::Xyxy => self.coords,
            BBoxFormat::Xywh => {
                let [x, y, w, h] = self.coords;
                [x, y, x + w, y + h]
            }
        };
        BBox {
            coords,
            format: BBoxFormat::Xyxy,
            ..*self
        }
    }

    /// Converts the box to the `[x_min, y_min, width, height]` convention.
    pub fn to_xywh(&self) -> BBox {
        let coords = match self.format {
            BBoxFormat::Xywh => self.coords,
            BBoxFormat::Xyxy => {
                let [x1, y1, x2, y2] = self.coords;
                [x1, y1, x2 - x1, y2 - y1]
            }
        };
        BBox {
            coords,
            format: BBoxFormat::Xywh,
            ..*self
        }
    }

    /// Scales pixel coordinates down to `[0, 1]` against an image of the
    /// given size. Returns the box unchanged when already normalized.
    pub fn normalize(&self, height: u32, width: u32) -> BBox {
        if self.is_normalized {
            return self.clone();
        }
        let (w, h) = (width as f32, height as f32);
        let [a, b, c, d] = self.coords;
        BBox {
            coords: [a / w, b / h, c / w, d / h],
            is_normalized: true,
            ..*self
        }
    }

    /// Scales normalized coordinates back up to pixels.
    pub fn denormalize(&self, height: u32, width: u32) -> BBox {
        if !self.is_normalized {
            return self.clone();
        }
        let (w, h) = (width as f32, height as f32);
        let [a, b, c, d] = self.coords;
        BBox {
            coords: [a * w, b * h, c * w, d * h],
            is_normalized: false,
            ..*self
        }
    }

    pub fn layout() -> ValueLayout {
        ValueLayout::structure(&[
            ("coords", ValueLayout::FixedSizeFloat(4)),
            ("format", ValueLayout::Utf8),
            ("is_normalized", ValueLayout::Bool),
            ("confidence", ValueLayout::Float32),
        ])
    }

    pub fn to_value(&self) -> Value {
        Value::Struct(BTreeMap::from([
            ("coords".to_string(), Value::from(self.coords)),
            ("format".to_string(), Value::from(self.format.as_str())),
            ("is_normalized".to_string(), Value::from(self.is_normalized)),
            ("confidence".to_string(), Value::from(self.confidence)),
        ]))
    }

    pub fn from_value(value: &Value) -> Result<BBox> {
        let fields = expect_struct(value, "bbox")?;
        let coords = struct_member(fields, "bbox", "coords")?
            .as_f32_array::<4>()
            .ok_or_else(|| Error::invalid_format("bbox", "coords must be 4 floats"))?;
        let format = struct_member(fields, "bbox", "format")?
            .as_str()
            .ok_or_else(|| Error::invalid_format("bbox", "format must be a string"))?
            .parse()?;
        let is_normalized = struct_member(fields, "bbox", "is_normalized")?
            .as_bool()
            .ok_or_else(|| Error::invalid_format("bbox", "is_normalized must be a bool"))?;
        let confidence = struct_member(fields, "bbox", "confidence")?
            .as_f32()
            .ok_or_else(|| Error::invalid_format("bbox", "confidence must be a float"))?;
        Ok(BBox {
            coords,
            format,
            is_normalized,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_coords_eq(a: [f32; 4], b: [f32; 4]) {
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-5, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn format_round_trip() {
        let bbox = BBox::xywh([10.0, 20.0, 50.0, 40.0]);
        let back = bbox.to_xyxy().to_xywh();
        assert_coords_eq(back.coords, bbox.coords);
        assert_eq!(back.format, BBoxFormat::Xywh);

        let bbox = BBox::xyxy([1.0, 1.0, 100.0, 100.0]);
        assert_coords_eq(bbox.to_xywh().coords, [1.0, 1.0, 99.0, 99.0]);
    }

    #[test]
    fn normalization_round_trip() {
        let bbox = BBox::xywh([64.0, 32.0, 128.0, 96.0]);
        let back = bbox.normalize(480, 640).denormalize(480, 640);
        assert_coords_eq(back.coords, bbox.coords);
        assert!(!back.is_normalized);
    }

    #[test]
    fn normalize_is_idempotent() {
        let bbox = BBox::from_xywh_list([0.1, 0.2, 0.3, 0.4]);
        assert_eq!(bbox.normalize(480, 640), bbox);
    }

    #[test]
    fn value_round_trip() {
        let bbox = BBox::new([0.0, 0.0, 100.0, 100.0], BBoxFormat::Xyxy, false, 0.9);
        assert_eq!(BBox::from_value(&bbox.to_value()).unwrap(), bbox);
    }

    #[test]
    fn rejects_bad_format_name() {
        assert!("xyzw".parse::<BBoxFormat>().is_err());
    }
}
