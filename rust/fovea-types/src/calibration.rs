//! Camera calibration parameters for depth and multi-sensor datasets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fovea_common::{Result, error::Error};

use crate::registry::ValueLayout;
use crate::value::{Value, expect_struct, struct_member};

/// Sensor-plane placement of the optical center within the image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BaseIntrinsics {
    pub cx_offset_px: f32,
    pub cy_offset_px: f32,
    pub img_height_px: i64,
    pub img_width_px: i64,
}

/// Polynomial projection coefficients.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Intrinsics {
    pub c1: f32,
    pub c2: f32,
    pub c3: f32,
    pub c4: f32,
    pub pixel_aspect_ratio: f32,
}

/// Camera pose: position in metres, rotations in degrees.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Extrinsics {
    pub pos_x_m: f32,
    pub pos_y_m: f32,
    pub pos_z_m: f32,
    pub rot_x_deg: f32,
    pub rot_z1_deg: f32,
    pub rot_z2_deg: f32,
}

/// Full camera calibration: a camera model type plus base intrinsics,
/// projection intrinsics and extrinsics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CamCalibration {
    #[serde(rename = "type")]
    pub model: String,
    pub base_intrinsics: BaseIntrinsics,
    pub intrinsics: Intrinsics,
    pub extrinsics: Extrinsics,
}

impl CamCalibration {
    pub fn layout() -> ValueLayout {
        ValueLayout::structure(&[
            ("type", ValueLayout::Utf8),
            (
                "base_intrinsics",
                ValueLayout::structure(&[
                    ("cx_offset_px", ValueLayout::Float32),
                    ("cy_offset_px", ValueLayout::Float32),
                    ("img_height_px", ValueLayout::Int64),
                    ("img_width_px", ValueLayout::Int64),
                ]),
            ),
            (
                "intrinsics",
                ValueLayout::structure(&[
                    ("c1", ValueLayout::Float32),
                    ("c2", ValueLayout::Float32),
                    ("c3", ValueLayout::Float32),
                    ("c4", ValueLayout::Float32),
                    ("pixel_aspect_ratio", ValueLayout::Float32),
                ]),
            ),
            (
                "extrinsics",
                ValueLayout::structure(&[
                    ("pos_x_m", ValueLayout::Float32),
                    ("pos_y_m", ValueLayout::Float32),
                    ("pos_z_m", ValueLayout::Float32),
                    ("rot_x_deg", ValueLayout::Float32),
                    ("rot_z1_deg", ValueLayout::Float32),
                    ("rot_z2_deg", ValueLayout::Float32),
                ]),
            ),
        ])
    }

    pub fn to_value(&self) -> Value {
        Value::Struct(BTreeMap::from([
            ("type".to_string(), Value::from(self.model.as_str())),
            (
                "base_intrinsics".to_string(),
                Value::Struct(BTreeMap::from([
                    (
                        "cx_offset_px".to_string(),
                        Value::from(self.base_intrinsics.cx_offset_px),
                    ),
                    (
                        "cy_offset_px".to_string(),
                        Value::from(self.base_intrinsics.cy_offset_px),
                    ),
                    (
                        "img_height_px".to_string(),
                        Value::Int(self.base_intrinsics.img_height_px),
                    ),
                    (
                        "img_width_px".to_string(),
                        Value::Int(self.base_intrinsics.img_width_px),
                    ),
                ])),
            ),
            (
                "intrinsics".to_string(),
                Value::Struct(BTreeMap::from([
                    ("c1".to_string(), Value::from(self.intrinsics.c1)),
                    ("c2".to_string(), Value::from(self.intrinsics.c2)),
                    ("c3".to_string(), Value::from(self.intrinsics.c3)),
                    ("c4".to_string(), Value::from(self.intrinsics.c4)),
                    (
                        "pixel_aspect_ratio".to_string(),
                        Value::from(self.intrinsics.pixel_aspect_ratio),
                    ),
                ])),
            ),
            (
                "extrinsics".to_string(),
                Value::Struct(BTreeMap::from([
                    ("pos_x_m".to_string(), Value::from(self.extrinsics.pos_x_m)),
                    ("pos_y_m".to_string(), Value::from(self.extrinsics.pos_y_m)),
                    ("pos_z_m".to_string(), Value::from(self.extrinsics.pos_z_m)),
                    ("rot_x_deg".to_string(), Value::from(self.extrinsics.rot_x_deg)),
                    (
                        "rot_z1_deg".to_string(),
                        Value::from(self.extrinsics.rot_z1_deg),
                    ),
                    (
                        "rot_z2_deg".to_string(),
                        Value::from(self.extrinsics.rot_z2_deg),
                    ),
                ])),
            ),
        ]))
    }

    pub fn from_value(value: &Value) -> Result<CamCalibration> {
        let fields = expect_struct(value, "cam_calibration")?;
        let model = struct_member(fields, "cam_calibration", "type")?
            .as_str()
            .ok_or_else(|| Error::invalid_format("cam_calibration", "type must be a string"))?
            .to_string();

        let base = expect_struct(
            struct_member(fields, "cam_calibration", "base_intrinsics")?,
            "cam_calibration",
        )?;
        let base_intrinsics = BaseIntrinsics {
            cx_offset_px: member_f32(base, "cx_offset_px")?,
            cy_offset_px: member_f32(base, "cy_offset_px")?,
            img_height_px: member_i64(base, "img_height_px")?,
            img_width_px: member_i64(base, "img_width_px")?,
        };

        let intr = expect_struct(
            struct_member(fields, "cam_calibration", "intrinsics")?,
            "cam_calibration",
        )?;
        let intrinsics = Intrinsics {
            c1: member_f32(intr, "c1")?,
            c2: member_f32(intr, "c2")?,
            c3: member_f32(intr, "c3")?,
            c4: member_f32(intr, "c4")?,
            pixel_aspect_ratio: member_f32(intr, "pixel_aspect_ratio")?,
        };

        let extr = expect_struct(
            struct_member(fields, "cam_calibration", "extrinsics")?,
            "cam_calibration",
        )?;
        let extrinsics = Extrinsics {
            pos_x_m: member_f32(extr, "pos_x_m")?,
            pos_y_m: member_f32(extr, "pos_y_m")?,
            pos_z_m: member_f32(extr, "pos_z_m")?,
            rot_x_deg: member_f32(extr, "rot_x_deg")?,
            rot_z1_deg: member_f32(extr, "rot_z1_deg")?,
            rot_z2_deg: member_f32(extr, "rot_z2_deg")?,
        };

        Ok(CamCalibration {
            model,
            base_intrinsics,
            intrinsics,
            extrinsics,
        })
    }
}

fn member_f32(fields: &BTreeMap<String, Value>, member: &str) -> Result<f32> {
    struct_member(fields, "cam_calibration", member)?
        .as_f32()
        .ok_or_else(|| {
            Error::invalid_format("cam_calibration", format!("'{member}' must be a float"))
        })
}

fn member_i64(fields: &BTreeMap<String, Value>, member: &str) -> Result<i64> {
    struct_member(fields, "cam_calibration", member)?
        .as_i64()
        .ok_or_else(|| {
            Error::invalid_format("cam_calibration", format!("'{member}' must be an integer"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_round_trip() {
        let calib = CamCalibration {
            model: "fisheye".to_string(),
            base_intrinsics: BaseIntrinsics {
                cx_offset_px: 0.5,
                cy_offset_px: -0.25,
                img_height_px: 1080,
                img_width_px: 1920,
            },
            intrinsics: Intrinsics {
                c1: 1.0,
                c2: 0.1,
                c3: 0.01,
                c4: 0.001,
                pixel_aspect_ratio: 1.0,
            },
            extrinsics: Extrinsics {
                pos_x_m: 1.5,
                pos_y_m: 0.0,
                pos_z_m: 2.1,
                rot_x_deg: 90.0,
                rot_z1_deg: 0.0,
                rot_z2_deg: -90.0,
            },
        };
        assert_eq!(CamCalibration::from_value(&calib.to_value()).unwrap(), calib);
    }
}
