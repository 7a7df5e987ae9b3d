//! 2D and 3D keypoint sets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fovea_common::{Result, error::Error};

use crate::registry::ValueLayout;
use crate::value::{Value, expect_struct, struct_member};

/// A set of 2D keypoints laid out against a named template.
///
/// `coords` interleaves `x, y` pairs; `states` carries one visibility
/// state label per point (e.g. `visible`, `hidden`, `invisible`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPoints {
    pub template_id: String,
    pub coords: Vec<f32>,
    pub states: Vec<String>,
}

impl KeyPoints {
    pub fn new(
        template_id: impl Into<String>,
        coords: Vec<f32>,
        states: Vec<String>,
    ) -> Result<KeyPoints> {
        if coords.len() != states.len() * 2 {
            return Err(Error::invalid_arg(
                "keypoints",
                "coords must hold an x,y pair per state",
            ));
        }
        Ok(KeyPoints {
            template_id: template_id.into(),
            coords,
            states,
        })
    }

    pub fn num_points(&self) -> usize {
        self.states.len()
    }

    pub fn layout() -> ValueLayout {
        ValueLayout::structure(&[
            ("template_id", ValueLayout::Utf8),
            ("coords", ValueLayout::FloatList),
            ("states", ValueLayout::StringList),
        ])
    }

    pub fn to_value(&self) -> Value {
        Value::Struct(BTreeMap::from([
            ("template_id".to_string(), Value::from(self.template_id.as_str())),
            (
                "coords".to_string(),
                Value::List(self.coords.iter().map(|c| Value::from(*c)).collect()),
            ),
            (
                "states".to_string(),
                Value::List(self.states.iter().map(|s| Value::from(s.as_str())).collect()),
            ),
        ]))
    }

    pub fn from_value(value: &Value) -> Result<KeyPoints> {
        let fields = expect_struct(value, "keypoints")?;
        let template_id = struct_member(fields, "keypoints", "template_id")?
            .as_str()
            .ok_or_else(|| Error::invalid_format("keypoints", "template_id must be a string"))?
            .to_string();
        let coords = float_list(struct_member(fields, "keypoints", "coords")?, "keypoints")?;
        let states = string_list(struct_member(fields, "keypoints", "states")?, "keypoints")?;
        KeyPoints::new(template_id, coords, states)
    }
}

/// A set of 3D keypoints: `coords` interleaves `x, y, z` triples and
/// `visibles` flags each point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPoints3D {
    pub template_id: String,
    pub coords: Vec<f32>,
    pub visibles: Vec<bool>,
}

impl KeyPoints3D {
    pub fn new(
        template_id: impl Into<String>,
        coords: Vec<f32>,
        visibles: Vec<bool>,
    ) -> Result<KeyPoints3D> {
        if coords.len() != visibles.len() * 3 {
            return Err(Error::invalid_arg(
                "keypoints3d",
                "coords must hold an x,y,z triple per visibility flag",
            ));
        }
        Ok(KeyPoints3D {
            template_id: template_id.into(),
            coords,
            visibles,
        })
    }

    pub fn num_points(&self) -> usize {
        self.visibles.len()
    }

    pub fn layout() -> ValueLayout {
        ValueLayout::structure(&[
            ("template_id", ValueLayout::Utf8),
            ("coords", ValueLayout::FloatList),
            ("visibles", ValueLayout::BoolList),
        ])
    }

    pub fn to_value(&self) -> Value {
        Value::Struct(BTreeMap::from([
            ("template_id".to_string(), Value::from(self.template_id.as_str())),
            (
                "coords".to_string(),
                Value::List(self.coords.iter().map(|c| Value::from(*c)).collect()),
            ),
            (
                "visibles".to_string(),
                Value::List(self.visibles.iter().map(|v| Value::from(*v)).collect()),
            ),
        ]))
    }

    pub fn from_value(value: &Value) -> Result<KeyPoints3D> {
        let fields = expect_struct(value, "keypoints3d")?;
        let template_id = struct_member(fields, "keypoints3d", "template_id")?
            .as_str()
            .ok_or_else(|| Error::invalid_format("keypoints3d", "template_id must be a string"))?
            .to_string();
        let coords = float_list(struct_member(fields, "keypoints3d", "coords")?, "keypoints3d")?;
        let visibles = struct_member(fields, "keypoints3d", "visibles")?
            .as_list()
            .ok_or_else(|| Error::invalid_format("keypoints3d", "visibles must be a list"))?
            .iter()
            .map(|v| {
                v.as_bool().ok_or_else(|| {
                    Error::invalid_format("keypoints3d", "visibles must be booleans")
                })
            })
            .collect::<Result<Vec<_>>>()?;
        KeyPoints3D::new(template_id, coords, visibles)
    }
}

fn float_list(value: &Value, type_name: &str) -> Result<Vec<f32>> {
    value
        .as_list()
        .ok_or_else(|| Error::invalid_format(type_name, "coords must be a list"))?
        .iter()
        .map(|v| {
            v.as_f32()
                .ok_or_else(|| Error::invalid_format(type_name, "coords must be floats"))
        })
        .collect()
}

fn string_list(value: &Value, type_name: &str) -> Result<Vec<String>> {
    value
        .as_list()
        .ok_or_else(|| Error::invalid_format(type_name, "states must be a list"))?
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::invalid_format(type_name, "states must be strings"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_is_validated() {
        assert!(KeyPoints::new("t", vec![1.0, 2.0], vec!["visible".into()]).is_ok());
        assert!(KeyPoints::new("t", vec![1.0], vec!["visible".into()]).is_err());
        assert!(KeyPoints3D::new("t", vec![1.0, 2.0, 3.0], vec![true]).is_ok());
        assert!(KeyPoints3D::new("t", vec![1.0, 2.0], vec![true]).is_err());
    }

    #[test]
    fn value_round_trip() {
        let kp = KeyPoints::new(
            "person-17",
            vec![12.0, 4.5, 8.0, 9.0],
            vec!["visible".into(), "hidden".into()],
        )
        .unwrap();
        assert_eq!(KeyPoints::from_value(&kp.to_value()).unwrap(), kp);

        let kp3 = KeyPoints3D::new("car-8", vec![0.0, 1.0, 2.0], vec![false]).unwrap();
        assert_eq!(KeyPoints3D::from_value(&kp3.to_value()).unwrap(), kp3);
    }
}
