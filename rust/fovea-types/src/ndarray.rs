//! N-dimensional float arrays.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fovea_common::{Result, error::Error};

use crate::registry::ValueLayout;
use crate::value::{Value, expect_struct, struct_member};

/// A dense float tensor stored as flat values plus a shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NdArrayFloat {
    pub values: Vec<f32>,
    pub shape: Vec<i64>,
}

impl NdArrayFloat {
    /// Creates an array after validating that the shape covers the value
    /// buffer exactly.
    pub fn new(values: Vec<f32>, shape: Vec<i64>) -> Result<NdArrayFloat> {
        if shape.iter().any(|&d| d < 0) {
            return Err(Error::invalid_arg("ndarray", "shape dims must be >= 0"));
        }
        let expected: i64 = shape.iter().product();
        if expected as usize != values.len() {
            return Err(Error::invalid_arg(
                "ndarray",
                format!("shape covers {expected} values, got {}", values.len()),
            ));
        }
        Ok(NdArrayFloat { values, shape })
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn layout() -> ValueLayout {
        ValueLayout::structure(&[
            ("values", ValueLayout::FloatList),
            ("shape", ValueLayout::IntList),
        ])
    }

    pub fn to_value(&self) -> Value {
        Value::Struct(BTreeMap::from([
            (
                "values".to_string(),
                Value::List(self.values.iter().map(|v| Value::from(*v)).collect()),
            ),
            (
                "shape".to_string(),
                Value::List(self.shape.iter().map(|d| Value::Int(*d)).collect()),
            ),
        ]))
    }

    pub fn from_value(value: &Value) -> Result<NdArrayFloat> {
        let fields = expect_struct(value, "ndarray")?;
        let values = struct_member(fields, "ndarray", "values")?
            .as_list()
            .ok_or_else(|| Error::invalid_format("ndarray", "values must be a list"))?
            .iter()
            .map(|v| {
                v.as_f32()
                    .ok_or_else(|| Error::invalid_format("ndarray", "values must be floats"))
            })
            .collect::<Result<Vec<_>>>()?;
        let shape = struct_member(fields, "ndarray", "shape")?
            .as_list()
            .ok_or_else(|| Error::invalid_format("ndarray", "shape must be a list"))?
            .iter()
            .map(|v| {
                v.as_i64()
                    .ok_or_else(|| Error::invalid_format("ndarray", "shape must be integers"))
            })
            .collect::<Result<Vec<_>>>()?;
        NdArrayFloat::new(values, shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_must_cover_values() {
        assert!(NdArrayFloat::new(vec![0.0; 6], vec![2, 3]).is_ok());
        assert!(NdArrayFloat::new(vec![0.0; 6], vec![2, 2]).is_err());
        assert!(NdArrayFloat::new(vec![], vec![0, 3]).is_ok());
        assert!(NdArrayFloat::new(vec![0.0], vec![-1]).is_err());
    }

    #[test]
    fn value_round_trip() {
        let arr = NdArrayFloat::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]).unwrap();
        assert_eq!(NdArrayFloat::from_value(&arr.to_value()).unwrap(), arr);
    }
}
