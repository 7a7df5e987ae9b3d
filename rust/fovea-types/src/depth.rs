//! Depth images stored as raw pixel buffers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fovea_common::{Result, error::Error};

use crate::registry::ValueLayout;
use crate::value::{Value, expect_struct, struct_member};

/// A depth map: an opaque little-endian `f32` pixel buffer plus its
/// `[height, width]` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthImage {
    #[serde(with = "serde_bytes_compat")]
    pub bytes: Vec<u8>,
    pub shape: [u32; 2],
}

mod serde_bytes_compat {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(bytes.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Vec::<u8>::deserialize(deserializer)
    }
}

impl DepthImage {
    /// Wraps a raw pixel buffer, validating it holds one `f32` per pixel.
    pub fn new(bytes: Vec<u8>, shape: [u32; 2]) -> Result<DepthImage> {
        let expected = shape[0] as usize * shape[1] as usize * 4;
        if bytes.len() != expected {
            return Err(Error::invalid_arg(
                "depth_image",
                format!("expected {expected} bytes, got {}", bytes.len()),
            ));
        }
        Ok(DepthImage { bytes, shape })
    }

    /// Packs a float depth buffer into its byte representation.
    pub fn from_f32(pixels: &[f32], shape: [u32; 2]) -> Result<DepthImage> {
        let mut bytes = Vec::with_capacity(pixels.len() * 4);
        for pixel in pixels {
            bytes.extend_from_slice(&pixel.to_le_bytes());
        }
        DepthImage::new(bytes, shape)
    }

    /// Unpacks the byte buffer into depth values.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    pub fn layout() -> ValueLayout {
        ValueLayout::structure(&[
            ("bytes", ValueLayout::Binary),
            ("shape", ValueLayout::FixedSizeInt(2)),
        ])
    }

    pub fn to_value(&self) -> Value {
        Value::Struct(BTreeMap::from([
            ("bytes".to_string(), Value::from(self.bytes.clone())),
            (
                "shape".to_string(),
                Value::List(vec![
                    Value::from(self.shape[0]),
                    Value::from(self.shape[1]),
                ]),
            ),
        ]))
    }

    pub fn from_value(value: &Value) -> Result<DepthImage> {
        let fields = expect_struct(value, "depth_image")?;
        let bytes = struct_member(fields, "depth_image", "bytes")?
            .as_bytes()
            .ok_or_else(|| Error::invalid_format("depth_image", "bytes must be binary"))?
            .to_vec();
        let shape_list = struct_member(fields, "depth_image", "shape")?
            .as_list()
            .ok_or_else(|| Error::invalid_format("depth_image", "shape must be a list"))?;
        if shape_list.len() != 2 {
            return Err(Error::invalid_format(
                "depth_image",
                "shape must hold [height, width]",
            ));
        }
        let mut shape = [0u32; 2];
        for (slot, item) in shape.iter_mut().zip(shape_list) {
            *slot = item
                .as_i64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| Error::invalid_format("depth_image", "shape must be integers"))?;
        }
        DepthImage::new(bytes, shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f32_round_trip() {
        let pixels = vec![0.0f32, 1.5, 2.25, 100.0, -3.5, 0.125];
        let depth = DepthImage::from_f32(&pixels, [2, 3]).unwrap();
        assert_eq!(depth.to_f32_vec(), pixels);
    }

    #[test]
    fn buffer_size_is_validated() {
        assert!(DepthImage::new(vec![0u8; 8], [1, 2]).is_ok());
        assert!(DepthImage::new(vec![0u8; 7], [1, 2]).is_err());
    }

    #[test]
    fn value_round_trip() {
        let depth = DepthImage::from_f32(&[1.0, 2.0], [1, 2]).unwrap();
        assert_eq!(DepthImage::from_value(&depth.to_value()).unwrap(), depth);
    }
}
