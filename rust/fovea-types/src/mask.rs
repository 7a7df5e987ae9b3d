//! Compressed run-length encoded binary masks.
//!
//! The compressed form follows the COCO convention: runs are taken in
//! column-major order, alternating background/foreground and starting
//! with background; run lengths are delta-coded against the run two
//! positions back and packed as base-32 varints offset into printable
//! ASCII.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fovea_common::{Result, error::Error};

use crate::registry::ValueLayout;
use crate::value::{Value, expect_struct, struct_member};

/// A run-length encoded binary mask with its `[height, width]` size and
/// compressed counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedRle {
    pub size: [u32; 2],
    #[serde(with = "serde_bytes_compat")]
    pub counts: Vec<u8>,
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

impl CompressedRle {
    /// Encodes a dense binary mask given in row-major order, where any
    /// non-zero byte is foreground.
    pub fn from_mask(mask: &[u8], height: u32, width: u32) -> Result<CompressedRle> {
        let expected = height as usize * width as usize;
        if mask.len() != expected {
            return Err(Error::invalid_arg(
                "mask",
                format!("expected {expected} pixels, got {}", mask.len()),
            ));
        }
        let mut runs: Vec<u64> = Vec::new();
        let mut current: u8 = 0;
        let mut run: u64 = 0;
        for col in 0..width as usize {
            for row in 0..height as usize {
                let pixel = u8::from(mask[row * width as usize + col] != 0);
                if pixel == current {
                    run += 1;
                } else {
                    runs.push(run);
                    current = pixel;
                    run = 1;
                }
            }
        }
        runs.push(run);
        Ok(CompressedRle {
            size: [height, width],
            counts: encode_counts(&runs),
        })
    }

    /// Builds the compressed form from uncompressed run lengths.
    pub fn from_counts(size: [u32; 2], counts: &[u64]) -> CompressedRle {
        CompressedRle {
            size,
            counts: encode_counts(counts),
        }
    }

    /// Decodes back to a dense row-major binary mask of 0/1 bytes.
    pub fn to_mask(&self) -> Result<Vec<u8>> {
        let [height, width] = self.size;
        let total = height as usize * width as usize;
        let runs = decode_counts(&self.counts)?;
        let mut mask = vec![0u8; total];
        let mut pos = 0usize;
        let mut foreground = false;
        for run in runs {
            let run = run as usize;
            if pos + run > total {
                return Err(Error::invalid_format(
                    "compressed_rle",
                    "run lengths exceed mask size",
                ));
            }
            if foreground {
                for i in pos..pos + run {
                    let col = i / height as usize;
                    let row = i % height as usize;
                    mask[row * width as usize + col] = 1;
                }
            }
            pos += run;
            foreground = !foreground;
        }
        if pos != total {
            return Err(Error::invalid_format(
                "compressed_rle",
                "run lengths do not cover the mask",
            ));
        }
        Ok(mask)
    }

    /// Number of foreground pixels.
    pub fn area(&self) -> Result<u64> {
        let runs = decode_counts(&self.counts)?;
        Ok(runs.iter().skip(1).step_by(2).sum())
    }

    pub fn layout() -> ValueLayout {
        ValueLayout::structure(&[
            ("size", ValueLayout::FixedSizeInt(2)),
            ("counts", ValueLayout::Binary),
        ])
    }

    pub fn to_value(&self) -> Value {
        Value::Struct(BTreeMap::from([
            (
                "size".to_string(),
                Value::List(vec![
                    Value::from(self.size[0]),
                    Value::from(self.size[1]),
                ]),
            ),
            ("counts".to_string(), Value::from(self.counts.clone())),
        ]))
    }

    pub fn from_value(value: &Value) -> Result<CompressedRle> {
        let fields = expect_struct(value, "compressed_rle")?;
        let size_list = struct_member(fields, "compressed_rle", "size")?
            .as_list()
            .ok_or_else(|| Error::invalid_format("compressed_rle", "size must be a list"))?;
        if size_list.len() != 2 {
            return Err(Error::invalid_format(
                "compressed_rle",
                "size must hold [height, width]",
            ));
        }
        let mut size = [0u32; 2];
        for (slot, item) in size.iter_mut().zip(size_list) {
            *slot = item
                .as_i64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| Error::invalid_format("compressed_rle", "size must be integers"))?;
        }
        let counts = struct_member(fields, "compressed_rle", "counts")?
            .as_bytes()
            .ok_or_else(|| Error::invalid_format("compressed_rle", "counts must be bytes"))?
            .to_vec();
        Ok(CompressedRle { size, counts })
    }
}

/// Packs run lengths into the COCO base-32 varint form.
fn encode_counts(runs: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(runs.len() * 2);
    for (i, run) in runs.iter().enumerate() {
        let mut x = *run as i64;
        if i > 2 {
            x -= runs[i - 2] as i64;
        }
        loop {
            let mut c = (x & 0x1f) as u8;
            x >>= 5;
            let more = if c & 0x10 != 0 { x != -1 } else { x != 0 };
            if more {
                c |= 0x20;
            }
            out.push(c + 48);
            if !more {
                break;
            }
        }
    }
    out
}

/// Unpacks the COCO base-32 varint form back into run lengths.
fn decode_counts(counts: &[u8]) -> Result<Vec<u64>> {
    let mut runs: Vec<i64> = Vec::new();
    let mut pos = 0usize;
    while pos < counts.len() {
        let mut x: i64 = 0;
        let mut k = 0u32;
        loop {
            let Some(&byte) = counts.get(pos) else {
                return Err(Error::invalid_format(
                    "compressed_rle",
                    "truncated counts stream",
                ));
            };
            if k >= 12 {
                return Err(Error::invalid_format(
                    "compressed_rle",
                    "varint run length is too long",
                ));
            }
            let c = byte.wrapping_sub(48) as i64;
            x |= (c & 0x1f) << (5 * k);
            pos += 1;
            k += 1;
            if c & 0x20 == 0 {
                if c & 0x10 != 0 {
                    x |= -1i64 << (5 * k);
                }
                break;
            }
        }
        let i = runs.len();
        if i > 2 {
            x += runs[i - 2];
        }
        if x < 0 {
            return Err(Error::invalid_format(
                "compressed_rle",
                "negative run length",
            ));
        }
        runs.push(x);
    }
    Ok(runs.into_iter().map(|v| v as u64).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(mask: &[u8], height: u32, width: u32) {
        let rle = CompressedRle::from_mask(mask, height, width).unwrap();
        let back = rle.to_mask().unwrap();
        let normalized: Vec<u8> = mask.iter().map(|&p| u8::from(p != 0)).collect();
        assert_eq!(back, normalized);
    }

    #[test]
    fn mask_round_trips() {
        round_trip(&[0, 1, 1, 0, 1, 0], 2, 3);
        round_trip(&[1; 25], 5, 5);
        round_trip(&[0; 25], 5, 5);
        let mut single = vec![0u8; 64];
        single[27] = 1;
        round_trip(&single, 8, 8);
    }

    #[test]
    fn irregular_pattern_round_trips() {
        let width = 13u32;
        let height = 7u32;
        let mask: Vec<u8> = (0..width * height)
            .map(|i| u8::from(i % 3 == 0 || i % 7 == 1))
            .collect();
        round_trip(&mask, height, width);
    }

    #[test]
    fn area_counts_foreground() {
        let mask = [0, 1, 1, 0, 1, 0, 0, 0, 1];
        let rle = CompressedRle::from_mask(&mask, 3, 3).unwrap();
        assert_eq!(rle.area().unwrap(), 4);
    }

    #[test]
    fn rejects_size_mismatch() {
        assert!(CompressedRle::from_mask(&[0, 1], 2, 3).is_err());
    }

    #[test]
    fn counts_survive_delta_coding() {
        let rle = CompressedRle::from_counts([4, 4], &[3, 5, 2, 5, 1]);
        assert_eq!(decode_counts(&rle.counts).unwrap(), vec![3, 5, 2, 5, 1]);
    }

    #[test]
    fn value_round_trip() {
        let rle = CompressedRle::from_mask(&[0, 1, 1, 1], 2, 2).unwrap();
        assert_eq!(CompressedRle::from_value(&rle.to_value()).unwrap(), rle);
    }
}
