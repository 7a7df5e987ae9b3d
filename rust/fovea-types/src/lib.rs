//! Value types of the fovea data model and the process-wide type registry.
//!
//! This crate defines the composite value types a labeled computer-vision
//! dataset stores per row (bounding boxes, compressed run-length masks,
//! keypoints, 3D boxes, N-D float arrays, camera calibrations, depth
//! images), the runtime [`Value`](value::Value) representation rows are
//! exchanged in at the storage boundary, and the global catalog that maps
//! canonical type names to their storage layout.

pub mod bbox;
pub mod bbox3d;
pub mod calibration;
pub mod depth;
pub mod keypoints;
pub mod mask;
pub mod ndarray;
pub mod record;
pub mod registry;
pub mod value;

pub use bbox::{BBox, BBoxFormat};
pub use bbox3d::BBox3D;
pub use calibration::{BaseIntrinsics, CamCalibration, Extrinsics, Intrinsics};
pub use depth::DepthImage;
pub use keypoints::{KeyPoints, KeyPoints3D};
pub use mask::CompressedRle;
pub use ndarray::NdArrayFloat;
pub use record::Record;
pub use value::Value;
