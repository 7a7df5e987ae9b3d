//! Core definitions (error types and shared helpers), relied upon by all fovea-* crates.

pub mod error;
pub mod name;
pub mod result;

pub use result::Result;
