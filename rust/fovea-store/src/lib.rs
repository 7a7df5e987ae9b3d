//! Columnar storage backend adapter.
//!
//! Tables live under a root directory as immutable parquet fragments:
//! `add` appends a fragment, `delete` rewrites the fragments that held
//! matching rows, reads scan fragments in order. A [`Connection`] owns
//! nothing beyond the root path and is meant to be short-lived: acquire,
//! use, drop.
//!
//! The adapter maps table schemas onto Arrow: binary columns for opaque
//! payloads (mask counts, depth buffers, embedding vectors), fixed-size
//! lists for coordinate vectors, structs for nested value types.

pub mod arrow_compat;
pub mod connection;
pub mod table;

pub use connection::{Connection, CreateMode};
pub use table::{Predicate, Query, Table};
