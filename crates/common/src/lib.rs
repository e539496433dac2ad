//! Shared types: chunk-grid coordinates and bounding spheres.
//!
//! # Invariants
//! - All grid coordinates are expressed in chunk units (one unit = one chunk width).
//! - Coordinate equality and hashing are structural.

mod types;

pub use types::{CHUNK_SIZE, Sphere, WorldCoordinate};

pub fn crate_info() -> &'static str {
    concat!("chunkworld-common v", env!("CARGO_PKG_VERSION"))
}
