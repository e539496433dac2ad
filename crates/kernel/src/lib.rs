//! Spatial kernel: view frustum, camera and the implicit octree used for
//! visibility queries.
//!
//! # Invariants
//! - A node's bounding sphere always contains its whole cell, so frustum
//!   pruning never drops a visible leaf.
//! - The tree is never materialized; nodes are plain values derived on the fly.

pub mod camera;
pub mod frustum;
pub mod tree;

pub use camera::Camera;
pub use frustum::{
    Frustum, PLANE_BOTTOM, PLANE_FAR, PLANE_LEFT, PLANE_NEAR, PLANE_RIGHT, PLANE_TOP,
};
pub use tree::{MAX_ROOT_LEVEL, NodeQuery, SpatialNode, Tree, TreeError};

pub fn crate_info() -> &'static str {
    concat!("chunkworld-kernel v", env!("CARGO_PKG_VERSION"))
}
