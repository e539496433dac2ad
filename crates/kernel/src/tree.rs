use std::collections::HashSet;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use chunkworld_common::{Sphere, WorldCoordinate};

use crate::frustum::Frustum;

/// Deepest supported root level. Keeps node sizes well inside `i32`.
pub const MAX_ROOT_LEVEL: u32 = 24;

/// Errors from tree construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("invalid root level {level}: must be in 1..={max}")]
    InvalidRootLevel { level: u32, max: u32 },
}

/// A cell of the implicit octree.
///
/// Covers the half-open cube `[origin, origin + size)` on every axis, in
/// chunk units. Level 0 is a single chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpatialNode {
    pub origin: WorldCoordinate,
    pub level: u32,
}

impl SpatialNode {
    pub fn new(origin: WorldCoordinate, level: u32) -> Self {
        Self { origin, level }
    }

    pub fn leaf(origin: WorldCoordinate) -> Self {
        Self::new(origin, 0)
    }

    /// Edge length in chunks: `2^level`.
    pub fn size(&self) -> i32 {
        1 << self.level
    }

    pub fn is_leaf(&self) -> bool {
        self.level == 0
    }

    pub fn center(&self) -> Vec3 {
        self.origin.as_vec3() + Vec3::splat(self.size() as f32 * 0.5)
    }

    /// Sphere circumscribing the cell. Never smaller than the cell itself,
    /// so pruning on it cannot drop a visible descendant.
    pub fn bounding_sphere(&self) -> Sphere {
        let size = self.size() as f32;
        Sphere::new(self.center(), size * 3f32.sqrt() * 0.5)
    }

    /// The eight octants, or nothing for a leaf.
    ///
    /// Octant bit layout: bit0 = X, bit1 = Y, bit2 = Z (0 = low half).
    pub fn children(&self) -> impl Iterator<Item = SpatialNode> {
        let node = *self;
        let count = if node.is_leaf() { 0 } else { 8 };
        (0..count).map(move |octant: u8| {
            let half = node.size() / 2;
            let offset = WorldCoordinate::new(
                if octant & 1 == 0 { 0 } else { half },
                if octant & 2 == 0 { 0 } else { half },
                if octant & 4 == 0 { 0 } else { half },
            );
            SpatialNode::new(node.origin + offset, node.level - 1)
        })
    }
}

/// Parameters of a visibility query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeQuery {
    /// Nodes whose center is farther than this from the viewer are dropped.
    pub max_radius: f32,
    /// When set, a visible node is kept whole (not subdivided) once its
    /// center is at least `lod_factor * size` away from the viewer.
    pub lod_factor: Option<f32>,
}

impl NodeQuery {
    pub fn leaves(max_radius: f32) -> Self {
        Self {
            max_radius,
            lod_factor: None,
        }
    }
}

/// Implicit octree over the chunk grid.
///
/// Stores only its depth. Nodes are derived from `(origin, level)` while
/// traversing; nothing is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tree {
    root_level: u32,
}

impl Tree {
    pub fn new(root_level: u32) -> Result<Self, TreeError> {
        if root_level == 0 || root_level > MAX_ROOT_LEVEL {
            return Err(TreeError::InvalidRootLevel {
                level: root_level,
                max: MAX_ROOT_LEVEL,
            });
        }
        Ok(Self { root_level })
    }

    pub fn root_level(&self) -> u32 {
        self.root_level
    }

    /// The root node: a cube of `2^root_level` chunks centered on the
    /// world origin, spanning `[-2^(root_level-1), 2^(root_level-1))` on
    /// every axis. Nothing outside it is ever returned by a query.
    pub fn root(&self) -> SpatialNode {
        let half = 1i32 << (self.root_level - 1);
        SpatialNode::new(WorldCoordinate::splat(-half), self.root_level)
    }

    /// Every leaf whose bounding sphere meets `frustum` and whose center is
    /// within `max_radius` of `viewer`.
    pub fn find_nodes(
        &self,
        viewer: Vec3,
        frustum: &Frustum,
        max_radius: f32,
    ) -> HashSet<SpatialNode> {
        self.query(viewer, frustum, &NodeQuery::leaves(max_radius))
    }

    pub fn query(&self, viewer: Vec3, frustum: &Frustum, query: &NodeQuery) -> HashSet<SpatialNode> {
        let _span = tracing::debug_span!("tree_query", root_level = self.root_level).entered();

        let mut result = HashSet::new();
        let mut stack = vec![self.root()];
        let mut visited = 0usize;

        while let Some(node) = stack.pop() {
            visited += 1;
            let sphere = node.bounding_sphere();
            if !frustum.intersects(&sphere) {
                continue;
            }

            let distance = sphere.center.distance(viewer);
            if distance - sphere.radius > query.max_radius {
                continue;
            }

            if node.is_leaf() {
                if distance <= query.max_radius {
                    result.insert(node);
                }
                continue;
            }

            if let Some(factor) = query.lod_factor {
                if distance >= factor * node.size() as f32 && distance <= query.max_radius {
                    result.insert(node);
                    continue;
                }
            }

            stack.extend(node.children());
        }

        tracing::trace!(visited, found = result.len(), "tree query complete");
        result
    }
}
