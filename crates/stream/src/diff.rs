use std::collections::HashSet;

use chunkworld_kernel::SpatialNode;

/// The set of nodes currently judged visible and in range.
pub type VisibleSet = HashSet<SpatialNode>;

/// Changes between two visible sets. Both lists are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeDiff {
    pub to_add: Vec<SpatialNode>,
    pub to_remove: Vec<SpatialNode>,
}

impl NodeDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// `to_add = current - previous`, `to_remove = previous - current`.
pub fn diff_nodes(previous: &VisibleSet, current: &VisibleSet) -> NodeDiff {
    let mut to_add: Vec<_> = current.difference(previous).copied().collect();
    let mut to_remove: Vec<_> = previous.difference(current).copied().collect();
    to_add.sort_unstable();
    to_remove.sort_unstable();
    NodeDiff { to_add, to_remove }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkworld_common::WorldCoordinate;
    use chunkworld_render::{ChunkSink, LodRenderer};
    use chunkworld_storage::{Chunk, ChunkGeometry};
    use std::sync::Arc;

    fn leaf(x: i32) -> SpatialNode {
        SpatialNode::leaf(WorldCoordinate::new(x, 0, 0))
    }

    fn chunks(nodes: &[SpatialNode]) -> Vec<Arc<Chunk>> {
        nodes
            .iter()
            .map(|n| Arc::new(Chunk::new(*n, ChunkGeometry::default())))
            .collect()
    }

    #[test]
    fn diff_adds_and_removes() {
        let (a, b, c, d) = (leaf(0), leaf(1), leaf(2), leaf(3));
        let previous = VisibleSet::from([a, b, c]);
        let current = VisibleSet::from([b, c, d]);

        let diff = diff_nodes(&previous, &current);
        assert_eq!(diff.to_add, vec![d]);
        assert_eq!(diff.to_remove, vec![a]);
    }

    #[test]
    fn identical_sets_produce_empty_diff() {
        let set = VisibleSet::from([leaf(0), leaf(5)]);
        assert!(diff_nodes(&set, &set).is_empty());
        assert!(diff_nodes(&VisibleSet::new(), &VisibleSet::new()).is_empty());
    }

    #[test]
    fn applying_diff_to_renderer_yields_current_set() {
        let (a, b, c, d) = (leaf(0), leaf(1), leaf(2), leaf(3));
        let previous = VisibleSet::from([a, b, c]);
        let current = VisibleSet::from([b, c, d]);

        let renderer = LodRenderer::new();
        renderer.add_chunks(chunks(&[a, b, c]));

        let diff = diff_nodes(&previous, &current);
        renderer.remove_chunks(chunks(&diff.to_remove));
        renderer.add_chunks(chunks(&diff.to_add));

        assert_eq!(renderer.chunk_count(), 3);
        for node in &current {
            assert!(renderer.contains(node.level, node.origin));
        }
        assert!(!renderer.contains(a.level, a.origin));
    }
}
