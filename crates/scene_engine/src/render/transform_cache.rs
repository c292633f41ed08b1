//! Per-frame world transform table
//!
//! World transforms of a flattened node list are computed once per frame in
//! list order, each from its parent's already-cached slot. Lookups are O(1)
//! through a side table from [`NodeId`] to a 16-bit slot.
//!
//! The cache remembers the graph revision it was built against. Any later
//! graph mutation makes it stale; reading a stale cache is a programming error
//! that trips a debug assertion and yields `None` in release builds.

use slotmap::SecondaryMap;

use crate::foundation::math::Mat4;
use crate::scene::{NodeId, SceneError, SceneGraph};

/// Flat array of cached world transforms
#[derive(Debug, Default)]
pub struct TransformCache {
    slots: SecondaryMap<NodeId, u16>,
    transforms: Vec<Mat4>,
    revision: Option<u64>,
}

impl TransformCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute world transforms for `nodes`
    ///
    /// `nodes` must list every parent before its children (pre-order, as
    /// produced by [`SceneGraph::flatten`]). A parent missing from the list
    /// is resolved through the uncached [`SceneGraph::world_transform`].
    pub fn rebuild(&mut self, graph: &SceneGraph, nodes: &[NodeId]) -> Result<(), SceneError> {
        if nodes.len() >= usize::from(u16::MAX) {
            return Err(SceneError::TransformCacheOverflow(nodes.len()));
        }

        self.clear();
        self.transforms.reserve(nodes.len());

        for &id in nodes {
            let node = graph.get(id).ok_or(SceneError::StaleNode(id))?;
            let world = match node.parent() {
                None => *node.transform(),
                Some(parent) => {
                    let parent_world = match self.slots.get(parent) {
                        Some(&slot) => self.transforms[usize::from(slot)],
                        None => graph
                            .world_transform(parent)
                            .ok_or(SceneError::StaleNode(parent))?,
                    };
                    parent_world * node.transform()
                }
            };

            // Bounded by the overflow check above
            let slot = self.transforms.len() as u16;
            self.transforms.push(world);
            self.slots.insert(id, slot);
        }

        self.revision = Some(graph.revision());
        log::trace!(
            "Cached {} world transforms at graph revision {}",
            self.transforms.len(),
            graph.revision()
        );
        Ok(())
    }

    /// Whether the cache was built against the graph's current revision
    pub fn is_current(&self, graph: &SceneGraph) -> bool {
        self.revision == Some(graph.revision())
    }

    /// Slot assigned to `id` in the last rebuild
    pub fn slot(&self, id: NodeId) -> Option<u16> {
        self.slots.get(id).copied()
    }

    /// Cached world transform of `id`
    pub fn get(&self, graph: &SceneGraph, id: NodeId) -> Option<&Mat4> {
        debug_assert!(
            self.is_current(graph),
            "transform cache read after the scene graph changed"
        );
        if !self.is_current(graph) {
            return None;
        }
        let slot = self.slot(id);
        debug_assert!(slot.is_some(), "node {id:?} was not part of the cache pass");
        slot.map(|slot| &self.transforms[usize::from(slot)])
    }

    /// Number of cached transforms
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Drop all cached transforms
    pub fn clear(&mut self) {
        self.slots.clear();
        self.transforms.clear();
        self.revision = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{AffineExt, Vec3};
    use approx::assert_relative_eq;

    fn scene() -> (SceneGraph, NodeId, Vec<NodeId>) {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        let mut ids = vec![root];
        for i in 0..3 {
            let parent = ids[i / 2];
            let id = graph.create_node(format!("n{i}"));
            let mut local = Mat4::from_axis_angle(&Vec3::z_axis(), 0.3 * (i + 1) as f32);
            local.set_translation_part(Vec3::new(i as f32, 1.0, -2.0));
            graph.set_transform(id, local).unwrap();
            graph.link_to(id, parent).unwrap();
            ids.push(id);
        }
        let doubled = Mat4::new_nonuniform_scaling(&Vec3::repeat(2.0));
        graph.set_transform(root, doubled).unwrap();
        let mut nodes = Vec::new();
        graph.flatten(root, &mut nodes);
        (graph, root, nodes)
    }

    #[test]
    fn test_cached_matches_parent_times_local() {
        let (graph, _, nodes) = scene();
        let mut cache = TransformCache::new();
        cache.rebuild(&graph, &nodes).unwrap();
        assert_eq!(cache.len(), nodes.len());

        for (index, &id) in nodes.iter().enumerate() {
            let cached = cache.get(&graph, id).unwrap();
            assert_relative_eq!(*cached, graph.world_transform(id).unwrap(), epsilon = 1e-5);

            if let Some(parent) = graph.parent(id) {
                let parent_index = nodes.iter().position(|&n| n == parent).unwrap();
                assert!(parent_index < index);
                let expected = cache.get(&graph, parent).unwrap() * graph.transform(id).unwrap();
                assert_relative_eq!(*cached, expected, max_relative = 1e-5);
            }
        }
    }

    #[test]
    fn test_subtree_with_uncached_parent() {
        let (graph, _, nodes) = scene();
        let subtree_root = nodes[1];
        let mut subtree = Vec::new();
        graph.flatten(subtree_root, &mut subtree);

        let mut cache = TransformCache::new();
        cache.rebuild(&graph, &subtree).unwrap();
        assert_relative_eq!(
            *cache.get(&graph, subtree_root).unwrap(),
            graph.world_transform(subtree_root).unwrap(),
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_mutation_makes_cache_stale() {
        let (mut graph, root, nodes) = scene();
        let mut cache = TransformCache::new();
        cache.rebuild(&graph, &nodes).unwrap();
        assert!(cache.is_current(&graph));

        graph.set_position(root, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        assert!(!cache.is_current(&graph));
        assert_eq!(cache.slot(root), Some(0));
    }

    #[test]
    fn test_stale_id_rejected() {
        let (mut graph, _, mut nodes) = scene();
        let loose = graph.create_node("loose");
        graph.release(loose).unwrap();
        nodes.push(loose);

        let mut cache = TransformCache::new();
        assert_eq!(
            cache.rebuild(&graph, &nodes),
            Err(SceneError::StaleNode(loose))
        );
    }
}
