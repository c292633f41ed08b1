//! Nearest-light queries
//!
//! The sorter holds the enabled lights of a frame together with their world
//! positions. [`LightSorter::lights_by_distance`] answers "which lights are
//! closest to this point" into a buffer that is reused across queries; the
//! returned slice borrows the sorter, so only one result can be held at a time.

use std::cmp::Ordering;

use crate::foundation::math::{AffineExt, Vec3};
use crate::render::TransformCache;
use crate::scene::graph::SceneGraph;
use crate::scene::light::{Light, LightType};
use crate::scene::node::{NodeClass, NodeId};

/// Upper bound on lights returned by a single query
pub const MAX_LIGHTS: usize = 8;

/// A collected light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightEntry {
    /// Light node
    pub node: NodeId,
    /// World position of the light node
    pub position: Vec3,
    /// Light type; directional lights ignore position
    pub light_type: LightType,
}

/// Working set of lights with a reusable nearest-N query
#[derive(Debug, Default)]
pub struct LightSorter {
    lights: Vec<LightEntry>,
    distances: Vec<(f32, usize)>,
    result: Vec<NodeId>,
}

impl LightSorter {
    /// Create an empty sorter
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a light at the given world position
    pub fn add_light(&mut self, node: NodeId, light: &Light, position: Vec3) {
        self.lights.push(LightEntry {
            node,
            position,
            light_type: light.light_type,
        });
    }

    /// Forget all collected lights
    pub fn remove_lights(&mut self) {
        self.lights.clear();
        self.result.clear();
    }

    /// Number of collected lights
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    /// Whether no lights are collected
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Collected lights in collection order
    pub fn lights(&self) -> &[LightEntry] {
        &self.lights
    }

    /// Replace the working set with the enabled lights under `root`
    ///
    /// World positions are composed from the graph directly.
    pub fn collect_lights(&mut self, graph: &SceneGraph, root: NodeId) {
        self.remove_lights();
        for id in graph.descendants(root) {
            if !graph.enabled(id) {
                continue;
            }
            if let (Some(light), Some(position)) = (graph.light(id), graph.world_position(id)) {
                self.add_light(id, light, position);
            }
        }
        log::trace!("Collected {} lights under {:?}", self.lights.len(), root);
    }

    /// Replace the working set with the enabled lights in `nodes`
    ///
    /// World positions come from `cache`, which must be current for `graph`.
    pub fn collect_lights_cached(
        &mut self,
        graph: &SceneGraph,
        nodes: &[NodeId],
        cache: &TransformCache,
    ) {
        self.remove_lights();
        for &id in nodes {
            let Some(node) = graph.get(id) else { continue };
            if node.class() != NodeClass::Light || !node.enabled() {
                continue;
            }
            let (Some(light), Some(world)) = (node.light(), cache.get(graph, id)) else {
                continue;
            };
            self.add_light(id, light, world.translation_part());
        }
        log::trace!(
            "Collected {} lights from {} nodes",
            self.lights.len(),
            nodes.len()
        );
    }

    /// Up to `max_lights` (and at most [`MAX_LIGHTS`]) lights closest to `position`
    ///
    /// Ordered by ascending squared distance; directional lights come first.
    /// The returned slice is overwritten by the next query.
    pub fn lights_by_distance(&mut self, position: &Vec3, max_lights: usize) -> &[NodeId] {
        self.result.clear();
        let count = max_lights.min(MAX_LIGHTS).min(self.lights.len());
        if count == 0 {
            return &self.result;
        }

        self.distances.clear();
        self.distances.extend(self.lights.iter().enumerate().map(|(i, light)| {
            let distance = match light.light_type {
                LightType::Directional => -1.0,
                LightType::Point | LightType::Spot => (light.position - position).norm_squared(),
            };
            (distance, i)
        }));

        if count < self.distances.len() {
            self.distances.select_nth_unstable_by(count, compare_distance);
            self.distances.truncate(count);
        }
        self.distances.sort_unstable_by(compare_distance);

        self.result
            .extend(self.distances.iter().map(|&(_, i)| self.lights[i].node));
        &self.result
    }
}

fn compare_distance(a: &(f32, usize), b: &(f32, usize)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}
