//! Culled visuals and the shaders/priorities they use

use std::ops::Range;

use crate::render::{shader_key, ShaderRef};
use crate::scene::{NodeId, SceneGraph};

/// A visual that survived culling
#[derive(Debug, Clone, PartialEq)]
pub struct VisualEntry {
    /// Visual node
    pub node: NodeId,
    /// View-space depth of the node origin
    pub depth: f32,
    priorities: Range<usize>,
}

impl VisualEntry {
    /// Entry with no priorities collected yet
    pub const fn new(node: NodeId, depth: f32) -> Self {
        Self {
            node,
            depth,
            priorities: 0..0,
        }
    }
}

/// Visible visuals of one frame plus the shaders and priorities they use
#[derive(Debug, Default)]
pub struct VisibleSet {
    visuals: Vec<VisualEntry>,
    visual_priorities: Vec<i32>,
    shaders: Vec<ShaderRef>,
    priorities: Vec<i32>,
    shader_scratch: Vec<ShaderRef>,
}

impl VisibleSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything; buffers keep their capacity
    pub fn clear(&mut self) {
        self.visuals.clear();
        self.visual_priorities.clear();
        self.shaders.clear();
        self.priorities.clear();
    }

    /// Visible visuals in dispatch order
    pub fn visuals(&self) -> &[VisualEntry] {
        &self.visuals
    }

    /// Output list for the cull pass
    pub fn visuals_mut(&mut self) -> &mut Vec<VisualEntry> {
        &mut self.visuals
    }

    /// Distinct shaders of the visible visuals, ordered by identity
    pub fn shaders(&self) -> &[ShaderRef] {
        &self.shaders
    }

    /// Distinct priorities of the visible visuals, descending
    pub fn priorities(&self) -> &[i32] {
        &self.priorities
    }

    /// Shader priorities used by one visual
    pub fn priorities_of(&self, entry: &VisualEntry) -> &[i32] {
        &self.visual_priorities[entry.priorities.clone()]
    }

    /// Gather shaders and priorities from the current visual list
    pub fn collect_shaders(&mut self, graph: &SceneGraph) {
        self.visual_priorities.clear();
        self.shaders.clear();
        self.priorities.clear();

        for entry in &mut self.visuals {
            self.shader_scratch.clear();
            if let Some(slot) = graph.visual(entry.node) {
                slot.visual().shaders(&mut self.shader_scratch);
            }

            let start = self.visual_priorities.len();
            for shader in self.shader_scratch.drain(..) {
                let priority = shader.priority();
                if !self.visual_priorities[start..].contains(&priority) {
                    self.visual_priorities.push(priority);
                }
                self.shaders.push(shader);
            }
            entry.priorities = start..self.visual_priorities.len();
        }

        self.shaders.sort_unstable_by_key(shader_key);
        self.shaders.dedup_by_key(|shader| shader_key(shader));

        self.priorities.extend(self.shaders.iter().map(|shader| shader.priority()));
        self.priorities.sort_unstable_by(|a, b| b.cmp(a));
        self.priorities.dedup();

        log::trace!(
            "Collected {} shaders, {} priorities from {} visuals",
            self.shaders.len(),
            self.priorities.len(),
            self.visuals.len()
        );
    }
}
