//! Per-frame aggregation for multi-pass pipelines
//!
//! [`PipeSetup::setup`] runs the preparation half of a frame once (flatten,
//! cache, cull, collect shaders, priorities and lights). Any number of pipes
//! can then dispatch from the same lists. The setup is stamped with the
//! device frame counter and the graph revision so stale use can be detected
//! with [`PipeSetup::valid`].

use std::ops::RangeInclusive;

use crate::render::{Camera, RenderDevice, RenderResult, ShaderRef, VisibleSet, VisualEntry};
use crate::scene::{LightSorter, NodeId, SceneError, SceneGraph};

/// Lists rebuilt once per frame
#[derive(Debug, Default)]
pub struct PipeSetup {
    nodes: Vec<NodeId>,
    visible: VisibleSet,
    lights: LightSorter,
    frame: Option<u64>,
    revision: Option<u64>,
}

impl PipeSetup {
    /// Create an empty, invalid setup
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare the frame for `camera`
    ///
    /// Flattens the subtree under the camera's root, caches world transforms,
    /// culls, collects shaders (unique by identity), priorities (unique,
    /// descending) and enabled lights, then stamps the frame.
    pub fn setup(
        &mut self,
        graph: &SceneGraph,
        camera: &mut Camera,
        device: &mut dyn RenderDevice,
    ) -> Result<(), SceneError> {
        self.frame = None;
        self.revision = None;

        let root = graph
            .root(camera.node())
            .ok_or(SceneError::StaleNode(camera.node()))?;
        graph.flatten(root, &mut self.nodes);
        camera.cache_transforms(graph, device, &self.nodes)?;

        self.visible.clear();
        camera.cull_visuals(graph, &self.nodes, self.visible.visuals_mut());
        self.visible.collect_shaders(graph);
        self.lights
            .collect_lights_cached(graph, &self.nodes, camera.transforms());

        self.frame = Some(device.frame_count());
        self.revision = Some(graph.revision());
        log::debug!(
            "Pipe setup for frame {}: {} nodes, {} visuals, {} shaders, {} lights",
            device.frame_count(),
            self.nodes.len(),
            self.visible.visuals().len(),
            self.visible.shaders().len(),
            self.lights.len()
        );
        Ok(())
    }

    /// Whether the lists belong to the device's current frame and graph state
    pub fn valid(&self, graph: &SceneGraph, device: &dyn RenderDevice) -> bool {
        self.frame == Some(device.frame_count()) && self.revision == Some(graph.revision())
    }

    /// Select `technique` on every collected shader
    pub fn set_technique(
        &self,
        graph: &SceneGraph,
        device: &dyn RenderDevice,
        technique: Option<&str>,
    ) {
        debug_assert!(
            self.valid(graph, device),
            "set_technique called on a stale pipe setup"
        );
        if !self.valid(graph, device) {
            log::warn!("Ignoring technique {:?}: pipe setup is stale", technique);
            return;
        }
        for shader in self.visible.shaders() {
            shader.set_technique(technique);
        }
    }

    /// Dispatch the prepared visuals for the priorities in `range`
    pub fn render(
        &mut self,
        graph: &SceneGraph,
        camera: &mut Camera,
        device: &mut dyn RenderDevice,
        range: RangeInclusive<i32>,
    ) -> RenderResult<()> {
        debug_assert!(
            self.valid(graph, device),
            "render called on a stale pipe setup"
        );
        camera.render_visuals(device, graph, range, &self.visible, &mut self.lights)
    }

    /// Flattened node list
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Visible visuals in dispatch order
    pub fn visuals(&self) -> &[VisualEntry] {
        self.visible.visuals()
    }

    /// Distinct shaders of the visible visuals
    pub fn shaders(&self) -> &[ShaderRef] {
        self.visible.shaders()
    }

    /// Distinct priorities, descending
    pub fn priorities(&self) -> &[i32] {
        self.visible.priorities()
    }

    /// Collected lights
    pub const fn lights(&self) -> &LightSorter {
        &self.lights
    }

    /// Frame the lists were built for
    pub const fn frame(&self) -> Option<u64> {
        self.frame
    }
}
