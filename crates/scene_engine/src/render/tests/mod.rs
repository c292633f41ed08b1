//! Frame-level scenarios: caching, culling, dispatch order and pipelines


use std::rc::Rc;

use crate::foundation::math::Vec3;
use crate::render::{Camera, ShaderRef};
use crate::scene::{Bound, NodeId, SceneGraph};
use crate::testing::{CallLog, FakeDevice, RecordingShader, RecordingVisual};

/// Scene with a camera at the origin looking down +Z
struct Fixture {
    graph: SceneGraph,
    root: NodeId,
    camera: Camera,
    device: FakeDevice,
    log: CallLog,
}

impl Fixture {
    fn new() -> Self {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        let camera = Camera::new(&mut graph, "camera");
        graph.link_to(camera.node(), root).unwrap();
        Self {
            graph,
            root,
            camera,
            device: FakeDevice::default(),
            log: CallLog::default(),
        }
    }

    fn shader(&self, name: &str, priority: i32) -> ShaderRef {
        Rc::new(RecordingShader::new(name, priority, &self.log))
    }

    /// Visual linked under the root at `position`
    fn visual(&mut self, name: &str, position: Vec3, shaders: &[&ShaderRef]) -> NodeId {
        let base = RecordingVisual::new(name, &self.log);
        let visual = shaders.iter().fold(base, |v, s| v.with_shader(s));
        self.visual_with(name, position, visual)
    }

    fn visual_with(&mut self, name: &str, position: Vec3, visual: RecordingVisual) -> NodeId {
        let id = self.graph.create_visual(name, Box::new(visual));
        self.graph.set_position(id, position).unwrap();
        self.graph.link_to(id, self.root).unwrap();
        id
    }

    fn bounded_visual(&mut self, name: &str, position: Vec3, bound: Bound) -> NodeId {
        let visual = RecordingVisual::new(name, &self.log).with_bound(bound);
        self.visual_with(name, position, visual)
    }

    /// Flatten and cache; returns the flattened node list
    fn cache(&mut self) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        self.graph.flatten(self.root, &mut nodes);
        self.camera
            .cache_transforms(&self.graph, &mut self.device, &nodes)
            .unwrap();
        nodes
    }

    /// Visible nodes after a cache and cull pass
    fn visible(&mut self) -> Vec<NodeId> {
        let nodes = self.cache();
        let mut out = Vec::new();
        self.camera.cull_visuals(&self.graph, &nodes, &mut out);
        out.iter().map(|entry| entry.node).collect()
    }

    /// Names recorded by visuals (shader calls filtered out)
    fn rendered(&self) -> Vec<(String, i32)> {
        self.log
            .borrow()
            .iter()
            .filter(|(call, _)| !call.contains('.'))
            .cloned()
            .collect()
    }
}
