//! Rendering scope handed to visuals during dispatch
//!
//! Everything a visual may look up while drawing (cached world transforms,
//! camera matrices, nearby lights, bone scratch space) lives here for the
//! duration of one dispatch call. The scope borrows the graph immutably, so
//! the cache cannot go stale while it exists.

use crate::foundation::math::{Mat4, Vec3};
use crate::render::TransformCache;
use crate::scene::{Light, LightSorter, NodeId, SceneGraph};

/// Camera matrices computed by the transform pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    /// Camera world transform
    pub world: Mat4,
    /// Inverse of the world transform
    pub view: Mat4,
    /// Device projection
    pub projection: Mat4,
    /// `projection * view`
    pub view_projection: Mat4,
}

impl Default for CameraMatrices {
    fn default() -> Self {
        Self {
            world: Mat4::identity(),
            view: Mat4::identity(),
            projection: Mat4::identity(),
            view_projection: Mat4::identity(),
        }
    }
}

impl CameraMatrices {
    /// View-space depth of a world-space point (positive in front of the camera)
    pub fn view_depth(&self, point: &Vec3) -> f32 {
        let row = self.view.row(2);
        row[0] * point.x + row[1] * point.y + row[2] * point.z + row[3]
    }
}

/// Per-dispatch context
#[derive(Debug)]
pub struct RenderScope<'a> {
    graph: &'a SceneGraph,
    transforms: &'a TransformCache,
    camera: &'a CameraMatrices,
    lights: &'a mut LightSorter,
    max_lights: usize,
    bone_scratch: &'a mut Vec<Mat4>,
}

impl<'a> RenderScope<'a> {
    pub(crate) fn new(
        graph: &'a SceneGraph,
        transforms: &'a TransformCache,
        camera: &'a CameraMatrices,
        lights: &'a mut LightSorter,
        max_lights: usize,
        bone_scratch: &'a mut Vec<Mat4>,
    ) -> Self {
        debug_assert!(
            transforms.is_current(graph),
            "render scope opened on a stale transform cache"
        );
        Self {
            graph,
            transforms,
            camera,
            lights,
            max_lights,
            bone_scratch,
        }
    }

    /// The scene being drawn
    pub const fn graph(&self) -> &'a SceneGraph {
        self.graph
    }

    /// Cached world transform of `id`
    pub fn world_transform(&self, id: NodeId) -> Option<&'a Mat4> {
        self.transforms.get(self.graph, id)
    }

    /// Matrices of the rendering camera
    pub const fn camera(&self) -> &'a CameraMatrices {
        self.camera
    }

    /// Lights nearest to `position`, capped by the configured light limit
    pub fn lights_by_distance(&mut self, position: &Vec3) -> &[NodeId] {
        self.lights.lights_by_distance(position, self.max_lights)
    }

    /// Light payload of a light node
    pub fn light(&self, id: NodeId) -> Option<&'a Light> {
        self.graph.light(id)
    }

    /// Scratch array of `count` bone matrices, reused across draw calls
    pub fn bone_scratch(&mut self, count: usize) -> &mut [Mat4] {
        self.bone_scratch.resize(count, Mat4::identity());
        &mut self.bone_scratch[..count]
    }
}
