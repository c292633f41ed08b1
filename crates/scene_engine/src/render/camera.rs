//! # Camera
//!
//! The camera runs the per-frame core: world transform caching, frustum
//! culling with temporal plane hints, optional depth sorting and the priority
//! dispatch loop.
//!
//! ## Coordinate convention
//!
//! Left-handed, Y up. The camera looks down its local +Z axis, so view-space
//! depth is positive in front of the camera.
//!
//! ## Frame sequence
//!
//! ```text
//! flatten(root) -> cache_transforms -> cull_visuals -> collect shaders
//!               -> collect lights   -> render_visuals (per priority)
//! ```
//!
//! [`Camera::render`] performs the whole sequence with the camera's own
//! scratch lists. [`PipeSetup`](crate::render::PipeSetup) performs the
//! preparation once per frame for multi-pass pipelines.

use std::ops::{Deref, DerefMut, RangeInclusive};

use slotmap::SecondaryMap;

use crate::config::ConfigError;
use crate::core::config::{BoundingTest, CullConfig, PipelineConfig};
use crate::foundation::math::{AffineExt, Mat4};
use crate::render::{
    CameraMatrices, RenderDevice, RenderResult, RenderScope, SortDirection, TransformCache,
    VisibleSet, VisualEntry,
};
use crate::scene::frustum::PLANE_COUNT;
use crate::scene::{LightSorter, NodeId, Plane, SceneError, SceneGraph, ViewFrustum, MAX_LIGHTS};

/// Tolerance of the stale-camera consistency check
const CAMERA_MATCH_TOLERANCE: f32 = 1e-3;

/// Counters of the last cull pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CullStats {
    /// Enabled visuals considered
    pub visuals_tested: usize,
    /// Visuals rejected by the frustum
    pub visuals_culled: usize,
    /// Individual plane evaluations
    pub plane_tests: usize,
}

/// Scratch lists of the single-call [`Camera::render`] path
#[derive(Debug, Default)]
struct FrameScratch {
    nodes: Vec<NodeId>,
    visible: VisibleSet,
    lights: LightSorter,
}

/// Scene camera
#[derive(Debug)]
pub struct Camera {
    node: NodeId,
    frustum: ViewFrustum,
    orthographic: bool,
    culling: CullConfig,
    max_lights: usize,
    transforms: TransformCache,
    matrices: CameraMatrices,
    planes: [Plane; PLANE_COUNT],
    hints: SecondaryMap<NodeId, u8>,
    bones: Vec<Mat4>,
    scratch: FrameScratch,
    stats: CullStats,
}

impl Camera {
    /// Create a camera node in `graph` with default settings
    ///
    /// The camera holds the node's owner reference; link the node into the
    /// scene and position it through the graph.
    pub fn new(graph: &mut SceneGraph, name: impl Into<String>) -> Self {
        let node = graph.create_camera_node(name);
        let frustum = ViewFrustum::default();
        Self {
            node,
            frustum,
            orthographic: false,
            culling: CullConfig::default(),
            max_lights: MAX_LIGHTS,
            transforms: TransformCache::new(),
            matrices: CameraMatrices::default(),
            planes: frustum.planes(&Mat4::identity()),
            hints: SecondaryMap::new(),
            bones: Vec::new(),
            scratch: FrameScratch::default(),
            stats: CullStats::default(),
        }
    }

    /// Create a camera from a validated pipeline configuration
    pub fn from_config(
        graph: &mut SceneGraph,
        name: impl Into<String>,
        config: &PipelineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut camera = Self::new(graph, name);
        camera.frustum = config.frustum.build()?;
        camera.culling = config.culling;
        camera.max_lights = config.max_lights;
        log::info!(
            "Camera {:?} configured: culling={:?}, max_lights={}",
            camera.node,
            camera.culling,
            camera.max_lights
        );
        Ok(camera)
    }

    /// Release the camera's owner reference on its node
    pub fn destroy(self, graph: &mut SceneGraph) -> Result<(), SceneError> {
        graph.release(self.node)
    }

    /// Camera node
    pub const fn node(&self) -> NodeId {
        self.node
    }

    /// View frustum
    pub const fn frustum(&self) -> &ViewFrustum {
        &self.frustum
    }

    /// Mutable view frustum
    pub fn frustum_mut(&mut self) -> &mut ViewFrustum {
        &mut self.frustum
    }

    /// Whether orthographic projection is used
    pub const fn orthographic(&self) -> bool {
        self.orthographic
    }

    /// Switch between orthographic and perspective projection
    pub fn set_orthographic(&mut self, orthographic: bool) {
        self.orthographic = orthographic;
    }

    /// Cull configuration
    pub const fn culling(&self) -> &CullConfig {
        &self.culling
    }

    /// Replace the cull configuration
    pub fn set_culling(&mut self, culling: CullConfig) {
        self.culling = culling;
    }

    /// Lights handed to a visual per query
    pub const fn max_lights(&self) -> usize {
        self.max_lights
    }

    /// Set the per-query light limit (clamped to [`MAX_LIGHTS`])
    pub fn set_max_lights(&mut self, max_lights: usize) {
        self.max_lights = max_lights.min(MAX_LIGHTS);
    }

    /// Counters of the last cull pass
    pub const fn stats(&self) -> CullStats {
        self.stats
    }

    /// Transform cache of the last cache pass
    pub const fn transforms(&self) -> &TransformCache {
        &self.transforms
    }

    /// World-space frustum planes of the last cache pass
    pub const fn planes(&self) -> &[Plane; PLANE_COUNT] {
        &self.planes
    }

    /// Camera matrices; only valid until the graph changes
    pub fn matrices(&self, graph: &SceneGraph) -> Option<&CameraMatrices> {
        debug_assert!(
            self.transforms.is_current(graph),
            "camera matrices read outside a cache/dispatch pass"
        );
        self.transforms.is_current(graph).then_some(&self.matrices)
    }

    /// Cached world transform of `id`; only valid until the graph changes
    pub fn cached_world_transform(&self, graph: &SceneGraph, id: NodeId) -> Option<&Mat4> {
        self.transforms.get(graph, id)
    }

    /// Cache world transforms of `nodes` and set up the device projection
    ///
    /// `nodes` must list parents before children. Also syncs the frustum
    /// aspect with the device and recomputes the camera's own world, view
    /// and view-projection matrices and frustum planes.
    pub fn cache_transforms(
        &mut self,
        graph: &SceneGraph,
        device: &mut dyn RenderDevice,
        nodes: &[NodeId],
    ) -> Result<(), SceneError> {
        self.transforms.rebuild(graph, nodes)?;

        let aspect = device.aspect();
        if (aspect - self.frustum.aspect()).abs() > f32::EPSILON {
            if let Err(e) = self.frustum.set_aspect(aspect) {
                log::warn!("Ignoring device aspect for camera {:?}: {}", self.node, e);
            }
        }

        if self.orthographic {
            device.set_orthographic_projection(true);
        } else {
            device.set_orthographic_projection(false);
            device.set_perspective_projection(
                self.frustum.horizontal_fov(),
                self.frustum.front(),
                self.frustum.back(),
                self.frustum.aspect(),
            );
        }

        let world = match self.transforms.slot(self.node) {
            Some(_) => self.transforms.get(graph, self.node).copied(),
            None => graph.world_transform(self.node),
        }
        .ok_or(SceneError::StaleNode(self.node))?;
        let view = world
            .affine_inverse()
            .ok_or(SceneError::SingularTransform(self.node))?;
        let projection = device.projection_transform();

        self.matrices = CameraMatrices {
            world,
            view,
            projection,
            view_projection: projection * view,
        };
        self.planes = self.frustum.planes(&world);

        if self.hints.len() > 2 * graph.len().max(16) {
            self.hints.retain(|id, _| graph.contains(id));
        }
        Ok(())
    }

    /// Whether the cached camera world transform still matches the graph
    fn camera_matches_graph(&self, graph: &SceneGraph) -> bool {
        graph.world_transform(self.node).is_some_and(|fresh| {
            let scale = fresh.amax().max(1.0);
            (fresh - self.matrices.world).amax() <= CAMERA_MATCH_TOLERANCE * scale
        })
    }

    /// Append the visible visuals of `nodes` to `out` (after clearing it)
    ///
    /// Must follow [`cache_transforms`](Self::cache_transforms) with the same
    /// node list and no graph change in between.
    pub fn cull_visuals(
        &mut self,
        graph: &SceneGraph,
        nodes: &[NodeId],
        out: &mut Vec<VisualEntry>,
    ) {
        out.clear();
        self.stats = CullStats::default();

        debug_assert!(
            self.transforms.is_current(graph),
            "cull_visuals called without a current cache_transforms pass"
        );
        if !self.transforms.is_current(graph) {
            log::warn!(
                "Skipping cull pass for camera {:?}: stale transform cache",
                self.node
            );
            return;
        }
        debug_assert!(
            self.camera_matches_graph(graph),
            "camera moved after cache_transforms"
        );

        let test_frustum = self.culling.frustum_culling && !self.orthographic;

        for &id in nodes {
            let Some(node) = graph.get(id) else { continue };
            if !node.class().is_visual() || !node.enabled() {
                continue;
            }
            let (Some(bound), Some(world)) = (node.bound(), self.transforms.get(graph, id)) else {
                continue;
            };
            self.stats.visuals_tested += 1;

            if test_frustum && !bound.is_infinite() {
                let mut hint = self.hints.get(id).copied().unwrap_or(0);
                let result = if bound.is_world_space() {
                    ViewFrustum::test_aa_box(&bound.min(), &bound.max(), &self.planes, &mut hint)
                } else {
                    match self.culling.bounding_test {
                        BoundingTest::Sphere => {
                            ViewFrustum::test_sphere(world, bound.radius(), &self.planes, &mut hint)
                        }
                        BoundingTest::OrientedBox => ViewFrustum::test_o_box(
                            world,
                            &bound.min(),
                            &bound.max(),
                            &self.planes,
                            &mut hint,
                        ),
                    }
                };
                self.hints.insert(id, hint);
                self.stats.plane_tests += usize::from(result.planes_tested);

                if !result.visible {
                    self.stats.visuals_culled += 1;
                    continue;
                }
            }

            let position = if bound.is_world_space() {
                bound.center()
            } else {
                world.translation_part()
            };
            out.push(VisualEntry::new(id, self.matrices.view_depth(&position)));
        }

        if self.culling.z_sort {
            out.sort_by(|a, b| a.depth.total_cmp(&b.depth));
        }

        log::trace!(
            "Camera {:?} culled {}/{} visuals ({} plane tests)",
            self.node,
            self.stats.visuals_culled,
            self.stats.visuals_tested,
            self.stats.plane_tests
        );
    }

    /// Dispatch the visible set for every collected priority in `range`
    ///
    /// Priorities run in descending order. Even priorities walk the visual
    /// list forward, odd priorities backward; a visual is only called for
    /// priorities its own shaders use. A failing visual is logged and the
    /// loop continues; the first error is returned afterwards.
    pub fn render_visuals(
        &mut self,
        device: &mut dyn RenderDevice,
        graph: &SceneGraph,
        range: RangeInclusive<i32>,
        set: &VisibleSet,
        lights: &mut LightSorter,
    ) -> RenderResult<()> {
        debug_assert!(
            self.transforms.is_current(graph),
            "render_visuals called without a current cache_transforms pass"
        );
        if !self.transforms.is_current(graph) {
            log::warn!(
                "Skipping dispatch for camera {:?}: stale transform cache",
                self.node
            );
            return Ok(());
        }

        let mut scope = RenderScope::new(
            graph,
            &self.transforms,
            &self.matrices,
            lights,
            self.max_lights,
            &mut self.bones,
        );
        let mut first_error = None;

        for &priority in set.priorities().iter().filter(|&&p| range.contains(&p)) {
            let mut forward;
            let mut backward;
            let direction = SortDirection::from_priority(priority);
            let order: &mut dyn Iterator<Item = &VisualEntry> = match direction {
                SortDirection::Forward => {
                    forward = set.visuals().iter();
                    &mut forward
                }
                SortDirection::Backward => {
                    backward = set.visuals().iter().rev();
                    &mut backward
                }
            };

            for entry in order {
                if !set.priorities_of(entry).contains(&priority) {
                    continue;
                }
                let Some(slot) = graph.visual(entry.node) else { continue };
                if let Err(e) = slot.visual().render(device, &mut scope, entry.node, priority) {
                    log::warn!(
                        "Visual {:?} failed at priority {}: {}",
                        entry.node,
                        priority,
                        e
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Render the scene the camera is linked into
    ///
    /// Flattens the subtree under the camera's root node and runs the full
    /// cache, cull, collect and dispatch sequence for all priorities.
    pub fn render(
        &mut self,
        graph: &SceneGraph,
        device: &mut dyn RenderDevice,
    ) -> RenderResult<()> {
        let root = graph.root(self.node).ok_or(SceneError::StaleNode(self.node))?;
        let mut scratch = std::mem::take(&mut self.scratch);
        let result = self.render_with(graph, device, root, &mut scratch);
        self.scratch = scratch;
        result
    }

    fn render_with(
        &mut self,
        graph: &SceneGraph,
        device: &mut dyn RenderDevice,
        root: NodeId,
        scratch: &mut FrameScratch,
    ) -> RenderResult<()> {
        graph.flatten(root, &mut scratch.nodes);
        self.cache_transforms(graph, device, &scratch.nodes)?;

        scratch.visible.clear();
        self.cull_visuals(graph, &scratch.nodes, scratch.visible.visuals_mut());
        scratch.visible.collect_shaders(graph);
        scratch
            .lights
            .collect_lights_cached(graph, &scratch.nodes, &self.transforms);

        self.render_visuals(
            device,
            graph,
            i32::MIN..=i32::MAX,
            &scratch.visible,
            &mut scratch.lights,
        )
    }

    /// Negate the X axis of the camera's local transform
    ///
    /// Used around rendering to a device with the opposite handedness. Must
    /// be called in pairs; prefer [`mirrored`](Self::mirrored).
    pub fn mirror_x_axis(&self, graph: &mut SceneGraph) -> Result<(), SceneError> {
        let mut transform = *graph
            .transform(self.node)
            .ok_or(SceneError::StaleNode(self.node))?;
        let x = transform.basis(0);
        transform.set_basis(0, -x);
        graph.set_transform(self.node, transform)
    }

    /// Mirror the camera for the lifetime of the returned guard
    pub fn mirrored<'g>(&self, graph: &'g mut SceneGraph) -> Result<MirrorGuard<'g>, SceneError> {
        self.mirror_x_axis(graph)?;
        Ok(MirrorGuard {
            graph,
            node: self.node,
        })
    }
}

/// Keeps a camera mirrored until dropped
///
/// Dereferences to the scene graph so the scene can be rendered while the
/// mirror is active.
#[derive(Debug)]
pub struct MirrorGuard<'g> {
    graph: &'g mut SceneGraph,
    node: NodeId,
}

impl Deref for MirrorGuard<'_> {
    type Target = SceneGraph;

    fn deref(&self) -> &SceneGraph {
        self.graph
    }
}

impl DerefMut for MirrorGuard<'_> {
    fn deref_mut(&mut self) -> &mut SceneGraph {
        self.graph
    }
}

impl Drop for MirrorGuard<'_> {
    fn drop(&mut self) {
        let Some(&transform) = self.graph.transform(self.node) else {
            log::warn!(
                "Mirrored camera {:?} was destroyed before unmirroring",
                self.node
            );
            return;
        };
        let mut restored = transform;
        restored.set_basis(0, -transform.basis(0));
        if let Err(e) = self.graph.set_transform(self.node, restored) {
            log::warn!("Failed to unmirror camera {:?}: {}", self.node, e);
        }
    }
}
