//! # Scene Engine
//!
//! Scene-graph render pipeline: an arena-backed node hierarchy, per-frame
//! world transform caching, view frustum culling and priority-ordered
//! dispatch of visuals to an external rendering device.
//!
//! ## Features
//!
//! - **Scene graph**: generational node handles, O(1) link/unlink, stateless
//!   pre-order traversal, cycle rejection at link time
//! - **Frustum culling**: sphere, axis-aligned and oriented box tests with
//!   per-visual plane hints for frame-to-frame coherence
//! - **Priority dispatch**: even priorities front-to-back, odd back-to-front
//! - **Light queries**: nearest-N lights for any point in the scene
//! - **Multi-pass pipelines**: one [`render::PipeSetup`] per frame, any
//!   number of [`render::Pipe`]s
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_engine::prelude::*;
//!
//! struct NullDevice;
//!
//! impl RenderDevice for NullDevice {
//!     fn set_perspective_projection(&mut self, _: f32, _: f32, _: f32, _: f32) {}
//!     fn set_orthographic_projection(&mut self, _enabled: bool) {}
//!     fn projection_transform(&self) -> Mat4 { Mat4::identity() }
//!     fn aspect(&self) -> f32 { 16.0 / 9.0 }
//!     fn frame_count(&self) -> u64 { 0 }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut graph = SceneGraph::new();
//!     let root = graph.create_node("root");
//!     let mut camera = Camera::new(&mut graph, "camera");
//!     graph.link_to(camera.node(), root)?;
//!
//!     let mut device = NullDevice;
//!     camera.render(&graph, &mut device)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod render;
pub mod scene;

#[cfg(test)]
mod testing;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        core::config::{BoundingTest, CullConfig, FrustumConfig, PipelineConfig},
        foundation::math::{AffineExt, Mat4, Vec3},
        render::{
            render_frame, render_passes, Camera, CullStats, DefaultPipe, Pipe, PipeSetup,
            RenderDevice, RenderError, RenderResult, RenderScope, Shader, ShaderRef, ShaderSort,
        },
        scene::{
            Bound, Light, LightSorter, LightType, NodeClass, NodeId, SceneError, SceneGraph,
            ViewFrustum, Visual,
        },
    };
}
