//! # Render pipeline
//!
//! Per-frame work that turns a [`SceneGraph`](crate::scene::SceneGraph) into
//! draw calls on an external [`RenderDevice`]:
//!
//! 1. flatten the subtree under the scene root (parents before children)
//! 2. cache world transforms ([`TransformCache`])
//! 3. cull visuals against the camera frustum, optionally sort by depth
//! 4. collect shaders and their priorities from the survivors
//! 5. collect lights ([`LightSorter`](crate::scene::LightSorter))
//! 6. dispatch each priority, even priorities front-to-back, odd back-to-front
//!
//! [`Camera::render`] runs the whole sequence. Multi-pass pipelines use
//! [`PipeSetup`] once per frame and then any number of [`Pipe`]s.

pub mod camera;
pub mod device;
pub mod pipe;
pub mod pipe_setup;
pub mod scope;
pub mod shader;
pub mod transform_cache;
pub mod visible_set;

#[cfg(test)]
mod tests;

pub use camera::{Camera, CullStats, MirrorGuard};
pub use device::RenderDevice;
pub use pipe::{render_frame, DefaultPipe, Pipe};
pub use pipe_setup::PipeSetup;
pub use scope::{CameraMatrices, RenderScope};
pub use shader::{render_passes, shader_key, Shader, ShaderRef, ShaderSort, SortDirection};
pub use transform_cache::TransformCache;
pub use visible_set::{VisibleSet, VisualEntry};

use thiserror::Error;

use crate::scene::{NodeId, SceneError};

/// Errors raised while rendering a frame
#[derive(Error, Debug)]
pub enum RenderError {
    /// The rendering device rejected an operation
    #[error("Device error: {0}")]
    Device(String),

    /// A shader failed to begin or end a pass
    #[error("Shader '{name}' failed: {message}")]
    Shader {
        /// Shader name
        name: String,
        /// Failure description
        message: String,
    },

    /// A visual failed to draw itself
    #[error("Visual {node:?} failed: {message}")]
    Visual {
        /// Node carrying the visual
        node: NodeId,
        /// Failure description
        message: String,
    },

    /// Scene graph error raised during frame preparation
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),
}

/// Result type for render operations
pub type RenderResult<T> = Result<T, RenderError>;
