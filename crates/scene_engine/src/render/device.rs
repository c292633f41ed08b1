//! Rendering device contract
//!
//! The device is whatever backend actually issues draw calls. The pipeline
//! only needs projection control and a frame counter from it; visuals talk to
//! their concrete device type through their own channels.

use crate::foundation::math::Mat4;

/// External rendering context
pub trait RenderDevice {
    /// Set a perspective projection (`horizontal_fov` in radians)
    fn set_perspective_projection(
        &mut self,
        horizontal_fov: f32,
        front: f32,
        back: f32,
        aspect: f32,
    );

    /// Switch orthographic projection on or off
    fn set_orthographic_projection(&mut self, enabled: bool);

    /// Current projection matrix
    fn projection_transform(&self) -> Mat4;

    /// Viewport aspect ratio (width / height)
    fn aspect(&self) -> f32;

    /// Monotonic frame counter, incremented by the device once per frame
    fn frame_count(&self) -> u64;
}
