//! Shader contract and dispatch order
//!
//! A shader's priority decides when its primitives are drawn. Priorities are
//! processed in descending order; within one priority, visuals are walked
//! front-to-back when the priority is even and back-to-front when it is odd,
//! so opaque geometry goes on even priorities and blended geometry on odd ones.

use std::fmt;
use std::rc::Rc;

use crate::render::{RenderDevice, RenderResult};

/// Preferred ordering of a shader's primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShaderSort {
    /// No preference
    #[default]
    Unsorted,
    /// Opaque geometry, nearest first
    FrontToBack,
    /// Blended geometry, farthest first
    BackToFront,
}

/// Visual walk direction for one priority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Visual list order (nearest first after a depth sort)
    Forward,
    /// Reverse visual list order
    Backward,
}

impl SortDirection {
    /// Direction for `priority`: even runs forward, odd backward
    pub const fn from_priority(priority: i32) -> Self {
        if priority.rem_euclid(2) == 0 {
            Self::Forward
        } else {
            Self::Backward
        }
    }
}

/// External shader collaborator
pub trait Shader: fmt::Debug {
    /// Shader name, for diagnostics
    fn name(&self) -> &str;

    /// Dispatch priority
    fn priority(&self) -> i32;

    /// Preferred ordering
    fn sort(&self) -> ShaderSort {
        ShaderSort::Unsorted
    }

    /// Bind the shader; returns the number of passes
    fn begin(&self, device: &mut dyn RenderDevice) -> RenderResult<usize>;

    /// Start pass `pass`
    fn begin_pass(&self, device: &mut dyn RenderDevice, pass: usize) -> RenderResult<()>;

    /// Finish the current pass
    fn end_pass(&self, device: &mut dyn RenderDevice) -> RenderResult<()>;

    /// Unbind the shader
    fn end(&self, device: &mut dyn RenderDevice) -> RenderResult<()>;

    /// Select a named technique; `None` restores the default
    fn set_technique(&self, technique: Option<&str>);
}

/// Shared shader handle
pub type ShaderRef = Rc<dyn Shader>;

/// Identity key of a shader handle, used to sort and de-duplicate
pub fn shader_key(shader: &ShaderRef) -> usize {
    Rc::as_ptr(shader).cast::<()>() as usize
}

/// Run `draw` once per shader pass
///
/// `begin_pass`/`end_pass` and `begin`/`end` are always paired, also when
/// `draw` fails; the first error wins.
pub fn render_passes<F>(
    shader: &dyn Shader,
    device: &mut dyn RenderDevice,
    mut draw: F,
) -> RenderResult<()>
where
    F: FnMut(&mut dyn RenderDevice, usize) -> RenderResult<()>,
{
    let passes = shader.begin(device)?;
    let mut outcome = Ok(());
    for pass in 0..passes {
        if let Err(e) = shader.begin_pass(device, pass) {
            outcome = Err(e);
            break;
        }
        let drawn = draw(device, pass);
        let ended = shader.end_pass(device);
        if let Err(e) = drawn.and(ended) {
            outcome = Err(e);
            break;
        }
    }
    let ended = shader.end(device);
    outcome.and(ended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderError;
    use crate::testing::{FakeDevice, RecordingShader};

    #[test]
    fn test_sort_direction_parity() {
        assert_eq!(SortDirection::from_priority(0), SortDirection::Forward);
        assert_eq!(SortDirection::from_priority(4), SortDirection::Forward);
        assert_eq!(SortDirection::from_priority(3), SortDirection::Backward);
        assert_eq!(SortDirection::from_priority(-1), SortDirection::Backward);
        assert_eq!(SortDirection::from_priority(-2), SortDirection::Forward);
    }

    #[test]
    fn test_shader_key_identity() {
        let log = Default::default();
        let a: ShaderRef = Rc::new(RecordingShader::new("a", 0, &log));
        let b: ShaderRef = Rc::new(RecordingShader::new("a", 0, &log));
        assert_eq!(shader_key(&a), shader_key(&a.clone()));
        assert_ne!(shader_key(&a), shader_key(&b));
    }

    #[test]
    fn test_render_passes_pairs_calls_on_error() {
        let log = Default::default();
        let shader = RecordingShader::new("two_pass", 0, &log).with_passes(2);
        let mut device = FakeDevice::default();

        let result = render_passes(&shader, &mut device, |_, pass| {
            if pass == 0 {
                Err(RenderError::Device("lost".into()))
            } else {
                Ok(())
            }
        });

        assert!(matches!(result, Err(RenderError::Device(_))));
        let calls: Vec<String> = log.borrow().iter().map(|(call, _)| call.clone()).collect();
        assert_eq!(
            calls,
            ["two_pass.begin", "two_pass.begin_pass", "two_pass.end_pass", "two_pass.end"]
        );
    }
}
