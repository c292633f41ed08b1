//! Pipeline stages
//!
//! A pipe renders from a prepared [`PipeSetup`]. Several pipes can share one
//! setup per frame, e.g. a depth pre-pass with its own technique followed by
//! the main pass.

use crate::render::{Camera, PipeSetup, RenderDevice, RenderResult};
use crate::scene::SceneGraph;

/// One stage of a frame pipeline
pub trait Pipe {
    /// Stage name, for diagnostics
    fn name(&self) -> &str;

    /// Render from `setup`, which is valid for the current frame
    fn render(
        &mut self,
        graph: &SceneGraph,
        camera: &mut Camera,
        device: &mut dyn RenderDevice,
        setup: &mut PipeSetup,
    ) -> RenderResult<()>;
}

/// Renders a priority range with an optional shader technique
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultPipe {
    /// Lowest priority rendered
    pub min_priority: i32,
    /// Highest priority rendered
    pub max_priority: i32,
    /// Technique applied to the collected shaders; `None` selects the default
    pub technique: Option<String>,
}

impl DefaultPipe {
    /// Pipe rendering every priority with the default technique
    pub const fn new() -> Self {
        Self {
            min_priority: i32::MIN,
            max_priority: i32::MAX,
            technique: None,
        }
    }

    /// Restrict to `min..=max`
    pub const fn with_priorities(mut self, min: i32, max: i32) -> Self {
        self.min_priority = min;
        self.max_priority = max;
        self
    }

    /// Use a named technique
    pub fn with_technique(mut self, technique: impl Into<String>) -> Self {
        self.technique = Some(technique.into());
        self
    }
}

impl Default for DefaultPipe {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipe for DefaultPipe {
    fn name(&self) -> &str {
        self.technique.as_deref().unwrap_or("default")
    }

    fn render(
        &mut self,
        graph: &SceneGraph,
        camera: &mut Camera,
        device: &mut dyn RenderDevice,
        setup: &mut PipeSetup,
    ) -> RenderResult<()> {
        setup.set_technique(graph, device, self.technique.as_deref());
        setup.render(graph, camera, device, self.min_priority..=self.max_priority)
    }
}

/// Prepare `setup` for this frame and run every pipe in order
///
/// The frame is aborted at the first failing pipe.
pub fn render_frame(
    graph: &SceneGraph,
    camera: &mut Camera,
    device: &mut dyn RenderDevice,
    setup: &mut PipeSetup,
    pipes: &mut [Box<dyn Pipe>],
) -> RenderResult<()> {
    setup.setup(graph, camera, device)?;
    for pipe in pipes.iter_mut() {
        log::trace!("Running pipe '{}'", pipe.name());
        pipe.render(graph, camera, device, setup)?;
    }
    Ok(())
}
