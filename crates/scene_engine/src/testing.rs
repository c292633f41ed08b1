//! Recording fakes shared by the unit tests

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::foundation::math::{AffineExt, Mat4};
use crate::render::{
    render_passes, RenderDevice, RenderError, RenderResult, RenderScope, Shader, ShaderRef,
};
use crate::scene::{Bound, NodeClass, NodeId, Visual};

/// Shared call log: `(call, priority)`
pub type CallLog = Rc<RefCell<Vec<(String, i32)>>>;

/// Device that records projection changes
#[derive(Debug)]
pub struct FakeDevice {
    pub aspect: f32,
    pub frame: u64,
    pub orthographic: bool,
    pub perspective: Option<(f32, f32, f32, f32)>,
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self {
            aspect: 1.0,
            frame: 1,
            orthographic: false,
            perspective: None,
        }
    }
}

impl RenderDevice for FakeDevice {
    fn set_perspective_projection(
        &mut self,
        horizontal_fov: f32,
        front: f32,
        back: f32,
        aspect: f32,
    ) {
        self.perspective = Some((horizontal_fov, front, back, aspect));
    }

    fn set_orthographic_projection(&mut self, enabled: bool) {
        self.orthographic = enabled;
    }

    fn projection_transform(&self) -> Mat4 {
        match self.perspective {
            Some((fov, front, back, aspect)) if !self.orthographic => {
                Mat4::new_perspective(aspect, fov / aspect, front, back)
            }
            _ => Mat4::identity(),
        }
    }

    fn aspect(&self) -> f32 {
        self.aspect
    }

    fn frame_count(&self) -> u64 {
        self.frame
    }
}

/// Shader that logs its begin/end protocol
#[derive(Debug)]
pub struct RecordingShader {
    name: String,
    priority: i32,
    passes: usize,
    log: CallLog,
    technique: RefCell<Option<String>>,
}

impl RecordingShader {
    pub fn new(name: &str, priority: i32, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            priority,
            passes: 1,
            log: Rc::clone(log),
            technique: RefCell::new(None),
        }
    }

    pub fn with_passes(mut self, passes: usize) -> Self {
        self.passes = passes;
        self
    }

    pub fn technique(&self) -> Option<String> {
        self.technique.borrow().clone()
    }

    fn record(&self, call: &str) {
        self.log
            .borrow_mut()
            .push((format!("{}.{call}", self.name), self.priority));
    }
}

impl Shader for RecordingShader {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn begin(&self, _device: &mut dyn RenderDevice) -> RenderResult<usize> {
        self.record("begin");
        Ok(self.passes)
    }

    fn begin_pass(&self, _device: &mut dyn RenderDevice, _pass: usize) -> RenderResult<()> {
        self.record("begin_pass");
        Ok(())
    }

    fn end_pass(&self, _device: &mut dyn RenderDevice) -> RenderResult<()> {
        self.record("end_pass");
        Ok(())
    }

    fn end(&self, _device: &mut dyn RenderDevice) -> RenderResult<()> {
        self.record("end");
        Ok(())
    }

    fn set_technique(&self, technique: Option<&str>) {
        *self.technique.borrow_mut() = technique.map(str::to_string);
    }
}

/// Visual that logs `(name, priority)` for every render call
#[derive(Debug, Clone)]
pub struct RecordingVisual {
    name: String,
    shaders: Vec<ShaderRef>,
    bound: Bound,
    log: CallLog,
    fail_at: Option<i32>,
    lights_seen: Rc<Cell<usize>>,
}

impl RecordingVisual {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            shaders: Vec::new(),
            bound: Bound::sphere(1.0),
            log: Rc::clone(log),
            fail_at: None,
            lights_seen: Rc::default(),
        }
    }

    pub fn with_shader(mut self, shader: &ShaderRef) -> Self {
        self.shaders.push(Rc::clone(shader));
        self
    }

    pub fn with_bound(mut self, bound: Bound) -> Self {
        self.bound = bound;
        self
    }

    pub fn failing_at(mut self, priority: i32) -> Self {
        self.fail_at = Some(priority);
        self
    }

    /// Number of lights returned to the last render call
    pub fn lights_seen(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.lights_seen)
    }
}

impl Visual for RecordingVisual {
    fn class(&self) -> NodeClass {
        NodeClass::Mesh
    }

    fn render(
        &self,
        device: &mut dyn RenderDevice,
        scope: &mut RenderScope<'_>,
        node: NodeId,
        priority: i32,
    ) -> RenderResult<()> {
        self.log.borrow_mut().push((self.name.clone(), priority));

        let position = scope
            .world_transform(node)
            .map(|world| world.translation_part())
            .ok_or_else(|| RenderError::Visual {
                node,
                message: "not cached".into(),
            })?;
        self.lights_seen.set(scope.lights_by_distance(&position).len());

        if self.fail_at == Some(priority) {
            return Err(RenderError::Visual {
                node,
                message: format!("{} failed", self.name),
            });
        }

        for shader in self.shaders.iter().filter(|s| s.priority() == priority) {
            render_passes(shader.as_ref(), device, |_, _| Ok(()))?;
        }
        Ok(())
    }

    fn shaders(&self, out: &mut Vec<ShaderRef>) {
        out.extend(self.shaders.iter().cloned());
    }

    fn compute_bound(&self) -> Bound {
        self.bound
    }

    fn clone_visual(&self) -> Box<dyn Visual> {
        Box::new(self.clone())
    }
}
