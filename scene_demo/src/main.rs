//! Headless scene demo
//!
//! Builds a scene of randomly scattered crates and lamps, orbits a camera
//! around it for a few frames and renders through a device that only logs
//! draw calls. Pass a `.toml` or `.ron` pipeline configuration as the first
//! argument to override the defaults.

use std::cell::Cell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scene_engine::foundation::logging;
use scene_engine::foundation::math::utils;
use scene_engine::prelude::*;
use thiserror::Error;

const FRAMES: u64 = 4;
const CRATES: usize = 200;
const LAMPS: usize = 12;
const ORBIT_RADIUS: f32 = 80.0;

#[derive(Error, Debug)]
enum DemoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

/// Device that keeps the projection and frame counter, nothing else
#[derive(Debug)]
struct LoggingDevice {
    aspect: f32,
    frame: u64,
    projection: Mat4,
}

impl LoggingDevice {
    fn new(aspect: f32) -> Self {
        Self {
            aspect,
            frame: 0,
            projection: Mat4::identity(),
        }
    }

    fn next_frame(&mut self) {
        self.frame += 1;
    }
}

impl RenderDevice for LoggingDevice {
    fn set_perspective_projection(
        &mut self,
        horizontal_fov: f32,
        front: f32,
        back: f32,
        aspect: f32,
    ) {
        let vertical_fov = ViewFrustum::vertical_fov_for(horizontal_fov, front, aspect);
        self.projection = Mat4::new_perspective(aspect, vertical_fov, front, back);
    }

    fn set_orthographic_projection(&mut self, enabled: bool) {
        if enabled {
            self.projection = Mat4::new_orthographic(-1.0, 1.0, -1.0, 1.0, 0.1, 1000.0);
        }
    }

    fn projection_transform(&self) -> Mat4 {
        self.projection
    }

    fn aspect(&self) -> f32 {
        self.aspect
    }

    fn frame_count(&self) -> u64 {
        self.frame
    }
}

/// Single-pass shader that counts how often it is bound
#[derive(Debug)]
struct FlatShader {
    name: &'static str,
    priority: i32,
    binds: Cell<usize>,
}

impl FlatShader {
    fn new(name: &'static str, priority: i32) -> Self {
        Self {
            name,
            priority,
            binds: Cell::new(0),
        }
    }
}

impl Shader for FlatShader {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn sort(&self) -> ShaderSort {
        if self.priority.rem_euclid(2) == 0 {
            ShaderSort::FrontToBack
        } else {
            ShaderSort::BackToFront
        }
    }

    fn begin(&self, _device: &mut dyn RenderDevice) -> RenderResult<usize> {
        self.binds.set(self.binds.get() + 1);
        Ok(1)
    }

    fn begin_pass(&self, _device: &mut dyn RenderDevice, _pass: usize) -> RenderResult<()> {
        Ok(())
    }

    fn end_pass(&self, _device: &mut dyn RenderDevice) -> RenderResult<()> {
        Ok(())
    }

    fn end(&self, _device: &mut dyn RenderDevice) -> RenderResult<()> {
        Ok(())
    }

    fn set_technique(&self, technique: Option<&str>) {
        log::trace!("{}: technique {:?}", self.name, technique);
    }
}

/// Box-shaped visual drawn with one shader
#[derive(Debug, Clone)]
struct Crate {
    half_extent: f32,
    shader: ShaderRef,
}

impl Visual for Crate {
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
        if self.shader.priority() != priority {
            return Ok(());
        }
        let Some(world) = scope.world_transform(node) else {
            return Ok(());
        };
        let position = world.translation_part();
        let graph = scope.graph();
        let incoming: Vec3 = scope
            .lights_by_distance(&position)
            .iter()
            .filter_map(|&light| graph.light(light))
            .map(Light::radiance)
            .sum();
        log::trace!(
            "Drawing {:?} at {:?}, incoming light {:?}",
            node,
            position,
            incoming
        );

        render_passes(self.shader.as_ref(), device, |_, _| Ok(()))?;
        Ok(())
    }

    fn shaders(&self, out: &mut Vec<ShaderRef>) {
        out.push(Rc::clone(&self.shader));
    }

    fn compute_bound(&self) -> Bound {
        let h = self.half_extent;
        Bound::model_box(Vec3::repeat(-h), Vec3::repeat(h))
    }

    fn clone_visual(&self) -> Box<dyn Visual> {
        Box::new(self.clone())
    }
}

fn load_config() -> Result<PipelineConfig, DemoError> {
    let config = match std::env::args().nth(1) {
        Some(path) => PipelineConfig::load_from_file(&path)?,
        None => PipelineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn build_scene(
    graph: &mut SceneGraph,
    root: NodeId,
    shaders: &[ShaderRef],
) -> Result<(), DemoError> {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    let template = graph.create_visual(
        "crate",
        Box::new(Crate {
            half_extent: 1.0,
            shader: Rc::clone(&shaders[0]),
        }),
    );

    for i in 0..CRATES {
        let id = if i % 4 == 0 {
            graph.create_visual(
                format!("glass{i}"),
                Box::new(Crate {
                    half_extent: rng.gen_range(0.5..2.0),
                    shader: Rc::clone(&shaders[1]),
                }),
            )
        } else {
            graph.clone_subtree(template)?
        };
        let position = Vec3::new(
            rng.gen_range(-60.0..60.0),
            rng.gen_range(-5.0..5.0),
            rng.gen_range(-60.0..60.0),
        );
        graph.set_position(id, position)?;
        graph.link_to(id, root)?;
        // The parent link keeps the node alive
        graph.release(id)?;
    }
    graph.release(template)?;

    for i in 0..LAMPS {
        let color = Vec3::new(rng.gen(), rng.gen(), rng.gen());
        let light = if i % 3 == 0 {
            let (inner, outer) = (utils::deg_to_rad(20.0), utils::deg_to_rad(30.0));
            Light::spot(color, 2.0, 40.0, inner, outer)
        } else {
            Light::point(color, 1.0, 25.0)
        };
        let lamp = graph.create_light(format!("lamp{i}"), light);
        let position = Vec3::new(rng.gen_range(-60.0..60.0), 10.0, rng.gen_range(-60.0..60.0));
        graph.set_position(lamp, position)?;
        // Spots hang above the scene and shine down
        let below = Vec3::new(position.x, 0.0, position.z + 1.0);
        graph.look_at(lamp, below, Vec3::y())?;
        graph.link_to(lamp, root)?;
        graph.release(lamp)?;
    }
    let sun = graph.create_light("sun", Light::directional(Vec3::new(1.0, 0.95, 0.9), 0.6));
    graph.link_to(sun, root)?;
    graph.release(sun)?;

    log::info!("Scene built: {} nodes", graph.len());
    Ok(())
}

fn run() -> Result<(), DemoError> {
    let config = load_config()?;
    logging::init_with_level(&config.log_level);
    log::info!("Starting scene demo with {:?}", config);

    let mut graph = SceneGraph::new();
    let root = graph.create_node("root");
    let opaque = Rc::new(FlatShader::new("opaque", 2));
    let glass = Rc::new(FlatShader::new("glass", 1));
    let shaders: Vec<ShaderRef> = vec![opaque.clone(), glass.clone()];
    build_scene(&mut graph, root, &shaders)?;

    let mut camera = Camera::from_config(&mut graph, "camera", &config)?;
    graph.link_to(camera.node(), root)?;

    let mut device = LoggingDevice::new(config.frustum.aspect);
    let mut setup = PipeSetup::new();
    let mut pipes: Vec<Box<dyn Pipe>> = vec![
        Box::new(
            DefaultPipe::new()
                .with_priorities(2, 2)
                .with_technique("depth_prepass"),
        ),
        Box::new(DefaultPipe::new()),
    ];

    for frame in 0..FRAMES {
        device.next_frame();

        let angle = utils::deg_to_rad(90.0 * frame as f32);
        let eye = Vec3::new(ORBIT_RADIUS * angle.cos(), 15.0, ORBIT_RADIUS * angle.sin());
        graph.set_position(camera.node(), eye)?;
        graph.look_at(camera.node(), Vec3::zeros(), Vec3::y())?;

        opaque.binds.set(0);
        glass.binds.set(0);
        render_frame(&graph, &mut camera, &mut device, &mut setup, &mut pipes)?;

        let stats = camera.stats();
        println!(
            "frame {}: {} visible / {} tested ({} culled, {} plane tests), {} lights, \
             priorities {:?}, binds opaque={} glass={}",
            device.frame_count(),
            setup.visuals().len(),
            stats.visuals_tested,
            stats.visuals_culled,
            stats.plane_tests,
            setup.lights().len(),
            setup.priorities(),
            opaque.binds.get(),
            glass.binds.get()
        );
    }

    {
        let mirrored = camera.mirrored(&mut graph)?;
        device.next_frame();
        camera.render(&mirrored, &mut device)?;
        let stats = camera.stats();
        log::info!(
            "Mirrored frame rendered with {} visible",
            stats.visuals_tested - stats.visuals_culled
        );
    }

    camera.destroy(&mut graph)?;
    log::info!("Scene demo finished, {} nodes remain", graph.len());
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        log::error!("Scene demo failed: {}", e);
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
