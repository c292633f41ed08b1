//! Drawable nodes
//!
//! A visual node stores a boxed [`Visual`] implementation together with its
//! [`Bound`]. Bounds come in three flavours:
//!
//! - **model space box** (default): tested with the node's cached world
//!   transform, sphere radius measured from the model origin
//! - **world space box** (`BoundFlags::WORLD_SPACE`): geometry that streams
//!   in world coordinates, e.g. particles
//! - **infinite** (`BoundFlags::INFINITE`): always visible, culling skipped

use std::fmt;

use bitflags::bitflags;

use crate::foundation::math::Vec3;
use crate::render::{RenderDevice, RenderResult, RenderScope, ShaderRef};
use crate::scene::node::{NodeClass, NodeId};

/// Largest magnitude stored in a bound
///
/// Keeps "huge" bounds finite so no IEEE infinities reach the plane math.
pub const MAX_BOUND_EXTENT: f32 = 1.0e18;

bitflags! {
    /// Bounding volume flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BoundFlags: u8 {
        /// Box is expressed in world coordinates
        const WORLD_SPACE = 1 << 0;
        /// Always visible, skip culling
        const INFINITE = 1 << 1;
    }
}

/// Bounding volume of a visual
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    min: Vec3,
    max: Vec3,
    radius: f32,
    flags: BoundFlags,
}

fn clamp_extent(v: Vec3) -> Vec3 {
    v.map(|c| c.clamp(-MAX_BOUND_EXTENT, MAX_BOUND_EXTENT))
}

impl Bound {
    /// Model-space box; the sphere radius encloses the box from the model origin
    pub fn model_box(min: Vec3, max: Vec3) -> Self {
        let min = clamp_extent(min);
        let max = clamp_extent(max);
        let far_corner = min.abs().sup(&max.abs());
        Self {
            min,
            max,
            radius: far_corner.norm().min(MAX_BOUND_EXTENT),
            flags: BoundFlags::empty(),
        }
    }

    /// World-space box; the sphere is centred on the box
    pub fn world_box(min: Vec3, max: Vec3) -> Self {
        let min = clamp_extent(min);
        let max = clamp_extent(max);
        Self {
            min,
            max,
            radius: ((max - min) * 0.5).norm().min(MAX_BOUND_EXTENT),
            flags: BoundFlags::WORLD_SPACE,
        }
    }

    /// Bound that is never culled
    pub fn infinite() -> Self {
        let extent = Vec3::repeat(MAX_BOUND_EXTENT);
        Self {
            min: -extent,
            max: extent,
            radius: MAX_BOUND_EXTENT,
            flags: BoundFlags::INFINITE,
        }
    }

    /// Model-space bound of a sphere around the model origin
    pub fn sphere(radius: f32) -> Self {
        let r = radius.abs().min(MAX_BOUND_EXTENT);
        Self::model_box(Vec3::repeat(-r), Vec3::repeat(r))
    }

    /// Box minimum
    pub const fn min(&self) -> Vec3 {
        self.min
    }

    /// Box maximum
    pub const fn max(&self) -> Vec3 {
        self.max
    }

    /// Box centre
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Bounding sphere radius
    pub const fn radius(&self) -> f32 {
        self.radius
    }

    /// Flags
    pub const fn flags(&self) -> BoundFlags {
        self.flags
    }

    /// Always visible
    pub const fn is_infinite(&self) -> bool {
        self.flags.contains(BoundFlags::INFINITE)
    }

    /// Box is expressed in world coordinates
    pub const fn is_world_space(&self) -> bool {
        self.flags.contains(BoundFlags::WORLD_SPACE)
    }
}

impl Default for Bound {
    fn default() -> Self {
        Self::model_box(Vec3::zeros(), Vec3::zeros())
    }
}

/// Contract for everything drawable
///
/// The camera calls [`render`](Visual::render) once per active priority, so
/// an implementation must draw only the primitives whose shader priority
/// equals `priority`.
pub trait Visual: fmt::Debug {
    /// Class tag reported for the owning node
    fn class(&self) -> NodeClass {
        NodeClass::OtherVisual
    }

    /// Draw the parts of this visual that use shaders of `priority`
    fn render(
        &self,
        device: &mut dyn RenderDevice,
        scope: &mut RenderScope<'_>,
        node: NodeId,
        priority: i32,
    ) -> RenderResult<()>;

    /// Append the shaders used by this visual; must not clear `out`
    fn shaders(&self, out: &mut Vec<ShaderRef>);

    /// Compute the bounding volume
    fn compute_bound(&self) -> Bound;

    /// Deep copy with all render-relevant state
    fn clone_visual(&self) -> Box<dyn Visual>;
}

/// Visual payload stored in a node body
#[derive(Debug)]
pub struct VisualSlot {
    bound: Bound,
    visual: Box<dyn Visual>,
}

impl VisualSlot {
    pub(crate) fn new(visual: Box<dyn Visual>) -> Self {
        Self {
            bound: visual.compute_bound(),
            visual,
        }
    }

    pub(crate) fn duplicate(&self) -> Self {
        Self {
            bound: self.bound,
            visual: self.visual.clone_visual(),
        }
    }

    /// Current bound
    pub const fn bound(&self) -> &Bound {
        &self.bound
    }

    pub(crate) fn set_bound(&mut self, bound: Bound) {
        self.bound = bound;
    }

    pub(crate) fn refresh_bound(&mut self) {
        self.bound = self.visual.compute_bound();
    }

    /// The drawable
    pub fn visual(&self) -> &dyn Visual {
        self.visual.as_ref()
    }
}
