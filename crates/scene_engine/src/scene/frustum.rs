//! View frustum geometry
//!
//! [`ViewFrustum`] stores the vertical field of view, aspect ratio and the
//! front/back distances. The horizontal field of view is always derived, so
//! the two can never disagree.
//!
//! Plane tests take a `hint`: the index of the plane that rejected the object
//! last time. Testing starts there and wraps around, so an object that stays
//! off-screen in the same direction is rejected after a single plane test.

use nalgebra::Point3;

use crate::foundation::math::{utils, AffineExt, Mat4, Vec3};
use crate::scene::SceneError;

/// Number of frustum planes
pub const PLANE_COUNT: usize = 6;
/// Index of the left plane
pub const PLANE_LEFT: usize = 0;
/// Index of the right plane
pub const PLANE_RIGHT: usize = 1;
/// Index of the near (front) plane
pub const PLANE_NEAR: usize = 2;
/// Index of the far (back) plane
pub const PLANE_FAR: usize = 3;
/// Index of the top plane
pub const PLANE_TOP: usize = 4;
/// Index of the bottom plane
pub const PLANE_BOTTOM: usize = 5;

/// Largest accepted back-plane distance
pub const MAX_DISTANCE: f32 = 1.0e9;
/// Aspect ratio range accepted by [`ViewFrustum::set_aspect`]
pub const ASPECT_RANGE: (f32, f32) = (0.01, 100.0);

/// Scale deviation (of squared basis length) that triggers radius correction
const SCALE_EPSILON: f32 = 1e-3;

fn min_fov() -> f32 {
    utils::deg_to_rad(1.0)
}

fn max_fov() -> f32 {
    utils::deg_to_rad(179.0)
}

/// Plane with outward-facing unit normal
///
/// A point `p` lies outside when `normal · p - distance > 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Outward unit normal
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a plane from normal and distance
    pub const fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Signed distance of `point`, positive outside
    pub fn signed_distance(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) - self.distance
    }
}

/// Outcome of a frustum test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneTest {
    /// Object intersects the frustum
    pub visible: bool,
    /// Number of planes evaluated before the answer was known
    pub planes_tested: u8,
}

impl PlaneTest {
    const fn visible() -> Self {
        Self {
            visible: true,
            planes_tested: PLANE_COUNT as u8,
        }
    }

    const fn culled(planes_tested: usize) -> Self {
        Self {
            visible: false,
            planes_tested: planes_tested as u8,
        }
    }
}

/// Perspective view volume
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewFrustum {
    aspect: f32,
    front: f32,
    back: f32,
    vertical_fov: f32,
}

impl ViewFrustum {
    /// Create a validated frustum (`vertical_fov` in radians)
    pub fn new(vertical_fov: f32, front: f32, back: f32, aspect: f32) -> Result<Self, SceneError> {
        let mut frustum = Self::default();
        frustum.set_aspect(aspect)?;
        // Set back first so any valid front fits below it
        frustum.set_back(MAX_DISTANCE)?;
        frustum.set_front(front)?;
        frustum.set_back(back)?;
        frustum.set_vertical_fov(vertical_fov)?;
        Ok(frustum)
    }

    /// Horizontal FOV matching `vertical_fov` at the given front distance and aspect
    pub fn horizontal_fov_for(vertical_fov: f32, front: f32, aspect: f32) -> f32 {
        let half_height = front * (vertical_fov * 0.5).tan();
        let half_width = half_height * aspect;
        2.0 * half_width.atan2(front)
    }

    /// Vertical FOV matching `horizontal_fov` at the given front distance and aspect
    pub fn vertical_fov_for(horizontal_fov: f32, front: f32, aspect: f32) -> f32 {
        let half_width = front * (horizontal_fov * 0.5).tan();
        let half_height = half_width / aspect;
        2.0 * half_height.atan2(front)
    }

    /// Set the vertical field of view (radians)
    pub fn set_vertical_fov(&mut self, fov: f32) -> Result<(), SceneError> {
        if !(fov > min_fov() && fov < max_fov()) {
            return Err(SceneError::InvalidFrustum(format!(
                "vertical fov {:.2} degrees outside (1, 179)",
                utils::rad_to_deg(fov)
            )));
        }
        self.vertical_fov = fov;
        Ok(())
    }

    /// Set the horizontal field of view (radians); stored as vertical FOV
    pub fn set_horizontal_fov(&mut self, fov: f32) -> Result<(), SceneError> {
        if !(fov > min_fov() && fov < max_fov()) {
            return Err(SceneError::InvalidFrustum(format!(
                "horizontal fov {:.2} degrees outside (1, 179)",
                utils::rad_to_deg(fov)
            )));
        }
        self.set_vertical_fov(Self::vertical_fov_for(fov, self.front, self.aspect))
    }

    /// Set the near plane distance
    pub fn set_front(&mut self, front: f32) -> Result<(), SceneError> {
        if !(front > 0.0 && front < self.back) {
            return Err(SceneError::InvalidFrustum(format!(
                "front {front} must be within (0, {})",
                self.back
            )));
        }
        self.front = front;
        Ok(())
    }

    /// Set the far plane distance
    pub fn set_back(&mut self, back: f32) -> Result<(), SceneError> {
        if !(back > self.front && back <= MAX_DISTANCE) {
            return Err(SceneError::InvalidFrustum(format!(
                "back {back} must be within ({}, {MAX_DISTANCE}]",
                self.front
            )));
        }
        self.back = back;
        Ok(())
    }

    /// Set the viewport aspect ratio (width / height)
    pub fn set_aspect(&mut self, aspect: f32) -> Result<(), SceneError> {
        if !(aspect > ASPECT_RANGE.0 && aspect < ASPECT_RANGE.1) {
            return Err(SceneError::InvalidFrustum(format!(
                "aspect {aspect} outside ({}, {})",
                ASPECT_RANGE.0, ASPECT_RANGE.1
            )));
        }
        self.aspect = aspect;
        Ok(())
    }

    /// Vertical field of view (radians)
    pub const fn vertical_fov(&self) -> f32 {
        self.vertical_fov
    }

    /// Horizontal field of view (radians), derived
    pub fn horizontal_fov(&self) -> f32 {
        Self::horizontal_fov_for(self.vertical_fov, self.front, self.aspect)
    }

    /// Near plane distance
    pub const fn front(&self) -> f32 {
        self.front
    }

    /// Far plane distance
    pub const fn back(&self) -> f32 {
        self.back
    }

    /// Aspect ratio
    pub const fn aspect(&self) -> f32 {
        self.aspect
    }

    /// World-space planes (left, right, near, far, top, bottom)
    ///
    /// `world` is the camera's world transform; the camera looks down its
    /// +Z axis. Basis scale is removed before the normals are transformed.
    pub fn planes(&self, world: &Mat4) -> [Plane; PLANE_COUNT] {
        let (sin_x, cos_x) = (self.horizontal_fov() * 0.5).sin_cos();
        let (sin_y, cos_y) = (self.vertical_fov * 0.5).sin_cos();

        // Camera space: normals and plane distances
        let local = [
            (Vec3::new(-cos_x, 0.0, -sin_x), 0.0),
            (Vec3::new(cos_x, 0.0, -sin_x), 0.0),
            (Vec3::new(0.0, 0.0, -1.0), -self.front),
            (Vec3::new(0.0, 0.0, 1.0), self.back),
            (Vec3::new(0.0, cos_y, -sin_y), 0.0),
            (Vec3::new(0.0, -cos_y, -sin_y), 0.0),
        ];

        let axes = [
            world.basis(0).normalize(),
            world.basis(1).normalize(),
            world.basis(2).normalize(),
        ];
        let origin = world.translation_part();

        local.map(|(n, d)| {
            let normal = axes[0] * n.x + axes[1] * n.y + axes[2] * n.z;
            Plane::new(normal, d + normal.dot(&origin))
        })
    }

    /// Sphere test; the sphere sits at the translation of `transform`
    ///
    /// The sphere is culled when its centre is farther than `radius` outside
    /// any plane; a sphere exactly touching a plane is visible. `radius` is
    /// scaled by the largest basis length of `transform` when that differs
    /// from 1. On rejection `hint` is set to the rejecting plane.
    pub fn test_sphere(
        transform: &Mat4,
        radius: f32,
        planes: &[Plane; PLANE_COUNT],
        hint: &mut u8,
    ) -> PlaneTest {
        let center = transform.translation_part();
        let scale_squared = transform.max_basis_length_squared();
        let radius = if (scale_squared - 1.0).abs() > SCALE_EPSILON {
            radius * scale_squared.sqrt()
        } else {
            radius
        };

        let start = usize::from(*hint) % PLANE_COUNT;
        for i in 0..PLANE_COUNT {
            let index = (start + i) % PLANE_COUNT;
            if planes[index].signed_distance(&center) > radius {
                *hint = index as u8;
                return PlaneTest::culled(i + 1);
            }
        }
        PlaneTest::visible()
    }

    /// Conservative world-space axis-aligned box test
    pub fn test_aa_box(
        min: &Vec3,
        max: &Vec3,
        planes: &[Plane; PLANE_COUNT],
        hint: &mut u8,
    ) -> PlaneTest {
        Self::test_corners(&box_corners(min, max), planes, hint)
    }

    /// Conservative oriented box test: model-space box under `transform`
    pub fn test_o_box(
        transform: &Mat4,
        min: &Vec3,
        max: &Vec3,
        planes: &[Plane; PLANE_COUNT],
        hint: &mut u8,
    ) -> PlaneTest {
        let corners =
            box_corners(min, max).map(|c| transform.transform_point(&Point3::from(c)).coords);
        Self::test_corners(&corners, planes, hint)
    }

    /// Culled only when all corners are outside the same plane
    fn test_corners(
        corners: &[Vec3; 8],
        planes: &[Plane; PLANE_COUNT],
        hint: &mut u8,
    ) -> PlaneTest {
        let start = usize::from(*hint) % PLANE_COUNT;
        for i in 0..PLANE_COUNT {
            let index = (start + i) % PLANE_COUNT;
            let plane = &planes[index];
            if corners.iter().all(|c| plane.signed_distance(c) > 0.0) {
                *hint = index as u8;
                return PlaneTest::culled(i + 1);
            }
        }
        PlaneTest::visible()
    }
}

impl Default for ViewFrustum {
    fn default() -> Self {
        Self {
            aspect: 4.0 / 3.0,
            front: 0.1,
            back: 1000.0,
            vertical_fov: utils::deg_to_rad(60.0),
        }
    }
}

fn box_corners(min: &Vec3, max: &Vec3) -> [Vec3; 8] {
    [
        Vec3::new(min.x, min.y, min.z),
        Vec3::new(max.x, min.y, min.z),
        Vec3::new(min.x, max.y, min.z),
        Vec3::new(max.x, max.y, min.z),
        Vec3::new(min.x, min.y, max.z),
        Vec3::new(max.x, min.y, max.z),
        Vec3::new(min.x, max.y, max.z),
        Vec3::new(max.x, max.y, max.z),
    ]
}
