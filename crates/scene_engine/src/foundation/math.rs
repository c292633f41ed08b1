//! Math utilities and types
//!
//! Thin layer over `nalgebra`. Node transforms are affine `Mat4` values whose
//! bottom row is always `[0, 0, 0, 1]`; the helpers in [`AffineExt`] read and
//! write their basis columns and translation without going through a full
//! 4x4 inversion.
//!
//! # Coordinate convention
//! Left-handed, Y-up, with the local +Z axis as "forward". Cameras look down
//! their +Z axis and view-space depth grows away from the eye. Devices using
//! the opposite handedness flip the camera X axis around rendering (see
//! `Camera::mirrored`).

pub use nalgebra::{Matrix3, Matrix4, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;

    /// Smallest determinant accepted when inverting a transform
    pub const MIN_DETERMINANT: f32 = 1e-12;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }
}

/// Accessors for affine (3x4 + implicit `0 0 0 1` row) transforms
pub trait AffineExt {
    /// Build an affine transform from three basis columns and a translation
    fn from_basis(x: Vec3, y: Vec3, z: Vec3, translation: Vec3) -> Mat4;

    /// Translation column
    fn translation_part(&self) -> Vec3;

    /// Set the translation column
    fn set_translation_part(&mut self, translation: Vec3);

    /// Basis column `axis` (0 = X, 1 = Y, 2 = Z)
    fn basis(&self, axis: usize) -> Vec3;

    /// Overwrite basis column `axis`
    fn set_basis(&mut self, axis: usize, column: Vec3);

    /// Upper-left 3x3 block
    fn rotation_part(&self) -> Mat3;

    /// Overwrite the upper-left 3x3 block
    fn set_rotation_part(&mut self, rotation: &Mat3);

    /// Largest squared length of the three basis columns
    fn max_basis_length_squared(&self) -> f32;

    /// Inverse of an affine transform, `None` when the 3x3 block is singular
    fn affine_inverse(&self) -> Option<Mat4>;
}

impl AffineExt for Mat4 {
    #[rustfmt::skip]
    fn from_basis(x: Vec3, y: Vec3, z: Vec3, translation: Vec3) -> Mat4 {
        Mat4::new(
            x.x, y.x, z.x, translation.x,
            x.y, y.y, z.y, translation.y,
            x.z, y.z, z.z, translation.z,
            0.0, 0.0, 0.0, 1.0,
        )
    }

    fn translation_part(&self) -> Vec3 {
        Vec3::new(self[(0, 3)], self[(1, 3)], self[(2, 3)])
    }

    fn set_translation_part(&mut self, translation: Vec3) {
        self[(0, 3)] = translation.x;
        self[(1, 3)] = translation.y;
        self[(2, 3)] = translation.z;
    }

    fn basis(&self, axis: usize) -> Vec3 {
        Vec3::new(self[(0, axis)], self[(1, axis)], self[(2, axis)])
    }

    fn set_basis(&mut self, axis: usize, column: Vec3) {
        self[(0, axis)] = column.x;
        self[(1, axis)] = column.y;
        self[(2, axis)] = column.z;
    }

    fn rotation_part(&self) -> Mat3 {
        self.fixed_view::<3, 3>(0, 0).into_owned()
    }

    fn set_rotation_part(&mut self, rotation: &Mat3) {
        self.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
    }

    fn max_basis_length_squared(&self) -> f32 {
        self.basis(0)
            .norm_squared()
            .max(self.basis(1).norm_squared())
            .max(self.basis(2).norm_squared())
    }

    fn affine_inverse(&self) -> Option<Mat4> {
        let rotation = self.rotation_part();
        if rotation.determinant().abs() < constants::MIN_DETERMINANT {
            return None;
        }
        let inv_rotation = rotation.try_inverse()?;
        let inv_translation = -(inv_rotation * self.translation_part());

        let mut inverse = Mat4::identity();
        inverse.set_rotation_part(&inv_rotation);
        inverse.set_translation_part(inv_translation);
        Some(inverse)
    }
}
