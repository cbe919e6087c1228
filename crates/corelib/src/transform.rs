use crate::{EulerRot, Mat4, Quat, Vec3};

/// Model transform: scale and rotate about `pivot`, then translate.
/// Euler angles are in radians, XYZ order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation_euler: Vec3,
    pub scale: Vec3,
    pub pivot: Vec3,
}

impl Transform {
    #[inline]
    pub const fn identity() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation_euler: Vec3::ZERO,
            scale: Vec3::ONE,
            pivot: Vec3::ZERO,
        }
    }

    /// Pure rotation about `pivot`.
    #[inline]
    pub fn rotation_about(pivot: Vec3, rotation_euler: Vec3) -> Self {
        Self {
            rotation_euler,
            pivot,
            ..Self::identity()
        }
    }

    #[inline]
    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    #[inline]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(
            EulerRot::XYZ,
            self.rotation_euler.x,
            self.rotation_euler.y,
            self.rotation_euler.z,
        )
    }

    /// matrix = T(translation + pivot) * R * S * T(-pivot), column-major.
    #[inline]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.scale,
            self.rotation(),
            self.translation + self.pivot,
        ) * Mat4::from_translation(-self.pivot)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
