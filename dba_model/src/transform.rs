use std::ops::Mul;

use glam::{Mat4, Quat, Vec3};

/// A rigid transform applying rotation and then translation.
///
/// Animation channels only store rotation and position, so scale is ignored.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// Decompose `value` while discarding any scale.
    pub fn from_matrix(value: Mat4) -> Self {
        let (_, rotation, translation) = value.to_scale_rotation_translation();
        Self {
            translation,
            rotation: rotation.normalize(),
        }
    }

    pub fn inverse(self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            translation: rotation.mul_vec3(-self.translation),
            rotation,
        }
    }
}

impl Mul<Transform> for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Self::Output {
        Transform {
            translation: self.rotation.mul_vec3(rhs.translation) + self.translation,
            rotation: self.rotation * rhs.rotation,
        }
    }
}

impl From<Transform> for dba_lib::dba::Locator {
    fn from(value: Transform) -> Self {
        Self {
            rotation: value.rotation.to_array(),
            translation: value.translation.to_array(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use glam::vec3;

    #[test]
    fn transform_from_matrix_ignores_scale() {
        assert_eq!(
            Transform {
                translation: vec3(1.0, 2.0, 3.0),
                rotation: Quat::from_xyzw(1.0, 0.0, 0.0, 0.0),
            },
            Transform::from_matrix(Mat4::from_cols_array_2d(&[
                [4.0, 0.0, 0.0, 0.0],
                [0.0, -5.0, 0.0, 0.0],
                [0.0, 0.0, -6.0, 0.0],
                [1.0, 2.0, 3.0, 1.0],
            ]))
        );
    }

    #[test]
    fn transform_mul_inverse() {
        let transform = Transform {
            translation: vec3(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_z(0.5),
        };
        let identity = transform * transform.inverse();
        assert_relative_eq!(
            Vec3::ZERO.to_array()[..],
            identity.translation.to_array()[..],
            epsilon = 1e-6
        );
        assert_relative_eq!(
            Quat::IDENTITY.to_array()[..],
            identity.rotation.to_array()[..],
            epsilon = 1e-6
        );
    }
}
