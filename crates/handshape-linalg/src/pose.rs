use glam::{Quat, Vec3};

/// A rigid transform: rotation followed by translation.
///
/// The rotation is kept unit length by every constructor and operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Translation applied after the rotation.
    pub position: Vec3,
    /// Unit rotation quaternion.
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// Creates a pose, normalising `rotation`.
    ///
    /// A degenerate (zero or non-finite) quaternion is replaced by the identity.
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        let rotation = if rotation.length_squared() > 0.0 && rotation.is_finite() {
            rotation.normalize()
        } else {
            Quat::IDENTITY
        };
        Self { position, rotation }
    }

    /// Pure translation.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// Pure rotation.
    pub fn from_rotation(rotation: Quat) -> Self {
        Self::new(Vec3::ZERO, rotation)
    }

    /// Composition `self ∘ other`: applies `other` first, then `self`.
    pub fn multiply(&self, other: &Pose) -> Pose {
        Pose::new(
            self.position + self.rotation * other.position,
            self.rotation * other.rotation,
        )
    }

    /// The inverse transform.
    pub fn inverse(&self) -> Pose {
        let rotation = self.rotation.inverse();
        Pose {
            position: -(rotation * self.position),
            rotation,
        }
    }

    /// Maps a point from local into parent space.
    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.position
    }

    /// Maps a point from parent into local space.
    #[inline]
    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse() * (point - self.position)
    }

    /// Rotates a direction, ignoring the translation.
    #[inline]
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }
}

impl std::ops::Mul for Pose {
    type Output = Pose;

    fn mul(self, rhs: Pose) -> Pose {
        self.multiply(&rhs)
    }
}

impl std::ops::Mul<Vec3> for Pose {
    type Output = Vec3;

    fn mul(self, rhs: Vec3) -> Vec3 {
        self.transform_point(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_vec3_eq(a: Vec3, b: Vec3) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-5);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-5);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-5);
    }

    #[test]
    fn test_new_normalizes_rotation() {
        let pose = Pose::new(Vec3::ONE, Quat::from_xyzw(0.0, 0.0, 2.0, 2.0));
        assert_relative_eq!(pose.rotation.length(), 1.0, epsilon = 1e-6);

        let pose = Pose::new(Vec3::ONE, Quat::from_xyzw(0.0, 0.0, 0.0, 0.0));
        assert_eq!(pose.rotation, Quat::IDENTITY);
    }

    #[test]
    fn test_transform_and_inverse() {
        let pose = Pose::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
        );
        let p = pose.transform_point(Vec3::X);
        assert_vec3_eq(p, Vec3::new(1.0, 3.0, 3.0));
        assert_vec3_eq(pose.inverse_transform_point(p), Vec3::X);
        assert_vec3_eq(pose.inverse().transform_point(p), Vec3::X);
        assert_vec3_eq(pose * Vec3::X, p);
    }

    #[test]
    fn test_multiply_composes() {
        let a = Pose::new(Vec3::new(0.5, 0.0, -1.0), Quat::from_rotation_x(0.3));
        let b = Pose::new(Vec3::new(0.0, 2.0, 1.0), Quat::from_rotation_y(-1.1));
        let point = Vec3::new(0.2, -0.4, 0.9);

        let composed = a * b;
        assert_vec3_eq(
            composed.transform_point(point),
            a.transform_point(b.transform_point(point)),
        );

        let identity = composed * composed.inverse();
        assert_vec3_eq(identity.position, Vec3::ZERO);
        assert_relative_eq!(identity.rotation.w.abs(), 1.0, epsilon = 1e-5);
    }
}
