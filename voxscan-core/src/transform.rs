//! World transforms applied to a mesh before it is scanned.
use nalgebra::{Matrix4, Vector3};

/// Rotation state around three axes (in radians)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationState {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl RotationState {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    /// Rotate by delta amounts (in radians)
    pub fn rotate(&mut self, dx: f32, dy: f32, dz: f32) {
        self.x += dx;
        self.y += dy;
        self.z += dz;
    }
}

impl Default for RotationState {
    fn default() -> Self {
        Self::zero()
    }
}

/// Transform matrix builders.
pub struct Transform;

impl Transform {
    /// Create a rotation matrix from a rotation state
    pub fn rotation_matrix(rotation: &RotationState) -> Matrix4<f32> {
        let rx = Matrix4::new_rotation(Vector3::new(rotation.x, 0.0, 0.0));
        let ry = Matrix4::new_rotation(Vector3::new(0.0, rotation.y, 0.0));
        let rz = Matrix4::new_rotation(Vector3::new(0.0, 0.0, rotation.z));

        // Apply rotations in order: Z, Y, X
        rz * ry * rx
    }

    /// Create a translation matrix
    pub fn translation_matrix(x: f32, y: f32, z: f32) -> Matrix4<f32> {
        Matrix4::new_translation(&Vector3::new(x, y, z))
    }

    /// Create a scale matrix
    pub fn scale_matrix(sx: f32, sy: f32, sz: f32) -> Matrix4<f32> {
        Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz))
    }
}

/// Position, rotation and per-axis scale of a mesh in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldTransform {
    pub position: Vector3<f32>,
    pub rotation: RotationState,
    pub scale: Vector3<f32>,
}

impl WorldTransform {
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: RotationState::zero(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Identity transform with the same scale on every axis.
    pub fn uniform(scale: f32) -> Self {
        Self {
            scale: Vector3::new(scale, scale, scale),
            ..Self::identity()
        }
    }

    /// Model matrix: translate * rotate * scale.
    pub fn matrix(&self) -> Matrix4<f32> {
        let p = self.position;
        let s = self.scale;
        Transform::translation_matrix(p.x, p.y, p.z)
            * Transform::rotation_matrix(&self.rotation)
            * Transform::scale_matrix(s.x, s.y, s.z)
    }
}

impl Default for WorldTransform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn test_rotation_state() {
        let mut state = RotationState::zero();
        assert_eq!(state.x, 0.0);
        assert_eq!(state.y, 0.0);
        assert_eq!(state.z, 0.0);

        state.rotate(0.1, 0.2, 0.3);
        assert!((state.x - 0.1).abs() < 1e-6);
        assert!((state.y - 0.2).abs() < 1e-6);
        assert!((state.z - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_identity_rotation() {
        let rotation = RotationState::zero();
        let matrix = Transform::rotation_matrix(&rotation);
        assert!((matrix - Matrix4::identity()).norm() < 1e-6);
    }

    #[test]
    fn test_world_transform_order() {
        // Scale first, then translate.
        let transform = WorldTransform {
            position: Vector3::new(1.0, 0.0, 0.0),
            rotation: RotationState::zero(),
            scale: Vector3::new(2.0, 2.0, 2.0),
        };
        let p = transform.matrix().transform_point(&Point3::new(1.0, 1.0, 1.0));
        assert!((p - Point3::new(3.0, 2.0, 2.0)).norm() < 1e-6);
    }

    #[test]
    fn test_quarter_turn_about_z() {
        let transform = WorldTransform {
            rotation: RotationState::new(0.0, 0.0, std::f32::consts::FRAC_PI_2),
            ..WorldTransform::identity()
        };
        let p = transform.matrix().transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert!((p - Point3::new(0.0, 1.0, 0.0)).norm() < 1e-6);
    }
}
