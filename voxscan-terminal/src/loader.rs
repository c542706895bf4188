//! Model loading and the initial fit pose
use std::fs;
use std::path::Path;

use nalgebra::Vector3;
use tracing::info;
use voxscan_core::{stl, Mesh, Result, RotationState, VoxScanError, WorldTransform};

/// Largest dimension of a fitted model, in world units.
pub const FIT_SIZE: f32 = 20.0;

/// Rotation about Z applied when a model is fitted.
pub const FIT_ROTATION_Z: f32 = 1.57;

/// Read a model file, dispatching on its extension.
pub fn load_model(path: impl AsRef<Path>) -> Result<Mesh> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let mesh = match extension.as_str() {
        "stl" => stl::parse_stl(&fs::read(path)?)?,
        _ => return Err(VoxScanError::UnsupportedFormat(path.display().to_string())),
    };
    info!(
        path = %path.display(),
        triangles = mesh.triangles.len(),
        "Loaded model"
    );
    Ok(mesh)
}

/// Centre `mesh` on the origin and return the pose that scales its largest
/// dimension to [`FIT_SIZE`] and turns it about Z.
pub fn fit(mesh: &mut Mesh) -> WorldTransform {
    let Some(bounds) = mesh.bounding_box() else {
        return WorldTransform::identity();
    };
    mesh.translate(&-bounds.center().coords);

    let size = bounds.size();
    let largest = size.x.max(size.y).max(size.z);
    let scale = if largest > 0.0 { FIT_SIZE / largest } else { 1.0 };

    WorldTransform {
        position: Vector3::zeros(),
        rotation: RotationState::new(0.0, 0.0, FIT_ROTATION_Z),
        scale: Vector3::new(scale, scale, scale),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_centres_and_scales() {
        let mut mesh = Mesh::cuboid(Vector3::new(2.0, 1.0, 0.5));
        mesh.translate(&Vector3::new(5.0, -3.0, 1.0));

        let pose = fit(&mut mesh);
        let center = mesh.bounding_box().unwrap().center();
        assert!(center.coords.norm() < 1e-5);
        assert!((pose.scale.x - 5.0).abs() < 1e-5);
        assert_eq!(pose.rotation.z, FIT_ROTATION_Z);

        let world = mesh.to_world(&pose).bounding_box().unwrap().size();
        let largest = world.x.max(world.y).max(world.z);
        assert!((largest - FIT_SIZE).abs() < 5e-2);
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            load_model("model.obj"),
            Err(VoxScanError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            load_model("model"),
            Err(VoxScanError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            load_model("/nonexistent/voxscan/model.stl"),
            Err(VoxScanError::Io(_))
        ));
    }
}
