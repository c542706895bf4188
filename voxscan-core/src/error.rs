//! Error types for scanning, rasterizing and exporting.

use thiserror::Error;

use crate::config::Modality;

/// Errors that can occur while scan-converting a mesh.
#[derive(Debug, Error)]
pub enum VoxScanError {
    /// A scan or rasterize call was made with no active mesh.
    #[error("No mesh loaded")]
    NoMesh,

    /// The spatial index needs at least one triangle.
    #[error("Mesh has no triangles")]
    EmptyMesh,

    /// Sampling pitch must be finite and positive.
    #[error("Invalid pitch: {0} (must be > 0)")]
    InvalidPitch(f32),

    /// The loader was handed a file it cannot parse.
    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(String),

    /// No intensity table exists for the modality.
    #[error("Unsupported scan modality: {0:?} (only CT is supported)")]
    UnsupportedModality(Modality),

    /// STL data could not be parsed.
    #[error("Invalid STL data: {0}")]
    Stl(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to encode slice image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Failed to write slice archive: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// Result type for voxscan operations.
pub type Result<T> = std::result::Result<T, VoxScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VoxScanError::NoMesh;
        assert_eq!(format!("{err}"), "No mesh loaded");

        let err = VoxScanError::InvalidPitch(-0.5);
        assert!(format!("{err}").contains("-0.5"));

        let err = VoxScanError::UnsupportedFormat("fbx".to_string());
        assert!(format!("{err}").contains("fbx"));
    }
}
