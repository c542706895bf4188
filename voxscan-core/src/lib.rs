//! VoxScan Core Library - parity scan conversion of triangle meshes
//!
//! Turns a closed triangle mesh into voxels and synthetic cross-section
//! images by casting grids of axis-aligned rays through a BVH and pairing
//! the crossings along each ray into interior spans. Hosts drive it through
//! [`ScanSession`], which owns the mesh, its pose and a debounced
//! [`UpdateScheduler`].

pub mod bvh;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod ray;
pub mod raster;
pub mod scan;
pub mod scheduler;
pub mod session;
pub mod stl;
pub mod transform;
pub mod voxel;

// Re-export commonly used types
pub use bvh::SpatialIndex;
pub use config::{ActivePlanes, Modality, ScanConfig, Tissue};
pub use error::{Result, VoxScanError};
pub use geometry::{Axis, BoundingBox, Mesh, Triangle, Vertex};
pub use raster::{RasterParams, Slice, SliceStack};
pub use scan::{PlaneMode, ScanColumn, Span};
pub use scheduler::{Clock, ManualClock, SystemClock, UpdateScheduler};
pub use session::ScanSession;
pub use transform::{RotationState, Transform, WorldTransform};
pub use voxel::{Voxel, VoxelSet, VoxelSource};
