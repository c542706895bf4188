//! Voxel accumulation: turning interior spans into voxel centres.
use std::time::Instant;

use nalgebra::Point3;
use tracing::info;

use crate::bvh::SpatialIndex;
use crate::config::ScanConfig;
use crate::error::Result;
use crate::geometry::{Axis, Mesh};
use crate::scan::{scan, scan_plane, PlaneMode, ScanColumn};
use crate::transform::WorldTransform;

/// Which scan pass produced a voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoxelSource {
    Plane(PlaneMode),
    Volume,
}

/// A filled cell, identified by its centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voxel {
    pub center: Point3<f32>,
    pub source: VoxelSource,
}

/// Voxels produced by one scan invocation.
///
/// Passes over different planes are concatenated, never merged, so a cell
/// covered by two planes appears twice.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VoxelSet {
    pub pitch: f32,
    pub voxels: Vec<Voxel>,
}

impl VoxelSet {
    pub fn empty(pitch: f32) -> Self {
        Self {
            pitch,
            voxels: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    pub fn centers(&self) -> impl Iterator<Item = &Point3<f32>> + '_ {
        self.voxels.iter().map(|v| &v.center)
    }

    pub fn count_from(&self, source: VoxelSource) -> usize {
        self.voxels.iter().filter(|v| v.source == source).count()
    }
}

/// Append one voxel per `pitch` step of every span, exit excluded.
pub fn accumulate_into(
    columns: &[ScanColumn],
    pitch: f32,
    source: VoxelSource,
    out: &mut Vec<Voxel>,
) {
    let half = pitch / 2.0;
    for column in columns {
        for span in &column.spans {
            let mut step = 0usize;
            loop {
                let start = span.enter + step as f32 * pitch;
                if start >= span.exit {
                    break;
                }
                out.push(Voxel {
                    center: column.point_at(start + half),
                    source,
                });
                step += 1;
            }
        }
    }
}

/// Voxel set for the spans of a single scan.
pub fn accumulate(columns: &[ScanColumn], pitch: f32, source: VoxelSource) -> VoxelSet {
    let mut voxels = Vec::new();
    accumulate_into(columns, pitch, source, &mut voxels);
    VoxelSet { pitch, voxels }
}

/// Full scan-and-accumulate pipeline for the planes active in `config`.
///
/// The mesh is snapshotted in world space and indexed for this call only.
/// With `planes.volumetric` set, a single full grid along Z replaces the
/// per-plane passes.
pub fn voxelize(mesh: &Mesh, transform: &WorldTransform, config: &ScanConfig) -> Result<VoxelSet> {
    config.validate()?;
    let started = Instant::now();
    let pitch = config.pitch;

    let world = mesh.to_world(transform);
    let index = SpatialIndex::build(&world)?;
    let bounds = index.bounds();

    let mut voxels = Vec::new();
    let mut rays = 0;
    if config.planes.volumetric {
        let columns = scan(&index, &bounds, Axis::Z, pitch)?;
        rays += columns.len();
        accumulate_into(&columns, pitch, VoxelSource::Volume, &mut voxels);
    } else {
        for mode in PlaneMode::ALL {
            if !config.planes.contains(mode) {
                continue;
            }
            let columns = scan_plane(&index, &bounds, mode, config.plane_offset, pitch)?;
            rays += columns.len();
            accumulate_into(&columns, pitch, VoxelSource::Plane(mode), &mut voxels);
        }
    }

    info!(
        rays,
        voxels = voxels.len(),
        pitch,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Voxelisation complete"
    );
    Ok(VoxelSet { pitch, voxels })
}
