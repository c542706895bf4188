//! Parity scan-conversion.
//!
//! Casts a grid of parallel axis-aligned rays through the spatial index,
//! sorts each ray's crossings along the ray and pairs them up
//! (0-1, 2-3, ...) into interior spans. A trailing unpaired crossing is
//! dropped: non-watertight or tangential geometry degrades to fewer spans
//! instead of failing.
use std::time::Instant;

use nalgebra::Point3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bvh::SpatialIndex;
use crate::config::validate_pitch;
use crate::error::Result;
use crate::geometry::{Axis, BoundingBox};
use crate::ray::{Intersection, Ray};

/// How far outside the bounds each ray starts.
pub const RAY_START_MARGIN: f32 = 1.0;

/// The three orthogonal viewing planes.
///
/// | mode | normal | ray axis | lane axis |
/// |------|--------|----------|-----------|
/// | Xy   | Z      | Y        | X         |
/// | Xz   | Y      | Z        | X         |
/// | Yz   | X      | Z        | Y         |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaneMode {
    Xy,
    Xz,
    Yz,
}

impl PlaneMode {
    pub const ALL: [PlaneMode; 3] = [PlaneMode::Xy, PlaneMode::Xz, PlaneMode::Yz];

    /// Axis perpendicular to the plane; slice stacks advance along it.
    pub fn normal(self) -> Axis {
        match self {
            PlaneMode::Xy => Axis::Z,
            PlaneMode::Xz => Axis::Y,
            PlaneMode::Yz => Axis::X,
        }
    }

    /// The plane whose normal is `axis`.
    pub fn slicing_along(axis: Axis) -> Self {
        match axis {
            Axis::Z => PlaneMode::Xy,
            Axis::Y => PlaneMode::Xz,
            Axis::X => PlaneMode::Yz,
        }
    }

    pub fn ray_axis(self) -> Axis {
        match self {
            PlaneMode::Xy => Axis::Y,
            PlaneMode::Xz | PlaneMode::Yz => Axis::Z,
        }
    }

    pub fn lane_axis(self) -> Axis {
        match self {
            PlaneMode::Xy | PlaneMode::Xz => Axis::X,
            PlaneMode::Yz => Axis::Y,
        }
    }
}

/// Interior interval `[enter, exit)` along a ray's axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub enter: f32,
    pub exit: f32,
}

impl Span {
    pub fn length(&self) -> f32 {
        (self.exit - self.enter).max(0.0)
    }
}

/// The spans found along one ray of the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanColumn {
    /// Grid indices along the two in-plane axes (0 for a fixed axis).
    pub cell: (usize, usize),
    pub ray: Ray,
    pub spans: Vec<Span>,
}

impl ScanColumn {
    /// Sample position of the column with the ray-axis component replaced.
    pub fn point_at(&self, coordinate: f32) -> Point3<f32> {
        let mut p = self.ray.origin;
        p[self.ray.axis.index()] = coordinate;
        p
    }
}

/// How one in-plane axis of the grid is sampled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lane {
    /// `count` samples at `min + (i + 0.5) * pitch`.
    Stepped { axis: Axis, min: f32, count: usize },
    /// A single sample at a fixed coordinate.
    Fixed { axis: Axis, coordinate: f32 },
}

impl Lane {
    fn stepped(bounds: &BoundingBox, axis: Axis, pitch: f32) -> Self {
        Lane::Stepped {
            axis,
            min: bounds.min[axis.index()],
            count: bounds.cells(axis, pitch),
        }
    }

    fn axis(&self) -> Axis {
        match *self {
            Lane::Stepped { axis, .. } | Lane::Fixed { axis, .. } => axis,
        }
    }

    fn count(&self) -> usize {
        match *self {
            Lane::Stepped { count, .. } => count,
            Lane::Fixed { .. } => 1,
        }
    }

    fn coordinate(&self, i: usize, pitch: f32) -> f32 {
        match *self {
            Lane::Stepped { min, .. } => min + (i as f32 + 0.5) * pitch,
            Lane::Fixed { coordinate, .. } => coordinate,
        }
    }
}

/// A family of parallel rays covering a 2D sampling grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanGrid {
    pub axis: Axis,
    pub pitch: f32,
    /// Ray origin coordinate along `axis`, strictly below the bounds.
    pub start: f32,
    pub lanes: [Lane; 2],
}

impl ScanGrid {
    /// Full grid over both in-plane axes of `bounds`, rays along `axis`.
    pub fn volume(bounds: &BoundingBox, axis: Axis, pitch: f32) -> Self {
        let k = axis.index();
        let u = Axis::ALL[(k + 1) % 3];
        let v = Axis::ALL[(k + 2) % 3];
        Self {
            axis,
            pitch,
            start: bounds.min[k] - RAY_START_MARGIN,
            lanes: [
                Lane::stepped(bounds, u, pitch),
                Lane::stepped(bounds, v, pitch),
            ],
        }
    }

    /// One lane of rays inside the plane of `mode` at `coordinate` along its
    /// normal. Rays sample the centre of the cell starting at `coordinate`.
    pub fn plane(bounds: &BoundingBox, mode: PlaneMode, coordinate: f32, pitch: f32) -> Self {
        let axis = mode.ray_axis();
        Self {
            axis,
            pitch,
            start: bounds.min[axis.index()] - RAY_START_MARGIN,
            lanes: [
                Lane::stepped(bounds, mode.lane_axis(), pitch),
                Lane::Fixed {
                    axis: mode.normal(),
                    coordinate: coordinate + pitch / 2.0,
                },
            ],
        }
    }

    pub fn ray_count(&self) -> usize {
        self.lanes[0].count() * self.lanes[1].count()
    }

    /// Ray for the flattened grid index `n` (lane 0 varies slowest).
    pub fn ray(&self, n: usize) -> ((usize, usize), Ray) {
        let cols = self.lanes[1].count();
        let (i, j) = (n / cols, n % cols);
        let mut origin = Point3::origin();
        origin[self.axis.index()] = self.start;
        origin[self.lanes[0].axis().index()] = self.lanes[0].coordinate(i, self.pitch);
        origin[self.lanes[1].axis().index()] = self.lanes[1].coordinate(j, self.pitch);
        ((i, j), Ray::new(origin, self.axis))
    }
}

/// Sort crossings along `axis` and pair them into spans.
///
/// Coincident crossings are kept and may pair into zero-length spans.
pub fn spans_from_hits(hits: &mut [Intersection], axis: Axis) -> Vec<Span> {
    let k = axis.index();
    hits.sort_by(|a, b| a.point[k].total_cmp(&b.point[k]));
    hits.chunks_exact(2)
        .map(|pair| Span {
            enter: pair[0].point[k],
            exit: pair[1].point[k],
        })
        .collect()
}

/// Cast every ray of `grid` and classify interior spans.
///
/// Columns come back in grid order, including those with no spans.
pub fn scan_grid(index: &SpatialIndex, grid: &ScanGrid) -> Vec<ScanColumn> {
    let started = Instant::now();
    let columns: Vec<(ScanColumn, bool)> = (0..grid.ray_count())
        .into_par_iter()
        .map_init(Vec::new, |hits, n| {
            let (cell, ray) = grid.ray(n);
            hits.clear();
            index.query_into(&ray, hits);
            let odd = hits.len() % 2 == 1;
            let spans = if hits.len() < 2 {
                Vec::new()
            } else {
                spans_from_hits(hits, grid.axis)
            };
            (ScanColumn { cell, ray, spans }, odd)
        })
        .collect();

    let odd = columns.iter().filter(|(_, odd)| *odd).count();
    if odd > 0 {
        debug!(
            odd_columns = odd,
            "Dropped unpaired crossings (open or tangential geometry)"
        );
    }
    let columns: Vec<ScanColumn> = columns.into_iter().map(|(c, _)| c).collect();

    debug!(
        axis = grid.axis.name(),
        rays = grid.ray_count(),
        spans = columns.iter().map(|c| c.spans.len()).sum::<usize>(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Scan pass complete"
    );
    columns
}

// A pitch wider than the bounds on either in-plane axis leaves no whole cell
// to sample, matching the slice rasterizer's empty stack.
fn narrower_than_pitch(bounds: &BoundingBox, axes: [Axis; 2], pitch: f32) -> bool {
    axes.iter().any(|&axis| bounds.whole_cells(axis, pitch) == 0)
}

/// Scan-convert the whole bounding box with rays along `axis`.
pub fn scan(
    index: &SpatialIndex,
    bounds: &BoundingBox,
    axis: Axis,
    pitch: f32,
) -> Result<Vec<ScanColumn>> {
    validate_pitch(pitch)?;
    let k = axis.index();
    let in_plane = [Axis::ALL[(k + 1) % 3], Axis::ALL[(k + 2) % 3]];
    if bounds.is_degenerate() || narrower_than_pitch(bounds, in_plane, pitch) {
        info!(pitch, "Bounding box holds no whole cell; nothing to scan");
        return Ok(Vec::new());
    }
    Ok(scan_grid(index, &ScanGrid::volume(bounds, axis, pitch)))
}

/// Scan-convert one viewing plane at `coordinate` along its normal.
pub fn scan_plane(
    index: &SpatialIndex,
    bounds: &BoundingBox,
    mode: PlaneMode,
    coordinate: f32,
    pitch: f32,
) -> Result<Vec<ScanColumn>> {
    validate_pitch(pitch)?;
    let in_plane = [mode.lane_axis(), mode.ray_axis()];
    if bounds.is_degenerate() || narrower_than_pitch(bounds, in_plane, pitch) {
        info!(pitch, ?mode, "Bounding box holds no whole cell; nothing to scan");
        return Ok(Vec::new());
    }
    Ok(scan_grid(
        index,
        &ScanGrid::plane(bounds, mode, coordinate, pitch),
    ))
}
