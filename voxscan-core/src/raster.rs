//! Slice stacks: synthetic cross-section images of a scan-converted mesh.
//!
//! Each slice runs one plane scan at a fixed coordinate along the slicing
//! axis and paints every interior cell as a square of noisy grey on a black
//! background. The noise is a uniform draw in `[0, std_dev)` added to the
//! base intensity; it stands in for scanner noise and is not Gaussian.
use std::time::Instant;

use image::{GrayImage, Luma};
use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::bvh::SpatialIndex;
use crate::config::{validate_pitch, ScanConfig};
use crate::error::Result;
use crate::geometry::{Axis, BoundingBox, Mesh};
use crate::scan::{scan_grid, PlaneMode, ScanGrid};
use crate::transform::WorldTransform;

/// Intensity of pixels outside the solid.
pub const BACKGROUND: u8 = 0;

/// Image size, padding and intensity model for a slice stack.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterParams {
    pub width: u32,
    pub height: u32,
    pub padding: u32,
    pub base_intensity: i32,
    pub noise_std_dev: f32,
    pub seed: Option<u64>,
}

impl RasterParams {
    pub fn from_config(config: &ScanConfig) -> Result<Self> {
        Ok(Self {
            width: config.raster_width,
            height: config.raster_height,
            padding: config.padding,
            base_intensity: config.resolved_base_intensity()?,
            noise_std_dev: config.noise_std_dev,
            seed: config.noise_seed,
        })
    }
}

impl Default for RasterParams {
    fn default() -> Self {
        let config = ScanConfig::default();
        Self {
            width: config.raster_width,
            height: config.raster_height,
            padding: config.padding,
            base_intensity: 50,
            noise_std_dev: config.noise_std_dev,
            seed: None,
        }
    }
}

/// One cross-section image.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub index: usize,
    /// Coordinate along the slicing axis.
    pub position: f32,
    pub image: GrayImage,
}

/// Slices in sample order plus the axis they were taken along.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceStack {
    pub mode: PlaneMode,
    pub axis: Axis,
    pub slices: Vec<Slice>,
}

impl SliceStack {
    pub fn empty(mode: PlaneMode) -> Self {
        Self {
            mode,
            axis: mode.normal(),
            slices: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn positions(&self) -> Vec<f32> {
        self.slices.iter().map(|s| s.position).collect()
    }

    /// Archive entry name for the slice at `index`.
    pub fn file_name(&self, index: usize) -> String {
        format!("slice_{}_{}.png", self.axis.name(), index)
    }
}

/// `count` evenly spaced coordinates from `min` to `max` along `axis`,
/// both ends included.
pub fn slice_positions(bounds: &BoundingBox, axis: Axis, count: usize) -> Vec<f32> {
    let (min, max) = (bounds.min[axis.index()], bounds.max[axis.index()]);
    match count {
        0 => Vec::new(),
        1 => vec![min],
        n => (0..n)
            .map(|s| {
                let t = s as f32 / (n - 1) as f32;
                min + t * (max - min)
            })
            .collect(),
    }
}

/// Round `value` down to a multiple of `pitch`.
pub fn snap_to_grid(value: f32, pitch: f32) -> f32 {
    (value / pitch).floor() * pitch
}

/// Base intensity plus uniform noise, clamped to the 8-bit range.
pub fn noisy_intensity<R: Rng>(base: i32, std_dev: f32, rng: &mut R) -> u8 {
    let noise = if std_dev > 0.0 {
        rng.gen::<f32>() * std_dev
    } else {
        0.0
    };
    (base as f32 + noise).clamp(0.0, 255.0).floor() as u8
}

/// Maps world coordinates in a slice plane onto raster pixels.
///
/// Column and row axes, and which of them are mirrored, depend on the plane:
/// Xy puts Y on columns and X on rows; Xz mirrors both X (columns) and Z
/// (rows); Yz puts Y on columns and mirrors Z on rows. Mirrored axes are
/// reflected within the bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelMapping {
    pub column: (Axis, bool),
    pub row: (Axis, bool),
    /// Pixels per grid cell, uniform on both axes.
    pub scale: f32,
    pub padding: f32,
    pub pitch: f32,
    pub bounds: BoundingBox,
}

impl PixelMapping {
    /// `None` when the grid has no whole cell on an axis or the padding
    /// leaves no room to draw.
    ///
    /// The scale fits this mode's column and row cell counts, not the X and
    /// Y counts, so the whole grid of every plane lands inside the padding.
    pub fn new(
        mode: PlaneMode,
        bounds: &BoundingBox,
        pitch: f32,
        params: &RasterParams,
    ) -> Option<Self> {
        let (column, row) = match mode {
            PlaneMode::Xy => ((Axis::Y, false), (Axis::X, false)),
            PlaneMode::Xz => ((Axis::X, true), (Axis::Z, true)),
            PlaneMode::Yz => ((Axis::Y, false), (Axis::Z, true)),
        };
        let cols = bounds.whole_cells(column.0, pitch);
        let rows = bounds.whole_cells(row.0, pitch);
        let inner_w = params.width as f32 - 2.0 * params.padding as f32;
        let inner_h = params.height as f32 - 2.0 * params.padding as f32;
        if cols == 0 || rows == 0 || inner_w <= 0.0 || inner_h <= 0.0 {
            return None;
        }
        let scale = (inner_w / cols as f32).min(inner_h / rows as f32);
        Some(Self {
            column,
            row,
            scale,
            padding: params.padding as f32,
            pitch,
            bounds: *bounds,
        })
    }

    fn axis_to_pixel(&self, (axis, mirrored): (Axis, bool), p: &Point3<f32>) -> f32 {
        let i = axis.index();
        let offset = if mirrored {
            self.bounds.max[i] - p[i]
        } else {
            p[i] - self.bounds.min[i]
        };
        offset / self.pitch * self.scale + self.padding
    }

    /// Top-left corner of the square painted for the cell centred at `p`.
    pub fn pixel(&self, p: &Point3<f32>) -> (f32, f32) {
        (
            self.axis_to_pixel(self.column, p),
            self.axis_to_pixel(self.row, p),
        )
    }
}

fn fill_square(image: &mut GrayImage, x: f32, y: f32, side: f32, value: u8) {
    let (w, h) = (i64::from(image.width()), i64::from(image.height()));
    let x0 = (x.round() as i64).max(0);
    let y0 = (y.round() as i64).max(0);
    let x1 = ((x + side).round() as i64).min(w);
    let y1 = ((y + side).round() as i64).min(h);
    for py in y0..y1 {
        for px in x0..x1 {
            image.put_pixel(px as u32, py as u32, Luma([value]));
        }
    }
}

/// Paint one slice at `position` along the plane normal of `mode`.
pub fn rasterize_slice<R: Rng>(
    index: &SpatialIndex,
    mode: PlaneMode,
    position: f32,
    mapping: &PixelMapping,
    params: &RasterParams,
    rng: &mut R,
) -> GrayImage {
    let pitch = mapping.pitch;
    let mut image = GrayImage::from_pixel(params.width, params.height, Luma([BACKGROUND]));
    let grid = ScanGrid::plane(&mapping.bounds, mode, position, pitch);
    // One pixel of overlap hides seams between neighbouring cells.
    let side = mapping.scale + 1.0;

    for column in scan_grid(index, &grid) {
        for span in &column.spans {
            let enter = snap_to_grid(span.enter, pitch);
            let exit = snap_to_grid(span.exit, pitch);
            let mut step = 0usize;
            loop {
                let start = enter + step as f32 * pitch;
                if start >= exit {
                    break;
                }
                let (x, y) = mapping.pixel(&column.point_at(start + pitch / 2.0));
                let value = noisy_intensity(params.base_intensity, params.noise_std_dev, rng);
                fill_square(&mut image, x, y, side, value);
                step += 1;
            }
        }
    }
    image
}

/// Rasterize `sample_count` slices spaced evenly along `slicing_axis`.
///
/// Slices are painted in parallel; slice `i` draws its noise from a
/// generator seeded with `seed + i`, so a fixed seed reproduces the stack.
pub fn rasterize(
    index: &SpatialIndex,
    bounds: &BoundingBox,
    slicing_axis: Axis,
    sample_count: usize,
    pitch: f32,
    params: &RasterParams,
) -> Result<SliceStack> {
    validate_pitch(pitch)?;
    let mode = PlaneMode::slicing_along(slicing_axis);
    let Some(mapping) = PixelMapping::new(mode, bounds, pitch, params) else {
        info!(
            axis = slicing_axis.name(),
            "Slice plane has no whole cells; stack is empty"
        );
        return Ok(SliceStack::empty(mode));
    };

    let started = Instant::now();
    let seed = params.seed.unwrap_or_else(rand::random);
    let positions = slice_positions(bounds, slicing_axis, sample_count);
    debug!(
        axis = slicing_axis.name(),
        slices = positions.len(),
        scale = mapping.scale,
        "Rasterizing slice stack"
    );

    let slices = positions
        .par_iter()
        .enumerate()
        .map(|(i, &position)| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            Slice {
                index: i,
                position,
                image: rasterize_slice(index, mode, position, &mapping, params, &mut rng),
            }
        })
        .collect();

    info!(
        axis = slicing_axis.name(),
        slices = sample_count,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Slice stack complete"
    );
    Ok(SliceStack {
        mode,
        axis: slicing_axis,
        slices,
    })
}

/// Build the world-space index for `mesh` and rasterize the stack for the
/// plane `mode`, taking every parameter from `config`.
pub fn generate_slices(
    mesh: &Mesh,
    transform: &WorldTransform,
    config: &ScanConfig,
    mode: PlaneMode,
) -> Result<SliceStack> {
    config.validate()?;
    let params = RasterParams::from_config(config)?;
    let world = mesh.to_world(transform);
    let index = SpatialIndex::build(&world)?;
    let bounds = index.bounds();
    rasterize(
        &index,
        &bounds,
        mode.normal(),
        config.sample_count,
        config.pitch,
        &params,
    )
}
