//! ASCII occupancy view of a voxel set
use crossterm::{
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use std::io::Write;
use voxscan_core::{Axis, BoundingBox, PlaneMode, VoxelSet};

/// Character ramp for voxel density (emptiest to densest)
const DENSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Terminal cells are roughly twice as tall as they are wide.
const CELL_ASPECT: f32 = 2.0;

/// Projects voxel centres onto a viewing plane and shades each terminal cell
/// by how many voxels land in it.
pub struct OccupancyRenderer {
    width: usize,
    height: usize,
    counts: Vec<u32>,
    char_buffer: Vec<char>,
}

/// Screen axes for a view: (horizontal, vertical).
pub fn view_axes(view: PlaneMode) -> (Axis, Axis) {
    match view {
        PlaneMode::Xy => (Axis::X, Axis::Y),
        PlaneMode::Xz => (Axis::X, Axis::Z),
        PlaneMode::Yz => (Axis::Y, Axis::Z),
    }
}

impl OccupancyRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            counts: vec![0; size],
            char_buffer: vec![' '; size],
        }
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        if (width, height) != (self.width, self.height) {
            *self = Self::new(width, height);
        }
    }

    pub fn clear(&mut self) {
        self.counts.fill(0);
        self.char_buffer.fill(' ');
    }

    pub fn render_voxels(&mut self, voxels: &VoxelSet, view: PlaneMode) {
        self.clear();
        if voxels.is_empty() || self.width == 0 || self.height == 0 {
            return;
        }

        let (h, v) = view_axes(view);
        let (hi, vi) = (h.index(), v.index());
        let bounds = BoundingBox::from_points(voxels.centers());
        let half = voxels.pitch / 2.0;
        let span_h = bounds.max[hi] - bounds.min[hi] + voxels.pitch;
        let span_v = bounds.max[vi] - bounds.min[vi] + voxels.pitch;

        // Columns per world unit, fitted to both screen dimensions.
        let (w, ht) = (self.width as f32, self.height as f32);
        let scale = (w / span_h).min(ht * CELL_ASPECT / span_v);
        let off_x = (w - span_h * scale) / 2.0;
        let off_y = (ht - span_v * scale / CELL_ASPECT) / 2.0;

        for c in voxels.centers() {
            let col = ((c[hi] - bounds.min[hi] + half) * scale + off_x) as usize;
            let up = ((c[vi] - bounds.min[vi] + half) * scale / CELL_ASPECT + off_y) as usize;
            let col = col.min(self.width - 1);
            // Screen rows grow downward.
            let row = self.height - 1 - up.min(self.height - 1);
            self.counts[row * self.width + col] += 1;
        }

        let densest = self.counts.iter().copied().max().unwrap_or(0).max(1) as f32;
        let top = (DENSITY_RAMP.len() - 1) as f32;
        for (count, c) in self.counts.iter().zip(self.char_buffer.iter_mut()) {
            if *count > 0 {
                let level = ((*count as f32 / densest) * top).ceil() as usize;
                *c = DENSITY_RAMP[level.clamp(1, DENSITY_RAMP.len() - 1)];
            }
        }
    }

    pub fn char_at(&self, x: usize, y: usize) -> char {
        self.char_buffer[y * self.width + x]
    }

    pub fn draw<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for y in 0..self.height {
            for x in 0..self.width {
                let c = self.char_at(x, y);

                // Color based on density
                let color = match c {
                    ' ' | '.' | ':' => Color::DarkGrey,
                    '-' | '=' => Color::Grey,
                    '+' | '*' => Color::White,
                    '#' | '%' | '@' => Color::Cyan,
                    _ => Color::White,
                };

                writer.queue(SetForegroundColor(color))?;
                writer.queue(Print(c))?;
            }
            writer.queue(Print("\r\n"))?;
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;
    use voxscan_core::{Voxel, VoxelSource};

    fn set(points: &[(f32, f32, f32)]) -> VoxelSet {
        VoxelSet {
            pitch: 0.5,
            voxels: points
                .iter()
                .map(|&(x, y, z)| Voxel {
                    center: Point3::new(x, y, z),
                    source: VoxelSource::Volume,
                })
                .collect(),
        }
    }

    fn lit(renderer: &OccupancyRenderer) -> Vec<char> {
        renderer.char_buffer.iter().copied().filter(|&c| c != ' ').collect()
    }

    #[test]
    fn test_empty_set_is_blank() {
        let mut renderer = OccupancyRenderer::new(20, 10);
        renderer.render_voxels(&VoxelSet::empty(0.5), PlaneMode::Xy);
        assert!(lit(&renderer).is_empty());
    }

    #[test]
    fn test_single_voxel_is_densest() {
        let mut renderer = OccupancyRenderer::new(20, 10);
        renderer.render_voxels(&set(&[(1.0, 2.0, 3.0)]), PlaneMode::Yz);
        assert_eq!(lit(&renderer), vec!['@']);
    }

    #[test]
    fn test_hidden_axis_accumulates() {
        let mut renderer = OccupancyRenderer::new(20, 10);
        let voxels = set(&[(0.0, 0.0, 0.0), (0.0, 0.0, 1.0), (1.0, 0.0, 0.0)]);
        renderer.render_voxels(&voxels, PlaneMode::Xy);
        let mut chars = lit(&renderer);
        chars.sort_unstable();
        assert_eq!(chars, vec!['+', '@']);
    }

    #[test]
    fn test_resize_clears() {
        let mut renderer = OccupancyRenderer::new(4, 4);
        renderer.render_voxels(&set(&[(0.0, 0.0, 0.0)]), PlaneMode::Xz);
        renderer.resize(8, 2);
        assert_eq!(renderer.char_buffer.len(), 16);
        assert!(lit(&renderer).is_empty());
    }
}
