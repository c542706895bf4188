//! Axis-aligned rays and the ray/triangle test used by the spatial index.
//!
//! Every scan ray runs along a principal axis, so the triangle test reduces to
//! a 2D point-in-triangle check in the plane perpendicular to that axis. Edge
//! functions are evaluated in a canonical vertex order and points lying exactly
//! on an edge or vertex are assigned with a top-left rule, so a ray crossing a
//! shared edge of a closed mesh is counted by exactly one of its triangles.
use nalgebra::{Point3, Vector3};

use crate::geometry::Axis;

/// A ray starting at `origin` and pointing along the positive `axis`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub axis: Axis,
}

impl Ray {
    pub fn new(origin: Point3<f32>, axis: Axis) -> Self {
        Self { origin, axis }
    }

    pub fn direction(&self) -> Vector3<f32> {
        self.axis.unit()
    }

    pub fn point_at(&self, distance: f32) -> Point3<f32> {
        self.origin + self.direction() * distance
    }

    /// The two in-plane coordinates the ray is fixed at.
    pub(crate) fn lane(&self) -> (usize, usize) {
        let k = self.axis.index();
        ((k + 1) % 3, (k + 2) % 3)
    }
}

/// One crossing of a ray with the mesh surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub point: Point3<f32>,
    /// Signed distance from the ray origin along its axis.
    pub distance: f32,
    /// Index of the triangle that was hit.
    pub triangle: usize,
}

type Point2 = (f64, f64);

fn raw_edge(a: Point2, b: Point2, p: Point2) -> f64 {
    (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
}

// Evaluating with the endpoints in a fixed order makes the two triangles
// sharing an edge see exactly opposite values.
fn edge_function(a: Point2, b: Point2, p: Point2) -> f64 {
    if a > b {
        -raw_edge(b, a, p)
    } else {
        raw_edge(a, b, p)
    }
}

fn is_top_left(a: Point2, b: Point2) -> bool {
    let (du, dv) = (b.0 - a.0, b.1 - a.1);
    dv < 0.0 || (dv == 0.0 && du < 0.0)
}

/// Distance along `ray` at which it crosses `triangle`, if it does.
///
/// Triangles seen edge-on by the ray are never hit; the ray grazes them.
pub(crate) fn intersect_triangle(ray: &Ray, triangle: &[Point3<f32>; 3]) -> Option<f32> {
    let k = ray.axis.index();
    let (iu, iv) = ray.lane();
    let p = (f64::from(ray.origin[iu]), f64::from(ray.origin[iv]));
    let q = triangle.map(|v| (f64::from(v[iu]), f64::from(v[iv])));

    let area = edge_function(q[0], q[1], q[2]);
    if area == 0.0 || !area.is_finite() {
        return None;
    }
    let order = if area > 0.0 { [0, 1, 2] } else { [0, 2, 1] };
    let area = area.abs();

    let mut weights = [0.0f64; 3];
    for i in 0..3 {
        let a = q[order[i]];
        let b = q[order[(i + 1) % 3]];
        let e = edge_function(a, b, p);
        if e < 0.0 || (e == 0.0 && !is_top_left(a, b)) {
            return None;
        }
        weights[order[(i + 2) % 3]] = e / area;
    }

    let coord: f64 = weights
        .iter()
        .zip(triangle.iter())
        .map(|(w, v)| w * f64::from(v[k]))
        .sum();
    let distance = coord - f64::from(ray.origin[k]);
    (distance >= 0.0).then_some(distance as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tri(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [Point3<f32>; 3] {
        [Point3::from(a), Point3::from(b), Point3::from(c)]
    }

    #[test]
    fn test_hits_interior() {
        let t = tri([0.0, 0.0, 2.0], [1.0, 0.0, 2.0], [0.0, 1.0, 2.0]);
        let ray = Ray::new(Point3::new(0.25, 0.25, -1.0), Axis::Z);
        assert_relative_eq!(intersect_triangle(&ray, &t).unwrap(), 3.0);

        // Winding must not matter.
        let flipped = [t[0], t[2], t[1]];
        assert_relative_eq!(intersect_triangle(&ray, &flipped).unwrap(), 3.0);
    }

    #[test]
    fn test_interpolates_sloped_triangle() {
        let t = tri([0.0, 0.0, 0.0], [2.0, 0.0, 2.0], [0.0, 2.0, 0.0]);
        let ray = Ray::new(Point3::new(1.0, 0.5, -5.0), Axis::Z);
        assert_relative_eq!(intersect_triangle(&ray, &t).unwrap(), 6.0);
    }

    #[test]
    fn test_misses_outside_and_behind() {
        let t = tri([0.0, 0.0, 2.0], [1.0, 0.0, 2.0], [0.0, 1.0, 2.0]);
        let outside = Ray::new(Point3::new(0.8, 0.8, -1.0), Axis::Z);
        assert!(intersect_triangle(&outside, &t).is_none());

        let behind = Ray::new(Point3::new(0.25, 0.25, 5.0), Axis::Z);
        assert!(intersect_triangle(&behind, &t).is_none());
    }

    #[test]
    fn test_edge_on_triangle_is_grazed() {
        let t = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]);
        let ray = Ray::new(Point3::new(0.2, 0.0, -1.0), Axis::Z);
        assert!(intersect_triangle(&ray, &t).is_none());
    }

    #[test]
    fn test_shared_edge_counted_once() {
        // Unit square split along its diagonal; rays through the interior,
        // on the diagonal included, must hit exactly one half.
        let a = Point3::new(0.0, 0.0, 1.0);
        let b = Point3::new(1.0, 0.0, 1.0);
        let c = Point3::new(1.0, 1.0, 1.0);
        let d = Point3::new(0.0, 1.0, 1.0);
        let halves = [[a, b, c], [a, c, d]];

        for (x, y) in [(0.5, 0.5), (0.25, 0.25), (0.75, 0.75), (0.2, 0.6)] {
            let ray = Ray::new(Point3::new(x, y, 0.0), Axis::Z);
            let hits = halves
                .iter()
                .filter(|t| intersect_triangle(&ray, t).is_some())
                .count();
            assert_eq!(hits, 1, "ray at ({x}, {y})");
        }
    }

    #[test]
    fn test_shared_vertex_counted_once() {
        // Four triangles fanned around the centre of a square.
        let centre = Point3::new(0.0, 0.0, 0.0);
        let corners = [
            Point3::new(-1.0, -1.0, 0.0),
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(-1.0, 1.0, 0.0),
        ];
        let ray = Ray::new(Point3::new(0.0, 0.0, -1.0), Axis::Z);
        let hits = (0..4)
            .filter(|&i| {
                let t = [centre, corners[i], corners[(i + 1) % 4]];
                intersect_triangle(&ray, &t).is_some()
            })
            .count();
        assert_eq!(hits, 1);
    }
}
