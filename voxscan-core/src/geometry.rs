//! Geometry primitives: vertices, triangles, meshes and axis-aligned bounds.
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::transform::WorldTransform;

/// One of the three principal axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Component index into a `Point3`/`Vector3`.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Unit vector pointing along the positive axis.
    pub fn unit(self) -> Vector3<f32> {
        let mut v = Vector3::zeros();
        v[self.index()] = 1.0;
        v
    }

    /// Lowercase name used in exported file names.
    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

/// A 3D vertex with position and normal
#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
}

impl Vertex {
    pub fn new(x: f32, y: f32, z: f32, nx: f32, ny: f32, nz: f32) -> Self {
        Self {
            position: Point3::new(x, y, z),
            normal: Vector3::new(nx, ny, nz),
        }
    }
}

/// A triangle face defined by three vertices
#[derive(Debug, Clone)]
pub struct Triangle {
    pub vertices: [Vertex; 3],
}

impl Triangle {
    pub fn new(v0: Vertex, v1: Vertex, v2: Vertex) -> Self {
        Self {
            vertices: [v0, v1, v2],
        }
    }

    /// Build a triangle from bare positions, deriving the face normal.
    pub fn from_points(a: Point3<f32>, b: Point3<f32>, c: Point3<f32>) -> Self {
        let n = (b - a).cross(&(c - a));
        let n = n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros);
        let v = |p: Point3<f32>| Vertex {
            position: p,
            normal: n,
        };
        Self::new(v(a), v(b), v(c))
    }

    pub fn positions(&self) -> [Point3<f32>; 3] {
        [
            self.vertices[0].position,
            self.vertices[1].position,
            self.vertices[2].position,
        ]
    }

    /// Calculate the face normal from the triangle's vertices
    pub fn calculate_normal(&self) -> Vector3<f32> {
        let [v0, v1, v2] = self.positions();
        (v1 - v0).cross(&(v2 - v0)).normalize()
    }

    pub fn centroid(&self) -> Point3<f32> {
        let [a, b, c] = self.positions();
        Point3::from((a.coords + b.coords + c.coords) / 3.0)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.positions().iter())
    }
}

/// A 3D mesh composed of triangles
#[derive(Debug, Clone)]
pub struct Mesh {
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            triangles: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            triangles: Vec::with_capacity(capacity),
        }
    }

    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Bounds of every vertex, or `None` for an empty mesh.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        if self.triangles.is_empty() {
            return None;
        }
        Some(BoundingBox::from_points(
            self.triangles
                .iter()
                .flat_map(|t| t.vertices.iter().map(|v| &v.position)),
        ))
    }

    /// Snapshot of the mesh with `transform` baked into every vertex position.
    ///
    /// Normals are copied as loaded; scans only read positions.
    pub fn to_world(&self, transform: &WorldTransform) -> Mesh {
        let matrix = transform.matrix();
        let triangles = self
            .triangles
            .iter()
            .map(|t| {
                let mut out = t.clone();
                for v in &mut out.vertices {
                    v.position = matrix.transform_point(&v.position);
                }
                out
            })
            .collect();
        Mesh { triangles }
    }

    /// Translate every vertex by `offset`.
    pub fn translate(&mut self, offset: &Vector3<f32>) {
        for t in &mut self.triangles {
            for v in &mut t.vertices {
                v.position += offset;
            }
        }
    }

    /// Create a simple cube mesh for testing
    pub fn cube(size: f32) -> Self {
        let half = size / 2.0;
        Self::cuboid(Vector3::new(half, half, half))
    }

    /// Closed box centred on the origin with outward-facing triangles.
    pub fn cuboid(half: Vector3<f32>) -> Self {
        let (hx, hy, hz) = (half.x, half.y, half.z);
        let p = |x: f32, y: f32, z: f32| Point3::new(x * hx, y * hy, z * hz);
        // Each face as a CCW quad seen from outside.
        let faces = [
            [p(-1., -1., 1.), p(1., -1., 1.), p(1., 1., 1.), p(-1., 1., 1.)],
            [p(-1., -1., -1.), p(-1., 1., -1.), p(1., 1., -1.), p(1., -1., -1.)],
            [p(-1., 1., -1.), p(-1., 1., 1.), p(1., 1., 1.), p(1., 1., -1.)],
            [p(-1., -1., -1.), p(1., -1., -1.), p(1., -1., 1.), p(-1., -1., 1.)],
            [p(1., -1., -1.), p(1., 1., -1.), p(1., 1., 1.), p(1., -1., 1.)],
            [p(-1., -1., -1.), p(-1., -1., 1.), p(-1., 1., 1.), p(-1., 1., -1.)],
        ];

        let mut mesh = Self::with_capacity(12);
        for [a, b, c, d] in faces {
            mesh.add_triangle(Triangle::from_points(a, b, c));
            mesh.add_triangle(Triangle::from_points(a, c, d));
        }
        mesh
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

/// Axis-aligned min/max corner pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl BoundingBox {
    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    /// An inverted box that any `include` call will snap to.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f32>>) -> Self {
        let mut bounds = Self::empty();
        for p in points {
            bounds.include(p);
        }
        bounds
    }

    pub fn include(&mut self, p: &Point3<f32>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    pub fn merged(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    /// True when any extent is zero, negative or not finite.
    pub fn is_degenerate(&self) -> bool {
        let size = self.size();
        !(size.x > 0.0 && size.y > 0.0 && size.z > 0.0)
    }

    pub fn contains(&self, p: &Point3<f32>, margin: f32) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] - margin && p[i] <= self.max[i] + margin)
    }

    /// Number of half-open `pitch` steps from min that start before max.
    pub fn cells(&self, axis: Axis, pitch: f32) -> usize {
        let extent = self.size()[axis.index()];
        if extent <= 0.0 || !extent.is_finite() {
            return 0;
        }
        (extent / pitch).ceil() as usize
    }

    /// Whole cells that fit inside the extent along `axis`.
    pub fn whole_cells(&self, axis: Axis, pitch: f32) -> usize {
        let extent = self.size()[axis.index()];
        if extent <= 0.0 || !extent.is_finite() {
            return 0;
        }
        (extent / pitch).floor() as usize
    }

    /// Longest axis, used to pick BVH split planes.
    pub fn longest_axis(&self) -> Axis {
        let s = self.size();
        if s.x >= s.y && s.x >= s.z {
            Axis::X
        } else if s.y >= s.z {
            Axis::Y
        } else {
            Axis::Z
        }
    }

    pub fn surface_area(&self) -> f32 {
        let s = self.size();
        if s.x < 0.0 || s.y < 0.0 || s.z < 0.0 {
            return 0.0;
        }
        2.0 * (s.x * s.y + s.y * s.z + s.z * s.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_is_closed_and_outward() {
        let cube = Mesh::cube(2.0);
        assert_eq!(cube.triangles.len(), 12);
        for t in &cube.triangles {
            // Outward normals point away from the origin.
            let n = t.calculate_normal();
            assert!(n.dot(&t.centroid().coords) > 0.0);
        }
    }

    #[test]
    fn test_bounding_box() {
        let mesh = Mesh::cuboid(Vector3::new(1.0, 2.0, 3.0));
        let bounds = mesh.bounding_box().unwrap();
        assert_relative_eq!(bounds.min, Point3::new(-1.0, -2.0, -3.0));
        assert_relative_eq!(bounds.max, Point3::new(1.0, 2.0, 3.0));
        assert!(Mesh::new().bounding_box().is_none());
    }

    #[test]
    fn test_cell_counts() {
        let bounds = BoundingBox::new(Point3::origin(), Point3::new(1.0, 0.3, 0.0));
        assert_eq!(bounds.cells(Axis::X, 0.25), 4);
        assert_eq!(bounds.cells(Axis::Y, 0.25), 2);
        assert_eq!(bounds.whole_cells(Axis::Y, 0.25), 1);
        assert_eq!(bounds.cells(Axis::Z, 0.25), 0);
        assert!(bounds.is_degenerate());
    }

    #[test]
    fn test_to_world_translates_vertices() {
        let mesh = Mesh::cube(1.0);
        let transform = WorldTransform {
            position: Vector3::new(10.0, 0.0, 0.0),
            ..WorldTransform::identity()
        };
        let bounds = mesh.to_world(&transform).bounding_box().unwrap();
        assert_relative_eq!(bounds.min.x, 9.5);
        assert_relative_eq!(bounds.max.x, 10.5);
    }

    #[test]
    fn test_to_world_keeps_loaded_normals() {
        let mesh = Mesh::cube(1.0);
        let transform = WorldTransform {
            rotation: crate::transform::RotationState::new(0.7, 0.0, 0.3),
            ..WorldTransform::identity()
        };
        let world = mesh.to_world(&transform);
        for (a, b) in mesh.triangles.iter().zip(&world.triangles) {
            for (va, vb) in a.vertices.iter().zip(&b.vertices) {
                assert_eq!(va.normal, vb.normal);
            }
        }
        assert_ne!(
            mesh.triangles[0].vertices[0].position,
            world.triangles[0].vertices[0].position
        );
    }
}
