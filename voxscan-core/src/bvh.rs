//! Bounding-volume hierarchy over a world-space triangle soup.
//!
//! Nodes live in a flat arena and are built top-down with a binned surface
//! area heuristic. Queries report every crossing along a ray, not only the
//! nearest one, because the parity scan needs all of them.
use nalgebra::Point3;
use tracing::debug;

use crate::error::{Result, VoxScanError};
use crate::geometry::{BoundingBox, Mesh};
use crate::ray::{intersect_triangle, Intersection, Ray};

const NUM_BINS: usize = 8;
const MAX_LEAF_SIZE: usize = 4;

#[derive(Debug, Clone, Copy)]
enum NodeKind {
    Leaf { first: u32, count: u32 },
    Internal { left: u32, right: u32 },
}

#[derive(Debug, Clone, Copy)]
struct BvhNode {
    bounds: BoundingBox,
    kind: NodeKind,
}

#[derive(Debug, Clone, Copy)]
struct Primitive {
    triangle: u32,
    bounds: BoundingBox,
    centroid: Point3<f32>,
}

#[derive(Clone, Copy)]
struct Bin {
    bounds: BoundingBox,
    count: usize,
}

impl Default for Bin {
    fn default() -> Self {
        Self {
            bounds: BoundingBox::empty(),
            count: 0,
        }
    }
}

/// Ray-query acceleration structure built from one mesh snapshot.
///
/// The index copies the triangle positions it was built from; editing or
/// re-transforming the source mesh requires building a new index.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    triangles: Vec<[Point3<f32>; 3]>,
    nodes: Vec<BvhNode>,
    /// Triangle ids in leaf order; leaves reference ranges of this list.
    order: Vec<u32>,
}

impl SpatialIndex {
    /// Build the hierarchy for `mesh`, which must hold at least one triangle.
    pub fn build(mesh: &Mesh) -> Result<Self> {
        if mesh.is_empty() {
            return Err(VoxScanError::EmptyMesh);
        }

        let triangles: Vec<[Point3<f32>; 3]> =
            mesh.triangles.iter().map(|t| t.positions()).collect();
        let mut primitives: Vec<Primitive> = mesh
            .triangles
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let bounds = t.bounding_box();
                Primitive {
                    triangle: i as u32,
                    bounds,
                    centroid: bounds.center(),
                }
            })
            .collect();

        let mut index = Self {
            triangles,
            nodes: Vec::with_capacity(2 * primitives.len() / MAX_LEAF_SIZE + 1),
            order: Vec::with_capacity(primitives.len()),
        };
        index.build_range(&mut primitives);

        debug!(
            triangles = index.triangles.len(),
            nodes = index.nodes.len(),
            depth = index.depth(),
            "Built spatial index"
        );
        Ok(index)
    }

    fn build_range(&mut self, primitives: &mut [Primitive]) -> u32 {
        let bounds = primitives
            .iter()
            .fold(BoundingBox::empty(), |acc, p| acc.merged(&p.bounds));
        let node_id = self.nodes.len() as u32;

        if primitives.len() <= MAX_LEAF_SIZE {
            self.push_leaf(bounds, primitives);
            return node_id;
        }

        let mid = split_binned(primitives);
        // Reserve the slot so children land after their parent.
        self.nodes.push(BvhNode {
            bounds,
            kind: NodeKind::Leaf { first: 0, count: 0 },
        });
        let (left_prims, right_prims) = primitives.split_at_mut(mid);
        let left = self.build_range(left_prims);
        let right = self.build_range(right_prims);
        self.nodes[node_id as usize].kind = NodeKind::Internal { left, right };
        node_id
    }

    fn push_leaf(&mut self, bounds: BoundingBox, primitives: &[Primitive]) {
        let first = self.order.len() as u32;
        self.order.extend(primitives.iter().map(|p| p.triangle));
        self.nodes.push(BvhNode {
            bounds,
            kind: NodeKind::Leaf {
                first,
                count: primitives.len() as u32,
            },
        });
    }

    /// Every crossing of `ray` with the mesh, in traversal order.
    pub fn query(&self, ray: &Ray) -> Vec<Intersection> {
        let mut hits = Vec::new();
        self.query_into(ray, &mut hits);
        hits
    }

    /// Like [`SpatialIndex::query`], appending into a caller-owned buffer.
    pub fn query_into(&self, ray: &Ray, hits: &mut Vec<Intersection>) {
        let mut stack: Vec<u32> = Vec::with_capacity(64);
        stack.push(0);

        while let Some(node_id) = stack.pop() {
            let node = &self.nodes[node_id as usize];
            if !ray_overlaps(ray, &node.bounds) {
                continue;
            }
            match node.kind {
                NodeKind::Internal { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
                NodeKind::Leaf { first, count } => {
                    let range = first as usize..(first + count) as usize;
                    for &triangle in &self.order[range] {
                        let triangle = triangle as usize;
                        if let Some(distance) = intersect_triangle(ray, &self.triangles[triangle])
                        {
                            hits.push(Intersection {
                                point: ray.point_at(distance),
                                distance,
                                triangle,
                            });
                        }
                    }
                }
            }
        }
    }

    /// Bounds of the whole indexed mesh.
    pub fn bounds(&self) -> BoundingBox {
        self.nodes[0].bounds
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Length of the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut stack = vec![(0u32, 1usize)];
        while let Some((node_id, d)) = stack.pop() {
            depth = depth.max(d);
            if let NodeKind::Internal { left, right } = self.nodes[node_id as usize].kind {
                stack.push((left, d + 1));
                stack.push((right, d + 1));
            }
        }
        depth
    }
}

// An axis-aligned ray overlaps a box when its lane lies inside the box's
// cross-section and the box is not entirely behind the origin.
fn ray_overlaps(ray: &Ray, bounds: &BoundingBox) -> bool {
    let k = ray.axis.index();
    let (iu, iv) = ray.lane();
    let o = &ray.origin;
    o[iu] >= bounds.min[iu]
        && o[iu] <= bounds.max[iu]
        && o[iv] >= bounds.min[iv]
        && o[iv] <= bounds.max[iv]
        && bounds.max[k] >= o[k]
}

/// Partition `primitives` in place, returning the size of the left half.
fn split_binned(primitives: &mut [Primitive]) -> usize {
    const BIN_EPSILON: f32 = 1.0e-5;

    let centroids = BoundingBox::from_points(primitives.iter().map(|p| &p.centroid));
    let axis = centroids.longest_axis().index();
    let (lo, hi) = (centroids.min[axis], centroids.max[axis]);

    // All centroids coincide on every axis: any split is as good as another.
    if hi - lo <= f32::EPSILON {
        return primitives.len() / 2;
    }

    let k1 = NUM_BINS as f32 * (1.0 - BIN_EPSILON) / (hi - lo);
    let bin_of = |p: &Primitive| (((p.centroid[axis] - lo) * k1) as usize).min(NUM_BINS - 1);

    let mut bins = [Bin::default(); NUM_BINS];
    for p in primitives.iter() {
        let bin = &mut bins[bin_of(p)];
        bin.bounds = bin.bounds.merged(&p.bounds);
        bin.count += 1;
    }

    // Suffix sums so each candidate plane can read its right side directly.
    let mut right = [Bin::default(); NUM_BINS];
    let mut acc = Bin::default();
    for i in (1..NUM_BINS).rev() {
        acc.bounds = acc.bounds.merged(&bins[i].bounds);
        acc.count += bins[i].count;
        right[i] = acc;
    }

    let mut best_cost = f32::MAX;
    let mut best_plane = 0;
    let mut left = Bin::default();
    for plane in 0..NUM_BINS - 1 {
        left.bounds = left.bounds.merged(&bins[plane].bounds);
        left.count += bins[plane].count;
        let r = &right[plane + 1];
        let cost = left.bounds.surface_area() * left.count as f32
            + r.bounds.surface_area() * r.count as f32;
        if cost < best_cost {
            best_cost = cost;
            best_plane = plane;
        }
    }

    let mut mid = 0;
    for i in 0..primitives.len() {
        if bin_of(&primitives[i]) <= best_plane {
            primitives.swap(i, mid);
            mid += 1;
        }
    }

    // Everything fell on one side; fall back to a median split.
    if mid == 0 || mid == primitives.len() {
        mid = primitives.len() / 2;
    }
    mid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Axis, Triangle};
    use nalgebra::Vector3;

    /// A flat grid of small, well separated triangles in the z = 0 plane.
    fn triangle_grid(n: usize) -> Mesh {
        let mut mesh = Mesh::new();
        for i in 0..n {
            for j in 0..n {
                let (x, y) = (i as f32, j as f32);
                mesh.add_triangle(Triangle::from_points(
                    Point3::new(x, y, 0.0),
                    Point3::new(x + 0.5, y, 0.0),
                    Point3::new(x, y + 0.5, 0.0),
                ));
            }
        }
        mesh
    }

    #[test]
    fn test_empty_mesh_is_rejected() {
        assert!(matches!(
            SpatialIndex::build(&Mesh::new()),
            Err(VoxScanError::EmptyMesh)
        ));
    }

    #[test]
    fn test_tree_is_balanced_enough() {
        let index = SpatialIndex::build(&triangle_grid(32)).unwrap();
        assert_eq!(index.triangle_count(), 1024);
        // 1024 triangles in leaves of at most 4: depth stays logarithmic.
        assert!(index.depth() <= 20, "depth {}", index.depth());
        let mut seen = index.order.clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..1024).collect::<Vec<u32>>());
    }

    #[test]
    fn test_query_matches_brute_force() {
        let mesh = triangle_grid(16);
        let index = SpatialIndex::build(&mesh).unwrap();
        for i in 0..40 {
            for j in 0..40 {
                let origin = Point3::new(i as f32 * 0.4 + 0.05, j as f32 * 0.4 + 0.07, -1.0);
                let ray = Ray::new(origin, Axis::Z);
                let expected = mesh
                    .triangles
                    .iter()
                    .filter(|t| intersect_triangle(&ray, &t.positions()).is_some())
                    .count();
                assert_eq!(index.query(&ray).len(), expected);
            }
        }
    }

    #[test]
    fn test_query_returns_every_crossing() {
        let index = SpatialIndex::build(&Mesh::cuboid(Vector3::new(1.0, 1.0, 1.0))).unwrap();
        let ray = Ray::new(Point3::new(0.3, -5.0, 0.1), Axis::Y);
        let mut hits = index.query(&ray);
        assert_eq!(hits.len(), 2);
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        assert!((hits[0].point.y + 1.0).abs() < 1e-6);
        assert!((hits[1].point.y - 1.0).abs() < 1e-6);
        assert!((hits[0].distance - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_ray_missing_bounds_hits_nothing() {
        let index = SpatialIndex::build(&Mesh::cube(2.0)).unwrap();
        let ray = Ray::new(Point3::new(5.0, 5.0, -5.0), Axis::Z);
        assert!(index.query(&ray).is_empty());
    }
}
