/// Geometry primitives: surfaces, triangles and the loader's scene graph
use nalgebra::{Point3, Vector3};
use std::sync::OnceLock;

use crate::bounds::Aabb;

/// Normal assigned to vertices whose faces have no usable area.
const FALLBACK_NORMAL: Vector3<f32> = Vector3::new(0.0, 0.0, 1.0);

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

    /// Face normal from the winding order, or `None` for a zero-area face
    pub fn calculate_normal(&self) -> Option<Vector3<f32>> {
        face_normal(
            &self.vertices[0].position,
            &self.vertices[1].position,
            &self.vertices[2].position,
        )
    }
}

fn face_normal(a: &Point3<f32>, b: &Point3<f32>, c: &Point3<f32>) -> Option<Vector3<f32>> {
    (b - a).cross(&(c - a)).try_normalize(f32::EPSILON)
}

fn is_usable_normal(n: &Vector3<f32>) -> bool {
    n.iter().all(|c| c.is_finite()) && n.norm_squared() > 1e-12
}

/// One drawable triangle mesh.
///
/// Positions are immutable after construction so the cached bounding box
/// never goes stale. Without `indices`, every three positions form a triangle.
#[derive(Debug, Clone)]
pub struct Surface {
    pub name: Option<String>,
    positions: Vec<Point3<f32>>,
    normals: Option<Vec<Vector3<f32>>>,
    indices: Option<Vec<u32>>,
    bounds: OnceLock<Aabb>,
}

impl Surface {
    pub fn new(positions: Vec<Point3<f32>>) -> Self {
        Self {
            name: None,
            positions,
            normals: None,
            indices: None,
            bounds: OnceLock::new(),
        }
    }

    pub fn indexed(positions: Vec<Point3<f32>>, indices: Vec<u32>) -> Self {
        Self {
            indices: Some(indices),
            ..Self::new(positions)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach per-vertex normals. Ignored unless there is one per position.
    pub fn with_normals(mut self, normals: Vec<Vector3<f32>>) -> Self {
        if normals.len() == self.positions.len() {
            self.normals = Some(normals);
        }
        self
    }

    pub fn from_triangles(triangles: &[Triangle]) -> Self {
        let mut positions = Vec::with_capacity(triangles.len() * 3);
        let mut normals = Vec::with_capacity(triangles.len() * 3);
        for triangle in triangles {
            for vertex in &triangle.vertices {
                positions.push(vertex.position);
                normals.push(vertex.normal);
            }
        }
        Self::new(positions).with_normals(normals)
    }

    pub fn positions(&self) -> &[Point3<f32>] {
        &self.positions
    }

    pub fn normals(&self) -> Option<&[Vector3<f32>]> {
        self.normals.as_deref()
    }

    pub fn indices(&self) -> Option<&[u32]> {
        self.indices.as_deref()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len() / 3,
            None => self.positions.len() / 3,
        }
    }

    /// Object-space bounds, computed on first use.
    pub fn bounds(&self) -> Aabb {
        *self
            .bounds
            .get_or_init(|| Aabb::from_points(self.positions.iter()))
    }

    fn triangle_indices(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        let count = self.triangle_count();
        (0..count).map(move |t| match &self.indices {
            Some(indices) => [
                indices[t * 3] as usize,
                indices[t * 3 + 1] as usize,
                indices[t * 3 + 2] as usize,
            ],
            None => [t * 3, t * 3 + 1, t * 3 + 2],
        })
    }

    /// Iterate triangles with their vertex normals.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.triangle_indices().map(move |[a, b, c]| {
            let vertex = |i: usize| Vertex {
                position: self.positions[i],
                normal: self
                    .normals
                    .as_ref()
                    .map(|n| n[i])
                    .unwrap_or(FALLBACK_NORMAL),
            };
            Triangle::new(vertex(a), vertex(b), vertex(c))
        })
    }

    pub fn has_usable_normals(&self) -> bool {
        self.normals
            .as_ref()
            .is_some_and(|normals| normals.iter().all(is_usable_normal))
    }

    /// Fill in missing or degenerate normals.
    ///
    /// Unindexed surfaces get flat face normals; indexed surfaces get smooth,
    /// area-weighted vertex normals. Supplied normals that are finite and
    /// non-zero are kept.
    pub fn ensure_normals(&mut self) {
        if self.has_usable_normals() {
            return;
        }
        let computed = self.compute_normals();
        self.normals = Some(match self.normals.take() {
            Some(existing) => existing
                .into_iter()
                .zip(computed)
                .map(|(given, fresh)| {
                    if is_usable_normal(&given) {
                        given.normalize()
                    } else {
                        fresh
                    }
                })
                .collect(),
            None => computed,
        });
    }

    fn compute_normals(&self) -> Vec<Vector3<f32>> {
        let mut accum = vec![Vector3::zeros(); self.positions.len()];
        for [a, b, c] in self.triangle_indices() {
            let (pa, pb, pc) = (&self.positions[a], &self.positions[b], &self.positions[c]);
            if self.indices.is_some() {
                // Cross product length is twice the area, which weights the sum.
                let weighted = (pb - pa).cross(&(pc - pa));
                for i in [a, b, c] {
                    accum[i] += weighted;
                }
            } else {
                let n = face_normal(pa, pb, pc).unwrap_or(FALLBACK_NORMAL);
                for i in [a, b, c] {
                    accum[i] = n;
                }
            }
        }
        accum
            .into_iter()
            .map(|n| n.try_normalize(f32::EPSILON).unwrap_or(FALLBACK_NORMAL))
            .collect()
    }

    /// Axis-aligned cube centered on the origin, used for loading and error markers
    pub fn cube(size: f32) -> Self {
        let h = size / 2.0;
        // (normal, tangent u, tangent v) per face, with u x v == normal
        let faces = [
            (Vector3::z(), Vector3::x(), Vector3::y()),
            (-Vector3::z(), Vector3::y(), Vector3::x()),
            (Vector3::y(), Vector3::z(), Vector3::x()),
            (-Vector3::y(), Vector3::x(), Vector3::z()),
            (Vector3::x(), Vector3::y(), Vector3::z()),
            (-Vector3::x(), Vector3::z(), Vector3::y()),
        ];
        let mut triangles = Vec::with_capacity(12);
        for (n, u, v) in faces {
            let corner = |su: f32, sv: f32| {
                let p = n * h + u * (su * h) + v * (sv * h);
                Vertex::new(p.x, p.y, p.z, n.x, n.y, n.z)
            };
            let (a, b, c, d) = (corner(-1.0, -1.0), corner(1.0, -1.0), corner(1.0, 1.0), corner(-1.0, 1.0));
            triangles.push(Triangle::new(a, b, c));
            triangles.push(Triangle::new(a, c, d));
        }
        Self::from_triangles(&triangles)
    }
}

/// Loader output: a tree of named groups and surfaces
#[derive(Debug, Clone)]
pub enum SceneNode {
    Surface(Surface),
    Group {
        name: Option<String>,
        children: Vec<SceneNode>,
    },
}

impl SceneNode {
    pub fn group(name: Option<String>, children: Vec<SceneNode>) -> Self {
        SceneNode::Group { name, children }
    }

    pub fn surfaces(&self) -> Vec<&Surface> {
        let mut out = Vec::new();
        self.collect_surfaces(&mut out);
        out
    }

    fn collect_surfaces<'a>(&'a self, out: &mut Vec<&'a Surface>) {
        match self {
            SceneNode::Surface(surface) => out.push(surface),
            SceneNode::Group { children, .. } => {
                for child in children {
                    child.collect_surfaces(out);
                }
            }
        }
    }

    /// Flatten the tree into its surfaces, depth-first.
    pub fn into_surfaces(self) -> Vec<Surface> {
        match self {
            SceneNode::Surface(surface) => vec![surface],
            SceneNode::Group { children, .. } => children
                .into_iter()
                .flat_map(SceneNode::into_surfaces)
                .collect(),
        }
    }

    pub fn surfaces_mut(&mut self) -> Vec<&mut Surface> {
        match self {
            SceneNode::Surface(surface) => vec![surface],
            SceneNode::Group { children, .. } => children
                .iter_mut()
                .flat_map(SceneNode::surfaces_mut)
                .collect(),
        }
    }

    pub fn bounds(&self) -> Aabb {
        self.surfaces()
            .iter()
            .fold(Aabb::empty(), |acc, s| acc.union(&s.bounds()))
    }

    pub fn triangle_count(&self) -> usize {
        self.surfaces().iter().map(|s| s.triangle_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_is_closed_and_outward() {
        let cube = Surface::cube(2.0);
        assert_eq!(cube.triangle_count(), 12);
        let bounds = cube.bounds();
        assert_relative_eq!(bounds.min, Point3::new(-1.0, -1.0, -1.0));
        assert_relative_eq!(bounds.max, Point3::new(1.0, 1.0, 1.0));

        for triangle in cube.triangles() {
            let winding = triangle.calculate_normal().unwrap();
            assert_relative_eq!(winding, triangle.vertices[0].normal, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_flat_normals_for_unindexed() {
        let mut surface = Surface::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]);
        assert!(surface.normals().is_none());
        surface.ensure_normals();
        for n in surface.normals().unwrap() {
            assert_relative_eq!(*n, Vector3::new(0.0, 0.0, 1.0));
        }
    }

    #[test]
    fn test_smooth_normals_for_indexed() {
        // Two triangles folded along the y axis
        let mut surface = Surface::indexed(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
            vec![0, 2, 1, 0, 1, 3],
        );
        surface.ensure_normals();
        let normals = surface.normals().unwrap();
        assert!(surface.has_usable_normals());
        // Shared edge vertices average both faces
        let half = std::f32::consts::FRAC_1_SQRT_2;
        assert_relative_eq!(normals[0], Vector3::new(half, 0.0, half), epsilon = 1e-6);
        assert_relative_eq!(normals[2], Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_zero_normals_are_repaired() {
        let tri = Triangle::new(
            Vertex::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            Vertex::new(0.0, 1.0, 0.0, 0.0, 0.0, 0.0),
            Vertex::new(0.0, 0.0, 1.0, 0.0, 0.0, 0.0),
        );
        let mut surface = Surface::from_triangles(&[tri]);
        assert!(!surface.has_usable_normals());
        surface.ensure_normals();
        assert_relative_eq!(surface.normals().unwrap()[0], Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_degenerate_triangle_gets_fallback_normal() {
        let mut surface = Surface::new(vec![Point3::new(1.0, 1.0, 1.0); 3]);
        surface.ensure_normals();
        assert!(surface.has_usable_normals());
    }

    #[test]
    fn test_scene_node_flattening() {
        let node = SceneNode::group(
            Some("root".into()),
            vec![
                SceneNode::Surface(Surface::cube(1.0).with_name("a")),
                SceneNode::group(None, vec![SceneNode::Surface(Surface::cube(2.0).with_name("b"))]),
            ],
        );
        assert_eq!(node.surfaces().len(), 2);
        assert_eq!(node.triangle_count(), 24);
        assert_relative_eq!(node.bounds().max_extent(), 2.0);
        let names: Vec<_> = node
            .into_surfaces()
            .into_iter()
            .filter_map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
