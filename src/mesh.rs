//! Triangle mesh data and the factories the deferred-recompute protocol
//! tessellates with.
//!
//! Meshes are plain CPU-side data: hosts upload [`Vertex`] slices to the GPU
//! themselves (the layout is `Pod` for zero-copy casts). The factories here
//! cover exactly the shapes the graphic leaves need; this is not a general
//! triangulation library.

use cgmath::{InnerSpace, Point2};

/// Index type used for mesh index buffers.
pub type MeshIndex = u32;

/// A mesh vertex: position and normal in local mesh space.
///
/// `#[repr(C)]` for predictable layout, `Pod`/`Zeroable` for zero-copy GPU
/// buffer uploads.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// An indexed triangle mesh.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TriangleMesh {
    vertices: Vec<Vertex>,
    indices: Vec<MeshIndex>,
}

impl TriangleMesh {
    /// Creates a mesh from raw vertex and index data.
    ///
    /// Indices are consumed in groups of three, one triangle per group.
    pub fn from_raw(vertices: Vec<Vertex>, indices: Vec<MeshIndex>) -> Self {
        debug_assert!(indices.len() % 3 == 0, "index count must be a multiple of 3");
        Self { vertices, indices }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[MeshIndex] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Extrudes a planar polygon outline into a solid slab of the given
/// thickness.
///
/// The outline lies in the local xy plane and is extruded along +z from 0 to
/// `thickness`. Vertices must wind counter-clockwise; callers with unknown
/// winding reverse first. Caps are fan-triangulated, so concave outlines are
/// not supported. Faces are flat-shaded (vertices duplicated per face).
///
/// # Arguments
/// * `outline` - Polygon vertices, at least 3
/// * `thickness` - Extrusion depth, positive
pub fn extruded_polygon(outline: &[Point2<f64>], thickness: f64) -> TriangleMesh {
    debug_assert!(outline.len() >= 3, "polygon needs at least 3 vertices");
    debug_assert!(thickness > 0.0, "thickness must be positive");

    let n = outline.len();
    let top = thickness as f32;
    let mut vertices = Vec::with_capacity(2 * n + 4 * n);
    let mut indices = Vec::with_capacity(3 * (2 * (n - 2) + 2 * n));

    // Top cap (z = thickness, normal +z), fan-triangulated.
    for p in outline {
        vertices.push(Vertex {
            position: [p.x as f32, p.y as f32, top],
            normal: [0.0, 0.0, 1.0],
        });
    }
    for i in 1..n - 1 {
        indices.extend_from_slice(&[0, i as MeshIndex, (i + 1) as MeshIndex]);
    }

    // Bottom cap (z = 0, normal -z), reversed winding.
    let base = vertices.len() as MeshIndex;
    for p in outline {
        vertices.push(Vertex {
            position: [p.x as f32, p.y as f32, 0.0],
            normal: [0.0, 0.0, -1.0],
        });
    }
    for i in 1..n - 1 {
        indices.extend_from_slice(&[base, base + (i + 1) as MeshIndex, base + i as MeshIndex]);
    }

    // Side walls, one flat-shaded quad per edge.
    for i in 0..n {
        let j = (i + 1) % n;
        let (a, b) = (outline[i], outline[j]);
        let edge = b - a;
        // Outward normal of a counter-clockwise edge.
        let normal = cgmath::Vector2::new(edge.y, -edge.x).normalize();
        let normal = [normal.x as f32, normal.y as f32, 0.0];

        let base = vertices.len() as MeshIndex;
        vertices.push(Vertex { position: [a.x as f32, a.y as f32, 0.0], normal });
        vertices.push(Vertex { position: [b.x as f32, b.y as f32, 0.0], normal });
        vertices.push(Vertex { position: [b.x as f32, b.y as f32, top], normal });
        vertices.push(Vertex { position: [a.x as f32, a.y as f32, top], normal });
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    TriangleMesh::from_raw(vertices, indices)
}

/// Creates a capsule centered at the origin, aligned with the z axis.
///
/// The cylindrical section has the given `length`; each hemispherical cap has
/// the given `radius`, so the total z extent is `length + 2 * radius`.
///
/// # Arguments
/// * `length` - Length of the cylindrical section (0 yields a sphere)
/// * `radius` - Radius of the capsule
/// * `segments` - Segments around the circumference (minimum 3)
/// * `rings` - Latitude rings across both caps (minimum 2, rounded up to even)
pub fn capsule(length: f64, radius: f64, segments: u32, rings: u32) -> TriangleMesh {
    use std::f64::consts::PI;

    let segments = segments.max(3);
    let mut rings = rings.max(2);
    if rings % 2 == 1 {
        rings += 1;
    }
    let half = length / 2.0;

    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    // Sphere latitude rings, with the equator duplicated and the two copies
    // shifted apart by the cylinder length. The duplicated ring forms the
    // cylinder wall; its normals are already radial there.
    let rows = rings + 2;
    for row in 0..rows {
        let (phi_index, offset) = if row <= rings / 2 {
            (row, half)
        } else {
            (row - 1, -half)
        };
        let phi = PI * phi_index as f64 / rings as f64;
        let (sin_phi, cos_phi) = phi.sin_cos();

        for seg in 0..=segments {
            let theta = 2.0 * PI * seg as f64 / segments as f64;
            let (sin_theta, cos_theta) = theta.sin_cos();

            let dir = [sin_phi * cos_theta, sin_phi * sin_theta, cos_phi];
            vertices.push(Vertex {
                position: [
                    (dir[0] * radius) as f32,
                    (dir[1] * radius) as f32,
                    (dir[2] * radius + offset) as f32,
                ],
                normal: [dir[0] as f32, dir[1] as f32, dir[2] as f32],
            });
        }
    }

    let verts_per_ring = segments + 1;
    for row in 0..rows - 1 {
        for seg in 0..segments {
            let current = row * verts_per_ring + seg;
            let next = current + verts_per_ring;

            // Skip degenerate triangles at the poles.
            if row != 0 {
                indices.extend_from_slice(&[current, next, current + 1]);
            }
            if row != rows - 2 {
                indices.extend_from_slice(&[current + 1, next, next + 1]);
            }
        }
    }

    TriangleMesh::from_raw(vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::EPSILON;

    fn unit_square() -> Vec<Point2<f64>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ]
    }

    // ========================================================================
    // Extruded Polygon Tests
    // ========================================================================

    #[test]
    fn test_extruded_square_counts() {
        let mesh = extruded_polygon(&unit_square(), 0.5);

        // 2 caps of 4 vertices + 4 side quads of 4 vertices.
        assert_eq!(mesh.vertex_count(), 2 * 4 + 4 * 4);
        // 2 cap fans of 2 triangles + 4 quads of 2 triangles.
        assert_eq!(mesh.triangle_count(), 2 * 2 + 4 * 2);
    }

    #[test]
    fn test_extruded_polygon_z_extent() {
        let mesh = extruded_polygon(&unit_square(), 0.25);

        for v in mesh.vertices() {
            assert!(
                v.position[2].abs() < EPSILON || (v.position[2] - 0.25).abs() < EPSILON,
                "vertex z {} not on either face",
                v.position[2]
            );
        }
    }

    #[test]
    fn test_extruded_polygon_cap_normals() {
        let mesh = extruded_polygon(&unit_square(), 0.5);

        // First 4 vertices are the top cap, next 4 the bottom cap.
        for v in &mesh.vertices()[0..4] {
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
        }
        for v in &mesh.vertices()[4..8] {
            assert_eq!(v.normal, [0.0, 0.0, -1.0]);
        }
    }

    #[test]
    fn test_extruded_polygon_side_normals_outward() {
        let mesh = extruded_polygon(&unit_square(), 0.5);

        // First side quad follows the edge (0,0) -> (1,0); outward is -y.
        let v = &mesh.vertices()[8];
        assert!((v.normal[0]).abs() < EPSILON);
        assert!((v.normal[1] + 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_extruded_triangle() {
        let outline = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        ];
        let mesh = extruded_polygon(&outline, 1.0);

        assert_eq!(mesh.vertex_count(), 2 * 3 + 3 * 4);
        assert_eq!(mesh.triangle_count(), 2 * 1 + 3 * 2);
    }

    // ========================================================================
    // Capsule Tests
    // ========================================================================

    #[test]
    fn test_capsule_counts() {
        let segments = 8;
        let rings = 4;
        let mesh = capsule(0.3, 0.05, segments, rings);

        assert_eq!(mesh.vertex_count(), ((rings + 2) * (segments + 1)) as usize);
        assert!(mesh.triangle_count() > 0);
    }

    #[test]
    fn test_capsule_z_extent() {
        let mesh = capsule(0.4, 0.1, 16, 8);
        let expected = (0.4_f32 / 2.0) + 0.1;

        let max_z = mesh
            .vertices()
            .iter()
            .map(|v| v.position[2])
            .fold(f32::MIN, f32::max);
        let min_z = mesh
            .vertices()
            .iter()
            .map(|v| v.position[2])
            .fold(f32::MAX, f32::min);

        assert!((max_z - expected).abs() < EPSILON);
        assert!((min_z + expected).abs() < EPSILON);
    }

    #[test]
    fn test_capsule_normals_are_unit() {
        let mesh = capsule(0.3, 0.05, 8, 4);

        for v in mesh.vertices() {
            let [x, y, z] = v.normal;
            let magnitude = (x * x + y * y + z * z).sqrt();
            assert!((magnitude - 1.0).abs() < 1e-4, "normal magnitude {magnitude}");
        }
    }

    #[test]
    fn test_capsule_odd_rings_rounded_up() {
        let even = capsule(0.3, 0.05, 8, 4);
        let odd = capsule(0.3, 0.05, 8, 3);

        assert_eq!(even.vertex_count(), odd.vertex_count());
    }

    #[test]
    fn test_zero_length_capsule_is_sphere_sized() {
        let mesh = capsule(0.0, 0.5, 16, 8);

        let max_z = mesh
            .vertices()
            .iter()
            .map(|v| v.position[2])
            .fold(f32::MIN, f32::max);
        assert!((max_z - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_mesh_from_raw_roundtrip() {
        let vertices = vec![
            Vertex { position: [0.0, 0.0, 0.0], normal: [0.0, 0.0, 1.0] },
            Vertex { position: [1.0, 0.0, 0.0], normal: [0.0, 0.0, 1.0] },
            Vertex { position: [0.0, 1.0, 0.0], normal: [0.0, 0.0, 1.0] },
        ];
        let mesh = TriangleMesh::from_raw(vertices.clone(), vec![0, 1, 2]);

        assert_eq!(mesh.vertices(), &vertices[..]);
        assert_eq!(mesh.indices(), &[0, 1, 2]);
        assert_eq!(mesh.triangle_count(), 1);
    }
}
