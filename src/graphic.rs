//! Leaf graphic kinds and their live parameters.
//!
//! Parameters are `f64` and externally driven: the host mutates them between
//! frames through the tree's accessors, and the render pass reads whatever
//! values are current. Dispatch over kinds is by tagged enum ([`Shape2D`],
//! [`Shape3D`]) with one arm per kind; adding a kind means adding one variant
//! and its arms.
//!
//! The 3D kinds tessellate through the deferred protocol in [`crate::regen`]:
//! `snapshot` captures their inputs, the kind's mesh function runs off the
//! render path, and the render pass applies the result.

use std::sync::Arc;

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point2, Point3, Quaternion, Vector3};

use crate::common::DEGENERATE_TOLERANCE;
use crate::mesh::{self, TriangleMesh};
use crate::regen::{MeshRegen, MeshUpdate, RegenJob, Snapshot};
use crate::render::Geometry;

const CAPSULE_SEGMENTS: u32 = 32;
const CAPSULE_RINGS: u32 = 16;

/// A circular marker on the 2D overlay.
#[derive(Debug, Clone)]
pub struct Point2D {
    pub center: Point2<f64>,
    pub size: f64,
}

impl Point2D {
    pub fn new() -> Self {
        Self {
            center: Point2::new(0.0, 0.0),
            size: 0.02,
        }
    }

    pub(crate) fn placement(&self) -> Option<Matrix4<f32>> {
        if !self.center.x.is_finite() || !self.center.y.is_finite() {
            return None;
        }
        Some(Matrix4::from_translation(Vector3::new(
            self.center.x as f32,
            self.center.y as f32,
            0.0,
        )))
    }
}

impl Default for Point2D {
    fn default() -> Self {
        Self::new()
    }
}

/// A polygon outline on the 2D overlay.
///
/// `vertex_count` limits the active prefix of `vertices`; `None` uses all of
/// them. The outline is re-read every frame, no deferred recompute involved.
#[derive(Debug, Clone, Default)]
pub struct Polygon2D {
    pub vertices: Vec<Point2<f64>>,
    pub vertex_count: Option<usize>,
}

impl Polygon2D {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn outline(&self) -> Vec<[f32; 2]> {
        active_vertices(&self.vertices, self.vertex_count)
            .iter()
            .filter(|p| p.x.is_finite() && p.y.is_finite())
            .map(|p| [p.x as f32, p.y as f32])
            .collect()
    }
}

/// Inputs that determine a capsule's mesh, captured per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CapsuleData {
    pub length: f64,
    pub radius: f64,
}

/// A capsule in the 3D world, placed by center and axis.
///
/// `length` and `radius` feed the deferred mesh recompute; `center` and
/// `axis` only place the finished mesh and are applied every frame.
#[derive(Debug)]
pub struct Capsule3D {
    pub center: Point3<f64>,
    pub axis: Vector3<f64>,
    pub length: f64,
    pub radius: f64,
    regen: Arc<MeshRegen<CapsuleData>>,
}

impl Capsule3D {
    pub fn new() -> Self {
        Self {
            center: Point3::new(0.0, 0.0, 0.0),
            axis: Vector3::unit_z(),
            length: 0.3,
            radius: 0.05,
            regen: Arc::new(MeshRegen::new()),
        }
    }

    /// Captures the mesh-determining inputs. Degenerate dimensions snapshot
    /// as [`Snapshot::Empty`].
    pub fn snapshot(&self) -> Snapshot<CapsuleData> {
        if !self.length.is_finite()
            || !self.radius.is_finite()
            || self.length < 0.0
            || self.radius <= DEGENERATE_TOLERANCE
        {
            return Snapshot::Empty;
        }
        Snapshot::Data(CapsuleData {
            length: self.length,
            radius: self.radius,
        })
    }

    pub(crate) fn placement(&self) -> Option<Matrix4<f32>> {
        if !point_finite(self.center) || !vector_finite(self.axis) {
            return None;
        }
        if self.axis.magnitude2() < DEGENERATE_TOLERANCE * DEGENERATE_TOLERANCE {
            return None;
        }
        let rotation = Quaternion::from_arc(Vector3::unit_z(), self.axis.normalize(), None);
        let matrix = Matrix4::from_translation(self.center.to_vec()) * Matrix4::from(rotation);
        Some(matrix_to_f32(matrix))
    }
}

impl Default for Capsule3D {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Capsule3D {
    // A clone never shares the recompute channel with the original.
    fn clone(&self) -> Self {
        Self {
            center: self.center,
            axis: self.axis,
            length: self.length,
            radius: self.radius,
            regen: Arc::new(MeshRegen::new()),
        }
    }
}

/// Inputs that determine an extruded polygon's mesh, captured per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonData {
    pub vertices: Vec<Point2<f64>>,
    pub thickness: f64,
}

/// A planar polygon extruded into a solid in the 3D world.
///
/// The outline and thickness feed the deferred mesh recompute; `position` and
/// `orientation` only place the finished mesh and are applied every frame.
/// `vertex_count` limits the active prefix of `vertices` so hosts can drive a
/// runtime-changing vertex count over a fixed-size buffer.
#[derive(Debug)]
pub struct ExtrudedPolygon3D {
    pub position: Point3<f64>,
    pub orientation: Quaternion<f64>,
    pub vertices: Vec<Point2<f64>>,
    pub vertex_count: Option<usize>,
    pub thickness: f64,
    regen: Arc<MeshRegen<PolygonData>>,
}

impl ExtrudedPolygon3D {
    pub fn new() -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 0.0),
            orientation: Quaternion::new(1.0, 0.0, 0.0, 0.0),
            vertices: Vec::new(),
            vertex_count: None,
            thickness: 0.02,
            regen: Arc::new(MeshRegen::new()),
        }
    }

    /// Captures the mesh-determining inputs. Fewer than 3 active vertices,
    /// non-positive thickness, or non-finite values snapshot as
    /// [`Snapshot::Empty`].
    pub fn snapshot(&self) -> Snapshot<PolygonData> {
        let active = active_vertices(&self.vertices, self.vertex_count);
        if active.len() < 3
            || !self.thickness.is_finite()
            || self.thickness <= DEGENERATE_TOLERANCE
            || active.iter().any(|p| !p.x.is_finite() || !p.y.is_finite())
        {
            return Snapshot::Empty;
        }
        Snapshot::Data(PolygonData {
            vertices: active.to_vec(),
            thickness: self.thickness,
        })
    }

    pub(crate) fn placement(&self) -> Option<Matrix4<f32>> {
        let q = self.orientation;
        if !point_finite(self.position)
            || !q.s.is_finite()
            || !vector_finite(q.v)
        {
            return None;
        }
        let matrix = Matrix4::from_translation(self.position.to_vec()) * Matrix4::from(q);
        Some(matrix_to_f32(matrix))
    }
}

impl Default for ExtrudedPolygon3D {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ExtrudedPolygon3D {
    // A clone never shares the recompute channel with the original.
    fn clone(&self) -> Self {
        Self {
            position: self.position,
            orientation: self.orientation,
            vertices: self.vertices.clone(),
            vertex_count: self.vertex_count,
            thickness: self.thickness,
            regen: Arc::new(MeshRegen::new()),
        }
    }
}

/// The 2D overlay graphic kinds.
#[derive(Debug, Clone)]
pub enum Shape2D {
    Point(Point2D),
    Polygon(Polygon2D),
}

impl Shape2D {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Point(_) => "point",
            Self::Polygon(_) => "polygon",
        }
    }

    /// The drawable payload for this frame, or `None` when the placement has
    /// non-finite inputs.
    pub(crate) fn frame_state(&self) -> Option<(Matrix4<f32>, Geometry)> {
        match self {
            Self::Point(point) => {
                let placement = point.placement()?;
                Some((placement, Geometry::Marker { radius: point.size as f32 }))
            }
            Self::Polygon(polygon) => Some((
                Matrix4::from_scale(1.0),
                Geometry::Polyline(polygon.outline()),
            )),
        }
    }
}

/// The 3D world graphic kinds.
#[derive(Debug, Clone)]
pub enum Shape3D {
    Capsule(Capsule3D),
    ExtrudedPolygon(ExtrudedPolygon3D),
}

impl Shape3D {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Capsule(_) => "capsule",
            Self::ExtrudedPolygon(_) => "extruded polygon",
        }
    }

    pub(crate) fn placement(&self) -> Option<Matrix4<f32>> {
        match self {
            Self::Capsule(capsule) => capsule.placement(),
            Self::ExtrudedPolygon(polygon) => polygon.placement(),
        }
    }

    /// Render step 1: publish this frame's input snapshot.
    pub(crate) fn post_snapshot(&self) {
        match self {
            Self::Capsule(capsule) => capsule.regen.post(capsule.snapshot()),
            Self::ExtrudedPolygon(polygon) => polygon.regen.post(polygon.snapshot()),
        }
    }

    /// Render step 3: consume the pending mesh update, if any.
    pub(crate) fn take_update(&self) -> Option<MeshUpdate> {
        match self {
            Self::Capsule(capsule) => capsule.regen.take_update(),
            Self::ExtrudedPolygon(polygon) => polygon.regen.take_update(),
        }
    }

    /// Background step: compare and, when the inputs changed, tessellate.
    pub(crate) fn process(&self) {
        match self {
            Self::Capsule(capsule) => capsule.regen.process(capsule_mesh),
            Self::ExtrudedPolygon(polygon) => polygon.regen.process(extruded_polygon_mesh),
        }
    }

    /// A recompute job bound to this shape's channel, detached from the tree.
    pub(crate) fn regen_job(&self) -> RegenJob {
        match self {
            Self::Capsule(capsule) => {
                let regen = Arc::clone(&capsule.regen);
                Box::new(move || regen.process(capsule_mesh))
            }
            Self::ExtrudedPolygon(polygon) => {
                let regen = Arc::clone(&polygon.regen);
                Box::new(move || regen.process(extruded_polygon_mesh))
            }
        }
    }
}

fn capsule_mesh(data: &CapsuleData) -> TriangleMesh {
    mesh::capsule(data.length, data.radius, CAPSULE_SEGMENTS, CAPSULE_RINGS)
}

fn extruded_polygon_mesh(data: &PolygonData) -> TriangleMesh {
    let mut outline = data.vertices.clone();
    // The extrusion expects counter-clockwise winding.
    let first = outline[1] - outline[0];
    let second = outline[2] - outline[1];
    if first.perp_dot(second) < 0.0 {
        outline.reverse();
    }
    mesh::extruded_polygon(&outline, data.thickness)
}

fn active_vertices(vertices: &[Point2<f64>], count: Option<usize>) -> &[Point2<f64>] {
    match count {
        Some(n) if n < vertices.len() => &vertices[..n],
        _ => vertices,
    }
}

fn point_finite(p: Point3<f64>) -> bool {
    p.x.is_finite() && p.y.is_finite() && p.z.is_finite()
}

fn vector_finite(v: Vector3<f64>) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

fn matrix_to_f32(m: Matrix4<f64>) -> Matrix4<f32> {
    #[rustfmt::skip]
    let converted = Matrix4::new(
        m.x.x as f32, m.x.y as f32, m.x.z as f32, m.x.w as f32,
        m.y.x as f32, m.y.y as f32, m.y.z as f32, m.y.w as f32,
        m.z.x as f32, m.z.y as f32, m.z.z as f32, m.z.w as f32,
        m.w.x as f32, m.w.y as f32, m.w.z as f32, m.w.w as f32,
    );
    converted
}
