//! Static definition DTOs.
//!
//! A definition tree describes a graphic tree declaratively: plain value
//! holders with no behavior, produced by whatever configuration layer the
//! host uses and consumed once by [`crate::factory`]. Geometry kinds carry an
//! explicit discriminant ([`GeometryDefinition`]); the set defined here is
//! deliberately wider than what the factory builds, so consumers must be
//! prepared to skip kinds they do not handle.

use crate::common::RgbaColor;

/// Declarative description of a group and its subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDefinition {
    pub name: String,
    pub groups: Vec<GroupDefinition>,
    pub graphics: Vec<GraphicDefinition>,
}

impl GroupDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
            graphics: Vec::new(),
        }
    }
}

/// Declarative description of one leaf graphic.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicDefinition {
    pub name: String,
    pub visible: bool,
    pub color: RgbaColor,
    pub geometry: GeometryDefinition,
}

impl GraphicDefinition {
    pub fn new(name: impl Into<String>, geometry: GeometryDefinition) -> Self {
        Self {
            name: name.into(),
            visible: true,
            color: RgbaColor::default(),
            geometry,
        }
    }
}

/// Geometry parameters, one variant per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryDefinition {
    Point2D {
        center: [f64; 2],
        size: f64,
    },
    Polygon2D {
        vertices: Vec<[f64; 2]>,
        vertex_count: Option<usize>,
    },
    Capsule3D {
        center: [f64; 3],
        axis: [f64; 3],
        length: f64,
        radius: f64,
    },
    ExtrudedPolygon3D {
        position: [f64; 3],
        /// Quaternion components, scalar first: `[w, x, y, z]`.
        orientation: [f64; 4],
        vertices: Vec<[f64; 2]>,
        vertex_count: Option<usize>,
        thickness: f64,
    },
    /// Polynomial trajectory ribbon. Defined for interchange completeness;
    /// the factory does not build it yet.
    Polynomial3D {
        coefficients_x: Vec<f64>,
        coefficients_y: Vec<f64>,
        coefficients_z: Vec<f64>,
        size: f64,
    },
}

impl GeometryDefinition {
    /// The kind discriminant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Point2D { .. } => "Point2D",
            Self::Polygon2D { .. } => "Polygon2D",
            Self::Capsule3D { .. } => "Capsule3D",
            Self::ExtrudedPolygon3D { .. } => "ExtrudedPolygon3D",
            Self::Polynomial3D { .. } => "Polynomial3D",
        }
    }
}
