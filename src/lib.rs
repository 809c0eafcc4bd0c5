//! Graphic item tree for a telemetry visualizer.
//!
//! A [`GraphicTree`](tree::GraphicTree) is a mutable, named hierarchy of
//! groups and leaf graphics, kept synchronized node-for-node with two
//! physical render subtrees: a 2D overlay tree and a 3D world tree
//! ([`render::RenderTree`]). Structural edits — attach, detach, clear — keep
//! the logical tree, both physical subtrees, and the groups' derived
//! visibility consistent in one operation.
//!
//! Leaves whose geometry depends on externally-driven, variable-size input
//! (an extruded polygon outline, a capsule's dimensions) rebuild their meshes
//! off the render path through the deferred protocol in [`regen`]: the render
//! pass snapshots inputs and applies finished meshes; the expensive
//! tessellation runs inline via
//! [`compute_background`](tree::GraphicTree::compute_background) or on a
//! worker thread via [`background_pass`](tree::GraphicTree::background_pass)
//! and [`regen::BackgroundWorker`].
//!
//! Hosts mount [`node2d_root`](tree::GraphicTree::node2d_root) /
//! [`node3d_root`](tree::GraphicTree::node3d_root) into their own scene and
//! call [`render`](tree::GraphicTree::render) once per frame. This crate
//! never talks to a graphics API; the render trees are retained-mode data.

pub mod common;
pub mod definition;
pub mod factory;
pub mod graphic;
pub mod mesh;
pub mod regen;
pub mod render;
pub mod tree;

pub use common::RgbaColor;
pub use graphic::{Capsule3D, ExtrudedPolygon3D, Point2D, Polygon2D, Shape2D, Shape3D};
pub use mesh::TriangleMesh;
pub use regen::{BackgroundPass, BackgroundWorker, MeshUpdate, Snapshot};
pub use render::{Geometry, RenderNode, RenderNodeId, RenderTree};
pub use tree::{GraphicTree, GraphicTreeError, Item, ItemId, ItemKind};

#[cfg(test)]
mod tree_tests;
