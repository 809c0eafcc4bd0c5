//! Builds a live graphic tree from a static definition tree.
//!
//! The build is depth-first: every definition becomes an unattached item,
//! attached top-down into its parent group. Problems are never fatal to the
//! build — an unrecognized geometry kind or a duplicate name is logged and
//! skipped, and the rest of the tree still loads.

use cgmath::{Point2, Point3, Quaternion, Vector3};

use crate::definition::{GeometryDefinition, GraphicDefinition, GroupDefinition};
use crate::graphic::{Capsule3D, ExtrudedPolygon3D, Point2D, Polygon2D, Shape2D, Shape3D};
use crate::tree::{GraphicTree, ItemId};

/// Builds a new tree holding the definition's subtree under the root group.
pub fn build_tree(definition: &GroupDefinition) -> GraphicTree {
    let mut tree = GraphicTree::new();
    let root = tree.root();
    build_group(&mut tree, root, definition);
    tree
}

/// Builds one group definition beneath `parent`, recursively.
///
/// Returns the created group's id, or `None` when the name collides with an
/// existing sibling group (logged and skipped).
pub fn build_group(
    tree: &mut GraphicTree,
    parent: ItemId,
    definition: &GroupDefinition,
) -> Option<ItemId> {
    if tree.contains_child(parent, &definition.name) {
        log::warn!(
            "skipping group `{}`: a sibling group already uses the name",
            definition.name
        );
        return None;
    }

    let group = tree.create_group(definition.name.clone());
    if let Err(error) = tree.add_child(parent, group) {
        // The duplicate case is pre-checked; anything else is a caller bug
        // worth surfacing in the log.
        log::error!("failed to attach group `{}`: {error}", definition.name);
        return None;
    }

    for graphic in &definition.graphics {
        build_graphic(tree, group, graphic);
    }
    for child in &definition.groups {
        build_group(tree, group, child);
    }
    Some(group)
}

/// Builds one graphic definition beneath `parent`.
///
/// Returns the created leaf's id, or `None` when the kind is unhandled or the
/// name collides with an existing same-kind sibling (logged and skipped).
pub fn build_graphic(
    tree: &mut GraphicTree,
    parent: ItemId,
    definition: &GraphicDefinition,
) -> Option<ItemId> {
    let leaf = match &definition.geometry {
        GeometryDefinition::Point2D { center, size } => {
            if tree.contains_graphic2d(parent, &definition.name) {
                return skip_duplicate(definition);
            }
            let mut point = Point2D::new();
            point.center = Point2::new(center[0], center[1]);
            point.size = *size;
            let leaf = tree.create_graphic2d(definition.name.clone(), Shape2D::Point(point));
            tree.add_graphic2d(parent, leaf).ok()?;
            leaf
        }
        GeometryDefinition::Polygon2D {
            vertices,
            vertex_count,
        } => {
            if tree.contains_graphic2d(parent, &definition.name) {
                return skip_duplicate(definition);
            }
            let mut polygon = Polygon2D::new();
            polygon.vertices = vertices.iter().map(|v| Point2::new(v[0], v[1])).collect();
            polygon.vertex_count = *vertex_count;
            let leaf = tree.create_graphic2d(definition.name.clone(), Shape2D::Polygon(polygon));
            tree.add_graphic2d(parent, leaf).ok()?;
            leaf
        }
        GeometryDefinition::Capsule3D {
            center,
            axis,
            length,
            radius,
        } => {
            if tree.contains_graphic3d(parent, &definition.name) {
                return skip_duplicate(definition);
            }
            let mut capsule = Capsule3D::new();
            capsule.center = Point3::new(center[0], center[1], center[2]);
            capsule.axis = Vector3::new(axis[0], axis[1], axis[2]);
            capsule.length = *length;
            capsule.radius = *radius;
            let leaf = tree.create_graphic3d(definition.name.clone(), Shape3D::Capsule(capsule));
            tree.add_graphic3d(parent, leaf).ok()?;
            leaf
        }
        GeometryDefinition::ExtrudedPolygon3D {
            position,
            orientation,
            vertices,
            vertex_count,
            thickness,
        } => {
            if tree.contains_graphic3d(parent, &definition.name) {
                return skip_duplicate(definition);
            }
            let mut polygon = ExtrudedPolygon3D::new();
            polygon.position = Point3::new(position[0], position[1], position[2]);
            polygon.orientation = Quaternion::new(
                orientation[0],
                orientation[1],
                orientation[2],
                orientation[3],
            );
            polygon.vertices = vertices.iter().map(|v| Point2::new(v[0], v[1])).collect();
            polygon.vertex_count = *vertex_count;
            polygon.thickness = *thickness;
            let leaf =
                tree.create_graphic3d(definition.name.clone(), Shape3D::ExtrudedPolygon(polygon));
            tree.add_graphic3d(parent, leaf).ok()?;
            leaf
        }
        unhandled => {
            log::error!(
                "unhandled graphic kind `{}`, skipping `{}`",
                unhandled.kind_name(),
                definition.name
            );
            return None;
        }
    };

    // Color and visibility apply after attachment so the ancestor chain's
    // derived flags settle in the same call.
    if let Err(error) = tree.set_color(leaf, definition.color) {
        log::error!("failed to color `{}`: {error}", definition.name);
    }
    if let Err(error) = tree.set_visible(leaf, definition.visible) {
        log::error!("failed to set visibility of `{}`: {error}", definition.name);
    }
    Some(leaf)
}

fn skip_duplicate(definition: &GraphicDefinition) -> Option<ItemId> {
    log::warn!(
        "skipping {} `{}`: a same-kind sibling already uses the name",
        definition.geometry.kind_name(),
        definition.name
    );
    None
}
