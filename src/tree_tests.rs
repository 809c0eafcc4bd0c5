//! Whole-tree scenario tests: visibility aggregation under live edits, the
//! render/background hand-off, and the structural invariants.

use std::time::Duration;

use cgmath::Point2;

use crate::graphic::{Capsule3D, ExtrudedPolygon3D, Point2D, Shape2D, Shape3D};
use crate::regen::BackgroundWorker;
use crate::render::Geometry;
use crate::tree::{GraphicTree, Item, ItemId};

fn point_leaf(tree: &mut GraphicTree, name: &str) -> ItemId {
    tree.create_graphic2d(name, Shape2D::Point(Point2D::new()))
}

fn capsule_leaf(tree: &mut GraphicTree, name: &str) -> ItemId {
    tree.create_graphic3d(name, Shape3D::Capsule(Capsule3D::new()))
}

fn polygon_leaf(tree: &mut GraphicTree, name: &str, outline: &[[f64; 2]]) -> ItemId {
    let mut polygon = ExtrudedPolygon3D::new();
    polygon.vertices = outline.iter().map(|v| Point2::new(v[0], v[1])).collect();
    polygon.thickness = 0.1;
    tree.create_graphic3d(name, Shape3D::ExtrudedPolygon(polygon))
}

fn applied_mesh_vertices(tree: &GraphicTree, leaf: ItemId) -> Option<usize> {
    let Some(Item::Graphic3D(item)) = tree.get(leaf) else {
        panic!("not a 3D leaf");
    };
    match &tree.render3d().get(item.node())?.geometry {
        Some(Geometry::Mesh(mesh)) => Some(mesh.vertex_count()),
        _ => None,
    }
}

const SQUARE: [[f64; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

// ============================================================================
// Visibility Aggregation
// ============================================================================

#[test]
fn test_visibility_scenario() {
    let mut tree = GraphicTree::new();
    let root = tree.root();
    let g = tree.create_group("g");
    let g2 = tree.create_group("g2");
    let l1 = capsule_leaf(&mut tree, "l1");
    let l2 = point_leaf(&mut tree, "l2");
    tree.add_child(root, g).unwrap();
    tree.add_child(g, g2).unwrap();
    tree.add_graphic3d(g, l1).unwrap();
    tree.add_graphic2d(g2, l2).unwrap();
    tree.set_visible(l2, false).unwrap();

    // L1 visible, L2 not: G aggregates to visible.
    assert_eq!(tree.is_visible(g), Some(true));

    tree.set_visible(l1, false).unwrap();
    assert_eq!(tree.is_visible(g), Some(false));
    assert_eq!(tree.is_visible(root), Some(false));

    // A visible leaf added deep inside G2 propagates all the way up.
    let l3 = point_leaf(&mut tree, "l3");
    tree.add_graphic2d(g2, l3).unwrap();
    assert_eq!(tree.is_visible(g2), Some(true));
    assert_eq!(tree.is_visible(g), Some(true));
    assert_eq!(tree.is_visible(root), Some(true));
}

#[test]
fn test_visibility_refreshed_by_removal() {
    let mut tree = GraphicTree::new();
    let root = tree.root();
    let g = tree.create_group("g");
    let leaf = capsule_leaf(&mut tree, "l");
    tree.add_child(root, g).unwrap();
    tree.add_graphic3d(g, leaf).unwrap();
    assert_eq!(tree.is_visible(g), Some(true));

    tree.remove_graphic3d(g, leaf).unwrap();

    // The only visible leaf left, so the chain derives invisible.
    assert_eq!(tree.is_visible(g), Some(false));
    assert_eq!(tree.is_visible(root), Some(false));
}

#[test]
fn test_incremental_refresh_matches_full_walk() {
    let mut tree = GraphicTree::new();
    let root = tree.root();
    let a = tree.create_group("a");
    let b = tree.create_group("b");
    let la = point_leaf(&mut tree, "la");
    let lb = capsule_leaf(&mut tree, "lb");
    tree.add_child(root, a).unwrap();
    tree.add_child(a, b).unwrap();
    tree.add_graphic2d(a, la).unwrap();
    tree.add_graphic3d(b, lb).unwrap();
    tree.set_visible(la, false).unwrap();

    let incremental: Vec<_> = [root, a, b]
        .iter()
        .map(|&id| tree.is_visible(id).unwrap())
        .collect();

    // The full post-order recompute is idempotent over the incremental state.
    tree.update_visible_property(root).unwrap();
    let full: Vec<_> = [root, a, b]
        .iter()
        .map(|&id| tree.is_visible(id).unwrap())
        .collect();
    assert_eq!(incremental, full);
    assert_eq!(full, vec![true, true, true]);
}

#[test]
fn test_group_set_visible_propagates_down() {
    let mut tree = GraphicTree::new();
    let root = tree.root();
    let g = tree.create_group("g");
    let inner = tree.create_group("inner");
    let l1 = point_leaf(&mut tree, "l1");
    let l2 = capsule_leaf(&mut tree, "l2");
    tree.add_child(root, g).unwrap();
    tree.add_child(g, inner).unwrap();
    tree.add_graphic2d(g, l1).unwrap();
    tree.add_graphic3d(inner, l2).unwrap();

    tree.set_visible(g, false).unwrap();

    assert_eq!(tree.is_visible(l1), Some(false));
    assert_eq!(tree.is_visible(l2), Some(false));
    assert_eq!(tree.is_visible(inner), Some(false));
    assert_eq!(tree.is_visible(g), Some(false));
    assert_eq!(tree.is_visible(root), Some(false));

    tree.set_visible(g, true).unwrap();
    assert_eq!(tree.is_visible(l2), Some(true));
    assert_eq!(tree.is_visible(root), Some(true));
}

#[test]
fn test_group_visibility_mirrored_to_containers() {
    let mut tree = GraphicTree::new();
    let root = tree.root();
    let g = tree.create_group("g");
    let leaf = capsule_leaf(&mut tree, "l");
    tree.add_child(root, g).unwrap();
    tree.add_graphic3d(g, leaf).unwrap();

    let (node2d, node3d) = {
        let group = tree.group(g).unwrap();
        (group.node2d(), group.node3d())
    };
    assert!(tree.render2d().get(node2d).unwrap().visible);
    assert!(tree.render3d().get(node3d).unwrap().visible);

    tree.set_visible(leaf, false).unwrap();
    assert!(!tree.render2d().get(node2d).unwrap().visible);
    assert!(!tree.render3d().get(node3d).unwrap().visible);
}

// ============================================================================
// Structural Invariants
// ============================================================================

#[test]
fn test_item_always_has_at_most_one_parent() {
    let mut tree = GraphicTree::new();
    let root = tree.root();
    let a = tree.create_group("a");
    let b = tree.create_group("b");
    let leaf = capsule_leaf(&mut tree, "l");
    tree.add_child(root, a).unwrap();
    tree.add_child(root, b).unwrap();

    tree.add_graphic3d(a, leaf).unwrap();
    tree.add_graphic3d(b, leaf).unwrap();

    // Exactly one forward collection holds the leaf at any instant.
    assert_eq!(tree.parent_of(leaf), Some(b));
    assert!(!tree.group(a).unwrap().graphics3d().contains(&leaf));
    assert!(tree.group(b).unwrap().graphics3d().contains(&leaf));

    tree.detach_from_parent(leaf).unwrap();
    assert_eq!(tree.parent_of(leaf), None);
    assert!(!tree.group(b).unwrap().graphics3d().contains(&leaf));
}

#[test]
fn test_leaf_node_attached_iff_child() {
    let mut tree = GraphicTree::new();
    let root = tree.root();
    let g = tree.create_group("g");
    let leaf = capsule_leaf(&mut tree, "l");
    tree.add_child(root, g).unwrap();

    let node = match tree.get(leaf).unwrap() {
        Item::Graphic3D(item) => item.node(),
        _ => unreachable!(),
    };
    assert_eq!(tree.render3d().get(node).unwrap().parent(), None);

    tree.add_graphic3d(g, leaf).unwrap();
    let container = tree.group(g).unwrap().node3d();
    assert_eq!(tree.render3d().get(node).unwrap().parent(), Some(container));

    tree.detach_from_parent(leaf).unwrap();
    assert_eq!(tree.render3d().get(node).unwrap().parent(), None);
}

#[test]
fn test_duplicate_leaf_name_leaves_collection_unchanged() {
    let mut tree = GraphicTree::new();
    let root = tree.root();
    let first = capsule_leaf(&mut tree, "same");
    let second = capsule_leaf(&mut tree, "same");
    tree.add_graphic3d(root, first).unwrap();

    assert!(tree.add_graphic3d(root, second).is_err());

    let graphics = tree.group(root).unwrap().graphics3d();
    assert_eq!(graphics, &[first]);
    assert_eq!(tree.parent_of(second), None);
}

// ============================================================================
// Render / Deferred Recompute
// ============================================================================

#[test]
fn test_mesh_appears_after_background_cycle() {
    let mut tree = GraphicTree::new();
    let root = tree.root();
    let leaf = polygon_leaf(&mut tree, "slab", &SQUARE);
    tree.add_graphic3d(root, leaf).unwrap();

    // Frame 1 snapshots; nothing applied yet.
    tree.render();
    assert_eq!(applied_mesh_vertices(&tree, leaf), None);

    tree.compute_background();

    // Frame 2 applies the finished mesh.
    tree.render();
    assert_eq!(applied_mesh_vertices(&tree, leaf), Some(6 * SQUARE.len()));
}

#[test]
fn test_mesh_idempotent_for_unchanged_input() {
    let mut tree = GraphicTree::new();
    let root = tree.root();
    let leaf = polygon_leaf(&mut tree, "slab", &SQUARE);
    tree.add_graphic3d(root, leaf).unwrap();

    tree.render();
    tree.compute_background();
    tree.render();

    let node = match tree.get(leaf).unwrap() {
        Item::Graphic3D(item) => item.node(),
        _ => unreachable!(),
    };
    let first = tree.render3d().get(node).unwrap().geometry.clone();

    // Same inputs through another full cycle: applied data is identical.
    tree.render();
    tree.compute_background();
    tree.render();
    let second = tree.render3d().get(node).unwrap().geometry.clone();

    assert!(first.is_some());
    assert_eq!(first, second);
}

#[test]
fn test_mesh_reacts_to_changed_vertices() {
    let mut tree = GraphicTree::new();
    let root = tree.root();
    let leaf = polygon_leaf(&mut tree, "slab", &SQUARE);
    tree.add_graphic3d(root, leaf).unwrap();

    tree.render();
    tree.compute_background();
    tree.render();
    assert_eq!(applied_mesh_vertices(&tree, leaf), Some(6 * 4));

    // Grow the outline by one vertex.
    if let Shape3D::ExtrudedPolygon(polygon) = tree.graphic3d_mut(leaf).unwrap() {
        polygon.vertices.push(Point2::new(-0.5, 0.5));
    }
    tree.render();
    tree.compute_background();
    tree.render();

    assert_eq!(applied_mesh_vertices(&tree, leaf), Some(6 * 5));
}

#[test]
fn test_degenerate_input_clears_mesh() {
    let mut tree = GraphicTree::new();
    let root = tree.root();
    let leaf = polygon_leaf(&mut tree, "slab", &SQUARE);
    tree.add_graphic3d(root, leaf).unwrap();

    tree.render();
    tree.compute_background();
    tree.render();
    assert!(applied_mesh_vertices(&tree, leaf).is_some());

    // Two active vertices cannot form a polygon: not an error, just nothing
    // to draw.
    if let Shape3D::ExtrudedPolygon(polygon) = tree.graphic3d_mut(leaf).unwrap() {
        polygon.vertex_count = Some(2);
    }
    tree.render();
    tree.compute_background();
    tree.render();

    assert_eq!(applied_mesh_vertices(&tree, leaf), None);
}

#[test]
fn test_background_worker_feeds_render_thread() {
    let mut tree = GraphicTree::new();
    let root = tree.root();
    let leaf = polygon_leaf(&mut tree, "slab", &SQUARE);
    tree.add_graphic3d(root, leaf).unwrap();

    let worker = BackgroundWorker::spawn(tree.background_pass(), Duration::from_millis(1));

    // Poll frames until the worker's mesh lands, as a host render loop would.
    let mut applied = None;
    for _ in 0..1000 {
        tree.render();
        applied = applied_mesh_vertices(&tree, leaf);
        if applied.is_some() {
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    worker.stop();

    assert_eq!(applied, Some(6 * SQUARE.len()));
}

#[test]
fn test_render_updates_transform_and_color() {
    let mut tree = GraphicTree::new();
    let root = tree.root();
    let leaf = capsule_leaf(&mut tree, "c");
    tree.add_graphic3d(root, leaf).unwrap();
    tree.set_color(leaf, crate::common::RgbaColor::GREEN).unwrap();
    if let Shape3D::Capsule(capsule) = tree.graphic3d_mut(leaf).unwrap() {
        capsule.center = cgmath::Point3::new(2.0, 0.0, 0.0);
    }

    tree.render();

    let node_id = match tree.get(leaf).unwrap() {
        Item::Graphic3D(item) => item.node(),
        _ => unreachable!(),
    };
    let node = tree.render3d().get(node_id).unwrap();
    assert_eq!(node.color, crate::common::RgbaColor::GREEN);
    assert!((node.transform.w.x - 2.0).abs() < crate::common::EPSILON);
}

#[test]
fn test_nan_placement_collapses_node() {
    let mut tree = GraphicTree::new();
    let root = tree.root();
    let leaf = capsule_leaf(&mut tree, "c");
    tree.add_graphic3d(root, leaf).unwrap();
    if let Shape3D::Capsule(capsule) = tree.graphic3d_mut(leaf).unwrap() {
        capsule.center = cgmath::Point3::new(f64::NAN, 0.0, 0.0);
    }

    tree.render();

    let node_id = match tree.get(leaf).unwrap() {
        Item::Graphic3D(item) => item.node(),
        _ => unreachable!(),
    };
    let node = tree.render3d().get(node_id).unwrap();
    assert_eq!(node.transform.x.x, 0.0);
    assert_eq!(node.transform.y.y, 0.0);
    assert_eq!(node.transform.z.z, 0.0);
}

#[test]
fn test_render_updates_2d_overlay() {
    let mut tree = GraphicTree::new();
    let root = tree.root();
    let leaf = point_leaf(&mut tree, "p");
    tree.add_graphic2d(root, leaf).unwrap();
    if let Shape2D::Point(point) = tree.graphic2d_mut(leaf).unwrap() {
        point.center = Point2::new(0.25, 0.75);
        point.size = 0.05;
    }

    tree.render();

    let node_id = match tree.get(leaf).unwrap() {
        Item::Graphic2D(item) => item.node(),
        _ => unreachable!(),
    };
    let node = tree.render2d().get(node_id).unwrap();
    match &node.geometry {
        Some(Geometry::Marker { radius }) => assert!((radius - 0.05).abs() < crate::common::EPSILON),
        other => panic!("expected marker, got {other:?}"),
    }
    assert!((node.transform.w.x - 0.25).abs() < crate::common::EPSILON);
    assert!((node.transform.w.y - 0.75).abs() < crate::common::EPSILON);
}
