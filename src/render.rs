//! The physical render trees.
//!
//! A [`RenderTree`] is retained-mode data a host renderer mounts and draws:
//! container nodes mirror groups of the logical tree, shape nodes carry the
//! geometry, transform, color, and visibility of leaf graphics. The graphic
//! tree owns two of these (the 2D overlay tree and the 3D world tree) and
//! keeps them synchronized with its own structure; hosts only read them.

use std::collections::HashMap;

use cgmath::{Matrix4, SquareMatrix};

use crate::common::RgbaColor;
use crate::mesh::TriangleMesh;

/// Unique identifier for a node within one render tree.
pub type RenderNodeId = u32;

/// Geometry payload carried by a shape node.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// A tessellated triangle mesh.
    Mesh(TriangleMesh),
    /// A circular marker of the given radius (2D overlay points).
    Marker { radius: f32 },
    /// A closed outline through the given points (2D overlay polygons).
    Polyline(Vec<[f32; 2]>),
}

/// One node of a physical render tree.
///
/// Hierarchy links are managed through [`RenderTree`]; the drawable state
/// (`visible`, `transform`, `geometry`, `color`) is public for the host and
/// is written by the graphic tree's render pass.
#[derive(Debug, Clone)]
pub struct RenderNode {
    pub id: RenderNodeId,
    parent: Option<RenderNodeId>,
    children: Vec<RenderNodeId>,
    pub visible: bool,
    pub transform: Matrix4<f32>,
    pub geometry: Option<Geometry>,
    pub color: RgbaColor,
}

impl RenderNode {
    fn new(id: RenderNodeId) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            visible: true,
            transform: Matrix4::identity(),
            geometry: None,
            color: RgbaColor::default(),
        }
    }

    pub fn parent(&self) -> Option<RenderNodeId> {
        self.parent
    }

    pub fn children(&self) -> &[RenderNodeId] {
        &self.children
    }
}

/// Arena container for one physical subtree.
///
/// Created with a root container node; further nodes start detached and are
/// wired up with [`attach`](RenderTree::attach) / [`detach`](RenderTree::detach).
#[derive(Debug)]
pub struct RenderTree {
    nodes: HashMap<RenderNodeId, RenderNode>,
    root: RenderNodeId,
    next_id: RenderNodeId,
}

impl RenderTree {
    pub fn new() -> Self {
        let mut tree = Self {
            nodes: HashMap::new(),
            root: 0,
            next_id: 0,
        };
        tree.root = tree.add_node();
        tree
    }

    /// Creates a new, detached node.
    pub fn add_node(&mut self) -> RenderNodeId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, RenderNode::new(id));
        id
    }

    /// The root container node hosts mount.
    pub fn root(&self) -> RenderNodeId {
        self.root
    }

    pub fn get(&self, id: RenderNodeId) -> Option<&RenderNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: RenderNodeId) -> Option<&mut RenderNode> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: RenderNodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Attaches `child` under `parent`, detaching it from any previous parent
    /// first. Missing ids are ignored.
    pub fn attach(&mut self, parent: RenderNodeId, child: RenderNodeId) {
        if !self.nodes.contains_key(&parent) || !self.nodes.contains_key(&child) {
            return;
        }
        self.detach(child);

        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.push(child);
        }
        if let Some(child_node) = self.nodes.get_mut(&child) {
            child_node.parent = Some(parent);
        }
    }

    /// Detaches `child` from its parent. No-op when already detached.
    pub fn detach(&mut self, child: RenderNodeId) {
        let Some(parent) = self.nodes.get(&child).and_then(|n| n.parent) else {
            return;
        };
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.retain(|&id| id != child);
        }
        if let Some(child_node) = self.nodes.get_mut(&child) {
            child_node.parent = None;
        }
    }

    /// Removes a node and its whole subtree from the arena.
    pub fn remove_subtree(&mut self, id: RenderNodeId) {
        self.detach(id);
        self.remove_recursive(id);
    }

    fn remove_recursive(&mut self, id: RenderNodeId) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        for child in node.children {
            self.remove_recursive(child);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walks the subtree under `from` in pre-order, parents before children.
    pub fn walk<F>(&self, from: RenderNodeId, visit: &mut F)
    where
        F: FnMut(&RenderNode),
    {
        let Some(node) = self.nodes.get(&from) else {
            return;
        };
        visit(node);
        for &child in &node.children {
            self.walk(child, visit);
        }
    }
}

impl Default for RenderTree {
    fn default() -> Self {
        Self::new()
    }
}
