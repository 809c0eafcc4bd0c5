//! The logical graphic item tree.
//!
//! A [`GraphicTree`] owns every item in an arena keyed by [`ItemId`] and
//! keeps the two physical render subtrees (2D overlay, 3D world) synchronized
//! with the logical structure: attaching a leaf to a group attaches its render
//! node to the group's container node, detaching reverses it, and every
//! structural edit refreshes the derived visibility of the groups above it
//! before returning.
//!
//! Items are created unattached, then wired in with [`add_child`] /
//! [`add_graphic2d`] / [`add_graphic3d`]. A group's three child collections
//! (sub-groups, 2D leaves, 3D leaves) are each name-unique; inserting a
//! same-kind sibling with a taken name is rejected loudly and leaves the tree
//! unchanged. The parent back-reference is a plain id, never an owning link:
//! ownership flows only through the arena and the forward collections.
//!
//! [`add_child`]: GraphicTree::add_child
//! [`add_graphic2d`]: GraphicTree::add_graphic2d
//! [`add_graphic3d`]: GraphicTree::add_graphic3d

use std::collections::HashMap;
use std::fmt;

use cgmath::Matrix4;
use thiserror::Error;

use crate::common::{RgbaColor, SEPARATOR};
use crate::graphic::{Shape2D, Shape3D};
use crate::regen::{BackgroundPass, MeshUpdate};
use crate::render::{Geometry, RenderNodeId, RenderTree};

/// Unique identifier for an item in the graphic tree.
pub type ItemId = u32;

/// Name of the root group every [`GraphicTree`] is created with.
pub const ROOT_NAME: &str = "root";

/// The three item kinds of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Group,
    Graphic2D,
    Graphic3D,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group => write!(f, "group"),
            Self::Graphic2D => write!(f, "2D graphic"),
            Self::Graphic3D => write!(f, "3D graphic"),
        }
    }
}

/// Errors raised by structural operations. The tree is left unchanged
/// whenever one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphicTreeError {
    #[error("a {kind} named `{name}` already exists in this group")]
    DuplicateName { kind: ItemKind, name: String },

    #[error("cannot add group `{0}` to its own children")]
    SelfParent(String),

    #[error("cannot add group `{0}` beneath one of its own descendants")]
    CycleDetected(String),

    #[error("unknown item id {0}")]
    UnknownItem(ItemId),

    #[error("item id {0} does not refer to a group")]
    NotAGroup(ItemId),

    #[error("item id {0} does not refer to a graphic")]
    NotAGraphic(ItemId),

    #[error("expected a {expected}, found a {found}")]
    KindMismatch { expected: ItemKind, found: ItemKind },
}

/// A composite item: sub-groups and leaf graphics in three name-unique
/// collections, mirrored into one container node per render tree.
///
/// Its `visible` flag is derived bottom-up from its children and refreshed by
/// the structural operations; it is never set directly.
#[derive(Debug)]
pub struct Group {
    name: String,
    visible: bool,
    parent: Option<ItemId>,
    children: Vec<ItemId>,
    graphics2d: Vec<ItemId>,
    graphics3d: Vec<ItemId>,
    node2d: RenderNodeId,
    node3d: RenderNodeId,
}

impl Group {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn parent(&self) -> Option<ItemId> {
        self.parent
    }

    pub fn children(&self) -> &[ItemId] {
        &self.children
    }

    pub fn graphics2d(&self) -> &[ItemId] {
        &self.graphics2d
    }

    pub fn graphics3d(&self) -> &[ItemId] {
        &self.graphics3d
    }

    /// This group's container node in the 2D overlay tree.
    pub fn node2d(&self) -> RenderNodeId {
        self.node2d
    }

    /// This group's container node in the 3D world tree.
    pub fn node3d(&self) -> RenderNodeId {
        self.node3d
    }
}

/// A terminal 2D overlay graphic owning exactly one render node.
#[derive(Debug)]
pub struct Leaf2D {
    name: String,
    visible: bool,
    parent: Option<ItemId>,
    node: RenderNodeId,
    color: RgbaColor,
    shape: Shape2D,
}

impl Leaf2D {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn parent(&self) -> Option<ItemId> {
        self.parent
    }

    /// This leaf's render node in the 2D overlay tree.
    pub fn node(&self) -> RenderNodeId {
        self.node
    }

    pub fn color(&self) -> RgbaColor {
        self.color
    }

    pub fn shape(&self) -> &Shape2D {
        &self.shape
    }
}

/// A terminal 3D world graphic owning exactly one render node.
#[derive(Debug)]
pub struct Leaf3D {
    name: String,
    visible: bool,
    parent: Option<ItemId>,
    node: RenderNodeId,
    color: RgbaColor,
    shape: Shape3D,
}

impl Leaf3D {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn parent(&self) -> Option<ItemId> {
        self.parent
    }

    /// This leaf's render node in the 3D world tree.
    pub fn node(&self) -> RenderNodeId {
        self.node
    }

    pub fn color(&self) -> RgbaColor {
        self.color
    }

    pub fn shape(&self) -> &Shape3D {
        &self.shape
    }
}

/// Any node of the graphic tree.
#[derive(Debug)]
pub enum Item {
    Group(Group),
    Graphic2D(Leaf2D),
    Graphic3D(Leaf3D),
}

impl Item {
    pub fn name(&self) -> &str {
        match self {
            Self::Group(g) => &g.name,
            Self::Graphic2D(l) => &l.name,
            Self::Graphic3D(l) => &l.name,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Group(_) => ItemKind::Group,
            Self::Graphic2D(_) => ItemKind::Graphic2D,
            Self::Graphic3D(_) => ItemKind::Graphic3D,
        }
    }

    pub fn is_visible(&self) -> bool {
        match self {
            Self::Group(g) => g.visible,
            Self::Graphic2D(l) => l.visible,
            Self::Graphic3D(l) => l.visible,
        }
    }

    pub fn parent(&self) -> Option<ItemId> {
        match self {
            Self::Group(g) => g.parent,
            Self::Graphic2D(l) => l.parent,
            Self::Graphic3D(l) => l.parent,
        }
    }

    fn set_name(&mut self, name: String) {
        match self {
            Self::Group(g) => g.name = name,
            Self::Graphic2D(l) => l.name = name,
            Self::Graphic3D(l) => l.name = name,
        }
    }
}

/// The graphic item tree and its two physical render subtrees.
///
/// # Examples
///
/// ```
/// use graphic_tree::graphic::{Capsule3D, Shape3D};
/// use graphic_tree::tree::GraphicTree;
///
/// let mut tree = GraphicTree::new();
/// let root = tree.root();
///
/// let arm = tree.create_group("arm");
/// tree.add_child(root, arm).unwrap();
///
/// let target = tree.create_graphic3d("target", Shape3D::Capsule(Capsule3D::new()));
/// tree.add_graphic3d(arm, target).unwrap();
///
/// // One render pass; the background step may run elsewhere.
/// tree.render();
/// tree.compute_background();
/// tree.render();
/// assert!(tree.is_visible(root).unwrap());
/// ```
#[derive(Debug)]
pub struct GraphicTree {
    items: HashMap<ItemId, Item>,
    next_id: ItemId,
    root: ItemId,
    render2d: RenderTree,
    render3d: RenderTree,
}

impl GraphicTree {
    /// Creates a tree holding only the root group, with the two physical
    /// root container nodes hosts mount.
    pub fn new() -> Self {
        let render2d = RenderTree::new();
        let render3d = RenderTree::new();
        let root_group = Group {
            name: ROOT_NAME.to_string(),
            visible: false,
            parent: None,
            children: Vec::new(),
            graphics2d: Vec::new(),
            graphics3d: Vec::new(),
            node2d: render2d.root(),
            node3d: render3d.root(),
        };

        let mut items = HashMap::new();
        items.insert(0, Item::Group(root_group));

        Self {
            items,
            next_id: 1,
            root: 0,
            render2d,
            render3d,
        }
    }

    // ========== Item Creation ==========

    /// Creates a new, unattached group with fresh detached container nodes.
    pub fn create_group(&mut self, name: impl Into<String>) -> ItemId {
        let node2d = self.render2d.add_node();
        let node3d = self.render3d.add_node();
        self.insert_item(Item::Group(Group {
            name: name.into(),
            visible: false,
            parent: None,
            children: Vec::new(),
            graphics2d: Vec::new(),
            graphics3d: Vec::new(),
            node2d,
            node3d,
        }))
    }

    /// Creates a new, unattached 2D leaf with a fresh detached render node.
    pub fn create_graphic2d(&mut self, name: impl Into<String>, shape: Shape2D) -> ItemId {
        let node = self.render2d.add_node();
        self.insert_item(Item::Graphic2D(Leaf2D {
            name: name.into(),
            visible: true,
            parent: None,
            node,
            color: RgbaColor::default(),
            shape,
        }))
    }

    /// Creates a new, unattached 3D leaf with a fresh detached render node.
    pub fn create_graphic3d(&mut self, name: impl Into<String>, shape: Shape3D) -> ItemId {
        let node = self.render3d.add_node();
        self.insert_item(Item::Graphic3D(Leaf3D {
            name: name.into(),
            visible: true,
            parent: None,
            node,
            color: RgbaColor::default(),
            shape,
        }))
    }

    fn insert_item(&mut self, item: Item) -> ItemId {
        let id = self.next_id;
        self.next_id += 1;
        self.items.insert(id, item);
        id
    }

    // ========== Item Access ==========

    /// The root group.
    pub fn root(&self) -> ItemId {
        self.root
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn group(&self, id: ItemId) -> Option<&Group> {
        match self.items.get(&id) {
            Some(Item::Group(group)) => Some(group),
            _ => None,
        }
    }

    pub fn name(&self, id: ItemId) -> Option<&str> {
        self.items.get(&id).map(Item::name)
    }

    /// Renames an item. Uniqueness is checked only at insertion time; an
    /// existing sibling collision introduced here is the caller's to resolve.
    pub fn set_name(
        &mut self,
        id: ItemId,
        name: impl Into<String>,
    ) -> Result<(), GraphicTreeError> {
        let item = self
            .items
            .get_mut(&id)
            .ok_or(GraphicTreeError::UnknownItem(id))?;
        item.set_name(name.into());
        Ok(())
    }

    pub fn parent_of(&self, id: ItemId) -> Option<ItemId> {
        self.items.get(&id).and_then(Item::parent)
    }

    pub fn color(&self, id: ItemId) -> Option<RgbaColor> {
        match self.items.get(&id) {
            Some(Item::Graphic2D(leaf)) => Some(leaf.color),
            Some(Item::Graphic3D(leaf)) => Some(leaf.color),
            _ => None,
        }
    }

    pub fn set_color(&mut self, id: ItemId, color: RgbaColor) -> Result<(), GraphicTreeError> {
        match self.items.get_mut(&id) {
            Some(Item::Graphic2D(leaf)) => leaf.color = color,
            Some(Item::Graphic3D(leaf)) => leaf.color = color,
            Some(_) => return Err(GraphicTreeError::NotAGraphic(id)),
            None => return Err(GraphicTreeError::UnknownItem(id)),
        }
        Ok(())
    }

    pub fn graphic2d(&self, id: ItemId) -> Option<&Shape2D> {
        match self.items.get(&id) {
            Some(Item::Graphic2D(leaf)) => Some(&leaf.shape),
            _ => None,
        }
    }

    /// Mutable access to a 2D leaf's parameters; the host drives inputs
    /// through this between frames.
    pub fn graphic2d_mut(&mut self, id: ItemId) -> Result<&mut Shape2D, GraphicTreeError> {
        match self.items.get_mut(&id) {
            Some(Item::Graphic2D(leaf)) => Ok(&mut leaf.shape),
            Some(_) => Err(GraphicTreeError::NotAGraphic(id)),
            None => Err(GraphicTreeError::UnknownItem(id)),
        }
    }

    pub fn graphic3d(&self, id: ItemId) -> Option<&Shape3D> {
        match self.items.get(&id) {
            Some(Item::Graphic3D(leaf)) => Some(&leaf.shape),
            _ => None,
        }
    }

    /// Mutable access to a 3D leaf's parameters; the host drives inputs
    /// through this between frames.
    pub fn graphic3d_mut(&mut self, id: ItemId) -> Result<&mut Shape3D, GraphicTreeError> {
        match self.items.get_mut(&id) {
            Some(Item::Graphic3D(leaf)) => Ok(&mut leaf.shape),
            Some(_) => Err(GraphicTreeError::NotAGraphic(id)),
            None => Err(GraphicTreeError::UnknownItem(id)),
        }
    }

    // ========== Structural Operations ==========

    /// Attaches `child` (a group) under `parent`.
    ///
    /// No-op when `child` is already a child of `parent`. Rejected, leaving
    /// the tree unchanged, when a sibling group already uses the name, when
    /// `child == parent`, or when `child` is an ancestor of `parent`. A child
    /// attached elsewhere is detached from there first.
    pub fn add_child(&mut self, parent: ItemId, child: ItemId) -> Result<(), GraphicTreeError> {
        self.require_group(parent)?;
        let child_item = self
            .items
            .get(&child)
            .ok_or(GraphicTreeError::UnknownItem(child))?;
        let Item::Group(child_group) = child_item else {
            return Err(GraphicTreeError::KindMismatch {
                expected: ItemKind::Group,
                found: child_item.kind(),
            });
        };
        let child_name = child_group.name.clone();

        if child_group.parent == Some(parent) {
            return Ok(());
        }
        if child == parent {
            return Err(GraphicTreeError::SelfParent(child_name));
        }
        if self.is_ancestor_of(child, parent) {
            return Err(GraphicTreeError::CycleDetected(child_name));
        }
        if self.contains_child(parent, &child_name) {
            return Err(GraphicTreeError::DuplicateName {
                kind: ItemKind::Group,
                name: child_name,
            });
        }

        self.detach_internal(child);

        let (parent_node2d, parent_node3d) = {
            let group = self.group_mut(parent);
            group.children.push(child);
            (group.node2d, group.node3d)
        };
        let (child_node2d, child_node3d) = {
            let group = self.group_mut(child);
            group.parent = Some(parent);
            (group.node2d, group.node3d)
        };
        self.render2d.attach(parent_node2d, child_node2d);
        self.render3d.attach(parent_node3d, child_node3d);

        self.refresh_visibility_upward(Some(parent));
        Ok(())
    }

    /// Attaches a 2D leaf under `parent`. Same contract as
    /// [`add_child`](GraphicTree::add_child), minus the cycle checks leaves
    /// cannot cause.
    pub fn add_graphic2d(&mut self, parent: ItemId, leaf: ItemId) -> Result<(), GraphicTreeError> {
        self.require_group(parent)?;
        let item = self
            .items
            .get(&leaf)
            .ok_or(GraphicTreeError::UnknownItem(leaf))?;
        let Item::Graphic2D(leaf_item) = item else {
            return Err(GraphicTreeError::KindMismatch {
                expected: ItemKind::Graphic2D,
                found: item.kind(),
            });
        };
        let name = leaf_item.name.clone();

        if leaf_item.parent == Some(parent) {
            return Ok(());
        }
        if self.contains_graphic2d(parent, &name) {
            return Err(GraphicTreeError::DuplicateName {
                kind: ItemKind::Graphic2D,
                name,
            });
        }

        self.detach_internal(leaf);

        let parent_node = {
            let group = self.group_mut(parent);
            group.graphics2d.push(leaf);
            group.node2d
        };
        let (leaf_node, leaf_visible) = {
            let Some(Item::Graphic2D(leaf_item)) = self.items.get_mut(&leaf) else {
                unreachable!("kind checked above");
            };
            leaf_item.parent = Some(parent);
            (leaf_item.node, leaf_item.visible)
        };
        self.render2d.attach(parent_node, leaf_node);
        if let Some(node) = self.render2d.get_mut(leaf_node) {
            node.visible = leaf_visible;
        }

        self.refresh_visibility_upward(Some(parent));
        Ok(())
    }

    /// Attaches a 3D leaf under `parent`. Same contract as
    /// [`add_graphic2d`](GraphicTree::add_graphic2d).
    pub fn add_graphic3d(&mut self, parent: ItemId, leaf: ItemId) -> Result<(), GraphicTreeError> {
        self.require_group(parent)?;
        let item = self
            .items
            .get(&leaf)
            .ok_or(GraphicTreeError::UnknownItem(leaf))?;
        let Item::Graphic3D(leaf_item) = item else {
            return Err(GraphicTreeError::KindMismatch {
                expected: ItemKind::Graphic3D,
                found: item.kind(),
            });
        };
        let name = leaf_item.name.clone();

        if leaf_item.parent == Some(parent) {
            return Ok(());
        }
        if self.contains_graphic3d(parent, &name) {
            return Err(GraphicTreeError::DuplicateName {
                kind: ItemKind::Graphic3D,
                name,
            });
        }

        self.detach_internal(leaf);

        let parent_node = {
            let group = self.group_mut(parent);
            group.graphics3d.push(leaf);
            group.node3d
        };
        let (leaf_node, leaf_visible) = {
            let Some(Item::Graphic3D(leaf_item)) = self.items.get_mut(&leaf) else {
                unreachable!("kind checked above");
            };
            leaf_item.parent = Some(parent);
            (leaf_item.node, leaf_item.visible)
        };
        self.render3d.attach(parent_node, leaf_node);
        if let Some(node) = self.render3d.get_mut(leaf_node) {
            node.visible = leaf_visible;
        }

        self.refresh_visibility_upward(Some(parent));
        Ok(())
    }

    /// Attaches any item under `parent`, dispatching on its kind.
    pub fn add_item(&mut self, parent: ItemId, item: ItemId) -> Result<(), GraphicTreeError> {
        match self
            .items
            .get(&item)
            .ok_or(GraphicTreeError::UnknownItem(item))?
            .kind()
        {
            ItemKind::Group => self.add_child(parent, item),
            ItemKind::Graphic2D => self.add_graphic2d(parent, item),
            ItemKind::Graphic3D => self.add_graphic3d(parent, item),
        }
    }

    /// Removes `child` from `parent`'s sub-groups. Returns `false` when it
    /// was not a child of `parent`.
    pub fn remove_child(&mut self, parent: ItemId, child: ItemId) -> Result<bool, GraphicTreeError> {
        self.require_group(parent)?;
        match self.items.get(&child) {
            Some(Item::Group(group)) if group.parent == Some(parent) => {
                self.detach_internal(child);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(GraphicTreeError::UnknownItem(child)),
        }
    }

    /// Removes a 2D leaf from `parent`. Returns `false` when it was not a
    /// child of `parent`.
    pub fn remove_graphic2d(
        &mut self,
        parent: ItemId,
        leaf: ItemId,
    ) -> Result<bool, GraphicTreeError> {
        self.require_group(parent)?;
        match self.items.get(&leaf) {
            Some(Item::Graphic2D(item)) if item.parent == Some(parent) => {
                self.detach_internal(leaf);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(GraphicTreeError::UnknownItem(leaf)),
        }
    }

    /// Removes a 3D leaf from `parent`. Returns `false` when it was not a
    /// child of `parent`.
    pub fn remove_graphic3d(
        &mut self,
        parent: ItemId,
        leaf: ItemId,
    ) -> Result<bool, GraphicTreeError> {
        self.require_group(parent)?;
        match self.items.get(&leaf) {
            Some(Item::Graphic3D(item)) if item.parent == Some(parent) => {
                self.detach_internal(leaf);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(GraphicTreeError::UnknownItem(leaf)),
        }
    }

    /// Removes any item from `parent`, dispatching on its kind.
    pub fn remove_item(&mut self, parent: ItemId, item: ItemId) -> Result<bool, GraphicTreeError> {
        match self
            .items
            .get(&item)
            .ok_or(GraphicTreeError::UnknownItem(item))?
            .kind()
        {
            ItemKind::Group => self.remove_child(parent, item),
            ItemKind::Graphic2D => self.remove_graphic2d(parent, item),
            ItemKind::Graphic3D => self.remove_graphic3d(parent, item),
        }
    }

    /// Detaches an item from its parent: removal from the collection, cleared
    /// back-reference, render node detached, former parent's visibility
    /// refreshed. No-op (and `Ok`) when already parentless.
    pub fn detach_from_parent(&mut self, id: ItemId) -> Result<(), GraphicTreeError> {
        if !self.items.contains_key(&id) {
            return Err(GraphicTreeError::UnknownItem(id));
        }
        self.detach_internal(id);
        Ok(())
    }

    fn detach_internal(&mut self, id: ItemId) {
        let Some(item) = self.items.get(&id) else {
            return;
        };
        let Some(parent_id) = item.parent() else {
            return;
        };
        let kind = item.kind();

        {
            let group = self.group_mut(parent_id);
            match kind {
                ItemKind::Group => group.children.retain(|&c| c != id),
                ItemKind::Graphic2D => group.graphics2d.retain(|&c| c != id),
                ItemKind::Graphic3D => group.graphics3d.retain(|&c| c != id),
            }
        }

        match self.items.get_mut(&id) {
            Some(Item::Group(group)) => {
                group.parent = None;
                let (node2d, node3d) = (group.node2d, group.node3d);
                self.render2d.detach(node2d);
                self.render3d.detach(node3d);
            }
            Some(Item::Graphic2D(leaf)) => {
                leaf.parent = None;
                let node = leaf.node;
                self.render2d.detach(node);
            }
            Some(Item::Graphic3D(leaf)) => {
                leaf.parent = None;
                let node = leaf.node;
                self.render3d.detach(node);
            }
            None => {}
        }

        self.refresh_visibility_upward(Some(parent_id));
    }

    /// Recursively detaches and releases every descendant of `group`,
    /// leaving it with empty collections. No released item retains a render
    /// node afterward.
    pub fn clear(&mut self, group: ItemId) -> Result<(), GraphicTreeError> {
        self.require_group(group)?;
        self.clear_recursive(group);
        self.refresh_visibility_upward(Some(group));
        Ok(())
    }

    fn clear_recursive(&mut self, group_id: ItemId) {
        let (children, graphics2d, graphics3d) = {
            let group = self.group_ref(group_id);
            (
                group.children.clone(),
                group.graphics2d.clone(),
                group.graphics3d.clone(),
            )
        };

        for &child in &children {
            self.clear_recursive(child);
        }

        for id in graphics2d {
            if let Some(Item::Graphic2D(leaf)) = self.items.remove(&id) {
                self.render2d.remove_subtree(leaf.node);
            }
        }
        for id in graphics3d {
            if let Some(Item::Graphic3D(leaf)) = self.items.remove(&id) {
                self.render3d.remove_subtree(leaf.node);
            }
        }
        for id in children {
            if let Some(Item::Group(group)) = self.items.remove(&id) {
                self.render2d.remove_subtree(group.node2d);
                self.render3d.remove_subtree(group.node3d);
            }
        }

        let group = self.group_mut(group_id);
        group.children.clear();
        group.graphics2d.clear();
        group.graphics3d.clear();
    }

    /// Produces a new, unattached item with deep-copied configuration: fresh
    /// detached render nodes, no parent, no shared mutable state. Cloning a
    /// group copies its name only, not its children.
    pub fn clone_item(&mut self, id: ItemId) -> Result<ItemId, GraphicTreeError> {
        enum Config {
            Group(String),
            Leaf2D(String, RgbaColor, bool, Shape2D),
            Leaf3D(String, RgbaColor, bool, Shape3D),
        }

        let config = match self.items.get(&id) {
            Some(Item::Group(group)) => Config::Group(group.name.clone()),
            Some(Item::Graphic2D(leaf)) => {
                Config::Leaf2D(leaf.name.clone(), leaf.color, leaf.visible, leaf.shape.clone())
            }
            Some(Item::Graphic3D(leaf)) => {
                Config::Leaf3D(leaf.name.clone(), leaf.color, leaf.visible, leaf.shape.clone())
            }
            None => return Err(GraphicTreeError::UnknownItem(id)),
        };

        Ok(match config {
            Config::Group(name) => self.create_group(name),
            Config::Leaf2D(name, color, visible, shape) => {
                let clone = self.create_graphic2d(name, shape);
                self.set_leaf_state(clone, color, visible);
                clone
            }
            Config::Leaf3D(name, color, visible, shape) => {
                let clone = self.create_graphic3d(name, shape);
                self.set_leaf_state(clone, color, visible);
                clone
            }
        })
    }

    fn set_leaf_state(&mut self, id: ItemId, color: RgbaColor, visible: bool) {
        match self.items.get_mut(&id) {
            Some(Item::Graphic2D(leaf)) => {
                leaf.color = color;
                leaf.visible = visible;
            }
            Some(Item::Graphic3D(leaf)) => {
                leaf.color = color;
                leaf.visible = visible;
            }
            _ => {}
        }
    }

    // ========== Visibility ==========

    pub fn is_visible(&self, id: ItemId) -> Option<bool> {
        self.items.get(&id).map(Item::is_visible)
    }

    /// Sets an item's visibility.
    ///
    /// On a leaf the flag is authoritative; every ancestor group's derived
    /// flag is refreshed before this returns. On a group the flag propagates
    /// down to every descendant leaf, after which the derived flags below and
    /// above the group are recomputed.
    pub fn set_visible(&mut self, id: ItemId, visible: bool) -> Result<(), GraphicTreeError> {
        let kind = self
            .items
            .get(&id)
            .ok_or(GraphicTreeError::UnknownItem(id))?
            .kind();
        match kind {
            ItemKind::Graphic2D => {
                let node = {
                    let Some(Item::Graphic2D(leaf)) = self.items.get_mut(&id) else {
                        unreachable!("kind checked above");
                    };
                    leaf.visible = visible;
                    leaf.node
                };
                if let Some(render_node) = self.render2d.get_mut(node) {
                    render_node.visible = visible;
                }
                let parent = self.parent_of(id);
                self.refresh_visibility_upward(parent);
            }
            ItemKind::Graphic3D => {
                let node = {
                    let Some(Item::Graphic3D(leaf)) = self.items.get_mut(&id) else {
                        unreachable!("kind checked above");
                    };
                    leaf.visible = visible;
                    leaf.node
                };
                if let Some(render_node) = self.render3d.get_mut(node) {
                    render_node.visible = visible;
                }
                let parent = self.parent_of(id);
                self.refresh_visibility_upward(parent);
            }
            ItemKind::Group => {
                for item in self.collect_subtree_items(id) {
                    let is_group = matches!(self.items.get(&item), Some(Item::Group(_)));
                    if !is_group {
                        self.set_visible(item, visible)?;
                    }
                }
                self.update_visible_property(id)?;
                let parent = self.parent_of(id);
                self.refresh_visibility_upward(parent);
            }
        }
        Ok(())
    }

    /// Full post-order recompute of a group's derived visibility: child
    /// groups first, then `visible = any 2D leaf ∨ any 3D leaf ∨ any child
    /// group`. Idempotent and order-independent across siblings.
    pub fn update_visible_property(&mut self, group: ItemId) -> Result<(), GraphicTreeError> {
        self.require_group(group)?;
        let children = self.group_ref(group).children.clone();
        for child in children {
            self.update_visible_property(child)?;
        }
        let visible = self.derived_visibility(group);
        self.apply_group_visibility(group, visible);
        Ok(())
    }

    fn derived_visibility(&self, group_id: ItemId) -> bool {
        let group = self.group_ref(group_id);
        group
            .graphics2d
            .iter()
            .chain(&group.graphics3d)
            .chain(&group.children)
            .any(|id| self.items.get(id).is_some_and(Item::is_visible))
    }

    /// Recomputes each group from the mutation point upward. Sibling
    /// subtrees off the path are untouched; their flags are already correct.
    fn refresh_visibility_upward(&mut self, from: Option<ItemId>) {
        let mut cursor = from;
        while let Some(group_id) = cursor {
            let visible = self.derived_visibility(group_id);
            self.apply_group_visibility(group_id, visible);
            cursor = self.group_ref(group_id).parent;
        }
    }

    fn apply_group_visibility(&mut self, group_id: ItemId, visible: bool) {
        let group = self.group_mut(group_id);
        group.visible = visible;
        let (node2d, node3d) = (group.node2d, group.node3d);
        if let Some(node) = self.render2d.get_mut(node2d) {
            node.visible = visible;
        }
        if let Some(node) = self.render3d.get_mut(node3d) {
            node.visible = visible;
        }
    }

    // ========== Lookup ==========

    pub fn get_child(&self, group: ItemId, name: &str) -> Option<ItemId> {
        self.find_in(self.group(group)?.children(), name)
    }

    pub fn get_graphic2d(&self, group: ItemId, name: &str) -> Option<ItemId> {
        self.find_in(self.group(group)?.graphics2d(), name)
    }

    pub fn get_graphic3d(&self, group: ItemId, name: &str) -> Option<ItemId> {
        self.find_in(self.group(group)?.graphics3d(), name)
    }

    /// Finds a direct child of any kind: sub-groups first, then 2D leaves,
    /// then 3D leaves.
    pub fn get_item(&self, group: ItemId, name: &str) -> Option<ItemId> {
        self.get_child(group, name)
            .or_else(|| self.get_graphic2d(group, name))
            .or_else(|| self.get_graphic3d(group, name))
    }

    pub fn contains_child(&self, group: ItemId, name: &str) -> bool {
        self.get_child(group, name).is_some()
    }

    pub fn contains_graphic2d(&self, group: ItemId, name: &str) -> bool {
        self.get_graphic2d(group, name).is_some()
    }

    pub fn contains_graphic3d(&self, group: ItemId, name: &str) -> bool {
        self.get_graphic3d(group, name).is_some()
    }

    fn find_in(&self, ids: &[ItemId], name: &str) -> Option<ItemId> {
        ids.iter()
            .copied()
            .find(|id| self.items.get(id).is_some_and(|item| item.name() == name))
    }

    /// Colon-joined ancestor-name path from the tree root, root included.
    pub fn fullname(&self, id: ItemId) -> Option<String> {
        let mut segments = vec![self.items.get(&id)?.name().to_string()];
        let mut cursor = self.parent_of(id);
        while let Some(parent) = cursor {
            segments.push(self.items.get(&parent)?.name().to_string());
            cursor = self.parent_of(parent);
        }
        segments.reverse();
        Some(segments.join(&SEPARATOR.to_string()))
    }

    /// Walks successive name segments of `path` ("a:b:c") through sub-groups
    /// starting from `from`. The empty path resolves to `from` itself.
    pub fn find_group(&self, from: ItemId, path: &str) -> Option<ItemId> {
        let mut cursor = from;
        self.group(cursor)?;
        for segment in path.split(SEPARATOR).filter(|s| !s.is_empty()) {
            cursor = self.get_child(cursor, segment)?;
        }
        Some(cursor)
    }

    /// Like [`find_group`](GraphicTree::find_group), but the final segment
    /// may name an item of any kind.
    pub fn find_item(&self, from: ItemId, path: &str) -> Option<ItemId> {
        let segments: Vec<&str> = path.split(SEPARATOR).filter(|s| !s.is_empty()).collect();
        let Some((last, namespace)) = segments.split_last() else {
            return Some(from);
        };
        let mut cursor = from;
        for segment in namespace {
            cursor = self.get_child(cursor, segment)?;
        }
        self.get_item(cursor, last)
    }

    /// Collects `from` and every group beneath it, depth-first.
    pub fn collect_subtree_groups(&self, from: ItemId) -> Vec<ItemId> {
        let mut groups = Vec::new();
        self.collect_groups_recursive(from, &mut groups);
        groups
    }

    fn collect_groups_recursive(&self, id: ItemId, out: &mut Vec<ItemId>) {
        let Some(Item::Group(group)) = self.items.get(&id) else {
            return;
        };
        out.push(id);
        for &child in &group.children {
            self.collect_groups_recursive(child, out);
        }
    }

    /// Collects `from` and every item beneath it, depth-first, leaves before
    /// sub-groups within each group.
    pub fn collect_subtree_items(&self, from: ItemId) -> Vec<ItemId> {
        let mut items = Vec::new();
        self.collect_items_recursive(from, &mut items);
        items
    }

    fn collect_items_recursive(&self, id: ItemId, out: &mut Vec<ItemId>) {
        let Some(item) = self.items.get(&id) else {
            return;
        };
        out.push(id);
        if let Item::Group(group) = item {
            out.extend_from_slice(&group.graphics2d);
            out.extend_from_slice(&group.graphics3d);
            for &child in &group.children {
                self.collect_items_recursive(child, out);
            }
        }
    }

    // ========== Render / Background ==========

    /// The root container node of the 2D overlay tree.
    pub fn node2d_root(&self) -> RenderNodeId {
        self.render2d.root()
    }

    /// The root container node of the 3D world tree.
    pub fn node3d_root(&self) -> RenderNodeId {
        self.render3d.root()
    }

    pub fn render2d(&self) -> &RenderTree {
        &self.render2d
    }

    pub fn render3d(&self) -> &RenderTree {
        &self.render3d
    }

    /// One frame's render pass over the whole tree.
    ///
    /// Updates every leaf's render node from its current parameters, posts
    /// input snapshots for the deferred kinds, and applies any pending mesh
    /// updates. Reads already-available state only; never blocks on the
    /// background step.
    pub fn render(&mut self) {
        self.render_group(self.root);
    }

    fn render_group(&mut self, group_id: ItemId) {
        let (children, graphics2d, graphics3d) = {
            let Some(Item::Group(group)) = self.items.get(&group_id) else {
                return;
            };
            (
                group.children.clone(),
                group.graphics2d.clone(),
                group.graphics3d.clone(),
            )
        };

        for id in graphics2d {
            self.render_graphic2d(id);
        }
        for id in graphics3d {
            self.render_graphic3d(id);
        }
        for id in children {
            self.render_group(id);
        }
    }

    fn render_graphic2d(&mut self, id: ItemId) {
        let Some(Item::Graphic2D(leaf)) = self.items.get(&id) else {
            return;
        };
        let Some(node) = self.render2d.get_mut(leaf.node) else {
            return;
        };
        node.visible = leaf.visible;
        node.color = leaf.color;
        match leaf.shape.frame_state() {
            Some((transform, geometry)) => {
                node.transform = transform;
                node.geometry = Some(geometry);
            }
            None => node.transform = collapsed_transform(),
        }
    }

    fn render_graphic3d(&mut self, id: ItemId) {
        let Some(Item::Graphic3D(leaf)) = self.items.get(&id) else {
            return;
        };
        let Some(node) = self.render3d.get_mut(leaf.node) else {
            return;
        };
        node.visible = leaf.visible;
        node.color = leaf.color;

        // Placement is refreshed every frame; it is cheap and orthogonal to
        // the mesh recompute.
        match leaf.shape.placement() {
            Some(transform) => node.transform = transform,
            None => {
                node.transform = collapsed_transform();
                return;
            }
        }

        leaf.shape.post_snapshot();
        if let Some(update) = leaf.shape.take_update() {
            match update {
                MeshUpdate::Apply(mesh) => node.geometry = Some(Geometry::Mesh(mesh)),
                MeshUpdate::Clear => node.geometry = None,
            }
        }
    }

    /// Runs the compare-and-recompute step for every deferred item, inline.
    ///
    /// Sibling order is irrelevant. Use [`background_pass`] to run the same
    /// work from a worker thread instead.
    ///
    /// [`background_pass`]: GraphicTree::background_pass
    pub fn compute_background(&self) {
        for item in self.items.values() {
            if let Item::Graphic3D(leaf) = item {
                leaf.shape.process();
            }
        }
    }

    /// Collects every deferred item's recompute job into a pass a worker
    /// thread can run without the tree. Re-collect after structural edits.
    pub fn background_pass(&self) -> BackgroundPass {
        let jobs = self
            .items
            .values()
            .filter_map(|item| match item {
                Item::Graphic3D(leaf) => Some(leaf.shape.regen_job()),
                _ => None,
            })
            .collect();
        BackgroundPass::new(jobs)
    }

    // ========== Internal Helpers ==========

    fn require_group(&self, id: ItemId) -> Result<(), GraphicTreeError> {
        match self.items.get(&id) {
            Some(Item::Group(_)) => Ok(()),
            Some(_) => Err(GraphicTreeError::NotAGroup(id)),
            None => Err(GraphicTreeError::UnknownItem(id)),
        }
    }

    /// Walks `descendant`'s parent chain looking for `ancestor`.
    fn is_ancestor_of(&self, ancestor: ItemId, descendant: ItemId) -> bool {
        let mut cursor = self.parent_of(descendant);
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.parent_of(id);
        }
        false
    }

    /// Shared access to a group known to exist.
    fn group_ref(&self, id: ItemId) -> &Group {
        match self.items.get(&id) {
            Some(Item::Group(group)) => group,
            _ => unreachable!("callers validate group ids"),
        }
    }

    /// Mutable access to a group known to exist.
    fn group_mut(&mut self, id: ItemId) -> &mut Group {
        match self.items.get_mut(&id) {
            Some(Item::Group(group)) => group,
            _ => unreachable!("callers validate group ids"),
        }
    }
}

impl Default for GraphicTree {
    fn default() -> Self {
        Self::new()
    }
}

fn collapsed_transform() -> Matrix4<f32> {
    Matrix4::from_scale(0.0)
}
