use std::ops::Index;

use slotmap::SlotMap;

use crate::layout_engine::Orientation;
use crate::sys::display::WindowId;
use crate::sys::geometry::Rect;

slotmap::new_key_type! {
    /// Represents a node somewhere in the tree.
    ///
    /// Ids are generational, so an id held after its node was removed simply
    /// stops resolving instead of pointing at a reused slot.
    pub struct NodeId;
}

/// N-ary tree of containers and windows, stored in an arena.
///
/// Containers own an ordered list of child ids and every node stores the id
/// of its parent. Several independent roots can live in one arena.
#[derive(Default)]
pub struct Tree {
    map: SlotMap<NodeId, Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    parent: Option<NodeId>,
    pub dimensions: Rect,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Container(Container),
    Window(WindowId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub tiling_mode: Orientation,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> { self.parent }

    pub fn window(&self) -> Option<WindowId> {
        match self.kind {
            NodeKind::Window(wid) => Some(wid),
            NodeKind::Container(_) => None,
        }
    }

    pub fn container(&self) -> Option<&Container> {
        match &self.kind {
            NodeKind::Container(c) => Some(c),
            NodeKind::Window(_) => None,
        }
    }
}

impl Index<NodeId> for Tree {
    type Output = Node;

    #[track_caller]
    fn index(&self, index: NodeId) -> &Self::Output { &self.map[index] }
}

impl Tree {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.map.len() }

    pub fn is_empty(&self) -> bool { self.map.is_empty() }

    pub fn contains(&self, id: NodeId) -> bool { self.map.contains_key(id) }

    /// Creates a detached, empty container.
    pub fn mk_container(&mut self, tiling_mode: Orientation, dimensions: Rect) -> NodeId {
        self.map.insert(Node {
            parent: None,
            dimensions,
            kind: NodeKind::Container(Container { tiling_mode, children: Vec::new() }),
        })
    }

    /// Creates a detached window leaf. Its dimensions are a 1x1 placeholder
    /// until the first layout pass.
    pub fn mk_window(&mut self, wid: WindowId) -> NodeId {
        self.map.insert(Node {
            parent: None,
            dimensions: Rect::new(0, 0, 1, 1),
            kind: NodeKind::Window(wid),
        })
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> { self.map.get(id).and_then(|n| n.parent) }

    /// Children of a container in visual order. Windows and unknown ids have
    /// none.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.map.get(id).map(|n| &n.kind) {
            Some(NodeKind::Container(c)) => &c.children,
            _ => &[],
        }
    }

    pub fn child_count(&self, id: NodeId) -> usize { self.children(id).len() }

    pub fn window(&self, id: NodeId) -> Option<WindowId> { self.map.get(id).and_then(Node::window) }

    pub fn is_container(&self, id: NodeId) -> bool {
        matches!(self.map.get(id).map(|n| &n.kind), Some(NodeKind::Container(_)))
    }

    pub fn tiling_mode(&self, id: NodeId) -> Option<Orientation> {
        self.map.get(id).and_then(Node::container).map(|c| c.tiling_mode)
    }

    pub fn set_tiling_mode(&mut self, id: NodeId, mode: Orientation) {
        if let Some(NodeKind::Container(c)) = self.map.get_mut(id).map(|n| &mut n.kind) {
            c.tiling_mode = mode;
        }
    }

    pub fn dimensions(&self, id: NodeId) -> Option<Rect> { self.map.get(id).map(|n| n.dimensions) }

    pub fn set_dimensions(&mut self, id: NodeId, rect: Rect) {
        if let Some(node) = self.map.get_mut(id) {
            node.dimensions = rect;
        }
    }

    /// Position of `id` among its parent's children.
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    fn children_mut(&mut self, id: NodeId) -> Option<&mut Vec<NodeId>> {
        match self.map.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Container(c)) => Some(&mut c.children),
            _ => None,
        }
    }

    /// Inserts a detached node into `parent` at `index` (clamped to the end).
    #[track_caller]
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        debug_assert!(self.parent(child).is_none(), "insert_child called on attached node");
        if parent == child || !self.contains(child) {
            return;
        }
        let Some(children) = self.children_mut(parent) else {
            debug_assert!(false, "insert_child called with a non-container parent");
            return;
        };
        let index = index.min(children.len());
        children.insert(index, child);
        self.map[child].parent = Some(parent);
    }

    #[track_caller]
    pub fn push_back(&mut self, parent: NodeId, child: NodeId) {
        self.insert_child(parent, usize::MAX, child);
    }

    /// Unlinks a node from its parent without touching the rest of the tree.
    /// Returns the former parent and position.
    pub fn detach(&mut self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        if let Some(children) = self.children_mut(parent) {
            children.remove(index);
        }
        self.map[id].parent = None;
        Some((parent, index))
    }

    /// Deletes a detached node and everything below it, returning the
    /// windows that were dropped.
    #[track_caller]
    pub fn remove_subtree(&mut self, id: NodeId) -> Vec<WindowId> {
        debug_assert!(self.parent(id).is_none(), "remove_subtree called on attached node");
        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(node) = self.map.remove(next) else { continue };
            match node.kind {
                NodeKind::Window(wid) => removed.push(wid),
                NodeKind::Container(c) => stack.extend(c.children),
            }
        }
        removed
    }

    pub fn traverse_preorder(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        PreorderTraversal {
            tree: self,
            stack: if self.contains(id) { vec![id] } else { vec![] },
        }
    }

    /// All window leaves below `id` in visual order.
    pub fn leaves(&self, id: NodeId) -> impl Iterator<Item = (NodeId, WindowId)> + '_ {
        self.traverse_preorder(id).filter_map(|n| self.window(n).map(|wid| (n, wid)))
    }

    /// Checks the structural invariants of the tree rooted at `root` and
    /// describes every violation found.
    pub fn validate(&self, root: NodeId) -> Vec<String> {
        let mut issues = Vec::new();
        if !self.contains(root) {
            issues.push(format!("root {root:?} is not in the tree"));
            return issues;
        }
        if let Some(parent) = self.parent(root) {
            issues.push(format!("root {root:?} has parent {parent:?}"));
        }
        for node in self.traverse_preorder(root) {
            let children = self.children(node);
            for &child in children {
                if self.parent(child) != Some(node) {
                    issues.push(format!(
                        "{child:?} is a child of {node:?} but points at {:?}",
                        self.parent(child)
                    ));
                }
                let occurrences = children.iter().filter(|&&c| c == child).count();
                if occurrences != 1 {
                    issues.push(format!("{child:?} appears {occurrences} times in {node:?}"));
                }
            }
            if node != root && self.is_container(node) && children.len() < 2 {
                issues.push(format!(
                    "non-root container {node:?} has {} children",
                    children.len()
                ));
            }
        }
        issues
    }
}

struct PreorderTraversal<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for PreorderTraversal<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(self.tree.children(node).iter().rev().copied());
        Some(node)
    }
}
