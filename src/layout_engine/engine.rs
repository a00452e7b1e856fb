//! The tiling tree engine: geometry, insertion, removal with merge-up,
//! directional moves and geometric focus lookup.

use tracing::{debug, trace};

use super::{Direction, Orientation};
use crate::common::collections::HashMap;
use crate::model::tree::{NodeId, NodeKind, Tree};
use crate::sys::display::{Display, Pixel, WindowId};
use crate::sys::geometry::Rect;

/// Per-screen drawing parameters, already converted to pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Style {
    pub margin: i32,
    pub border_width: i32,
    pub focus_color: Pixel,
    pub normal_color: Pixel,
}

/// Everything a redraw needs to push geometry and colors out.
pub struct Painter<'a> {
    pub display: &'a mut dyn Display,
    pub style: &'a Style,
    pub focused: Option<WindowId>,
}

impl Painter<'_> {
    fn paint_window(&mut self, wid: WindowId, rect: Rect) {
        let border = self.style.border_width;
        self.display.configure(wid, rect.shrink_size(border), border.max(0) as u32);
        let color = if self.focused == Some(wid) {
            self.style.focus_color
        } else {
            self.style.normal_color
        };
        self.display.set_border_color(wid, color);
    }
}

/// One tiling tree, owned by a screen. The root container is created with
/// the tree and is never removed.
pub struct LayoutTree {
    tree: Tree,
    root: NodeId,
    windows: HashMap<WindowId, NodeId>,
}

impl LayoutTree {
    pub fn new(rect: Rect) -> Self {
        let mut tree = Tree::new();
        let root = tree.mk_container(Orientation::Horizontal, rect);
        LayoutTree {
            tree,
            root,
            windows: HashMap::default(),
        }
    }

    pub fn root(&self) -> NodeId { self.root }

    pub fn tree(&self) -> &Tree { &self.tree }

    pub fn is_empty(&self) -> bool { self.windows.is_empty() }

    pub fn len(&self) -> usize { self.windows.len() }

    pub fn contains_window(&self, wid: WindowId) -> bool { self.windows.contains_key(&wid) }

    pub fn node_for(&self, wid: WindowId) -> Option<NodeId> { self.windows.get(&wid).copied() }

    /// Current slot of a window, as computed by the last layout pass.
    pub fn geometry(&self, wid: WindowId) -> Option<Rect> {
        self.node_for(wid).and_then(|node| self.tree.dimensions(node))
    }

    /// All windows in visual (preorder) order.
    pub fn windows(&self) -> Vec<WindowId> { self.tree.leaves(self.root).map(|(_, w)| w).collect() }

    pub fn last_window(&self) -> Option<WindowId> { self.tree.leaves(self.root).map(|(_, w)| w).last() }

    /// Recomputes the geometry of `node`'s subtree and pushes it out.
    ///
    /// Children split the container's extent along its tiling axis, separated
    /// by the margin. Integer division leftovers stay unassigned at the end.
    pub fn redraw(&mut self, node: NodeId, painter: &mut Painter) {
        let Some(rect) = self.tree.dimensions(node) else { return };
        let (mode, children) = match &self.tree[node].kind {
            NodeKind::Window(wid) => {
                painter.paint_window(*wid, rect);
                return;
            }
            NodeKind::Container(c) => (c.tiling_mode, c.children.clone()),
        };
        let n = children.len() as i32;
        if n == 0 {
            return;
        }
        let margin = painter.style.margin;
        let split = ((rect.extent(mode) - (n - 1) * margin) / n).max(0);
        for (i, child) in children.into_iter().enumerate() {
            let offset = i as i32 * (split + margin);
            let child_rect = match mode {
                Orientation::Horizontal => Rect::new(rect.x + offset, rect.y, split, rect.height),
                Orientation::Vertical => Rect::new(rect.x, rect.y + offset, rect.width, split),
            };
            self.tree.set_dimensions(child, child_rect);
            self.redraw(child, painter);
        }
    }

    pub fn redraw_all(&mut self, painter: &mut Painter) { self.redraw(self.root, painter) }

    /// Redraws a single window leaf, typically to recolor its border.
    pub fn redraw_window(&mut self, wid: WindowId, painter: &mut Painter) {
        if let Some(node) = self.node_for(wid) {
            self.redraw(node, painter);
        }
    }

    /// Appends a window at the end of the root container.
    pub fn add_window(&mut self, wid: WindowId, painter: &mut Painter) -> NodeId {
        self.add_window_under(self.root, wid, painter)
    }

    pub fn add_window_under(
        &mut self,
        parent: NodeId,
        wid: WindowId,
        painter: &mut Painter,
    ) -> NodeId {
        if let Some(existing) = self.node_for(wid) {
            debug!(?wid, "Window is already in the tree");
            return existing;
        }
        let parent = if self.tree.is_container(parent) { parent } else { self.root };
        let node = self.tree.mk_window(wid);
        self.tree.push_back(parent, node);
        self.windows.insert(wid, node);
        self.redraw(parent, painter);
        painter.display.map(wid);
        self.redraw(node, painter);
        node
    }

    /// Removes a node and its subtree, normalizes the containers above it
    /// and redraws what changed. Returns the windows that were dropped.
    pub fn remove_node(&mut self, node: NodeId, painter: &mut Painter) -> Vec<WindowId> {
        if node == self.root {
            debug!("Refusing to remove the root container");
            return Vec::new();
        }
        let Some((parent, _)) = self.tree.detach(node) else {
            return Vec::new();
        };
        let removed = self.tree.remove_subtree(node);
        for wid in &removed {
            self.windows.remove(wid);
        }
        let dirty = self.collapse(parent);
        self.redraw(dirty, painter);
        removed
    }

    pub fn remove_window(&mut self, wid: WindowId, painter: &mut Painter) -> bool {
        match self.node_for(wid) {
            Some(node) => !self.remove_node(node, painter).is_empty(),
            None => false,
        }
    }

    /// Deletes empty containers and merges single-child containers into
    /// their parent, walking upward from `node`. Returns the container that
    /// needs a redraw.
    fn collapse(&mut self, mut node: NodeId) -> NodeId {
        loop {
            let Some(parent) = self.tree.parent(node) else { return node };
            match self.tree.children(node) {
                [] => {
                    trace!(?node, "Removing empty container");
                    self.tree.detach(node);
                    self.tree.remove_subtree(node);
                    node = parent;
                }
                &[child] => {
                    trace!(?node, ?child, "Merging container into its parent");
                    let Some((grandparent, index)) = self.tree.detach(node) else {
                        return node;
                    };
                    self.tree.detach(child);
                    self.tree.remove_subtree(node);
                    self.tree.insert_child(grandparent, index, child);
                    return grandparent;
                }
                _ => return node,
            }
        }
    }

    pub fn move_window(&mut self, wid: WindowId, direction: Direction, painter: &mut Painter) {
        if let Some(node) = self.node_for(wid) {
            self.move_node(node, direction, painter);
        }
    }

    /// Moves a node one step in `direction`, escaping to ancestors when it
    /// is already at the edge of its container and entering an adjacent
    /// container when it passes one.
    pub fn move_node(&mut self, node: NodeId, direction: Direction, painter: &mut Painter) {
        if node == self.root || !self.tree.contains(node) {
            return;
        }
        let axis = direction.orientation();
        let forward = direction.is_forward();

        let mut previous = node;
        let Some(mut container) = self.tree.parent(node) else { return };
        loop {
            let len = self.tree.child_count(container);
            let idx = self.tree.index_in_parent(previous).unwrap_or(0);
            let at_edge = if forward { idx + 1 == len } else { idx == 0 };
            if self.tree.tiling_mode(container) == Some(axis) && len != 1 && !at_edge {
                break;
            }
            match self.tree.parent(container) {
                Some(parent) => {
                    previous = container;
                    container = parent;
                }
                None => break,
            }
        }

        if self.tree.children(container) == [node] {
            trace!(?node, "Sole window on the screen, nothing to move");
            return;
        }

        if self.tree.tiling_mode(container) != Some(axis) {
            let len = self.tree.child_count(container);
            if len <= 1 || (len == 2 && previous == node) {
                self.tree.set_tiling_mode(container, axis);
            } else {
                previous = self.push_down(container, axis);
            }
        }

        let mut index = self.tree.index_in_parent(previous).unwrap_or(0) as isize + direction.offset();
        let Some((old_parent, _)) = self.tree.detach(node) else { return };
        if previous != node && !forward {
            index += 1;
        }

        let len = self.tree.child_count(container) as isize;
        let clamped = index.clamp(0, len);
        let fixed = clamped != index;
        let index = clamped as usize;

        let neighbor = (if forward { index.checked_sub(1) } else { Some(index) })
            .and_then(|i| self.tree.children(container).get(i).copied())
            .filter(|&n| self.tree.is_container(n));

        match neighbor {
            Some(neighbor) if !fixed && previous == node => {
                trace!(?node, ?neighbor, "Entering adjacent container");
                let at = if forward { 0 } else { usize::MAX };
                self.tree.insert_child(neighbor, at, node);
            }
            _ => self.tree.insert_child(container, index, node),
        }

        let dirty = self.collapse(old_parent);
        let target = if self.tree.contains(container) { container } else { dirty };
        self.redraw(target, painter);
    }

    /// Moves every child of `container` into a new container that keeps the
    /// old mode, and switches `container` to `axis`. Returns the new child.
    fn push_down(&mut self, container: NodeId, axis: Orientation) -> NodeId {
        let mode = self.tree.tiling_mode(container).unwrap_or_default();
        let rect = self.tree.dimensions(container).unwrap_or_default();
        let inner = self.tree.mk_container(mode, rect);
        let children = self.tree.children(container).to_vec();
        for child in children {
            self.tree.detach(child);
            self.tree.push_back(inner, child);
        }
        self.tree.push_back(container, inner);
        self.tree.set_tiling_mode(container, axis);
        debug!(?container, ?inner, ?axis, "Pushed children down into a new container");
        inner
    }

    /// Finds the nearest window in `direction` from `wid`, looking only at
    /// screen geometry.
    ///
    /// A candidate must lie entirely beyond the current window's edge and
    /// share at least one pixel of span on the orthogonal axis. The one with
    /// the smallest orthogonal offset wins, then the closest along the
    /// axis; ties keep tree order.
    pub fn focus_candidate(&self, wid: WindowId, direction: Direction) -> Option<WindowId> {
        let current = self.geometry(wid)?;
        let axis = direction.orientation();
        let across = axis.perpendicular();
        self.tree
            .leaves(self.root)
            .filter(|&(_, other)| other != wid)
            .filter_map(|(node, other)| {
                let rect = self.tree.dimensions(node)?;
                let distance = if direction.is_forward() {
                    rect.start(axis) - current.end(axis)
                } else {
                    current.start(axis) - rect.end(axis)
                };
                if distance < 0 || !rect.overlaps_on(&current, across) {
                    return None;
                }
                let offset = (rect.start(across) - current.start(across)).abs();
                Some(((offset, distance), other))
            })
            .min_by_key(|&(key, _)| key)
            .map(|(_, other)| other)
    }

    /// Flips the tiling mode of the container holding `wid`, or of the root
    /// when no window is given.
    pub fn switch_tiling_mode(&mut self, wid: Option<WindowId>, painter: &mut Painter) {
        let container = wid
            .and_then(|wid| self.node_for(wid))
            .and_then(|node| self.tree.parent(node))
            .unwrap_or(self.root);
        let Some(mode) = self.tree.tiling_mode(container) else { return };
        self.tree.set_tiling_mode(container, mode.perpendicular());
        debug!(?container, from = ?mode, "Switched tiling mode");
        self.redraw(container, painter);
    }

    /// Destroys every window, one top-level child of the root at a time.
    pub fn close_all_windows(&mut self, painter: &mut Painter) -> Vec<WindowId> {
        let mut closed = Vec::new();
        while let Some(&first) = self.tree.children(self.root).first() {
            for (_, wid) in self.tree.leaves(first) {
                painter.display.destroy(wid);
            }
            closed.extend(self.remove_node(first, painter));
        }
        closed
    }

    /// Lists every violated structural invariant of this tree.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = self.tree.validate(self.root);
        let leaves: Vec<_> = self.tree.leaves(self.root).collect();
        for &(node, wid) in &leaves {
            if self.windows.get(&wid) != Some(&node) {
                issues.push(format!("{wid:?} at {node:?} is missing from the window index"));
            }
        }
        if leaves.len() != self.windows.len() {
            issues.push(format!(
                "window index has {} entries but the tree has {} windows",
                self.windows.len(),
                leaves.len()
            ));
        }
        issues
    }

    pub fn draw_tree(&self) -> String {
        let tree = self.get_ascii_tree(self.root);
        let mut out = String::new();
        if ascii_tree::write_tree(&mut out, &tree).is_err() {
            out.push_str("<unprintable tree>");
        }
        out
    }

    fn get_ascii_tree(&self, node: NodeId) -> ascii_tree::Tree {
        let rect = self.tree.dimensions(node).unwrap_or_default();
        let geometry = format!("({}, {}, {}x{})", rect.x, rect.y, rect.width, rect.height);
        match &self.tree[node].kind {
            NodeKind::Window(wid) => ascii_tree::Tree::Leaf(vec![format!("{wid:?} {geometry}")]),
            NodeKind::Container(c) => {
                let desc = format!("{node:?} {:?} {geometry}", c.tiling_mode);
                let children = c.children.iter().map(|&child| self.get_ascii_tree(child)).collect();
                ascii_tree::Tree::Node(desc, children)
            }
        }
    }
}
