//! Display-rect tree
//!
//! Mirrors the part of the view tree that asked to be told how much of it is
//! actually on screen. Every monitoring view gets a node, and so does each of
//! its ancestors, so that a clip change high up can be pushed down to the
//! monitors below it.
//!
//! # Clip formula
//!
//! ```text
//! clip(v) = (v visible ? Rect(0, 0, v.size) : EMPTY)
//!         ∩ translate(parent node clip, or display bounds, by -v.position)
//! ```
//!
//! Clips are in view-local coordinates. A node is removed as soon as its view
//! stops monitoring and no monitoring descendant depends on it.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use trellis_core::{Rect, ViewId, ViewTree};

use crate::hooks::DisplayRectChange;

#[derive(Clone, Debug)]
struct Node {
    clip: Rect,
    parent: Option<ViewId>,
    children: SmallVec<[ViewId; 4]>,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            clip: Rect::EMPTY,
            parent: None,
            children: SmallVec::new(),
        }
    }
}

/// Clip rects of monitored views and their ancestors
#[derive(Debug, Default)]
pub struct DisplayRectTree {
    nodes: FxHashMap<ViewId, Node>,
}

impl DisplayRectTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, view: ViewId) -> bool {
        self.nodes.contains_key(&view)
    }

    pub fn clip_rect(&self, view: ViewId) -> Option<Rect> {
        self.nodes.get(&view).map(|node| node.clip)
    }

    /// Node of the nearest ancestor linked above `view`
    pub fn parent(&self, view: ViewId) -> Option<ViewId> {
        self.nodes.get(&view).and_then(|node| node.parent)
    }

    pub fn children(&self, view: ViewId) -> &[ViewId] {
        match self.nodes.get(&view) {
            Some(node) => &node.children,
            None => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Make sure `view` and its ancestors have nodes
    ///
    /// Idempotent. A node whose view moved to another parent is relinked.
    pub fn register(&mut self, tree: &ViewTree, view: ViewId) {
        let parent = tree.parent(view);
        match self.nodes.get(&view) {
            Some(node) if node.parent == parent => return,
            Some(_) => self.unlink(tree, view),
            None => {
                self.nodes.insert(view, Node::default());
            }
        }

        if let Some(parent) = parent {
            self.register(tree, parent);
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.children.push(view);
            }
            if let Some(node) = self.nodes.get_mut(&view) {
                node.parent = Some(parent);
            }
        }

        let clip = self.compute_clip(tree, view);
        if let Some(node) = self.nodes.get_mut(&view) {
            node.clip = clip;
        }
    }

    /// Remove the node of `view`
    ///
    /// Without `force` the node survives while monitoring descendants hang
    /// from it. Ancestors left without purpose are removed too.
    pub fn unregister(&mut self, tree: &ViewTree, view: ViewId, force: bool) {
        let Some(node) = self.nodes.get(&view) else {
            return;
        };
        if !force && !node.children.is_empty() {
            return;
        }

        let Some(node) = self.nodes.remove(&view) else {
            return;
        };
        for child in &node.children {
            if let Some(child) = self.nodes.get_mut(child) {
                child.parent = None;
            }
        }
        if let Some(parent) = node.parent {
            self.detach_child(parent, view);
            self.prune(tree, parent);
        }
    }

    /// Recompute the clip of `view`, descending while clips keep changing
    ///
    /// Changes of monitoring views are appended to `changes`.
    pub fn check(&mut self, tree: &ViewTree, view: ViewId, changes: &mut Vec<DisplayRectChange>) {
        let Some(old) = self.clip_rect(view) else {
            return;
        };
        let new = self.compute_clip(tree, view);
        if old == new {
            return;
        }

        let children = match self.nodes.get_mut(&view) {
            Some(node) => {
                node.clip = new;
                node.children.clone()
            }
            None => return,
        };

        if tree.get(view).is_some_and(|v| v.monitors_display_rect()) {
            changes.push(DisplayRectChange { view, old, new });
        }

        for child in children {
            self.check(tree, child, changes);
        }
    }

    fn compute_clip(&self, tree: &ViewTree, view: ViewId) -> Rect {
        let Some(node) = tree.get(view) else {
            return Rect::EMPTY;
        };

        let view_rect = if node.visible() {
            node.size().to_rect()
        } else {
            Rect::EMPTY
        };

        let outer = self
            .parent(view)
            .and_then(|parent| self.clip_rect(parent))
            .unwrap_or_else(|| tree.display_bounds());

        let position = node.position();
        view_rect.intersect(&outer.offset(-position.x, -position.y))
    }

    fn unlink(&mut self, tree: &ViewTree, view: ViewId) {
        let parent = self.nodes.get_mut(&view).and_then(|node| node.parent.take());
        if let Some(parent) = parent {
            self.detach_child(parent, view);
            self.prune(tree, parent);
        }
    }

    fn detach_child(&mut self, parent: ViewId, child: ViewId) {
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.retain(|c| *c != child);
        }
    }

    /// Drop nodes that neither monitor nor link a monitoring descendant
    fn prune(&mut self, tree: &ViewTree, view: ViewId) {
        let removable = self.nodes.get(&view).is_some_and(|node| node.children.is_empty())
            && !tree.get(view).is_some_and(|v| v.monitors_display_rect());
        if removable {
            self.unregister(tree, view, true);
        }
    }
}
