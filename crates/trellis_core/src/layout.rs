//! Layout contract
//!
//! A [`Layout`] positions the children of one container. It is stored on the
//! container view (or on the display root) and is only ever invoked by the
//! render manager, which decides when a container needs laying out. The
//! `requires_*` hooks let a layout tell the scheduler which changes it
//! actually depends on.
//!
//! ```ignore
//! struct Stack;
//!
//! impl Layout for Stack {
//!     fn layout(&mut self, container: &mut LayoutContainer<'_>) {
//!         let width = container.size().width;
//!         let mut y = 0.0;
//!         for child in container.children().to_vec() {
//!             let height = container.bounds(child).map_or(0.0, |b| b.height());
//!             container.set_bounds(child, Rect::new(0.0, y, width, height));
//!             y += height;
//!         }
//!     }
//! }
//! ```

use crate::geometry::{Insets, Point, Rect, Size};
use crate::tree::ViewTree;
use crate::view::{SizePreferences, ViewId};

/// Positions the children of a container
pub trait Layout {
    /// Lay out the children of `container`
    fn layout(&mut self, container: &mut LayoutContainer<'_>);

    /// Whether resizing the container from `old` to `new` needs a new pass
    fn requires_layout(&self, _old: Size, _new: Size) -> bool {
        true
    }

    /// Whether a child's bounds change needs a new pass of its container
    fn child_bounds_require_layout(&self, _child: ViewId, old: Rect, new: Rect) -> bool {
        old.size != new.size
    }

    /// Whether a child's size preference change needs a new pass
    fn child_size_preferences_require_layout(
        &self,
        _child: ViewId,
        _old: &SizePreferences,
        _new: &SizePreferences,
    ) -> bool {
        true
    }
}

/// Restricted view of a container handed to [`Layout::layout`]
///
/// Only direct children of the container can be repositioned. The container
/// itself may be resized with [`set_container_size`](Self::set_container_size),
/// which makes the scheduler re-run the pass once it returns. Every change is
/// recorded on the tree like any other mutation.
pub struct LayoutContainer<'a> {
    tree: &'a mut ViewTree,
    container: Option<ViewId>,
}

impl<'a> LayoutContainer<'a> {
    pub(crate) fn new(tree: &'a mut ViewTree, container: Option<ViewId>) -> Self {
        Self { tree, container }
    }

    /// The container being laid out, `None` for the display root
    pub fn id(&self) -> Option<ViewId> {
        self.container
    }

    pub fn size(&self) -> Size {
        match self.container {
            Some(id) => self.tree.get(id).map_or(Size::ZERO, |v| v.size()),
            None => self.tree.display_size(),
        }
    }

    pub fn width(&self) -> f64 {
        self.size().width
    }

    pub fn height(&self) -> f64 {
        self.size().height
    }

    pub fn insets(&self) -> Insets {
        match self.container {
            Some(id) => self.tree.get(id).map_or(Insets::NONE, |v| v.insets()),
            None => self.tree.display_insets(),
        }
    }

    pub fn children(&self) -> &[ViewId] {
        match self.container {
            Some(id) => self.tree.children(id),
            None => self.tree.display_children(),
        }
    }

    /// True when `child` is a direct child of this container
    pub fn contains(&self, child: ViewId) -> bool {
        match self.tree.get(child) {
            Some(node) => match self.container {
                Some(id) => node.parent() == Some(id),
                None => node.is_top_level(),
            },
            None => false,
        }
    }

    pub fn bounds(&self, child: ViewId) -> Option<Rect> {
        self.contains(child)
            .then(|| self.tree.get(child).map(|v| v.bounds()))
            .flatten()
    }

    pub fn size_preferences(&self, child: ViewId) -> Option<SizePreferences> {
        self.contains(child)
            .then(|| self.tree.get(child).map(|v| v.size_preferences()))
            .flatten()
    }

    pub fn is_visible(&self, child: ViewId) -> bool {
        self.contains(child) && self.tree.get(child).is_some_and(|v| v.visible())
    }

    /// Move and resize a child; ignored for views outside this container
    pub fn set_bounds(&mut self, child: ViewId, bounds: Rect) {
        if !self.contains(child) {
            tracing::trace!(?child, "layout tried to position a non-child");
            return;
        }
        self.tree.set_bounds(child, bounds);
    }

    pub fn set_position(&mut self, child: ViewId, position: Point) {
        if let Some(bounds) = self.bounds(child) {
            self.set_bounds(child, bounds.with_origin(position));
        }
    }

    pub fn set_size(&mut self, child: ViewId, size: Size) {
        if let Some(bounds) = self.bounds(child) {
            self.set_bounds(child, bounds.with_size(size));
        }
    }

    /// Resize the container being laid out, keeping its origin
    ///
    /// Fit-to-content layouts use this to grow or shrink around their
    /// children. The display root cannot be resized from a layout.
    pub fn set_container_size(&mut self, size: Size) {
        match self.container {
            Some(id) => self.tree.set_size(id, size),
            None => tracing::trace!("layout tried to resize the display root"),
        }
    }

    /// Read-only access to the whole tree
    pub fn tree(&self) -> &ViewTree {
        self.tree
    }
}
