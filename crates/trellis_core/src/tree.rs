//! View tree and display root
//!
//! The [`ViewTree`] owns every view in a slotmap arena together with the
//! display root, the flat list of top-level views everything rendered must
//! hang from.
//!
//! # Architecture
//!
//! ```text
//!   display root ──▶ [top-level views]
//!                          │ children (owned, ordered)
//!                          ▼
//!                       ViewNode ──parent id──▶ ViewNode
//!
//!   every effective mutation ──▶ events: VecDeque<ViewEvent> ──▶ render manager
//! ```
//!
//! The tree never schedules work itself. It records what changed and leaves
//! the decision to whoever drains [`ViewTree::pop_event`].

use std::collections::VecDeque;

use rustc_hash::FxHashSet;
use slotmap::SlotMap;

use crate::behavior::Behavior;
use crate::canvas::Canvas;
use crate::error::{Result, TreeError};
use crate::event::{ChildrenDiff, ViewEvent};
use crate::geometry::{AffineTransform, Camera, ContentDirection, Insets, Point, Rect, Size};
use crate::layout::{Layout, LayoutContainer};
use crate::view::{Children, SizePreferences, ViewId, ViewNode};

/// The unique top-level container
struct DisplayRoot {
    children: Children,
    size: Size,
    insets: Insets,
    layout: Option<Box<dyn Layout>>,
    content_direction: ContentDirection,
    mirror_when_right_left: bool,
}

impl Default for DisplayRoot {
    fn default() -> Self {
        Self {
            children: Children::new(),
            size: Size::ZERO,
            insets: Insets::NONE,
            layout: None,
            content_direction: ContentDirection::LeftRight,
            mirror_when_right_left: true,
        }
    }
}

/// Arena of views plus the display root they attach to
#[derive(Default)]
pub struct ViewTree {
    views: SlotMap<ViewId, ViewNode>,
    display: DisplayRoot,
    events: VecDeque<ViewEvent>,
    /// Roots of disposed subtrees waiting for [`ViewTree::sweep_disposed`]
    disposed: Vec<ViewId>,
}

impl std::fmt::Debug for ViewTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewTree")
            .field("views", &self.views.len())
            .field("display_children", &self.display.children)
            .field("display_size", &self.display.size)
            .field("pending_events", &self.events.len())
            .finish()
    }
}

impl ViewTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_display_size(size: Size) -> Self {
        let mut tree = Self::new();
        tree.display.size = size;
        tree
    }

    // =========================================================================
    // Creation and lookup
    // =========================================================================

    /// Create a detached view
    pub fn create(&mut self) -> ViewId {
        self.views.insert(ViewNode::default())
    }

    /// Create a detached view with a debug name
    pub fn create_named(&mut self, name: impl Into<String>) -> ViewId {
        self.views.insert(ViewNode {
            name: Some(name.into()),
            ..ViewNode::default()
        })
    }

    pub fn get(&self, id: ViewId) -> Option<&ViewNode> {
        self.views.get(id)
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.views.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn parent(&self, id: ViewId) -> Option<ViewId> {
        self.views.get(id).and_then(|v| v.parent)
    }

    /// Children of a view, empty for stale ids
    pub fn children(&self, id: ViewId) -> &[ViewId] {
        match self.views.get(id) {
            Some(node) => &node.children,
            None => &[],
        }
    }

    pub fn bounds(&self, id: ViewId) -> Option<Rect> {
        self.views.get(id).map(|v| v.bounds)
    }

    /// Position of a view within its parent or the display root
    pub fn index_in_parent(&self, id: ViewId) -> Option<usize> {
        let container = self.container_of(id)?;
        self.children_of(container).iter().position(|v| *v == id)
    }

    /// Reachable from the display root through intact parent links
    pub fn is_displayed(&self, id: ViewId) -> bool {
        let mut current = Some(id);
        while let Some(view) = current {
            let Some(node) = self.views.get(view) else {
                return false;
            };
            if node.disposed {
                return false;
            }
            if node.top_level {
                return true;
            }
            current = node.parent;
        }
        false
    }

    /// The view and all of its ancestors are visible
    pub fn recursively_visible(&self, id: ViewId) -> bool {
        let mut current = Some(id);
        while let Some(view) = current {
            match self.views.get(view) {
                Some(node) if node.visible => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    /// True when `ancestor` is a strict ancestor of `of`
    pub fn is_ancestor(&self, ancestor: ViewId, of: ViewId) -> bool {
        let mut current = self.parent(of);
        while let Some(view) = current {
            if view == ancestor {
                return true;
            }
            current = self.parent(view);
        }
        false
    }

    /// Number of ancestors above a view
    pub fn depth(&self, id: ViewId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(id);
        while let Some(view) = current {
            depth += 1;
            current = self.parent(view);
        }
        depth
    }

    /// Nearest explicit direction walking up, else the display's
    pub fn effective_content_direction(&self, id: ViewId) -> ContentDirection {
        let mut current = Some(id);
        while let Some(view) = current {
            let Some(node) = self.views.get(view) else {
                break;
            };
            if let Some(direction) = node.content_direction {
                return direction;
            }
            current = node.parent;
        }
        self.display.content_direction
    }

    /// Whether content of this view is flipped horizontally
    pub fn is_mirrored(&self, id: ViewId) -> bool {
        self.views.get(id).is_some_and(|v| v.mirror_when_right_left)
            && self.effective_content_direction(id) == ContentDirection::RightLeft
    }

    /// A view needs its own mirror transform when its mirrored state differs
    /// from the one it inherits through nested surfaces
    pub fn needs_mirror_transform(&self, id: ViewId) -> bool {
        let inherited = match self.parent(id) {
            Some(parent) => self.is_mirrored(parent),
            None => self.display_mirrored(),
        };
        self.is_mirrored(id) != inherited
    }

    // =========================================================================
    // Display root
    // =========================================================================

    pub fn display_children(&self) -> &[ViewId] {
        &self.display.children
    }

    pub fn display_size(&self) -> Size {
        self.display.size
    }

    /// Display bounds in display coordinates
    pub fn display_bounds(&self) -> Rect {
        self.display.size.to_rect()
    }

    pub fn display_insets(&self) -> Insets {
        self.display.insets
    }

    pub fn display_content_direction(&self) -> ContentDirection {
        self.display.content_direction
    }

    pub fn display_mirrored(&self) -> bool {
        self.display.mirror_when_right_left
            && self.display.content_direction == ContentDirection::RightLeft
    }

    pub fn display_layout(&self) -> Option<&dyn Layout> {
        self.display.layout.as_deref()
    }

    pub fn set_display_size(&mut self, size: Size) {
        if self.display.size == size {
            return;
        }
        let old = std::mem::replace(&mut self.display.size, size);
        self.emit(ViewEvent::DisplaySizeChanged { old, new: size });
    }

    pub fn set_display_insets(&mut self, insets: Insets) {
        if self.display.insets != insets {
            self.display.insets = insets;
            self.emit(ViewEvent::DisplayLayoutRequested);
        }
    }

    pub fn set_display_layout(&mut self, layout: Option<Box<dyn Layout>>) {
        self.display.layout = layout;
        self.emit(ViewEvent::DisplayLayoutRequested);
    }

    pub fn set_display_content_direction(&mut self, direction: ContentDirection) {
        if self.display.content_direction != direction {
            self.display.content_direction = direction;
            self.emit(ViewEvent::DisplayContentDirectionChanged);
        }
    }

    pub fn set_display_mirror_when_right_left(&mut self, mirror: bool) {
        if self.display.mirror_when_right_left != mirror {
            self.display.mirror_when_right_left = mirror;
            self.emit(ViewEvent::DisplayMirroringChanged);
        }
    }

    /// Ask for the display layout to run again
    pub fn relayout_display(&mut self) {
        self.emit(ViewEvent::DisplayLayoutRequested);
    }

    pub fn display_add(&mut self, child: ViewId) -> Result<()> {
        self.add_to(None, child)
    }

    pub fn display_insert(&mut self, index: usize, child: ViewId) -> Result<()> {
        self.insert_into(None, index, child)
    }

    /// Returns false if `child` was not a top-level view
    pub fn display_remove(&mut self, child: ViewId) -> bool {
        self.container_of(child) == Some(None) && self.detach(child)
    }

    pub fn set_display_children(&mut self, children: impl IntoIterator<Item = ViewId>) -> Result<()> {
        self.replace_children(None, children.into_iter().collect())
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Append `child` to `parent`, detaching it from wherever it was
    pub fn add_child(&mut self, parent: ViewId, child: ViewId) -> Result<()> {
        self.add_to(Some(parent), child)
    }

    pub fn insert_child(&mut self, parent: ViewId, index: usize, child: ViewId) -> Result<()> {
        self.insert_into(Some(parent), index, child)
    }

    /// Returns false if `child` was not a child of `parent`
    pub fn remove_child(&mut self, parent: ViewId, child: ViewId) -> bool {
        self.container_of(child) == Some(Some(parent)) && self.detach(child)
    }

    /// Replace the whole child list as one batch
    pub fn set_children(
        &mut self,
        parent: ViewId,
        children: impl IntoIterator<Item = ViewId>,
    ) -> Result<()> {
        self.replace_children(Some(parent), children.into_iter().collect())
    }

    /// Reorder one child within its parent
    pub fn move_child(&mut self, parent: ViewId, from: usize, to: usize) -> Result<()> {
        self.check_container(Some(parent))?;
        let mut children: Children = self.children_of(Some(parent)).into();
        let len = children.len();
        if from >= len || to >= len {
            return Err(TreeError::IndexOutOfRange {
                index: from.max(to),
                len,
            });
        }
        let view = children.remove(from);
        children.insert(to, view);
        self.apply_children(Some(parent), children);
        Ok(())
    }

    /// Detach a view from its parent or from the display root
    pub fn remove_from_parent(&mut self, view: ViewId) -> bool {
        self.detach(view)
    }

    /// Detach and destroy a subtree
    ///
    /// The nodes stay readable until [`ViewTree::sweep_disposed`] so that
    /// observers of the `Disposed` event can still walk the subtree.
    pub fn dispose(&mut self, view: ViewId) -> Result<()> {
        let node = self.views.get(view).ok_or(TreeError::ViewNotFound(view))?;
        if node.disposed {
            return Ok(());
        }

        self.detach(view);

        let mut stack = vec![view];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.views.get_mut(current) {
                node.disposed = true;
                stack.extend(node.children.iter().copied());
            }
        }

        self.disposed.push(view);
        self.emit(ViewEvent::Disposed(view));
        Ok(())
    }

    /// Free the nodes of every disposed subtree, returning how many went
    pub fn sweep_disposed(&mut self) -> usize {
        let mut removed = 0;
        let mut stack = std::mem::take(&mut self.disposed);
        while let Some(current) = stack.pop() {
            if let Some(node) = self.views.remove(current) {
                stack.extend(node.children.iter().copied());
                removed += 1;
            }
        }
        removed
    }

    fn children_of(&self, container: Option<ViewId>) -> &[ViewId] {
        match container {
            Some(id) => self.children(id),
            None => &self.display.children,
        }
    }

    /// `Some(None)` for top-level views, `Some(Some(p))` under a view
    fn container_of(&self, view: ViewId) -> Option<Option<ViewId>> {
        let node = self.views.get(view)?;
        if node.top_level {
            Some(None)
        } else {
            node.parent.map(Some)
        }
    }

    fn check_container(&self, container: Option<ViewId>) -> Result<()> {
        if let Some(parent) = container {
            let node = self.views.get(parent).ok_or(TreeError::ViewNotFound(parent))?;
            if node.disposed {
                return Err(TreeError::Disposed(parent));
            }
        }
        Ok(())
    }

    fn validate_child(&self, container: Option<ViewId>, child: ViewId) -> Result<()> {
        let node = self.views.get(child).ok_or(TreeError::ViewNotFound(child))?;
        if node.disposed {
            return Err(TreeError::Disposed(child));
        }
        if let Some(parent) = container {
            if parent == child || self.is_ancestor(child, parent) {
                return Err(TreeError::Cycle { parent, child });
            }
        }
        Ok(())
    }

    fn add_to(&mut self, container: Option<ViewId>, child: ViewId) -> Result<()> {
        self.check_container(container)?;
        self.validate_child(container, child)?;
        let mut children: Children = self
            .children_of(container)
            .iter()
            .copied()
            .filter(|v| *v != child)
            .collect();
        children.push(child);
        self.replace_children(container, children)
    }

    fn insert_into(&mut self, container: Option<ViewId>, index: usize, child: ViewId) -> Result<()> {
        self.check_container(container)?;
        self.validate_child(container, child)?;
        let mut children: Children = self
            .children_of(container)
            .iter()
            .copied()
            .filter(|v| *v != child)
            .collect();
        if index > children.len() {
            return Err(TreeError::IndexOutOfRange {
                index,
                len: children.len(),
            });
        }
        children.insert(index, child);
        self.replace_children(container, children)
    }

    fn replace_children(&mut self, container: Option<ViewId>, children: Children) -> Result<()> {
        self.check_container(container)?;

        let mut seen = FxHashSet::default();
        for child in &children {
            if !seen.insert(*child) {
                return Err(TreeError::DuplicateChild(*child));
            }
            self.validate_child(container, *child)?;
        }

        // Views coming from another container leave it first
        for child in &children {
            match self.container_of(*child) {
                Some(current) if current != container => {
                    self.detach(*child);
                }
                _ => {}
            }
        }

        self.apply_children(container, children);
        Ok(())
    }

    fn detach(&mut self, view: ViewId) -> bool {
        let Some(container) = self.container_of(view) else {
            return false;
        };
        let children: Children = self
            .children_of(container)
            .iter()
            .copied()
            .filter(|v| *v != view)
            .collect();
        self.apply_children(container, children);
        true
    }

    fn apply_children(&mut self, container: Option<ViewId>, children: Children) {
        let diff = ChildrenDiff::between(self.children_of(container), &children);
        if diff.is_empty() {
            return;
        }

        for view in diff.removed.values() {
            if let Some(node) = self.views.get_mut(*view) {
                node.parent = None;
                node.top_level = false;
            }
        }
        for view in diff.added.values() {
            if let Some(node) = self.views.get_mut(*view) {
                node.parent = container;
                node.top_level = container.is_none();
            }
        }

        match container {
            Some(parent) => {
                if let Some(node) = self.views.get_mut(parent) {
                    node.children = children;
                }
            }
            None => self.display.children = children,
        }

        self.emit(ViewEvent::ChildrenChanged {
            parent: container,
            diff,
        });
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Swap a field value, returning the old one only if it changed
    fn replace<T: PartialEq>(
        &mut self,
        id: ViewId,
        value: T,
        field: impl FnOnce(&mut ViewNode) -> &mut T,
    ) -> Option<T> {
        let Some(node) = self.views.get_mut(id) else {
            tracing::trace!(?id, "ignoring update of a stale view");
            return None;
        };
        let slot = field(node);
        if *slot == value {
            return None;
        }
        Some(std::mem::replace(slot, value))
    }

    pub fn set_name(&mut self, id: ViewId, name: impl Into<String>) {
        if let Some(node) = self.views.get_mut(id) {
            node.name = Some(name.into());
        }
    }

    pub fn set_bounds(&mut self, id: ViewId, bounds: Rect) {
        if let Some(old) = self.replace(id, bounds, |v| &mut v.bounds) {
            self.emit(ViewEvent::BoundsChanged {
                view: id,
                old,
                new: bounds,
            });
        }
    }

    pub fn set_position(&mut self, id: ViewId, position: Point) {
        if let Some(bounds) = self.bounds(id) {
            self.set_bounds(id, bounds.with_origin(position));
        }
    }

    pub fn set_size(&mut self, id: ViewId, size: Size) {
        if let Some(bounds) = self.bounds(id) {
            self.set_bounds(id, bounds.with_size(size));
        }
    }

    pub fn set_x(&mut self, id: ViewId, x: f64) {
        if let Some(bounds) = self.bounds(id) {
            self.set_bounds(id, Rect::new(x, bounds.y(), bounds.width(), bounds.height()));
        }
    }

    pub fn set_y(&mut self, id: ViewId, y: f64) {
        if let Some(bounds) = self.bounds(id) {
            self.set_bounds(id, Rect::new(bounds.x(), y, bounds.width(), bounds.height()));
        }
    }

    pub fn set_width(&mut self, id: ViewId, width: f64) {
        if let Some(bounds) = self.bounds(id) {
            self.set_bounds(id, Rect::new(bounds.x(), bounds.y(), width, bounds.height()));
        }
    }

    pub fn set_height(&mut self, id: ViewId, height: f64) {
        if let Some(bounds) = self.bounds(id) {
            self.set_bounds(id, Rect::new(bounds.x(), bounds.y(), bounds.width(), height));
        }
    }

    pub fn set_size_preferences(&mut self, id: ViewId, preferences: SizePreferences) {
        if let Some(old) = self.replace(id, preferences, |v| &mut v.size_preferences) {
            self.emit(ViewEvent::SizePreferencesChanged {
                view: id,
                old,
                new: preferences,
            });
        }
    }

    pub fn set_minimum_size(&mut self, id: ViewId, minimum: Size) {
        if let Some(node) = self.views.get(id) {
            let preferences = SizePreferences {
                minimum,
                ..node.size_preferences
            };
            self.set_size_preferences(id, preferences);
        }
    }

    pub fn set_ideal_size(&mut self, id: ViewId, ideal: Option<Size>) {
        if let Some(node) = self.views.get(id) {
            let preferences = SizePreferences {
                ideal,
                ..node.size_preferences
            };
            self.set_size_preferences(id, preferences);
        }
    }

    pub fn set_insets(&mut self, id: ViewId, insets: Insets) {
        if self.replace(id, insets, |v| &mut v.insets).is_some() {
            self.emit(ViewEvent::LayoutRequested(id));
        }
    }

    pub fn set_visible(&mut self, id: ViewId, visible: bool) {
        if let Some(old) = self.replace(id, visible, |v| &mut v.visible) {
            self.emit(ViewEvent::VisibilityChanged {
                view: id,
                old,
                new: visible,
            });
        }
    }

    pub fn set_enabled(&mut self, id: ViewId, enabled: bool) {
        if self.replace(id, enabled, |v| &mut v.enabled).is_some() {
            self.emit(ViewEvent::RenderRequested(id));
        }
    }

    pub fn set_z_order(&mut self, id: ViewId, z_order: i32) {
        if let Some(old) = self.replace(id, z_order, |v| &mut v.z_order) {
            self.emit(ViewEvent::ZOrderChanged {
                view: id,
                old,
                new: z_order,
            });
        }
    }

    pub fn set_opacity(&mut self, id: ViewId, opacity: f32) {
        let opacity = opacity.clamp(0.0, 1.0);
        if let Some(old) = self.replace(id, opacity, |v| &mut v.opacity) {
            self.emit(ViewEvent::OpacityChanged {
                view: id,
                old,
                new: opacity,
            });
        }
    }

    pub fn set_transform(&mut self, id: ViewId, transform: AffineTransform) {
        if let Some(old) = self.replace(id, transform, |v| &mut v.transform) {
            self.emit(ViewEvent::TransformChanged {
                view: id,
                old,
                new: transform,
            });
        }
    }

    pub fn set_camera(&mut self, id: ViewId, camera: Camera) {
        if let Some(old) = self.replace(id, camera, |v| &mut v.camera) {
            self.emit(ViewEvent::CameraChanged {
                view: id,
                old,
                new: camera,
            });
        }
    }

    pub fn set_monitors_display_rect(&mut self, id: ViewId, monitors: bool) {
        if let Some(old) = self.replace(id, monitors, |v| &mut v.monitors_display_rect) {
            self.emit(ViewEvent::DisplayRectHandlingChanged {
                view: id,
                old,
                new: monitors,
            });
        }
    }

    pub fn set_clip_canvas_to_bounds(&mut self, id: ViewId, clip: bool) {
        if self.replace(id, clip, |v| &mut v.clip_canvas_to_bounds).is_some() {
            self.emit(ViewEvent::RenderRequested(id));
        }
    }

    pub fn set_mirror_when_right_left(&mut self, id: ViewId, mirror: bool) {
        if self.replace(id, mirror, |v| &mut v.mirror_when_right_left).is_some() {
            self.emit(ViewEvent::MirroringChanged(id));
        }
    }

    /// Set or clear the view's own content direction
    pub fn set_content_direction(&mut self, id: ViewId, direction: Option<ContentDirection>) {
        if self.replace(id, direction, |v| &mut v.content_direction).is_some() {
            self.emit(ViewEvent::ContentDirectionChanged(id));
        }
    }

    pub fn set_layout(&mut self, id: ViewId, layout: Option<Box<dyn Layout>>) {
        if let Some(node) = self.views.get_mut(id) {
            node.layout = layout;
            self.emit(ViewEvent::LayoutRequested(id));
        }
    }

    pub fn set_behavior(&mut self, id: ViewId, behavior: Option<Box<dyn Behavior>>) {
        if let Some(node) = self.views.get_mut(id) {
            node.behavior = behavior;
            self.emit(ViewEvent::RenderRequested(id));
        }
    }

    /// Ask for the view to be repainted
    pub fn rerender(&mut self, id: ViewId) {
        if self.views.contains_key(id) {
            self.emit(ViewEvent::RenderRequested(id));
        }
    }

    /// Ask for the view's children to be laid out again
    pub fn relayout(&mut self, id: ViewId) {
        if self.views.contains_key(id) {
            self.emit(ViewEvent::LayoutRequested(id));
        }
    }

    // =========================================================================
    // Layout and paint entry points
    // =========================================================================

    /// Layout installed on a view, or on the display root for `None`
    pub fn layout_of(&self, container: Option<ViewId>) -> Option<&dyn Layout> {
        match container {
            Some(id) => self.views.get(id).and_then(|v| v.layout.as_deref()),
            None => self.display.layout.as_deref(),
        }
    }

    /// Run the layout of a view. Returns false if it has none.
    pub fn layout_view(&mut self, id: ViewId) -> bool {
        let Some(mut layout) = self.views.get_mut(id).and_then(|v| v.layout.take()) else {
            return false;
        };

        layout.layout(&mut LayoutContainer::new(self, Some(id)));

        // A layout replaced during its own pass wins
        if let Some(node) = self.views.get_mut(id) {
            if node.layout.is_none() {
                node.layout = Some(layout);
            }
        }
        true
    }

    /// Run the display root's layout. Returns false if it has none.
    pub fn layout_display(&mut self) -> bool {
        let Some(mut layout) = self.display.layout.take() else {
            return false;
        };

        layout.layout(&mut LayoutContainer::new(self, None));

        if self.display.layout.is_none() {
            self.display.layout = Some(layout);
        }
        true
    }

    /// Paint a view through its behavior. Returns false if it has none.
    pub fn paint_view(&mut self, id: ViewId, canvas: &mut dyn Canvas) -> bool {
        let Some(mut behavior) = self.views.get_mut(id).and_then(|v| v.behavior.take()) else {
            return false;
        };

        if let Some(node) = self.views.get(id) {
            behavior.render(node, canvas);
        }

        if let Some(node) = self.views.get_mut(id) {
            if node.behavior.is_none() {
                node.behavior = Some(behavior);
            }
        }
        true
    }

    // =========================================================================
    // Events
    // =========================================================================

    fn emit(&mut self, event: ViewEvent) {
        tracing::trace!(?event, "view tree change");
        self.events.push_back(event);
    }

    /// Oldest unprocessed change
    pub fn pop_event(&mut self) -> Option<ViewEvent> {
        self.events.pop_front()
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Take every unprocessed change at once
    pub fn take_events(&mut self) -> Vec<ViewEvent> {
        self.events.drain(..).collect()
    }
}
