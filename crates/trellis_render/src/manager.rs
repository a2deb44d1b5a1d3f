//! Render manager
//!
//! The render manager is the only component that runs layouts and paints
//! views. It keeps the dirty and pending sets for one display, turns view
//! tree events into scheduled work, and drains that work inside a single
//! frame callback.
//!
//! # Architecture
//!
//! ```text
//!  ViewTree ──events──▶ flush_events ──▶ handlers ──▶ pending sets ──▶ schedule_paint
//!                                                                         │
//!  FrameScheduler ◀──────────────── request_frame ◀──────────────────────┘
//!        │
//!        └── host frame ──▶ on_frame: layout ▶ render ▶ bounds ▶ flush, until stable
//! ```
//!
//! # Tracking
//!
//! A view is *tracked* once it has been attached: it is reachable from the
//! display root and was visible when it got there. Views added while
//! invisible are remembered in `added_invisible` and only attached when they
//! are shown.
//!
//! Detached children are not released right away. They wait in
//! `pending_cleanup` under their former parent until that parent paints
//! again, so a view moved between containers in one batch keeps its
//! surface until the move is settled.

use indexmap::{IndexMap, IndexSet};
use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use trellis_core::{
    Canvas, ChildrenDiff, Observers, Rect, SizePreferences, Subscriptions, ViewEvent, ViewId, ViewTree,
};

use crate::device::{GraphicsDevice, GraphicsSurface};
use crate::display_rect::DisplayRectTree;
use crate::frame::{FrameScheduler, FrameTask};
use crate::hooks::{AccessibilityManager, DisplayRectChange, LifecycleEvent, ThemeManager};

type FxIndexSet<T> = IndexSet<T, FxBuildHasher>;
type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Render manager configuration
#[derive(Clone, Debug)]
pub struct RenderConfig {
    /// Passes a single frame may run before the rest is deferred to the
    /// next frame
    pub max_frame_passes: usize,
    /// Nesting limit for layouts re-run while already in progress
    pub max_inline_relayouts: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_frame_passes: 32,
            max_inline_relayouts: 8,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct RenderResult {
    rendered: bool,
    renderable: bool,
}

/// Layout and paint scheduler for one display
pub struct RenderManager<D: GraphicsDevice, S: FrameScheduler> {
    config: RenderConfig,
    device: D,
    scheduler: S,
    theme: Option<Box<dyn ThemeManager>>,
    accessibility: Option<Box<dyn AccessibilityManager>>,

    /// View whose layout is running
    laying_out: Option<ViewId>,
    laying_out_display: bool,
    inline_depth: usize,
    /// Layouts that hit the inline limit and must run again
    deferred_layouts: FxHashSet<ViewId>,

    paint_task: Option<FrameTask>,
    in_frame: bool,
    frame_requested: bool,

    /// Tracked views and the parent each was attached under
    views: FxHashMap<ViewId, Option<ViewId>>,
    dirty_views: FxHashSet<ViewId>,
    never_rendered: FxHashSet<ViewId>,
    rendered: FxHashSet<ViewId>,
    added_invisible: FxHashSet<ViewId>,
    visibility_changed: FxHashSet<ViewId>,
    pending_layout: FxIndexSet<ViewId>,
    pending_render: FxIndexSet<ViewId>,
    pending_bounds_change: FxIndexSet<ViewId>,
    pending_cleanup: FxIndexMap<ViewId, FxIndexSet<ViewId>>,

    display_rects: DisplayRectTree,
    lifecycle: Observers<LifecycleEvent>,
    display_rect_events: Observers<DisplayRectChange>,
}

impl<D: GraphicsDevice, S: FrameScheduler> RenderManager<D, S> {
    pub fn new(device: D, scheduler: S) -> Self {
        Self {
            config: RenderConfig::default(),
            device,
            scheduler,
            theme: None,
            accessibility: None,
            laying_out: None,
            laying_out_display: false,
            inline_depth: 0,
            deferred_layouts: FxHashSet::default(),
            paint_task: None,
            in_frame: false,
            frame_requested: false,
            views: FxHashMap::default(),
            dirty_views: FxHashSet::default(),
            never_rendered: FxHashSet::default(),
            rendered: FxHashSet::default(),
            added_invisible: FxHashSet::default(),
            visibility_changed: FxHashSet::default(),
            pending_layout: FxIndexSet::default(),
            pending_render: FxIndexSet::default(),
            pending_bounds_change: FxIndexSet::default(),
            pending_cleanup: FxIndexMap::default(),
            display_rects: DisplayRectTree::new(),
            lifecycle: Observers::new(),
            display_rect_events: Observers::new(),
        }
    }

    pub fn with_config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_theme_manager(mut self, theme: impl ThemeManager + 'static) -> Self {
        self.theme = Some(Box::new(theme));
        self
    }

    pub fn with_accessibility_manager(mut self, manager: impl AccessibilityManager + 'static) -> Self {
        self.accessibility = Some(Box::new(manager));
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Views joining and leaving the display
    pub fn lifecycle_events(&mut self) -> Subscriptions<'_, LifecycleEvent> {
        self.lifecycle.handle()
    }

    /// Clip rect changes of monitoring views
    pub fn display_rect_events(&mut self) -> Subscriptions<'_, DisplayRectChange> {
        self.display_rect_events.handle()
    }

    /// Start tracking everything already on the display
    pub fn attach_display(&mut self, tree: &mut ViewTree) {
        let children = tree.display_children().to_vec();
        tracing::debug!(top_level = children.len(), "attaching display");
        for child in children {
            self.child_added(tree, None, child);
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn is_tracked(&self, view: ViewId) -> bool {
        self.views.contains_key(&view)
    }

    pub fn tracked_count(&self) -> usize {
        self.views.len()
    }

    pub fn is_dirty(&self, view: ViewId) -> bool {
        self.dirty_views.contains(&view)
    }

    /// Painted at least once since it was attached
    pub fn is_rendered(&self, view: ViewId) -> bool {
        self.rendered.contains(&view)
    }

    pub fn is_pending_layout(&self, view: ViewId) -> bool {
        self.pending_layout.contains(&view)
    }

    pub fn is_pending_render(&self, view: ViewId) -> bool {
        self.pending_render.contains(&view)
    }

    pub fn is_added_invisible(&self, view: ViewId) -> bool {
        self.added_invisible.contains(&view)
    }

    /// Detached views still waiting for their surfaces to be released
    pub fn pending_cleanup_count(&self) -> usize {
        self.pending_cleanup.values().map(|orphans| orphans.len()).sum()
    }

    /// A frame was requested and has not run yet
    pub fn frame_pending(&self) -> bool {
        self.paint_task.as_ref().is_some_and(FrameTask::is_pending)
    }

    // =========================================================================
    // Public operations
    // =========================================================================

    /// Mark a view dirty and schedule a paint
    pub fn render(&mut self, tree: &ViewTree, view: ViewId) {
        self.render_view(tree, view, false);
    }

    /// Paint a view right away, after any pending layout and dirty ancestors
    pub fn render_now(&mut self, tree: &mut ViewTree, view: ViewId) {
        let non_empty = tree.bounds(view).is_some_and(|b| !b.is_empty());
        if !self.views.contains_key(&view) || !non_empty || !tree.is_displayed(view) {
            return;
        }

        self.dirty_views.insert(view);

        if self.pending_layout.contains(&view) {
            self.perform_layout(tree, view);
        }

        if let Some(parent) = tree.parent(view) {
            if self.never_rendered.contains(&parent) || self.dirty_views.contains(&parent) {
                self.render_now(tree, parent);
            }
        }

        if self.perform_render(tree, view).rendered {
            self.pending_render.shift_remove(&view);
        }
    }

    /// Queue a view for layout
    pub fn layout(&mut self, view: ViewId) {
        self.schedule_layout(view);
    }

    /// Lay out a view's children right away
    pub fn layout_now(&mut self, tree: &mut ViewTree, view: ViewId) {
        let Some(node) = tree.get(view) else {
            return;
        };
        let eligible = self.laying_out != Some(view)
            && node.has_children()
            && self.views.contains_key(&view)
            && !node.bounds().is_empty()
            && tree.is_displayed(view);

        if eligible {
            self.pending_layout.insert(view);
            self.perform_layout(tree, view);
        }
    }

    /// Visible part of a view in its own coordinates
    pub fn display_rect(&self, tree: &ViewTree, view: ViewId) -> Rect {
        if let Some(clip) = self.display_rects.clip_rect(view) {
            return clip;
        }
        if !tree.is_displayed(view) {
            return Rect::EMPTY;
        }
        let Some(node) = tree.get(view) else {
            return Rect::EMPTY;
        };

        let mut clip = if node.visible() {
            node.size().to_rect()
        } else {
            Rect::EMPTY
        };
        let mut origin = node.position();
        let mut current = node.parent();

        while let Some(parent) = current {
            let Some(parent_node) = tree.get(parent) else {
                break;
            };
            let parent_rect = if parent_node.visible() {
                parent_node.size().to_rect()
            } else {
                Rect::EMPTY
            };
            clip = clip.intersect(&parent_rect.offset(-origin.x, -origin.y));
            origin = origin + parent_node.position();
            current = parent_node.parent();
        }

        clip.intersect(&tree.display_bounds().offset(-origin.x, -origin.y))
    }

    /// Apply every queued tree event
    pub fn flush_events(&mut self, tree: &mut ViewTree) {
        while let Some(event) = tree.pop_event() {
            self.handle_event(tree, event);
        }

        if !self.pending_layout.is_empty() {
            self.schedule_paint();
        }
    }

    /// Frame callback: drain layout, paint and bounds work until stable
    pub fn on_frame(&mut self, tree: &mut ViewTree) {
        self.in_frame = true;
        self.flush_events(tree);

        let mut passes = 0;
        let mut capped = false;
        let mut new_renders = Vec::new();

        loop {
            passes += 1;

            while let Some(view) = self.next_pending_layout(tree) {
                self.perform_layout(tree, view);
            }

            let pending: Vec<ViewId> = self.pending_render.iter().copied().collect();
            for view in pending {
                if !self.pending_render.contains(&view) {
                    continue;
                }
                let result = self.perform_render(tree, view);
                let dirty = self.dirty_views.contains(&view);

                if result.rendered || !self.views.contains_key(&view) || (result.renderable && !dirty) {
                    self.pending_render.shift_remove(&view);
                } else if result.renderable && dirty && tree.bounds(view).is_some_and(|b| !b.is_empty()) {
                    new_renders.push(view);
                }
            }

            let bounds: Vec<ViewId> = self.pending_bounds_change.iter().copied().collect();
            for view in bounds {
                if self.never_rendered.contains(&view) {
                    continue;
                }
                self.pending_bounds_change.shift_remove(&view);
                if self.views.contains_key(&view) {
                    self.update_surface_bounds(tree, view);
                }
            }

            self.flush_events(tree);

            let settled = self.pending_layout.is_empty()
                && new_renders.iter().all(|v| self.never_rendered.contains(v))
                && self
                    .pending_bounds_change
                    .iter()
                    .all(|v| self.never_rendered.contains(v));
            if settled {
                break;
            }

            if passes >= self.config.max_frame_passes {
                tracing::warn!(
                    passes,
                    pending_layout = self.pending_layout.len(),
                    pending_render = self.pending_render.len(),
                    "frame did not settle, deferring remaining work"
                );
                capped = true;
                break;
            }

            new_renders.clear();
        }

        tracing::trace!(passes, "frame done");

        for view in std::mem::take(&mut self.deferred_layouts) {
            if self.views.contains_key(&view) {
                self.pending_layout.insert(view);
            }
        }

        self.in_frame = false;
        if let Some(task) = self.paint_task.take() {
            task.complete();
        }

        let requested = std::mem::take(&mut self.frame_requested);
        if capped || !self.pending_layout.is_empty() || (requested && self.has_paintable_work(tree)) {
            self.schedule_paint();
        }
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    fn schedule_paint(&mut self) {
        if self.in_frame {
            self.frame_requested = true;
            return;
        }
        if self.frame_pending() {
            return;
        }
        tracing::trace!("requesting frame");
        self.paint_task = Some(self.scheduler.request_frame());
    }

    fn schedule_layout(&mut self, view: ViewId) {
        if self.laying_out != Some(view) && self.views.contains_key(&view) {
            self.pending_layout.insert(view);
            self.schedule_paint();
        }
    }

    fn render_view(&mut self, tree: &ViewTree, view: ViewId, ignore_empty_bounds: bool) {
        let sized = ignore_empty_bounds || tree.bounds(view).is_some_and(|b| !b.is_empty());
        if sized && self.views.contains_key(&view) && tree.is_displayed(view) {
            self.dirty_views.insert(view);
            self.pending_render.insert(view);
            self.schedule_paint();
        }
    }

    /// Repaint a view and the descendants inheriting its direction
    fn render_subtree(&mut self, tree: &ViewTree, view: ViewId, root: bool) {
        let Some(node) = tree.get(view) else {
            return;
        };
        if !root && node.local_content_direction().is_some() {
            return;
        }
        self.render_view(tree, view, false);
        for child in node.children().to_vec() {
            self.render_subtree(tree, child, false);
        }
    }

    fn has_paintable_work(&self, tree: &ViewTree) -> bool {
        self.pending_render.iter().any(|view| {
            self.dirty_views.contains(view)
                && self.views.contains_key(view)
                && tree.recursively_visible(*view)
                && tree.bounds(*view).is_some_and(|b| !b.is_empty())
        })
    }

    /// Shallowest tracked view waiting for layout
    fn next_pending_layout(&mut self, tree: &ViewTree) -> Option<ViewId> {
        let views = &self.views;
        self.pending_layout.retain(|view| views.contains_key(view));
        self.pending_layout
            .iter()
            .copied()
            .min_by_key(|view| tree.depth(*view))
    }

    fn perform_layout(&mut self, tree: &mut ViewTree, view: ViewId) {
        let previous = self.laying_out.replace(view);
        tracing::trace!(?view, "layout");

        tree.layout_view(view);
        self.flush_events(tree);

        self.laying_out = previous;
        self.pending_layout.shift_remove(&view);
        // Inside a frame deferred layouts wait for the next one
        if !self.in_frame && self.deferred_layouts.remove(&view) {
            self.pending_layout.insert(view);
            self.schedule_paint();
        }
    }

    /// Re-run the layout that is in progress so new bounds take effect
    fn relayout_inline(&mut self, tree: &mut ViewTree, view: ViewId) {
        if self.inline_depth >= self.config.max_inline_relayouts {
            tracing::warn!(?view, depth = self.inline_depth, "inline relayout limit reached");
            self.deferred_layouts.insert(view);
            return;
        }

        self.inline_depth += 1;
        tracing::debug!(?view, depth = self.inline_depth, "re-running layout in progress");
        tree.layout_view(view);
        self.flush_events(tree);
        self.inline_depth -= 1;
    }

    fn relayout_display(&mut self, tree: &mut ViewTree) {
        if self.laying_out_display {
            return;
        }
        self.laying_out_display = true;
        if tree.layout_display() {
            self.flush_events(tree);
        }
        self.laying_out_display = false;
    }

    // =========================================================================
    // Painting
    // =========================================================================

    fn perform_render(&mut self, tree: &mut ViewTree, view: ViewId) -> RenderResult {
        let visibility_changed = self.visibility_changed.contains(&view);
        let recursively_visible = tree.recursively_visible(view);
        let renderable = (recursively_visible || visibility_changed)
            && tree.is_displayed(view)
            && self.views.contains_key(&view);

        let not_rendered = RenderResult {
            rendered: false,
            renderable,
        };
        if !renderable {
            return not_rendered;
        }
        let Some(node) = tree.get(view) else {
            return not_rendered;
        };

        let parent = node.parent();
        let has_size = !node.size().is_empty();

        if recursively_visible && has_size && self.never_rendered.contains(&view) {
            let index = tree.index_in_parent(view).unwrap_or(0);
            let surface = self.device.surface(view, parent);
            surface.set_transform(node.transform());
            surface.set_camera(node.camera());
            surface.set_opacity(node.opacity());
            surface.set_z_order(node.z_order());
            surface.set_index(index);
        }

        if self.pending_bounds_change.shift_remove(&view) {
            self.update_surface_bounds(tree, view);
        }

        if self.visibility_changed.remove(&view) {
            let visible = tree.get(view).is_some_and(|v| v.visible());
            self.device.surface(view, parent).set_visible(visible);
        }

        let mut rendered = false;

        if recursively_visible && has_size {
            self.release_cleanup(tree, view);

            if self.dirty_views.remove(&view) {
                self.never_rendered.remove(&view);

                let clip = tree.get(view).is_some_and(|v| v.clip_canvas_to_bounds());
                let mirrored = tree.needs_mirror_transform(view);

                let surface = self.device.surface(view, parent);
                surface.set_clip_canvas_to_bounds(clip);
                surface.set_mirrored(mirrored);
                surface.render(&mut |canvas: &mut dyn Canvas| {
                    tree.paint_view(view, canvas);
                });

                tracing::trace!(?view, "painted");
                self.rendered.insert(view);
                rendered = true;
            }
        }

        RenderResult {
            rendered,
            renderable,
        }
    }

    fn update_surface_bounds(&mut self, tree: &ViewTree, view: ViewId) {
        let Some(node) = tree.get(view) else {
            return;
        };
        self.device.surface(view, node.parent()).set_bounds(node.bounds());

        if self.display_rects.contains(view) {
            self.check_display_rect(tree, view);
        }
    }

    fn with_surface(&mut self, tree: &ViewTree, view: ViewId, apply: impl FnOnce(&mut D::Surface)) {
        if self.views.contains_key(&view) {
            apply(self.device.surface(view, tree.parent(view)));
        }
    }

    // =========================================================================
    // Attachment
    // =========================================================================

    fn record(&mut self, tree: &mut ViewTree, view: ViewId) {
        if self.views.contains_key(&view) || !tree.is_displayed(view) {
            return;
        }

        if let Some(parent) = tree.parent(view) {
            if !self.views.contains_key(&parent) {
                self.record(tree, parent);
                return;
            }
        }

        tracing::trace!(?view, "attaching view");
        self.lifecycle.publish(&LifecycleEvent::AddedToDisplay(view));
        if let Some(accessibility) = self.accessibility.as_mut() {
            accessibility.view_added(tree, view);
        }

        self.dirty_views.insert(view);
        self.never_rendered.insert(view);
        self.pending_render.insert(view);
        self.pending_bounds_change.insert(view);

        if !tree.recursively_visible(view) {
            self.added_invisible.insert(view);
        }

        self.views.insert(view, tree.parent(view));

        if let Some(theme) = self.theme.as_mut() {
            theme.update(tree, view);
        }

        let children = tree.children(view).to_vec();
        for child in &children {
            self.child_added(tree, Some(view), *child);
        }
        if !children.is_empty() {
            self.pending_layout.insert(view);
        }

        if tree.get(view).is_some_and(|v| v.monitors_display_rect()) {
            self.display_rects.register(tree, view);
            let current = self.display_rect(tree, view);
            self.notify_display_rect(view, Rect::EMPTY, current);
        }

        if tree.get(view).is_some_and(|v| v.is_top_level()) {
            self.render_view(tree, view, true);
        }
    }

    fn child_added(&mut self, tree: &mut ViewTree, parent: Option<ViewId>, child: ViewId) {
        let Some(node) = tree.get(child) else {
            return;
        };
        let current = if node.is_top_level() {
            None
        } else {
            node.parent()
        };
        if current != parent || (parent.is_none() && !node.is_top_level()) {
            tracing::trace!(?child, "skipping stale add");
            return;
        }
        let visible = node.visible();

        self.remove_from_cleanup_list(tree, parent, child);

        if visible {
            self.record(tree, child);
        } else {
            self.added_invisible.insert(child);
        }
    }

    fn child_removed(&mut self, tree: &mut ViewTree, parent: Option<ViewId>, child: ViewId) {
        let Some(attached) = self.views.get(&child).copied() else {
            self.added_invisible.remove(&child);
            if parent.is_none() {
                self.release_resources(tree, child);
            }
            return;
        };

        // Removals from a container the view was only passing through
        if attached != parent {
            tracing::trace!(?child, ?parent, ?attached, "skipping stale removal");
            return;
        }

        match parent {
            Some(parent) => {
                self.pending_cleanup.entry(parent).or_default().insert(child);
            }
            None => self.release_resources(tree, child),
        }
    }

    fn remove_from_cleanup_list(&mut self, tree: &mut ViewTree, parent: Option<ViewId>, child: ViewId) {
        let Some(attached) = self.views.get(&child).copied() else {
            return;
        };

        let mut found = false;
        self.pending_cleanup.retain(|_, orphans| {
            found |= orphans.shift_remove(&child);
            !orphans.is_empty()
        });

        if found && attached != parent {
            tracing::trace!(?child, ?attached, "moved to another parent, releasing first");
            self.release_resources(tree, child);
        }
    }

    fn release_cleanup(&mut self, tree: &mut ViewTree, view: ViewId) {
        if let Some(orphans) = self.pending_cleanup.shift_remove(&view) {
            for orphan in orphans {
                self.release_resources(tree, orphan);
            }
        }
    }

    fn release_resources(&mut self, tree: &mut ViewTree, view: ViewId) {
        if !self.views.contains_key(&view) {
            self.added_invisible.remove(&view);
            self.visibility_changed.remove(&view);
            return;
        }

        tracing::trace!(?view, "releasing view");
        self.lifecycle.publish(&LifecycleEvent::RemovedFromDisplay(view));
        if let Some(accessibility) = self.accessibility.as_mut() {
            accessibility.view_removed(view);
        }

        self.rendered.remove(&view);
        self.views.remove(&view);

        for child in tree.children(view).to_vec() {
            self.release_resources(tree, child);
        }
        self.release_cleanup(tree, view);

        self.dirty_views.remove(&view);
        self.never_rendered.remove(&view);
        self.added_invisible.remove(&view);
        self.visibility_changed.remove(&view);
        self.deferred_layouts.remove(&view);
        self.pending_layout.shift_remove(&view);
        self.pending_render.shift_remove(&view);
        self.pending_bounds_change.shift_remove(&view);
        for orphans in self.pending_cleanup.values_mut() {
            orphans.shift_remove(&view);
        }
        self.pending_cleanup.retain(|_, orphans| !orphans.is_empty());

        self.display_rects.unregister(tree, view, true);
        self.device.release(view);
    }

    // =========================================================================
    // Event handlers
    // =========================================================================

    fn handle_event(&mut self, tree: &mut ViewTree, event: ViewEvent) {
        match event {
            ViewEvent::ChildrenChanged {
                parent: Some(parent),
                diff,
            } => self.children_changed(tree, parent, &diff),
            ViewEvent::ChildrenChanged { parent: None, diff } => {
                self.display_children_changed(tree, &diff)
            }
            ViewEvent::BoundsChanged { view, old, new } => self.bounds_changed(tree, view, old, new),
            ViewEvent::VisibilityChanged { view, .. } => self.visibility_changed(tree, view),
            ViewEvent::OpacityChanged { view, new, .. } => {
                self.with_surface(tree, view, |s| s.set_opacity(new))
            }
            ViewEvent::ZOrderChanged { view, new, .. } => {
                self.with_surface(tree, view, |s| s.set_z_order(new))
            }
            ViewEvent::TransformChanged { view, new, .. } => {
                self.with_surface(tree, view, |s| s.set_transform(new))
            }
            ViewEvent::CameraChanged { view, new, .. } => {
                self.with_surface(tree, view, |s| s.set_camera(new))
            }
            ViewEvent::SizePreferencesChanged { view, old, new } => {
                self.size_preferences_changed(tree, view, &old, &new)
            }
            ViewEvent::DisplayRectHandlingChanged { view, .. } => {
                self.display_rect_handling_changed(tree, view)
            }
            ViewEvent::ContentDirectionChanged(view) | ViewEvent::MirroringChanged(view) => {
                if self.views.contains_key(&view) {
                    self.render_subtree(tree, view, true);
                }
            }
            ViewEvent::RenderRequested(view) => self.render_view(tree, view, false),
            ViewEvent::LayoutRequested(view) => self.schedule_layout(view),
            ViewEvent::Disposed(view) => self.release_resources(tree, view),
            ViewEvent::DisplaySizeChanged { .. } => {
                self.relayout_display(tree);
                for view in tree.display_children().to_vec() {
                    self.check_display_rect(tree, view);
                }
            }
            ViewEvent::DisplayContentDirectionChanged | ViewEvent::DisplayMirroringChanged => {
                for view in tree.display_children().to_vec() {
                    self.render_subtree(tree, view, true);
                }
            }
            ViewEvent::DisplayLayoutRequested => self.relayout_display(tree),
        }
    }

    fn children_changed(&mut self, tree: &mut ViewTree, parent: ViewId, diff: &ChildrenDiff) {
        if !self.views.contains_key(&parent) {
            return;
        }

        for child in diff.removed.values() {
            self.child_removed(tree, Some(parent), *child);
        }
        for child in diff.added.values() {
            self.child_added(tree, Some(parent), *child);
        }

        if !self.pending_render.contains(&parent) {
            for (index, (_, child)) in &diff.moved {
                let index = *index;
                self.with_surface(tree, *child, |s| s.set_index(index));
            }
        }

        let Some(node) = tree.get(parent) else {
            return;
        };
        if node.visible() && !node.size().is_empty() {
            self.schedule_layout(parent);
            self.render_view(tree, parent, false);
        } else {
            self.release_cleanup(tree, parent);
            if self.laying_out != Some(parent) {
                self.perform_layout(tree, parent);
            }
        }
    }

    fn display_children_changed(&mut self, tree: &mut ViewTree, diff: &ChildrenDiff) {
        for child in diff.removed.values() {
            self.child_removed(tree, None, *child);
        }
        for child in diff.added.values() {
            self.child_added(tree, None, *child);
        }
        for (index, (_, child)) in &diff.moved {
            let index = *index;
            self.with_surface(tree, *child, |s| s.set_index(index));
        }

        if !diff.removed.is_empty() || !diff.added.is_empty() {
            self.relayout_display(tree);
        }
    }

    fn bounds_changed(&mut self, tree: &mut ViewTree, view: ViewId, old: Rect, new: Rect) {
        let Some(node) = tree.get(view) else {
            return;
        };
        if !self.views.contains_key(&view) || !node.visible() || !tree.is_displayed(view) {
            return;
        }

        let parent = node.parent();
        let top_level = node.is_top_level();
        let size_changed = old.size != new.size;

        self.pending_bounds_change.insert(view);

        if size_changed
            && node.has_children()
            && tree
                .layout_of(Some(view))
                .is_some_and(|layout| layout.requires_layout(old.size, new.size))
        {
            if self.laying_out == Some(view) {
                self.relayout_inline(tree, view);
            } else {
                self.pending_layout.insert(view);
            }
        }

        match parent {
            Some(parent) => {
                let required = tree
                    .layout_of(Some(parent))
                    .is_some_and(|layout| layout.child_bounds_require_layout(view, old, new));
                if required {
                    self.pending_layout.insert(parent);
                }
            }
            None if top_level => {
                let required = tree
                    .display_layout()
                    .is_some_and(|layout| layout.child_bounds_require_layout(view, old, new));
                if required {
                    self.relayout_display(tree);
                }
            }
            None => {}
        }

        if size_changed {
            self.render_view(tree, view, true);
        } else {
            self.schedule_paint();
        }
    }

    fn size_preferences_changed(
        &mut self,
        tree: &mut ViewTree,
        view: ViewId,
        old: &SizePreferences,
        new: &SizePreferences,
    ) {
        let Some(node) = tree.get(view) else {
            return;
        };
        if !self.views.contains_key(&view) || !node.visible() || !tree.is_displayed(view) {
            return;
        }

        match node.parent() {
            Some(parent) => {
                let required = tree.layout_of(Some(parent)).is_some_and(|layout| {
                    layout.child_size_preferences_require_layout(view, old, new)
                });
                if required {
                    self.pending_layout.insert(parent);
                    self.schedule_paint();
                }
            }
            None => {
                let required = tree.display_layout().is_some_and(|layout| {
                    layout.child_size_preferences_require_layout(view, old, new)
                });
                if required {
                    self.relayout_display(tree);
                }
            }
        }
    }

    fn visibility_changed(&mut self, tree: &mut ViewTree, view: ViewId) {
        let Some(node) = tree.get(view) else {
            return;
        };
        let visible = node.visible();

        let was_added_invisible = self.added_invisible.contains(&view);
        if self.views.contains_key(&view) {
            self.added_invisible.remove(&view);
        } else {
            if !was_added_invisible || !visible {
                return;
            }
            self.added_invisible.remove(&view);
            self.record(tree, view);
            if !self.views.contains_key(&view) {
                return;
            }
        }

        let Some(node) = tree.get(view) else {
            return;
        };
        let parent = node.parent();
        let top_level = node.is_top_level();

        if let Some(parent) = parent {
            self.pending_layout.insert(parent);
            // Bounds set while hidden were never synced
            if visible {
                self.pending_bounds_change.insert(view);
            }
            self.visibility_changed.insert(view);
            self.pending_render.insert(view);
            self.render_view(tree, parent, false);
            self.schedule_paint();
        } else if top_level {
            if visible {
                self.visibility_changed.insert(view);
                self.pending_bounds_change.insert(view);
                if !was_added_invisible {
                    self.render_view(tree, view, false);
                }
            } else {
                self.with_surface(tree, view, |s| s.set_visible(false));
                self.pending_bounds_change.shift_remove(&view);
            }
        }

        if self.display_rects.contains(view) {
            self.check_display_rect(tree, view);
        }
    }

    fn display_rect_handling_changed(&mut self, tree: &mut ViewTree, view: ViewId) {
        if !self.views.contains_key(&view) {
            return;
        }

        if tree.get(view).is_some_and(|v| v.monitors_display_rect()) {
            let was_registered = self.display_rects.contains(view);
            self.display_rects.register(tree, view);
            if !was_registered {
                let current = self.display_rect(tree, view);
                self.notify_display_rect(view, Rect::EMPTY, current);
            }
        } else {
            self.display_rects.unregister(tree, view, false);
        }
    }

    // =========================================================================
    // Display rects
    // =========================================================================

    fn check_display_rect(&mut self, tree: &ViewTree, view: ViewId) {
        let mut changes = Vec::new();
        self.display_rects.check(tree, view, &mut changes);
        for change in changes {
            self.display_rect_events.publish(&change);
        }
    }

    fn notify_display_rect(&mut self, view: ViewId, old: Rect, new: Rect) {
        if old != new {
            self.display_rect_events
                .publish(&DisplayRectChange { view, old, new });
        }
    }
}

impl<D: GraphicsDevice, S: FrameScheduler> std::fmt::Debug for RenderManager<D, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderManager")
            .field("views", &self.views.len())
            .field("dirty", &self.dirty_views.len())
            .field("pending_layout", &self.pending_layout.len())
            .field("pending_render", &self.pending_render.len())
            .field("pending_cleanup", &self.pending_cleanup_count())
            .field("frame_pending", &self.frame_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::display::Display;
    use crate::testing::{init_tracing, DrawCommand, ManualFrameScheduler, RecordingDevice};
    use trellis_core::{Color, ContentDirection, FillBehavior, Layout, LayoutContainer, Size};
    use trellis_layout::{ConstraintLayout, Strength};

    type TestDisplay = Display<RecordingDevice, ManualFrameScheduler>;

    fn display() -> TestDisplay {
        display_with(RenderConfig::default())
    }

    fn display_with(config: RenderConfig) -> TestDisplay {
        init_tracing();
        let manager = RenderManager::new(RecordingDevice::default(), ManualFrameScheduler::default())
            .with_config(config);
        Display::from_parts(ViewTree::with_display_size(Size::new(500.0, 400.0)), manager)
    }

    fn assert_rect(actual: Option<Rect>, expected: Rect) {
        let actual = actual.expect("view should exist");
        let close = |a: f64, b: f64| (a - b).abs() < 1.0e-6;
        assert!(
            close(actual.x(), expected.x())
                && close(actual.y(), expected.y())
                && close(actual.width(), expected.width())
                && close(actual.height(), expected.height()),
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[derive(Clone)]
    struct Log<T>(Rc<RefCell<Vec<T>>>);

    impl<T> Default for Log<T> {
        fn default() -> Self {
            Self(Rc::new(RefCell::new(Vec::new())))
        }
    }

    impl<T: Clone> Log<T> {
        fn push(&self, entry: T) {
            self.0.borrow_mut().push(entry);
        }

        fn entries(&self) -> Vec<T> {
            self.0.borrow().clone()
        }

        fn clear(&self) {
            self.0.borrow_mut().clear();
        }
    }

    /// Records which containers were laid out, in order
    struct LoggingLayout {
        log: Log<ViewId>,
    }

    impl Layout for LoggingLayout {
        fn layout(&mut self, container: &mut LayoutContainer<'_>) {
            if let Some(id) = container.id() {
                self.log.push(id);
            }
        }
    }

    /// Top-level `parent` at `bounds` holding one 10x10 child
    fn parent_and_child(display: &mut TestDisplay, bounds: Rect) -> (ViewId, ViewId) {
        let mut tree = display.tree_mut();
        let parent = tree.create_named("parent");
        let child = tree.create_named("child");
        tree.set_bounds(parent, bounds);
        tree.set_bounds(child, Rect::new(0.0, 0.0, 10.0, 10.0));
        tree.add_child(parent, child).unwrap();
        tree.display_add(parent).unwrap();
        (parent, child)
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    #[test]
    fn test_repeated_requests_run_once_per_frame() {
        let mut display = display();
        let log = Log::default();
        let (parent, _) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        display.tree_mut().set_layout(
            parent,
            Some(Box::new(LoggingLayout { log: log.clone() })),
        );
        display.run_jobs();
        log.clear();

        let paints = display.device().render_count(parent);
        let requests = display.scheduler().requests();

        for _ in 0..3 {
            display.render(parent);
            display.layout(parent);
        }

        assert_eq!(display.scheduler().requests(), requests + 1);
        assert!(display.run_frame());
        assert!(!display.scheduler().has_pending_frame());
        assert_eq!(log.entries(), vec![parent]);
        assert_eq!(display.device().render_count(parent), paints + 1);
    }

    #[test]
    fn test_ancestors_lay_out_first() {
        let mut display = display();
        let log = Log::default();
        let chain = {
            let mut tree = display.tree_mut();
            let chain: Vec<ViewId> = (0..4).map(|_| tree.create()).collect();
            for view in &chain {
                tree.set_bounds(*view, Rect::new(0.0, 0.0, 50.0, 50.0));
            }
            for pair in chain.windows(2) {
                tree.add_child(pair[0], pair[1]).unwrap();
            }
            for view in &chain[..3] {
                tree.set_layout(*view, Some(Box::new(LoggingLayout { log: log.clone() })));
            }
            tree.display_add(chain[0]).unwrap();
            chain
        };
        display.run_jobs();
        assert_eq!(log.entries(), chain[..3].to_vec());
        log.clear();

        display.layout(chain[2]);
        display.layout(chain[0]);
        display.layout(chain[1]);
        display.run_frame();

        assert_eq!(log.entries(), chain[..3].to_vec());
    }

    #[test]
    fn test_attached_subtree_paints_each_view_once() {
        let mut display = display();
        let views = {
            let mut tree = display.tree_mut();
            let root = tree.create();
            tree.set_bounds(root, Rect::new(0.0, 0.0, 200.0, 200.0));
            let mut views = vec![root];
            for i in 0..2 {
                let branch = tree.create();
                tree.set_bounds(branch, Rect::new(f64::from(i) * 100.0, 0.0, 100.0, 100.0));
                tree.add_child(root, branch).unwrap();
                views.push(branch);
                for j in 0..2 {
                    let leaf = tree.create();
                    tree.set_bounds(leaf, Rect::new(0.0, f64::from(j) * 50.0, 50.0, 50.0));
                    tree.add_child(branch, leaf).unwrap();
                    views.push(leaf);
                }
            }
            for view in &views {
                tree.set_behavior(*view, Some(Box::new(FillBehavior::new(Color::BLUE))));
            }
            tree.display_add(root).unwrap();
            views
        };

        assert_eq!(display.manager().tracked_count(), views.len());
        for view in &views {
            assert!(display.manager().is_tracked(*view));
            assert!(display.manager().is_pending_render(*view));
        }

        assert_eq!(display.run_jobs(), 1);

        for view in &views {
            assert_eq!(display.device().render_count(*view), 1);
            assert!(display.manager().is_rendered(*view));
            let surface = display.device().surface_of(*view).unwrap();
            assert_eq!(surface.bounds, display.tree().bounds(*view));
            assert!(matches!(
                surface.commands.as_slice(),
                [DrawCommand::FillRect { color, .. }] if *color == Color::BLUE
            ));
        }
    }

    #[test]
    fn test_invisible_add_waits_until_shown() {
        let mut display = display();
        let (parent, _) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        display.run_jobs();

        let hidden = {
            let mut tree = display.tree_mut();
            let hidden = tree.create();
            tree.set_bounds(hidden, Rect::new(10.0, 10.0, 20.0, 20.0));
            tree.set_visible(hidden, false);
            tree.add_child(parent, hidden).unwrap();
            hidden
        };

        assert!(!display.manager().is_tracked(hidden));
        assert!(!display.manager().is_pending_render(hidden));
        assert!(display.manager().is_added_invisible(hidden));

        display.run_jobs();
        assert!(!display.device().has_surface(hidden));

        display.tree_mut().set_visible(hidden, true);
        assert!(display.manager().is_tracked(hidden));
        assert!(!display.manager().is_added_invisible(hidden));
        assert_eq!(display.device().render_count(hidden), 0);

        display.run_jobs();
        let surface = display.device().surface_of(hidden).unwrap();
        assert_eq!(surface.render_count, 1);
        assert_eq!(surface.visible, Some(true));
        assert_eq!(surface.bounds, Some(Rect::new(10.0, 10.0, 20.0, 20.0)));
    }

    #[test]
    fn test_hiding_top_level_view_hides_surface_now() {
        let mut display = display();
        let (parent, _) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        display.run_jobs();

        display.tree_mut().set_visible(parent, false);
        assert_eq!(display.device().surface_of(parent).unwrap().visible, Some(false));

        display.tree_mut().set_visible(parent, true);
        display.run_jobs();
        assert_eq!(display.device().surface_of(parent).unwrap().visible, Some(true));
    }

    #[test]
    fn test_cancelled_frame_is_requested_again() {
        let mut display = display();
        let (parent, _) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        display.run_jobs();
        let requests = display.scheduler().requests();

        display.render(parent);
        display.scheduler_mut().cancel_pending();
        assert!(!display.manager().frame_pending());

        display.render(parent);
        assert_eq!(display.scheduler().requests(), requests + 2);
        assert!(display.run_frame());
    }

    #[test]
    fn test_frame_pass_limit_defers_work() {
        let mut display = display_with(RenderConfig {
            max_frame_passes: 1,
            ..RenderConfig::default()
        });
        let (_, child) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        display.run_jobs();

        {
            let mut tree = display.tree_mut();
            tree.rerender(child);
            tree.set_visible(child, false);
        }

        assert!(display.run_frame());
        assert!(display.scheduler().has_pending_frame());
        assert_eq!(display.run_jobs(), 1);
        assert!(!display.scheduler().has_pending_frame());
        assert_eq!(display.device().surface_of(child).unwrap().visible, Some(false));
    }

    #[test]
    fn test_frame_settles_within_limit() {
        let mut display = display();
        let (_, child) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        display.run_jobs();

        {
            let mut tree = display.tree_mut();
            tree.rerender(child);
            tree.set_visible(child, false);
        }

        assert_eq!(display.run_jobs(), 1);
        assert!(!display.scheduler().has_pending_frame());
    }

    #[test]
    fn test_render_now_paints_dirty_ancestors_first() {
        let mut display = display();
        let (parent, child) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        display.run_jobs();

        display.render(parent);
        display.render_now(child);

        assert_eq!(display.device().render_count(parent), 2);
        assert_eq!(display.device().render_count(child), 2);
        assert!(!display.manager().is_pending_render(parent));
        assert!(!display.manager().is_dirty(child));
    }

    #[test]
    fn test_layout_now_runs_immediately() {
        let mut display = display();
        let log = Log::default();
        let (parent, _) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        display.run_jobs();
        display.tree_mut().set_layout(
            parent,
            Some(Box::new(LoggingLayout { log: log.clone() })),
        );

        display.layout_now(parent);

        assert_eq!(log.entries(), vec![parent]);
        assert!(!display.manager().is_pending_layout(parent));
    }

    /// Stacks children vertically and fits its container around them
    struct FitContentLayout {
        log: Log<ViewId>,
    }

    impl Layout for FitContentLayout {
        fn layout(&mut self, container: &mut LayoutContainer<'_>) {
            if let Some(id) = container.id() {
                self.log.push(id);
            }
            let width = container.width();
            let mut y = 0.0;
            for child in container.children().to_vec() {
                let height = container.bounds(child).map_or(0.0, |b| b.height());
                container.set_bounds(child, Rect::new(0.0, y, width, height));
                y += height;
            }
            container.set_container_size(Size::new(width, y));
        }
    }

    /// Grows its container by 10 on every pass
    struct GrowingLayout {
        log: Log<ViewId>,
    }

    impl Layout for GrowingLayout {
        fn layout(&mut self, container: &mut LayoutContainer<'_>) {
            if let Some(id) = container.id() {
                self.log.push(id);
            }
            let size = container.size();
            container.set_container_size(Size::new(size.width, size.height + 10.0));
        }
    }

    #[test]
    fn test_layout_resizing_its_container_reruns_inline() {
        let mut display = display();
        let log = Log::default();
        let (parent, child) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        let second = {
            let mut tree = display.tree_mut();
            let second = tree.create();
            tree.set_bounds(second, Rect::new(0.0, 0.0, 10.0, 30.0));
            tree.add_child(parent, second).unwrap();
            tree.set_layout(
                parent,
                Some(Box::new(FitContentLayout { log: log.clone() })),
            );
            second
        };

        assert!(display.run_frame());

        assert_eq!(log.entries(), vec![parent, parent]);
        assert_rect(display.tree().bounds(parent), Rect::new(0.0, 0.0, 100.0, 40.0));
        assert_rect(display.tree().bounds(child), Rect::new(0.0, 0.0, 100.0, 10.0));
        assert_rect(display.tree().bounds(second), Rect::new(0.0, 10.0, 100.0, 30.0));
        assert!(!display.manager().is_pending_layout(parent));

        display.run_jobs();
        assert_eq!(log.entries(), vec![parent, parent]);
    }

    #[test]
    fn test_inline_relayout_limit_defers_to_next_frame() {
        let mut display = display_with(RenderConfig {
            max_inline_relayouts: 2,
            ..RenderConfig::default()
        });
        let log = Log::default();
        let (parent, _) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        display.tree_mut().set_layout(
            parent,
            Some(Box::new(GrowingLayout { log: log.clone() })),
        );

        assert!(display.run_frame());

        assert_eq!(log.entries(), vec![parent; 3]);
        assert_rect(display.tree().bounds(parent), Rect::new(0.0, 0.0, 100.0, 130.0));
        assert!(display.manager().is_pending_layout(parent));
        assert!(display.scheduler().has_pending_frame());

        log.clear();
        assert!(display.run_frame());
        assert_eq!(log.entries(), vec![parent; 3]);
        assert_rect(display.tree().bounds(parent), Rect::new(0.0, 0.0, 100.0, 160.0));
    }

    // =========================================================================
    // Detach and cleanup
    // =========================================================================

    #[test]
    fn test_removed_child_released_when_parent_repaints() {
        let mut display = display();
        let events = Log::default();
        let sink = events.clone();
        display.lifecycle_events().subscribe(move |e| sink.push(*e));

        let (parent, child) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        display.run_jobs();

        display.tree_mut().remove_child(parent, child);
        assert_eq!(display.manager().pending_cleanup_count(), 1);
        assert_eq!(display.device().release_count(child), 0);

        display.run_jobs();
        assert_eq!(display.device().release_count(child), 1);
        assert_eq!(display.manager().pending_cleanup_count(), 0);
        assert!(!display.manager().is_tracked(child));
        assert_eq!(
            events.entries(),
            vec![
                LifecycleEvent::AddedToDisplay(parent),
                LifecycleEvent::AddedToDisplay(child),
                LifecycleEvent::RemovedFromDisplay(child),
            ]
        );
    }

    #[test]
    fn test_move_between_parents_releases_once() {
        let mut display = display();
        let (first, child) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        let second = {
            let mut tree = display.tree_mut();
            let second = tree.create();
            tree.set_bounds(second, Rect::new(100.0, 0.0, 100.0, 100.0));
            tree.display_add(second).unwrap();
            second
        };
        display.run_jobs();

        display.tree_mut().add_child(second, child).unwrap();

        assert_eq!(display.device().release_count(child), 1);
        assert_eq!(display.manager().pending_cleanup_count(), 0);
        assert!(display.manager().is_tracked(child));

        display.run_jobs();
        assert_eq!(display.device().release_count(child), 1);
        let surface = display.device().surface_of(child).unwrap();
        assert_eq!(surface.parent, Some(second));
        assert_eq!(surface.render_count, 1);
        assert!(display.tree().children(first).is_empty());
    }

    #[test]
    fn test_readd_to_same_parent_cancels_cleanup() {
        let mut display = display();
        let (parent, child) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        display.run_jobs();

        {
            let mut tree = display.tree_mut();
            tree.remove_child(parent, child);
            tree.add_child(parent, child).unwrap();
        }
        display.run_jobs();

        assert_eq!(display.device().release_count(child), 0);
        assert!(display.manager().is_tracked(child));
        assert_eq!(display.manager().pending_cleanup_count(), 0);
    }

    #[test]
    fn test_round_trip_through_other_parent_keeps_surface() {
        let mut display = display();
        let (first, child) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        let second = {
            let mut tree = display.tree_mut();
            let second = tree.create();
            tree.set_bounds(second, Rect::new(100.0, 0.0, 100.0, 100.0));
            tree.display_add(second).unwrap();
            second
        };
        display.run_jobs();

        {
            let mut tree = display.tree_mut();
            tree.add_child(second, child).unwrap();
            tree.add_child(first, child).unwrap();
        }
        assert_eq!(display.manager().pending_cleanup_count(), 0);

        display.render(second);
        display.run_jobs();

        assert_eq!(display.device().release_count(child), 0);
        assert!(display.manager().is_tracked(child));
        assert_eq!(display.manager().pending_cleanup_count(), 0);
        let surface = display.device().surface_of(child).unwrap();
        assert_eq!(surface.parent, Some(first));

        display.render(child);
        display.run_jobs();
        assert_eq!(display.device().render_count(child), 2);
    }

    #[test]
    fn test_stale_removal_from_display_keeps_child() {
        let mut display = display();
        let (parent, child) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        display.run_jobs();

        {
            let mut tree = display.tree_mut();
            tree.display_add(child).unwrap();
            tree.add_child(parent, child).unwrap();
        }
        display.run_jobs();

        assert_eq!(display.device().release_count(child), 0);
        assert!(display.manager().is_tracked(child));
        assert_eq!(display.tree().parent(child), Some(parent));
    }

    #[test]
    fn test_dispose_releases_subtree_immediately() {
        let mut display = display();
        let (parent, child) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        let grandchild = {
            let mut tree = display.tree_mut();
            let grandchild = tree.create();
            tree.add_child(child, grandchild).unwrap();
            grandchild
        };
        display.run_jobs();

        display.tree_mut().dispose(child).unwrap();

        assert_eq!(display.device().release_count(child), 1);
        assert_eq!(display.device().release_count(grandchild), 1);
        assert_eq!(display.manager().pending_cleanup_count(), 0);
        assert!(!display.tree().contains(grandchild));

        display.run_jobs();
        assert_eq!(display.device().release_count(child), 1);
        assert!(display.manager().is_tracked(parent));
    }

    #[test]
    fn test_top_level_removal_releases_now() {
        let mut display = display();
        let (parent, child) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        display.run_jobs();

        display.tree_mut().display_remove(parent);

        assert_eq!(display.device().release_count(parent), 1);
        assert_eq!(display.device().release_count(child), 1);
        assert_eq!(display.manager().tracked_count(), 0);
        assert_eq!(display.device().surface_count(), 0);
    }

    // =========================================================================
    // Surfaces
    // =========================================================================

    #[test]
    fn test_first_paint_pushes_properties() {
        let mut display = display();
        let (parent, child) = {
            let mut tree = display.tree_mut();
            let parent = tree.create();
            let child = tree.create();
            tree.set_bounds(parent, Rect::new(0.0, 0.0, 100.0, 100.0));
            tree.set_bounds(child, Rect::new(5.0, 5.0, 10.0, 10.0));
            tree.set_opacity(child, 0.25);
            tree.set_z_order(child, 3);
            tree.set_clip_canvas_to_bounds(child, false);
            tree.add_child(parent, child).unwrap();
            tree.display_add(parent).unwrap();
            (parent, child)
        };
        display.run_jobs();

        let surface = display.device().surface_of(child).unwrap();
        assert_eq!(surface.parent, Some(parent));
        assert_eq!(surface.opacity, Some(0.25));
        assert_eq!(surface.z_order, Some(3));
        assert_eq!(surface.index, Some(0));
        assert_eq!(surface.clip_canvas_to_bounds, Some(false));
        assert_eq!(surface.mirrored, Some(false));
        assert_eq!(surface.bounds, Some(Rect::new(5.0, 5.0, 10.0, 10.0)));
    }

    #[test]
    fn test_property_changes_reach_surface_immediately() {
        let mut display = display();
        let (_, child) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        display.run_jobs();

        {
            let mut tree = display.tree_mut();
            tree.set_opacity(child, 0.5);
            tree.set_z_order(child, 7);
        }

        let surface = display.device().surface_of(child).unwrap();
        assert_eq!(surface.opacity, Some(0.5));
        assert_eq!(surface.z_order, Some(7));
    }

    #[test]
    fn test_moved_children_get_new_index() {
        let mut display = display();
        let (parent, first) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        let second = {
            let mut tree = display.tree_mut();
            let second = tree.create();
            tree.set_bounds(second, Rect::new(0.0, 0.0, 10.0, 10.0));
            tree.add_child(parent, second).unwrap();
            second
        };
        display.run_jobs();
        assert_eq!(display.device().surface_of(second).unwrap().index, Some(1));

        display.tree_mut().move_child(parent, 1, 0).unwrap();

        assert_eq!(display.device().surface_of(second).unwrap().index, Some(0));
        assert_eq!(display.device().surface_of(first).unwrap().index, Some(1));
    }

    #[test]
    fn test_position_change_only_syncs_bounds() {
        let mut display = display();
        let (_, child) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        display.run_jobs();

        display.tree_mut().set_position(child, trellis_core::Point::new(30.0, 40.0));
        assert!(!display.manager().is_dirty(child));

        display.run_jobs();
        let surface = display.device().surface_of(child).unwrap();
        assert_eq!(surface.bounds, Some(Rect::new(30.0, 40.0, 10.0, 10.0)));
        assert_eq!(surface.render_count, 1);
    }

    #[test]
    fn test_direction_change_repushes_mirroring() {
        let mut display = display();
        let (_, child) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        display.run_jobs();

        {
            let mut tree = display.tree_mut();
            tree.set_display_content_direction(ContentDirection::RightLeft);
            tree.set_mirror_when_right_left(child, false);
        }
        display.run_jobs();

        let surface = display.device().surface_of(child).unwrap();
        assert_eq!(surface.mirrored, Some(true));
        assert_eq!(surface.render_count, 2);
    }

    // =========================================================================
    // Hooks
    // =========================================================================

    struct OpacityTheme {
        themed: Log<ViewId>,
    }

    impl ThemeManager for OpacityTheme {
        fn update(&mut self, tree: &mut ViewTree, view: ViewId) {
            self.themed.push(view);
            tree.set_opacity(view, 0.5);
        }
    }

    struct AccessibilityLog {
        log: Log<(bool, ViewId)>,
    }

    impl AccessibilityManager for AccessibilityLog {
        fn view_added(&mut self, _tree: &ViewTree, view: ViewId) {
            self.log.push((true, view));
        }

        fn view_removed(&mut self, view: ViewId) {
            self.log.push((false, view));
        }
    }

    #[test]
    fn test_theme_and_accessibility_hooks() {
        init_tracing();
        let themed = Log::default();
        let accessibility = Log::default();
        let manager = RenderManager::new(RecordingDevice::default(), ManualFrameScheduler::default())
            .with_theme_manager(OpacityTheme {
                themed: themed.clone(),
            })
            .with_accessibility_manager(AccessibilityLog {
                log: accessibility.clone(),
            });
        let mut display = Display::from_parts(ViewTree::with_display_size(Size::new(500.0, 400.0)), manager);

        let (parent, child) = parent_and_child(&mut display, Rect::new(0.0, 0.0, 100.0, 100.0));
        display.run_jobs();

        assert_eq!(themed.entries(), vec![parent, child]);
        assert_eq!(display.device().surface_of(child).unwrap().opacity, Some(0.5));

        display.tree_mut().display_remove(parent);
        assert_eq!(
            accessibility.entries(),
            vec![(true, parent), (true, child), (false, parent), (false, child)]
        );
    }

    // =========================================================================
    // Display rects
    // =========================================================================

    #[test]
    fn test_monitored_view_notified_of_clip_changes() {
        let mut display = display();
        let changes = Log::default();
        let sink = changes.clone();
        display.display_rect_events().subscribe(move |c| sink.push(*c));

        let (outer, inner) = {
            let mut tree = display.tree_mut();
            let outer = tree.create();
            let inner = tree.create();
            tree.set_bounds(outer, Rect::new(0.0, 0.0, 100.0, 100.0));
            tree.set_bounds(inner, Rect::new(80.0, 60.0, 50.0, 50.0));
            tree.set_monitors_display_rect(inner, true);
            tree.add_child(outer, inner).unwrap();
            tree.display_add(outer).unwrap();
            (outer, inner)
        };

        assert_eq!(
            changes.entries(),
            vec![DisplayRectChange {
                view: inner,
                old: Rect::EMPTY,
                new: Rect::new(0.0, 0.0, 20.0, 40.0),
            }]
        );
        display.run_jobs();
        changes.clear();

        display.tree_mut().set_size(outer, Size::new(200.0, 200.0));
        display.run_jobs();

        assert_eq!(
            changes.entries(),
            vec![DisplayRectChange {
                view: inner,
                old: Rect::new(0.0, 0.0, 20.0, 40.0),
                new: Rect::new(0.0, 0.0, 50.0, 50.0),
            }]
        );
        assert_eq!(display.display_rect(inner), Rect::new(0.0, 0.0, 50.0, 50.0));
        changes.clear();

        display.tree_mut().set_visible(outer, false);
        display.run_jobs();
        assert_eq!(display.display_rect(inner), Rect::EMPTY);
        assert_eq!(changes.entries().last().map(|c| c.new), Some(Rect::EMPTY));
    }

    #[test]
    fn test_monitoring_toggle_on_tracked_view() {
        let mut display = display();
        let changes = Log::default();
        let sink = changes.clone();
        display.display_rect_events().subscribe(move |c| sink.push(*c));

        let (parent, _) = parent_and_child(&mut display, Rect::new(450.0, 0.0, 100.0, 100.0));
        display.run_jobs();

        display.tree_mut().set_monitors_display_rect(parent, true);
        assert_eq!(
            changes.entries(),
            vec![DisplayRectChange {
                view: parent,
                old: Rect::EMPTY,
                new: Rect::new(0.0, 0.0, 50.0, 100.0),
            }]
        );

        display.tree_mut().set_monitors_display_rect(parent, false);
        assert!(!display.manager().display_rects.contains(parent));
        assert_eq!(display.display_rect(parent), Rect::new(0.0, 0.0, 50.0, 100.0));
    }

    #[test]
    fn test_display_rect_walks_ancestors() {
        let mut display = display();
        let (parent, child) = parent_and_child(&mut display, Rect::new(450.0, 0.0, 100.0, 100.0));
        display.tree_mut().set_bounds(child, Rect::new(30.0, -10.0, 30.0, 30.0));

        assert_eq!(display.display_rect(parent), Rect::new(0.0, 0.0, 50.0, 100.0));
        assert_eq!(display.display_rect(child), Rect::new(0.0, 10.0, 20.0, 20.0));

        display.tree_mut().set_visible(parent, false);
        assert_eq!(display.display_rect(child), Rect::EMPTY);

        let detached = display.tree_mut().create();
        assert_eq!(display.display_rect(detached), Rect::EMPTY);
    }

    #[test]
    fn test_display_resize_rechecks_top_level_views() {
        let mut display = display();
        let changes = Log::default();
        let sink = changes.clone();
        display.display_rect_events().subscribe(move |c| sink.push(*c));

        let (parent, _) = parent_and_child(&mut display, Rect::new(400.0, 0.0, 200.0, 100.0));
        display.tree_mut().set_monitors_display_rect(parent, true);
        display.run_jobs();
        changes.clear();

        display.tree_mut().set_display_size(Size::new(800.0, 400.0));

        assert_eq!(
            changes.entries(),
            vec![DisplayRectChange {
                view: parent,
                old: Rect::new(0.0, 0.0, 100.0, 100.0),
                new: Rect::new(0.0, 0.0, 200.0, 100.0),
            }]
        );
    }

    // =========================================================================
    // Constraint layouts through the scheduler
    // =========================================================================

    #[test]
    fn test_centered_block_follows_container() {
        let mut display = display();
        let layout = ConstraintLayout::new();
        let (container, a, b) = {
            let mut tree = display.tree_mut();
            let container = tree.create();
            let a = tree.create();
            let b = tree.create();
            tree.set_bounds(container, Rect::new(0.0, 0.0, 100.0, 100.0));
            tree.set_bounds(a, Rect::new(0.0, 0.0, 10.0, 10.0));
            tree.set_bounds(b, Rect::new(0.0, 0.0, 10.0, 10.0));
            tree.add_child(container, a).unwrap();
            tree.add_child(container, b).unwrap();
            (container, a, b)
        };
        layout
            .constrain(&[a, b], |ctx, views| {
                let parent = ctx.parent();
                ctx.add(views[0].width().eq(parent.width() - 10.0))
                    .add(views[1].width().eq(50.0))
                    .add(views[1].center_x().eq(parent.center_x()));
            })
            .unwrap();
        {
            let mut tree = display.tree_mut();
            tree.set_layout(container, Some(Box::new(layout)));
            tree.display_add(container).unwrap();
        }
        display.run_jobs();

        assert_rect(display.tree().bounds(a), Rect::new(0.0, 0.0, 90.0, 10.0));
        assert_rect(display.tree().bounds(b), Rect::new(25.0, 0.0, 50.0, 10.0));

        display.tree_mut().set_size(container, Size::new(200.0, 100.0));
        display.run_jobs();

        assert_rect(display.tree().bounds(a), Rect::new(0.0, 0.0, 190.0, 10.0));
        assert_rect(display.tree().bounds(b), Rect::new(75.0, 0.0, 50.0, 10.0));
        assert_rect(
            display.device().surface_of(b).unwrap().bounds,
            Rect::new(75.0, 0.0, 50.0, 10.0),
        );
    }

    #[test]
    fn test_resize_cascades_through_nested_layouts() {
        let mut display = display();
        let (grandparent, parent, child) = {
            let mut tree = display.tree_mut();
            let grandparent = tree.create();
            let parent = tree.create();
            let child = tree.create();
            tree.set_bounds(grandparent, Rect::new(0.0, 0.0, 1000.0, 1000.0));
            tree.set_bounds(parent, Rect::new(0.0, 0.0, 100.0, 100.0));
            tree.set_bounds(child, Rect::new(0.0, 0.0, 10.0, 10.0));
            tree.add_child(grandparent, parent).unwrap();
            tree.add_child(parent, child).unwrap();
            (grandparent, parent, child)
        };

        let outer = ConstraintLayout::new();
        outer
            .constrain(&[parent], |ctx, views| {
                let bounds = ctx.parent();
                ctx.add(views[0].top().eq(0.0))
                    .add(views[0].height().eq(500.0).with_strength(Strength::MEDIUM))
                    .add(views[0].bottom().le(bounds.bottom()));
            })
            .unwrap();
        let inner = ConstraintLayout::new();
        inner
            .constrain(&[child], |ctx, views| {
                let bounds = ctx.parent();
                ctx.add(views[0].top().eq(0.0))
                    .add(views[0].height().eq(bounds.height()));
            })
            .unwrap();

        {
            let mut tree = display.tree_mut();
            tree.set_layout(grandparent, Some(Box::new(outer)));
            tree.set_layout(parent, Some(Box::new(inner)));
            tree.display_add(grandparent).unwrap();
        }
        display.run_jobs();

        assert_rect(display.tree().bounds(parent), Rect::new(0.0, 0.0, 100.0, 500.0));
        assert_rect(display.tree().bounds(child), Rect::new(0.0, 0.0, 10.0, 500.0));

        display.tree_mut().set_height(grandparent, 400.0);
        assert_eq!(display.run_jobs(), 1);

        assert_rect(display.tree().bounds(parent), Rect::new(0.0, 0.0, 100.0, 400.0));
        assert_rect(display.tree().bounds(child), Rect::new(0.0, 0.0, 10.0, 400.0));
    }
}
