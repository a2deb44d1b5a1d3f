//! Display: a view tree paired with its render manager
//!
//! Every mutation of the tree goes through [`Display::tree_mut`]. The
//! returned guard derefs to the [`ViewTree`]; when it is dropped the queued
//! tree events are handed to the render manager and disposed views are
//! swept.
//!
//! ```ignore
//! let mut display = Display::new(tree, device, scheduler);
//!
//! {
//!     let mut tree = display.tree_mut();
//!     let panel = tree.create();
//!     tree.display_add(panel)?;
//! } // events flushed here
//!
//! display.on_frame();
//! ```

use std::ops::{Deref, DerefMut};

use trellis_core::{Rect, Subscriptions, ViewId, ViewTree};

use crate::device::GraphicsDevice;
use crate::frame::FrameScheduler;
use crate::hooks::{DisplayRectChange, LifecycleEvent};
use crate::manager::RenderManager;

/// A view tree and the render manager that schedules its work
pub struct Display<D: GraphicsDevice, S: FrameScheduler> {
    tree: ViewTree,
    manager: RenderManager<D, S>,
}

impl<D: GraphicsDevice, S: FrameScheduler> Display<D, S> {
    pub fn new(tree: ViewTree, device: D, scheduler: S) -> Self {
        Self::from_parts(tree, RenderManager::new(device, scheduler))
    }

    /// Pair a tree with a configured manager and attach what is on screen
    pub fn from_parts(mut tree: ViewTree, mut manager: RenderManager<D, S>) -> Self {
        let stale = tree.take_events().len();
        if stale > 0 {
            tracing::debug!(stale, "discarding events recorded before attach");
        }

        manager.attach_display(&mut tree);
        manager.flush_events(&mut tree);
        tree.sweep_disposed();

        Self { tree, manager }
    }

    pub fn tree(&self) -> &ViewTree {
        &self.tree
    }

    /// Mutable access to the tree; changes reach the manager on drop
    pub fn tree_mut(&mut self) -> TreeMut<'_, D, S> {
        TreeMut { display: self }
    }

    pub fn manager(&self) -> &RenderManager<D, S> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut RenderManager<D, S> {
        &mut self.manager
    }

    pub fn device(&self) -> &D {
        self.manager.device()
    }

    pub fn device_mut(&mut self) -> &mut D {
        self.manager.device_mut()
    }

    pub fn scheduler(&self) -> &S {
        self.manager.scheduler()
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        self.manager.scheduler_mut()
    }

    pub fn lifecycle_events(&mut self) -> Subscriptions<'_, LifecycleEvent> {
        self.manager.lifecycle_events()
    }

    pub fn display_rect_events(&mut self) -> Subscriptions<'_, DisplayRectChange> {
        self.manager.display_rect_events()
    }

    pub fn render(&mut self, view: ViewId) {
        self.flush();
        self.manager.render(&self.tree, view);
    }

    pub fn render_now(&mut self, view: ViewId) {
        self.flush();
        self.manager.render_now(&mut self.tree, view);
        self.tree.sweep_disposed();
    }

    pub fn layout(&mut self, view: ViewId) {
        self.flush();
        self.manager.layout(view);
    }

    pub fn layout_now(&mut self, view: ViewId) {
        self.flush();
        self.manager.layout_now(&mut self.tree, view);
        self.tree.sweep_disposed();
    }

    pub fn display_rect(&self, view: ViewId) -> Rect {
        self.manager.display_rect(&self.tree, view)
    }

    /// Frame callback, called by the host when a requested frame arrives
    pub fn on_frame(&mut self) {
        self.manager.on_frame(&mut self.tree);
        self.tree.sweep_disposed();
    }

    /// Hand queued tree events to the manager
    pub fn flush(&mut self) {
        self.manager.flush_events(&mut self.tree);
        self.tree.sweep_disposed();
    }
}

impl<D: GraphicsDevice, S: FrameScheduler> std::fmt::Debug for Display<D, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Display")
            .field("tree", &self.tree)
            .field("manager", &self.manager)
            .finish()
    }
}

/// Mutable tree access that flushes into the render manager when dropped
pub struct TreeMut<'a, D: GraphicsDevice, S: FrameScheduler> {
    display: &'a mut Display<D, S>,
}

impl<D: GraphicsDevice, S: FrameScheduler> Deref for TreeMut<'_, D, S> {
    type Target = ViewTree;

    fn deref(&self) -> &ViewTree {
        &self.display.tree
    }
}

impl<D: GraphicsDevice, S: FrameScheduler> DerefMut for TreeMut<'_, D, S> {
    fn deref_mut(&mut self) -> &mut ViewTree {
        &mut self.display.tree
    }
}

impl<D: GraphicsDevice, S: FrameScheduler> Drop for TreeMut<'_, D, S> {
    fn drop(&mut self) {
        self.display.flush();
    }
}
