//! Lifecycle collaborators
//!
//! Themes and accessibility are passive observers of the render manager:
//! they learn when views join or leave the display, but never take part in
//! scheduling decisions.

use trellis_core::{Rect, ViewId, ViewTree};

/// Applies visual themes to views as they are attached
pub trait ThemeManager {
    /// Style a view that just joined the display
    fn update(&mut self, tree: &mut ViewTree, view: ViewId);
}

/// Keeps accessibility metadata in step with the display
pub trait AccessibilityManager {
    fn view_added(&mut self, tree: &ViewTree, view: ViewId);

    fn view_removed(&mut self, view: ViewId);
}

/// A view joined or left the display
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    AddedToDisplay(ViewId),
    RemovedFromDisplay(ViewId),
}

impl LifecycleEvent {
    pub fn view(&self) -> ViewId {
        match self {
            LifecycleEvent::AddedToDisplay(view) | LifecycleEvent::RemovedFromDisplay(view) => *view,
        }
    }
}

/// Visible clip rect of a monitoring view changed
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayRectChange {
    pub view: ViewId,
    pub old: Rect,
    pub new: Rect,
}
