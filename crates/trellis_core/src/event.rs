//! Change notifications recorded by the view tree
//!
//! Every effective mutation of a [`ViewTree`](crate::tree::ViewTree) appends
//! one [`ViewEvent`] to the tree's queue. The render manager drains the queue
//! and turns events into scheduled layout and paint work. Setters that don't
//! change a value record nothing.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::geometry::{AffineTransform, Camera, Rect, Size};
use crate::view::{SizePreferences, ViewId};

/// Removed, added and moved children of one container, keyed by index
///
/// `removed` uses indices of the old list, `added` indices of the new list,
/// and `moved` maps a new index to the old index of a view present in both.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChildrenDiff {
    pub removed: BTreeMap<usize, ViewId>,
    pub added: BTreeMap<usize, ViewId>,
    pub moved: BTreeMap<usize, (usize, ViewId)>,
}

impl ChildrenDiff {
    /// Diff two child lists. Neither list may contain duplicates.
    pub fn between(old: &[ViewId], new: &[ViewId]) -> Self {
        let old_index: FxHashMap<ViewId, usize> =
            old.iter().enumerate().map(|(i, v)| (*v, i)).collect();
        let new_index: FxHashMap<ViewId, usize> =
            new.iter().enumerate().map(|(i, v)| (*v, i)).collect();

        let mut diff = ChildrenDiff::default();

        for (index, view) in old.iter().enumerate() {
            if !new_index.contains_key(view) {
                diff.removed.insert(index, *view);
            }
        }

        for (index, view) in new.iter().enumerate() {
            match old_index.get(view) {
                None => {
                    diff.added.insert(index, *view);
                }
                Some(&from) if from != index => {
                    diff.moved.insert(index, (from, *view));
                }
                Some(_) => {}
            }
        }

        diff
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.moved.is_empty()
    }
}

/// A recorded change to the view tree or the display root
#[derive(Clone, Debug, PartialEq)]
pub enum ViewEvent {
    /// Children of a view, or of the display root when `parent` is `None`
    ChildrenChanged {
        parent: Option<ViewId>,
        diff: ChildrenDiff,
    },
    BoundsChanged {
        view: ViewId,
        old: Rect,
        new: Rect,
    },
    VisibilityChanged {
        view: ViewId,
        old: bool,
        new: bool,
    },
    OpacityChanged {
        view: ViewId,
        old: f32,
        new: f32,
    },
    ZOrderChanged {
        view: ViewId,
        old: i32,
        new: i32,
    },
    TransformChanged {
        view: ViewId,
        old: AffineTransform,
        new: AffineTransform,
    },
    CameraChanged {
        view: ViewId,
        old: Camera,
        new: Camera,
    },
    SizePreferencesChanged {
        view: ViewId,
        old: SizePreferences,
        new: SizePreferences,
    },
    DisplayRectHandlingChanged {
        view: ViewId,
        old: bool,
        new: bool,
    },
    /// Local content direction of a view changed
    ContentDirectionChanged(ViewId),
    /// `mirror_when_right_left` of a view changed
    MirroringChanged(ViewId),
    /// The view asked to be repainted
    RenderRequested(ViewId),
    /// The view asked to be laid out again
    LayoutRequested(ViewId),
    /// The subtree rooted here was destroyed
    Disposed(ViewId),
    DisplaySizeChanged {
        old: Size,
        new: Size,
    },
    DisplayContentDirectionChanged,
    DisplayMirroringChanged,
    /// The display root's layout changed or asked to run again
    DisplayLayoutRequested,
}

impl ViewEvent {
    /// The view this event is about, if any
    pub fn view(&self) -> Option<ViewId> {
        match self {
            ViewEvent::ChildrenChanged { parent, .. } => *parent,
            ViewEvent::BoundsChanged { view, .. }
            | ViewEvent::VisibilityChanged { view, .. }
            | ViewEvent::OpacityChanged { view, .. }
            | ViewEvent::ZOrderChanged { view, .. }
            | ViewEvent::TransformChanged { view, .. }
            | ViewEvent::CameraChanged { view, .. }
            | ViewEvent::SizePreferencesChanged { view, .. }
            | ViewEvent::DisplayRectHandlingChanged { view, .. } => Some(*view),
            ViewEvent::ContentDirectionChanged(view)
            | ViewEvent::MirroringChanged(view)
            | ViewEvent::RenderRequested(view)
            | ViewEvent::LayoutRequested(view)
            | ViewEvent::Disposed(view) => Some(*view),
            ViewEvent::DisplaySizeChanged { .. }
            | ViewEvent::DisplayContentDirectionChanged
            | ViewEvent::DisplayMirroringChanged
            | ViewEvent::DisplayLayoutRequested => None,
        }
    }
}
