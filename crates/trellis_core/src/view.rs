//! View nodes
//!
//! A view is a plain record stored in the [`ViewTree`](crate::tree::ViewTree)
//! arena. The parent link is an id used for upward queries only; a parent
//! owns its ordered child list. Every mutation goes through the tree so that
//! observers see a matching [`ViewEvent`](crate::event::ViewEvent).

use slotmap::{new_key_type, Key};
use smallvec::SmallVec;

use crate::behavior::Behavior;
use crate::geometry::{AffineTransform, Camera, ContentDirection, Insets, Point, Rect, Size};
use crate::layout::Layout;

new_key_type! {
    pub struct ViewId;
}

impl ViewId {
    /// Convert to a raw u64 representation
    pub fn to_raw(self) -> u64 {
        self.data().as_ffi()
    }
}

/// Child id storage; most views have only a handful of children
pub type Children = SmallVec<[ViewId; 4]>;

/// Minimum and ideal sizes a layout may consult
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SizePreferences {
    pub minimum: Size,
    pub ideal: Option<Size>,
}

impl SizePreferences {
    pub const fn new(minimum: Size, ideal: Option<Size>) -> Self {
        Self { minimum, ideal }
    }
}

/// A node of the retained view tree
pub struct ViewNode {
    pub(crate) name: Option<String>,
    pub(crate) bounds: Rect,
    pub(crate) size_preferences: SizePreferences,
    pub(crate) insets: Insets,
    pub(crate) visible: bool,
    pub(crate) enabled: bool,
    pub(crate) z_order: i32,
    pub(crate) opacity: f32,
    pub(crate) transform: AffineTransform,
    pub(crate) camera: Camera,
    pub(crate) parent: Option<ViewId>,
    pub(crate) children: Children,
    /// Held directly by the display root
    pub(crate) top_level: bool,
    pub(crate) monitors_display_rect: bool,
    pub(crate) clip_canvas_to_bounds: bool,
    pub(crate) mirror_when_right_left: bool,
    pub(crate) content_direction: Option<ContentDirection>,
    pub(crate) layout: Option<Box<dyn Layout>>,
    pub(crate) behavior: Option<Box<dyn Behavior>>,
    pub(crate) disposed: bool,
}

impl Default for ViewNode {
    fn default() -> Self {
        Self {
            name: None,
            bounds: Rect::EMPTY,
            size_preferences: SizePreferences::default(),
            insets: Insets::NONE,
            visible: true,
            enabled: true,
            z_order: 0,
            opacity: 1.0,
            transform: AffineTransform::IDENTITY,
            camera: Camera::default(),
            parent: None,
            children: Children::new(),
            top_level: false,
            monitors_display_rect: false,
            clip_canvas_to_bounds: true,
            mirror_when_right_left: true,
            content_direction: None,
            layout: None,
            behavior: None,
            disposed: false,
        }
    }
}

impl ViewNode {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Bounds in the parent's coordinate space
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn position(&self) -> Point {
        self.bounds.origin
    }

    pub fn size(&self) -> Size {
        self.bounds.size
    }

    pub fn width(&self) -> f64 {
        self.bounds.width()
    }

    pub fn height(&self) -> f64 {
        self.bounds.height()
    }

    pub fn size_preferences(&self) -> SizePreferences {
        self.size_preferences
    }

    pub fn insets(&self) -> Insets {
        self.insets
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn z_order(&self) -> i32 {
        self.z_order
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn transform(&self) -> AffineTransform {
        self.transform
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn parent(&self) -> Option<ViewId> {
        self.parent
    }

    pub fn children(&self) -> &[ViewId] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// True when this view sits directly in the display root
    pub fn is_top_level(&self) -> bool {
        self.top_level
    }

    pub fn monitors_display_rect(&self) -> bool {
        self.monitors_display_rect
    }

    pub fn clip_canvas_to_bounds(&self) -> bool {
        self.clip_canvas_to_bounds
    }

    pub fn mirror_when_right_left(&self) -> bool {
        self.mirror_when_right_left
    }

    /// Direction set on this view itself, if any
    pub fn local_content_direction(&self) -> Option<ContentDirection> {
        self.content_direction
    }

    pub fn has_layout(&self) -> bool {
        self.layout.is_some()
    }

    pub fn layout(&self) -> Option<&dyn Layout> {
        self.layout.as_deref()
    }

    pub fn behavior(&self) -> Option<&dyn Behavior> {
        self.behavior.as_deref()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl std::fmt::Debug for ViewNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewNode")
            .field("name", &self.name)
            .field("bounds", &self.bounds)
            .field("visible", &self.visible)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("has_layout", &self.layout.is_some())
            .field("has_behavior", &self.behavior.is_some())
            .finish_non_exhaustive()
    }
}
