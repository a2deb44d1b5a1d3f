//! Trellis Core
//!
//! Foundational types for the Trellis retained-mode UI toolkit:
//!
//! - **Geometry**: points, sizes, rects, insets, affine transforms, cameras
//! - **View Tree**: slotmap arena of views plus the display root
//! - **Tree Events**: every effective mutation is recorded for the scheduler
//! - **Layout Contract**: the `Layout` trait and its restricted container view
//! - **Behaviors**: pluggable paint/role strategies attached to views
//! - **Observers**: typed subscribe/unsubscribe lists
//!
//! # Example
//!
//! ```rust
//! use trellis_core::{Rect, Size, ViewEvent, ViewTree};
//!
//! let mut tree = ViewTree::with_display_size(Size::new(800.0, 600.0));
//!
//! let panel = tree.create_named("panel");
//! let button = tree.create_named("button");
//!
//! tree.add_child(panel, button).unwrap();
//! tree.display_add(panel).unwrap();
//! tree.set_bounds(button, Rect::new(10.0, 10.0, 80.0, 24.0));
//!
//! assert!(tree.is_displayed(button));
//! assert!(matches!(tree.pop_event(), Some(ViewEvent::ChildrenChanged { .. })));
//! ```

pub mod behavior;
pub mod canvas;
pub mod error;
pub mod event;
pub mod geometry;
pub mod layout;
pub mod observers;
pub mod tree;
pub mod view;

pub use behavior::{Behavior, FillBehavior, Role};
pub use canvas::Canvas;
pub use error::{Result, TreeError};
pub use event::{ChildrenDiff, ViewEvent};
pub use geometry::{AffineTransform, Camera, Color, ContentDirection, Insets, Point, Rect, Size};
pub use layout::{Layout, LayoutContainer};
pub use observers::{Observers, SubscriptionId, Subscriptions};
pub use tree::ViewTree;
pub use view::{Children, SizePreferences, ViewId, ViewNode};
