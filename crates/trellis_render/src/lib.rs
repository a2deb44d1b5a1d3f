//! Trellis Render
//!
//! Layout and paint scheduling for a Trellis display:
//!
//! - **Render Manager**: turns view tree events into batched layout and paint
//!   work, drained once per frame
//! - **Display**: pairs a [`ViewTree`](trellis_core::ViewTree) with its
//!   manager and flushes tree changes when a mutation guard is dropped
//! - **Frame Scheduling**: the host hook that runs the manager before the
//!   next repaint
//! - **Display Rects**: visible clip rects of views that asked to be told
//!   about them
//! - **Graphics Device**: the surface contract the manager paints through
//!
//! # Example
//!
//! With the `testing` feature:
//!
//! ```ignore
//! use trellis_core::{Color, FillBehavior, Rect, Size, ViewTree};
//! use trellis_render::testing::{ManualFrameScheduler, RecordingDevice};
//! use trellis_render::Display;
//!
//! let tree = ViewTree::with_display_size(Size::new(800.0, 600.0));
//! let mut display = Display::new(tree, RecordingDevice::default(), ManualFrameScheduler::default());
//!
//! let panel = {
//!     let mut tree = display.tree_mut();
//!     let panel = tree.create_named("panel");
//!     tree.set_bounds(panel, Rect::new(0.0, 0.0, 200.0, 100.0));
//!     tree.set_behavior(panel, Some(Box::new(FillBehavior::new(Color::WHITE))));
//!     tree.display_add(panel).unwrap();
//!     panel
//! };
//!
//! display.run_jobs();
//! assert_eq!(display.device().render_count(panel), 1);
//! ```

pub mod device;
pub mod display;
pub mod display_rect;
pub mod frame;
pub mod hooks;
pub mod manager;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use device::{GraphicsDevice, GraphicsSurface};
pub use display::{Display, TreeMut};
pub use display_rect::DisplayRectTree;
pub use frame::{FrameScheduler, FrameTask, FrameTaskState};
pub use hooks::{AccessibilityManager, DisplayRectChange, LifecycleEvent, ThemeManager};
pub use manager::{RenderConfig, RenderManager};
