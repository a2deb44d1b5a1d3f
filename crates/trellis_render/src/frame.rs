//! Frame scheduling
//!
//! The render manager batches all layout and paint work into a single frame
//! callback. A [`FrameScheduler`] is the host's "before the next repaint"
//! primitive: the manager asks it for a frame and the host calls
//! [`Display::on_frame`](crate::Display::on_frame) when that frame arrives.
//!
//! ```text
//!   handlers ──schedule_paint──▶ FrameScheduler::request_frame() ──▶ FrameTask
//!                                                                      │
//!   host frame ──▶ Display::on_frame ──▶ drain layout/paint ──▶ task.complete()
//! ```
//!
//! At most one [`FrameTask`] is in flight; a new one is only requested once
//! the previous one completed or was cancelled.

use std::cell::Cell;
use std::rc::Rc;

/// Lifecycle of a requested frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameTaskState {
    Pending,
    Completed,
    Cancelled,
}

/// Handle to a requested frame, shared between the scheduler and the manager
#[derive(Clone, Debug)]
pub struct FrameTask {
    state: Rc<Cell<FrameTaskState>>,
}

impl Default for FrameTask {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTask {
    pub fn new() -> Self {
        Self {
            state: Rc::new(Cell::new(FrameTaskState::Pending)),
        }
    }

    pub fn state(&self) -> FrameTaskState {
        self.state.get()
    }

    pub fn completed(&self) -> bool {
        self.state.get() == FrameTaskState::Completed
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.get() == FrameTaskState::Cancelled
    }

    pub fn is_pending(&self) -> bool {
        self.state.get() == FrameTaskState::Pending
    }

    /// Cancel a pending frame. Completed frames stay completed.
    pub fn cancel(&self) {
        if self.is_pending() {
            self.state.set(FrameTaskState::Cancelled);
        }
    }

    pub fn complete(&self) {
        self.state.set(FrameTaskState::Completed);
    }
}

/// Host primitive that runs a callback before the next repaint
pub trait FrameScheduler {
    /// Request one frame callback
    fn request_frame(&mut self) -> FrameTask;
}
