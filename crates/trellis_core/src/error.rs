//! View tree error types

use thiserror::Error;

use crate::view::ViewId;

/// Structural errors raised by [`ViewTree`](crate::tree::ViewTree) mutations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The id does not name a live view
    #[error("view {0:?} does not exist")]
    ViewNotFound(ViewId),

    /// The view has been disposed and can no longer be attached
    #[error("view {0:?} has been disposed")]
    Disposed(ViewId),

    /// Adding the child would make a view its own ancestor
    #[error("adding {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: ViewId, child: ViewId },

    /// The same view appears twice in a child list
    #[error("view {0:?} appears more than once in the child list")]
    DuplicateChild(ViewId),

    /// Insert or move index past the end of the child list
    #[error("index {index} out of range for {len} children")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Result type for view tree operations
pub type Result<T> = std::result::Result<T, TreeError>;
