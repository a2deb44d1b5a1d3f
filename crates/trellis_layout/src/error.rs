//! Layout error types

use thiserror::Error;
use trellis_core::ViewId;

/// Errors reported by the constraint solver
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("constraint has already been added")]
    DuplicateConstraint,

    #[error("required constraint cannot be satisfied")]
    UnsatisfiableConstraint,

    #[error("constraint is not part of the solver")]
    UnknownConstraint,

    #[error("variable is already an edit variable")]
    DuplicateEditVariable,

    #[error("variable is not an edit variable")]
    UnknownEditVariable,

    #[error("edit variables cannot have required strength")]
    BadRequiredStrength,

    #[error("internal solver error: {0}")]
    Internal(&'static str),
}

/// Errors reported by the constraint layout
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error("constraint block not found")]
    BlockNotFound,

    #[error("a constraint block needs at least one view")]
    NoViews,

    #[error("view {0:?} not found")]
    ViewNotFound(ViewId),
}

pub type Result<T> = std::result::Result<T, ConstraintError>;
