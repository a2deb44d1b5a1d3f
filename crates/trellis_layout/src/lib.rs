//! Trellis Layout
//!
//! Constraint-based layout for Trellis views:
//!
//! - **Expressions**: linear expressions over solver variables, built with
//!   ordinary arithmetic
//! - **Solver**: an incremental Cassowary solver with strengths and edit
//!   variables
//! - **Constraint Layout**: a [`Layout`](trellis_core::Layout) that positions
//!   children from blocks of constraints over their edges
//!
//! # Example
//!
//! ```rust
//! use trellis_layout::{Expression, Solver, Strength, Variable};
//!
//! let mut solver = Solver::new();
//! let width = Variable::new();
//! let half = Variable::new();
//!
//! solver.add_constraint((half * 2.0).eq(width)).unwrap();
//! solver.add_edit_variable(width, Strength::STRONG).unwrap();
//! solver.suggest_value(width, 300.0).unwrap();
//!
//! let value = solver.value_of(half).unwrap();
//! assert!((value - 150.0).abs() < 1e-9);
//! # let _ = Expression::default();
//! ```

pub mod constraint_layout;
pub mod error;
pub mod expression;
pub mod solver;

pub use constraint_layout::{
    constrain_within, Bounds, ConstraintBlockId, ConstraintDslContext, ConstraintLayout,
    ConstraintLayoutConfig,
};
pub use error::{ConstraintError, Result, SolverError};
pub use expression::{Constraint, Expression, Relation, Strength, Term, Variable};
pub use solver::Solver;
