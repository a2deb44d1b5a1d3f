//! Constraint-based layout
//!
//! [`ConstraintLayout`] positions children from linear constraints over
//! their edges, solved with the in-crate Cassowary [`Solver`]. Constraints
//! are registered in blocks: each call to [`ConstraintLayout::constrain`]
//! names a set of views and builds constraints over their [`Bounds`] and
//! the parent's.
//!
//! ```rust
//! use trellis_core::{Rect, Size, ViewTree};
//! use trellis_layout::ConstraintLayout;
//!
//! let mut tree = ViewTree::with_display_size(Size::new(400.0, 300.0));
//! let container = tree.create();
//! let label = tree.create();
//! tree.add_child(container, label).unwrap();
//! tree.set_bounds(container, Rect::new(0.0, 0.0, 200.0, 100.0));
//!
//! let layout = ConstraintLayout::new();
//! layout
//!     .constrain(&[label], |ctx, views| {
//!         let parent = ctx.parent();
//!         ctx.add(views[0].left().eq(10.0));
//!         ctx.add(views[0].right().eq(parent.right() - 10.0));
//!     })
//!     .unwrap();
//!
//! tree.set_layout(container, Some(Box::new(layout.clone())));
//! tree.layout_view(container);
//!
//! let width = tree.bounds(label).map_or(0.0, |b| b.width());
//! assert!((width - 180.0).abs() < 1e-9);
//! ```
//!
//! # Solving
//!
//! Every constrained view contributes four weak edit variables (left, top,
//! width, height) that are suggested from its current bounds before each
//! solve, so anything the constraints leave open keeps its current value.
//! The parent's width and height are edit variables just below required
//! strength. Solved bounds are written back only to direct children of the
//! container being laid out.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use trellis_core::{Insets, Layout, LayoutContainer, Rect, Size, SizePreferences, ViewId, ViewTree};

use crate::error::{ConstraintError, Result, SolverError};
use crate::expression::{Constraint, Expression, Strength, Variable};
use crate::solver::Solver;

new_key_type! {
    /// Handle of a block registered with [`ConstraintLayout::constrain`]
    pub struct ConstraintBlockId;
}

/// Solver strengths used by a [`ConstraintLayout`]
#[derive(Clone, Copy, Debug)]
pub struct ConstraintLayoutConfig {
    /// Strength of the parent's width and height
    pub parent_strength: Strength,
    /// Strength pulling each view edge towards its current value
    pub view_strength: Strength,
}

impl Default for ConstraintLayoutConfig {
    fn default() -> Self {
        Self {
            parent_strength: Strength::create(999.0, 1000.0, 1000.0, 1.0),
            view_strength: Strength::WEAK,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DSL
// ─────────────────────────────────────────────────────────────────────────────

/// Edges of a view (or of the parent) as solver expressions
#[derive(Clone, Debug)]
pub struct Bounds {
    left: Expression,
    top: Expression,
    width: Expression,
    height: Expression,
}

impl Bounds {
    fn of(vars: &ViewVars) -> Self {
        Self {
            left: vars.left.into(),
            top: vars.top.into(),
            width: vars.width.into(),
            height: vars.height.into(),
        }
    }

    fn fixed(rect: Rect) -> Self {
        Self {
            left: rect.x().into(),
            top: rect.y().into(),
            width: rect.width().into(),
            height: rect.height().into(),
        }
    }

    pub fn left(&self) -> Expression {
        self.left.clone()
    }

    pub fn top(&self) -> Expression {
        self.top.clone()
    }

    pub fn width(&self) -> Expression {
        self.width.clone()
    }

    pub fn height(&self) -> Expression {
        self.height.clone()
    }

    pub fn right(&self) -> Expression {
        self.left() + self.width()
    }

    pub fn bottom(&self) -> Expression {
        self.top() + self.height()
    }

    pub fn center_x(&self) -> Expression {
        self.left() + self.width() / 2.0
    }

    pub fn center_y(&self) -> Expression {
        self.top() + self.height() / 2.0
    }

    /// Pin all four edges to `other`'s, moved inwards by `insets`
    pub fn edges_eq(&self, other: &Bounds, insets: Insets) -> [Constraint; 4] {
        [
            self.left().eq(other.left() + insets.left),
            self.top().eq(other.top() + insets.top),
            self.right().eq(other.right() - insets.right),
            self.bottom().eq(other.bottom() - insets.bottom),
        ]
    }

    pub fn center_eq(&self, other: &Bounds) -> [Constraint; 2] {
        [
            self.center_x().eq(other.center_x()),
            self.center_y().eq(other.center_y()),
        ]
    }

    pub fn size_eq(&self, size: Size) -> [Constraint; 2] {
        [self.width().eq(size.width), self.height().eq(size.height)]
    }
}

/// Collects the constraints of one block
pub struct ConstraintDslContext {
    parent: Bounds,
    constraints: Vec<Constraint>,
}

impl ConstraintDslContext {
    fn new(parent: Bounds) -> Self {
        Self {
            parent,
            constraints: Vec::new(),
        }
    }

    /// Bounds of the container, whose left and top are zero, or the
    /// fixed rectangle given to [`constrain_within`]
    pub fn parent(&self) -> Bounds {
        self.parent.clone()
    }

    pub fn add(&mut self, constraint: Constraint) -> &mut Self {
        self.constraints.push(constraint);
        self
    }

    pub fn add_all(&mut self, constraints: impl IntoIterator<Item = Constraint>) -> &mut Self {
        self.constraints.extend(constraints);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Layout
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
struct ViewVars {
    left: Variable,
    top: Variable,
    width: Variable,
    height: Variable,
}

impl ViewVars {
    fn new() -> Self {
        Self {
            left: Variable::new(),
            top: Variable::new(),
            width: Variable::new(),
            height: Variable::new(),
        }
    }

    fn all(&self) -> [Variable; 4] {
        [self.left, self.top, self.width, self.height]
    }

    fn read(&self, solver: &Solver) -> Rect {
        let value = |v| solver.value_of(v).unwrap_or(0.0);
        Rect::new(
            value(self.left),
            value(self.top),
            value(self.width),
            value(self.height),
        )
    }

    fn suggest(&self, solver: &mut Solver, bounds: Rect) -> std::result::Result<(), SolverError> {
        solver.suggest_value(self.left, bounds.x())?;
        solver.suggest_value(self.top, bounds.y())?;
        solver.suggest_value(self.width, bounds.width())?;
        solver.suggest_value(self.height, bounds.height())
    }
}

struct ViewEntry {
    vars: ViewVars,
    /// Number of blocks naming this view
    refs: usize,
    registered: bool,
    /// Bounds from the last solve
    solved: Option<Rect>,
}

struct Block {
    views: SmallVec<[ViewId; 4]>,
    constraints: Vec<Constraint>,
}

struct Inner {
    config: ConstraintLayoutConfig,
    solver: Solver,
    parent_width: Variable,
    parent_height: Variable,
    parent_registered: bool,
    views: IndexMap<ViewId, ViewEntry>,
    blocks: SlotMap<ConstraintBlockId, Block>,
}

/// Layout driven by linear constraints
///
/// Cloning yields another handle to the same layout, so one clone can be
/// installed on a container while another keeps adding and removing
/// constraint blocks.
#[derive(Clone)]
pub struct ConstraintLayout {
    inner: Rc<RefCell<Inner>>,
}

impl Default for ConstraintLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintLayout {
    pub fn new() -> Self {
        Self::with_config(ConstraintLayoutConfig::default())
    }

    pub fn with_config(config: ConstraintLayoutConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                config,
                solver: Solver::new(),
                parent_width: Variable::new(),
                parent_height: Variable::new(),
                parent_registered: false,
                views: IndexMap::new(),
                blocks: SlotMap::with_key(),
            })),
        }
    }

    /// Register a block of constraints over `views`
    ///
    /// `build` receives one [`Bounds`] per view, in order. If any required
    /// constraint can't be satisfied the whole block is rejected and the
    /// layout is left as it was.
    pub fn constrain<F>(&self, views: &[ViewId], build: F) -> Result<ConstraintBlockId>
    where
        F: FnOnce(&mut ConstraintDslContext, &[Bounds]),
    {
        if views.is_empty() {
            return Err(ConstraintError::NoViews);
        }

        let mut inner = self.inner.borrow_mut();
        let bounds: Vec<Bounds> = views.iter().map(|id| inner.retain(*id)).collect();

        let mut ctx = ConstraintDslContext::new(inner.parent_bounds());
        build(&mut ctx, &bounds);
        let constraints = ctx.constraints;

        match inner.install(&constraints) {
            Ok(()) => {
                let id = inner.blocks.insert(Block {
                    views: views.iter().copied().collect(),
                    constraints,
                });
                tracing::debug!(?id, views = views.len(), "constraint block added");
                Ok(id)
            }
            Err(error) => {
                tracing::warn!(%error, "rejected constraint block");
                for view in views {
                    inner.release(*view);
                }
                inner.rebuild();
                Err(error.into())
            }
        }
    }

    /// Remove a block. Views keep whatever bounds they have.
    pub fn unconstrain(&self, block: ConstraintBlockId) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let block = inner
            .blocks
            .remove(block)
            .ok_or(ConstraintError::BlockNotFound)?;

        for constraint in &block.constraints {
            if let Err(error) = inner.solver.remove_constraint(constraint) {
                tracing::warn!(%error, "failed to remove constraint");
            }
        }
        for view in block.views {
            inner.release(view);
        }
        Ok(())
    }

    pub fn block_count(&self) -> usize {
        self.inner.borrow().blocks.len()
    }

    /// True when at least one block names `view`
    pub fn is_constrained(&self, view: ViewId) -> bool {
        self.inner.borrow().views.contains_key(&view)
    }
}

impl Inner {
    fn parent_bounds(&self) -> Bounds {
        Bounds {
            left: Expression::from_constant(0.0),
            top: Expression::from_constant(0.0),
            width: self.parent_width.into(),
            height: self.parent_height.into(),
        }
    }

    fn retain(&mut self, view: ViewId) -> Bounds {
        let entry = self.views.entry(view).or_insert_with(|| ViewEntry {
            vars: ViewVars::new(),
            refs: 0,
            registered: false,
            solved: None,
        });
        entry.refs += 1;
        Bounds::of(&entry.vars)
    }

    fn release(&mut self, view: ViewId) {
        let Some(entry) = self.views.get_mut(&view) else {
            return;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs > 0 {
            return;
        }

        if let Some(entry) = self.views.shift_remove(&view) {
            if entry.registered {
                for var in entry.vars.all() {
                    if let Err(error) = self.solver.remove_edit_variable(var) {
                        tracing::warn!(%error, ?view, "failed to remove edit variable");
                    }
                }
            }
        }
    }

    /// Register pending edit variables, then add `constraints`
    fn install(&mut self, constraints: &[Constraint]) -> std::result::Result<(), SolverError> {
        if !self.parent_registered {
            let strength = self.config.parent_strength;
            self.solver.add_edit_variable(self.parent_width, strength)?;
            self.solver.add_edit_variable(self.parent_height, strength)?;
            self.parent_registered = true;
        }

        let strength = self.config.view_strength;
        for entry in self.views.values_mut().filter(|e| !e.registered) {
            for var in entry.vars.all() {
                self.solver.add_edit_variable(var, strength)?;
            }
            entry.registered = true;
        }

        for constraint in constraints {
            self.solver.add_constraint(constraint.clone())?;
        }
        Ok(())
    }

    /// Recreate the solver from the registered blocks
    fn rebuild(&mut self) {
        self.solver.reset();
        self.parent_registered = false;
        for entry in self.views.values_mut() {
            entry.registered = false;
        }

        let constraints: Vec<Constraint> = self
            .blocks
            .values()
            .flat_map(|block| block.constraints.iter().cloned())
            .collect();
        if let Err(error) = self.install(&constraints) {
            tracing::error!(%error, "failed to rebuild constraint solver");
        }
    }

    fn solve(&mut self, container: &mut LayoutContainer<'_>) -> std::result::Result<(), SolverError> {
        if !self.parent_registered {
            return Ok(());
        }

        let size = container.size();
        self.solver.suggest_value(self.parent_width, size.width)?;
        self.solver.suggest_value(self.parent_height, size.height)?;

        for (view, entry) in &self.views {
            if let Some(bounds) = container.bounds(*view) {
                entry.vars.suggest(&mut self.solver, bounds)?;
            }
        }

        let mut updates = Vec::new();
        for (view, entry) in self.views.iter_mut() {
            if !container.contains(*view) {
                continue;
            }
            let bounds = entry.vars.read(&self.solver);
            entry.solved = Some(bounds);
            updates.push((*view, bounds));
        }

        for (view, bounds) in updates {
            container.set_bounds(view, bounds);
        }
        Ok(())
    }
}

impl Layout for ConstraintLayout {
    fn layout(&mut self, container: &mut LayoutContainer<'_>) {
        if let Err(error) = self.inner.borrow_mut().solve(container) {
            tracing::warn!(%error, container = ?container.id(), "constraint layout failed");
        }
    }

    fn child_bounds_require_layout(&self, child: ViewId, _old: Rect, new: Rect) -> bool {
        self.inner
            .borrow()
            .views
            .get(&child)
            .is_some_and(|entry| entry.solved != Some(new))
    }

    fn child_size_preferences_require_layout(
        &self,
        _child: ViewId,
        _old: &SizePreferences,
        _new: &SizePreferences,
    ) -> bool {
        false
    }
}

impl std::fmt::Debug for ConstraintLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ConstraintLayout")
            .field("views", &inner.views.len())
            .field("blocks", &inner.blocks.len())
            .field("solver", &inner.solver)
            .finish()
    }
}

/// Position `views` once against a fixed rectangle
///
/// The parent [`Bounds`] handed to `build` are `within`'s edges. Solved
/// bounds are applied straight to the tree; nothing is kept afterwards.
pub fn constrain_within<F>(tree: &mut ViewTree, views: &[ViewId], within: Rect, build: F) -> Result<()>
where
    F: FnOnce(&mut ConstraintDslContext, &[Bounds]),
{
    if views.is_empty() {
        return Err(ConstraintError::NoViews);
    }

    let mut solver = Solver::new();
    let mut vars = Vec::with_capacity(views.len());
    for view in views {
        let current = tree
            .bounds(*view)
            .ok_or(ConstraintError::ViewNotFound(*view))?;
        let view_vars = ViewVars::new();
        for var in view_vars.all() {
            solver.add_edit_variable(var, Strength::WEAK)?;
        }
        view_vars.suggest(&mut solver, current)?;
        vars.push(view_vars);
    }

    let bounds: Vec<Bounds> = vars.iter().map(Bounds::of).collect();
    let mut ctx = ConstraintDslContext::new(Bounds::fixed(within));
    build(&mut ctx, &bounds);
    solver.add_constraints(ctx.constraints)?;

    for (view, view_vars) in views.iter().zip(&vars) {
        tree.set_bounds(*view, view_vars.read(&solver));
    }
    Ok(())
}
