//! Incremental Cassowary solver
//!
//! A dual simplex tableau over linear constraints with strengths. Required
//! constraints must hold; non-required ones are minimised as weighted error
//! terms. Edit variables let a caller repeatedly suggest values and re-solve
//! without rebuilding the tableau.
//!
//! # Architecture
//!
//! ```text
//! add_constraint ──► create_row ──► choose_subject ──► substitute ──► optimize
//!                                         │
//!                                         └─► artificial variable (no subject)
//!
//! suggest_value ──► adjust row constants ──► dual_optimize
//! ```
//!
//! Rows and their cells live in ordered maps so pivoting is deterministic
//! for a given sequence of calls.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::error::SolverError;
use crate::expression::{Constraint, Expression, Relation, Strength, Variable};

const EPSILON: f64 = 1.0e-8;

fn near_zero(value: f64) -> bool {
    value.abs() < EPSILON
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum SymbolKind {
    External,
    Slack,
    Error,
    Dummy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct Symbol {
    id: u64,
    kind: SymbolKind,
}

impl Symbol {
    fn is_pivotable(self) -> bool {
        matches!(self.kind, SymbolKind::Slack | SymbolKind::Error)
    }
}

#[derive(Clone, Debug, Default)]
struct Row {
    cells: BTreeMap<Symbol, f64>,
    constant: f64,
}

impl Row {
    fn new(constant: f64) -> Self {
        Self {
            cells: BTreeMap::new(),
            constant,
        }
    }

    fn add(&mut self, value: f64) -> f64 {
        self.constant += value;
        self.constant
    }

    fn insert_symbol(&mut self, symbol: Symbol, coefficient: f64) {
        let cell = self.cells.entry(symbol).or_insert(0.0);
        *cell += coefficient;
        if near_zero(*cell) {
            self.cells.remove(&symbol);
        }
    }

    fn insert_row(&mut self, other: &Row, coefficient: f64) {
        self.constant += other.constant * coefficient;
        for (symbol, value) in &other.cells {
            self.insert_symbol(*symbol, value * coefficient);
        }
    }

    fn remove(&mut self, symbol: Symbol) {
        self.cells.remove(&symbol);
    }

    fn reverse_sign(&mut self) {
        self.constant = -self.constant;
        for value in self.cells.values_mut() {
            *value = -*value;
        }
    }

    /// Rewrite `0 = row` as `symbol = row'`
    fn solve_for(&mut self, symbol: Symbol) {
        let Some(value) = self.cells.remove(&symbol) else {
            return;
        };
        let coefficient = -1.0 / value;
        self.constant *= coefficient;
        for cell in self.cells.values_mut() {
            *cell *= coefficient;
        }
    }

    /// Rewrite `lhs = row` as `rhs = row'`
    fn solve_for_pair(&mut self, lhs: Symbol, rhs: Symbol) {
        self.insert_symbol(lhs, -1.0);
        self.solve_for(rhs);
    }

    fn coefficient_for(&self, symbol: Symbol) -> f64 {
        self.cells.get(&symbol).copied().unwrap_or(0.0)
    }

    fn substitute(&mut self, symbol: Symbol, row: &Row) {
        if let Some(coefficient) = self.cells.remove(&symbol) {
            self.insert_row(row, coefficient);
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Tag {
    marker: Symbol,
    other: Option<Symbol>,
}

#[derive(Clone, Debug)]
struct EditInfo {
    tag: Tag,
    constraint: Constraint,
    constant: f64,
}

/// Tableau state restored when a constraint is rejected
struct Snapshot {
    rows: BTreeMap<Symbol, Row>,
    vars: IndexMap<Variable, Symbol>,
    infeasible_rows: Vec<Symbol>,
    objective: Row,
}

/// Cassowary constraint solver
#[derive(Default)]
pub struct Solver {
    constraints: FxHashMap<Constraint, Tag>,
    rows: BTreeMap<Symbol, Row>,
    vars: IndexMap<Variable, Symbol>,
    edits: FxHashMap<Variable, EditInfo>,
    infeasible_rows: Vec<Symbol>,
    objective: Row,
    artificial: Option<Row>,
    values: FxHashMap<Variable, f64>,
    next_id: u64,
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Constraints
    // =========================================================================

    /// Add a constraint
    ///
    /// Fails with [`SolverError::UnsatisfiableConstraint`] when a required
    /// constraint conflicts with the required constraints already present.
    ///
    /// A rejected constraint leaves the tableau exactly as it was.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), SolverError> {
        if self.constraints.contains_key(&constraint) {
            return Err(SolverError::DuplicateConstraint);
        }

        let snapshot = Snapshot {
            rows: self.rows.clone(),
            vars: self.vars.clone(),
            infeasible_rows: self.infeasible_rows.clone(),
            objective: self.objective.clone(),
        };
        let result = self.insert_constraint(constraint.clone());
        if let Err(err) = &result {
            tracing::debug!(?err, "constraint rejected, restoring tableau");
            self.constraints.remove(&constraint);
            self.rows = snapshot.rows;
            self.vars = snapshot.vars;
            self.infeasible_rows = snapshot.infeasible_rows;
            self.objective = snapshot.objective;
            self.artificial = None;
        }
        result
    }

    fn insert_constraint(&mut self, constraint: Constraint) -> Result<(), SolverError> {
        let (mut row, tag) = self.create_row(&constraint);
        let mut subject = Self::choose_subject(&row, &tag);

        if subject.is_none() && Self::all_dummies(&row) {
            if !near_zero(row.constant) {
                return Err(SolverError::UnsatisfiableConstraint);
            }
            subject = Some(tag.marker);
        }

        match subject {
            None => {
                if !self.add_with_artificial_variable(&row)? {
                    return Err(SolverError::UnsatisfiableConstraint);
                }
            }
            Some(subject) => {
                row.solve_for(subject);
                self.substitute(subject, &row);
                self.rows.insert(subject, row);
            }
        }

        self.constraints.insert(constraint, tag);
        self.optimize_objective()
    }

    /// Add several constraints, stopping at the first failure
    pub fn add_constraints<I>(&mut self, constraints: I) -> Result<(), SolverError>
    where
        I: IntoIterator<Item = Constraint>,
    {
        constraints
            .into_iter()
            .try_for_each(|c| self.add_constraint(c))
    }

    pub fn remove_constraint(&mut self, constraint: &Constraint) -> Result<(), SolverError> {
        let tag = self
            .constraints
            .remove(constraint)
            .ok_or(SolverError::UnknownConstraint)?;

        self.remove_constraint_effects(constraint, &tag);

        if self.rows.remove(&tag.marker).is_none() {
            let leaving = self
                .marker_leaving_row(tag.marker)
                .ok_or(SolverError::Internal("failed to find leaving row"))?;
            let mut row = self
                .rows
                .remove(&leaving)
                .ok_or(SolverError::Internal("leaving row vanished"))?;
            row.solve_for_pair(leaving, tag.marker);
            self.substitute(tag.marker, &row);
        }

        self.optimize_objective()
    }

    pub fn has_constraint(&self, constraint: &Constraint) -> bool {
        self.constraints.contains_key(constraint)
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    // =========================================================================
    // Edit variables
    // =========================================================================

    /// Make `variable` suggestible at a non-required strength
    pub fn add_edit_variable(
        &mut self,
        variable: Variable,
        strength: Strength,
    ) -> Result<(), SolverError> {
        if self.edits.contains_key(&variable) {
            return Err(SolverError::DuplicateEditVariable);
        }
        let strength = strength.clip();
        if strength.is_required() {
            return Err(SolverError::BadRequiredStrength);
        }

        let constraint = Constraint::new(Expression::from(variable), Relation::Equal, strength);
        self.add_constraint(constraint.clone())?;
        let tag = *self
            .constraints
            .get(&constraint)
            .ok_or(SolverError::Internal("edit constraint missing"))?;

        self.edits.insert(
            variable,
            EditInfo {
                tag,
                constraint,
                constant: 0.0,
            },
        );
        Ok(())
    }

    pub fn remove_edit_variable(&mut self, variable: Variable) -> Result<(), SolverError> {
        let info = self
            .edits
            .remove(&variable)
            .ok_or(SolverError::UnknownEditVariable)?;
        self.remove_constraint(&info.constraint)
    }

    pub fn has_edit_variable(&self, variable: Variable) -> bool {
        self.edits.contains_key(&variable)
    }

    /// Suggest a value for an edit variable and re-solve
    pub fn suggest_value(&mut self, variable: Variable, value: f64) -> Result<(), SolverError> {
        let info = self
            .edits
            .get_mut(&variable)
            .ok_or(SolverError::UnknownEditVariable)?;
        let delta = value - info.constant;
        info.constant = value;
        let Tag { marker, other } = info.tag;

        if let Some(row) = self.rows.get_mut(&marker) {
            if row.add(-delta) < 0.0 {
                self.infeasible_rows.push(marker);
            }
            return self.dual_optimize();
        }

        if let Some(other) = other {
            if let Some(row) = self.rows.get_mut(&other) {
                if row.add(delta) < 0.0 {
                    self.infeasible_rows.push(other);
                }
                return self.dual_optimize();
            }
        }

        for (symbol, row) in self.rows.iter_mut() {
            let coefficient = row.coefficient_for(marker);
            if coefficient != 0.0
                && row.add(delta * coefficient) < 0.0
                && symbol.kind != SymbolKind::External
            {
                self.infeasible_rows.push(*symbol);
            }
        }

        self.dual_optimize()
    }

    // =========================================================================
    // Values
    // =========================================================================

    /// Current value of a variable, `None` if no constraint mentions it
    pub fn value_of(&self, variable: Variable) -> Option<f64> {
        self.vars.get(&variable).map(|symbol| {
            let value = self.rows.get(symbol).map_or(0.0, |row| row.constant);
            if near_zero(value) {
                0.0
            } else {
                value
            }
        })
    }

    /// Variables whose value changed since the previous call
    pub fn fetch_changes(&mut self) -> Vec<(Variable, f64)> {
        let mut changes = Vec::new();
        for variable in self.vars.keys() {
            let value = self.value_of(*variable).unwrap_or(0.0);
            if self.values.get(variable) != Some(&value) {
                changes.push((*variable, value));
            }
        }
        for (variable, value) in &changes {
            self.values.insert(*variable, *value);
        }
        changes
    }

    /// Drop every constraint and variable
    pub fn reset(&mut self) {
        *self = Self {
            next_id: self.next_id,
            ..Self::default()
        };
    }

    // =========================================================================
    // Tableau
    // =========================================================================

    fn new_symbol(&mut self, kind: SymbolKind) -> Symbol {
        self.next_id += 1;
        Symbol {
            id: self.next_id,
            kind,
        }
    }

    fn var_symbol(&mut self, variable: Variable) -> Symbol {
        if let Some(symbol) = self.vars.get(&variable) {
            return *symbol;
        }
        let symbol = self.new_symbol(SymbolKind::External);
        self.vars.insert(variable, symbol);
        symbol
    }

    fn create_row(&mut self, constraint: &Constraint) -> (Row, Tag) {
        let expression = constraint.expression();
        let mut row = Row::new(expression.constant);

        for term in &expression.terms {
            if near_zero(term.coefficient) {
                continue;
            }
            let symbol = self.var_symbol(term.variable);
            match self.rows.get(&symbol) {
                Some(basic) => row.insert_row(basic, term.coefficient),
                None => row.insert_symbol(symbol, term.coefficient),
            }
        }

        let strength = constraint.strength();
        let tag = match constraint.relation() {
            Relation::LessOrEqual | Relation::GreaterOrEqual => {
                let coefficient = if constraint.relation() == Relation::LessOrEqual {
                    1.0
                } else {
                    -1.0
                };
                let slack = self.new_symbol(SymbolKind::Slack);
                row.insert_symbol(slack, coefficient);

                let other = (!strength.is_required()).then(|| {
                    let error = self.new_symbol(SymbolKind::Error);
                    row.insert_symbol(error, -coefficient);
                    self.objective.insert_symbol(error, strength.value());
                    error
                });
                Tag {
                    marker: slack,
                    other,
                }
            }
            Relation::Equal if !strength.is_required() => {
                let plus = self.new_symbol(SymbolKind::Error);
                let minus = self.new_symbol(SymbolKind::Error);
                row.insert_symbol(plus, -1.0);
                row.insert_symbol(minus, 1.0);
                self.objective.insert_symbol(plus, strength.value());
                self.objective.insert_symbol(minus, strength.value());
                Tag {
                    marker: plus,
                    other: Some(minus),
                }
            }
            Relation::Equal => {
                let dummy = self.new_symbol(SymbolKind::Dummy);
                row.insert_symbol(dummy, 1.0);
                Tag {
                    marker: dummy,
                    other: None,
                }
            }
        };

        if row.constant < 0.0 {
            row.reverse_sign();
        }

        (row, tag)
    }

    fn choose_subject(row: &Row, tag: &Tag) -> Option<Symbol> {
        if let Some(symbol) = row
            .cells
            .keys()
            .find(|s| s.kind == SymbolKind::External)
        {
            return Some(*symbol);
        }
        if tag.marker.is_pivotable() && row.coefficient_for(tag.marker) < 0.0 {
            return Some(tag.marker);
        }
        tag.other
            .filter(|other| other.is_pivotable() && row.coefficient_for(*other) < 0.0)
    }

    fn all_dummies(row: &Row) -> bool {
        row.cells.keys().all(|s| s.kind == SymbolKind::Dummy)
    }

    fn add_with_artificial_variable(&mut self, row: &Row) -> Result<bool, SolverError> {
        let art = self.new_symbol(SymbolKind::Slack);
        self.rows.insert(art, row.clone());
        self.artificial = Some(row.clone());

        self.optimize_artificial()?;
        let success = self
            .artificial
            .take()
            .is_some_and(|artificial| near_zero(artificial.constant));

        if let Some(mut art_row) = self.rows.remove(&art) {
            if art_row.cells.is_empty() {
                return Ok(success);
            }
            let Some(entering) = art_row.cells.keys().copied().find(|s| s.is_pivotable()) else {
                return Ok(false);
            };
            art_row.solve_for_pair(art, entering);
            self.substitute(entering, &art_row);
            self.rows.insert(entering, art_row);
        }

        for row in self.rows.values_mut() {
            row.remove(art);
        }
        self.objective.remove(art);
        Ok(success)
    }

    fn substitute(&mut self, symbol: Symbol, row: &Row) {
        for (basic, current) in self.rows.iter_mut() {
            current.substitute(symbol, row);
            if basic.kind != SymbolKind::External && current.constant < 0.0 {
                self.infeasible_rows.push(*basic);
            }
        }
        self.objective.substitute(symbol, row);
        if let Some(artificial) = self.artificial.as_mut() {
            artificial.substitute(symbol, row);
        }
    }

    fn optimize_objective(&mut self) -> Result<(), SolverError> {
        self.optimize(false)
    }

    fn optimize_artificial(&mut self) -> Result<(), SolverError> {
        self.optimize(true)
    }

    fn optimize(&mut self, artificial: bool) -> Result<(), SolverError> {
        loop {
            let objective = if artificial {
                self.artificial.as_ref()
            } else {
                Some(&self.objective)
            };
            let Some(entering) = objective.and_then(Self::entering_symbol) else {
                return Ok(());
            };

            let leaving = self
                .leaving_row(entering)
                .ok_or(SolverError::Internal("objective is unbounded"))?;
            let mut row = self
                .rows
                .remove(&leaving)
                .ok_or(SolverError::Internal("leaving row vanished"))?;
            row.solve_for_pair(leaving, entering);
            self.substitute(entering, &row);
            self.rows.insert(entering, row);
        }
    }

    fn dual_optimize(&mut self) -> Result<(), SolverError> {
        while let Some(leaving) = self.infeasible_rows.pop() {
            let infeasible = self
                .rows
                .get(&leaving)
                .is_some_and(|row| row.constant < 0.0);
            if !infeasible {
                continue;
            }
            let Some(mut row) = self.rows.remove(&leaving) else {
                continue;
            };
            let entering = self
                .dual_entering_symbol(&row)
                .ok_or(SolverError::Internal("dual optimize failed"))?;
            row.solve_for_pair(leaving, entering);
            self.substitute(entering, &row);
            self.rows.insert(entering, row);
        }
        Ok(())
    }

    fn entering_symbol(objective: &Row) -> Option<Symbol> {
        objective
            .cells
            .iter()
            .find(|(s, c)| s.kind != SymbolKind::Dummy && **c < 0.0)
            .map(|(s, _)| *s)
    }

    fn dual_entering_symbol(&self, row: &Row) -> Option<Symbol> {
        let mut entering = None;
        let mut ratio = f64::MAX;
        for (symbol, coefficient) in &row.cells {
            if *coefficient > 0.0 && symbol.kind != SymbolKind::Dummy {
                let r = self.objective.coefficient_for(*symbol) / coefficient;
                if r < ratio {
                    ratio = r;
                    entering = Some(*symbol);
                }
            }
        }
        entering
    }

    fn leaving_row(&self, entering: Symbol) -> Option<Symbol> {
        let mut ratio = f64::MAX;
        let mut found = None;
        for (symbol, row) in &self.rows {
            if symbol.kind == SymbolKind::External {
                continue;
            }
            let coefficient = row.coefficient_for(entering);
            if coefficient < 0.0 {
                let r = -row.constant / coefficient;
                if r < ratio {
                    ratio = r;
                    found = Some(*symbol);
                }
            }
        }
        found
    }

    /// Row to pivot out when removing a constraint whose marker is not basic
    fn marker_leaving_row(&self, marker: Symbol) -> Option<Symbol> {
        let mut first = (f64::MAX, None);
        let mut second = (f64::MAX, None);
        let mut third = None;

        for (symbol, row) in &self.rows {
            let coefficient = row.coefficient_for(marker);
            if coefficient == 0.0 {
                continue;
            }
            if symbol.kind == SymbolKind::External {
                third = Some(*symbol);
            } else if coefficient < 0.0 {
                let r = -row.constant / coefficient;
                if r < first.0 {
                    first = (r, Some(*symbol));
                }
            } else {
                let r = row.constant / coefficient;
                if r < second.0 {
                    second = (r, Some(*symbol));
                }
            }
        }

        first.1.or(second.1).or(third)
    }

    fn remove_constraint_effects(&mut self, constraint: &Constraint, tag: &Tag) {
        let strength = constraint.strength().value();
        if tag.marker.kind == SymbolKind::Error {
            self.remove_marker_effects(tag.marker, strength);
        }
        if let Some(other) = tag.other.filter(|o| o.kind == SymbolKind::Error) {
            self.remove_marker_effects(other, strength);
        }
    }

    fn remove_marker_effects(&mut self, marker: Symbol, strength: f64) {
        match self.rows.get(&marker) {
            Some(row) => self.objective.insert_row(row, -strength),
            None => self.objective.insert_symbol(marker, -strength),
        }
    }
}

impl std::fmt::Debug for Solver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solver")
            .field("constraints", &self.constraints.len())
            .field("rows", &self.rows.len())
            .field("variables", &self.vars.len())
            .field("edits", &self.edits.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("variable should be known");
        assert!(
            (actual - expected).abs() < 1.0e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_required_equalities() {
        let mut solver = Solver::new();
        let x = Variable::new();
        let y = Variable::new();

        solver.add_constraint(Expression::from(x).eq(20.0)).unwrap();
        solver.add_constraint((x + y).eq(50.0)).unwrap();

        assert_close(solver.value_of(x), 20.0);
        assert_close(solver.value_of(y), 30.0);
    }

    #[test]
    fn test_strength_decides_conflicts() {
        let mut solver = Solver::new();
        let x = Variable::new();

        solver
            .add_constraint(Expression::from(x).eq(10.0).with_strength(Strength::WEAK))
            .unwrap();
        solver
            .add_constraint(Expression::from(x).eq(40.0).with_strength(Strength::STRONG))
            .unwrap();

        assert_close(solver.value_of(x), 40.0);
    }

    #[test]
    fn test_inequalities_bound_weak_preference() {
        let mut solver = Solver::new();
        let x = Variable::new();

        solver.add_constraint(Expression::from(x).le(100.0)).unwrap();
        solver.add_constraint(Expression::from(x).ge(10.0)).unwrap();
        solver
            .add_constraint(Expression::from(x).eq(500.0).with_strength(Strength::WEAK))
            .unwrap();

        assert_close(solver.value_of(x), 100.0);
    }

    #[test]
    fn test_unsatisfiable_required() {
        let mut solver = Solver::new();
        let x = Variable::new();

        solver.add_constraint(Expression::from(x).eq(10.0)).unwrap();
        let conflict = Expression::from(x).eq(20.0);

        assert_eq!(
            solver.add_constraint(conflict.clone()),
            Err(SolverError::UnsatisfiableConstraint)
        );
        assert!(!solver.has_constraint(&conflict));
        assert_close(solver.value_of(x), 10.0);
    }

    #[test]
    fn test_rejected_constraint_leaves_tableau_intact() {
        let mut solver = Solver::new();
        let x = Variable::new();
        let floor = Expression::from(x).ge(10.0);

        solver.add_constraint(floor.clone()).unwrap();
        assert_eq!(
            solver.add_constraint(Expression::from(x).le(0.0)),
            Err(SolverError::UnsatisfiableConstraint)
        );
        assert_eq!(solver.rows.len(), 1);
        assert!(solver.infeasible_rows.is_empty());

        solver
            .add_constraint(Expression::from(x).eq(2.0).with_strength(Strength::WEAK))
            .unwrap();
        assert_close(solver.value_of(x), 10.0);

        solver.add_edit_variable(x, Strength::MEDIUM).unwrap();
        solver.suggest_value(x, 50.0).unwrap();
        assert_close(solver.value_of(x), 50.0);

        solver.suggest_value(x, -5.0).unwrap();
        assert!(floor.is_satisfied(|v| solver.value_of(v).unwrap_or(0.0)));
        assert_close(solver.value_of(x), 10.0);
    }

    #[test]
    fn test_duplicate_and_unknown_constraints() {
        let mut solver = Solver::new();
        let x = Variable::new();
        let c = Expression::from(x).ge(0.0);

        solver.add_constraint(c.clone()).unwrap();
        assert_eq!(
            solver.add_constraint(c.clone()),
            Err(SolverError::DuplicateConstraint)
        );

        solver.remove_constraint(&c).unwrap();
        assert_eq!(
            solver.remove_constraint(&c),
            Err(SolverError::UnknownConstraint)
        );
    }

    #[test]
    fn test_remove_constraint_restores_weaker_solution() {
        let mut solver = Solver::new();
        let x = Variable::new();

        solver
            .add_constraint(Expression::from(x).eq(5.0).with_strength(Strength::WEAK))
            .unwrap();
        let strong = Expression::from(x).eq(50.0).with_strength(Strength::STRONG);
        solver.add_constraint(strong.clone()).unwrap();
        assert_close(solver.value_of(x), 50.0);

        solver.remove_constraint(&strong).unwrap();
        assert_close(solver.value_of(x), 5.0);
    }

    #[test]
    fn test_edit_variables() {
        let mut solver = Solver::new();
        let width = Variable::new();
        let half = Variable::new();

        solver.add_constraint((half * 2.0).eq(width)).unwrap();
        solver.add_edit_variable(width, Strength::STRONG).unwrap();

        solver.suggest_value(width, 300.0).unwrap();
        assert_close(solver.value_of(half), 150.0);

        solver.suggest_value(width, 120.0).unwrap();
        assert_close(solver.value_of(half), 60.0);

        solver.remove_edit_variable(width).unwrap();
        assert!(!solver.has_edit_variable(width));
    }

    #[test]
    fn test_edit_variable_errors() {
        let mut solver = Solver::new();
        let x = Variable::new();

        assert_eq!(
            solver.add_edit_variable(x, Strength::REQUIRED),
            Err(SolverError::BadRequiredStrength)
        );
        solver.add_edit_variable(x, Strength::MEDIUM).unwrap();
        assert_eq!(
            solver.add_edit_variable(x, Strength::MEDIUM),
            Err(SolverError::DuplicateEditVariable)
        );
        assert_eq!(
            solver.suggest_value(Variable::new(), 1.0),
            Err(SolverError::UnknownEditVariable)
        );
    }

    #[test]
    fn test_fetch_changes_reports_only_new_values() {
        let mut solver = Solver::new();
        let x = Variable::new();

        solver.add_edit_variable(x, Strength::STRONG).unwrap();
        solver.suggest_value(x, 7.0).unwrap();

        assert_eq!(solver.fetch_changes(), vec![(x, 7.0)]);
        assert!(solver.fetch_changes().is_empty());

        solver.suggest_value(x, 9.0).unwrap();
        assert_eq!(solver.fetch_changes(), vec![(x, 9.0)]);
    }

    #[test]
    fn test_unknown_variable_has_no_value() {
        let solver = Solver::new();
        assert_eq!(solver.value_of(Variable::new()), None);
    }

    proptest! {
        #[test]
        fn test_required_constraints_hold(
            total in 0.0f64..2000.0,
            gap in 0.0f64..50.0,
            preferred in 0.0f64..2000.0,
        ) {
            let mut solver = Solver::new();
            let total_var = Variable::new();
            let a = Variable::new();
            let b = Variable::new();

            let required = vec![
                Expression::from(a).ge(0.0),
                Expression::from(b).ge(0.0),
                (a + b + gap).eq(total_var),
            ];
            solver.add_constraints(required.clone()).unwrap();
            solver.add_edit_variable(total_var, Strength::STRONG).unwrap();
            solver
                .add_constraint(Expression::from(a).eq(preferred).with_strength(Strength::WEAK))
                .unwrap();
            solver.suggest_value(total_var, total + gap).unwrap();

            let lookup = |v: Variable| solver.value_of(v).unwrap_or(0.0);
            for constraint in &required {
                prop_assert!(constraint.is_satisfied(lookup));
            }
            prop_assert!((lookup(total_var) - (total + gap)).abs() < 1.0e-6);
        }
    }
}
