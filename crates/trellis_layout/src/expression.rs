//! Linear expressions, constraints and strengths
//!
//! Expressions are built with ordinary arithmetic on [`Variable`]s and
//! numbers, then turned into a [`Constraint`] with [`Expression::eq`],
//! [`Expression::le`] or [`Expression::ge`]:
//!
//! ```rust
//! use trellis_layout::{Expression, Strength, Variable};
//!
//! let left = Variable::new();
//! let width = Variable::new();
//!
//! let right = Expression::from(left) + width;
//! let fits = right.le(800.0);
//! let wide = Expression::from(width).eq(500.0).with_strength(Strength::MEDIUM);
//! # let _ = (fits, wide);
//! ```

use std::hash::{Hash, Hasher};
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use smallvec::SmallVec;

static NEXT_VARIABLE: AtomicUsize = AtomicUsize::new(0);

/// An unknown the solver assigns a value to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(usize);

impl Variable {
    pub fn new() -> Self {
        Variable(NEXT_VARIABLE.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for Variable {
    fn default() -> Self {
        Self::new()
    }
}

/// `coefficient * variable`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Term {
    pub variable: Variable,
    pub coefficient: f64,
}

impl Term {
    pub const fn new(variable: Variable, coefficient: f64) -> Self {
        Self {
            variable,
            coefficient,
        }
    }
}

/// Sum of terms plus a constant
#[derive(Clone, Debug, Default)]
pub struct Expression {
    pub terms: SmallVec<[Term; 4]>,
    pub constant: f64,
}

impl Expression {
    pub fn new(terms: impl IntoIterator<Item = Term>, constant: f64) -> Self {
        Self {
            terms: terms.into_iter().collect(),
            constant,
        }
    }

    pub fn from_constant(constant: f64) -> Self {
        Self {
            terms: SmallVec::new(),
            constant,
        }
    }

    /// Evaluate with the given variable values
    pub fn value(&self, lookup: impl Fn(Variable) -> f64) -> f64 {
        self.terms
            .iter()
            .fold(self.constant, |sum, t| sum + t.coefficient * lookup(t.variable))
    }

    /// `self == rhs`, required
    pub fn eq(self, rhs: impl Into<Expression>) -> Constraint {
        Constraint::new(self - rhs.into(), Relation::Equal, Strength::REQUIRED)
    }

    /// `self <= rhs`, required
    pub fn le(self, rhs: impl Into<Expression>) -> Constraint {
        Constraint::new(self - rhs.into(), Relation::LessOrEqual, Strength::REQUIRED)
    }

    /// `self >= rhs`, required
    pub fn ge(self, rhs: impl Into<Expression>) -> Constraint {
        Constraint::new(self - rhs.into(), Relation::GreaterOrEqual, Strength::REQUIRED)
    }

    fn scaled(mut self, factor: f64) -> Self {
        for term in &mut self.terms {
            term.coefficient *= factor;
        }
        self.constant *= factor;
        self
    }
}

impl From<f64> for Expression {
    fn from(constant: f64) -> Self {
        Expression::from_constant(constant)
    }
}

impl From<i32> for Expression {
    fn from(constant: i32) -> Self {
        Expression::from_constant(f64::from(constant))
    }
}

impl From<Variable> for Expression {
    fn from(variable: Variable) -> Self {
        Expression::new([Term::new(variable, 1.0)], 0.0)
    }
}

impl From<Term> for Expression {
    fn from(term: Term) -> Self {
        Expression::new([term], 0.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Arithmetic
// ─────────────────────────────────────────────────────────────────────────────

impl<T: Into<Expression>> Add<T> for Expression {
    type Output = Expression;

    fn add(mut self, rhs: T) -> Expression {
        let rhs = rhs.into();
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
        self
    }
}

impl<T: Into<Expression>> Sub<T> for Expression {
    type Output = Expression;

    fn sub(self, rhs: T) -> Expression {
        self + rhs.into().scaled(-1.0)
    }
}

impl Mul<f64> for Expression {
    type Output = Expression;

    fn mul(self, rhs: f64) -> Expression {
        self.scaled(rhs)
    }
}

impl Div<f64> for Expression {
    type Output = Expression;

    fn div(self, rhs: f64) -> Expression {
        self.scaled(1.0 / rhs)
    }
}

impl Neg for Expression {
    type Output = Expression;

    fn neg(self) -> Expression {
        self.scaled(-1.0)
    }
}

impl<T: Into<Expression>> Add<T> for Variable {
    type Output = Expression;

    fn add(self, rhs: T) -> Expression {
        Expression::from(self) + rhs
    }
}

impl<T: Into<Expression>> Sub<T> for Variable {
    type Output = Expression;

    fn sub(self, rhs: T) -> Expression {
        Expression::from(self) - rhs
    }
}

impl Mul<f64> for Variable {
    type Output = Expression;

    fn mul(self, rhs: f64) -> Expression {
        Expression::from(Term::new(self, rhs))
    }
}

impl Div<f64> for Variable {
    type Output = Expression;

    fn div(self, rhs: f64) -> Expression {
        Expression::from(Term::new(self, 1.0 / rhs))
    }
}

impl Add<Expression> for f64 {
    type Output = Expression;

    fn add(self, rhs: Expression) -> Expression {
        rhs + self
    }
}

impl Sub<Expression> for f64 {
    type Output = Expression;

    fn sub(self, rhs: Expression) -> Expression {
        Expression::from_constant(self) - rhs
    }
}

impl Mul<Expression> for f64 {
    type Output = Expression;

    fn mul(self, rhs: Expression) -> Expression {
        rhs * self
    }
}

impl Mul<Variable> for f64 {
    type Output = Expression;

    fn mul(self, rhs: Variable) -> Expression {
        rhs * self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Strength
// ─────────────────────────────────────────────────────────────────────────────

/// Priority of a constraint
///
/// Symbolic weights packed into one number: each tier dominates any
/// realistic combination of the tiers below it.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Strength(f64);

impl Strength {
    pub const REQUIRED: Strength = Strength(1_001_001_000.0);
    pub const STRONG: Strength = Strength(1_000_000.0);
    pub const MEDIUM: Strength = Strength(1_000.0);
    pub const WEAK: Strength = Strength(1.0);

    /// Combine strong, medium and weak components, scaled by `w`
    pub fn create(strong: f64, medium: f64, weak: f64, w: f64) -> Strength {
        let mut value = 0.0;
        value += (strong * w).clamp(0.0, 1000.0) * 1_000_000.0;
        value += (medium * w).clamp(0.0, 1000.0) * 1_000.0;
        value += (weak * w).clamp(0.0, 1000.0);
        Strength(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Clamp into the valid range `[0, REQUIRED]`
    pub fn clip(self) -> Strength {
        Strength(self.0.clamp(0.0, Self::REQUIRED.0))
    }

    pub fn is_required(self) -> bool {
        self.0 >= Self::REQUIRED.0
    }
}

impl Mul<f64> for Strength {
    type Output = Strength;

    fn mul(self, rhs: f64) -> Strength {
        Strength(self.0 * rhs).clip()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Constraints
// ─────────────────────────────────────────────────────────────────────────────

/// Relation between a constraint's expression and zero
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Relation {
    LessOrEqual,
    Equal,
    GreaterOrEqual,
}

#[derive(Debug)]
struct ConstraintData {
    expression: Expression,
    relation: Relation,
    strength: Strength,
}

/// `expression <relation> 0` at some strength
///
/// Constraints compare and hash by identity: two separately built
/// constraints with the same expression are different constraints.
#[derive(Clone, Debug)]
pub struct Constraint(Rc<ConstraintData>);

impl Constraint {
    pub fn new(expression: Expression, relation: Relation, strength: Strength) -> Self {
        Constraint(Rc::new(ConstraintData {
            expression,
            relation,
            strength: strength.clip(),
        }))
    }

    pub fn expression(&self) -> &Expression {
        &self.0.expression
    }

    pub fn relation(&self) -> Relation {
        self.0.relation
    }

    pub fn strength(&self) -> Strength {
        self.0.strength
    }

    /// Same constraint at another strength
    pub fn with_strength(self, strength: Strength) -> Constraint {
        Constraint::new(self.0.expression.clone(), self.0.relation, strength)
    }

    /// Whether the constraint holds for the given values
    pub fn is_satisfied(&self, lookup: impl Fn(Variable) -> f64) -> bool {
        const TOLERANCE: f64 = 1.0e-6;
        let value = self.0.expression.value(lookup);
        match self.0.relation {
            Relation::LessOrEqual => value <= TOLERANCE,
            Relation::Equal => value.abs() <= TOLERANCE,
            Relation::GreaterOrEqual => value >= -TOLERANCE,
        }
    }
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Constraint {}

impl Hash for Constraint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}
