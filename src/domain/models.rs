use super::value_objects::{Relation, Sense, SolveStatus};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Deref, Index, IndexMut};

/// Key of a quadratic term. Pairs are unordered, so `(j, i)` is stored as `(i, j)`.
pub type VariablePair = (usize, usize);

fn pair_key(first: usize, second: usize) -> VariablePair {
    if first <= second {
        (first, second)
    } else {
        (second, first)
    }
}

/// Insert `coef` under `key`, or drop the entry when `coef` is zero.
fn set_sparse<K: Ord>(map: &mut BTreeMap<K, f64>, key: K, coef: f64) {
    if coef == 0.0 {
        map.remove(&key);
    } else {
        map.insert(key, coef);
    }
}

/// Linear or quadratic objective to minimize or maximize
///
/// Linear coefficients are stored densely and grow on demand, quadratic
/// coefficients are sparse and never hold a zero entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    sense: Sense,
    constant: f64,
    coefficients: Vec<f64>,
    quadratic_coefficients: BTreeMap<VariablePair, f64>,
}

impl Objective {
    pub fn new(size: usize) -> Self {
        Self {
            sense: Sense::Minimize,
            constant: 0.0,
            coefficients: vec![0.0; size],
            quadratic_coefficients: BTreeMap::new(),
        }
    }

    /// Dense linear objective, one coefficient per variable in order.
    pub fn from_coefficients(coefficients: impl IntoIterator<Item = f64>, sense: Sense) -> Self {
        Self {
            sense,
            constant: 0.0,
            coefficients: coefficients.into_iter().collect(),
            quadratic_coefficients: BTreeMap::new(),
        }
    }

    pub fn with_sense(mut self, sense: Sense) -> Self {
        self.sense = sense;
        self
    }

    pub fn with_constant(mut self, constant: f64) -> Self {
        self.constant = constant;
        self
    }

    /// Add quadratic terms, growing the linear part to cover every variable named.
    pub fn with_quadratic_coefficients(
        mut self,
        terms: impl IntoIterator<Item = (VariablePair, f64)>,
    ) -> Self {
        for ((i, j), coef) in terms {
            self.resize(i.max(j) + 1);
            self.set_quadratic_coefficient(i, j, coef);
        }
        self
    }

    pub fn set_constant(&mut self, constant: f64) {
        self.constant = constant;
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    /// Set the linear coefficient of `var`, growing the coefficient vector
    /// with zeros if `var` is past its end.
    pub fn set_coefficient(&mut self, var: usize, coef: f64) {
        if var >= self.coefficients.len() {
            self.resize(var + 1);
        }
        self.coefficients[var] = coef;
    }

    pub fn coefficient(&self, var: usize) -> f64 {
        self.coefficients.get(var).copied().unwrap_or(0.0)
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn set_quadratic_coefficient(&mut self, var1: usize, var2: usize, coef: f64) {
        set_sparse(&mut self.quadratic_coefficients, pair_key(var1, var2), coef);
    }

    pub fn quadratic_coefficient(&self, var1: usize, var2: usize) -> f64 {
        self.quadratic_coefficients
            .get(&pair_key(var1, var2))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn quadratic_coefficients(&self) -> &BTreeMap<VariablePair, f64> {
        &self.quadratic_coefficients
    }

    pub fn has_quadratic_terms(&self) -> bool {
        !self.quadratic_coefficients.is_empty()
    }

    pub fn set_sense(&mut self, sense: Sense) {
        self.sense = sense;
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    /// Grow the linear coefficient vector to `size`. Never shrinks.
    pub fn resize(&mut self, size: usize) {
        if size > self.coefficients.len() {
            self.coefficients.resize(size, 0.0);
        }
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// Objective value at `values`, including constant and quadratic terms.
    /// Variables missing from `values` count as zero.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        let value_of = |var: usize| values.get(var).copied().unwrap_or(0.0);
        let linear: f64 = self
            .coefficients
            .iter()
            .enumerate()
            .map(|(var, coef)| coef * value_of(var))
            .sum();
        let quadratic: f64 = self
            .quadratic_coefficients
            .iter()
            .map(|(&(i, j), coef)| coef * value_of(i) * value_of(j))
            .sum();
        self.constant + linear + quadratic
    }
}

impl Default for Objective {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.sense)?;
        for (var, coef) in self.coefficients.iter().enumerate() {
            write!(f, "{}*{} ", coef, var)?;
        }
        for (&(i, j), coef) in &self.quadratic_coefficients {
            write!(f, "{}*{}*{} ", coef, i, j)?;
        }
        write!(f, "+ {}", self.constant)
    }
}

/// Sparse linear or quadratic constraint
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    coefficients: BTreeMap<usize, f64>,
    quadratic_coefficients: BTreeMap<VariablePair, f64>,
    relation: Relation,
    value: f64,
}

impl Constraint {
    pub fn new() -> Self {
        Self {
            coefficients: BTreeMap::new(),
            quadratic_coefficients: BTreeMap::new(),
            relation: Relation::LessEqual,
            value: 0.0,
        }
    }

    /// Row from dense coefficients, where position is the variable id.
    /// Zeros are skipped.
    pub fn from_coefficients(
        coefficients: impl IntoIterator<Item = f64>,
        relation: Relation,
        value: f64,
    ) -> Self {
        let mut constraint = Self::new().with_relation(relation, value);
        for (var, coef) in coefficients.into_iter().enumerate() {
            constraint.set_coefficient(var, coef);
        }
        constraint
    }

    pub fn with_relation(mut self, relation: Relation, value: f64) -> Self {
        self.relation = relation;
        self.value = value;
        self
    }

    pub fn with_quadratic_coefficients(
        mut self,
        terms: impl IntoIterator<Item = (VariablePair, f64)>,
    ) -> Self {
        for ((i, j), coef) in terms {
            self.set_quadratic_coefficient(i, j, coef);
        }
        self
    }

    /// Set the linear coefficient of `var`. Zero removes the entry.
    pub fn set_coefficient(&mut self, var: usize, coef: f64) {
        set_sparse(&mut self.coefficients, var, coef);
    }

    pub fn coefficient(&self, var: usize) -> f64 {
        self.coefficients.get(&var).copied().unwrap_or(0.0)
    }

    pub fn coefficients(&self) -> &BTreeMap<usize, f64> {
        &self.coefficients
    }

    /// Set the coefficient of `var1 * var2`. Zero removes the entry.
    pub fn set_quadratic_coefficient(&mut self, var1: usize, var2: usize, coef: f64) {
        set_sparse(&mut self.quadratic_coefficients, pair_key(var1, var2), coef);
    }

    pub fn quadratic_coefficient(&self, var1: usize, var2: usize) -> f64 {
        self.quadratic_coefficients
            .get(&pair_key(var1, var2))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn quadratic_coefficients(&self) -> &BTreeMap<VariablePair, f64> {
        &self.quadratic_coefficients
    }

    pub fn is_quadratic(&self) -> bool {
        !self.quadratic_coefficients.is_empty()
    }

    pub fn set_relation(&mut self, relation: Relation) {
        self.relation = relation;
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Ids of the variables with a linear coefficient, ascending.
    pub fn variables(&self) -> impl Iterator<Item = usize> + '_ {
        self.coefficients.keys().copied()
    }

    /// Largest variable id referenced by a linear or quadratic term.
    pub fn max_variable(&self) -> Option<usize> {
        let linear = self.coefficients.keys().next_back().copied();
        let quadratic = self.quadratic_coefficients.keys().map(|&(_, j)| j).max();
        linear.max(quadratic)
    }

    /// Check the linear part of this constraint against `solution`.
    ///
    /// Quadratic terms are not evaluated. Comparison is exact, so an `Equal`
    /// constraint is violated by any difference at all.
    pub fn is_violated(&self, solution: &Solution) -> bool {
        let sum: f64 = self
            .coefficients
            .iter()
            .map(|(&var, coef)| coef * solution.values().get(var).copied().unwrap_or(0.0))
            .sum();

        match self.relation {
            Relation::LessEqual => sum > self.value,
            Relation::GreaterEqual => sum < self.value,
            Relation::Equal => sum != self.value,
        }
    }
}

impl Default for Constraint {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (var, coef) in &self.coefficients {
            write!(f, "{}*{} ", coef, var)?;
        }
        for (&(i, j), coef) in &self.quadratic_coefficients {
            write!(f, "{}*{}*{} ", coef, i, j)?;
        }
        write!(f, "{} {}", self.relation, self.value)
    }
}

/// A constraint without quadratic terms
///
/// Offers every [`Constraint`] operation except setting quadratic coefficients.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearConstraint(Constraint);

impl LinearConstraint {
    pub fn new() -> Self {
        Self(Constraint::new())
    }

    pub fn with_relation(self, relation: Relation, value: f64) -> Self {
        Self(self.0.with_relation(relation, value))
    }

    pub fn set_coefficient(&mut self, var: usize, coef: f64) {
        self.0.set_coefficient(var, coef);
    }

    pub fn set_relation(&mut self, relation: Relation) {
        self.0.set_relation(relation);
    }

    pub fn set_value(&mut self, value: f64) {
        self.0.set_value(value);
    }

    pub fn into_inner(self) -> Constraint {
        self.0
    }
}

impl Deref for LinearConstraint {
    type Target = Constraint;

    fn deref(&self) -> &Constraint {
        &self.0
    }
}

impl From<LinearConstraint> for Constraint {
    fn from(constraint: LinearConstraint) -> Self {
        constraint.0
    }
}

impl fmt::Display for LinearConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Ordered collection of constraints, kept in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    constraints: Vec<Constraint>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            constraints: Vec::with_capacity(capacity),
        }
    }

    pub fn add(&mut self, constraint: impl Into<Constraint>) {
        self.constraints.push(constraint.into());
    }

    pub fn add_all(&mut self, other: &Constraints) {
        self.constraints.extend(other.constraints.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn clear(&mut self) {
        self.constraints.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Constraint> {
        self.constraints.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Constraint> {
        self.constraints.get(index)
    }

    /// Indices of the constraints whose linear part references any of
    /// `variable_ids`, ascending and without duplicates.
    pub fn get_constraints(&self, variable_ids: &[usize]) -> Vec<usize> {
        self.constraints
            .iter()
            .enumerate()
            .filter(|(_, constraint)| {
                variable_ids
                    .iter()
                    .any(|var| constraint.coefficients().contains_key(var))
            })
            .map(|(index, _)| index)
            .collect()
    }
}

impl Index<usize> for Constraints {
    type Output = Constraint;

    fn index(&self, index: usize) -> &Constraint {
        &self.constraints[index]
    }
}

impl IndexMut<usize> for Constraints {
    fn index_mut(&mut self, index: usize) -> &mut Constraint {
        &mut self.constraints[index]
    }
}

impl<'a> IntoIterator for &'a Constraints {
    type Item = &'a Constraint;
    type IntoIter = std::slice::Iter<'a, Constraint>;

    fn into_iter(self) -> Self::IntoIter {
        self.constraints.iter()
    }
}

impl IntoIterator for Constraints {
    type Item = Constraint;
    type IntoIter = std::vec::IntoIter<Constraint>;

    fn into_iter(self) -> Self::IntoIter {
        self.constraints.into_iter()
    }
}

impl FromIterator<Constraint> for Constraints {
    fn from_iter<I: IntoIterator<Item = Constraint>>(iter: I) -> Self {
        Self {
            constraints: iter.into_iter().collect(),
        }
    }
}

impl Extend<Constraint> for Constraints {
    fn extend<I: IntoIterator<Item = Constraint>>(&mut self, iter: I) {
        self.constraints.extend(iter);
    }
}

/// Variable values, objective value and solve time produced by a backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solution {
    values: Vec<f64>,
    value: f64,
    time: f64,
}

impl Solution {
    pub fn new(size: usize) -> Self {
        Self {
            values: vec![0.0; size],
            value: 0.0,
            time: 0.0,
        }
    }

    pub fn resize(&mut self, size: usize) {
        self.values.resize(size, 0.0);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Objective value of this solution.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    /// Wall-clock solve time in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }
}

impl Index<usize> for Solution {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.values[index]
    }
}

impl IndexMut<usize> for Solution {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.values[index]
    }
}

/// Status and human-readable message returned by every solve
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub message: String,
}

impl SolveOutcome {
    pub fn new(status: SolveStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// True when the solution passed to `solve` was populated.
    pub fn has_solution(&self) -> bool {
        self.status.has_solution()
    }
}

impl fmt::Display for SolveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}
