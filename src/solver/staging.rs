// Problem state held by an adapter between `initialize` and `solve`.
// The engines wrapped here build their native model from scratch on every
// solve, so the staged problem is the live state that `set_constraints` resets.

use crate::domain::{Constraint, Objective, Result, Sense, SolverError, VariableType};
use std::collections::BTreeMap;

/// Tolerance used when checking an engine's point against the staged rows.
pub(crate) const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Tuning applied to the next solve
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Tuning {
    pub time_limit: Option<f64>,
    pub relative_gap: Option<f64>,
    pub absolute_gap: Option<f64>,
    pub num_threads: Option<u32>,
    pub verbose: bool,
}

impl Tuning {
    pub fn set_optimality_gap(&mut self, gap: f64, absolute: bool) {
        if absolute {
            self.absolute_gap = Some(gap);
        } else {
            self.relative_gap = Some(gap);
        }
    }

    /// Zero threads means "engine decides".
    pub fn set_num_threads(&mut self, num_threads: u32) {
        self.num_threads = (num_threads > 0).then_some(num_threads);
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct StagedProblem {
    variable_types: Vec<VariableType>,
    objective: Objective,
    constraints: Vec<Constraint>,
    initialized: bool,
}

impl StagedProblem {
    /// Declare a fresh set of variables, dropping objective and constraints.
    pub fn reset(
        &mut self,
        num_variables: usize,
        default_type: VariableType,
        special_types: &BTreeMap<usize, VariableType>,
    ) -> Result<()> {
        if let Some((&var, _)) = special_types.range(num_variables..).next() {
            return Err(SolverError::InvalidProblem(format!(
                "type override for variable {} but only {} variables declared",
                var, num_variables
            )));
        }

        self.variable_types = (0..num_variables)
            .map(|var| special_types.get(&var).copied().unwrap_or(default_type))
            .collect();
        self.objective = Objective::new(num_variables);
        self.constraints.clear();
        self.initialized = true;
        Ok(())
    }

    pub fn ensure_initialized(&self, operation: &str) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(SolverError::InvalidProblem(format!(
                "{} called before initialize",
                operation
            )))
        }
    }

    pub fn set_objective(&mut self, objective: &Objective) -> Result<()> {
        self.ensure_initialized("set_objective")?;

        let num_variables = self.num_variables();
        if let Some(var) = objective
            .coefficients()
            .iter()
            .enumerate()
            .skip(num_variables)
            .find(|&(_, &coef)| coef != 0.0)
            .map(|(var, _)| var)
        {
            return Err(self.out_of_range("objective", var));
        }
        if let Some(&(_, j)) = objective
            .quadratic_coefficients()
            .keys()
            .find(|&&(_, j)| j >= num_variables)
        {
            return Err(self.out_of_range("objective", j));
        }

        let mut staged = objective.clone();
        staged.resize(num_variables);
        self.objective = staged;
        Ok(())
    }

    /// Swap in a whole new set of rows. Nothing changes if any row is rejected.
    pub fn replace_constraints<'a>(
        &mut self,
        constraints: impl IntoIterator<Item = &'a Constraint>,
    ) -> Result<()> {
        self.ensure_initialized("set_constraints")?;
        let mut staged = Vec::new();
        for constraint in constraints {
            self.check_in_range(constraint)?;
            staged.push(constraint.clone());
        }
        self.constraints = staged;
        Ok(())
    }

    pub fn add_constraint(&mut self, constraint: &Constraint) -> Result<()> {
        self.ensure_initialized("add_constraint")?;
        self.check_in_range(constraint)?;
        self.constraints.push(constraint.clone());
        Ok(())
    }

    fn check_in_range(&self, constraint: &Constraint) -> Result<()> {
        match constraint.max_variable() {
            Some(var) if var >= self.num_variables() => Err(self.out_of_range("constraint", var)),
            _ => Ok(()),
        }
    }

    pub fn num_variables(&self) -> usize {
        self.variable_types.len()
    }

    pub fn variable_types(&self) -> &[VariableType] {
        &self.variable_types
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn num_integer_variables(&self) -> usize {
        self.variable_types
            .iter()
            .filter(|ty| ty.is_integral())
            .count()
    }

    /// Dual bound to report next to `primal`.
    ///
    /// `engine_bound` excludes the objective constant. It is used only for
    /// problems with integer variables, and only when it is finite and lies
    /// on the bound side of `primal`. Otherwise `primal` is returned.
    pub fn dual_bound(&self, engine_bound: Option<f64>, primal: f64) -> f64 {
        if self.num_integer_variables() == 0 {
            return primal;
        }
        let Some(bound) = engine_bound.map(|b| b + self.objective.constant()) else {
            return primal;
        };
        let on_bound_side = match self.objective.sense() {
            Sense::Minimize => bound <= primal,
            Sense::Maximize => bound >= primal,
        };
        if bound.is_finite() && on_bound_side {
            bound
        } else {
            primal
        }
    }

    /// Whether `values` satisfies bounds, integrality and every linear row
    /// within [`FEASIBILITY_TOLERANCE`].
    pub fn is_feasible(&self, values: &[f64]) -> bool {
        if values.len() != self.num_variables() || values.iter().any(|v| !v.is_finite()) {
            return false;
        }

        let within_domain = self.variable_types.iter().zip(values).all(|(ty, &v)| {
            let (lb, ub) = ty.default_bounds();
            let in_bounds = v >= lb - FEASIBILITY_TOLERANCE && v <= ub + FEASIBILITY_TOLERANCE;
            let integral = !ty.is_integral() || (v - v.round()).abs() <= FEASIBILITY_TOLERANCE;
            in_bounds && integral
        });

        within_domain
            && self.constraints.iter().all(|constraint| {
                let activity: f64 = constraint
                    .coefficients()
                    .iter()
                    .map(|(&var, coef)| coef * values[var])
                    .sum();
                let (lower, upper) = constraint.relation().bounds(constraint.value());
                activity >= lower - FEASIBILITY_TOLERANCE
                    && activity <= upper + FEASIBILITY_TOLERANCE
            })
    }

    fn out_of_range(&self, what: &str, var: usize) -> SolverError {
        SolverError::InvalidProblem(format!(
            "{} references variable {} but only {} variables declared",
            what,
            var,
            self.num_variables()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Relation;

    fn staged(n: usize, ty: VariableType) -> StagedProblem {
        let mut problem = StagedProblem::default();
        problem.reset(n, ty, &BTreeMap::new()).unwrap();
        problem
    }

    #[test]
    fn reset_applies_overrides_and_drops_constraints() {
        let mut problem = staged(2, VariableType::Continuous);
        let mut c = Constraint::new();
        c.set_coefficient(1, 1.0);
        problem.add_constraint(&c).unwrap();

        let overrides = BTreeMap::from([(2, VariableType::Binary)]);
        problem
            .reset(3, VariableType::Integer, &overrides)
            .unwrap();
        assert_eq!(
            problem.variable_types(),
            &[
                VariableType::Integer,
                VariableType::Integer,
                VariableType::Binary
            ]
        );
        assert!(problem.constraints().is_empty());
        assert_eq!(problem.objective().len(), 3);
    }

    #[test]
    fn override_past_declared_range_is_rejected() {
        let mut problem = StagedProblem::default();
        let overrides = BTreeMap::from([(5, VariableType::Binary)]);
        assert!(problem
            .reset(2, VariableType::Continuous, &overrides)
            .is_err());
    }

    #[test]
    fn operations_before_initialize_fail() {
        let mut problem = StagedProblem::default();
        assert!(problem.set_objective(&Objective::new(1)).is_err());
        assert!(problem.add_constraint(&Constraint::new()).is_err());
    }

    #[test]
    fn out_of_range_references_are_rejected() {
        let mut problem = staged(2, VariableType::Continuous);
        let mut objective = Objective::new(0);
        objective.set_coefficient(4, 1.0);
        assert!(problem.set_objective(&objective).is_err());

        let mut c = Constraint::new();
        c.set_quadratic_coefficient(0, 2, 1.0);
        assert!(problem.add_constraint(&c).is_err());
    }

    #[test]
    fn rejected_replacement_keeps_previous_rows() {
        let mut problem = staged(2, VariableType::Continuous);
        let mut kept = Constraint::new().with_relation(Relation::LessEqual, 1.0);
        kept.set_coefficient(0, 1.0);
        problem.replace_constraints([&kept]).unwrap();

        let mut fine = Constraint::new().with_relation(Relation::GreaterEqual, 0.0);
        fine.set_coefficient(1, 1.0);
        let mut dangling = Constraint::new();
        dangling.set_coefficient(9, 1.0);
        assert!(problem.replace_constraints([&fine, &dangling]).is_err());
        assert_eq!(problem.constraints(), &[kept]);

        problem.replace_constraints([&fine]).unwrap();
        assert_eq!(problem.constraints(), &[fine]);
    }

    #[test]
    fn feasibility_checks_rows_and_integrality() {
        let mut problem = staged(2, VariableType::Integer);
        let mut c = Constraint::new().with_relation(Relation::LessEqual, 3.0);
        c.set_coefficient(0, 1.0);
        c.set_coefficient(1, 1.0);
        problem.add_constraint(&c).unwrap();

        assert!(problem.is_feasible(&[1.0, 2.0]));
        assert!(!problem.is_feasible(&[2.0, 2.0]));
        assert!(!problem.is_feasible(&[0.5, 1.0]));
        assert!(!problem.is_feasible(&[1.0]));
    }

    #[test]
    fn dual_bound_falls_back_to_primal() {
        let mut problem = staged(1, VariableType::Integer);
        let mut objective = Objective::new(1).with_sense(Sense::Maximize);
        objective.set_constant(10.0);
        problem.set_objective(&objective).unwrap();

        assert_eq!(problem.dual_bound(Some(5.0), 12.0), 15.0);
        assert_eq!(problem.dual_bound(Some(1.0), 12.0), 12.0);
        assert_eq!(problem.dual_bound(Some(f64::INFINITY), 12.0), 12.0);
        assert_eq!(problem.dual_bound(None, 12.0), 12.0);

        let continuous = staged(1, VariableType::Continuous);
        assert_eq!(continuous.dual_bound(Some(-3.0), 0.0), 0.0);
    }

    #[test]
    fn zero_threads_defers_to_engine() {
        let mut tuning = Tuning::default();
        tuning.set_num_threads(4);
        assert_eq!(tuning.num_threads, Some(4));
        tuning.set_num_threads(0);
        assert_eq!(tuning.num_threads, None);
    }
}
