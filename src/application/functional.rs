// One-shot solving: build a solver, load the problem, solve, drop the solver.

use super::solver::{SolveReport, Solver};
use crate::domain::{
    Constraint, EventCallback, EventData, Objective, Preference, Result, VariableType,
};
use crate::solver::SolverFactory;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Settings for [`solve`]
#[derive(Clone, Default)]
pub struct SolveOptions {
    pub variable_type: VariableType,
    pub verbose: bool,
    pub preference: Preference,
    pub on_event: Option<EventCallback>,
}

impl SolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variable_type(mut self, variable_type: VariableType) -> Self {
        self.variable_type = variable_type;
        self
    }

    pub fn with_preference(mut self, preference: Preference) -> Self {
        self.preference = preference;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_listener(
        mut self,
        listener: impl Fn(&EventData) + Send + Sync + 'static,
    ) -> Self {
        self.on_event = Some(Arc::new(listener));
        self
    }
}

impl fmt::Debug for SolveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolveOptions")
            .field("variable_type", &self.variable_type)
            .field("verbose", &self.verbose)
            .field("preference", &self.preference)
            .field("on_event", &self.on_event.is_some())
            .finish()
    }
}

/// Solve `objective` subject to `constraints` with a backend from the builtin factory.
///
/// The problem has one variable per objective coefficient, all of
/// `options.variable_type`. The objective carries its own sense.
///
/// ```no_run
/// use mipbridge::{solve, Constraint, Objective, Relation, Sense, SolveOptions};
///
/// // max x + 2y  s.t.  x + y <= 4
/// let objective = Objective::from_coefficients([1.0, 2.0], Sense::Maximize);
/// let constraints = [Constraint::from_coefficients([1.0, 1.0], Relation::LessEqual, 4.0)];
///
/// let report = solve(&objective, &constraints, &SolveOptions::new())?;
/// assert!(report.has_solution());
/// # Ok::<(), mipbridge::SolverError>(())
/// ```
pub fn solve<'a>(
    objective: &Objective,
    constraints: impl IntoIterator<Item = &'a Constraint>,
    options: &SolveOptions,
) -> Result<SolveReport> {
    solve_with_factory(&SolverFactory::builtin(), objective, constraints, options)
}

/// Like [`solve`], resolving the backend through `factory`.
pub fn solve_with_factory<'a>(
    factory: &SolverFactory,
    objective: &Objective,
    constraints: impl IntoIterator<Item = &'a Constraint>,
    options: &SolveOptions,
) -> Result<SolveReport> {
    let mut solver = Solver::with_factory(
        factory,
        objective.len(),
        options.variable_type,
        &BTreeMap::new(),
        options.preference,
    )?;
    solver.set_verbose(options.verbose);
    solver.set_objective(objective)?;
    for constraint in constraints {
        solver.add_constraint(constraint)?;
    }
    if let Some(listener) = &options.on_event {
        solver.set_event_callback(Some(listener.clone()))?;
    }
    solver.solve()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_debug_hides_listener() {
        let options = SolveOptions::new()
            .with_variable_type(VariableType::Binary)
            .with_listener(|_| {});
        let rendered = format!("{:?}", options);
        assert!(rendered.contains("Binary"), "{rendered}");
        assert!(rendered.contains("on_event: true"), "{rendered}");
    }
}
