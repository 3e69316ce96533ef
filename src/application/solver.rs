// Caller-facing solver: resolves a backend once, then forwards the problem to it.

use super::config::SolverConfig;
use crate::domain::{
    Constraint, Constraints, EventCallback, Objective, Preference, Result, Solution,
    SolveOutcome, SolverError, VariableType,
};
use crate::solver::{ResolvedBackend, SolverFactory};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Solution and outcome of one `Solver::solve` call
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    pub solution: Solution,
    pub outcome: SolveOutcome,
}

impl SolveReport {
    pub fn has_solution(&self) -> bool {
        self.outcome.has_solution()
    }
}

/// A problem bound to one resolved backend
#[derive(Debug)]
pub struct Solver {
    backend: ResolvedBackend,
    num_variables: usize,
}

impl Solver {
    /// Resolve a backend for `preference` with the builtin factory and
    /// declare `num_variables` variables on it.
    pub fn new(
        num_variables: usize,
        default_type: VariableType,
        special_types: &BTreeMap<usize, VariableType>,
        preference: Preference,
    ) -> Result<Self> {
        let factory = SolverFactory::builtin();
        Self::with_factory(&factory, num_variables, default_type, special_types, preference)
    }

    pub fn with_factory(
        factory: &SolverFactory,
        num_variables: usize,
        default_type: VariableType,
        special_types: &BTreeMap<usize, VariableType>,
        preference: Preference,
    ) -> Result<Self> {
        let backend = factory.create_solver_backend(preference)?;
        Self::from_backend(backend, num_variables, default_type, special_types)
    }

    /// Like [`new`](Self::new), resolving and tuning from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidConfig`] before resolving anything if
    /// `config` fails [`SolverConfig::validate`].
    pub fn from_config(
        num_variables: usize,
        default_type: VariableType,
        special_types: &BTreeMap<usize, VariableType>,
        config: &SolverConfig,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|err| SolverError::InvalidConfig(err.to_string()))?;
        let mut solver = Self::with_factory(
            &config.factory(),
            num_variables,
            default_type,
            special_types,
            config.backend,
        )?;
        solver.configure(config);
        Ok(solver)
    }

    pub fn from_backend(
        mut backend: ResolvedBackend,
        num_variables: usize,
        default_type: VariableType,
        special_types: &BTreeMap<usize, VariableType>,
    ) -> Result<Self> {
        backend.initialize_with_types(num_variables, default_type, special_types)?;
        info!(
            component = "solver",
            operation = "initialize",
            backend = backend.name(),
            num_variables,
            "Solver ready"
        );
        Ok(Self {
            backend,
            num_variables,
        })
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    /// Start over with a new set of variables on the same backend.
    pub fn reinitialize(
        &mut self,
        num_variables: usize,
        default_type: VariableType,
        special_types: &BTreeMap<usize, VariableType>,
    ) -> Result<()> {
        self.backend
            .initialize_with_types(num_variables, default_type, special_types)?;
        self.num_variables = num_variables;
        Ok(())
    }

    /// Issue the tuning calls of `config` on the backend.
    pub fn configure(&mut self, config: &SolverConfig) {
        config.apply(&mut *self.backend);
    }

    pub fn set_objective(&mut self, objective: &Objective) -> Result<()> {
        self.backend.set_objective(objective)
    }

    pub fn set_constraints(&mut self, constraints: &Constraints) -> Result<()> {
        self.backend.set_constraints(constraints)
    }

    pub fn add_constraint(&mut self, constraint: &Constraint) -> Result<()> {
        self.backend.add_constraint(constraint)
    }

    pub fn set_timeout(&mut self, seconds: f64) {
        self.backend.set_timeout(seconds);
    }

    pub fn set_optimality_gap(&mut self, gap: f64, absolute: bool) {
        self.backend.set_optimality_gap(gap, absolute);
    }

    pub fn set_num_threads(&mut self, num_threads: u32) {
        self.backend.set_num_threads(num_threads);
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.backend.set_verbose(verbose);
    }

    pub fn set_event_callback(&mut self, callback: Option<EventCallback>) -> Result<()> {
        if !self.backend.capabilities().events {
            return Err(SolverError::Unsupported {
                backend: self.backend.name().to_string(),
                feature: "event callbacks",
            });
        }
        self.backend.set_event_callback(callback)
    }

    /// Convenience for registering a closure as the event listener.
    pub fn on_event(
        &mut self,
        listener: impl Fn(&crate::domain::EventData) + Send + Sync + 'static,
    ) -> Result<()> {
        self.set_event_callback(Some(Arc::new(listener)))
    }

    pub fn solve(&mut self) -> Result<SolveReport> {
        let mut solution = Solution::new(0);
        let outcome = self.backend.solve(&mut solution)?;
        info!(
            component = "solver",
            operation = "solve",
            backend = self.backend.name(),
            status = %outcome.status,
            "{}",
            outcome.message
        );
        Ok(SolveReport { solution, outcome })
    }
}
