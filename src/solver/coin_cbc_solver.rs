use crate::domain::{
    Capabilities, Constraint, Constraints, EventCallback, EventData, EventEmitter, Objective,
    Relation, Result, Sense, Solution, SolveOutcome, SolveStatus, SolverBackend, SolverError,
    VariableType,
};
use crate::solver::staging::{StagedProblem, Tuning};
use good_lp::{
    solvers::{coin_cbc, SolutionStatus},
    variable, variables, Expression, ResolutionError, Solution as GoodLpSolutionTrait,
    SolverModel, Variable as GoodLpVariable,
};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

const BACKEND_ID: &str = "cbc";

#[derive(Debug, Clone, Copy)]
enum CbcEvent {
    ModelBuilt,
    Status,
    Solved,
}

fn event_type_name(event: CbcEvent) -> &'static str {
    match event {
        CbcEvent::ModelBuilt => "MODEL_BUILT",
        CbcEvent::Status => "STATUS",
        CbcEvent::Solved => "SOLVED",
    }
}

/// Module entry point registered with the backend registry.
pub fn create_solver_backend() -> Result<Box<dyn SolverBackend>> {
    Ok(Box::new(CoinCbcSolver::new()))
}

pub struct CoinCbcSolver {
    problem: StagedProblem,
    tuning: Tuning,
    events: EventEmitter,
}

impl CoinCbcSolver {
    pub fn new() -> Self {
        Self {
            problem: StagedProblem::default(),
            tuning: Tuning::default(),
            events: EventEmitter::new(),
        }
    }

    /// Map CBC's own stopping reason to an outcome. A time-limited run may or
    /// may not carry an incumbent, so the returned point is checked.
    fn classify(&self, status: SolutionStatus, values: &[f64]) -> SolveOutcome {
        match status {
            SolutionStatus::Optimal => {
                SolveOutcome::new(SolveStatus::Optimal, "Optimal solution found")
            }
            SolutionStatus::TimeLimit if self.problem.is_feasible(values) => SolveOutcome::new(
                SolveStatus::TimeLimitFeasible,
                "Time limit reached, returning best feasible solution",
            ),
            SolutionStatus::TimeLimit => SolveOutcome::new(
                SolveStatus::TimeLimitInfeasible,
                "Time limit reached before a feasible solution was found",
            ),
            SolutionStatus::GapLimit => SolveOutcome::new(
                SolveStatus::Suboptimal,
                "Gap limit reached with a feasible solution",
            ),
        }
    }
}

impl Default for CoinCbcSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverBackend for CoinCbcSolver {
    fn name(&self) -> &str {
        "COIN-OR CBC"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            quadratic_objective: false,
            quadratic_constraints: false,
            events: true,
        }
    }

    fn initialize_with_types(
        &mut self,
        num_variables: usize,
        default_type: VariableType,
        special_types: &BTreeMap<usize, VariableType>,
    ) -> Result<()> {
        self.problem
            .reset(num_variables, default_type, special_types)
    }

    fn set_objective(&mut self, objective: &Objective) -> Result<()> {
        self.check_objective(objective)?;
        self.problem.set_objective(objective)
    }

    fn set_constraints(&mut self, constraints: &Constraints) -> Result<()> {
        for constraint in constraints {
            self.check_constraint(constraint)?;
        }
        self.problem.replace_constraints(constraints)
    }

    fn add_constraint(&mut self, constraint: &Constraint) -> Result<()> {
        self.check_constraint(constraint)?;
        self.problem.add_constraint(constraint)
    }

    fn set_timeout(&mut self, seconds: f64) {
        self.tuning.time_limit = Some(seconds);
    }

    fn set_optimality_gap(&mut self, gap: f64, absolute: bool) {
        self.tuning.set_optimality_gap(gap, absolute);
    }

    fn set_num_threads(&mut self, num_threads: u32) {
        self.tuning.set_num_threads(num_threads);
    }

    fn set_verbose(&mut self, verbose: bool) {
        self.tuning.verbose = verbose;
    }

    fn set_event_callback(&mut self, callback: Option<EventCallback>) -> Result<()> {
        self.events.set_callback(callback);
        Ok(())
    }

    fn has_event_callback(&self) -> bool {
        self.events.has_listener()
    }

    fn solve(&mut self, solution: &mut Solution) -> Result<SolveOutcome> {
        self.problem.ensure_initialized("solve")?;

        let start_time = Instant::now();
        let num_vars = self.problem.num_variables();
        let objective = self.problem.objective();

        // Build variables using good_lp
        let mut vars = variables!();
        let mut lp_variables: Vec<GoodLpVariable> = Vec::with_capacity(num_vars);
        for &variable_type in self.problem.variable_types() {
            let (lower, upper) = variable_type.default_bounds();
            let definition = variable().min(lower).max(upper);
            let var = match variable_type {
                VariableType::Binary | VariableType::Integer => vars.add(definition.integer()),
                VariableType::Continuous => vars.add(definition),
            };
            lp_variables.push(var);
        }

        // Build objective expression
        let mut obj_expr: Expression = objective.constant().into();
        for (i, &coeff) in objective.coefficients().iter().enumerate() {
            if coeff != 0.0 {
                obj_expr += coeff * lp_variables[i];
            }
        }

        let mut lp_model = match objective.sense() {
            Sense::Minimize => vars.minimise(obj_expr),
            Sense::Maximize => vars.maximise(obj_expr),
        }
        .using(coin_cbc::coin_cbc);

        lp_model.set_parameter("logLevel", if self.tuning.verbose { "1" } else { "0" });
        if let Some(limit) = self.tuning.time_limit {
            lp_model.set_parameter("seconds", &limit.to_string());
        }
        if let Some(gap) = self.tuning.relative_gap {
            lp_model.set_parameter("ratioGap", &gap.to_string());
        }
        if let Some(gap) = self.tuning.absolute_gap {
            lp_model.set_parameter("allowableGap", &gap.to_string());
        }
        if let Some(threads) = self.tuning.num_threads {
            lp_model.set_parameter("threads", &threads.to_string());
        }

        // Build constraints
        for constraint in self.problem.constraints() {
            let mut lhs: Expression = 0.into();
            for (&i, &coeff) in constraint.coefficients() {
                lhs += coeff * lp_variables[i];
            }

            lp_model = match constraint.relation() {
                Relation::LessEqual => lp_model.with(lhs.leq(constraint.value())),
                Relation::Equal => lp_model.with(lhs.eq(constraint.value())),
                Relation::GreaterEqual => lp_model.with(lhs.geq(constraint.value())),
            };
        }

        self.events.emit_with(|| {
            EventData::new(event_type_name(CbcEvent::ModelBuilt), BACKEND_ID)
                .with("num_cols", num_vars)
                .with("num_rows", self.problem.constraints().len())
        });

        // Solve the problem
        let solution_result = lp_model.solve();
        let runtime = start_time.elapsed().as_secs_f64();

        let (outcome, values, best_possible) = match solution_result {
            Ok(sol) => {
                let values: Vec<f64> = lp_variables.iter().map(|&var| sol.value(var)).collect();
                let outcome = self.classify(sol.status(), &values);
                (outcome, values, Some(sol.raw().best_possible_value()))
            }
            Err(ResolutionError::Infeasible) => (
                SolveOutcome::new(
                    SolveStatus::Infeasible,
                    "Problem is infeasible: no solution satisfies all constraints",
                ),
                Vec::new(),
                None,
            ),
            Err(ResolutionError::Unbounded) => (
                SolveOutcome::new(
                    SolveStatus::Unbounded,
                    "Problem is unbounded: objective can be improved infinitely",
                ),
                Vec::new(),
                None,
            ),
            // good_lp reports a stop without an incumbent as a bare "Stopped"
            Err(ResolutionError::Other("Stopped")) if self.tuning.time_limit.is_some() => (
                SolveOutcome::new(
                    SolveStatus::TimeLimitInfeasible,
                    "Time limit reached before a feasible solution was found",
                ),
                Vec::new(),
                None,
            ),
            Err(e) => {
                return Err(SolverError::Native {
                    call: "Cbc_solve",
                    file: file!(),
                    line: line!(),
                    message: e.to_string(),
                })
            }
        };

        debug!(
            component = "solver",
            backend = BACKEND_ID,
            operation = "solve",
            status = %outcome.status,
            runtime,
            "CBC finished"
        );
        self.events.emit_with(|| {
            EventData::new(event_type_name(CbcEvent::Status), BACKEND_ID)
                .with("status", outcome.status.to_string())
                .with("runtime", runtime)
        });

        if !outcome.has_solution() {
            return Ok(outcome);
        }

        let objective_value = self.problem.objective().evaluate(&values);
        solution.resize(num_vars);
        for (var, value) in values.into_iter().enumerate() {
            solution[var] = value;
        }
        solution.set_value(objective_value);
        solution.set_time(runtime);

        let dual_bound = self.problem.dual_bound(best_possible, objective_value);
        self.events.emit_with(|| {
            EventData::new(event_type_name(CbcEvent::Solved), BACKEND_ID)
                .with_bounds(objective_value, dual_bound)
                .with("runtime", runtime)
        });

        Ok(outcome)
    }
}
