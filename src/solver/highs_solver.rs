// HiGHS backend: stages the problem, then builds a column-wise RowProblem per solve
#![allow(unsafe_code)]

use crate::domain::{
    Capabilities, Constraint, Constraints, EventCallback, EventData, EventEmitter, Objective,
    Result, Sense, Solution, SolveOutcome, SolveStatus, SolverBackend, SolverError,
    VariableType,
};
use crate::solver::staging::{StagedProblem, Tuning};
use highs::{Col, HighsModelStatus, Model, RowProblem, Sense as HighsSense, SolvedModel};
use highs_sys::HighsInt;
use parking_lot::{const_rwlock, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::BTreeMap;
use std::ffi::CString;
use std::time::Instant;
use tracing::debug;

const BACKEND_ID: &str = "highs";

/// `Highs_passHessian` format code for a lower-triangular, column-wise matrix.
const HESSIAN_TRIANGULAR: HighsInt = 1;

/// Thread setting the process-wide HiGHS scheduler was started with, once a
/// solve has run. Solves hold a read guard; changing the setting takes the
/// write side and restarts the scheduler.
static SCHEDULER_THREADS: RwLock<Option<Option<u32>>> = const_rwlock(None);

/// Hold the scheduler at `threads` for the duration of one solve.
///
/// HiGHS refuses to run with a thread count that differs from the one its
/// global scheduler was started with, so a change is applied by restarting
/// the scheduler once every running solve has finished.
fn hold_scheduler(threads: Option<u32>) -> RwLockReadGuard<'static, Option<Option<u32>>> {
    {
        let current = SCHEDULER_THREADS.read();
        if *current == Some(threads) {
            return current;
        }
    }

    let mut current = SCHEDULER_THREADS.write();
    if let Some(previous) = *current {
        if previous != threads {
            debug!(
                component = "solver",
                backend = BACKEND_ID,
                operation = "reset_scheduler",
                ?previous,
                ?threads,
                "Restarting HiGHS scheduler"
            );
            // SAFETY: the write guard excludes every other HiGHS run in this process.
            unsafe { highs_sys::Highs_resetGlobalScheduler(1) };
        }
    }
    *current = Some(threads);
    RwLockWriteGuard::downgrade(current)
}

fn to_highs_int(n: usize) -> Result<HighsInt> {
    HighsInt::try_from(n).map_err(|_| {
        SolverError::InvalidProblem(format!("{} exceeds the HiGHS index range", n))
    })
}

/// Points in a HiGHS solve reported to the event listener
#[derive(Debug, Clone, Copy)]
enum HighsEvent {
    ModelBuilt,
    Status,
    Solved,
}

fn event_type_name(event: HighsEvent) -> &'static str {
    match event {
        HighsEvent::ModelBuilt => "MODEL_BUILT",
        HighsEvent::Status => "STATUS",
        HighsEvent::Solved => "SOLVED",
    }
}

/// Module entry point registered with the backend registry.
pub fn create_solver_backend() -> Result<Box<dyn SolverBackend>> {
    Ok(Box::new(HighsSolver::new()))
}

pub struct HighsSolver {
    problem: StagedProblem,
    tuning: Tuning,
    events: EventEmitter,
}

impl HighsSolver {
    pub fn new() -> Self {
        Self {
            problem: StagedProblem::default(),
            tuning: Tuning::default(),
            events: EventEmitter::new(),
        }
    }

    fn build_problem(&self) -> RowProblem {
        let objective = self.problem.objective();
        let mut pb = RowProblem::default();
        let mut cols: Vec<Col> = Vec::with_capacity(self.problem.num_variables());

        for (var, &variable_type) in self.problem.variable_types().iter().enumerate() {
            let (lower, upper) = variable_type.default_bounds();
            let coef = objective.coefficient(var);
            let col = match variable_type {
                VariableType::Integer | VariableType::Binary => {
                    pb.add_integer_column(coef, lower..=upper)
                }
                VariableType::Continuous => pb.add_column(coef, lower..=upper),
            };
            cols.push(col);
        }

        for constraint in self.problem.constraints() {
            let factors: Vec<(Col, f64)> = constraint
                .coefficients()
                .iter()
                .map(|(&var, &coef)| (cols[var], coef))
                .collect();
            let (lower, upper) = constraint.relation().bounds(constraint.value());
            pb.add_row(lower..=upper, &factors);
        }

        pb
    }

    /// Pass the quadratic objective terms as HiGHS's Hessian `Q` in
    /// `c'x + 1/2 x'Qx`: diagonal entries double, off-diagonal ones fill the
    /// lower triangle.
    fn pass_hessian(&self, model: &mut Model) -> Result<()> {
        let quadratic = self.problem.objective().quadratic_coefficients();
        if quadratic.is_empty() {
            return Ok(());
        }

        let dim = self.problem.num_variables();
        let mut start = Vec::with_capacity(dim);
        let mut index = Vec::with_capacity(quadratic.len());
        let mut value = Vec::with_capacity(quadratic.len());
        // keys are (i, j) with i <= j, sorted: column i, rows ascending
        let mut entries = quadratic.iter().peekable();
        for col in 0..dim {
            start.push(to_highs_int(index.len())?);
            while let Some((&(i, j), &coef)) = entries.next_if(|&(&(i, _), _)| i == col) {
                index.push(to_highs_int(j)?);
                value.push(if i == j { 2.0 * coef } else { coef });
            }
        }

        // SAFETY: the three arrays hold `dim` starts and `nnz` entries as the call expects.
        let status = unsafe {
            highs_sys::Highs_passHessian(
                model.as_mut_ptr(),
                to_highs_int(dim)?,
                to_highs_int(index.len())?,
                HESSIAN_TRIANGULAR,
                start.as_ptr(),
                index.as_ptr(),
                value.as_ptr(),
            )
        };
        if status < highs_sys::STATUS_OK {
            return Err(SolverError::Native {
                call: "Highs_passHessian",
                file: file!(),
                line: line!(),
                message: format!("status {}", status),
            });
        }
        Ok(())
    }

    /// HiGHS's MIP dual bound, if the engine has one.
    fn mip_dual_bound(solved: &SolvedModel) -> Option<f64> {
        let name = CString::new("mip_dual_bound").ok()?;
        let mut value = 0.0;
        // SAFETY: `solved` owns a live HiGHS instance and `name` is NUL-terminated.
        let status = unsafe {
            highs_sys::Highs_getDoubleInfoValue(solved.as_ptr(), name.as_ptr(), &raw mut value)
        };
        (status == highs_sys::STATUS_OK).then_some(value)
    }

    fn classify(&self, status: HighsModelStatus, values: &[f64]) -> SolveOutcome {
        match status {
            HighsModelStatus::Optimal => {
                SolveOutcome::new(SolveStatus::Optimal, "Optimal solution found")
            }
            HighsModelStatus::ModelEmpty => SolveOutcome::new(
                SolveStatus::Optimal,
                "Model is empty, objective reduces to its constant",
            ),
            HighsModelStatus::ReachedTimeLimit => {
                if self.problem.is_feasible(values) {
                    SolveOutcome::new(
                        SolveStatus::TimeLimitFeasible,
                        "Time limit reached, returning best feasible solution",
                    )
                } else {
                    SolveOutcome::new(
                        SolveStatus::TimeLimitInfeasible,
                        "Time limit reached before a feasible solution was found",
                    )
                }
            }
            HighsModelStatus::ReachedIterationLimit
            | HighsModelStatus::ObjectiveBound
            | HighsModelStatus::ObjectiveTarget
                if self.problem.is_feasible(values) =>
            {
                SolveOutcome::new(
                    SolveStatus::Suboptimal,
                    format!("Stopped early ({:?}) with a feasible solution", status),
                )
            }
            HighsModelStatus::Infeasible => SolveOutcome::new(
                SolveStatus::Infeasible,
                "Problem is infeasible: no solution satisfies all constraints",
            ),
            HighsModelStatus::Unbounded => SolveOutcome::new(
                SolveStatus::Unbounded,
                "Problem is unbounded: objective can be improved infinitely",
            ),
            HighsModelStatus::UnboundedOrInfeasible => SolveOutcome::new(
                SolveStatus::Unbounded,
                "Problem is unbounded or infeasible",
            ),
            status => SolveOutcome::new(
                SolveStatus::Error,
                format!("HiGHS returned status {:?} without a solution", status),
            ),
        }
    }
}

impl Default for HighsSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverBackend for HighsSolver {
    fn name(&self) -> &str {
        "HiGHS"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            quadratic_objective: true,
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
            .reset(num_variables, default_type, special_types)?;
        debug!(
            component = "solver",
            backend = BACKEND_ID,
            operation = "initialize",
            num_variables,
            num_integer = self.problem.num_integer_variables(),
            "Declared variables"
        );
        Ok(())
    }

    fn set_objective(&mut self, objective: &Objective) -> Result<()> {
        self.check_objective(objective)?;
        if objective.has_quadratic_terms() && self.problem.num_integer_variables() > 0 {
            return Err(SolverError::Unsupported {
                backend: self.name().to_string(),
                feature: "quadratic objectives over integer variables",
            });
        }
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
        let pb = self.build_problem();
        let num_variables = self.problem.num_variables();
        let num_constraints = self.problem.constraints().len();

        self.events.emit_with(|| {
            EventData::new(event_type_name(HighsEvent::ModelBuilt), BACKEND_ID)
                .with("num_cols", num_variables)
                .with("num_rows", num_constraints)
        });

        let sense = match self.problem.objective().sense() {
            Sense::Minimize => HighsSense::Minimise,
            Sense::Maximize => HighsSense::Maximise,
        };
        let mut model = pb.optimise(sense);
        if self.tuning.verbose {
            model.set_option("output_flag", true);
        } else {
            model.make_quiet();
        }
        if let Some(limit) = self.tuning.time_limit {
            model.set_option("time_limit", limit);
        }
        if let Some(gap) = self.tuning.relative_gap {
            model.set_option("mip_rel_gap", gap);
        }
        if let Some(gap) = self.tuning.absolute_gap {
            model.set_option("mip_abs_gap", gap);
        }
        if let Some(threads) = self.tuning.num_threads {
            model.set_option("threads", i32::try_from(threads).unwrap_or(i32::MAX));
        }
        self.pass_hessian(&mut model)?;

        let scheduler = hold_scheduler(self.tuning.num_threads);
        let solved = crate::native_call!("Highs_run", model.try_solve())?;
        drop(scheduler);
        let runtime = start_time.elapsed().as_secs_f64();
        let status = solved.status();
        let values = solved.get_solution().columns().to_vec();
        let outcome = self.classify(status, &values);

        debug!(
            component = "solver",
            backend = BACKEND_ID,
            operation = "solve",
            ?status,
            runtime,
            num_variables,
            num_constraints,
            "HiGHS finished"
        );
        self.events.emit_with(|| {
            EventData::new(event_type_name(HighsEvent::Status), BACKEND_ID)
                .with("status", format!("{:?}", status))
                .with("runtime", runtime)
        });

        if !outcome.has_solution() {
            return Ok(outcome);
        }

        let objective_value = self.problem.objective().evaluate(&values);
        solution.resize(num_variables);
        for (var, value) in values.iter().enumerate().take(num_variables) {
            solution[var] = *value;
        }
        solution.set_value(objective_value);
        solution.set_time(runtime);

        let dual_bound = self
            .problem
            .dual_bound(Self::mip_dual_bound(&solved), objective_value);
        self.events.emit_with(|| {
            EventData::new(event_type_name(HighsEvent::Solved), BACKEND_ID)
                .with_bounds(objective_value, dual_bound)
                .with("runtime", runtime)
        });

        Ok(outcome)
    }
}
