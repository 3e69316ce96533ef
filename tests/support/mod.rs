//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use mipbridge::solver::{module_file_name, BackendConstructor, ENTRY_POINT};
use mipbridge::{
    BackendLoader, BackendModule, Capabilities, Constraint, Constraints, EventCallback,
    EventData, EventEmitter, LoadError, Objective, Preference, Result, Solution, SolveOutcome,
    SolveStatus, SolverBackend, SolverError, VariableType,
};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

thread_local! {
    /// Drop notifications, in the order they happened on this thread.
    pub static DROPS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

pub fn take_drops() -> Vec<String> {
    DROPS.with(|drops| drops.borrow_mut().drain(..).collect())
}

/// Backend that "solves" by evaluating the all-zero point.
///
/// Zero is reported optimal when it satisfies every constraint and infeasible
/// otherwise. A zero time limit yields a timeout without a solution.
pub struct FakeBackend {
    name: String,
    types: Vec<VariableType>,
    objective: Objective,
    constraints: Constraints,
    time_limit: Option<f64>,
    gap: Option<(f64, bool)>,
    threads: u32,
    verbose: bool,
    events_supported: bool,
    events: EventEmitter,
}

impl FakeBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            types: Vec::new(),
            objective: Objective::default(),
            constraints: Constraints::new(),
            time_limit: None,
            gap: None,
            threads: 0,
            verbose: false,
            events_supported: true,
            events: EventEmitter::new(),
        }
    }

    /// Accepts a listener but declares no event support.
    pub fn without_events(mut self) -> Self {
        self.events_supported = false;
        self
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        let name = format!("backend:{}", self.name);
        DROPS.with(|drops| drops.borrow_mut().push(name));
    }
}

impl SolverBackend for FakeBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            quadratic_objective: false,
            quadratic_constraints: true,
            events: self.events_supported,
        }
    }

    fn initialize_with_types(
        &mut self,
        num_variables: usize,
        default_type: VariableType,
        special_types: &BTreeMap<usize, VariableType>,
    ) -> Result<()> {
        self.types = (0..num_variables)
            .map(|v| special_types.get(&v).copied().unwrap_or(default_type))
            .collect();
        self.objective = Objective::new(num_variables);
        self.constraints.clear();
        Ok(())
    }

    fn set_objective(&mut self, objective: &Objective) -> Result<()> {
        self.check_objective(objective)?;
        self.objective = objective.clone();
        Ok(())
    }

    fn set_constraints(&mut self, constraints: &Constraints) -> Result<()> {
        for constraint in constraints {
            self.check_constraint(constraint)?;
        }
        self.constraints = constraints.clone();
        Ok(())
    }

    fn add_constraint(&mut self, constraint: &Constraint) -> Result<()> {
        self.check_constraint(constraint)?;
        self.constraints.add(constraint.clone());
        Ok(())
    }

    fn set_timeout(&mut self, seconds: f64) {
        self.time_limit = Some(seconds);
    }

    fn set_optimality_gap(&mut self, gap: f64, absolute: bool) {
        self.gap = Some((gap, absolute));
    }

    fn set_num_threads(&mut self, num_threads: u32) {
        self.threads = num_threads;
    }

    fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    fn set_event_callback(&mut self, callback: Option<EventCallback>) -> Result<()> {
        self.events.set_callback(callback);
        Ok(())
    }

    fn has_event_callback(&self) -> bool {
        self.events.has_listener()
    }

    fn solve(&mut self, solution: &mut Solution) -> Result<SolveOutcome> {
        let tuning = format!(
            "timeout={:?} gap={:?} threads={} verbose={}",
            self.time_limit, self.gap, self.threads, self.verbose
        );
        if self.time_limit == Some(0.0) {
            return Ok(SolveOutcome::new(SolveStatus::TimeLimitInfeasible, tuning));
        }

        let mut candidate = Solution::new(self.types.len());
        if self.constraints.iter().any(|c| c.is_violated(&candidate)) {
            return Ok(SolveOutcome::new(SolveStatus::Infeasible, tuning));
        }

        let value = self.objective.evaluate(candidate.values());
        candidate.set_value(value);
        *solution = candidate;
        self.events.emit_with(|| {
            EventData::new("SOLVED", self.name.clone())
                .with_bounds(value, value)
                .with("nodes", 1_i64)
        });
        Ok(SolveOutcome::new(SolveStatus::Optimal, tuning))
    }
}

/// How a scripted module behaves when loaded
#[derive(Clone, Copy)]
pub enum Script {
    Missing,
    NoEntryPoint,
    Constructs(BackendConstructor),
}

pub struct ScriptedModule {
    name: String,
    constructor: Option<BackendConstructor>,
}

impl Drop for ScriptedModule {
    fn drop(&mut self) {
        let name = format!("module:{}", self.name);
        DROPS.with(|drops| drops.borrow_mut().push(name));
    }
}

impl BackendModule for ScriptedModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn entry_point(&self, symbol: &str) -> Option<BackendConstructor> {
        if symbol == ENTRY_POINT {
            self.constructor
        } else {
            None
        }
    }
}

/// Loader that follows a per-engine script and records every path it is asked for.
#[derive(Default)]
pub struct RecordingLoader {
    scripts: BTreeMap<String, Script>,
    pub opened: Mutex<Vec<PathBuf>>,
}

impl RecordingLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, engine: Preference, script: Script) -> Self {
        self.scripts.insert(module_file_name(engine), script);
        self
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().clone()
    }
}

impl BackendLoader for RecordingLoader {
    fn open(&self, path: &Path) -> std::result::Result<Arc<dyn BackendModule>, LoadError> {
        self.opened.lock().push(path.to_path_buf());
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();

        match self.scripts.get(&file_name).copied().unwrap_or(Script::Missing) {
            Script::Missing => Err(LoadError::ModuleNotFound {
                path: path.to_path_buf(),
            }),
            Script::NoEntryPoint => Ok(Arc::new(ScriptedModule {
                name: file_name,
                constructor: None,
            })),
            Script::Constructs(constructor) => Ok(Arc::new(ScriptedModule {
                name: file_name,
                constructor: Some(constructor),
            })),
        }
    }
}

pub fn fake_highs() -> Result<Box<dyn SolverBackend>> {
    Ok(Box::new(FakeBackend::new("fake-highs")))
}

pub fn fake_cbc() -> Result<Box<dyn SolverBackend>> {
    Ok(Box::new(FakeBackend::new("fake-cbc")))
}

pub fn fake_cbc_without_events() -> Result<Box<dyn SolverBackend>> {
    Ok(Box::new(FakeBackend::new("fake-cbc").without_events()))
}

pub fn failing_constructor() -> Result<Box<dyn SolverBackend>> {
    Err(SolverError::ExecutionFailed("license check failed".to_string()))
}

pub fn panicking_constructor() -> Result<Box<dyn SolverBackend>> {
    panic!("engine library is corrupt")
}

/// Backend with only the mandatory operations, used to check defaults.
pub struct BareBackend;

impl SolverBackend for BareBackend {
    fn name(&self) -> &str {
        "bare"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn initialize_with_types(
        &mut self,
        _num_variables: usize,
        _default_type: VariableType,
        _special_types: &BTreeMap<usize, VariableType>,
    ) -> Result<()> {
        Ok(())
    }

    fn set_objective(&mut self, objective: &Objective) -> Result<()> {
        self.check_objective(objective)
    }

    fn set_constraints(&mut self, _constraints: &Constraints) -> Result<()> {
        Ok(())
    }

    fn add_constraint(&mut self, constraint: &Constraint) -> Result<()> {
        self.check_constraint(constraint)
    }

    fn set_timeout(&mut self, _seconds: f64) {}

    fn set_optimality_gap(&mut self, _gap: f64, _absolute: bool) {}

    fn set_num_threads(&mut self, _num_threads: u32) {}

    fn set_verbose(&mut self, _verbose: bool) {}

    fn solve(&mut self, _solution: &mut Solution) -> Result<SolveOutcome> {
        Ok(SolveOutcome::new(SolveStatus::Error, "bare backend cannot solve"))
    }
}

pub fn bare_backend() -> Result<Box<dyn SolverBackend>> {
    Ok(Box::new(BareBackend))
}
