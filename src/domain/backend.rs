// Backend contract for solving optimization problems
// Every engine adapter implements `SolverBackend`; callers only ever see the trait.

use super::events::EventCallback;
use super::models::{Constraint, Constraints, Objective, Solution, SolveOutcome};
use super::value_objects::{Preference, VariableType};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// One failed attempt to resolve a backend module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadAttempt {
    pub module: PathBuf,
    pub reason: String,
}

impl fmt::Display for LoadAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.module.display(), self.reason)
    }
}

fn format_attempts(attempts: &[LoadAttempt]) -> String {
    if attempts.is_empty() {
        return "no candidate modules".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error types for solver backends
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    #[error("{backend} does not support {feature}")]
    Unsupported {
        backend: String,
        feature: &'static str,
    },

    #[error(
        "No suitable solver backend available for preference {preference}, tried: {}",
        format_attempts(.attempts)
    )]
    Resolution {
        preference: Preference,
        attempts: Vec<LoadAttempt>,
    },

    #[error("{call} failed at {file}:{line}: {message}")]
    Native {
        call: &'static str,
        file: &'static str,
        line: u32,
        message: String,
    },

    #[error("Solver execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, SolverError>;

/// Wrap the error of a native engine call with the call name and source location.
///
/// ```ignore
/// let solved = native_call!("Highs_run", model.try_solve())?;
/// ```
#[macro_export]
macro_rules! native_call {
    ($call:expr, $result:expr) => {
        ($result).map_err(|err| $crate::domain::SolverError::Native {
            call: $call,
            file: file!(),
            line: line!(),
            message: format!("{:?}", err),
        })
    };
}

/// Optional features a backend may offer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub quadratic_objective: bool,
    pub quadratic_constraints: bool,
    pub events: bool,
}

/// Contract that every solver engine adapter implements
///
/// The call sequence is `initialize`, `set_objective`, `set_constraints` (or
/// `add_constraint`), optional tuning calls, then `solve`. Instances are not
/// meant for concurrent use; callers serialize access.
pub trait SolverBackend: Send {
    /// Get the name of this solver backend
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Declare `num_variables` variables of `variable_type`, discarding any
    /// variables and constraints of a previous problem.
    fn initialize(&mut self, num_variables: usize, variable_type: VariableType) -> Result<()> {
        self.initialize_with_types(num_variables, variable_type, &BTreeMap::new())
    }

    /// Like [`initialize`](Self::initialize), with per-variable type overrides.
    fn initialize_with_types(
        &mut self,
        num_variables: usize,
        default_type: VariableType,
        special_types: &BTreeMap<usize, VariableType>,
    ) -> Result<()>;

    /// Push sense, constant and coefficients of `objective` into the engine.
    fn set_objective(&mut self, objective: &Objective) -> Result<()>;

    /// Replace all constraints with `constraints`.
    fn set_constraints(&mut self, constraints: &Constraints) -> Result<()>;

    /// Append one constraint, leaving existing ones untouched.
    fn add_constraint(&mut self, constraint: &Constraint) -> Result<()>;

    /// Time limit in seconds for subsequent solves.
    fn set_timeout(&mut self, seconds: f64);

    /// Stop once the gap between primal and dual bound falls below `gap`,
    /// relative to the primal bound unless `absolute` is set.
    fn set_optimality_gap(&mut self, gap: f64, absolute: bool);

    /// Number of engine threads. Zero leaves the choice to the engine.
    fn set_num_threads(&mut self, num_threads: u32);

    fn set_verbose(&mut self, verbose: bool);

    /// Register (or with `None`, remove) the progress event listener.
    fn set_event_callback(&mut self, _callback: Option<EventCallback>) -> Result<()> {
        Err(SolverError::Unsupported {
            backend: self.name().to_string(),
            feature: "event callbacks",
        })
    }

    fn has_event_callback(&self) -> bool {
        false
    }

    /// Run the engine.
    ///
    /// `solution` is resized and filled only when the returned outcome
    /// [has a solution](SolveOutcome::has_solution). Limits, infeasibility and
    /// the like are outcomes, not errors.
    fn solve(&mut self, solution: &mut Solution) -> Result<SolveOutcome>;

    /// Reject objectives this backend cannot represent.
    fn check_objective(&self, objective: &Objective) -> Result<()> {
        if objective.has_quadratic_terms() && !self.capabilities().quadratic_objective {
            return Err(SolverError::Unsupported {
                backend: self.name().to_string(),
                feature: "quadratic objectives",
            });
        }
        Ok(())
    }

    /// Reject constraints this backend cannot represent.
    fn check_constraint(&self, constraint: &Constraint) -> Result<()> {
        if constraint.is_quadratic() && !self.capabilities().quadratic_constraints {
            return Err(SolverError::Unsupported {
                backend: self.name().to_string(),
                feature: "quadratic constraints",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn resolution_error_names_every_attempt() {
        let err = SolverError::Resolution {
            preference: Preference::Any,
            attempts: vec![
                LoadAttempt {
                    module: Path::new("/opt/mods/a.so").to_path_buf(),
                    reason: "module not found".to_string(),
                },
                LoadAttempt {
                    module: Path::new("/opt/mods/b.so").to_path_buf(),
                    reason: "symbol missing".to_string(),
                },
            ],
        };
        let message = err.to_string();
        assert!(message.contains("preference Any"));
        assert!(message.contains("/opt/mods/a.so (module not found)"));
        assert!(message.contains("/opt/mods/b.so (symbol missing)"));
    }

    #[test]
    fn native_call_records_location() {
        let failed: std::result::Result<(), &str> = Err("status -1");
        let err = native_call!("Highs_run", failed).unwrap_err();
        match err {
            SolverError::Native {
                call, file, line, ..
            } => {
                assert_eq!(call, "Highs_run");
                assert!(file.ends_with("backend.rs"));
                assert!(line > 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
