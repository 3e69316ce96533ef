// Domain layer: problem data model, backend contract, event bridge
pub mod domain;

// Application layer: configuration and the caller-facing solver
pub mod application;

// Infrastructure layer: logging setup
pub mod infrastructure;

// Solver layer: backend resolution and engine adapters
pub mod solver;

// Re-export commonly used types
pub use domain::{
    progress_gap, Capabilities, Constraint, Constraints, EventCallback, EventData, EventEmitter,
    EventValue, LinearConstraint, LoadAttempt, Objective, ParseRelationError, Preference,
    Relation, Result, Sense, Solution, SolveOutcome, SolveStatus, SolverBackend, SolverError,
    VariableType,
};

pub use application::{
    solve, solve_with_factory, ConfigError, SolveOptions, SolveReport, Solver, SolverConfig,
};

pub use infrastructure::LoggingConfig;

pub use solver::{
    BackendLoader, BackendModule, LoadError, RegistryLoader, ResolvedBackend, SolverFactory,
};

#[cfg(feature = "coin_cbc")]
pub use solver::CoinCbcSolver;
#[cfg(feature = "highs")]
pub use solver::HighsSolver;
