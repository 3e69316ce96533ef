// Application layer: configuration and the caller-facing solver

pub mod config;
pub mod functional;
pub mod solver;

pub use config::{ConfigError, SolverConfig};
pub use functional::{solve, solve_with_factory, SolveOptions};
pub use solver::{SolveReport, Solver};
