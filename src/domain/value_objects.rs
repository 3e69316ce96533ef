// Domain value objects representing core problem concepts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type of decision variable in the optimization problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    /// Continuous real number (x ∈ ℝ)
    #[default]
    Continuous,
    /// Integer number (x ∈ ℤ)
    Integer,
    /// Binary variable (x ∈ {0, 1})
    Binary,
}

impl VariableType {
    /// Bounds a freshly declared variable of this type receives.
    ///
    /// Binary variables live in `[0, 1]`, everything else is free.
    pub fn default_bounds(self) -> (f64, f64) {
        match self {
            VariableType::Binary => (0.0, 1.0),
            VariableType::Integer | VariableType::Continuous => {
                (f64::NEG_INFINITY, f64::INFINITY)
            }
        }
    }

    pub fn is_integral(self) -> bool {
        matches!(self, VariableType::Integer | VariableType::Binary)
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableType::Continuous => write!(f, "Continuous"),
            VariableType::Integer => write!(f, "Integer"),
            VariableType::Binary => write!(f, "Binary"),
        }
    }
}

/// Comparison linking a constraint's weighted sum to its bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Less than or equal (≤)
    #[default]
    LessEqual,
    /// Greater than or equal (≥)
    GreaterEqual,
    /// Equal (=)
    Equal,
}

impl Relation {
    /// Two-sided row bounds `(lower, upper)` for a constraint with this
    /// relation and right-hand side `value`.
    ///
    /// Inequalities collapse the open side to an infinity, equality pins both
    /// sides to `value`.
    pub fn bounds(self, value: f64) -> (f64, f64) {
        match self {
            Relation::LessEqual => (f64::NEG_INFINITY, value),
            Relation::GreaterEqual => (value, f64::INFINITY),
            Relation::Equal => (value, value),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Relation::LessEqual => "<=",
            Relation::GreaterEqual => ">=",
            Relation::Equal => "==",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A relation string that is neither an operator nor a variant name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown relation {0:?}, expected one of <=, >=, =, ==")]
pub struct ParseRelationError(String);

impl FromStr for Relation {
    type Err = ParseRelationError;

    /// Accepts the operators `<=`, `>=`, `=`, `==` and the variant names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "<=" | "LessEqual" => Ok(Relation::LessEqual),
            ">=" | "GreaterEqual" => Ok(Relation::GreaterEqual),
            "=" | "==" | "Equal" => Ok(Relation::Equal),
            other => Err(ParseRelationError(other.to_string())),
        }
    }
}

/// Direction of optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sense {
    /// Minimize the objective function
    #[default]
    Minimize,
    /// Maximize the objective function
    Maximize,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sense::Minimize => write!(f, "Minimize"),
            Sense::Maximize => write!(f, "Maximize"),
        }
    }
}

/// Outcome of a solve call
///
/// These are ordinary results, not errors: a backend reports them through
/// [`SolveOutcome`](super::models::SolveOutcome) and never fails because of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolveStatus {
    /// Proven optimal solution found
    Optimal,
    /// Feasible solution found, stopped by a gap or other limit
    Suboptimal,
    /// Time limit reached with at least one feasible solution
    TimeLimitFeasible,
    /// Time limit reached before any feasible solution was found
    TimeLimitInfeasible,
    /// Problem has no feasible solution
    Infeasible,
    /// Objective can be improved infinitely
    Unbounded,
    /// Engine stopped without a usable result
    Error,
}

impl SolveStatus {
    /// Whether the engine produced at least one feasible solution.
    pub fn has_solution(self) -> bool {
        matches!(
            self,
            SolveStatus::Optimal | SolveStatus::Suboptimal | SolveStatus::TimeLimitFeasible
        )
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "Optimal"),
            SolveStatus::Suboptimal => write!(f, "Suboptimal"),
            SolveStatus::TimeLimitFeasible => write!(f, "Time Limit Reached (feasible)"),
            SolveStatus::TimeLimitInfeasible => write!(f, "Time Limit Reached (no solution)"),
            SolveStatus::Infeasible => write!(f, "Infeasible"),
            SolveStatus::Unbounded => write!(f, "Unbounded"),
            SolveStatus::Error => write!(f, "Error"),
        }
    }
}

/// Solver backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preference {
    /// First available engine in priority order
    #[default]
    Any,
    /// HiGHS solver
    Highs,
    /// COIN-OR CBC solver
    CoinCbc,
}

impl Preference {
    /// Engines tried for `Any`, highest priority first.
    pub const PRIORITY: [Preference; 2] = [Preference::Highs, Preference::CoinCbc];

    /// Engines this preference expands to, in the order they are tried.
    pub fn engines(self) -> Vec<Preference> {
        match self {
            Preference::Any => Self::PRIORITY.to_vec(),
            engine => vec![engine],
        }
    }

    /// Short engine identifier used in module names and event payloads.
    ///
    /// `Any` has no engine and yields `"any"`.
    pub fn engine_id(self) -> &'static str {
        match self {
            Preference::Any => "any",
            Preference::Highs => "highs",
            Preference::CoinCbc => "cbc",
        }
    }
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preference::Any => write!(f, "Any"),
            Preference::Highs => write!(f, "HiGHS"),
            Preference::CoinCbc => write!(f, "COIN-OR CBC"),
        }
    }
}
