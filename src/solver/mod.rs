// Solver module: backend resolution and engine adapters

pub mod factory;
pub mod loader;
#[cfg_attr(not(any(feature = "highs", feature = "coin_cbc")), allow(dead_code))]
pub(crate) mod staging;

#[cfg(feature = "coin_cbc")]
pub mod coin_cbc_solver;
#[cfg(feature = "highs")]
pub mod highs_solver;

pub use factory::{default_search_dir, ResolvedBackend, SolverFactory, BACKEND_DIR_ENV};
pub use loader::{
    module_file_name, BackendConstructor, BackendLoader, BackendModule, LoadError,
    RegistryLoader, StaticModule, ENTRY_POINT,
};

#[cfg(feature = "coin_cbc")]
pub use coin_cbc_solver::CoinCbcSolver;
#[cfg(feature = "highs")]
pub use highs_solver::HighsSolver;
