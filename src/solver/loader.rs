//! Backend module loading.
//!
//! The factory only talks to a [`BackendLoader`]: it asks for the module at a
//! path, looks up the construction entry point and calls it. How the module
//! comes into existence is up to the loader. [`RegistryLoader`] serves engines
//! compiled into this crate from an explicit registry.

use crate::domain::{Preference, SolverBackend, SolverError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the entry point every backend module exports.
pub const ENTRY_POINT: &str = "create_solver_backend";

const MODULE_PREFIX: &str = "mipbridge-backend-";

/// Zero-argument constructor returning a fresh, owned backend.
pub type BackendConstructor = fn() -> Result<Box<dyn SolverBackend>, SolverError>;

/// File name of the module providing `engine`, e.g. `mipbridge-backend-highs.so`.
pub fn module_file_name(engine: Preference) -> String {
    format!(
        "{}{}{}",
        MODULE_PREFIX,
        engine.engine_id(),
        std::env::consts::DLL_SUFFIX
    )
}

/// Failure to obtain a backend from one candidate module
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("module not found: {}", .path.display())]
    ModuleNotFound { path: PathBuf },

    #[error("entry point '{symbol}' missing in {}", .path.display())]
    MissingEntryPoint { path: PathBuf, symbol: String },

    #[error("construction failed in {}: {source}", .path.display())]
    Construction {
        path: PathBuf,
        #[source]
        source: Box<SolverError>,
    },

    #[error("construction panicked in {}: {message}", .path.display())]
    ConstructionPanicked { path: PathBuf, message: String },
}

/// A loaded module able to hand out backend constructors
///
/// The module must stay alive as long as any backend it constructed.
pub trait BackendModule: Send + Sync {
    fn name(&self) -> &str;

    fn entry_point(&self, symbol: &str) -> Option<BackendConstructor>;
}

/// Strategy for turning a module path into a loaded module
pub trait BackendLoader: Send + Sync {
    fn open(&self, path: &Path) -> Result<Arc<dyn BackendModule>, LoadError>;
}

/// Module backed by a constructor linked into this binary
#[derive(Debug, Clone)]
pub struct StaticModule {
    name: String,
    constructor: BackendConstructor,
}

impl StaticModule {
    pub fn new(name: impl Into<String>, constructor: BackendConstructor) -> Self {
        Self {
            name: name.into(),
            constructor,
        }
    }
}

impl BackendModule for StaticModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn entry_point(&self, symbol: &str) -> Option<BackendConstructor> {
        (symbol == ENTRY_POINT).then_some(self.constructor)
    }
}

/// Loader that resolves module file names against an explicit registry
///
/// Only the file name of the requested path is consulted.
#[derive(Debug, Clone, Default)]
pub struct RegistryLoader {
    modules: BTreeMap<String, BackendConstructor>,
}

impl RegistryLoader {
    /// An empty registry. Every lookup fails until engines are registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every engine compiled into this crate.
    pub fn builtin() -> Self {
        #[allow(unused_mut)]
        let mut loader = Self::new();
        #[cfg(feature = "highs")]
        loader.register(Preference::Highs, crate::solver::highs_solver::create_solver_backend);
        #[cfg(feature = "coin_cbc")]
        loader.register(
            Preference::CoinCbc,
            crate::solver::coin_cbc_solver::create_solver_backend,
        );
        loader
    }

    pub fn register(&mut self, engine: Preference, constructor: BackendConstructor) -> &mut Self {
        self.modules.insert(module_file_name(engine), constructor);
        self
    }

    pub fn is_registered(&self, engine: Preference) -> bool {
        self.modules.contains_key(&module_file_name(engine))
    }
}

impl BackendLoader for RegistryLoader {
    fn open(&self, path: &Path) -> Result<Arc<dyn BackendModule>, LoadError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| LoadError::ModuleNotFound {
                path: path.to_path_buf(),
            })?;

        let constructor =
            self.modules
                .get(file_name)
                .copied()
                .ok_or_else(|| LoadError::ModuleNotFound {
                    path: path.to_path_buf(),
                })?;

        Ok(Arc::new(StaticModule::new(file_name, constructor)))
    }
}
