use crate::domain::{LoadAttempt, Preference, Result, SolverBackend, SolverError};
use crate::solver::loader::{
    module_file_name, BackendLoader, BackendModule, LoadError, RegistryLoader, ENTRY_POINT,
};
use std::any::Any;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Environment variable overriding the default module search directory.
pub const BACKEND_DIR_ENV: &str = "MIPBRIDGE_BACKEND_DIR";

/// A backend together with the module that produced it
///
/// Fields drop in declaration order, so the backend is always gone before
/// the module handle is released.
pub struct ResolvedBackend {
    backend: Box<dyn SolverBackend>,
    module: Arc<dyn BackendModule>,
    path: PathBuf,
}

impl ResolvedBackend {
    pub fn module_name(&self) -> &str {
        self.module.name()
    }

    /// Path the module was resolved from.
    pub fn module_path(&self) -> &Path {
        &self.path
    }
}

impl Deref for ResolvedBackend {
    type Target = dyn SolverBackend;

    fn deref(&self) -> &Self::Target {
        self.backend.as_ref()
    }
}

impl DerefMut for ResolvedBackend {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.backend.as_mut()
    }
}

impl fmt::Debug for ResolvedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedBackend")
            .field("backend", &self.backend.name())
            .field("module", &self.module.name())
            .field("path", &self.path)
            .finish()
    }
}

/// Factory for resolving solver backends based on a preference
pub struct SolverFactory {
    loader: Arc<dyn BackendLoader>,
    search_dir: PathBuf,
}

impl SolverFactory {
    pub fn new(loader: Arc<dyn BackendLoader>, search_dir: impl Into<PathBuf>) -> Self {
        Self {
            loader,
            search_dir: search_dir.into(),
        }
    }

    /// Factory over the engines compiled into this crate, searching the
    /// default directory.
    pub fn builtin() -> Self {
        Self::new(Arc::new(RegistryLoader::builtin()), default_search_dir())
    }

    pub fn with_search_dir(mut self, search_dir: impl Into<PathBuf>) -> Self {
        self.search_dir = search_dir.into();
        self
    }

    pub fn search_dir(&self) -> &Path {
        &self.search_dir
    }

    /// Module paths tried for `preference`, in order.
    pub fn candidates(&self, preference: Preference) -> Vec<PathBuf> {
        preference
            .engines()
            .into_iter()
            .map(|engine| self.search_dir.join(module_file_name(engine)))
            .collect()
    }

    /// Resolve the first candidate that loads and constructs.
    ///
    /// A failing candidate is logged and skipped. When all fail, the error
    /// lists every attempted module with its reason.
    pub fn create_solver_backend(&self, preference: Preference) -> Result<ResolvedBackend> {
        let mut attempts = Vec::new();

        for path in self.candidates(preference) {
            info!(
                component = "factory",
                operation = "load_backend",
                module = %path.display(),
                "Trying to load backend"
            );

            match self.load(&path) {
                Ok(resolved) => {
                    info!(
                        component = "factory",
                        operation = "load_backend",
                        status = "success",
                        backend = resolved.name(),
                        module = %path.display(),
                        "Backend loaded"
                    );
                    return Ok(resolved);
                }
                Err(err) => {
                    warn!(
                        component = "factory",
                        operation = "load_backend",
                        status = "error",
                        module = %path.display(),
                        error = %err,
                        "Failed to load backend"
                    );
                    attempts.push(LoadAttempt {
                        module: path,
                        reason: err.to_string(),
                    });
                }
            }
        }

        Err(SolverError::Resolution {
            preference,
            attempts,
        })
    }

    fn load(&self, path: &Path) -> std::result::Result<ResolvedBackend, LoadError> {
        let module = self.loader.open(path)?;
        let constructor =
            module
                .entry_point(ENTRY_POINT)
                .ok_or_else(|| LoadError::MissingEntryPoint {
                    path: path.to_path_buf(),
                    symbol: ENTRY_POINT.to_string(),
                })?;
        let constructed =
            panic::catch_unwind(constructor).map_err(|payload| LoadError::ConstructionPanicked {
                path: path.to_path_buf(),
                message: panic_message(payload.as_ref()),
            })?;
        let backend = constructed.map_err(|source| LoadError::Construction {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;

        Ok(ResolvedBackend {
            backend,
            module,
            path: path.to_path_buf(),
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl Default for SolverFactory {
    fn default() -> Self {
        Self::builtin()
    }
}

/// `MIPBRIDGE_BACKEND_DIR` if set, else the directory of the running
/// executable, else the working directory.
pub fn default_search_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(BACKEND_DIR_ENV) {
        return PathBuf::from(dir);
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specific_preference_has_single_candidate() {
        let factory = SolverFactory::new(Arc::new(RegistryLoader::new()), "/opt/mods");
        let candidates = factory.candidates(Preference::CoinCbc);
        assert_eq!(
            candidates,
            vec![Path::new("/opt/mods").join(module_file_name(Preference::CoinCbc))]
        );
    }

    #[test]
    fn any_preference_follows_priority_order() {
        let factory = SolverFactory::new(Arc::new(RegistryLoader::new()), "/opt/mods");
        let candidates = factory.candidates(Preference::Any);
        assert_eq!(candidates.len(), 2);
        assert!(candidates[0].ends_with(module_file_name(Preference::Highs)));
        assert!(candidates[1].ends_with(module_file_name(Preference::CoinCbc)));
    }

    #[test]
    fn panic_payloads_are_rendered() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("bang")), "bang");
        assert_eq!(panic_message(&42_u8), "unknown panic payload");
    }

    #[test]
    fn empty_registry_exhausts_all_candidates() {
        let factory = SolverFactory::new(Arc::new(RegistryLoader::new()), "/opt/mods");
        let err = factory.create_solver_backend(Preference::Any).unwrap_err();
        let message = err.to_string();
        assert!(message.contains(&module_file_name(Preference::Highs)));
        assert!(message.contains(&module_file_name(Preference::CoinCbc)));
        match err {
            SolverError::Resolution { attempts, .. } => assert_eq!(attempts.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
