//! Backend package provisioning and module loading.
//!
//! Resolving a package identifier to loadable code is an external concern;
//! the registry only needs the two-step contract here: make the package
//! available locally, then load it. Transient provisioning failures are
//! retried with a bounded linear backoff before surfacing a terminal error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::sdk::SdkModule;
use crate::{Error, Result};

/// Provisioning attempts before giving up.
const ATTEMPTS: u32 = 3;
/// Base delay between attempts; grows linearly per attempt.
const BACKOFF: Duration = Duration::from_millis(500);

/// Makes backend packages locally available and loads them.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Ensure `package@version` is available locally, returning its path.
    async fn ensure(&self, package: &str, version: &str) -> Result<PathBuf>;

    /// Load the module at a previously ensured path.
    async fn load(&self, path: &Path) -> Result<Arc<dyn SdkModule>>;
}

/// Provision a package, retrying transient `ensure` failures, and return
/// its local path. Loading stays separate because some providers load a
/// subpath of the provisioned package rather than its root.
pub async fn provision(loader: &dyn ModuleLoader, package: &str, version: &str) -> Result<PathBuf> {
    let mut attempt = 1u32;
    loop {
        match loader.ensure(package, version).await {
            Ok(path) => return Ok(path),
            Err(e) if attempt < ATTEMPTS => {
                warn!(package, version, attempt, error = %e, "provisioning failed, retrying");
                tokio::time::sleep(BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(Error::Provision {
                    package: package.to_string(),
                    version: version.to_string(),
                    source: Box::new(e),
                });
            }
        }
    }
}

/// In-memory loader mapping package ids to already-constructed modules.
///
/// Serves embedders that link their backends statically, and tests.
#[derive(Default)]
pub struct StaticModuleLoader {
    modules: Mutex<BTreeMap<String, Arc<dyn SdkModule>>>,
}

impl StaticModuleLoader {
    /// Create an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under a package id.
    pub fn with_module(self, package: impl Into<String>, module: Arc<dyn SdkModule>) -> Self {
        self.modules
            .lock()
            .expect("module lock poisoned")
            .insert(package.into(), module);
        self
    }

    fn package_of(path: &Path) -> Option<String> {
        path.to_str()?.strip_prefix("static:/").map(String::from)
    }
}

#[async_trait]
impl ModuleLoader for StaticModuleLoader {
    async fn ensure(&self, package: &str, _version: &str) -> Result<PathBuf> {
        let modules = self.modules.lock().expect("module lock poisoned");
        if modules.contains_key(package) {
            Ok(PathBuf::from(format!("static:/{package}")))
        } else {
            Err(Error::Catalog(format!("unknown package: {package}")))
        }
    }

    async fn load(&self, path: &Path) -> Result<Arc<dyn SdkModule>> {
        let package = Self::package_of(path)
            .ok_or_else(|| Error::Catalog(format!("not a static module path: {}", path.display())))?;
        self.modules
            .lock()
            .expect("module lock poisoned")
            .get(&package)
            .cloned()
            .ok_or(Error::Catalog(format!("unknown package: {package}")))
    }
}
