//! Auth plugin hooks.
//!
//! Plugins supply activation logic tied to a stored credential, typically
//! for OAuth-style providers whose tokens self-refresh. A hook's loader is
//! handed the credential store itself rather than a captured credential:
//! it must re-read current state on every call, because refreshing rewrites
//! the stored credential as a side effect before options are returned.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::CredentialStore;
use crate::types::{OptionsMap, ProviderEntry};
use crate::Result;

/// Activation logic supplied by a plugin for one provider.
#[derive(Clone)]
pub struct AuthPluginHook {
    /// Provider this hook activates.
    pub provider: String,
    /// Produces fresh activation options.
    pub loader: Arc<dyn AuthPluginLoader>,
}

impl std::fmt::Debug for AuthPluginHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthPluginHook")
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

/// Produces fresh activation options for a provider.
#[async_trait]
pub trait AuthPluginLoader: Send + Sync {
    /// Produce options for `provider`.
    ///
    /// `credentials` is the live store; implementations re-read it rather
    /// than caching, and may rewrite the stored credential (token refresh)
    /// before returning. Returning `Ok(None)` contributes nothing.
    async fn load(
        &self,
        credentials: &dyn CredentialStore,
        provider: &str,
        entry: &ProviderEntry,
    ) -> Result<Option<OptionsMap>>;
}

/// Supplies the dynamically discovered plugin hooks.
#[async_trait]
pub trait PluginHookSource: Send + Sync {
    /// Resolve plugin specifiers to hooks. Resolution failures are soft:
    /// implementations log and skip, never fail the build.
    async fn hooks(&self, specs: &[String], include_defaults: bool) -> Vec<AuthPluginHook>;
}

/// A fixed set of hooks, keyed by the plugin package that supplies them.
/// Useful for embedders and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticPluginSource {
    defaults: Vec<AuthPluginHook>,
    packages: BTreeMap<String, Vec<AuthPluginHook>>,
}

impl StaticPluginSource {
    /// An empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook that applies whenever defaults are included,
    /// regardless of config specifiers.
    pub fn with_default(mut self, hook: AuthPluginHook) -> Self {
        self.defaults.push(hook);
        self
    }

    /// Register a hook supplied by the named package. It only applies when
    /// a config specifier names that package, at any version.
    pub fn with_package(mut self, package: impl Into<String>, hook: AuthPluginHook) -> Self {
        self.packages.entry(package.into()).or_default().push(hook);
        self
    }
}

#[async_trait]
impl PluginHookSource for StaticPluginSource {
    async fn hooks(&self, specs: &[String], include_defaults: bool) -> Vec<AuthPluginHook> {
        let mut hooks = Vec::new();
        if include_defaults {
            hooks.extend(self.defaults.iter().cloned());
        }
        for spec in specs {
            let Some(name) = package_name(spec) else {
                continue;
            };
            if let Some(supplied) = self.packages.get(name) {
                hooks.extend(supplied.iter().cloned());
            }
        }
        hooks
    }
}

/// Extract the package name from a plugin specifier.
///
/// Handles `name`, `name@version`, and scoped `@scope/name@version` forms.
/// Path-like specifiers (`file://...`, `./...`) resolve outside the package
/// namespace and yield `None`.
pub fn package_name(spec: &str) -> Option<&str> {
    if spec.is_empty() || spec.starts_with("file://") || spec.starts_with('.') {
        return None;
    }
    if let Some(rest) = spec.strip_prefix('@') {
        let Some(slash) = rest.find('/') else {
            return Some(spec);
        };
        return match rest[slash..].find('@') {
            Some(at) => Some(&spec[..1 + slash + at]),
            None => Some(spec),
        };
    }
    match spec.rfind('@') {
        Some(0) | None => Some(spec),
        Some(at) => Some(&spec[..at]),
    }
}
