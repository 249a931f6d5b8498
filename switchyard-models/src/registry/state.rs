//! The resolved provider state snapshot.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::adapter::ModelInvoker;
use crate::config::Config;
use crate::sdk::{LanguageModel, SdkClient};
use crate::types::{ModelEntry, OptionsMap, ProviderEntry};

/// Which pipeline step last contributed a provider's options.
///
/// Provenance for diagnostics; precedence itself is encoded in the pipeline
/// order, not in this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationSource {
    /// An environment variable was set.
    Env,
    /// A stored credential existed.
    Credential,
    /// A provider adapter or auth plugin contributed options.
    Adapter,
    /// The configuration declared the provider.
    Config,
}

/// An activated provider with its merged options.
#[derive(Clone)]
pub struct ActiveProvider {
    /// Last step that touched this provider.
    pub source: ActivationSource,
    /// Catalog entry after config overlay and adapter mutation.
    pub entry: ProviderEntry,
    /// Deep-merged client options across all activation sources.
    pub options: OptionsMap,
    /// Custom model invoker, when an adapter installed one.
    pub invoker: Option<Arc<dyn ModelInvoker>>,
    /// Subpath of the provisioned package to load, when an adapter set one.
    pub module_subpath: Option<PathBuf>,
}

impl std::fmt::Debug for ActiveProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveProvider")
            .field("source", &self.source)
            .field("id", &self.entry.id)
            .field("models", &self.entry.models.len())
            .field("invoker", &self.invoker.is_some())
            .finish()
    }
}

/// A resolved, invocable model.
#[derive(Clone)]
pub struct ResolvedModel {
    /// Provider identifier.
    pub provider: String,
    /// Model identifier as requested (the catalog key).
    pub model: String,
    /// Model metadata.
    pub info: ModelEntry,
    /// Backend package the handle was constructed from.
    pub package: String,
    /// The invocable handle.
    pub handle: Arc<dyn LanguageModel>,
}

impl std::fmt::Debug for ResolvedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedModel")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("package", &self.package)
            .finish()
    }
}

/// The composite state one build produces.
///
/// Built exactly once per registry instance and shared immutably by every
/// subsequent lookup until [`reset`](crate::ModelRegistry::reset) discards
/// it. Provider iteration order is the `BTreeMap` key order, which makes
/// default-model selection deterministic. The two caches at the bottom are
/// the only post-build mutable structures; their mutexes guard the
/// check-then-insert sequences and serialize expensive construction.
pub struct ProviderState {
    /// Activated providers by id.
    pub providers: BTreeMap<String, ActiveProvider>,
    /// `provider/model` key -> real upstream id, for aliased config models.
    pub real_ids: BTreeMap<String, String>,
    /// The configuration the build consumed.
    pub config: Config,
    /// Resolved model handles by `provider/model` key.
    pub(crate) models: Mutex<HashMap<String, ResolvedModel>>,
    /// Constructed clients by fingerprint.
    pub(crate) clients: Mutex<HashMap<String, Arc<dyn SdkClient>>>,
}

impl ProviderState {
    pub(crate) fn new(
        providers: BTreeMap<String, ActiveProvider>,
        real_ids: BTreeMap<String, String>,
        config: Config,
    ) -> Self {
        Self {
            providers,
            real_ids,
            config,
            models: Mutex::new(HashMap::new()),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// The real upstream id for a `provider/model` pair, resolving aliases.
    pub fn real_id<'a>(&'a self, provider: &str, model: &str, info: &'a ModelEntry) -> &'a str {
        self.real_ids
            .get(&format!("{provider}/{model}"))
            .map(String::as_str)
            .unwrap_or(&info.id)
    }
}

impl std::fmt::Debug for ProviderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderState")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("aliases", &self.real_ids.len())
            .finish()
    }
}
