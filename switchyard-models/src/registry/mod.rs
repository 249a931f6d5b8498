//! The provider registry: build-once state, memoized resolution, and model
//! selection.
//!
//! A [`ModelRegistry`] owns the sources (config, catalog, credentials,
//! plugins, adapters, loader) and builds its [`ProviderState`] lazily on
//! first use. Concurrent first uses share one in-flight build via a shared
//! future; [`reset`](ModelRegistry::reset) discards the state so the next
//! lookup rebuilds against current inputs. Resolved models and constructed
//! clients are cached on the state and die with it.

mod build;
mod rules;
mod selection;
mod state;

pub use self::rules::{FilterRules, RegistryOptions, SelectionRules};
pub use self::state::{ActivationSource, ActiveProvider, ProviderState, ResolvedModel};

use std::path::Path;
use std::sync::{Arc, Mutex};

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use serde_json::json;
use tracing::debug;

use self::build::{build_state, Sources};

use crate::adapter::AdapterRegistry;
use crate::auth::{CredentialStore, KeyringStore};
use crate::catalog::{CatalogSource, RemoteCatalog};
use crate::config::{ConfigSource, FileConfig};
use crate::loader::{provision, ModuleLoader, StaticModuleLoader};
use crate::plugin::{PluginHookSource, StaticPluginSource};
use crate::sdk::{fingerprint, SdkClient};
use crate::transport::RequestPolicy;
use crate::types::{ModelRef, OptionsMap};
use crate::{Error, Result};

/// Default keyring service name for stored credentials.
const KEYRING_SERVICE: &str = "switchyard";

type StateFuture = Shared<BoxFuture<'static, Arc<ProviderState>>>;

/// The provider/model resolution engine.
///
/// # Examples
///
/// ```no_run
/// use switchyard_models::ModelRegistry;
///
/// # async fn run() -> switchyard_models::Result<()> {
/// let registry = ModelRegistry::builder().build();
/// let model = registry.default_model().await?;
/// println!("using {}/{}", model.provider, model.model);
/// # Ok(())
/// # }
/// ```
pub struct ModelRegistry {
    sources: Arc<Sources>,
    state: Mutex<Option<StateFuture>>,
}

impl ModelRegistry {
    /// Start building a registry.
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::default()
    }

    /// The current state, building it if no build is live. Every concurrent
    /// caller awaits the same in-flight build.
    async fn state(&self) -> Arc<ProviderState> {
        let future = {
            let mut slot = self.state.lock().expect("state lock poisoned");
            match slot.as_ref() {
                Some(future) => future.clone(),
                None => {
                    let sources = Arc::clone(&self.sources);
                    let future: StateFuture = build_state(sources).boxed().shared();
                    *slot = Some(future.clone());
                    future
                }
            }
        };
        future.await
    }

    /// Force the state to materialize now, returning the shared snapshot.
    /// Lookups normally trigger this lazily; calling it up front moves the
    /// build cost off the first request path.
    pub async fn build(&self) -> Arc<ProviderState> {
        self.state().await
    }

    /// Discard the built state. The next lookup rebuilds from scratch and
    /// observes any changed config, credentials, or environment snapshot.
    /// Lookups already holding the old state finish against it.
    pub fn reset(&self) {
        debug!("resetting provider state");
        *self.state.lock().expect("state lock poisoned") = None;
    }

    /// All activated providers, in id order.
    pub async fn list(&self) -> Vec<ActiveProvider> {
        self.state().await.providers.values().cloned().collect()
    }

    /// One activated provider by id.
    pub async fn provider(&self, id: &str) -> Option<ActiveProvider> {
        self.state().await.providers.get(id).cloned()
    }

    /// Resolve a model to an invocable handle.
    ///
    /// `model` is the catalog key, which may be a config-declared alias; the
    /// backend is always handed the real upstream id. Resolution is memoized
    /// per `provider/model` pair for the lifetime of the state.
    ///
    /// # Errors
    ///
    /// [`Error::ModelNotFound`] when the provider is not active or does not
    /// list the model; [`Error::ProviderInit`] when provisioning, module
    /// loading, or client construction fails.
    pub async fn model(&self, provider: &str, model: &str) -> Result<ResolvedModel> {
        let state = self.state().await;
        self.resolve(&state, provider, model).await
    }

    /// Resolve the default model.
    ///
    /// Config's explicit `model` wins verbatim. Otherwise config-declared
    /// providers act as an allow-list: the first active provider on it has
    /// its flagship-ranked best model chosen, and [`Error::NoProviders`] is
    /// returned when none of them is active. With no declared providers the
    /// first active provider is used.
    pub async fn default_model(&self) -> Result<ResolvedModel> {
        let state = self.state().await;
        let picked = selection::default_model(&state, &self.sources.options.selection)?;
        self.resolve(&state, &picked.provider, &picked.model).await
    }

    /// Resolve the small/cheap model for background work on `provider`.
    ///
    /// `Ok(None)` means the provider offers nothing on the priority list;
    /// callers decide whether to fall back to
    /// [`default_model`](Self::default_model).
    pub async fn small_model(&self, provider: &str) -> Result<Option<ResolvedModel>> {
        let state = self.state().await;
        match selection::small_model(&state, &self.sources.options.selection, provider) {
            Some(picked) => Ok(Some(self.resolve(&state, &picked.provider, &picked.model).await?)),
            None => Ok(None),
        }
    }

    /// Resolve against a specific state snapshot.
    ///
    /// Lock order is models then clients; `client` below only ever takes
    /// the clients lock.
    async fn resolve(
        &self,
        state: &Arc<ProviderState>,
        provider: &str,
        model: &str,
    ) -> Result<ResolvedModel> {
        let key = ModelRef::new(provider, model).to_string();
        let mut models = state.models.lock().await;
        if let Some(found) = models.get(&key) {
            return Ok(found.clone());
        }

        let not_found = || Error::ModelNotFound {
            provider: provider.to_string(),
            model: model.to_string(),
        };
        let active = state.providers.get(provider).ok_or_else(not_found)?;
        let info = active.entry.models.get(model).ok_or_else(not_found)?.clone();

        // Per-model package override beats the provider's, which beats the
        // provider id itself.
        let package = info
            .provider
            .as_ref()
            .and_then(|p| p.npm.clone())
            .or_else(|| active.entry.npm.clone())
            .unwrap_or_else(|| provider.to_string());

        let mut options = active.options.clone();
        if package.contains("openai-compatible") && !options.contains_key("includeUsage") {
            options.insert("includeUsage".to_string(), json!(true));
        }

        let client = self
            .client(
                state,
                provider,
                &package,
                &options,
                active.module_subpath.as_deref(),
            )
            .await?;

        let real_id = state.real_id(provider, model, &info).to_string();
        let handle = match &active.invoker {
            Some(invoker) => invoker.language_model(client.as_ref(), &real_id, &options).await,
            None => client.language_model(&real_id).await,
        }
        .map_err(|e| match e {
            Error::NoSuchModel(_) => not_found(),
            other => Error::provider_init(provider, other),
        })?;

        let resolved = ResolvedModel {
            provider: provider.to_string(),
            model: model.to_string(),
            info,
            package,
            handle,
        };
        models.insert(key, resolved.clone());
        debug!(provider, model, package = %resolved.package, "resolved model");
        Ok(resolved)
    }

    /// A client for `package` with `options`, deduplicated by fingerprint.
    /// The lock is held across construction so one fingerprint is only ever
    /// built once.
    async fn client(
        &self,
        state: &ProviderState,
        provider: &str,
        package: &str,
        options: &OptionsMap,
        module_subpath: Option<&Path>,
    ) -> Result<Arc<dyn SdkClient>> {
        let print = fingerprint(package, options);
        let mut clients = state.clients.lock().await;
        if let Some(client) = clients.get(&print) {
            return Ok(client.clone());
        }

        let mut path = provision(self.sources.loader.as_ref(), package, "latest")
            .await
            .map_err(|e| Error::provider_init(provider, e))?;
        if let Some(subpath) = module_subpath {
            path.push(subpath);
        }
        let module = self
            .sources
            .loader
            .load(&path)
            .await
            .map_err(|e| Error::provider_init(provider, e))?;
        let policy = RequestPolicy::from_options(options);
        let client = module
            .create_client(provider, options, policy)
            .await
            .map_err(|e| Error::provider_init(provider, e))?;
        clients.insert(print, client.clone());
        debug!(provider, package, "constructed client");
        Ok(client)
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry").finish_non_exhaustive()
    }
}

/// Builder assembling a [`ModelRegistry`] from its sources.
///
/// Defaults are the production stack: the config file in the config
/// directory, keyring credentials, the remote catalog with a local
/// snapshot, the built-in adapters, a process environment snapshot, and an
/// empty static module loader (embedders register their backends or supply
/// a provisioning loader).
pub struct ModelRegistryBuilder {
    config: Arc<dyn ConfigSource>,
    catalog: Arc<dyn CatalogSource>,
    credentials: Arc<dyn CredentialStore>,
    plugins: Arc<dyn PluginHookSource>,
    adapters: AdapterRegistry,
    loader: Arc<dyn ModuleLoader>,
    options: RegistryOptions,
}

impl Default for ModelRegistryBuilder {
    fn default() -> Self {
        Self {
            config: Arc::new(FileConfig::default()),
            catalog: Arc::new(RemoteCatalog::new()),
            credentials: Arc::new(KeyringStore::new(KEYRING_SERVICE)),
            plugins: Arc::new(StaticPluginSource::default()),
            adapters: AdapterRegistry::builtin(),
            loader: Arc::new(StaticModuleLoader::new()),
            options: RegistryOptions::from_process_env(),
        }
    }
}

impl ModelRegistryBuilder {
    /// Use this configuration source.
    pub fn config(mut self, source: impl ConfigSource + 'static) -> Self {
        self.config = Arc::new(source);
        self
    }

    /// Use this catalog source.
    pub fn catalog(mut self, source: impl CatalogSource + 'static) -> Self {
        self.catalog = Arc::new(source);
        self
    }

    /// Use this credential store.
    pub fn credentials(mut self, store: impl CredentialStore + 'static) -> Self {
        self.credentials = Arc::new(store);
        self
    }

    /// Use this plugin hook source.
    pub fn plugins(mut self, source: impl PluginHookSource + 'static) -> Self {
        self.plugins = Arc::new(source);
        self
    }

    /// Use this adapter registry instead of the built-in set.
    pub fn adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    /// Use this module loader.
    pub fn loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.loader = Arc::new(loader);
        self
    }

    /// Use these registry options (environment snapshot, filter and
    /// selection rules).
    pub fn options(mut self, options: RegistryOptions) -> Self {
        self.options = options;
        self
    }

    /// Assemble the registry. Nothing is built until first use.
    pub fn build(self) -> ModelRegistry {
        ModelRegistry {
            sources: Arc::new(Sources {
                config: self.config,
                catalog: self.catalog,
                credentials: self.credentials,
                plugins: self.plugins,
                adapters: self.adapters,
                loader: self.loader,
                options: self.options,
            }),
            state: Mutex::new(None),
        }
    }
}
