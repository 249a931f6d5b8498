//! The state build pipeline.
//!
//! Steps run strictly in order because later steps observe the effects of
//! earlier ones: config overlay and variant synthesis rewrite the catalog,
//! then four activation passes (environment, stored credentials, adapters,
//! plugins) accumulate merged options, config options override everything,
//! and filtering prunes the result. Per-source failures are soft: a failing
//! source contributes nothing and the build continues.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use super::rules::RegistryOptions;
use super::state::{ActivationSource, ActiveProvider, ProviderState};
use crate::adapter::{ActivateContext, AdapterRegistry, ModelInvoker};
use crate::auth::{Credential, CredentialStore};
use crate::catalog::CatalogSource;
use crate::config::{merge_options, Config, ConfigSource, ModelConfig};
use crate::loader::ModuleLoader;
use crate::plugin::PluginHookSource;
use crate::types::{Catalog, Cost, ModelEntry, OptionsMap, ProviderEntry};

/// Base provider the enterprise variant derives from.
const COPILOT: &str = "github-copilot";
/// The derived enterprise variant.
const COPILOT_ENTERPRISE: &str = "github-copilot-enterprise";
/// Provider whose backend package is pinned regardless of catalog data.
const OPENROUTER: &str = "openrouter";
const OPENROUTER_PACKAGE: &str = "@openrouter/ai-sdk-provider";

/// Everything a registry instance resolves against.
pub(crate) struct Sources {
    pub config: Arc<dyn ConfigSource>,
    pub catalog: Arc<dyn CatalogSource>,
    pub credentials: Arc<dyn CredentialStore>,
    pub plugins: Arc<dyn PluginHookSource>,
    pub adapters: AdapterRegistry,
    pub loader: Arc<dyn ModuleLoader>,
    pub options: RegistryOptions,
}

/// Activation bookkeeping before the state is frozen. Catalog entries are
/// only cloned in at freeze time so adapter mutations (model stripping)
/// stay visible regardless of which step activated the provider first.
struct Pending {
    source: ActivationSource,
    options: OptionsMap,
    invoker: Option<Arc<dyn ModelInvoker>>,
    module_subpath: Option<PathBuf>,
}

fn merge_provider(
    activated: &mut BTreeMap<String, Pending>,
    catalog: &Catalog,
    id: &str,
    mut options: OptionsMap,
    source: ActivationSource,
    invoker: Option<Arc<dyn ModelInvoker>>,
    module_subpath: Option<PathBuf>,
) {
    match activated.get_mut(id) {
        None => {
            // Activation requires a catalog entry, however it got there.
            let Some(entry) = catalog.get(id) else {
                return;
            };
            if let Some(api) = &entry.api
                && !options.contains_key("baseURL")
            {
                options.insert("baseURL".to_string(), json!(api));
            }
            debug!(provider = id, ?source, "activated provider");
            activated.insert(
                id.to_string(),
                Pending {
                    source,
                    options,
                    invoker,
                    module_subpath,
                },
            );
        }
        Some(pending) => {
            merge_options(&mut pending.options, options);
            pending.source = source;
            if invoker.is_some() {
                pending.invoker = invoker;
            }
            if module_subpath.is_some() {
                pending.module_subpath = module_subpath;
            }
        }
    }
}

/// Overlay a config-declared model onto any existing catalog entry,
/// field by field: each field prefers the config value, then the catalog
/// value, then its default. A populated field is never discarded in favor
/// of an absent one.
fn overlay_model(key: &str, model: &ModelConfig, existing: Option<&ModelEntry>) -> ModelEntry {
    let name = if let Some(name) = &model.name {
        name.clone()
    } else if model.id.as_deref().is_some_and(|id| id != key) {
        key.to_string()
    } else {
        existing
            .map(|e| e.name.clone())
            .unwrap_or_else(|| key.to_string())
    };

    let cost = if model.cost.is_none() && existing.is_none() {
        Cost::default()
    } else {
        let mut cost = existing.map(|e| e.cost).unwrap_or_default();
        if let Some(partial) = &model.cost {
            if let Some(input) = partial.input {
                cost.input = input;
            }
            if let Some(output) = partial.output {
                cost.output = output;
            }
            if let Some(cache_read) = partial.cache_read {
                cost.cache_read = cache_read;
            }
            if let Some(cache_write) = partial.cache_write {
                cost.cache_write = cache_write;
            }
        }
        cost
    };

    let mut options = existing.map(|e| e.options.clone()).unwrap_or_default();
    for (k, v) in &model.options {
        options.insert(k.clone(), v.clone());
    }

    ModelEntry {
        id: key.to_string(),
        name,
        release_date: model
            .release_date
            .clone()
            .or_else(|| existing.map(|e| e.release_date.clone()))
            .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d").to_string()),
        attachment: model
            .attachment
            .unwrap_or_else(|| existing.is_some_and(|e| e.attachment)),
        reasoning: model
            .reasoning
            .unwrap_or_else(|| existing.is_some_and(|e| e.reasoning)),
        temperature: model
            .temperature
            .unwrap_or_else(|| existing.is_some_and(|e| e.temperature)),
        tool_call: model
            .tool_call
            .unwrap_or_else(|| existing.is_none_or(|e| e.tool_call)),
        cost,
        limit: model
            .limit
            .or_else(|| existing.map(|e| e.limit))
            .unwrap_or_default(),
        modalities: model
            .modalities
            .clone()
            .or_else(|| existing.map(|e| e.modalities.clone()))
            .unwrap_or_default(),
        options,
        headers: model.headers.clone(),
        provider: model
            .provider
            .clone()
            .filter(|p| p.npm.is_some())
            .or_else(|| existing.and_then(|e| e.provider.clone())),
        experimental: false,
        status: None,
    }
}

/// Run the whole pipeline. Infallible by design: every external failure is
/// soft and degrades to "this source contributes nothing".
pub(crate) async fn build_state(sources: Arc<Sources>) -> Arc<ProviderState> {
    // Step 1: external inputs.
    let config = match sources.config.load().await {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "config load failed, building with empty config");
            Config::default()
        }
    };
    let mut catalog = match sources.catalog.fetch().await {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!(error = %e, "catalog unavailable, building with empty catalog");
            Catalog::new()
        }
    };

    // Step 2: config-declared providers overlay the catalog and may
    // introduce entirely new providers and models.
    let mut real_ids = BTreeMap::new();
    for (pid, declared) in &config.provider {
        let existing = catalog.get(pid);
        let mut entry = ProviderEntry {
            id: pid.clone(),
            name: declared
                .name
                .clone()
                .or_else(|| existing.map(|e| e.name.clone()))
                .unwrap_or_else(|| pid.clone()),
            env: declared
                .env
                .clone()
                .or_else(|| existing.map(|e| e.env.clone()))
                .unwrap_or_default(),
            api: declared
                .api
                .clone()
                .or_else(|| existing.and_then(|e| e.api.clone())),
            npm: declared
                .npm
                .clone()
                .or_else(|| existing.and_then(|e| e.npm.clone())),
            models: existing.map(|e| e.models.clone()).unwrap_or_default(),
        };

        for (key, model) in &declared.models {
            // An aliased key overlays the entry of the model it points at.
            let base_key = model.id.as_deref().unwrap_or(key);
            let base = entry.models.get(base_key).cloned();
            let overlaid = overlay_model(key, model, base.as_ref());
            if let Some(id) = &model.id
                && id != key
            {
                real_ids.insert(format!("{pid}/{key}"), id.clone());
            }
            entry.models.insert(key.clone(), overlaid);
        }

        catalog.insert(pid.clone(), entry);
    }

    // Step 3: derived variants of existing entries.
    if let Some(base) = catalog.get(COPILOT)
        && !catalog.contains_key(COPILOT_ENTERPRISE)
    {
        let mut variant = base.clone();
        variant.id = COPILOT_ENTERPRISE.to_string();
        variant.name = "GitHub Copilot Enterprise".to_string();
        variant.api = None;
        catalog.insert(COPILOT_ENTERPRISE.to_string(), variant);
    }

    let disabled: HashSet<String> = config.disabled_providers.iter().cloned().collect();
    let mut activated: BTreeMap<String, Pending> = BTreeMap::new();

    // Step 4: environment activation.
    for (pid, entry) in &catalog {
        if disabled.contains(pid) {
            continue;
        }
        if !entry.env.iter().any(|name| sources.options.env.contains_key(name)) {
            continue;
        }
        let mut options = OptionsMap::new();
        if entry.env.len() == 1
            && let Some(value) = sources.options.env.get(&entry.env[0])
        {
            // A single declared variable is unambiguous; with several, key
            // extraction is deferred to the provider's adapter.
            options.insert("apiKey".to_string(), json!(value));
        }
        merge_provider(
            &mut activated,
            &catalog,
            pid,
            options,
            ActivationSource::Env,
            None,
            None,
        );
    }

    // Step 5: stored-credential activation.
    match sources.credentials.all().await {
        Ok(credentials) => {
            for (pid, credential) in credentials {
                if disabled.contains(&pid) {
                    continue;
                }
                if let Credential::Api { key } = credential {
                    let mut options = OptionsMap::new();
                    options.insert("apiKey".to_string(), json!(key.expose_secret()));
                    merge_provider(
                        &mut activated,
                        &catalog,
                        &pid,
                        options,
                        ActivationSource::Credential,
                        None,
                        None,
                    );
                }
            }
        }
        Err(e) => warn!(error = %e, "credential store unavailable, skipping"),
    }

    // Step 6: adapter activation. Adapters may mutate their catalog entry.
    for adapter in sources.adapters.iter() {
        let pid = adapter.provider_id().to_string();
        if disabled.contains(&pid) {
            continue;
        }
        let cx = ActivateContext {
            env: &sources.options.env,
            credentials: sources.credentials.as_ref(),
        };
        match adapter.activate(catalog.get_mut(&pid), &cx).await {
            Ok(Some(activation)) => {
                if activation.autoload || activated.contains_key(&pid) {
                    merge_provider(
                        &mut activated,
                        &catalog,
                        &pid,
                        activation.options,
                        ActivationSource::Adapter,
                        activation.invoker,
                        activation.module_subpath,
                    );
                }
            }
            Ok(None) => {}
            Err(e) => warn!(provider = %pid, error = %e, "adapter activation failed, skipping"),
        }
    }

    // Step 7: plugin activation. Loaders re-read the credential store so
    // self-refreshing credentials stay current.
    let hooks = sources
        .plugins
        .hooks(&config.plugin, sources.options.include_default_plugins)
        .await;
    for hook in hooks {
        let pid = hook.provider.clone();
        if pid.is_empty() || disabled.contains(&pid) {
            continue;
        }

        let auth = sources.credentials.get(&pid).await.ok().flatten();
        let mut has_auth = auth.is_some();
        if !has_auth && pid == COPILOT {
            has_auth = matches!(
                sources.credentials.get(COPILOT_ENTERPRISE).await,
                Ok(Some(_))
            );
        }
        if !has_auth {
            continue;
        }
        let Some(entry) = catalog.get(&pid) else {
            continue;
        };

        if auth.is_some() {
            match hook
                .loader
                .load(sources.credentials.as_ref(), &pid, entry)
                .await
            {
                Ok(Some(options)) => merge_provider(
                    &mut activated,
                    &catalog,
                    &pid,
                    options,
                    ActivationSource::Adapter,
                    None,
                    None,
                ),
                Ok(None) => {}
                Err(e) => warn!(provider = %pid, error = %e, "auth plugin failed, skipping"),
            }
        }

        // The enterprise variant shares the base provider's hook but has
        // its own credential.
        if pid == COPILOT
            && !disabled.contains(COPILOT_ENTERPRISE)
            && let Some(enterprise_entry) = catalog.get(COPILOT_ENTERPRISE)
            && matches!(
                sources.credentials.get(COPILOT_ENTERPRISE).await,
                Ok(Some(_))
            )
        {
            match hook
                .loader
                .load(
                    sources.credentials.as_ref(),
                    COPILOT_ENTERPRISE,
                    enterprise_entry,
                )
                .await
            {
                Ok(Some(options)) => merge_provider(
                    &mut activated,
                    &catalog,
                    COPILOT_ENTERPRISE,
                    options,
                    ActivationSource::Adapter,
                    None,
                    None,
                ),
                Ok(None) => {}
                Err(e) => {
                    warn!(provider = COPILOT_ENTERPRISE, error = %e, "auth plugin failed, skipping")
                }
            }
        }
    }

    // Step 8: config options override everything, unconditionally.
    for (pid, declared) in &config.provider {
        merge_provider(
            &mut activated,
            &catalog,
            pid,
            declared.options.clone(),
            ActivationSource::Config,
            None,
            None,
        );
    }

    // Step 9: filtering, then freeze.
    let filter = &sources.options.filter;
    let mut providers = BTreeMap::new();
    for (pid, pending) in activated {
        let Some(mut entry) = catalog.get(&pid).cloned() else {
            continue;
        };
        entry.models.retain(|key, model| {
            if filter.excludes(&pid, key) {
                return false;
            }
            if model.status.as_deref() == Some("deprecated") {
                return false;
            }
            if !filter.allow_experimental
                && (model.experimental || model.status.as_deref() == Some("alpha"))
            {
                return false;
            }
            true
        });
        if entry.models.is_empty() {
            debug!(provider = %pid, "no models after filtering, dropping provider");
            continue;
        }
        if pid == OPENROUTER {
            entry.npm = Some(OPENROUTER_PACKAGE.to_string());
        }
        providers.insert(
            pid,
            ActiveProvider {
                source: pending.source,
                entry,
                options: pending.options,
                invoker: pending.invoker,
                module_subpath: pending.module_subpath,
            },
        );
    }

    Arc::new(ProviderState::new(providers, real_ids, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CostConfig;
    use crate::types::Limit;

    fn catalog_model() -> ModelEntry {
        let mut model = ModelEntry::named("foo-v2");
        model.name = "Foo v2".to_string();
        model.release_date = "2025-03-01".to_string();
        model.attachment = true;
        model.cost = Cost {
            input: 3.0,
            output: 15.0,
            ..Cost::default()
        };
        model.limit = Limit {
            context: 200_000,
            output: 8_192,
        };
        model
    }

    #[test]
    fn overlay_prefers_config_fields_over_catalog() {
        let config = ModelConfig {
            name: Some("Renamed".to_string()),
            reasoning: Some(true),
            ..Default::default()
        };
        let overlaid = overlay_model("foo-v2", &config, Some(&catalog_model()));
        assert_eq!(overlaid.name, "Renamed");
        assert!(overlaid.reasoning, "config field applies");
        assert!(overlaid.attachment, "catalog field survives");
        assert_eq!(overlaid.cost.input, 3.0, "catalog cost survives");
    }

    #[test]
    fn overlay_partial_cost_keeps_other_fields() {
        let config = ModelConfig {
            cost: Some(CostConfig {
                input: Some(1.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlaid = overlay_model("foo-v2", &config, Some(&catalog_model()));
        assert_eq!(overlaid.cost.input, 1.0);
        assert_eq!(overlaid.cost.output, 15.0);
    }

    #[test]
    fn overlay_new_model_defaults() {
        let config = ModelConfig::default();
        let overlaid = overlay_model("brand-new", &config, None);
        assert_eq!(overlaid.id, "brand-new");
        assert_eq!(overlaid.name, "brand-new");
        assert_eq!(overlaid.cost, Cost::default());
        assert!(overlaid.tool_call, "tool_call defaults to true");
        assert!(!overlaid.attachment);
        assert!(!overlaid.release_date.is_empty(), "release date defaulted");
    }

    #[test]
    fn overlay_aliased_key_names_after_key() {
        let config = ModelConfig {
            id: Some("foo-v2".to_string()),
            ..Default::default()
        };
        let overlaid = overlay_model("fast", &config, Some(&catalog_model()));
        assert_eq!(overlaid.id, "fast", "entry id is the config key");
        assert_eq!(overlaid.name, "fast", "aliased models display their key");
    }

    #[test]
    fn overlay_tool_call_override_wins() {
        let config = ModelConfig {
            tool_call: Some(false),
            ..Default::default()
        };
        let overlaid = overlay_model("foo-v2", &config, Some(&catalog_model()));
        assert!(!overlaid.tool_call);
    }
}
