//! Provider adapter registry.
//!
//! Some providers need activation logic beyond "an env var is set": beta
//! headers, credential-chain detection, regional model-id rewriting, or
//! free-tier model stripping. Each of those is a [`ProviderAdapter`] in a
//! fixed registry keyed by provider id, all implementing one `activate`
//! contract instead of a chain of provider conditionals.

mod builtin;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::CredentialStore;
use crate::sdk::{LanguageModel, SdkClient};
use crate::types::{OptionsMap, ProviderEntry};
use crate::Result;

pub use builtin::{
    AnthropicAdapter, AzureAdapter, AzureCognitiveAdapter, BedrockAdapter,
    GoogleVertexAdapter, GoogleVertexAnthropicAdapter, OpenAiAdapter, OpenRouterAdapter,
    SwitchyardAdapter, VercelAdapter, ZenmuxAdapter,
};

/// Turns a model identifier into an invocable handle for providers whose
/// clients need more than the generic get-model-by-id call.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Resolve `model_id` (the real, already de-aliased identifier) on
    /// `client` with the provider's merged options.
    async fn language_model(
        &self,
        client: &dyn SdkClient,
        model_id: &str,
        options: &OptionsMap,
    ) -> Result<Arc<dyn LanguageModel>>;
}

/// An adapter's activation decision.
#[derive(Default)]
pub struct Activation {
    /// Activate the provider even if no earlier pipeline step did.
    pub autoload: bool,
    /// Options to merge over whatever is already accumulated.
    pub options: OptionsMap,
    /// Custom model invoker, installed on the provider record if supplied.
    pub invoker: Option<Arc<dyn ModelInvoker>>,
    /// Subpath within the provisioned package to load instead of its root,
    /// for backends that ship several entry points in one package.
    pub module_subpath: Option<PathBuf>,
}

/// Inputs an adapter may inspect during activation.
///
/// The environment is an explicit map rather than process state so builds
/// are deterministic under test.
pub struct ActivateContext<'a> {
    /// Process environment snapshot.
    pub env: &'a BTreeMap<String, String>,
    /// Stored credentials.
    pub credentials: &'a dyn CredentialStore,
}

impl ActivateContext<'_> {
    /// Look up one environment variable.
    pub fn env_var(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    /// First set variable among `names`, in order.
    pub fn first_env(&self, names: &[impl AsRef<str>]) -> Option<&str> {
        names.iter().find_map(|name| self.env_var(name.as_ref()))
    }

    /// Whether any credential is stored for `provider`. Store failures
    /// count as "no credential".
    pub async fn has_credential(&self, provider: &str) -> bool {
        matches!(self.credentials.get(provider).await, Ok(Some(_)))
    }
}

/// Provider-specific activation logic.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The provider this adapter activates.
    fn provider_id(&self) -> &str;

    /// Decide activation for this provider.
    ///
    /// `entry` is the provider's catalog entry, absent when the catalog does
    /// not know the provider; adapters may mutate its model list (e.g. strip
    /// free-tier-ineligible models). Returning `Ok(None)` contributes
    /// nothing. Errors are soft: the registry logs and skips the adapter.
    async fn activate(
        &self,
        entry: Option<&mut ProviderEntry>,
        cx: &ActivateContext<'_>,
    ) -> Result<Option<Activation>>;
}

/// The fixed table of provider adapters.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in adapter set.
    pub fn builtin() -> Self {
        Self {
            adapters: vec![
                Arc::new(AnthropicAdapter),
                Arc::new(SwitchyardAdapter),
                Arc::new(OpenAiAdapter),
                Arc::new(AzureAdapter),
                Arc::new(AzureCognitiveAdapter),
                Arc::new(BedrockAdapter),
                Arc::new(GoogleVertexAdapter),
                Arc::new(GoogleVertexAnthropicAdapter),
                Arc::new(OpenRouterAdapter),
                Arc::new(VercelAdapter),
                Arc::new(ZenmuxAdapter),
            ],
        }
    }

    /// Add an adapter, replacing any existing one for the same provider.
    pub fn with(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters
            .retain(|existing| existing.provider_id() != adapter.provider_id());
        self.adapters.push(adapter);
        self
    }

    /// Iterate adapters in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ProviderAdapter>> {
        self.adapters.iter()
    }
}
