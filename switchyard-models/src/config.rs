//! The merged configuration document.
//!
//! Multi-file precedence merging happens outside this crate; a
//! [`ConfigSource`] hands the registry one already-merged document. Config
//! may introduce providers and models the upstream catalog has never heard
//! of, and its `options` always win over every other activation source.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Limit, Modalities, OptionsMap, PackageOverride};
use crate::Result;

/// The merged configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Provider id -> declared provider overrides.
    #[serde(default)]
    pub provider: BTreeMap<String, ProviderConfig>,
    /// Auth plugin specifiers (`name` or `name@version`).
    #[serde(default)]
    pub plugin: Vec<String>,
    /// Providers that must never activate.
    #[serde(default)]
    pub disabled_providers: Vec<String>,
    /// Explicit default model as `provider/model`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Explicit small/cheap model as `provider/model`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_model: Option<String>,
}

/// A config-declared provider. Every field is optional; absent fields fall
/// back to the catalog entry with the same id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Credential environment variable names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<String>>,
    /// Base API URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
    /// Backend package identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npm: Option<String>,
    /// Client options, merged over all other activation sources.
    #[serde(default, skip_serializing_if = "OptionsMap::is_empty")]
    pub options: OptionsMap,
    /// Model key -> declared model overrides.
    #[serde(default)]
    pub models: BTreeMap<String, ModelConfig>,
}

/// A config-declared model. Overlaid field-by-field onto any catalog entry
/// sharing the same key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Upstream model identifier when it differs from the map key (alias).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Per-model backend package override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<PackageOverride>,
    /// Token price overrides; unset fields keep the catalog value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<CostConfig>,
    /// Model-specific client options.
    #[serde(default, skip_serializing_if = "OptionsMap::is_empty")]
    pub options: OptionsMap,
    /// Context/output limits, replacing the catalog value wholesale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<Limit>,
    /// Release date, ISO 8601.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    /// Supports attachments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<bool>,
    /// Supports extended reasoning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<bool>,
    /// Supports a temperature parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<bool>,
    /// Supports tool calling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<bool>,
    /// Input/output modalities, replacing the catalog value wholesale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Modalities>,
    /// Custom request headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
}

/// Partial cost override; unset fields keep the base value.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CostConfig {
    /// Input token price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<f64>,
    /// Output token price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<f64>,
    /// Cache-read token price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read: Option<f64>,
    /// Cache-write token price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_write: Option<f64>,
}

/// Supplies the merged configuration document.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Load the document. A failure here is soft: the registry logs it and
    /// builds with an empty config.
    async fn load(&self) -> Result<Config>;
}

/// A fixed, in-memory configuration. Useful for embedders and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig(pub Config);

#[async_trait]
impl ConfigSource for StaticConfig {
    async fn load(&self) -> Result<Config> {
        Ok(self.0.clone())
    }
}

/// Configuration read from a JSON document on disk.
///
/// A missing file is an empty configuration, not an error; anything else
/// (unreadable file, malformed JSON) is surfaced and the registry degrades
/// to an empty config with a warning.
#[derive(Debug, Clone)]
pub struct FileConfig {
    path: PathBuf,
}

impl FileConfig {
    /// Read configuration from the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The conventional location, `config.json` in the config directory.
    pub fn default_path() -> PathBuf {
        switchyard_paths::config_dir().join("config.json")
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

#[async_trait]
impl ConfigSource for FileConfig {
    async fn load(&self) -> Result<Config> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(body) => Ok(serde_json::from_str(&body)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Deep-merge `overlay` into `base`.
///
/// Maps merge recursively with overlay values winning key-by-key; every
/// other value kind replaces the base wholesale.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Deep-merge two options maps, overlay winning.
pub fn merge_options(base: &mut OptionsMap, overlay: OptionsMap) {
    for (key, value) in overlay {
        match base.get_mut(&key) {
            Some(existing) => deep_merge(existing, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_nested_maps_recurse() {
        let mut base = json!({ "headers": { "a": "1", "b": "2" }, "timeout": 5000 });
        deep_merge(&mut base, json!({ "headers": { "b": "3" } }));
        assert_eq!(
            base,
            json!({ "headers": { "a": "1", "b": "3" }, "timeout": 5000 })
        );
    }

    #[test]
    fn deep_merge_scalars_replace_wholesale() {
        let mut base = json!({ "region": "us-east-1", "tags": ["a"] });
        deep_merge(&mut base, json!({ "region": "eu-west-1", "tags": ["b"] }));
        assert_eq!(base, json!({ "region": "eu-west-1", "tags": ["b"] }));
    }

    #[test]
    fn merge_options_overlay_wins() {
        let mut base = json!({ "apiKey": "old", "keep": true })
            .as_object()
            .unwrap()
            .clone();
        let overlay = json!({ "apiKey": "new" }).as_object().unwrap().clone();
        merge_options(&mut base, overlay);
        assert_eq!(base["apiKey"], json!("new"));
        assert_eq!(base["keep"], json!(true));
    }

    #[test]
    fn config_deserializes_document() {
        let config: Config = serde_json::from_str(
            r#"{
                "model": "acme/foo-v2",
                "disabled_providers": ["legacy"],
                "provider": {
                    "acme": {
                        "options": { "apiKey": "sk-test" },
                        "models": {
                            "fast": { "id": "foo-mini-v2", "tool_call": false }
                        }
                    }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.model.as_deref(), Some("acme/foo-v2"));
        assert_eq!(config.disabled_providers, vec!["legacy"]);
        let acme = &config.provider["acme"];
        assert_eq!(acme.options["apiKey"], serde_json::json!("sk-test"));
        let fast = &acme.models["fast"];
        assert_eq!(fast.id.as_deref(), Some("foo-mini-v2"));
        assert_eq!(fast.tool_call, Some(false));
    }

    #[tokio::test]
    async fn file_config_reads_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, r#"{ "model": "acme/foo-v2" }"#)
            .await
            .unwrap();

        let config = FileConfig::new(&path).load().await.unwrap();
        assert_eq!(config.model.as_deref(), Some("acme/foo-v2"));
    }

    #[tokio::test]
    async fn file_config_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileConfig::new(dir.path().join("missing.json"));
        let config = source.load().await.unwrap();
        assert!(config.provider.is_empty());
        assert!(config.model.is_none());
    }

    #[tokio::test]
    async fn file_config_malformed_document_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();
        assert!(FileConfig::new(&path).load().await.is_err());
    }

    #[tokio::test]
    async fn static_config_loads_clone() {
        let source = StaticConfig(Config {
            model: Some("acme/foo".to_string()),
            ..Default::default()
        });
        let config = source.load().await.unwrap();
        assert_eq!(config.model.as_deref(), Some("acme/foo"));
    }
}
