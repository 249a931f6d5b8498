//! Catalog data model: providers, models, and their metadata.
//!
//! The serde shapes follow the upstream catalog document (a JSON map from
//! provider id to provider metadata). Config-declared providers and models
//! are overlaid onto these entries at build time; afterwards the types are
//! read-only.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A JSON object used for provider/client options.
pub type OptionsMap = serde_json::Map<String, serde_json::Value>;

/// The catalog: provider id -> provider metadata.
pub type Catalog = BTreeMap<String, ProviderEntry>;

/// Reference to a model as `provider/model`.
///
/// The model part may itself contain `/` (e.g. openrouter-style ids), so
/// parsing splits on the first separator only.
///
/// # Examples
///
/// ```
/// use switchyard_models::ModelRef;
///
/// let r = ModelRef::parse("acme/foo/bar");
/// assert_eq!(r.provider, "acme");
/// assert_eq!(r.model, "foo/bar");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelRef {
    /// Provider identifier.
    pub provider: String,
    /// Model identifier.
    pub model: String,
}

impl ModelRef {
    /// Create a reference from parts.
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Parse a `provider/model` string, splitting on the first `/` only.
    ///
    /// A string without a separator yields an empty model id; no validation
    /// against the catalog happens here.
    pub fn parse(s: &str) -> Self {
        match s.split_once('/') {
            Some((provider, model)) => Self::new(provider, model),
            None => Self::new(s, ""),
        }
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Input/output data kinds a model accepts or produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Plain text.
    Text,
    /// Images.
    Image,
    /// Audio.
    Audio,
    /// Video.
    Video,
    /// PDF documents.
    Pdf,
    /// Anything the catalog declares that we do not know about.
    #[serde(other)]
    Other,
}

/// Input and output modality lists for a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modalities {
    /// Accepted input kinds.
    pub input: Vec<Modality>,
    /// Produced output kinds.
    pub output: Vec<Modality>,
}

impl Default for Modalities {
    /// Text-in, text-out.
    fn default() -> Self {
        Self {
            input: vec![Modality::Text],
            output: vec![Modality::Text],
        }
    }
}

/// Unit prices per million tokens, in USD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    /// Input token price.
    #[serde(default)]
    pub input: f64,
    /// Output token price.
    #[serde(default)]
    pub output: f64,
    /// Cache-read token price.
    #[serde(default)]
    pub cache_read: f64,
    /// Cache-write token price.
    #[serde(default)]
    pub cache_write: f64,
}

/// Context and output size limits, in tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limit {
    /// Maximum context window.
    #[serde(default)]
    pub context: u64,
    /// Maximum output size.
    #[serde(default)]
    pub output: u64,
}

/// Per-model backend package override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageOverride {
    /// Package identifier to load instead of the provider's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npm: Option<String>,
}

fn default_true() -> bool {
    true
}

/// A single model's metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Upstream model identifier. May differ from the catalog key when the
    /// config declares an alias.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Release date, ISO 8601.
    #[serde(default)]
    pub release_date: String,
    /// Supports file/image attachments.
    #[serde(default)]
    pub attachment: bool,
    /// Supports extended reasoning.
    #[serde(default)]
    pub reasoning: bool,
    /// Supports a temperature parameter.
    #[serde(default)]
    pub temperature: bool,
    /// Supports tool calling. Defaults to true.
    #[serde(default = "default_true")]
    pub tool_call: bool,
    /// Token prices.
    #[serde(default)]
    pub cost: Cost,
    /// Context/output limits.
    #[serde(default)]
    pub limit: Limit,
    /// Input/output modalities.
    #[serde(default)]
    pub modalities: Modalities,
    /// Model-specific client options merged into requests.
    #[serde(default, skip_serializing_if = "OptionsMap::is_empty")]
    pub options: OptionsMap,
    /// Custom headers sent with requests for this model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    /// Per-model backend package override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<PackageOverride>,
    /// Pre-release model, hidden unless experimental models are enabled.
    #[serde(default)]
    pub experimental: bool,
    /// Lifecycle status from the catalog ("alpha", "deprecated", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ModelEntry {
    /// A minimal entry with the given id, everything else defaulted.
    pub fn named(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            release_date: String::new(),
            attachment: false,
            reasoning: false,
            temperature: false,
            tool_call: true,
            cost: Cost::default(),
            limit: Limit::default(),
            modalities: Modalities::default(),
            options: OptionsMap::new(),
            headers: None,
            provider: None,
            experimental: false,
            status: None,
        }
    }
}

/// A provider's static metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// Provider identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Environment variable names that carry this provider's credential,
    /// in priority order.
    #[serde(default)]
    pub env: Vec<String>,
    /// Base API URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
    /// Backend package identifier. Falls back to the provider id when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npm: Option<String>,
    /// Model id -> model metadata.
    #[serde(default)]
    pub models: BTreeMap<String, ModelEntry>,
}

impl ProviderEntry {
    /// A minimal entry with the given id, everything else defaulted.
    pub fn named(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            env: Vec::new(),
            api: None,
            npm: None,
            models: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_ref_splits_on_first_slash_only() {
        let r = ModelRef::parse("openrouter/openai/gpt-5");
        assert_eq!(r.provider, "openrouter");
        assert_eq!(r.model, "openai/gpt-5");
    }

    #[test]
    fn model_ref_without_separator_has_empty_model() {
        let r = ModelRef::parse("acme");
        assert_eq!(r.provider, "acme");
        assert_eq!(r.model, "");
    }

    #[test]
    fn model_ref_displays_as_slash_pair() {
        let r = ModelRef::new("acme", "foo-v2");
        assert_eq!(r.to_string(), "acme/foo-v2");
    }

    #[test]
    fn model_entry_deserializes_catalog_fragment() {
        let entry: ModelEntry = serde_json::from_str(
            r#"{
                "id": "foo-v2",
                "name": "Foo v2",
                "release_date": "2025-03-01",
                "attachment": true,
                "cost": { "input": 3.0, "output": 15.0 },
                "limit": { "context": 200000, "output": 8192 },
                "modalities": { "input": ["text", "image"], "output": ["text"] }
            }"#,
        )
        .unwrap();

        assert_eq!(entry.id, "foo-v2");
        assert!(entry.attachment);
        assert!(entry.tool_call, "tool_call defaults to true");
        assert!(!entry.reasoning);
        assert_eq!(entry.cost.input, 3.0);
        assert_eq!(entry.cost.cache_read, 0.0);
        assert_eq!(entry.limit.context, 200_000);
        assert_eq!(entry.modalities.input, vec![Modality::Text, Modality::Image]);
    }

    #[test]
    fn unknown_modality_maps_to_other() {
        let m: Modality = serde_json::from_str("\"holograms\"").unwrap();
        assert_eq!(m, Modality::Other);
    }

    #[test]
    fn provider_entry_defaults_are_empty() {
        let entry: ProviderEntry =
            serde_json::from_str(r#"{ "id": "acme", "name": "Acme" }"#).unwrap();
        assert!(entry.env.is_empty());
        assert!(entry.api.is_none());
        assert!(entry.npm.is_none());
        assert!(entry.models.is_empty());
    }

    #[test]
    fn modalities_default_to_text_only() {
        let m = Modalities::default();
        assert_eq!(m.input, vec![Modality::Text]);
        assert_eq!(m.output, vec![Modality::Text]);
    }
}
