//! Tunable policy for filtering and selection.
//!
//! The pipeline's model exclusions and the selection priorities are data,
//! not code: they carry provider-specific literals whose provenance is
//! upstream churn, so embedders can override them without forking the
//! registry. The defaults match the hosted gateway's current lists.

use std::collections::BTreeMap;

/// Options controlling a registry instance.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Process environment snapshot used for activation. An explicit map,
    /// not live process state, so builds are deterministic under test.
    pub env: BTreeMap<String, String>,
    /// Ask the plugin source to include its default plugin set.
    pub include_default_plugins: bool,
    /// Model filtering rules.
    pub filter: FilterRules,
    /// Default/small model selection rules.
    pub selection: SelectionRules,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            env: BTreeMap::new(),
            include_default_plugins: true,
            filter: FilterRules::default(),
            selection: SelectionRules::default(),
        }
    }
}

impl RegistryOptions {
    /// Options with the current process environment snapshotted in.
    pub fn from_process_env() -> Self {
        Self {
            env: std::env::vars().collect(),
            ..Default::default()
        }
    }
}

/// Which models are dropped from activated providers.
#[derive(Debug, Clone)]
pub struct FilterRules {
    /// Model keys dropped from every provider (legacy aliases).
    pub excluded_models: Vec<String>,
    /// (provider, model key) pairs dropped from one provider only.
    pub provider_excluded_models: Vec<(String, String)>,
    /// Keep experimental and alpha-status models.
    pub allow_experimental: bool,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            excluded_models: vec!["gpt-5-chat-latest".to_string()],
            provider_excluded_models: vec![(
                "openrouter".to_string(),
                "openai/gpt-5-chat".to_string(),
            )],
            allow_experimental: false,
        }
    }
}

impl FilterRules {
    /// Whether a model key is excluded for a provider.
    pub fn excludes(&self, provider: &str, model: &str) -> bool {
        self.excluded_models.iter().any(|m| m == model)
            || self
                .provider_excluded_models
                .iter()
                .any(|(p, m)| p == provider && m == model)
    }
}

/// How default and small models are chosen when config names none.
#[derive(Debug, Clone)]
pub struct SelectionRules {
    /// Flagship-name substrings; a model matching an earlier entry ranks
    /// higher when picking a default.
    pub flagship: Vec<String>,
    /// Cheap/small-model substrings, scanned in order.
    pub small: Vec<String>,
    /// Per-provider replacement of the whole small-model list.
    pub small_overrides: BTreeMap<String, Vec<String>>,
    /// Per-provider entries removed from the small-model list.
    pub small_removals: BTreeMap<String, Vec<String>>,
}

impl Default for SelectionRules {
    fn default() -> Self {
        let mut small_overrides = BTreeMap::new();
        small_overrides.insert("switchyard".to_string(), vec!["gpt-5-nano".to_string()]);
        small_overrides.insert("local".to_string(), vec!["gpt-5-nano".to_string()]);

        let mut small_removals = BTreeMap::new();
        small_removals.insert(
            "github-copilot".to_string(),
            vec!["claude-haiku-4.5".to_string()],
        );

        Self {
            flagship: vec![
                "gpt-5".to_string(),
                "claude-sonnet-4".to_string(),
                "big-pickle".to_string(),
                "gemini-3-pro".to_string(),
            ],
            small: vec![
                "claude-haiku-4-5".to_string(),
                "claude-haiku-4.5".to_string(),
                "3-5-haiku".to_string(),
                "3.5-haiku".to_string(),
                "gemini-2.5-flash".to_string(),
                "gpt-5-nano".to_string(),
            ],
            small_overrides,
            small_removals,
        }
    }
}

impl SelectionRules {
    /// The small-model priority list effective for a provider.
    pub fn small_priorities(&self, provider: &str) -> Vec<&str> {
        if let Some(replacement) = self.small_overrides.get(provider) {
            return replacement.iter().map(String::as_str).collect();
        }
        let removed = self.small_removals.get(provider);
        self.small
            .iter()
            .filter(|item| removed.is_none_or(|r| !r.contains(item)))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_excludes_global_and_per_provider() {
        let rules = FilterRules::default();
        assert!(rules.excludes("acme", "gpt-5-chat-latest"));
        assert!(rules.excludes("openrouter", "openai/gpt-5-chat"));
        assert!(!rules.excludes("acme", "openai/gpt-5-chat"));
    }

    #[test]
    fn small_priorities_default_list() {
        let rules = SelectionRules::default();
        let list = rules.small_priorities("acme");
        assert_eq!(list[0], "claude-haiku-4-5");
        assert!(list.contains(&"gpt-5-nano"));
    }

    #[test]
    fn small_priorities_removal_applies() {
        let rules = SelectionRules::default();
        let list = rules.small_priorities("github-copilot");
        assert!(!list.contains(&"claude-haiku-4.5"));
        assert!(list.contains(&"claude-haiku-4-5"));
    }

    #[test]
    fn small_priorities_override_replaces_list() {
        let rules = SelectionRules::default();
        assert_eq!(rules.small_priorities("switchyard"), vec!["gpt-5-nano"]);
    }
}
