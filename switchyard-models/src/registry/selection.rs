//! Default and small model selection.

use tracing::debug;

use super::rules::SelectionRules;
use super::state::ProviderState;
use crate::types::{ModelEntry, ModelRef};
use crate::{Error, Result};

/// Position of the first matching flagship-name substring; lower is better,
/// non-matching models rank after every match.
fn flagship_rank(rules: &SelectionRules, id: &str) -> usize {
    rules
        .flagship
        .iter()
        .position(|name| id.contains(name.as_str()))
        .unwrap_or(usize::MAX)
}

/// Order a provider's models from most to least preferable as a default:
/// flagship matches first (earlier list entries rank higher), then models
/// tagged "latest", then newest-looking id.
pub(crate) fn sort_models<'a>(
    rules: &SelectionRules,
    models: impl Iterator<Item = &'a ModelEntry>,
) -> Vec<&'a ModelEntry> {
    let mut list: Vec<&ModelEntry> = models.collect();
    list.sort_by(|a, b| {
        flagship_rank(rules, &a.id)
            .cmp(&flagship_rank(rules, &b.id))
            .then_with(|| b.id.contains("latest").cmp(&a.id.contains("latest")))
            .then_with(|| b.id.cmp(&a.id))
    });
    list
}

/// Pick the default model.
///
/// An explicit `model` in config is taken verbatim, without existence
/// checks. Otherwise config-declared providers act as an allow-list: the
/// first active provider on it is used, and an allow-list no active
/// provider matches is an error. With no declared providers at all, the
/// first active provider in id order is used. The chosen provider's best
/// model per [`sort_models`] wins.
pub(crate) fn default_model(state: &ProviderState, rules: &SelectionRules) -> Result<ModelRef> {
    if let Some(model) = &state.config.model {
        return Ok(ModelRef::parse(model));
    }

    let provider = state
        .providers
        .values()
        .find(|p| {
            state.config.provider.is_empty()
                || state.config.provider.contains_key(&p.entry.id)
        })
        .ok_or(Error::NoProviders)?;

    let sorted = sort_models(rules, provider.entry.models.values());
    let best = sorted
        .first()
        .ok_or_else(|| Error::NoModels(provider.entry.id.clone()))?;
    let picked = ModelRef::new(&provider.entry.id, &best.id);
    debug!(model = %picked, "selected default model");
    Ok(picked)
}

/// Pick the small/cheap model for background work on `provider`.
///
/// An explicit `small_model` in config is taken verbatim. Otherwise the
/// provider's models are scanned against its effective priority list; the
/// first priority entry contained in any model id wins. `None` means the
/// caller should fall back to the default model.
pub(crate) fn small_model(
    state: &ProviderState,
    rules: &SelectionRules,
    provider: &str,
) -> Option<ModelRef> {
    if let Some(small) = &state.config.small_model {
        return Some(ModelRef::parse(small));
    }

    let active = state.providers.get(provider)?;
    for priority in rules.small_priorities(provider) {
        if let Some(key) = active
            .entry
            .models
            .keys()
            .find(|id| id.contains(priority))
        {
            return Some(ModelRef::new(provider, key.clone()));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelEntry;

    fn entries(ids: &[&str]) -> Vec<ModelEntry> {
        ids.iter().map(|id| ModelEntry::named(*id)).collect()
    }

    #[test]
    fn sort_prefers_flagship_matches_in_list_order() {
        let rules = SelectionRules::default();
        let models = entries(&["gemini-3-pro", "gpt-5", "gpt-4-turbo"]);
        let sorted = sort_models(&rules, models.iter());
        assert_eq!(sorted[0].id, "gpt-5");
        assert_eq!(sorted[1].id, "gemini-3-pro");
        assert_eq!(sorted[2].id, "gpt-4-turbo");
    }

    #[test]
    fn sort_prefers_latest_within_equal_rank() {
        let rules = SelectionRules::default();
        let models = entries(&["foo-v2", "foo-latest"]);
        let sorted = sort_models(&rules, models.iter());
        assert_eq!(sorted[0].id, "foo-latest");
    }

    #[test]
    fn sort_falls_back_to_descending_id() {
        let rules = SelectionRules::default();
        let models = entries(&["foo-v1", "foo-v3", "foo-v2"]);
        let sorted = sort_models(&rules, models.iter());
        assert_eq!(sorted[0].id, "foo-v3");
        assert_eq!(sorted[2].id, "foo-v1");
    }
}
