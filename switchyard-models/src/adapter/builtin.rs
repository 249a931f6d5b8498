//! Built-in provider adapters.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{Activation, ActivateContext, ModelInvoker, ProviderAdapter};
use crate::sdk::{LanguageModel, SdkClient};
use crate::types::{OptionsMap, ProviderEntry};
use crate::Result;

fn header_options(headers: &[(&str, &str)]) -> OptionsMap {
    let mut map = serde_json::Map::new();
    for (name, value) in headers {
        map.insert(name.to_string(), json!(value));
    }
    let mut options = OptionsMap::new();
    options.insert("headers".to_string(), Value::Object(map));
    options
}

/// Anthropic: never autoloads, contributes the beta feature headers every
/// request needs.
pub struct AnthropicAdapter;

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn provider_id(&self) -> &str {
        "anthropic"
    }

    async fn activate(
        &self,
        _entry: Option<&mut ProviderEntry>,
        _cx: &ActivateContext<'_>,
    ) -> Result<Option<Activation>> {
        Ok(Some(Activation {
            autoload: false,
            options: header_options(&[(
                "anthropic-beta",
                "interleaved-thinking-2025-05-14,fine-grained-tool-streaming-2025-05-14",
            )]),
            invoker: None,
            module_subpath: None,
        }))
    }
}

/// The first-party gateway provider.
///
/// Without a credential only the free-tier models remain available and
/// requests go out with the public key; with one, the full model list stays.
pub struct SwitchyardAdapter;

#[async_trait]
impl ProviderAdapter for SwitchyardAdapter {
    fn provider_id(&self) -> &str {
        "switchyard"
    }

    async fn activate(
        &self,
        entry: Option<&mut ProviderEntry>,
        cx: &ActivateContext<'_>,
    ) -> Result<Option<Activation>> {
        let Some(entry) = entry else {
            return Ok(None);
        };

        let has_key =
            cx.first_env(&entry.env).is_some() || cx.has_credential(&entry.id).await;

        if !has_key {
            let before = entry.models.len();
            entry.models.retain(|_, model| model.cost.input == 0.0);
            debug!(
                removed = before - entry.models.len(),
                "no gateway credential, free-tier models only"
            );
        }

        let mut options = OptionsMap::new();
        if !has_key {
            options.insert("apiKey".to_string(), json!("public"));
        }

        Ok(Some(Activation {
            autoload: !entry.models.is_empty(),
            options,
            invoker: None,
            module_subpath: None,
        }))
    }
}

struct ResponsesInvoker;

#[async_trait]
impl ModelInvoker for ResponsesInvoker {
    async fn language_model(
        &self,
        client: &dyn SdkClient,
        model_id: &str,
        _options: &OptionsMap,
    ) -> Result<Arc<dyn LanguageModel>> {
        client.responses_model(model_id).await
    }
}

/// OpenAI: models resolve through the responses endpoint.
pub struct OpenAiAdapter;

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn provider_id(&self) -> &str {
        "openai"
    }

    async fn activate(
        &self,
        _entry: Option<&mut ProviderEntry>,
        _cx: &ActivateContext<'_>,
    ) -> Result<Option<Activation>> {
        Ok(Some(Activation {
            autoload: false,
            options: OptionsMap::new(),
            invoker: Some(Arc::new(ResponsesInvoker)),
            module_subpath: None,
        }))
    }
}

struct AzureInvoker;

#[async_trait]
impl ModelInvoker for AzureInvoker {
    async fn language_model(
        &self,
        client: &dyn SdkClient,
        model_id: &str,
        options: &OptionsMap,
    ) -> Result<Arc<dyn LanguageModel>> {
        if options.get("useCompletionUrls") == Some(&Value::Bool(true)) {
            client.chat_model(model_id).await
        } else {
            client.responses_model(model_id).await
        }
    }
}

/// Azure OpenAI: deployments serve either completion or responses URLs,
/// selected by the `useCompletionUrls` option.
pub struct AzureAdapter;

#[async_trait]
impl ProviderAdapter for AzureAdapter {
    fn provider_id(&self) -> &str {
        "azure"
    }

    async fn activate(
        &self,
        _entry: Option<&mut ProviderEntry>,
        _cx: &ActivateContext<'_>,
    ) -> Result<Option<Activation>> {
        Ok(Some(Activation {
            autoload: false,
            options: OptionsMap::new(),
            invoker: Some(Arc::new(AzureInvoker)),
            module_subpath: None,
        }))
    }
}

/// Azure Cognitive Services: like Azure, plus a base URL derived from the
/// resource name in the environment.
pub struct AzureCognitiveAdapter;

#[async_trait]
impl ProviderAdapter for AzureCognitiveAdapter {
    fn provider_id(&self) -> &str {
        "azure-cognitive-services"
    }

    async fn activate(
        &self,
        _entry: Option<&mut ProviderEntry>,
        cx: &ActivateContext<'_>,
    ) -> Result<Option<Activation>> {
        let mut options = OptionsMap::new();
        if let Some(resource) = cx.env_var("AZURE_COGNITIVE_SERVICES_RESOURCE_NAME") {
            options.insert(
                "baseURL".to_string(),
                json!(format!("https://{resource}.cognitiveservices.azure.com/openai")),
            );
        }
        Ok(Some(Activation {
            autoload: false,
            options,
            invoker: Some(Arc::new(AzureInvoker)),
            module_subpath: None,
        }))
    }
}

/// Rewrite a Bedrock model id with the inference-profile prefix its region
/// requires.
fn bedrock_model_id(region: &str, model_id: &str) -> String {
    let contains_any = |needles: &[&str]| needles.iter().any(|m| model_id.contains(m));

    match region.split('-').next().unwrap_or("") {
        "us" => {
            let needs_prefix = contains_any(&[
                "nova-micro",
                "nova-lite",
                "nova-pro",
                "nova-premier",
                "claude",
                "deepseek",
            ]);
            if needs_prefix && !region.starts_with("us-gov") {
                format!("us.{model_id}")
            } else {
                model_id.to_string()
            }
        }
        "eu" => {
            let region_needs_prefix = [
                "eu-west-1",
                "eu-west-2",
                "eu-west-3",
                "eu-north-1",
                "eu-central-1",
                "eu-south-1",
                "eu-south-2",
            ]
            .iter()
            .any(|r| region.contains(r));
            let model_needs_prefix =
                contains_any(&["claude", "nova-lite", "nova-micro", "llama3", "pixtral"]);
            if region_needs_prefix && model_needs_prefix {
                format!("eu.{model_id}")
            } else {
                model_id.to_string()
            }
        }
        "ap" => {
            let australia = matches!(region, "ap-southeast-2" | "ap-southeast-4");
            if australia
                && contains_any(&["anthropic.claude-sonnet-4-5", "anthropic.claude-haiku"])
            {
                format!("au.{model_id}")
            } else if contains_any(&["claude", "nova-lite", "nova-micro", "nova-pro"]) {
                format!("apac.{model_id}")
            } else {
                model_id.to_string()
            }
        }
        _ => model_id.to_string(),
    }
}

struct BedrockInvoker {
    region: String,
}

#[async_trait]
impl ModelInvoker for BedrockInvoker {
    async fn language_model(
        &self,
        client: &dyn SdkClient,
        model_id: &str,
        _options: &OptionsMap,
    ) -> Result<Arc<dyn LanguageModel>> {
        client
            .language_model(&bedrock_model_id(&self.region, model_id))
            .await
    }
}

/// Amazon Bedrock: activates when the AWS credential chain is reachable and
/// rewrites model ids with the regional inference-profile prefix.
pub struct BedrockAdapter;

#[async_trait]
impl ProviderAdapter for BedrockAdapter {
    fn provider_id(&self) -> &str {
        "amazon-bedrock"
    }

    async fn activate(
        &self,
        _entry: Option<&mut ProviderEntry>,
        cx: &ActivateContext<'_>,
    ) -> Result<Option<Activation>> {
        if cx
            .first_env(&["AWS_PROFILE", "AWS_ACCESS_KEY_ID", "AWS_BEARER_TOKEN_BEDROCK"])
            .is_none()
        {
            return Ok(None);
        }

        let region = cx.env_var("AWS_REGION").unwrap_or("us-east-1").to_string();
        let mut options = OptionsMap::new();
        options.insert("region".to_string(), json!(region));

        Ok(Some(Activation {
            autoload: true,
            options,
            invoker: Some(Arc::new(BedrockInvoker { region })),
            module_subpath: None,
        }))
    }
}

struct TrimmedIdInvoker;

#[async_trait]
impl ModelInvoker for TrimmedIdInvoker {
    async fn language_model(
        &self,
        client: &dyn SdkClient,
        model_id: &str,
        _options: &OptionsMap,
    ) -> Result<Arc<dyn LanguageModel>> {
        client.language_model(model_id.trim()).await
    }
}

/// Google Vertex: activates when a cloud project is configured in the
/// environment.
pub struct GoogleVertexAdapter;

#[async_trait]
impl ProviderAdapter for GoogleVertexAdapter {
    fn provider_id(&self) -> &str {
        "google-vertex"
    }

    async fn activate(
        &self,
        _entry: Option<&mut ProviderEntry>,
        cx: &ActivateContext<'_>,
    ) -> Result<Option<Activation>> {
        let Some(project) =
            cx.first_env(&["GOOGLE_CLOUD_PROJECT", "GCP_PROJECT", "GCLOUD_PROJECT"])
        else {
            return Ok(None);
        };
        let location = cx
            .first_env(&["GOOGLE_CLOUD_LOCATION", "VERTEX_LOCATION"])
            .unwrap_or("us-east5");

        let mut options = OptionsMap::new();
        options.insert("project".to_string(), json!(project));
        options.insert("location".to_string(), json!(location));

        Ok(Some(Activation {
            autoload: true,
            options,
            invoker: Some(Arc::new(TrimmedIdInvoker)),
            module_subpath: None,
        }))
    }
}

/// Google Vertex serving Anthropic models: same project detection as
/// [`GoogleVertexAdapter`] but defaults to the `global` location, and the
/// backend lives at an entry point inside the shared Vertex package.
pub struct GoogleVertexAnthropicAdapter;

#[async_trait]
impl ProviderAdapter for GoogleVertexAnthropicAdapter {
    fn provider_id(&self) -> &str {
        "google-vertex-anthropic"
    }

    async fn activate(
        &self,
        _entry: Option<&mut ProviderEntry>,
        cx: &ActivateContext<'_>,
    ) -> Result<Option<Activation>> {
        let Some(project) =
            cx.first_env(&["GOOGLE_CLOUD_PROJECT", "GCP_PROJECT", "GCLOUD_PROJECT"])
        else {
            return Ok(None);
        };
        let location = cx
            .first_env(&["GOOGLE_CLOUD_LOCATION", "VERTEX_LOCATION"])
            .unwrap_or("global");

        let mut options = OptionsMap::new();
        options.insert("project".to_string(), json!(project));
        options.insert("location".to_string(), json!(location));

        Ok(Some(Activation {
            autoload: true,
            options,
            invoker: Some(Arc::new(TrimmedIdInvoker)),
            module_subpath: Some(PathBuf::from("dist/anthropic")),
        }))
    }
}

/// OpenRouter: never autoloads, contributes attribution headers.
pub struct OpenRouterAdapter;

#[async_trait]
impl ProviderAdapter for OpenRouterAdapter {
    fn provider_id(&self) -> &str {
        "openrouter"
    }

    async fn activate(
        &self,
        _entry: Option<&mut ProviderEntry>,
        _cx: &ActivateContext<'_>,
    ) -> Result<Option<Activation>> {
        Ok(Some(Activation {
            autoload: false,
            options: header_options(&[
                ("HTTP-Referer", "https://switchyard.dev/"),
                ("X-Title", "switchyard"),
            ]),
            invoker: None,
            module_subpath: None,
        }))
    }
}

/// Vercel AI gateway: never autoloads, contributes attribution headers.
/// Header names are lowercase, unlike openrouter's.
pub struct VercelAdapter;

#[async_trait]
impl ProviderAdapter for VercelAdapter {
    fn provider_id(&self) -> &str {
        "vercel"
    }

    async fn activate(
        &self,
        _entry: Option<&mut ProviderEntry>,
        _cx: &ActivateContext<'_>,
    ) -> Result<Option<Activation>> {
        Ok(Some(Activation {
            autoload: false,
            options: header_options(&[
                ("http-referer", "https://switchyard.dev/"),
                ("x-title", "switchyard"),
            ]),
            invoker: None,
            module_subpath: None,
        }))
    }
}

/// Zenmux: never autoloads, contributes attribution headers.
pub struct ZenmuxAdapter;

#[async_trait]
impl ProviderAdapter for ZenmuxAdapter {
    fn provider_id(&self) -> &str {
        "zenmux"
    }

    async fn activate(
        &self,
        _entry: Option<&mut ProviderEntry>,
        _cx: &ActivateContext<'_>,
    ) -> Result<Option<Activation>> {
        Ok(Some(Activation {
            autoload: false,
            options: header_options(&[
                ("HTTP-Referer", "https://switchyard.dev/"),
                ("X-Title", "switchyard"),
            ]),
            invoker: None,
            module_subpath: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCredentialStore;
    use crate::types::{Cost, ModelEntry};
    use std::collections::BTreeMap;

    fn context<'a>(
        env: &'a BTreeMap<String, String>,
        credentials: &'a MemoryCredentialStore,
    ) -> ActivateContext<'a> {
        ActivateContext { env, credentials }
    }

    fn entry_with_costs() -> ProviderEntry {
        let mut entry = ProviderEntry::named("switchyard");
        entry.env = vec!["SWITCHYARD_API_KEY".to_string()];
        let mut free = ModelEntry::named("nano-free");
        free.cost = Cost::default();
        let mut paid = ModelEntry::named("large-paid");
        paid.cost = Cost {
            input: 3.0,
            ..Cost::default()
        };
        entry.models.insert("nano-free".to_string(), free);
        entry.models.insert("large-paid".to_string(), paid);
        entry
    }

    #[tokio::test]
    async fn switchyard_strips_paid_models_without_credential() {
        let env = BTreeMap::new();
        let credentials = MemoryCredentialStore::new();
        let mut entry = entry_with_costs();

        let activation = SwitchyardAdapter
            .activate(Some(&mut entry), &context(&env, &credentials))
            .await
            .unwrap()
            .unwrap();

        assert!(activation.autoload);
        assert_eq!(activation.options["apiKey"], json!("public"));
        assert!(entry.models.contains_key("nano-free"));
        assert!(!entry.models.contains_key("large-paid"));
    }

    #[tokio::test]
    async fn switchyard_keeps_paid_models_with_env_key() {
        let mut env = BTreeMap::new();
        env.insert("SWITCHYARD_API_KEY".to_string(), "sk-1".to_string());
        let credentials = MemoryCredentialStore::new();
        let mut entry = entry_with_costs();

        let activation = SwitchyardAdapter
            .activate(Some(&mut entry), &context(&env, &credentials))
            .await
            .unwrap()
            .unwrap();

        assert!(activation.autoload);
        assert!(activation.options.is_empty());
        assert_eq!(entry.models.len(), 2);
    }

    #[tokio::test]
    async fn bedrock_skips_without_aws_environment() {
        let env = BTreeMap::new();
        let credentials = MemoryCredentialStore::new();
        let result = BedrockAdapter
            .activate(None, &context(&env, &credentials))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn bedrock_autoloads_with_access_key() {
        let mut env = BTreeMap::new();
        env.insert("AWS_ACCESS_KEY_ID".to_string(), "AKIA...".to_string());
        env.insert("AWS_REGION".to_string(), "eu-west-1".to_string());
        let credentials = MemoryCredentialStore::new();

        let activation = BedrockAdapter
            .activate(None, &context(&env, &credentials))
            .await
            .unwrap()
            .unwrap();

        assert!(activation.autoload);
        assert_eq!(activation.options["region"], json!("eu-west-1"));
        assert!(activation.invoker.is_some());
    }

    #[test]
    fn bedrock_prefixes_us_models() {
        assert_eq!(
            bedrock_model_id("us-east-1", "anthropic.claude-sonnet-4-5"),
            "us.anthropic.claude-sonnet-4-5"
        );
        assert_eq!(bedrock_model_id("us-east-1", "titan-text"), "titan-text");
        assert_eq!(
            bedrock_model_id("us-gov-west-1", "anthropic.claude-sonnet-4-5"),
            "anthropic.claude-sonnet-4-5"
        );
    }

    #[test]
    fn bedrock_prefixes_eu_models() {
        assert_eq!(
            bedrock_model_id("eu-central-1", "anthropic.claude-sonnet-4-5"),
            "eu.anthropic.claude-sonnet-4-5"
        );
        assert_eq!(
            bedrock_model_id("eu-unknown-9", "anthropic.claude-sonnet-4-5"),
            "anthropic.claude-sonnet-4-5"
        );
    }

    #[test]
    fn bedrock_prefixes_ap_models() {
        assert_eq!(
            bedrock_model_id("ap-southeast-2", "anthropic.claude-haiku"),
            "au.anthropic.claude-haiku"
        );
        assert_eq!(
            bedrock_model_id("ap-northeast-1", "nova-lite-v1"),
            "apac.nova-lite-v1"
        );
    }

    #[tokio::test]
    async fn vertex_requires_project() {
        let env = BTreeMap::new();
        let credentials = MemoryCredentialStore::new();
        let result = GoogleVertexAdapter
            .activate(None, &context(&env, &credentials))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn vertex_reads_project_and_default_location() {
        let mut env = BTreeMap::new();
        env.insert("GCP_PROJECT".to_string(), "demo-project".to_string());
        let credentials = MemoryCredentialStore::new();

        let activation = GoogleVertexAdapter
            .activate(None, &context(&env, &credentials))
            .await
            .unwrap()
            .unwrap();

        assert!(activation.autoload);
        assert_eq!(activation.options["project"], json!("demo-project"));
        assert_eq!(activation.options["location"], json!("us-east5"));
    }

    #[tokio::test]
    async fn vertex_anthropic_uses_global_location_and_entry_point() {
        let mut env = BTreeMap::new();
        env.insert("GCP_PROJECT".to_string(), "demo-project".to_string());
        let credentials = MemoryCredentialStore::new();

        let activation = GoogleVertexAnthropicAdapter
            .activate(None, &context(&env, &credentials))
            .await
            .unwrap()
            .unwrap();

        assert!(activation.autoload);
        assert_eq!(activation.options["location"], json!("global"));
        assert_eq!(
            activation.module_subpath,
            Some(PathBuf::from("dist/anthropic"))
        );
    }

    #[tokio::test]
    async fn vertex_anthropic_requires_project() {
        let env = BTreeMap::new();
        let credentials = MemoryCredentialStore::new();
        let result = GoogleVertexAnthropicAdapter
            .activate(None, &context(&env, &credentials))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn vercel_uses_lowercase_attribution_headers() {
        let env = BTreeMap::new();
        let credentials = MemoryCredentialStore::new();
        let activation = VercelAdapter
            .activate(None, &context(&env, &credentials))
            .await
            .unwrap()
            .unwrap();
        assert!(!activation.autoload);
        let headers = activation.options["headers"].as_object().unwrap();
        assert!(headers.contains_key("http-referer"));
        assert!(!headers.contains_key("HTTP-Referer"));
    }

    #[tokio::test]
    async fn anthropic_contributes_beta_headers() {
        let env = BTreeMap::new();
        let credentials = MemoryCredentialStore::new();
        let activation = AnthropicAdapter
            .activate(None, &context(&env, &credentials))
            .await
            .unwrap()
            .unwrap();
        assert!(!activation.autoload);
        let headers = activation.options["headers"].as_object().unwrap();
        assert!(headers.contains_key("anthropic-beta"));
    }
}
