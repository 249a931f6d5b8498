//! The backend SDK seam: module loading targets, constructed clients, and
//! client fingerprinting.
//!
//! A backend package, once provisioned and loaded, is an [`SdkModule`]. Its
//! canonical factory entry point constructs an [`SdkClient`] from merged
//! provider options, and the client turns model identifiers into invocable
//! [`LanguageModel`] handles. Clients are expensive; the registry memoizes
//! them by [`fingerprint`] so identical backend configuration is never
//! instantiated twice.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::transport::RequestPolicy;
use crate::types::OptionsMap;
use crate::Result;

/// An invocable model handle.
pub trait LanguageModel: Send + Sync {
    /// The upstream model identifier this handle invokes.
    fn id(&self) -> &str;

    /// The provider this handle belongs to.
    fn provider(&self) -> &str;
}

/// A constructed backend client.
#[async_trait]
pub trait SdkClient: Send + Sync {
    /// Get a model handle by upstream identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchModel`](crate::Error::NoSuchModel) when the
    /// backend does not serve the identifier.
    async fn language_model(&self, model_id: &str) -> Result<Arc<dyn LanguageModel>>;

    /// Get a handle bound to the backend's responses-style endpoint.
    ///
    /// Backends that make no such distinction fall back to
    /// [`language_model`](Self::language_model).
    async fn responses_model(&self, model_id: &str) -> Result<Arc<dyn LanguageModel>> {
        self.language_model(model_id).await
    }

    /// Get a handle bound to the backend's chat-completions endpoint.
    ///
    /// Backends that make no such distinction fall back to
    /// [`language_model`](Self::language_model).
    async fn chat_model(&self, model_id: &str) -> Result<Arc<dyn LanguageModel>> {
        self.language_model(model_id).await
    }
}

/// A loaded backend module.
#[async_trait]
pub trait SdkModule: Send + Sync {
    /// Canonical factory entry point: construct a client for the named
    /// provider from its merged options.
    ///
    /// The [`RequestPolicy`] wraps the client's outbound transport; a
    /// configured timeout composes with any caller-supplied cancellation.
    async fn create_client(
        &self,
        provider: &str,
        options: &OptionsMap,
        policy: RequestPolicy,
    ) -> Result<Arc<dyn SdkClient>>;
}

/// Serialize a JSON value with recursively sorted object keys.
///
/// Two options maps with the same contents always produce the same string,
/// regardless of insertion order, so fingerprints are stable.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Content hash identifying a unique constructible client: the backend
/// package plus the canonically serialized merged options.
pub fn fingerprint(package: &str, options: &OptionsMap) -> String {
    let mut hasher = Sha256::new();
    hasher.update(package.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical_json(&Value::Object(options.clone())).as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
