//! Credential storage for providers.
//!
//! Credentials are looked up by provider id and come in two shapes: plain
//! API keys and OAuth-style token sets that plugins may refresh in place.
//! The system keyring backs the default store; an in-memory store backs
//! tests and embedders that manage credentials themselves.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// A secret value that prevents accidental logging.
///
/// Wrapped in `SecretString`, which implements `Debug` as `"[REDACTED]"`,
/// zeroizes memory on drop, and requires explicit `.expose_secret()` to
/// read the value.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Create a new API key from a string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(SecretString::from(key.into()))
    }

    /// Expose the secret key value.
    ///
    /// Use sparingly - only when actually handing it to a backend.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey([REDACTED])")
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// Secrets only cross serde for persistence in the credential store.
impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose_secret())
    }
}

impl<'de> Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(ApiKey::new)
    }
}

/// A stored credential for a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    /// A plain API key.
    Api {
        /// The key.
        key: ApiKey,
    },
    /// OAuth-style token set; plugins refresh these in place.
    Oauth {
        /// Long-lived refresh token.
        refresh: ApiKey,
        /// Short-lived access token.
        access: ApiKey,
        /// Access token expiry, epoch milliseconds.
        expires: u64,
    },
}

impl Credential {
    /// The API key, when this is a plain key credential.
    pub fn api_key(&self) -> Option<&ApiKey> {
        match self {
            Credential::Api { key } => Some(key),
            Credential::Oauth { .. } => None,
        }
    }
}

/// Lookup of stored credentials by provider id.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Get the credential for a provider, if any.
    async fn get(&self, provider: &str) -> Result<Option<Credential>>;

    /// Store a credential for a provider, replacing any existing one.
    async fn set(&self, provider: &str, credential: Credential) -> Result<()>;

    /// All stored credentials by provider id.
    async fn all(&self) -> Result<BTreeMap<String, Credential>>;
}

/// Index entry listing providers with stored credentials. The keyring has no
/// enumeration API, so the store keeps its own.
const INDEX_ENTRY: &str = "__index";

/// Credential store backed by the system keyring.
///
/// Each provider's credential is stored as a JSON password under
/// `(service_name, provider)`; an index entry tracks which providers have
/// credentials so `all()` can enumerate them.
pub struct KeyringStore {
    service_name: String,
}

impl KeyringStore {
    /// Create a store under the given keyring service name.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn entry(&self, name: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service_name, name).map_err(|e| Error::Keyring(e.to_string()))
    }

    fn read(&self, name: &str) -> Result<Option<String>> {
        match self.entry(name)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::Keyring(e.to_string())),
        }
    }

    fn index(&self) -> Result<Vec<String>> {
        match self.read(INDEX_ENTRY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    fn write_index(&self, index: &[String]) -> Result<()> {
        self.entry(INDEX_ENTRY)?
            .set_password(&serde_json::to_string(index)?)
            .map_err(|e| Error::Keyring(e.to_string()))
    }
}

#[async_trait]
impl CredentialStore for KeyringStore {
    async fn get(&self, provider: &str) -> Result<Option<Credential>> {
        let Some(raw) = self.read(provider)? else {
            return Ok(None);
        };
        // Entries written before credentials were tagged are bare keys.
        let credential = serde_json::from_str(&raw).unwrap_or(Credential::Api {
            key: ApiKey::new(raw),
        });
        debug!(provider, "retrieved credential from keyring");
        Ok(Some(credential))
    }

    async fn set(&self, provider: &str, credential: Credential) -> Result<()> {
        self.entry(provider)?
            .set_password(&serde_json::to_string(&credential)?)
            .map_err(|e| Error::Keyring(e.to_string()))?;
        let mut index = self.index()?;
        if !index.iter().any(|p| p == provider) {
            index.push(provider.to_string());
            index.sort();
            self.write_index(&index)?;
        }
        debug!(provider, "stored credential in keyring");
        Ok(())
    }

    async fn all(&self) -> Result<BTreeMap<String, Credential>> {
        let mut out = BTreeMap::new();
        for provider in self.index()? {
            if let Some(credential) = self.get(&provider).await? {
                out.insert(provider, credential);
            }
        }
        Ok(out)
    }
}

/// In-memory credential store for tests and embedders.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<BTreeMap<String, Credential>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with an API key for a provider.
    pub fn with_api_key(provider: impl Into<String>, key: impl Into<String>) -> Self {
        let store = Self::new();
        store.entries.lock().expect("credential lock poisoned").insert(
            provider.into(),
            Credential::Api {
                key: ApiKey::new(key),
            },
        );
        store
    }

    /// Insert a credential synchronously.
    pub fn insert(&self, provider: impl Into<String>, credential: Credential) {
        self.entries
            .lock()
            .expect("credential lock poisoned")
            .insert(provider.into(), credential);
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, provider: &str) -> Result<Option<Credential>> {
        Ok(self
            .entries
            .lock()
            .expect("credential lock poisoned")
            .get(provider)
            .cloned())
    }

    async fn set(&self, provider: &str, credential: Credential) -> Result<()> {
        self.insert(provider, credential);
        Ok(())
    }

    async fn all(&self) -> Result<BTreeMap<String, Credential>> {
        Ok(self.entries.lock().expect("credential lock poisoned").clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("sk-secret-key-12345");
        let debug = format!("{:?}", key);
        assert_eq!(debug, "ApiKey([REDACTED])");
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn credential_debug_is_redacted() {
        let credential = Credential::Api {
            key: ApiKey::new("sk-secret-key-12345"),
        };
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn api_key_expose_secret_returns_value() {
        let key = ApiKey::new("sk-secret-key-12345");
        assert_eq!(key.expose_secret(), "sk-secret-key-12345");
    }

    #[test]
    fn credential_serde_roundtrip_api() {
        let credential = Credential::Api {
            key: ApiKey::new("sk-test"),
        };
        let json = serde_json::to_string(&credential).unwrap();
        assert!(json.contains("\"type\":\"api\""));

        let parsed: Credential = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.api_key().unwrap().expose_secret(), "sk-test");
    }

    #[test]
    fn credential_serde_roundtrip_oauth() {
        let credential = Credential::Oauth {
            refresh: ApiKey::new("refresh-token"),
            access: ApiKey::new("access-token"),
            expires: 1_700_000_000_000,
        };
        let json = serde_json::to_string(&credential).unwrap();
        let parsed: Credential = serde_json::from_str(&json).unwrap();
        match parsed {
            Credential::Oauth { expires, access, .. } => {
                assert_eq!(expires, 1_700_000_000_000);
                assert_eq!(access.expose_secret(), "access-token");
            }
            _ => panic!("expected oauth credential"),
        }
    }

    #[test]
    fn oauth_credential_has_no_api_key() {
        let credential = Credential::Oauth {
            refresh: ApiKey::new("r"),
            access: ApiKey::new("a"),
            expires: 0,
        };
        assert!(credential.api_key().is_none());
    }

    #[tokio::test]
    async fn memory_store_get_set_all() {
        let store = MemoryCredentialStore::new();
        assert!(store.get("acme").await.unwrap().is_none());

        store
            .set(
                "acme",
                Credential::Api {
                    key: ApiKey::new("sk-1"),
                },
            )
            .await
            .unwrap();

        let found = store.get("acme").await.unwrap().unwrap();
        assert_eq!(found.api_key().unwrap().expose_secret(), "sk-1");

        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("acme"));
    }
}
