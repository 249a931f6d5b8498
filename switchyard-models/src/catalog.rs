//! The model catalog: static provider/model metadata.
//!
//! The catalog is a remote JSON document mapping provider ids to provider
//! metadata. Acquisition is best-effort: a failed fetch falls back silently
//! to the last local snapshot so resolution never depends on the network.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::types::Catalog;
use crate::{Error, Result};

/// Default upstream catalog document.
const DEFAULT_URL: &str = "https://models.dev/api.json";

/// Supplies the catalog document.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the catalog.
    async fn fetch(&self) -> Result<Catalog>;
}

/// A fixed, in-memory catalog. Useful for embedders and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog(pub Catalog);

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn fetch(&self) -> Result<Catalog> {
        Ok(self.0.clone())
    }
}

/// Catalog fetched from a remote document with a local snapshot fallback.
///
/// Lookup order:
/// 1. An explicitly pinned document path, when configured.
/// 2. The remote document; a successful fetch refreshes the snapshot.
/// 3. The last snapshot on disk.
pub struct RemoteCatalog {
    url: String,
    snapshot: PathBuf,
    pinned: Option<PathBuf>,
    http: reqwest::Client,
}

impl Default for RemoteCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteCatalog {
    /// Create a catalog source with the default URL and snapshot location.
    pub fn new() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            snapshot: switchyard_paths::cache_dir().join("models.json"),
            pinned: None,
            http: reqwest::Client::new(),
        }
    }

    /// Use a different upstream URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Use a different snapshot path.
    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot = path.into();
        self
    }

    /// Pin the catalog to a local document, skipping the network entirely.
    pub fn with_pinned(mut self, path: impl Into<PathBuf>) -> Self {
        self.pinned = Some(path.into());
        self
    }

    async fn fetch_remote(&self) -> Result<String> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Catalog(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::Catalog(e.to_string()))?;
        response
            .text()
            .await
            .map_err(|e| Error::Catalog(e.to_string()))
    }

    async fn read_snapshot(&self) -> Result<String> {
        Ok(tokio::fs::read_to_string(&self.snapshot).await?)
    }

    async fn write_snapshot(&self, body: &str) {
        if let Some(parent) = self.snapshot.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            warn!(error = %e, "failed to create catalog snapshot directory");
            return;
        }
        if let Err(e) = tokio::fs::write(&self.snapshot, body).await {
            warn!(error = %e, "failed to refresh catalog snapshot");
        }
    }
}

#[async_trait]
impl CatalogSource for RemoteCatalog {
    async fn fetch(&self) -> Result<Catalog> {
        if let Some(pinned) = &self.pinned
            && let Ok(body) = tokio::fs::read_to_string(pinned).await
        {
            debug!(path = %pinned.display(), "using pinned catalog document");
            return Ok(serde_json::from_str(&body)?);
        }

        match self.fetch_remote().await {
            Ok(body) => match serde_json::from_str(&body) {
                Ok(catalog) => {
                    self.write_snapshot(&body).await;
                    Ok(catalog)
                }
                Err(e) => {
                    warn!(error = %e, "remote catalog is malformed, using snapshot");
                    let body = self.read_snapshot().await.map_err(|_| {
                        Error::Catalog("remote malformed and no snapshot available".to_string())
                    })?;
                    Ok(serde_json::from_str(&body)?)
                }
            },
            Err(e) => {
                debug!(error = %e, "catalog fetch failed, using snapshot");
                let body = self
                    .read_snapshot()
                    .await
                    .map_err(|_| Error::Catalog("unreachable and no snapshot available".to_string()))?;
                Ok(serde_json::from_str(&body)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProviderEntry;

    fn sample_catalog_json() -> String {
        r#"{
            "acme": {
                "id": "acme",
                "name": "Acme",
                "env": ["ACME_API_KEY"],
                "models": {
                    "foo-v2": { "id": "foo-v2", "name": "Foo v2" }
                }
            }
        }"#
        .to_string()
    }

    #[tokio::test]
    async fn static_catalog_returns_entries() {
        let mut catalog = Catalog::new();
        catalog.insert("acme".to_string(), ProviderEntry::named("acme"));
        let source = StaticCatalog(catalog);
        let fetched = source.fetch().await.unwrap();
        assert!(fetched.contains_key("acme"));
    }

    #[tokio::test]
    async fn pinned_document_wins_over_network() {
        let dir = tempfile::tempdir().unwrap();
        let pinned = dir.path().join("models.json");
        tokio::fs::write(&pinned, sample_catalog_json()).await.unwrap();

        // Unreachable URL proves the pinned file short-circuits the fetch.
        let source = RemoteCatalog::new()
            .with_url("http://127.0.0.1:1/api.json")
            .with_snapshot(dir.path().join("snapshot.json"))
            .with_pinned(&pinned);

        let catalog = source.fetch().await.unwrap();
        assert_eq!(catalog["acme"].env, vec!["ACME_API_KEY"]);
    }

    #[tokio::test]
    async fn fetch_failure_falls_back_to_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("models.json");
        tokio::fs::write(&snapshot, sample_catalog_json()).await.unwrap();

        let source = RemoteCatalog::new()
            .with_url("http://127.0.0.1:1/api.json")
            .with_snapshot(&snapshot);

        let catalog = source.fetch().await.unwrap();
        assert!(catalog.contains_key("acme"));
    }

    #[tokio::test]
    async fn fetch_failure_without_snapshot_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let source = RemoteCatalog::new()
            .with_url("http://127.0.0.1:1/api.json")
            .with_snapshot(dir.path().join("missing.json"));

        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));
    }
}
