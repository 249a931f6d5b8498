//! Error types for provider and model resolution.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during provider and model resolution.
#[derive(Debug, Error)]
pub enum Error {
    /// Requested provider or model is absent from the resolved state.
    #[error("model not found: {provider}/{model}")]
    ModelNotFound {
        /// Provider identifier.
        provider: String,
        /// Model identifier as requested (the config key, not the alias).
        model: String,
    },

    /// Provisioning, module loading, or client construction failed.
    #[error("provider '{provider}' failed to initialize")]
    ProviderInit {
        /// Provider identifier.
        provider: String,
        /// Underlying failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An SDK client was asked for a model identifier it does not serve.
    ///
    /// Raised inside [`SdkClient::language_model`](crate::sdk::SdkClient) and
    /// translated to [`Error::ModelNotFound`] by the registry.
    #[error("no such model: {0}")]
    NoSuchModel(String),

    /// No provider survived activation and filtering.
    #[error("no providers found")]
    NoProviders,

    /// A provider survived but has no models to select from.
    #[error("no models found for provider: {0}")]
    NoModels(String),

    /// Package provisioning failed after exhausting retries.
    #[error("failed to provision package {package}@{version}")]
    Provision {
        /// Package identifier.
        package: String,
        /// Requested version.
        version: String,
        /// Last attempt's failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to access system keyring.
    #[error("keyring error: {0}")]
    Keyring(String),

    /// Catalog document could not be obtained from any source.
    #[error("catalog unavailable: {0}")]
    Catalog(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap any failure as a [`Error::ProviderInit`] for the given provider.
    pub fn provider_init(
        provider: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ProviderInit {
            provider: provider.into(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_not_found_display() {
        let err = Error::ModelNotFound {
            provider: "acme".to_string(),
            model: "foo-v2".to_string(),
        };
        assert_eq!(err.to_string(), "model not found: acme/foo-v2");
    }

    #[test]
    fn provider_init_keeps_cause() {
        let err = Error::provider_init("acme", "boom");
        assert_eq!(err.to_string(), "provider 'acme' failed to initialize");
        let source = std::error::Error::source(&err).expect("cause");
        assert_eq!(source.to_string(), "boom");
    }

    #[test]
    fn error_from_serde_json() {
        let json_err: serde_json::Error = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
