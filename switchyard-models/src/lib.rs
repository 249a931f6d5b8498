//! Provider and model resolution for switchyard.
//!
//! This crate provides:
//! - A registry that merges catalog, config, credentials, and adapters into
//!   an immutable provider state
//! - Memoized resolution of `provider/model` pairs to invocable handles
//! - Fingerprint-deduplicated backend client construction
//! - Default and small model selection policies
//!
//! # Architecture
//!
//! ```text
//! config ─┐                          ┌─> list / provider
//! catalog ─┤                         │
//! creds   ─┼─> build ─> ProviderState┼─> model ──> client cache ─> handle
//! adapters─┤   (once)   (immutable)  │             (fingerprint)
//! plugins ─┘                         └─> default_model / small_model
//! ```
//!
//! The state is built lazily on first use; concurrent first uses share one
//! in-flight build. [`ModelRegistry::reset`] discards the state along with
//! both caches so the next lookup observes changed inputs.

mod error;
mod types;

pub mod adapter;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod loader;
pub mod plugin;
pub mod registry;
pub mod sdk;
pub mod transport;

pub use error::{Error, Result};
pub use registry::{
    ActivationSource, ActiveProvider, FilterRules, ModelRegistry, ProviderState, RegistryOptions,
    ResolvedModel, SelectionRules,
};
pub use types::{
    Catalog, Cost, Limit, Modalities, Modality, ModelEntry, ModelRef, OptionsMap, PackageOverride,
    ProviderEntry,
};
