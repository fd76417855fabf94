//! Provider registry for managing multiple [`Provider`] implementations.
//!
//! The [`ProviderRegistry`] keeps providers by name in registration order and
//! assembles the ordered chains the resolver walks.

use std::sync::Arc;

use metaforged_common::{Error, Result};

use super::provider::Provider;

/// A registry that manages multiple [`Provider`] implementations.
///
/// # Examples
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use metaforged::metadata::ProviderRegistry;
///
/// let mut registry = ProviderRegistry::new();
/// registry.register(Arc::new(local_library));
/// registry.register(Arc::new(tmdb));
///
/// let chain = registry.chain(&["local", "tmdb"])?;
/// ```
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create an empty registry with no providers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any previous provider with the same
    /// name in place.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        match self.providers.iter().position(|p| p.name() == provider.name()) {
            Some(idx) => self.providers[idx] = provider,
            None => self.providers.push(provider),
        }
    }

    /// Look up a provider by its [`Provider::name`].
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    /// All providers that are currently available, in registration order.
    pub fn available(&self) -> Vec<Arc<dyn Provider>> {
        self.providers
            .iter()
            .filter(|p| p.is_available())
            .cloned()
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// The providers named in `names`, in that order.
    ///
    /// Unknown names are an error so a misconfigured chain is caught early;
    /// registered but unavailable providers are kept and skipped at
    /// resolution time.
    pub fn chain(&self, names: &[&str]) -> Result<Vec<Arc<dyn Provider>>> {
        names
            .iter()
            .map(|name| {
                self.get(name)
                    .ok_or_else(|| Error::invalid_input(format!("unknown provider: {name}")))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
