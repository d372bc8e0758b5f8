//! Adapter registry for selecting a backend from configuration.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::adapter::StorageAdapter;
use crate::local::{LocalAdapter, LocalConfig};
use mdstore_common::{Error, Result};

/// Factory function type for creating adapters.
pub type AdapterFactory = Box<dyn Fn(Value) -> Result<Arc<dyn StorageAdapter>> + Send + Sync>;

/// Registry for storage adapter factories.
///
/// Callers pick a backend by name and hand it a JSON configuration; the
/// registry builds the matching adapter.
pub struct AdapterRegistry {
    factories: HashMap<String, AdapterFactory>,
}

impl AdapterRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register an adapter factory.
    ///
    /// # Errors
    /// - Returns error if name is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: AdapterFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::AlreadyExists(format!(
                "Adapter '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Resolve an adapter by name and configuration.
    ///
    /// # Errors
    /// - Adapter not registered
    /// - Configuration invalid for the adapter
    pub fn resolve(&self, name: &str, config: Value) -> Result<Arc<dyn StorageAdapter>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("Adapter '{}' is not registered", name)))?;
        factory(config)
    }

    /// Get list of registered adapter names.
    pub fn adapters(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn create_local_adapter(config: Value) -> Result<Arc<dyn StorageAdapter>> {
    let local_config = if config.is_null() {
        LocalConfig::default()
    } else {
        serde_json::from_value(config)
            .map_err(|e| Error::InvalidInput(format!("Invalid local config: {}", e)))?
    };
    Ok(Arc::new(LocalAdapter::from_config(&local_config)?))
}

/// Create a registry with the built-in adapters: `local`, `dropbox`, `memory`.
pub fn create_default_registry() -> AdapterRegistry {
    let mut factories: HashMap<String, AdapterFactory> = HashMap::new();

    factories.insert("local".to_string(), Box::new(create_local_adapter));
    factories.insert(
        "dropbox".to_string(),
        Box::new(crate::dropbox::create_dropbox_adapter),
    );
    factories.insert(
        "memory".to_string(),
        Box::new(|_config| Ok(Arc::new(crate::memory::MemoryAdapter::new()))),
    );

    AdapterRegistry { factories }
}
