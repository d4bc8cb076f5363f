use std::collections::HashMap;

use anyhow::{anyhow, Result};

use super::backend::{share, DetectionAdapter, SharedAdapter};

/// Registry of detection adapters, selected by name from configuration.
pub struct AdapterRegistry {
    adapters: HashMap<String, SharedAdapter>,
    default_name: Option<String>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
            default_name: None,
        }
    }

    /// Register an adapter. The first registered adapter becomes the default.
    pub fn register<A: DetectionAdapter + 'static>(&mut self, adapter: A) {
        let name = adapter.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.adapters.insert(name, share(adapter));
    }

    /// Set default adapter by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.adapters.contains_key(name) {
            return Err(anyhow!("detection adapter '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// Get adapter by name.
    pub fn get(&self, name: &str) -> Option<SharedAdapter> {
        self.adapters.get(name).cloned()
    }

    pub fn default_adapter(&self) -> Option<SharedAdapter> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// Registered adapter names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
